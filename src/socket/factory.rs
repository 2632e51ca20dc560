//! Factory for opening the probe transport of one scan

use super::icmp_v4::RawIcmpV4Socket;
use super::icmp_v6::RawIcmpV6Socket;
use super::{IpVersion, ProbeInfo, ProbeResponse, ProbeSocket};
use crate::traceroute::TracerouteError;
use socket2::{Domain, Protocol, Socket, Type};
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tracing::info;

// Common POSIX error codes
const EPERM: i32 = 1; // Operation not permitted
const EACCES: i32 = 13; // Permission denied

/// The transport held by a scan: one raw ICMP socket of the scan's family
///
/// The socket is closed when the transport is dropped.
pub enum Transport {
    /// ICMPv4 transport
    V4(RawIcmpV4Socket),
    /// ICMPv6 transport
    V6(RawIcmpV6Socket),
}

impl ProbeSocket for Transport {
    fn ip_version(&self) -> IpVersion {
        match self {
            Transport::V4(s) => s.ip_version(),
            Transport::V6(s) => s.ip_version(),
        }
    }

    fn send_probe(&mut self, target: IpAddr, probe: &ProbeInfo) -> anyhow::Result<()> {
        match self {
            Transport::V4(s) => s.send_probe(target, probe),
            Transport::V6(s) => s.send_probe(target, probe),
        }
    }

    fn recv_response(
        &mut self,
        probe: &ProbeInfo,
        timeout: Duration,
    ) -> anyhow::Result<Option<ProbeResponse>> {
        match self {
            Transport::V4(s) => s.recv_response(probe, timeout),
            Transport::V6(s) => s.recv_response(probe, timeout),
        }
    }
}

/// Map a socket creation error onto the library error type
fn socket_error(err: &std::io::Error, version: IpVersion) -> TracerouteError {
    match err.raw_os_error() {
        Some(EPERM) | Some(EACCES) => TracerouteError::InsufficientPermissions {
            required: "root or CAP_NET_RAW for raw ICMP sockets".to_string(),
            suggestion: "Run with sudo or grant CAP_NET_RAW to the binary".to_string(),
        },
        _ => TracerouteError::SocketError(format!(
            "{} raw ICMP socket: {}",
            version.description(),
            err
        )),
    }
}

/// Open a raw ICMP transport for `version`, optionally bound to `source`
pub fn open_transport(
    version: IpVersion,
    source: Option<IpAddr>,
) -> Result<Transport, TracerouteError> {
    if let Some(src) = source {
        if IpVersion::of(&src) != version {
            return Err(TracerouteError::SocketError(format!(
                "source address {} is not an {} address",
                src,
                version.description()
            )));
        }
    }

    let (domain, protocol) = match version {
        IpVersion::V4 => (Domain::IPV4, Protocol::ICMPV4),
        IpVersion::V6 => (Domain::IPV6, Protocol::ICMPV6),
    };

    let socket = Socket::new(domain, Type::RAW, Some(protocol))
        .map_err(|e| socket_error(&e, version))?;

    if let Some(src) = source {
        socket
            .bind(&SocketAddr::new(src, 0).into())
            .map_err(|e| {
                TracerouteError::SocketError(format!("cannot bind to source {}: {}", src, e))
            })?;
    }

    info!(
        "Using Raw ICMP {} socket{}",
        version.description(),
        source.map(|s| format!(" bound to {}", s)).unwrap_or_default()
    );

    Ok(match version {
        IpVersion::V4 => Transport::V4(RawIcmpV4Socket::new(socket)),
        IpVersion::V6 => Transport::V6(RawIcmpV6Socket::new(socket)),
    })
}
