//! Socket abstraction layer for ICMP echo probing

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::time::{Duration, Instant};

pub mod factory;
pub mod icmp_v4;
pub mod icmp_v6;
pub mod utils;

/// IP version used for probing
///
/// Chosen once per scan from the destination address and never changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IpVersion {
    /// IPv4 addressing
    V4,
    /// IPv6 addressing
    V6,
}

impl IpVersion {
    /// Classify an address string: anything containing a colon is IPv6.
    pub fn from_address_str(address: &str) -> Self {
        if address.contains(':') {
            IpVersion::V6
        } else {
            IpVersion::V4
        }
    }

    /// Version of an already parsed address
    pub fn of(addr: &IpAddr) -> Self {
        match addr {
            IpAddr::V4(_) => IpVersion::V4,
            IpAddr::V6(_) => IpVersion::V6,
        }
    }

    /// Map a numeric family selector (`4`, `6` or unset) to a version.
    ///
    /// Returns `Err(value)` for any other number.
    pub fn from_family(family: Option<u8>) -> Result<Option<Self>, u8> {
        match family {
            None => Ok(None),
            Some(4) => Ok(Some(IpVersion::V4)),
            Some(6) => Ok(Some(IpVersion::V6)),
            Some(other) => Err(other),
        }
    }

    /// Get a human-readable description
    pub fn description(&self) -> &'static str {
        match self {
            IpVersion::V4 => "IPv4",
            IpVersion::V6 => "IPv6",
        }
    }
}

/// Information about a sent probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeInfo {
    /// Time-to-live value
    pub ttl: u8,
    /// Identifier shared by every probe of one scan
    pub identifier: u16,
    /// Sequence number
    pub sequence: u16,
    /// When the probe was sent
    pub sent_at: Instant,
}

/// Type of response received
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseType {
    /// ICMP Time Exceeded (TTL expired at an intermediate hop)
    TimeExceeded,
    /// ICMP Echo Reply from the destination
    EchoReply,
    /// ICMP Destination Unreachable, with ICMP code
    DestinationUnreachable(u8),
    /// Any other ICMP error quoting one of our probes
    Other {
        /// Raw ICMP type
        icmp_type: u8,
        /// Raw ICMP code
        code: u8,
    },
}

/// Response from a probe
#[derive(Debug, Clone)]
pub struct ProbeResponse {
    /// Address that sent the response
    pub from_addr: IpAddr,
    /// Type of response
    pub response_type: ResponseType,
    /// Round-trip time
    pub rtt: Duration,
}

/// Trait for probe sockets
///
/// One implementation exists per address family; the scanner only ever sees
/// this interface.
pub trait ProbeSocket {
    /// IP version this socket speaks
    fn ip_version(&self) -> IpVersion;

    /// Send an echo request carrying `probe`'s identifier, sequence and TTL
    fn send_probe(&mut self, target: IpAddr, probe: &ProbeInfo) -> Result<()>;

    /// Wait for the reply to `probe`
    ///
    /// Returns `Ok(None)` once `timeout` has elapsed without a matching reply.
    fn recv_response(&mut self, probe: &ProbeInfo, timeout: Duration)
        -> Result<Option<ProbeResponse>>;
}

impl<S: ProbeSocket + ?Sized> ProbeSocket for Box<S> {
    fn ip_version(&self) -> IpVersion {
        (**self).ip_version()
    }

    fn send_probe(&mut self, target: IpAddr, probe: &ProbeInfo) -> Result<()> {
        (**self).send_probe(target, probe)
    }

    fn recv_response(
        &mut self,
        probe: &ProbeInfo,
        timeout: Duration,
    ) -> Result<Option<ProbeResponse>> {
        (**self).recv_response(probe, timeout)
    }
}

/// Smallest read timeout the kernel honours; a zeroed `timeval` means block forever.
const MIN_READ_TIMEOUT: Duration = Duration::from_micros(1);

/// Read timeout for the next receive before `deadline`
///
/// `None` once less than [`MIN_READ_TIMEOUT`] is left, in which case the wait
/// is over.
pub(crate) fn read_timeout_until(deadline: Instant, now: Instant) -> Option<Duration> {
    let remaining = deadline.saturating_duration_since(now);
    (remaining >= MIN_READ_TIMEOUT).then_some(remaining)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn test_read_timeout_until() {
        let now = Instant::now();
        assert_eq!(
            read_timeout_until(now + Duration::from_millis(5), now),
            Some(Duration::from_millis(5))
        );
        assert_eq!(
            read_timeout_until(now + MIN_READ_TIMEOUT, now),
            Some(MIN_READ_TIMEOUT)
        );
        assert_eq!(read_timeout_until(now, now), None);
        assert_eq!(read_timeout_until(now + Duration::from_nanos(500), now), None);
        assert_eq!(read_timeout_until(now, now + Duration::from_secs(1)), None);
    }

    #[test]
    fn test_ip_version_from_address_str() {
        assert_eq!(IpVersion::from_address_str("8.8.8.8"), IpVersion::V4);
        assert_eq!(IpVersion::from_address_str("2001:db8::1"), IpVersion::V6);
        assert_eq!(IpVersion::from_address_str("::1"), IpVersion::V6);
    }

    #[test]
    fn test_ip_version_from_family() {
        assert_eq!(IpVersion::from_family(None), Ok(None));
        assert_eq!(IpVersion::from_family(Some(4)), Ok(Some(IpVersion::V4)));
        assert_eq!(IpVersion::from_family(Some(6)), Ok(Some(IpVersion::V6)));
        assert_eq!(IpVersion::from_family(Some(5)), Err(5));
        assert_eq!(IpVersion::from_family(Some(0)), Err(0));
    }

    #[test]
    fn test_ip_version_of() {
        let v4 = IpAddr::V4(Ipv4Addr::new(192, 168, 1, 1));
        assert_eq!(IpVersion::of(&v4), IpVersion::V4);
        assert_eq!(IpVersion::of(&"fe80::1".parse().unwrap()), IpVersion::V6);
    }

    #[test]
    fn test_response_types() {
        let resp = ResponseType::DestinationUnreachable(3);
        match resp {
            ResponseType::DestinationUnreachable(code) => assert_eq!(code, 3),
            _ => panic!("Wrong response type"),
        }
        assert_ne!(ResponseType::TimeExceeded, ResponseType::EchoReply);
    }
}
