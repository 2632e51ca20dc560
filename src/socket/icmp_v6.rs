//! IPv6 raw ICMP socket implementation

use super::icmp_v4::ICMP_ECHO_PAYLOAD_SIZE;
use super::{read_timeout_until, IpVersion, ProbeInfo, ProbeResponse, ProbeSocket, ResponseType};
use anyhow::{Context, Result};
use pnet::packet::icmpv6::echo_request::{Icmpv6Codes, MutableEchoRequestPacket};
use pnet::packet::icmpv6::{Icmpv6Packet, Icmpv6Types};
use pnet::packet::Packet;
use socket2::Socket as Socket2;
use std::mem::MaybeUninit;
use std::net::{IpAddr, SocketAddr, SocketAddrV6};
use std::time::{Duration, Instant};
use tracing::trace;

/// ICMPv6 error header length in bytes
const ICMPV6_ERROR_HEADER_LEN_BYTES: usize = 8;
/// Fixed IPv6 header length in bytes
const IPV6_HEADER_LEN_BYTES: usize = 40;
/// Next-header value for ICMPv6
const NEXT_HEADER_ICMPV6: u8 = 58;

/// Raw ICMPv6 socket
///
/// Unlike IPv4, raw ICMPv6 sockets deliver the ICMPv6 message without the
/// IP header, and the kernel fills in the checksum.
pub struct RawIcmpV6Socket {
    socket: Socket2,
}

impl RawIcmpV6Socket {
    /// Wrap an already created (and optionally bound) raw ICMPv6 socket
    pub fn new(socket: Socket2) -> Self {
        RawIcmpV6Socket { socket }
    }
}

pub(crate) fn build_echo_request(probe: &ProbeInfo) -> Result<Vec<u8>> {
    let mut icmp_buf =
        vec![0u8; MutableEchoRequestPacket::minimum_packet_size() + ICMP_ECHO_PAYLOAD_SIZE];
    let mut echo_req_packet = MutableEchoRequestPacket::new(&mut icmp_buf)
        .ok_or_else(|| anyhow::anyhow!("Failed to create ICMPv6 packet"))?;

    echo_req_packet.set_icmpv6_type(Icmpv6Types::EchoRequest);
    echo_req_packet.set_icmpv6_code(Icmpv6Codes::NoCode);
    echo_req_packet.set_identifier(probe.identifier);
    echo_req_packet.set_sequence_number(probe.sequence);

    let payload_data = (probe.identifier as u32) << 16 | (probe.sequence as u32);
    let mut final_payload = vec![0u8; ICMP_ECHO_PAYLOAD_SIZE];
    final_payload[..4].copy_from_slice(&payload_data.to_be_bytes());
    echo_req_packet.set_payload(&final_payload);

    Ok(echo_req_packet.packet().to_vec())
}

fn echo_matches(echo: &[u8], expected_type: u8, probe: &ProbeInfo) -> bool {
    echo.len() >= 8
        && echo[0] == expected_type
        && u16::from_be_bytes([echo[4], echo[5]]) == probe.identifier
        && u16::from_be_bytes([echo[6], echo[7]]) == probe.sequence
}

/// Classify a received ICMPv6 message against the probe we are waiting for
pub(crate) fn parse_reply(icmp_data: &[u8], probe: &ProbeInfo) -> Option<ResponseType> {
    let icmp_packet = Icmpv6Packet::new(icmp_data)?;
    let icmp_type = icmp_packet.get_icmpv6_type();

    if icmp_type == Icmpv6Types::EchoReply {
        return echo_matches(icmp_data, Icmpv6Types::EchoReply.0, probe)
            .then_some(ResponseType::EchoReply);
    }

    // Informational messages (type >= 128) never quote our probe.
    if icmp_type.0 >= 128 {
        return None;
    }

    let quoted = icmp_data.get(ICMPV6_ERROR_HEADER_LEN_BYTES..)?;
    if quoted.len() < IPV6_HEADER_LEN_BYTES + 8 || quoted[6] != NEXT_HEADER_ICMPV6 {
        return None;
    }
    if !echo_matches(
        &quoted[IPV6_HEADER_LEN_BYTES..],
        Icmpv6Types::EchoRequest.0,
        probe,
    ) {
        return None;
    }

    let code = icmp_packet.get_icmpv6_code().0;
    Some(match icmp_type {
        Icmpv6Types::TimeExceeded => ResponseType::TimeExceeded,
        Icmpv6Types::DestinationUnreachable => ResponseType::DestinationUnreachable(code),
        other => ResponseType::Other {
            icmp_type: other.0,
            code,
        },
    })
}

impl ProbeSocket for RawIcmpV6Socket {
    fn ip_version(&self) -> IpVersion {
        IpVersion::V6
    }

    fn send_probe(&mut self, target: IpAddr, probe: &ProbeInfo) -> Result<()> {
        let target_v6 = match target {
            IpAddr::V6(v6) => v6,
            IpAddr::V4(_) => {
                return Err(anyhow::anyhow!("IPv4 target not supported by IPv6 socket"))
            }
        };

        self.socket
            .set_unicast_hops_v6(probe.ttl as u32)
            .context("Failed to set hop limit")?;

        let packet = build_echo_request(probe)?;
        let target_addr = SocketAddr::V6(SocketAddrV6::new(target_v6, 0, 0, 0));
        self.socket
            .send_to(&packet, &target_addr.into())
            .context("Failed to send ICMPv6 packet")?;

        Ok(())
    }

    fn recv_response(
        &mut self,
        probe: &ProbeInfo,
        timeout: Duration,
    ) -> Result<Option<ProbeResponse>> {
        let mut recv_buf = [MaybeUninit::uninit(); 1500];
        let deadline = probe.sent_at + timeout;

        loop {
            let Some(remaining) = read_timeout_until(deadline, Instant::now()) else {
                return Ok(None);
            };

            self.socket.set_read_timeout(Some(remaining))?;

            match self.socket.recv_from(&mut recv_buf) {
                Ok((size, socket_addr)) => {
                    let recv_time = Instant::now();
                    let from_addr = match socket_addr.as_socket_ipv6() {
                        Some(s) => IpAddr::V6(*s.ip()),
                        None => continue,
                    };

                    let initialized_part: &[MaybeUninit<u8>] = &recv_buf[..size];
                    // SAFETY: recv_from initialized the first `size` bytes.
                    let icmp_data: &[u8] =
                        unsafe { &*(initialized_part as *const [MaybeUninit<u8>] as *const [u8]) };

                    match parse_reply(icmp_data, probe) {
                        Some(response_type) => {
                            return Ok(Some(ProbeResponse {
                                from_addr,
                                response_type,
                                rtt: recv_time.duration_since(probe.sent_at),
                            }));
                        }
                        None => trace!(%from_addr, size, "ignoring unrelated ICMPv6 message"),
                    }
                }
                Err(e)
                    if e.kind() == std::io::ErrorKind::WouldBlock
                        || e.kind() == std::io::ErrorKind::TimedOut =>
                {
                    continue;
                }
                Err(e) => return Err(e).context("Failed to receive ICMPv6 packet"),
            }
        }
    }
}
