//! IPv4 raw ICMP socket implementation

use super::{read_timeout_until, IpVersion, ProbeInfo, ProbeResponse, ProbeSocket, ResponseType};
use anyhow::{Context, Result};
use pnet::packet::icmp::echo_reply::EchoReplyPacket;
use pnet::packet::icmp::echo_request::MutableEchoRequestPacket;
use pnet::packet::icmp::{IcmpCode, IcmpPacket, IcmpTypes};
use pnet::packet::ipv4::Ipv4Packet;
use pnet::packet::Packet;
use pnet::util::checksum as pnet_checksum;
use socket2::Socket as Socket2;
use std::mem::MaybeUninit;
use std::net::{IpAddr, SocketAddr, SocketAddrV4};
use std::time::{Duration, Instant};
use tracing::trace;

/// Size of ICMP echo payload
pub(crate) const ICMP_ECHO_PAYLOAD_SIZE: usize = 16;
/// ICMP error header length in bytes
const ICMP_ERROR_HEADER_LEN_BYTES: usize = 8;
/// IPv4 header minimum length in bytes
const IPV4_HEADER_MIN_LEN_BYTES: usize = 20;

/// Raw ICMP socket for IPv4
///
/// Receives full IP datagrams; the kernel builds the outgoing IP header.
pub struct RawIcmpV4Socket {
    socket: Socket2,
}

impl RawIcmpV4Socket {
    /// Wrap an already created (and optionally bound) raw ICMPv4 socket
    pub fn new(socket: Socket2) -> Self {
        RawIcmpV4Socket { socket }
    }
}

/// Build the ICMP echo request bytes for a probe
///
/// The first payload word repeats identifier and sequence.
pub(crate) fn build_echo_request(probe: &ProbeInfo) -> Result<Vec<u8>> {
    let mut icmp_buf =
        vec![0u8; MutableEchoRequestPacket::minimum_packet_size() + ICMP_ECHO_PAYLOAD_SIZE];
    let mut echo_req_packet = MutableEchoRequestPacket::new(&mut icmp_buf)
        .ok_or_else(|| anyhow::anyhow!("Failed to create ICMP packet"))?;

    echo_req_packet.set_icmp_type(IcmpTypes::EchoRequest);
    echo_req_packet.set_icmp_code(IcmpCode(0));
    echo_req_packet.set_identifier(probe.identifier);
    echo_req_packet.set_sequence_number(probe.sequence);

    let payload_data = (probe.identifier as u32) << 16 | (probe.sequence as u32);
    let mut final_payload = vec![0u8; ICMP_ECHO_PAYLOAD_SIZE];
    final_payload[..4].copy_from_slice(&payload_data.to_be_bytes());
    echo_req_packet.set_payload(&final_payload);

    let checksum = pnet_checksum(echo_req_packet.packet(), 1);
    echo_req_packet.set_checksum(checksum);

    Ok(echo_req_packet.packet().to_vec())
}

/// Classify a received IPv4 datagram against the probe we are waiting for
///
/// Returns `None` for anything that is not a reply to `probe`.
pub(crate) fn parse_reply(packet_data: &[u8], probe: &ProbeInfo) -> Option<ResponseType> {
    let outer_ipv4_packet = Ipv4Packet::new(packet_data)?;
    let icmp_data = outer_ipv4_packet.payload();
    let icmp_packet = IcmpPacket::new(icmp_data)?;
    let icmp_type = icmp_packet.get_icmp_type();

    if icmp_type == IcmpTypes::EchoReply {
        let echo_reply_pkt = EchoReplyPacket::new(icmp_data)?;
        if echo_reply_pkt.get_identifier() == probe.identifier
            && echo_reply_pkt.get_sequence_number() == probe.sequence
        {
            return Some(ResponseType::EchoReply);
        }
        return None;
    }

    if icmp_type == IcmpTypes::EchoRequest {
        return None;
    }

    // Every ICMP error quotes the IP header and first 8 bytes of the
    // datagram that triggered it.
    if icmp_data.len() < ICMP_ERROR_HEADER_LEN_BYTES + IPV4_HEADER_MIN_LEN_BYTES {
        return None;
    }
    let inner_ip_packet = Ipv4Packet::new(&icmp_data[ICMP_ERROR_HEADER_LEN_BYTES..])?;
    let original_icmp_bytes = inner_ip_packet.payload();
    if original_icmp_bytes.len() < 8 {
        return None;
    }

    let original_type = original_icmp_bytes[0];
    let original_id = u16::from_be_bytes([original_icmp_bytes[4], original_icmp_bytes[5]]);
    let original_seq = u16::from_be_bytes([original_icmp_bytes[6], original_icmp_bytes[7]]);
    if original_type != IcmpTypes::EchoRequest.0
        || original_id != probe.identifier
        || original_seq != probe.sequence
    {
        return None;
    }

    let code = icmp_packet.get_icmp_code().0;
    Some(match icmp_type {
        IcmpTypes::TimeExceeded => ResponseType::TimeExceeded,
        IcmpTypes::DestinationUnreachable => ResponseType::DestinationUnreachable(code),
        other => ResponseType::Other {
            icmp_type: other.0,
            code,
        },
    })
}

impl ProbeSocket for RawIcmpV4Socket {
    fn ip_version(&self) -> IpVersion {
        IpVersion::V4
    }

    fn send_probe(&mut self, target: IpAddr, probe: &ProbeInfo) -> Result<()> {
        let target_v4 = match target {
            IpAddr::V4(v4) => v4,
            IpAddr::V6(_) => {
                return Err(anyhow::anyhow!("IPv6 target not supported by IPv4 socket"))
            }
        };

        self.socket
            .set_ttl_v4(probe.ttl as u32)
            .context("Failed to set TTL")?;

        let packet = build_echo_request(probe)?;
        let target_addr = SocketAddr::V4(SocketAddrV4::new(target_v4, 0));
        self.socket
            .send_to(&packet, &target_addr.into())
            .context("Failed to send ICMP packet")?;

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
                    let from_addr = match socket_addr.as_socket_ipv4() {
                        Some(s) => IpAddr::V4(*s.ip()),
                        None => continue,
                    };

                    let initialized_part: &[MaybeUninit<u8>] = &recv_buf[..size];
                    // SAFETY: recv_from initialized the first `size` bytes.
                    let packet_data: &[u8] =
                        unsafe { &*(initialized_part as *const [MaybeUninit<u8>] as *const [u8]) };

                    match parse_reply(packet_data, probe) {
                        Some(response_type) => {
                            return Ok(Some(ProbeResponse {
                                from_addr,
                                response_type,
                                rtt: recv_time.duration_since(probe.sent_at),
                            }));
                        }
                        None => trace!(%from_addr, size, "ignoring unrelated ICMP datagram"),
                    }
                }
                Err(e)
                    if e.kind() == std::io::ErrorKind::WouldBlock
                        || e.kind() == std::io::ErrorKind::TimedOut =>
                {
                    continue;
                }
                Err(e) => return Err(e).context("Failed to receive ICMP packet"),
            }
        }
    }
}
