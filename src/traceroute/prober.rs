//! One TTL round: send `count` echo probes and gather the replies

use crate::socket::{ProbeInfo, ProbeSocket, ResponseType};
use crate::traceroute::HopResult;
use std::net::IpAddr;
use std::time::{Duration, Instant};
use tracing::debug;

/// Sends probe rounds over an exclusively owned transport
///
/// Every probe carries the same identifier. Sequence numbers come from a
/// counter that keeps running across rounds, so a late reply to an earlier
/// TTL is never taken for the current probe.
pub struct Prober<S: ProbeSocket> {
    socket: S,
    identifier: u16,
    next_sequence: u16,
    probes_sent: u64,
}

impl<S: ProbeSocket> Prober<S> {
    /// Create a prober over `socket` using `identifier` for every probe
    pub fn new(socket: S, identifier: u16) -> Self {
        Self {
            socket,
            identifier,
            next_sequence: 0,
            probes_sent: 0,
        }
    }

    /// Total number of probes handed to the transport so far
    pub fn probes_sent(&self) -> u64 {
        self.probes_sent
    }

    /// Run one round of `count` probes at `ttl` toward `target`
    ///
    /// Sequence numbers are not restarted at 0 for each round. They continue
    /// from the previous round, wrapping at `u16::MAX`, so the `count` probes
    /// of a round still carry distinct values and a reply that arrives after
    /// its own round timed out cannot match a probe of the current round.
    ///
    /// Timeouts never end a round early. An echo reply marks the result as
    /// reached and the remaining probes are still sent; once reached, the
    /// destination stays the hop address. A send failure,
    /// receive failure or ICMP error other than time exceeded aborts the
    /// round, and whatever was gathered up to then is returned.
    pub fn probe_round(
        &mut self,
        target: IpAddr,
        ttl: u8,
        count: u16,
        timeout: Duration,
        interval: Duration,
    ) -> HopResult {
        let mut result = HopResult::miss(ttl, 0);

        for _ in 0..count {
            let sequence = self.next_sequence;
            self.next_sequence = self.next_sequence.wrapping_add(1);

            let probe = ProbeInfo {
                ttl,
                identifier: self.identifier,
                sequence,
                sent_at: Instant::now(),
            };

            if let Err(e) = self.socket.send_probe(target, &probe) {
                debug!(ttl, sequence, "send failed, aborting round: {:#}", e);
                result.aborted = true;
                break;
            }
            result.packets_sent += 1;
            self.probes_sent += 1;

            let response = match self.socket.recv_response(&probe, timeout) {
                Ok(response) => response,
                Err(e) => {
                    debug!(ttl, sequence, "receive failed, aborting round: {:#}", e);
                    result.aborted = true;
                    break;
                }
            };

            let Some(response) = response else {
                debug!(ttl, sequence, "timed out");
                pause(interval);
                continue;
            };

            match response.response_type {
                ResponseType::TimeExceeded => {
                    debug!(ttl, sequence, from = %response.from_addr, rtt = ?response.rtt, "time exceeded");
                    result.rtts.push(response.rtt);
                    if !result.reached {
                        result.addr = Some(response.from_addr);
                    }
                    pause(interval);
                }
                ResponseType::EchoReply => {
                    debug!(ttl, sequence, from = %response.from_addr, rtt = ?response.rtt, "echo reply");
                    result.rtts.push(response.rtt);
                    result.addr = Some(response.from_addr);
                    result.reached = true;
                }
                other => {
                    debug!(ttl, sequence, from = %response.from_addr, "{:?}, aborting round", other);
                    result.rtts.push(response.rtt);
                    if !result.reached {
                        result.addr = Some(response.from_addr);
                    }
                    result.aborted = true;
                    break;
                }
            }
        }

        result
    }
}

fn pause(interval: Duration) {
    if !interval.is_zero() {
        std::thread::sleep(interval);
    }
}
