//! Core types for traceroute operations

use serde::Serialize;
use std::net::IpAddr;
use std::time::Duration;

/// Outcome of one TTL round
///
/// A round in which nothing answered is a miss: `addr` is `None` and `rtts`
/// is empty, but `packets_sent` still tells how many probes went out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HopResult {
    /// Time-to-live value of the round
    pub ttl: u8,
    /// Address of the last responder, or the destination when reached
    pub addr: Option<IpAddr>,
    /// Probes actually handed to the transport
    pub packets_sent: u16,
    /// Round-trip times in the order the replies arrived
    pub rtts: Vec<Duration>,
    /// The destination answered with an echo reply
    pub reached: bool,
    /// The round stopped early on a transport or ICMP error
    pub aborted: bool,
}

impl HopResult {
    /// A round without any reply
    pub fn miss(ttl: u8, packets_sent: u16) -> Self {
        Self {
            ttl,
            addr: None,
            packets_sent,
            rtts: Vec::new(),
            reached: false,
            aborted: false,
        }
    }

    /// True when no probe of the round got an answer
    pub fn is_miss(&self) -> bool {
        self.addr.is_none()
    }

    /// Number of replies
    pub fn packets_received(&self) -> usize {
        self.rtts.len()
    }

    /// Fraction of probes without a reply, from 0.0 to 1.0
    pub fn packet_loss(&self) -> f64 {
        if self.packets_sent == 0 {
            return 1.0;
        }
        let received = self.packets_received().min(self.packets_sent as usize);
        1.0 - received as f64 / self.packets_sent as f64
    }

    /// Mean round-trip time
    pub fn avg_rtt(&self) -> Option<Duration> {
        if self.rtts.is_empty() {
            return None;
        }
        let total: Duration = self.rtts.iter().sum();
        Some(total / self.rtts.len() as u32)
    }

    /// Fastest round-trip time
    pub fn min_rtt(&self) -> Option<Duration> {
        self.rtts.iter().min().copied()
    }

    /// Slowest round-trip time
    pub fn max_rtt(&self) -> Option<Duration> {
        self.rtts.iter().max().copied()
    }
}
