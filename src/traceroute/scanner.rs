//! Drives probe rounds over increasing TTLs

use crate::socket::{IpVersion, ProbeSocket};
use crate::traceroute::{HopResult, Prober};
use std::net::IpAddr;
use std::time::Duration;
use tracing::debug;

/// State of one scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanSession {
    /// Destination address
    pub target: IpAddr,
    /// Family fixed for the whole scan
    pub ip_version: IpVersion,
    /// Identifier shared by every probe
    pub identifier: u16,
    /// TTL of the next round
    pub ttl: u8,
    /// Last TTL that may be probed
    pub max_hops: u8,
    /// The destination answered
    pub reached: bool,
    /// No further rounds will run
    pub finished: bool,
}

/// Lazy hop-by-hop scan
///
/// Each call to [`Iterator::next`] runs one blocking round and yields its
/// result. The scan ends after the round in which the destination answered,
/// or after the round at `max_hops`. Dropping the scanner closes the
/// transport.
pub struct HopScanner<S: ProbeSocket> {
    prober: Prober<S>,
    session: ScanSession,
    count: u16,
    timeout: Duration,
    interval: Duration,
}

impl<S: ProbeSocket> HopScanner<S> {
    /// Create a scanner that starts at `initial_ttl`
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        socket: S,
        target: IpAddr,
        identifier: u16,
        initial_ttl: u8,
        max_hops: u8,
        count: u16,
        timeout: Duration,
        interval: Duration,
    ) -> Self {
        let ip_version = socket.ip_version();
        Self {
            prober: Prober::new(socket, identifier),
            session: ScanSession {
                target,
                ip_version,
                identifier,
                ttl: initial_ttl,
                max_hops,
                reached: false,
                finished: initial_ttl == 0 || initial_ttl > max_hops,
            },
            count,
            timeout,
            interval,
        }
    }

    /// Current scan state
    pub fn session(&self) -> &ScanSession {
        &self.session
    }

    /// Total number of probes sent so far
    pub fn probes_sent(&self) -> u64 {
        self.prober.probes_sent()
    }
}

impl<S: ProbeSocket> Iterator for HopScanner<S> {
    type Item = HopResult;

    fn next(&mut self) -> Option<HopResult> {
        if self.session.finished {
            return None;
        }

        let ttl = self.session.ttl;
        let result = self.prober.probe_round(
            self.session.target,
            ttl,
            self.count,
            self.timeout,
            self.interval,
        );

        if result.reached {
            debug!(ttl, target = %self.session.target, "destination reached");
            self.session.reached = true;
            self.session.finished = true;
        } else if ttl >= self.session.max_hops {
            debug!(ttl, "maximum hops exhausted");
            self.session.finished = true;
        } else {
            self.session.ttl = ttl + 1;
        }

        Some(result)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.session.finished {
            (0, Some(0))
        } else {
            let remaining = (self.session.max_hops - self.session.ttl) as usize + 1;
            (1, Some(remaining))
        }
    }
}

impl<S: ProbeSocket> std::iter::FusedIterator for HopScanner<S> {}
