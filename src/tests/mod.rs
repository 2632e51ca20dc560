//! Test doubles and end-to-end tests of the probing core

use crate::dns::NameResolver;
use crate::socket::{IpVersion, ProbeInfo, ProbeResponse, ProbeSocket, ResponseType};
use crate::traceroute::TracerouteError;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::net::IpAddr;
use std::rc::Rc;
use std::time::Duration;

/// What the scripted network does with the next probe
#[derive(Debug, Clone)]
pub(crate) enum Step {
    Reply(IpAddr, ResponseType, Duration),
    Timeout,
    SendError,
    RecvError,
}

/// A transport that plays back a fixed script
///
/// Every probe consumes one step. Once the script runs out, all probes time
/// out.
pub(crate) struct ScriptedSocket {
    version: IpVersion,
    steps: VecDeque<Step>,
    sent: Rc<RefCell<Vec<ProbeInfo>>>,
    closed: Rc<Cell<bool>>,
}

impl ScriptedSocket {
    pub(crate) fn v4(steps: Vec<Step>) -> Self {
        Self::new(IpVersion::V4, steps)
    }

    pub(crate) fn v6(steps: Vec<Step>) -> Self {
        Self::new(IpVersion::V6, steps)
    }

    fn new(version: IpVersion, steps: Vec<Step>) -> Self {
        Self {
            version,
            steps: steps.into(),
            sent: Rc::new(RefCell::new(Vec::new())),
            closed: Rc::new(Cell::new(false)),
        }
    }

    /// Shared log of every probe handed to the transport
    pub(crate) fn sent_log(&self) -> Rc<RefCell<Vec<ProbeInfo>>> {
        Rc::clone(&self.sent)
    }

    /// Flag set once the socket has been dropped
    pub(crate) fn closed_flag(&self) -> Rc<Cell<bool>> {
        Rc::clone(&self.closed)
    }
}

impl Drop for ScriptedSocket {
    fn drop(&mut self) {
        self.closed.set(true);
    }
}

impl ProbeSocket for ScriptedSocket {
    fn ip_version(&self) -> IpVersion {
        self.version
    }

    fn send_probe(&mut self, _target: IpAddr, probe: &ProbeInfo) -> anyhow::Result<()> {
        if matches!(self.steps.front(), Some(Step::SendError)) {
            self.steps.pop_front();
            anyhow::bail!("network is unreachable");
        }
        self.sent.borrow_mut().push(probe.clone());
        Ok(())
    }

    fn recv_response(
        &mut self,
        _probe: &ProbeInfo,
        _timeout: Duration,
    ) -> anyhow::Result<Option<ProbeResponse>> {
        match self.steps.pop_front() {
            Some(Step::Reply(from_addr, response_type, rtt)) => Ok(Some(ProbeResponse {
                from_addr,
                response_type,
                rtt,
            })),
            Some(Step::RecvError) => anyhow::bail!("connection refused"),
            Some(Step::Timeout) | Some(Step::SendError) | None => Ok(None),
        }
    }
}

pub(crate) fn hop(ip: &str, ms: u64) -> Step {
    Step::Reply(
        ip.parse().unwrap(),
        ResponseType::TimeExceeded,
        Duration::from_millis(ms),
    )
}

pub(crate) fn echo(ip: &str, ms: u64) -> Step {
    Step::Reply(
        ip.parse().unwrap(),
        ResponseType::EchoReply,
        Duration::from_millis(ms),
    )
}

/// Resolver returning a canned answer
pub(crate) struct FakeResolver {
    answer: Option<Vec<IpAddr>>,
    last_family: Cell<Option<IpVersion>>,
}

impl FakeResolver {
    pub(crate) fn with(addresses: Vec<IpAddr>) -> Self {
        Self {
            answer: Some(addresses),
            last_family: Cell::new(None),
        }
    }

    pub(crate) fn failing() -> Self {
        Self {
            answer: None,
            last_family: Cell::new(None),
        }
    }

    pub(crate) fn last_family(&self) -> Option<IpVersion> {
        self.last_family.get()
    }
}

impl NameResolver for FakeResolver {
    fn resolve(
        &self,
        host: &str,
        family: Option<IpVersion>,
    ) -> Result<Vec<IpAddr>, TracerouteError> {
        self.last_family.set(family);
        self.answer
            .clone()
            .ok_or_else(|| TracerouteError::ResolutionError(host.to_string()))
    }
}

#[cfg(test)]
mod prober_tests {
    use super::*;
    use crate::traceroute::Prober;
    use std::time::Instant;

    const TARGET: &str = "203.0.113.9";
    const TIMEOUT: Duration = Duration::from_secs(1);

    fn target() -> IpAddr {
        TARGET.parse().unwrap()
    }

    #[test]
    fn test_all_timeouts_is_a_miss() {
        let socket = ScriptedSocket::v4(vec![Step::Timeout, Step::Timeout, Step::Timeout]);
        let mut prober = Prober::new(socket, 42);

        let result = prober.probe_round(target(), 4, 3, TIMEOUT, Duration::ZERO);
        assert!(result.is_miss());
        assert_eq!(result.ttl, 4);
        assert_eq!(result.packets_sent, 3);
        assert!(result.rtts.is_empty());
        assert!(!result.reached);
        assert!(!result.aborted);
    }

    #[test]
    fn test_partial_replies_keep_order() {
        let socket = ScriptedSocket::v4(vec![
            hop("10.0.0.1", 12),
            Step::Timeout,
            hop("10.0.0.1", 15),
        ]);
        let mut prober = Prober::new(socket, 42);

        let result = prober.probe_round(target(), 2, 3, TIMEOUT, Duration::ZERO);
        assert_eq!(result.packets_sent, 3);
        assert_eq!(
            result.rtts,
            vec![Duration::from_millis(12), Duration::from_millis(15)]
        );
        assert_eq!(result.addr, Some("10.0.0.1".parse().unwrap()));
        assert!(!result.reached);
    }

    #[test]
    fn test_last_responder_wins() {
        let socket = ScriptedSocket::v4(vec![hop("10.0.0.1", 5), hop("10.0.0.2", 6)]);
        let mut prober = Prober::new(socket, 42);

        let result = prober.probe_round(target(), 2, 2, TIMEOUT, Duration::ZERO);
        assert_eq!(result.addr, Some("10.0.0.2".parse().unwrap()));
    }

    #[test]
    fn test_echo_reply_marks_reached_and_finishes_round() {
        let socket = ScriptedSocket::v4(vec![echo(TARGET, 20), echo(TARGET, 22)]);
        let log = socket.sent_log();
        let mut prober = Prober::new(socket, 42);

        let result = prober.probe_round(target(), 7, 2, TIMEOUT, Duration::ZERO);
        assert!(result.reached);
        assert_eq!(result.addr, Some(target()));
        assert_eq!(result.packets_sent, 2);
        assert_eq!(result.rtts.len(), 2);
        assert_eq!(log.borrow().len(), 2);
    }

    #[test]
    fn test_icmp_error_aborts_round_but_keeps_data() {
        let socket = ScriptedSocket::v4(vec![
            hop("10.0.0.1", 8),
            Step::Reply(
                "10.0.0.1".parse().unwrap(),
                ResponseType::DestinationUnreachable(1),
                Duration::from_millis(9),
            ),
            hop("10.0.0.1", 10),
        ]);
        let log = socket.sent_log();
        let mut prober = Prober::new(socket, 42);

        let result = prober.probe_round(target(), 5, 3, TIMEOUT, Duration::ZERO);
        assert!(result.aborted);
        assert!(!result.reached);
        assert_eq!(result.packets_sent, 2);
        assert_eq!(result.rtts.len(), 2);
        assert_eq!(log.borrow().len(), 2);
    }

    #[test]
    fn test_send_failure_aborts_without_counting() {
        let socket = ScriptedSocket::v4(vec![hop("10.0.0.1", 8), Step::SendError]);
        let mut prober = Prober::new(socket, 42);

        let result = prober.probe_round(target(), 5, 3, TIMEOUT, Duration::ZERO);
        assert!(result.aborted);
        assert_eq!(result.packets_sent, 1);
        assert_eq!(result.rtts.len(), 1);
        assert_eq!(prober.probes_sent(), 1);
    }

    #[test]
    fn test_receive_failure_on_first_probe_is_aborted_miss() {
        let socket = ScriptedSocket::v4(vec![Step::RecvError]);
        let mut prober = Prober::new(socket, 42);

        let result = prober.probe_round(target(), 1, 3, TIMEOUT, Duration::ZERO);
        assert!(result.is_miss());
        assert!(result.aborted);
        assert_eq!(result.packets_sent, 1);
    }

    #[test]
    fn test_probes_carry_identifier_ttl_and_fresh_sequences() {
        let socket = ScriptedSocket::v4(vec![]);
        let log = socket.sent_log();
        let mut prober = Prober::new(socket, 0xbeef);

        prober.probe_round(target(), 1, 2, TIMEOUT, Duration::ZERO);
        prober.probe_round(target(), 2, 2, TIMEOUT, Duration::ZERO);

        let sent = log.borrow();
        assert_eq!(sent.len(), 4);
        assert!(sent.iter().all(|p| p.identifier == 0xbeef));
        let ttls: Vec<u8> = sent.iter().map(|p| p.ttl).collect();
        assert_eq!(ttls, vec![1, 1, 2, 2]);
        let sequences: Vec<u16> = sent.iter().map(|p| p.sequence).collect();
        assert_eq!(sequences, vec![0, 1, 2, 3]);
        assert_eq!(prober.probes_sent(), 4);
    }

    #[test]
    fn test_sequences_wrap_and_stay_distinct_within_round() {
        let socket = ScriptedSocket::v4(vec![]);
        let log = socket.sent_log();
        let mut prober = Prober::new(socket, 7);

        prober.probe_round(target(), 1, u16::MAX, TIMEOUT, Duration::ZERO);
        prober.probe_round(target(), 2, 3, TIMEOUT, Duration::ZERO);

        let sent = log.borrow();
        let last_round: Vec<u16> = sent
            .iter()
            .filter(|p| p.ttl == 2)
            .map(|p| p.sequence)
            .collect();
        assert_eq!(last_round, vec![u16::MAX, 0, 1]);
    }

    #[test]
    fn test_interval_after_timeouts() {
        let socket = ScriptedSocket::v4(vec![Step::Timeout, Step::Timeout]);
        let mut prober = Prober::new(socket, 1);

        let start = Instant::now();
        prober.probe_round(target(), 1, 2, TIMEOUT, Duration::from_millis(30));
        assert!(start.elapsed() >= Duration::from_millis(60));
    }

    #[test]
    fn test_no_interval_after_echo_reply() {
        let socket = ScriptedSocket::v4(vec![echo(TARGET, 1)]);
        let mut prober = Prober::new(socket, 1);

        let start = Instant::now();
        let result = prober.probe_round(target(), 1, 1, TIMEOUT, Duration::from_secs(10));
        assert!(result.reached);
        assert!(start.elapsed() < Duration::from_secs(10));
    }
}

#[cfg(test)]
mod scanner_tests {
    use super::*;
    use crate::traceroute::{HopResult, HopScanner};

    const TARGET: &str = "198.51.100.20";

    fn scanner(
        socket: ScriptedSocket,
        initial_ttl: u8,
        max_hops: u8,
        count: u16,
    ) -> HopScanner<ScriptedSocket> {
        HopScanner::new(
            socket,
            TARGET.parse().unwrap(),
            4242,
            initial_ttl,
            max_hops,
            count,
            Duration::from_secs(1),
            Duration::ZERO,
        )
    }

    fn ttls(results: &[HopResult]) -> Vec<u8> {
        results.iter().map(|r| r.ttl).collect()
    }

    #[test]
    fn test_reached_at_third_hop() {
        let socket = ScriptedSocket::v4(vec![
            hop("192.168.1.1", 1),
            hop("10.10.0.1", 5),
            echo(TARGET, 12),
        ]);
        let mut scan = scanner(socket, 1, 30, 1);
        let results: Vec<HopResult> = scan.by_ref().collect();

        assert_eq!(ttls(&results), vec![1, 2, 3]);
        assert!(!results[0].reached && !results[1].reached);
        assert_eq!(results[0].addr, Some("192.168.1.1".parse().unwrap()));
        assert_eq!(results[1].addr, Some("10.10.0.1".parse().unwrap()));
        assert!(results[2].reached);
        assert_eq!(results[2].addr, Some(TARGET.parse().unwrap()));
        assert!(scan.session().reached);
        assert!(scan.next().is_none());
    }

    #[test]
    fn test_unreachable_exhausts_max_hops() {
        let socket = ScriptedSocket::v4(vec![
            hop("192.168.1.1", 1),
            Step::Timeout,
            hop("10.10.0.1", 5),
        ]);
        let scan = scanner(socket, 1, 5, 1);
        let results: Vec<HopResult> = scan.collect();

        assert_eq!(ttls(&results), vec![1, 2, 3, 4, 5]);
        assert!(results.iter().all(|r| !r.reached));
        assert!(results[1].is_miss());
        assert!(results[3].is_miss() && results[4].is_miss());
    }

    #[test]
    fn test_starts_at_initial_ttl() {
        let socket = ScriptedSocket::v4(vec![hop("10.0.0.1", 3), echo(TARGET, 4)]);
        let log = socket.sent_log();
        let results: Vec<HopResult> = scanner(socket, 6, 30, 1).collect();

        assert_eq!(ttls(&results), vec![6, 7]);
        assert_eq!(log.borrow()[0].ttl, 6);
    }

    #[test]
    fn test_single_round_when_initial_equals_max() {
        let results: Vec<HopResult> = scanner(ScriptedSocket::v4(vec![]), 9, 9, 2).collect();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].ttl, 9);
        assert_eq!(results[0].packets_sent, 2);
    }

    #[test]
    fn test_max_ttl_255_terminates() {
        let results: Vec<HopResult> = scanner(ScriptedSocket::v4(vec![]), 250, 255, 1).collect();
        assert_eq!(ttls(&results), vec![250, 251, 252, 253, 254, 255]);
    }

    #[test]
    fn test_two_of_three_replies() {
        let socket = ScriptedSocket::v4(vec![
            hop("10.0.0.1", 10),
            Step::Timeout,
            hop("10.0.0.1", 11),
        ]);
        let mut scan = scanner(socket, 1, 1, 3);
        let result = scan.next().unwrap();

        assert_eq!(result.packets_sent, 3);
        assert_eq!(result.rtts.len(), 2);
        assert!(scan.next().is_none());
    }

    #[test]
    fn test_aborted_round_does_not_stop_scan() {
        let socket = ScriptedSocket::v4(vec![
            Step::Reply(
                "10.0.0.1".parse().unwrap(),
                ResponseType::Other {
                    icmp_type: 12,
                    code: 0,
                },
                Duration::from_millis(4),
            ),
            echo(TARGET, 9),
        ]);
        let results: Vec<HopResult> = scanner(socket, 1, 30, 1).collect();

        assert_eq!(results.len(), 2);
        assert!(results[0].aborted);
        assert!(results[1].reached);
    }

    #[test]
    fn test_identifier_is_stable_across_scan() {
        let socket = ScriptedSocket::v4(vec![]);
        let log = socket.sent_log();
        let scan = scanner(socket, 1, 4, 2);
        assert_eq!(scan.count(), 4);

        let sent = log.borrow();
        assert_eq!(sent.len(), 8);
        assert!(sent.iter().all(|p| p.identifier == 4242));
    }

    #[test]
    fn test_dropping_scanner_closes_transport() {
        let socket = ScriptedSocket::v6(vec![]);
        let closed = socket.closed_flag();
        let mut scan = HopScanner::new(
            socket,
            "2001:db8::1".parse().unwrap(),
            1,
            1,
            30,
            1,
            Duration::from_secs(1),
            Duration::ZERO,
        );
        assert_eq!(scan.session().ip_version, IpVersion::V6);

        let first_two: Vec<HopResult> = scan.by_ref().take(2).collect();
        assert_eq!(first_two.len(), 2);
        assert_eq!(scan.probes_sent(), 2);
        assert!(!closed.get());

        drop(scan);
        assert!(closed.get());
    }

    #[test]
    fn test_size_hint_bounds() {
        let mut scan = scanner(ScriptedSocket::v4(vec![]), 1, 3, 1);
        assert_eq!(scan.size_hint(), (1, Some(3)));
        scan.next();
        assert_eq!(scan.size_hint(), (1, Some(2)));
        scan.by_ref().for_each(drop);
        assert_eq!(scan.size_hint(), (0, Some(0)));
    }
}
