use crate::infrastructure::transport::LatencyProbe;
use lanlobby_core::MemberId;
use std::collections::HashMap;
use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

/// Lifecycle of a single RTT probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeStatus {
    Pending,
    Completed,
    /// A newer cycle replaced it before it answered; its result is discarded
    Superseded,
}

/// One in-flight RTT measurement, owned by the prober for a single cycle
#[derive(Debug)]
pub struct PingProbe {
    target_id: MemberId,
    cycle: u64,
    status: ProbeStatus,
    outcome: oneshot::Receiver<Duration>,
    token: CancellationToken,
}

impl PingProbe {
    pub fn target_id(&self) -> MemberId {
        self.target_id
    }

    /// Broadcast cycle that issued this probe
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    pub fn status(&self) -> ProbeStatus {
        self.status
    }

    fn supersede(&mut self) {
        self.status = ProbeStatus::Superseded;
        self.token.cancel();
    }
}

/// What one harvest collected
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ProbeHarvest {
    pub completed: Vec<(MemberId, Duration)>,
    pub superseded: Vec<MemberId>,
}

/// Host-side RTT measurement, one probe in flight per member
///
/// Each cycle first harvests what the previous cycle's probes produced and
/// then launches fresh ones. A probe that has not answered by harvest time is
/// superseded: its receiver is dropped, so a late answer has nowhere to go and
/// can never overwrite a newer measurement.
pub struct LivenessProber {
    probe: Arc<dyn LatencyProbe>,
    in_flight: HashMap<MemberId, PingProbe>,
    cycle: u64,
    cancel: CancellationToken,
}

impl fmt::Debug for LivenessProber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LivenessProber")
            .field("in_flight", &self.in_flight.len())
            .field("cycle", &self.cycle)
            .finish()
    }
}

impl LivenessProber {
    pub fn new(probe: Arc<dyn LatencyProbe>) -> Self {
        Self {
            probe,
            in_flight: HashMap::new(),
            cycle: 0,
            cancel: CancellationToken::new(),
        }
    }

    /// Tie all future probes to `parent`; cancelling it stops them
    pub fn attach(&mut self, parent: &CancellationToken) {
        self.cancel = parent.child_token();
    }

    /// Collect finished probes and supersede the rest
    pub fn harvest(&mut self) -> ProbeHarvest {
        let mut harvest = ProbeHarvest::default();

        for (id, mut probe) in self.in_flight.drain() {
            match probe.outcome.try_recv() {
                Ok(rtt) => {
                    probe.status = ProbeStatus::Completed;
                    harvest.completed.push((id, rtt));
                }
                Err(_) => {
                    probe.supersede();
                    tracing::debug!(member = %id, cycle = probe.cycle, "Probe superseded");
                    harvest.superseded.push(id);
                }
            }
        }

        harvest
    }

    /// Start a new cycle with one probe per target
    pub fn launch(&mut self, targets: impl IntoIterator<Item = (MemberId, IpAddr)>) {
        self.cycle += 1;

        for (target_id, target_address) in targets {
            let (tx, rx) = oneshot::channel();
            let token = self.cancel.child_token();

            let probe = Arc::clone(&self.probe);
            let task_token = token.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = task_token.cancelled() => {}
                    rtt = probe.probe(target_id, target_address) => {
                        if let Some(rtt) = rtt {
                            // Receiver gone means the probe was superseded
                            let _ = tx.send(rtt);
                        }
                    }
                }
            });

            let fresh = PingProbe {
                target_id,
                cycle: self.cycle,
                status: ProbeStatus::Pending,
                outcome: rx,
                token,
            };

            if let Some(mut stale) = self.in_flight.insert(target_id, fresh) {
                stale.supersede();
            }
        }

        tracing::trace!(cycle = self.cycle, in_flight = self.in_flight.len(), "Probes launched");
    }

    /// Drop the probe of a departed member
    pub fn forget(&mut self, id: MemberId) {
        if let Some(mut probe) = self.in_flight.remove(&id) {
            probe.supersede();
        }
    }

    /// Cancel every in-flight probe without waiting for it
    pub fn cancel_all(&mut self) {
        self.cancel.cancel();
        self.in_flight.clear();
        self.cancel = CancellationToken::new();
    }

    pub fn in_flight(&self) -> impl Iterator<Item = &PingProbe> {
        self.in_flight.values()
    }

    pub fn cycle(&self) -> u64 {
        self.cycle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::net::Ipv4Addr;
    use std::sync::Mutex;

    /// Answers each call after the next scripted delay; `None` never answers
    struct ScriptedProbe {
        delays: Mutex<VecDeque<Option<Duration>>>,
    }

    impl ScriptedProbe {
        fn new(delays: impl IntoIterator<Item = Option<Duration>>) -> Arc<Self> {
            Arc::new(Self {
                delays: Mutex::new(delays.into_iter().collect()),
            })
        }
    }

    #[async_trait]
    impl LatencyProbe for ScriptedProbe {
        async fn probe(&self, _target: MemberId, _address: IpAddr) -> Option<Duration> {
            let next = self.delays.lock().unwrap().pop_front().flatten();
            match next {
                Some(delay) => {
                    tokio::time::sleep(delay).await;
                    Some(delay)
                }
                None => std::future::pending().await,
            }
        }
    }

    fn target() -> (MemberId, IpAddr) {
        (MemberId::new(), IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2)))
    }

    #[tokio::test(start_paused = true)]
    async fn test_completed_probe_is_harvested() {
        let mut prober = LivenessProber::new(ScriptedProbe::new([Some(Duration::from_millis(40))]));
        let (id, addr) = target();

        prober.launch([(id, addr)]);
        tokio::time::sleep(Duration::from_secs(1)).await;
        let harvest = prober.harvest();

        assert_eq!(harvest.completed, vec![(id, Duration::from_millis(40))]);
        assert!(harvest.superseded.is_empty());
        assert_eq!(prober.in_flight().count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_probe_cannot_overwrite_newer_result() {
        let probe = ScriptedProbe::new([
            Some(Duration::from_secs(5)),
            Some(Duration::from_millis(10)),
        ]);
        let mut prober = LivenessProber::new(probe);
        let (id, addr) = target();

        // Cycle N: slow probe
        prober.launch([(id, addr)]);
        tokio::time::sleep(Duration::from_secs(1)).await;
        let first = prober.harvest();
        assert_eq!(first.superseded, vec![id]);

        // Cycle N+1: fast probe
        prober.launch([(id, addr)]);
        tokio::time::sleep(Duration::from_secs(1)).await;
        let second = prober.harvest();
        assert_eq!(second.completed, vec![(id, Duration::from_millis(10))]);

        // Well past the slow probe's answer time: nothing shows up
        prober.launch(std::iter::empty());
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(prober.harvest(), ProbeHarvest::default());
    }

    #[tokio::test(start_paused = true)]
    async fn test_lost_probe_is_superseded() {
        let mut prober = LivenessProber::new(ScriptedProbe::new([None]));
        let (id, addr) = target();

        prober.launch([(id, addr)]);
        let probe = prober.in_flight().next().unwrap();
        assert_eq!(probe.status(), ProbeStatus::Pending);
        assert_eq!(probe.cycle(), 1);

        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(prober.harvest().superseded, vec![id]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_forget_drops_only_that_member() {
        let probe = ScriptedProbe::new([
            Some(Duration::from_millis(5)),
            Some(Duration::from_millis(5)),
        ]);
        let mut prober = LivenessProber::new(probe);
        let (a, addr_a) = target();
        let (b, addr_b) = target();

        prober.launch([(a, addr_a), (b, addr_b)]);
        prober.forget(a);
        tokio::time::sleep(Duration::from_millis(50)).await;

        let harvest = prober.harvest();
        assert_eq!(harvest.completed.len(), 1);
        assert_eq!(harvest.completed[0].0, b);
    }

    #[tokio::test(start_paused = true)]
    async fn test_parent_cancellation_stops_probes() {
        let parent = CancellationToken::new();
        let mut prober = LivenessProber::new(ScriptedProbe::new([Some(Duration::from_millis(50))]));
        prober.attach(&parent);
        let (id, addr) = target();

        prober.launch([(id, addr)]);
        parent.cancel();
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(prober.harvest().superseded, vec![id]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_all_clears_in_flight() {
        let mut prober = LivenessProber::new(ScriptedProbe::new([None, None]));

        prober.launch([target(), target()]);
        prober.cancel_all();

        assert_eq!(prober.in_flight().count(), 0);
        assert_eq!(prober.harvest(), ProbeHarvest::default());
    }
}
