use std::{
    sync::{Arc, Weak},
    time::Duration,
};

use tokio::{
    sync::{Mutex, broadcast},
    task::JoinHandle,
    time::{Instant, MissedTickBehavior, interval_at},
};
use tracing::debug;

use crate::{
    outcome::Outcome,
    state::{
        poll::Candidate,
        selection::{REEL_COUNT, ReelFrame, SelectionChange, SelectionEngine, SelectionSnapshot},
    },
};

/// Default period between two advances of a spinning reel.
pub const DEFAULT_TICK: Duration = Duration::from_millis(180);

const EVENT_CAPACITY: usize = 64;

/// Notifications emitted by the driver.
#[derive(Debug, Clone)]
pub enum SelectionEvent {
    /// A spinning reel moved one position.
    Frame(ReelFrame),
    /// An operation changed the machine.
    Changed(SelectionSnapshot),
}

/// Owns the [`SelectionEngine`] and the per-reel advance timers.
///
/// Every operation locks the engine, applies itself, then reconciles timers: a reel that
/// is not spinning has no timer, and a reel that starts spinning gets a fresh one after
/// its previous timer (if any) was aborted.
#[derive(Clone)]
pub struct ReelDriver {
    inner: Arc<DriverInner>,
}

struct DriverInner {
    machine: Mutex<Machine>,
    events: broadcast::Sender<SelectionEvent>,
    tick: Duration,
}

struct Machine {
    engine: SelectionEngine,
    timers: [Option<JoinHandle<()>>; REEL_COUNT],
}

impl ReelDriver {
    /// Wrap an engine, advancing spinning reels every `tick`.
    pub fn new(engine: SelectionEngine, tick: Duration) -> Self {
        let (events, _rx) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(DriverInner {
                machine: Mutex::new(Machine {
                    engine,
                    timers: [None, None, None],
                }),
                events,
                tick,
            }),
        }
    }

    /// Listen to frames and changes.
    pub fn subscribe(&self) -> broadcast::Receiver<SelectionEvent> {
        self.inner.events.subscribe()
    }

    /// Install freshly loaded candidates (or the load failure).
    pub async fn load_candidates(
        &self,
        loaded: Result<Vec<Candidate>, String>,
    ) -> Outcome<SelectionChange> {
        self.apply(&[0, 1, 2], |engine| engine.load_candidates(loaded))
            .await
    }

    /// Spin all reels.
    pub async fn start_spin(&self) -> Outcome<SelectionChange> {
        self.apply(&[0, 1, 2], SelectionEngine::start_spin).await
    }

    /// Stop one reel.
    pub async fn stop_reel(&self, reel: usize) -> Outcome<SelectionChange> {
        self.apply(&[], |engine| engine.stop_reel(reel)).await
    }

    /// Respin one stopped reel.
    pub async fn respin_reel(&self, reel: usize) -> Outcome<SelectionChange> {
        self.apply(&[reel], |engine| engine.respin_reel(reel)).await
    }

    /// Return every reel to idle.
    pub async fn reset(&self) -> Outcome<SelectionChange> {
        self.apply(&[], SelectionEngine::reset).await
    }

    /// Current view of the machine.
    pub async fn snapshot(&self) -> SelectionSnapshot {
        self.inner.machine.lock().await.engine.snapshot()
    }

    /// The landed triple, once every reel stopped.
    pub async fn preview(&self) -> Option<Vec<Candidate>> {
        self.inner.machine.lock().await.engine.preview()
    }

    /// Abort every reel timer.
    pub async fn shutdown(&self) {
        let mut machine = self.inner.machine.lock().await;
        for timer in machine.timers.iter_mut() {
            if let Some(handle) = timer.take() {
                handle.abort();
            }
        }
    }

    /// Number of reel timers currently running.
    pub async fn active_timers(&self) -> usize {
        let machine = self.inner.machine.lock().await;
        machine
            .timers
            .iter()
            .flatten()
            .filter(|handle| !handle.is_finished())
            .count()
    }

    async fn apply<F>(&self, restart: &[usize], op: F) -> Outcome<SelectionChange>
    where
        F: FnOnce(&mut SelectionEngine) -> Outcome<SelectionChange>,
    {
        let mut machine = self.inner.machine.lock().await;
        let outcome = op(&mut machine.engine);
        let restart = if outcome.is_applied() { restart } else { &[] };
        self.sync_timers(&mut machine, restart);
        if outcome.is_applied() {
            let _ = self
                .inner
                .events
                .send(SelectionEvent::Changed(machine.engine.snapshot()));
        }
        outcome
    }

    fn sync_timers(&self, machine: &mut Machine, restart: &[usize]) {
        let spinning = machine.engine.spinning_reels();
        for (reel, timer) in machine.timers.iter_mut().enumerate() {
            let stale = timer.as_ref().is_some_and(JoinHandle::is_finished);
            if !spinning[reel] || restart.contains(&reel) || stale {
                if let Some(handle) = timer.take() {
                    handle.abort();
                }
            }
            if spinning[reel] && timer.is_none() {
                debug!(reel, "starting reel timer");
                *timer = Some(spawn_reel_timer(
                    Arc::downgrade(&self.inner),
                    reel,
                    self.inner.tick,
                ));
            }
        }
    }
}

fn spawn_reel_timer(inner: Weak<DriverInner>, reel: usize, tick: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + tick, tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            let Some(inner) = inner.upgrade() else {
                break;
            };
            let frame = inner.machine.lock().await.engine.advance(reel);
            match frame {
                Some(frame) => {
                    let _ = inner.events.send(SelectionEvent::Frame(frame));
                }
                None => break,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};
    use tokio::time::timeout;

    use super::*;
    use crate::{dao::local_store::MemoryLocalStore, outcome::Skip};

    fn driver(tick: Duration) -> ReelDriver {
        let engine =
            SelectionEngine::with_rng(Arc::new(MemoryLocalStore::new()), StdRng::seed_from_u64(11));
        ReelDriver::new(engine, tick)
    }

    fn candidates() -> Vec<Candidate> {
        ["A", "B", "C", "D"]
            .into_iter()
            .map(|title| Candidate::new(title, "someone"))
            .collect()
    }

    #[tokio::test]
    async fn spinning_reels_emit_frames_until_stopped() {
        let driver = driver(Duration::from_millis(5));
        let _ = driver.load_candidates(Ok(candidates())).await;
        let mut events = driver.subscribe();

        assert!(driver.start_spin().await.is_applied());
        assert_eq!(driver.active_timers().await, REEL_COUNT);

        let frame = timeout(Duration::from_secs(2), async {
            loop {
                if let Ok(SelectionEvent::Frame(frame)) = events.recv().await {
                    break frame;
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(frame.window.len(), 5);

        for reel in 0..REEL_COUNT {
            assert!(driver.stop_reel(reel).await.is_applied());
        }
        assert_eq!(driver.active_timers().await, 0);
        assert!(driver.snapshot().await.ready);
    }

    #[tokio::test]
    async fn respin_restarts_only_that_reel() {
        let driver = driver(Duration::from_secs(60));
        let _ = driver.load_candidates(Ok(candidates())).await;
        let _ = driver.start_spin().await;
        for reel in 0..REEL_COUNT {
            let _ = driver.stop_reel(reel).await;
        }

        assert!(driver.respin_reel(2).await.is_applied());
        assert_eq!(driver.active_timers().await, 1);
        assert_eq!(driver.respin_reel(2).await.skipped(), Some(Skip::ReelSpinning));
        assert_eq!(driver.active_timers().await, 1);
    }

    #[tokio::test]
    async fn reset_and_shutdown_cancel_timers() {
        let driver = driver(Duration::from_secs(60));
        let _ = driver.load_candidates(Ok(candidates())).await;
        let _ = driver.start_spin().await;
        assert!(driver.reset().await.is_applied());
        assert_eq!(driver.active_timers().await, 0);

        let _ = driver.start_spin().await;
        driver.shutdown().await;
        assert_eq!(driver.active_timers().await, 0);
    }
}
