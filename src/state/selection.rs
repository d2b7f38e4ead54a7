//! Three-reel slot machine that picks the nominees of the next poll.
//!
//! The engine is a plain value: it owns the candidate pool, the reels and the claimed
//! index set, and writes its session state to a [`LocalStore`] after every change.
//! Timing (the periodic advance of spinning reels) lives in
//! [`ReelDriver`](crate::state::reel_driver::ReelDriver).

use std::{collections::BTreeSet, sync::Arc};

use rand::{Rng, SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use utoipa::ToSchema;

use crate::{
    dao::local_store::LocalStore,
    outcome::{Outcome, Skip},
    state::poll::Candidate,
};

/// Number of reels on the machine.
pub const REEL_COUNT: usize = 3;
/// Smallest pool that allows a spin.
pub const MIN_CANDIDATES: usize = 3;
/// A stopped reel lands this many positions past its scroll offset.
pub const LANDING_LOOKAHEAD: usize = 2;
/// Titles rendered per spinning reel.
pub const WINDOW_SIZE: usize = 5;
/// Local store key holding [`SelectionSessionState`].
pub const SESSION_STATE_KEY: &str = "slotMachineState";
/// Local store key holding the preview triple once every reel stopped.
pub const PREVIEW_KEY: &str = "winners";

/// Where the candidate list currently stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CandidatePool {
    /// The feed has not answered yet.
    Loading,
    /// Candidates in feed order.
    Ready(Vec<Candidate>),
    /// The feed could not be loaded; every control is disabled.
    Failed(String),
}

/// Lifecycle of a single reel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ReelStatus {
    /// Waiting for a spin.
    #[default]
    Idle,
    /// Scrolling through the unclaimed candidates.
    Spinning,
    /// Landed on a candidate.
    Stopped,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct ReelState {
    status: ReelStatus,
    chosen_index: Option<usize>,
    scroll_offset: usize,
}

impl ReelState {
    fn is_spinning(&self) -> bool {
        self.status == ReelStatus::Spinning
    }
}

/// Selection state persisted across restarts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionSessionState {
    /// Whether a spin happened since the last reset.
    #[serde(alias = "spun")]
    pub has_spun: bool,
    /// Candidate index each reel landed on.
    #[serde(alias = "chosenIdxs")]
    pub chosen_indexes: [Option<usize>; REEL_COUNT],
}

/// A reel that just landed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Landing {
    /// Reel position, `0..3`.
    pub reel: usize,
    /// Index of the candidate in the feed.
    pub index: usize,
    /// The candidate itself.
    pub candidate: Candidate,
}

/// What an applied operation changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct SelectionChange {
    /// The previous selection is gone; any published poll no longer matches it.
    pub invalidates_poll: bool,
    /// Every reel is stopped on a distinct candidate.
    pub ready: bool,
    /// Set by `stop_reel`.
    pub landed: Option<Landing>,
}

/// Titles visible on a spinning reel after one advance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ReelFrame {
    /// Reel position, `0..3`.
    pub reel: usize,
    /// Scroll offset inside the unclaimed pool.
    pub offset: usize,
    /// Up to [`WINDOW_SIZE`] titles starting at `offset`.
    pub window: Vec<String>,
}

/// Pool status as exposed to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PoolStatus {
    /// Feed still loading.
    Loading,
    /// Candidates available.
    Ready,
    /// Feed failed to load.
    Failed,
}

/// Read-only view of one reel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ReelView {
    /// Reel position, `0..3`.
    pub reel: usize,
    /// Current status.
    pub status: ReelStatus,
    /// Index of the landed candidate.
    pub chosen_index: Option<usize>,
    /// Landed candidate.
    pub chosen: Option<Candidate>,
    /// Current scroll offset.
    pub offset: usize,
    /// Titles visible on the reel.
    pub window: Vec<String>,
}

/// Read-only view of the whole machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct SelectionSnapshot {
    /// Candidate feed status.
    pub pool: PoolStatus,
    /// Error reported by the feed, if it failed.
    pub pool_error: Option<String>,
    /// Number of loaded candidates.
    pub candidate_count: usize,
    /// Whether a spin happened since the last reset.
    pub has_spun: bool,
    /// Whether a spin waits for the feed.
    pub spin_queued: bool,
    /// Every reel is stopped on a distinct candidate.
    pub ready: bool,
    /// Reels in order.
    pub reels: Vec<ReelView>,
    /// Claimed candidate indexes, ascending.
    pub claimed: Vec<usize>,
}

/// The slot machine itself.
pub struct SelectionEngine {
    pool: CandidatePool,
    reels: [ReelState; REEL_COUNT],
    claimed: BTreeSet<usize>,
    has_spun: bool,
    spin_requested: bool,
    rng: StdRng,
    store: Arc<dyn LocalStore>,
}

impl SelectionEngine {
    /// Create an engine waiting for its candidates.
    pub fn new(store: Arc<dyn LocalStore>) -> Self {
        Self::with_rng(store, StdRng::from_os_rng())
    }

    /// Create an engine with a caller-provided random source.
    pub fn with_rng(store: Arc<dyn LocalStore>, rng: StdRng) -> Self {
        Self {
            pool: CandidatePool::Loading,
            reels: [ReelState::default(); REEL_COUNT],
            claimed: BTreeSet::new(),
            has_spun: false,
            spin_requested: false,
            rng,
            store,
        }
    }

    /// Current candidate pool.
    pub fn pool(&self) -> &CandidatePool {
        &self.pool
    }

    /// Loaded candidates, empty while loading or after a failure.
    pub fn candidates(&self) -> &[Candidate] {
        match &self.pool {
            CandidatePool::Ready(candidates) => candidates,
            _ => &[],
        }
    }

    /// Flags of the reels currently spinning.
    pub fn spinning_reels(&self) -> [bool; REEL_COUNT] {
        self.reels.map(|reel| reel.is_spinning())
    }

    /// Whether every reel is stopped on a candidate.
    pub fn is_ready(&self) -> bool {
        self.reels
            .iter()
            .all(|reel| reel.status == ReelStatus::Stopped && reel.chosen_index.is_some())
    }

    /// Install the result of a candidate load.
    ///
    /// Restores the persisted session on success, then runs a spin queued during loading
    /// if no spin happened yet.
    pub fn load_candidates(
        &mut self,
        loaded: Result<Vec<Candidate>, String>,
    ) -> Outcome<SelectionChange> {
        self.reels = [ReelState::default(); REEL_COUNT];
        self.claimed.clear();

        let candidates = match loaded {
            Ok(candidates) => candidates,
            Err(message) => {
                warn!(error = %message, "candidate feed failed; selection disabled");
                self.pool = CandidatePool::Failed(message);
                self.spin_requested = false;
                return Outcome::Skipped(Skip::CandidatesUnavailable);
            }
        };

        let count = candidates.len();
        self.pool = CandidatePool::Ready(candidates);
        if count < MIN_CANDIDATES {
            warn!(count, "not enough candidates to spin");
            self.spin_requested = false;
            return Outcome::Skipped(Skip::InsufficientCandidates);
        }

        let mut change = self.rehydrate();
        if std::mem::take(&mut self.spin_requested) && !self.has_spun {
            debug!("running spin queued while candidates were loading");
            if let Outcome::Applied(spun) = self.start_spin() {
                change = spun;
            }
        }
        Outcome::Applied(change)
    }

    /// Start all three reels from scratch.
    pub fn start_spin(&mut self) -> Outcome<SelectionChange> {
        if let Err(skip) = self.require_candidates() {
            if skip == Skip::SpinQueued {
                self.spin_requested = true;
            }
            return Outcome::Skipped(skip);
        }

        self.claimed.clear();
        let pool = self.unclaimed().len();
        for reel in &mut self.reels {
            *reel = ReelState {
                status: ReelStatus::Spinning,
                chosen_index: None,
                scroll_offset: self.rng.random_range(0..pool),
            };
        }
        self.has_spun = true;
        self.store.remove(PREVIEW_KEY);
        self.persist();

        Outcome::Applied(SelectionChange {
            invalidates_poll: true,
            ..SelectionChange::default()
        })
    }

    /// Move a spinning reel one position forward and return what it now shows.
    pub fn advance(&mut self, reel: usize) -> Option<ReelFrame> {
        let available = self.unclaimed();
        let state = self.reels.get_mut(reel)?;
        if !state.is_spinning() || available.is_empty() {
            return None;
        }
        state.scroll_offset = (state.scroll_offset + 1) % available.len();
        let offset = state.scroll_offset;
        Some(ReelFrame {
            reel,
            offset,
            window: self.window(&available, offset),
        })
    }

    /// Stop a spinning reel and claim the candidate it lands on.
    pub fn stop_reel(&mut self, reel: usize) -> Outcome<SelectionChange> {
        let Some(state) = self.reels.get(reel) else {
            return Outcome::Skipped(Skip::NoSuchReel);
        };
        if !state.is_spinning() {
            return Outcome::Skipped(Skip::ReelNotSpinning);
        }

        let available = self.unclaimed();
        if available.is_empty() {
            self.reels[reel] = ReelState::default();
            self.persist();
            return Outcome::Applied(SelectionChange::default());
        }

        let offset = state.scroll_offset % available.len();
        let index = available[(offset + LANDING_LOOKAHEAD) % available.len()];
        self.claimed.insert(index);
        self.reels[reel] = ReelState {
            status: ReelStatus::Stopped,
            chosen_index: Some(index),
            scroll_offset: offset,
        };
        self.renormalize_spinning();
        self.persist();

        let ready = self.is_ready();
        if ready {
            self.store_preview();
        }
        let candidate = self.candidates()[index].clone();
        debug!(reel, index, title = %candidate.title, "reel landed");

        Outcome::Applied(SelectionChange {
            invalidates_poll: false,
            ready,
            landed: Some(Landing {
                reel,
                index,
                candidate,
            }),
        })
    }

    /// Release a stopped reel's candidate and spin that reel alone.
    pub fn respin_reel(&mut self, reel: usize) -> Outcome<SelectionChange> {
        let Some(state) = self.reels.get(reel).copied() else {
            return Outcome::Skipped(Skip::NoSuchReel);
        };
        if state.is_spinning() {
            return Outcome::Skipped(Skip::ReelSpinning);
        }
        if let Err(skip) = self.require_candidates() {
            let skip = match skip {
                Skip::SpinQueued => Skip::InsufficientCandidates,
                other => other,
            };
            return Outcome::Skipped(skip);
        }

        if let Some(index) = state.chosen_index {
            self.claimed.remove(&index);
        }
        self.store.remove(PREVIEW_KEY);
        let pool = self.unclaimed().len();
        self.reels[reel] = ReelState {
            status: ReelStatus::Spinning,
            chosen_index: None,
            scroll_offset: self.rng.random_range(0..pool),
        };
        self.renormalize_spinning();
        self.has_spun = true;
        self.persist();

        Outcome::Applied(SelectionChange {
            invalidates_poll: true,
            ..SelectionChange::default()
        })
    }

    /// Return every reel to idle and forget the persisted session.
    pub fn reset(&mut self) -> Outcome<SelectionChange> {
        self.reels = [ReelState::default(); REEL_COUNT];
        self.claimed.clear();
        self.has_spun = false;
        self.spin_requested = false;
        self.store.remove(SESSION_STATE_KEY);
        self.store.remove(PREVIEW_KEY);

        Outcome::Applied(SelectionChange {
            invalidates_poll: true,
            ..SelectionChange::default()
        })
    }

    /// The three landed candidates, once every reel stopped.
    pub fn preview(&self) -> Option<Vec<Candidate>> {
        if !self.is_ready() {
            return None;
        }
        let candidates = self.candidates();
        self.reels
            .iter()
            .map(|reel| reel.chosen_index.and_then(|i| candidates.get(i).cloned()))
            .collect()
    }

    /// Read-only view for clients.
    pub fn snapshot(&self) -> SelectionSnapshot {
        let (pool, pool_error) = match &self.pool {
            CandidatePool::Loading => (PoolStatus::Loading, None),
            CandidatePool::Ready(_) => (PoolStatus::Ready, None),
            CandidatePool::Failed(message) => (PoolStatus::Failed, Some(message.clone())),
        };
        let available = self.unclaimed();
        let candidates = self.candidates();
        let reels = self
            .reels
            .iter()
            .enumerate()
            .map(|(reel, state)| {
                let chosen = state.chosen_index.and_then(|i| candidates.get(i).cloned());
                let window = match (state.status, &chosen) {
                    (ReelStatus::Spinning, _) => self.window(&available, state.scroll_offset),
                    (ReelStatus::Stopped, Some(candidate)) => vec![candidate.title.clone()],
                    _ => Vec::new(),
                };
                ReelView {
                    reel,
                    status: state.status,
                    chosen_index: state.chosen_index,
                    chosen,
                    offset: state.scroll_offset,
                    window,
                }
            })
            .collect();

        SelectionSnapshot {
            pool,
            pool_error,
            candidate_count: candidates.len(),
            has_spun: self.has_spun,
            spin_queued: self.spin_requested,
            ready: self.is_ready(),
            reels,
            claimed: self.claimed.iter().copied().collect(),
        }
    }

    fn require_candidates(&self) -> Result<(), Skip> {
        match &self.pool {
            CandidatePool::Loading => Err(Skip::SpinQueued),
            CandidatePool::Failed(_) => Err(Skip::CandidatesUnavailable),
            CandidatePool::Ready(candidates) if candidates.len() < MIN_CANDIDATES => {
                Err(Skip::InsufficientCandidates)
            }
            CandidatePool::Ready(_) => Ok(()),
        }
    }

    /// Unclaimed candidate indexes, ascending.
    fn unclaimed(&self) -> Vec<usize> {
        (0..self.candidates().len())
            .filter(|index| !self.claimed.contains(index))
            .collect()
    }

    fn window(&self, available: &[usize], offset: usize) -> Vec<String> {
        if available.is_empty() {
            return Vec::new();
        }
        let candidates = self.candidates();
        (0..WINDOW_SIZE)
            .map(|step| available[(offset + step) % available.len()])
            .filter_map(|index| candidates.get(index).map(|c| c.title.clone()))
            .collect()
    }

    fn renormalize_spinning(&mut self) {
        let pool = self.unclaimed().len();
        for reel in self.reels.iter_mut().filter(|reel| reel.is_spinning()) {
            reel.scroll_offset = if pool == 0 { 0 } else { reel.scroll_offset % pool };
        }
    }

    fn session_state(&self) -> SelectionSessionState {
        SelectionSessionState {
            has_spun: self.has_spun,
            chosen_indexes: self.reels.map(|reel| reel.chosen_index),
        }
    }

    fn persist(&self) {
        match serde_json::to_string(&self.session_state()) {
            Ok(encoded) => self.store.set(SESSION_STATE_KEY, encoded),
            Err(err) => warn!(error = %err, "failed to encode selection state"),
        }
    }

    fn store_preview(&self) {
        let Some(preview) = self.preview() else {
            return;
        };
        match serde_json::to_string(&preview) {
            Ok(encoded) => self.store.set(PREVIEW_KEY, encoded),
            Err(err) => warn!(error = %err, "failed to encode selection preview"),
        }
    }

    /// Read back the persisted session. Anything that does not fit the current pool is
    /// discarded.
    fn load_session_state(&self) -> Option<SelectionSessionState> {
        let raw = self.store.get(SESSION_STATE_KEY)?;
        let state = match serde_json::from_str::<SelectionSessionState>(&raw) {
            Ok(state) => state,
            Err(err) => {
                warn!(error = %err, "discarding malformed selection state");
                self.store.remove(SESSION_STATE_KEY);
                return None;
            }
        };

        let count = self.candidates().len();
        let mut seen = BTreeSet::new();
        let consistent = state
            .chosen_indexes
            .iter()
            .flatten()
            .all(|&index| index < count && seen.insert(index));
        if !consistent {
            warn!(?state, count, "discarding selection state that does not match candidates");
            self.store.remove(SESSION_STATE_KEY);
            return None;
        }
        Some(state)
    }

    fn rehydrate(&mut self) -> SelectionChange {
        self.has_spun = false;
        let Some(state) = self.load_session_state().filter(|state| state.has_spun) else {
            return SelectionChange::default();
        };

        self.has_spun = true;
        self.claimed = state.chosen_indexes.iter().flatten().copied().collect();
        let pool = self.unclaimed().len().max(1);
        for (reel, chosen) in self.reels.iter_mut().zip(state.chosen_indexes) {
            *reel = match chosen {
                Some(index) => ReelState {
                    status: ReelStatus::Stopped,
                    chosen_index: Some(index),
                    scroll_offset: 0,
                },
                None => ReelState {
                    status: ReelStatus::Spinning,
                    chosen_index: None,
                    scroll_offset: self.rng.random_range(0..pool),
                },
            };
        }
        debug!(?state, "restored selection session");

        let ready = self.is_ready();
        if ready {
            self.store_preview();
        }
        SelectionChange {
            ready,
            ..SelectionChange::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::local_store::MemoryLocalStore;

    fn candidates(titles: &[&str]) -> Vec<Candidate> {
        titles
            .iter()
            .map(|title| Candidate::new(*title, format!("{title}-fan")))
            .collect()
    }

    fn engine_with(store: Arc<dyn LocalStore>, titles: &[&str]) -> SelectionEngine {
        let mut engine = SelectionEngine::with_rng(store, StdRng::seed_from_u64(7));
        let _ = engine.load_candidates(Ok(candidates(titles)));
        engine
    }

    fn engine(titles: &[&str]) -> SelectionEngine {
        engine_with(Arc::new(MemoryLocalStore::new()), titles)
    }

    fn chosen(engine: &SelectionEngine) -> Vec<usize> {
        engine.reels.iter().filter_map(|reel| reel.chosen_index).collect()
    }

    fn assert_claims_exclusive(engine: &SelectionEngine) {
        let picked = chosen(engine);
        let distinct = picked.iter().collect::<BTreeSet<_>>();
        assert_eq!(picked.len(), distinct.len(), "duplicate claim in {picked:?}");
        assert_eq!(
            engine.claimed.iter().copied().collect::<Vec<_>>(),
            distinct.into_iter().copied().collect::<Vec<_>>()
        );
    }

    #[test]
    fn landing_uses_lookahead_over_unclaimed_pool() {
        let mut engine = engine(&["A", "B", "C", "D", "E"]);
        assert!(engine.start_spin().is_applied());
        engine.reels[0].scroll_offset = 1;

        let landed = engine.stop_reel(0).applied().unwrap().landed.unwrap();
        assert_eq!(landed.candidate.title, "D");
        assert_eq!(landed.index, 3);
    }

    #[test]
    fn landing_skips_claimed_candidates() {
        let mut engine = engine(&["A", "B", "C", "D", "E"]);
        let _ = engine.start_spin();
        engine.reels[0].scroll_offset = 1;
        let _ = engine.stop_reel(0);

        // Unclaimed pool is now [A, B, C, E].
        engine.reels[1].scroll_offset = 2;
        let landed = engine.stop_reel(1).applied().unwrap().landed.unwrap();
        assert_eq!(landed.candidate.title, "A");
    }

    #[test]
    fn claims_stay_exclusive_across_stop_and_respin() {
        let mut engine = engine(&["A", "B", "C", "D"]);
        let _ = engine.start_spin();
        for round in 0..40 {
            let reel = round % REEL_COUNT;
            for _ in 0..(round % 5) {
                for r in 0..REEL_COUNT {
                    engine.advance(r);
                }
            }
            if engine.reels[reel].is_spinning() {
                let _ = engine.stop_reel(reel);
            } else {
                let _ = engine.respin_reel(reel);
            }
            assert_claims_exclusive(&engine);
        }
    }

    #[test]
    fn all_stopped_is_ready_with_distinct_titles() {
        let store: Arc<dyn LocalStore> = Arc::new(MemoryLocalStore::new());
        let mut engine = engine_with(store.clone(), &["A", "B", "C", "D"]);
        let _ = engine.start_spin();
        let _ = engine.stop_reel(0);
        let _ = engine.stop_reel(1);
        let last = engine.stop_reel(2).applied().unwrap();

        assert!(last.ready);
        let preview = engine.preview().unwrap();
        let titles = preview.iter().map(|c| c.title.as_str()).collect::<BTreeSet<_>>();
        assert_eq!(titles.len(), 3);
        assert!(store.get(PREVIEW_KEY).is_some());
    }

    #[test]
    fn respin_releases_exactly_one_claim() {
        let mut engine = engine(&["A", "B", "C", "D"]);
        let _ = engine.start_spin();
        for reel in 0..REEL_COUNT {
            let _ = engine.stop_reel(reel);
        }
        let before = engine.claimed.clone();
        let released = engine.reels[1].chosen_index.unwrap();

        let change = engine.respin_reel(1).applied().unwrap();
        assert!(change.invalidates_poll);

        let after = engine.claimed.clone();
        assert_eq!(before.len() - 1, after.len());
        assert!(!after.contains(&released));
        assert!(before.is_superset(&after));
        assert!(engine.reels[1].is_spinning());
    }

    #[test]
    fn respin_and_stop_are_noops_in_the_wrong_state() {
        let mut engine = engine(&["A", "B", "C"]);
        assert_eq!(engine.stop_reel(0).skipped(), Some(Skip::ReelNotSpinning));
        let _ = engine.start_spin();
        assert_eq!(engine.respin_reel(0).skipped(), Some(Skip::ReelSpinning));
        assert_eq!(engine.stop_reel(5).skipped(), Some(Skip::NoSuchReel));
    }

    #[test]
    fn reset_is_total() {
        let store: Arc<dyn LocalStore> = Arc::new(MemoryLocalStore::new());
        let mut engine = engine_with(store.clone(), &["A", "B", "C", "D"]);
        let _ = engine.start_spin();
        let _ = engine.stop_reel(0);
        assert!(store.get(SESSION_STATE_KEY).is_some());

        assert!(engine.reset().is_applied());
        assert!(engine.claimed.is_empty());
        assert!(store.get(SESSION_STATE_KEY).is_none());
        assert!(store.get(PREVIEW_KEY).is_none());
        assert!(!engine.snapshot().has_spun);
        assert!(engine.reels.iter().all(|reel| reel.status == ReelStatus::Idle));

        // A later reload does not restore anything.
        let reloaded = engine_with(store, &["A", "B", "C", "D"]);
        assert!(!reloaded.snapshot().has_spun);
    }

    #[test]
    fn insufficient_candidates_disable_spinning() {
        let mut engine = engine(&["A", "B"]);
        assert_eq!(engine.start_spin().skipped(), Some(Skip::InsufficientCandidates));
        assert_eq!(engine.respin_reel(0).skipped(), Some(Skip::InsufficientCandidates));
    }

    #[test]
    fn failed_feed_disables_every_control() {
        let mut engine =
            SelectionEngine::with_rng(Arc::new(MemoryLocalStore::new()), StdRng::seed_from_u64(1));
        let loaded = engine.load_candidates(Err("timeout".into()));
        assert_eq!(loaded.skipped(), Some(Skip::CandidatesUnavailable));
        assert_eq!(engine.start_spin().skipped(), Some(Skip::CandidatesUnavailable));
        assert_eq!(engine.snapshot().pool_error.as_deref(), Some("timeout"));
    }

    #[test]
    fn spin_requested_while_loading_runs_on_arrival() {
        let mut engine =
            SelectionEngine::with_rng(Arc::new(MemoryLocalStore::new()), StdRng::seed_from_u64(3));
        assert_eq!(engine.start_spin().skipped(), Some(Skip::SpinQueued));
        assert!(engine.snapshot().spin_queued);

        let loaded = engine.load_candidates(Ok(candidates(&["A", "B", "C"])));
        assert!(loaded.applied().unwrap().invalidates_poll);
        assert_eq!(engine.spinning_reels(), [true; REEL_COUNT]);
    }

    #[test]
    fn queued_spin_is_dropped_when_a_session_was_restored() {
        let store: Arc<dyn LocalStore> = Arc::new(MemoryLocalStore::new());
        store.set(
            SESSION_STATE_KEY,
            r#"{"hasSpun":true,"chosenIndexes":[2,null,0]}"#.into(),
        );
        let mut engine = SelectionEngine::with_rng(store, StdRng::seed_from_u64(3));
        let _ = engine.start_spin();
        let _ = engine.load_candidates(Ok(candidates(&["A", "B", "C", "D"])));

        assert_eq!(chosen(&engine), vec![2, 0]);
        assert_eq!(engine.spinning_reels(), [false, true, false]);
    }

    #[test]
    fn rehydrates_stopped_and_spinning_reels() {
        let store: Arc<dyn LocalStore> = Arc::new(MemoryLocalStore::new());
        store.set(SESSION_STATE_KEY, r#"{"spun":true,"chosenIdxs":[1,3,null]}"#.into());
        let engine = engine_with(store, &["A", "B", "C", "D"]);

        let snapshot = engine.snapshot();
        assert!(snapshot.has_spun);
        assert_eq!(snapshot.reels[0].status, ReelStatus::Stopped);
        assert_eq!(snapshot.reels[1].chosen.as_ref().unwrap().title, "D");
        assert_eq!(snapshot.reels[2].status, ReelStatus::Spinning);
        assert_eq!(snapshot.claimed, vec![1, 3]);
    }

    #[test]
    fn malformed_or_inconsistent_state_is_discarded() {
        for raw in [
            "not json",
            r#"{"hasSpun":true,"chosenIndexes":[9,null,null]}"#,
            r#"{"hasSpun":true,"chosenIndexes":[1,1,null]}"#,
        ] {
            let store: Arc<dyn LocalStore> = Arc::new(MemoryLocalStore::new());
            store.set(SESSION_STATE_KEY, raw.into());
            let engine = engine_with(store.clone(), &["A", "B", "C", "D"]);

            assert!(!engine.snapshot().has_spun, "restored from {raw}");
            assert!(store.get(SESSION_STATE_KEY).is_none());
        }
    }

    #[test]
    fn advance_wraps_and_renders_window() {
        let mut engine = engine(&["A", "B", "C"]);
        let _ = engine.start_spin();
        engine.reels[0].scroll_offset = 2;

        let frame = engine.advance(0).unwrap();
        assert_eq!(frame.offset, 0);
        assert_eq!(frame.window, vec!["A", "B", "C", "A", "B"]);
        assert!(engine.advance(4).is_none());
    }
}
