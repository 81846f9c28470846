use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use chrono::NaiveTime;
use log::{debug, info, warn};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::condition::{Condition, SearchInput};
use super::explorer::{DriveOutcome, Explorer};
use super::slot_utils::hm;
use super::solution::Solution;
use super::types::TeamId;
use crate::config::SearchConfig;
use crate::error::SearchError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchStatus {
    Idle,
    Running,
}

/// Everything the two search tasks and the query path share
#[derive(Debug)]
struct SearchState {
    status: SearchStatus,
    /// Bumped on every start so tasks of an older search leave the state alone
    search_id: u64,
    condition: Option<Arc<Condition>>,
    /// Ascending by score, ties in discovery order
    solutions: Vec<Solution>,
    hashes: HashSet<String>,
    /// Estimated bytes held by `solutions` and `hashes`
    stored_bytes: u64,
    attempts: u64,
    active_root: usize,
    root_count: usize,
}

impl SearchState {
    fn new() -> Self {
        Self {
            status: SearchStatus::Idle,
            search_id: 0,
            condition: None,
            solutions: Vec::new(),
            hashes: HashSet::new(),
            stored_bytes: 0,
            attempts: 0,
            active_root: 0,
            root_count: 0,
        }
    }

    /// Keeps the solution unless an identical schedule was already found
    fn record(&mut self, solution: Solution) -> bool {
        if !self.hashes.insert(solution.hash.clone()) {
            return false;
        }
        self.stored_bytes += stored_footprint(&solution);
        let at = self.solutions.partition_point(|s| s.score <= solution.score);
        self.solutions.insert(at, solution);
        true
    }

    fn is_current(&self, search_id: u64) -> bool {
        self.search_id == search_id && self.status == SearchStatus::Running
    }
}

/// A recorded solution plus its copy of the hash in the dedup set
fn stored_footprint(solution: &Solution) -> u64 {
    solution.approx_bytes() + (std::mem::size_of::<String>() + solution.hash.len()) as u64
}

struct RunHandle {
    search_id: u64,
    cancel: watch::Sender<bool>,
    expansion: JoinHandle<()>,
    rotation: JoinHandle<()>,
}

/// Context of the search in flight, shared by start and status replies
#[derive(Debug, Clone, Serialize)]
pub struct TourContext {
    pub tour_name: String,
    pub teams: BTreeMap<TeamId, String>,
    #[serde(with = "hm")]
    pub day_start: NaiveTime,
    #[serde(with = "hm")]
    pub day_end: NaiveTime,
}

impl TourContext {
    fn from_condition(condition: &Condition) -> Self {
        Self {
            tour_name: condition.tour_name.clone(),
            teams: condition.teams_pretty().clone(),
            day_start: condition.day_start,
            day_end: condition.day_end,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StartReport {
    #[serde(flatten)]
    pub tour: TourContext,
    pub solutions: Vec<Solution>,
    pub attempts: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub status: SearchStatus,
    pub solutions_cnt: usize,
    pub attempts: u64,
    #[serde(flatten)]
    pub tour: Option<TourContext>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SolutionsReport {
    pub solutions: Vec<Solution>,
    pub attempts: u64,
}

fn read_state(state: &RwLock<SearchState>) -> RwLockReadGuard<'_, SearchState> {
    state.read().unwrap_or_else(PoisonError::into_inner)
}

fn write_state(state: &RwLock<SearchState>) -> RwLockWriteGuard<'_, SearchState> {
    state.write().unwrap_or_else(PoisonError::into_inner)
}

/// Owns at most one running search and answers queries about it
pub struct Searcher {
    state: Arc<RwLock<SearchState>>,
    run: Mutex<Option<RunHandle>>,
    config: SearchConfig,
}

impl Default for Searcher {
    fn default() -> Self {
        Self::new(SearchConfig::default())
    }
}

impl Searcher {
    pub fn new(config: SearchConfig) -> Self {
        Self {
            state: Arc::new(RwLock::new(SearchState::new())),
            run: Mutex::new(None),
            config,
        }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Builds the condition, launches the search and returns what it found
    /// during the initial wait. The search keeps running afterwards.
    pub async fn start(&self, input: &SearchInput) -> Result<StartReport, SearchError> {
        if read_state(&self.state).status == SearchStatus::Running {
            return Err(SearchError::AlreadyRunning);
        }

        let condition = Arc::new(Condition::build(input)?);
        let explorer = Explorer::new(condition.clone())?;

        let root_count = explorer.root_count();
        {
            // held until the handle is in place, so a concurrent stop always finds it
            let mut run = self.lock_run();

            let search_id = {
                let mut state = write_state(&self.state);
                if state.status == SearchStatus::Running {
                    return Err(SearchError::AlreadyRunning);
                }
                let search_id = state.search_id + 1;
                *state = SearchState {
                    status: SearchStatus::Running,
                    search_id,
                    condition: Some(condition.clone()),
                    root_count,
                    ..SearchState::new()
                };
                search_id
            };
            info!(
                "search {} started for '{}' with {} first-level nodes",
                search_id, condition.tour_name, root_count
            );

            // a finished earlier search may still hold its handle
            if let Some(previous) = run.take() {
                previous.rotation.abort();
            }

            let (cancel, cancel_rx) = watch::channel(false);
            let expansion = {
                let state = self.state.clone();
                let config = self.config.clone();
                let cancel_rx = cancel_rx.clone();
                tokio::task::spawn_blocking(move || run_expansion(state, explorer, cancel_rx, config, search_id))
            };
            let rotation = tokio::spawn(run_rotation(
                self.state.clone(),
                cancel_rx,
                self.config.rotation_interval,
                search_id,
            ));
            *run = Some(RunHandle { search_id, cancel, expansion, rotation });
        }

        tokio::time::sleep(self.config.initial_wait).await;

        let state = read_state(&self.state);
        Ok(StartReport {
            tour: TourContext::from_condition(&condition),
            solutions: self.capped(&state.solutions),
            attempts: state.attempts,
        })
    }

    /// Cancels the running search and waits briefly for it to wind down. No-op when idle.
    pub async fn stop(&self) {
        let handle = self.lock_run().take();
        let Some(handle) = handle else {
            return;
        };

        // the receivers may already be gone if the search finished on its own
        let _ = handle.cancel.send(true);
        if tokio::time::timeout(self.config.stop_grace, handle.expansion).await.is_err() {
            warn!("search {} did not stop within {:?}", handle.search_id, self.config.stop_grace);
        }
        handle.rotation.abort();

        let mut state = write_state(&self.state);
        if state.search_id == handle.search_id && state.status == SearchStatus::Running {
            state.status = SearchStatus::Idle;
            info!(
                "search {} stopped after {} attempts, {} solutions",
                handle.search_id,
                state.attempts,
                state.solutions.len()
            );
        }
    }

    /// Counters, plus the tour context when `with_data` is set and a search is running
    pub fn status(&self, with_data: bool) -> StatusReport {
        let state = read_state(&self.state);
        let tour = match (&state.condition, state.status) {
            (Some(condition), SearchStatus::Running) if with_data => {
                Some(TourContext::from_condition(condition))
            }
            _ => None,
        };
        StatusReport {
            status: state.status,
            solutions_cnt: state.solutions.len(),
            attempts: state.attempts,
            tour,
        }
    }

    pub fn solutions(&self) -> SolutionsReport {
        let state = read_state(&self.state);
        SolutionsReport {
            solutions: self.capped(&state.solutions),
            attempts: state.attempts,
        }
    }

    pub fn solution(&self, hash: &str) -> Option<Solution> {
        read_state(&self.state)
            .solutions
            .iter()
            .find(|s| s.hash == hash)
            .cloned()
    }

    /// Condition of the latest search, kept after it stops so its solutions can be exported
    pub fn condition(&self) -> Option<Arc<Condition>> {
        read_state(&self.state).condition.clone()
    }

    fn capped(&self, solutions: &[Solution]) -> Vec<Solution> {
        solutions.iter().take(self.config.solutions_cap).cloned().collect()
    }

    fn lock_run(&self) -> std::sync::MutexGuard<'_, Option<RunHandle>> {
        self.run.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Drives the active first-level node until cancelled, out of memory or out of nodes
fn run_expansion(
    state: Arc<RwLock<SearchState>>,
    mut explorer: Explorer,
    cancel: watch::Receiver<bool>,
    config: SearchConfig,
    search_id: u64,
) {
    let single_cpu = std::thread::available_parallelism().map_or(true, |n| n.get() == 1);
    // only this task records solutions, so the copy stays in step with the state
    let mut stored_bytes = 0;

    loop {
        if *cancel.borrow() {
            debug!("search {} observed cancellation", search_id);
            break;
        }
        let footprint = explorer.approx_bytes() + stored_bytes;
        if footprint > config.memory_limit_bytes {
            warn!(
                "search {} halted: search tree and solutions reached {} bytes, limit is {}",
                search_id, footprint, config.memory_limit_bytes
            );
            break;
        }
        if explorer.all_exhausted() {
            info!("search {} exhausted every first-level node", search_id);
            break;
        }

        let root = {
            let state = read_state(&state);
            if !state.is_current(search_id) {
                return;
            }
            state.active_root
        };

        let outcome = explorer.drive(root);
        let exhausted = matches!(outcome, DriveOutcome::Exhausted);
        {
            let mut state = write_state(&state);
            if !state.is_current(search_id) {
                return;
            }
            state.attempts += 1;
            if let DriveOutcome::Complete(solution) = outcome {
                if state.record(solution) {
                    stored_bytes = state.stored_bytes;
                    debug!("search {}: {} solutions", search_id, state.solutions.len());
                }
            }
            if exhausted && config.advance_exhausted_roots && state.root_count > 0 {
                state.active_root = (state.active_root + 1) % state.root_count;
            }
        }

        if exhausted && !config.advance_exhausted_roots {
            std::thread::sleep(config.exhausted_pause);
        }
        if single_cpu {
            std::thread::sleep(config.single_cpu_pause);
        }
    }

    let mut state = write_state(&state);
    if state.is_current(search_id) {
        state.status = SearchStatus::Idle;
        info!(
            "search {} finished after {} attempts, {} solutions",
            search_id,
            state.attempts,
            state.solutions.len()
        );
    }
}

/// Moves the active pointer to the next first-level node; false once the search is over
fn rotate_once(state: &RwLock<SearchState>, search_id: u64) -> bool {
    let mut state = write_state(state);
    if !state.is_current(search_id) {
        return false;
    }
    if state.root_count > 0 {
        state.active_root = (state.active_root + 1) % state.root_count;
        debug!("search {} rotated to first-level node {}", search_id, state.active_root);
    }
    true
}

async fn run_rotation(
    state: Arc<RwLock<SearchState>>,
    mut cancel: watch::Receiver<bool>,
    every: Duration,
    search_id: u64,
) {
    let mut ticker = tokio::time::interval(every.max(Duration::from_millis(1)));
    // the first tick completes immediately
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if !rotate_once(&state, search_id) {
                    break;
                }
            }
            changed = cancel.changed() => {
                if changed.is_err() || *cancel.borrow() {
                    break;
                }
            }
        }
    }
}
