// src/miner/worker.rs
//! Worker thread implementation
//!
//! Each worker owns one search backend and loops independently: it picks up
//! the target most recently assigned by the controller, searches it in
//! bounded batches and publishes a [`Solution`] once it finds one. A worker
//! that has solved its current target parks until a new counter arrives.

use crate::miner::algorithm::{HashSearch, SearchStatus};
use crate::miner::shutdown::{Joinable, Shutdown};
use crate::miner::target::{MintingTarget, Solution};
use crate::types::INPUT_LEN;
use crate::utils::error::MinerError;
use arc_swap::ArcSwapOption;
use crossbeam_channel::{SendTimeoutError, Sender};
use rand::Rng;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// How long an idle worker parks before re-checking its assignment
const IDLE_PARK: Duration = Duration::from_millis(250);

/// Interval between shutdown checks while the solution queue is full
const PUBLISH_POLL: Duration = Duration::from_millis(100);

/// Backend family of a worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerKind {
    /// CPU thread
    Cpu,
    /// GPU device
    Gpu {
        /// Configured device index
        device: usize,
    },
}

impl fmt::Display for WorkerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerKind::Cpu => write!(f, "CPU"),
            WorkerKind::Gpu { device } => write!(f, "GPU {}", device),
        }
    }
}

/// Worker lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WorkerState {
    /// Waiting for a target
    Idle = 0,
    /// Hashing the current target
    Searching = 1,
    /// Published a solution for the current target
    Found = 2,
    /// Search abandoned for a newer target
    Interrupted = 3,
    /// Thread has exited
    Stopped = 4,
}

impl WorkerState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => WorkerState::Searching,
            2 => WorkerState::Found,
            3 => WorkerState::Interrupted,
            4 => WorkerState::Stopped,
            _ => WorkerState::Idle,
        }
    }
}

/// Point-in-time view of one worker
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerSnapshot {
    /// Worker identifier
    pub id: usize,
    /// Backend family
    pub kind: WorkerKind,
    /// Current state
    pub state: WorkerState,
    /// Digests computed since start
    pub hashes: u64,
    /// Average hash rate since start (hashes per second)
    pub hash_rate: f64,
    /// Solutions published
    pub solutions: u64,
}

/// State shared between a worker thread and the controller
pub struct WorkerShared {
    id: usize,
    kind: WorkerKind,
    target: ArcSwapOption<MintingTarget>,
    interrupt: AtomicBool,
    state: AtomicU8,
    hashes: AtomicU64,
    solutions: AtomicU64,
    started: Instant,
}

impl WorkerShared {
    fn new(id: usize, kind: WorkerKind) -> Self {
        WorkerShared {
            id,
            kind,
            target: ArcSwapOption::empty(),
            interrupt: AtomicBool::new(false),
            state: AtomicU8::new(WorkerState::Idle as u8),
            hashes: AtomicU64::new(0),
            solutions: AtomicU64::new(0),
            started: Instant::now(),
        }
    }

    /// Worker identifier
    pub fn id(&self) -> usize {
        self.id
    }

    /// Current state
    pub fn state(&self) -> WorkerState {
        WorkerState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: WorkerState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// Statistics snapshot
    pub fn snapshot(&self) -> WorkerSnapshot {
        let hashes = self.hashes.load(Ordering::Relaxed);
        let elapsed = self.started.elapsed().as_secs_f64();
        WorkerSnapshot {
            id: self.id,
            kind: self.kind,
            state: self.state(),
            hashes,
            hash_rate: if elapsed > 0.0 {
                hashes as f64 / elapsed
            } else {
                0.0
            },
            solutions: self.solutions.load(Ordering::Relaxed),
        }
    }
}

/// Everything a worker needs besides its backend
#[derive(Clone)]
pub struct WorkerContext {
    /// Units minted per transaction
    pub units: u64,
    /// Minting account
    pub account_id: u64,
    /// Bounded solution queue read by the controller
    pub solutions: Sender<Solution>,
    /// Global shutdown signal
    pub shutdown: Shutdown,
    /// Optional hash count feed for statistics
    pub hash_sender: Option<Sender<u64>>,
}

/// Controller-side handle of a running worker
pub struct WorkerHandle {
    shared: Arc<WorkerShared>,
    thread: Joinable<()>,
}

impl WorkerHandle {
    /// Starts a worker thread that owns `backend`
    ///
    /// # Arguments
    /// * `id` - Worker identifier, unique per controller
    /// * `kind` - Backend family, for reporting
    /// * `backend` - Search backend, dropped when the thread exits
    /// * `context` - Shared channels and parameters
    pub fn spawn(
        id: usize,
        kind: WorkerKind,
        backend: Box<dyn HashSearch>,
        context: WorkerContext,
    ) -> Result<Self, MinerError> {
        let shared = Arc::new(WorkerShared::new(id, kind));
        let thread_shared = shared.clone();
        let thread = Joinable::spawn(format!("mint-worker-{}", id), move || {
            run(thread_shared, backend, context)
        })?;
        Ok(WorkerHandle { shared, thread })
    }

    /// Shared state, for snapshots
    pub fn shared(&self) -> &Arc<WorkerShared> {
        &self.shared
    }

    /// Hands a new target to the worker and interrupts its current search
    pub fn assign(&self, target: Arc<MintingTarget>) {
        self.shared.target.store(Some(target));
        self.shared.interrupt.store(true, Ordering::SeqCst);
        self.thread.thread().unpark();
    }

    /// Interrupts the worker so it observes shutdown promptly
    pub fn stop(&self) {
        self.shared.interrupt.store(true, Ordering::SeqCst);
        self.thread.thread().unpark();
    }

    /// Waits for the worker thread to exit, up to `deadline`
    ///
    /// Returns false if the worker was still running at the deadline.
    pub fn join_until(self, deadline: Instant) -> bool {
        let id = self.shared.id;
        match self.thread.join_until(deadline) {
            Ok(Some(())) => true,
            Ok(None) => false,
            Err(e) => {
                log::error!("Worker {} failed: {}", id, e);
                true
            }
        }
    }
}

/// Worker thread body
fn run(shared: Arc<WorkerShared>, mut backend: Box<dyn HashSearch>, context: WorkerContext) {
    let mut rng = rand::thread_rng();
    let mut current: Option<Arc<MintingTarget>> = None;
    let mut input = [0u8; INPUT_LEN];
    let mut nonce = 0u64;
    let mut solved: Option<u64> = None;

    log::info!(
        "Worker {} started: {} using {}",
        shared.id,
        shared.kind,
        backend.name()
    );

    while !context.shutdown.is_triggered() {
        // cleared before the target is loaded so a later assignment is never missed
        shared.interrupt.store(false, Ordering::SeqCst);

        let Some(latest) = shared.target.load_full() else {
            shared.set_state(WorkerState::Idle);
            std::thread::park_timeout(IDLE_PARK);
            continue;
        };

        let is_new = current
            .as_ref()
            .is_none_or(|target| target.counter() != latest.counter());
        if is_new {
            input = latest.hash_input(context.units, context.account_id);
            nonce = rng.r#gen();
            log::debug!(
                "Worker {} searching counter {} from nonce {}",
                shared.id,
                latest.counter(),
                nonce
            );
            current = Some(latest);
        }
        let target = match current.as_ref() {
            Some(target) => target.clone(),
            None => continue,
        };

        if solved == Some(target.counter()) {
            std::thread::park_timeout(IDLE_PARK);
            continue;
        }

        shared.set_state(WorkerState::Searching);
        let outcome = match backend.search(&input, target.target(), nonce, &shared.interrupt) {
            Ok(outcome) => outcome,
            Err(e) => {
                log::error!("Worker {} stopped: {}", shared.id, e);
                break;
            }
        };

        shared.hashes.fetch_add(outcome.hash_count, Ordering::Relaxed);
        if let Some(sender) = &context.hash_sender {
            let _ = sender.send(outcome.hash_count);
        }
        nonce = outcome.last_nonce;

        match outcome.status {
            SearchStatus::Found {
                nonce: winning,
                digest,
            } => {
                shared.set_state(WorkerState::Found);
                solved = Some(target.counter());
                log::info!(
                    "Worker {} found solution for counter {}: nonce {}",
                    shared.id,
                    target.counter(),
                    winning
                );
                let solution = Solution::new(winning, target.counter(), digest, shared.id);
                if !publish(&context, solution) {
                    break;
                }
                shared.solutions.fetch_add(1, Ordering::Relaxed);
            }
            SearchStatus::Cancelled => shared.set_state(WorkerState::Interrupted),
            SearchStatus::Exhausted => {}
        }
    }

    shared.set_state(WorkerState::Stopped);
    let name = backend.name();
    drop(backend);
    log::info!("Worker {} ({}) stopped", shared.id, name);
}

/// Blocks until the solution is queued
///
/// Returns false if shutdown was signalled or the controller is gone.
fn publish(context: &WorkerContext, mut solution: Solution) -> bool {
    loop {
        match context.solutions.send_timeout(solution, PUBLISH_POLL) {
            Ok(()) => return true,
            Err(SendTimeoutError::Timeout(pending)) => {
                if context.shutdown.is_triggered() {
                    return false;
                }
                solution = pending;
            }
            Err(SendTimeoutError::Disconnected(_)) => return false,
        }
    }
}
