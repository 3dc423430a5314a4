// src/miner/controller.rs
//! Minting controller
//!
//! The controller owns the target lifecycle. It dispatches a freshly
//! counted target whenever the workers are idle, collects their solutions
//! through the bounded queue, drops stale ones, and submits accepted
//! solutions in FIFO order. A minting transaction is only submitted once a
//! new block has been generated and the account has no unconfirmed
//! transactions.
//!
//! [`MintState`] holds the bookkeeping and the submit step without any
//! threads, so it can be driven directly. [`MintController`] runs it on a
//! dedicated thread together with the worker pool.

use crate::config::TuningConfig;
use crate::miner::algorithm::{CpuSearch, HashSearch};
use crate::miner::gpu::{self, GpuHashSearch};
use crate::miner::setup::MintParams;
use crate::miner::shutdown::{Joinable, Shutdown};
use crate::miner::target::{MintingTarget, Solution};
use crate::miner::worker::{WorkerContext, WorkerHandle, WorkerKind, WorkerShared, WorkerSnapshot};
use crate::network::ledger::{Ledger, MintRequest};
use crate::utils::error::MinerError;
use crossbeam_channel::{Receiver, Sender};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Extra time granted to the controller thread beyond the worker join timeout
const JOIN_MARGIN: Duration = Duration::from_millis(500);

/// Notifications emitted by the controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MintEvent {
    /// A new target was handed to the workers
    TargetDispatched {
        /// Counter stamped on the target
        counter: u64,
    },
    /// A solution entered the pending queue
    SolutionAccepted(Solution),
    /// A solution was broadcast; it carries the transaction id
    SolutionSubmitted(Solution),
    /// The ledger refused a solution and it was discarded
    SolutionRejected {
        /// The discarded solution
        solution: Solution,
        /// Ledger error text
        reason: String,
    },
}

/// Controller timing and queue settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerOptions {
    /// Delay between submission attempts that made no progress
    pub retry_delay: Duration,
    /// Bound on waiting for threads at shutdown
    pub shutdown_timeout: Duration,
    /// Capacity of the solution queue
    pub queue_capacity: usize,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        ControllerOptions {
            retry_delay: Duration::from_secs(30),
            shutdown_timeout: Duration::from_secs(60),
            queue_capacity: 10,
        }
    }
}

impl From<&TuningConfig> for ControllerOptions {
    fn from(tuning: &TuningConfig) -> Self {
        ControllerOptions {
            retry_delay: tuning.retry_delay(),
            shutdown_timeout: tuning.shutdown_timeout(),
            queue_capacity: tuning.solution_queue.max(1),
        }
    }
}

/// Result of one submit step
#[derive(Debug)]
pub enum SubmitOutcome {
    /// Nothing pending
    Empty,
    /// No new block yet, or the account has an unconfirmed transaction
    GateClosed,
    /// The head was broadcast and removed
    Submitted(Solution),
    /// The ledger refused the head and it was removed
    Rejected {
        /// The discarded solution
        solution: Solution,
        /// The rejection
        error: MinerError,
    },
    /// A transport failure; the head stays queued
    Deferred(MinerError),
}

impl SubmitOutcome {
    /// Whether the pending queue advanced
    pub fn advanced(&self) -> bool {
        matches!(self, SubmitOutcome::Submitted(_) | SubmitOutcome::Rejected { .. })
    }
}

/// Controller bookkeeping
#[derive(Debug, Clone, Default)]
pub struct MintState {
    counter: u64,
    last_accepted: Option<u64>,
    submit_height: u64,
    pending: VecDeque<Solution>,
    work_outstanding: bool,
}

impl MintState {
    /// Starts counting at `counter`
    pub fn new(counter: u64) -> Self {
        MintState {
            counter,
            ..Default::default()
        }
    }

    /// Learns the starting counter from the ledger
    ///
    /// The ledger only advances the counter once a minting transaction is
    /// confirmed, so an unconfirmed transaction means the current counter is
    /// already taken. Failing to read the unconfirmed list is logged and
    /// ignored.
    pub fn initialize<L: Ledger + ?Sized>(ledger: &L, params: &MintParams) -> Result<Self, MinerError> {
        let target =
            ledger.fetch_minting_target(params.currency_id, params.account.account_id, params.units)?;
        let mut counter = target.counter();
        match ledger.fetch_unconfirmed_transactions(params.account.account_id, params.chain.id) {
            Ok(list) if !list.is_empty() => counter += 1,
            Ok(_) => {}
            Err(e) => log::error!("Unable to get unconfirmed transactions: {}", e),
        }
        log::info!("Initial minting counter {}", counter);
        Ok(Self::new(counter))
    }

    /// Counter the next target will carry
    pub fn counter(&self) -> u64 {
        self.counter
    }

    /// Counter of the last accepted solution
    pub fn last_accepted(&self) -> Option<u64> {
        self.last_accepted
    }

    /// Block height of the last submission
    pub fn submit_height(&self) -> u64 {
        self.submit_height
    }

    /// Whether the workers hold a target without an accepted solution
    pub fn work_outstanding(&self) -> bool {
        self.work_outstanding
    }

    /// Accepted solutions awaiting submission, oldest first
    pub fn pending(&self) -> impl Iterator<Item = &Solution> {
        self.pending.iter()
    }

    /// Number of pending solutions
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Whether the controller should block for a solution this cycle
    pub fn should_collect(&self, solution_queued: bool) -> bool {
        self.work_outstanding && (self.pending.is_empty() || solution_queued)
    }

    /// Queues a solution unless its counter is stale
    ///
    /// Returns false when the solution was dropped.
    pub fn accept(&mut self, solution: Solution) -> bool {
        if self.last_accepted.is_some_and(|last| solution.counter() <= last) {
            return false;
        }
        self.work_outstanding = false;
        self.last_accepted = Some(solution.counter());
        self.pending.push_back(solution);
        true
    }

    /// Stamps the local counter on a fetched target and marks work outstanding
    pub fn stamp_target(&mut self, mut target: MintingTarget) -> MintingTarget {
        target.set_counter(self.counter);
        self.counter += 1;
        self.work_outstanding = true;
        target
    }

    /// Attempts to submit the head of the pending queue
    ///
    /// Rejections discard the head and transport failures keep it; both are
    /// reported in the outcome. Any other error is returned.
    pub fn submit<L: Ledger + ?Sized>(
        &mut self,
        ledger: &L,
        params: &MintParams,
    ) -> Result<SubmitOutcome, MinerError> {
        let Some(head) = self.pending.front() else {
            return Ok(SubmitOutcome::Empty);
        };
        let counter = head.counter();

        match self.try_submit(ledger, params, head) {
            Ok(Some((tx_id, height))) => {
                let Some(mut solution) = self.pending.pop_front() else {
                    return Ok(SubmitOutcome::Empty);
                };
                solution.set_tx_id(tx_id);
                self.submit_height = height;
                log::info!(
                    "Solution for counter {} submitted as transaction {} at height {}",
                    counter,
                    tx_id,
                    height
                );
                Ok(SubmitOutcome::Submitted(solution))
            }
            Ok(None) => Ok(SubmitOutcome::GateClosed),
            Err(error) if error.is_rejection() => {
                log::error!(
                    "Server rejected minting transaction for counter {} - discarding: {}",
                    counter,
                    error
                );
                match self.pending.pop_front() {
                    Some(solution) => Ok(SubmitOutcome::Rejected { solution, error }),
                    None => Ok(SubmitOutcome::Empty),
                }
            }
            Err(error) if error.is_transient() => {
                log::error!(
                    "Unable to submit minting transaction for counter {} - retrying: {}",
                    counter,
                    error
                );
                Ok(SubmitOutcome::Deferred(error))
            }
            Err(error) => Err(error),
        }
    }

    /// Runs the gate and the submission; returns the transaction id and height
    fn try_submit<L: Ledger + ?Sized>(
        &self,
        ledger: &L,
        params: &MintParams,
        head: &Solution,
    ) -> Result<Option<(u64, u64)>, MinerError> {
        let height = ledger.fetch_blockchain_height()?;
        if height <= self.submit_height {
            log::debug!(
                "Counter {} waiting for a block after height {}",
                head.counter(),
                self.submit_height
            );
            return Ok(None);
        }
        let unconfirmed =
            ledger.fetch_unconfirmed_transactions(params.account.account_id, params.chain.id)?;
        if !unconfirmed.is_empty() {
            log::debug!(
                "Counter {} waiting for {} unconfirmed transactions",
                head.counter(),
                unconfirmed.len()
            );
            return Ok(None);
        }

        let request = MintRequest {
            currency_id: params.currency_id,
            chain: params.chain.id,
            nonce: head.nonce(),
            units: params.units,
            counter: head.counter(),
            fee: params.fee,
            public_key: params.account.public_key,
        };
        let unsigned = ledger.build_mint_transaction(&request)?;
        for problem in unsigned.view.mismatches(&request, params.account.account_id) {
            log::error!(
                "Minting transaction for counter {} returned by the server is incorrect: {}",
                head.counter(),
                problem
            );
        }
        let signed = ledger.sign(&unsigned.bytes, &params.secret)?;
        let tx_id = ledger.broadcast(&signed)?;
        Ok(Some((tx_id, height)))
    }
}

/// Runs the minting loop and the worker pool
pub struct MintController<L: Ledger + 'static> {
    ledger: Arc<L>,
    params: Arc<MintParams>,
    options: ControllerOptions,
    shutdown: Shutdown,
    event_tx: Sender<MintEvent>,
    event_rx: Receiver<MintEvent>,
    hash_sender: Option<Sender<u64>>,
    workers: Mutex<Vec<Arc<WorkerShared>>>,
    thread: Mutex<Option<Joinable<Result<(), MinerError>>>>,
    finished: Mutex<Option<Receiver<()>>>,
}

impl<L: Ledger + 'static> MintController<L> {
    /// Creates a stopped controller
    ///
    /// # Arguments
    /// * `ledger` - Remote ledger
    /// * `params` - Resolved minting parameters
    /// * `options` - Timing and queue settings
    pub fn new(ledger: Arc<L>, params: MintParams, options: ControllerOptions) -> Self {
        let (event_tx, event_rx) = crossbeam_channel::unbounded();
        MintController {
            ledger,
            params: Arc::new(params),
            options,
            shutdown: Shutdown::new(),
            event_tx,
            event_rx,
            hash_sender: None,
            workers: Mutex::new(Vec::new()),
            thread: Mutex::new(None),
            finished: Mutex::new(None),
        }
    }

    /// Feeds worker hash counts to a statistics listener
    pub fn with_hash_sender(mut self, sender: Sender<u64>) -> Self {
        self.hash_sender = Some(sender);
        self
    }

    /// Minting parameters
    pub fn params(&self) -> &MintParams {
        &self.params
    }

    /// Stream of controller notifications
    pub fn events(&self) -> Receiver<MintEvent> {
        self.event_rx.clone()
    }

    /// Channel that disconnects when the minting loop has ended
    pub fn finished(&self) -> Option<Receiver<()>> {
        self.finished.lock().ok().and_then(|f| f.clone())
    }

    /// Snapshot of every worker
    pub fn workers(&self) -> Vec<WorkerSnapshot> {
        match self.workers.lock() {
            Ok(workers) => workers.iter().map(|w| w.snapshot()).collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Opens the configured backends and starts minting
    ///
    /// GPU devices are opened here, on the calling thread; each backend is
    /// then moved to its worker thread.
    pub fn start(&self) -> Result<(), MinerError> {
        let algorithm = self.params.algorithm;
        let mut backends: Vec<(WorkerKind, Box<dyn HashSearch>)> = Vec::new();
        for _ in 0..self.params.cpu_threads {
            backends.push((WorkerKind::Cpu, Box::new(CpuSearch::new(algorithm)?)));
        }
        for spec in &self.params.gpu_devices {
            let device = gpu::open(&spec.info, algorithm, spec.groups)?;
            backends.push((
                WorkerKind::Gpu {
                    device: spec.info.index,
                },
                Box::new(GpuHashSearch::new(device, algorithm)?),
            ));
        }
        self.start_with(backends)
    }

    /// Starts minting with the given backends
    pub fn start_with(&self, backends: Vec<(WorkerKind, Box<dyn HashSearch>)>) -> Result<(), MinerError> {
        let mut thread = self
            .thread
            .lock()
            .map_err(|_| MinerError::TaskError("Controller state poisoned".into()))?;
        if thread.is_some() || self.shutdown.is_triggered() {
            return Err(MinerError::TaskError("Minting controller already started".into()));
        }
        if backends.is_empty() {
            return Err(MinerError::ConfigError("No workers configured".into()));
        }

        let state = MintState::initialize(self.ledger.as_ref(), &self.params)?;

        let (solution_tx, solution_rx) = crossbeam_channel::bounded(self.options.queue_capacity.max(1));
        let context = WorkerContext {
            units: self.params.units,
            account_id: self.params.account.account_id,
            solutions: solution_tx,
            shutdown: self.shutdown.clone(),
            hash_sender: self.hash_sender.clone(),
        };

        let mut handles = Vec::with_capacity(backends.len());
        for (id, (kind, backend)) in backends.into_iter().enumerate() {
            match WorkerHandle::spawn(id, kind, backend, context.clone()) {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    self.shutdown.trigger();
                    stop_workers(handles, self.options.shutdown_timeout);
                    return Err(e);
                }
            }
        }
        drop(context);

        if let Ok(mut workers) = self.workers.lock() {
            *workers = handles.iter().map(|h| h.shared().clone()).collect();
        }

        let run = ControllerRun {
            ledger: self.ledger.clone(),
            params: self.params.clone(),
            options: self.options,
            shutdown: self.shutdown.clone(),
            events: self.event_tx.clone(),
        };
        let joinable = Joinable::spawn("mint-controller".into(), move || run.run(state, handles, solution_rx))?;
        if let Ok(mut finished) = self.finished.lock() {
            *finished = Some(joinable.finished());
        }
        *thread = Some(joinable);
        Ok(())
    }

    /// Stops minting and waits for all threads
    ///
    /// Idempotent. Returns the error that ended the minting loop, if any.
    pub fn shutdown(&self) -> Result<(), MinerError> {
        self.shutdown.trigger();
        let joinable = match self.thread.lock() {
            Ok(mut thread) => thread.take(),
            Err(_) => None,
        };
        let Some(joinable) = joinable else {
            return Ok(());
        };
        let deadline = Instant::now() + self.options.shutdown_timeout + JOIN_MARGIN;
        match joinable.join_until(deadline)? {
            Some(result) => result,
            None => Err(MinerError::TaskError(format!(
                "Minting controller did not stop within {:?}",
                self.options.shutdown_timeout
            ))),
        }
    }
}

impl<L: Ledger + 'static> Drop for MintController<L> {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            log::error!("Minting controller stopped with error: {}", e);
        }
    }
}

/// Everything the controller thread owns
struct ControllerRun<L: Ledger + 'static> {
    ledger: Arc<L>,
    params: Arc<MintParams>,
    options: ControllerOptions,
    shutdown: Shutdown,
    events: Sender<MintEvent>,
}

impl<L: Ledger + 'static> ControllerRun<L> {
    fn run(
        self,
        mut state: MintState,
        workers: Vec<WorkerHandle>,
        solutions: Receiver<Solution>,
    ) -> Result<(), MinerError> {
        let result = self.mint_loop(&mut state, &workers, &solutions);
        match &result {
            Ok(()) => log::info!("Minting controller stopping"),
            Err(e) => log::error!("Minting controller terminated: {}", e),
        }

        self.shutdown.trigger();
        drop(solutions);
        stop_workers(workers, self.options.shutdown_timeout);
        if state.pending_len() > 0 {
            log::warn!("{} solutions were not submitted", state.pending_len());
        }
        result
    }

    fn emit(&self, event: MintEvent) {
        let _ = self.events.send(event);
    }

    fn mint_loop(
        &self,
        state: &mut MintState,
        workers: &[WorkerHandle],
        solutions: &Receiver<Solution>,
    ) -> Result<(), MinerError> {
        let ledger = self.ledger.as_ref();
        let params = self.params.as_ref();

        while !self.shutdown.is_triggered() {
            if state.should_collect(!solutions.is_empty()) {
                crossbeam_channel::select! {
                    recv(solutions) -> msg => {
                        let solution = msg.map_err(|_| {
                            MinerError::ChannelError("All workers have stopped".into())
                        })?;
                        let counter = solution.counter();
                        if state.accept(solution.clone()) {
                            log::debug!("Solution for counter {} added to pending queue", counter);
                            self.emit(MintEvent::SolutionAccepted(solution));
                        } else {
                            log::debug!("Stale solution for counter {} dropped", counter);
                        }
                    }
                    recv(self.shutdown.receiver()) -> _ => break,
                }
            }

            if !state.work_outstanding() {
                let target = ledger
                    .fetch_minting_target(params.currency_id, params.account.account_id, params.units)
                    .inspect_err(|e| log::error!("Unable to get new minting target: {}", e))?;
                let target = Arc::new(state.stamp_target(target));
                log::info!("Dispatching {}", target);
                for worker in workers {
                    worker.assign(target.clone());
                }
                self.emit(MintEvent::TargetDispatched {
                    counter: target.counter(),
                });
            }

            if state.pending_len() > 0 {
                let outcome = state.submit(ledger, params)?;
                let advanced = outcome.advanced();
                match outcome {
                    SubmitOutcome::Submitted(solution) => {
                        self.emit(MintEvent::SolutionSubmitted(solution))
                    }
                    SubmitOutcome::Rejected { solution, error } => {
                        self.emit(MintEvent::SolutionRejected {
                            solution,
                            reason: error.to_string(),
                        })
                    }
                    SubmitOutcome::Empty | SubmitOutcome::GateClosed | SubmitOutcome::Deferred(_) => {}
                }
                if !advanced && self.shutdown.wait_timeout(self.options.retry_delay) {
                    break;
                }
            }
        }
        Ok(())
    }
}

/// Interrupts every worker and joins them within `timeout`
fn stop_workers(workers: Vec<WorkerHandle>, timeout: Duration) {
    for worker in &workers {
        worker.stop();
    }
    let deadline = Instant::now() + timeout;
    let stuck = workers
        .into_iter()
        .map(|worker| worker.join_until(deadline))
        .filter(|stopped| !stopped)
        .count();
    if stuck > 0 {
        log::warn!("{} workers did not stop within {:?}", stuck, timeout);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use primitive_types::U256;

    fn solution(counter: u64, worker: usize) -> Solution {
        Solution::new(counter * 100 + worker as u64, counter, [0; 32], worker)
    }

    #[test]
    fn later_solution_for_same_counter_is_dropped() {
        let mut state = MintState::new(5);
        state.work_outstanding = true;
        assert!(state.accept(solution(5, 0)));
        assert!(!state.accept(solution(5, 1)));
        assert!(!state.accept(solution(4, 2)));
        assert_eq!(state.pending_len(), 1);
        assert_eq!(state.last_accepted(), Some(5));
        assert!(!state.work_outstanding());
    }

    #[test]
    fn stamping_advances_counter() {
        let mut state = MintState::new(7);
        let target = MintingTarget::new(1, U256::one(), [0xff; 32], 3);
        let stamped = state.stamp_target(target);
        assert_eq!(stamped.counter(), 7);
        assert_eq!(state.counter(), 8);
        assert!(state.work_outstanding());
    }

    #[test]
    fn collect_condition() {
        let mut state = MintState::new(0);
        assert!(!state.should_collect(true));
        state.work_outstanding = true;
        assert!(state.should_collect(false));
        state.pending.push_back(solution(1, 0));
        assert!(!state.should_collect(false));
        assert!(state.should_collect(true));
    }

    #[test]
    fn options_from_tuning() {
        let options = ControllerOptions::from(&TuningConfig::default());
        assert_eq!(options, ControllerOptions::default());
    }
}
