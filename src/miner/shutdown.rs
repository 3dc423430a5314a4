// src/miner/shutdown.rs
//! Cooperative cancellation and bounded joins
//!
//! [`Shutdown`] is a cloneable token. Triggering it sets a flag and drops
//! the only sender of an internal channel, so every thread blocked in
//! `select!` or [`Shutdown::wait_timeout`] wakes immediately.

use crate::utils::error::MinerError;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle, Thread};
use std::time::{Duration, Instant};

/// Idempotent shutdown signal shared by the controller and its workers
#[derive(Clone)]
pub struct Shutdown {
    flag: Arc<AtomicBool>,
    sender: Arc<Mutex<Option<Sender<()>>>>,
    receiver: Receiver<()>,
}

impl Shutdown {
    /// Creates an untriggered token
    pub fn new() -> Self {
        let (tx, rx) = crossbeam_channel::bounded(0);
        Shutdown {
            flag: Arc::new(AtomicBool::new(false)),
            sender: Arc::new(Mutex::new(Some(tx))),
            receiver: rx,
        }
    }

    /// Raises the signal; later calls have no effect
    pub fn trigger(&self) {
        if !self.flag.swap(true, Ordering::SeqCst) {
            log::debug!("Shutdown requested");
        }
        if let Ok(mut sender) = self.sender.lock() {
            sender.take();
        }
    }

    /// Whether the signal has been raised
    pub fn is_triggered(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Channel that disconnects when the signal is raised
    ///
    /// Intended for `crossbeam_channel::select!`; it never carries a message.
    pub fn receiver(&self) -> &Receiver<()> {
        &self.receiver
    }

    /// Sleeps for `timeout` unless the signal is raised first
    ///
    /// Returns true when woken by the signal.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        if self.is_triggered() {
            return true;
        }
        match self.receiver.recv_timeout(timeout) {
            Err(RecvTimeoutError::Timeout) => self.is_triggered(),
            _ => true,
        }
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// A named thread whose exit can be awaited with a deadline
pub struct Joinable<T> {
    handle: JoinHandle<T>,
    done: Receiver<()>,
}

impl<T: Send + 'static> Joinable<T> {
    /// Spawns `f` on a new named thread
    pub fn spawn<F>(name: String, f: F) -> Result<Self, MinerError>
    where
        F: FnOnce() -> T + Send + 'static,
    {
        let (done_tx, done_rx) = crossbeam_channel::bounded::<()>(0);
        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                let _done = done_tx;
                f()
            })
            .map_err(|e| MinerError::TaskError(format!("Unable to start thread {}: {}", name, e)))?;
        Ok(Joinable {
            handle,
            done: done_rx,
        })
    }

    /// Handle used to unpark the thread
    pub fn thread(&self) -> &Thread {
        self.handle.thread()
    }

    /// Channel that disconnects when the thread function returns
    pub fn finished(&self) -> Receiver<()> {
        self.done.clone()
    }

    /// Joins the thread if it exits before `deadline`
    ///
    /// Returns `Ok(None)` when the deadline passes; the thread is detached.
    pub fn join_until(self, deadline: Instant) -> Result<Option<T>, MinerError> {
        let name = self.handle.thread().name().unwrap_or("unnamed").to_string();
        match self.done.recv_deadline(deadline) {
            Err(RecvTimeoutError::Timeout) => {
                log::warn!("Thread {} did not stop in time", name);
                Ok(None)
            }
            _ => self
                .handle
                .join()
                .map(Some)
                .map_err(|_| MinerError::TaskError(format!("Thread {} panicked", name))),
        }
    }
}
