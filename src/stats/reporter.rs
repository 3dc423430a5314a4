// src/stats/reporter.rs
use crate::miner::controller::MintEvent;
use crate::miner::shutdown::Shutdown;
use crate::miner::worker::WorkerSnapshot;
use crossbeam_channel::{Receiver, Sender};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use sysinfo::{Components, System};

/// Statistics related to minting progress
#[derive(Debug, Clone, Default)]
pub struct MintingStats {
    /// Total number of hashes computed
    pub hashes_total: u64,
    /// Solutions that entered the pending queue
    pub solutions_accepted: u64,
    /// Minting transactions broadcast
    pub solutions_submitted: u64,
    /// Solutions refused by the ledger
    pub solutions_rejected: u64,
    /// Average hashrate since start (hashes per second)
    pub avg_hashrate: f64,
}

/// Statistics related to hardware performance
#[derive(Debug, Clone)]
pub struct HardwareStats {
    /// Current CPU usage percentage (0-100)
    pub cpu_usage: f32,
    /// Memory currently used (in bytes)
    pub memory_used: u64,
    /// Current CPU temperature in Celsius
    pub temperature: f32,
}

/// Collects and reports minting and hardware statistics
pub struct StatsReporter {
    /// Atomic counters for minting statistics
    stats: Arc<MintingStatsAtomic>,
    /// System information collector
    system: System,
    /// Hardware component information collector
    components: Components,
    /// Interval at which stats are reported
    report_interval: Duration,
}

/// Atomic version of MintingStats for thread-safe operations
struct MintingStatsAtomic {
    hashes: AtomicU64,
    accepted: AtomicU64,
    submitted: AtomicU64,
    rejected: AtomicU64,
    start_time: Instant,
}

impl StatsReporter {
    /// Creates a new StatsReporter with the specified reporting interval
    ///
    /// # Arguments
    /// * `report_interval` - How often to log statistics
    pub fn new(report_interval: Duration) -> Self {
        StatsReporter {
            stats: Arc::new(MintingStatsAtomic {
                hashes: AtomicU64::new(0),
                accepted: AtomicU64::new(0),
                submitted: AtomicU64::new(0),
                rejected: AtomicU64::new(0),
                start_time: Instant::now(),
            }),
            system: System::new_all(),
            components: Components::new_with_refreshed_list(),
            report_interval,
        }
    }

    /// Creates and returns a channel sender for hash counts
    ///
    /// The returned sender can be used to report completed hashes.
    /// The reporter will automatically listen for these events on a background thread.
    pub fn hash_sender(&self) -> Sender<u64> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.start_hashrate_listener(rx);
        tx
    }

    /// Counts controller notifications on a background thread
    ///
    /// The listener ends when the controller drops its event sender.
    pub fn watch_events(&self, events: Receiver<MintEvent>) {
        let stats = self.stats.clone();

        std::thread::spawn(move || {
            for event in events {
                match event {
                    MintEvent::SolutionAccepted(_) => {
                        stats.accepted.fetch_add(1, Ordering::Relaxed);
                    }
                    MintEvent::SolutionSubmitted(solution) => {
                        stats.submitted.fetch_add(1, Ordering::Relaxed);
                        log::info!(
                            "Counter {} minted in transaction {}",
                            solution.counter(),
                            solution.tx_id().map_or_else(|| "-".to_string(), |id| id.to_string())
                        );
                    }
                    MintEvent::SolutionRejected { .. } => {
                        stats.rejected.fetch_add(1, Ordering::Relaxed);
                    }
                    MintEvent::TargetDispatched { .. } => {}
                }
            }
        });
    }

    /// Gets the current minting statistics
    ///
    /// # Returns
    /// A snapshot of the current minting statistics
    pub fn get_stats(&self) -> MintingStats {
        let total_seconds = self.stats.start_time.elapsed().as_secs_f64();
        let hashes = self.stats.hashes.load(Ordering::Relaxed);

        MintingStats {
            hashes_total: hashes,
            solutions_accepted: self.stats.accepted.load(Ordering::Relaxed),
            solutions_submitted: self.stats.submitted.load(Ordering::Relaxed),
            solutions_rejected: self.stats.rejected.load(Ordering::Relaxed),
            avg_hashrate: if total_seconds > 0.0 {
                hashes as f64 / total_seconds
            } else {
                0.0
            },
        }
    }

    /// Gets the current hardware statistics
    ///
    /// This refreshes system information before returning the stats.
    ///
    /// # Returns
    /// A snapshot of the current hardware statistics
    pub fn get_hardware_stats(&mut self) -> HardwareStats {
        self.system.refresh_cpu_all();
        self.system.refresh_memory();
        self.components.refresh(true);

        let cpus = self.system.cpus();
        let cpu_usage = if cpus.is_empty() {
            0.0
        } else {
            cpus.iter().map(|c| c.cpu_usage()).sum::<f32>() / cpus.len() as f32
        };

        let temperature = self
            .components
            .iter()
            .find(|c| c.label().contains("CPU"))
            .and_then(|c| c.temperature())
            .unwrap_or(0.0);

        HardwareStats {
            cpu_usage,
            memory_used: self.system.used_memory(),
            temperature,
        }
    }

    /// Starts the periodic reporting of statistics
    ///
    /// This spawns a background thread that logs stats at the configured
    /// interval until `shutdown` is triggered.
    ///
    /// # Arguments
    /// * `workers` - Source of per-worker snapshots
    /// * `shutdown` - Stops the reporting thread
    pub fn start_reporting<F>(&self, workers: F, shutdown: Shutdown)
    where
        F: Fn() -> Vec<WorkerSnapshot> + Send + 'static,
    {
        let stats = self.stats.clone();
        let interval = self.report_interval;

        std::thread::spawn(move || {
            let mut reporter = StatsReporter {
                stats,
                system: System::new_all(),
                components: Components::new_with_refreshed_list(),
                report_interval: interval,
            };
            let mut last_hashes = 0u64;
            let mut last_time = Instant::now();

            while !shutdown.wait_timeout(reporter.report_interval) {
                let minting_stats = reporter.get_stats();
                let hw_stats = reporter.get_hardware_stats();
                let elapsed = last_time.elapsed().as_secs_f64();
                let recent = if elapsed > 0.0 {
                    minting_stats.hashes_total.saturating_sub(last_hashes) as f64 / elapsed
                } else {
                    0.0
                };
                last_hashes = minting_stats.hashes_total;
                last_time = Instant::now();

                log::info!(
                    "Hashrate: {} (avg {}) | Accepted/Submitted/Rejected: {}/{}/{} | CPU: {:.1}% | Temp: {:.1}°C",
                    format_rate(recent),
                    format_rate(minting_stats.avg_hashrate),
                    minting_stats.solutions_accepted,
                    minting_stats.solutions_submitted,
                    minting_stats.solutions_rejected,
                    hw_stats.cpu_usage,
                    hw_stats.temperature
                );
                for worker in workers() {
                    log::info!(
                        "  Worker {} ({}): {:?}, {}, {} solutions",
                        worker.id,
                        worker.kind,
                        worker.state,
                        format_rate(worker.hash_rate),
                        worker.solutions
                    );
                }
            }
        });
    }

    /// Starts a listener for hash counts on a background thread
    fn start_hashrate_listener(&self, receiver: Receiver<u64>) {
        let stats = self.stats.clone();

        std::thread::spawn(move || {
            for count in receiver {
                stats.hashes.fetch_add(count, Ordering::Relaxed);
            }
        });
    }
}

/// Formats a hash rate with a metric prefix
pub fn format_rate(rate: f64) -> String {
    if rate >= 1e9 {
        format!("{:.2} GH/s", rate / 1e9)
    } else if rate >= 1e6 {
        format!("{:.2} MH/s", rate / 1e6)
    } else if rate >= 1e3 {
        format!("{:.2} KH/s", rate / 1e3)
    } else {
        format!("{:.2} H/s", rate)
    }
}
