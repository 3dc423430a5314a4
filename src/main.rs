// src/main.rs
use clap::Parser;
use ms_minter_rs::miner::algorithm::{CpuSearch, HashSearch};
use ms_minter_rs::miner::controller::ControllerOptions;
use ms_minter_rs::types::{HASH_LEN, INPUT_LEN};
use ms_minter_rs::utils::logging::init_bench_logging;
use ms_minter_rs::{self, *};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::runtime::Runtime;

/// Candidates per benchmark search call
const BENCH_BATCH: u64 = 4096;

/// Main entry point for the minter
///
/// # Returns
/// - `Ok(())` on successful execution
/// - `Err(MinerError)` if any operation fails
///
/// # Flow
/// 1. Parses command line arguments
/// 2. Delegates to appropriate subcommand handler
/// 3. Propagates any errors upward
fn main() -> Result<(), MinerError> {
    let cli = cli::Commands::parse();

    match cli.action {
        cli::Action::Start(opts) => start_minting(opts),
        cli::Action::Benchmark(opts) => run_benchmark(opts),
        cli::Action::Config(opts) => generate_config(opts),
    }
}

/// Starts minting with the given configuration options
///
/// # Arguments
/// * `opts` - Command line options for the minting operation
///
/// # Operations
/// 1. Initializes logging
/// 2. Loads and validates configuration
/// 3. Resolves the minting parameters against the node
/// 4. Sets up statistics reporting
/// 5. Runs the controller until interrupted or until it fails
fn start_minting(opts: cli::StartOptions) -> Result<(), MinerError> {
    utils::init_logging();
    log::info!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));

    let mut config = config::load(&opts.config)?;
    // Apply CLI overrides
    if let Some(threads) = opts.cpu_threads {
        config.cpu_threads = threads;
    }
    if let Some(intensity) = opts.gpu_intensity {
        config.gpu_intensity = intensity;
    }
    config.validate()?;

    let node = Arc::new(NodeClient::new(&config.node)?);
    log::info!("Using node API at {}", node.url());

    let params = MintParams::resolve(&config, node.as_ref())?;
    log::info!("Minting account {}", params.account.account_id);
    log::info!("{}", params.summary());

    // Statistics reporting
    let reporter = stats::StatsReporter::new(config.tuning.stats_interval());
    let controller = Arc::new(
        MintController::new(node, params, ControllerOptions::from(&config.tuning))
            .with_hash_sender(reporter.hash_sender()),
    );
    reporter.watch_events(controller.events());

    controller.start()?;
    let finished = controller
        .finished()
        .ok_or_else(|| MinerError::TaskError("Minting controller did not start".into()))?;

    let stats_stop = miner::Shutdown::new();
    let snapshots = controller.clone();
    reporter.start_reporting(move || snapshots.workers(), stats_stop.clone());

    // Runtime setup, only used to watch for Ctrl-C
    let rt = Runtime::new()?;
    let (signal_tx, signal_rx) = crossbeam_channel::bounded::<()>(1);
    rt.spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                let _ = signal_tx.send(());
            }
            Err(e) => {
                log::error!("Unable to listen for Ctrl-C: {}", e);
                // keep the sender alive so the select below does not fire
                std::future::pending::<()>().await;
                drop(signal_tx);
            }
        }
    });

    crossbeam_channel::select! {
        recv(signal_rx) -> _ => log::info!("Interrupt received, stopping minting"),
        recv(finished) -> _ => log::warn!("Minting loop ended"),
    }

    let result = controller.shutdown();
    stats_stop.trigger();
    rt.shutdown_background();

    let stats = reporter.get_stats();
    log::info!(
        "Submitted {} minting transactions, {} rejected, {} hashes",
        stats.solutions_submitted,
        stats.solutions_rejected,
        stats.hashes_total
    );
    result
}

/// Runs minting algorithm benchmarks
///
/// # Arguments
/// * `opts` - Benchmark configuration options
///
/// # Operations
/// 1. Initializes benchmark-specific logging
/// 2. Spawns CPU searches against an unreachable target
/// 3. Stops them after the requested duration
/// 4. Reports performance statistics
fn run_benchmark(opts: cli::BenchmarkOptions) -> Result<(), MinerError> {
    init_bench_logging();

    let reporter = stats::StatsReporter::new(Duration::from_secs(5));
    let hash_sender = reporter.hash_sender();
    let cancel = Arc::new(AtomicBool::new(false));

    log::info!(
        "Starting {} benchmark for {} seconds on {} threads",
        opts.algorithm,
        opts.duration,
        opts.threads
    );

    let handles = (0..opts.threads.max(1))
        .map(|index| {
            let sender = hash_sender.clone();
            let cancel = cancel.clone();
            let mut search = CpuSearch::with_batch(opts.algorithm, BENCH_BATCH)?;
            std::thread::Builder::new()
                .name(format!("bench-{}", index))
                .spawn(move || {
                    let input = [0u8; INPUT_LEN];
                    let target = [0u8; HASH_LEN];
                    let mut nonce = 0u64;
                    let mut last_log = Instant::now();
                    let mut hashes = 0u64;

                    while !cancel.load(Ordering::Relaxed) {
                        let outcome = match search.search(&input, &target, nonce, &cancel) {
                            Ok(outcome) => outcome,
                            Err(e) => {
                                log::error!("Benchmark thread {} failed: {}", index, e);
                                break;
                            }
                        };
                        nonce = outcome.last_nonce;
                        hashes += outcome.hash_count;
                        let _ = sender.send(outcome.hash_count);

                        // Log progress every second
                        if last_log.elapsed().as_secs() >= 1 {
                            log::debug!(
                                "Thread {}: {}",
                                index,
                                stats::format_rate(hashes as f64 / last_log.elapsed().as_secs_f64())
                            );
                            hashes = 0;
                            last_log = Instant::now();
                        }
                    }
                })
                .map_err(MinerError::from)
        })
        .collect::<Result<Vec<_>, _>>()?;
    drop(hash_sender);

    std::thread::sleep(Duration::from_secs(opts.duration));
    cancel.store(true, Ordering::Relaxed);

    // Wait for all threads to complete
    for handle in handles {
        if handle.join().is_err() {
            log::error!("A benchmark thread panicked");
        }
    }

    // Report final results
    let stats = reporter.get_stats();
    log::info!("Benchmark results:");
    log::info!("Total hashes: {}", stats.hashes_total);
    log::info!("Average hashrate: {}", stats::format_rate(stats.avg_hashrate));
    log::logger().flush(); // Ensure final results appear

    Ok(())
}

/// Generates configuration template file
///
/// # Arguments
/// * `opts` - Configuration generation options
///
/// # Operations
/// 1. Generates template content based on options
/// 2. Writes template to specified output file
fn generate_config(opts: cli::ConfigOptions) -> Result<(), MinerError> {
    let config = config::generate_template(opts.gpu);
    std::fs::write(&opts.output, config)?;
    println!("Configuration template written to {}", opts.output.display());
    Ok(())
}
