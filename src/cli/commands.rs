// src/cli/commands.rs
use crate::types::AlgorithmType;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Monetary System minter - proof-of-work currency minting in Rust
#[derive(Parser, Debug)]
#[command(name = "ms-minter-rs")]
#[command(version, about, long_about = None)]
pub struct Commands {
    /// The action to perform (start minting, run benchmarks, or generate config)
    #[command(subcommand)]
    pub action: Action,
}

/// Top-level commands for the minter application
#[derive(Subcommand, Debug)]
pub enum Action {
    /// Start minting with the specified options
    Start(StartOptions),

    /// Run performance benchmarks for minting algorithms
    Benchmark(BenchmarkOptions),

    /// Generate configuration file template
    Config(ConfigOptions),
}

/// Options for starting the minting operation
#[derive(Parser, Debug)]
pub struct StartOptions {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Number of CPU worker threads (overrides config)
    #[arg(short = 't', long)]
    pub cpu_threads: Option<usize>,

    /// GPU candidates per kernel pass, 0 disables the GPU (overrides config)
    #[arg(short, long)]
    pub gpu_intensity: Option<u32>,
}

/// Options for running algorithm benchmarks
#[derive(Parser, Debug)]
pub struct BenchmarkOptions {
    /// Algorithm to benchmark (sha256, sha3, scrypt or keccak25)
    #[arg(short, long)]
    pub algorithm: AlgorithmType,

    /// Duration of benchmark in seconds
    #[arg(short, long, default_value_t = 60)]
    pub duration: u64,

    /// Number of threads to use
    #[arg(short, long, default_value_t = num_cpus::get())]
    pub threads: usize,
}

/// Options for generating configuration files
#[derive(Parser, Debug)]
pub struct ConfigOptions {
    /// Output file path
    #[arg(short, long, default_value = "config.toml")]
    pub output: PathBuf,

    /// Include a GPU device section
    #[arg(short, long)]
    pub gpu: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_overrides() {
        let cli = Commands::parse_from(["ms-minter-rs", "start", "-c", "mint.toml", "-t", "2", "--gpu-intensity", "4096"]);
        match cli.action {
            Action::Start(opts) => {
                assert_eq!(opts.config, PathBuf::from("mint.toml"));
                assert_eq!(opts.cpu_threads, Some(2));
                assert_eq!(opts.gpu_intensity, Some(4096));
            }
            other => panic!("unexpected action {:?}", other),
        }
    }

    #[test]
    fn benchmark_algorithm_by_name() {
        let cli = Commands::parse_from(["ms-minter-rs", "benchmark", "-a", "sha3", "-d", "5", "-t", "1"]);
        match cli.action {
            Action::Benchmark(opts) => {
                assert_eq!(opts.algorithm, AlgorithmType::Sha3);
                assert_eq!(opts.duration, 5);
                assert_eq!(opts.threads, 1);
            }
            other => panic!("unexpected action {:?}", other),
        }
    }

    #[test]
    fn commands_are_consistent() {
        use clap::CommandFactory;
        Commands::command().debug_assert();
    }
}
