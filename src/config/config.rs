// src/config/config.rs
use crate::{
    miner::gpu::{DEFAULT_WORK_GROUP_SIZE, MAX_INTENSITY},
    network::{account::SecretPhrase, node::NodeConfig},
    utils::{amount::to_base_units, error::MinerError},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure for the minting application
///
/// Contains everything needed to start minting: the node connection, the
/// account secret, what to mint, and how many CPU and GPU workers to run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Ledger node connection
    #[serde(default)]
    pub node: NodeConfig,

    /// Secret phrase of the minting account
    #[serde(default)]
    pub secret_phrase: SecretPhrase,

    /// Child chain paying the fee (default: IGNIS)
    #[serde(default = "default_chain")]
    pub chain: String,

    /// Code of the currency to mint
    pub currency: String,

    /// Units minted per transaction, as a decimal string
    pub units: String,

    /// Transaction fee in whole coins, as a decimal string
    /// (default: 1)
    #[serde(default = "default_fee")]
    pub fee: String,

    /// Number of CPU worker threads
    /// (default: number of CPU cores)
    #[serde(default = "default_cpu_threads")]
    pub cpu_threads: usize,

    /// Candidates per GPU kernel pass; 0 disables GPU mining
    #[serde(default)]
    pub gpu_intensity: u32,

    /// GPU devices to use when `gpu_intensity` is non-zero
    #[serde(default)]
    pub gpu_devices: Vec<GpuDeviceConfig>,

    /// Timing and queue tuning
    #[serde(default)]
    pub tuning: TuningConfig,
}

/// One GPU device entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GpuDeviceConfig {
    /// Device index as listed at startup
    #[serde(default)]
    pub device: usize,

    /// Work items per work group (default: 256)
    #[serde(default = "default_work_group_size")]
    pub work_group_size: usize,

    /// Work groups per pass; 0 derives the count from the intensity
    #[serde(default)]
    pub work_group_count: usize,
}

impl Default for GpuDeviceConfig {
    fn default() -> Self {
        GpuDeviceConfig {
            device: 0,
            work_group_size: DEFAULT_WORK_GROUP_SIZE,
            work_group_count: 0,
        }
    }
}

/// Timing and queue settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TuningConfig {
    /// Seconds between submission attempts while the gate is closed
    pub retry_delay_secs: u64,
    /// Seconds to wait for threads to stop on shutdown
    pub shutdown_timeout_secs: u64,
    /// Capacity of the solution queue
    pub solution_queue: usize,
    /// Seconds between statistics reports
    pub stats_interval_secs: u64,
}

impl Default for TuningConfig {
    fn default() -> Self {
        TuningConfig {
            retry_delay_secs: 30,
            shutdown_timeout_secs: 60,
            solution_queue: 10,
            stats_interval_secs: 60,
        }
    }
}

impl TuningConfig {
    /// Retry delay as a duration
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    /// Shutdown timeout as a duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    /// Statistics interval as a duration
    pub fn stats_interval(&self) -> Duration {
        Duration::from_secs(self.stats_interval_secs)
    }
}

fn default_chain() -> String {
    "IGNIS".into()
}

fn default_fee() -> String {
    "1".into()
}

fn default_cpu_threads() -> usize {
    num_cpus::get()
}

fn default_work_group_size() -> usize {
    DEFAULT_WORK_GROUP_SIZE
}

impl Config {
    /// Loads configuration from a file
    ///
    /// # Arguments
    /// * `path` - Path to the configuration file (TOML format)
    ///
    /// # Returns
    /// * `Ok(Config)` - Successfully loaded configuration
    /// * `Err(MinerError)` - If file couldn't be read or parsed
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, MinerError> {
        let path = path.into();
        let config_str = std::fs::read_to_string(&path).map_err(|e| {
            MinerError::ConfigError(format!(
                "Failed to read config at {}: {}",
                path.display(),
                e
            ))
        })?;

        Self::parse(&config_str)
    }

    /// Parses configuration from TOML text
    pub fn parse(text: &str) -> Result<Self, MinerError> {
        toml::from_str(text)
            .map_err(|e| MinerError::ConfigError(format!("Invalid config format: {}", e)))
    }

    /// Checks the settings that do not need the ledger
    ///
    /// Amount strings are checked for syntax only; their scale depends on
    /// the chain and currency decimals.
    pub fn validate(&self) -> Result<(), MinerError> {
        if self.secret_phrase.is_empty() {
            return Err(MinerError::ConfigError("secret_phrase must be specified".into()));
        }
        let code_len = self.currency.chars().count();
        if !(3..=5).contains(&code_len) {
            return Err(MinerError::ConfigError(format!(
                "Currency code '{}' must be 3 to 5 characters",
                self.currency
            )));
        }
        if self.chain.trim().is_empty() {
            return Err(MinerError::ConfigError("chain must not be empty".into()));
        }
        if self.gpu_intensity > MAX_INTENSITY {
            return Err(MinerError::ConfigError(format!(
                "gpu_intensity {} exceeds the maximum of {}",
                self.gpu_intensity, MAX_INTENSITY
            )));
        }
        if self.cpu_threads == 0 && self.gpu_intensity == 0 {
            return Err(MinerError::ConfigError(
                "No workers configured: set cpu_threads or gpu_intensity".into(),
            ));
        }
        if self.node.port == 0 {
            return Err(MinerError::ConfigError("node.port must not be 0".into()));
        }
        self.node.check_transport()?;
        if self.tuning.solution_queue == 0 {
            return Err(MinerError::ConfigError(
                "tuning.solution_queue must be at least 1".into(),
            ));
        }
        // syntax only; the largest scale the ledger uses is 8 decimals
        to_base_units(&self.units, 8)?;
        to_base_units(&self.fee, 8)?;
        Ok(())
    }

    /// GPU devices to open, falling back to device 0 with default sizing
    pub fn effective_gpu_devices(&self) -> Vec<GpuDeviceConfig> {
        if self.gpu_intensity == 0 {
            Vec::new()
        } else if self.gpu_devices.is_empty() {
            vec![GpuDeviceConfig::default()]
        } else {
            self.gpu_devices.clone()
        }
    }

    /// Generates a configuration template string
    ///
    /// # Arguments
    /// * `gpu` - Include a GPU device section
    ///
    /// # Returns
    /// String containing a commented TOML configuration template
    pub fn generate_template(gpu: bool) -> String {
        let mut template = String::new();
        template.push_str("# Monetary System Minter Configuration\n\n");
        template.push_str("# Secret phrase of the minting account\n");
        template.push_str("secret_phrase = \"your secret phrase\"\n");
        template.push_str("# Child chain paying the transaction fee\n");
        template.push_str("chain = \"IGNIS\"\n");
        template.push_str("# Currency code (3 to 5 characters)\n");
        template.push_str("currency = \"MINT\"\n");
        template.push_str("# Units minted per transaction\n");
        template.push_str("units = \"1\"\n");
        template.push_str("# Transaction fee in whole coins\n");
        template.push_str("fee = \"1\"\n");
        template.push_str("# Number of CPU worker threads (0 = none)\n");
        template.push_str(&format!("cpu_threads = {}\n", num_cpus::get()));
        template.push_str("# Candidates per GPU kernel pass (0 = no GPU mining, maximum 1048576)\n");
        template.push_str(&format!(
            "gpu_intensity = {}\n\n",
            if gpu { 1 << 20 } else { 0 }
        ));

        template.push_str("[node]\n");
        template.push_str("host = \"localhost\"\n");
        template.push_str("port = 27876\n");
        template.push_str("# Required for remote nodes; local nodes always use plain HTTP\n");
        template.push_str("use_tls = false\n");
        template.push_str("accept_invalid_certs = false\n\n");

        if gpu {
            template.push_str("# One section per GPU device\n");
            template.push_str("[[gpu_devices]]\n");
            template.push_str("device = 0\n");
            template.push_str("work_group_size = 256\n");
            template.push_str("# 0 = derived from gpu_intensity\n");
            template.push_str("work_group_count = 0\n\n");
        }

        template.push_str("[tuning]\n");
        template.push_str("# Seconds between submission attempts\n");
        template.push_str("retry_delay_secs = 30\n");
        template.push_str("shutdown_timeout_secs = 60\n");
        template.push_str("# Solutions buffered between workers and the controller\n");
        template.push_str("solution_queue = 10\n");
        template.push_str("stats_interval_secs = 60\n");

        template
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MINIMAL: &str = r#"
        secret_phrase = "alpha beta gamma"
        currency = "MINT"
        units = "2.5"
        cpu_threads = 2
    "#;

    #[test]
    fn defaults_are_applied() {
        let config = Config::parse(MINIMAL).unwrap();
        assert_eq!(config.chain, "IGNIS");
        assert_eq!(config.fee, "1");
        assert_eq!(config.node.port, 27876);
        assert_eq!(config.node.host, "localhost");
        assert_eq!(config.gpu_intensity, 0);
        assert_eq!(config.tuning, TuningConfig::default());
        assert!(config.effective_gpu_devices().is_empty());
        config.validate().unwrap();
    }

    #[test]
    fn gpu_defaults_to_device_zero() {
        let mut config = Config::parse(MINIMAL).unwrap();
        config.gpu_intensity = 4096;
        assert_eq!(config.effective_gpu_devices(), vec![GpuDeviceConfig::default()]);
    }

    #[test]
    fn rejects_invalid_settings() {
        let mut config = Config::parse(MINIMAL).unwrap();
        config.currency = "TOOLONG".into();
        assert!(config.validate().is_err());

        let mut config = Config::parse(MINIMAL).unwrap();
        config.gpu_intensity = MAX_INTENSITY + 1;
        assert!(config.validate().is_err());

        let mut config = Config::parse(MINIMAL).unwrap();
        config.secret_phrase = SecretPhrase::default();
        assert!(config.validate().is_err());

        let mut config = Config::parse(MINIMAL).unwrap();
        config.units = "abc".into();
        assert!(config.validate().is_err());

        let mut config = Config::parse(MINIMAL).unwrap();
        config.node.host = "node.example.org".into();
        assert!(config.validate().is_err());
        config.node.use_tls = true;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn template_round_trips() {
        let config = Config::parse(&Config::generate_template(true)).unwrap();
        assert_eq!(config.gpu_devices.len(), 1);
        assert_eq!(config.gpu_devices[0].work_group_size, 256);
        config.validate().unwrap();
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(MINIMAL.as_bytes()).unwrap();
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.currency, "MINT");
        assert!(Config::load("/nonexistent/minter.toml").is_err());
    }
}
