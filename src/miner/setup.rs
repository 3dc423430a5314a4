// src/miner/setup.rs
//! Minting parameters resolved at startup
//!
//! Combines the configuration with what the ledger reports about the chain,
//! the account and the currency. Every check here is fatal: minting never
//! starts with parameters that fail them.

use crate::config::Config;
use crate::miner::gpu::{self, GpuDeviceInfo, WorkGroups};
use crate::network::account::{AccountKeys, SecretPhrase};
use crate::network::ledger::{ChainInfo, Ledger};
use crate::types::AlgorithmType;
use crate::utils::amount::{format_units, to_base_units};
use crate::utils::error::MinerError;

/// A GPU device selected for minting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GpuWorkerSpec {
    /// Device description
    pub info: GpuDeviceInfo,
    /// Grid used for each kernel pass
    pub groups: WorkGroups,
}

/// Immutable minting parameters shared by the controller and its workers
#[derive(Debug, Clone)]
pub struct MintParams {
    /// Currency identifier
    pub currency_id: u64,
    /// Currency code
    pub currency_code: String,
    /// Currency decimals
    pub currency_decimals: u8,
    /// Fee chain
    pub chain: ChainInfo,
    /// Minting account
    pub account: AccountKeys,
    /// Account secret, used for signing
    pub secret: SecretPhrase,
    /// Units minted per transaction (base units)
    pub units: u64,
    /// Fee per transaction (chain base units)
    pub fee: u64,
    /// Minting algorithm
    pub algorithm: AlgorithmType,
    /// Number of CPU workers
    pub cpu_threads: usize,
    /// GPU workers
    pub gpu_devices: Vec<GpuWorkerSpec>,
}

impl MintParams {
    /// Resolves the parameters against the ledger
    ///
    /// # Arguments
    /// * `config` - Validated configuration
    /// * `ledger` - Ledger used for the chain, balance and currency lookups
    ///
    /// # Returns
    /// * `Err(MinerError)` - If any startup check fails
    pub fn resolve<L: Ledger + ?Sized>(config: &Config, ledger: &L) -> Result<Self, MinerError> {
        config.validate()?;
        let account = AccountKeys::from_secret(&config.secret_phrase)?;

        let chain = ledger.fetch_chain(&config.chain)?;
        let fee = to_base_units(&config.fee, chain.decimals.into())?;
        let balance = ledger.fetch_balance(account.account_id, chain.id)?;
        if balance < fee {
            return Err(MinerError::ConfigError(format!(
                "Account {} confirmed balance {} is less than the transaction fee {}",
                account.account_id,
                format_units(balance, chain.decimals.into()),
                format_units(fee, chain.decimals.into())
            )));
        }

        let currency = ledger.fetch_currency(&config.currency, chain.id)?;
        if !currency.is_mintable() {
            return Err(MinerError::ConfigError(format!(
                "Currency {} is not mintable",
                config.currency
            )));
        }
        let algorithm = currency.algorithm_type()?;
        if config.gpu_intensity > 0 && !algorithm.gpu_supported() {
            return Err(MinerError::ConfigError(format!(
                "Currency algorithm {} is not supported on the GPU",
                algorithm.id()
            )));
        }

        let units = to_base_units(&config.units, currency.decimals.into())?;
        let mintable = currency.max_supply.saturating_sub(currency.reserve_supply);
        if units == 0 {
            return Err(MinerError::ConfigError("Minting units must be greater than zero".into()));
        }
        if units > mintable {
            return Err(MinerError::ConfigError(format!(
                "Maximum minting units is {} for currency {}",
                format_units(mintable, currency.decimals.into()),
                config.currency
            )));
        }

        let gpu_devices = Self::select_gpus(config)?;

        Ok(MintParams {
            currency_id: currency.id,
            currency_code: currency.code,
            currency_decimals: currency.decimals,
            chain,
            account,
            secret: config.secret_phrase.clone(),
            units,
            fee,
            algorithm,
            cpu_threads: config.cpu_threads,
            gpu_devices,
        })
    }

    fn select_gpus(config: &Config) -> Result<Vec<GpuWorkerSpec>, MinerError> {
        let wanted = config.effective_gpu_devices();
        if wanted.is_empty() {
            return Ok(Vec::new());
        }

        let available = gpu::enumerate()?;
        for info in &available {
            log::info!(
                "GPU {}: {} ({}), {} compute units, max work group {}",
                info.index,
                info.name,
                info.platform,
                info.compute_units,
                info.max_work_group_size
            );
        }

        wanted
            .iter()
            .map(|device| {
                let info = available.get(device.device).ok_or_else(|| {
                    MinerError::ConfigError(format!("GPU device {} is not available", device.device))
                })?;
                Ok(GpuWorkerSpec {
                    info: info.clone(),
                    groups: WorkGroups::resolve(
                        info,
                        config.gpu_intensity,
                        device.work_group_size,
                        device.work_group_count,
                    ),
                })
            })
            .collect()
    }

    /// Human-readable minting summary for the startup log
    pub fn summary(&self) -> String {
        format!(
            "Minting {} {} per transaction with algorithm {}, fee {} {}, {} CPU and {} GPU workers",
            format_units(self.units, self.currency_decimals.into()),
            self.currency_code,
            self.algorithm,
            format_units(self.fee, self.chain.decimals.into()),
            self.chain.name,
            self.cpu_threads,
            self.gpu_devices.len()
        )
    }
}
