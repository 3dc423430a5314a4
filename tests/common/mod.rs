// tests/common/mod.rs
//! In-memory ledger shared by the integration tests
#![allow(dead_code)]

use ms_minter_rs::miner::setup::MintParams;
use ms_minter_rs::miner::target::MintingTarget;
use ms_minter_rs::network::account::{AccountKeys, SecretPhrase};
use ms_minter_rs::network::ledger::{
    ChainInfo, CurrencyInfo, Ledger, MINTING_TX_SUBTYPE, MINTING_TX_TYPE, MintRequest, TransactionView,
    UnconfirmedTransaction, UnsignedTransaction,
};
use ms_minter_rs::types::{AlgorithmType, HASH_LEN};
use ms_minter_rs::utils::error::MinerError;
use primitive_types::U256;
use std::collections::VecDeque;
use std::sync::Mutex;

pub const CURRENCY_ID: u64 = 42;
pub const CHAIN_ID: u32 = 2;
pub const UNITS: u64 = 100;
pub const FEE: u64 = 100_000_000;

/// Scripted ledger state; tests mutate it through [`MockLedger::update`]
pub struct Script {
    pub counter: u64,
    pub target: [u8; HASH_LEN],
    pub height: u64,
    pub unconfirmed: usize,
    pub unconfirmed_fails: bool,
    pub target_fails: bool,
    pub build_errors: VecDeque<MinerError>,
    pub broadcast_errors: VecDeque<MinerError>,
    pub wrong_fee: bool,
    pub built: Vec<MintRequest>,
    pub broadcasts: Vec<u64>,
    pub chain: ChainInfo,
    pub balance: u64,
    pub currency: CurrencyInfo,
}

pub struct MockLedger {
    script: Mutex<Script>,
}

impl MockLedger {
    pub fn new() -> Self {
        MockLedger {
            script: Mutex::new(Script {
                counter: 7,
                target: [0xff; HASH_LEN],
                height: 10,
                unconfirmed: 0,
                unconfirmed_fails: false,
                target_fails: false,
                build_errors: VecDeque::new(),
                broadcast_errors: VecDeque::new(),
                wrong_fee: false,
                built: Vec::new(),
                broadcasts: Vec::new(),
                chain: ChainInfo {
                    name: "IGNIS".into(),
                    id: CHAIN_ID,
                    decimals: 8,
                },
                balance: 10 * FEE,
                currency: CurrencyInfo {
                    id: CURRENCY_ID,
                    code: "MINT".into(),
                    decimals: 2,
                    algorithm: AlgorithmType::Sha256.id(),
                    types: vec!["EXCHANGEABLE".into(), "MINTABLE".into()],
                    max_supply: 1_000_000,
                    reserve_supply: 0,
                },
            }),
        }
    }

    pub fn update<R>(&self, f: impl FnOnce(&mut Script) -> R) -> R {
        let mut script = self.script.lock().unwrap();
        f(&mut script)
    }

    /// Counters of the minting transactions built so far
    pub fn built_counters(&self) -> Vec<u64> {
        self.update(|s| s.built.iter().map(|r| r.counter).collect())
    }

    pub fn broadcast_count(&self) -> usize {
        self.update(|s| s.broadcasts.len())
    }
}

impl Ledger for MockLedger {
    fn fetch_minting_target(
        &self,
        currency_id: u64,
        _account_id: u64,
        _units: u64,
    ) -> Result<MintingTarget, MinerError> {
        self.update(|s| {
            if s.target_fails {
                return Err(MinerError::ConnectionError("node unreachable".into()));
            }
            Ok(MintingTarget::new(currency_id, U256::one(), s.target, s.counter))
        })
    }

    fn fetch_unconfirmed_transactions(
        &self,
        _account_id: u64,
        _chain: u32,
    ) -> Result<Vec<UnconfirmedTransaction>, MinerError> {
        self.update(|s| {
            if s.unconfirmed_fails {
                return Err(MinerError::ConnectionError("node unreachable".into()));
            }
            Ok((0..s.unconfirmed)
                .map(|i| UnconfirmedTransaction {
                    full_hash: format!("{:064x}", i),
                    tx_type: MINTING_TX_TYPE,
                    subtype: MINTING_TX_SUBTYPE,
                })
                .collect())
        })
    }

    fn fetch_blockchain_height(&self) -> Result<u64, MinerError> {
        Ok(self.update(|s| s.height))
    }

    fn build_mint_transaction(&self, request: &MintRequest) -> Result<UnsignedTransaction, MinerError> {
        self.update(|s| {
            if let Some(error) = s.build_errors.pop_front() {
                return Err(error);
            }
            s.built.push(request.clone());
            Ok(UnsignedTransaction {
                bytes: request.counter.to_le_bytes().to_vec(),
                view: TransactionView {
                    sender: ms_minter_rs::network::account::account_id(&request.public_key),
                    chain: request.chain,
                    amount: 0,
                    fee: if s.wrong_fee { request.fee + 1 } else { request.fee },
                    tx_type: MINTING_TX_TYPE,
                    subtype: MINTING_TX_SUBTYPE,
                    currency_id: request.currency_id,
                    counter: request.counter,
                },
            })
        })
    }

    fn sign(&self, transaction: &[u8], _secret: &SecretPhrase) -> Result<Vec<u8>, MinerError> {
        let mut signed = transaction.to_vec();
        signed.extend_from_slice(&[0xaa; 64]);
        Ok(signed)
    }

    fn broadcast(&self, signed: &[u8]) -> Result<u64, MinerError> {
        self.update(|s| {
            if let Some(error) = s.broadcast_errors.pop_front() {
                return Err(error);
            }
            let mut counter = [0u8; 8];
            counter.copy_from_slice(&signed[..8]);
            let tx_id = 1_000 + u64::from_le_bytes(counter);
            s.broadcasts.push(tx_id);
            Ok(tx_id)
        })
    }

    fn fetch_chain(&self, name: &str) -> Result<ChainInfo, MinerError> {
        self.update(|s| {
            if s.chain.name == name {
                Ok(s.chain.clone())
            } else {
                Err(MinerError::ConfigError(format!("Chain {} not found", name)))
            }
        })
    }

    fn fetch_balance(&self, _account_id: u64, _chain: u32) -> Result<u64, MinerError> {
        Ok(self.update(|s| s.balance))
    }

    fn fetch_currency(&self, code: &str, _chain: u32) -> Result<CurrencyInfo, MinerError> {
        self.update(|s| {
            if s.currency.code == code {
                Ok(s.currency.clone())
            } else {
                Err(MinerError::Rejected {
                    request: "getCurrency".into(),
                    code: 5,
                    description: "Unknown currency".into(),
                })
            }
        })
    }
}

pub fn secret() -> SecretPhrase {
    SecretPhrase::new("integration test secret phrase")
}

/// Parameters matching the default [`MockLedger`] script
pub fn params(cpu_threads: usize) -> MintParams {
    MintParams {
        currency_id: CURRENCY_ID,
        currency_code: "MINT".into(),
        currency_decimals: 2,
        chain: ChainInfo {
            name: "IGNIS".into(),
            id: CHAIN_ID,
            decimals: 8,
        },
        account: AccountKeys::from_secret(&secret()).unwrap(),
        secret: secret(),
        units: UNITS,
        fee: FEE,
        algorithm: AlgorithmType::Sha256,
        cpu_threads,
        gpu_devices: Vec::new(),
    }
}

pub fn rejection() -> MinerError {
    MinerError::Rejected {
        request: "broadcastTransaction".into(),
        code: 4,
        description: "Incorrect counter".into(),
    }
}
