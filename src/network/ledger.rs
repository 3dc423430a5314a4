// src/network/ledger.rs
//! The remote ledger as seen by the minter
//!
//! [`Ledger`] is the seam between the mining core and the network. The
//! controller and startup code only talk to this trait; [`NodeClient`]
//! implements it over HTTP and tests implement it in memory.
//!
//! [`NodeClient`]: crate::network::NodeClient

use crate::miner::target::MintingTarget;
use crate::network::account::SecretPhrase;
use crate::types::AlgorithmType;
use crate::utils::error::MinerError;

/// Transaction type of a currency minting transaction
pub const MINTING_TX_TYPE: u8 = 5;

/// Transaction subtype of a currency minting transaction
pub const MINTING_TX_SUBTYPE: u8 = 7;

/// Currency type name marking a mintable currency
pub const CURRENCY_MINTABLE: &str = "MINTABLE";

/// Chain definition from the ledger constants
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainInfo {
    /// Chain name, e.g. `IGNIS`
    pub name: String,
    /// Chain identifier
    pub id: u32,
    /// Decimal places of the chain coin
    pub decimals: u8,
}

/// Currency definition returned by `getCurrency`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrencyInfo {
    /// Currency identifier
    pub id: u64,
    /// Currency code
    pub code: String,
    /// Decimal places of the currency
    pub decimals: u8,
    /// Minting algorithm identifier
    pub algorithm: u32,
    /// Currency type names, e.g. `EXCHANGEABLE`, `MINTABLE`
    pub types: Vec<String>,
    /// Maximum supply in base units
    pub max_supply: u64,
    /// Reserve supply in base units
    pub reserve_supply: u64,
}

impl CurrencyInfo {
    /// Whether the currency can be minted
    pub fn is_mintable(&self) -> bool {
        self.types.iter().any(|t| t == CURRENCY_MINTABLE)
    }

    /// Minting algorithm, if supported
    pub fn algorithm_type(&self) -> Result<AlgorithmType, MinerError> {
        AlgorithmType::try_from(self.algorithm)
    }
}

/// Entry of `getUnconfirmedTransactions`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnconfirmedTransaction {
    /// Transaction full hash (hex)
    pub full_hash: String,
    /// Transaction type
    pub tx_type: u8,
    /// Transaction subtype
    pub subtype: u8,
}

/// Parameters of a `currencyMint` request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MintRequest {
    /// Currency identifier
    pub currency_id: u64,
    /// Chain the fee is paid on
    pub chain: u32,
    /// Winning nonce
    pub nonce: u64,
    /// Units minted
    pub units: u64,
    /// Minting counter
    pub counter: u64,
    /// Fee in chain base units
    pub fee: u64,
    /// Sender public key
    pub public_key: [u8; 32],
}

/// Decoded fields of an unsigned minting transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionView {
    /// Sender account
    pub sender: u64,
    /// Chain
    pub chain: u32,
    /// Amount transferred
    pub amount: u64,
    /// Fee
    pub fee: u64,
    /// Transaction type
    pub tx_type: u8,
    /// Transaction subtype
    pub subtype: u8,
    /// Minted currency
    pub currency_id: u64,
    /// Minting counter in the attachment
    pub counter: u64,
}

impl TransactionView {
    /// Lists every field that differs from the transaction the minter asked for
    pub fn mismatches(&self, request: &MintRequest, sender: u64) -> Vec<String> {
        let mut problems = Vec::new();
        if self.tx_type != MINTING_TX_TYPE || self.subtype != MINTING_TX_SUBTYPE {
            problems.push(format!(
                "transaction type {}:{} is not currency minting",
                self.tx_type, self.subtype
            ));
        }
        if self.sender != sender {
            problems.push(format!("sender {} is not {}", self.sender, sender));
        }
        if self.amount != 0 {
            problems.push(format!("amount {} is not zero", self.amount));
        }
        if self.fee != request.fee {
            problems.push(format!("fee {} is not {}", self.fee, request.fee));
        }
        if self.currency_id != request.currency_id {
            problems.push(format!(
                "currency {} is not {}",
                self.currency_id, request.currency_id
            ));
        }
        if self.counter != request.counter {
            problems.push(format!(
                "counter {} is not {}",
                self.counter, request.counter
            ));
        }
        problems
    }
}

/// Unsigned transaction returned by `currencyMint`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedTransaction {
    /// Serialized transaction
    pub bytes: Vec<u8>,
    /// Decoded view used for validation
    pub view: TransactionView,
}

/// Blocking view of the remote ledger
///
/// Errors follow the [`MinerError`] classes: transport failures are
/// transient, `errorCode` responses are rejections, anything malformed is a
/// protocol error.
pub trait Ledger: Send + Sync {
    /// Current minting target for `units` of a currency
    fn fetch_minting_target(
        &self,
        currency_id: u64,
        account_id: u64,
        units: u64,
    ) -> Result<MintingTarget, MinerError>;

    /// Unconfirmed transactions of an account on a chain
    fn fetch_unconfirmed_transactions(
        &self,
        account_id: u64,
        chain: u32,
    ) -> Result<Vec<UnconfirmedTransaction>, MinerError>;

    /// Height of the last block
    fn fetch_blockchain_height(&self) -> Result<u64, MinerError>;

    /// Builds an unsigned minting transaction without broadcasting it
    fn build_mint_transaction(&self, request: &MintRequest) -> Result<UnsignedTransaction, MinerError>;

    /// Signs transaction bytes with the account secret
    fn sign(&self, transaction: &[u8], secret: &SecretPhrase) -> Result<Vec<u8>, MinerError>;

    /// Broadcasts a signed transaction and returns its identifier
    fn broadcast(&self, signed: &[u8]) -> Result<u64, MinerError>;

    /// Looks up a chain by name
    fn fetch_chain(&self, name: &str) -> Result<ChainInfo, MinerError>;

    /// Balance of an account in chain base units
    fn fetch_balance(&self, account_id: u64, chain: u32) -> Result<u64, MinerError>;

    /// Looks up a currency by code
    fn fetch_currency(&self, code: &str, chain: u32) -> Result<CurrencyInfo, MinerError>;
}

impl<L: Ledger + ?Sized> Ledger for std::sync::Arc<L> {
    fn fetch_minting_target(
        &self,
        currency_id: u64,
        account_id: u64,
        units: u64,
    ) -> Result<MintingTarget, MinerError> {
        (**self).fetch_minting_target(currency_id, account_id, units)
    }

    fn fetch_unconfirmed_transactions(
        &self,
        account_id: u64,
        chain: u32,
    ) -> Result<Vec<UnconfirmedTransaction>, MinerError> {
        (**self).fetch_unconfirmed_transactions(account_id, chain)
    }

    fn fetch_blockchain_height(&self) -> Result<u64, MinerError> {
        (**self).fetch_blockchain_height()
    }

    fn build_mint_transaction(&self, request: &MintRequest) -> Result<UnsignedTransaction, MinerError> {
        (**self).build_mint_transaction(request)
    }

    fn sign(&self, transaction: &[u8], secret: &SecretPhrase) -> Result<Vec<u8>, MinerError> {
        (**self).sign(transaction, secret)
    }

    fn broadcast(&self, signed: &[u8]) -> Result<u64, MinerError> {
        (**self).broadcast(signed)
    }

    fn fetch_chain(&self, name: &str) -> Result<ChainInfo, MinerError> {
        (**self).fetch_chain(name)
    }

    fn fetch_balance(&self, account_id: u64, chain: u32) -> Result<u64, MinerError> {
        (**self).fetch_balance(account_id, chain)
    }

    fn fetch_currency(&self, code: &str, chain: u32) -> Result<CurrencyInfo, MinerError> {
        (**self).fetch_currency(code, chain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> MintRequest {
        MintRequest {
            currency_id: 11,
            chain: 2,
            nonce: 5,
            units: 100,
            counter: 7,
            fee: 1_000_000,
            public_key: [0; 32],
        }
    }

    fn view() -> TransactionView {
        TransactionView {
            sender: 42,
            chain: 2,
            amount: 0,
            fee: 1_000_000,
            tx_type: MINTING_TX_TYPE,
            subtype: MINTING_TX_SUBTYPE,
            currency_id: 11,
            counter: 7,
        }
    }

    #[test]
    fn matching_transaction_has_no_mismatches() {
        assert!(view().mismatches(&request(), 42).is_empty());
    }

    #[test]
    fn every_differing_field_is_reported() {
        let mut tx = view();
        tx.amount = 1;
        tx.fee = 2;
        tx.sender = 43;
        let problems = tx.mismatches(&request(), 42);
        assert_eq!(problems.len(), 3);
        assert!(problems.iter().any(|p| p.starts_with("amount")));
    }

    #[test]
    fn mintable_flag() {
        let mut currency = CurrencyInfo {
            id: 1,
            code: "MINT".into(),
            decimals: 2,
            algorithm: 2,
            types: vec!["EXCHANGEABLE".into(), CURRENCY_MINTABLE.into()],
            max_supply: 1000,
            reserve_supply: 0,
        };
        assert!(currency.is_mintable());
        assert_eq!(currency.algorithm_type().unwrap(), AlgorithmType::Sha256);
        currency.types = vec!["EXCHANGEABLE".into()];
        currency.algorithm = 4;
        assert!(!currency.is_mintable());
        assert!(currency.algorithm_type().is_err());
    }
}
