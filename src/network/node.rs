// src/network/node.rs
//! HTTP client for the ledger node API
//!
//! Every request is a form POST to `http(s)://host:port/nxt` carrying a
//! `requestType` field. Responses are JSON objects; an `errorCode` field
//! turns the response into [`MinerError::Rejected`].

use crate::miner::target::MintingTarget;
use crate::network::account::SecretPhrase;
use crate::network::ledger::{
    ChainInfo, CurrencyInfo, Ledger, MintRequest, TransactionView, UnconfirmedTransaction,
    UnsignedTransaction,
};
use crate::types::HASH_LEN;
use crate::utils::error::MinerError;
use primitive_types::U256;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tokio::runtime::Runtime;
use url::Url;

/// Default API port of the ledger node
pub const DEFAULT_API_PORT: u16 = 27876;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Transaction deadline in minutes for minting transactions
const MINT_DEADLINE: u32 = 30;

/// Connection settings for the ledger node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Host name or address of the node
    pub host: String,
    /// API port
    pub port: u16,
    /// Use HTTPS for non-local nodes
    pub use_tls: bool,
    /// Accept self-signed or mismatched certificates
    pub accept_invalid_certs: bool,
}

impl Default for NodeConfig {
    fn default() -> Self {
        NodeConfig {
            host: "localhost".to_string(),
            port: DEFAULT_API_PORT,
            use_tls: false,
            accept_invalid_certs: false,
        }
    }
}

impl NodeConfig {
    /// Whether the node runs on this machine
    pub fn is_local(&self) -> bool {
        matches!(self.host.as_str(), "localhost" | "127.0.0.1" | "::1")
    }

    /// Refuses remote nodes reached over plain HTTP
    ///
    /// Signing sends the secret phrase to the node, so it must not leave
    /// this machine unencrypted.
    pub fn check_transport(&self) -> Result<(), MinerError> {
        if !self.is_local() && !self.use_tls {
            return Err(MinerError::ConfigError(format!(
                "Node {} is remote; set use_tls = true so the secret phrase is not sent in clear text",
                self.host
            )));
        }
        Ok(())
    }

    /// API endpoint; local nodes are always reached over plain HTTP
    pub fn api_url(&self) -> Result<Url, MinerError> {
        let scheme = if self.use_tls && !self.is_local() {
            "https"
        } else {
            "http"
        };
        Ok(Url::parse(&format!(
            "{}://{}:{}/nxt",
            scheme, self.host, self.port
        ))?)
    }
}

/// Blocking ledger client backed by async reqwest
///
/// The client owns a single-threaded tokio runtime and drives each request
/// to completion on the calling thread. It must not be used from inside
/// another tokio runtime.
pub struct NodeClient {
    url: Url,
    client: Client,
    runtime: Runtime,
}

impl NodeClient {
    /// Creates a client for the node described by `config`
    ///
    /// # Arguments
    /// * `config` - Node connection settings
    ///
    /// # Returns
    /// * `Err(MinerError)` - If the node is remote without TLS, the URL is
    ///   invalid or the HTTP stack cannot be built
    pub fn new(config: &NodeConfig) -> Result<Self, MinerError> {
        config.check_transport()?;
        let url = config.api_url()?;
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(READ_TIMEOUT)
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        Ok(NodeClient {
            url,
            client,
            runtime,
        })
    }

    /// API endpoint used by this client
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Issues one API request and returns the parsed response object
    async fn request(&self, request_type: &str, params: &[(&str, String)]) -> Result<Value, MinerError> {
        let mut form: Vec<(&str, String)> = Vec::with_capacity(params.len() + 1);
        form.push(("requestType", request_type.to_string()));
        form.extend(params.iter().map(|(k, v)| (*k, v.clone())));

        log::debug!(
            "Issue HTTP request to {}: {}",
            self.url,
            form.iter()
                .filter(|(k, _)| *k != "secretPhrase")
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join("&")
        );

        let response = self
            .client
            .post(self.url.clone())
            .header("Cache-Control", "no-cache, no-store")
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(MinerError::ConnectionError(format!(
                "Response code {} for {} request",
                status.as_u16(),
                request_type
            )));
        }

        let text = response.text().await?;
        let body: Value = serde_json::from_str(&text).map_err(|e| {
            MinerError::ProtocolError(format!("Response to {} request is not JSON: {}", request_type, e))
        })?;
        check_response(request_type, body)
    }

    fn call(&self, request_type: &str, params: &[(&str, String)]) -> Result<Value, MinerError> {
        self.runtime.block_on(self.request(request_type, params))
    }
}

/// Turns an `errorCode` response into a rejection
fn check_response(request_type: &str, body: Value) -> Result<Value, MinerError> {
    if !body.is_object() {
        return Err(MinerError::ProtocolError(format!(
            "Response to {} request is not a JSON object",
            request_type
        )));
    }
    if let Some(code) = body.get("errorCode").and_then(Value::as_i64) {
        let description = body
            .get("errorDescription")
            .and_then(Value::as_str)
            .unwrap_or("no description")
            .to_string();
        log::error!(
            "Error {} returned for {} request: {}",
            code,
            request_type,
            description
        );
        return Err(MinerError::Rejected {
            request: request_type.to_string(),
            code,
            description,
        });
    }
    Ok(body)
}

fn field<'a>(value: &'a Value, name: &str) -> Result<&'a Value, MinerError> {
    value
        .get(name)
        .ok_or_else(|| MinerError::ProtocolError(format!("Missing {}", name)))
}

fn json_str<'a>(value: &'a Value, name: &str) -> Result<&'a str, MinerError> {
    field(value, name)?
        .as_str()
        .ok_or_else(|| MinerError::ProtocolError(format!("{} is not a string", name)))
}

/// Reads an unsigned number sent either as a JSON number or a decimal string
fn json_u64(value: &Value, name: &str) -> Result<u64, MinerError> {
    let raw = field(value, name)?;
    match raw {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
    .ok_or_else(|| MinerError::ProtocolError(format!("{} is not an unsigned number", name)))
}

fn json_u32(value: &Value, name: &str) -> Result<u32, MinerError> {
    let n = json_u64(value, name)?;
    u32::try_from(n).map_err(|_| MinerError::ProtocolError(format!("{} is out of range", name)))
}

fn json_u8(value: &Value, name: &str) -> Result<u8, MinerError> {
    let n = json_u64(value, name)?;
    u8::try_from(n).map_err(|_| MinerError::ProtocolError(format!("{} is out of range", name)))
}

fn json_hex(value: &Value, name: &str) -> Result<Vec<u8>, MinerError> {
    Ok(hex::decode(json_str(value, name)?)?)
}

/// Builds a target from a `getMintingTarget` response
fn parse_minting_target(response: &Value) -> Result<MintingTarget, MinerError> {
    let difficulty = U256::from_dec_str(json_str(response, "difficulty")?)
        .map_err(|e| MinerError::ProtocolError(format!("Invalid difficulty: {:?}", e)))?;
    let bytes = json_hex(response, "targetBytes")?;
    let target: [u8; HASH_LEN] = bytes.as_slice().try_into().map_err(|_| {
        MinerError::ProtocolError(format!("Target is {} bytes, expected {}", bytes.len(), HASH_LEN))
    })?;
    Ok(MintingTarget::new(
        json_u64(response, "currency")?,
        difficulty,
        target,
        json_u64(response, "counter")?,
    ))
}

fn parse_unconfirmed(response: &Value) -> Result<Vec<UnconfirmedTransaction>, MinerError> {
    field(response, "unconfirmedTransactions")?
        .as_array()
        .ok_or_else(|| MinerError::ProtocolError("unconfirmedTransactions is not a list".into()))?
        .iter()
        .map(|tx| {
            Ok(UnconfirmedTransaction {
                full_hash: json_str(tx, "fullHash")?.to_string(),
                tx_type: json_u8(tx, "type")?,
                subtype: json_u8(tx, "subtype")?,
            })
        })
        .collect()
}

fn parse_height(response: &Value) -> Result<u64, MinerError> {
    Ok(json_u64(response, "numberOfBlocks")?.saturating_sub(1))
}

fn parse_unsigned_transaction(response: &Value) -> Result<UnsignedTransaction, MinerError> {
    let bytes = json_hex(response, "unsignedTransactionBytes")?;
    let tx = field(response, "transactionJSON")?;
    let attachment = field(tx, "attachment")?;
    Ok(UnsignedTransaction {
        bytes,
        view: TransactionView {
            sender: json_u64(tx, "sender")?,
            chain: json_u32(tx, "chain")?,
            amount: json_u64(tx, "amountNQT")?,
            fee: json_u64(tx, "feeNQT")?,
            tx_type: json_u8(tx, "type")?,
            subtype: json_u8(tx, "subtype")?,
            currency_id: json_u64(attachment, "currency")?,
            counter: json_u64(attachment, "counter")?,
        },
    })
}

/// Transaction identifier from a broadcast response
///
/// Falls back to the first eight bytes of the full hash when the node does
/// not return the identifier itself.
fn parse_transaction_id(response: &Value) -> Result<u64, MinerError> {
    if response.get("transaction").is_some() {
        return json_u64(response, "transaction");
    }
    let hash = json_hex(response, "fullHash")?;
    let head: [u8; 8] = hash
        .get(..8)
        .and_then(|h| h.try_into().ok())
        .ok_or_else(|| MinerError::ProtocolError("fullHash is too short".into()))?;
    Ok(u64::from_le_bytes(head))
}

fn parse_chain(response: &Value, name: &str) -> Result<ChainInfo, MinerError> {
    let chains = field(response, "chainProperties")?
        .as_object()
        .ok_or_else(|| MinerError::ProtocolError("chainProperties is not an object".into()))?;
    for chain in chains.values() {
        let chain_name = json_str(chain, "name")?;
        if chain_name.eq_ignore_ascii_case(name) {
            return Ok(ChainInfo {
                name: chain_name.to_string(),
                id: json_u32(chain, "id")?,
                decimals: json_u8(chain, "decimals")?,
            });
        }
    }
    Err(MinerError::ConfigError(format!("Chain '{}' is not defined", name)))
}

fn parse_currency(response: &Value) -> Result<CurrencyInfo, MinerError> {
    let types = field(response, "types")?
        .as_array()
        .ok_or_else(|| MinerError::ProtocolError("types is not a list".into()))?
        .iter()
        .filter_map(|t| t.as_str().map(str::to_string))
        .collect();
    Ok(CurrencyInfo {
        id: json_u64(response, "currency")?,
        code: json_str(response, "code")?.to_string(),
        decimals: json_u8(response, "decimals")?,
        algorithm: json_u32(response, "algorithm")?,
        types,
        max_supply: json_u64(response, "maxSupplyQNT")?,
        reserve_supply: json_u64(response, "reserveSupplyQNT")?,
    })
}

impl Ledger for NodeClient {
    fn fetch_minting_target(
        &self,
        currency_id: u64,
        account_id: u64,
        units: u64,
    ) -> Result<MintingTarget, MinerError> {
        let response = self.call(
            "getMintingTarget",
            &[
                ("currency", currency_id.to_string()),
                ("account", account_id.to_string()),
                ("units", units.to_string()),
            ],
        )?;
        parse_minting_target(&response)
    }

    fn fetch_unconfirmed_transactions(
        &self,
        account_id: u64,
        chain: u32,
    ) -> Result<Vec<UnconfirmedTransaction>, MinerError> {
        let response = self.call(
            "getUnconfirmedTransactions",
            &[("chain", chain.to_string()), ("account", account_id.to_string())],
        )?;
        parse_unconfirmed(&response)
    }

    fn fetch_blockchain_height(&self) -> Result<u64, MinerError> {
        parse_height(&self.call("getBlockchainStatus", &[])?)
    }

    fn build_mint_transaction(&self, request: &MintRequest) -> Result<UnsignedTransaction, MinerError> {
        let response = self.call(
            "currencyMint",
            &[
                ("currency", request.currency_id.to_string()),
                ("chain", request.chain.to_string()),
                ("nonce", request.nonce.to_string()),
                ("units", request.units.to_string()),
                ("counter", request.counter.to_string()),
                ("feeNQT", request.fee.to_string()),
                ("publicKey", hex::encode(request.public_key)),
                ("deadline", MINT_DEADLINE.to_string()),
                ("broadcast", "false".to_string()),
            ],
        )?;
        parse_unsigned_transaction(&response)
    }

    fn sign(&self, transaction: &[u8], secret: &SecretPhrase) -> Result<Vec<u8>, MinerError> {
        let response = self.call(
            "signTransaction",
            &[
                ("unsignedTransactionBytes", hex::encode(transaction)),
                ("secretPhrase", secret.expose().to_string()),
            ],
        )?;
        json_hex(&response, "transactionBytes")
    }

    fn broadcast(&self, signed: &[u8]) -> Result<u64, MinerError> {
        let response = self.call(
            "broadcastTransaction",
            &[("transactionBytes", hex::encode(signed))],
        )?;
        parse_transaction_id(&response)
    }

    fn fetch_chain(&self, name: &str) -> Result<ChainInfo, MinerError> {
        parse_chain(&self.call("getConstants", &[])?, name)
    }

    fn fetch_balance(&self, account_id: u64, chain: u32) -> Result<u64, MinerError> {
        let response = self.call(
            "getBalance",
            &[("account", account_id.to_string()), ("chain", chain.to_string())],
        )?;
        json_u64(&response, "balanceNQT")
    }

    fn fetch_currency(&self, code: &str, chain: u32) -> Result<CurrencyInfo, MinerError> {
        let response = self.call(
            "getCurrency",
            &[("code", code.to_string()), ("chain", chain.to_string())],
        )?;
        parse_currency(&response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn local_nodes_use_plain_http() {
        let mut config = NodeConfig {
            use_tls: true,
            ..NodeConfig::default()
        };
        assert_eq!(config.api_url().unwrap().as_str(), "http://localhost:27876/nxt");
        config.host = "node.example.org".into();
        assert_eq!(
            config.api_url().unwrap().as_str(),
            "https://node.example.org:27876/nxt"
        );
    }

    #[test]
    fn remote_node_requires_tls() {
        let mut config = NodeConfig {
            host: "node.example.org".into(),
            ..NodeConfig::default()
        };
        assert!(matches!(NodeClient::new(&config), Err(MinerError::ConfigError(_))));

        config.use_tls = true;
        let client = NodeClient::new(&config).unwrap();
        assert_eq!(client.url().scheme(), "https");

        assert!(NodeClient::new(&NodeConfig::default()).is_ok());
    }

    /// Serves one HTTP response with `body` on a local port
    fn serve_once(body: &'static str) -> u16 {
        use std::io::{Read, Write};
        use std::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            // read the headers and the form body before answering
            loop {
                let n = stream.read(&mut buf).unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&request).to_string();
                if let Some(end) = text.find("\r\n\r\n") {
                    let length = text[..end]
                        .lines()
                        .find_map(|l| {
                            let (name, value) = l.split_once(':')?;
                            name.eq_ignore_ascii_case("content-length")
                                .then(|| value.trim().parse::<usize>().ok())
                                .flatten()
                        })
                        .unwrap_or(0);
                    if request.len() >= end + 4 + length {
                        break;
                    }
                }
            }
            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            stream.write_all(response.as_bytes()).unwrap();
        });
        port
    }

    #[test]
    fn non_json_body_is_fatal() {
        let port = serve_once("<html>not json</html>");
        let client = NodeClient::new(&NodeConfig {
            host: "127.0.0.1".into(),
            port,
            ..NodeConfig::default()
        })
        .unwrap();

        let err = client.fetch_blockchain_height().unwrap_err();
        assert!(matches!(err, MinerError::ProtocolError(_)), "{}", err);
        assert!(err.is_fatal());
    }

    #[test]
    fn refused_connection_is_transient() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let client = NodeClient::new(&NodeConfig {
            host: "127.0.0.1".into(),
            port,
            ..NodeConfig::default()
        })
        .unwrap();
        assert!(client.fetch_blockchain_height().unwrap_err().is_transient());
    }

    #[test]
    fn error_code_is_a_rejection() {
        let err = check_response(
            "currencyMint",
            json!({"errorCode": 4, "errorDescription": "Incorrect \"counter\""}),
        )
        .unwrap_err();
        assert!(err.is_rejection());
        assert!(check_response("getConstants", json!([1, 2])).unwrap_err().is_fatal());
    }

    #[test]
    fn parses_minting_target() {
        let target = parse_minting_target(&json!({
            "currency": "15311436391405186352",
            "difficulty": "1000",
            "targetBytes": "ffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffff3f",
            "counter": 17
        }))
        .unwrap();
        assert_eq!(target.currency_id(), 15311436391405186352);
        assert_eq!(target.difficulty(), U256::from(1000));
        assert_eq!(target.counter(), 17);
        assert_eq!(target.target()[31], 0x3f);
    }

    #[test]
    fn short_target_is_malformed() {
        let err = parse_minting_target(&json!({
            "currency": "1", "difficulty": "1", "targetBytes": "ffff", "counter": 1
        }))
        .unwrap_err();
        assert!(matches!(err, MinerError::ProtocolError(_)));
    }

    #[test]
    fn parses_unsigned_mint_transaction() {
        let tx = parse_unsigned_transaction(&json!({
            "unsignedTransactionBytes": "0102",
            "transactionJSON": {
                "sender": "42",
                "chain": 2,
                "amountNQT": "0",
                "feeNQT": "100000000",
                "type": 5,
                "subtype": 7,
                "attachment": {"currency": "11", "counter": 8, "nonce": "3", "units": "100"}
            }
        }))
        .unwrap();
        assert_eq!(tx.bytes, vec![1, 2]);
        assert_eq!(tx.view.sender, 42);
        assert_eq!(tx.view.fee, 100_000_000);
        assert_eq!(tx.view.currency_id, 11);
        assert_eq!(tx.view.counter, 8);
    }

    #[test]
    fn height_is_blocks_minus_one() {
        assert_eq!(parse_height(&json!({"numberOfBlocks": 1001})).unwrap(), 1000);
    }

    #[test]
    fn transaction_id_falls_back_to_full_hash() {
        assert_eq!(parse_transaction_id(&json!({"transaction": "77"})).unwrap(), 77);
        let id = parse_transaction_id(&json!({
            "fullHash": "0100000000000000aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"
        }))
        .unwrap();
        assert_eq!(id, 1);
    }

    #[test]
    fn finds_chain_by_name() {
        let constants = json!({
            "chainProperties": {
                "1": {"name": "ARDR", "id": 1, "decimals": 8},
                "2": {"name": "IGNIS", "id": 2, "decimals": 8}
            }
        });
        let chain = parse_chain(&constants, "ignis").unwrap();
        assert_eq!(chain.id, 2);
        assert!(parse_chain(&constants, "BITSWIFT").is_err());
    }

    #[test]
    fn parses_currency() {
        let currency = parse_currency(&json!({
            "currency": "99",
            "code": "MINT",
            "decimals": 2,
            "algorithm": 3,
            "types": ["EXCHANGEABLE", "MINTABLE"],
            "maxSupplyQNT": "1000000",
            "reserveSupplyQNT": "0"
        }))
        .unwrap();
        assert!(currency.is_mintable());
        assert_eq!(currency.max_supply, 1_000_000);
    }

    #[test]
    fn unconfirmed_list() {
        let list = parse_unconfirmed(&json!({
            "unconfirmedTransactions": [{"fullHash": "ab", "type": 5, "subtype": 7}]
        }))
        .unwrap();
        assert_eq!(list.len(), 1);
        assert!(parse_unconfirmed(&json!({"unconfirmedTransactions": []})).unwrap().is_empty());
    }
}
