use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::config::RpcConfig;
use crate::crypto::selector;
use crate::errors::ServiceError;
use crate::types::{address_hex, Address, U256};

// balanceOf(address) is shared between ERC-20 and ERC-721.
pub const BALANCE_OF_SELECTOR: [u8; 4] = [0x70, 0xa0, 0x82, 0x31];
pub const OWNER_OF_SELECTOR: [u8; 4] = [0x63, 0x52, 0x21, 0x1e];

pub fn balance_of_calldata(wallet: &Address) -> String {
    let mut arg = [0u8; 32];
    arg[12..].copy_from_slice(wallet.as_bytes());
    format!("0x{}{}", hex::encode(BALANCE_OF_SELECTOR), hex::encode(arg))
}

pub fn owner_of_calldata(token_id: U256) -> String {
    let mut arg = [0u8; 32];
    token_id.to_big_endian(&mut arg);
    format!("0x{}{}", hex::encode(OWNER_OF_SELECTOR), hex::encode(arg))
}

/// The canonical-signature hashes the pinned selectors must equal.
pub fn computed_selectors() -> ([u8; 4], [u8; 4]) {
    (selector("balanceOf(address)"), selector("ownerOf(uint256)"))
}

fn decode_result_bytes(result_hex: &str) -> Result<Vec<u8>, ServiceError> {
    let stripped = result_hex.strip_prefix("0x").unwrap_or(result_hex);
    if stripped.is_empty() {
        return Err(ServiceError::ChainUnavailable("empty response"));
    }
    hex::decode(stripped).map_err(|_| ServiceError::ChainUnavailable("malformed response"))
}

pub fn decode_u256(result_hex: &str) -> Result<U256, ServiceError> {
    let bytes = decode_result_bytes(result_hex)?;
    if bytes.len() > 32 {
        return Err(ServiceError::ChainUnavailable("malformed response"));
    }
    Ok(U256::from_big_endian(&bytes))
}

/// Owner address is the low 20 bytes of the 32-byte response word.
pub fn decode_owner(result_hex: &str) -> Result<Address, ServiceError> {
    let bytes = decode_result_bytes(result_hex)?;
    if bytes.len() < 20 {
        return Err(ServiceError::ChainUnavailable("malformed response"));
    }
    Ok(Address::from_slice(&bytes[bytes.len() - 20..]))
}

/// Read-only `eth_call` carrier. Implementations return the raw `result` hex
/// from the node, or `ChainUnavailable` for any transport, status, or shape
/// failure. Never a default value.
#[async_trait]
pub trait RpcTransport: Send + Sync {
    async fn eth_call(
        &self,
        endpoint: &str,
        to: &Address,
        data_hex: &str,
    ) -> Result<String, ServiceError>;
}

/// Canned responses keyed by (contract, calldata). Anything not primed is a
/// read failure, which is what a dead endpoint looks like to callers.
#[derive(Default)]
pub struct MockRpcTransport {
    pub results: BTreeMap<(Address, String), String>,
    pub fail_all: Option<&'static str>,
}

impl MockRpcTransport {
    pub fn set_erc20_balance(&mut self, contract: &Address, wallet: &Address, amount: U256) {
        let mut word = [0u8; 32];
        amount.to_big_endian(&mut word);
        self.results.insert(
            (*contract, balance_of_calldata(wallet)),
            format!("0x{}", hex::encode(word)),
        );
    }

    pub fn set_erc721_owner(&mut self, contract: &Address, token_id: U256, owner: &Address) {
        let mut word = [0u8; 32];
        word[12..].copy_from_slice(owner.as_bytes());
        self.results.insert(
            (*contract, owner_of_calldata(token_id)),
            format!("0x{}", hex::encode(word)),
        );
    }

    pub fn set_raw_result(&mut self, contract: &Address, data_hex: &str, result_hex: &str) {
        self.results
            .insert((*contract, data_hex.to_string()), result_hex.to_string());
    }
}

#[async_trait]
impl RpcTransport for MockRpcTransport {
    async fn eth_call(
        &self,
        _endpoint: &str,
        to: &Address,
        data_hex: &str,
    ) -> Result<String, ServiceError> {
        if let Some(reason) = self.fail_all {
            return Err(ServiceError::ChainUnavailable(reason));
        }
        self.results
            .get(&(*to, data_hex.to_string()))
            .cloned()
            .ok_or(ServiceError::ChainUnavailable("no response"))
    }
}

#[cfg(feature = "rpc-http")]
#[derive(serde::Serialize)]
struct EthCallParams<'a> {
    to: String,
    data: &'a str,
}

#[cfg(feature = "rpc-http")]
#[derive(serde::Serialize)]
struct RpcRequestWire<'a> {
    jsonrpc: &'a str,
    id: u32,
    method: &'a str,
    params: (EthCallParams<'a>, &'a str),
}

#[cfg(feature = "rpc-http")]
#[derive(serde::Deserialize)]
struct RpcResponseWire {
    result: Option<String>,
    error: Option<serde_json::Value>,
}

#[cfg(feature = "rpc-http")]
pub struct HttpRpcTransport {
    client: reqwest::Client,
}

#[cfg(feature = "rpc-http")]
impl HttpRpcTransport {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(crate::types::RPC_TIMEOUT_SECS))
            .build()
            .expect("rpc http client");
        Self { client }
    }
}

#[cfg(feature = "rpc-http")]
impl Default for HttpRpcTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "rpc-http")]
#[async_trait]
impl RpcTransport for HttpRpcTransport {
    async fn eth_call(
        &self,
        endpoint: &str,
        to: &Address,
        data_hex: &str,
    ) -> Result<String, ServiceError> {
        let wire = RpcRequestWire {
            jsonrpc: "2.0",
            id: 1,
            method: "eth_call",
            params: (
                EthCallParams {
                    to: address_hex(to),
                    data: data_hex,
                },
                "latest",
            ),
        };

        let resp = self
            .client
            .post(endpoint)
            .json(&wire)
            .send()
            .await
            .map_err(|_| ServiceError::ChainUnavailable("transport"))?;

        if !resp.status().is_success() {
            return Err(ServiceError::ChainUnavailable("http status"));
        }

        let parsed: RpcResponseWire = resp
            .json()
            .await
            .map_err(|_| ServiceError::ChainUnavailable("malformed response"))?;

        if parsed.error.is_some() {
            return Err(ServiceError::ChainUnavailable("rpc error"));
        }
        parsed
            .result
            .ok_or(ServiceError::ChainUnavailable("malformed response"))
    }
}

/// The three read calls the gates need, against the endpoint configured for
/// the gate's chain key. One pooled client serves every chain.
pub struct ChainReader {
    config: RpcConfig,
    transport: Arc<dyn RpcTransport>,
}

impl ChainReader {
    pub fn new(config: RpcConfig, transport: Arc<dyn RpcTransport>) -> Self {
        Self { config, transport }
    }

    pub fn with_mock(config: RpcConfig, mock: MockRpcTransport) -> Self {
        Self::new(config, Arc::new(mock))
    }

    #[cfg(feature = "rpc-http")]
    pub fn from_env() -> Self {
        Self::new(RpcConfig::from_env(), Arc::new(HttpRpcTransport::new()))
    }

    async fn call(
        &self,
        chain: &str,
        contract: &Address,
        data_hex: &str,
    ) -> Result<String, ServiceError> {
        let result = match self.config.endpoint_for(chain) {
            Ok(endpoint) => self.transport.eth_call(endpoint, contract, data_hex).await,
            Err(err) => Err(err),
        };
        if let Err(ref err) = result {
            warn!(
                chain = %chain,
                contract = %address_hex(contract),
                error = %err,
                "eth_call failed"
            );
        }
        result
    }

    pub async fn erc20_balance_of(
        &self,
        chain: &str,
        contract: &Address,
        wallet: &Address,
    ) -> Result<U256, ServiceError> {
        let raw = self.call(chain, contract, &balance_of_calldata(wallet)).await?;
        decode_u256(&raw)
    }

    pub async fn erc721_owner_of(
        &self,
        chain: &str,
        contract: &Address,
        token_id: U256,
    ) -> Result<Address, ServiceError> {
        let raw = self.call(chain, contract, &owner_of_calldata(token_id)).await?;
        decode_owner(&raw)
    }

    pub async fn erc721_balance_of(
        &self,
        chain: &str,
        contract: &Address,
        wallet: &Address,
    ) -> Result<U256, ServiceError> {
        self.erc20_balance_of(chain, contract, wallet).await
    }
}
