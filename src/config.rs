use std::collections::BTreeMap;
use std::env;

use crate::errors::ServiceError;

pub const RPC_URL_ENV_PREFIX: &str = "ATLAS_RPC_URL_";

/// Chain key -> JSON-RPC endpoint. Keys are stored lowercase; the env suffix
/// after `ATLAS_RPC_URL_` becomes the key (e.g. `ATLAS_RPC_URL_ETH` -> "eth").
#[derive(Debug, Clone, Default)]
pub struct RpcConfig {
    pub endpoints: BTreeMap<String, String>,
}

impl RpcConfig {
    pub fn from_env() -> Self {
        let mut endpoints = BTreeMap::new();
        for (key, value) in env::vars() {
            if let Some(chain) = key.strip_prefix(RPC_URL_ENV_PREFIX) {
                if !chain.is_empty() && !value.is_empty() {
                    endpoints.insert(chain.to_ascii_lowercase(), value);
                }
            }
        }
        Self { endpoints }
    }

    pub fn with_endpoint(chain: &str, url: &str) -> Self {
        let mut endpoints = BTreeMap::new();
        endpoints.insert(chain.to_ascii_lowercase(), url.to_string());
        Self { endpoints }
    }

    pub fn endpoint_for(&self, chain: &str) -> Result<&str, ServiceError> {
        self.endpoints
            .get(&chain.to_ascii_lowercase())
            .map(String::as_str)
            .ok_or(ServiceError::UnsupportedChain)
    }
}
