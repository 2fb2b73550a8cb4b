//! Automatic contract-type discovery via the Sourcify API.

use alloy::primitives::Address;
use alloy_json_abi::JsonAbi;
use serde::Deserialize;

use crate::error::Result;

/// Looks up the ABI for a deployed contract.
///
/// `Ok(None)` means the contract type could not be determined (the
/// address is unverified), which is the condition the caller may fall
/// back on; every other failure propagates unchanged.
#[async_trait::async_trait]
pub trait AbiDiscovery: Send + Sync {
    async fn discover(&self, chain_id: u64, address: Address) -> Result<Option<JsonAbi>>;
}

/// Sourcify API response structure
#[derive(Debug, Deserialize)]
struct SourcifyResponse {
    #[serde(default)]
    abi: Option<serde_json::Value>,
    #[serde(default)]
    name: Option<String>,
}

/// Discovery backed by the public Sourcify verified-contract index.
pub struct SourcifyDiscovery {
    http: reqwest::Client,
}

impl SourcifyDiscovery {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(10))
                .build()
                .expect("Failed to create HTTP client"),
        }
    }
}

impl Default for SourcifyDiscovery {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl AbiDiscovery for SourcifyDiscovery {
    async fn discover(&self, chain_id: u64, address: Address) -> Result<Option<JsonAbi>> {
        let addr = address.to_string().to_lowercase();
        let url = format!(
            "https://sourcify.dev/server/v2/contract/{}/{}?fields=abi,name",
            chain_id, addr
        );

        let response = self.http.get(&url).send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = response.error_for_status()?;
        let data: SourcifyResponse = response.json().await?;

        match data.abi {
            Some(value) => {
                let abi: JsonAbi = serde_json::from_value(value)?;
                tracing::debug!(
                    contract = %addr,
                    name = data.name.as_deref().unwrap_or("?"),
                    "discovered verified contract"
                );
                Ok(Some(abi))
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verified_response_carries_a_parseable_abi() {
        let data: SourcifyResponse = serde_json::from_str(
            r#"{
                "abi": [{
                    "type": "function",
                    "name": "retrieve",
                    "inputs": [],
                    "outputs": [{"name": "", "type": "uint256"}],
                    "stateMutability": "view"
                }],
                "name": "Storage"
            }"#,
        )
        .unwrap();
        let abi: JsonAbi = serde_json::from_value(data.abi.unwrap()).unwrap();
        assert!(abi.functions.contains_key("retrieve"));
        assert_eq!(data.name.as_deref(), Some("Storage"));
    }

    #[test]
    fn missing_abi_field_reads_as_unverified() {
        let data: SourcifyResponse = serde_json::from_str("{}").unwrap();
        assert!(data.abi.is_none());
        assert!(data.name.is_none());
    }
}
