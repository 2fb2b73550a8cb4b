//! Chain registry, explorer URLs, and provider endpoint resolution.

use std::path::PathBuf;

use alloy::primitives::{Address, B256};

use crate::config::{Config, Selection};
use crate::error::{Error, Result};
use crate::provider::ProviderConfig;

const DEFAULT_LOCAL_ENDPOINT: &str = "http://127.0.0.1:8545";

/// Provider names that mean "whatever node is listening locally".
const LOCAL_NODE_NAMES: &[&str] = &["node", "geth", "reth", "anvil"];

/// Static facts about a supported network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainSpec {
    pub ecosystem: &'static str,
    pub network: &'static str,
    pub chain_id: u64,
    pub explorer: Option<&'static str>,
}

const CHAINS: &[ChainSpec] = &[
    ChainSpec {
        ecosystem: "ethereum",
        network: "mainnet",
        chain_id: 1,
        explorer: Some("https://etherscan.io"),
    },
    ChainSpec {
        ecosystem: "ethereum",
        network: "sepolia",
        chain_id: 11155111,
        explorer: Some("https://sepolia.etherscan.io"),
    },
    ChainSpec {
        ecosystem: "ethereum",
        network: "holesky",
        chain_id: 17000,
        explorer: Some("https://holesky.etherscan.io"),
    },
    ChainSpec {
        ecosystem: "ethereum",
        network: "local",
        chain_id: 31337,
        explorer: None,
    },
];

impl ChainSpec {
    /// Look up the chain entry for an `ecosystem:network` pair.
    pub fn lookup(ecosystem: &str, network: &str) -> Result<&'static ChainSpec> {
        CHAINS
            .iter()
            .find(|chain| chain.ecosystem == ecosystem && chain.network == network)
            .ok_or_else(|| Error::Config(format!("unknown network '{ecosystem}:{network}'")))
    }

    /// `ecosystem:network` label used in errors and logs.
    pub fn label(&self) -> String {
        format!("{}:{}", self.ecosystem, self.network)
    }
}

/// Block explorer URL builder for the selected network.
#[derive(Debug, Clone)]
pub struct Explorer {
    base_url: String,
}

impl Explorer {
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self { base_url }
    }

    pub fn tx_url(&self, hash: B256) -> String {
        format!("{}/tx/{hash}", self.base_url)
    }

    pub fn address_url(&self, address: Address) -> String {
        format!("{}/address/{}", self.base_url, address.to_checksum(None))
    }
}

/// Resolve the provider part of the selection into a transport endpoint.
///
/// A value that is already a URL or an IPC path is used directly; the
/// well-known local node names map to `http://127.0.0.1:8545`; anything
/// else is looked up in the config file's `[[endpoints]]`.
pub fn resolve_endpoint(selection: &Selection, config: &Config) -> Result<ProviderConfig> {
    let provider = selection.provider.trim();

    if let Some(endpoint) = endpoint_from_value(provider)? {
        return Ok(endpoint);
    }

    if LOCAL_NODE_NAMES.contains(&provider) {
        return Ok(ProviderConfig::Http(DEFAULT_LOCAL_ENDPOINT.to_string()));
    }

    if let Some(entry) = config.endpoint_named(provider) {
        if let Some(rpc) = entry.rpc.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            return endpoint_from_value(rpc)?
                .map(Ok)
                .unwrap_or_else(|| Ok(ProviderConfig::Http(normalize_http_endpoint(rpc))));
        }
        if let Some(ipc) = entry.ipc.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            return ipc_endpoint(expand_path(ipc));
        }
        return Err(Error::Config(format!(
            "configured endpoint '{provider}' has neither rpc nor ipc"
        )));
    }

    Err(Error::Config(format!(
        "unknown provider '{provider}': not a URL, a local node name, or a configured endpoint"
    )))
}

/// Classify a raw endpoint value; `Ok(None)` means it is a bare name.
fn endpoint_from_value(value: &str) -> Result<Option<ProviderConfig>> {
    if value.starts_with("http://") || value.starts_with("https://") {
        return Ok(Some(ProviderConfig::Http(normalize_http_endpoint(value))));
    }
    if value.starts_with("ws://") || value.starts_with("wss://") {
        return Ok(Some(ProviderConfig::WebSocket(value.to_string())));
    }
    if value.ends_with(".ipc") || value.starts_with('/') || value.starts_with("~/") {
        return ipc_endpoint(expand_path(value)).map(Some);
    }
    Ok(None)
}

#[cfg(unix)]
fn ipc_endpoint(path: PathBuf) -> Result<ProviderConfig> {
    Ok(ProviderConfig::Ipc(path))
}

#[cfg(not(unix))]
fn ipc_endpoint(_path: PathBuf) -> Result<ProviderConfig> {
    Err(Error::Config("IPC is not supported on this platform".to_string()))
}

fn normalize_http_endpoint(endpoint: &str) -> String {
    let trimmed = endpoint.trim();
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("http://{}", trimmed)
    }
}

fn expand_path(path: &str) -> PathBuf {
    let trimmed = path.trim();
    if let Some(rest) = trimmed.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME").map(PathBuf::from) {
            return home.join(rest);
        }
    }
    PathBuf::from(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EndpointConfig;
    use alloy::primitives::b256;

    fn selection(provider: &str) -> Selection {
        Selection {
            ecosystem: "ethereum".to_string(),
            network: "local".to_string(),
            provider: provider.to_string(),
        }
    }

    #[test]
    fn known_chains_resolve() {
        let chain = ChainSpec::lookup("ethereum", "sepolia").unwrap();
        assert_eq!(chain.chain_id, 11155111);
        assert!(chain.explorer.is_some());

        let local = ChainSpec::lookup("ethereum", "local").unwrap();
        assert_eq!(local.chain_id, 31337);
        assert!(local.explorer.is_none());
    }

    #[test]
    fn unknown_chain_is_a_config_error() {
        assert!(matches!(
            ChainSpec::lookup("ethereum", "gibberish"),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn explorer_builds_tx_and_address_urls() {
        let explorer = Explorer::new("https://sepolia.etherscan.io/");
        let hash = b256!("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa");
        assert_eq!(
            explorer.tx_url(hash),
            format!("https://sepolia.etherscan.io/tx/{hash}")
        );
        assert!(explorer
            .address_url(Address::ZERO)
            .starts_with("https://sepolia.etherscan.io/address/0x"));
    }

    #[test]
    fn url_providers_pass_through() {
        let config = Config::default();
        match resolve_endpoint(&selection("https://rpc.example.org/"), &config).unwrap() {
            ProviderConfig::Http(url) => assert_eq!(url, "https://rpc.example.org/"),
            other => panic!("unexpected endpoint {other:?}"),
        }
        match resolve_endpoint(&selection("wss://rpc.example.org/ws"), &config).unwrap() {
            ProviderConfig::WebSocket(url) => assert_eq!(url, "wss://rpc.example.org/ws"),
            other => panic!("unexpected endpoint {other:?}"),
        }
    }

    #[test]
    fn local_node_names_use_the_default_endpoint() {
        let config = Config::default();
        for name in ["node", "geth", "reth", "anvil"] {
            match resolve_endpoint(&selection(name), &config).unwrap() {
                ProviderConfig::Http(url) => assert_eq!(url, DEFAULT_LOCAL_ENDPOINT),
                other => panic!("unexpected endpoint {other:?}"),
            }
        }
    }

    #[test]
    fn named_endpoints_come_from_config() {
        let config = Config {
            endpoints: vec![EndpointConfig {
                name: Some("archive".to_string()),
                rpc: Some("https://archive.example.org".to_string()),
                ipc: None,
            }],
        };
        match resolve_endpoint(&selection("archive"), &config).unwrap() {
            ProviderConfig::Http(url) => assert_eq!(url, "https://archive.example.org"),
            other => panic!("unexpected endpoint {other:?}"),
        }
    }

    #[test]
    fn unknown_provider_is_a_config_error() {
        let err = resolve_endpoint(&selection("mystery"), &Config::default()).unwrap_err();
        match err {
            Error::Config(msg) => assert!(msg.contains("mystery"), "{msg}"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn ipc_paths_resolve_to_ipc_endpoints() {
        let config = Config::default();
        match resolve_endpoint(&selection("/tmp/reth.ipc"), &config).unwrap() {
            ProviderConfig::Ipc(path) => assert_eq!(path, PathBuf::from("/tmp/reth.ipc")),
            other => panic!("unexpected endpoint {other:?}"),
        }
    }
}
