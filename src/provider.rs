//! Web3 provider abstraction over the alloy transports.
//!
//! Block lookups go through raw JSON requests so the CLI passthroughs
//! return whatever the node returns, independent of chain quirks.

use std::path::PathBuf;
use std::str::FromStr;

use alloy::network::Ethereum;
use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::providers::{
    fillers::{BlobGasFiller, ChainIdFiller, FillProvider, GasFiller, JoinFill, NonceFiller},
    Identity, Provider, ProviderBuilder, RootProvider,
};
use alloy::rpc::types::{TransactionReceipt, TransactionRequest};

use crate::error::{Error, Result};

/// Provider configuration
#[derive(Debug, Clone)]
pub enum ProviderConfig {
    /// HTTP JSON-RPC endpoint
    Http(String),
    /// WebSocket endpoint
    WebSocket(String),
    /// IPC socket path (Unix only)
    #[cfg(unix)]
    Ipc(PathBuf),
}

impl ProviderConfig {
    /// Get display name for this endpoint
    pub fn display(&self) -> String {
        match self {
            ProviderConfig::Http(url) => url.clone(),
            ProviderConfig::WebSocket(url) => url.clone(),
            #[cfg(unix)]
            ProviderConfig::Ipc(path) => path.display().to_string(),
        }
    }
}

/// Which block a raw block query addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockSelector {
    Number(u64),
    Tag(String),
    Hash(B256),
}

impl FromStr for BlockSelector {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        let trimmed = value.trim();
        if let Ok(number) = trimmed.parse::<u64>() {
            return Ok(BlockSelector::Number(number));
        }
        if let Some(hex) = trimmed.strip_prefix("0x") {
            if hex.len() == 64 {
                let hash = B256::from_str(trimmed)
                    .map_err(|err| Error::Config(format!("invalid block hash '{trimmed}': {err}")))?;
                return Ok(BlockSelector::Hash(hash));
            }
            let number = u64::from_str_radix(hex, 16)
                .map_err(|err| Error::Config(format!("invalid block number '{trimmed}': {err}")))?;
            return Ok(BlockSelector::Number(number));
        }
        Ok(BlockSelector::Tag(trimmed.to_string()))
    }
}

impl BlockSelector {
    fn rpc_method(&self) -> &'static str {
        match self {
            BlockSelector::Hash(_) => "eth_getBlockByHash",
            _ => "eth_getBlockByNumber",
        }
    }

    fn rpc_param(&self) -> String {
        match self {
            BlockSelector::Number(number) => format!("0x{number:x}"),
            BlockSelector::Tag(tag) => tag.clone(),
            BlockSelector::Hash(hash) => hash.to_string(),
        }
    }
}

/// EIP-1559 fee estimate for the next transaction.
#[derive(Debug, Clone, Copy)]
pub struct FeeEstimate {
    pub max_fee_per_gas: u128,
    pub max_priority_fee_per_gas: u128,
}

/// Abstract web3 provider trait
///
/// This trait defines all the node operations the context and the CLI
/// need, abstracting over the specific alloy transport.
#[async_trait::async_trait]
pub trait EthereumProvider: Send + Sync + 'static {
    /// Get the current block number
    async fn block_number(&self) -> Result<u64>;

    /// Get the chain id reported by the node
    async fn chain_id(&self) -> Result<u64>;

    /// Get client version (for node detection)
    async fn client_version(&self) -> Result<String>;

    /// Get a block as raw JSON, by number, tag, or hash
    async fn get_block(&self, selector: &BlockSelector) -> Result<serde_json::Value>;

    /// Get a transaction as raw JSON
    async fn get_transaction(&self, hash: B256) -> Result<serde_json::Value>;

    /// Get transaction receipt
    async fn get_receipt(&self, hash: B256) -> Result<Option<TransactionReceipt>>;

    /// Get account balance in wei
    async fn get_balance(&self, address: Address) -> Result<U256>;

    /// Execute a call (eth_call)
    async fn call(&self, request: TransactionRequest) -> Result<Bytes>;

    /// Estimate gas for a transaction request
    async fn estimate_gas(&self, request: TransactionRequest) -> Result<u64>;

    /// Get the next nonce for an address
    async fn transaction_count(&self, address: Address) -> Result<u64>;

    /// Estimate EIP-1559 fees
    async fn estimate_fees(&self) -> Result<FeeEstimate>;

    /// Submit a signed raw transaction and wait for its receipt.
    /// No retries: submission is not idempotent, failures propagate.
    async fn send_raw_transaction(&self, encoded: &[u8]) -> Result<TransactionReceipt>;

    /// Get endpoint display name
    fn endpoint_name(&self) -> String;
}

// Type aliases for the filled providers
type HttpFillProvider = FillProvider<
    JoinFill<
        Identity,
        JoinFill<GasFiller, JoinFill<BlobGasFiller, JoinFill<NonceFiller, ChainIdFiller>>>,
    >,
    RootProvider,
    Ethereum,
>;

type WsFillProvider = FillProvider<
    JoinFill<
        Identity,
        JoinFill<GasFiller, JoinFill<BlobGasFiller, JoinFill<NonceFiller, ChainIdFiller>>>,
    >,
    RootProvider,
    Ethereum,
>;

#[cfg(unix)]
type IpcFillProvider = FillProvider<
    JoinFill<
        Identity,
        JoinFill<GasFiller, JoinFill<BlobGasFiller, JoinFill<NonceFiller, ChainIdFiller>>>,
    >,
    RootProvider,
    Ethereum,
>;

/// Enum-based provider that stores concrete types for each transport
pub enum AlloyProvider {
    Http {
        provider: HttpFillProvider,
        endpoint: String,
    },
    WebSocket {
        provider: WsFillProvider,
        endpoint: String,
    },
    #[cfg(unix)]
    Ipc {
        provider: IpcFillProvider,
        endpoint: String,
    },
}

/// Create a provider from configuration
pub async fn create_provider(config: ProviderConfig) -> Result<Box<dyn EthereumProvider>> {
    match config {
        ProviderConfig::Http(url) => {
            let rpc_url = url
                .parse()
                .map_err(|err| Error::Config(format!("invalid HTTP endpoint '{url}': {err}")))?;
            let provider = ProviderBuilder::new().connect_http(rpc_url);
            Ok(Box::new(AlloyProvider::Http {
                provider,
                endpoint: url,
            }))
        }
        ProviderConfig::WebSocket(url) => {
            let provider = ProviderBuilder::new().connect(&url).await?;
            Ok(Box::new(AlloyProvider::WebSocket {
                provider,
                endpoint: url,
            }))
        }
        #[cfg(unix)]
        ProviderConfig::Ipc(path) => {
            use alloy::providers::IpcConnect;
            let ipc_path = path.to_string_lossy().to_string();
            let ipc = IpcConnect::new(ipc_path);
            let provider = ProviderBuilder::new().connect_ipc(ipc).await?;
            let display = path.display().to_string();
            Ok(Box::new(AlloyProvider::Ipc {
                provider,
                endpoint: display,
            }))
        }
    }
}

// Macro to reduce code duplication for provider method implementations
macro_rules! impl_provider_method {
    ($self:ident, $method:ident $(, $arg:expr)*) => {
        match $self {
            AlloyProvider::Http { provider, .. } => provider.$method($($arg),*).await,
            AlloyProvider::WebSocket { provider, .. } => provider.$method($($arg),*).await,
            #[cfg(unix)]
            AlloyProvider::Ipc { provider, .. } => provider.$method($($arg),*).await,
        }
    };
}

#[async_trait::async_trait]
impl EthereumProvider for AlloyProvider {
    async fn block_number(&self) -> Result<u64> {
        Ok(impl_provider_method!(self, get_block_number)?)
    }

    async fn chain_id(&self) -> Result<u64> {
        Ok(impl_provider_method!(self, get_chain_id)?)
    }

    async fn client_version(&self) -> Result<String> {
        Ok(impl_provider_method!(self, get_client_version)?)
    }

    async fn get_block(&self, selector: &BlockSelector) -> Result<serde_json::Value> {
        let method = selector.rpc_method();
        let param = selector.rpc_param();
        let json: serde_json::Value = match self {
            AlloyProvider::Http { provider, .. } => {
                provider.raw_request(method.into(), (&param, false)).await?
            }
            AlloyProvider::WebSocket { provider, .. } => {
                provider.raw_request(method.into(), (&param, false)).await?
            }
            #[cfg(unix)]
            AlloyProvider::Ipc { provider, .. } => {
                provider.raw_request(method.into(), (&param, false)).await?
            }
        };
        Ok(json)
    }

    async fn get_transaction(&self, hash: B256) -> Result<serde_json::Value> {
        let json: serde_json::Value = match self {
            AlloyProvider::Http { provider, .. } => {
                provider.raw_request("eth_getTransactionByHash".into(), (hash,)).await?
            }
            AlloyProvider::WebSocket { provider, .. } => {
                provider.raw_request("eth_getTransactionByHash".into(), (hash,)).await?
            }
            #[cfg(unix)]
            AlloyProvider::Ipc { provider, .. } => {
                provider.raw_request("eth_getTransactionByHash".into(), (hash,)).await?
            }
        };
        Ok(json)
    }

    async fn get_receipt(&self, hash: B256) -> Result<Option<TransactionReceipt>> {
        Ok(impl_provider_method!(self, get_transaction_receipt, hash)?)
    }

    async fn get_balance(&self, address: Address) -> Result<U256> {
        Ok(impl_provider_method!(self, get_balance, address)?)
    }

    async fn call(&self, request: TransactionRequest) -> Result<Bytes> {
        match self {
            AlloyProvider::Http { provider, .. } => Ok(provider.call(request.clone()).await?),
            AlloyProvider::WebSocket { provider, .. } => Ok(provider.call(request.clone()).await?),
            #[cfg(unix)]
            AlloyProvider::Ipc { provider, .. } => Ok(provider.call(request).await?),
        }
    }

    async fn estimate_gas(&self, request: TransactionRequest) -> Result<u64> {
        match self {
            AlloyProvider::Http { provider, .. } => {
                Ok(provider.estimate_gas(request.clone()).await?)
            }
            AlloyProvider::WebSocket { provider, .. } => {
                Ok(provider.estimate_gas(request.clone()).await?)
            }
            #[cfg(unix)]
            AlloyProvider::Ipc { provider, .. } => Ok(provider.estimate_gas(request).await?),
        }
    }

    async fn transaction_count(&self, address: Address) -> Result<u64> {
        Ok(impl_provider_method!(self, get_transaction_count, address)?)
    }

    async fn estimate_fees(&self) -> Result<FeeEstimate> {
        let estimate = impl_provider_method!(self, estimate_eip1559_fees)?;
        Ok(FeeEstimate {
            max_fee_per_gas: estimate.max_fee_per_gas,
            max_priority_fee_per_gas: estimate.max_priority_fee_per_gas,
        })
    }

    async fn send_raw_transaction(&self, encoded: &[u8]) -> Result<TransactionReceipt> {
        let pending = match self {
            AlloyProvider::Http { provider, .. } => {
                provider.send_raw_transaction(encoded).await?
            }
            AlloyProvider::WebSocket { provider, .. } => {
                provider.send_raw_transaction(encoded).await?
            }
            #[cfg(unix)]
            AlloyProvider::Ipc { provider, .. } => provider.send_raw_transaction(encoded).await?,
        };
        Ok(pending.get_receipt().await?)
    }

    fn endpoint_name(&self) -> String {
        match self {
            AlloyProvider::Http { endpoint, .. } => endpoint.clone(),
            AlloyProvider::WebSocket { endpoint, .. } => endpoint.clone(),
            #[cfg(unix)]
            AlloyProvider::Ipc { endpoint, .. } => endpoint.clone(),
        }
    }
}
