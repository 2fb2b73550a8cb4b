//! The connection context: selection, lifecycle, and contract calls.
//!
//! [`Ethman`] resolves everything configurable up front (selection,
//! chain, endpoint, directories, ABI seed) and fails fast on bad
//! configuration. The network side lives behind [`Connection`], which
//! only exists between `connect()` and `disconnect()`.

use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use alloy::primitives::{Address, B256, U256};
use alloy::rpc::types::TransactionReceipt;
use alloy_dyn_abi::DynSolValue;
use alloy_json_abi::JsonAbi;

use crate::abi::{AbiCache, AbiDiscovery, AbiMapSource, SourcifyDiscovery};
use crate::account::KeyAccount;
use crate::config::{self, Selection, WorkDir};
use crate::contract::logs::decode_receipt_logs;
use crate::contract::{dispatch, BoundContract, CallOptions, CallOutcome, DecodedLog, FunctionKind};
use crate::error::{Error, Result};
use crate::network::{self, ChainSpec, Explorer};
use crate::provider::{create_provider, BlockSelector, EthereumProvider, ProviderConfig};

/// Construction knobs for [`Ethman`]. Everything is optional; selection
/// parts fall back to `ETHMAN_*` environment variables, directories to
/// temporary ones, discovery to Sourcify.
#[derive(Default)]
pub struct EthmanOptions {
    pub ecosystem: Option<String>,
    pub network: Option<String>,
    pub provider: Option<String>,
    /// Combined `ecosystem:network:provider` selector; wins over the
    /// per-part fields.
    pub selector: Option<String>,
    pub project_dir: Option<PathBuf>,
    pub data_dir: Option<PathBuf>,
    pub abi_map: Option<AbiMapSource>,
    /// Injected contract-type discovery; `None` means Sourcify.
    pub discovery: Option<Box<dyn AbiDiscovery>>,
}

impl EthmanOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ecosystem(mut self, ecosystem: impl Into<String>) -> Self {
        self.ecosystem = Some(ecosystem.into());
        self
    }

    pub fn network(mut self, network: impl Into<String>) -> Self {
        self.network = Some(network.into());
        self
    }

    pub fn provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    pub fn selector(mut self, selector: impl Into<String>) -> Self {
        self.selector = Some(selector.into());
        self
    }

    pub fn project_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.project_dir = Some(path.into());
        self
    }

    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(path.into());
        self
    }

    pub fn abi_map(mut self, source: AbiMapSource) -> Self {
        self.abi_map = Some(source);
        self
    }

    pub fn discovery(mut self, discovery: Box<dyn AbiDiscovery>) -> Self {
        self.discovery = Some(discovery);
        self
    }
}

/// Live network handles, alive between `connect()` and `disconnect()`.
pub struct Connection {
    provider: Box<dyn EthereumProvider>,
    explorer: Option<Explorer>,
    /// Bound contracts memoized per address for the connection's life.
    contracts: Mutex<HashMap<Address, BoundContract>>,
}

impl Connection {
    pub fn provider(&self) -> &dyn EthereumProvider {
        self.provider.as_ref()
    }

    pub fn explorer(&self) -> Option<&Explorer> {
        self.explorer.as_ref()
    }

    fn contracts(&self) -> MutexGuard<'_, HashMap<Address, BoundContract>> {
        match self.contracts.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn bound(&self, address: Address) -> Option<BoundContract> {
        self.contracts().get(&address).cloned()
    }

    fn bindings(&self) -> HashMap<Address, BoundContract> {
        self.contracts().clone()
    }

    fn memoize(&self, contract: BoundContract) {
        self.contracts().insert(contract.address(), contract);
    }

    fn forget(&self, address: Address) {
        self.contracts().remove(&address);
    }

    fn clear_bindings(&self) {
        self.contracts().clear();
    }
}

/// The connection context.
pub struct Ethman {
    selection: Selection,
    chain: &'static ChainSpec,
    endpoint: ProviderConfig,
    project_dir: WorkDir,
    data_dir: WorkDir,
    accounts_dir: PathBuf,
    abi_cache: AbiCache,
    discovery: Box<dyn AbiDiscovery>,
    connection: Option<Arc<Connection>>,
}

impl Ethman {
    /// Resolve selection, chain, endpoint and directories, and seed the
    /// ABI cache. Configuration problems surface here, not at call time.
    pub fn new(options: EthmanOptions) -> Result<Self> {
        let EthmanOptions {
            ecosystem,
            network,
            provider,
            selector,
            project_dir,
            data_dir,
            abi_map,
            discovery,
        } = options;

        let selection = Selection::resolve(
            ecosystem.as_deref(),
            network.as_deref(),
            provider.as_deref(),
            selector.as_deref(),
        )?;
        let chain = ChainSpec::lookup(&selection.ecosystem, &selection.network)?;
        let file_config = config::load();
        let endpoint = network::resolve_endpoint(&selection, &file_config)?;

        let project_dir = WorkDir::resolve(project_dir, "ETHMAN_PROJECT_DIR")?;
        let explicit_data =
            data_dir.or_else(|| std::env::var_os("ETHMAN_DATA_DIR").map(PathBuf::from));
        let data_dir = match explicit_data {
            Some(path) => WorkDir::resolve(Some(path), "ETHMAN_DATA_DIR")?,
            // lives inside the project dir, so a temp project cleans it up
            None => WorkDir::Explicit(config::secure_subdir(project_dir.path(), "data")?),
        };
        let accounts_dir = config::secure_subdir(data_dir.path(), "accounts")?;

        let mut abi_cache = AbiCache::new();
        let abi_source = abi_map.or_else(|| {
            std::env::var_os("ETHMAN_ABI_FILE").map(|path| AbiMapSource::File(PathBuf::from(path)))
        });
        if let Some(source) = &abi_source {
            let count = abi_cache.set_abi_map(source)?;
            tracing::debug!(count, "seeded ABI cache");
        }

        tracing::debug!(
            selection = %selection.selector(),
            chain_id = chain.chain_id,
            endpoint = %endpoint.display(),
            "context ready"
        );
        Ok(Self {
            selection,
            chain,
            endpoint,
            project_dir,
            data_dir,
            accounts_dir,
            abi_cache,
            discovery: discovery.unwrap_or_else(|| Box::new(SourcifyDiscovery::new())),
            connection: None,
        })
    }

    /// Context for an `ecosystem:network:provider` selector.
    pub fn from_selector(selector: &str) -> Result<Self> {
        Self::new(EthmanOptions::new().selector(selector))
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn chain(&self) -> &ChainSpec {
        self.chain
    }

    pub fn project_dir(&self) -> &Path {
        self.project_dir.path()
    }

    pub fn data_dir(&self) -> &Path {
        self.data_dir.path()
    }

    pub fn accounts_dir(&self) -> &Path {
        &self.accounts_dir
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Establish the provider connection. Idempotent: connecting while
    /// connected returns the existing handle untouched.
    pub async fn connect(&mut self) -> Result<Arc<Connection>> {
        if let Some(connection) = &self.connection {
            tracing::debug!("connect on a live connection is a no-op");
            return Ok(Arc::clone(connection));
        }

        let provider = create_provider(self.endpoint.clone()).await?;
        // Identity checks are best-effort; an unreachable or foreign
        // node surfaces on the first real call instead.
        match provider.client_version().await {
            Ok(version) => tracing::debug!(%version, "node identity"),
            Err(err) => tracing::debug!(%err, "node identity check failed"),
        }
        if let Ok(reported) = provider.chain_id().await {
            if reported != self.chain.chain_id {
                tracing::warn!(
                    expected = self.chain.chain_id,
                    reported,
                    network = %self.chain.label(),
                    "node chain id differs from the selected network"
                );
            }
        }

        let connection = Arc::new(Connection {
            provider,
            explorer: self.chain.explorer.map(Explorer::new),
            contracts: Mutex::new(HashMap::new()),
        });
        tracing::info!(
            selection = %self.selection.selector(),
            endpoint = %connection.provider.endpoint_name(),
            "connected"
        );
        self.connection = Some(Arc::clone(&connection));
        Ok(connection)
    }

    /// Drop the connection. Idempotent: disconnecting while closed is a
    /// no-op. Outstanding `Arc<Connection>` clones stay usable; the
    /// context itself just stops handing them out.
    pub fn disconnect(&mut self) {
        match self.connection.take() {
            Some(connection) => {
                tracing::info!(endpoint = %connection.provider.endpoint_name(), "disconnected");
            }
            None => tracing::debug!("disconnect without a connection is a no-op"),
        }
    }

    pub fn connection(&self) -> Result<&Arc<Connection>> {
        self.connection.as_ref().ok_or(Error::NotConnected)
    }

    /// Connect and return a guard that disconnects when dropped.
    pub async fn session(&mut self) -> Result<Session<'_>> {
        self.connect().await?;
        Ok(Session { context: self })
    }

    /// Mint a [`KeyAccount`] under the context's accounts directory.
    pub fn account(
        &self,
        private_key: &str,
        alias: Option<String>,
        password: Option<String>,
    ) -> Result<KeyAccount> {
        KeyAccount::new(&self.accounts_dir, private_key, alias, password)
    }

    /// Register an ABI for an address, replacing any previous one and
    /// any binding memoized from it.
    pub fn set_contract_abi(&mut self, address: Address, abi: JsonAbi) {
        self.abi_cache.set_contract_abi(address, abi);
        if let Some(connection) = &self.connection {
            connection.forget(address);
        }
    }

    pub fn get_contract_abi(&self, address: Address) -> Result<&JsonAbi> {
        self.abi_cache.get_contract_abi(address)
    }

    /// Register every entry of an ABI map (inline or from a file).
    pub fn set_abi_map(&mut self, source: &AbiMapSource) -> Result<usize> {
        let count = self.abi_cache.set_abi_map(source)?;
        if let Some(connection) = &self.connection {
            connection.clear_bindings();
        }
        Ok(count)
    }

    /// Resolve a contract handle.
    ///
    /// An explicit `abi` is authoritative: it is registered into the
    /// cache and bound directly. Otherwise automatic discovery runs on
    /// networks with an explorer, falling back to the cached ABI when
    /// the contract type cannot be determined; networks without an
    /// explorer go straight to the cache. Discovery transport failures
    /// propagate unchanged.
    pub async fn get_contract(
        &mut self,
        address: Address,
        abi: Option<JsonAbi>,
    ) -> Result<BoundContract> {
        let connection = Arc::clone(self.connection()?);
        if let Some(abi) = abi {
            self.set_contract_abi(address, abi.clone());
            let bound = BoundContract::bind(address, abi);
            connection.memoize(bound.clone());
            return Ok(bound);
        }
        self.bind_contract(&connection, address).await
    }

    async fn bind_contract(
        &self,
        connection: &Connection,
        address: Address,
    ) -> Result<BoundContract> {
        if let Some(bound) = connection.bound(address) {
            return Ok(bound);
        }
        let abi = if self.chain.explorer.is_some() {
            match self.discovery.discover(self.chain.chain_id, address).await? {
                Some(abi) => {
                    tracing::debug!(address = %address.to_checksum(None), "contract type discovered");
                    abi
                }
                None => self.cached_abi(address)?,
            }
        } else {
            self.cached_abi(address)?
        };
        let bound = BoundContract::bind(address, abi);
        connection.memoize(bound.clone());
        Ok(bound)
    }

    fn cached_abi(&self, address: Address) -> Result<JsonAbi> {
        self.abi_cache.lookup(address).cloned().ok_or_else(|| Error::AbiNotCached {
            address: address.to_checksum(None),
        })
    }

    /// Dispatch a contract call by function name.
    ///
    /// Read-only functions run as `eth_call` and return decoded values;
    /// mutating functions are signed with the supplied credential,
    /// broadcast, and return the receipt with its logs decoded. The
    /// credential and sender checks happen before any network traffic.
    pub async fn call_contract(
        &mut self,
        address: Address,
        function_name: &str,
        args: &[DynSolValue],
        mut options: CallOptions<'_>,
    ) -> Result<CallOutcome> {
        let connection = Arc::clone(self.connection()?);
        let contract = match options.abi.take() {
            Some(abi) => self.get_contract(address, Some(abi)).await?,
            None => self.bind_contract(&connection, address).await?,
        };
        let (function, kind) = contract.function(function_name, args.len())?;

        match kind {
            FunctionKind::Lookup => {
                tracing::debug!(
                    function = %function.name,
                    address = %contract.address(),
                    "dispatching lookup call"
                );
                let values = dispatch::execute_lookup(
                    connection.provider(),
                    &contract,
                    function,
                    args,
                    options.sender,
                )
                .await?;
                Ok(CallOutcome::from_return(values))
            }
            FunctionKind::Transact => {
                // A raw private key outranks a borrowed account.
                let minted;
                let account: &KeyAccount = if let Some(private_key) = options.private_key.as_deref()
                {
                    minted = self.account(private_key, None, None)?;
                    &minted
                } else if let Some(account) = options.account {
                    account
                } else {
                    return Err(Error::MissingCredential);
                };

                if let Some(sender) = options.sender {
                    if sender != account.address() {
                        return Err(Error::SenderMismatch {
                            account: account.address().to_checksum(None),
                            sender: sender.to_checksum(None),
                        });
                    }
                }

                // Autosign defaults on for dispatched transactions; an
                // explicit false refuses to sign even an armed account.
                account.set_autosign(options.autosign.unwrap_or(true));
                let live = account.acquire()?;
                tracing::debug!(
                    function = %function.name,
                    address = %contract.address(),
                    from = %live.address(),
                    "dispatching mutating call"
                );
                let result = dispatch::execute_transaction(
                    connection.provider(),
                    self.chain.chain_id,
                    &contract,
                    function,
                    args,
                    &live,
                    &options,
                )
                .await;
                drop(live);
                let receipt = result?;

                // The called contract's ABI decodes its own logs even
                // when it was bound through discovery and never entered
                // the user cache.
                let decoded = decode_receipt_logs(&receipt, |emitter| {
                    if emitter == contract.address() {
                        Some(contract.abi())
                    } else {
                        self.abi_cache.lookup(emitter)
                    }
                });
                Ok(CallOutcome::from_receipt(receipt, decoded))
            }
        }
    }

    /// Decode a receipt's logs against the cached ABIs and the
    /// contracts bound on the live connection.
    pub fn decode_receipt(&self, receipt: &TransactionReceipt) -> Vec<DecodedLog> {
        let bindings = match &self.connection {
            Some(connection) => connection.bindings(),
            None => HashMap::new(),
        };
        decode_receipt_logs(receipt, |emitter| {
            self.abi_cache
                .lookup(emitter)
                .or_else(|| bindings.get(&emitter).map(BoundContract::abi))
        })
    }

    pub async fn block_number(&self) -> Result<u64> {
        self.connection()?.provider().block_number().await
    }

    pub async fn get_block(&self, selector: &BlockSelector) -> Result<serde_json::Value> {
        self.connection()?.provider().get_block(selector).await
    }

    pub async fn get_transaction(&self, hash: B256) -> Result<serde_json::Value> {
        self.connection()?.provider().get_transaction(hash).await
    }

    pub async fn transaction_receipt(&self, hash: B256) -> Result<Option<TransactionReceipt>> {
        self.connection()?.provider().get_receipt(hash).await
    }

    pub async fn balance(&self, address: Address) -> Result<U256> {
        self.connection()?.provider().get_balance(address).await
    }

    /// Explorer URL for a transaction, on networks that have one.
    pub fn explorer_tx_url(&self, hash: B256) -> Result<String> {
        let connection = self.connection()?;
        let explorer = connection.explorer().ok_or_else(|| Error::ExplorerNotAvailable {
            network: self.chain.label(),
        })?;
        Ok(explorer.tx_url(hash))
    }
}

impl Drop for Ethman {
    fn drop(&mut self) {
        if self.connection.is_some() {
            self.disconnect();
        }
    }
}

/// RAII pair for connect/disconnect: dropping the session disconnects
/// the context it borrows.
pub struct Session<'a> {
    context: &'a mut Ethman,
}

impl Deref for Session<'_> {
    type Target = Ethman;

    fn deref(&self) -> &Ethman {
        self.context
    }
}

impl DerefMut for Session<'_> {
    fn deref_mut(&mut self) -> &mut Ethman {
        self.context
    }
}

impl Drop for Session<'_> {
    fn drop(&mut self) {
        self.context.disconnect();
    }
}
