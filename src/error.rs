//! Error taxonomy for the library surface.
//!
//! Conditions a caller is expected to match on (missing configuration,
//! uncached ABIs, credential problems) get their own variants; failures
//! from the underlying alloy layers are wrapped and propagate unchanged.
//! There is no retry logic anywhere: transaction submission is not
//! idempotent, so retry policy belongs to the caller.

use alloy::network::{Ethereum, TransactionBuilderError};
use alloy::providers::PendingTransactionError;
use alloy::signers::local::LocalSignerError;
use alloy::transports::{RpcError, TransportErrorKind};

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by connection management, account handling, and
/// contract-call dispatch.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Missing or malformed ecosystem/network/provider selection,
    /// unresolvable endpoint, or unusable directory override.
    #[error("configuration error: {0}")]
    Config(String),

    /// An operation that needs an open connection was invoked on a
    /// disconnected context.
    #[error("not connected; call connect() first")]
    NotConnected,

    /// No ABI registered for the address and automatic discovery could
    /// not determine the contract type.
    #[error("no cached ABI for contract {address}")]
    AbiNotCached {
        /// Contract address as the failing lookup spelled it.
        address: String,
    },

    /// The requested function name does not exist on the bound contract.
    #[error("function {function} not found in contract at {address}")]
    FunctionNotFound {
        /// Requested function name.
        function: String,
        /// Checksummed contract address.
        address: String,
    },

    /// A mutating call was dispatched without a signing credential.
    #[error("mutating call requires a 'private_key' or 'account' credential")]
    MissingCredential,

    /// The supplied sender address disagrees with the signing key.
    #[error("account key {account} mismatches sender address {sender}")]
    SenderMismatch {
        /// Address derived from the credential.
        account: String,
        /// Sender address supplied by the caller.
        sender: String,
    },

    /// The selected network has no block explorer registered.
    #[error("no explorer available for {network}")]
    ExplorerNotAvailable {
        /// `ecosystem:network` pair.
        network: String,
    },

    /// The account was acquired for signing with autosign disabled.
    #[error("account {alias} is not armed for signing; enable autosign first")]
    SigningLocked {
        /// Account alias.
        alias: String,
    },

    /// Contract discovery request failed at the transport level.
    #[error("contract discovery failed: {0}")]
    Discovery(#[from] reqwest::Error),

    /// JSON-RPC transport or node error.
    #[error(transparent)]
    Rpc(#[from] RpcError<TransportErrorKind>),

    /// Submitted transaction failed while awaiting confirmation.
    #[error(transparent)]
    PendingTransaction(#[from] PendingTransactionError),

    /// Keystore encryption/decryption or key parsing failure.
    #[error(transparent)]
    Keystore(#[from] LocalSignerError),

    /// Transaction assembly or signing failure.
    #[error(transparent)]
    TxBuild(#[from] TransactionBuilderError<Ethereum>),

    /// ABI encoding/decoding failure.
    #[error(transparent)]
    Abi(#[from] alloy_dyn_abi::Error),

    /// Malformed JSON in an ABI map or RPC payload.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Filesystem failure around keyfiles or working directories.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
