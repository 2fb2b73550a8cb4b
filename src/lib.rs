//! Convenience layer for talking to Ethereum nodes.
//!
//! `ethman` wraps alloy's providers, signers and ABI tooling behind one
//! context type: pick a network with an `ecosystem:network:provider`
//! selector, connect, and dispatch contract calls by function name.
//! Read-only functions run as `eth_call`; mutating ones are signed with
//! ephemeral encrypted-keyfile accounts and broadcast, returning the
//! receipt with its logs decoded.
//!
//! ```no_run
//! use alloy::primitives::address;
//! use ethman::{CallOptions, Ethman};
//!
//! # async fn demo() -> ethman::Result<()> {
//! let mut man = Ethman::from_selector("ethereum:local:anvil")?;
//! man.connect().await?;
//!
//! let storage = address!("5FbDB2315678afecb367f032d93F642f64180aa3");
//! let outcome = man
//!     .call_contract(storage, "retrieve", &[], CallOptions::new())
//!     .await?;
//! println!("{}", outcome.to_json()?);
//!
//! man.disconnect();
//! # Ok(())
//! # }
//! ```

pub mod abi;
pub mod account;
pub mod config;
pub mod context;
pub mod contract;
pub mod error;
pub mod json;
pub mod network;
pub mod provider;

pub use abi::{AbiCache, AbiDiscovery, AbiMapSource, SourcifyDiscovery};
pub use account::{KeyAccount, LiveAccount};
pub use context::{Connection, Ethman, EthmanOptions, Session};
pub use contract::{
    BoundContract, CallOptions, CallOutcome, CallValue, DecodedLog, FunctionKind,
};
pub use error::{Error, Result};
pub use network::{ChainSpec, Explorer};
pub use provider::{BlockSelector, EthereumProvider, FeeEstimate, ProviderConfig};
