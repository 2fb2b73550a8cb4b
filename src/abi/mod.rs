//! Contract ABI cache and automatic contract-type discovery.

pub mod cache;
pub mod discovery;

pub use cache::{AbiCache, AbiMapSource};
pub use discovery::{AbiDiscovery, SourcifyDiscovery};
