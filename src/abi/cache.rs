//! Address-keyed ABI cache, the fallback when discovery cannot
//! determine a contract type.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use alloy::primitives::Address;
use alloy_json_abi::JsonAbi;

use crate::config::normalize_address;
use crate::error::{Error, Result};

/// Where an ABI map comes from: an inline JSON object or a file
/// containing one. The map shape is `{ "0xaddress": [ ...abi... ] }`.
#[derive(Debug, Clone)]
pub enum AbiMapSource {
    Inline(serde_json::Value),
    File(PathBuf),
}

/// In-process mapping from normalized contract address to ABI.
///
/// Entries never expire; a later write for the same address overwrites
/// the earlier one.
#[derive(Debug, Default)]
pub struct AbiCache {
    entries: HashMap<String, JsonAbi>,
}

impl AbiCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store or overwrite the ABI for an address.
    pub fn set_contract_abi(&mut self, address: Address, abi: JsonAbi) {
        self.entries
            .insert(normalize_address(&address.to_string()), abi);
    }

    /// Fetch the ABI for an address; a distinct, matchable error when
    /// the address was never registered.
    pub fn get_contract_abi(&self, address: Address) -> Result<&JsonAbi> {
        let key = normalize_address(&address.to_string());
        self.entries
            .get(&key)
            .ok_or(Error::AbiNotCached { address: key })
    }

    pub fn contains(&self, address: Address) -> bool {
        self.entries
            .contains_key(&normalize_address(&address.to_string()))
    }

    /// ABI for an address if registered, without the error path.
    pub fn lookup(&self, address: Address) -> Option<&JsonAbi> {
        self.entries.get(&normalize_address(&address.to_string()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Register every entry from an ABI map source. Returns the number
    /// of contracts registered.
    pub fn set_abi_map(&mut self, source: &AbiMapSource) -> Result<usize> {
        match source {
            AbiMapSource::Inline(map) => self.load_map_value(map),
            AbiMapSource::File(path) => self.load_map_file(path),
        }
    }

    fn load_map_file(&mut self, path: &Path) -> Result<usize> {
        let content = fs::read_to_string(path)?;
        let map: serde_json::Value = serde_json::from_str(&content)?;
        self.load_map_value(&map)
    }

    fn load_map_value(&mut self, map: &serde_json::Value) -> Result<usize> {
        let object = map.as_object().ok_or_else(|| {
            Error::Config("ABI map must be a JSON object keyed by contract address".to_string())
        })?;
        let mut registered = 0;
        for (key, value) in object {
            let address = Address::from_str(key)
                .map_err(|err| Error::Config(format!("bad address '{key}' in ABI map: {err}")))?;
            let abi: JsonAbi = serde_json::from_value(value.clone())?;
            self.set_contract_abi(address, abi);
            registered += 1;
        }
        Ok(registered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const COUNTER_ABI: &str = r#"[
        {
            "type": "function",
            "name": "retrieve",
            "inputs": [],
            "outputs": [{"name": "", "type": "uint256", "internalType": "uint256"}],
            "stateMutability": "view"
        },
        {
            "type": "function",
            "name": "store",
            "inputs": [{"name": "num", "type": "uint256", "internalType": "uint256"}],
            "outputs": [],
            "stateMutability": "nonpayable"
        }
    ]"#;

    fn test_address() -> Address {
        "0x5FbDB2315678afecb367f032d93F642f64180aa3".parse().unwrap()
    }

    #[test]
    fn unregistered_address_is_a_distinct_error() {
        let cache = AbiCache::new();
        match cache.get_contract_abi(test_address()) {
            Err(Error::AbiNotCached { address }) => {
                assert_eq!(address, "0x5fbdb2315678afecb367f032d93f642f64180aa3");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn set_then_get_returns_the_same_abi() {
        let mut cache = AbiCache::new();
        let abi: JsonAbi = serde_json::from_str(COUNTER_ABI).unwrap();
        cache.set_contract_abi(test_address(), abi.clone());

        let fetched = cache.get_contract_abi(test_address()).unwrap();
        assert_eq!(fetched, &abi);
        assert!(cache.contains(test_address()));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn later_writes_overwrite() {
        let mut cache = AbiCache::new();
        let full: JsonAbi = serde_json::from_str(COUNTER_ABI).unwrap();
        let empty: JsonAbi = serde_json::from_str("[]").unwrap();

        cache.set_contract_abi(test_address(), full);
        cache.set_contract_abi(test_address(), empty.clone());

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get_contract_abi(test_address()).unwrap(), &empty);
    }

    #[test]
    fn abi_map_registers_every_entry() {
        let map = serde_json::json!({
            "0x5FbDB2315678afecb367f032d93F642f64180aa3":
                serde_json::from_str::<serde_json::Value>(COUNTER_ABI).unwrap(),
            "0xe7f1725E7734CE288F8367e1Bb143E90bb3F0512": [],
        });

        let mut cache = AbiCache::new();
        let registered = cache.set_abi_map(&AbiMapSource::Inline(map)).unwrap();
        assert_eq!(registered, 2);
        assert_eq!(cache.len(), 2);
        assert!(cache.contains(test_address()));
    }

    #[test]
    fn abi_map_loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("abi_map.json");
        let mut file = fs::File::create(&path).unwrap();
        write!(
            file,
            r#"{{"0x5FbDB2315678afecb367f032d93F642f64180aa3": {COUNTER_ABI}}}"#
        )
        .unwrap();

        let mut cache = AbiCache::new();
        let registered = cache.set_abi_map(&AbiMapSource::File(path)).unwrap();
        assert_eq!(registered, 1);
        assert!(cache.get_contract_abi(test_address()).is_ok());
    }

    #[test]
    fn bad_map_shapes_are_config_errors() {
        let mut cache = AbiCache::new();
        let not_an_object = AbiMapSource::Inline(serde_json::json!([1, 2, 3]));
        assert!(matches!(cache.set_abi_map(&not_an_object), Err(Error::Config(_))));

        let bad_key = AbiMapSource::Inline(serde_json::json!({"nonsense": []}));
        assert!(matches!(cache.set_abi_map(&bad_key), Err(Error::Config(_))));
    }
}
