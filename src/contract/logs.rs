//! Receipt log decoding against cached ABIs.

use alloy::primitives::Address;
use alloy::rpc::types::{Log, TransactionReceipt};
use alloy_dyn_abi::{DynSolValue, EventExt};
use alloy_json_abi::JsonAbi;

use crate::json::dyn_to_json;

/// An event log matched against its ABI declaration, with parameters
/// back in declaration order.
#[derive(Debug, Clone)]
pub struct DecodedLog {
    pub name: String,
    pub contract: Address,
    pub params: Vec<(String, DynSolValue)>,
}

impl DecodedLog {
    pub fn to_json(&self) -> serde_json::Value {
        let arguments: serde_json::Map<String, serde_json::Value> = self
            .params
            .iter()
            .map(|(name, value)| (name.clone(), dyn_to_json(value)))
            .collect();
        serde_json::json!({
            "event_name": self.name,
            "contract_address": self.contract.to_checksum(None),
            "event_arguments": arguments,
        })
    }
}

/// Decode a single log against `abi`. Returns `None` when no event in
/// the ABI matches the log's first topic, or the payload does not fit
/// the matched declaration.
pub fn decode_log(abi: &JsonAbi, log: &Log) -> Option<DecodedLog> {
    let topics = log.inner.data.topics();
    let selector = topics.first()?;
    for event in abi.events.values().flatten() {
        if event.anonymous || event.selector() != *selector {
            continue;
        }
        let decoded = match event.decode_log_parts(topics.iter().copied(), &log.inner.data.data) {
            Ok(decoded) => decoded,
            Err(err) => {
                tracing::debug!(event = %event.name, %err, "log payload does not match event");
                return None;
            }
        };
        let mut indexed = decoded.indexed.into_iter();
        let mut body = decoded.body.into_iter();
        let params = event
            .inputs
            .iter()
            .enumerate()
            .filter_map(|(i, input)| {
                let value = if input.indexed {
                    indexed.next()?
                } else {
                    body.next()?
                };
                let name = if input.name.is_empty() {
                    format!("arg{i}")
                } else {
                    input.name.clone()
                };
                Some((name, value))
            })
            .collect();
        return Some(DecodedLog {
            name: event.name.clone(),
            contract: log.inner.address,
            params,
        });
    }
    None
}

/// Decode the logs a set of contracts emitted, looking ABIs up per
/// emitting address. Logs without a cached ABI are skipped.
pub fn decode_logs<'a, F>(logs: &[Log], abi_for: F) -> Vec<DecodedLog>
where
    F: Fn(Address) -> Option<&'a JsonAbi>,
{
    logs.iter()
        .filter_map(|log| abi_for(log.inner.address).and_then(|abi| decode_log(abi, log)))
        .collect()
}

pub fn decode_receipt_logs<'a, F>(receipt: &TransactionReceipt, abi_for: F) -> Vec<DecodedLog>
where
    F: Fn(Address) -> Option<&'a JsonAbi>,
{
    decode_logs(receipt.inner.logs(), abi_for)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{b256, Bytes, LogData, B256, U256};
    use std::str::FromStr;

    const TRANSFER_SELECTOR: B256 =
        b256!("ddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef");

    const TOKEN_ABI: &str = r#"[
        {
            "type": "event",
            "name": "Transfer",
            "inputs": [
                {"name": "from", "type": "address", "indexed": true},
                {"name": "to", "type": "address", "indexed": true},
                {"name": "value", "type": "uint256", "indexed": false}
            ],
            "anonymous": false
        }
    ]"#;

    fn token_abi() -> JsonAbi {
        serde_json::from_str(TOKEN_ABI).unwrap()
    }

    fn transfer_log(contract: Address, from: Address, to: Address, value: u64) -> Log {
        let topics = vec![TRANSFER_SELECTOR, from.into_word(), to.into_word()];
        let data = Bytes::copy_from_slice(&U256::from(value).to_be_bytes::<32>());
        let mut log = Log::default();
        log.inner.address = contract;
        log.inner.data = LogData::new_unchecked(topics, data);
        log
    }

    #[test]
    fn decodes_matching_event_in_declaration_order() {
        let contract = Address::from_str("0x5fbdb2315678afecb367f032d93f642f64180aa3").unwrap();
        let from = Address::from_str("0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266").unwrap();
        let to = Address::from_str("0x70997970c51812dc3a010c7d01b50e0d17dc79c8").unwrap();
        let abi = token_abi();

        let decoded = decode_log(&abi, &transfer_log(contract, from, to, 99)).unwrap();
        assert_eq!(decoded.name, "Transfer");
        assert_eq!(decoded.contract, contract);
        let names: Vec<&str> = decoded.params.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, ["from", "to", "value"]);
        match &decoded.params[2].1 {
            DynSolValue::Uint(value, _) => assert_eq!(*value, U256::from(99u64)),
            other => panic!("unexpected value: {other:?}"),
        }

        let json = decoded.to_json();
        assert_eq!(json["event_name"], "Transfer");
        assert_eq!(json["event_arguments"]["value"], "99");
        assert_eq!(
            json["event_arguments"]["to"],
            "0x70997970C51812dc3A010C7d01b50e0d17dc79C8"
        );
    }

    #[test]
    fn unmatched_selector_yields_none() {
        let abi = token_abi();
        let mut log = Log::default();
        log.inner.data = LogData::new_unchecked(
            vec![b256!("0000000000000000000000000000000000000000000000000000000000000001")],
            Bytes::new(),
        );
        assert!(decode_log(&abi, &log).is_none());
    }

    #[test]
    fn decode_logs_skips_contracts_without_an_abi() {
        let known = Address::from_str("0x5fbdb2315678afecb367f032d93f642f64180aa3").unwrap();
        let unknown = Address::from_str("0x0000000000000000000000000000000000000bad").unwrap();
        let holder = Address::ZERO;
        let abi = token_abi();

        let logs = vec![
            transfer_log(known, holder, holder, 1),
            transfer_log(unknown, holder, holder, 2),
        ];
        let decoded = decode_logs(&logs, |address| (address == known).then_some(&abi));
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].contract, known);
    }
}
