//! Bound contracts and the uniform call dispatcher.
//!
//! A contract handle classifies every ABI function once at binding
//! time: pure/view functions become lookups, payable/nonpayable ones
//! become transactions. Dispatch then matches on the tag instead of
//! sniffing capabilities per call.

pub(crate) mod dispatch;
pub mod logs;

use std::collections::HashMap;

use alloy::primitives::{Address, U256};
use alloy::rpc::types::TransactionReceipt;
use alloy_dyn_abi::DynSolValue;
use alloy_json_abi::{Function, JsonAbi, StateMutability};

use crate::account::KeyAccount;
use crate::error::{Error, Result};
use crate::json::dyn_to_json;
pub use logs::DecodedLog;

/// How a bound function executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    /// Read-only: executed as an `eth_call`, no signing involved.
    Lookup,
    /// State-mutating: requires a signed, broadcast transaction.
    Transact,
}

impl FunctionKind {
    fn classify(function: &Function) -> Self {
        match function.state_mutability {
            StateMutability::Pure | StateMutability::View => FunctionKind::Lookup,
            StateMutability::NonPayable | StateMutability::Payable => FunctionKind::Transact,
        }
    }
}

/// A contract address paired with its ABI and the per-function kind
/// tags resolved at binding time.
#[derive(Debug, Clone)]
pub struct BoundContract {
    address: Address,
    abi: JsonAbi,
    functions: HashMap<String, Vec<(Function, FunctionKind)>>,
}

impl BoundContract {
    pub fn bind(address: Address, abi: JsonAbi) -> Self {
        let mut functions: HashMap<String, Vec<(Function, FunctionKind)>> = HashMap::new();
        for function in abi.functions() {
            let kind = FunctionKind::classify(function);
            functions
                .entry(function.name.clone())
                .or_default()
                .push((function.clone(), kind));
        }
        Self {
            address,
            abi,
            functions,
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn abi(&self) -> &JsonAbi {
        &self.abi
    }

    /// Resolve a function by name. Overloads prefer a matching argument
    /// count, falling back to the first declaration.
    pub fn function(&self, name: &str, arg_count: usize) -> Result<(&Function, FunctionKind)> {
        let overloads = self.functions.get(name).ok_or_else(|| Error::FunctionNotFound {
            function: name.to_string(),
            address: self.address.to_checksum(None),
        })?;
        let (function, kind) = overloads
            .iter()
            .find(|(function, _)| function.inputs.len() == arg_count)
            .unwrap_or(&overloads[0]);
        Ok((function, *kind))
    }
}

/// Per-call options for [`call_contract`](crate::context::Ethman::call_contract).
///
/// A mutating call needs exactly one credential: a raw `private_key`
/// (minting an ephemeral account) or a pre-built `account`.
#[derive(Default)]
pub struct CallOptions<'a> {
    pub sender: Option<Address>,
    pub private_key: Option<String>,
    pub account: Option<&'a KeyAccount>,
    /// Defaults to enabled on the transaction path.
    pub autosign: Option<bool>,
    /// Ether attached to the transaction.
    pub value: Option<U256>,
    pub gas_limit: Option<u64>,
    pub max_fee_per_gas: Option<u128>,
    pub max_priority_fee_per_gas: Option<u128>,
    /// Registered into the ABI cache before the contract is resolved.
    pub abi: Option<JsonAbi>,
}

impl<'a> CallOptions<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sender(mut self, sender: Address) -> Self {
        self.sender = Some(sender);
        self
    }

    pub fn private_key(mut self, private_key: impl Into<String>) -> Self {
        self.private_key = Some(private_key.into());
        self
    }

    pub fn account(mut self, account: &'a KeyAccount) -> Self {
        self.account = Some(account);
        self
    }

    pub fn autosign(mut self, autosign: bool) -> Self {
        self.autosign = Some(autosign);
        self
    }

    pub fn value(mut self, value: U256) -> Self {
        self.value = Some(value);
        self
    }

    pub fn gas_limit(mut self, gas_limit: u64) -> Self {
        self.gas_limit = Some(gas_limit);
        self
    }

    pub fn max_fee_per_gas(mut self, max_fee_per_gas: u128) -> Self {
        self.max_fee_per_gas = Some(max_fee_per_gas);
        self
    }

    pub fn max_priority_fee_per_gas(mut self, max_priority_fee_per_gas: u128) -> Self {
        self.max_priority_fee_per_gas = Some(max_priority_fee_per_gas);
        self
    }

    pub fn abi(mut self, abi: JsonAbi) -> Self {
        self.abi = Some(abi);
        self
    }
}

/// Where a call outcome's value came from.
#[derive(Debug, Clone)]
pub enum CallValue {
    /// Decoded return values of a lookup call.
    Returned(Vec<DynSolValue>),
    /// First decoded event log of a mutating call's receipt.
    Logged(DecodedLog),
}

/// Normalized result of a dispatched call.
///
/// Lookups populate `value` and leave `receipt` empty; mutating calls
/// always retain the receipt, and their `value` is derived from the
/// first decoded log (unset when the receipt emitted none).
#[derive(Debug)]
pub struct CallOutcome {
    pub value: Option<CallValue>,
    pub receipt: Option<TransactionReceipt>,
    pub decoded_logs: Vec<DecodedLog>,
}

impl CallOutcome {
    pub(crate) fn from_return(values: Vec<DynSolValue>) -> Self {
        Self {
            value: Some(CallValue::Returned(values)),
            receipt: None,
            decoded_logs: Vec::new(),
        }
    }

    pub(crate) fn from_receipt(receipt: TransactionReceipt, decoded_logs: Vec<DecodedLog>) -> Self {
        Self {
            value: decoded_logs.first().cloned().map(CallValue::Logged),
            receipt: Some(receipt),
            decoded_logs,
        }
    }

    /// Single decoded return value, for the common one-output lookup.
    pub fn returned(&self) -> Option<&DynSolValue> {
        match &self.value {
            Some(CallValue::Returned(values)) => values.first(),
            _ => None,
        }
    }

    /// JSON rendering in the `{ret, receipt, decoded_logs}` shape.
    pub fn to_json(&self) -> Result<serde_json::Value> {
        let ret = match &self.value {
            None => serde_json::Value::Null,
            Some(CallValue::Logged(log)) => log.to_json(),
            Some(CallValue::Returned(values)) => match values.as_slice() {
                [] => serde_json::Value::Null,
                [single] => dyn_to_json(single),
                many => serde_json::Value::Array(many.iter().map(dyn_to_json).collect()),
            },
        };
        let receipt = match &self.receipt {
            Some(receipt) => serde_json::to_value(receipt)?,
            None => serde_json::Value::Null,
        };
        Ok(serde_json::json!({
            "ret": ret,
            "receipt": receipt,
            "decoded_logs": self
                .decoded_logs
                .iter()
                .map(DecodedLog::to_json)
                .collect::<Vec<_>>(),
        }))
    }
}
