//! JSON rendering helpers shared by the library and the CLI.

use alloy::primitives::hex;
use alloy_dyn_abi::DynSolValue;
use serde_json::Value;

pub fn render(value: &Value, pretty: bool) -> String {
    if pretty {
        serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
    } else {
        value.to_string()
    }
}

/// Convert a decoded Solidity value into JSON.
///
/// Integers render as decimal strings so 256-bit widths survive the
/// trip; byte types keep a `0x` hex spelling and addresses are
/// checksummed.
pub fn dyn_to_json(value: &DynSolValue) -> Value {
    match value {
        DynSolValue::Bool(b) => Value::Bool(*b),
        DynSolValue::Int(i, _) => Value::String(i.to_string()),
        DynSolValue::Uint(u, _) => Value::String(u.to_string()),
        DynSolValue::FixedBytes(word, size) => {
            Value::String(format!("0x{}", hex::encode(&word.as_slice()[..(*size).min(32)])))
        }
        DynSolValue::Address(address) => Value::String(address.to_checksum(None)),
        DynSolValue::Function(function) => {
            Value::String(format!("0x{}", hex::encode(function.as_slice())))
        }
        DynSolValue::Bytes(bytes) => Value::String(format!("0x{}", hex::encode(bytes))),
        DynSolValue::String(s) => Value::String(s.clone()),
        DynSolValue::Array(values) | DynSolValue::FixedArray(values) => {
            Value::Array(values.iter().map(dyn_to_json).collect())
        }
        DynSolValue::Tuple(values) => Value::Array(values.iter().map(dyn_to_json).collect()),
    }
}

/// Re-render hex byte fields as human-readable text, recursively.
///
/// Every `0x` string with an even-length hex payload is decoded and
/// shown as text, with non-printable bytes lossily replaced by `.`.
/// Quantities in minimal hex form have an odd digit count and keep
/// their hex spelling.
pub fn humanize(value: &Value) -> Value {
    match value {
        Value::String(s) => humanize_bytes(s).map(Value::String).unwrap_or_else(|| value.clone()),
        Value::Array(items) => Value::Array(items.iter().map(humanize).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, item)| (key.clone(), humanize(item)))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn humanize_bytes(s: &str) -> Option<String> {
    let digits = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X"))?;
    if digits.is_empty() || digits.len() % 2 != 0 {
        return None;
    }
    let bytes = hex::decode(digits).ok()?;
    Some(
        bytes
            .iter()
            .map(|&byte| {
                if (0x20..=0x7e).contains(&byte) {
                    byte as char
                } else {
                    '.'
                }
            })
            .collect(),
    )
}
