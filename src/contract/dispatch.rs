//! Execution paths behind the uniform call dispatcher.
//!
//! Lookups go out as `eth_call`; mutating calls are signed locally and
//! broadcast raw, then waited on for a receipt.

use alloy::eips::eip2718::Encodable2718;
use alloy::network::TransactionBuilder;
use alloy::primitives::Address;
use alloy::rpc::types::{TransactionReceipt, TransactionRequest};
use alloy_dyn_abi::{DynSolValue, FunctionExt, JsonAbiExt};
use alloy_json_abi::Function;

use crate::account::LiveAccount;
use crate::contract::{BoundContract, CallOptions};
use crate::error::Result;
use crate::provider::{EthereumProvider, FeeEstimate};

pub(crate) async fn execute_lookup(
    provider: &dyn EthereumProvider,
    contract: &BoundContract,
    function: &Function,
    args: &[DynSolValue],
    sender: Option<Address>,
) -> Result<Vec<DynSolValue>> {
    let calldata = function.abi_encode_input(args)?;
    let mut request = TransactionRequest::default()
        .with_to(contract.address())
        .with_input(calldata);
    if let Some(sender) = sender {
        request = request.with_from(sender);
    }
    let output = provider.call(request).await?;
    Ok(function.abi_decode_output(&output)?)
}

pub(crate) async fn execute_transaction(
    provider: &dyn EthereumProvider,
    chain_id: u64,
    contract: &BoundContract,
    function: &Function,
    args: &[DynSolValue],
    live: &LiveAccount<'_>,
    options: &CallOptions<'_>,
) -> Result<TransactionReceipt> {
    let calldata = function.abi_encode_input(args)?;
    let from = live.address();
    let nonce = provider.transaction_count(from).await?;
    let fees = resolve_fees(provider, options).await?;

    let mut request = TransactionRequest::default()
        .with_from(from)
        .with_to(contract.address())
        .with_input(calldata)
        .with_value(options.value.unwrap_or_default())
        .with_nonce(nonce)
        .with_chain_id(chain_id)
        .with_max_fee_per_gas(fees.max_fee_per_gas)
        .with_max_priority_fee_per_gas(fees.max_priority_fee_per_gas);
    let gas_limit = match options.gas_limit {
        Some(limit) => limit,
        None => provider.estimate_gas(request.clone()).await?,
    };
    request = request.with_gas_limit(gas_limit);

    tracing::debug!(
        function = %function.name,
        %from,
        nonce,
        gas_limit,
        "sending contract transaction"
    );
    let envelope = request.build(live.wallet()).await?;
    provider.send_raw_transaction(&envelope.encoded_2718()).await
}

async fn resolve_fees(
    provider: &dyn EthereumProvider,
    options: &CallOptions<'_>,
) -> Result<FeeEstimate> {
    if let (Some(max_fee), Some(priority_fee)) =
        (options.max_fee_per_gas, options.max_priority_fee_per_gas)
    {
        return Ok(FeeEstimate {
            max_fee_per_gas: max_fee,
            max_priority_fee_per_gas: priority_fee,
        });
    }
    let estimated = provider.estimate_fees().await?;
    Ok(FeeEstimate {
        max_fee_per_gas: options.max_fee_per_gas.unwrap_or(estimated.max_fee_per_gas),
        max_priority_fee_per_gas: options
            .max_priority_fee_per_gas
            .unwrap_or(estimated.max_priority_fee_per_gas),
    })
}
