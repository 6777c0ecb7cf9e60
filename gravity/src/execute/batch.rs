//! Batch builder.
//!
//! One active batch per (chain, token). A batch takes the highest-fee
//! transfers out of the pool; it leaves storage either when a
//! `BatchSendToEth` claim is observed or when it times out, in which case its
//! transfers go back into the pool unchanged.

use cosmwasm_std::{Addr, CosmosMsg, DepsMut, Env, Order, Response, StdResult, Storage};

use common::EthAddress;

use crate::claims::BatchSendToEthClaim;
use crate::error::ContractError;
use crate::execute::pool::{insert_unbatched, remove_unbatched};
use crate::nonces::{batch_timeout_height, last_observed_evm_height, next_id};
use crate::registry::{chain_params, ensure_chain};
use crate::state::{
    OutgoingTxBatch, ACTIVE_BATCH_BY_TOKEN, BATCHES, BATCH_CONFIRMS, ERC20_TO_ASSET,
    LAST_BATCH_ID, PARAMS, UNBATCHED_BY_FEE, UNBATCHED_TXS,
};

// ============================================================================
// RequestBatch — Anyone
// ============================================================================

pub fn execute_request_batch(
    deps: DepsMut,
    env: Env,
    evm_chain_prefix: String,
    token_contract: String,
) -> Result<Response, ContractError> {
    ensure_chain(deps.storage, &evm_chain_prefix)?;
    let token = EthAddress::parse(&token_contract).map_err(|e| ContractError::InvalidAddress {
        reason: e.to_string(),
    })?;
    let params = PARAMS.load(deps.storage)?;

    let batch = build_batch(
        deps.storage,
        &evm_chain_prefix,
        &token,
        params.max_batch_size,
        env.block.height,
    )?;

    Ok(Response::new()
        .add_attribute("action", "request_batch")
        .add_attribute("evm_chain_prefix", evm_chain_prefix)
        .add_attribute("token_contract", token.as_str())
        .add_attribute("batch_nonce", batch.batch_nonce.to_string())
        .add_attribute("batch_timeout", batch.batch_timeout.to_string())
        .add_attribute("tx_count", batch.transactions.len().to_string()))
}

/// Move up to `max_elements` of the highest-fee transfers of `token` into a
/// new batch.
pub fn build_batch(
    storage: &mut dyn Storage,
    evm_chain_prefix: &str,
    token: &EthAddress,
    max_elements: u32,
    current_height: u64,
) -> Result<OutgoingTxBatch, ContractError> {
    if let Some(batch_nonce) =
        ACTIVE_BATCH_BY_TOKEN.may_load(storage, (evm_chain_prefix, token.as_str()))?
    {
        return Err(ContractError::BatchAlreadyActive {
            token: token.to_string(),
            batch_nonce,
        });
    }

    let selected: Vec<u64> = UNBATCHED_BY_FEE
        .prefix((evm_chain_prefix, token.as_str()))
        .range(storage, None, None, Order::Ascending)
        .take(max_elements as usize)
        .map(|item| item.map(|(_, id)| id))
        .collect::<StdResult<_>>()?;
    if selected.is_empty() {
        return Err(ContractError::NoUnbatchedTxs {
            token: token.to_string(),
        });
    }

    let params = PARAMS.load(storage)?;
    let chain = chain_params(&params, evm_chain_prefix)?;
    let batch_timeout =
        batch_timeout_height(storage, evm_chain_prefix, &params, chain, current_height)?;

    let mut transactions = Vec::with_capacity(selected.len());
    for id in selected {
        let tx = UNBATCHED_TXS.load(storage, (evm_chain_prefix, id))?;
        remove_unbatched(storage, evm_chain_prefix, &tx);
        transactions.push(tx);
    }

    let batch = OutgoingTxBatch {
        batch_nonce: next_id(storage, LAST_BATCH_ID, evm_chain_prefix)?,
        batch_timeout,
        transactions,
        token_contract: token.clone(),
        cosmos_block_created: current_height,
    };
    BATCHES.save(storage, (evm_chain_prefix, batch.batch_nonce), &batch)?;
    ACTIVE_BATCH_BY_TOKEN.save(
        storage,
        (evm_chain_prefix, token.as_str()),
        &batch.batch_nonce,
    )?;
    Ok(batch)
}

/// Delete a batch, its active marker and its confirms
fn remove_batch(
    storage: &mut dyn Storage,
    evm_chain_prefix: &str,
    batch: &OutgoingTxBatch,
) -> StdResult<()> {
    BATCHES.remove(storage, (evm_chain_prefix, batch.batch_nonce));

    let active_key = (evm_chain_prefix, batch.token_contract.as_str());
    if ACTIVE_BATCH_BY_TOKEN.may_load(storage, active_key)? == Some(batch.batch_nonce) {
        ACTIVE_BATCH_BY_TOKEN.remove(storage, active_key);
    }

    let confirms: Vec<Addr> = BATCH_CONFIRMS
        .prefix((evm_chain_prefix, batch.batch_nonce))
        .keys(storage, None, None, Order::Ascending)
        .collect::<StdResult<_>>()?;
    for orchestrator in confirms {
        BATCH_CONFIRMS.remove(storage, (evm_chain_prefix, batch.batch_nonce, &orchestrator));
    }
    Ok(())
}

/// Put a batch's transfers back in the pool with their original ids and
/// fees, then delete the batch.
pub fn cancel_batch(
    storage: &mut dyn Storage,
    evm_chain_prefix: &str,
    batch: &OutgoingTxBatch,
) -> StdResult<()> {
    for tx in &batch.transactions {
        insert_unbatched(storage, evm_chain_prefix, tx)?;
    }
    remove_batch(storage, evm_chain_prefix, batch)
}

/// Cancel every batch whose timeout is below the last observed EVM height.
/// Returns the cancelled nonces.
pub fn cancel_expired_batches(
    storage: &mut dyn Storage,
    evm_chain_prefix: &str,
) -> StdResult<Vec<u64>> {
    let observed = last_observed_evm_height(storage, evm_chain_prefix)?.evm_block_height;

    let expired: Vec<OutgoingTxBatch> = BATCHES
        .prefix(evm_chain_prefix)
        .range(storage, None, None, Order::Ascending)
        .filter(|item| match item {
            Ok((_, batch)) => batch.batch_timeout < observed,
            Err(_) => true,
        })
        .map(|item| item.map(|(_, batch)| batch))
        .collect::<StdResult<_>>()?;

    let mut cancelled = Vec::with_capacity(expired.len());
    for batch in expired {
        cancel_batch(storage, evm_chain_prefix, &batch)?;
        cancelled.push(batch.batch_nonce);
    }
    Ok(cancelled)
}

/// Effect of an observed `BatchSendToEth` claim. EVM-originated tokens held
/// for the batch (amounts and fees) are burned; cosmos-originated tokens stay
/// in custody backing their EVM representation.
pub fn observe_batch_executed(
    storage: &mut dyn Storage,
    evm_chain_prefix: &str,
    claim: &BatchSendToEthClaim,
) -> Result<Vec<CosmosMsg>, ContractError> {
    let batch = BATCHES
        .may_load(storage, (evm_chain_prefix, claim.batch_nonce))?
        .ok_or(ContractError::BatchNotFound {
            batch_nonce: claim.batch_nonce,
        })?;
    if batch.token_contract != claim.token_contract {
        return Err(ContractError::InvalidClaim {
            reason: format!(
                "batch {} carries {}, claim names {}",
                batch.batch_nonce, batch.token_contract, claim.token_contract
            ),
        });
    }
    let asset = ERC20_TO_ASSET
        .may_load(storage, (evm_chain_prefix, batch.token_contract.as_str()))?
        .ok_or_else(|| ContractError::TokenNotSupported {
            token: batch.token_contract.to_string(),
        })?;

    let mut msgs = vec![];
    if !asset.is_native() {
        let total = batch
            .transactions
            .iter()
            .fold(batch.total_fee(), |acc, tx| acc + tx.erc20_token.amount);
        if !total.is_zero() {
            msgs.push(asset.burn_msg(total)?);
        }
    }

    remove_batch(storage, evm_chain_prefix, &batch)?;
    Ok(msgs)
}
