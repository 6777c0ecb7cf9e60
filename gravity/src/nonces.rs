//! Event nonce tracker and per-chain counters

use cosmwasm_std::{Addr, StdResult, Storage};
use cw_storage_plus::Map;

use crate::state::{
    EvmChainParams, LastObservedEvmHeight, Params, LAST_EVENT_NONCE_BY_VALIDATOR,
    LAST_OBSERVED_EVENT_NONCE, LAST_OBSERVED_EVM_HEIGHT,
};

pub fn last_observed_event_nonce(storage: &dyn Storage, chain: &str) -> StdResult<u64> {
    Ok(LAST_OBSERVED_EVENT_NONCE
        .may_load(storage, chain)?
        .unwrap_or_default())
}

/// Last nonce the validator voted on. A validator with no record starts at
/// the observed nonce, so its first accepted claim is `observed + 1`.
pub fn last_event_nonce_by_validator(
    storage: &dyn Storage,
    chain: &str,
    validator: &Addr,
) -> StdResult<u64> {
    match LAST_EVENT_NONCE_BY_VALIDATOR.may_load(storage, (chain, validator))? {
        Some(nonce) => Ok(nonce),
        None => last_observed_event_nonce(storage, chain),
    }
}

pub fn set_last_event_nonce_by_validator(
    storage: &mut dyn Storage,
    chain: &str,
    validator: &Addr,
    nonce: u64,
) -> StdResult<()> {
    LAST_EVENT_NONCE_BY_VALIDATOR.save(storage, (chain, validator), &nonce)
}

pub fn last_observed_evm_height(
    storage: &dyn Storage,
    chain: &str,
) -> StdResult<LastObservedEvmHeight> {
    Ok(LAST_OBSERVED_EVM_HEIGHT
        .may_load(storage, chain)?
        .unwrap_or_default())
}

/// Increment a per-chain counter and return the new value
pub fn next_id<'a>(
    storage: &mut dyn Storage,
    counter: Map<'a, &'a str, u64>,
    chain: &'a str,
) -> StdResult<u64> {
    let next = counter.may_load(storage, chain)?.unwrap_or_default() + 1;
    counter.save(storage, chain, &next)?;
    Ok(next)
}

/// Estimate of the current EVM height: the last observed one advanced by
/// the local blocks produced since, converted through the average block
/// times of both chains.
pub fn projected_evm_height(
    storage: &dyn Storage,
    chain: &str,
    params: &Params,
    chain_params: &EvmChainParams,
    current_height: u64,
) -> StdResult<u64> {
    let last = last_observed_evm_height(storage, chain)?;
    if chain_params.average_ethereum_block_time == 0 {
        return Ok(last.evm_block_height);
    }
    let blocks_since = current_height.saturating_sub(last.cosmos_block_height);
    let elapsed_ms = blocks_since.saturating_mul(params.average_block_time);
    Ok(last.evm_block_height + elapsed_ms / chain_params.average_ethereum_block_time)
}

/// EVM height after which a batch created now is considered timed out
pub fn batch_timeout_height(
    storage: &dyn Storage,
    chain: &str,
    params: &Params,
    chain_params: &EvmChainParams,
    current_height: u64,
) -> StdResult<u64> {
    let projected = projected_evm_height(storage, chain, params, chain_params, current_height)?;
    if chain_params.average_ethereum_block_time == 0 {
        return Ok(projected);
    }
    Ok(projected + params.target_batch_timeout / chain_params.average_ethereum_block_time)
}
