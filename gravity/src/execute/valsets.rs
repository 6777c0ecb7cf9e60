//! End-block valset requests and pruning.

use cosmwasm_std::{Addr, Api, Order, StdResult, Storage};

use crate::state::{
    Params, Valset, LAST_OBSERVED_VALSET, LAST_SLASHED_VALSET_NONCE, LAST_UNBONDING_HEIGHT,
    LATEST_VALSET_NONCE, VALSETS, VALSET_CONFIRMS,
};
use crate::valset::{current_members, power_diff, power_diff_exceeds};

/// Latest stored valset of a chain
pub fn latest_valset(storage: &dyn Storage, evm_chain_prefix: &str) -> StdResult<Option<Valset>> {
    let nonce = LATEST_VALSET_NONCE
        .may_load(storage, evm_chain_prefix)?
        .unwrap_or_default();
    if nonce == 0 {
        return Ok(None);
    }
    VALSETS.may_load(storage, (evm_chain_prefix, nonce))
}

/// Valset created by `maybe_create_valset`, with the validators left out of it
pub struct NewValset {
    pub valset: Valset,
    pub missing_keys: Vec<String>,
}

/// Store a new valset when the chain has none, a validator began unbonding
/// at this height, the normalized power moved by more than the configured
/// percent, or the configured interval elapsed.
pub fn maybe_create_valset(
    storage: &mut dyn Storage,
    api: &dyn Api,
    params: &Params,
    evm_chain_prefix: &str,
    height: u64,
) -> StdResult<Option<NewValset>> {
    let current = current_members(storage, params)?;
    if current.members.is_empty() {
        return Ok(None);
    }

    let latest = latest_valset(storage, evm_chain_prefix)?;
    let unbonding_now = LAST_UNBONDING_HEIGHT
        .may_load(storage)?
        .map_or(false, |h| h == height);

    let needed = match &latest {
        None => true,
        Some(latest) => {
            unbonding_now
                || power_diff_exceeds(
                    power_diff(&latest.members, &current.members),
                    params.valset_power_change_percent,
                )
                || (params.valset_interval_blocks > 0
                    && height.saturating_sub(latest.height) >= params.valset_interval_blocks)
        }
    };
    if !needed {
        return Ok(None);
    }

    for validator in &current.missing_keys {
        api.debug(&format!(
            "gravity: validator {} has no delegate EVM address and is left out of the {} valset",
            validator, evm_chain_prefix
        ));
    }

    let nonce = latest.map_or(0, |v| v.nonce) + 1;
    let valset = Valset {
        nonce,
        members: current.members,
        height,
    };
    VALSETS.save(storage, (evm_chain_prefix, nonce), &valset)?;
    LATEST_VALSET_NONCE.save(storage, evm_chain_prefix, &nonce)?;

    Ok(Some(NewValset {
        valset,
        missing_keys: current.missing_keys,
    }))
}

/// Delete valsets (and their confirms) older than the last observed one that
/// the slashing collaborator has already processed. The latest valset is
/// always kept.
pub fn prune_valsets(storage: &mut dyn Storage, evm_chain_prefix: &str) -> StdResult<Vec<u64>> {
    let observed = match LAST_OBSERVED_VALSET.may_load(storage, evm_chain_prefix)? {
        Some(valset) => valset.nonce,
        None => return Ok(vec![]),
    };
    let slashed = LAST_SLASHED_VALSET_NONCE
        .may_load(storage, evm_chain_prefix)?
        .unwrap_or_default();
    let latest = LATEST_VALSET_NONCE
        .may_load(storage, evm_chain_prefix)?
        .unwrap_or_default();

    let prunable: Vec<u64> = VALSETS
        .prefix(evm_chain_prefix)
        .keys(storage, None, None, Order::Ascending)
        .filter(|item| match item {
            Ok(nonce) => *nonce < observed && *nonce <= slashed && *nonce != latest,
            Err(_) => true,
        })
        .collect::<StdResult<_>>()?;

    for nonce in &prunable {
        VALSETS.remove(storage, (evm_chain_prefix, *nonce));
        let confirms: Vec<Addr> = VALSET_CONFIRMS
            .prefix((evm_chain_prefix, *nonce))
            .keys(storage, None, None, Order::Ascending)
            .collect::<StdResult<_>>()?;
        for orchestrator in confirms {
            VALSET_CONFIRMS.remove(storage, (evm_chain_prefix, *nonce, &orchestrator));
        }
    }
    Ok(prunable)
}
