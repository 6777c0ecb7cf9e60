//! Validator set snapshots
//!
//! The EVM bridge weighs signatures with powers that sum to at most
//! `u32::MAX`. Normalization and ordering here must match what relayers
//! recompute off-chain, since both feed the valset checkpoint.

use cosmwasm_std::{Order, StdResult, Storage};

use common::EthAddress;

use crate::state::{BridgeValidator, Params, Valset, BONDED_VALIDATORS, DELEGATE_KEYS};

/// Total normalized power of a full validator set
pub const NORMALIZED_POWER_TOTAL: u64 = u32::MAX as u64;

/// Scale raw powers to `NORMALIZED_POWER_TOTAL` and sort them by power
/// descending, ties broken by EVM address descending.
pub fn normalize_members(raw: &[(u64, EthAddress)]) -> Vec<BridgeValidator> {
    let total: u128 = raw.iter().map(|(power, _)| *power as u128).sum();
    if total == 0 {
        return vec![];
    }

    let mut members: Vec<BridgeValidator> = raw
        .iter()
        .map(|(power, address)| BridgeValidator {
            power: (*power as u128 * NORMALIZED_POWER_TOTAL as u128 / total) as u64,
            ethereum_address: address.clone(),
        })
        .collect();
    sort_members(&mut members);
    members
}

pub fn sort_members(members: &mut [BridgeValidator]) {
    members.sort_by(|a, b| {
        b.power
            .cmp(&a.power)
            .then_with(|| b.ethereum_address.cmp(&a.ethereum_address))
    });
}

/// Sum of absolute normalized power differences between two member lists,
/// keyed by EVM address.
pub fn power_diff(a: &[BridgeValidator], b: &[BridgeValidator]) -> u64 {
    let mut diff: u64 = 0;
    for member in a {
        let other = b
            .iter()
            .find(|m| m.ethereum_address == member.ethereum_address)
            .map(|m| m.power)
            .unwrap_or(0);
        diff += member.power.abs_diff(other);
    }
    for member in b {
        if !a.iter().any(|m| m.ethereum_address == member.ethereum_address) {
            diff += member.power;
        }
    }
    diff
}

/// Whether `diff` exceeds `percent` of the normalized total
pub fn power_diff_exceeds(diff: u64, percent: u64) -> bool {
    diff as u128 * 100 > percent as u128 * NORMALIZED_POWER_TOTAL as u128
}

/// Snapshot of the current bonded set, plus the validators that were left
/// out for lacking a delegate EVM address.
pub struct CurrentValset {
    pub members: Vec<BridgeValidator>,
    pub missing_keys: Vec<String>,
}

pub fn current_members(storage: &dyn Storage, params: &Params) -> StdResult<CurrentValset> {
    let mut raw = vec![];
    let mut missing_keys = vec![];

    for item in BONDED_VALIDATORS.range(storage, None, None, Order::Ascending) {
        let (validator, power) = item?;
        if power == 0 || power < params.valset_min_power {
            continue;
        }
        match DELEGATE_KEYS.may_load(storage, &validator)? {
            Some(keys) => raw.push((power, keys.eth_address)),
            None => missing_keys.push(validator.to_string()),
        }
    }

    Ok(CurrentValset {
        members: normalize_members(&raw),
        missing_keys,
    })
}

/// Build an unsaved valset for the given nonce and height
pub fn build_valset(
    storage: &dyn Storage,
    params: &Params,
    nonce: u64,
    height: u64,
) -> StdResult<(Valset, Vec<String>)> {
    let current = current_members(storage, params)?;
    Ok((
        Valset {
            nonce,
            members: current.members,
            height,
        },
        current.missing_keys,
    ))
}
