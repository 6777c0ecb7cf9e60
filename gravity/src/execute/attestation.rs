//! Attestation engine.
//!
//! Orchestrators vote on claims in strict per-validator nonce order. Votes
//! for the same (chain, event nonce, claim hash) accumulate in one
//! attestation; the attestation at `last observed + 1` that gathers more than
//! the threshold share of bonded power is observed and its effect applied,
//! after which the next nonce is tried.

use cosmwasm_std::{
    Addr, CosmosMsg, DepsMut, Env, Event, MessageInfo, Order, Response, StdResult, Storage,
};

use crate::claims::Claim;
use crate::error::ContractError;
use crate::execute::delegate_keys::bonded_validator_for_orchestrator;
use crate::execute::observe::apply_claim;
use crate::execute::staking::total_bonded_power;
use crate::nonces::{
    last_event_nonce_by_validator, last_observed_event_nonce, set_last_event_nonce_by_validator,
};
use crate::registry::ensure_chain;
use crate::state::{
    Attestation, LastObservedEvmHeight, ATTESTATIONS, BONDED_VALIDATORS,
    LAST_EVENT_NONCE_BY_VALIDATOR, LAST_OBSERVED_EVENT_NONCE, LAST_OBSERVED_EVM_HEIGHT, PARAMS,
};

// ============================================================================
// SubmitClaim — Orchestrator
// ============================================================================

pub fn execute_submit_claim(
    mut deps: DepsMut,
    env: Env,
    info: MessageInfo,
    evm_chain_prefix: String,
    claim: Claim,
) -> Result<Response, ContractError> {
    ensure_chain(deps.storage, &evm_chain_prefix)?;
    let prefix = evm_chain_prefix.as_str();
    let validator = bonded_validator_for_orchestrator(deps.storage, &info.sender)?;
    claim.validate_basic()?;

    let expected = last_event_nonce_by_validator(deps.storage, prefix, &validator)? + 1;
    let nonce = claim.event_nonce();
    if nonce != expected {
        return Err(ContractError::NonContiguousEventNonce {
            expected,
            got: nonce,
        });
    }

    let hash = claim.claim_hash()?;
    let mut attestation = ATTESTATIONS
        .may_load(deps.storage, (prefix, nonce, hash.as_slice()))?
        .unwrap_or_else(|| Attestation {
            claim: claim.clone(),
            votes: vec![],
            observed: false,
            height: env.block.height,
        });
    // the nonce check above makes a second vote impossible
    attestation.votes.push(validator.to_string());
    ATTESTATIONS.save(deps.storage, (prefix, nonce, hash.as_slice()), &attestation)?;
    set_last_event_nonce_by_validator(deps.storage, prefix, &validator, nonce)?;

    let resolution = resolve_attestations(deps.branch(), &env, prefix)?;

    Ok(Response::new()
        .add_attribute("action", "submit_claim")
        .add_attribute("evm_chain_prefix", prefix)
        .add_attribute("event_nonce", nonce.to_string())
        .add_attribute("claim_hash", hex::encode(hash))
        .add_attribute("claim_type", claim.claim_type())
        .add_attribute("validator", validator)
        .add_messages(resolution.messages)
        .add_events(resolution.events))
}

/// Outcome of a resolution pass
#[derive(Debug, Default)]
pub struct Resolution {
    pub messages: Vec<CosmosMsg>,
    pub events: Vec<Event>,
}

/// Observe every attestation that has reached quorum, in nonce order,
/// starting right after the last observed nonce.
pub fn resolve_attestations(
    mut deps: DepsMut,
    env: &Env,
    evm_chain_prefix: &str,
) -> StdResult<Resolution> {
    let mut resolution = Resolution::default();
    let total_power = total_bonded_power(deps.storage)?;
    if total_power == 0 {
        return Ok(resolution);
    }
    let threshold = PARAMS.load(deps.storage)?.attestation_threshold_percent;

    loop {
        let nonce = last_observed_event_nonce(deps.storage, evm_chain_prefix)? + 1;
        let Some((hash, mut attestation)) =
            quorum_attestation(deps.storage, evm_chain_prefix, nonce, total_power, threshold)?
        else {
            break;
        };

        attestation.observed = true;
        ATTESTATIONS.save(
            deps.storage,
            (evm_chain_prefix, nonce, hash.as_slice()),
            &attestation,
        )?;
        LAST_OBSERVED_EVENT_NONCE.save(deps.storage, evm_chain_prefix, &nonce)?;
        LAST_OBSERVED_EVM_HEIGHT.save(
            deps.storage,
            evm_chain_prefix,
            &LastObservedEvmHeight {
                evm_block_height: attestation.claim.evm_block_height(),
                cosmos_block_height: env.block.height,
            },
        )?;

        let event = Event::new("gravity_observation")
            .add_attribute("evm_chain_prefix", evm_chain_prefix)
            .add_attribute("event_nonce", nonce.to_string())
            .add_attribute("claim_hash", hex::encode(&hash))
            .add_attribute("claim_type", attestation.claim.claim_type());

        match apply_claim(
            deps.branch(),
            env,
            evm_chain_prefix,
            &attestation.claim,
            &resolution.messages,
        ) {
            Ok(messages) => {
                resolution.messages.extend(messages);
                resolution.events.push(event);
            }
            Err(err) => {
                resolution.events.push(
                    Event::new("gravity_claim_effect_failed")
                        .add_attribute("evm_chain_prefix", evm_chain_prefix)
                        .add_attribute("event_nonce", nonce.to_string())
                        .add_attribute("claim_hash", hex::encode(&hash))
                        .add_attribute("claim_type", attestation.claim.claim_type())
                        .add_attribute("error", err.to_string()),
                );
            }
        }
    }
    Ok(resolution)
}

/// First unobserved attestation at `nonce` whose voters currently hold more
/// than `threshold` percent of `total_power`.
fn quorum_attestation(
    storage: &dyn Storage,
    evm_chain_prefix: &str,
    nonce: u64,
    total_power: u64,
    threshold: u64,
) -> StdResult<Option<(Vec<u8>, Attestation)>> {
    let candidates: Vec<(Vec<u8>, Attestation)> = ATTESTATIONS
        .prefix((evm_chain_prefix, nonce))
        .range(storage, None, None, Order::Ascending)
        .collect::<StdResult<_>>()?;

    for (hash, attestation) in candidates {
        if attestation.observed {
            continue;
        }
        let mut voted: u128 = 0;
        for voter in &attestation.votes {
            voted += BONDED_VALIDATORS
                .may_load(storage, &Addr::unchecked(voter))?
                .unwrap_or_default() as u128;
        }
        if voted * 100 > total_power as u128 * threshold as u128 {
            return Ok(Some((hash, attestation)));
        }
    }
    Ok(None)
}

/// Roll a chain back to `target_nonce`: drop every attestation above it and
/// pull validators that voted past it back to it. The target must lie above
/// the observed nonce. Returns the number of attestations deleted.
pub fn rollback_attestations(
    storage: &mut dyn Storage,
    evm_chain_prefix: &str,
    target_nonce: u64,
) -> Result<usize, ContractError> {
    let observed = last_observed_event_nonce(storage, evm_chain_prefix)?;
    if target_nonce <= observed {
        return Err(ContractError::InvalidRollback {
            target: target_nonce,
            observed,
        });
    }

    let doomed: Vec<(u64, Vec<u8>)> = ATTESTATIONS
        .sub_prefix(evm_chain_prefix)
        .keys(storage, None, None, Order::Ascending)
        .filter(|item| match item {
            Ok((nonce, _)) => *nonce > target_nonce,
            Err(_) => true,
        })
        .collect::<StdResult<_>>()?;
    for (nonce, hash) in &doomed {
        ATTESTATIONS.remove(storage, (evm_chain_prefix, *nonce, hash.as_slice()));
    }

    let ahead: Vec<Addr> = LAST_EVENT_NONCE_BY_VALIDATOR
        .prefix(evm_chain_prefix)
        .range(storage, None, None, Order::Ascending)
        .filter(|item| match item {
            Ok((_, nonce)) => *nonce > target_nonce,
            Err(_) => true,
        })
        .map(|item| item.map(|(validator, _)| validator))
        .collect::<StdResult<_>>()?;
    for validator in ahead {
        set_last_event_nonce_by_validator(storage, evm_chain_prefix, &validator, target_nonce)?;
    }
    Ok(doomed.len())
}
