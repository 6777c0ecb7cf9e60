//! Staking collaborator events and slashing bookkeeping.
//!
//! The host chain delivers typed staking events through `sudo`. This module
//! keeps a mirror of the bonded set (used for quorum and valsets) and records
//! unbonding heights for the slashing collaborator.

use cosmwasm_std::{DepsMut, Env, MessageInfo, Order, Response, StdResult, Storage};

use crate::error::ContractError;
use crate::msg::StakingEvent;
use crate::registry::ensure_chain;
use crate::state::{
    BONDED_VALIDATORS, CONFIG, LAST_SLASHED_BATCH_BLOCK, LAST_SLASHED_LOGIC_CALL_BLOCK,
    LAST_SLASHED_VALSET_NONCE, LAST_UNBONDING_HEIGHT,
};

// ============================================================================
// Staking Events — Sudo
// ============================================================================

/// Apply one staking event.
pub fn dispatch_staking_event(
    deps: DepsMut,
    env: Env,
    event: StakingEvent,
) -> Result<Response, ContractError> {
    match event {
        StakingEvent::ValidatorBonded { validator, power } => {
            let validator = deps.api.addr_validate(&validator)?;
            set_power(deps.storage, &validator, power)?;
            Ok(Response::new()
                .add_attribute("action", "validator_bonded")
                .add_attribute("validator", validator)
                .add_attribute("power", power.to_string()))
        }
        StakingEvent::ValidatorPowerChanged { validator, power } => {
            let validator = deps.api.addr_validate(&validator)?;
            set_power(deps.storage, &validator, power)?;
            Ok(Response::new()
                .add_attribute("action", "validator_power_changed")
                .add_attribute("validator", validator)
                .add_attribute("power", power.to_string()))
        }
        StakingEvent::ValidatorBeginUnbonding { validator } => {
            let validator = deps.api.addr_validate(&validator)?;
            BONDED_VALIDATORS.remove(deps.storage, &validator);
            LAST_UNBONDING_HEIGHT.save(deps.storage, &env.block.height)?;
            Ok(Response::new()
                .add_attribute("action", "validator_begin_unbonding")
                .add_attribute("validator", validator)
                .add_attribute("height", env.block.height.to_string()))
        }
        StakingEvent::ValidatorRemoved { validator } => {
            let validator = deps.api.addr_validate(&validator)?;
            BONDED_VALIDATORS.remove(deps.storage, &validator);
            Ok(Response::new()
                .add_attribute("action", "validator_removed")
                .add_attribute("validator", validator))
        }
    }
}

fn set_power(
    storage: &mut dyn Storage,
    validator: &cosmwasm_std::Addr,
    power: u64,
) -> StdResult<()> {
    if power == 0 {
        BONDED_VALIDATORS.remove(storage, validator);
        Ok(())
    } else {
        BONDED_VALIDATORS.save(storage, validator, &power)
    }
}

/// Sum of all bonded power
pub fn total_bonded_power(storage: &dyn Storage) -> StdResult<u64> {
    BONDED_VALIDATORS
        .range(storage, None, None, Order::Ascending)
        .map(|item| item.map(|(_, power)| power))
        .sum()
}

// ============================================================================
// AcknowledgeSlashing — Authority
// ============================================================================

/// Record the slashing collaborator's progress for a chain. Values never move
/// backwards.
pub fn execute_acknowledge_slashing(
    deps: DepsMut,
    info: MessageInfo,
    evm_chain_prefix: String,
    valset_nonce: u64,
    batch_block: u64,
    logic_call_block: u64,
) -> Result<Response, ContractError> {
    let config = CONFIG.load(deps.storage)?;
    if info.sender != config.authority {
        return Err(ContractError::Unauthorized);
    }
    ensure_chain(deps.storage, &evm_chain_prefix)?;
    let prefix = evm_chain_prefix.as_str();

    let valset_nonce = valset_nonce.max(
        LAST_SLASHED_VALSET_NONCE
            .may_load(deps.storage, prefix)?
            .unwrap_or_default(),
    );
    let batch_block = batch_block.max(
        LAST_SLASHED_BATCH_BLOCK
            .may_load(deps.storage, prefix)?
            .unwrap_or_default(),
    );
    let logic_call_block = logic_call_block.max(
        LAST_SLASHED_LOGIC_CALL_BLOCK
            .may_load(deps.storage, prefix)?
            .unwrap_or_default(),
    );

    LAST_SLASHED_VALSET_NONCE.save(deps.storage, prefix, &valset_nonce)?;
    LAST_SLASHED_BATCH_BLOCK.save(deps.storage, prefix, &batch_block)?;
    LAST_SLASHED_LOGIC_CALL_BLOCK.save(deps.storage, prefix, &logic_call_block)?;

    Ok(Response::new()
        .add_attribute("action", "acknowledge_slashing")
        .add_attribute("evm_chain_prefix", evm_chain_prefix)
        .add_attribute("valset_nonce", valset_nonce.to_string())
        .add_attribute("batch_block", batch_block.to_string())
        .add_attribute("logic_call_block", logic_call_block.to_string()))
}
