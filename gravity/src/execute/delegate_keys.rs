//! Delegate key binding handlers.
//!
//! A bonded validator binds one orchestrator account (which submits claims
//! and confirms on its behalf) and one EVM signing address. Both must be
//! unique across validators.

use cosmwasm_std::{Addr, DepsMut, MessageInfo, Response, Storage};

use common::EthAddress;

use crate::error::ContractError;
use crate::state::{
    DelegateKeys, BONDED_VALIDATORS, DELEGATE_KEYS, VALIDATOR_BY_ETH_ADDRESS,
    VALIDATOR_BY_ORCHESTRATOR,
};

// ============================================================================
// SetOrchestratorAddress — Validator
// ============================================================================

/// Bind the sender's orchestrator and EVM signer.
pub fn execute_set_orchestrator_address(
    deps: DepsMut,
    info: MessageInfo,
    orchestrator: String,
    eth_address: String,
) -> Result<Response, ContractError> {
    let validator = info.sender;
    if !BONDED_VALIDATORS.has(deps.storage, &validator) {
        return Err(ContractError::ValidatorNotBonded {
            validator: validator.to_string(),
        });
    }

    let orchestrator = deps.api.addr_validate(&orchestrator)?;
    let eth_address = EthAddress::parse(&eth_address).map_err(|e| ContractError::InvalidAddress {
        reason: e.to_string(),
    })?;

    store_delegate_keys(deps.storage, &validator, &orchestrator, &eth_address)?;

    Ok(Response::new()
        .add_attribute("action", "set_orchestrator_address")
        .add_attribute("validator", validator)
        .add_attribute("orchestrator", orchestrator)
        .add_attribute("eth_address", eth_address.to_string()))
}

/// Persist a binding after checking that none of its parts is taken.
pub fn store_delegate_keys(
    storage: &mut dyn Storage,
    validator: &Addr,
    orchestrator: &Addr,
    eth_address: &EthAddress,
) -> Result<(), ContractError> {
    if DELEGATE_KEYS.has(storage, validator) {
        return Err(ContractError::DuplicateDelegateKey {
            reason: format!("validator {} already has delegate keys", validator),
        });
    }
    if VALIDATOR_BY_ORCHESTRATOR.has(storage, orchestrator) {
        return Err(ContractError::DuplicateDelegateKey {
            reason: format!("orchestrator {} is already bound", orchestrator),
        });
    }
    if VALIDATOR_BY_ETH_ADDRESS.has(storage, eth_address.as_str()) {
        return Err(ContractError::DuplicateDelegateKey {
            reason: format!("eth address {} is already bound", eth_address),
        });
    }

    DELEGATE_KEYS.save(
        storage,
        validator,
        &DelegateKeys {
            validator: validator.to_string(),
            orchestrator: orchestrator.to_string(),
            eth_address: eth_address.clone(),
        },
    )?;
    VALIDATOR_BY_ORCHESTRATOR.save(storage, orchestrator, validator)?;
    VALIDATOR_BY_ETH_ADDRESS.save(storage, eth_address.as_str(), validator)?;
    Ok(())
}

/// Resolve an orchestrator to its validator, which must currently be bonded.
pub fn bonded_validator_for_orchestrator(
    storage: &dyn Storage,
    orchestrator: &Addr,
) -> Result<Addr, ContractError> {
    let validator = VALIDATOR_BY_ORCHESTRATOR
        .may_load(storage, orchestrator)?
        .ok_or_else(|| ContractError::NotOrchestrator {
            address: orchestrator.to_string(),
        })?;
    if !BONDED_VALIDATORS.has(storage, &validator) {
        return Err(ContractError::ValidatorNotBonded {
            validator: validator.to_string(),
        });
    }
    Ok(validator)
}
