//! Orchestrator signatures over EVM checkpoints.
//!
//! A confirm is accepted only from a bonded validator's orchestrator, only
//! for an artifact that still exists, and only when the signature recovers
//! to the validator's delegate EVM address. One confirm per artifact and
//! orchestrator.

use cosmwasm_std::{Addr, Binary, Deps, DepsMut, MessageInfo, Response};

use common::EthAddress;

use crate::error::ContractError;
use crate::execute::delegate_keys::bonded_validator_for_orchestrator;
use crate::hash::{
    batch_checkpoint, bytes32_to_hex, logic_call_checkpoint, recover_eth_signer,
    valset_checkpoint,
};
use crate::registry::{chain_params, ensure_chain};
use crate::state::{
    logic_call_key, BatchConfirm, LogicCallConfirm, ValsetConfirm, BATCHES, BATCH_CONFIRMS,
    DELEGATE_KEYS, LOGIC_CALLS, LOGIC_CALL_CONFIRMS, PARAMS, VALSETS, VALSET_CONFIRMS,
};

/// Checks shared by every confirm: registered chain, bonded orchestrator and
/// a claimed signer equal to the validator's delegate EVM address.
/// Returns the chain's gravity id and the parsed signer.
fn check_signer(
    deps: Deps,
    sender: &Addr,
    evm_chain_prefix: &str,
    eth_signer: &str,
) -> Result<(String, EthAddress), ContractError> {
    ensure_chain(deps.storage, evm_chain_prefix)?;
    let validator = bonded_validator_for_orchestrator(deps.storage, sender)?;
    let keys = DELEGATE_KEYS.load(deps.storage, &validator)?;

    let eth_signer = EthAddress::parse(eth_signer).map_err(|e| ContractError::InvalidAddress {
        reason: e.to_string(),
    })?;
    if eth_signer != keys.eth_address {
        return Err(ContractError::InvalidSignature {
            reason: format!(
                "signer {} is not the delegate address of validator {}",
                eth_signer, validator
            ),
        });
    }

    let params = PARAMS.load(deps.storage)?;
    let gravity_id = chain_params(&params, evm_chain_prefix)?.gravity_id.clone();
    Ok((gravity_id, eth_signer))
}

fn verify(
    deps: Deps,
    checkpoint: &[u8; 32],
    signature: &Binary,
    expected: &EthAddress,
) -> Result<(), ContractError> {
    let recovered = recover_eth_signer(deps.api, checkpoint, signature.as_slice())?;
    if &recovered != expected {
        return Err(ContractError::InvalidSignature {
            reason: format!(
                "signature over {} recovers to {}, expected {}",
                bytes32_to_hex(checkpoint),
                recovered,
                expected
            ),
        });
    }
    Ok(())
}

// ============================================================================
// ConfirmValset — Orchestrator
// ============================================================================

pub fn execute_confirm_valset(
    deps: DepsMut,
    info: MessageInfo,
    evm_chain_prefix: String,
    nonce: u64,
    eth_signer: String,
    signature: Binary,
) -> Result<Response, ContractError> {
    let (gravity_id, eth_signer) =
        check_signer(deps.as_ref(), &info.sender, &evm_chain_prefix, &eth_signer)?;
    let prefix = evm_chain_prefix.as_str();

    let valset = VALSETS
        .may_load(deps.storage, (prefix, nonce))?
        .ok_or(ContractError::ValsetNotFound { nonce })?;
    if VALSET_CONFIRMS.has(deps.storage, (prefix, nonce, &info.sender)) {
        return Err(ContractError::DuplicateConfirm {
            orchestrator: info.sender.to_string(),
        });
    }

    let checkpoint = valset_checkpoint(&gravity_id, &valset);
    verify(deps.as_ref(), &checkpoint, &signature, &eth_signer)?;

    VALSET_CONFIRMS.save(
        deps.storage,
        (prefix, nonce, &info.sender),
        &ValsetConfirm {
            nonce,
            orchestrator: info.sender.to_string(),
            eth_address: eth_signer,
            signature,
        },
    )?;

    Ok(Response::new()
        .add_attribute("action", "confirm_valset")
        .add_attribute("evm_chain_prefix", evm_chain_prefix)
        .add_attribute("nonce", nonce.to_string())
        .add_attribute("orchestrator", info.sender)
        .add_attribute("checkpoint", bytes32_to_hex(&checkpoint)))
}

// ============================================================================
// ConfirmBatch — Orchestrator
// ============================================================================

pub fn execute_confirm_batch(
    deps: DepsMut,
    info: MessageInfo,
    evm_chain_prefix: String,
    nonce: u64,
    token_contract: String,
    eth_signer: String,
    signature: Binary,
) -> Result<Response, ContractError> {
    let (gravity_id, eth_signer) =
        check_signer(deps.as_ref(), &info.sender, &evm_chain_prefix, &eth_signer)?;
    let prefix = evm_chain_prefix.as_str();

    let token_contract =
        EthAddress::parse(&token_contract).map_err(|e| ContractError::InvalidAddress {
            reason: e.to_string(),
        })?;
    let batch = BATCHES
        .may_load(deps.storage, (prefix, nonce))?
        .filter(|batch| batch.token_contract == token_contract)
        .ok_or(ContractError::BatchNotFound { batch_nonce: nonce })?;
    if BATCH_CONFIRMS.has(deps.storage, (prefix, nonce, &info.sender)) {
        return Err(ContractError::DuplicateConfirm {
            orchestrator: info.sender.to_string(),
        });
    }

    let checkpoint = batch_checkpoint(&gravity_id, &batch);
    verify(deps.as_ref(), &checkpoint, &signature, &eth_signer)?;

    BATCH_CONFIRMS.save(
        deps.storage,
        (prefix, nonce, &info.sender),
        &BatchConfirm {
            nonce,
            token_contract,
            eth_signer,
            orchestrator: info.sender.to_string(),
            signature,
        },
    )?;

    Ok(Response::new()
        .add_attribute("action", "confirm_batch")
        .add_attribute("evm_chain_prefix", evm_chain_prefix)
        .add_attribute("nonce", nonce.to_string())
        .add_attribute("orchestrator", info.sender)
        .add_attribute("checkpoint", bytes32_to_hex(&checkpoint)))
}

// ============================================================================
// ConfirmLogicCall — Orchestrator
// ============================================================================

pub fn execute_confirm_logic_call(
    deps: DepsMut,
    info: MessageInfo,
    evm_chain_prefix: String,
    invalidation_id: Binary,
    invalidation_nonce: u64,
    eth_signer: String,
    signature: Binary,
) -> Result<Response, ContractError> {
    let (gravity_id, eth_signer) =
        check_signer(deps.as_ref(), &info.sender, &evm_chain_prefix, &eth_signer)?;
    let prefix = evm_chain_prefix.as_str();

    let call = LOGIC_CALLS
        .may_load(
            deps.storage,
            (prefix, invalidation_id.as_slice(), invalidation_nonce),
        )?
        .ok_or_else(|| ContractError::LogicCallNotFound {
            invalidation_id: hex::encode(invalidation_id.as_slice()),
            invalidation_nonce,
        })?;
    let key = logic_call_key(invalidation_id.as_slice(), invalidation_nonce);
    if LOGIC_CALL_CONFIRMS.has(deps.storage, (prefix, key.as_slice(), &info.sender)) {
        return Err(ContractError::DuplicateConfirm {
            orchestrator: info.sender.to_string(),
        });
    }

    let checkpoint = logic_call_checkpoint(&gravity_id, &call);
    verify(deps.as_ref(), &checkpoint, &signature, &eth_signer)?;

    LOGIC_CALL_CONFIRMS.save(
        deps.storage,
        (prefix, key.as_slice(), &info.sender),
        &LogicCallConfirm {
            invalidation_id: invalidation_id.clone(),
            invalidation_nonce,
            eth_signer,
            orchestrator: info.sender.to_string(),
            signature,
        },
    )?;

    Ok(Response::new()
        .add_attribute("action", "confirm_logic_call")
        .add_attribute("evm_chain_prefix", evm_chain_prefix)
        .add_attribute("invalidation_id", hex::encode(invalidation_id.as_slice()))
        .add_attribute("invalidation_nonce", invalidation_nonce.to_string())
        .add_attribute("orchestrator", info.sender)
        .add_attribute("checkpoint", bytes32_to_hex(&checkpoint)))
}
