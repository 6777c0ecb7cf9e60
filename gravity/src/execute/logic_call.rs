//! Outgoing logic calls.
//!
//! Calls are identified by (invalidation id, invalidation nonce). For a given
//! id only the highest scheduled nonce is kept; the EVM bridge rejects any
//! nonce at or below the last one it executed.

use cosmwasm_std::{Addr, Binary, DepsMut, Env, MessageInfo, Order, Response, StdResult, Storage};

use common::EthAddress;

use crate::claims::LogicCallExecutedClaim;
use crate::error::ContractError;
use crate::nonces::last_observed_evm_height;
use crate::registry::ensure_chain;
use crate::state::{
    logic_call_key, Erc20Token, OutgoingLogicCall, CONFIG, LAST_EXECUTED_LOGIC_NONCE,
    LOGIC_CALLS, LOGIC_CALL_CONFIRMS,
};

/// Invalidation ids are packed into a bytes32 checkpoint word
pub const MAX_INVALIDATION_ID_LEN: usize = 32;

// ============================================================================
// ScheduleLogicCall — Authority
// ============================================================================

#[allow(clippy::too_many_arguments)]
pub fn execute_schedule_logic_call(
    deps: DepsMut,
    env: Env,
    info: MessageInfo,
    evm_chain_prefix: String,
    transfers: Vec<Erc20Token>,
    fees: Vec<Erc20Token>,
    logic_contract_address: String,
    payload: Binary,
    timeout: u64,
    invalidation_id: Binary,
    invalidation_nonce: u64,
) -> Result<Response, ContractError> {
    let config = CONFIG.load(deps.storage)?;
    if info.sender != config.authority {
        return Err(ContractError::Unauthorized);
    }
    ensure_chain(deps.storage, &evm_chain_prefix)?;
    let prefix = evm_chain_prefix.as_str();

    if invalidation_id.is_empty() || invalidation_id.len() > MAX_INVALIDATION_ID_LEN {
        return Err(ContractError::InvalidProposal {
            reason: format!(
                "invalidation id must be 1 to {} bytes",
                MAX_INVALIDATION_ID_LEN
            ),
        });
    }
    let logic_contract_address =
        EthAddress::parse(&logic_contract_address).map_err(|e| ContractError::InvalidAddress {
            reason: e.to_string(),
        })?;

    let last_executed = LAST_EXECUTED_LOGIC_NONCE
        .may_load(deps.storage, (prefix, invalidation_id.as_slice()))?
        .unwrap_or_default();
    if invalidation_nonce <= last_executed {
        return Err(ContractError::StaleLogicCall {
            invalidation_nonce,
            latest: last_executed,
        });
    }

    let outstanding: Vec<u64> = LOGIC_CALLS
        .prefix((prefix, invalidation_id.as_slice()))
        .keys(deps.storage, None, None, Order::Ascending)
        .collect::<StdResult<_>>()?;
    if let Some(&latest) = outstanding.last() {
        if invalidation_nonce <= latest {
            return Err(ContractError::StaleLogicCall {
                invalidation_nonce,
                latest,
            });
        }
    }

    // Superseded calls can no longer execute on the EVM side
    for nonce in outstanding {
        remove_logic_call(deps.storage, prefix, invalidation_id.as_slice(), nonce)?;
    }

    let call = OutgoingLogicCall {
        transfers,
        fees,
        logic_contract_address,
        payload,
        timeout,
        invalidation_id: invalidation_id.clone(),
        invalidation_nonce,
        cosmos_block_created: env.block.height,
    };
    LOGIC_CALLS.save(
        deps.storage,
        (prefix, invalidation_id.as_slice(), invalidation_nonce),
        &call,
    )?;

    Ok(Response::new()
        .add_attribute("action", "schedule_logic_call")
        .add_attribute("evm_chain_prefix", evm_chain_prefix)
        .add_attribute("invalidation_id", hex::encode(invalidation_id.as_slice()))
        .add_attribute("invalidation_nonce", invalidation_nonce.to_string())
        .add_attribute("timeout", timeout.to_string()))
}

/// Delete a call and its confirms
pub fn remove_logic_call(
    storage: &mut dyn Storage,
    evm_chain_prefix: &str,
    invalidation_id: &[u8],
    invalidation_nonce: u64,
) -> StdResult<()> {
    LOGIC_CALLS.remove(storage, (evm_chain_prefix, invalidation_id, invalidation_nonce));

    let key = logic_call_key(invalidation_id, invalidation_nonce);
    let confirms: Vec<Addr> = LOGIC_CALL_CONFIRMS
        .prefix((evm_chain_prefix, key.as_slice()))
        .keys(storage, None, None, Order::Ascending)
        .collect::<StdResult<_>>()?;
    for orchestrator in confirms {
        LOGIC_CALL_CONFIRMS.remove(storage, (evm_chain_prefix, key.as_slice(), &orchestrator));
    }
    Ok(())
}

/// Remove every call whose timeout is below the last observed EVM height.
pub fn cancel_expired_logic_calls(
    storage: &mut dyn Storage,
    evm_chain_prefix: &str,
) -> StdResult<usize> {
    let observed = last_observed_evm_height(storage, evm_chain_prefix)?.evm_block_height;

    let expired: Vec<(Vec<u8>, u64)> = LOGIC_CALLS
        .sub_prefix(evm_chain_prefix)
        .range(storage, None, None, Order::Ascending)
        .filter(|item| match item {
            Ok((_, call)) => call.timeout < observed,
            Err(_) => true,
        })
        .map(|item| item.map(|(key, _)| key))
        .collect::<StdResult<_>>()?;

    for (id, nonce) in &expired {
        remove_logic_call(storage, evm_chain_prefix, id, *nonce)?;
    }
    Ok(expired.len())
}

/// Effect of an observed `LogicCallExecuted` claim: the executed call and
/// every lower nonce of the same id are gone, and the executed nonce is
/// recorded so it can never be scheduled again.
pub fn observe_logic_call_executed(
    storage: &mut dyn Storage,
    evm_chain_prefix: &str,
    claim: &LogicCallExecutedClaim,
) -> StdResult<()> {
    let id = claim.invalidation_id.as_slice();

    let done: Vec<u64> = LOGIC_CALLS
        .prefix((evm_chain_prefix, id))
        .keys(storage, None, None, Order::Ascending)
        .filter(|item| match item {
            Ok(nonce) => *nonce <= claim.invalidation_nonce,
            Err(_) => true,
        })
        .collect::<StdResult<_>>()?;
    for nonce in done {
        remove_logic_call(storage, evm_chain_prefix, id, nonce)?;
    }

    let last = LAST_EXECUTED_LOGIC_NONCE
        .may_load(storage, (evm_chain_prefix, id))?
        .unwrap_or_default();
    LAST_EXECUTED_LOGIC_NONCE.save(
        storage,
        (evm_chain_prefix, id),
        &last.max(claim.invalidation_nonce),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::init_chain;
    use crate::state::{
        Config, EvmChain, LastObservedEvmHeight, LogicCallConfirm, LAST_OBSERVED_EVM_HEIGHT,
    };
    use cosmwasm_std::testing::{mock_dependencies, mock_env, mock_info};

    fn setup(deps: DepsMut) {
        CONFIG
            .save(
                deps.storage,
                &Config {
                    authority: Addr::unchecked("gov"),
                    fee_collector: Addr::unchecked("fees"),
                    native_prefix: "gravity".to_string(),
                },
            )
            .unwrap();
        init_chain(
            deps.storage,
            &EvmChain {
                evm_chain_prefix: "eth".to_string(),
                evm_chain_name: "Ethereum".to_string(),
                evm_chain_net_version: 1,
            },
        )
        .unwrap();
    }

    fn schedule(deps: DepsMut, nonce: u64, timeout: u64) -> Result<Response, ContractError> {
        execute_schedule_logic_call(
            deps,
            mock_env(),
            mock_info("gov", &[]),
            "eth".to_string(),
            vec![],
            vec![],
            "0x429881672B9AE42b8EbA0E26cD9C73711b891Ca5".to_string(),
            Binary::from(b"payload".to_vec()),
            timeout,
            Binary::from(b"call".to_vec()),
            nonce,
        )
    }

    #[test]
    fn test_newer_nonce_supersedes() {
        let mut deps = mock_dependencies();
        setup(deps.as_mut());

        schedule(deps.as_mut(), 1, 100).unwrap();
        let key = logic_call_key(b"call", 1);
        LOGIC_CALL_CONFIRMS
            .save(
                deps.as_mut().storage,
                ("eth", key.as_slice(), &Addr::unchecked("orch")),
                &LogicCallConfirm {
                    invalidation_id: Binary::from(b"call".to_vec()),
                    invalidation_nonce: 1,
                    eth_signer: EthAddress::zero(),
                    orchestrator: "orch".to_string(),
                    signature: Binary::default(),
                },
            )
            .unwrap();

        schedule(deps.as_mut(), 2, 100).unwrap();
        let storage = deps.as_ref().storage;
        assert!(!LOGIC_CALLS.has(storage, ("eth", b"call".as_slice(), 1)));
        assert!(!LOGIC_CALL_CONFIRMS.has(
            storage,
            ("eth", key.as_slice(), &Addr::unchecked("orch"))
        ));
        assert!(LOGIC_CALLS.has(storage, ("eth", b"call".as_slice(), 2)));

        let err = schedule(deps.as_mut(), 2, 100).unwrap_err();
        assert_eq!(
            err,
            ContractError::StaleLogicCall {
                invalidation_nonce: 2,
                latest: 2
            }
        );
    }

    #[test]
    fn test_executed_nonce_blocks_reschedule() {
        let mut deps = mock_dependencies();
        setup(deps.as_mut());
        schedule(deps.as_mut(), 3, 100).unwrap();

        observe_logic_call_executed(
            deps.as_mut().storage,
            "eth",
            &LogicCallExecutedClaim {
                event_nonce: 1,
                evm_block_height: 1,
                invalidation_id: Binary::from(b"call".to_vec()),
                invalidation_nonce: 3,
            },
        )
        .unwrap();
        assert!(!LOGIC_CALLS.has(deps.as_ref().storage, ("eth", b"call".as_slice(), 3)));

        let err = schedule(deps.as_mut(), 3, 100).unwrap_err();
        assert!(matches!(err, ContractError::StaleLogicCall { latest: 3, .. }));
        schedule(deps.as_mut(), 4, 100).unwrap();
    }

    #[test]
    fn test_expired_calls_removed() {
        let mut deps = mock_dependencies();
        setup(deps.as_mut());
        schedule(deps.as_mut(), 1, 50).unwrap();

        LAST_OBSERVED_EVM_HEIGHT
            .save(
                deps.as_mut().storage,
                "eth",
                &LastObservedEvmHeight {
                    evm_block_height: 51,
                    cosmos_block_height: 1,
                },
            )
            .unwrap();
        assert_eq!(cancel_expired_logic_calls(deps.as_mut().storage, "eth").unwrap(), 1);
        assert!(!LOGIC_CALLS.has(deps.as_ref().storage, ("eth", b"call".as_slice(), 1)));
    }

    #[test]
    fn test_only_authority() {
        let mut deps = mock_dependencies();
        setup(deps.as_mut());
        let err = execute_schedule_logic_call(
            deps.as_mut(),
            mock_env(),
            mock_info("mallory", &[]),
            "eth".to_string(),
            vec![],
            vec![],
            "0x429881672B9AE42b8EbA0E26cD9C73711b891Ca5".to_string(),
            Binary::default(),
            1,
            Binary::from(b"call".to_vec()),
            1,
        )
        .unwrap_err();
        assert_eq!(err, ContractError::Unauthorized);
    }
}
