//! Gravity Bridge Contract - Entry Points
//!
//! The implementation is modularized into:
//! - `execute/` - Execute message handlers and block hooks
//! - `query` - Query message handlers
//! - `genesis`, `migrations` - State import, export and schema upgrades

use cosmwasm_std::{
    entry_point, to_json_binary, Binary, Deps, DepsMut, Env, Event, MessageInfo, Reply, Response,
    StdResult,
};
use cw2::{get_contract_version, set_contract_version};

use crate::error::ContractError;
use crate::execute::attestation::resolve_attestations;
use crate::execute::batch::cancel_expired_batches;
use crate::execute::governance::validate_params;
use crate::execute::ibc_forward::{drain_forwards, handle_forward_reply};
use crate::execute::logic_call::cancel_expired_logic_calls;
use crate::execute::staking::dispatch_staking_event;
use crate::execute::valsets::{maybe_create_valset, prune_valsets};
use crate::execute::{
    execute_acknowledge_slashing, execute_cancel_send_to_eth, execute_confirm_batch,
    execute_confirm_logic_call, execute_confirm_valset, execute_fund_community_pool,
    execute_governance, execute_ibc_auto_forwards, execute_receive,
    execute_register_eth_originated_token, execute_request_batch, execute_schedule_logic_call,
    execute_send_to_eth, execute_set_denom_metadata, execute_set_ibc_channel_for_prefix,
    execute_set_orchestrator_address, execute_submit_claim, execute_update_params,
};
use crate::genesis::{export_genesis, import_genesis};
use crate::migrations::upgrade_genesis;
use crate::msg::{ExecuteMsg, InstantiateMsg, MigrateMsg, QueryMsg, SudoMsg};
use crate::query::{
    query_active_batch, query_asset_to_erc20, query_attestation_status, query_attestations,
    query_batch_confirms, query_batch_fees, query_bonded_validators, query_community_pool,
    query_config, query_current_valset, query_delegate_key_by_eth_address,
    query_delegate_key_by_orchestrator, query_delegate_key_by_validator, query_denom_metadata,
    query_erc20_to_asset, query_evm_chain, query_evm_chains, query_ibc_channel,
    query_last_event_nonce_by_validator, query_last_observed_event_nonce,
    query_last_observed_evm_height, query_last_observed_valset, query_last_unbonding_height,
    query_latest_valset, query_logic_call_confirms, query_monitored_erc20_tokens,
    query_outgoing_batches, query_outgoing_logic_calls, query_outstanding_confirmations,
    query_params, query_pending_ibc_auto_forwards, query_pending_send_to_eth, query_token_pairs,
    query_valset, query_valset_confirms,
};
use crate::registry::chain_prefixes;
use crate::state::{
    Config, CONFIG, CONTRACT_NAME, CONTRACT_VERSION, CURRENT_SCHEMA_VERSION,
    LAST_UNBONDING_HEIGHT, NEXT_REPLY_ID, PARAMS, SCHEMA_VERSION,
};

// ============================================================================
// Instantiate
// ============================================================================

#[cfg_attr(not(feature = "library"), entry_point)]
pub fn instantiate(
    deps: DepsMut,
    _env: Env,
    _info: MessageInfo,
    msg: InstantiateMsg,
) -> Result<Response, ContractError> {
    set_contract_version(deps.storage, CONTRACT_NAME, CONTRACT_VERSION)?;

    let authority = deps.api.addr_validate(&msg.authority)?;
    let fee_collector = deps.api.addr_validate(&msg.fee_collector)?;
    if msg.native_prefix.is_empty() {
        return Err(ContractError::InvalidAddress {
            reason: "native prefix is empty".to_string(),
        });
    }
    let config = Config {
        authority,
        fee_collector,
        native_prefix: msg.native_prefix,
    };
    CONFIG.save(deps.storage, &config)?;
    SCHEMA_VERSION.save(deps.storage, &CURRENT_SCHEMA_VERSION)?;
    NEXT_REPLY_ID.save(deps.storage, &0)?;

    let chains = match (msg.genesis, msg.params) {
        (Some(_), Some(_)) => {
            return Err(ContractError::InvalidParams {
                reason: "params must be omitted when a genesis document is provided".to_string(),
            })
        }
        (Some(raw), None) => {
            let genesis = upgrade_genesis(raw.as_slice())?;
            let chains = genesis.evm_chains.len();
            import_genesis(deps, genesis)?;
            chains
        }
        (None, params) => {
            let params = params.unwrap_or_default();
            validate_params(&params, &[])?;
            PARAMS.save(deps.storage, &params)?;
            LAST_UNBONDING_HEIGHT.save(deps.storage, &0)?;
            0
        }
    };

    Ok(Response::new()
        .add_attribute("method", "instantiate")
        .add_attribute("authority", config.authority)
        .add_attribute("native_prefix", config.native_prefix)
        .add_attribute("evm_chains", chains.to_string())
        .add_attribute("schema_version", CURRENT_SCHEMA_VERSION.to_string()))
}

// ============================================================================
// Execute
// ============================================================================

#[cfg_attr(not(feature = "library"), entry_point)]
pub fn execute(
    deps: DepsMut,
    env: Env,
    info: MessageInfo,
    msg: ExecuteMsg,
) -> Result<Response, ContractError> {
    match msg {
        // Orchestrator
        ExecuteMsg::SetOrchestratorAddress {
            orchestrator,
            eth_address,
        } => execute_set_orchestrator_address(deps, info, orchestrator, eth_address),
        ExecuteMsg::SubmitClaim {
            evm_chain_prefix,
            claim,
        } => execute_submit_claim(deps, env, info, evm_chain_prefix, claim),
        ExecuteMsg::ConfirmValset {
            evm_chain_prefix,
            nonce,
            eth_signer,
            signature,
        } => execute_confirm_valset(deps, info, evm_chain_prefix, nonce, eth_signer, signature),
        ExecuteMsg::ConfirmBatch {
            evm_chain_prefix,
            nonce,
            token_contract,
            eth_signer,
            signature,
        } => execute_confirm_batch(
            deps,
            info,
            evm_chain_prefix,
            nonce,
            token_contract,
            eth_signer,
            signature,
        ),
        ExecuteMsg::ConfirmLogicCall {
            evm_chain_prefix,
            invalidation_id,
            invalidation_nonce,
            eth_signer,
            signature,
        } => execute_confirm_logic_call(
            deps,
            info,
            evm_chain_prefix,
            invalidation_id,
            invalidation_nonce,
            eth_signer,
            signature,
        ),

        // Users
        ExecuteMsg::SendToEth {
            evm_chain_prefix,
            eth_dest,
            amount,
            bridge_fee,
        } => execute_send_to_eth(deps, env, info, evm_chain_prefix, eth_dest, amount, bridge_fee),
        ExecuteMsg::Receive(msg) => execute_receive(deps, env, info, msg),
        ExecuteMsg::CancelSendToEth {
            evm_chain_prefix,
            transaction_id,
        } => execute_cancel_send_to_eth(deps, info, evm_chain_prefix, transaction_id),
        ExecuteMsg::RequestBatch {
            evm_chain_prefix,
            token_contract,
        } => execute_request_batch(deps, env, evm_chain_prefix, token_contract),
        ExecuteMsg::ExecuteIbcAutoForwards { forwards_to_clear } => {
            execute_ibc_auto_forwards(deps, env, forwards_to_clear)
        }
        ExecuteMsg::FundCommunityPool {} => execute_fund_community_pool(deps, info),

        // Authority
        ExecuteMsg::Governance(proposal) => execute_governance(deps, info, proposal),
        ExecuteMsg::UpdateParams { params } => execute_update_params(deps, info, params),
        ExecuteMsg::ScheduleLogicCall {
            evm_chain_prefix,
            transfers,
            fees,
            logic_contract_address,
            payload,
            timeout,
            invalidation_id,
            invalidation_nonce,
        } => execute_schedule_logic_call(
            deps,
            env,
            info,
            evm_chain_prefix,
            transfers,
            fees,
            logic_contract_address,
            payload,
            timeout,
            invalidation_id,
            invalidation_nonce,
        ),
        ExecuteMsg::RegisterEthOriginatedToken {
            evm_chain_prefix,
            token_contract,
            cw20_contract,
        } => execute_register_eth_originated_token(
            deps,
            info,
            evm_chain_prefix,
            token_contract,
            cw20_contract,
        ),
        ExecuteMsg::SetDenomMetadata { metadata } => {
            execute_set_denom_metadata(deps, info, metadata)
        }
        ExecuteMsg::SetIbcChannelForPrefix { prefix, channel } => {
            execute_set_ibc_channel_for_prefix(deps, info, prefix, channel)
        }
        ExecuteMsg::AcknowledgeSlashing {
            evm_chain_prefix,
            valset_nonce,
            batch_block,
            logic_call_block,
        } => execute_acknowledge_slashing(
            deps,
            info,
            evm_chain_prefix,
            valset_nonce,
            batch_block,
            logic_call_block,
        ),
    }
}

// ============================================================================
// Sudo (block hooks & staking events)
// ============================================================================

#[cfg_attr(not(feature = "library"), entry_point)]
pub fn sudo(deps: DepsMut, env: Env, msg: SudoMsg) -> Result<Response, ContractError> {
    match msg {
        SudoMsg::BeginBlock {} => begin_block(deps),
        SudoMsg::EndBlock {} => end_block(deps, env),
        SudoMsg::Staking(event) => dispatch_staking_event(deps, env, event),
    }
}

/// Refuse to run against state written by another schema version.
fn begin_block(deps: DepsMut) -> Result<Response, ContractError> {
    let stored = SCHEMA_VERSION.load(deps.storage)?;
    if stored != CURRENT_SCHEMA_VERSION {
        return Err(ContractError::SchemaMismatch {
            stored,
            expected: CURRENT_SCHEMA_VERSION,
        });
    }
    Ok(Response::new().add_attribute("action", "begin_block"))
}

/// Per chain: resolve attestations, expire batches and logic calls, request
/// a valset when needed and prune old ones. Then drain the forward queue.
fn end_block(mut deps: DepsMut, env: Env) -> Result<Response, ContractError> {
    let params = PARAMS.load(deps.storage)?;
    let mut response = Response::new().add_attribute("action", "end_block");

    for prefix in chain_prefixes(deps.storage)? {
        let resolution = resolve_attestations(deps.branch(), &env, &prefix)?;
        response = response
            .add_messages(resolution.messages)
            .add_events(resolution.events);

        let cancelled_batches = cancel_expired_batches(deps.storage, &prefix)?;
        let cancelled_calls = cancel_expired_logic_calls(deps.storage, &prefix)?;

        let mut event = Event::new("gravity_end_block")
            .add_attribute("evm_chain_prefix", prefix.as_str())
            .add_attribute("cancelled_batches", cancelled_batches.len().to_string())
            .add_attribute("cancelled_logic_calls", cancelled_calls.to_string());

        if let Some(new) =
            maybe_create_valset(deps.storage, deps.api, &params, &prefix, env.block.height)?
        {
            event = event.add_attribute("valset_nonce", new.valset.nonce.to_string());
            if !new.missing_keys.is_empty() {
                event = event.add_attribute("missing_delegate_keys", new.missing_keys.join(","));
            }
        }

        let pruned = prune_valsets(deps.storage, &prefix)?;
        event = event.add_attribute("pruned_valsets", pruned.len().to_string());
        response = response.add_event(event);
    }

    let forwards = drain_forwards(deps.storage, &env, params.ibc_forwards_per_block as u64)?;
    Ok(response
        .add_attribute("ibc_forwards", forwards.len().to_string())
        .add_submessages(forwards))
}

// ============================================================================
// Reply
// ============================================================================

#[cfg_attr(not(feature = "library"), entry_point)]
pub fn reply(deps: DepsMut, _env: Env, msg: Reply) -> Result<Response, ContractError> {
    handle_forward_reply(deps, msg)
}

// ============================================================================
// Query
// ============================================================================

#[cfg_attr(not(feature = "library"), entry_point)]
pub fn query(deps: Deps, env: Env, msg: QueryMsg) -> StdResult<Binary> {
    match msg {
        // Core
        QueryMsg::Config {} => to_json_binary(&query_config(deps)?),
        QueryMsg::Params {} => to_json_binary(&query_params(deps)?),
        QueryMsg::EvmChain { evm_chain_prefix } => {
            to_json_binary(&query_evm_chain(deps, evm_chain_prefix)?)
        }
        QueryMsg::EvmChains { start_after, limit } => {
            to_json_binary(&query_evm_chains(deps, start_after, limit)?)
        }

        // Nonces & attestations
        QueryMsg::LastObservedEventNonce { evm_chain_prefix } => {
            to_json_binary(&query_last_observed_event_nonce(deps, evm_chain_prefix)?)
        }
        QueryMsg::LastEventNonceByValidator {
            evm_chain_prefix,
            validator,
        } => to_json_binary(&query_last_event_nonce_by_validator(
            deps,
            evm_chain_prefix,
            validator,
        )?),
        QueryMsg::LastObservedEvmBlockHeight { evm_chain_prefix } => {
            to_json_binary(&query_last_observed_evm_height(deps, evm_chain_prefix)?)
        }
        QueryMsg::AttestationStatus {
            evm_chain_prefix,
            event_nonce,
        } => to_json_binary(&query_attestation_status(deps, evm_chain_prefix, event_nonce)?),
        QueryMsg::Attestations {
            evm_chain_prefix,
            start_after,
            limit,
        } => to_json_binary(&query_attestations(deps, evm_chain_prefix, start_after, limit)?),

        // Valsets
        QueryMsg::CurrentValset { evm_chain_prefix } => {
            to_json_binary(&query_current_valset(deps, env, evm_chain_prefix)?)
        }
        QueryMsg::Valset {
            evm_chain_prefix,
            nonce,
        } => to_json_binary(&query_valset(deps, evm_chain_prefix, nonce)?),
        QueryMsg::LatestValset { evm_chain_prefix } => {
            to_json_binary(&query_latest_valset(deps, evm_chain_prefix)?)
        }
        QueryMsg::LastObservedValset { evm_chain_prefix } => {
            to_json_binary(&query_last_observed_valset(deps, evm_chain_prefix)?)
        }
        QueryMsg::ValsetConfirms {
            evm_chain_prefix,
            nonce,
        } => to_json_binary(&query_valset_confirms(deps, evm_chain_prefix, nonce)?),

        // Pool & batches
        QueryMsg::PendingSendToEth {
            evm_chain_prefix,
            sender,
        } => to_json_binary(&query_pending_send_to_eth(deps, evm_chain_prefix, sender)?),
        QueryMsg::BatchFees { evm_chain_prefix } => {
            to_json_binary(&query_batch_fees(deps, evm_chain_prefix)?)
        }
        QueryMsg::ActiveBatch {
            evm_chain_prefix,
            token_contract,
        } => to_json_binary(&query_active_batch(deps, evm_chain_prefix, token_contract)?),
        QueryMsg::OutgoingBatches {
            evm_chain_prefix,
            start_after,
            limit,
        } => to_json_binary(&query_outgoing_batches(
            deps,
            evm_chain_prefix,
            start_after,
            limit,
        )?),
        QueryMsg::BatchConfirms {
            evm_chain_prefix,
            nonce,
        } => to_json_binary(&query_batch_confirms(deps, evm_chain_prefix, nonce)?),

        // Logic calls
        QueryMsg::OutgoingLogicCalls { evm_chain_prefix } => {
            to_json_binary(&query_outgoing_logic_calls(deps, evm_chain_prefix)?)
        }
        QueryMsg::LogicCallConfirms {
            evm_chain_prefix,
            invalidation_id,
            invalidation_nonce,
        } => to_json_binary(&query_logic_call_confirms(
            deps,
            evm_chain_prefix,
            invalidation_id,
            invalidation_nonce,
        )?),

        // IBC auto-forwarding
        QueryMsg::PendingIbcAutoForwards {
            evm_chain_prefix,
            limit,
        } => to_json_binary(&query_pending_ibc_auto_forwards(deps, evm_chain_prefix, limit)?),
        QueryMsg::IbcChannel { prefix } => to_json_binary(&query_ibc_channel(deps, prefix)?),

        // Delegate keys & staking
        QueryMsg::DelegateKeyByValidator { validator } => {
            to_json_binary(&query_delegate_key_by_validator(deps, validator)?)
        }
        QueryMsg::DelegateKeyByOrchestrator { orchestrator } => {
            to_json_binary(&query_delegate_key_by_orchestrator(deps, orchestrator)?)
        }
        QueryMsg::DelegateKeyByEthAddress { eth_address } => {
            to_json_binary(&query_delegate_key_by_eth_address(deps, eth_address)?)
        }
        QueryMsg::BondedValidators {} => to_json_binary(&query_bonded_validators(deps)?),
        QueryMsg::LastUnbondingHeight {} => to_json_binary(&query_last_unbonding_height(deps)?),
        QueryMsg::OutstandingConfirmations {
            evm_chain_prefix,
            validator,
        } => to_json_binary(&query_outstanding_confirmations(
            deps,
            evm_chain_prefix,
            validator,
        )?),

        // Tokens & community pool
        QueryMsg::Erc20ToAsset {
            evm_chain_prefix,
            erc20,
        } => to_json_binary(&query_erc20_to_asset(deps, evm_chain_prefix, erc20)?),
        QueryMsg::AssetToErc20 {
            evm_chain_prefix,
            asset,
        } => to_json_binary(&query_asset_to_erc20(deps, evm_chain_prefix, asset)?),
        QueryMsg::TokenPairs { evm_chain_prefix } => {
            to_json_binary(&query_token_pairs(deps, evm_chain_prefix)?)
        }
        QueryMsg::DenomMetadata { denom } => to_json_binary(&query_denom_metadata(deps, denom)?),
        QueryMsg::MonitoredErc20Tokens { evm_chain_prefix } => {
            to_json_binary(&query_monitored_erc20_tokens(deps, evm_chain_prefix)?)
        }
        QueryMsg::CommunityPool {} => to_json_binary(&query_community_pool(deps)?),

        // Genesis
        QueryMsg::ExportGenesis {} => to_json_binary(&export_genesis(deps)?),
    }
}

// ============================================================================
// Migrate
// ============================================================================

/// Numeric `major.minor.patch` components of a version string
fn version_parts(version: &str) -> Vec<u64> {
    version
        .split('.')
        .map(|part| part.parse().unwrap_or_default())
        .collect()
}

#[cfg_attr(not(feature = "library"), entry_point)]
pub fn migrate(deps: DepsMut, _env: Env, _msg: MigrateMsg) -> Result<Response, ContractError> {
    let stored = get_contract_version(deps.storage)?;
    if version_parts(&stored.version) > version_parts(CONTRACT_VERSION) {
        return Err(ContractError::MigrationDowngrade {
            stored: stored.version,
            requested: CONTRACT_VERSION.to_string(),
        });
    }

    // older layouts only exist as genesis documents; state on chain is
    // always written by a schema this code can read or a newer one
    let schema = SCHEMA_VERSION.may_load(deps.storage)?.unwrap_or_default();
    if schema > CURRENT_SCHEMA_VERSION {
        return Err(ContractError::MigrationDowngrade {
            stored: format!("schema {}", schema),
            requested: format!("schema {}", CURRENT_SCHEMA_VERSION),
        });
    }
    if schema < CURRENT_SCHEMA_VERSION {
        return Err(ContractError::UnsupportedSchema { version: schema });
    }

    set_contract_version(deps.storage, CONTRACT_NAME, CONTRACT_VERSION)?;
    SCHEMA_VERSION.save(deps.storage, &CURRENT_SCHEMA_VERSION)?;

    Ok(Response::new()
        .add_attribute("action", "migrate")
        .add_attribute("previous_version", stored.version)
        .add_attribute("version", CONTRACT_VERSION)
        .add_attribute("schema_version", CURRENT_SCHEMA_VERSION.to_string()))
}
