//! Query handlers for the Gravity bridge contract.
//!
//! Every per-chain query fails with a not-found error for unknown prefixes.

use std::collections::BTreeMap;

use cosmwasm_std::{Addr, Binary, Deps, Env, Order, StdError, StdResult, Uint128};
use cw_storage_plus::Bound;

use common::{AssetInfo, EthAddress};

use crate::execute::pool::unbatched_by_sender;
use crate::execute::staking::total_bonded_power;
use crate::execute::valsets::latest_valset;
use crate::msg::{
    AttestationInfo, AttestationStatusResponse, AttestationsResponse, BatchConfirmsResponse,
    BatchFee, BatchFeesResponse, BatchResponse, BatchesResponse, BondedValidatorsResponse,
    CommunityPoolResponse, ConfigResponse, DelegateKeysResponse, DenomMetadataResponse,
    EvmChainResponse, EvmChainsResponse, HeightResponse, IbcChannelResponse,
    LogicCallConfirmsResponse, LogicCallId, LogicCallsResponse, MonitoredErc20TokensResponse,
    NonceResponse, OutstandingConfirmationsResponse, PendingIbcAutoForwardsResponse,
    PendingSendToEthResponse, TokenPair, TokenPairResponse, TokenPairsResponse,
    ValsetConfirmsResponse, ValsetResponse,
};
use crate::nonces::{
    last_event_nonce_by_validator, last_observed_event_nonce, last_observed_evm_height,
};
use crate::state::{
    logic_call_key, BondedValidator, EvmChain, LastObservedEvmHeight, Params,
    ACTIVE_BATCH_BY_TOKEN, ASSET_TO_ERC20, ATTESTATIONS, BATCHES, BATCH_CONFIRMS,
    BONDED_VALIDATORS, COMMUNITY_POOL, CONFIG, DELEGATE_KEYS, DENOM_METADATA, ERC20_TO_ASSET,
    EVM_CHAINS, IBC_CHANNELS, LAST_OBSERVED_VALSET, LAST_UNBONDING_HEIGHT, LATEST_VALSET_NONCE, LOGIC_CALLS, LOGIC_CALL_CONFIRMS,
    MONITORED_ERC20_TOKENS, PARAMS, PENDING_IBC_AUTO_FORWARDS, SCHEMA_VERSION, UNBATCHED_BY_FEE,
    UNBATCHED_TXS, VALIDATOR_BY_ETH_ADDRESS, VALIDATOR_BY_ORCHESTRATOR, VALSETS, VALSET_CONFIRMS,
};
use crate::valset::build_valset;

fn load_chain(deps: Deps, prefix: &str) -> StdResult<EvmChain> {
    EVM_CHAINS
        .may_load(deps.storage, prefix)?
        .ok_or_else(|| StdError::not_found(format!("EVM chain {}", prefix)))
}

fn parse_eth(input: &str) -> StdResult<EthAddress> {
    EthAddress::parse(input)
}

// ============================================================================
// Core Queries
// ============================================================================

/// Query contract configuration.
pub fn query_config(deps: Deps) -> StdResult<ConfigResponse> {
    let config = CONFIG.load(deps.storage)?;
    Ok(ConfigResponse {
        authority: config.authority,
        fee_collector: config.fee_collector,
        native_prefix: config.native_prefix,
        schema_version: SCHEMA_VERSION.load(deps.storage)?,
    })
}

pub fn query_params(deps: Deps) -> StdResult<Params> {
    PARAMS.load(deps.storage)
}

/// Query a registered chain with its parameters.
pub fn query_evm_chain(deps: Deps, evm_chain_prefix: String) -> StdResult<EvmChainResponse> {
    let evm_chain = load_chain(deps, &evm_chain_prefix)?;
    let params = PARAMS.load(deps.storage)?;
    Ok(EvmChainResponse {
        evm_chain,
        params: params.chain(&evm_chain_prefix).cloned(),
    })
}

/// Query paginated list of chains.
pub fn query_evm_chains(
    deps: Deps,
    start_after: Option<String>,
    limit: Option<u32>,
) -> StdResult<EvmChainsResponse> {
    let limit = limit.unwrap_or(10).min(50) as usize;
    let start = start_after.as_deref().map(|s| Bound::exclusive(s));

    let evm_chains = EVM_CHAINS
        .range(deps.storage, start, None, Order::Ascending)
        .take(limit)
        .map(|item| item.map(|(_, chain)| chain))
        .collect::<StdResult<Vec<_>>>()?;
    Ok(EvmChainsResponse { evm_chains })
}

// ============================================================================
// Nonce & Attestation Queries
// ============================================================================

pub fn query_last_observed_event_nonce(
    deps: Deps,
    evm_chain_prefix: String,
) -> StdResult<NonceResponse> {
    load_chain(deps, &evm_chain_prefix)?;
    Ok(NonceResponse {
        nonce: last_observed_event_nonce(deps.storage, &evm_chain_prefix)?,
    })
}

/// Query the last event nonce a validator voted on. Accepts the validator's
/// operator or orchestrator address.
pub fn query_last_event_nonce_by_validator(
    deps: Deps,
    evm_chain_prefix: String,
    validator: String,
) -> StdResult<NonceResponse> {
    load_chain(deps, &evm_chain_prefix)?;
    let addr = deps.api.addr_validate(&validator)?;
    let validator = VALIDATOR_BY_ORCHESTRATOR
        .may_load(deps.storage, &addr)?
        .unwrap_or(addr);
    Ok(NonceResponse {
        nonce: last_event_nonce_by_validator(deps.storage, &evm_chain_prefix, &validator)?,
    })
}

pub fn query_last_observed_evm_height(
    deps: Deps,
    evm_chain_prefix: String,
) -> StdResult<LastObservedEvmHeight> {
    load_chain(deps, &evm_chain_prefix)?;
    last_observed_evm_height(deps.storage, &evm_chain_prefix)
}

/// Query all attestations stored at a nonce.
pub fn query_attestation_status(
    deps: Deps,
    evm_chain_prefix: String,
    event_nonce: u64,
) -> StdResult<AttestationStatusResponse> {
    load_chain(deps, &evm_chain_prefix)?;
    let last_observed_nonce = last_observed_event_nonce(deps.storage, &evm_chain_prefix)?;

    let attestations = ATTESTATIONS
        .prefix((evm_chain_prefix.as_str(), event_nonce))
        .range(deps.storage, None, None, Order::Ascending)
        .map(|item| {
            let (hash, attestation) = item?;
            Ok(AttestationInfo {
                event_nonce,
                claim_hash: hex::encode(hash),
                attestation,
            })
        })
        .collect::<StdResult<Vec<_>>>()?;
    let observed = attestations.iter().any(|a| a.attestation.observed);

    Ok(AttestationStatusResponse {
        event_nonce,
        last_observed_nonce,
        observed,
        attestations,
    })
}

/// Query attestations in nonce order.
pub fn query_attestations(
    deps: Deps,
    evm_chain_prefix: String,
    start_after: Option<u64>,
    limit: Option<u32>,
) -> StdResult<AttestationsResponse> {
    load_chain(deps, &evm_chain_prefix)?;
    let limit = limit.unwrap_or(10).min(50) as usize;
    // (n + 1, []) sorts before every hash stored under n + 1
    let start = match start_after {
        Some(n) => match n.checked_add(1) {
            Some(next) => Some(Bound::inclusive((next, &[][..]))),
            None => return Ok(AttestationsResponse { attestations: vec![] }),
        },
        None => None,
    };

    let attestations = ATTESTATIONS
        .sub_prefix(evm_chain_prefix.as_str())
        .range(deps.storage, start, None, Order::Ascending)
        .take(limit)
        .map(|item| {
            let ((event_nonce, hash), attestation) = item?;
            Ok(AttestationInfo {
                event_nonce,
                claim_hash: hex::encode(hash),
                attestation,
            })
        })
        .collect::<StdResult<Vec<_>>>()?;
    Ok(AttestationsResponse { attestations })
}

// ============================================================================
// Valset Queries
// ============================================================================

/// Query the valset that would be created at the current height.
pub fn query_current_valset(
    deps: Deps,
    env: Env,
    evm_chain_prefix: String,
) -> StdResult<ValsetResponse> {
    load_chain(deps, &evm_chain_prefix)?;
    let params = PARAMS.load(deps.storage)?;
    let nonce = LATEST_VALSET_NONCE
        .may_load(deps.storage, &evm_chain_prefix)?
        .unwrap_or_default()
        + 1;
    let (valset, _) = build_valset(deps.storage, &params, nonce, env.block.height)?;
    Ok(ValsetResponse {
        valset: Some(valset),
    })
}

pub fn query_valset(deps: Deps, evm_chain_prefix: String, nonce: u64) -> StdResult<ValsetResponse> {
    load_chain(deps, &evm_chain_prefix)?;
    Ok(ValsetResponse {
        valset: VALSETS.may_load(deps.storage, (evm_chain_prefix.as_str(), nonce))?,
    })
}

pub fn query_latest_valset(deps: Deps, evm_chain_prefix: String) -> StdResult<ValsetResponse> {
    load_chain(deps, &evm_chain_prefix)?;
    Ok(ValsetResponse {
        valset: latest_valset(deps.storage, &evm_chain_prefix)?,
    })
}

pub fn query_last_observed_valset(
    deps: Deps,
    evm_chain_prefix: String,
) -> StdResult<ValsetResponse> {
    load_chain(deps, &evm_chain_prefix)?;
    Ok(ValsetResponse {
        valset: LAST_OBSERVED_VALSET.may_load(deps.storage, &evm_chain_prefix)?,
    })
}

pub fn query_valset_confirms(
    deps: Deps,
    evm_chain_prefix: String,
    nonce: u64,
) -> StdResult<ValsetConfirmsResponse> {
    load_chain(deps, &evm_chain_prefix)?;
    let confirms = VALSET_CONFIRMS
        .prefix((evm_chain_prefix.as_str(), nonce))
        .range(deps.storage, None, None, Order::Ascending)
        .map(|item| item.map(|(_, confirm)| confirm))
        .collect::<StdResult<Vec<_>>>()?;
    Ok(ValsetConfirmsResponse { confirms })
}

// ============================================================================
// Pool & Batch Queries
// ============================================================================

/// Query a sender's transfers, both still pooled and already batched.
pub fn query_pending_send_to_eth(
    deps: Deps,
    evm_chain_prefix: String,
    sender: String,
) -> StdResult<PendingSendToEthResponse> {
    load_chain(deps, &evm_chain_prefix)?;
    let sender = deps.api.addr_validate(&sender)?;

    let mut transfers_in_batches = vec![];
    for item in BATCHES
        .prefix(&evm_chain_prefix)
        .range(deps.storage, None, None, Order::Ascending)
    {
        let (_, batch) = item?;
        transfers_in_batches.extend(batch.transactions.into_iter().filter(|tx| tx.sender == sender));
    }

    Ok(PendingSendToEthResponse {
        transfers_in_batches,
        unbatched_transfers: unbatched_by_sender(deps.storage, &evm_chain_prefix, &sender)?,
    })
}

/// Query the fees a batch of each token would collect now, counting at most
/// `max_batch_size` transfers per token.
pub fn query_batch_fees(deps: Deps, evm_chain_prefix: String) -> StdResult<BatchFeesResponse> {
    load_chain(deps, &evm_chain_prefix)?;
    let max = PARAMS.load(deps.storage)?.max_batch_size as u64;

    let mut fees: BTreeMap<String, (Uint128, u64)> = BTreeMap::new();
    for item in UNBATCHED_BY_FEE
        .sub_prefix(&evm_chain_prefix)
        .range(deps.storage, None, None, Order::Ascending)
    {
        let ((token, _), id) = item?;
        let entry = fees.entry(token).or_insert((Uint128::zero(), 0));
        if entry.1 >= max {
            continue;
        }
        let tx = UNBATCHED_TXS.load(deps.storage, (evm_chain_prefix.as_str(), id))?;
        entry.0 += tx.erc20_fee.amount;
        entry.1 += 1;
    }

    let batch_fees = fees
        .into_iter()
        .map(|(token, (total_fees, tx_count))| {
            Ok(BatchFee {
                token: parse_eth(&token)?,
                total_fees,
                tx_count,
            })
        })
        .collect::<StdResult<Vec<_>>>()?;
    Ok(BatchFeesResponse { batch_fees })
}

/// Query the batch currently outstanding for a token, if any.
pub fn query_active_batch(
    deps: Deps,
    evm_chain_prefix: String,
    token_contract: String,
) -> StdResult<BatchResponse> {
    load_chain(deps, &evm_chain_prefix)?;
    let token = parse_eth(&token_contract)?;
    let batch = match ACTIVE_BATCH_BY_TOKEN
        .may_load(deps.storage, (evm_chain_prefix.as_str(), token.as_str()))?
    {
        Some(nonce) => BATCHES.may_load(deps.storage, (evm_chain_prefix.as_str(), nonce))?,
        None => None,
    };
    Ok(BatchResponse { batch })
}

/// Query paginated outgoing batches in nonce order.
pub fn query_outgoing_batches(
    deps: Deps,
    evm_chain_prefix: String,
    start_after: Option<u64>,
    limit: Option<u32>,
) -> StdResult<BatchesResponse> {
    load_chain(deps, &evm_chain_prefix)?;
    let limit = limit.unwrap_or(10).min(50) as usize;
    let start = start_after.map(|s| Bound::exclusive(s));

    let batches = BATCHES
        .prefix(&evm_chain_prefix)
        .range(deps.storage, start, None, Order::Ascending)
        .take(limit)
        .map(|item| item.map(|(_, batch)| batch))
        .collect::<StdResult<Vec<_>>>()?;
    Ok(BatchesResponse { batches })
}

pub fn query_batch_confirms(
    deps: Deps,
    evm_chain_prefix: String,
    nonce: u64,
) -> StdResult<BatchConfirmsResponse> {
    load_chain(deps, &evm_chain_prefix)?;
    let confirms = BATCH_CONFIRMS
        .prefix((evm_chain_prefix.as_str(), nonce))
        .range(deps.storage, None, None, Order::Ascending)
        .map(|item| item.map(|(_, confirm)| confirm))
        .collect::<StdResult<Vec<_>>>()?;
    Ok(BatchConfirmsResponse { confirms })
}

// ============================================================================
// Logic Call Queries
// ============================================================================

pub fn query_outgoing_logic_calls(
    deps: Deps,
    evm_chain_prefix: String,
) -> StdResult<LogicCallsResponse> {
    load_chain(deps, &evm_chain_prefix)?;
    let calls = LOGIC_CALLS
        .sub_prefix(&evm_chain_prefix)
        .range(deps.storage, None, None, Order::Ascending)
        .map(|item| item.map(|(_, call)| call))
        .collect::<StdResult<Vec<_>>>()?;
    Ok(LogicCallsResponse { calls })
}

pub fn query_logic_call_confirms(
    deps: Deps,
    evm_chain_prefix: String,
    invalidation_id: Binary,
    invalidation_nonce: u64,
) -> StdResult<LogicCallConfirmsResponse> {
    load_chain(deps, &evm_chain_prefix)?;
    let key = logic_call_key(invalidation_id.as_slice(), invalidation_nonce);
    let confirms = LOGIC_CALL_CONFIRMS
        .prefix((evm_chain_prefix.as_str(), key.as_slice()))
        .range(deps.storage, None, None, Order::Ascending)
        .map(|item| item.map(|(_, confirm)| confirm))
        .collect::<StdResult<Vec<_>>>()?;
    Ok(LogicCallConfirmsResponse { confirms })
}

// ============================================================================
// IBC Auto-Forward Queries
// ============================================================================

/// Query queued forwards of a chain in event nonce order.
pub fn query_pending_ibc_auto_forwards(
    deps: Deps,
    evm_chain_prefix: String,
    limit: Option<u32>,
) -> StdResult<PendingIbcAutoForwardsResponse> {
    load_chain(deps, &evm_chain_prefix)?;
    let limit = limit.unwrap_or(10).min(50) as usize;
    let forwards = PENDING_IBC_AUTO_FORWARDS
        .prefix(&evm_chain_prefix)
        .range(deps.storage, None, None, Order::Ascending)
        .take(limit)
        .map(|item| item.map(|(_, forward)| forward))
        .collect::<StdResult<Vec<_>>>()?;
    Ok(PendingIbcAutoForwardsResponse { forwards })
}

pub fn query_ibc_channel(deps: Deps, prefix: String) -> StdResult<IbcChannelResponse> {
    Ok(IbcChannelResponse {
        channel: IBC_CHANNELS.may_load(deps.storage, &prefix)?,
    })
}

// ============================================================================
// Delegate Key & Staking Queries
// ============================================================================

pub fn query_delegate_key_by_validator(
    deps: Deps,
    validator: String,
) -> StdResult<DelegateKeysResponse> {
    let validator = deps.api.addr_validate(&validator)?;
    Ok(DelegateKeysResponse {
        keys: DELEGATE_KEYS.may_load(deps.storage, &validator)?,
    })
}

pub fn query_delegate_key_by_orchestrator(
    deps: Deps,
    orchestrator: String,
) -> StdResult<DelegateKeysResponse> {
    let orchestrator = deps.api.addr_validate(&orchestrator)?;
    let keys = match VALIDATOR_BY_ORCHESTRATOR.may_load(deps.storage, &orchestrator)? {
        Some(validator) => DELEGATE_KEYS.may_load(deps.storage, &validator)?,
        None => None,
    };
    Ok(DelegateKeysResponse { keys })
}

pub fn query_delegate_key_by_eth_address(
    deps: Deps,
    eth_address: String,
) -> StdResult<DelegateKeysResponse> {
    let eth_address = parse_eth(&eth_address)?;
    let keys = match VALIDATOR_BY_ETH_ADDRESS.may_load(deps.storage, eth_address.as_str())? {
        Some(validator) => DELEGATE_KEYS.may_load(deps.storage, &validator)?,
        None => None,
    };
    Ok(DelegateKeysResponse { keys })
}

pub fn query_bonded_validators(deps: Deps) -> StdResult<BondedValidatorsResponse> {
    let validators = BONDED_VALIDATORS
        .range(deps.storage, None, None, Order::Ascending)
        .map(|item| {
            item.map(|(validator, power)| BondedValidator {
                operator_address: validator.to_string(),
                power,
            })
        })
        .collect::<StdResult<Vec<_>>>()?;
    Ok(BondedValidatorsResponse {
        validators,
        total_power: total_bonded_power(deps.storage)?,
    })
}

pub fn query_last_unbonding_height(deps: Deps) -> StdResult<HeightResponse> {
    Ok(HeightResponse {
        height: LAST_UNBONDING_HEIGHT
            .may_load(deps.storage)?
            .unwrap_or_default(),
    })
}

/// Query the valsets, batches and logic calls still waiting for a
/// validator's orchestrator to confirm them.
pub fn query_outstanding_confirmations(
    deps: Deps,
    evm_chain_prefix: String,
    validator: String,
) -> StdResult<OutstandingConfirmationsResponse> {
    load_chain(deps, &evm_chain_prefix)?;
    let validator = deps.api.addr_validate(&validator)?;
    let keys = DELEGATE_KEYS
        .may_load(deps.storage, &validator)?
        .ok_or_else(|| StdError::not_found(format!("delegate keys of {}", validator)))?;
    let orchestrator = Addr::unchecked(keys.orchestrator);
    let prefix = evm_chain_prefix.as_str();

    let mut valsets = vec![];
    for nonce in VALSETS
        .prefix(prefix)
        .keys(deps.storage, None, None, Order::Ascending)
    {
        let nonce = nonce?;
        if !VALSET_CONFIRMS.has(deps.storage, (prefix, nonce, &orchestrator)) {
            valsets.push(nonce);
        }
    }

    let mut batches = vec![];
    for nonce in BATCHES
        .prefix(prefix)
        .keys(deps.storage, None, None, Order::Ascending)
    {
        let nonce = nonce?;
        if !BATCH_CONFIRMS.has(deps.storage, (prefix, nonce, &orchestrator)) {
            batches.push(nonce);
        }
    }

    let mut logic_calls = vec![];
    for item in LOGIC_CALLS
        .sub_prefix(prefix)
        .keys(deps.storage, None, None, Order::Ascending)
    {
        let (invalidation_id, invalidation_nonce) = item?;
        let key = logic_call_key(&invalidation_id, invalidation_nonce);
        if !LOGIC_CALL_CONFIRMS.has(deps.storage, (prefix, key.as_slice(), &orchestrator)) {
            logic_calls.push(LogicCallId {
                invalidation_id: Binary::from(invalidation_id),
                invalidation_nonce,
            });
        }
    }

    Ok(OutstandingConfirmationsResponse {
        last_unbonding_height: LAST_UNBONDING_HEIGHT
            .may_load(deps.storage)?
            .unwrap_or_default(),
        valsets,
        batches,
        logic_calls,
    })
}

// ============================================================================
// Token & Community Pool Queries
// ============================================================================

pub fn query_erc20_to_asset(
    deps: Deps,
    evm_chain_prefix: String,
    erc20: String,
) -> StdResult<TokenPairResponse> {
    load_chain(deps, &evm_chain_prefix)?;
    let erc20 = parse_eth(&erc20)?;
    let pair = ERC20_TO_ASSET
        .may_load(deps.storage, (evm_chain_prefix.as_str(), erc20.as_str()))?
        .map(|asset| TokenPair { erc20, asset });
    Ok(TokenPairResponse { pair })
}

pub fn query_asset_to_erc20(
    deps: Deps,
    evm_chain_prefix: String,
    asset: AssetInfo,
) -> StdResult<TokenPairResponse> {
    load_chain(deps, &evm_chain_prefix)?;
    let pair = ASSET_TO_ERC20
        .may_load(deps.storage, (evm_chain_prefix.as_str(), &asset.key()))?
        .map(|erc20| TokenPair { erc20, asset });
    Ok(TokenPairResponse { pair })
}

pub fn query_token_pairs(deps: Deps, evm_chain_prefix: String) -> StdResult<TokenPairsResponse> {
    load_chain(deps, &evm_chain_prefix)?;
    let pairs = ERC20_TO_ASSET
        .prefix(&evm_chain_prefix)
        .range(deps.storage, None, None, Order::Ascending)
        .map(|item| {
            let (erc20, asset) = item?;
            Ok(TokenPair {
                erc20: parse_eth(&erc20)?,
                asset,
            })
        })
        .collect::<StdResult<Vec<_>>>()?;
    Ok(TokenPairsResponse { pairs })
}

pub fn query_denom_metadata(deps: Deps, denom: String) -> StdResult<DenomMetadataResponse> {
    Ok(DenomMetadataResponse {
        metadata: DENOM_METADATA.may_load(deps.storage, &denom)?,
    })
}

pub fn query_monitored_erc20_tokens(
    deps: Deps,
    evm_chain_prefix: String,
) -> StdResult<MonitoredErc20TokensResponse> {
    load_chain(deps, &evm_chain_prefix)?;
    Ok(MonitoredErc20TokensResponse {
        tokens: MONITORED_ERC20_TOKENS
            .may_load(deps.storage, &evm_chain_prefix)?
            .unwrap_or_default(),
    })
}

pub fn query_community_pool(deps: Deps) -> StdResult<CommunityPoolResponse> {
    let balances = COMMUNITY_POOL
        .range(deps.storage, None, None, Order::Ascending)
        .map(|item| item.map(|(_, balance)| balance))
        .collect::<StdResult<Vec<_>>>()?;
    Ok(CommunityPoolResponse { balances })
}

