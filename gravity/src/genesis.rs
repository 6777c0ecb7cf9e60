//! Genesis import and export.
//!
//! Export walks every store in key order, so a document produced by
//! `export_genesis` imports and re-exports to the same bytes. Import checks
//! the cross-record invariants and rebuilds every secondary index.

use cosmwasm_schema::cw_serde;
use cosmwasm_std::{Addr, Binary, Deps, DepsMut, Order, StdResult, Storage};
use cw_storage_plus::Map;

use common::{Asset, EthAddress};

use crate::error::ContractError;
use crate::execute::delegate_keys::store_delegate_keys;
use crate::execute::governance::validate_params;
use crate::execute::ibc_forward::validate_forward;
use crate::execute::pool::insert_unbatched;
use crate::execute::tokens::{save_token_pair, validate_metadata};
use crate::msg::TokenPair;
use crate::registry::{chain_prefixes, init_chain};
use crate::state::{
    logic_call_key, Attestation, BatchConfirm, BondedValidator, DelegateKeys, DenomMetadata,
    EvmChain, LastObservedEvmHeight, LogicCallConfirm, OutgoingLogicCall, OutgoingTransferTx,
    OutgoingTxBatch, Params, PendingIbcAutoForward, Valset, ValsetConfirm, ACTIVE_BATCH_BY_TOKEN,
    ATTESTATIONS, BATCHES, BATCH_CONFIRMS, BONDED_VALIDATORS, COMMUNITY_POOL, CURRENT_SCHEMA_VERSION,
    DELEGATE_KEYS, DENOM_METADATA, ERC20_TO_ASSET, EVM_CHAINS, IBC_CHANNELS, LAST_BATCH_ID,
    LAST_EVENT_NONCE_BY_VALIDATOR, LAST_EXECUTED_LOGIC_NONCE, LAST_OBSERVED_EVENT_NONCE,
    LAST_OBSERVED_EVM_HEIGHT, LAST_OBSERVED_VALSET, LAST_SLASHED_BATCH_BLOCK,
    LAST_SLASHED_LOGIC_CALL_BLOCK, LAST_SLASHED_VALSET_NONCE, LAST_TX_POOL_ID,
    LAST_UNBONDING_HEIGHT, LATEST_VALSET_NONCE, LOGIC_CALLS, LOGIC_CALL_CONFIRMS,
    MONITORED_ERC20_TOKENS, PARAMS, PENDING_IBC_AUTO_FORWARDS, UNBATCHED_TXS, VALSETS,
    VALSET_CONFIRMS,
};

// ============================================================================
// Document
// ============================================================================

#[cw_serde]
pub struct GenesisState {
    pub schema_version: u32,
    pub params: Params,
    pub delegate_keys: Vec<DelegateKeys>,
    pub bonded_validators: Vec<BondedValidator>,
    pub last_unbonding_height: u64,
    pub ibc_channels: Vec<IbcChannel>,
    pub denom_metadata: Vec<DenomMetadata>,
    pub community_pool: Vec<Asset>,
    pub evm_chains: Vec<EvmChainData>,
}

/// Everything stored under one chain prefix
#[cw_serde]
pub struct EvmChainData {
    pub evm_chain: EvmChain,
    pub gravity_nonces: GravityNonces,
    pub last_observed_valset: Option<Valset>,
    pub valsets: Vec<Valset>,
    pub valset_confirms: Vec<ValsetConfirm>,
    pub batches: Vec<OutgoingTxBatch>,
    pub batch_confirms: Vec<BatchConfirm>,
    pub logic_calls: Vec<OutgoingLogicCall>,
    pub logic_call_confirms: Vec<LogicCallConfirm>,
    pub executed_logic_nonces: Vec<ExecutedLogicNonce>,
    pub attestations: Vec<Attestation>,
    pub validator_event_nonces: Vec<ValidatorEventNonce>,
    pub token_pairs: Vec<TokenPair>,
    pub unbatched_transfers: Vec<OutgoingTransferTx>,
    pub pending_ibc_auto_forwards: Vec<PendingIbcAutoForward>,
    pub monitored_erc20_tokens: Vec<EthAddress>,
}

#[cw_serde]
#[derive(Default)]
pub struct GravityNonces {
    pub last_observed_nonce: u64,
    pub latest_valset_nonce: u64,
    pub last_slashed_valset_nonce: u64,
    pub last_slashed_batch_block: u64,
    pub last_slashed_logic_call_block: u64,
    pub last_tx_pool_id: u64,
    pub last_batch_id: u64,
    pub last_observed_evm_height: LastObservedEvmHeight,
}

#[cw_serde]
pub struct ValidatorEventNonce {
    pub validator: String,
    pub event_nonce: u64,
}

#[cw_serde]
pub struct ExecutedLogicNonce {
    pub invalidation_id: Binary,
    pub invalidation_nonce: u64,
}

#[cw_serde]
pub struct IbcChannel {
    pub prefix: String,
    pub channel: String,
}

fn invalid(reason: String) -> ContractError {
    ContractError::InvalidProposal {
        reason: format!("invalid genesis: {}", reason),
    }
}

// ============================================================================
// Import
// ============================================================================

pub fn import_genesis(deps: DepsMut, genesis: GenesisState) -> Result<(), ContractError> {
    if genesis.schema_version != CURRENT_SCHEMA_VERSION {
        return Err(ContractError::UnsupportedSchema {
            version: genesis.schema_version,
        });
    }

    let mut prefixes: Vec<String> = genesis
        .evm_chains
        .iter()
        .map(|c| c.evm_chain.evm_chain_prefix.clone())
        .collect();
    prefixes.sort();
    prefixes.dedup();
    if prefixes.len() != genesis.evm_chains.len() {
        return Err(invalid("duplicate evm chain prefix".to_string()));
    }
    validate_params(&genesis.params, &prefixes)?;
    PARAMS.save(deps.storage, &genesis.params)?;

    for validator in &genesis.bonded_validators {
        let addr = deps.api.addr_validate(&validator.operator_address)?;
        if validator.power == 0 {
            return Err(invalid(format!("validator {} has zero power", addr)));
        }
        BONDED_VALIDATORS.save(deps.storage, &addr, &validator.power)?;
    }
    LAST_UNBONDING_HEIGHT.save(deps.storage, &genesis.last_unbonding_height)?;

    for keys in &genesis.delegate_keys {
        let validator = deps.api.addr_validate(&keys.validator)?;
        let orchestrator = deps.api.addr_validate(&keys.orchestrator)?;
        store_delegate_keys(deps.storage, &validator, &orchestrator, &keys.eth_address)?;
    }

    for route in &genesis.ibc_channels {
        IBC_CHANNELS.save(deps.storage, &route.prefix, &route.channel)?;
    }
    for metadata in &genesis.denom_metadata {
        validate_metadata(metadata)?;
        DENOM_METADATA.save(deps.storage, &metadata.base, metadata)?;
    }
    for balance in &genesis.community_pool {
        COMMUNITY_POOL.save(deps.storage, &balance.info.key(), balance)?;
    }

    let mut net_versions = vec![];
    for chain in &genesis.evm_chains {
        if net_versions.contains(&chain.evm_chain.evm_chain_net_version) {
            return Err(ContractError::DuplicateNetVersion {
                net_version: chain.evm_chain.evm_chain_net_version,
            });
        }
        net_versions.push(chain.evm_chain.evm_chain_net_version);
        import_chain(deps.storage, chain)?;
    }
    Ok(())
}

fn import_chain(storage: &mut dyn Storage, data: &EvmChainData) -> Result<(), ContractError> {
    let prefix = data.evm_chain.evm_chain_prefix.as_str();
    init_chain(storage, &data.evm_chain)?;

    let nonces = &data.gravity_nonces;
    LAST_OBSERVED_EVENT_NONCE.save(storage, prefix, &nonces.last_observed_nonce)?;
    LATEST_VALSET_NONCE.save(storage, prefix, &nonces.latest_valset_nonce)?;
    LAST_SLASHED_VALSET_NONCE.save(storage, prefix, &nonces.last_slashed_valset_nonce)?;
    LAST_SLASHED_BATCH_BLOCK.save(storage, prefix, &nonces.last_slashed_batch_block)?;
    LAST_SLASHED_LOGIC_CALL_BLOCK.save(storage, prefix, &nonces.last_slashed_logic_call_block)?;
    LAST_TX_POOL_ID.save(storage, prefix, &nonces.last_tx_pool_id)?;
    LAST_BATCH_ID.save(storage, prefix, &nonces.last_batch_id)?;
    LAST_OBSERVED_EVM_HEIGHT.save(storage, prefix, &nonces.last_observed_evm_height)?;
    if let Some(valset) = &data.last_observed_valset {
        LAST_OBSERVED_VALSET.save(storage, prefix, valset)?;
    }

    for valset in &data.valsets {
        if valset.nonce > nonces.latest_valset_nonce {
            return Err(invalid(format!(
                "{} valset {} is above the latest nonce {}",
                prefix, valset.nonce, nonces.latest_valset_nonce
            )));
        }
        VALSETS.save(storage, (prefix, valset.nonce), valset)?;
    }
    for confirm in &data.valset_confirms {
        let orchestrator = Addr::unchecked(&confirm.orchestrator);
        VALSET_CONFIRMS.save(storage, (prefix, confirm.nonce, &orchestrator), confirm)?;
    }

    for batch in &data.batches {
        let token = batch.token_contract.as_str();
        if ACTIVE_BATCH_BY_TOKEN.has(storage, (prefix, token)) {
            return Err(invalid(format!(
                "{} has more than one batch for token {}",
                prefix, token
            )));
        }
        BATCHES.save(storage, (prefix, batch.batch_nonce), batch)?;
        ACTIVE_BATCH_BY_TOKEN.save(storage, (prefix, token), &batch.batch_nonce)?;
    }
    for confirm in &data.batch_confirms {
        let orchestrator = Addr::unchecked(&confirm.orchestrator);
        BATCH_CONFIRMS.save(storage, (prefix, confirm.nonce, &orchestrator), confirm)?;
    }

    for call in &data.logic_calls {
        let id = call.invalidation_id.as_slice();
        LOGIC_CALLS.save(storage, (prefix, id, call.invalidation_nonce), call)?;
    }
    for confirm in &data.logic_call_confirms {
        let key = logic_call_key(confirm.invalidation_id.as_slice(), confirm.invalidation_nonce);
        let orchestrator = Addr::unchecked(&confirm.orchestrator);
        LOGIC_CALL_CONFIRMS.save(storage, (prefix, key.as_slice(), &orchestrator), confirm)?;
    }
    for executed in &data.executed_logic_nonces {
        LAST_EXECUTED_LOGIC_NONCE.save(
            storage,
            (prefix, executed.invalidation_id.as_slice()),
            &executed.invalidation_nonce,
        )?;
    }

    // a validator's nonce is at least the highest nonce it voted on
    for entry in &data.validator_event_nonces {
        let validator = Addr::unchecked(&entry.validator);
        LAST_EVENT_NONCE_BY_VALIDATOR.save(storage, (prefix, &validator), &entry.event_nonce)?;
    }
    for attestation in &data.attestations {
        attestation.claim.validate_basic()?;
        let nonce = attestation.claim.event_nonce();
        let hash = attestation.claim.claim_hash()?;
        ATTESTATIONS.save(storage, (prefix, nonce, hash.as_slice()), attestation)?;

        for voter in &attestation.votes {
            let validator = Addr::unchecked(voter);
            let current = LAST_EVENT_NONCE_BY_VALIDATOR
                .may_load(storage, (prefix, &validator))?
                .unwrap_or_default();
            if nonce > current {
                LAST_EVENT_NONCE_BY_VALIDATOR.save(storage, (prefix, &validator), &nonce)?;
            }
        }
    }

    for pair in &data.token_pairs {
        save_token_pair(storage, prefix, &pair.erc20, &pair.asset)?;
    }
    for tx in &data.unbatched_transfers {
        if tx.id > nonces.last_tx_pool_id {
            return Err(invalid(format!(
                "{} transfer {} is above the last pool id {}",
                prefix, tx.id, nonces.last_tx_pool_id
            )));
        }
        insert_unbatched(storage, prefix, tx)?;
    }
    for forward in &data.pending_ibc_auto_forwards {
        validate_forward(forward)?;
        PENDING_IBC_AUTO_FORWARDS.save(storage, (prefix, forward.event_nonce), forward)?;
    }
    if !data.monitored_erc20_tokens.is_empty() {
        MONITORED_ERC20_TOKENS.save(storage, prefix, &data.monitored_erc20_tokens)?;
    }
    Ok(())
}

// ============================================================================
// Export
// ============================================================================

pub fn export_genesis(deps: Deps) -> StdResult<GenesisState> {
    let storage = deps.storage;

    let delegate_keys = DELEGATE_KEYS
        .range(storage, None, None, Order::Ascending)
        .map(|item| item.map(|(_, keys)| keys))
        .collect::<StdResult<_>>()?;
    let bonded_validators = BONDED_VALIDATORS
        .range(storage, None, None, Order::Ascending)
        .map(|item| {
            item.map(|(validator, power)| BondedValidator {
                operator_address: validator.to_string(),
                power,
            })
        })
        .collect::<StdResult<_>>()?;
    let ibc_channels = IBC_CHANNELS
        .range(storage, None, None, Order::Ascending)
        .map(|item| item.map(|(prefix, channel)| IbcChannel { prefix, channel }))
        .collect::<StdResult<_>>()?;
    let denom_metadata = DENOM_METADATA
        .range(storage, None, None, Order::Ascending)
        .map(|item| item.map(|(_, metadata)| metadata))
        .collect::<StdResult<_>>()?;
    let community_pool = COMMUNITY_POOL
        .range(storage, None, None, Order::Ascending)
        .map(|item| item.map(|(_, balance)| balance))
        .collect::<StdResult<_>>()?;

    let evm_chains = chain_prefixes(storage)?
        .iter()
        .map(|prefix| export_chain(storage, prefix))
        .collect::<StdResult<_>>()?;

    Ok(GenesisState {
        schema_version: CURRENT_SCHEMA_VERSION,
        params: PARAMS.load(storage)?,
        delegate_keys,
        bonded_validators,
        last_unbonding_height: LAST_UNBONDING_HEIGHT.may_load(storage)?.unwrap_or_default(),
        ibc_channels,
        denom_metadata,
        community_pool,
        evm_chains,
    })
}

fn counter(storage: &dyn Storage, map: &Map<&str, u64>, prefix: &str) -> StdResult<u64> {
    Ok(map.may_load(storage, prefix)?.unwrap_or_default())
}

fn export_chain(storage: &dyn Storage, prefix: &str) -> StdResult<EvmChainData> {
    let gravity_nonces = GravityNonces {
        last_observed_nonce: counter(storage, &LAST_OBSERVED_EVENT_NONCE, prefix)?,
        latest_valset_nonce: counter(storage, &LATEST_VALSET_NONCE, prefix)?,
        last_slashed_valset_nonce: counter(storage, &LAST_SLASHED_VALSET_NONCE, prefix)?,
        last_slashed_batch_block: counter(storage, &LAST_SLASHED_BATCH_BLOCK, prefix)?,
        last_slashed_logic_call_block: counter(storage, &LAST_SLASHED_LOGIC_CALL_BLOCK, prefix)?,
        last_tx_pool_id: counter(storage, &LAST_TX_POOL_ID, prefix)?,
        last_batch_id: counter(storage, &LAST_BATCH_ID, prefix)?,
        last_observed_evm_height: LAST_OBSERVED_EVM_HEIGHT
            .may_load(storage, prefix)?
            .unwrap_or_default(),
    };

    Ok(EvmChainData {
        evm_chain: EVM_CHAINS.load(storage, prefix)?,
        gravity_nonces,
        last_observed_valset: LAST_OBSERVED_VALSET.may_load(storage, prefix)?,
        valsets: VALSETS
            .prefix(prefix)
            .range(storage, None, None, Order::Ascending)
            .map(|item| item.map(|(_, v)| v))
            .collect::<StdResult<_>>()?,
        valset_confirms: VALSET_CONFIRMS
            .sub_prefix(prefix)
            .range(storage, None, None, Order::Ascending)
            .map(|item| item.map(|(_, c)| c))
            .collect::<StdResult<_>>()?,
        batches: BATCHES
            .prefix(prefix)
            .range(storage, None, None, Order::Ascending)
            .map(|item| item.map(|(_, b)| b))
            .collect::<StdResult<_>>()?,
        batch_confirms: BATCH_CONFIRMS
            .sub_prefix(prefix)
            .range(storage, None, None, Order::Ascending)
            .map(|item| item.map(|(_, c)| c))
            .collect::<StdResult<_>>()?,
        logic_calls: LOGIC_CALLS
            .sub_prefix(prefix)
            .range(storage, None, None, Order::Ascending)
            .map(|item| item.map(|(_, c)| c))
            .collect::<StdResult<_>>()?,
        logic_call_confirms: LOGIC_CALL_CONFIRMS
            .sub_prefix(prefix)
            .range(storage, None, None, Order::Ascending)
            .map(|item| item.map(|(_, c)| c))
            .collect::<StdResult<_>>()?,
        executed_logic_nonces: LAST_EXECUTED_LOGIC_NONCE
            .prefix(prefix)
            .range(storage, None, None, Order::Ascending)
            .map(|item| {
                item.map(|(id, nonce)| ExecutedLogicNonce {
                    invalidation_id: Binary::from(id),
                    invalidation_nonce: nonce,
                })
            })
            .collect::<StdResult<_>>()?,
        attestations: ATTESTATIONS
            .sub_prefix(prefix)
            .range(storage, None, None, Order::Ascending)
            .map(|item| item.map(|(_, a)| a))
            .collect::<StdResult<_>>()?,
        validator_event_nonces: LAST_EVENT_NONCE_BY_VALIDATOR
            .prefix(prefix)
            .range(storage, None, None, Order::Ascending)
            .map(|item| {
                item.map(|(validator, event_nonce)| ValidatorEventNonce {
                    validator: validator.to_string(),
                    event_nonce,
                })
            })
            .collect::<StdResult<_>>()?,
        token_pairs: ERC20_TO_ASSET
            .prefix(prefix)
            .range(storage, None, None, Order::Ascending)
            .map(|item| {
                item.and_then(|(erc20, asset)| {
                    Ok(TokenPair {
                        erc20: EthAddress::parse(&erc20)?,
                        asset,
                    })
                })
            })
            .collect::<StdResult<_>>()?,
        unbatched_transfers: UNBATCHED_TXS
            .prefix(prefix)
            .range(storage, None, None, Order::Ascending)
            .map(|item| item.map(|(_, tx)| tx))
            .collect::<StdResult<_>>()?,
        pending_ibc_auto_forwards: PENDING_IBC_AUTO_FORWARDS
            .prefix(prefix)
            .range(storage, None, None, Order::Ascending)
            .map(|item| item.map(|(_, f)| f))
            .collect::<StdResult<_>>()?,
        monitored_erc20_tokens: MONITORED_ERC20_TOKENS
            .may_load(storage, prefix)?
            .unwrap_or_default(),
    })
}
