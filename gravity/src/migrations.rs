//! Genesis schema migrations.
//!
//! Each step upgrades a raw document by exactly one schema version. Old
//! layouts are described by plain serde structs here and nowhere else.
//!
//! - v1: a single EVM chain with unprefixed state and an ERC-721 attestation
//!   track. The chain becomes `eth`; the ERC-721 track is dropped.
//! - v2: multi-chain, but delegate keys are stored once per chain and
//!   pending IBC forwards live in one global list.
//! - v3: current layout, see [`GenesisState`].

use cosmwasm_std::{from_json, to_json_vec};
use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};

use common::{Asset, EthAddress};

use crate::error::ContractError;
use crate::genesis::{
    EvmChainData, ExecutedLogicNonce, GenesisState, GravityNonces, IbcChannel,
    ValidatorEventNonce,
};
use crate::msg::TokenPair;
use crate::state::{
    Attestation, BatchConfirm, BondedValidator, DelegateKeys, DenomMetadata, EvmChain,
    EvmChainParams, LogicCallConfirm, OutgoingLogicCall, OutgoingTransferTx, OutgoingTxBatch,
    Params, PendingIbcAutoForward, Valset, ValsetConfirm, CURRENT_SCHEMA_VERSION,
};

/// Prefix and name given to the single chain of a v1 document
pub const V1_CHAIN_PREFIX: &str = "eth";
pub const V1_CHAIN_NAME: &str = "Ethereum";

type MigrationFn = fn(&[u8]) -> Result<Vec<u8>, ContractError>;

/// Ordered upgrade steps, keyed by the version they upgrade from
pub const MIGRATIONS: &[(u32, MigrationFn)] = &[(1, v1_to_v2), (2, v2_to_v3)];

#[derive(Deserialize)]
struct SchemaProbe {
    schema_version: u32,
}

/// Read a genesis document of any supported version and bring it to the
/// current layout.
pub fn upgrade_genesis(raw: &[u8]) -> Result<GenesisState, ContractError> {
    let probe: SchemaProbe = from_json(raw)?;
    let mut version = probe.schema_version;
    if version == 0 || version > CURRENT_SCHEMA_VERSION {
        return Err(ContractError::UnsupportedSchema { version });
    }

    let mut doc = raw.to_vec();
    while version < CURRENT_SCHEMA_VERSION {
        let (_, step) = MIGRATIONS
            .iter()
            .find(|(from, _)| *from == version)
            .ok_or(ContractError::UnsupportedSchema { version })?;
        doc = step(&doc)?;
        version += 1;
    }
    Ok(from_json(&doc)?)
}

// ============================================================================
// v1 -> v2
// ============================================================================

#[derive(Serialize, Deserialize)]
struct ParamsV1 {
    signed_valsets_window: u64,
    signed_batches_window: u64,
    signed_logic_calls_window: u64,
    target_batch_timeout: u64,
    average_block_time: u64,
    attestation_threshold_percent: u64,
    valset_power_change_percent: u64,
    valset_min_power: u64,
    valset_interval_blocks: u64,
    max_batch_size: u32,
    ibc_forwards_per_block: u32,
    ibc_forward_timeout_seconds: u64,
    gravity_id: String,
    bridge_ethereum_address: EthAddress,
    bridge_chain_id: u64,
    average_ethereum_block_time: u64,
    bridge_active: bool,
    ethereum_blacklist: Vec<EthAddress>,
    inbound_fee_basis_points: u64,
}

#[derive(Serialize, Deserialize)]
struct GenesisV1 {
    schema_version: u32,
    params: ParamsV1,
    delegate_keys: Vec<DelegateKeys>,
    bonded_validators: Vec<BondedValidator>,
    last_unbonding_height: u64,
    ibc_channels: Vec<IbcChannel>,
    denom_metadata: Vec<DenomMetadata>,
    community_pool: Vec<Asset>,
    gravity_nonces: GravityNonces,
    last_observed_valset: Option<Valset>,
    valsets: Vec<Valset>,
    valset_confirms: Vec<ValsetConfirm>,
    batches: Vec<OutgoingTxBatch>,
    batch_confirms: Vec<BatchConfirm>,
    logic_calls: Vec<OutgoingLogicCall>,
    logic_call_confirms: Vec<LogicCallConfirm>,
    executed_logic_nonces: Vec<ExecutedLogicNonce>,
    attestations: Vec<Attestation>,
    #[serde(default, skip_serializing)]
    erc721_attestations: Vec<IgnoredAny>,
    validator_event_nonces: Vec<ValidatorEventNonce>,
    token_pairs: Vec<TokenPair>,
    unbatched_transfers: Vec<OutgoingTransferTx>,
    pending_ibc_auto_forwards: Vec<PendingIbcAutoForward>,
    monitored_erc20_tokens: Vec<EthAddress>,
}

#[derive(Serialize, Deserialize)]
struct EvmChainDataV2 {
    evm_chain: EvmChain,
    delegate_keys: Vec<DelegateKeys>,
    gravity_nonces: GravityNonces,
    last_observed_valset: Option<Valset>,
    valsets: Vec<Valset>,
    valset_confirms: Vec<ValsetConfirm>,
    batches: Vec<OutgoingTxBatch>,
    batch_confirms: Vec<BatchConfirm>,
    logic_calls: Vec<OutgoingLogicCall>,
    logic_call_confirms: Vec<LogicCallConfirm>,
    executed_logic_nonces: Vec<ExecutedLogicNonce>,
    attestations: Vec<Attestation>,
    validator_event_nonces: Vec<ValidatorEventNonce>,
    token_pairs: Vec<TokenPair>,
    unbatched_transfers: Vec<OutgoingTransferTx>,
    monitored_erc20_tokens: Vec<EthAddress>,
}

#[derive(Serialize, Deserialize)]
struct ChainForwardV2 {
    evm_chain_prefix: String,
    forward: PendingIbcAutoForward,
}

#[derive(Serialize, Deserialize)]
struct GenesisV2 {
    schema_version: u32,
    params: Params,
    bonded_validators: Vec<BondedValidator>,
    last_unbonding_height: u64,
    ibc_channels: Vec<IbcChannel>,
    denom_metadata: Vec<DenomMetadata>,
    community_pool: Vec<Asset>,
    evm_chains: Vec<EvmChainDataV2>,
    pending_ibc_auto_forwards: Vec<ChainForwardV2>,
}

fn v1_to_v2(raw: &[u8]) -> Result<Vec<u8>, ContractError> {
    let v1: GenesisV1 = from_json(raw)?;
    let p = v1.params;

    let chain_params = EvmChainParams {
        evm_chain_prefix: V1_CHAIN_PREFIX.to_string(),
        gravity_id: p.gravity_id,
        bridge_ethereum_address: p.bridge_ethereum_address,
        bridge_chain_id: p.bridge_chain_id,
        average_ethereum_block_time: p.average_ethereum_block_time,
        bridge_active: p.bridge_active,
        ethereum_blacklist: p.ethereum_blacklist,
        inbound_fee_basis_points: p.inbound_fee_basis_points,
    };
    let params = Params {
        signed_valsets_window: p.signed_valsets_window,
        signed_batches_window: p.signed_batches_window,
        signed_logic_calls_window: p.signed_logic_calls_window,
        target_batch_timeout: p.target_batch_timeout,
        average_block_time: p.average_block_time,
        attestation_threshold_percent: p.attestation_threshold_percent,
        valset_power_change_percent: p.valset_power_change_percent,
        valset_min_power: p.valset_min_power,
        valset_interval_blocks: p.valset_interval_blocks,
        max_batch_size: p.max_batch_size,
        ibc_forwards_per_block: p.ibc_forwards_per_block,
        ibc_forward_timeout_seconds: p.ibc_forward_timeout_seconds,
        evm_chain_params: vec![chain_params],
    };

    let chain = EvmChainDataV2 {
        evm_chain: EvmChain {
            evm_chain_prefix: V1_CHAIN_PREFIX.to_string(),
            evm_chain_name: V1_CHAIN_NAME.to_string(),
            evm_chain_net_version: p.bridge_chain_id,
        },
        delegate_keys: v1.delegate_keys,
        gravity_nonces: v1.gravity_nonces,
        last_observed_valset: v1.last_observed_valset,
        valsets: v1.valsets,
        valset_confirms: v1.valset_confirms,
        batches: v1.batches,
        batch_confirms: v1.batch_confirms,
        logic_calls: v1.logic_calls,
        logic_call_confirms: v1.logic_call_confirms,
        executed_logic_nonces: v1.executed_logic_nonces,
        attestations: v1.attestations,
        validator_event_nonces: v1.validator_event_nonces,
        token_pairs: v1.token_pairs,
        unbatched_transfers: v1.unbatched_transfers,
        monitored_erc20_tokens: v1.monitored_erc20_tokens,
    };
    let pending_ibc_auto_forwards = v1
        .pending_ibc_auto_forwards
        .into_iter()
        .map(|forward| ChainForwardV2 {
            evm_chain_prefix: V1_CHAIN_PREFIX.to_string(),
            forward,
        })
        .collect();

    let v2 = GenesisV2 {
        schema_version: 2,
        params,
        bonded_validators: v1.bonded_validators,
        last_unbonding_height: v1.last_unbonding_height,
        ibc_channels: v1.ibc_channels,
        denom_metadata: v1.denom_metadata,
        community_pool: v1.community_pool,
        evm_chains: vec![chain],
        pending_ibc_auto_forwards,
    };
    Ok(to_json_vec(&v2)?)
}

// ============================================================================
// v2 -> v3
// ============================================================================

fn v2_to_v3(raw: &[u8]) -> Result<Vec<u8>, ContractError> {
    let v2: GenesisV2 = from_json(raw)?;

    let mut delegate_keys: Vec<DelegateKeys> = vec![];
    for chain in &v2.evm_chains {
        for keys in &chain.delegate_keys {
            match delegate_keys.iter().find(|k| k.validator == keys.validator) {
                Some(existing) if existing == keys => {}
                Some(existing) => {
                    return Err(ContractError::DuplicateDelegateKey {
                        reason: format!(
                            "validator {} has keys ({}, {}) and ({}, {})",
                            keys.validator,
                            existing.orchestrator,
                            existing.eth_address,
                            keys.orchestrator,
                            keys.eth_address
                        ),
                    })
                }
                None => delegate_keys.push(keys.clone()),
            }
        }
    }
    delegate_keys.sort_by(|a, b| a.validator.cmp(&b.validator));

    let mut forwards = v2.pending_ibc_auto_forwards;
    let mut evm_chains = Vec::with_capacity(v2.evm_chains.len());
    for chain in v2.evm_chains {
        let prefix = chain.evm_chain.evm_chain_prefix.clone();
        let (mine, rest): (Vec<_>, Vec<_>) = forwards
            .into_iter()
            .partition(|f| f.evm_chain_prefix == prefix);
        forwards = rest;
        let mut pending_ibc_auto_forwards: Vec<_> = mine.into_iter().map(|f| f.forward).collect();
        pending_ibc_auto_forwards.sort_by_key(|f| f.event_nonce);

        evm_chains.push(EvmChainData {
            evm_chain: chain.evm_chain,
            gravity_nonces: chain.gravity_nonces,
            last_observed_valset: chain.last_observed_valset,
            valsets: chain.valsets,
            valset_confirms: chain.valset_confirms,
            batches: chain.batches,
            batch_confirms: chain.batch_confirms,
            logic_calls: chain.logic_calls,
            logic_call_confirms: chain.logic_call_confirms,
            executed_logic_nonces: chain.executed_logic_nonces,
            attestations: chain.attestations,
            validator_event_nonces: chain.validator_event_nonces,
            token_pairs: chain.token_pairs,
            unbatched_transfers: chain.unbatched_transfers,
            pending_ibc_auto_forwards,
            monitored_erc20_tokens: chain.monitored_erc20_tokens,
        });
    }
    if let Some(orphan) = forwards.first() {
        return Err(ContractError::EvmChainNotFound {
            prefix: orphan.evm_chain_prefix.clone(),
        });
    }

    let v3 = GenesisState {
        schema_version: 3,
        params: v2.params,
        delegate_keys,
        bonded_validators: v2.bonded_validators,
        last_unbonding_height: v2.last_unbonding_height,
        ibc_channels: v2.ibc_channels,
        denom_metadata: v2.denom_metadata,
        community_pool: v2.community_pool,
        evm_chains,
    };
    Ok(to_json_vec(&v3)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cosmwasm_std::{coin, to_json_binary};

    fn keys(validator: &str, orchestrator: &str, eth: u8) -> DelegateKeys {
        DelegateKeys {
            validator: validator.to_string(),
            orchestrator: orchestrator.to_string(),
            eth_address: EthAddress::from_bytes([eth; 20]),
        }
    }

    fn forward(nonce: u64) -> PendingIbcAutoForward {
        PendingIbcAutoForward {
            foreign_receiver: "osmo1receiver".to_string(),
            token: coin(10, "ugraviton"),
            ibc_channel: "channel-0".to_string(),
            event_nonce: nonce,
        }
    }

    fn empty_chain_v2(prefix: &str, net_version: u64) -> EvmChainDataV2 {
        EvmChainDataV2 {
            evm_chain: EvmChain {
                evm_chain_prefix: prefix.to_string(),
                evm_chain_name: prefix.to_uppercase(),
                evm_chain_net_version: net_version,
            },
            delegate_keys: vec![],
            gravity_nonces: GravityNonces::default(),
            last_observed_valset: None,
            valsets: vec![],
            valset_confirms: vec![],
            batches: vec![],
            batch_confirms: vec![],
            logic_calls: vec![],
            logic_call_confirms: vec![],
            executed_logic_nonces: vec![],
            attestations: vec![],
            validator_event_nonces: vec![],
            token_pairs: vec![],
            unbatched_transfers: vec![],
            monitored_erc20_tokens: vec![],
        }
    }

    fn genesis_v2(chains: Vec<EvmChainDataV2>, forwards: Vec<ChainForwardV2>) -> GenesisV2 {
        GenesisV2 {
            schema_version: 2,
            params: Params::default(),
            bonded_validators: vec![],
            last_unbonding_height: 0,
            ibc_channels: vec![],
            denom_metadata: vec![],
            community_pool: vec![],
            evm_chains: chains,
            pending_ibc_auto_forwards: forwards,
        }
    }

    #[test]
    fn test_v1_becomes_single_eth_chain() {
        let p = Params::default();
        let v1 = GenesisV1 {
            schema_version: 1,
            params: ParamsV1 {
                signed_valsets_window: p.signed_valsets_window,
                signed_batches_window: p.signed_batches_window,
                signed_logic_calls_window: p.signed_logic_calls_window,
                target_batch_timeout: p.target_batch_timeout,
                average_block_time: p.average_block_time,
                attestation_threshold_percent: p.attestation_threshold_percent,
                valset_power_change_percent: p.valset_power_change_percent,
                valset_min_power: p.valset_min_power,
                valset_interval_blocks: p.valset_interval_blocks,
                max_batch_size: p.max_batch_size,
                ibc_forwards_per_block: p.ibc_forwards_per_block,
                ibc_forward_timeout_seconds: p.ibc_forward_timeout_seconds,
                gravity_id: "gravity-test".to_string(),
                bridge_ethereum_address: EthAddress::from_bytes([0x11; 20]),
                bridge_chain_id: 1,
                average_ethereum_block_time: 15_000,
                bridge_active: true,
                ethereum_blacklist: vec![],
                inbound_fee_basis_points: 0,
            },
            delegate_keys: vec![keys("val1", "orch1", 1)],
            bonded_validators: vec![],
            last_unbonding_height: 7,
            ibc_channels: vec![],
            denom_metadata: vec![],
            community_pool: vec![],
            gravity_nonces: GravityNonces {
                last_observed_nonce: 4,
                ..Default::default()
            },
            last_observed_valset: None,
            valsets: vec![],
            valset_confirms: vec![],
            batches: vec![],
            batch_confirms: vec![],
            logic_calls: vec![],
            logic_call_confirms: vec![],
            executed_logic_nonces: vec![],
            attestations: vec![],
            erc721_attestations: vec![],
            validator_event_nonces: vec![],
            token_pairs: vec![],
            unbatched_transfers: vec![],
            pending_ibc_auto_forwards: vec![forward(3)],
            monitored_erc20_tokens: vec![],
        };
        // older exporters also wrote the ERC-721 track
        let raw = String::from_utf8(to_json_vec(&v1).unwrap())
            .unwrap()
            .replacen(
                r#""schema_version":1"#,
                r#""schema_version":1,"erc721_attestations":[{"event_nonce":2,"token_ids":["5"]}]"#,
                1,
            );

        let genesis = upgrade_genesis(raw.as_bytes()).unwrap();
        assert_eq!(genesis.schema_version, CURRENT_SCHEMA_VERSION);
        assert_eq!(genesis.last_unbonding_height, 7);
        assert_eq!(genesis.delegate_keys, vec![keys("val1", "orch1", 1)]);
        assert_eq!(genesis.evm_chains.len(), 1);

        let chain = &genesis.evm_chains[0];
        assert_eq!(chain.evm_chain.evm_chain_prefix, "eth");
        assert_eq!(chain.evm_chain.evm_chain_net_version, 1);
        assert_eq!(chain.gravity_nonces.last_observed_nonce, 4);
        assert_eq!(chain.pending_ibc_auto_forwards, vec![forward(3)]);

        let chain_params = genesis.params.chain("eth").unwrap();
        assert_eq!(chain_params.gravity_id, "gravity-test");
    }

    #[test]
    fn test_v2_delegate_keys_are_deduplicated() {
        let mut eth = empty_chain_v2("eth", 1);
        eth.delegate_keys = vec![keys("val1", "orch1", 1), keys("val2", "orch2", 2)];
        let mut bsc = empty_chain_v2("bsc", 56);
        bsc.delegate_keys = vec![keys("val1", "orch1", 1)];

        let raw = to_json_vec(&genesis_v2(vec![eth, bsc], vec![])).unwrap();
        let genesis = upgrade_genesis(&raw).unwrap();
        assert_eq!(
            genesis.delegate_keys,
            vec![keys("val1", "orch1", 1), keys("val2", "orch2", 2)]
        );
    }

    #[test]
    fn test_v2_conflicting_delegate_keys_fail() {
        let mut eth = empty_chain_v2("eth", 1);
        eth.delegate_keys = vec![keys("val1", "orch1", 1)];
        let mut bsc = empty_chain_v2("bsc", 56);
        bsc.delegate_keys = vec![keys("val1", "orch9", 9)];

        let raw = to_json_vec(&genesis_v2(vec![eth, bsc], vec![])).unwrap();
        let err = upgrade_genesis(&raw).unwrap_err();
        assert!(matches!(err, ContractError::DuplicateDelegateKey { .. }));
    }

    #[test]
    fn test_v2_forwards_are_split_per_chain() {
        let chains = vec![empty_chain_v2("eth", 1), empty_chain_v2("bsc", 56)];
        let forwards = vec![
            ChainForwardV2 {
                evm_chain_prefix: "bsc".to_string(),
                forward: forward(9),
            },
            ChainForwardV2 {
                evm_chain_prefix: "eth".to_string(),
                forward: forward(5),
            },
            ChainForwardV2 {
                evm_chain_prefix: "bsc".to_string(),
                forward: forward(2),
            },
        ];
        let raw = to_json_vec(&genesis_v2(chains, forwards)).unwrap();
        let genesis = upgrade_genesis(&raw).unwrap();

        assert_eq!(genesis.evm_chains[0].pending_ibc_auto_forwards, vec![forward(5)]);
        assert_eq!(
            genesis.evm_chains[1].pending_ibc_auto_forwards,
            vec![forward(2), forward(9)]
        );

        let orphan = vec![ChainForwardV2 {
            evm_chain_prefix: "polygon".to_string(),
            forward: forward(1),
        }];
        let raw = to_json_vec(&genesis_v2(vec![empty_chain_v2("eth", 1)], orphan)).unwrap();
        let err = upgrade_genesis(&raw).unwrap_err();
        assert!(matches!(err, ContractError::EvmChainNotFound { .. }));
    }

    #[test]
    fn test_unknown_versions_are_rejected() {
        for version in [0u32, 4, 99] {
            let raw = format!(r#"{{"schema_version":{}}}"#, version);
            let err = upgrade_genesis(raw.as_bytes()).unwrap_err();
            assert_eq!(err, ContractError::UnsupportedSchema { version });
        }
        // current documents pass straight through
        let current = GenesisState {
            schema_version: CURRENT_SCHEMA_VERSION,
            params: Params::default(),
            delegate_keys: vec![],
            bonded_validators: vec![],
            last_unbonding_height: 0,
            ibc_channels: vec![],
            denom_metadata: vec![],
            community_pool: vec![],
            evm_chains: vec![],
        };
        let raw = to_json_binary(&current).unwrap();
        assert_eq!(upgrade_genesis(raw.as_slice()).unwrap(), current);
    }
}
