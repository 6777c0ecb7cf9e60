//! EVM chain registry
//!
//! Chains are added and removed only through governance. Removal sweeps
//! every per-chain store; it runs inside a single message, so a partially
//! removed chain is never observable.

use cosmwasm_std::{Addr, Order, StdResult, Storage};

use crate::error::ContractError;
use crate::state::{
    EvmChain, EvmChainParams, Params, ACTIVE_BATCH_BY_TOKEN, ASSET_TO_ERC20, ATTESTATIONS,
    BATCHES, BATCH_CONFIRMS, ERC20_TO_ASSET, EVM_CHAINS, LAST_BATCH_ID,
    LAST_EVENT_NONCE_BY_VALIDATOR, LAST_EXECUTED_LOGIC_NONCE, LAST_OBSERVED_EVENT_NONCE,
    LAST_OBSERVED_EVM_HEIGHT, LAST_OBSERVED_VALSET, LAST_SLASHED_BATCH_BLOCK,
    LAST_SLASHED_LOGIC_CALL_BLOCK, LAST_SLASHED_VALSET_NONCE, LAST_TX_POOL_ID,
    LATEST_VALSET_NONCE, LOGIC_CALLS, LOGIC_CALL_CONFIRMS, MONITORED_ERC20_TOKENS,
    PENDING_IBC_AUTO_FORWARDS, UNBATCHED_BY_FEE, UNBATCHED_TXS, VALSETS, VALSET_CONFIRMS,
};

/// Load a registered chain or fail with `EvmChainNotFound`
pub fn ensure_chain(storage: &dyn Storage, prefix: &str) -> Result<EvmChain, ContractError> {
    EVM_CHAINS
        .may_load(storage, prefix)?
        .ok_or_else(|| ContractError::EvmChainNotFound {
            prefix: prefix.to_string(),
        })
}

/// Parameters of a registered chain
pub fn chain_params<'a>(
    params: &'a Params,
    prefix: &str,
) -> Result<&'a EvmChainParams, ContractError> {
    params
        .chain(prefix)
        .ok_or_else(|| ContractError::EvmChainNotFound {
            prefix: prefix.to_string(),
        })
}

/// All registered prefixes in storage order
pub fn chain_prefixes(storage: &dyn Storage) -> StdResult<Vec<String>> {
    EVM_CHAINS
        .keys(storage, None, None, Order::Ascending)
        .collect()
}

/// Register a chain with zeroed nonce state
pub fn init_chain(storage: &mut dyn Storage, chain: &EvmChain) -> StdResult<()> {
    let prefix = chain.evm_chain_prefix.as_str();
    EVM_CHAINS.save(storage, prefix, chain)?;
    LAST_OBSERVED_EVENT_NONCE.save(storage, prefix, &0)?;
    LATEST_VALSET_NONCE.save(storage, prefix, &0)?;
    LAST_TX_POOL_ID.save(storage, prefix, &0)?;
    LAST_BATCH_ID.save(storage, prefix, &0)?;
    LAST_SLASHED_VALSET_NONCE.save(storage, prefix, &0)?;
    LAST_SLASHED_BATCH_BLOCK.save(storage, prefix, &0)?;
    LAST_SLASHED_LOGIC_CALL_BLOCK.save(storage, prefix, &0)?;
    LAST_OBSERVED_EVM_HEIGHT.save(storage, prefix, &Default::default())?;
    Ok(())
}

/// Delete every record keyed by `prefix`
pub fn remove_chain_state(storage: &mut dyn Storage, prefix: &str) -> StdResult<()> {
    EVM_CHAINS.remove(storage, prefix);

    // scalar trackers
    LAST_OBSERVED_EVENT_NONCE.remove(storage, prefix);
    LAST_OBSERVED_EVM_HEIGHT.remove(storage, prefix);
    LAST_OBSERVED_VALSET.remove(storage, prefix);
    LATEST_VALSET_NONCE.remove(storage, prefix);
    LAST_TX_POOL_ID.remove(storage, prefix);
    LAST_BATCH_ID.remove(storage, prefix);
    LAST_SLASHED_VALSET_NONCE.remove(storage, prefix);
    LAST_SLASHED_BATCH_BLOCK.remove(storage, prefix);
    LAST_SLASHED_LOGIC_CALL_BLOCK.remove(storage, prefix);
    MONITORED_ERC20_TOKENS.remove(storage, prefix);

    // (chain, validator)
    let validators: Vec<Addr> = LAST_EVENT_NONCE_BY_VALIDATOR
        .prefix(prefix)
        .keys(storage, None, None, Order::Ascending)
        .collect::<StdResult<_>>()?;
    for validator in validators {
        LAST_EVENT_NONCE_BY_VALIDATOR.remove(storage, (prefix, &validator));
    }

    // (chain, nonce, claim hash)
    let attestations: Vec<(u64, Vec<u8>)> = ATTESTATIONS
        .sub_prefix(prefix)
        .keys(storage, None, None, Order::Ascending)
        .collect::<StdResult<_>>()?;
    for (nonce, hash) in attestations {
        ATTESTATIONS.remove(storage, (prefix, nonce, &hash));
    }

    // valsets and their confirms
    let valsets: Vec<u64> = VALSETS
        .prefix(prefix)
        .keys(storage, None, None, Order::Ascending)
        .collect::<StdResult<_>>()?;
    for nonce in valsets {
        VALSETS.remove(storage, (prefix, nonce));
    }
    let valset_confirms: Vec<(u64, Addr)> = VALSET_CONFIRMS
        .sub_prefix(prefix)
        .keys(storage, None, None, Order::Ascending)
        .collect::<StdResult<_>>()?;
    for (nonce, orchestrator) in valset_confirms {
        VALSET_CONFIRMS.remove(storage, (prefix, nonce, &orchestrator));
    }

    // transfer pool
    let txs: Vec<u64> = UNBATCHED_TXS
        .prefix(prefix)
        .keys(storage, None, None, Order::Ascending)
        .collect::<StdResult<_>>()?;
    for id in txs {
        UNBATCHED_TXS.remove(storage, (prefix, id));
    }
    let fee_index: Vec<(String, Vec<u8>)> = UNBATCHED_BY_FEE
        .sub_prefix(prefix)
        .keys(storage, None, None, Order::Ascending)
        .collect::<StdResult<_>>()?;
    for (token, key) in fee_index {
        UNBATCHED_BY_FEE.remove(storage, (prefix, &token, &key));
    }

    // batches
    let batches: Vec<u64> = BATCHES
        .prefix(prefix)
        .keys(storage, None, None, Order::Ascending)
        .collect::<StdResult<_>>()?;
    for nonce in batches {
        BATCHES.remove(storage, (prefix, nonce));
    }
    let active: Vec<String> = ACTIVE_BATCH_BY_TOKEN
        .prefix(prefix)
        .keys(storage, None, None, Order::Ascending)
        .collect::<StdResult<_>>()?;
    for token in active {
        ACTIVE_BATCH_BY_TOKEN.remove(storage, (prefix, &token));
    }
    let batch_confirms: Vec<(u64, Addr)> = BATCH_CONFIRMS
        .sub_prefix(prefix)
        .keys(storage, None, None, Order::Ascending)
        .collect::<StdResult<_>>()?;
    for (nonce, orchestrator) in batch_confirms {
        BATCH_CONFIRMS.remove(storage, (prefix, nonce, &orchestrator));
    }

    // logic calls
    let calls: Vec<(Vec<u8>, u64)> = LOGIC_CALLS
        .sub_prefix(prefix)
        .keys(storage, None, None, Order::Ascending)
        .collect::<StdResult<_>>()?;
    for (id, nonce) in calls {
        LOGIC_CALLS.remove(storage, (prefix, &id, nonce));
    }
    let call_confirms: Vec<(Vec<u8>, Addr)> = LOGIC_CALL_CONFIRMS
        .sub_prefix(prefix)
        .keys(storage, None, None, Order::Ascending)
        .collect::<StdResult<_>>()?;
    for (key, orchestrator) in call_confirms {
        LOGIC_CALL_CONFIRMS.remove(storage, (prefix, &key, &orchestrator));
    }
    let executed: Vec<Vec<u8>> = LAST_EXECUTED_LOGIC_NONCE
        .prefix(prefix)
        .keys(storage, None, None, Order::Ascending)
        .collect::<StdResult<_>>()?;
    for id in executed {
        LAST_EXECUTED_LOGIC_NONCE.remove(storage, (prefix, &id));
    }

    // token pairs
    let erc20s: Vec<String> = ERC20_TO_ASSET
        .prefix(prefix)
        .keys(storage, None, None, Order::Ascending)
        .collect::<StdResult<_>>()?;
    for erc20 in erc20s {
        ERC20_TO_ASSET.remove(storage, (prefix, &erc20));
    }
    let assets: Vec<String> = ASSET_TO_ERC20
        .prefix(prefix)
        .keys(storage, None, None, Order::Ascending)
        .collect::<StdResult<_>>()?;
    for asset in assets {
        ASSET_TO_ERC20.remove(storage, (prefix, &asset));
    }

    // pending forwards
    let forwards: Vec<u64> = PENDING_IBC_AUTO_FORWARDS
        .prefix(prefix)
        .keys(storage, None, None, Order::Ascending)
        .collect::<StdResult<_>>()?;
    for nonce in forwards {
        PENDING_IBC_AUTO_FORWARDS.remove(storage, (prefix, nonce));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{LastObservedEvmHeight, Valset};
    use cosmwasm_std::testing::mock_dependencies;

    fn chain(prefix: &str) -> EvmChain {
        EvmChain {
            evm_chain_prefix: prefix.to_string(),
            evm_chain_name: prefix.to_uppercase(),
            evm_chain_net_version: prefix.len() as u64,
        }
    }

    #[test]
    fn test_remove_leaves_other_chains() {
        let mut deps = mock_dependencies();
        let storage = deps.as_mut().storage;
        init_chain(storage, &chain("eth")).unwrap();
        init_chain(storage, &chain("bsc")).unwrap();

        for prefix in ["eth", "bsc"] {
            LAST_OBSERVED_EVENT_NONCE.save(storage, prefix, &5).unwrap();
            LAST_OBSERVED_EVM_HEIGHT
                .save(
                    storage,
                    prefix,
                    &LastObservedEvmHeight {
                        evm_block_height: 10,
                        cosmos_block_height: 2,
                    },
                )
                .unwrap();
            VALSETS
                .save(
                    storage,
                    (prefix, 1),
                    &Valset {
                        nonce: 1,
                        members: vec![],
                        height: 1,
                    },
                )
                .unwrap();
            LAST_EVENT_NONCE_BY_VALIDATOR
                .save(storage, (prefix, &Addr::unchecked("val")), &5)
                .unwrap();
        }

        remove_chain_state(storage, "eth").unwrap();

        assert!(ensure_chain(storage, "eth").is_err());
        assert!(LAST_OBSERVED_EVENT_NONCE.may_load(storage, "eth").unwrap().is_none());
        assert!(VALSETS.may_load(storage, ("eth", 1)).unwrap().is_none());
        assert!(LAST_EVENT_NONCE_BY_VALIDATOR
            .may_load(storage, ("eth", &Addr::unchecked("val")))
            .unwrap()
            .is_none());

        assert_eq!(LAST_OBSERVED_EVENT_NONCE.load(storage, "bsc").unwrap(), 5);
        assert!(VALSETS.has(storage, ("bsc", 1)));
        assert_eq!(chain_prefixes(storage).unwrap(), vec!["bsc".to_string()]);
    }
}
