//! Genesis export and import through the contract entry points.

mod suite;

use cosmwasm_std::{coin, to_json_binary, Addr, Binary};
use cw_multi_test::Executor;
use gravity::genesis::GenesisState;
use gravity::hash::batch_checkpoint;
use gravity::msg::{BatchResponse, ConfigResponse, ExecuteMsg, InstantiateMsg, QueryMsg};
use gravity::state::{DelegateKeys, Params};
use gravity::ContractError;

use suite::*;

fn instantiate_with(
    suite: &mut Suite,
    params: Option<Params>,
    genesis: Option<Binary>,
) -> AnyResult<Addr> {
    let code_id = suite.app.store_code(contract_gravity());
    suite.app.instantiate_contract(
        code_id,
        Addr::unchecked(AUTHORITY),
        &InstantiateMsg {
            authority: AUTHORITY.to_string(),
            fee_collector: FEE_COLLECTOR.to_string(),
            native_prefix: NATIVE_PREFIX.to_string(),
            params,
            genesis,
        },
        &[],
        "gravity-imported",
        Some(AUTHORITY.to_string()),
    )
}

fn export(suite: &Suite, contract: &Addr) -> GenesisState {
    suite
        .app
        .wrap()
        .query_wasm_smart(contract.clone(), &QueryMsg::ExportGenesis {})
        .unwrap()
}

/// A bridge with state on both chains: token pairs, observed and pending
/// attestations, a signed batch, unbatched transfers, valsets, an IBC
/// route with a pending forward and a community pool balance.
fn populated_suite() -> Suite {
    let mut suite = setup(&[40, 35, 25]);
    suite
        .execute(
            AUTHORITY,
            &ExecuteMsg::SetIbcChannelForPrefix {
                prefix: "osmo".to_string(),
                channel: Some("channel-0".to_string()),
            },
        )
        .unwrap();
    suite.deploy_ugraviton("eth", 1, ETH_UGRAVITON);
    suite.deploy_ugraviton("bsc", 1, BSC_UGRAVITON);
    suite.fund_custody(1_000);
    suite.observe(
        "eth",
        send_to_cosmos(2, ETH_UGRAVITON, 1_000, &bech32_address("osmo", &[3u8; 20])),
    );
    // unobserved vote
    suite
        .submit(0, "bsc", send_to_cosmos(2, BSC_UGRAVITON, 10, "receiver"))
        .unwrap();

    for (amount, fee) in [(100u128, 5u128), (200, 10), (300, 1)] {
        suite
            .execute_with_funds(
                USER,
                &ExecuteMsg::SendToEth {
                    evm_chain_prefix: "eth".to_string(),
                    eth_dest: ETH_DEST.to_string(),
                    amount: coin(amount, DENOM),
                    bridge_fee: coin(fee, DENOM),
                },
                amount + fee,
            )
            .unwrap();
    }
    suite
        .execute(
            USER,
            &ExecuteMsg::RequestBatch {
                evm_chain_prefix: "eth".to_string(),
                token_contract: ETH_UGRAVITON.to_string(),
            },
        )
        .unwrap();
    let batch = suite
        .query::<BatchResponse>(&QueryMsg::ActiveBatch {
            evm_chain_prefix: "eth".to_string(),
            token_contract: ETH_UGRAVITON.to_string(),
        })
        .batch
        .unwrap();
    let orch = &suite.orchestrators[1];
    let confirm = ExecuteMsg::ConfirmBatch {
        evm_chain_prefix: "eth".to_string(),
        nonce: batch.batch_nonce,
        token_contract: ETH_UGRAVITON.to_string(),
        eth_signer: orch.eth_address.to_string(),
        signature: orch.sign(&batch_checkpoint(&gravity_id("eth"), &batch)),
    };
    let sender = orch.orchestrator.to_string();
    suite.execute(&sender, &confirm).unwrap();

    // left in the pool
    suite
        .execute_with_funds(
            USER,
            &ExecuteMsg::SendToEth {
                evm_chain_prefix: "eth".to_string(),
                eth_dest: ETH_DEST.to_string(),
                amount: coin(50, DENOM),
                bridge_fee: coin(2, DENOM),
            },
            52,
        )
        .unwrap();

    suite
        .execute_with_funds(USER, &ExecuteMsg::FundCommunityPool {}, 77)
        .unwrap();
    suite.end_block().unwrap();
    suite
}

#[test]
fn test_export_import_round_trip() {
    let mut suite = populated_suite();
    let original = suite.gravity.clone();
    let exported = export(&suite, &original);

    assert_eq!(exported.evm_chains.len(), 2);
    let eth = exported
        .evm_chains
        .iter()
        .find(|c| c.evm_chain.evm_chain_prefix == "eth")
        .unwrap();
    assert_eq!(eth.gravity_nonces.last_observed_nonce, 2);
    assert_eq!(eth.batches.len(), 1);
    assert_eq!(eth.batch_confirms.len(), 1);
    assert_eq!(eth.unbatched_transfers.len(), 1);
    assert_eq!(eth.pending_ibc_auto_forwards.len(), 1);
    assert!(!eth.valsets.is_empty());

    let imported = instantiate_with(&mut suite, None, Some(to_json_binary(&exported).unwrap()))
        .unwrap();
    assert_eq!(export(&suite, &imported), exported);

    let config: ConfigResponse = suite
        .app
        .wrap()
        .query_wasm_smart(imported, &QueryMsg::Config {})
        .unwrap();
    assert_eq!(config.schema_version, exported.schema_version);
}

#[test]
fn test_import_rejects_duplicate_delegate_keys() {
    let mut suite = populated_suite();
    let mut exported = export(&suite, &suite.gravity.clone());

    let taken = exported.delegate_keys[0].clone();
    exported.delegate_keys.push(DelegateKeys {
        validator: "val9".to_string(),
        orchestrator: "orch9".to_string(),
        eth_address: taken.eth_address,
    });

    let err = instantiate_with(&mut suite, None, Some(to_json_binary(&exported).unwrap()))
        .unwrap_err()
        .root_cause()
        .to_string();
    assert!(err.starts_with("Duplicate delegate key"));
}

#[test]
fn test_import_rejects_unknown_schema_and_params() {
    let mut suite = populated_suite();
    let mut exported = export(&suite, &suite.gravity.clone());
    let genesis = to_json_binary(&exported).unwrap();

    let err = instantiate_with(&mut suite, Some(Params::default()), Some(genesis))
        .unwrap_err()
        .root_cause()
        .to_string();
    assert!(err.starts_with("Invalid params"));

    exported.schema_version = 99;
    let err = instantiate_with(&mut suite, None, Some(to_json_binary(&exported).unwrap()))
        .unwrap_err()
        .root_cause()
        .to_string();
    assert_eq!(err, ContractError::UnsupportedSchema { version: 99 }.to_string());
}
