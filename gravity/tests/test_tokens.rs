//! EVM-originated tokens: cw20 representations minted on deposit, escrowed
//! by the pool and burned when their batch executes.

mod suite;

use cosmwasm_std::{to_json_binary, Addr, Uint128};
use cw20::{BalanceResponse, Cw20ExecuteMsg, Cw20QueryMsg, MinterResponse, TokenInfoResponse};
use cw_multi_test::Executor;
use gravity::msg::{
    BatchResponse, CommunityPoolResponse, ExecuteMsg, PendingSendToEthResponse, QueryMsg,
    ReceiveMsg, TokenPairResponse,
};
use gravity::ContractError;

use common::AssetInfo;
use suite::*;

const ETH_USDC: &str = "0x3333333333333333333333333333333333333333";

fn setup_with_cw20() -> (Suite, Addr) {
    let mut suite = setup(&[40, 35, 25]);
    let code_id = suite.app.store_code(contract_cw20());
    let usdc = suite
        .app
        .instantiate_contract(
            code_id,
            Addr::unchecked(AUTHORITY),
            &cw20_base::msg::InstantiateMsg {
                name: "Gravity Bridged USDC".to_string(),
                symbol: "gUSDC".to_string(),
                decimals: 6,
                initial_balances: vec![],
                mint: Some(MinterResponse {
                    minter: suite.gravity.to_string(),
                    cap: None,
                }),
                marketing: None,
            },
            &[],
            "gusdc",
            None,
        )
        .unwrap();

    suite
        .execute(
            AUTHORITY,
            &ExecuteMsg::RegisterEthOriginatedToken {
                evm_chain_prefix: "eth".to_string(),
                token_contract: ETH_USDC.to_string(),
                cw20_contract: usdc.to_string(),
            },
        )
        .unwrap();
    (suite, usdc)
}

fn cw20_balance(suite: &Suite, token: &Addr, address: &str) -> u128 {
    let res: BalanceResponse = suite
        .app
        .wrap()
        .query_wasm_smart(
            token.clone(),
            &Cw20QueryMsg::Balance {
                address: address.to_string(),
            },
        )
        .unwrap();
    res.balance.u128()
}

fn total_supply(suite: &Suite, token: &Addr) -> u128 {
    let res: TokenInfoResponse = suite
        .app
        .wrap()
        .query_wasm_smart(token.clone(), &Cw20QueryMsg::TokenInfo {})
        .unwrap();
    res.total_supply.u128()
}

fn send_cw20(
    suite: &mut Suite,
    token: &Addr,
    sender: &str,
    amount: u128,
    msg: &ReceiveMsg,
) -> AnyResult<cw_multi_test::AppResponse> {
    suite.app.execute_contract(
        Addr::unchecked(sender),
        token.clone(),
        &Cw20ExecuteMsg::Send {
            contract: suite.gravity.to_string(),
            amount: Uint128::new(amount),
            msg: to_json_binary(msg).unwrap(),
        },
        &[],
    )
}

#[test]
fn test_register_requires_authority() {
    let (mut suite, usdc) = setup_with_cw20();

    let err = error_string(suite.execute(
        USER,
        &ExecuteMsg::RegisterEthOriginatedToken {
            evm_chain_prefix: "bsc".to_string(),
            token_contract: ETH_USDC.to_string(),
            cw20_contract: usdc.to_string(),
        },
    ));
    assert_eq!(err, ContractError::Unauthorized.to_string());

    let pair: TokenPairResponse = suite.query(&QueryMsg::AssetToErc20 {
        evm_chain_prefix: "eth".to_string(),
        asset: AssetInfo::cw20(usdc.clone()),
    });
    assert_eq!(pair.pair.unwrap().erc20.as_str(), ETH_USDC);

    // a second ERC20 cannot claim the same cw20
    let err = error_string(suite.execute(
        AUTHORITY,
        &ExecuteMsg::RegisterEthOriginatedToken {
            evm_chain_prefix: "eth".to_string(),
            token_contract: ETH_UGRAVITON.to_string(),
            cw20_contract: usdc.to_string(),
        },
    ));
    assert!(err.starts_with("Invalid claim"));
}

#[test]
fn test_deposit_mints_and_batch_burns() {
    let (mut suite, usdc) = setup_with_cw20();

    suite.observe("eth", send_to_cosmos(1, ETH_USDC, 1_000, "receiver"));
    assert_eq!(cw20_balance(&suite, &usdc, "receiver"), 990);
    assert_eq!(cw20_balance(&suite, &usdc, FEE_COLLECTOR), 10);

    let send = ReceiveMsg::SendToEth {
        evm_chain_prefix: "eth".to_string(),
        eth_dest: ETH_DEST.to_string(),
        bridge_fee: Uint128::new(10),
    };
    let err = error_string(send_cw20(&mut suite, &usdc, "receiver", 5, &send));
    assert!(err.starts_with("Invalid amount"));

    send_cw20(&mut suite, &usdc, "receiver", 500, &send).unwrap();
    assert_eq!(cw20_balance(&suite, &usdc, suite.gravity.as_str()), 500);

    let pending: PendingSendToEthResponse = suite.query(&QueryMsg::PendingSendToEth {
        evm_chain_prefix: "eth".to_string(),
        sender: "receiver".to_string(),
    });
    let tx = &pending.unbatched_transfers[0];
    assert_eq!(tx.erc20_token.amount, Uint128::new(490));
    assert_eq!(tx.erc20_fee.amount, Uint128::new(10));
    assert_eq!(tx.erc20_token.contract.as_str(), ETH_USDC);

    suite
        .execute(
            USER,
            &ExecuteMsg::RequestBatch {
                evm_chain_prefix: "eth".to_string(),
                token_contract: ETH_USDC.to_string(),
            },
        )
        .unwrap();
    let batch = suite
        .query::<BatchResponse>(&QueryMsg::ActiveBatch {
            evm_chain_prefix: "eth".to_string(),
            token_contract: ETH_USDC.to_string(),
        })
        .batch
        .unwrap();

    suite.observe("eth", batch_executed(2, batch.batch_nonce, ETH_USDC));
    assert_eq!(cw20_balance(&suite, &usdc, suite.gravity.as_str()), 0);
    assert_eq!(total_supply(&suite, &usdc), 500);
}

#[test]
fn test_cw20_community_pool_funding() {
    let (mut suite, usdc) = setup_with_cw20();
    suite.observe("eth", send_to_cosmos(1, ETH_USDC, 1_000, "receiver"));

    send_cw20(&mut suite, &usdc, "receiver", 300, &ReceiveMsg::FundCommunityPool {}).unwrap();

    let pool: CommunityPoolResponse = suite.query(&QueryMsg::CommunityPool {});
    assert_eq!(pool.balances.len(), 1);
    assert_eq!(pool.balances[0].info, AssetInfo::cw20(usdc.clone()));
    assert_eq!(pool.balances[0].amount, Uint128::new(300));
}

#[test]
fn test_blacklisted_sender_funds_community_pool() {
    let (mut suite, usdc) = setup_with_cw20();
    let mut params: gravity::state::Params = suite.query(&QueryMsg::Params {});
    params
        .chain_mut("eth")
        .unwrap()
        .ethereum_blacklist
        .push(common::EthAddress::parse(ETH_SENDER).unwrap());
    suite
        .execute(AUTHORITY, &ExecuteMsg::UpdateParams { params })
        .unwrap();

    suite.observe("eth", send_to_cosmos(1, ETH_USDC, 1_000, "receiver"));
    assert_eq!(cw20_balance(&suite, &usdc, "receiver"), 0);
    // the whole deposit, minted to the bridge
    assert_eq!(cw20_balance(&suite, &usdc, suite.gravity.as_str()), 1_000);

    let pool: CommunityPoolResponse = suite.query(&QueryMsg::CommunityPool {});
    assert_eq!(pool.balances[0].amount, Uint128::new(1_000));
}
