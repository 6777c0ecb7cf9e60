//! Outgoing transfer pool handlers (SendToEth, Receive and CancelSendToEth).
//!
//! Tokens sent to an EVM chain are held by this contract until the batch
//! carrying them is observed executed (cw20 tokens are then burned) or the
//! sender cancels the transfer while it is still unbatched.

use cosmwasm_std::{
    from_json, Addr, Coin, DepsMut, Env, MessageInfo, Order, Response, StdError, StdResult,
    Storage, Uint128,
};
use cw20::Cw20ReceiveMsg;

use common::{AssetInfo, EthAddress};

use crate::error::ContractError;
use crate::execute::community_pool::execute_fund_community_pool_cw20;
use crate::msg::ReceiveMsg;
use crate::nonces::next_id;
use crate::registry::{chain_params, ensure_chain};
use crate::state::{
    fee_index_key, Erc20Token, OutgoingTransferTx, ASSET_TO_ERC20, ERC20_TO_ASSET,
    LAST_TX_POOL_ID, PARAMS, UNBATCHED_BY_FEE, UNBATCHED_TXS,
};

// ============================================================================
// SendToEth — Native Tokens
// ============================================================================

/// Queue a transfer of native tokens to an EVM chain.
pub fn execute_send_to_eth(
    deps: DepsMut,
    _env: Env,
    info: MessageInfo,
    evm_chain_prefix: String,
    eth_dest: String,
    amount: Coin,
    bridge_fee: Coin,
) -> Result<Response, ContractError> {
    if bridge_fee.denom != amount.denom {
        return Err(ContractError::InvalidAmount {
            reason: format!(
                "bridge fee denom {} does not match transfer denom {}",
                bridge_fee.denom, amount.denom
            ),
        });
    }

    // The attached funds must cover exactly amount + fee
    let expected = amount
        .amount
        .checked_add(bridge_fee.amount)
        .map_err(StdError::from)?;
    let matches = info.funds.len() == 1
        && info.funds[0].denom == amount.denom
        && info.funds[0].amount == expected;
    if !matches {
        let got: Vec<String> = info.funds.iter().map(|c| c.to_string()).collect();
        return Err(ContractError::FundsMismatch {
            expected: format!("{}{}", expected, amount.denom),
            got: got.join(","),
        });
    }

    let asset = AssetInfo::native(&amount.denom);
    let tx = add_to_pool(
        deps.storage,
        &evm_chain_prefix,
        info.sender,
        &asset,
        &eth_dest,
        amount.amount,
        bridge_fee.amount,
    )?;

    Ok(pool_response(&evm_chain_prefix, &tx))
}

// ============================================================================
// Receive — CW20 Tokens
// ============================================================================

/// CW20 receive hook
pub fn execute_receive(
    deps: DepsMut,
    _env: Env,
    info: MessageInfo,
    wrapper: Cw20ReceiveMsg,
) -> Result<Response, ContractError> {
    let token = AssetInfo::cw20(info.sender);
    let msg: ReceiveMsg = from_json(&wrapper.msg)?;

    match msg {
        ReceiveMsg::SendToEth {
            evm_chain_prefix,
            eth_dest,
            bridge_fee,
        } => {
            let sender = deps.api.addr_validate(&wrapper.sender)?;
            let amount = wrapper.amount.checked_sub(bridge_fee).map_err(|_| {
                ContractError::InvalidAmount {
                    reason: format!(
                        "bridge fee {} exceeds sent amount {}",
                        bridge_fee, wrapper.amount
                    ),
                }
            })?;

            let tx = add_to_pool(
                deps.storage,
                &evm_chain_prefix,
                sender,
                &token,
                &eth_dest,
                amount,
                bridge_fee,
            )?;

            Ok(pool_response(&evm_chain_prefix, &tx))
        }
        ReceiveMsg::FundCommunityPool {} => {
            execute_fund_community_pool_cw20(deps, token, wrapper.sender, wrapper.amount)
        }
    }
}

fn pool_response(evm_chain_prefix: &str, tx: &OutgoingTransferTx) -> Response {
    Response::new()
        .add_attribute("action", "send_to_eth")
        .add_attribute("evm_chain_prefix", evm_chain_prefix)
        .add_attribute("transaction_id", tx.id.to_string())
        .add_attribute("sender", tx.sender.as_str())
        .add_attribute("eth_dest", tx.dest_address.as_str())
        .add_attribute("token_contract", tx.erc20_token.contract.as_str())
        .add_attribute("amount", tx.erc20_token.amount.to_string())
        .add_attribute("bridge_fee", tx.erc20_fee.amount.to_string())
}

/// Validate a transfer and insert it into the chain's pool under a fresh id.
pub fn add_to_pool(
    storage: &mut dyn Storage,
    evm_chain_prefix: &str,
    sender: Addr,
    asset: &AssetInfo,
    eth_dest: &str,
    amount: Uint128,
    fee: Uint128,
) -> Result<OutgoingTransferTx, ContractError> {
    ensure_chain(storage, evm_chain_prefix)?;
    let params = PARAMS.load(storage)?;
    let chain = chain_params(&params, evm_chain_prefix)?;
    if !chain.bridge_active {
        return Err(ContractError::BridgeInactive {
            prefix: evm_chain_prefix.to_string(),
        });
    }

    if amount.is_zero() {
        return Err(ContractError::InvalidAmount {
            reason: "Amount must be greater than zero".to_string(),
        });
    }
    if fee.is_zero() {
        return Err(ContractError::InvalidAmount {
            reason: "Bridge fee must be greater than zero".to_string(),
        });
    }

    let token_contract = ASSET_TO_ERC20
        .may_load(storage, (evm_chain_prefix, &asset.key()))?
        .ok_or_else(|| ContractError::TokenNotSupported {
            token: asset.key(),
        })?;

    let dest_address = EthAddress::parse(eth_dest).map_err(|e| ContractError::InvalidAddress {
        reason: e.to_string(),
    })?;
    if chain.is_blacklisted(&dest_address) {
        return Err(ContractError::Blacklisted {
            address: dest_address.to_string(),
        });
    }

    let id = next_id(storage, LAST_TX_POOL_ID, evm_chain_prefix)?;
    let tx = OutgoingTransferTx {
        id,
        sender,
        dest_address,
        erc20_token: Erc20Token {
            contract: token_contract.clone(),
            amount,
        },
        erc20_fee: Erc20Token {
            contract: token_contract,
            amount: fee,
        },
    };
    insert_unbatched(storage, evm_chain_prefix, &tx)?;
    Ok(tx)
}

/// Store a transfer in the pool and its fee index
pub fn insert_unbatched(
    storage: &mut dyn Storage,
    evm_chain_prefix: &str,
    tx: &OutgoingTransferTx,
) -> StdResult<()> {
    UNBATCHED_TXS.save(storage, (evm_chain_prefix, tx.id), tx)?;
    UNBATCHED_BY_FEE.save(
        storage,
        (
            evm_chain_prefix,
            tx.erc20_token.contract.as_str(),
            &fee_index_key(tx.erc20_fee.amount, tx.id),
        ),
        &tx.id,
    )
}

/// Remove a transfer from the pool and its fee index
pub fn remove_unbatched(storage: &mut dyn Storage, evm_chain_prefix: &str, tx: &OutgoingTransferTx) {
    UNBATCHED_TXS.remove(storage, (evm_chain_prefix, tx.id));
    UNBATCHED_BY_FEE.remove(
        storage,
        (
            evm_chain_prefix,
            tx.erc20_token.contract.as_str(),
            &fee_index_key(tx.erc20_fee.amount, tx.id),
        ),
    );
}

/// Unbatched transfers of one sender, in id order
pub fn unbatched_by_sender(
    storage: &dyn Storage,
    evm_chain_prefix: &str,
    sender: &Addr,
) -> StdResult<Vec<OutgoingTransferTx>> {
    UNBATCHED_TXS
        .prefix(evm_chain_prefix)
        .range(storage, None, None, Order::Ascending)
        .filter(|item| match item {
            Ok((_, tx)) => &tx.sender == sender,
            Err(_) => true,
        })
        .map(|item| item.map(|(_, tx)| tx))
        .collect()
}

// ============================================================================
// CancelSendToEth — Transfer Sender
// ============================================================================

/// Refund an unbatched transfer (amount and fee) to its sender.
pub fn execute_cancel_send_to_eth(
    deps: DepsMut,
    info: MessageInfo,
    evm_chain_prefix: String,
    transaction_id: u64,
) -> Result<Response, ContractError> {
    ensure_chain(deps.storage, &evm_chain_prefix)?;
    let prefix = evm_chain_prefix.as_str();

    let tx = UNBATCHED_TXS
        .may_load(deps.storage, (prefix, transaction_id))?
        .ok_or(ContractError::TxNotInPool { id: transaction_id })?;
    if tx.sender != info.sender {
        return Err(ContractError::NotTransferSender {
            id: transaction_id,
            sender: info.sender.to_string(),
        });
    }

    let asset = ERC20_TO_ASSET
        .may_load(deps.storage, (prefix, tx.erc20_token.contract.as_str()))?
        .ok_or_else(|| ContractError::TokenNotSupported {
            token: tx.erc20_token.contract.to_string(),
        })?;

    remove_unbatched(deps.storage, prefix, &tx);

    let refund = tx.erc20_token.amount + tx.erc20_fee.amount;
    let msg = asset.transfer_msg(tx.sender.as_str(), refund)?;

    Ok(Response::new()
        .add_message(msg)
        .add_attribute("action", "cancel_send_to_eth")
        .add_attribute("evm_chain_prefix", evm_chain_prefix)
        .add_attribute("transaction_id", transaction_id.to_string())
        .add_attribute("refund", format!("{}{}", refund, asset)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::init_chain;
    use crate::state::{EvmChain, EvmChainParams, Params};
    use cosmwasm_std::testing::mock_dependencies;

    const DEST: &str = "0x429881672B9AE42b8EbA0E26cD9C73711b891Ca5";

    fn setup(storage: &mut dyn Storage) -> EthAddress {
        init_chain(
            storage,
            &EvmChain {
                evm_chain_prefix: "eth".to_string(),
                evm_chain_name: "Ethereum".to_string(),
                evm_chain_net_version: 1,
            },
        )
        .unwrap();
        let mut params = Params::default();
        params.evm_chain_params.push(EvmChainParams {
            evm_chain_prefix: "eth".to_string(),
            gravity_id: "gravity".to_string(),
            bridge_ethereum_address: EthAddress::zero(),
            bridge_chain_id: 1,
            average_ethereum_block_time: 15_000,
            bridge_active: true,
            ethereum_blacklist: vec![EthAddress::from_bytes([0xbb; 20])],
            inbound_fee_basis_points: 0,
        });
        PARAMS.save(storage, &params).unwrap();

        let erc20 = EthAddress::from_bytes([0xaa; 20]);
        ASSET_TO_ERC20
            .save(storage, ("eth", "ugraviton"), &erc20)
            .unwrap();
        ERC20_TO_ASSET
            .save(storage, ("eth", erc20.as_str()), &AssetInfo::native("ugraviton"))
            .unwrap();
        erc20
    }

    #[test]
    fn test_add_to_pool_assigns_ids_and_indexes_fees() {
        let mut deps = mock_dependencies();
        let storage = deps.as_mut().storage;
        let erc20 = setup(storage);
        let asset = AssetInfo::native("ugraviton");

        let first = add_to_pool(
            storage,
            "eth",
            Addr::unchecked("alice"),
            &asset,
            DEST,
            Uint128::new(100),
            Uint128::new(1),
        )
        .unwrap();
        let second = add_to_pool(
            storage,
            "eth",
            Addr::unchecked("bob"),
            &asset,
            DEST,
            Uint128::new(100),
            Uint128::new(5),
        )
        .unwrap();
        assert_eq!((first.id, second.id), (1, 2));

        let by_fee: Vec<u64> = UNBATCHED_BY_FEE
            .prefix(("eth", erc20.as_str()))
            .range(storage, None, None, Order::Ascending)
            .map(|item| item.unwrap().1)
            .collect();
        assert_eq!(by_fee, vec![2, 1]);

        let alice = unbatched_by_sender(storage, "eth", &Addr::unchecked("alice")).unwrap();
        assert_eq!(alice, vec![first]);
    }

    #[test]
    fn test_add_to_pool_rejects_bad_input() {
        let mut deps = mock_dependencies();
        let storage = deps.as_mut().storage;
        setup(storage);
        let asset = AssetInfo::native("ugraviton");
        let alice = Addr::unchecked("alice");

        let one = Uint128::new(1);

        let err = add_to_pool(storage, "bsc", alice.clone(), &asset, DEST, one, one).unwrap_err();
        assert!(matches!(err, ContractError::EvmChainNotFound { .. }));

        let err = add_to_pool(storage, "eth", alice.clone(), &asset, DEST, Uint128::zero(), one)
            .unwrap_err();
        assert!(matches!(err, ContractError::InvalidAmount { .. }));

        let err = add_to_pool(
            storage,
            "eth",
            alice.clone(),
            &AssetInfo::native("uatom"),
            DEST,
            one,
            one,
        )
        .unwrap_err();
        assert!(matches!(err, ContractError::TokenNotSupported { .. }));

        let blacklisted = EthAddress::from_bytes([0xbb; 20]).to_string();
        let err = add_to_pool(storage, "eth", alice, &asset, &blacklisted, one, one).unwrap_err();
        assert!(matches!(err, ContractError::Blacklisted { .. }));

        assert!(UNBATCHED_TXS.may_load(storage, ("eth", 1)).unwrap().is_none());
    }
}
