//! Effects of observed claims.
//!
//! Each effect checks everything it needs before its first write, so an
//! effect that fails leaves storage untouched. The caller still marks the
//! attestation observed.

use cosmwasm_std::{Addr, Api, BankMsg, Coin, CosmosMsg, Deps, DepsMut, Env, Uint128};

use common::AssetInfo;

use crate::address_codec::{classify_receiver, Receiver};
use crate::claims::{Claim, SendToCosmosClaim};
use crate::error::ContractError;
use crate::execute::batch::observe_batch_executed;
use crate::execute::community_pool::credit_community_pool;
use crate::execute::ibc_forward::queue_forward;
use crate::execute::logic_call::observe_logic_call_executed;
use crate::execute::tokens::observe_erc20_deployed;
use crate::fee_manager::collect_batch_fees;
use crate::registry::chain_params;
use crate::state::{
    PendingIbcAutoForward, Valset, CONFIG, ERC20_TO_ASSET, IBC_CHANNELS, LAST_OBSERVED_VALSET,
    PARAMS,
};

/// Apply the effect of `claim`. `committed` holds the messages already
/// produced earlier in the same resolution pass, whose bank sends count
/// against the custody balance.
pub fn apply_claim(
    deps: DepsMut,
    env: &Env,
    evm_chain_prefix: &str,
    claim: &Claim,
    committed: &[CosmosMsg],
) -> Result<Vec<CosmosMsg>, ContractError> {
    match claim {
        Claim::SendToCosmos(c) => {
            observe_send_to_cosmos(deps, env, evm_chain_prefix, c, committed)
        }
        Claim::BatchSendToEth(c) => observe_batch_executed(deps.storage, evm_chain_prefix, c),
        Claim::Erc20Deployed(c) => {
            observe_erc20_deployed(deps.storage, evm_chain_prefix, c)?;
            Ok(vec![])
        }
        Claim::LogicCallExecuted(c) => {
            observe_logic_call_executed(deps.storage, evm_chain_prefix, c)?;
            Ok(vec![])
        }
        Claim::ValsetUpdated(c) => {
            LAST_OBSERVED_VALSET.save(
                deps.storage,
                evm_chain_prefix,
                &Valset {
                    nonce: c.valset_nonce,
                    members: c.members.clone(),
                    height: env.block.height,
                },
            )?;
            Ok(vec![])
        }
    }
}

/// Where the tokens of a deposit end up
enum Destination {
    Account(Addr),
    Forward { receiver: String, channel: String },
    CommunityPool,
}

fn observe_send_to_cosmos(
    deps: DepsMut,
    env: &Env,
    evm_chain_prefix: &str,
    claim: &SendToCosmosClaim,
    committed: &[CosmosMsg],
) -> Result<Vec<CosmosMsg>, ContractError> {
    let config = CONFIG.load(deps.storage)?;
    let params = PARAMS.load(deps.storage)?;
    let chain = chain_params(&params, evm_chain_prefix)?;

    let asset = ERC20_TO_ASSET
        .may_load(deps.storage, (evm_chain_prefix, claim.token_contract.as_str()))?
        .ok_or_else(|| ContractError::TokenNotSupported {
            token: claim.token_contract.to_string(),
        })?;

    let destination = if chain.is_blacklisted(&claim.ethereum_sender) {
        Destination::CommunityPool
    } else {
        match classify_receiver(deps.api, &config.native_prefix, &claim.cosmos_receiver) {
            Receiver::Local(addr) => Destination::Account(addr),
            Receiver::Foreign { address, prefix } => {
                match IBC_CHANNELS.may_load(deps.storage, &prefix)? {
                    Some(channel) if asset.is_native() => Destination::Forward {
                        receiver: address,
                        channel,
                    },
                    _ => match local_equivalent(deps.api, &config.native_prefix, &address) {
                        Some(addr) => Destination::Account(addr),
                        None => Destination::CommunityPool,
                    },
                }
            }
            Receiver::Invalid => Destination::CommunityPool,
        }
    };

    let contract = env.contract.address.as_str();
    let mut msgs = vec![];
    match destination {
        Destination::CommunityPool => {
            // the whole deposit, no inbound fee
            match &asset {
                AssetInfo::Native { denom } => {
                    ensure_custody(deps.as_ref(), env, denom, claim.amount, committed)?
                }
                AssetInfo::Cw20 { .. } => {
                    if !claim.amount.is_zero() {
                        msgs.push(asset.mint_msg(contract, claim.amount)?);
                    }
                }
            }
            credit_community_pool(deps.storage, &asset, claim.amount)?;
        }
        Destination::Account(receiver) => {
            let split = collect_batch_fees(deps.storage, evm_chain_prefix, claim.amount)?;
            if let AssetInfo::Native { denom } = &asset {
                ensure_custody(deps.as_ref(), env, denom, claim.amount, committed)?;
            }
            msgs.push(payout(&asset, receiver.as_str(), split.remainder)?);
            if !split.fee.is_zero() {
                msgs.push(payout(&asset, config.fee_collector.as_str(), split.fee)?);
            }
        }
        Destination::Forward { receiver, channel } => {
            let split = collect_batch_fees(deps.storage, evm_chain_prefix, claim.amount)?;
            let denom = asset.key();
            ensure_custody(deps.as_ref(), env, &denom, claim.amount, committed)?;
            queue_forward(
                deps.storage,
                evm_chain_prefix,
                &PendingIbcAutoForward {
                    foreign_receiver: receiver,
                    token: Coin {
                        denom,
                        amount: split.remainder,
                    },
                    ibc_channel: channel,
                    event_nonce: claim.event_nonce,
                },
            )?;
            if !split.fee.is_zero() {
                msgs.push(payout(&asset, config.fee_collector.as_str(), split.fee)?);
            }
        }
    }
    Ok(msgs)
}

/// Unlock native coins from custody, or mint cw20 tokens.
fn payout(
    asset: &AssetInfo,
    recipient: &str,
    amount: Uint128,
) -> Result<CosmosMsg, ContractError> {
    let msg = if asset.is_native() {
        asset.transfer_msg(recipient, amount)?
    } else {
        asset.mint_msg(recipient, amount)?
    };
    Ok(msg)
}

/// Fail unless the contract's balance of `denom`, less the bank sends
/// already committed, covers `amount`.
fn ensure_custody(
    deps: Deps,
    env: &Env,
    denom: &str,
    amount: Uint128,
    committed: &[CosmosMsg],
) -> Result<(), ContractError> {
    let balance = deps
        .querier
        .query_balance(env.contract.address.as_str(), denom)?
        .amount;
    let spent = committed
        .iter()
        .filter_map(|msg| match msg {
            CosmosMsg::Bank(BankMsg::Send { amount, .. }) => Some(amount),
            _ => None,
        })
        .flatten()
        .filter(|coin| coin.denom == denom)
        .fold(Uint128::zero(), |acc, coin| acc + coin.amount);
    let available = balance.saturating_sub(spent);
    if available < amount {
        return Err(ContractError::InsufficientCustody {
            denom: denom.to_string(),
            available,
            required: amount,
        });
    }
    Ok(())
}

/// The local account sharing the bytes of a foreign bech32 address.
fn local_equivalent(api: &dyn Api, native_prefix: &str, address: &str) -> Option<Addr> {
    let (_, data, variant) = bech32::decode(address).ok()?;
    let local = bech32::encode(native_prefix, data, variant).ok()?;
    api.addr_validate(&local).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execute::tokens::save_token_pair;
    use crate::registry::init_chain;
    use crate::state::{
        Config, EvmChain, EvmChainParams, Params, COMMUNITY_POOL, PENDING_IBC_AUTO_FORWARDS,
    };
    use bech32::{ToBase32, Variant};
    use common::EthAddress;
    use cosmwasm_std::testing::{
        mock_dependencies_with_balance, mock_env, MockApi, MockQuerier, MockStorage,
    };
    use cosmwasm_std::{coins, OwnedDeps};

    type TestDeps = OwnedDeps<MockStorage, MockApi, MockQuerier>;

    const TOKEN: [u8; 20] = [0x11; 20];

    fn setup(blacklisted: Option<EthAddress>) -> TestDeps {
        let mut deps = mock_dependencies_with_balance(&coins(1_000, "ugraviton"));
        let storage = deps.as_mut().storage;
        CONFIG
            .save(
                storage,
                &Config {
                    authority: Addr::unchecked("gov"),
                    fee_collector: Addr::unchecked("fees"),
                    native_prefix: "gravity".to_string(),
                },
            )
            .unwrap();
        let mut params = Params::default();
        params.evm_chain_params.push(EvmChainParams {
            evm_chain_prefix: "eth".to_string(),
            gravity_id: "gravity-test".to_string(),
            bridge_ethereum_address: EthAddress::zero(),
            bridge_chain_id: 1,
            average_ethereum_block_time: 15_000,
            bridge_active: true,
            ethereum_blacklist: blacklisted.into_iter().collect(),
            inbound_fee_basis_points: 100,
        });
        PARAMS.save(storage, &params).unwrap();
        init_chain(
            storage,
            &EvmChain {
                evm_chain_prefix: "eth".to_string(),
                evm_chain_name: "Ethereum".to_string(),
                evm_chain_net_version: 1,
            },
        )
        .unwrap();
        save_token_pair(
            storage,
            "eth",
            &EthAddress::from_bytes(TOKEN),
            &AssetInfo::native("ugraviton"),
        )
        .unwrap();
        deps
    }

    fn deposit(receiver: &str, amount: u128) -> Claim {
        Claim::SendToCosmos(SendToCosmosClaim {
            event_nonce: 1,
            evm_block_height: 10,
            token_contract: EthAddress::from_bytes(TOKEN),
            amount: Uint128::new(amount),
            ethereum_sender: EthAddress::from_bytes([0x22; 20]),
            cosmos_receiver: receiver.to_string(),
        })
    }

    fn bank_send(to: &str, amount: u128) -> CosmosMsg {
        CosmosMsg::Bank(BankMsg::Send {
            to_address: to.to_string(),
            amount: coins(amount, "ugraviton"),
        })
    }

    #[test]
    fn test_local_deposit_unlocks_with_fee() {
        let mut deps = setup(None);
        let claim = deposit("receiver", 500);
        let msgs = apply_claim(deps.as_mut(), &mock_env(), "eth", &claim, &[]).unwrap();
        assert_eq!(msgs, vec![bank_send("receiver", 495), bank_send("fees", 5)]);
    }

    #[test]
    fn test_custody_counts_committed_sends() {
        let mut deps = setup(None);
        let committed = vec![bank_send("someone", 800)];
        let err = apply_claim(
            deps.as_mut(),
            &mock_env(),
            "eth",
            &deposit("receiver", 500),
            &committed,
        )
        .unwrap_err();
        assert_eq!(
            err,
            ContractError::InsufficientCustody {
                denom: "ugraviton".to_string(),
                available: Uint128::new(200),
                required: Uint128::new(500),
            }
        );
    }

    #[test]
    fn test_blacklisted_sender_funds_community_pool() {
        let mut deps = setup(Some(EthAddress::from_bytes([0x22; 20])));
        let claim = deposit("receiver", 500);
        let msgs = apply_claim(deps.as_mut(), &mock_env(), "eth", &claim, &[]).unwrap();
        assert!(msgs.is_empty());
        let pool = COMMUNITY_POOL.load(deps.as_ref().storage, "ugraviton").unwrap();
        assert_eq!(pool.amount, Uint128::new(500));
    }

    #[test]
    fn test_foreign_receiver_with_channel_is_queued() {
        let mut deps = setup(None);
        IBC_CHANNELS
            .save(deps.as_mut().storage, "osmo", &"channel-0".to_string())
            .unwrap();
        let osmo = bech32::encode("osmo", [7u8; 20].to_base32(), Variant::Bech32).unwrap();

        let claim = deposit(&osmo, 500);
        let msgs = apply_claim(deps.as_mut(), &mock_env(), "eth", &claim, &[]).unwrap();
        assert_eq!(msgs, vec![bank_send("fees", 5)]);
        let forward = PENDING_IBC_AUTO_FORWARDS
            .load(deps.as_ref().storage, ("eth", 1))
            .unwrap();
        assert_eq!(forward.foreign_receiver, osmo);
        assert_eq!(forward.token.amount, Uint128::new(495));
        assert_eq!(forward.ibc_channel, "channel-0");
    }

    #[test]
    fn test_unknown_token_writes_nothing() {
        let mut deps = setup(None);
        let mut claim = deposit("receiver", 500);
        if let Claim::SendToCosmos(c) = &mut claim {
            c.token_contract = EthAddress::from_bytes([0x99; 20]);
        }
        let err = apply_claim(deps.as_mut(), &mock_env(), "eth", &claim, &[]).unwrap_err();
        assert!(matches!(err, ContractError::TokenNotSupported { .. }));
        assert!(!COMMUNITY_POOL.has(deps.as_ref().storage, "ugraviton"));
    }
}
