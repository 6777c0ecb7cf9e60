//! IBC auto-forward queue.
//!
//! Deposits addressed to a foreign bech32 prefix with a registered channel
//! are kept in custody and queued per (chain, event nonce). Draining sends
//! them as ICS-20 transfers with `reply_always`; a transfer rejected when it
//! is dispatched puts the entry back in the queue unchanged. Timeouts and
//! error acks arrive later as ICS-20 refunds to the contract and are not
//! requeued.

use cosmwasm_std::{
    DepsMut, Env, IbcMsg, IbcTimeout, MessageInfo, Order, Reply, Response, StdError, StdResult,
    Storage, SubMsg, SubMsgResult,
};

use common::AssetInfo;

use crate::error::ContractError;
use crate::execute::community_pool::credit_community_pool;
use crate::registry::chain_prefixes;
use crate::state::{
    InFlightForward, PendingIbcAutoForward, CONFIG, EVM_CHAINS, IBC_CHANNELS,
    IBC_FORWARDS_IN_FLIGHT, NEXT_REPLY_ID, PARAMS, PENDING_IBC_AUTO_FORWARDS,
};

/// Reject malformed forwards
pub fn validate_forward(forward: &PendingIbcAutoForward) -> Result<(), ContractError> {
    if forward.foreign_receiver.trim().is_empty() {
        return Err(ContractError::InvalidAddress {
            reason: "foreign receiver is empty".to_string(),
        });
    }
    if forward.ibc_channel.trim().is_empty() {
        return Err(ContractError::InvalidAddress {
            reason: "ibc channel is empty".to_string(),
        });
    }
    if forward.token.amount.is_zero() {
        return Err(ContractError::InvalidAmount {
            reason: "forwarded token amount is zero".to_string(),
        });
    }
    if forward.event_nonce == 0 {
        return Err(ContractError::InvalidAmount {
            reason: "forward event nonce must be positive".to_string(),
        });
    }
    Ok(())
}

pub fn queue_forward(
    storage: &mut dyn Storage,
    evm_chain_prefix: &str,
    forward: &PendingIbcAutoForward,
) -> Result<(), ContractError> {
    validate_forward(forward)?;
    PENDING_IBC_AUTO_FORWARDS.save(storage, (evm_chain_prefix, forward.event_nonce), forward)?;
    Ok(())
}

/// Take up to `max` pending forwards, chains in prefix order and nonces
/// ascending within a chain, and turn each into an IBC transfer.
pub fn drain_forwards(storage: &mut dyn Storage, env: &Env, max: u64) -> StdResult<Vec<SubMsg>> {
    if max == 0 {
        return Ok(vec![]);
    }
    let timeout_seconds = PARAMS.load(storage)?.ibc_forward_timeout_seconds;

    let mut taken: Vec<(String, PendingIbcAutoForward)> = vec![];
    for prefix in chain_prefixes(storage)? {
        let remaining = max as usize - taken.len();
        if remaining == 0 {
            break;
        }
        let forwards: Vec<PendingIbcAutoForward> = PENDING_IBC_AUTO_FORWARDS
            .prefix(&prefix)
            .range(storage, None, None, Order::Ascending)
            .take(remaining)
            .map(|item| item.map(|(_, forward)| forward))
            .collect::<StdResult<_>>()?;
        taken.extend(forwards.into_iter().map(|f| (prefix.clone(), f)));
    }

    let mut next_id = NEXT_REPLY_ID.may_load(storage)?.unwrap_or_default();
    let mut msgs = Vec::with_capacity(taken.len());
    for (prefix, forward) in taken {
        PENDING_IBC_AUTO_FORWARDS.remove(storage, (prefix.as_str(), forward.event_nonce));

        next_id += 1;
        IBC_FORWARDS_IN_FLIGHT.save(
            storage,
            next_id,
            &InFlightForward {
                evm_chain_prefix: prefix,
                forward: forward.clone(),
            },
        )?;

        let transfer = IbcMsg::Transfer {
            channel_id: forward.ibc_channel,
            to_address: forward.foreign_receiver,
            amount: forward.token,
            timeout: IbcTimeout::with_timestamp(env.block.time.plus_seconds(timeout_seconds)),
        };
        msgs.push(SubMsg::reply_always(transfer, next_id));
    }
    NEXT_REPLY_ID.save(storage, &next_id)?;
    Ok(msgs)
}

// ============================================================================
// ExecuteIbcAutoForwards — Anyone
// ============================================================================

pub fn execute_ibc_auto_forwards(
    deps: DepsMut,
    env: Env,
    forwards_to_clear: u64,
) -> Result<Response, ContractError> {
    if forwards_to_clear == 0 {
        return Err(ContractError::InvalidAmount {
            reason: "forwards_to_clear must be greater than zero".to_string(),
        });
    }
    let msgs = drain_forwards(deps.storage, &env, forwards_to_clear)?;

    Ok(Response::new()
        .add_attribute("action", "execute_ibc_auto_forwards")
        .add_attribute("forwarded", msgs.len().to_string())
        .add_submessages(msgs))
}

/// Reply of a forward transfer. A dispatch failure puts the entry back in
/// the queue; if its chain was removed meanwhile, the tokens go to the
/// community pool.
pub fn handle_forward_reply(deps: DepsMut, msg: Reply) -> Result<Response, ContractError> {
    let in_flight = IBC_FORWARDS_IN_FLIGHT
        .may_load(deps.storage, msg.id)?
        .ok_or_else(|| StdError::not_found(format!("in-flight forward {}", msg.id)))?;
    IBC_FORWARDS_IN_FLIGHT.remove(deps.storage, msg.id);

    let InFlightForward {
        evm_chain_prefix,
        forward,
    } = in_flight;
    let response = Response::new()
        .add_attribute("evm_chain_prefix", evm_chain_prefix.as_str())
        .add_attribute("event_nonce", forward.event_nonce.to_string())
        .add_attribute("receiver", forward.foreign_receiver.as_str())
        .add_attribute("amount", forward.token.to_string());

    match msg.result {
        SubMsgResult::Ok(_) => Ok(response.add_attribute("action", "ibc_auto_forward_sent")),
        SubMsgResult::Err(err) => {
            if EVM_CHAINS.has(deps.storage, &evm_chain_prefix) {
                PENDING_IBC_AUTO_FORWARDS.save(
                    deps.storage,
                    (evm_chain_prefix.as_str(), forward.event_nonce),
                    &forward,
                )?;
                Ok(response
                    .add_attribute("action", "ibc_auto_forward_requeued")
                    .add_attribute("error", err))
            } else {
                credit_community_pool(
                    deps.storage,
                    &AssetInfo::native(&forward.token.denom),
                    forward.token.amount,
                )?;
                Ok(response
                    .add_attribute("action", "ibc_auto_forward_to_community_pool")
                    .add_attribute("error", err))
            }
        }
    }
}

// ============================================================================
// SetIbcChannelForPrefix — Authority
// ============================================================================

pub fn execute_set_ibc_channel_for_prefix(
    deps: DepsMut,
    info: MessageInfo,
    prefix: String,
    channel: Option<String>,
) -> Result<Response, ContractError> {
    let config = CONFIG.load(deps.storage)?;
    if info.sender != config.authority {
        return Err(ContractError::Unauthorized);
    }
    if prefix.is_empty() || prefix.chars().any(|c| !c.is_ascii_lowercase() && !c.is_ascii_digit())
    {
        return Err(ContractError::InvalidAddress {
            reason: format!("invalid bech32 prefix {:?}", prefix),
        });
    }
    if prefix == config.native_prefix {
        return Err(ContractError::InvalidAddress {
            reason: "cannot route the native prefix over IBC".to_string(),
        });
    }

    let response = Response::new()
        .add_attribute("action", "set_ibc_channel_for_prefix")
        .add_attribute("prefix", prefix.as_str());
    match channel {
        Some(channel) => {
            if channel.trim().is_empty() {
                return Err(ContractError::InvalidAddress {
                    reason: "ibc channel is empty".to_string(),
                });
            }
            IBC_CHANNELS.save(deps.storage, &prefix, &channel)?;
            Ok(response.add_attribute("channel", channel))
        }
        None => {
            IBC_CHANNELS.remove(deps.storage, &prefix);
            Ok(response.add_attribute("channel", "none"))
        }
    }
}
