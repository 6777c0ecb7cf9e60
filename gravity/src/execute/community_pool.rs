//! Community pool ledger.
//!
//! The contract holds community pool funds in custody and tracks them per
//! asset. The pool is funded by donations and by deposits that cannot be
//! delivered (invalid receiver, blacklisted sender).

use cosmwasm_std::{DepsMut, MessageInfo, Response, StdResult, Storage, Uint128};

use common::{Asset, AssetInfo};

use crate::error::ContractError;
use crate::state::COMMUNITY_POOL;

/// Add `amount` of `info` to the pool balance.
pub fn credit_community_pool(
    storage: &mut dyn Storage,
    info: &AssetInfo,
    amount: Uint128,
) -> StdResult<()> {
    if amount.is_zero() {
        return Ok(());
    }
    let key = info.key();
    let mut balance = COMMUNITY_POOL
        .may_load(storage, &key)?
        .unwrap_or_else(|| Asset::new(info.clone(), 0u128));
    balance.amount += amount;
    COMMUNITY_POOL.save(storage, &key, &balance)
}

/// Remove `amount` from the pool balance of the asset with key `key`.
pub fn debit_community_pool(
    storage: &mut dyn Storage,
    key: &str,
    amount: Uint128,
) -> Result<AssetInfo, ContractError> {
    let mut balance =
        COMMUNITY_POOL
            .may_load(storage, key)?
            .ok_or_else(|| ContractError::InsufficientCommunityPool {
                denom: key.to_string(),
                available: Uint128::zero(),
                required: amount,
            })?;
    if balance.amount < amount {
        return Err(ContractError::InsufficientCommunityPool {
            denom: key.to_string(),
            available: balance.amount,
            required: amount,
        });
    }
    balance.amount -= amount;
    if balance.amount.is_zero() {
        COMMUNITY_POOL.remove(storage, key);
    } else {
        COMMUNITY_POOL.save(storage, key, &balance)?;
    }
    Ok(balance.info)
}

// ============================================================================
// FundCommunityPool — Anyone
// ============================================================================

/// Donate the attached native funds.
pub fn execute_fund_community_pool(
    deps: DepsMut,
    info: MessageInfo,
) -> Result<Response, ContractError> {
    if info.funds.is_empty() {
        return Err(ContractError::InvalidAmount {
            reason: "No funds sent".to_string(),
        });
    }
    for coin in &info.funds {
        credit_community_pool(deps.storage, &AssetInfo::native(&coin.denom), coin.amount)?;
    }

    let funds: Vec<String> = info.funds.iter().map(|c| c.to_string()).collect();
    Ok(Response::new()
        .add_attribute("action", "fund_community_pool")
        .add_attribute("depositor", info.sender)
        .add_attribute("amount", funds.join(",")))
}

/// Donate cw20 tokens received through the cw20 hook.
pub fn execute_fund_community_pool_cw20(
    deps: DepsMut,
    token: AssetInfo,
    sender: String,
    amount: Uint128,
) -> Result<Response, ContractError> {
    if amount.is_zero() {
        return Err(ContractError::InvalidAmount {
            reason: "Amount must be greater than zero".to_string(),
        });
    }
    credit_community_pool(deps.storage, &token, amount)?;

    Ok(Response::new()
        .add_attribute("action", "fund_community_pool")
        .add_attribute("depositor", sender)
        .add_attribute("amount", format!("{}{}", amount, token)))
}
