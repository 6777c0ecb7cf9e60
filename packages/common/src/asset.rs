//! Local asset representation.
//!
//! Cosmos-originated tokens are native bank denoms held in custody by the
//! bridge (lock/unlock). EVM-originated tokens are cw20 contracts the bridge
//! is minter of (mint/burn).

use cosmwasm_schema::cw_serde;
use cosmwasm_std::{
    to_json_binary, Addr, BankMsg, Coin, CosmosMsg, StdError, StdResult, Uint128, WasmMsg,
};
use cw20::Cw20ExecuteMsg;

/// Identifies a token on this chain
#[cw_serde]
#[derive(Eq, PartialOrd, Ord, Hash)]
pub enum AssetInfo {
    /// Native bank denom
    Native { denom: String },
    /// CW20 token contract
    Cw20 { contract_addr: Addr },
}

impl AssetInfo {
    pub fn native(denom: impl Into<String>) -> Self {
        AssetInfo::Native {
            denom: denom.into(),
        }
    }

    pub fn cw20(contract_addr: Addr) -> Self {
        AssetInfo::Cw20 { contract_addr }
    }

    /// Storage key for this asset: the denom or the contract address.
    pub fn key(&self) -> String {
        match self {
            AssetInfo::Native { denom } => denom.clone(),
            AssetInfo::Cw20 { contract_addr } => contract_addr.to_string(),
        }
    }

    pub fn is_native(&self) -> bool {
        matches!(self, AssetInfo::Native { .. })
    }

    /// Message paying `amount` of this asset out of the caller's balance.
    pub fn transfer_msg(&self, recipient: &str, amount: Uint128) -> StdResult<CosmosMsg> {
        match self {
            AssetInfo::Native { denom } => Ok(CosmosMsg::Bank(BankMsg::Send {
                to_address: recipient.to_string(),
                amount: vec![Coin {
                    denom: denom.clone(),
                    amount,
                }],
            })),
            AssetInfo::Cw20 { contract_addr } => Ok(CosmosMsg::Wasm(WasmMsg::Execute {
                contract_addr: contract_addr.to_string(),
                msg: to_json_binary(&Cw20ExecuteMsg::Transfer {
                    recipient: recipient.to_string(),
                    amount,
                })?,
                funds: vec![],
            })),
        }
    }

    /// Message creating `amount` new tokens for `recipient`. Only cw20
    /// assets can be minted by the bridge.
    pub fn mint_msg(&self, recipient: &str, amount: Uint128) -> StdResult<CosmosMsg> {
        match self {
            AssetInfo::Native { denom } => Err(StdError::generic_err(format!(
                "native denom {} cannot be minted by the bridge",
                denom
            ))),
            AssetInfo::Cw20 { contract_addr } => Ok(CosmosMsg::Wasm(WasmMsg::Execute {
                contract_addr: contract_addr.to_string(),
                msg: to_json_binary(&Cw20ExecuteMsg::Mint {
                    recipient: recipient.to_string(),
                    amount,
                })?,
                funds: vec![],
            })),
        }
    }

    /// Message destroying `amount` tokens held by the bridge.
    pub fn burn_msg(&self, amount: Uint128) -> StdResult<CosmosMsg> {
        match self {
            AssetInfo::Native { denom } => Err(StdError::generic_err(format!(
                "native denom {} cannot be burned by the bridge",
                denom
            ))),
            AssetInfo::Cw20 { contract_addr } => Ok(CosmosMsg::Wasm(WasmMsg::Execute {
                contract_addr: contract_addr.to_string(),
                msg: to_json_binary(&Cw20ExecuteMsg::Burn { amount })?,
                funds: vec![],
            })),
        }
    }
}

impl std::fmt::Display for AssetInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.key())
    }
}

/// An amount of a local asset
#[cw_serde]
pub struct Asset {
    pub info: AssetInfo,
    pub amount: Uint128,
}

impl Asset {
    pub fn new(info: AssetInfo, amount: impl Into<Uint128>) -> Self {
        Self {
            info,
            amount: amount.into(),
        }
    }

    /// Native coin view of this asset, if it is a bank denom.
    pub fn to_coin(&self) -> Option<Coin> {
        match &self.info {
            AssetInfo::Native { denom } => Some(Coin {
                denom: denom.clone(),
                amount: self.amount,
            }),
            AssetInfo::Cw20 { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_transfer_is_bank_send() {
        let info = AssetInfo::native("ugraviton");
        let msg = info.transfer_msg("cosmos1user", Uint128::new(5)).unwrap();
        assert_eq!(
            msg,
            CosmosMsg::Bank(BankMsg::Send {
                to_address: "cosmos1user".to_string(),
                amount: vec![Coin::new(5, "ugraviton")],
            })
        );
        assert!(info.mint_msg("cosmos1user", Uint128::new(5)).is_err());
        assert!(info.burn_msg(Uint128::new(5)).is_err());
    }

    #[test]
    fn test_cw20_mint_and_burn() {
        let info = AssetInfo::cw20(Addr::unchecked("cosmos1token"));
        assert_eq!(info.key(), "cosmos1token");
        assert!(!info.is_native());
        assert!(info.mint_msg("cosmos1user", Uint128::new(1)).is_ok());
        assert!(info.burn_msg(Uint128::new(1)).is_ok());
        assert!(Asset::new(info, 1u128).to_coin().is_none());
    }
}
