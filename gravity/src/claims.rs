//! EVM event claims
//!
//! A claim is an orchestrator's report of one event emitted by the bridge
//! contract on an EVM chain. Every event carries a gapless per-chain event
//! nonce; validators agree on a claim by submitting byte-identical payloads,
//! which is why the claim hash is computed over the claim alone and never
//! over the submitter.

use cosmwasm_schema::cw_serde;
use cosmwasm_std::{to_json_vec, Binary, StdResult, Uint128};

use common::EthAddress;

use crate::error::ContractError;
use crate::hash::keccak256;
use crate::state::BridgeValidator;

/// Any EVM event the bridge attests to
#[cw_serde]
pub enum Claim {
    SendToCosmos(SendToCosmosClaim),
    BatchSendToEth(BatchSendToEthClaim),
    Erc20Deployed(Erc20DeployedClaim),
    LogicCallExecuted(LogicCallExecutedClaim),
    ValsetUpdated(ValsetUpdatedClaim),
}

/// Tokens locked in the EVM bridge for a cosmos receiver
#[cw_serde]
pub struct SendToCosmosClaim {
    pub event_nonce: u64,
    pub evm_block_height: u64,
    pub token_contract: EthAddress,
    pub amount: Uint128,
    pub ethereum_sender: EthAddress,
    /// Local address, or a foreign bech32 address to forward to over IBC
    pub cosmos_receiver: String,
}

/// A batch was executed on the EVM chain
#[cw_serde]
pub struct BatchSendToEthClaim {
    pub event_nonce: u64,
    pub evm_block_height: u64,
    pub batch_nonce: u64,
    pub token_contract: EthAddress,
}

/// An ERC20 representing a cosmos denom was deployed by the EVM bridge
#[cw_serde]
pub struct Erc20DeployedClaim {
    pub event_nonce: u64,
    pub evm_block_height: u64,
    pub cosmos_denom: String,
    pub token_contract: EthAddress,
    pub name: String,
    pub symbol: String,
    pub decimals: u64,
}

/// A logic call was executed on the EVM chain
#[cw_serde]
pub struct LogicCallExecutedClaim {
    pub event_nonce: u64,
    pub evm_block_height: u64,
    pub invalidation_id: Binary,
    pub invalidation_nonce: u64,
}

/// The EVM bridge accepted a new validator set
#[cw_serde]
pub struct ValsetUpdatedClaim {
    pub event_nonce: u64,
    pub evm_block_height: u64,
    pub valset_nonce: u64,
    pub members: Vec<BridgeValidator>,
}

impl Claim {
    pub fn event_nonce(&self) -> u64 {
        match self {
            Claim::SendToCosmos(c) => c.event_nonce,
            Claim::BatchSendToEth(c) => c.event_nonce,
            Claim::Erc20Deployed(c) => c.event_nonce,
            Claim::LogicCallExecuted(c) => c.event_nonce,
            Claim::ValsetUpdated(c) => c.event_nonce,
        }
    }

    pub fn evm_block_height(&self) -> u64 {
        match self {
            Claim::SendToCosmos(c) => c.evm_block_height,
            Claim::BatchSendToEth(c) => c.evm_block_height,
            Claim::Erc20Deployed(c) => c.evm_block_height,
            Claim::LogicCallExecuted(c) => c.evm_block_height,
            Claim::ValsetUpdated(c) => c.evm_block_height,
        }
    }

    /// Name used in events and queries
    pub fn claim_type(&self) -> &'static str {
        match self {
            Claim::SendToCosmos(_) => "send_to_cosmos",
            Claim::BatchSendToEth(_) => "batch_send_to_eth",
            Claim::Erc20Deployed(_) => "erc20_deployed",
            Claim::LogicCallExecuted(_) => "logic_call_executed",
            Claim::ValsetUpdated(_) => "valset_updated",
        }
    }

    /// Stateless validation. A zero deposit amount is accepted here: every
    /// EVM event has to be attestable to keep the nonce sequence gapless.
    pub fn validate_basic(&self) -> Result<(), ContractError> {
        if self.event_nonce() == 0 {
            return Err(invalid("event nonce must be positive"));
        }
        if self.evm_block_height() == 0 {
            return Err(invalid("evm block height must be positive"));
        }

        match self {
            Claim::SendToCosmos(c) => {
                if c.cosmos_receiver.trim().is_empty() {
                    return Err(invalid("cosmos receiver is empty"));
                }
            }
            Claim::BatchSendToEth(c) => {
                if c.batch_nonce == 0 {
                    return Err(invalid("batch nonce must be positive"));
                }
            }
            Claim::Erc20Deployed(c) => {
                if c.cosmos_denom.is_empty() {
                    return Err(invalid("cosmos denom is empty"));
                }
                if c.decimals > u8::MAX as u64 {
                    return Err(invalid("decimals out of range"));
                }
            }
            Claim::LogicCallExecuted(c) => {
                if c.invalidation_id.is_empty() {
                    return Err(invalid("invalidation id is empty"));
                }
            }
            Claim::ValsetUpdated(c) => {
                if c.valset_nonce == 0 {
                    return Err(invalid("valset nonce must be positive"));
                }
                if c.members.is_empty() {
                    return Err(invalid("valset has no members"));
                }
                if c.members.iter().any(|m| m.power == 0) {
                    return Err(invalid("valset member with zero power"));
                }
            }
        }
        Ok(())
    }

    /// keccak256 of the canonical JSON encoding of the claim
    pub fn claim_hash(&self) -> StdResult<[u8; 32]> {
        Ok(keccak256(&to_json_vec(self)?))
    }
}

fn invalid(reason: &str) -> ContractError {
    ContractError::InvalidClaim {
        reason: reason.to_string(),
    }
}
