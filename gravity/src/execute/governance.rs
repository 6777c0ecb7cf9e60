//! Governance proposals and params updates.
//!
//! Only the configured authority (the governance module account) may
//! dispatch proposals. Each proposal is applied in full or not at all.

use cosmwasm_std::{DepsMut, MessageInfo, Response, StdError, Storage, Uint128};

use common::EthAddress;

use crate::error::ContractError;
use crate::execute::attestation::rollback_attestations;
use crate::execute::community_pool::debit_community_pool;
use crate::execute::tokens::store_metadata;
use crate::fee_manager::validate_fee_bps;
use crate::msg::GovernanceProposal;
use crate::registry::{chain_prefixes, ensure_chain, init_chain, remove_chain_state};
use crate::state::{
    DenomMetadata, EvmChain, EvmChainParams, Params, ASSET_TO_ERC20, CONFIG, ERC20_TO_ASSET,
    EVM_CHAINS, MONITORED_ERC20_TOKENS, PARAMS,
};

/// Default EVM block time of a newly added chain, in milliseconds
pub const DEFAULT_EVM_BLOCK_TIME: u64 = 15_000;

/// Gravity ids are packed into a bytes32 checkpoint word
pub const MAX_GRAVITY_ID_LEN: usize = 32;

// ============================================================================
// Governance — Authority
// ============================================================================

pub fn execute_governance(
    deps: DepsMut,
    info: MessageInfo,
    proposal: GovernanceProposal,
) -> Result<Response, ContractError> {
    let config = CONFIG.load(deps.storage)?;
    if info.sender != config.authority {
        return Err(ContractError::Unauthorized);
    }

    match proposal {
        GovernanceProposal::UnhaltBridge {
            evm_chain_prefix,
            target_nonce,
        } => unhalt_bridge(deps, evm_chain_prefix, target_nonce),
        GovernanceProposal::AddEvmChain {
            evm_chain_prefix,
            evm_chain_name,
            evm_chain_net_version,
            gravity_id,
            bridge_ethereum_address,
            inbound_fee_basis_points,
        } => add_evm_chain(
            deps,
            EvmChain {
                evm_chain_prefix,
                evm_chain_name,
                evm_chain_net_version,
            },
            gravity_id,
            bridge_ethereum_address,
            inbound_fee_basis_points,
        ),
        GovernanceProposal::RemoveEvmChain { evm_chain_prefix } => {
            remove_evm_chain(deps, evm_chain_prefix)
        }
        GovernanceProposal::IbcMetadata {
            evm_chain_prefix,
            ibc_denom,
            metadata,
        } => ibc_metadata(deps, evm_chain_prefix, ibc_denom, metadata),
        GovernanceProposal::Airdrop {
            denom,
            recipients,
            amounts,
        } => airdrop(deps, denom, recipients, amounts),
        GovernanceProposal::MonitoredErc20Tokens {
            evm_chain_prefix,
            tokens,
        } => monitored_erc20_tokens(deps, evm_chain_prefix, tokens),
    }
}

fn unhalt_bridge(
    deps: DepsMut,
    evm_chain_prefix: String,
    target_nonce: u64,
) -> Result<Response, ContractError> {
    ensure_chain(deps.storage, &evm_chain_prefix)?;
    let deleted = rollback_attestations(deps.storage, &evm_chain_prefix, target_nonce)?;

    Ok(Response::new()
        .add_attribute("action", "unhalt_bridge")
        .add_attribute("evm_chain_prefix", evm_chain_prefix)
        .add_attribute("target_nonce", target_nonce.to_string())
        .add_attribute("deleted_attestations", deleted.to_string()))
}

fn add_evm_chain(
    deps: DepsMut,
    chain: EvmChain,
    gravity_id: String,
    bridge_ethereum_address: String,
    inbound_fee_basis_points: u64,
) -> Result<Response, ContractError> {
    let prefix = chain.evm_chain_prefix.clone();
    if prefix.is_empty()
        || prefix
            .chars()
            .any(|c| !c.is_ascii_lowercase() && !c.is_ascii_digit())
    {
        return Err(ContractError::InvalidProposal {
            reason: format!("invalid evm chain prefix {:?}", prefix),
        });
    }
    if EVM_CHAINS.has(deps.storage, &prefix) {
        return Err(ContractError::EvmChainAlreadyExists { prefix });
    }
    for existing in chain_prefixes(deps.storage)? {
        let existing = EVM_CHAINS.load(deps.storage, &existing)?;
        if existing.evm_chain_net_version == chain.evm_chain_net_version {
            return Err(ContractError::DuplicateNetVersion {
                net_version: chain.evm_chain_net_version,
            });
        }
    }
    validate_gravity_id(&gravity_id)?;
    validate_fee_bps(inbound_fee_basis_points)?;

    // a malformed address is stored as the zero address until params fix it
    let bridge_address =
        EthAddress::parse(&bridge_ethereum_address).unwrap_or_else(|_| EthAddress::zero());

    let chain_params = EvmChainParams {
        evm_chain_prefix: prefix.clone(),
        gravity_id,
        bridge_ethereum_address: bridge_address.clone(),
        bridge_chain_id: chain.evm_chain_net_version,
        average_ethereum_block_time: DEFAULT_EVM_BLOCK_TIME,
        bridge_active: true,
        ethereum_blacklist: vec![],
        inbound_fee_basis_points,
    };
    let mut params = PARAMS.load(deps.storage)?;
    match params.chain_mut(&prefix) {
        Some(existing) => *existing = chain_params,
        None => params.evm_chain_params.push(chain_params),
    }
    PARAMS.save(deps.storage, &params)?;
    init_chain(deps.storage, &chain)?;

    Ok(Response::new()
        .add_attribute("action", "add_evm_chain")
        .add_attribute("evm_chain_prefix", prefix)
        .add_attribute("evm_chain_name", chain.evm_chain_name)
        .add_attribute("net_version", chain.evm_chain_net_version.to_string())
        .add_attribute("bridge_ethereum_address", bridge_address.as_str()))
}

fn remove_evm_chain(deps: DepsMut, evm_chain_prefix: String) -> Result<Response, ContractError> {
    ensure_chain(deps.storage, &evm_chain_prefix)?;

    let mut params = PARAMS.load(deps.storage)?;
    params
        .evm_chain_params
        .retain(|p| p.evm_chain_prefix != evm_chain_prefix);
    PARAMS.save(deps.storage, &params)?;
    remove_chain_state(deps.storage, &evm_chain_prefix)?;

    Ok(Response::new()
        .add_attribute("action", "remove_evm_chain")
        .add_attribute("evm_chain_prefix", evm_chain_prefix))
}

fn ibc_metadata(
    deps: DepsMut,
    evm_chain_prefix: String,
    ibc_denom: String,
    metadata: DenomMetadata,
) -> Result<Response, ContractError> {
    ensure_chain(deps.storage, &evm_chain_prefix)?;
    if !ibc_denom.starts_with("ibc/") && !ibc_denom.starts_with("IBC/") {
        return Err(ContractError::InvalidProposal {
            reason: format!("{} is not an ibc denom", ibc_denom),
        });
    }
    if metadata.base != ibc_denom {
        return Err(ContractError::InvalidProposal {
            reason: format!(
                "metadata base {} does not match denom {}",
                metadata.base, ibc_denom
            ),
        });
    }
    store_metadata(deps.storage, &metadata)?;

    Ok(Response::new()
        .add_attribute("action", "ibc_metadata")
        .add_attribute("evm_chain_prefix", evm_chain_prefix)
        .add_attribute("denom", ibc_denom))
}

fn airdrop(
    deps: DepsMut,
    denom: String,
    recipients: Vec<String>,
    amounts: Vec<Uint128>,
) -> Result<Response, ContractError> {
    if recipients.is_empty() || recipients.len() != amounts.len() {
        return Err(ContractError::InvalidProposal {
            reason: format!(
                "{} recipients for {} amounts",
                recipients.len(),
                amounts.len()
            ),
        });
    }
    let recipients = recipients
        .iter()
        .map(|r| deps.api.addr_validate(r))
        .collect::<Result<Vec<_>, StdError>>()?;
    let total = amounts
        .iter()
        .try_fold(Uint128::zero(), |acc, amount| acc.checked_add(*amount))
        .map_err(StdError::from)?;

    let asset = debit_community_pool(deps.storage, &denom, total)?;
    let msgs = recipients
        .iter()
        .zip(amounts.iter())
        .filter(|(_, amount)| !amount.is_zero())
        .map(|(recipient, amount)| asset.transfer_msg(recipient.as_str(), *amount))
        .collect::<Result<Vec<_>, StdError>>()?;

    Ok(Response::new()
        .add_attribute("action", "airdrop")
        .add_attribute("denom", denom)
        .add_attribute("recipients", recipients.len().to_string())
        .add_attribute("total", total)
        .add_messages(msgs))
}

fn monitored_erc20_tokens(
    deps: DepsMut,
    evm_chain_prefix: String,
    tokens: Vec<String>,
) -> Result<Response, ContractError> {
    ensure_chain(deps.storage, &evm_chain_prefix)?;
    let prefix = evm_chain_prefix.as_str();

    let tokens = tokens
        .iter()
        .map(|t| {
            EthAddress::parse(t).map_err(|e| ContractError::InvalidProposal {
                reason: e.to_string(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    for token in &tokens {
        check_monitored_token(deps.storage, prefix, token)?;
    }
    MONITORED_ERC20_TOKENS.save(deps.storage, prefix, &tokens)?;

    Ok(Response::new()
        .add_attribute("action", "monitored_erc20_tokens")
        .add_attribute("evm_chain_prefix", evm_chain_prefix)
        .add_attribute("count", tokens.len().to_string()))
}

/// A cosmos-originated token must be the registered representation of its denom
fn check_monitored_token(
    storage: &dyn Storage,
    evm_chain_prefix: &str,
    token: &EthAddress,
) -> Result<(), ContractError> {
    let Some(asset) = ERC20_TO_ASSET.may_load(storage, (evm_chain_prefix, token.as_str()))?
    else {
        return Ok(());
    };
    if !asset.is_native() {
        return Ok(());
    }
    match ASSET_TO_ERC20.may_load(storage, (evm_chain_prefix, &asset.key()))? {
        Some(registered) if &registered == token => Ok(()),
        Some(registered) => Err(ContractError::InvalidProposal {
            reason: format!(
                "{} is cosmos originated ({}) but its registered representation is {}",
                token, asset, registered
            ),
        }),
        None => Err(ContractError::InvalidProposal {
            reason: format!(
                "{} is cosmos originated ({}) but no representation is registered",
                token, asset
            ),
        }),
    }
}

fn validate_gravity_id(gravity_id: &str) -> Result<(), ContractError> {
    if gravity_id.is_empty() || gravity_id.len() > MAX_GRAVITY_ID_LEN {
        return Err(ContractError::InvalidParams {
            reason: format!("gravity id must be 1 to {} bytes", MAX_GRAVITY_ID_LEN),
        });
    }
    Ok(())
}

// ============================================================================
// UpdateParams — Authority
// ============================================================================

pub fn execute_update_params(
    deps: DepsMut,
    info: MessageInfo,
    params: Params,
) -> Result<Response, ContractError> {
    let config = CONFIG.load(deps.storage)?;
    if info.sender != config.authority {
        return Err(ContractError::Unauthorized);
    }

    let mut registered = chain_prefixes(deps.storage)?;
    registered.sort();
    validate_params(&params, &registered)?;
    PARAMS.save(deps.storage, &params)?;

    Ok(Response::new()
        .add_attribute("action", "update_params")
        .add_attribute(
            "attestation_threshold_percent",
            params.attestation_threshold_percent.to_string(),
        )
        .add_attribute("chains", params.evm_chain_params.len().to_string()))
}

/// Check params against the sorted list of registered chain prefixes.
pub fn validate_params(params: &Params, registered: &[String]) -> Result<(), ContractError> {
    let invalid = |reason: String| ContractError::InvalidParams { reason };

    if params.attestation_threshold_percent == 0 || params.attestation_threshold_percent > 100 {
        return Err(invalid(format!(
            "attestation threshold {} must be within 1..=100",
            params.attestation_threshold_percent
        )));
    }
    if params.valset_power_change_percent > 100 {
        return Err(invalid("valset power change percent above 100".to_string()));
    }
    if params.max_batch_size == 0 {
        return Err(invalid("max batch size must be positive".to_string()));
    }
    if params.average_block_time == 0 {
        return Err(invalid("average block time must be positive".to_string()));
    }

    let mut prefixes: Vec<String> = params
        .evm_chain_params
        .iter()
        .map(|p| p.evm_chain_prefix.clone())
        .collect();
    prefixes.sort();
    if prefixes != registered {
        return Err(invalid(format!(
            "chain params {:?} do not match registered chains {:?}",
            prefixes, registered
        )));
    }
    for chain in &params.evm_chain_params {
        validate_gravity_id(&chain.gravity_id)?;
        validate_fee_bps(chain.inbound_fee_basis_points)?;
    }
    Ok(())
}
