//! Token pair registry and denom metadata.
//!
//! Cosmos-originated denoms are paired with the ERC20 the EVM bridge deploys
//! for them through an observed `Erc20Deployed` claim. EVM-originated ERC20s
//! are paired by the authority with the cw20 contract this bridge mints.

use cosmwasm_std::{DepsMut, MessageInfo, Response, StdResult, Storage};

use common::{AssetInfo, EthAddress};

use crate::claims::Erc20DeployedClaim;
use crate::error::ContractError;
use crate::registry::{chain_prefixes, ensure_chain};
use crate::state::{DenomMetadata, ASSET_TO_ERC20, CONFIG, DENOM_METADATA, ERC20_TO_ASSET};

/// Pair an ERC20 with a local asset, failing if either side is taken.
pub fn save_token_pair(
    storage: &mut dyn Storage,
    evm_chain_prefix: &str,
    erc20: &EthAddress,
    asset: &AssetInfo,
) -> Result<(), ContractError> {
    check_unpaired(storage, evm_chain_prefix, erc20, asset)?;
    ERC20_TO_ASSET.save(storage, (evm_chain_prefix, erc20.as_str()), asset)?;
    ASSET_TO_ERC20.save(storage, (evm_chain_prefix, &asset.key()), erc20)?;
    Ok(())
}

fn check_unpaired(
    storage: &dyn Storage,
    evm_chain_prefix: &str,
    erc20: &EthAddress,
    asset: &AssetInfo,
) -> Result<(), ContractError> {
    if ERC20_TO_ASSET.has(storage, (evm_chain_prefix, erc20.as_str())) {
        return Err(ContractError::InvalidClaim {
            reason: format!("ERC20 {} is already paired on {}", erc20, evm_chain_prefix),
        });
    }
    if ASSET_TO_ERC20.has(storage, (evm_chain_prefix, &asset.key())) {
        return Err(ContractError::InvalidClaim {
            reason: format!("{} already has an ERC20 on {}", asset, evm_chain_prefix),
        });
    }
    Ok(())
}

/// Whether `denom` has an ERC20 representation on any chain
pub fn has_erc20_representation(storage: &dyn Storage, denom: &str) -> StdResult<bool> {
    for prefix in chain_prefixes(storage)? {
        if ASSET_TO_ERC20.has(storage, (prefix.as_str(), denom)) {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Effect of an observed `Erc20Deployed` claim.
///
/// The deployed ERC20 must describe the denom exactly as its metadata does.
/// A denom without metadata must be deployed with its denom as name, an
/// empty symbol and zero decimals.
pub fn observe_erc20_deployed(
    storage: &mut dyn Storage,
    evm_chain_prefix: &str,
    claim: &Erc20DeployedClaim,
) -> Result<(), ContractError> {
    let asset = AssetInfo::native(&claim.cosmos_denom);
    check_unpaired(storage, evm_chain_prefix, &claim.token_contract, &asset)?;

    match DENOM_METADATA.may_load(storage, &claim.cosmos_denom)? {
        Some(metadata) => {
            if claim.name != metadata.name {
                return Err(mismatch("name", &metadata.name, &claim.name));
            }
            if claim.symbol != metadata.symbol {
                return Err(mismatch("symbol", &metadata.symbol, &claim.symbol));
            }
            let decimals = metadata.display_exponent().unwrap_or_default() as u64;
            if claim.decimals != decimals {
                return Err(mismatch(
                    "decimals",
                    &decimals.to_string(),
                    &claim.decimals.to_string(),
                ));
            }
        }
        None => {
            if claim.name != claim.cosmos_denom {
                return Err(mismatch("name", &claim.cosmos_denom, &claim.name));
            }
            if !claim.symbol.is_empty() {
                return Err(mismatch("symbol", "", &claim.symbol));
            }
            if claim.decimals != 0 {
                return Err(mismatch("decimals", "0", &claim.decimals.to_string()));
            }
        }
    }

    save_token_pair(storage, evm_chain_prefix, &claim.token_contract, &asset)
}

fn mismatch(field: &str, expected: &str, got: &str) -> ContractError {
    ContractError::InvalidClaim {
        reason: format!(
            "ERC20 {} does not match denom metadata: expected {:?}, got {:?}",
            field, expected, got
        ),
    }
}

/// Checks the bank module applies to denom metadata
pub fn validate_metadata(metadata: &DenomMetadata) -> Result<(), ContractError> {
    let invalid = |reason: &str| ContractError::InvalidProposal {
        reason: format!("invalid metadata: {}", reason),
    };

    if metadata.name.trim().is_empty() {
        return Err(invalid("name is empty"));
    }
    if metadata.symbol.trim().is_empty() {
        return Err(invalid("symbol is empty"));
    }
    if metadata.base.trim().is_empty() {
        return Err(invalid("base denom is empty"));
    }
    if metadata.display.trim().is_empty() {
        return Err(invalid("display denom is empty"));
    }

    let first = metadata
        .denom_units
        .first()
        .ok_or_else(|| invalid("no denom units"))?;
    if first.denom != metadata.base || first.exponent != 0 {
        return Err(invalid("the first denom unit must be the base with exponent 0"));
    }
    for pair in metadata.denom_units.windows(2) {
        if pair[1].exponent <= pair[0].exponent {
            return Err(invalid("denom unit exponents must be strictly increasing"));
        }
    }
    if metadata.display_exponent().is_none() {
        return Err(invalid("display denom is not a denom unit"));
    }
    Ok(())
}

// ============================================================================
// RegisterEthOriginatedToken — Authority
// ============================================================================

pub fn execute_register_eth_originated_token(
    deps: DepsMut,
    info: MessageInfo,
    evm_chain_prefix: String,
    token_contract: String,
    cw20_contract: String,
) -> Result<Response, ContractError> {
    let config = CONFIG.load(deps.storage)?;
    if info.sender != config.authority {
        return Err(ContractError::Unauthorized);
    }
    ensure_chain(deps.storage, &evm_chain_prefix)?;

    let erc20 = EthAddress::parse(&token_contract).map_err(|e| ContractError::InvalidAddress {
        reason: e.to_string(),
    })?;
    let cw20 = deps.api.addr_validate(&cw20_contract)?;
    save_token_pair(
        deps.storage,
        &evm_chain_prefix,
        &erc20,
        &AssetInfo::cw20(cw20.clone()),
    )?;

    Ok(Response::new()
        .add_attribute("action", "register_eth_originated_token")
        .add_attribute("evm_chain_prefix", evm_chain_prefix)
        .add_attribute("token_contract", erc20.as_str())
        .add_attribute("cw20_contract", cw20))
}

// ============================================================================
// SetDenomMetadata — Authority
// ============================================================================

pub fn execute_set_denom_metadata(
    deps: DepsMut,
    info: MessageInfo,
    metadata: DenomMetadata,
) -> Result<Response, ContractError> {
    let config = CONFIG.load(deps.storage)?;
    if info.sender != config.authority {
        return Err(ContractError::Unauthorized);
    }
    store_metadata(deps.storage, &metadata)?;

    Ok(Response::new()
        .add_attribute("action", "set_denom_metadata")
        .add_attribute("denom", metadata.base))
}

/// Validate and save metadata; existing metadata is frozen once an ERC20
/// represents the denom.
pub fn store_metadata(
    storage: &mut dyn Storage,
    metadata: &DenomMetadata,
) -> Result<(), ContractError> {
    validate_metadata(metadata)?;
    if DENOM_METADATA.has(storage, &metadata.base)
        && has_erc20_representation(storage, &metadata.base)?
    {
        return Err(ContractError::InvalidProposal {
            reason: format!(
                "metadata of {} can only be changed before its ERC20 is deployed",
                metadata.base
            ),
        });
    }
    DENOM_METADATA.save(storage, &metadata.base, metadata)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::init_chain;
    use crate::state::{DenomUnit, EvmChain};
    use cosmwasm_std::testing::mock_dependencies;

    fn metadata() -> DenomMetadata {
        DenomMetadata {
            description: "Graviton".to_string(),
            denom_units: vec![
                DenomUnit {
                    denom: "ugraviton".to_string(),
                    exponent: 0,
                    aliases: vec![],
                },
                DenomUnit {
                    denom: "graviton".to_string(),
                    exponent: 6,
                    aliases: vec![],
                },
            ],
            base: "ugraviton".to_string(),
            display: "graviton".to_string(),
            name: "Graviton".to_string(),
            symbol: "GRAV".to_string(),
        }
    }

    fn deployed(name: &str, symbol: &str, decimals: u64) -> Erc20DeployedClaim {
        Erc20DeployedClaim {
            event_nonce: 1,
            evm_block_height: 1,
            cosmos_denom: "ugraviton".to_string(),
            token_contract: EthAddress::from_bytes([0xaa; 20]),
            name: name.to_string(),
            symbol: symbol.to_string(),
            decimals,
        }
    }

    #[test]
    fn test_deployed_erc20_must_match_metadata() {
        let mut deps = mock_dependencies();
        let storage = deps.as_mut().storage;
        init_chain(
            storage,
            &EvmChain {
                evm_chain_prefix: "eth".to_string(),
                evm_chain_name: "Ethereum".to_string(),
                evm_chain_net_version: 1,
            },
        )
        .unwrap();
        store_metadata(storage, &metadata()).unwrap();

        let err = observe_erc20_deployed(storage, "eth", &deployed("Graviton", "GRAV", 18))
            .unwrap_err();
        assert!(matches!(err, ContractError::InvalidClaim { .. }));
        let erc20 = EthAddress::from_bytes([0xaa; 20]);
        assert!(!ERC20_TO_ASSET.has(storage, ("eth", erc20.as_str())));

        observe_erc20_deployed(storage, "eth", &deployed("Graviton", "GRAV", 6)).unwrap();
        assert!(has_erc20_representation(storage, "ugraviton").unwrap());

        // frozen now
        let err = store_metadata(storage, &metadata()).unwrap_err();
        assert!(matches!(err, ContractError::InvalidProposal { .. }));

        // and the pair cannot be taken twice
        let err = observe_erc20_deployed(storage, "eth", &deployed("Graviton", "GRAV", 6))
            .unwrap_err();
        assert!(matches!(err, ContractError::InvalidClaim { .. }));
    }

    #[test]
    fn test_denom_without_metadata() {
        let mut deps = mock_dependencies();
        let storage = deps.as_mut().storage;
        assert!(observe_erc20_deployed(storage, "eth", &deployed("Graviton", "", 0)).is_err());
        observe_erc20_deployed(storage, "eth", &deployed("ugraviton", "", 0)).unwrap();
    }

    #[test]
    fn test_metadata_validation() {
        validate_metadata(&metadata()).unwrap();

        let mut bad = metadata();
        bad.display = "kgraviton".to_string();
        assert!(validate_metadata(&bad).is_err());

        let mut bad = metadata();
        bad.denom_units.swap(0, 1);
        assert!(validate_metadata(&bad).is_err());
    }
}
