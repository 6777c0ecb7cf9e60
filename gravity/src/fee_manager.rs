//! Fee Manager Module
//!
//! Inbound deposits pay a per-chain fee expressed in basis points of the
//! received amount. The fee goes to the configured fee collector, the
//! remainder to the receiver.
//!
//! | Parameter                  | Scope     | Bound          |
//! |----------------------------|-----------|----------------|
//! | `inbound_fee_basis_points` | per chain | 0-1000 (0-10%) |

use cosmwasm_schema::cw_serde;
use cosmwasm_std::{StdError, Storage, Uint128};

use crate::error::ContractError;
use crate::state::{EVM_CHAINS, PARAMS};

// ============================================================================
// Constants
// ============================================================================

/// Maximum inbound fee in basis points (10% = 1000 bps)
pub const MAX_FEE_BPS: u64 = 1000;

/// Basis points denominator (10000 = 100%)
pub const BPS_DENOMINATOR: u128 = 10000;

// ============================================================================
// Data Structures
// ============================================================================

/// Result of splitting a received amount into fee and remainder
#[cw_serde]
pub struct FeeSplit {
    pub fee: Uint128,
    pub remainder: Uint128,
}

// ============================================================================
// Fee Calculation Functions
// ============================================================================

/// Split a received amount for the given chain.
///
/// Fails with `EvmChainNotFound` for an unregistered prefix and with
/// `EmptyAfterBatchFees` when nothing is left for the receiver. The input
/// amount is only read.
pub fn collect_batch_fees(
    storage: &dyn Storage,
    evm_chain_prefix: &str,
    amount: Uint128,
) -> Result<FeeSplit, ContractError> {
    if !EVM_CHAINS.has(storage, evm_chain_prefix) {
        return Err(ContractError::EvmChainNotFound {
            prefix: evm_chain_prefix.to_string(),
        });
    }
    let params = PARAMS.load(storage)?;
    let fee_bps = params
        .chain(evm_chain_prefix)
        .map(|p| p.inbound_fee_basis_points)
        .unwrap_or_default();

    let fee = calculate_fee_from_bps(amount, fee_bps);
    let remainder = amount.checked_sub(fee).map_err(StdError::from)?;
    if remainder.is_zero() {
        return Err(ContractError::EmptyAfterBatchFees);
    }

    Ok(FeeSplit { fee, remainder })
}

/// Calculate fee amount from amount and bps
pub fn calculate_fee_from_bps(amount: Uint128, fee_bps: u64) -> Uint128 {
    amount.multiply_ratio(fee_bps as u128, BPS_DENOMINATOR)
}

/// Validate a fee rate is within bounds
pub fn validate_fee_bps(fee_bps: u64) -> Result<(), ContractError> {
    if fee_bps > MAX_FEE_BPS {
        return Err(ContractError::InvalidParams {
            reason: format!("Inbound fee {} exceeds max {}", fee_bps, MAX_FEE_BPS),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{EvmChain, EvmChainParams, Params};
    use common::EthAddress;
    use cosmwasm_std::testing::mock_dependencies;

    fn setup(storage: &mut dyn Storage, fee_bps: u64) {
        EVM_CHAINS
            .save(
                storage,
                "eth",
                &EvmChain {
                    evm_chain_prefix: "eth".to_string(),
                    evm_chain_name: "Ethereum".to_string(),
                    evm_chain_net_version: 1,
                },
            )
            .unwrap();
        PARAMS
            .save(
                storage,
                &Params {
                    signed_valsets_window: 10_000,
                    signed_batches_window: 10_000,
                    signed_logic_calls_window: 10_000,
                    target_batch_timeout: 43_200_000,
                    average_block_time: 5_000,
                    attestation_threshold_percent: 66,
                    valset_power_change_percent: 5,
                    valset_min_power: 0,
                    valset_interval_blocks: 0,
                    max_batch_size: 100,
                    ibc_forwards_per_block: 10,
                    ibc_forward_timeout_seconds: 600,
                    evm_chain_params: vec![EvmChainParams {
                        evm_chain_prefix: "eth".to_string(),
                        gravity_id: "foo".to_string(),
                        bridge_ethereum_address: EthAddress::zero(),
                        bridge_chain_id: 1,
                        average_ethereum_block_time: 15_000,
                        bridge_active: true,
                        ethereum_blacklist: vec![],
                        inbound_fee_basis_points: fee_bps,
                    }],
                },
            )
            .unwrap();
    }

    #[test]
    fn test_calculate_fee_from_bps() {
        // 0.5% of 1000 = 5
        let fee = calculate_fee_from_bps(Uint128::from(1000u128), 50);
        assert_eq!(fee, Uint128::from(5u128));

        // 0% of 1000 = 0
        let fee = calculate_fee_from_bps(Uint128::from(1000u128), 0);
        assert_eq!(fee, Uint128::zero());
    }

    #[test]
    fn test_collect_batch_fees_splits_amount() {
        let mut deps = mock_dependencies();
        setup(deps.as_mut().storage, 100);

        let amount = Uint128::new(1000);
        let split = collect_batch_fees(deps.as_ref().storage, "eth", amount).unwrap();
        assert_eq!(split.fee, Uint128::new(10));
        assert_eq!(split.remainder, Uint128::new(990));
        assert_eq!(amount, Uint128::new(1000));
    }

    #[test]
    fn test_collect_batch_fees_empty_remainder() {
        let mut deps = mock_dependencies();
        setup(deps.as_mut().storage, 100);

        let amount = Uint128::zero();
        let err = collect_batch_fees(deps.as_ref().storage, "eth", amount).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Received amount is empty after deducting batch fees"
        );
        assert_eq!(err.kind(), crate::error::ErrorKind::Invalid);
        assert!(amount.is_zero());
    }

    #[test]
    fn test_collect_batch_fees_unknown_chain() {
        let mut deps = mock_dependencies();
        setup(deps.as_mut().storage, 100);

        let err = collect_batch_fees(deps.as_ref().storage, "bsc", Uint128::new(1)).unwrap_err();
        assert_eq!(
            err,
            ContractError::EvmChainNotFound {
                prefix: "bsc".to_string()
            }
        );
    }

    #[test]
    fn test_collect_batch_fees_fee_above_amount_is_error() {
        let mut deps = mock_dependencies();
        // stored without validation
        setup(deps.as_mut().storage, 20_000);

        let err =
            collect_batch_fees(deps.as_ref().storage, "eth", Uint128::new(1000)).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Std);
        assert!(err.to_string().contains("Overflow"));
    }

    #[test]
    fn test_validate_fee_bps() {
        assert!(validate_fee_bps(0).is_ok());
        assert!(validate_fee_bps(1000).is_ok());
        assert!(validate_fee_bps(1001).is_err());
    }
}
