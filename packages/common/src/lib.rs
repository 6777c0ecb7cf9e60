//! Common - Shared Types and Utilities for the Gravity Bridge Contracts
//!
//! This package provides the asset and EVM address types shared by the
//! gravity contract, its messages and its tests.

pub mod asset;
pub mod eth_address;

pub use asset::{Asset, AssetInfo};
pub use eth_address::EthAddress;
