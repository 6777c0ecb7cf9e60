//! Gravity Bridge Contract - Oracle Core for EVM Chain Bridging
//!
//! Validators' orchestrators observe events on one or more EVM chains and
//! vote on them here. Each chain is an independent context keyed by its
//! prefix, with its own event nonces, valsets, batches and logic calls.
//!
//! # Incoming Flow (Attestations)
//! 1. An orchestrator submits a claim at its validator's next event nonce
//! 2. Votes accumulate on the attestation for (nonce, claim hash)
//! 3. Once voters hold more than the threshold of bonded power, attestations
//!    are observed strictly in nonce order and their effects applied
//!
//! # Outgoing Flow (Batches & Logic Calls)
//! 1. Users queue transfers with a fee; anyone requests a batch per token
//! 2. Orchestrators sign batch, valset and logic call checkpoints
//! 3. The EVM bridge executes them and the execution comes back as a claim
//!
//! # Block Hooks
//! The host chain calls `sudo` at begin and end block and forwards staking
//! events. End block resolves attestations, expires batches and logic calls,
//! requests valsets and drains the IBC auto-forward queue.

pub mod address_codec;
pub mod claims;
pub mod contract;
pub mod error;
pub mod execute;
pub mod fee_manager;
pub mod genesis;
pub mod hash;
pub mod migrations;
pub mod msg;
pub mod nonces;
mod query;
pub mod registry;
pub mod state;
pub mod valset;

pub use crate::claims::Claim;
pub use crate::error::{ContractError, ErrorKind};
pub use crate::genesis::GenesisState;
pub use crate::hash::keccak256;
