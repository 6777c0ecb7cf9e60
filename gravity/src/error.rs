//! Error types for the Gravity bridge contract
//!
//! Every variant belongs to one [`ErrorKind`]. Arithmetic that breaks an
//! internal invariant surfaces as `Std`, aborting the whole message.

use cosmwasm_std::{StdError, Uint128};
use thiserror::Error;

/// Coarse classification of contract errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Nonce gap or duplicate; resubmit at the correct nonce
    OutOfOrder,
    /// Unknown chain, unbound validator, wrong sender
    Unauthorized,
    /// Malformed claim, proposal or message data
    Invalid,
    /// Balance or community pool shortfall
    Insufficient,
    /// Storage, serialization or arithmetic failure
    Std,
}

#[derive(Error, Debug, PartialEq)]
pub enum ContractError {
    #[error("{0}")]
    Std(#[from] StdError),

    // ========================================================================
    // Authorization Errors
    // ========================================================================

    #[error("Unauthorized: only the governance authority can perform this action")]
    Unauthorized,

    #[error("EVM chain not found: {prefix}")]
    EvmChainNotFound { prefix: String },

    #[error("Unauthorized: {address} is not a registered orchestrator")]
    NotOrchestrator { address: String },

    #[error("Unauthorized: validator {validator} is not bonded")]
    ValidatorNotBonded { validator: String },

    #[error("Unauthorized: transfer {id} was not sent by {sender}")]
    NotTransferSender { id: u64, sender: String },

    // ========================================================================
    // Ordering Errors
    // ========================================================================

    #[error("Non contiguous event nonce: expected {expected}, got {got}")]
    NonContiguousEventNonce { expected: u64, got: u64 },

    // ========================================================================
    // Claim & Attestation Errors
    // ========================================================================

    #[error("Invalid claim: {reason}")]
    InvalidClaim { reason: String },

    #[error("Cannot reset bridge to nonce {target}: last observed nonce is {observed}")]
    InvalidRollback { target: u64, observed: u64 },

    // ========================================================================
    // Chain Registry Errors
    // ========================================================================

    #[error("EVM chain {prefix} already exists")]
    EvmChainAlreadyExists { prefix: String },

    #[error("EVM chain net version {net_version} is already registered")]
    DuplicateNetVersion { net_version: u64 },

    #[error("Bridge for EVM chain {prefix} is not active")]
    BridgeInactive { prefix: String },

    // ========================================================================
    // Delegate Key Errors
    // ========================================================================

    #[error("Duplicate delegate key: {reason}")]
    DuplicateDelegateKey { reason: String },

    // ========================================================================
    // Amount, Token & Address Errors
    // ========================================================================

    #[error("Invalid amount: {reason}")]
    InvalidAmount { reason: String },

    #[error("Invalid address: {reason}")]
    InvalidAddress { reason: String },

    #[error("Token not supported on this EVM chain: {token}")]
    TokenNotSupported { token: String },

    #[error("Address {address} is blacklisted")]
    Blacklisted { address: String },

    #[error("Funds mismatch: expected {expected}, got {got}")]
    FundsMismatch { expected: String, got: String },

    #[error("Received amount is empty after deducting batch fees")]
    EmptyAfterBatchFees,

    // ========================================================================
    // Pool & Batch Errors
    // ========================================================================

    #[error("Transfer {id} is not in the unbatched pool")]
    TxNotInPool { id: u64 },

    #[error("No unbatched transfers for token {token}")]
    NoUnbatchedTxs { token: String },

    #[error("A batch is already active for token {token} (batch nonce {batch_nonce})")]
    BatchAlreadyActive { token: String, batch_nonce: u64 },

    #[error("Batch {batch_nonce} not found")]
    BatchNotFound { batch_nonce: u64 },

    // ========================================================================
    // Valset & Logic Call Errors
    // ========================================================================

    #[error("Valset {nonce} not found")]
    ValsetNotFound { nonce: u64 },

    #[error("Logic call {invalidation_nonce} for invalidation id {invalidation_id} not found")]
    LogicCallNotFound {
        invalidation_id: String,
        invalidation_nonce: u64,
    },

    #[error("Stale logic call: nonce {invalidation_nonce} must be greater than {latest}")]
    StaleLogicCall { invalidation_nonce: u64, latest: u64 },

    // ========================================================================
    // Confirmation Errors
    // ========================================================================

    #[error("Invalid signature: {reason}")]
    InvalidSignature { reason: String },

    #[error("Confirmation already submitted by {orchestrator}")]
    DuplicateConfirm { orchestrator: String },

    // ========================================================================
    // Governance Errors
    // ========================================================================

    #[error("Invalid proposal: {reason}")]
    InvalidProposal { reason: String },

    #[error("Invalid params: {reason}")]
    InvalidParams { reason: String },

    #[error("Insufficient custody: {denom} available {available}, required {required}")]
    InsufficientCustody {
        denom: String,
        available: Uint128,
        required: Uint128,
    },

    #[error("Insufficient tokens in community pool: {denom} available {available}, required {required}")]
    InsufficientCommunityPool {
        denom: String,
        available: Uint128,
        required: Uint128,
    },

    // ========================================================================
    // Schema Errors
    // ========================================================================

    #[error("Unsupported state schema version {version}")]
    UnsupportedSchema { version: u32 },

    #[error("State schema mismatch: stored {stored}, code expects {expected}")]
    SchemaMismatch { stored: u32, expected: u32 },

    #[error("Cannot migrate from {stored} to older version {requested}")]
    MigrationDowngrade { stored: String, requested: String },
}

impl ContractError {
    /// Classification used by callers and tests.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ContractError::Std(_) => ErrorKind::Std,

            ContractError::Unauthorized
            | ContractError::EvmChainNotFound { .. }
            | ContractError::NotOrchestrator { .. }
            | ContractError::ValidatorNotBonded { .. }
            | ContractError::NotTransferSender { .. } => ErrorKind::Unauthorized,

            ContractError::NonContiguousEventNonce { .. } => ErrorKind::OutOfOrder,

            ContractError::InsufficientCommunityPool { .. }
            | ContractError::InsufficientCustody { .. } => ErrorKind::Insufficient,

            ContractError::InvalidClaim { .. }
            | ContractError::InvalidRollback { .. }
            | ContractError::EvmChainAlreadyExists { .. }
            | ContractError::DuplicateNetVersion { .. }
            | ContractError::BridgeInactive { .. }
            | ContractError::DuplicateDelegateKey { .. }
            | ContractError::InvalidAmount { .. }
            | ContractError::InvalidAddress { .. }
            | ContractError::TokenNotSupported { .. }
            | ContractError::Blacklisted { .. }
            | ContractError::FundsMismatch { .. }
            | ContractError::EmptyAfterBatchFees
            | ContractError::TxNotInPool { .. }
            | ContractError::NoUnbatchedTxs { .. }
            | ContractError::BatchAlreadyActive { .. }
            | ContractError::BatchNotFound { .. }
            | ContractError::ValsetNotFound { .. }
            | ContractError::LogicCallNotFound { .. }
            | ContractError::StaleLogicCall { .. }
            | ContractError::InvalidSignature { .. }
            | ContractError::DuplicateConfirm { .. }
            | ContractError::InvalidProposal { .. }
            | ContractError::InvalidParams { .. }
            | ContractError::UnsupportedSchema { .. }
            | ContractError::SchemaMismatch { .. }
            | ContractError::MigrationDowngrade { .. } => ErrorKind::Invalid,
        }
    }
}
