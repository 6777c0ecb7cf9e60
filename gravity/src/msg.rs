//! Message types for the Gravity bridge contract
//!
//! This module defines all messages for instantiation, execution, sudo
//! (block hooks and staking events), queries, and their responses.

use common::{Asset, AssetInfo, EthAddress};
use cosmwasm_schema::{cw_serde, QueryResponses};
use cosmwasm_std::{Addr, Binary, Coin, Uint128};
use cw20::Cw20ReceiveMsg;

use crate::claims::Claim;
use crate::genesis::GenesisState;
use crate::state::{
    Attestation, BatchConfirm, DelegateKeys, DenomMetadata, Erc20Token, EvmChain, EvmChainParams,
    LastObservedEvmHeight, LogicCallConfirm, OutgoingLogicCall, OutgoingTransferTx,
    OutgoingTxBatch, Params, PendingIbcAutoForward, Valset, ValsetConfirm,
};

// ============================================================================
// Instantiate & Migrate
// ============================================================================

/// Migrate message
#[cw_serde]
pub struct MigrateMsg {}

/// Instantiate message
#[cw_serde]
pub struct InstantiateMsg {
    /// Governance authority allowed to dispatch proposals
    pub authority: String,
    /// Receiver of inbound bridge fees
    pub fee_collector: String,
    /// Bech32 prefix of local accounts
    pub native_prefix: String,
    /// Initial params; must be omitted when `genesis` is provided
    pub params: Option<Params>,
    /// Raw genesis document of any supported schema version
    pub genesis: Option<Binary>,
}

// ============================================================================
// Execute Messages
// ============================================================================

/// Execute messages
#[cw_serde]
pub enum ExecuteMsg {
    // ========================================================================
    // Orchestrator Messages
    // ========================================================================
    /// Bind the sending validator's orchestrator account and EVM signer
    SetOrchestratorAddress {
        orchestrator: String,
        eth_address: String,
    },

    /// Vote for an EVM event (sent by an orchestrator)
    SubmitClaim {
        evm_chain_prefix: String,
        claim: Claim,
    },

    /// Signature over a valset checkpoint
    ConfirmValset {
        evm_chain_prefix: String,
        nonce: u64,
        eth_signer: String,
        signature: Binary,
    },

    /// Signature over a batch checkpoint
    ConfirmBatch {
        evm_chain_prefix: String,
        nonce: u64,
        token_contract: String,
        eth_signer: String,
        signature: Binary,
    },

    /// Signature over a logic call checkpoint
    ConfirmLogicCall {
        evm_chain_prefix: String,
        invalidation_id: Binary,
        invalidation_nonce: u64,
        eth_signer: String,
        signature: Binary,
    },

    // ========================================================================
    // User Messages
    // ========================================================================
    /// Queue a native token transfer to an EVM chain.
    /// The attached funds must equal `amount + bridge_fee`.
    SendToEth {
        evm_chain_prefix: String,
        eth_dest: String,
        amount: Coin,
        bridge_fee: Coin,
    },

    /// CW20 receive hook (`SendToEth` or `FundCommunityPool`)
    Receive(Cw20ReceiveMsg),

    /// Refund an unbatched transfer to its sender
    CancelSendToEth {
        evm_chain_prefix: String,
        transaction_id: u64,
    },

    /// Build a batch from the highest-fee transfers of a token
    RequestBatch {
        evm_chain_prefix: String,
        token_contract: String,
    },

    /// Send up to `forwards_to_clear` pending IBC auto-forwards
    ExecuteIbcAutoForwards { forwards_to_clear: u64 },

    /// Donate the attached native funds to the community pool
    FundCommunityPool {},

    // ========================================================================
    // Authority Messages
    // ========================================================================
    /// Execute a passed governance proposal
    Governance(GovernanceProposal),

    /// Replace module params. Chain params may be edited but not added or removed.
    UpdateParams { params: Params },

    /// Queue an arbitrary contract call on an EVM chain
    ScheduleLogicCall {
        evm_chain_prefix: String,
        transfers: Vec<Erc20Token>,
        fees: Vec<Erc20Token>,
        logic_contract_address: String,
        payload: Binary,
        timeout: u64,
        invalidation_id: Binary,
        invalidation_nonce: u64,
    },

    /// Pair an EVM-originated ERC20 with the cw20 this contract mints
    RegisterEthOriginatedToken {
        evm_chain_prefix: String,
        token_contract: String,
        cw20_contract: String,
    },

    /// Set the bank metadata of a local denom
    SetDenomMetadata { metadata: DenomMetadata },

    /// Route deposits for a foreign bech32 prefix through an IBC channel.
    /// `None` removes the route.
    SetIbcChannelForPrefix {
        prefix: String,
        channel: Option<String>,
    },

    /// Record how far the slashing collaborator has processed a chain
    AcknowledgeSlashing {
        evm_chain_prefix: String,
        valset_nonce: u64,
        batch_block: u64,
        logic_call_block: u64,
    },
}

/// CW20 receive hook payloads
#[cw_serde]
pub enum ReceiveMsg {
    /// Queue a cw20 transfer; the sent amount covers `bridge_fee` plus the transfer
    SendToEth {
        evm_chain_prefix: String,
        eth_dest: String,
        bridge_fee: Uint128,
    },
    FundCommunityPool {},
}

/// Governance proposals, dispatched exhaustively
#[cw_serde]
pub enum GovernanceProposal {
    /// Roll a halted chain back to `target_nonce`
    UnhaltBridge {
        evm_chain_prefix: String,
        target_nonce: u64,
    },
    AddEvmChain {
        evm_chain_prefix: String,
        evm_chain_name: String,
        evm_chain_net_version: u64,
        gravity_id: String,
        /// Replaced by the zero address when malformed
        bridge_ethereum_address: String,
        inbound_fee_basis_points: u64,
    },
    RemoveEvmChain { evm_chain_prefix: String },
    IbcMetadata {
        evm_chain_prefix: String,
        ibc_denom: String,
        metadata: DenomMetadata,
    },
    /// Pay out of the community pool
    Airdrop {
        denom: String,
        recipients: Vec<String>,
        amounts: Vec<Uint128>,
    },
    MonitoredErc20Tokens {
        evm_chain_prefix: String,
        tokens: Vec<String>,
    },
}

// ============================================================================
// Sudo Messages
// ============================================================================

/// Messages delivered by the host chain
#[cw_serde]
pub enum SudoMsg {
    BeginBlock {},
    EndBlock {},
    Staking(StakingEvent),
}

/// Staking collaborator notifications
#[cw_serde]
pub enum StakingEvent {
    ValidatorBonded { validator: String, power: u64 },
    ValidatorPowerChanged { validator: String, power: u64 },
    ValidatorBeginUnbonding { validator: String },
    ValidatorRemoved { validator: String },
}

// ============================================================================
// Query Messages
// ============================================================================

/// Query messages
#[cw_serde]
#[derive(QueryResponses)]
pub enum QueryMsg {
    // ========================================================================
    // Core Queries
    // ========================================================================
    #[returns(ConfigResponse)]
    Config {},

    #[returns(Params)]
    Params {},

    #[returns(EvmChainResponse)]
    EvmChain { evm_chain_prefix: String },

    #[returns(EvmChainsResponse)]
    EvmChains {
        start_after: Option<String>,
        limit: Option<u32>,
    },

    // ========================================================================
    // Nonces & Attestations
    // ========================================================================
    #[returns(NonceResponse)]
    LastObservedEventNonce { evm_chain_prefix: String },

    #[returns(NonceResponse)]
    LastEventNonceByValidator {
        evm_chain_prefix: String,
        validator: String,
    },

    #[returns(LastObservedEvmHeight)]
    LastObservedEvmBlockHeight { evm_chain_prefix: String },

    /// Attestations at one nonce and whether that nonce is observed
    #[returns(AttestationStatusResponse)]
    AttestationStatus {
        evm_chain_prefix: String,
        event_nonce: u64,
    },

    #[returns(AttestationsResponse)]
    Attestations {
        evm_chain_prefix: String,
        start_after: Option<u64>,
        limit: Option<u32>,
    },

    // ========================================================================
    // Valsets
    // ========================================================================
    /// The valset that would be created now
    #[returns(ValsetResponse)]
    CurrentValset { evm_chain_prefix: String },

    #[returns(ValsetResponse)]
    Valset { evm_chain_prefix: String, nonce: u64 },

    #[returns(ValsetResponse)]
    LatestValset { evm_chain_prefix: String },

    #[returns(ValsetResponse)]
    LastObservedValset { evm_chain_prefix: String },

    #[returns(ValsetConfirmsResponse)]
    ValsetConfirms { evm_chain_prefix: String, nonce: u64 },

    // ========================================================================
    // Pool & Batches
    // ========================================================================
    #[returns(PendingSendToEthResponse)]
    PendingSendToEth {
        evm_chain_prefix: String,
        sender: String,
    },

    #[returns(BatchFeesResponse)]
    BatchFees { evm_chain_prefix: String },

    #[returns(BatchResponse)]
    ActiveBatch {
        evm_chain_prefix: String,
        token_contract: String,
    },

    #[returns(BatchesResponse)]
    OutgoingBatches {
        evm_chain_prefix: String,
        start_after: Option<u64>,
        limit: Option<u32>,
    },

    #[returns(BatchConfirmsResponse)]
    BatchConfirms { evm_chain_prefix: String, nonce: u64 },

    // ========================================================================
    // Logic Calls
    // ========================================================================
    #[returns(LogicCallsResponse)]
    OutgoingLogicCalls { evm_chain_prefix: String },

    #[returns(LogicCallConfirmsResponse)]
    LogicCallConfirms {
        evm_chain_prefix: String,
        invalidation_id: Binary,
        invalidation_nonce: u64,
    },

    // ========================================================================
    // IBC Auto-Forwarding
    // ========================================================================
    #[returns(PendingIbcAutoForwardsResponse)]
    PendingIbcAutoForwards {
        evm_chain_prefix: String,
        limit: Option<u32>,
    },

    #[returns(IbcChannelResponse)]
    IbcChannel { prefix: String },

    // ========================================================================
    // Delegate Keys & Staking
    // ========================================================================
    #[returns(DelegateKeysResponse)]
    DelegateKeyByValidator { validator: String },

    #[returns(DelegateKeysResponse)]
    DelegateKeyByOrchestrator { orchestrator: String },

    #[returns(DelegateKeysResponse)]
    DelegateKeyByEthAddress { eth_address: String },

    #[returns(BondedValidatorsResponse)]
    BondedValidators {},

    #[returns(HeightResponse)]
    LastUnbondingHeight {},

    /// Artifacts the validator's orchestrator has not signed yet
    #[returns(OutstandingConfirmationsResponse)]
    OutstandingConfirmations {
        evm_chain_prefix: String,
        validator: String,
    },

    // ========================================================================
    // Tokens & Community Pool
    // ========================================================================
    #[returns(TokenPairResponse)]
    Erc20ToAsset {
        evm_chain_prefix: String,
        erc20: String,
    },

    #[returns(TokenPairResponse)]
    AssetToErc20 {
        evm_chain_prefix: String,
        asset: AssetInfo,
    },

    #[returns(TokenPairsResponse)]
    TokenPairs { evm_chain_prefix: String },

    #[returns(DenomMetadataResponse)]
    DenomMetadata { denom: String },

    #[returns(MonitoredErc20TokensResponse)]
    MonitoredErc20Tokens { evm_chain_prefix: String },

    #[returns(CommunityPoolResponse)]
    CommunityPool {},

    // ========================================================================
    // Genesis
    // ========================================================================
    #[returns(GenesisState)]
    ExportGenesis {},
}

// ============================================================================
// Query Responses
// ============================================================================

#[cw_serde]
pub struct ConfigResponse {
    pub authority: Addr,
    pub fee_collector: Addr,
    pub native_prefix: String,
    pub schema_version: u32,
}

#[cw_serde]
pub struct EvmChainResponse {
    pub evm_chain: EvmChain,
    pub params: Option<EvmChainParams>,
}

#[cw_serde]
pub struct EvmChainsResponse {
    pub evm_chains: Vec<EvmChain>,
}

#[cw_serde]
pub struct NonceResponse {
    pub nonce: u64,
}

#[cw_serde]
pub struct HeightResponse {
    pub height: u64,
}

/// An attestation with its storage identity
#[cw_serde]
pub struct AttestationInfo {
    pub event_nonce: u64,
    /// Hex encoded claim hash
    pub claim_hash: String,
    pub attestation: Attestation,
}

#[cw_serde]
pub struct AttestationStatusResponse {
    pub event_nonce: u64,
    pub last_observed_nonce: u64,
    pub observed: bool,
    pub attestations: Vec<AttestationInfo>,
}

#[cw_serde]
pub struct AttestationsResponse {
    pub attestations: Vec<AttestationInfo>,
}

#[cw_serde]
pub struct ValsetResponse {
    pub valset: Option<Valset>,
}

#[cw_serde]
pub struct ValsetConfirmsResponse {
    pub confirms: Vec<ValsetConfirm>,
}

#[cw_serde]
pub struct PendingSendToEthResponse {
    pub transfers_in_batches: Vec<OutgoingTransferTx>,
    pub unbatched_transfers: Vec<OutgoingTransferTx>,
}

#[cw_serde]
pub struct BatchFee {
    pub token: EthAddress,
    pub total_fees: Uint128,
    pub tx_count: u64,
}

#[cw_serde]
pub struct BatchFeesResponse {
    pub batch_fees: Vec<BatchFee>,
}

#[cw_serde]
pub struct BatchResponse {
    pub batch: Option<OutgoingTxBatch>,
}

#[cw_serde]
pub struct BatchesResponse {
    pub batches: Vec<OutgoingTxBatch>,
}

#[cw_serde]
pub struct BatchConfirmsResponse {
    pub confirms: Vec<BatchConfirm>,
}

#[cw_serde]
pub struct LogicCallsResponse {
    pub calls: Vec<OutgoingLogicCall>,
}

#[cw_serde]
pub struct LogicCallConfirmsResponse {
    pub confirms: Vec<LogicCallConfirm>,
}

#[cw_serde]
pub struct PendingIbcAutoForwardsResponse {
    pub forwards: Vec<PendingIbcAutoForward>,
}

#[cw_serde]
pub struct IbcChannelResponse {
    pub channel: Option<String>,
}

#[cw_serde]
pub struct DelegateKeysResponse {
    pub keys: Option<DelegateKeys>,
}

#[cw_serde]
pub struct BondedValidatorsResponse {
    pub validators: Vec<crate::state::BondedValidator>,
    pub total_power: u64,
}

#[cw_serde]
pub struct LogicCallId {
    pub invalidation_id: Binary,
    pub invalidation_nonce: u64,
}

#[cw_serde]
pub struct OutstandingConfirmationsResponse {
    pub last_unbonding_height: u64,
    pub valsets: Vec<u64>,
    pub batches: Vec<u64>,
    pub logic_calls: Vec<LogicCallId>,
}

/// An ERC20 and the local asset it represents
#[cw_serde]
pub struct TokenPair {
    pub erc20: EthAddress,
    pub asset: AssetInfo,
}

#[cw_serde]
pub struct TokenPairResponse {
    pub pair: Option<TokenPair>,
}

#[cw_serde]
pub struct TokenPairsResponse {
    pub pairs: Vec<TokenPair>,
}

#[cw_serde]
pub struct DenomMetadataResponse {
    pub metadata: Option<DenomMetadata>,
}

#[cw_serde]
pub struct MonitoredErc20TokensResponse {
    pub tokens: Vec<EthAddress>,
}

#[cw_serde]
pub struct CommunityPoolResponse {
    pub balances: Vec<Asset>,
}
