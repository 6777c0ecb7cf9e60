//! State definitions for the Gravity bridge contract
//!
//! Every per-chain store is keyed by the EVM chain prefix as its first key
//! component, so that removing a chain is a prefix sweep and no two chains
//! ever share a record.

use cosmwasm_schema::cw_serde;
use cosmwasm_std::{Addr, Binary, Coin, Uint128};
use cw_storage_plus::{Item, Map};

use common::{Asset, AssetInfo, EthAddress};

use crate::claims::Claim;

/// Contract name for cw2 migration info
pub const CONTRACT_NAME: &str = "crates.io:gravity";
/// Contract version for cw2 migration info
pub const CONTRACT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// State layout version this code reads and writes
pub const CURRENT_SCHEMA_VERSION: u32 = 3;

// ============================================================================
// Core Configuration
// ============================================================================

/// Contract configuration
#[cw_serde]
pub struct Config {
    /// Address allowed to submit governance proposals and privileged messages
    pub authority: Addr,
    /// Receives the inbound bridge fee
    pub fee_collector: Addr,
    /// Bech32 prefix of local accounts
    pub native_prefix: String,
}

/// Module parameters
#[cw_serde]
pub struct Params {
    /// Blocks a validator has to confirm a valset before being slashable
    pub signed_valsets_window: u64,
    /// Blocks a validator has to confirm a batch before being slashable
    pub signed_batches_window: u64,
    /// Blocks a validator has to confirm a logic call before being slashable
    pub signed_logic_calls_window: u64,
    /// Batch timeout target in milliseconds
    pub target_batch_timeout: u64,
    /// Average local block time in milliseconds
    pub average_block_time: u64,
    /// Share of total power (in percent) an attestation needs to be observed
    pub attestation_threshold_percent: u64,
    /// Normalized power change (in percent) that triggers a new valset
    pub valset_power_change_percent: u64,
    /// Validators below this consensus power are left out of valsets
    pub valset_min_power: u64,
    /// Blocks after which a new valset is requested regardless of changes; 0 disables
    pub valset_interval_blocks: u64,
    /// Maximum number of transfers per batch
    pub max_batch_size: u32,
    /// Pending IBC forwards drained at the end of each block
    pub ibc_forwards_per_block: u32,
    /// Relative timeout of an IBC auto-forward in seconds
    pub ibc_forward_timeout_seconds: u64,
    /// Per-chain parameters
    pub evm_chain_params: Vec<EvmChainParams>,
}

/// Parameters of a single EVM chain
#[cw_serde]
pub struct EvmChainParams {
    pub evm_chain_prefix: String,
    /// Domain separator mixed into every checkpoint
    pub gravity_id: String,
    pub bridge_ethereum_address: EthAddress,
    pub bridge_chain_id: u64,
    /// Average EVM block time in milliseconds
    pub average_ethereum_block_time: u64,
    pub bridge_active: bool,
    pub ethereum_blacklist: Vec<EthAddress>,
    /// Fee deducted from inbound deposits, in basis points
    pub inbound_fee_basis_points: u64,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            signed_valsets_window: 10_000,
            signed_batches_window: 10_000,
            signed_logic_calls_window: 10_000,
            // 12 hours
            target_batch_timeout: 43_200_000,
            average_block_time: 5_000,
            attestation_threshold_percent: 66,
            valset_power_change_percent: 5,
            valset_min_power: 0,
            valset_interval_blocks: 0,
            max_batch_size: 100,
            ibc_forwards_per_block: 10,
            ibc_forward_timeout_seconds: 600,
            evm_chain_params: vec![],
        }
    }
}

impl Params {
    pub fn chain(&self, prefix: &str) -> Option<&EvmChainParams> {
        self.evm_chain_params
            .iter()
            .find(|p| p.evm_chain_prefix == prefix)
    }

    pub fn chain_mut(&mut self, prefix: &str) -> Option<&mut EvmChainParams> {
        self.evm_chain_params
            .iter_mut()
            .find(|p| p.evm_chain_prefix == prefix)
    }
}

impl EvmChainParams {
    pub fn is_blacklisted(&self, address: &EthAddress) -> bool {
        self.ethereum_blacklist.contains(address)
    }
}

/// A registered EVM chain
#[cw_serde]
pub struct EvmChain {
    pub evm_chain_prefix: String,
    pub evm_chain_name: String,
    pub evm_chain_net_version: u64,
}

// ============================================================================
// Bridge Data Types
// ============================================================================

/// Last EVM block height covered by an observed attestation
#[cw_serde]
#[derive(Default)]
pub struct LastObservedEvmHeight {
    pub evm_block_height: u64,
    pub cosmos_block_height: u64,
}

/// A signer in an EVM validator set
#[cw_serde]
pub struct BridgeValidator {
    /// Normalized power, scaled so the set sums to at most `u32::MAX`
    pub power: u64,
    pub ethereum_address: EthAddress,
}

/// A validator set snapshot as mirrored on the EVM bridge contract
#[cw_serde]
pub struct Valset {
    pub nonce: u64,
    pub members: Vec<BridgeValidator>,
    /// Local block height at which the snapshot was taken
    pub height: u64,
}

/// An amount of an EVM token
#[cw_serde]
pub struct Erc20Token {
    pub contract: EthAddress,
    pub amount: Uint128,
}

/// A transfer waiting in the pool or carried by a batch
#[cw_serde]
pub struct OutgoingTransferTx {
    pub id: u64,
    pub sender: Addr,
    pub dest_address: EthAddress,
    pub erc20_token: Erc20Token,
    pub erc20_fee: Erc20Token,
}

/// A batch of transfers of one token
#[cw_serde]
pub struct OutgoingTxBatch {
    pub batch_nonce: u64,
    /// EVM block height after which the batch cannot be executed
    pub batch_timeout: u64,
    pub transactions: Vec<OutgoingTransferTx>,
    pub token_contract: EthAddress,
    pub cosmos_block_created: u64,
}

impl OutgoingTxBatch {
    pub fn total_fee(&self) -> Uint128 {
        self.transactions
            .iter()
            .map(|tx| tx.erc20_fee.amount)
            .fold(Uint128::zero(), |acc, fee| acc + fee)
    }
}

/// An arbitrary contract call executed by the EVM bridge
#[cw_serde]
pub struct OutgoingLogicCall {
    pub transfers: Vec<Erc20Token>,
    pub fees: Vec<Erc20Token>,
    pub logic_contract_address: EthAddress,
    pub payload: Binary,
    pub timeout: u64,
    pub invalidation_id: Binary,
    pub invalidation_nonce: u64,
    pub cosmos_block_created: u64,
}

/// Votes collected for one claim
#[cw_serde]
pub struct Attestation {
    pub claim: Claim,
    /// Validator operator addresses, in vote order
    pub votes: Vec<String>,
    pub observed: bool,
    /// Local height at which the attestation was created
    pub height: u64,
}

/// A deposit waiting to be forwarded to a foreign chain over IBC
#[cw_serde]
pub struct PendingIbcAutoForward {
    pub foreign_receiver: String,
    pub token: Coin,
    pub ibc_channel: String,
    pub event_nonce: u64,
}

/// Bonded validator with its consensus power
#[cw_serde]
pub struct BondedValidator {
    pub operator_address: String,
    pub power: u64,
}

/// Bridge keys a validator delegated to its orchestrator
#[cw_serde]
pub struct DelegateKeys {
    pub validator: String,
    pub orchestrator: String,
    pub eth_address: EthAddress,
}

#[cw_serde]
pub struct ValsetConfirm {
    pub nonce: u64,
    pub orchestrator: String,
    pub eth_address: EthAddress,
    pub signature: Binary,
}

#[cw_serde]
pub struct BatchConfirm {
    pub nonce: u64,
    pub token_contract: EthAddress,
    pub eth_signer: EthAddress,
    pub orchestrator: String,
    pub signature: Binary,
}

#[cw_serde]
pub struct LogicCallConfirm {
    pub invalidation_id: Binary,
    pub invalidation_nonce: u64,
    pub eth_signer: EthAddress,
    pub orchestrator: String,
    pub signature: Binary,
}

/// Denomination unit of a bank denom
#[cw_serde]
pub struct DenomUnit {
    pub denom: String,
    pub exponent: u32,
    pub aliases: Vec<String>,
}

/// Bank denom metadata, checked against Erc20Deployed claims
#[cw_serde]
pub struct DenomMetadata {
    pub description: String,
    pub denom_units: Vec<DenomUnit>,
    pub base: String,
    pub display: String,
    pub name: String,
    pub symbol: String,
}

impl DenomMetadata {
    /// Decimals of the display unit, if it is listed.
    pub fn display_exponent(&self) -> Option<u32> {
        self.denom_units
            .iter()
            .find(|u| u.denom == self.display)
            .map(|u| u.exponent)
    }
}

/// An IBC forward sent and awaiting its reply
#[cw_serde]
pub struct InFlightForward {
    pub evm_chain_prefix: String,
    pub forward: PendingIbcAutoForward,
}

// ============================================================================
// Storage Keys
// ============================================================================

pub const CONFIG: Item<Config> = Item::new("config");
pub const PARAMS: Item<Params> = Item::new("params");
pub const SCHEMA_VERSION: Item<u32> = Item::new("schema_version");

/// Registered EVM chains: prefix -> chain
pub const EVM_CHAINS: Map<&str, EvmChain> = Map::new("evm_chains");

// ----------------------------------------------------------------------------
// Per-chain nonce trackers
// ----------------------------------------------------------------------------

pub const LAST_OBSERVED_EVENT_NONCE: Map<&str, u64> = Map::new("last_observed_event_nonce");
/// (chain, validator) -> last event nonce the validator voted on
pub const LAST_EVENT_NONCE_BY_VALIDATOR: Map<(&str, &Addr), u64> =
    Map::new("last_event_nonce_by_validator");
pub const LAST_OBSERVED_EVM_HEIGHT: Map<&str, LastObservedEvmHeight> =
    Map::new("last_observed_evm_height");
pub const LAST_OBSERVED_VALSET: Map<&str, Valset> = Map::new("last_observed_valset");
pub const LATEST_VALSET_NONCE: Map<&str, u64> = Map::new("latest_valset_nonce");
pub const LAST_TX_POOL_ID: Map<&str, u64> = Map::new("last_tx_pool_id");
pub const LAST_BATCH_ID: Map<&str, u64> = Map::new("last_batch_id");
pub const LAST_SLASHED_VALSET_NONCE: Map<&str, u64> = Map::new("last_slashed_valset_nonce");
pub const LAST_SLASHED_BATCH_BLOCK: Map<&str, u64> = Map::new("last_slashed_batch_block");
pub const LAST_SLASHED_LOGIC_CALL_BLOCK: Map<&str, u64> =
    Map::new("last_slashed_logic_call_block");

// ----------------------------------------------------------------------------
// Attestations
// ----------------------------------------------------------------------------

/// (chain, event nonce, claim hash) -> attestation
pub const ATTESTATIONS: Map<(&str, u64, &[u8]), Attestation> = Map::new("attestations");

// ----------------------------------------------------------------------------
// Valsets
// ----------------------------------------------------------------------------

pub const VALSETS: Map<(&str, u64), Valset> = Map::new("valsets");
/// (chain, valset nonce, orchestrator) -> confirm
pub const VALSET_CONFIRMS: Map<(&str, u64, &Addr), ValsetConfirm> = Map::new("valset_confirms");

// ----------------------------------------------------------------------------
// Transfer pool & batches
// ----------------------------------------------------------------------------

/// (chain, tx id) -> unbatched transfer
pub const UNBATCHED_TXS: Map<(&str, u64), OutgoingTransferTx> = Map::new("unbatched_txs");
/// (chain, token, fee index key) -> tx id; ascending key order is fee descending
pub const UNBATCHED_BY_FEE: Map<(&str, &str, &[u8]), u64> = Map::new("unbatched_by_fee");
/// (chain, batch nonce) -> batch
pub const BATCHES: Map<(&str, u64), OutgoingTxBatch> = Map::new("batches");
/// (chain, token) -> nonce of the active batch for that token
pub const ACTIVE_BATCH_BY_TOKEN: Map<(&str, &str), u64> = Map::new("active_batch_by_token");
/// (chain, batch nonce, orchestrator) -> confirm
pub const BATCH_CONFIRMS: Map<(&str, u64, &Addr), BatchConfirm> = Map::new("batch_confirms");

// ----------------------------------------------------------------------------
// Logic calls
// ----------------------------------------------------------------------------

/// (chain, invalidation id, invalidation nonce) -> call
pub const LOGIC_CALLS: Map<(&str, &[u8], u64), OutgoingLogicCall> = Map::new("logic_calls");
/// (chain, logic call key, orchestrator) -> confirm
pub const LOGIC_CALL_CONFIRMS: Map<(&str, &[u8], &Addr), LogicCallConfirm> =
    Map::new("logic_call_confirms");
/// (chain, invalidation id) -> highest nonce observed executed on the EVM chain
pub const LAST_EXECUTED_LOGIC_NONCE: Map<(&str, &[u8]), u64> =
    Map::new("last_executed_logic_nonce");

// ----------------------------------------------------------------------------
// Token registry
// ----------------------------------------------------------------------------

/// (chain, erc20 address) -> local asset
pub const ERC20_TO_ASSET: Map<(&str, &str), AssetInfo> = Map::new("erc20_to_asset");
/// (chain, asset key) -> erc20 address
pub const ASSET_TO_ERC20: Map<(&str, &str), EthAddress> = Map::new("asset_to_erc20");
pub const MONITORED_ERC20_TOKENS: Map<&str, Vec<EthAddress>> = Map::new("monitored_erc20_tokens");
/// Bank denom -> metadata
pub const DENOM_METADATA: Map<&str, DenomMetadata> = Map::new("denom_metadata");

// ----------------------------------------------------------------------------
// IBC auto-forwarding
// ----------------------------------------------------------------------------

/// (chain, event nonce) -> forward
pub const PENDING_IBC_AUTO_FORWARDS: Map<(&str, u64), PendingIbcAutoForward> =
    Map::new("pending_ibc_auto_forwards");
/// Foreign bech32 prefix -> local IBC transfer channel
pub const IBC_CHANNELS: Map<&str, String> = Map::new("ibc_channels");
/// Reply id -> forward awaiting its result
pub const IBC_FORWARDS_IN_FLIGHT: Map<u64, InFlightForward> = Map::new("ibc_forwards_in_flight");
pub const NEXT_REPLY_ID: Item<u64> = Item::new("next_reply_id");

// ----------------------------------------------------------------------------
// Delegate keys & staking mirror
// ----------------------------------------------------------------------------

pub const DELEGATE_KEYS: Map<&Addr, DelegateKeys> = Map::new("delegate_keys");
/// Orchestrator -> validator
pub const VALIDATOR_BY_ORCHESTRATOR: Map<&Addr, Addr> = Map::new("validator_by_orchestrator");
/// EVM address -> validator
pub const VALIDATOR_BY_ETH_ADDRESS: Map<&str, Addr> = Map::new("validator_by_eth_address");
/// Bonded validator -> consensus power
pub const BONDED_VALIDATORS: Map<&Addr, u64> = Map::new("bonded_validators");
pub const LAST_UNBONDING_HEIGHT: Item<u64> = Item::new("last_unbonding_height");

// ----------------------------------------------------------------------------
// Community pool
// ----------------------------------------------------------------------------

/// Asset key -> balance held on behalf of the community pool
pub const COMMUNITY_POOL: Map<&str, Asset> = Map::new("community_pool");

// ============================================================================
// Helpers
// ============================================================================

/// Key under which a logic call's confirms are stored: id followed by the
/// big-endian nonce.
pub fn logic_call_key(invalidation_id: &[u8], invalidation_nonce: u64) -> Vec<u8> {
    let mut key = invalidation_id.to_vec();
    key.extend_from_slice(&invalidation_nonce.to_be_bytes());
    key
}

/// Fee index key: inverted fee then id, both big-endian, so that ascending
/// iteration yields the highest fee first and ties by ascending id.
pub fn fee_index_key(fee: Uint128, id: u64) -> Vec<u8> {
    let mut key = (u128::MAX - fee.u128()).to_be_bytes().to_vec();
    key.extend_from_slice(&id.to_be_bytes());
    key
}
