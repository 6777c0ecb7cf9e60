//! Execute handlers for the Gravity bridge contract.
//!
//! Handlers are organized by category:
//! - `attestation`, `observe` - claim voting, quorum resolution and effects
//! - `delegate_keys`, `staking` - orchestrator keys and the staking mirror
//! - `confirms`, `valsets` - signatures and validator set snapshots
//! - `pool`, `batch`, `logic_call` - outgoing transfers and calls
//! - `tokens`, `community_pool`, `ibc_forward` - token registry and custody
//! - `governance` - authority proposals and params

pub mod attestation;
pub mod batch;
pub mod community_pool;
pub mod confirms;
pub mod delegate_keys;
pub mod governance;
pub mod ibc_forward;
pub mod logic_call;
pub mod observe;
pub mod pool;
pub mod staking;
pub mod tokens;
pub mod valsets;

pub use attestation::execute_submit_claim;
pub use batch::execute_request_batch;
pub use community_pool::{execute_fund_community_pool, execute_fund_community_pool_cw20};
pub use confirms::{execute_confirm_batch, execute_confirm_logic_call, execute_confirm_valset};
pub use delegate_keys::execute_set_orchestrator_address;
pub use governance::{execute_governance, execute_update_params};
pub use ibc_forward::{execute_ibc_auto_forwards, execute_set_ibc_channel_for_prefix};
pub use logic_call::execute_schedule_logic_call;
pub use pool::{execute_cancel_send_to_eth, execute_receive, execute_send_to_eth};
pub use staking::execute_acknowledge_slashing;
pub use tokens::{execute_register_eth_originated_token, execute_set_denom_metadata};
