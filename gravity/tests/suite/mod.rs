//! Shared cw-multi-test harness for the gravity integration tests.
//!
//! Each test binary only uses part of the harness.
#![allow(dead_code)]

use cosmwasm_std::{coins, Addr, Binary, Empty, Uint128};
use cw_multi_test::{next_block, App, AppResponse, ContractWrapper, Executor};
use libsecp256k1::{Message, PublicKey, SecretKey};
use serde::de::DeserializeOwned;

use common::EthAddress;
use gravity::claims::{BatchSendToEthClaim, Erc20DeployedClaim, SendToCosmosClaim};
use gravity::hash::{eth_signed_message_hash, keccak256};
use gravity::msg::{ExecuteMsg, GovernanceProposal, InstantiateMsg, QueryMsg, StakingEvent, SudoMsg};
use gravity::Claim;

pub type AnyResult<T> = cw_multi_test::error::AnyResult<T>;

pub const AUTHORITY: &str = "authority";
pub const FEE_COLLECTOR: &str = "fees";
pub const USER: &str = "user";
pub const NATIVE_PREFIX: &str = "gravity";
pub const DENOM: &str = "ugraviton";

/// ERC20 deployed on "eth" for `DENOM`
pub const ETH_UGRAVITON: &str = "0x1111111111111111111111111111111111111111";
/// ERC20 deployed on "bsc" for `DENOM`
pub const BSC_UGRAVITON: &str = "0x2222222222222222222222222222222222222222";
pub const ETH_SENDER: &str = "0xeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeee";
pub const ETH_DEST: &str = "0xdddddddddddddddddddddddddddddddddddddddd";

/// Inbound fee charged by the "eth" test chain, in basis points
pub const ETH_INBOUND_FEE_BPS: u64 = 100;

// ============================================================================
// Contracts
// ============================================================================

pub fn contract_gravity() -> Box<dyn cw_multi_test::Contract<Empty>> {
    let contract = ContractWrapper::new(
        gravity::contract::execute,
        gravity::contract::instantiate,
        gravity::contract::query,
    )
    .with_sudo(gravity::contract::sudo)
    .with_reply(gravity::contract::reply);
    Box::new(contract)
}

pub fn contract_cw20() -> Box<dyn cw_multi_test::Contract<Empty>> {
    let contract = ContractWrapper::new(
        cw20_base::contract::execute,
        cw20_base::contract::instantiate,
        cw20_base::contract::query,
    );
    Box::new(contract)
}

// ============================================================================
// Validators
// ============================================================================

/// A bonded validator with its orchestrator and EVM signing key
pub struct Orchestrator {
    pub validator: Addr,
    pub orchestrator: Addr,
    pub key: SecretKey,
    pub eth_address: EthAddress,
}

impl Orchestrator {
    pub fn new(index: usize) -> Self {
        let key = SecretKey::parse(&[index as u8 + 1; 32]).unwrap();
        let public = PublicKey::from_secret_key(&key).serialize();
        let hash = keccak256(&public[1..]);
        let mut address = [0u8; 20];
        address.copy_from_slice(&hash[12..]);

        Self {
            validator: Addr::unchecked(format!("val{}", index + 1)),
            orchestrator: Addr::unchecked(format!("orch{}", index + 1)),
            key,
            eth_address: EthAddress::from_bytes(address),
        }
    }

    /// EIP-191 signature over a checkpoint, r || s || v with v in {27, 28}
    pub fn sign(&self, checkpoint: &[u8; 32]) -> Binary {
        sign_with(&self.key, checkpoint)
    }
}

pub fn sign_with(key: &SecretKey, checkpoint: &[u8; 32]) -> Binary {
    let digest = eth_signed_message_hash(checkpoint);
    let (signature, recovery) = libsecp256k1::sign(&Message::parse(&digest), key);
    let mut bytes = signature.serialize().to_vec();
    bytes.push(recovery.serialize() + 27);
    Binary::from(bytes)
}

// ============================================================================
// Suite
// ============================================================================

pub struct Suite {
    pub app: App,
    pub gravity: Addr,
    pub orchestrators: Vec<Orchestrator>,
}

/// Gravity with chains "eth" (net 1) and "bsc" (net 56) and one bonded
/// validator per entry of `powers`, each with delegate keys set.
pub fn setup(powers: &[u64]) -> Suite {
    let mut app = App::default();
    app.init_modules(|router, _, storage| {
        router
            .bank
            .init_balance(storage, &Addr::unchecked(USER), coins(10_000_000, DENOM))
            .unwrap();
    });

    let code_id = app.store_code(contract_gravity());
    let gravity = app
        .instantiate_contract(
            code_id,
            Addr::unchecked(AUTHORITY),
            &InstantiateMsg {
                authority: AUTHORITY.to_string(),
                fee_collector: FEE_COLLECTOR.to_string(),
                native_prefix: NATIVE_PREFIX.to_string(),
                params: None,
                genesis: None,
            },
            &[],
            "gravity",
            Some(AUTHORITY.to_string()),
        )
        .unwrap();

    let mut suite = Suite {
        app,
        gravity,
        orchestrators: vec![],
    };
    suite.add_chain("eth", 1, ETH_INBOUND_FEE_BPS).unwrap();
    suite.add_chain("bsc", 56, 0).unwrap();

    for (index, power) in powers.iter().enumerate() {
        let orchestrator = Orchestrator::new(index);
        suite
            .sudo(&SudoMsg::Staking(StakingEvent::ValidatorBonded {
                validator: orchestrator.validator.to_string(),
                power: *power,
            }))
            .unwrap();
        suite
            .app
            .execute_contract(
                orchestrator.validator.clone(),
                suite.gravity.clone(),
                &ExecuteMsg::SetOrchestratorAddress {
                    orchestrator: orchestrator.orchestrator.to_string(),
                    eth_address: orchestrator.eth_address.to_string(),
                },
                &[],
            )
            .unwrap();
        suite.orchestrators.push(orchestrator);
    }
    suite
}

impl Suite {
    pub fn add_chain(&mut self, prefix: &str, net_version: u64, fee_bps: u64) -> AnyResult<AppResponse> {
        self.governance(GovernanceProposal::AddEvmChain {
            evm_chain_prefix: prefix.to_string(),
            evm_chain_name: prefix.to_uppercase(),
            evm_chain_net_version: net_version,
            gravity_id: gravity_id(prefix),
            bridge_ethereum_address: "0x00000000000000000000000000000000000000aa".to_string(),
            inbound_fee_basis_points: fee_bps,
        })
    }

    pub fn governance(&mut self, proposal: GovernanceProposal) -> AnyResult<AppResponse> {
        self.app.execute_contract(
            Addr::unchecked(AUTHORITY),
            self.gravity.clone(),
            &ExecuteMsg::Governance(proposal),
            &[],
        )
    }

    pub fn execute(&mut self, sender: &str, msg: &ExecuteMsg) -> AnyResult<AppResponse> {
        self.app
            .execute_contract(Addr::unchecked(sender), self.gravity.clone(), msg, &[])
    }

    pub fn execute_with_funds(
        &mut self,
        sender: &str,
        msg: &ExecuteMsg,
        amount: u128,
    ) -> AnyResult<AppResponse> {
        self.app.execute_contract(
            Addr::unchecked(sender),
            self.gravity.clone(),
            msg,
            &coins(amount, DENOM),
        )
    }

    pub fn sudo(&mut self, msg: &SudoMsg) -> AnyResult<AppResponse> {
        self.app.wasm_sudo(self.gravity.clone(), msg)
    }

    /// Advance one block and run the end block hook
    pub fn end_block(&mut self) -> AnyResult<AppResponse> {
        self.app.update_block(next_block);
        self.sudo(&SudoMsg::EndBlock {})
    }

    /// Vote `claim` with the orchestrator at `index`
    pub fn submit(&mut self, index: usize, prefix: &str, claim: Claim) -> AnyResult<AppResponse> {
        let sender = self.orchestrators[index].orchestrator.clone();
        self.app.execute_contract(
            sender,
            self.gravity.clone(),
            &ExecuteMsg::SubmitClaim {
                evm_chain_prefix: prefix.to_string(),
                claim,
            },
            &[],
        )
    }

    /// Vote `claim` with every orchestrator
    pub fn observe(&mut self, prefix: &str, claim: Claim) {
        for index in 0..self.orchestrators.len() {
            self.submit(index, prefix, claim.clone()).unwrap();
        }
    }

    /// Observe the deployment of the ERC20 representing `DENOM`
    pub fn deploy_ugraviton(&mut self, prefix: &str, event_nonce: u64, token: &str) {
        self.observe(prefix, erc20_deployed(event_nonce, DENOM, token));
    }

    /// Move native tokens into bridge custody
    pub fn fund_custody(&mut self, amount: u128) {
        self.app
            .send_tokens(
                Addr::unchecked(USER),
                self.gravity.clone(),
                &coins(amount, DENOM),
            )
            .unwrap();
    }

    pub fn query<T: DeserializeOwned>(&self, msg: &QueryMsg) -> T {
        self.app
            .wrap()
            .query_wasm_smart(self.gravity.clone(), msg)
            .unwrap()
    }

    pub fn balance(&self, address: &str) -> u128 {
        self.app
            .wrap()
            .query_balance(address, DENOM)
            .unwrap()
            .amount
            .u128()
    }
}

pub fn gravity_id(prefix: &str) -> String {
    format!("gravity-{}", prefix)
}

// ============================================================================
// Claims
// ============================================================================

pub fn erc20_deployed(event_nonce: u64, denom: &str, token: &str) -> Claim {
    Claim::Erc20Deployed(Erc20DeployedClaim {
        event_nonce,
        evm_block_height: event_nonce * 10,
        cosmos_denom: denom.to_string(),
        token_contract: EthAddress::parse(token).unwrap(),
        name: denom.to_string(),
        symbol: String::new(),
        decimals: 0,
    })
}

pub fn send_to_cosmos(event_nonce: u64, token: &str, amount: u128, receiver: &str) -> Claim {
    Claim::SendToCosmos(SendToCosmosClaim {
        event_nonce,
        evm_block_height: event_nonce * 10,
        token_contract: EthAddress::parse(token).unwrap(),
        amount: Uint128::new(amount),
        ethereum_sender: EthAddress::parse(ETH_SENDER).unwrap(),
        cosmos_receiver: receiver.to_string(),
    })
}

pub fn batch_executed(event_nonce: u64, batch_nonce: u64, token: &str) -> Claim {
    Claim::BatchSendToEth(BatchSendToEthClaim {
        event_nonce,
        evm_block_height: event_nonce * 10,
        batch_nonce,
        token_contract: EthAddress::parse(token).unwrap(),
    })
}

// ============================================================================
// Responses
// ============================================================================

pub fn error_string(res: AnyResult<AppResponse>) -> String {
    res.unwrap_err().root_cause().to_string()
}

/// Whether a custom event `ty` was emitted (wasm prefixes custom event types)
pub fn has_event(res: &AppResponse, ty: &str) -> bool {
    res.events.iter().any(|e| e.ty == format!("wasm-{}", ty))
}

/// Value of `key` in the first custom event `ty`
pub fn event_attr(res: &AppResponse, ty: &str, key: &str) -> Option<String> {
    res.events
        .iter()
        .filter(|e| e.ty == format!("wasm-{}", ty))
        .flat_map(|e| e.attributes.iter())
        .find(|a| a.key == key)
        .map(|a| a.value.clone())
}

/// Bech32 address with `hrp` over `bytes`
pub fn bech32_address(hrp: &str, bytes: &[u8]) -> String {
    use bech32::{ToBase32, Variant};
    bech32::encode(hrp, bytes.to_base32(), Variant::Bech32).unwrap()
}
