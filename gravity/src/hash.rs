//! Checkpoint hashing shared with the EVM bridge contract
//!
//! Relayers recompute these digests off-chain and the EVM contract verifies
//! signatures over them, so every layout here must be byte-identical to
//! Solidity's `abi.encode`.
//!
//! # Valset checkpoint
//! ```solidity
//! keccak256(abi.encode(
//!     bytes32 gravityId, bytes32 "checkpoint", uint256 valsetNonce,
//!     address[] validators, uint256[] powers,
//!     uint256 rewardAmount, address rewardToken
//! ))
//! ```
//!
//! # Batch checkpoint
//! ```solidity
//! keccak256(abi.encode(
//!     bytes32 gravityId, bytes32 "transactionBatch",
//!     uint256[] amounts, address[] destinations, uint256[] fees,
//!     uint256 batchNonce, address tokenContract, uint256 batchTimeout
//! ))
//! ```
//!
//! # Logic call checkpoint
//! ```solidity
//! keccak256(abi.encode(
//!     bytes32 gravityId, bytes32 "logicCall",
//!     uint256[] transferAmounts, address[] transferTokenContracts,
//!     uint256[] feeAmounts, address[] feeTokenContracts,
//!     address logicContractAddress, bytes payload, uint256 timeOut,
//!     bytes32 invalidationId, uint256 invalidationNonce
//! ))
//! ```

use cosmwasm_std::Api;
use tiny_keccak::{Hasher, Keccak};

use common::EthAddress;

use crate::error::ContractError;
use crate::state::{OutgoingLogicCall, OutgoingTxBatch, Valset};

/// Compute keccak256 hash of arbitrary data
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak::v256();
    hasher.update(data);
    let mut output = [0u8; 32];
    hasher.finalize(&mut output);
    output
}

// ============================================================================
// ABI Encoding
// ============================================================================

/// A single `abi.encode` argument
#[derive(Debug, Clone, PartialEq)]
pub enum AbiToken {
    /// Any static 32-byte value (uint256, address, bytes32)
    Word([u8; 32]),
    /// Dynamic array of static words
    Array(Vec<[u8; 32]>),
    /// Dynamic `bytes`
    Bytes(Vec<u8>),
}

/// Encode arguments the way Solidity's `abi.encode` does: a head of static
/// words and offsets, followed by the tails of the dynamic arguments.
pub fn abi_encode(tokens: &[AbiToken]) -> Vec<u8> {
    let head_len = 32 * tokens.len();
    let mut head = Vec::with_capacity(head_len);
    let mut tail = Vec::new();

    for token in tokens {
        match token {
            AbiToken::Word(word) => head.extend_from_slice(word),
            AbiToken::Array(items) => {
                head.extend_from_slice(&uint_word((head_len + tail.len()) as u128));
                tail.extend_from_slice(&uint_word(items.len() as u128));
                for item in items {
                    tail.extend_from_slice(item);
                }
            }
            AbiToken::Bytes(bytes) => {
                head.extend_from_slice(&uint_word((head_len + tail.len()) as u128));
                tail.extend_from_slice(&uint_word(bytes.len() as u128));
                tail.extend_from_slice(bytes);
                let padding = (32 - bytes.len() % 32) % 32;
                tail.extend(std::iter::repeat(0u8).take(padding));
            }
        }
    }

    head.extend(tail);
    head
}

/// uint256 word, big-endian, left-padded
pub fn uint_word(value: u128) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[16..].copy_from_slice(&value.to_be_bytes());
    word
}

/// address word, left-padded
pub fn address_word(address: &EthAddress) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[12..].copy_from_slice(&address.to_bytes());
    word
}

/// bytes32 word, right-padded. Input longer than 32 bytes is truncated.
pub fn bytes32_word(data: &[u8]) -> [u8; 32] {
    let mut word = [0u8; 32];
    let len = data.len().min(32);
    word[..len].copy_from_slice(&data[..len]);
    word
}

// ============================================================================
// Checkpoints
// ============================================================================

pub fn valset_checkpoint(gravity_id: &str, valset: &Valset) -> [u8; 32] {
    let validators = valset
        .members
        .iter()
        .map(|m| address_word(&m.ethereum_address))
        .collect();
    let powers = valset
        .members
        .iter()
        .map(|m| uint_word(m.power as u128))
        .collect();

    keccak256(&abi_encode(&[
        AbiToken::Word(bytes32_word(gravity_id.as_bytes())),
        AbiToken::Word(bytes32_word(b"checkpoint")),
        AbiToken::Word(uint_word(valset.nonce as u128)),
        AbiToken::Array(validators),
        AbiToken::Array(powers),
        AbiToken::Word(uint_word(0)),
        AbiToken::Word(address_word(&EthAddress::zero())),
    ]))
}

pub fn batch_checkpoint(gravity_id: &str, batch: &OutgoingTxBatch) -> [u8; 32] {
    let amounts = batch
        .transactions
        .iter()
        .map(|tx| uint_word(tx.erc20_token.amount.u128()))
        .collect();
    let destinations = batch
        .transactions
        .iter()
        .map(|tx| address_word(&tx.dest_address))
        .collect();
    let fees = batch
        .transactions
        .iter()
        .map(|tx| uint_word(tx.erc20_fee.amount.u128()))
        .collect();

    keccak256(&abi_encode(&[
        AbiToken::Word(bytes32_word(gravity_id.as_bytes())),
        AbiToken::Word(bytes32_word(b"transactionBatch")),
        AbiToken::Array(amounts),
        AbiToken::Array(destinations),
        AbiToken::Array(fees),
        AbiToken::Word(uint_word(batch.batch_nonce as u128)),
        AbiToken::Word(address_word(&batch.token_contract)),
        AbiToken::Word(uint_word(batch.batch_timeout as u128)),
    ]))
}

pub fn logic_call_checkpoint(gravity_id: &str, call: &OutgoingLogicCall) -> [u8; 32] {
    let transfer_amounts = call
        .transfers
        .iter()
        .map(|t| uint_word(t.amount.u128()))
        .collect();
    let transfer_tokens = call
        .transfers
        .iter()
        .map(|t| address_word(&t.contract))
        .collect();
    let fee_amounts = call.fees.iter().map(|t| uint_word(t.amount.u128())).collect();
    let fee_tokens = call.fees.iter().map(|t| address_word(&t.contract)).collect();

    keccak256(&abi_encode(&[
        AbiToken::Word(bytes32_word(gravity_id.as_bytes())),
        AbiToken::Word(bytes32_word(b"logicCall")),
        AbiToken::Array(transfer_amounts),
        AbiToken::Array(transfer_tokens),
        AbiToken::Array(fee_amounts),
        AbiToken::Array(fee_tokens),
        AbiToken::Word(address_word(&call.logic_contract_address)),
        AbiToken::Bytes(call.payload.to_vec()),
        AbiToken::Word(uint_word(call.timeout as u128)),
        AbiToken::Word(bytes32_word(call.invalidation_id.as_slice())),
        AbiToken::Word(uint_word(call.invalidation_nonce as u128)),
    ]))
}

// ============================================================================
// Signatures
// ============================================================================

/// EIP-191 `personal_sign` digest of a 32-byte message
pub fn eth_signed_message_hash(message: &[u8; 32]) -> [u8; 32] {
    let mut data = Vec::with_capacity(28 + 32);
    data.extend_from_slice(b"\x19Ethereum Signed Message:\n32");
    data.extend_from_slice(message);
    keccak256(&data)
}

/// Recover the EVM address that produced `signature` (r || s || v) over the
/// personal-sign digest of `checkpoint`. `v` may be 27/28 or 0/1.
pub fn recover_eth_signer(
    api: &dyn Api,
    checkpoint: &[u8; 32],
    signature: &[u8],
) -> Result<EthAddress, ContractError> {
    if signature.len() != 65 {
        return Err(ContractError::InvalidSignature {
            reason: format!("expected 65 bytes, got {}", signature.len()),
        });
    }
    let v = signature[64];
    let recovery_param = match v {
        0 | 1 => v,
        27 | 28 => v - 27,
        _ => {
            return Err(ContractError::InvalidSignature {
                reason: format!("invalid recovery id {}", v),
            })
        }
    };

    let digest = eth_signed_message_hash(checkpoint);
    let pubkey = api
        .secp256k1_recover_pubkey(&digest, &signature[..64], recovery_param)
        .map_err(|e| ContractError::InvalidSignature {
            reason: e.to_string(),
        })?;
    if pubkey.len() != 65 {
        return Err(ContractError::InvalidSignature {
            reason: "recovered key is not an uncompressed public key".to_string(),
        });
    }

    let hash = keccak256(&pubkey[1..]);
    let mut address = [0u8; 20];
    address.copy_from_slice(&hash[12..]);
    Ok(EthAddress::from_bytes(address))
}

/// Convert a 32-byte hash to a 0x-prefixed hex string
pub fn bytes32_to_hex(bytes: &[u8; 32]) -> String {
    format!("0x{}", hex::encode(bytes))
}
