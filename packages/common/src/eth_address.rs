//! EVM address type.
//!
//! Addresses are validated on construction and kept in lowercase `0x` form,
//! so equal addresses always compare and hash equal regardless of the
//! checksum casing they were submitted with.

use std::fmt;

use schemars::gen::SchemaGenerator;
use schemars::schema::Schema;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use cosmwasm_std::{StdError, StdResult};

/// Length of an EVM address in bytes
pub const ETH_ADDRESS_LEN: usize = 20;

/// A validated, lowercase EVM address
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct EthAddress(String);

impl EthAddress {
    /// Parse a `0x`-prefixed 40 hex character address (any casing).
    pub fn parse(input: &str) -> StdResult<Self> {
        let stripped = input
            .strip_prefix("0x")
            .or_else(|| input.strip_prefix("0X"))
            .ok_or_else(|| {
                StdError::generic_err(format!("invalid EVM address {}: missing 0x prefix", input))
            })?;
        if stripped.len() != ETH_ADDRESS_LEN * 2 {
            return Err(StdError::generic_err(format!(
                "invalid EVM address {}: expected 40 hex characters, got {}",
                input,
                stripped.len()
            )));
        }
        if !stripped.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(StdError::generic_err(format!(
                "invalid EVM address {}: non-hex character",
                input
            )));
        }
        Ok(Self(format!("0x{}", stripped.to_ascii_lowercase())))
    }

    pub fn zero() -> Self {
        Self::from_bytes([0u8; ETH_ADDRESS_LEN])
    }

    pub fn from_bytes(bytes: [u8; ETH_ADDRESS_LEN]) -> Self {
        Self(format!("0x{}", hex::encode(bytes)))
    }

    pub fn to_bytes(&self) -> [u8; ETH_ADDRESS_LEN] {
        let mut out = [0u8; ETH_ADDRESS_LEN];
        // validated at construction
        if let Ok(decoded) = hex::decode(&self.0[2..]) {
            out.copy_from_slice(&decoded);
        }
        out
    }

    pub fn is_zero(&self) -> bool {
        self.to_bytes() == [0u8; ETH_ADDRESS_LEN]
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for EthAddress {
    type Error = StdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        EthAddress::parse(&value)
    }
}

impl From<EthAddress> for String {
    fn from(value: EthAddress) -> Self {
        value.0
    }
}

impl fmt::Display for EthAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl JsonSchema for EthAddress {
    fn schema_name() -> String {
        "EthAddress".to_string()
    }

    fn json_schema(gen: &mut SchemaGenerator) -> Schema {
        String::json_schema(gen)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_normalizes_case() {
        let checksummed = EthAddress::parse("0xD041c41EA1bf0F006ADBb6d2c9ef9D425dE5eaD7").unwrap();
        let lower = EthAddress::parse("0xd041c41ea1bf0f006adbb6d2c9ef9d425de5ead7").unwrap();
        assert_eq!(checksummed, lower);
        assert_eq!(lower.as_str(), "0xd041c41ea1bf0f006adbb6d2c9ef9d425de5ead7");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(EthAddress::parse("d041c41ea1bf0f006adbb6d2c9ef9d425de5ead7").is_err());
        assert!(EthAddress::parse("0x1234").is_err());
        assert!(EthAddress::parse("0xz041c41ea1bf0f006adbb6d2c9ef9d425de5ead7").is_err());
    }

    #[test]
    fn test_bytes_roundtrip_and_zero() {
        let addr = EthAddress::parse("0x429881672B9AE42b8EbA0E26cD9C73711b891Ca5").unwrap();
        assert_eq!(EthAddress::from_bytes(addr.to_bytes()), addr);
        assert!(EthAddress::zero().is_zero());
        assert!(!addr.is_zero());
    }

    #[test]
    fn test_serde_validates() {
        let ok: EthAddress =
            cosmwasm_std::from_json(br#""0x429881672B9AE42b8EbA0E26cD9C73711b891Ca5""#).unwrap();
        assert_eq!(ok.as_str(), "0x429881672b9ae42b8eba0e26cd9c73711b891ca5");
        let bad: StdResult<EthAddress> = cosmwasm_std::from_json(br#""0x12""#);
        assert!(bad.is_err());
    }
}
