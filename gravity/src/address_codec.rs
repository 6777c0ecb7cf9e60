//! Deposit receiver classification
//!
//! A `SendToCosmos` receiver is either a local account, a bech32 address of
//! a foreign chain reachable over IBC, or garbage. Foreign addresses are
//! recognised by their human readable part differing from the local one.

use cosmwasm_std::{Addr, Api};

/// Where an inbound deposit should go
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Receiver {
    /// A valid account on this chain
    Local(Addr),
    /// A bech32 address with a foreign prefix
    Foreign { address: String, prefix: String },
    /// Neither; the deposit is credited to the community pool
    Invalid,
}

/// Classify `receiver` against the local bech32 prefix.
pub fn classify_receiver(api: &dyn Api, native_prefix: &str, receiver: &str) -> Receiver {
    if let Ok((hrp, _, _)) = bech32::decode(receiver) {
        if hrp != native_prefix {
            return Receiver::Foreign {
                address: receiver.to_string(),
                prefix: hrp,
            };
        }
    }
    match api.addr_validate(receiver) {
        Ok(addr) => Receiver::Local(addr),
        Err(_) => Receiver::Invalid,
    }
}

/// Human readable part of a bech32 string, if it decodes.
pub fn bech32_prefix(address: &str) -> Option<String> {
    bech32::decode(address).ok().map(|(hrp, _, _)| hrp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bech32::{ToBase32, Variant};
    use cosmwasm_std::testing::mock_dependencies;

    fn encode(hrp: &str, bytes: &[u8]) -> String {
        bech32::encode(hrp, bytes.to_base32(), Variant::Bech32).unwrap()
    }

    #[test]
    fn test_foreign_prefix() {
        let deps = mock_dependencies();
        let osmo = encode("osmo", &[7u8; 20]);
        assert_eq!(
            classify_receiver(&deps.api, "gravity", &osmo),
            Receiver::Foreign {
                address: osmo.clone(),
                prefix: "osmo".to_string()
            }
        );
        assert_eq!(bech32_prefix(&osmo).as_deref(), Some("osmo"));
    }

    #[test]
    fn test_local_and_invalid() {
        let deps = mock_dependencies();
        assert_eq!(
            classify_receiver(&deps.api, "gravity", "gravity1receiver"),
            Receiver::Local(Addr::unchecked("gravity1receiver"))
        );
        assert_eq!(
            classify_receiver(&deps.api, "gravity", "BAD_RECEIVER"),
            Receiver::Invalid
        );
    }
}
