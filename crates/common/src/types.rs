use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const ADDRESS_LENGTH: usize = 20;

/// Number of hex characters in a textual H160 address, without prefix.
const ADDRESS_HEX_LENGTH: usize = ADDRESS_LENGTH * 2;

/// Reasons an address string is rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("expected 40 hex characters, got {0}")]
    InvalidLength(usize),

    #[error("address contains non-hex characters")]
    InvalidCharacters,
}

// --- NewTypes ---

/// 20-byte account address (H160).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct Address(pub [u8; ADDRESS_LENGTH]);

impl Address {
    pub fn from_slice(bytes: &[u8]) -> Self {
        let mut arr = [0u8; ADDRESS_LENGTH];
        let len = bytes.len().min(ADDRESS_LENGTH);
        arr[..len].copy_from_slice(&bytes[..len]);
        Address(arr)
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_LENGTH] {
        &self.0
    }
}

impl FromStr for Address {
    type Err = AddressError;

    /// Accepts exactly 40 hex characters, optionally prefixed with `0x`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let digits = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);

        if digits.len() != ADDRESS_HEX_LENGTH {
            return Err(AddressError::InvalidLength(digits.len()));
        }
        if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(AddressError::InvalidCharacters);
        }

        let bytes = hex::decode(digits).map_err(|_| AddressError::InvalidCharacters)?;
        Ok(Address::from_slice(&bytes))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", hex::encode(self.0))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl Serialize for Address {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "0x6be02d1d3665660d22ff9624b7be0551ee1ac91b";

    #[test]
    fn test_parse_with_and_without_prefix() {
        let with_prefix: Address = SAMPLE.parse().unwrap();
        let without_prefix: Address = SAMPLE[2..].parse().unwrap();
        assert_eq!(with_prefix, without_prefix);
        assert_eq!(with_prefix.0[0], 0x6b);
        assert_eq!(with_prefix.0[19], 0x1b);
    }

    #[test]
    fn test_parse_mixed_case_and_whitespace() {
        let address: Address = "  0x6BE02D1D3665660D22FF9624B7BE0551EE1AC91B ".parse().unwrap();
        assert_eq!(address.to_string(), SAMPLE);
    }

    #[test]
    fn test_reject_wrong_length() {
        assert_eq!("0x1234".parse::<Address>(), Err(AddressError::InvalidLength(4)));
        assert_eq!("".parse::<Address>(), Err(AddressError::InvalidLength(0)));

        let too_long = format!("{}00", SAMPLE);
        assert_eq!(too_long.parse::<Address>(), Err(AddressError::InvalidLength(42)));
    }

    #[test]
    fn test_reject_non_hex() {
        let bad = "0x6be02d1d3665660d22ff9624b7be0551ee1ac9zz";
        assert_eq!(bad.parse::<Address>(), Err(AddressError::InvalidCharacters));

        let punctuation = "0x6be02d1d3665660d22ff9624b7be0551ee1ac9-!";
        assert_eq!(punctuation.parse::<Address>(), Err(AddressError::InvalidCharacters));
    }

    #[test]
    fn test_serde_roundtrip_uses_prefixed_hex() {
        let address: Address = SAMPLE.parse().unwrap();
        let json = serde_json::to_string(&address).unwrap();
        assert_eq!(json, format!("\"{}\"", SAMPLE));
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, address);
    }
}
