//! # Address
//!
//! 20-byte account addresses used as identities, owners and delegates.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// An Ethereum account address.
///
/// Displayed and serialized as lowercase, `0x`-prefixed hex. Parsing accepts
/// any letter case, with or without the prefix.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; 20]);

impl Address {
    /// The all-zero address.
    pub const ZERO: Self = Self([0; 20]);

    /// Create an address from raw bytes.
    #[must_use]
    pub const fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// The raw address bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// The `did:ethr` DID for this address.
    #[must_use]
    pub fn did(&self) -> String {
        format!("did:ethr:{self}")
    }
}

impl From<[u8; 20]> for Address {
    fn from(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }
}

impl FromStr for Address {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        let stripped = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s);
        let mut bytes = [0u8; 20];
        hex::decode_to_slice(stripped, &mut bytes)
            .map_err(|e| anyhow::anyhow!("invalid address {s}: {e}"))?;
        Ok(Self(bytes))
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_mixed_case() {
        let addr: Address =
            "0xF3BEAC30C498D9E26865F34FCAA57DBB935B0D74".parse().expect("should parse");
        assert_eq!(addr.to_string(), "0xf3beac30c498d9e26865f34fcaa57dbb935b0d74");
        assert_eq!(addr.did(), "did:ethr:0xf3beac30c498d9e26865f34fcaa57dbb935b0d74");
    }

    #[test]
    fn reject_short() {
        assert!("0x1234".parse::<Address>().is_err());
        assert!("0xzz3beac30c498d9e26865f34fcaa57dbb935b0d7".parse::<Address>().is_err());
    }

    #[test]
    fn serde_string() {
        let addr = Address::new([0xab; 20]);
        let json = serde_json::to_string(&addr).expect("should serialize");
        assert_eq!(json, format!("\"0x{}\"", "ab".repeat(20)));
        let back: Address = serde_json::from_str(&json).expect("should deserialize");
        assert_eq!(back, addr);
    }
}
