//! # Change Events
//!
//! Typed representation of the change events recorded by the identity
//! registry. Each event carries a pointer to the block holding the
//! identity's previous change, which is what makes a sparse backward walk of
//! the history possible.

use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::address::Address;

/// Block height on the underlying chain.
pub type BlockNumber = u64;

/// Seconds since the Unix epoch. Used for block times and validity windows.
pub type Timestamp = u64;

/// Convert a raw `previousChange` value from the registry into a block
/// pointer. The registry uses block `0` to mean "no earlier change".
#[must_use]
pub const fn block_pointer(raw: BlockNumber) -> Option<BlockNumber> {
    if raw == 0 { None } else { Some(raw) }
}

/// Decode a right-padded `bytes32` value (as used on-chain for delegate types
/// and attribute names) into a string.
///
/// Trailing NUL bytes are removed. Returns `None` when the remaining bytes
/// are not valid UTF-8.
#[must_use]
pub fn bytes32_to_string(bytes: &[u8; 32]) -> Option<String> {
    let end = bytes.iter().rposition(|b| *b != 0).map_or(0, |i| i + 1);
    String::from_utf8(bytes[..end].to_vec()).ok()
}

/// A single change recorded for an identity.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    /// The identity the change applies to.
    pub identity: Address,

    /// Block in which the change was recorded.
    pub block_number: BlockNumber,

    /// Time of the block in which the change was recorded.
    pub timestamp: Timestamp,

    /// Block of the identity's previous change, or `None` for the first.
    pub previous_change: Option<BlockNumber>,

    /// What changed.
    #[serde(flatten)]
    pub kind: EventKind,
}

/// The three kinds of change the registry records.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "event", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum EventKind {
    /// Ownership of the identity moved to `owner`. Permanent until
    /// superseded.
    #[serde(rename = "DIDOwnerChanged")]
    OwnerChanged {
        /// The new owner.
        owner: Address,
    },

    /// A delegate was added, refreshed or revoked.
    #[serde(rename = "DIDDelegateChanged")]
    DelegateChanged {
        /// The kind of delegation granted.
        delegate_type: DelegateType,

        /// The delegate's address.
        delegate: Address,

        /// The delegation is active while `valid_to` is later than the
        /// resolution time.
        valid_to: Timestamp,
    },

    /// An attribute was set or revoked.
    #[serde(rename = "DIDAttributeChanged")]
    AttributeChanged {
        /// Structured attribute name, e.g. `did/pub/Secp256k1/veriKey/hex`.
        name: String,

        /// Raw attribute value.
        #[serde(with = "hex_bytes")]
        value: Vec<u8>,

        /// The attribute is active while `valid_to` is later than the
        /// resolution time.
        valid_to: Timestamp,
    },
}

/// Delegate types known to the resolver.
///
/// Unknown types are retained as [`DelegateType::Other`] so they still take
/// part in last-write-wins folding, but they publish no keys.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq, Hash)]
#[serde(from = "String", into = "String")]
pub enum DelegateType {
    /// Key may be used to verify signatures made on behalf of the identity.
    VeriKey,

    /// Key may be used to authenticate as the identity.
    SigAuth,

    /// Any other delegate type.
    Other(String),
}

impl From<&str> for DelegateType {
    fn from(s: &str) -> Self {
        match s {
            "veriKey" => Self::VeriKey,
            "sigAuth" => Self::SigAuth,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for DelegateType {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl From<DelegateType> for String {
    fn from(t: DelegateType) -> Self {
        t.to_string()
    }
}

impl Display for DelegateType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::VeriKey => write!(f, "veriKey"),
            Self::SigAuth => write!(f, "sigAuth"),
            Self::Other(s) => write!(f, "{s}"),
        }
    }
}

/// Serialize byte values as `0x`-prefixed hex strings.
pub(crate) mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(bytes)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s.trim_start_matches("0x")).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;

    #[test]
    fn pointer_sentinel() {
        assert_eq!(block_pointer(0), None);
        assert_eq!(block_pointer(42), Some(42));
    }

    #[test]
    fn bytes32() {
        let mut raw = [0u8; 32];
        raw[..7].copy_from_slice(b"veriKey");
        assert_eq!(bytes32_to_string(&raw).as_deref(), Some("veriKey"));
        assert_eq!(bytes32_to_string(&[0u8; 32]).as_deref(), Some(""));

        raw[0] = 0xff;
        assert_eq!(bytes32_to_string(&raw), None);
    }

    #[test]
    fn delegate_type() {
        assert_eq!(DelegateType::from("sigAuth"), DelegateType::SigAuth);
        assert_eq!(DelegateType::from("enc"), DelegateType::Other("enc".into()));
        assert_eq!(DelegateType::VeriKey.to_string(), "veriKey");
    }

    #[test]
    fn deserialize_attribute() {
        let event: ChangeEvent = serde_json::from_value(json!({
            "identity": "0xf3beac30c498d9e26865f34fcaa57dbb935b0d74",
            "blockNumber": 12,
            "timestamp": 1_700_000_000,
            "previousChange": 7,
            "event": "DIDAttributeChanged",
            "name": "did/svc/HubService",
            "value": "0x68747470733a2f2f6875622e6578616d706c652e636f6d",
            "validTo": 1_800_000_000
        }))
        .expect("should deserialize");

        let EventKind::AttributeChanged { name, value, valid_to } = event.kind else {
            panic!("should be an attribute event");
        };
        assert_eq!(name, "did/svc/HubService");
        assert_eq!(value, b"https://hub.example.com");
        assert_eq!(valid_to, 1_800_000_000);
        assert_eq!(event.previous_change, Some(7));
    }
}
