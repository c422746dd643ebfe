//! # Attribute Decoding
//!
//! Interprets registry attribute names and values. Public keys are published
//! under `did/pub/<keyType>/<purpose>/<encoding>` and service endpoints under
//! `did/svc/<serviceType>`. Anything else is reported as unrecognized so the
//! caller can keep it out of the document without failing resolution.

use std::fmt::{self, Display, Formatter};

use base64ct::{Base64, Encoding as _};
use multibase::Base;

use crate::document::KeyMaterial;

/// The outcome of decoding a single attribute.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Decoded {
    /// A public key.
    Key(KeyEntry),

    /// A service endpoint.
    Service(ServiceEntry),

    /// The attribute is not a key or service, or is malformed. Carries the
    /// reason.
    Unrecognized(String),
}

/// A public key published as an attribute.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyEntry {
    /// Key algorithm.
    pub key_type: KeyType,

    /// What the key may be used for.
    pub purpose: Purpose,

    /// The key material in its published encoding.
    pub material: KeyMaterial,
}

impl KeyEntry {
    /// The verification method type, e.g. `Secp256k1VerificationKey2018`.
    #[must_use]
    pub fn method_type(&self) -> String {
        format!("{}{}", self.key_type, self.purpose.suffix())
    }
}

/// A service endpoint published as an attribute.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServiceEntry {
    /// Service type, taken from the attribute name.
    pub service_type: String,

    /// The endpoint, taken from the attribute value.
    pub endpoint: String,
}

/// Key algorithms. New algorithms pass through as [`KeyType::Other`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KeyType {
    /// `secp256k1` ECDSA.
    Secp256k1,

    /// RSA.
    Rsa,

    /// `Ed25519` `EdDSA`.
    Ed25519,

    /// `X25519` key agreement.
    X25519,

    /// Any other algorithm name.
    Other(String),
}

impl From<&str> for KeyType {
    fn from(s: &str) -> Self {
        match s {
            "Secp256k1" => Self::Secp256k1,
            "RSA" => Self::Rsa,
            "Ed25519" => Self::Ed25519,
            "X25519" => Self::X25519,
            other => Self::Other(other.to_string()),
        }
    }
}

impl Display for KeyType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Secp256k1 => write!(f, "Secp256k1"),
            Self::Rsa => write!(f, "RSA"),
            Self::Ed25519 => write!(f, "Ed25519"),
            Self::X25519 => write!(f, "X25519"),
            Self::Other(s) => write!(f, "{s}"),
        }
    }
}

/// Key purposes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Purpose {
    /// Verification of signatures (`veriKey`).
    VeriKey,

    /// Authentication (`sigAuth`). Keys are also listed under
    /// `authentication`.
    SigAuth,

    /// Any other purpose, used verbatim as the type suffix.
    Other(String),
}

impl Purpose {
    /// Suffix appended to the key type to form the verification method type.
    #[must_use]
    pub fn suffix(&self) -> &str {
        match self {
            Self::VeriKey => "VerificationKey2018",
            Self::SigAuth => "SignatureAuthentication2018",
            Self::Other(s) => s,
        }
    }
}

impl From<&str> for Purpose {
    fn from(s: &str) -> Self {
        match s {
            "veriKey" => Self::VeriKey,
            "sigAuth" => Self::SigAuth,
            other => Self::Other(other.to_string()),
        }
    }
}

/// Value encodings for published keys.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Encoding {
    /// `publicKeyHex`.
    Hex,

    /// `publicKeyBase64`.
    Base64,

    /// `publicKeyBase58`.
    Base58,

    /// `publicKeyPem`. The value is PEM text.
    Pem,

    /// Opaque bytes published as `value` for the consumer to interpret.
    /// Covers the explicit `value` encoding and any unknown encoding name.
    Value,
}

impl From<&str> for Encoding {
    fn from(s: &str) -> Self {
        match s {
            "hex" => Self::Hex,
            "base64" => Self::Base64,
            "base58" => Self::Base58,
            "pem" => Self::Pem,
            _ => Self::Value,
        }
    }
}

impl Encoding {
    /// Encode raw attribute bytes into key material.
    ///
    /// # Errors
    ///
    /// Fails only for PEM values that are not valid UTF-8.
    pub fn encode(&self, value: &[u8]) -> Result<KeyMaterial, String> {
        let material = match self {
            Self::Hex => KeyMaterial::PublicKeyHex {
                public_key_hex: hex::encode(value),
            },
            Self::Base64 => KeyMaterial::PublicKeyBase64 {
                public_key_base64: Base64::encode_string(value),
            },
            Self::Base58 => KeyMaterial::PublicKeyBase58 {
                public_key_base58: Base::Base58Btc.encode(value),
            },
            Self::Pem => KeyMaterial::PublicKeyPem {
                public_key_pem: String::from_utf8(value.to_vec())
                    .map_err(|e| format!("PEM value is not UTF-8: {e}"))?,
            },
            Self::Value => KeyMaterial::Value {
                value: format!("0x{}", hex::encode(value)),
            },
        };
        Ok(material)
    }
}

/// Decode an attribute into a key, a service or an unrecognized entry.
///
/// Never fails: malformed names and undecodable values come back as
/// [`Decoded::Unrecognized`].
#[must_use]
pub fn decode(name: &str, value: &[u8]) -> Decoded {
    let segments = name.split('/').collect::<Vec<_>>();

    match segments.as_slice() {
        ["did", "pub", key_type, purpose, encoding] => {
            if key_type.is_empty() || purpose.is_empty() || encoding.is_empty() {
                return Decoded::Unrecognized(format!("empty segment in {name}"));
            }
            let encoding = Encoding::from(*encoding);
            match encoding.encode(value) {
                Ok(material) => Decoded::Key(KeyEntry {
                    key_type: KeyType::from(*key_type),
                    purpose: Purpose::from(*purpose),
                    material,
                }),
                Err(reason) => Decoded::Unrecognized(reason),
            }
        }
        ["did", "svc", service_type] if !service_type.is_empty() => {
            match String::from_utf8(value.to_vec()) {
                Ok(endpoint) => Decoded::Service(ServiceEntry {
                    service_type: (*service_type).to_string(),
                    endpoint,
                }),
                Err(e) => Decoded::Unrecognized(format!("service endpoint is not UTF-8: {e}")),
            }
        }
        ["did", "pub" | "svc", ..] => {
            Decoded::Unrecognized(format!("wrong number of segments in {name}"))
        }
        _ => Decoded::Unrecognized(format!("{name} is not a key or service attribute")),
    }
}
