//! # DID Document
//!
//! A DID Document is a JSON-LD document that contains information related to a
//! DID. For `did:ethr` the document is derived entirely from the identity's
//! change history and is never stored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::event::{Timestamp, hex_bytes};

/// Default JSON-LD context for `did:ethr` documents.
pub const DID_CONTEXT: &str = "https://w3id.org/did/v1";

/// Verification method type of the owner key and of delegate keys.
pub const SECP256K1_VERIFICATION_KEY: &str = "Secp256k1VerificationKey2018";

/// Authentication type of the owner key and of `sigAuth` delegates.
pub const SECP256K1_SIGNATURE_AUTHENTICATION: &str = "Secp256k1SignatureAuthentication2018";

/// DID Document
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// The context of the DID document.
    #[serde(rename = "@context")]
    pub context: String,

    /// The DID for a particular DID subject.
    pub id: String,

    /// The DID of the identity's current owner.
    pub controller: String,

    /// Public keys, owner key first.
    pub public_key: Vec<PublicKey>,

    /// References to the public keys that may be used to authenticate as the
    /// DID subject.
    ///
    /// <https://www.w3.org/TR/did-core/#authentication>
    pub authentication: Vec<Authentication>,

    /// A set of services, that express ways of communicating with the DID
    /// subject or related entities.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub service: Vec<Service>,
}

impl Document {
    /// Find a public key by its full id (`did#fragment`).
    #[must_use]
    pub fn public_key(&self, id: &str) -> Option<&PublicKey> {
        self.public_key.iter().find(|pk| pk.id == id)
    }

    /// Find a service by its full id (`did#fragment`).
    #[must_use]
    pub fn service(&self, id: &str) -> Option<&Service> {
        self.service.iter().find(|s| s.id == id)
    }
}

/// A public key published for the DID subject.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PublicKey {
    /// A DID URL that identifies the key.
    pub id: String,

    /// The key type, e.g. `Secp256k1VerificationKey2018`.
    #[serde(rename = "type")]
    pub type_: String,

    /// The DID of the controller of the key.
    pub controller: String,

    /// The key material.
    #[serde(flatten)]
    pub material: KeyMaterial,
}

/// The format of the public key material.
#[derive(Clone, Debug, Deserialize, Serialize, Eq, PartialEq)]
#[serde(rename_all_fields = "camelCase")]
#[serde(untagged)]
pub enum KeyMaterial {
    /// The key is identified by the account address it controls.
    EthereumAddress {
        /// Account address.
        ethereum_address: Address,
    },

    /// Hex encoded key, without a `0x` prefix.
    PublicKeyHex {
        /// The public key encoded as hex.
        public_key_hex: String,
    },

    /// Base64 encoded key.
    PublicKeyBase64 {
        /// The public key encoded as base64.
        public_key_base64: String,
    },

    /// Base58 (bitcoin alphabet) encoded key.
    PublicKeyBase58 {
        /// The public key encoded as base58.
        public_key_base58: String,
    },

    /// PEM encoded key.
    PublicKeyPem {
        /// The public key as PEM text.
        public_key_pem: String,
    },

    /// Opaque value, `0x`-prefixed hex of the published bytes.
    Value {
        /// The raw value.
        value: String,
    },
}

impl Default for KeyMaterial {
    fn default() -> Self {
        Self::EthereumAddress {
            ethereum_address: Address::ZERO,
        }
    }
}

/// A reference from the `authentication` section to a public key.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Authentication {
    /// Authentication type.
    #[serde(rename = "type")]
    pub type_: String,

    /// Id of the referenced public key.
    pub public_key: String,
}

/// Services are used to express ways of communicating with the DID subject or
/// associated entities.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    /// A URI unique to the service.
    pub id: String,

    /// The service type.
    #[serde(rename = "type")]
    pub type_: String,

    /// The service endpoint.
    #[allow(clippy::struct_field_names)]
    pub service_endpoint: String,
}

/// DID document metadata.
///
/// Versions are identified by block number: `version_id` is the block of the
/// last change applied to the document, `next_version_id` the block of the
/// first change recorded after the resolution time (only present for
/// historical resolution).
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
#[allow(clippy::module_name_repetitions)]
pub struct DocumentMetadata {
    /// Block number of the last applied change.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version_id: Option<String>,

    /// Block time of the last applied change.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated: Option<DateTime<Utc>>,

    /// Block number of the next change, if the document is not the latest.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_version_id: Option<String>,

    /// Block time of the next change, if the document is not the latest.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_update: Option<DateTime<Utc>>,
}

/// An active attribute that is neither a public key nor a service.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RawAttribute {
    /// Attribute name as recorded.
    pub name: String,

    /// Attribute value as `0x`-prefixed hex.
    #[serde(with = "hex_bytes")]
    pub value: Vec<u8>,

    /// End of the attribute's validity window.
    pub valid_to: Timestamp,

    /// Why the attribute was not published.
    pub reason: String,
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;

    #[test]
    fn key_material_round_trip() {
        let json = json!({
            "id": "did:ethr:0x1111111111111111111111111111111111111111#delegate-1",
            "type": "Ed25519VerificationKey2018",
            "controller": "did:ethr:0x1111111111111111111111111111111111111111",
            "publicKeyBase64": "aGVsbG8="
        });
        let pk: PublicKey = serde_json::from_value(json.clone()).expect("should deserialize");
        assert_eq!(
            pk.material,
            KeyMaterial::PublicKeyBase64 {
                public_key_base64: "aGVsbG8=".into()
            }
        );
        assert_eq!(serde_json::to_value(&pk).expect("should serialize"), json);
    }

    #[test]
    fn lookup() {
        let did = "did:ethr:0x1111111111111111111111111111111111111111";
        let doc = Document {
            context: DID_CONTEXT.into(),
            id: did.into(),
            controller: did.into(),
            public_key: vec![PublicKey {
                id: format!("{did}#owner"),
                type_: SECP256K1_VERIFICATION_KEY.into(),
                controller: did.into(),
                material: KeyMaterial::default(),
            }],
            authentication: vec![],
            service: vec![Service {
                id: format!("{did}#service-1"),
                type_: "HubService".into(),
                service_endpoint: "https://hub.example.com".into(),
            }],
        };
        assert!(doc.public_key(&format!("{did}#owner")).is_some());
        assert!(doc.public_key(&format!("{did}#delegate-1")).is_none());
        assert!(doc.service(&format!("{did}#service-1")).is_some());
    }
}
