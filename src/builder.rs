//! # Document Builder
//!
//! Folds an identity's change history into a DID document.
//!
//! Events are applied oldest to newest. Delegates are keyed by
//! `(delegate type, address)` and attributes by name; a later event for the
//! same key always replaces the earlier one, whatever either's validity. An
//! event whose validity has already ended at the resolution time removes the
//! entry, so re-adding it later appends it at the end of the document.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::address::Address;
use crate::attribute::{self, Decoded, Purpose};
use crate::document::{
    Authentication, DID_CONTEXT, Document, DocumentMetadata, KeyMaterial, PublicKey, RawAttribute,
    SECP256K1_SIGNATURE_AUTHENTICATION, SECP256K1_VERIFICATION_KEY, Service,
};
use crate::event::{BlockNumber, ChangeEvent, DelegateType, EventKind, Timestamp};
use crate::resolve::Resolved;

/// Builds the document for an identity as it stood at a given time.
#[derive(Debug)]
pub struct DocumentBuilder {
    identity: Address,
    at: Timestamp,
    context: String,
    registry_owner: Option<Address>,
    owner: Address,
    slots: Slots,
    ordinal: usize,
    applied: Option<(BlockNumber, Timestamp)>,
    next: Option<(BlockNumber, Timestamp)>,
}

impl DocumentBuilder {
    /// Creates a builder for `identity` resolved at `at` (seconds since the
    /// Unix epoch). Until an ownership change is applied the identity owns
    /// itself.
    #[must_use]
    pub fn new(identity: Address, at: Timestamp) -> Self {
        Self {
            identity,
            at,
            context: DID_CONTEXT.to_string(),
            registry_owner: None,
            owner: identity,
            slots: Slots::default(),
            ordinal: 0,
            applied: None,
            next: None,
        }
    }

    /// Set the JSON-LD context of the document.
    #[must_use]
    pub fn context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }

    /// The owner currently reported by the registry.
    ///
    /// Used as the controller when every recorded change falls at or before
    /// the resolution time. Historical resolutions use the owner derived from
    /// the history instead.
    #[must_use]
    pub const fn registry_owner(mut self, owner: Address) -> Self {
        self.registry_owner = Some(owner);
        self
    }

    /// Apply a history as returned by the history walker (most recent event
    /// first).
    #[must_use]
    pub fn history(mut self, events: &[ChangeEvent]) -> Self {
        for event in events.iter().rev() {
            self.apply(event);
        }
        self
    }

    /// Apply a single event. Events must be applied oldest first.
    pub fn apply(&mut self, event: &ChangeEvent) {
        if event.timestamp > self.at {
            if self.next.is_none() {
                self.next = Some((event.block_number, event.timestamp));
            }
            return;
        }
        self.applied = Some((event.block_number, event.timestamp));

        match &event.kind {
            EventKind::OwnerChanged { owner } => {
                self.owner = *owner;
            }
            EventKind::DelegateChanged {
                delegate_type,
                delegate,
                valid_to,
            } => {
                self.ordinal += 1;
                let slot = Slot::Delegate(delegate_type.clone(), *delegate);
                if *valid_to > self.at {
                    let entry = Entry::Delegate {
                        delegate_type: delegate_type.clone(),
                        delegate: *delegate,
                        ordinal: self.ordinal,
                    };
                    self.slots.upsert(slot, entry);
                } else {
                    self.slots.remove(&slot);
                }
            }
            EventKind::AttributeChanged { name, value, valid_to } => {
                self.ordinal += 1;
                let slot = Slot::Attribute(name.clone());
                if *valid_to > self.at {
                    let entry = Entry::Attribute {
                        name: name.clone(),
                        value: value.clone(),
                        valid_to: *valid_to,
                        ordinal: self.ordinal,
                    };
                    self.slots.upsert(slot, entry);
                } else {
                    self.slots.remove(&slot);
                }
            }
        }
    }

    /// Build the resolution result.
    #[must_use]
    pub fn build(self) -> Resolved {
        let did = self.identity.did();
        let owner = match (self.next, self.registry_owner) {
            (None, Some(current)) => {
                if current != self.owner {
                    tracing::warn!(%current, derived = %self.owner, "registry owner differs from history");
                }
                current
            }
            _ => self.owner,
        };

        let owner_key = format!("{did}#owner");
        let mut document = Document {
            context: self.context,
            id: did.clone(),
            controller: owner.did(),
            public_key: vec![PublicKey {
                id: owner_key.clone(),
                type_: SECP256K1_VERIFICATION_KEY.to_string(),
                controller: did.clone(),
                material: KeyMaterial::EthereumAddress {
                    ethereum_address: owner,
                },
            }],
            authentication: vec![Authentication {
                type_: SECP256K1_SIGNATURE_AUTHENTICATION.to_string(),
                public_key: owner_key,
            }],
            service: vec![],
        };
        let mut raw_attributes = vec![];

        for entry in self.slots.entries() {
            match entry {
                Entry::Delegate {
                    delegate_type,
                    delegate,
                    ordinal,
                } => {
                    if let DelegateType::Other(kind) = delegate_type {
                        tracing::warn!(%delegate, kind = %kind, "delegate type publishes no key");
                        continue;
                    }
                    let id = format!("{did}#delegate-{ordinal}");
                    if *delegate_type == DelegateType::SigAuth {
                        document.authentication.push(Authentication {
                            type_: SECP256K1_SIGNATURE_AUTHENTICATION.to_string(),
                            public_key: id.clone(),
                        });
                    }
                    document.public_key.push(PublicKey {
                        id,
                        type_: SECP256K1_VERIFICATION_KEY.to_string(),
                        controller: did.clone(),
                        material: KeyMaterial::EthereumAddress {
                            ethereum_address: *delegate,
                        },
                    });
                }
                Entry::Attribute {
                    name,
                    value,
                    valid_to,
                    ordinal,
                } => match attribute::decode(name, value) {
                    Decoded::Key(key) => {
                        let id = format!("{did}#delegate-{ordinal}");
                        let type_ = key.method_type();
                        if key.purpose == Purpose::SigAuth {
                            document.authentication.push(Authentication {
                                type_: type_.clone(),
                                public_key: id.clone(),
                            });
                        }
                        document.public_key.push(PublicKey {
                            id,
                            type_,
                            controller: did.clone(),
                            material: key.material,
                        });
                    }
                    Decoded::Service(svc) => {
                        document.service.push(Service {
                            id: format!("{did}#service-{ordinal}"),
                            type_: svc.service_type,
                            service_endpoint: svc.endpoint,
                        });
                    }
                    Decoded::Unrecognized(reason) => {
                        tracing::warn!(name = %name, reason = %reason, "unrecognized attribute");
                        raw_attributes.push(RawAttribute {
                            name: name.clone(),
                            value: value.clone(),
                            valid_to: *valid_to,
                            reason,
                        });
                    }
                },
            }
        }

        let document_metadata = DocumentMetadata {
            version_id: self.applied.map(|(block, _)| block.to_string()),
            updated: self.applied.and_then(|(_, ts)| block_time(ts)),
            next_version_id: self.next.map(|(block, _)| block.to_string()),
            next_update: self.next.and_then(|(_, ts)| block_time(ts)),
        };

        Resolved {
            document,
            document_metadata,
            raw_attributes,
            ..Resolved::default()
        }
    }
}

fn block_time(ts: Timestamp) -> Option<DateTime<Utc>> {
    i64::try_from(ts).ok().and_then(|secs| DateTime::from_timestamp(secs, 0))
}

// Logical slot a delegate or attribute occupies in the document.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
enum Slot {
    Delegate(DelegateType, Address),
    Attribute(String),
}

#[derive(Clone, Debug)]
enum Entry {
    Delegate {
        delegate_type: DelegateType,
        delegate: Address,
        ordinal: usize,
    },
    Attribute {
        name: String,
        value: Vec<u8>,
        valid_to: Timestamp,
        ordinal: usize,
    },
}

// Insertion-ordered map from slot to its latest surviving entry. Removed
// entries leave a hole so positions of the others do not move.
#[derive(Debug, Default)]
struct Slots {
    entries: Vec<Option<Entry>>,
    index: HashMap<Slot, usize>,
}

impl Slots {
    fn upsert(&mut self, slot: Slot, entry: Entry) {
        if let Some(&pos) = self.index.get(&slot) {
            self.entries[pos] = Some(entry);
        } else {
            self.index.insert(slot, self.entries.len());
            self.entries.push(Some(entry));
        }
    }

    fn remove(&mut self, slot: &Slot) {
        if let Some(pos) = self.index.remove(slot) {
            self.entries[pos] = None;
        }
    }

    fn entries(&self) -> impl Iterator<Item = &Entry> {
        self.entries.iter().flatten()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const AT: Timestamp = 1_000_000;

    fn identity() -> Address {
        Address::new([0x11; 20])
    }

    fn event(block: BlockNumber, kind: EventKind) -> ChangeEvent {
        ChangeEvent {
            identity: identity(),
            block_number: block,
            timestamp: block * 10,
            previous_change: None,
            kind,
        }
    }

    fn delegate(block: BlockNumber, addr: u8, valid_to: Timestamp) -> ChangeEvent {
        event(
            block,
            EventKind::DelegateChanged {
                delegate_type: DelegateType::VeriKey,
                delegate: Address::new([addr; 20]),
                valid_to,
            },
        )
    }

    fn attribute(block: BlockNumber, name: &str, value: &[u8], valid_to: Timestamp) -> ChangeEvent {
        event(
            block,
            EventKind::AttributeChanged {
                name: name.into(),
                value: value.to_vec(),
                valid_to,
            },
        )
    }

    fn key_ids(resolved: &Resolved) -> Vec<String> {
        let did = identity().did();
        resolved
            .document
            .public_key
            .iter()
            .map(|pk| pk.id.trim_start_matches(&did).to_string())
            .collect()
    }

    #[test]
    fn zero_history() {
        let resolved = DocumentBuilder::new(identity(), AT).build();
        assert_eq!(key_ids(&resolved), vec!["#owner"]);
        assert_eq!(resolved.document.controller, identity().did());
        assert_eq!(resolved.document_metadata, DocumentMetadata::default());
    }

    #[test]
    fn expiry_boundary() {
        let resolved = DocumentBuilder::new(identity(), AT).history(&[delegate(1, 0x22, AT)]).build();
        assert_eq!(key_ids(&resolved), vec!["#owner"]);

        let resolved =
            DocumentBuilder::new(identity(), AT).history(&[delegate(1, 0x22, AT + 1)]).build();
        assert_eq!(key_ids(&resolved), vec!["#owner", "#delegate-1"]);
    }

    // The later event wins even though the earlier one is still valid.
    #[test]
    fn last_write_wins() {
        // history is most recent first
        let history = [delegate(2, 0x22, AT - 1), delegate(1, 0x22, AT + 100)];
        let resolved = DocumentBuilder::new(identity(), AT).history(&history).build();
        assert_eq!(key_ids(&resolved), vec!["#owner"]);
    }

    #[test]
    fn update_keeps_position() {
        let history = [
            delegate(3, 0x22, AT + 50),
            delegate(2, 0x33, AT + 100),
            delegate(1, 0x22, AT + 100),
        ];
        let resolved = DocumentBuilder::new(identity(), AT).history(&history).build();
        assert_eq!(key_ids(&resolved), vec!["#owner", "#delegate-3", "#delegate-2"]);
    }

    #[test]
    fn readd_moves_to_end() {
        let history = [
            delegate(4, 0x22, AT + 100),
            delegate(3, 0x22, 0),
            delegate(2, 0x33, AT + 100),
            delegate(1, 0x22, AT + 100),
        ];
        let resolved = DocumentBuilder::new(identity(), AT).history(&history).build();
        assert_eq!(key_ids(&resolved), vec!["#owner", "#delegate-2", "#delegate-4"]);

        let KeyMaterial::EthereumAddress { ethereum_address } =
            &resolved.document.public_key[2].material
        else {
            panic!("should be an address key");
        };
        assert_eq!(*ethereum_address, Address::new([0x22; 20]));
    }

    #[test]
    fn sig_auth_delegate() {
        let history = [event(
            1,
            EventKind::DelegateChanged {
                delegate_type: DelegateType::SigAuth,
                delegate: Address::new([0x22; 20]),
                valid_to: AT + 1,
            },
        )];
        let resolved = DocumentBuilder::new(identity(), AT).history(&history).build();
        let auth = &resolved.document.authentication;
        assert_eq!(auth.len(), 2);
        assert_eq!(auth[1].public_key, format!("{}#delegate-1", identity().did()));
        assert_eq!(auth[1].type_, SECP256K1_SIGNATURE_AUTHENTICATION);
    }

    #[test]
    fn other_delegate_type() {
        let history = [event(
            1,
            EventKind::DelegateChanged {
                delegate_type: DelegateType::Other("enc".into()),
                delegate: Address::new([0x22; 20]),
                valid_to: AT + 1,
            },
        )];
        let resolved = DocumentBuilder::new(identity(), AT).history(&history).build();
        assert_eq!(key_ids(&resolved), vec!["#owner"]);
    }

    #[test]
    fn owner_changes() {
        let new_owner = Address::new([0x22; 20]);
        let history = [
            event(2, EventKind::OwnerChanged { owner: identity() }),
            event(1, EventKind::OwnerChanged { owner: new_owner }),
        ];
        let resolved = DocumentBuilder::new(identity(), AT).history(&history[1..]).build();
        assert_eq!(resolved.document.controller, new_owner.did());

        // transferring back to itself resets ownership
        let resolved = DocumentBuilder::new(identity(), AT).history(&history).build();
        assert_eq!(resolved.document.controller, identity().did());
        assert_eq!(resolved.document_metadata.version_id.as_deref(), Some("2"));
    }

    #[test]
    fn attributes() {
        let history = [
            attribute(3, "nickname", b"alice", AT + 1),
            attribute(2, "did/svc/HubService", b"https://hub.example.com", AT + 1),
            attribute(1, "did/pub/Ed25519/sigAuth/base64", b"hello", AT + 1),
        ];
        let resolved = DocumentBuilder::new(identity(), AT).history(&history).build();
        let did = identity().did();

        assert_eq!(key_ids(&resolved), vec!["#owner", "#delegate-1"]);
        assert_eq!(resolved.document.public_key[1].type_, "Ed25519SignatureAuthentication2018");
        assert_eq!(
            resolved.document.authentication[1].type_,
            "Ed25519SignatureAuthentication2018"
        );
        assert_eq!(
            resolved.document.service,
            vec![Service {
                id: format!("{did}#service-2"),
                type_: "HubService".into(),
                service_endpoint: "https://hub.example.com".into(),
            }]
        );
        assert_eq!(resolved.raw_attributes.len(), 1);
        assert_eq!(resolved.raw_attributes[0].name, "nickname");
    }

    #[test]
    fn historical() {
        let owner = Address::new([0x22; 20]);
        let history = [
            event(200, EventKind::OwnerChanged { owner }),
            delegate(50, 0x33, u64::MAX),
        ];

        // at block 50's time: delegate present, owner change still pending
        let resolved = DocumentBuilder::new(identity(), 500)
            .registry_owner(owner)
            .history(&history)
            .build();
        assert_eq!(resolved.document.controller, identity().did());
        assert_eq!(key_ids(&resolved), vec!["#owner", "#delegate-1"]);
        assert_eq!(resolved.document_metadata.version_id.as_deref(), Some("50"));
        assert_eq!(resolved.document_metadata.next_version_id.as_deref(), Some("200"));
        assert_eq!(
            resolved.document_metadata.next_update,
            DateTime::from_timestamp(2000, 0)
        );

        // before every event: the zero-history document
        let resolved = DocumentBuilder::new(identity(), 499)
            .registry_owner(owner)
            .history(&history)
            .build();
        assert_eq!(resolved.document, DocumentBuilder::new(identity(), 499).build().document);
    }
}
