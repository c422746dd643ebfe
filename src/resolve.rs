//! # DID Resolver
//!
//! Resolution of `did:ethr` DIDs into DID documents.
//!
//! Resolution is a single linear pass: look up the identity's owner and
//! latest change block, walk the change history, fold it into document
//! entries and encode the entries as public keys and services. Any registry
//! failure abandons the pass; a document is only ever returned complete.
//!
//! See [DID resolution](https://www.w3.org/TR/did-core/#did-resolution) for more.

use std::fmt::{self, Display, Formatter};
use std::future::Future;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::builder::DocumentBuilder;
use crate::config::Config;
use crate::document::{Document, DocumentMetadata, PublicKey, RawAttribute, Service};
use crate::error::Error;
use crate::event::Timestamp;
use crate::history;
use crate::provider::Registry;
use crate::url::{Url, parse_did};

/// JSON-LD context of a resolution result.
pub const RESOLUTION_CONTEXT: &str = "https://w3id.org/did-resolution/v1";

/// Stages of a resolution. Each is entered at most once, in order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub enum Stage {
    /// DID parsing. No registry calls are made.
    Start,

    /// Reading the current owner and latest change block.
    OwnerLookup,

    /// Walking the change history.
    HistoryCollection,

    /// Applying events to delegate and attribute entries.
    Folding,

    /// Turning entries into public keys and services.
    Encoding,

    /// Resolution complete.
    Done,
}

impl Display for Stage {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Run a registry call with a timeout, mapping any failure to
/// [`Error::RegistryUnavailable`].
pub(crate) async fn timed<T>(
    stage: Stage, timeout: Duration, call: impl Future<Output = anyhow::Result<T>>,
) -> crate::Result<T> {
    match tokio::time::timeout(timeout, call).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => {
            tracing::error!(%stage, "registry call failed: {e:#}");
            Err(Error::RegistryUnavailable {
                stage,
                message: format!("{e:#}"),
            })
        }
        Err(_) => {
            tracing::error!(%stage, ?timeout, "registry call timed out");
            Err(Error::RegistryUnavailable {
                stage,
                message: format!("registry call timed out after {timeout:?}"),
            })
        }
    }
}

/// Used to pass additional values to `resolve`.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Options {
    /// Resolve the document as it stood at this time. Defaults to now.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub at_time: Option<DateTime<Utc>>,

    /// Override the configured per-call registry timeout.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rpc_timeout_ms: Option<u64>,
}

/// Returned by `resolve`.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Resolved {
    /// The DID resolution context.
    #[serde(rename = "@context")]
    pub context: String,

    /// Resolution metadata.
    pub metadata: Metadata,

    /// The DID document.
    pub document: Document,

    /// DID document metadata.
    pub document_metadata: DocumentMetadata,

    /// Active attributes that are neither keys nor services.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub raw_attributes: Vec<RawAttribute>,
}

impl Default for Resolved {
    fn default() -> Self {
        Self {
            context: RESOLUTION_CONTEXT.to_string(),
            metadata: Metadata::default(),
            document: Document::default(),
            document_metadata: DocumentMetadata::default(),
            raw_attributes: vec![],
        }
    }
}

/// Resolution metadata.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    /// The Media Type of the returned resource.
    pub content_type: ContentType,
}

/// The Media Type of the returned resource.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub enum ContentType {
    /// JSON-LD representation of a DID document.
    #[default]
    #[serde(rename = "application/did+ld+json")]
    DidLdJson,
}

/// Resource represents the DID document resource returned as a result of DID
/// dereferencing. The resource is a DID document or a part of one.
#[allow(clippy::large_enum_variant)]
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub enum Resource {
    ///  DID `Document` resource.
    Document(Document),

    /// `PublicKey` resource.
    PublicKey(PublicKey),

    /// `Service` resource.
    Service(Service),
}

/// Resolves `did:ethr` DIDs against an identity registry.
///
/// The resolver holds no mutable state: one instance can serve any number of
/// concurrent resolutions, provided the registry can.
#[derive(Clone, Debug)]
pub struct Resolver<R> {
    registry: R,
    config: Config,
}

impl<R: Registry> Resolver<R> {
    /// Create a resolver with the default configuration.
    pub fn new(registry: R) -> Self {
        Self::with_config(registry, Config::default())
    }

    /// Create a resolver with the provided configuration.
    pub const fn with_config(registry: R, config: Config) -> Self {
        Self { registry, config }
    }

    /// The registry the resolver reads from.
    pub const fn registry(&self) -> &R {
        &self.registry
    }

    /// Resolve a `did:ethr` DID to its DID document.
    ///
    /// The document reflects every change recorded at or before
    /// `options.at_time` (default: now). Resolving the same DID at the same
    /// time against an unchanged registry always yields the same result.
    ///
    /// # Errors
    ///
    /// [`Error::UnsupportedMethod`] if the DID is not a valid `did:ethr` (no
    /// registry call is made). [`Error::RegistryUnavailable`] if a registry
    /// call fails or times out and [`Error::MalformedEvent`] if the history
    /// cannot be trusted.
    pub async fn resolve(&self, did: &str, options: Option<Options>) -> crate::Result<Resolved> {
        let identity = parse_did(did)?;
        let options = options.unwrap_or_default();
        let at = options.at_time.unwrap_or_else(Utc::now);
        let timeout = options.rpc_timeout_ms.map_or_else(|| self.config.timeout(), Duration::from_millis);

        self.resolve_identity(identity, at, timeout).await
    }

    async fn resolve_identity(
        &self, identity: Address, at: DateTime<Utc>, timeout: Duration,
    ) -> crate::Result<Resolved> {
        tracing::debug!(stage = %Stage::OwnerLookup, %identity, %at);
        let owner = timed(Stage::OwnerLookup, timeout, self.registry.owner(&identity)).await?;
        let latest = timed(Stage::OwnerLookup, timeout, self.registry.changed(&identity)).await?;

        tracing::debug!(stage = %Stage::HistoryCollection, %identity, ?latest);
        let events = history::walk(&self.registry, &identity, latest, timeout).await?;

        tracing::debug!(stage = %Stage::Folding, %identity, events = events.len());
        let builder = DocumentBuilder::new(identity, unix_time(at))
            .context(self.config.context.clone())
            .registry_owner(owner)
            .history(&events);

        tracing::debug!(stage = %Stage::Encoding, %identity);
        let resolved = builder.build();

        tracing::debug!(stage = %Stage::Done, %identity, keys = resolved.document.public_key.len());
        Ok(resolved)
    }

    /// Dereference a `did:ethr` DID URL into a resource.
    ///
    /// A `versionTime` query parameter resolves the document as it stood at
    /// that time. A fragment selects a public key or service from the
    /// document; without one the whole document is returned.
    ///
    /// # Errors
    ///
    /// As for [`Resolver::resolve`], plus [`Error::InvalidDidUrl`] for an
    /// unreadable query and [`Error::NotFound`] when the fragment matches
    /// nothing in the document.
    pub async fn dereference(&self, did_url: &str) -> crate::Result<Resource> {
        let url = Url::from_str(did_url)?;
        let options = Options {
            at_time: url.query.as_ref().and_then(|q| q.version_time),
            ..Options::default()
        };
        let resolved = self.resolve(&url.did(), Some(options)).await?;
        document_resource(&url, &resolved.document)
    }
}

/// Get a resource from a DID document.
///
/// Uses the `Url` fragment to infer the type of resource to return.
///
/// # Errors
/// Will return an error if the resource is not found in the document.
pub fn document_resource(url: &Url, doc: &Document) -> crate::Result<Resource> {
    if url.fragment.is_none() {
        return Ok(Resource::Document(doc.clone()));
    }
    let id = url.resource_id();
    if let Some(pk) = doc.public_key(&id) {
        return Ok(Resource::PublicKey(pk.clone()));
    }
    if let Some(service) = doc.service(&id) {
        return Ok(Resource::Service(service.clone()));
    }
    Err(Error::NotFound(format!("{id} not found in document")))
}

// Resolution times before the epoch see no events at all.
fn unix_time(at: DateTime<Utc>) -> Timestamp {
    Timestamp::try_from(at.timestamp()).unwrap_or(0)
}

#[cfg(test)]
mod test {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use anyhow::{Result, anyhow};

    use super::*;
    use crate::event::{BlockNumber, ChangeEvent, EventKind};

    const DID: &str = "did:ethr:0x1111111111111111111111111111111111111111";

    // Registry holding a single owner change at block 7.
    #[derive(Default)]
    struct MockRegistry {
        calls: AtomicUsize,
        stall: bool,
        fail: bool,
    }

    impl MockRegistry {
        fn new_owner() -> Address {
            Address::new([0x22; 20])
        }
    }

    impl Registry for MockRegistry {
        async fn owner(&self, _: &Address) -> Result<Address> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.stall {
                tokio::time::sleep(Duration::from_secs(60)).await;
            }
            if self.fail {
                return Err(anyhow!("node unreachable"));
            }
            Ok(Self::new_owner())
        }

        async fn changed(&self, _: &Address) -> Result<Option<BlockNumber>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Some(7))
        }

        async fn events(&self, identity: &Address, block: BlockNumber) -> Result<Vec<ChangeEvent>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![ChangeEvent {
                identity: *identity,
                block_number: block,
                timestamp: 1_600_000_000,
                previous_change: None,
                kind: EventKind::OwnerChanged {
                    owner: Self::new_owner(),
                },
            }])
        }
    }

    #[tokio::test]
    async fn resolve_owner_change() {
        let resolver = Resolver::new(MockRegistry::default());
        let resolved = resolver.resolve(DID, None).await.expect("should resolve");

        assert_eq!(resolved.context, RESOLUTION_CONTEXT);
        assert_eq!(resolved.document.controller, MockRegistry::new_owner().did());
        assert_eq!(resolved.document.public_key.len(), 1);
        assert_eq!(resolved.document_metadata.version_id.as_deref(), Some("7"));
        assert_eq!(resolver.registry().calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn unsupported_method_makes_no_calls() {
        let resolver = Resolver::new(MockRegistry::default());
        let err = resolver.resolve("did:web:example.com", None).await.expect_err("should fail");

        assert_eq!(err, Error::UnsupportedMethod("unsupported DID method: 'web'".into()));
        assert_eq!(resolver.registry().calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn owner_lookup_failure() {
        let registry = MockRegistry {
            fail: true,
            ..MockRegistry::default()
        };
        let err = Resolver::new(registry).resolve(DID, None).await.expect_err("should fail");
        assert_eq!(
            err,
            Error::RegistryUnavailable {
                stage: Stage::OwnerLookup,
                message: "node unreachable".into(),
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_aborts() {
        let registry = MockRegistry {
            stall: true,
            ..MockRegistry::default()
        };
        let options = Options {
            rpc_timeout_ms: Some(100),
            ..Options::default()
        };
        let err = Resolver::new(registry).resolve(DID, Some(options)).await.expect_err("should fail");
        assert!(matches!(err, Error::RegistryUnavailable { stage: Stage::OwnerLookup, .. }));
    }

    #[tokio::test]
    async fn dereference_fragment() {
        let resolver = Resolver::new(MockRegistry::default());

        let Resource::PublicKey(pk) =
            resolver.dereference(&format!("{DID}#owner")).await.expect("should dereference")
        else {
            panic!("should be a public key");
        };
        assert_eq!(pk.id, format!("{DID}#owner"));

        let err = resolver.dereference(&format!("{DID}#delegate-1")).await.expect_err("should fail");
        assert_eq!(err.code(), "notFound");

        let resource = resolver.dereference(DID).await.expect("should dereference");
        assert!(matches!(resource, Resource::Document(_)));
    }

    #[tokio::test]
    async fn dereference_version_time() {
        let resolver = Resolver::new(MockRegistry::default());
        let url = format!("{DID}?versionTime=2019-01-01T00:00:00Z");

        let Resource::Document(doc) = resolver.dereference(&url).await.expect("should dereference")
        else {
            panic!("should be a document");
        };
        assert_eq!(doc.controller, DID);
    }

    #[test]
    fn pre_epoch() {
        let at = DateTime::from_timestamp(-5, 0).expect("should create");
        assert_eq!(unix_time(at), 0);
    }
}
