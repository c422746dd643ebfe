//! # Ethr DID
//!
//! Resolver for the `did:ethr` DID method.
//!
//! A `did:ethr` DID names an Ethereum account. Its DID document is never
//! stored: it is rebuilt on every resolution from the change events an
//! identity registry contract has recorded for the account (ownership
//! transfers, delegate grants and published attributes).
//!
//! The registry itself is abstracted behind the [`Registry`] trait so the
//! resolver can run against any node client, or an in-memory registry in
//! tests.
//!
//! ```rust,ignore
//! let resolver = Resolver::new(registry);
//! let resolved = resolver.resolve("did:ethr:0xf3beac30c498d9e26865f34fcaa57dbb935b0d74", None).await?;
//! ```

mod address;
pub mod attribute;
mod builder;
mod config;
mod document;
mod error;
mod event;
pub mod history;
mod provider;
mod resolve;
mod url;

pub use self::address::Address;
pub use self::builder::DocumentBuilder;
pub use self::config::{Config, DEFAULT_RPC_TIMEOUT_MS};
pub use self::document::*;
pub use self::error::Error;
pub use self::event::{
    BlockNumber, ChangeEvent, DelegateType, EventKind, Timestamp, block_pointer, bytes32_to_string,
};
pub use self::provider::Registry;
pub use self::resolve::{
    ContentType, Metadata, Options, RESOLUTION_CONTEXT, Resolved, Resolver, Resource, Stage,
    document_resource,
};
pub use self::url::{QueryParams, Url, parse_did};

/// Result type for resolution operations.
pub type Result<T, E = Error> = core::result::Result<T, E>;
