//! # Provider Traits

use std::future::Future;

use anyhow::Result;

use crate::address::Address;
use crate::event::{BlockNumber, ChangeEvent};

/// [`Registry`] is used to proxy read access to the on-chain identity
/// registry.
///
/// Implementers typically make JSON-RPC calls to a node: `owner` and
/// `changed` are contract calls (`identityOwner` and `changed`), while
/// `events` filters the registry's logs for the identity at a single block.
/// Implementations must be safe to share between concurrent resolutions.
pub trait Registry: Send + Sync {
    /// The current owner of the identity. An identity that has never been
    /// transferred is owned by itself.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry cannot be reached.
    fn owner(&self, identity: &Address) -> impl Future<Output = Result<Address>> + Send;

    /// The block of the identity's most recent change, or `None` if the
    /// identity has never changed.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry cannot be reached.
    fn changed(
        &self, identity: &Address,
    ) -> impl Future<Output = Result<Option<BlockNumber>>> + Send;

    /// All change events recorded for the identity in `block`, in log order
    /// (oldest first).
    ///
    /// # Errors
    ///
    /// Returns an error if the registry cannot be reached or the logs cannot
    /// be decoded.
    fn events(
        &self, identity: &Address, block: BlockNumber,
    ) -> impl Future<Output = Result<Vec<ChangeEvent>>> + Send;
}
