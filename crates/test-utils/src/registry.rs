//! # Memory Registry
//!
//! An identity registry kept in memory. Writes behave like the registry
//! contract: each change is recorded in the current block with a pointer to
//! the block of the identity's previous change, and the identity's `changed`
//! marker moves to the current block.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use ethr_did::{Address, BlockNumber, ChangeEvent, DelegateType, EventKind, Registry, Timestamp};

/// Block time of the first block.
pub const GENESIS_TIME: Timestamp = 1_700_000_000;

/// In-memory [`Registry`]. Clones share state, so a test can keep a handle
/// to add changes after handing the registry to a resolver.
#[derive(Clone, Debug, Default)]
pub struct MemoryRegistry {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    block: AtomicU64,
    time: AtomicU64,
    owners: DashMap<Address, Address>,
    changed: DashMap<Address, BlockNumber>,
    logs: DashMap<(Address, BlockNumber), Vec<ChangeEvent>>,
    calls: AtomicUsize,
    failing: AtomicBool,
    stalled: AtomicBool,
}

impl Default for Inner {
    fn default() -> Self {
        Self {
            block: AtomicU64::new(1),
            time: AtomicU64::new(GENESIS_TIME),
            owners: DashMap::new(),
            changed: DashMap::new(),
            logs: DashMap::new(),
            calls: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
            stalled: AtomicBool::new(false),
        }
    }
}

impl MemoryRegistry {
    /// Create an empty registry at block 1.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The current block.
    #[must_use]
    pub fn block(&self) -> BlockNumber {
        self.inner.block.load(Ordering::SeqCst)
    }

    /// Time of the current block in seconds since the epoch.
    #[must_use]
    pub fn now(&self) -> Timestamp {
        self.inner.time.load(Ordering::SeqCst)
    }

    /// Time of the current block.
    #[must_use]
    pub fn time(&self) -> DateTime<Utc> {
        let secs = i64::try_from(self.now()).unwrap_or_default();
        DateTime::from_timestamp(secs, 0).unwrap_or_default()
    }

    /// Start a new block `seconds` after the current one. Returns the new
    /// block number.
    pub fn mine(&self, seconds: u64) -> BlockNumber {
        self.inner.time.fetch_add(seconds, Ordering::SeqCst);
        self.inner.block.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Transfer ownership of `identity`.
    pub fn change_owner(&self, identity: &Address, owner: &Address) {
        self.inner.owners.insert(*identity, *owner);
        self.record(identity, EventKind::OwnerChanged { owner: *owner });
    }

    /// Add (or refresh) a delegate valid for `validity` seconds from now.
    pub fn add_delegate(
        &self, identity: &Address, delegate_type: impl Into<DelegateType>, delegate: &Address,
        validity: u64,
    ) {
        let valid_to = self.now().saturating_add(validity);
        self.record(
            identity,
            EventKind::DelegateChanged {
                delegate_type: delegate_type.into(),
                delegate: *delegate,
                valid_to,
            },
        );
    }

    /// Revoke a delegate. The delegation ends at the current block time.
    pub fn revoke_delegate(
        &self, identity: &Address, delegate_type: impl Into<DelegateType>, delegate: &Address,
    ) {
        self.record(
            identity,
            EventKind::DelegateChanged {
                delegate_type: delegate_type.into(),
                delegate: *delegate,
                valid_to: self.now(),
            },
        );
    }

    /// Set an attribute valid for `validity` seconds from now.
    pub fn set_attribute(&self, identity: &Address, name: &str, value: &[u8], validity: u64) {
        let valid_to = self.now().saturating_add(validity);
        self.record(
            identity,
            EventKind::AttributeChanged {
                name: name.to_string(),
                value: value.to_vec(),
                valid_to,
            },
        );
    }

    /// Revoke an attribute.
    pub fn revoke_attribute(&self, identity: &Address, name: &str, value: &[u8]) {
        self.record(
            identity,
            EventKind::AttributeChanged {
                name: name.to_string(),
                value: value.to_vec(),
                valid_to: 0,
            },
        );
    }

    /// Number of registry calls served (or refused) so far.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.inner.calls.load(Ordering::SeqCst)
    }

    /// Make every subsequent call fail.
    pub fn set_failing(&self, failing: bool) {
        self.inner.failing.store(failing, Ordering::SeqCst);
    }

    /// Make every subsequent call hang for an hour before answering.
    pub fn set_stalled(&self, stalled: bool) {
        self.inner.stalled.store(stalled, Ordering::SeqCst);
    }

    fn record(&self, identity: &Address, kind: EventKind) {
        let block = self.block();
        let previous_change = self.inner.changed.insert(*identity, block);
        let event = ChangeEvent {
            identity: *identity,
            block_number: block,
            timestamp: self.now(),
            previous_change,
            kind,
        };
        self.inner.logs.entry((*identity, block)).or_default().push(event);
    }

    async fn call(&self) -> Result<()> {
        self.inner.calls.fetch_add(1, Ordering::SeqCst);
        if self.inner.stalled.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        if self.inner.failing.load(Ordering::SeqCst) {
            return Err(anyhow!("connection refused"));
        }
        Ok(())
    }
}

impl Registry for MemoryRegistry {
    async fn owner(&self, identity: &Address) -> Result<Address> {
        self.call().await?;
        Ok(self.inner.owners.get(identity).map_or(*identity, |owner| *owner))
    }

    async fn changed(&self, identity: &Address) -> Result<Option<BlockNumber>> {
        self.call().await?;
        Ok(self.inner.changed.get(identity).map(|block| *block))
    }

    async fn events(&self, identity: &Address, block: BlockNumber) -> Result<Vec<ChangeEvent>> {
        self.call().await?;
        Ok(self.inner.logs.get(&(*identity, block)).map(|events| events.clone()).unwrap_or_default())
    }
}
