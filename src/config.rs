//! # Configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::document::DID_CONTEXT;

/// Default time allowed for a single registry call.
pub const DEFAULT_RPC_TIMEOUT_MS: u64 = 10_000;

/// Resolver configuration.
///
/// Can be deserialized from JSON (or any serde format), with every field
/// optional:
///
/// ```json
/// {
///    "rpcTimeoutMs": 5000,
///    "context": "https://w3id.org/did/v1"
/// }
/// ```
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Milliseconds allowed for each registry call before resolution is
    /// abandoned.
    pub rpc_timeout_ms: u64,

    /// JSON-LD context set on resolved documents.
    pub context: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rpc_timeout_ms: DEFAULT_RPC_TIMEOUT_MS,
            context: DID_CONTEXT.to_string(),
        }
    }
}

impl Config {
    /// Set the per-call registry timeout.
    #[must_use]
    pub fn rpc_timeout(mut self, timeout: Duration) -> Self {
        self.rpc_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// The per-call registry timeout as a [`Duration`].
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.rpc_timeout_ms)
    }
}
