//! # Errors
//!
//! Errors returned by `did:ethr` resolution. Error codes follow the
//! [DID Specification Registries](https://www.w3.org/TR/did-spec-registries/#error)
//! where a registered code exists.

use thiserror::Error;

use crate::resolve::Stage;

/// Errors that can occur while resolving or dereferencing a `did:ethr` DID.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The DID is not a `did:ethr` DID or its method-specific identifier is
    /// not a 20-byte hex address. Raised before any registry call is made.
    #[error("unsupportedMethod: {0}")]
    UnsupportedMethod(String),

    /// The DID URL could not be parsed (for example, an unreadable
    /// `versionTime` query parameter).
    #[error("invalidDidUrl: {0}")]
    InvalidDidUrl(String),

    /// The requested resource was not found in the resolved document.
    #[error("notFound: {0}")]
    NotFound(String),

    /// A registry call failed or timed out. Resolution is abandoned and no
    /// document is returned.
    #[error("registryUnavailable during {stage}: {message}")]
    RegistryUnavailable {
        /// The resolution stage that was waiting on the registry.
        stage: Stage,

        /// Description of the underlying failure.
        message: String,
    },

    /// The registry returned events that could not be trusted, such as a
    /// back-pointer that does not move to an earlier block.
    #[error("malformedEvent: {0}")]
    MalformedEvent(String),
}

impl Error {
    /// Returns the error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::UnsupportedMethod(_) => "methodNotSupported",
            Self::InvalidDidUrl(_) => "invalidDidUrl",
            Self::NotFound(_) => "notFound",
            Self::RegistryUnavailable { .. } => "registryUnavailable",
            Self::MalformedEvent(_) => "malformedEvent",
        }
    }

    /// Returns the error message without the code prefix.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::UnsupportedMethod(msg)
            | Self::InvalidDidUrl(msg)
            | Self::NotFound(msg)
            | Self::MalformedEvent(msg) => msg.clone(),
            Self::RegistryUnavailable { message, .. } => message.clone(),
        }
    }

    /// Returns `true` when the failure originated in the registry, whether
    /// from transport or from untrustworthy event data.
    #[must_use]
    pub const fn is_registry_failure(&self) -> bool {
        matches!(self, Self::RegistryUnavailable { .. } | Self::MalformedEvent(_))
    }

    /// Transfer the error to a JSON object suitable for resolution metadata.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "error": self.code(),
            "errorMessage": self.message(),
        })
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;

    #[test]
    fn error_code() {
        let err = Error::UnsupportedMethod("did:web:example.com is not did:ethr".into());
        assert_eq!(err.code(), "methodNotSupported");
        assert_eq!(err.message(), "did:web:example.com is not did:ethr");
        assert!(!err.is_registry_failure());
    }

    #[test]
    fn registry_error() {
        let err = Error::RegistryUnavailable {
            stage: Stage::HistoryCollection,
            message: "connection refused".into(),
        };
        assert_eq!(err.to_string(), "registryUnavailable during HistoryCollection: connection refused");
        assert!(err.is_registry_failure());
        assert!(Error::MalformedEvent("cycle".into()).is_registry_failure());
    }

    #[test]
    fn json_err() {
        let err = Error::NotFound("#delegate-9".into());
        assert_eq!(err.to_json(), json!({"error": "notFound", "errorMessage": "#delegate-9"}));
    }
}
