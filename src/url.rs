//! Destructure `did:ethr` DIDs and DID URLs into strongly typed components.
//!
//! A DID URL is of the form
//!
//! `did:ethr:<address>[?versionTime=<time>][#<fragment>]`.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;
use std::sync::LazyLock;

use chrono::{DateTime, SecondsFormat, Utc};
use regex::Regex;

use crate::address::Address;
use crate::error::Error;

static DID_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new("^did:ethr:(?<address>0x[0-9a-fA-F]{40})$").expect("should compile")
});

static URL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new("^did:ethr:(?<address>0x[0-9a-fA-F]{40})(\\?(?<query>[^#]*))?(#(?<fragment>.*))?$")
        .expect("should compile")
});

/// Parse a `did:ethr` DID into the identity address.
///
/// # Errors
///
/// Returns [`Error::UnsupportedMethod`] if the DID uses another method or
/// does not carry a 20-byte hex address.
pub fn parse_did(did: &str) -> crate::Result<Address> {
    let Some(caps) = DID_REGEX.captures(did) else {
        return Err(unsupported(did));
    };
    caps["address"].parse().map_err(|e: anyhow::Error| Error::UnsupportedMethod(e.to_string()))
}

fn unsupported(did: &str) -> Error {
    match did.strip_prefix("did:").and_then(|rest| rest.split(':').next()) {
        Some("ethr") => Error::UnsupportedMethod(format!("{did} is not a valid did:ethr")),
        Some(method) => Error::UnsupportedMethod(format!("unsupported DID method: '{method}'")),
        None => Error::UnsupportedMethod(format!("{did} is not a DID")),
    }
}

/// Structure of a `did:ethr` DID URL.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Url {
    /// The identity address.
    pub id: Address,

    /// Query.
    ///
    /// If present, the query parameters select the version of the DID
    /// document to dereference.
    pub query: Option<QueryParams>,

    /// Fragment.
    ///
    /// If present, the fragment identifies a public key or service within
    /// the DID document.
    pub fragment: Option<String>,
}

/// Supported query parameters.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QueryParams {
    /// Resolve the document as it stood at this time.
    pub version_time: Option<DateTime<Utc>>,
}

impl Url {
    /// The DID part of the URL.
    #[must_use]
    pub fn did(&self) -> String {
        self.id.did()
    }

    /// The full id of the resource the fragment refers to, as used for
    /// public key and service ids.
    #[must_use]
    pub fn resource_id(&self) -> String {
        match &self.fragment {
            Some(fragment) => format!("{}#{fragment}", self.did()),
            None => self.did(),
        }
    }
}

impl Display for Url {
    /// Format the URL as a specification-compliant string.
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.did())?;
        if let Some(version_time) = self.query.as_ref().and_then(|q| q.version_time) {
            write!(f, "?versionTime={}", version_time.to_rfc3339_opts(SecondsFormat::Secs, true))?;
        }
        if let Some(fragment) = &self.fragment {
            write!(f, "#{fragment}")?;
        }
        Ok(())
    }
}

impl FromStr for Url {
    type Err = Error;

    /// Parse a string if possible into a strongly typed DID URL struct.
    ///
    /// # Errors
    /// [`Error::UnsupportedMethod`] if the DID part is not a valid `did:ethr`
    /// and [`Error::InvalidDidUrl`] if the query cannot be parsed.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some(caps) = URL_REGEX.captures(s) else {
            let did = s.split(['?', '#']).next().unwrap_or_default();
            return Err(unsupported(did));
        };
        let id = caps["address"]
            .parse()
            .map_err(|e: anyhow::Error| Error::UnsupportedMethod(e.to_string()))?;

        let query = match caps.name("query") {
            Some(query) => Some(parse_query(query.as_str())?),
            None => None,
        };
        let fragment =
            caps.name("fragment").map(|f| f.as_str().to_string()).filter(|f| !f.is_empty());

        Ok(Self { id, query, fragment })
    }
}

fn parse_query(query: &str) -> crate::Result<QueryParams> {
    let mut params = QueryParams::default();
    for pair in query.split('&').filter(|p| !p.is_empty()) {
        let Some((key, value)) = pair.split_once('=') else {
            return Err(Error::InvalidDidUrl(format!("query parameter {pair} has no value")));
        };
        match key {
            "versionTime" => {
                let time = DateTime::parse_from_rfc3339(value).map_err(|e| {
                    Error::InvalidDidUrl(format!("versionTime {value} is not RFC 3339: {e}"))
                })?;
                params.version_time = Some(time.with_timezone(&Utc));
            }
            _ => {
                return Err(Error::InvalidDidUrl(format!("unsupported query parameter {key}")));
            }
        }
    }
    Ok(params)
}
