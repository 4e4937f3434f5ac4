//! The externally reachable base URL for this process.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where an [`AddressBinding`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressSource {
    /// Found by probing a live tunnel.
    Discovered,
    /// Taken from static configuration.
    Configured,
    /// Nothing resolved; URLs degrade to relative references.
    None,
}

impl AddressSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Discovered => "discovered",
            Self::Configured => "configured",
            Self::None => "none",
        }
    }
}

/// The resolved base URL. Built once at startup and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressBinding {
    base_url: String,
    resolved_at: DateTime<Utc>,
    source: AddressSource,
}

impl AddressBinding {
    /// Creates a binding, dropping any trailing `/` from `base_url`.
    pub fn new(base_url: impl Into<String>, source: AddressSource) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            resolved_at: Utc::now(),
            source,
        }
    }

    /// A binding with no base URL.
    pub fn unbound() -> Self {
        Self::new(String::new(), AddressSource::None)
    }

    /// The base URL, empty when unbound.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn resolved_at(&self) -> DateTime<Utc> {
        self.resolved_at
    }

    pub fn source(&self) -> AddressSource {
        self.source
    }

    pub fn is_bound(&self) -> bool {
        !self.base_url.is_empty()
    }

    /// Joins `path` onto the base URL, or returns the path relative to the
    /// server root when no base URL is bound.
    pub fn url_for(&self, path: &str) -> String {
        let path = path.trim_start_matches('/');
        format!("{}/{}", self.base_url, path)
    }
}
