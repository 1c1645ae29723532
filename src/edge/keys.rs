//! Edge cache key definitions.
//!
//! `RequestKey` identifies a cached response (method + URL); `StoreName`
//! identifies a versioned store so activation sweeps can evict every
//! non-current version by name.

use std::fmt;

use axum::http::{Method, Uri};

/// Identity of a cached response: request method plus path-and-query.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestKey {
    pub method: Method,
    pub path_and_query: String,
}

impl RequestKey {
    pub fn new(method: Method, path_and_query: impl Into<String>) -> Self {
        Self {
            method,
            path_and_query: path_and_query.into(),
        }
    }

    /// Key for a GET of the given path.
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn from_uri(method: Method, uri: &Uri) -> Self {
        let path_and_query = uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| uri.path().to_string());
        Self::new(method, path_and_query)
    }
}

/// Which strategy a store backs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreKind {
    Documents,
    Media,
}

impl StoreKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StoreKind::Documents => "documents",
            StoreKind::Media => "media",
        }
    }
}

/// Versioned store name, rendered `documents-v4` / `media-v4`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StoreName {
    pub kind: StoreKind,
    pub version: u32,
}

impl StoreName {
    pub fn new(kind: StoreKind, version: u32) -> Self {
        Self { kind, version }
    }

    /// Parse a rendered store name. Returns `None` for names this deploy
    /// scheme never produced.
    pub fn parse(name: &str) -> Option<Self> {
        let (kind, version) = name.rsplit_once("-v")?;
        let kind = match kind {
            "documents" => StoreKind::Documents,
            "media" => StoreKind::Media,
            _ => return None,
        };
        let version = version.parse().ok()?;
        Some(Self { kind, version })
    }
}

impl fmt::Display for StoreName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-v{}", self.kind.as_str(), self.version)
    }
}
