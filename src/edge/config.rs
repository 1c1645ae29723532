//! Edge cache configuration.
//!
//! All store names are derived from an injected version so tests can run
//! independent controllers with distinct versions and no shared process
//! state.

use std::num::NonZeroUsize;

use serde::Deserialize;

use super::keys::{StoreKind, StoreName};

const DEFAULT_CACHE_VERSION: u32 = 1;
const DEFAULT_DATA_API_PREFIX: &str = "/api/";
const DEFAULT_ASSET_PREFIX: &str = "/assets/";
const DEFAULT_DOCUMENT_ENTRY_LIMIT: usize = 500;
const DEFAULT_MEDIA_ENTRY_LIMIT: usize = 1000;
const DEFAULT_LANDING_PATH: &str = "/";

/// Image and font formats served cache-first. Everything else on the media
/// path falls through to the document strategy.
const DEFAULT_MEDIA_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "webp", "avif", "svg", "ico", "bmp", "woff", "woff2", "ttf",
    "otf",
];

/// Edge cache configuration from `rasoio.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EdgeConfig {
    /// Deploy version encoded into store names (`documents-v{N}`).
    pub cache_version: u32,
    /// Path prefix for the application's own data API; never intercepted.
    pub data_api_prefix: String,
    /// Path prefix for content-hashed build artifacts; the hash already
    /// guarantees correctness, so the host platform's caching wins.
    pub asset_prefix: String,
    /// Lower-case extensions served via the media cache-first strategy.
    pub media_extensions: Vec<String>,
    /// Maximum entries in the documents store.
    pub document_entry_limit: usize,
    /// Maximum entries in the media store.
    pub media_entry_limit: usize,
    /// Paths fetched into the documents store during install.
    pub precache_paths: Vec<String>,
    /// Last-resort fallback served when a document is unreachable and
    /// uncached.
    pub landing_path: String,
}

impl Default for EdgeConfig {
    fn default() -> Self {
        Self {
            cache_version: DEFAULT_CACHE_VERSION,
            data_api_prefix: DEFAULT_DATA_API_PREFIX.to_string(),
            asset_prefix: DEFAULT_ASSET_PREFIX.to_string(),
            media_extensions: DEFAULT_MEDIA_EXTENSIONS
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
            document_entry_limit: DEFAULT_DOCUMENT_ENTRY_LIMIT,
            media_entry_limit: DEFAULT_MEDIA_ENTRY_LIMIT,
            precache_paths: vec![DEFAULT_LANDING_PATH.to_string()],
            landing_path: DEFAULT_LANDING_PATH.to_string(),
        }
    }
}

impl EdgeConfig {
    /// Name of the current-version documents store.
    pub fn document_store(&self) -> StoreName {
        StoreName::new(StoreKind::Documents, self.cache_version)
    }

    /// Name of the current-version media store.
    pub fn media_store(&self) -> StoreName {
        StoreName::new(StoreKind::Media, self.cache_version)
    }

    /// Returns the documents entry limit as NonZeroUsize, clamping to 1 if zero.
    pub fn document_entry_limit_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.document_entry_limit).unwrap_or(NonZeroUsize::MIN)
    }

    /// Returns the media entry limit as NonZeroUsize, clamping to 1 if zero.
    pub fn media_entry_limit_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.media_entry_limit).unwrap_or(NonZeroUsize::MIN)
    }

    /// Whether the path's extension is on the media allowlist.
    pub fn is_media_path(&self, path: &str) -> bool {
        let file = path.rsplit('/').next().unwrap_or(path);
        match file.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => {
                let ext = ext.to_ascii_lowercase();
                self.media_extensions.iter().any(|allowed| *allowed == ext)
            }
            _ => false,
        }
    }
}

impl From<&crate::config::EdgeSettings> for EdgeConfig {
    fn from(settings: &crate::config::EdgeSettings) -> Self {
        Self {
            cache_version: settings.cache_version,
            data_api_prefix: settings.data_api_prefix.clone(),
            asset_prefix: settings.asset_prefix.clone(),
            media_extensions: settings.media_extensions.clone(),
            document_entry_limit: settings.document_entry_limit,
            media_entry_limit: settings.media_entry_limit,
            precache_paths: settings.precache_paths.clone(),
            landing_path: settings.landing_path.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let config = EdgeConfig::default();
        assert_eq!(config.cache_version, 1);
        assert_eq!(config.data_api_prefix, "/api/");
        assert_eq!(config.asset_prefix, "/assets/");
        assert_eq!(config.document_entry_limit, 500);
        assert_eq!(config.media_entry_limit, 1000);
        assert_eq!(config.precache_paths, vec!["/".to_string()]);
        assert_eq!(config.landing_path, "/");
    }

    #[test]
    fn store_names_follow_version() {
        let config = EdgeConfig {
            cache_version: 4,
            ..Default::default()
        };
        assert_eq!(config.document_store().to_string(), "documents-v4");
        assert_eq!(config.media_store().to_string(), "media-v4");
    }

    #[test]
    fn media_path_matches_extension_allowlist() {
        let config = EdgeConfig::default();
        assert!(config.is_media_path("/img/shop-front.webp"));
        assert!(config.is_media_path("/fonts/Inter.WOFF2"));
        assert!(!config.is_media_path("/appointments/42"));
        assert!(!config.is_media_path("/styles/main.css"));
        assert!(!config.is_media_path("/.well-known/icons"));
    }

    #[test]
    fn entry_limits_clamp_to_min() {
        let config = EdgeConfig {
            document_entry_limit: 0,
            ..Default::default()
        };
        assert_eq!(config.document_entry_limit_non_zero().get(), 1);
    }
}
