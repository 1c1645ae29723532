//! Request classification.
//!
//! Pure function of the request: maps method + URL to the routing class whose
//! strategy the router executes. Rules are evaluated in order, first match
//! wins.

use axum::http::{Method, Uri};

use super::config::EdgeConfig;

/// Routing category assigned to a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestClass {
    /// Not intercepted at all (non-GET, non-network scheme).
    Ignore,
    /// Forwarded to the origin untouched, no store interaction.
    LivePassthrough,
    /// Served from the media store when present; fetched and written through
    /// otherwise.
    MediaCacheFirst,
    /// Fetched live first; cache and landing page are fallbacks.
    DocumentNetworkFirst,
}

impl RequestClass {
    pub fn as_str(self) -> &'static str {
        match self {
            RequestClass::Ignore => "ignore",
            RequestClass::LivePassthrough => "live_passthrough",
            RequestClass::MediaCacheFirst => "media_cache_first",
            RequestClass::DocumentNetworkFirst => "document_network_first",
        }
    }
}

/// Classify a request. No side effects.
pub fn classify(method: &Method, uri: &Uri, config: &EdgeConfig) -> RequestClass {
    if method != Method::GET {
        return RequestClass::Ignore;
    }

    if let Some(scheme) = uri.scheme_str() {
        if scheme != "http" && scheme != "https" {
            return RequestClass::Ignore;
        }
    }

    let path = uri.path();

    if path.starts_with(&config.data_api_prefix) {
        return RequestClass::LivePassthrough;
    }

    // Content-hashed artifacts are already immutable; caching them here would
    // fight the host platform's own asset caching.
    if path.starts_with(&config.asset_prefix) {
        return RequestClass::LivePassthrough;
    }

    if config.is_media_path(path) {
        return RequestClass::MediaCacheFirst;
    }

    RequestClass::DocumentNetworkFirst
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify_str(method: Method, uri: &str) -> RequestClass {
        let uri: Uri = uri.parse().expect("uri");
        classify(&method, &uri, &EdgeConfig::default())
    }

    #[test]
    fn non_get_is_ignored() {
        assert_eq!(classify_str(Method::POST, "/api/bookings"), RequestClass::Ignore);
        assert_eq!(classify_str(Method::PUT, "/"), RequestClass::Ignore);
        assert_eq!(classify_str(Method::DELETE, "/cart"), RequestClass::Ignore);
    }

    #[test]
    fn non_network_scheme_is_ignored() {
        assert_eq!(
            classify_str(Method::GET, "chrome-extension://abcdef/page.html"),
            RequestClass::Ignore
        );
    }

    #[test]
    fn data_api_passes_through() {
        assert_eq!(
            classify_str(Method::GET, "/api/services"),
            RequestClass::LivePassthrough
        );
    }

    #[test]
    fn hashed_assets_pass_through() {
        assert_eq!(
            classify_str(Method::GET, "/assets/app.3f9c1d.js"),
            RequestClass::LivePassthrough
        );
    }

    #[test]
    fn media_extensions_are_cache_first() {
        assert_eq!(
            classify_str(Method::GET, "/img/barber-pole.png"),
            RequestClass::MediaCacheFirst
        );
        assert_eq!(
            classify_str(Method::GET, "/fonts/Inter.woff2"),
            RequestClass::MediaCacheFirst
        );
    }

    #[test]
    fn documents_are_network_first() {
        assert_eq!(classify_str(Method::GET, "/"), RequestClass::DocumentNetworkFirst);
        assert_eq!(
            classify_str(Method::GET, "/appointments/42"),
            RequestClass::DocumentNetworkFirst
        );
    }

    #[test]
    fn rule_order_api_wins_over_media() {
        // An API route that happens to end in a media extension still passes
        // through: rules match in order.
        assert_eq!(
            classify_str(Method::GET, "/api/exports/report.png"),
            RequestClass::LivePassthrough
        );
    }

    #[test]
    fn absolute_http_url_classifies_by_path() {
        assert_eq!(
            classify_str(Method::GET, "https://shop.example/img/logo.svg"),
            RequestClass::MediaCacheFirst
        );
    }
}
