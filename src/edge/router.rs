//! Edge cache router.
//!
//! Executes each request class's strategy as an explicit ordered step list
//! (network, then cache, then static fallback) against the store set and the
//! origin. `route` is infallible: transport failures are converted into
//! cache hits or a terminal document fallback, never surfaced as errors.

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::Method;
use bytes::Bytes;
use metrics::counter;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{debug, instrument};

use super::classify::RequestClass;
use super::config::EdgeConfig;
use super::keys::RequestKey;
use super::store::{CachedEntry, StoreSet};

const OFFLINE_BODY: &str =
    "<!doctype html><title>Offline</title><p>Rasoio is offline. Reconnect and try again.</p>";

/// Request descriptor handed to the router and the origin fetcher.
#[derive(Debug, Clone)]
pub struct EdgeRequest {
    pub method: Method,
    pub path_and_query: String,
}

impl EdgeRequest {
    pub fn get(path_and_query: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            path_and_query: path_and_query.into(),
        }
    }

    pub fn key(&self) -> RequestKey {
        RequestKey::new(self.method.clone(), self.path_and_query.clone())
    }
}

/// Response obtained from the origin.
#[derive(Debug, Clone)]
pub struct FetchedResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Bytes,
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("origin transport failure: {0}")]
    Transport(String),
}

/// Upstream fetch port. The production adapter wraps `reqwest`; tests script
/// outcomes and count calls.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: &EdgeRequest) -> Result<FetchedResponse, FetchError>;
}

/// Where a served response came from, for logging and the
/// `x-rasoio-source` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServedSource {
    Live,
    Cache,
    Fallback,
    Miss,
}

impl ServedSource {
    pub fn as_str(self) -> &'static str {
        match self {
            ServedSource::Live => "live",
            ServedSource::Cache => "cache",
            ServedSource::Fallback => "fallback",
            ServedSource::Miss => "miss",
        }
    }
}

/// The response the edge serves; always produced, never an error.
#[derive(Debug, Clone)]
pub struct ServedResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Bytes,
    pub source: ServedSource,
}

impl ServedResponse {
    fn live(fetched: FetchedResponse) -> Self {
        Self {
            status: fetched.status,
            content_type: fetched.content_type,
            body: fetched.body,
            source: ServedSource::Live,
        }
    }

    fn cached(entry: CachedEntry, source: ServedSource) -> Self {
        Self {
            status: entry.status,
            content_type: entry.content_type,
            body: entry.body,
            source,
        }
    }

    fn miss(status: u16) -> Self {
        Self {
            status,
            content_type: None,
            body: Bytes::new(),
            source: ServedSource::Miss,
        }
    }

    fn offline() -> Self {
        Self {
            status: 503,
            content_type: Some("text/html; charset=utf-8".to_string()),
            body: Bytes::from_static(OFFLINE_BODY.as_bytes()),
            source: ServedSource::Miss,
        }
    }
}

/// Routes classified requests through per-class strategies.
#[derive(Clone)]
pub struct EdgeRouter {
    stores: Arc<StoreSet>,
    config: EdgeConfig,
}

impl EdgeRouter {
    pub fn new(stores: Arc<StoreSet>, config: EdgeConfig) -> Self {
        Self { stores, config }
    }

    /// Execute the class's strategy. Always resolves.
    #[instrument(skip(self, fetcher), fields(path = %request.path_and_query, class = class.as_str()))]
    pub async fn route(
        &self,
        fetcher: &dyn Fetcher,
        request: &EdgeRequest,
        class: RequestClass,
    ) -> ServedResponse {
        let served = match class {
            RequestClass::Ignore | RequestClass::LivePassthrough => {
                self.passthrough(fetcher, request).await
            }
            RequestClass::MediaCacheFirst => self.media_cache_first(fetcher, request).await,
            RequestClass::DocumentNetworkFirst => {
                self.document_network_first(fetcher, request).await
            }
        };

        debug!(source = served.source.as_str(), status = served.status, "edge routed");
        served
    }

    async fn passthrough(&self, fetcher: &dyn Fetcher, request: &EdgeRequest) -> ServedResponse {
        match fetcher.fetch(request).await {
            Ok(fetched) => ServedResponse::live(fetched),
            Err(FetchError::Transport(reason)) => {
                debug!(reason, "passthrough origin unreachable");
                ServedResponse::miss(502)
            }
        }
    }

    /// Cache hit wins outright: media is immutable in practice, and skipping
    /// revalidation is the point of the strategy.
    async fn media_cache_first(
        &self,
        fetcher: &dyn Fetcher,
        request: &EdgeRequest,
    ) -> ServedResponse {
        let store = self.stores.open(self.config.media_store());
        let key = request.key();

        if let Some(entry) = store.get(&key) {
            counter!("rasoio_edge_hit_total").increment(1);
            return ServedResponse::cached(entry, ServedSource::Cache);
        }
        counter!("rasoio_edge_miss_total").increment(1);

        match fetcher.fetch(request).await {
            Ok(fetched) => {
                if fetched.status == 200 && !is_document(fetched.content_type.as_deref()) {
                    store.put(key, snapshot(&fetched));
                }
                ServedResponse::live(fetched)
            }
            // Nothing was cached, so there is nothing to fall back to.
            Err(FetchError::Transport(_)) => ServedResponse::miss(404),
        }
    }

    /// Network first so fresh content wins whenever connectivity exists;
    /// cache, then the landing-page entry, degrade gracefully offline.
    async fn document_network_first(
        &self,
        fetcher: &dyn Fetcher,
        request: &EdgeRequest,
    ) -> ServedResponse {
        let store = self.stores.open(self.config.document_store());
        let key = request.key();

        match fetcher.fetch(request).await {
            Ok(fetched) => {
                // Partial content, redirects and error statuses are never
                // cached; transient failures must not poison the store.
                if fetched.status == 200 {
                    store.put(key, snapshot(&fetched));
                }
                ServedResponse::live(fetched)
            }
            Err(FetchError::Transport(reason)) => {
                debug!(reason, "document origin unreachable, trying cache");

                if let Some(entry) = store.get(&key) {
                    counter!("rasoio_edge_hit_total").increment(1);
                    return ServedResponse::cached(entry, ServedSource::Cache);
                }

                counter!("rasoio_edge_fallback_total").increment(1);
                let landing = RequestKey::get(self.config.landing_path.clone());
                match store.get(&landing) {
                    Some(entry) => ServedResponse::cached(entry, ServedSource::Fallback),
                    None => ServedResponse::offline(),
                }
            }
        }
    }
}

fn is_document(content_type: Option<&str>) -> bool {
    content_type.is_some_and(|ct| ct.starts_with("text/html"))
}

fn snapshot(fetched: &FetchedResponse) -> CachedEntry {
    CachedEntry {
        body: fetched.body.clone(),
        content_type: fetched.content_type.clone(),
        status: fetched.status,
        stored_at: OffsetDateTime::now_utc(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    /// Scripted origin: pops one outcome per fetch, counts calls.
    struct ScriptedFetcher {
        outcomes: Mutex<Vec<Result<FetchedResponse, FetchError>>>,
        calls: AtomicUsize,
    }

    impl ScriptedFetcher {
        fn new(outcomes: Vec<Result<FetchedResponse, FetchError>>) -> Self {
            Self {
                outcomes: Mutex::new(outcomes),
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Fetcher for ScriptedFetcher {
        async fn fetch(&self, _request: &EdgeRequest) -> Result<FetchedResponse, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.outcomes
                .lock()
                .expect("outcomes lock")
                .remove(0)
        }
    }

    fn ok(body: &str, content_type: &str) -> Result<FetchedResponse, FetchError> {
        Ok(FetchedResponse {
            status: 200,
            content_type: Some(content_type.to_string()),
            body: Bytes::from(body.to_string()),
        })
    }

    fn down() -> Result<FetchedResponse, FetchError> {
        Err(FetchError::Transport("connection refused".to_string()))
    }

    fn router() -> EdgeRouter {
        let config = EdgeConfig::default();
        let stores = Arc::new(StoreSet::new(
            config.document_entry_limit_non_zero(),
            config.media_entry_limit_non_zero(),
        ));
        EdgeRouter::new(stores, config)
    }

    #[tokio::test]
    async fn media_second_request_skips_network() {
        let router = router();
        let fetcher = ScriptedFetcher::new(vec![ok("png-bytes", "image/png")]);
        let request = EdgeRequest::get("/img/pole.png");

        let first = router
            .route(&fetcher, &request, RequestClass::MediaCacheFirst)
            .await;
        assert_eq!(first.source, ServedSource::Live);

        let second = router
            .route(&fetcher, &request, RequestClass::MediaCacheFirst)
            .await;
        assert_eq!(second.source, ServedSource::Cache);
        assert_eq!(second.body, Bytes::from("png-bytes"));
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn media_document_body_is_not_cached() {
        // An origin error page served with 200 and text/html must not be
        // stored as media.
        let router = router();
        let fetcher = ScriptedFetcher::new(vec![
            ok("<html>soft 404</html>", "text/html"),
            ok("real-bytes", "image/png"),
        ]);
        let request = EdgeRequest::get("/img/missing.png");

        router
            .route(&fetcher, &request, RequestClass::MediaCacheFirst)
            .await;
        let second = router
            .route(&fetcher, &request, RequestClass::MediaCacheFirst)
            .await;

        assert_eq!(second.source, ServedSource::Live);
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test]
    async fn media_miss_with_origin_down_serves_404() {
        let router = router();
        let fetcher = ScriptedFetcher::new(vec![down()]);

        let served = router
            .route(
                &fetcher,
                &EdgeRequest::get("/img/pole.png"),
                RequestClass::MediaCacheFirst,
            )
            .await;

        assert_eq!(served.status, 404);
        assert_eq!(served.source, ServedSource::Miss);
    }

    #[tokio::test]
    async fn document_prefers_fresh_network_content() {
        let router = router();
        let fetcher = ScriptedFetcher::new(vec![
            ok("<html>v1</html>", "text/html"),
            ok("<html>v2</html>", "text/html"),
        ]);
        let request = EdgeRequest::get("/services");

        router
            .route(&fetcher, &request, RequestClass::DocumentNetworkFirst)
            .await;
        let second = router
            .route(&fetcher, &request, RequestClass::DocumentNetworkFirst)
            .await;

        assert_eq!(second.source, ServedSource::Live);
        assert_eq!(second.body, Bytes::from("<html>v2</html>"));
    }

    #[tokio::test]
    async fn document_offline_serves_cached_entry() {
        let router = router();
        let fetcher = ScriptedFetcher::new(vec![ok("<html>services</html>", "text/html"), down()]);
        let request = EdgeRequest::get("/services");

        router
            .route(&fetcher, &request, RequestClass::DocumentNetworkFirst)
            .await;
        let offline = router
            .route(&fetcher, &request, RequestClass::DocumentNetworkFirst)
            .await;

        assert_eq!(offline.source, ServedSource::Cache);
        assert_eq!(offline.body, Bytes::from("<html>services</html>"));
    }

    #[tokio::test]
    async fn document_cold_cache_falls_back_to_landing() {
        let router = router();
        // Warm the landing page, then request a never-seen path offline.
        let fetcher = ScriptedFetcher::new(vec![ok("<html>landing</html>", "text/html"), down()]);

        router
            .route(
                &fetcher,
                &EdgeRequest::get("/"),
                RequestClass::DocumentNetworkFirst,
            )
            .await;
        let served = router
            .route(
                &fetcher,
                &EdgeRequest::get("/barbers/luigi"),
                RequestClass::DocumentNetworkFirst,
            )
            .await;

        assert_eq!(served.source, ServedSource::Fallback);
        assert_eq!(served.body, Bytes::from("<html>landing</html>"));
    }

    #[tokio::test]
    async fn document_nothing_cached_serves_offline_notice() {
        let router = router();
        let fetcher = ScriptedFetcher::new(vec![down()]);

        let served = router
            .route(
                &fetcher,
                &EdgeRequest::get("/barbers/luigi"),
                RequestClass::DocumentNetworkFirst,
            )
            .await;

        assert_eq!(served.status, 503);
        assert_eq!(served.source, ServedSource::Miss);
    }

    #[tokio::test]
    async fn non_200_documents_are_never_cached() {
        let router = router();
        let fetcher = ScriptedFetcher::new(vec![
            Ok(FetchedResponse {
                status: 500,
                content_type: Some("text/html".to_string()),
                body: Bytes::from_static(b"boom"),
            }),
            down(),
        ]);
        let request = EdgeRequest::get("/services");

        let first = router
            .route(&fetcher, &request, RequestClass::DocumentNetworkFirst)
            .await;
        assert_eq!(first.status, 500);

        // The 500 must not have been stored: with the origin down and no
        // landing entry, only the offline notice remains.
        let second = router
            .route(&fetcher, &request, RequestClass::DocumentNetworkFirst)
            .await;
        assert_eq!(second.status, 503);
        assert_eq!(second.source, ServedSource::Miss);
    }

    #[tokio::test]
    async fn passthrough_never_touches_stores() {
        let router = router();
        let fetcher = ScriptedFetcher::new(vec![
            ok("[]", "application/json"),
            down(),
        ]);
        let request = EdgeRequest::get("/api/services");

        let first = router
            .route(&fetcher, &request, RequestClass::LivePassthrough)
            .await;
        assert_eq!(first.source, ServedSource::Live);

        let second = router
            .route(&fetcher, &request, RequestClass::LivePassthrough)
            .await;
        assert_eq!(second.status, 502);
        assert_eq!(second.source, ServedSource::Miss);
    }
}
