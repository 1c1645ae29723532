//! Edge lifecycle controller.
//!
//! Explicit state machine replacing event-callback registration: each deploy
//! runs `install` (precache, then skip straight to activation; stale
//! instances are safe to replace because stores are versioned) and
//! `activate` (evict every non-current-version store, then claim traffic
//! immediately). The router only operates once `Active`.

use std::sync::{Arc, RwLock};

use metrics::counter;
use tracing::{info, warn};

use super::config::EdgeConfig;
use super::keys::RequestKey;
use super::lock::{rw_read, rw_write};
use super::router::{EdgeRequest, FetchedResponse, Fetcher};
use super::store::{CachedEntry, StoreSet};

const SOURCE: &str = "edge::lifecycle";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Installing,
    Activating,
    Active,
}

impl LifecycleState {
    pub fn as_str(self) -> &'static str {
        match self {
            LifecycleState::Installing => "installing",
            LifecycleState::Activating => "activating",
            LifecycleState::Active => "active",
        }
    }
}

/// Manages versioned store creation and eviction across deploys.
pub struct LifecycleController {
    stores: Arc<StoreSet>,
    config: EdgeConfig,
    state: RwLock<LifecycleState>,
}

impl LifecycleController {
    pub fn new(stores: Arc<StoreSet>, config: EdgeConfig) -> Self {
        Self {
            stores,
            config,
            state: RwLock::new(LifecycleState::Installing),
        }
    }

    pub fn state(&self) -> LifecycleState {
        *rw_read(&self.state, SOURCE, "state")
    }

    pub fn is_active(&self) -> bool {
        self.state() == LifecycleState::Active
    }

    /// Install phase: open the current-version stores and precache the
    /// configured paths into the documents store. Individual precache
    /// failures are logged and skipped; they are not worth failing a deploy
    /// over. Transitions to `Activating` without waiting.
    pub async fn install(&self, fetcher: &dyn Fetcher) -> usize {
        let documents = self.stores.open(self.config.document_store());
        self.stores.open(self.config.media_store());

        let mut precached = 0;
        for path in &self.config.precache_paths {
            let request = EdgeRequest::get(path.clone());
            match fetcher.fetch(&request).await {
                Ok(FetchedResponse {
                    status: 200,
                    content_type,
                    body,
                }) => {
                    documents.put(
                        RequestKey::get(path.clone()),
                        CachedEntry {
                            body,
                            content_type,
                            status: 200,
                            stored_at: time::OffsetDateTime::now_utc(),
                        },
                    );
                    precached += 1;
                }
                Ok(response) => {
                    warn!(path, status = response.status, "precache skipped non-200 response");
                }
                Err(err) => {
                    warn!(path, error = %err, "precache fetch failed");
                }
            }
        }

        info!(
            version = self.config.cache_version,
            precached, "edge install complete, activating immediately"
        );
        *rw_write(&self.state, SOURCE, "install") = LifecycleState::Activating;
        precached
    }

    /// Activate phase: delete every store whose name is not one of the two
    /// current-version names, then take over traffic immediately. Eviction is
    /// not retried; an orphan survives until the next deploy's sweep.
    pub fn activate(&self) -> usize {
        let keep_documents = self.config.document_store();
        let keep_media = self.config.media_store();

        let mut evicted = 0;
        for name in self.stores.names() {
            if name != keep_documents && name != keep_media {
                if self.stores.remove(&name) {
                    counter!("rasoio_edge_store_evicted_total").increment(1);
                    info!(store = %name, "evicted stale store");
                    evicted += 1;
                }
            }
        }

        *rw_write(&self.state, SOURCE, "activate") = LifecycleState::Active;
        info!(version = self.config.cache_version, evicted, "edge active");
        evicted
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use bytes::Bytes;

    use crate::edge::keys::{StoreKind, StoreName};
    use crate::edge::router::FetchError;

    use super::*;

    struct LandingFetcher;

    #[async_trait]
    impl Fetcher for LandingFetcher {
        async fn fetch(&self, request: &EdgeRequest) -> Result<FetchedResponse, FetchError> {
            if request.path_and_query == "/" {
                Ok(FetchedResponse {
                    status: 200,
                    content_type: Some("text/html".to_string()),
                    body: Bytes::from_static(b"<html>landing</html>"),
                })
            } else {
                Err(FetchError::Transport("unreachable".to_string()))
            }
        }
    }

    fn controller(version: u32) -> (Arc<StoreSet>, LifecycleController) {
        let config = EdgeConfig {
            cache_version: version,
            ..Default::default()
        };
        let stores = Arc::new(StoreSet::new(
            config.document_entry_limit_non_zero(),
            config.media_entry_limit_non_zero(),
        ));
        let controller = LifecycleController::new(stores.clone(), config);
        (stores, controller)
    }

    #[tokio::test]
    async fn install_precaches_landing_and_transitions() {
        let (stores, controller) = controller(3);
        assert_eq!(controller.state(), LifecycleState::Installing);

        let precached = controller.install(&LandingFetcher).await;

        assert_eq!(precached, 1);
        assert_eq!(controller.state(), LifecycleState::Activating);

        let documents = stores.open(StoreName::new(StoreKind::Documents, 3));
        assert!(documents.get(&RequestKey::get("/")).is_some());
    }

    #[tokio::test]
    async fn install_tolerates_precache_failures() {
        let config = EdgeConfig {
            cache_version: 1,
            precache_paths: vec!["/".to_string(), "/unreachable".to_string()],
            ..Default::default()
        };
        let stores = Arc::new(StoreSet::new(
            config.document_entry_limit_non_zero(),
            config.media_entry_limit_non_zero(),
        ));
        let controller = LifecycleController::new(stores, config);

        let precached = controller.install(&LandingFetcher).await;

        assert_eq!(precached, 1);
        assert_eq!(controller.state(), LifecycleState::Activating);
    }

    #[tokio::test]
    async fn activate_sweeps_every_stale_version() {
        let (stores, controller) = controller(4);
        controller.install(&LandingFetcher).await;

        // Leftovers from three earlier deploys.
        for version in 1..=3 {
            stores.open(StoreName::new(StoreKind::Documents, version));
            stores.open(StoreName::new(StoreKind::Media, version));
        }

        let evicted = controller.activate();

        assert_eq!(evicted, 6);
        assert_eq!(controller.state(), LifecycleState::Active);

        let mut names = stores.names();
        names.sort_by_key(|name| (name.version, name.kind.as_str()));
        assert_eq!(
            names,
            vec![
                StoreName::new(StoreKind::Documents, 4),
                StoreName::new(StoreKind::Media, 4),
            ]
        );
    }

    #[tokio::test]
    async fn activate_keeps_current_stores_and_their_entries() {
        let (stores, controller) = controller(2);
        controller.install(&LandingFetcher).await;
        controller.activate();

        let documents = stores.open(StoreName::new(StoreKind::Documents, 2));
        assert!(documents.get(&RequestKey::get("/")).is_some());
    }
}
