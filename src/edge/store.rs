//! Versioned edge cache stores.
//!
//! Each `EntryStore` holds snapshots of previously served responses keyed by
//! request identity, with LRU eviction. `StoreSet` is the named collection
//! the lifecycle controller creates and sweeps across deploys.

use std::num::NonZeroUsize;
use std::sync::{Arc, RwLock};

use bytes::Bytes;
use dashmap::DashMap;
use lru::LruCache;
use time::OffsetDateTime;

use super::keys::{RequestKey, StoreKind, StoreName};
use super::lock::{rw_read, rw_write};

const SOURCE: &str = "edge::store";

/// Snapshot of a successfully fetched response.
///
/// Only status-200 responses are ever stored; the router enforces this before
/// calling `put`.
#[derive(Debug, Clone)]
pub struct CachedEntry {
    pub body: Bytes,
    pub content_type: Option<String>,
    pub status: u16,
    pub stored_at: OffsetDateTime,
}

/// One named store: an LRU of cached entries keyed by request identity.
/// Entries are idempotent snapshots, so last-writer-wins needs no
/// cross-request locking.
pub struct EntryStore {
    entries: RwLock<LruCache<RequestKey, CachedEntry>>,
}

impl EntryStore {
    pub fn new(limit: NonZeroUsize) -> Self {
        Self {
            entries: RwLock::new(LruCache::new(limit)),
        }
    }

    pub fn get(&self, key: &RequestKey) -> Option<CachedEntry> {
        rw_write(&self.entries, SOURCE, "get").get(key).cloned()
    }

    pub fn put(&self, key: RequestKey, entry: CachedEntry) {
        debug_assert_eq!(entry.status, 200, "only 200 responses may be stored");
        rw_write(&self.entries, SOURCE, "put").put(key, entry);
    }

    pub fn len(&self) -> usize {
        rw_read(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The set of named, versioned stores.
pub struct StoreSet {
    stores: DashMap<StoreName, Arc<EntryStore>>,
    document_entry_limit: NonZeroUsize,
    media_entry_limit: NonZeroUsize,
}

impl StoreSet {
    pub fn new(document_entry_limit: NonZeroUsize, media_entry_limit: NonZeroUsize) -> Self {
        Self {
            stores: DashMap::new(),
            document_entry_limit,
            media_entry_limit,
        }
    }

    /// Open the named store, creating it on first use.
    pub fn open(&self, name: StoreName) -> Arc<EntryStore> {
        let limit = match name.kind {
            StoreKind::Documents => self.document_entry_limit,
            StoreKind::Media => self.media_entry_limit,
        };
        self.stores
            .entry(name)
            .or_insert_with(|| Arc::new(EntryStore::new(limit)))
            .clone()
    }

    /// Delete the named store and all its entries. Returns whether a store
    /// existed under that name.
    pub fn remove(&self, name: &StoreName) -> bool {
        self.stores.remove(name).is_some()
    }

    /// Snapshot of all existing store names.
    pub fn names(&self) -> Vec<StoreName> {
        self.stores.iter().map(|entry| *entry.key()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(body: &str) -> CachedEntry {
        CachedEntry {
            body: Bytes::from(body.to_string()),
            content_type: Some("text/html".to_string()),
            status: 200,
            stored_at: OffsetDateTime::now_utc(),
        }
    }

    fn store_set() -> StoreSet {
        StoreSet::new(
            NonZeroUsize::new(16).expect("limit"),
            NonZeroUsize::new(16).expect("limit"),
        )
    }

    #[test]
    fn entry_store_roundtrip() {
        let store = EntryStore::new(NonZeroUsize::new(4).expect("limit"));
        let key = RequestKey::get("/services");

        assert!(store.get(&key).is_none());

        store.put(key.clone(), entry("<html>services</html>"));

        let cached = store.get(&key).expect("cached entry");
        assert_eq!(cached.body, Bytes::from("<html>services</html>"));
        assert_eq!(cached.status, 200);
    }

    #[test]
    fn overwrite_replaces_entry() {
        let store = EntryStore::new(NonZeroUsize::new(4).expect("limit"));
        let key = RequestKey::get("/");

        store.put(key.clone(), entry("old"));
        store.put(key.clone(), entry("new"));

        assert_eq!(store.len(), 1);
        assert_eq!(store.get(&key).expect("entry").body, Bytes::from("new"));
    }

    #[test]
    fn lru_evicts_oldest() {
        let store = EntryStore::new(NonZeroUsize::new(2).expect("limit"));

        store.put(RequestKey::get("/a"), entry("a"));
        store.put(RequestKey::get("/b"), entry("b"));
        store.put(RequestKey::get("/c"), entry("c"));

        assert!(store.get(&RequestKey::get("/a")).is_none());
        assert!(store.get(&RequestKey::get("/b")).is_some());
        assert!(store.get(&RequestKey::get("/c")).is_some());
    }

    #[test]
    fn open_is_idempotent() {
        let set = store_set();
        let name = StoreName::new(StoreKind::Documents, 1);

        let first = set.open(name);
        first.put(RequestKey::get("/"), entry("landing"));

        let second = set.open(name);
        assert_eq!(second.len(), 1);
        assert_eq!(set.names().len(), 1);
    }

    #[test]
    fn remove_drops_all_entries() {
        let set = store_set();
        let name = StoreName::new(StoreKind::Media, 2);

        let store = set.open(name);
        store.put(RequestKey::get("/img/a.png"), entry("a"));

        assert!(set.remove(&name));
        assert!(!set.remove(&name));

        // Reopening yields a fresh, empty store.
        assert!(set.open(name).is_empty());
    }
}
