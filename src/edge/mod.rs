//! Rasoio edge cache system.
//!
//! Sits in front of every GET request the public site makes and decides, per
//! request class, whether to serve from a versioned local store, fetch live,
//! or fall back:
//!
//! - **classify**: pure request → class mapping
//! - **router**: per-class strategies (passthrough, media cache-first,
//!   document network-first), infallible
//! - **lifecycle**: versioned store creation and eviction across deploys
//!
//! ## Configuration
//!
//! Behavior is controlled via `rasoio.toml`:
//!
//! ```toml
//! [edge]
//! cache_version = 4
//! data_api_prefix = "/api/"
//! precache_paths = ["/"]
//! # ... see config.rs for all options
//! ```

mod classify;
mod config;
mod keys;
mod lifecycle;
mod lock;
mod router;
mod store;

pub use classify::{RequestClass, classify};
pub use config::EdgeConfig;
pub use keys::{RequestKey, StoreKind, StoreName};
pub use lifecycle::{LifecycleController, LifecycleState};
pub use router::{
    EdgeRequest, EdgeRouter, FetchError, FetchedResponse, Fetcher, ServedResponse, ServedSource,
};
pub use store::{CachedEntry, EntryStore, StoreSet};
