//! Asset cache for BDPA field devices.
//!
//! App-shell assets and read-only API-adjacent resources are cached locally
//! so the app keeps rendering with no connectivity:
//!
//! - [`CacheStore`] — durable body store, keyed by `(namespace, url)`.
//!   Namespaces are versioned; [`CacheStore::activate`] drops every
//!   namespace a new release no longer claims.
//! - [`policy`] — what may be cached at all and which strategy a URL gets.
//! - [`CacheLayer`] — the request path: cache-first for static assets,
//!   network-first for everything else cacheable, straight fetch for the
//!   never-cache set (mutating API calls must see real errors, not stale
//!   bodies).

mod error;
mod fetch;
pub mod policy;
mod store;
mod strategy;

pub use error::{CacheError, CacheResult};
pub use fetch::{FetchedResponse, Fetcher, HttpFetcher};
pub use store::{CacheEntry, CacheStore};
pub use strategy::{CacheLayer, CachedResponse, ResponseSource};
