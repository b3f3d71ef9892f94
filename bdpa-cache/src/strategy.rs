//! Request strategies: cache-first for static assets, network-first for the
//! rest, straight passthrough for the never-cache set.

use crate::error::CacheResult;
use crate::fetch::{FetchedResponse, Fetcher};
use crate::policy;
use crate::store::CacheStore;
use std::sync::Arc;
use tracing::{debug, warn};

/// Navigation requests fall back to the app shell when both network and
/// cache come up empty.
const FALLBACK_DOCUMENT: &str = "/index.html";

/// Where a response came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResponseSource {
    Cache,
    Network,
    /// Offline placeholder or the app-shell fallback document.
    Fallback,
}

/// A response produced by the cache layer.
#[derive(Clone, Debug, PartialEq)]
pub struct CachedResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub source: ResponseSource,
}

impl CachedResponse {
    fn from_network(response: FetchedResponse) -> Self {
        Self {
            status: response.status,
            headers: response.headers,
            body: response.body,
            source: ResponseSource::Network,
        }
    }

    fn offline_placeholder(message: &str) -> Self {
        Self {
            status: 503,
            headers: vec![("content-type".into(), "text/plain; charset=utf-8".into())],
            body: message.as_bytes().to_vec(),
            source: ResponseSource::Fallback,
        }
    }
}

/// The request path of the asset cache.
///
/// Versioned: a layer built for version X reads and writes only the two
/// namespaces tagged X; [`CacheLayer::activate`] evicts every other one.
pub struct CacheLayer {
    store: CacheStore,
    fetcher: Arc<dyn Fetcher>,
    static_namespace: String,
    dynamic_namespace: String,
    origin: String,
}

impl CacheLayer {
    pub fn new(
        store: CacheStore,
        fetcher: Arc<dyn Fetcher>,
        version: &str,
        origin: impl Into<String>,
    ) -> Self {
        Self {
            store,
            fetcher,
            static_namespace: policy::static_namespace(version),
            dynamic_namespace: policy::dynamic_namespace(version),
            origin: origin.into(),
        }
    }

    /// Installs the app shell into the static namespace. Any failed fetch
    /// aborts the install; a partial shell is worse than none.
    pub async fn precache(&self, urls: &[&str]) -> CacheResult<()> {
        for url in urls {
            let response = self.fetcher.fetch(url).await?;
            if !response.is_success() {
                return Err(crate::CacheError::Network(format!(
                    "precache of {url} answered {}",
                    response.status
                )));
            }
            self.store.put(&self.static_namespace, url, &response.body, &response.headers)?;
        }
        debug!(count = urls.len(), "app shell precached");
        Ok(())
    }

    /// Evicts every namespace that does not belong to this version.
    pub fn activate(&self) -> CacheResult<usize> {
        self.store.activate(&[&self.static_namespace, &self.dynamic_namespace])
    }

    /// Routes one request through the appropriate strategy.
    pub async fn handle(&self, url: &str, is_navigation: bool) -> CacheResult<CachedResponse> {
        if policy::is_never_cached(url) {
            // Passthrough: transport errors surface raw to the caller.
            let response = self.fetcher.fetch(url).await?;
            return Ok(CachedResponse::from_network(response));
        }
        if policy::is_static_asset(url) {
            return self.cache_first(url).await;
        }
        self.network_first(url, is_navigation).await
    }

    /// Cached bytes win; the network only fills misses. A cached asset is
    /// returned unchanged, byte for byte.
    async fn cache_first(&self, url: &str) -> CacheResult<CachedResponse> {
        if let Some(entry) = self.lookup(url)? {
            return Ok(CachedResponse {
                status: 200,
                headers: entry.headers,
                body: entry.body,
                source: ResponseSource::Cache,
            });
        }

        match self.fetcher.fetch(url).await {
            Ok(response) => {
                if response.is_success() {
                    self.store.put(&self.dynamic_namespace, url, &response.body, &response.headers)?;
                }
                Ok(CachedResponse::from_network(response))
            }
            Err(err) => {
                warn!(url, error = %err, "cache-first fetch failed with no cached copy");
                Ok(CachedResponse::offline_placeholder("Offline"))
            }
        }
    }

    /// Fresh data wins; the cache is the offline fallback, then the app
    /// shell for navigations, then a terse 503.
    async fn network_first(&self, url: &str, is_navigation: bool) -> CacheResult<CachedResponse> {
        match self.fetcher.fetch(url).await {
            Ok(response) => {
                if response.is_success() && policy::should_cache(url, &self.origin) {
                    self.store.put(&self.dynamic_namespace, url, &response.body, &response.headers)?;
                }
                Ok(CachedResponse::from_network(response))
            }
            Err(err) => {
                debug!(url, error = %err, "network failed, trying cache");
                if let Some(entry) = self.lookup(url)? {
                    return Ok(CachedResponse {
                        status: 200,
                        headers: entry.headers,
                        body: entry.body,
                        source: ResponseSource::Cache,
                    });
                }
                if is_navigation {
                    if let Some(shell) = self.lookup(FALLBACK_DOCUMENT)? {
                        return Ok(CachedResponse {
                            status: 200,
                            headers: shell.headers,
                            body: shell.body,
                            source: ResponseSource::Fallback,
                        });
                    }
                }
                Ok(CachedResponse::offline_placeholder("Sin conexión"))
            }
        }
    }

    /// Static namespace first (immutable, installed), then dynamic.
    fn lookup(&self, url: &str) -> CacheResult<Option<crate::CacheEntry>> {
        if let Some(entry) = self.store.get(&self.static_namespace, url)? {
            return Ok(Some(entry));
        }
        self.store.get(&self.dynamic_namespace, url)
    }
}
