//! Caching policy: what may be cached and under which strategy.

/// Paths installed into the static namespace at first run. The app shell
/// must render with zero connectivity.
pub const STATIC_ASSETS: &[&str] = &[
    "/",
    "/index.html",
    "/manifest.json",
    "/icons/icon-192x192.png",
    "/icons/icon-512x512.png",
];

/// File extensions eligible for opportunistic caching.
pub const CACHEABLE_EXTENSIONS: &[&str] =
    &[".js", ".css", ".png", ".jpg", ".jpeg", ".svg", ".woff", ".woff2"];

/// URL fragments excluded from both the read and the write path, whatever
/// the strategy. Mutating API calls must observe real failures, never a
/// stale cached body.
pub const NEVER_CACHE: &[&str] =
    &["/api/", "chrome-extension://", "moz-extension://", "safari-extension://"];

pub fn is_never_cached(url: &str) -> bool {
    NEVER_CACHE.iter().any(|pattern| url.contains(pattern))
}

/// Static assets get the cache-first strategy.
pub fn is_static_asset(url: &str) -> bool {
    CACHEABLE_EXTENSIONS.iter().any(|ext| url.contains(ext))
        || STATIC_ASSETS.iter().any(|asset| url.ends_with(asset))
}

/// Whether a successful network-first response may be stored: never-cache
/// wins, then either a recognized asset or a same-origin URL.
pub fn should_cache(url: &str, origin: &str) -> bool {
    !is_never_cached(url) && (is_static_asset(url) || url.contains(origin))
}

/// Namespace for assets installed at first run, tagged with the app version.
pub fn static_namespace(version: &str) -> String {
    format!("bdpa-static-{version}")
}

/// Namespace for opportunistically cached responses, tagged likewise.
pub fn dynamic_namespace(version: &str) -> String {
    format!("bdpa-dynamic-{version}")
}
