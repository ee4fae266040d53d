//! Read-side services.
//!
//! Every service follows the same cache-aside contract: look up a
//! deterministic key, return the hit as is, otherwise load from storage,
//! reshape, write back with the view's TTL and return.
//!
//! - [`country`]: country list, search and detail views
//! - [`chart`]: chart-ready bundles
//! - [`comparison`]: side-by-side comparison with winners and highlights
//! - [`summary`]: generated prose summaries with a local fallback

pub mod chart;
pub mod comparison;
pub mod country;
pub mod summary;

use std::future::Future;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::cache::Cache;
use crate::error::ApiResult;

/// A view together with where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Lookup<T> {
    pub data: T,
    /// Served from the cache without touching storage.
    pub cached: bool,
}

/// Return the cached value at `key`, or run `load`, cache its result for
/// `ttl` and return it. Errors from `load` are not cached.
pub(crate) async fn cache_aside<T, F, Fut>(
    cache: &Cache,
    key: &str,
    ttl: Duration,
    load: F,
) -> ApiResult<Lookup<T>>
where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = ApiResult<T>>,
{
    if let Some(data) = cache.get::<T>(key).await {
        debug!(key, "Cache hit");
        return Ok(Lookup { data, cached: true });
    }

    let data = load().await?;
    cache.set(key, &data, Some(ttl)).await;
    Ok(Lookup {
        data,
        cached: false,
    })
}

/// Uppercased, trimmed country code.
pub(crate) fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}
