//! Cache-aware fetch layer.
//!
//! Composes [`ApiClient::fetch_json`] with a [`TtlCache`]: one cache key per
//! resource and parameter set, and concurrent callers for the same key
//! share a single network call.

use std::fmt::Display;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::cache::{build_key, TtlCache};
use crate::http::client::ApiClient;
use crate::http::error::FetchError;

/// Freshness windows for the dashboard's resources.
pub mod resource_ttl {
    use std::time::Duration;

    pub const THEMES: Duration = Duration::from_secs(300);
    pub const STOCK_DETAIL: Duration = Duration::from_secs(60);
    pub const HEATMAP: Duration = Duration::from_secs(300);
    pub const NIKKEI: Duration = Duration::from_secs(60);

    /// Known TTL for a resource name, if any.
    pub fn for_resource(resource: &str) -> Option<Duration> {
        match resource {
            "themes" | "themes-meta" | "theme" => Some(THEMES),
            "stock" => Some(STOCK_DETAIL),
            "heatmap" | "sector-heatmap" => Some(HEATMAP),
            "nikkei225" => Some(NIKKEI),
            _ => None,
        }
    }

    /// TTL for an endpoint path such as `/api/stock/7203`, taken from the
    /// last path segment naming a known resource.
    pub fn for_path(path: &str) -> Option<Duration> {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        path.rsplit('/').find_map(for_resource)
    }
}

/// Memoizing wrapper around an [`ApiClient`].
#[derive(Debug, Clone)]
pub struct CachedFetcher {
    client: ApiClient,
    cache: TtlCache<Value>,
}

impl CachedFetcher {
    pub fn new(client: ApiClient, cache: TtlCache<Value>) -> Self {
        Self { client, cache }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn cache(&self) -> &TtlCache<Value> {
        &self.cache
    }

    /// Fetch `path` with `params`, served from cache while fresh.
    ///
    /// The cache key is `build_key(resource, params)` over the parameters
    /// that are set. `ttl` falls back to the resource's known TTL and then
    /// to the cache default.
    pub async fn get<T, I, K, V>(
        &self,
        resource: &str,
        path: &str,
        params: I,
        ttl: Option<Duration>,
    ) -> Result<T, FetchError>
    where
        T: DeserializeOwned,
        I: IntoIterator<Item = (K, Option<V>)>,
        K: AsRef<str>,
        V: Display,
    {
        let params: Vec<(String, String)> = params
            .into_iter()
            .filter_map(|(name, value)| value.map(|v| (name.as_ref().to_string(), v.to_string())))
            .collect();

        let key = build_key(resource, params.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        let url = self
            .client
            .build_url(path, params.iter().map(|(k, v)| (k.as_str(), Some(v.as_str()))))?;
        let ttl = ttl
            .or_else(|| resource_ttl::for_resource(resource))
            .unwrap_or_else(|| self.cache.default_ttl());

        let client = &self.client;
        let url = url.as_str();
        let value = self
            .cache
            .get_or_set_shared(
                &key,
                || async move {
                    tracing::debug!(url = %url, "Cache miss, fetching");
                    client.fetch_json::<Value>(url).await
                },
                ttl,
            )
            .await?;

        Ok(serde_json::from_value(value)?)
    }

    /// Drop the cached response for `resource` with `params`.
    pub fn invalidate<I, K, V>(&self, resource: &str, params: I) -> bool
    where
        I: IntoIterator<Item = (K, Option<V>)>,
        K: AsRef<str>,
        V: Display,
    {
        let params: Vec<(String, String)> = params
            .into_iter()
            .filter_map(|(name, value)| value.map(|v| (name.as_ref().to_string(), v.to_string())))
            .collect();
        self.cache.delete(&build_key(resource, params))
    }
}
