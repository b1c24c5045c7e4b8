//! JSON request client with retries and per-attempt timeouts.
//!
//! # Responsibilities
//! - Resolve endpoints against the configured base URL
//! - Classify non-2xx responses as [`FetchError::Http`]
//! - Drive the retry loop for [`ApiClient::request`]
//! - Offer a single-attempt [`ApiClient::fetch_json`] for layers that
//!   deduplicate on their own

use std::fmt::Display;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use url::Url;

use crate::config::ClientConfig;
use crate::http::error::FetchError;
use crate::http::endpoint::{build_url, resolve_endpoint};
use crate::resilience::{retry_with_backoff, RetryPolicy};

/// Per-request options: retry budget plus transport settings.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    /// Retries after the first attempt (default 2).
    pub retries: u32,
    /// Base delay for linear backoff (default 1000ms).
    pub retry_delay: Duration,
    /// Deadline for each attempt (default 10000ms).
    pub timeout: Duration,
    pub method: Method,
    pub headers: HeaderMap,
    /// JSON request body.
    pub body: Option<serde_json::Value>,
}

impl RequestOptions {
    pub fn from_policy(policy: RetryPolicy) -> Self {
        Self {
            retries: policy.retries,
            retry_delay: policy.retry_delay,
            timeout: policy.timeout,
            method: Method::GET,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            retries: self.retries,
            retry_delay: self.retry_delay,
            timeout: self.timeout,
        }
    }
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self::from_policy(RetryPolicy::default())
    }
}

/// Client for the market-data REST API.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    policy: RetryPolicy,
}

impl ApiClient {
    /// Create a client for `base_url` using `policy` as the default options.
    pub fn new(base_url: &str, policy: RetryPolicy) -> Result<Self, FetchError> {
        let base_url = Url::parse(base_url).map_err(|source| FetchError::InvalidUrl {
            url: base_url.to_string(),
            source,
        })?;

        Ok(Self {
            http: reqwest::Client::new(),
            base_url,
            policy,
        })
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, FetchError> {
        Self::new(&config.api.base_url, RetryPolicy::from_config(&config.request))
    }

    /// Replace the underlying `reqwest` client (proxy settings, pools, ...).
    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Default options derived from configuration.
    pub fn options(&self) -> RequestOptions {
        RequestOptions::from_policy(self.policy)
    }

    /// Resolve `endpoint` against the base URL unless it is absolute.
    pub fn resolve(&self, endpoint: &str) -> Result<Url, FetchError> {
        resolve_endpoint(&self.base_url, endpoint)
    }

    /// Compose `path` with the base URL and query parameters.
    pub fn build_url<I, K, V>(&self, path: &str, params: I) -> Result<Url, FetchError>
    where
        I: IntoIterator<Item = (K, Option<V>)>,
        K: AsRef<str>,
        V: Display,
    {
        build_url(&self.base_url, path, params)
    }

    /// Request `endpoint` with the configured defaults.
    pub async fn get<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T, FetchError> {
        self.request(endpoint, self.options()).await
    }

    /// Perform a JSON request over up to `options.retries + 1` attempts.
    ///
    /// Each attempt is bounded by `options.timeout`. Any failure, including
    /// an error status, is followed by a `retry_delay * (attempt + 1)` pause
    /// while budget remains. The final failure is returned.
    pub async fn request<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<T, FetchError> {
        let url = self.resolve(endpoint)?;
        let policy = options.policy();

        retry_with_backoff(policy, |attempt| {
            tracing::debug!(
                method = %options.method,
                url = %url,
                attempt = attempt + 1,
                "Sending request"
            );
            let request = self.build_request(&url, &options);
            async move { decode_json(request.send().await?).await }
        })
        .await
    }

    /// Single attempt with no retry and no explicit deadline.
    pub async fn fetch_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, FetchError> {
        let url = self.resolve(url)?;
        tracing::debug!(url = %url, "Fetching JSON");
        let response = self.http.get(url).send().await?;
        decode_json(response).await
    }

    fn build_request(&self, url: &Url, options: &RequestOptions) -> RequestBuilder {
        let builder = self
            .http
            .request(options.method.clone(), url.clone())
            .headers(options.headers.clone());

        match &options.body {
            Some(body) => builder.json(body),
            None => builder,
        }
    }
}

async fn decode_json<T: DeserializeOwned>(response: Response) -> Result<T, FetchError> {
    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::from_status(status));
    }
    Ok(response.json::<T>().await?)
}
