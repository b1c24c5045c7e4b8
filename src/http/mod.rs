//! HTTP data-access subsystem.
//!
//! # Data Flow
//! ```text
//! ApiClient::request(endpoint, options)
//!     → endpoint.rs (resolve against base URL)
//!     → resilience (retry loop, deadline per attempt, linear backoff)
//!     → reqwest send → status check → JSON decode
//!     → error.rs (FetchError: Http vs Timeout/Transport)
//!
//! CachedFetcher::get(resource, path, params)
//!     → cache::build_key → TtlCache::get_or_set_shared
//!     → on miss: ApiClient::fetch_json (single attempt)
//! ```

pub mod cached;
pub mod client;
pub mod error;
pub mod endpoint;

pub use cached::CachedFetcher;
pub use client::{ApiClient, RequestOptions};
pub use error::{FetchError, FetchResult};
pub use endpoint::{build_url, resolve_endpoint};
