//! Resilient data-access layer for the theme tracker market dashboard.
//!
//! - [`cache`]: time-boxed in-memory store with single-flight loads
//! - [`http`]: JSON client with per-attempt deadlines and linear backoff
//! - [`realtime`]: WebSocket channel that reconnects up to a ceiling

pub mod cache;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod realtime;
pub mod resilience;

pub use cache::{build_key, TtlCache};
pub use config::ClientConfig;
pub use http::{ApiClient, CachedFetcher, FetchError, RequestOptions};
pub use lifecycle::Shutdown;
pub use realtime::{ChannelEvent, ChannelMessage, ChannelOptions, ConnectionStatus, RealtimeChannel};
