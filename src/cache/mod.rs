//! Time-boxed in-memory cache subsystem.
//!
//! # Data Flow
//! ```text
//! set(key, value, ttl) → store.rs (entry with expires_at = now + ttl)
//! get(key)             → store.rs (serve, or delete if expires_at <= now)
//! cleanup()            → store.rs (sweep all expired, return count)
//! build_key(base, ..)  → key.rs (sorted name=value pairs)
//! spawn_sweeper(..)    → sweeper.rs (caller-owned periodic cleanup)
//! ```
//!
//! # Design Decisions
//! - Expiration enforced on read; sweeping is pull-based
//! - `size()` counts stored entries, expired or not
//! - `get_or_set` is not single-flight; `get_or_set_shared` is
//! - Instances are owned and injected, never global

pub mod key;
pub mod store;
pub mod sweeper;

pub use key::build_key;
pub use store::{TtlCache, DEFAULT_TTL};
pub use sweeper::spawn_sweeper;
