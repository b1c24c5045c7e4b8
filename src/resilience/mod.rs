//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Logical request:
//!     → retries.rs (attempt loop, budget of retries + 1 attempts)
//!     → timeouts.rs (deadline per attempt, drop on expiry)
//!     → On failure: backoff.rs (linear delay before the next attempt)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every attempt has a deadline
//! - Backoff is linear, not exponential
//! - Timeout errors are distinct from HTTP status errors

pub mod backoff;
pub mod retries;
pub mod timeouts;

pub use backoff::linear_backoff;
pub use retries::{retry_with_backoff, RetryPolicy};
pub use timeouts::with_deadline;
