//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → schema.rs (env overrides, then CLI flags)
//!     → validation.rs (semantic checks, once, after every override)
//!     → ClientConfig (validated, immutable)
//!     → handed to cache / http / realtime constructors
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_layered, load_layered_with, load_or_default, ConfigError};
pub use validation::{validate_config, ValidationError};
pub use schema::{
    ApiConfig, CacheConfig, ChannelConfig, ClientConfig, LogFormat, ObservabilityConfig,
    RequestConfig,
};
