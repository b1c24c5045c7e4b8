//! Lifecycle management.
//!
//! # Data Flow
//! ```text
//! Ctrl-C / end of command
//!     → Shutdown::trigger
//!     → cache sweeper and stream printer leave their loops
//! ```

pub mod shutdown;

pub use shutdown::Shutdown;
