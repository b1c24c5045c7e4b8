//! Realtime streaming subsystem.
//!
//! # Data Flow
//! ```text
//! RealtimeChannel::open(url, options)
//!     → channel.rs task: connect_async → Connected
//!     → text frame → message.rs (JSON or raw) → latest data
//!     → error/close → state.rs (Error, Disconnected)
//!     → reconnect timer while retries < max_retries
//! ```

pub mod channel;
pub mod message;
pub mod options;
pub mod state;

pub use channel::RealtimeChannel;
pub use message::ChannelMessage;
pub use options::ChannelOptions;
pub use state::{ChannelEvent, ConnectionStatus};
