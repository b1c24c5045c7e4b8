//! Channel status and the events published on every transition.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::realtime::message::ChannelMessage;

/// Connection health of a [`RealtimeChannel`](crate::realtime::RealtimeChannel).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    /// Initial state, and the state after every close.
    #[default]
    Disconnected,
    /// A transport error was observed. A close always follows.
    Error,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::Error => "error",
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionStatus::Connected)
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Notification delivered to [`subscribe`](crate::realtime::RealtimeChannel::subscribe) receivers.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    /// The status changed to the given value.
    Status(ConnectionStatus),
    /// A frame arrived and became the channel's current data.
    Message(ChannelMessage),
    /// An automatic reconnection will start after `delay`.
    ReconnectScheduled { attempt: u32, delay: Duration },
}
