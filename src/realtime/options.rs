//! Channel behaviour settings.

use std::time::Duration;

use crate::config::ChannelConfig;

/// Reconnection policy and handshake settings for a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelOptions {
    /// Reconnect automatically after a close.
    pub reconnect: bool,
    /// Delay before each automatic reconnection.
    pub reconnect_interval: Duration,
    /// Ceiling on consecutive automatic reconnections.
    pub max_retries: u32,
    /// Offered in the `Sec-WebSocket-Protocol` header when non-empty.
    pub protocols: Vec<String>,
}

impl ChannelOptions {
    pub fn from_config(config: &ChannelConfig) -> Self {
        Self {
            reconnect: config.reconnect,
            reconnect_interval: Duration::from_millis(config.reconnect_interval_ms),
            max_retries: config.max_retries,
            protocols: config.protocols.clone(),
        }
    }

    pub fn reconnect(mut self, enabled: bool) -> Self {
        self.reconnect = enabled;
        self
    }

    pub fn reconnect_interval(mut self, interval: Duration) -> Self {
        self.reconnect_interval = interval;
        self
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn protocols<I, S>(mut self, protocols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.protocols = protocols.into_iter().map(Into::into).collect();
        self
    }
}

impl Default for ChannelOptions {
    fn default() -> Self {
        Self::from_config(&ChannelConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let options = ChannelOptions::default();
        assert!(options.reconnect);
        assert_eq!(options.reconnect_interval, Duration::from_millis(3000));
        assert_eq!(options.max_retries, 5);
        assert!(options.protocols.is_empty());
    }

    #[test]
    fn from_config_copies_fields() {
        let config = ChannelConfig {
            url: "ws://localhost:8000/ws".into(),
            reconnect: false,
            reconnect_interval_ms: 250,
            max_retries: 1,
            protocols: vec!["quotes.v1".into()],
        };
        let options = ChannelOptions::from_config(&config);
        assert!(!options.reconnect);
        assert_eq!(options.reconnect_interval, Duration::from_millis(250));
        assert_eq!(options.max_retries, 1);
        assert_eq!(options.protocols, vec!["quotes.v1".to_string()]);
    }
}
