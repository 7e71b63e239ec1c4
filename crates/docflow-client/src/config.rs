//! Client configuration.

use std::time::Duration;

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Backend base URL.
    pub base_url: String,

    /// Interval between status fetches while polling.
    pub poll_interval: Duration,

    /// Timeout for plain request/response calls. Push streams are not bound by it.
    pub request_timeout: Duration,

    /// Whether a failed push stream downgrades to polling.
    pub stream_fallback: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3001".to_string(),
            poll_interval: Duration::from_millis(2000),
            request_timeout: Duration::from_secs(30),
            stream_fallback: true,
        }
    }
}

impl ClientConfig {
    /// Builder method to set the base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Builder method to set the polling interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}
