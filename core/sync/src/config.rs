//! Client configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default server address.
pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:8080";

/// Settings of the sync client and the list poller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the server, e.g. `http://127.0.0.1:8080`.
    pub server_url: String,
    /// Directory where downloaded files are written.
    pub download_dir: PathBuf,
    /// How often a list poller refreshes.
    pub poll_interval: Duration,
    /// Upper bound on a single request, body included.
    pub request_timeout: Duration,
}

impl ClientConfig {
    /// Create a configuration for the given server.
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            ..Self::default()
        }
    }

    /// Set the download directory.
    pub fn with_download_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.download_dir = dir.into();
        self
    }

    /// Set the poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            download_dir: dirs::download_dir().unwrap_or_else(|| PathBuf::from(".")),
            poll_interval: Duration::from_millis(500),
            request_timeout: Duration::from_secs(30),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let config = ClientConfig::new("http://vault.example:9000")
            .with_download_dir("/tmp/dl")
            .with_poll_interval(Duration::from_secs(2));

        assert_eq!(config.server_url, "http://vault.example:9000");
        assert_eq!(config.download_dir, PathBuf::from("/tmp/dl"));
        assert_eq!(config.poll_interval, Duration::from_secs(2));
        assert_eq!(config.request_timeout, Duration::from_secs(30));
    }
}
