//! Client configuration.

use std::time::Duration;

/// Default number of items requested per page.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Configuration for a [`Client`](crate::Client).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL of the Subtext instance (e.g., "https://chat.example.org")
    pub base_url: String,
    /// Items requested per page (`count` query parameter)
    pub page_size: u32,
    /// Per-request timeout for the HTTP transport
    pub timeout: Duration,
    /// `User-Agent` header sent with every request
    pub user_agent: String,
}

impl ClientConfig {
    /// Default configuration pointing at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { base_url: base_url.into(), ..Self::default() }
    }

    /// Base URL without trailing slashes.
    pub fn normalized_base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            timeout: Duration::from_secs(30),
            user_agent: concat!("subtext-client/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_default() {
        let config = ClientConfig::default();
        assert_eq!(config.page_size, 100);
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert!(config.user_agent.starts_with("subtext-client/"));
    }

    #[test]
    fn base_url_trailing_slashes_stripped() {
        let config = ClientConfig::new("https://chat.example.org//");
        assert_eq!(config.normalized_base_url(), "https://chat.example.org");
    }
}
