//! Client configuration.

use std::time::Duration;

use url::Url;

use crate::error::ApiError;

pub const DEFAULT_API_URL: &str = "http://localhost:3000/api";

pub const DEFAULT_USER_AGENT: &str = concat!("taskdesk-client/", env!("CARGO_PKG_VERSION"));

/// Default capacity of the session event channel.
const DEFAULT_EVENT_CAPACITY: usize = 64;

/// Configurable options for the API client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL every request path is joined onto.
    pub base_url: Url,

    /// Fixed per-call deadline. A call exceeding it fails as a transport
    /// error and never triggers a refresh.
    pub timeout: Duration,

    /// Connection timeout (time to establish initial connection)
    pub connect_timeout: Duration,

    /// User agent string
    pub user_agent: String,

    /// Capacity of the session event broadcast channel.
    pub event_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse(DEFAULT_API_URL).expect("default API URL is valid"),
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl ClientConfig {
    /// Create a configuration for the given base URL with default timeouts.
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            ..Self::default()
        }
    }

    /// Create ClientConfig from environment variables.
    ///
    /// Environment variables:
    /// - `TASKDESK_API_URL`: API base URL (default: `http://localhost:3000/api`)
    /// - `TASKDESK_TIMEOUT_SECS`: Per-call deadline in seconds (default: 30)
    /// - `TASKDESK_CONNECT_TIMEOUT_SECS`: Connect timeout in seconds (default: 10)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let base_url = std::env::var("TASKDESK_API_URL")
            .ok()
            .and_then(|s| Url::parse(s.trim()).ok())
            .unwrap_or(defaults.base_url);

        let timeout = std::env::var("TASKDESK_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.timeout);

        let connect_timeout = std::env::var("TASKDESK_CONNECT_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.connect_timeout);

        Self {
            base_url,
            timeout,
            connect_timeout,
            ..defaults
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build the underlying HTTP client.
    pub fn build_http_client(&self) -> Result<reqwest::Client, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .connect_timeout(self.connect_timeout)
            .user_agent(self.user_agent.clone())
            .build()?;
        Ok(client)
    }

    /// Resolve an API path (e.g. `/tasks/42`) against the base URL.
    ///
    /// The base URL's own path is kept, with or without a trailing slash.
    pub fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        let mut base = self.base_url.clone();
        if !base.path().ends_with('/') {
            let with_slash = format!("{}/", base.path());
            base.set_path(&with_slash);
        }
        base.join(path.trim_start_matches('/'))
            .map_err(|e| ApiError::InvalidRequest(format!("{path}: {e}")))
    }
}
