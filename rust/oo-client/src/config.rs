use std::path::PathBuf;
use std::time::Duration;

use crate::ResolutionMode;

/// Configuration for an oo [`crate::Client`].
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Base URL of the object store (e.g. "https://oo.example.com/objects")
    pub store_url: String,

    /// Directory holding the principal's key pair
    pub home: PathBuf,

    /// Optional timeout for requests in seconds (default: 30)
    pub timeout_seconds: Option<u64>,

    /// Optional custom headers to send with each object store request
    pub headers: Vec<(String, String)>,

    /// How independent third-party caveats are discharged
    pub resolution: ResolutionMode,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            store_url: "http://localhost:8080".to_string(),
            home: PathBuf::from(".oo"),
            timeout_seconds: Some(30),
            headers: Vec::new(),
            resolution: ResolutionMode::default(),
        }
    }
}

impl ClientConfig {
    /// Create a configuration for the store at `store_url`, keeping keys in
    /// `home`
    pub fn new(store_url: impl Into<String>, home: impl Into<PathBuf>) -> Self {
        Self {
            store_url: store_url.into(),
            home: home.into(),
            ..Default::default()
        }
    }

    /// Set the request timeout
    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout_seconds = Some(seconds);
        self
    }

    /// Add a custom header
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    /// Set how third-party caveats are discharged
    pub fn with_resolution(mut self, resolution: ResolutionMode) -> Self {
        self.resolution = resolution;
        self
    }

    /// The base URL without trailing slashes
    pub(crate) fn endpoint(&self) -> &str {
        self.store_url.trim_end_matches('/')
    }

    pub(crate) fn http_client(&self) -> reqwest::Client {
        let mut client_builder = reqwest::Client::builder();

        if let Some(timeout) = self.timeout_seconds {
            client_builder = client_builder.timeout(Duration::from_secs(timeout));
        }

        client_builder.build().unwrap_or_else(|error| {
            tracing::warn!(
                %error,
                timeout = ?self.timeout_seconds,
                "HTTP client could not be configured; requests fall back to no timeout"
            );
            reqwest::Client::new()
        })
    }
}
