use std::time::Duration;

/// Server address used when nothing else is configured.
pub const DEFAULT_URL: &str = "http://127.0.0.1:8188";

/// Turn a user-supplied address into a base URL.
///
/// Accepts `scheme://host:port` or a bare `host:port` (which gets `http://`).
/// Trailing slashes are removed.
pub fn normalize_url(url: &str) -> String {
    let url = url.trim();
    let with_scheme = if url.contains("://") {
        url.to_string()
    } else {
        format!("http://{}", url)
    };
    with_scheme.trim_end_matches('/').to_string()
}

/// Build a base URL from the legacy `host:port` + https flag pair.
pub fn legacy_url(server_address: &str, https: bool) -> String {
    let scheme = if https { "https" } else { "http" };
    let address = server_address.trim().trim_end_matches('/');
    format!("{}://{}", scheme, address)
}

/// Client configuration shared by the blocking and async clients.
///
/// Use [`ClientConfig::builder()`] for ergonomic construction, or
/// [`ClientConfig::default()`] for a local server on port 8188.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Normalized base URL, never ending in `/`.
    pub base_url: String,

    /// Delay between history polls while waiting for a prompt.
    pub poll_interval: Duration,

    /// Per-request timeout applied by the built-in transports.
    pub request_timeout: Duration,

    /// Optional client id sent alongside submitted prompts.
    pub client_id: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_URL.to_string(),
            poll_interval: Duration::from_secs(1),
            request_timeout: Duration::from_secs(30),
            client_id: None,
        }
    }
}

impl ClientConfig {
    /// Config for the given URL or `host:port`, all other settings default.
    pub fn new(url: impl AsRef<str>) -> Self {
        Self::builder().url(url).build()
    }

    /// Start building a config with the builder pattern.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }
}

/// Builder for [`ClientConfig`].
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
    url: Option<String>,
    legacy: Option<(String, bool)>,
    poll_interval: Option<Duration>,
    request_timeout: Option<Duration>,
    client_id: Option<String>,
}

impl ClientConfigBuilder {
    /// Server URL, either `scheme://host:port` or bare `host:port`.
    pub fn url(mut self, url: impl AsRef<str>) -> Self {
        self.url = Some(url.as_ref().to_string());
        self
    }

    /// Legacy `host:port` + https flag. Takes precedence over [`url`](Self::url)
    /// unless the address is empty.
    pub fn legacy_address(mut self, server_address: impl Into<String>, https: bool) -> Self {
        let server_address = server_address.into();
        self.legacy = (!server_address.is_empty()).then_some((server_address, https));
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Client id attached to every submitted prompt.
    pub fn client_id(mut self, id: impl Into<String>) -> Self {
        self.client_id = Some(id.into());
        self
    }

    /// Build the final [`ClientConfig`].
    pub fn build(self) -> ClientConfig {
        let defaults = ClientConfig::default();
        let base_url = match (self.legacy, self.url) {
            (Some((address, https)), _) => legacy_url(&address, https),
            (None, Some(url)) => normalize_url(&url),
            (None, None) => defaults.base_url,
        };
        ClientConfig {
            base_url,
            poll_interval: self.poll_interval.unwrap_or(defaults.poll_interval),
            request_timeout: self.request_timeout.unwrap_or(defaults.request_timeout),
            client_id: self.client_id,
        }
    }
}
