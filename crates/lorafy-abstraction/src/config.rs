use std::fmt;
use std::time::Duration;

/// Default API root of the hosted training service.
pub const DEFAULT_BASE_URL: &str = "https://api.replicate.com/v1";

/// Connection settings handed to a client at construction.
///
/// Nothing in the client reads process-wide secrets; everything it needs is here.
#[derive(Clone, PartialEq, Eq)]
pub struct RemoteConfig {
    /// Bearer token sent with every request.
    pub api_token: String,
    /// API root, without a trailing slash.
    pub base_url: String,
    /// Trainer model in `owner/name` form.
    pub model_name: String,
    /// Trainer model version ID.
    pub model_version: String,
    /// Per-request timeout. Uploads of large archives need a generous value.
    pub request_timeout: Duration,
}

impl RemoteConfig {
    #[must_use]
    pub fn new(
        api_token: impl Into<String>,
        model_name: impl Into<String>,
        model_version: impl Into<String>,
    ) -> Self {
        Self {
            api_token: api_token.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model_name: model_name.into(),
            model_version: model_version.into(),
            request_timeout: Duration::from_secs(300),
        }
    }

    /// Overrides the API root (used for self-hosted gateways and tests).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

impl fmt::Debug for RemoteConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteConfig")
            .field("api_token", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model_name", &self.model_name)
            .field("model_version", &self.model_version)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}
