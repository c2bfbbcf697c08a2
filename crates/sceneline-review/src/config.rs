use std::fmt;
use std::time::Duration;

use tracing::warn;

pub const DEFAULT_MODEL: &str = "claude-sonnet-4-5";
pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub const ENV_API_KEY: &str = "ANTHROPIC_API_KEY";
pub const ENV_MODEL: &str = "SCENELINE_REVIEW_MODEL";
pub const ENV_BASE_URL: &str = "SCENELINE_REVIEW_BASE_URL";
pub const ENV_FALLBACK_URL: &str = "SCENELINE_REVIEW_FALLBACK_URL";
pub const ENV_TIMEOUT_SECS: &str = "SCENELINE_REVIEW_TIMEOUT_SECS";

/// Reviewer settings. A missing credential is a normal state: the
/// coordinator reports it in the response instead of failing.
#[derive(Clone)]
pub struct ReviewerConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub fallback_url: String,
    /// Budget shared by the primary call and its fallback.
    pub timeout: Duration,
}

impl ReviewerConfig {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            fallback_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source; blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let mut config = Self::new(get(ENV_API_KEY));
        if let Some(model) = get(ENV_MODEL) {
            config.model = model;
        }
        if let Some(base) = get(ENV_BASE_URL) {
            config.fallback_url = base.clone();
            config.base_url = base;
        }
        if let Some(fallback) = get(ENV_FALLBACK_URL) {
            config.fallback_url = fallback;
        }
        if let Some(raw) = get(ENV_TIMEOUT_SECS) {
            match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => config.timeout = Duration::from_secs(secs),
                _ => warn!(value = %raw, "ignoring invalid {ENV_TIMEOUT_SECS}"),
            }
        }
        config
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_fallback_url(mut self, url: impl Into<String>) -> Self {
        self.fallback_url = url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }
}

impl fmt::Debug for ReviewerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReviewerConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("fallback_url", &self.fallback_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}
