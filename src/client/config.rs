//! Client configuration.
//!
//! All knobs are plain public fields with defaults, so callers override only what
//! they need:
//!
//! ```
//! use social_api::client::ClientConfig;
//!
//! let config = ClientConfig {
//!     base_url: "https://api.example.org/api/".into(),
//!     max_retries: 5,
//!     ..Default::default()
//! };
//! assert_eq!(config.min_spacing_ms, 100);
//! ```

use std::env;
use std::time::Duration;

/// Endpoint paths, relative to [`ClientConfig::base_url`] unless noted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    /// Password login, answers with a plain-text token
    pub login: String,
    /// Token revocation
    pub logout: String,
    /// Aggregate endpoint embedding `data.auth.user`
    pub bootstrap: String,
    /// Profile lookup by username
    pub profile: String,
    /// Query parameter name carrying the username on the profile endpoint
    pub profile_param: String,
    /// Account creation with an emailed flow token
    pub register: String,
    /// Password reset with an emailed flow token
    pub reset_password: String,
    /// Signup page (relative to [`ClientConfig::web_base_url`])
    pub signup_page: String,
    /// Forgot-password page (relative to [`ClientConfig::web_base_url`])
    pub forgot_password_page: String,
    /// Component update endpoint (relative to [`ClientConfig::web_base_url`])
    pub livewire_update: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            login: "login".into(),
            logout: "logout".into(),
            bootstrap: "bootstrap".into(),
            profile: "profile".into(),
            profile_param: "id".into(),
            register: "register".into(),
            reset_password: "reset-password".into(),
            signup_page: "signup".into(),
            forgot_password_page: "forgot-password".into(),
            livewire_update: "livewire/update".into(),
        }
    }
}

impl Endpoints {
    /// Whether a 401 from `endpoint` comes from a profile probe and must not
    /// tear down the session.
    pub fn is_profile_probe(&self, endpoint: &str) -> bool {
        let path = endpoint
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .trim_matches('/');
        let profile = self.profile.trim_matches('/');
        path == profile || path.starts_with(&format!("{}/", profile))
    }
}

/// Configuration for [`ApiClient`](crate::ApiClient).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// JSON API base, e.g. `https://api.example.com/api/`
    pub base_url: String,
    /// Host serving the server-rendered form pages
    pub web_base_url: String,
    /// Per-call timeout in milliseconds
    pub request_timeout_ms: u64,
    /// Floor between two physical dispatches in milliseconds
    pub min_spacing_ms: u64,
    /// Base delay for 429 backoff in milliseconds
    pub rate_limit_base_delay_ms: u64,
    /// Cap for 429 backoff in milliseconds
    pub rate_limit_max_delay_ms: u64,
    /// Retries after the first attempt, for 429 and transient failures alike
    pub max_retries: u32,
    /// Base delay for transient-failure retries in milliseconds
    pub retry_delay_ms: u64,
    /// Amount the mandated delay shrinks per healthy response, in milliseconds
    pub decay_step_ms: u64,
    /// How long a finished ticket stays joinable, in milliseconds
    pub ticket_linger_ms: u64,
    /// Idle connections kept per host
    pub max_idle_connections: u32,
    /// Optional proxy URL (empty = none)
    pub proxy_url: String,
    /// Emit retry and backoff warnings
    pub enable_logging: bool,
    /// Endpoint paths
    pub endpoints: Endpoints,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.example.com/api/".into(),
            web_base_url: "https://example.com/".into(),
            request_timeout_ms: 20_000,
            min_spacing_ms: 100,
            rate_limit_base_delay_ms: 1_000,
            rate_limit_max_delay_ms: 30_000,
            max_retries: 3,
            retry_delay_ms: 500,
            decay_step_ms: 250,
            ticket_linger_ms: 50,
            max_idle_connections: 16,
            proxy_url: String::new(),
            enable_logging: true,
            endpoints: Endpoints::default(),
        }
    }
}

impl ClientConfig {
    /// Build a config from `SOCIAL_API_*` environment variables over the defaults.
    ///
    /// Recognized: `SOCIAL_API_BASE_URL`, `SOCIAL_API_WEB_URL`,
    /// `SOCIAL_API_TIMEOUT_MS`, `SOCIAL_API_MAX_RETRIES`, `SOCIAL_API_PROXY`.
    /// Unparseable numbers are ignored.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(value) = env_value("SOCIAL_API_BASE_URL") {
            config.base_url = value;
        }
        if let Some(value) = env_value("SOCIAL_API_WEB_URL") {
            config.web_base_url = value;
        }
        if let Some(value) = env_value("SOCIAL_API_TIMEOUT_MS").and_then(|v| v.parse().ok()) {
            config.request_timeout_ms = value;
        }
        if let Some(value) = env_value("SOCIAL_API_MAX_RETRIES").and_then(|v| v.parse().ok()) {
            config.max_retries = value;
        }
        if let Some(value) = env_value("SOCIAL_API_PROXY") {
            config.proxy_url = value;
        }
        config
    }

    /// Per-call timeout
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Pacing floor
    pub fn min_spacing(&self) -> Duration {
        Duration::from_millis(self.min_spacing_ms)
    }

    /// Mandated-delay decay per healthy response
    pub fn decay_step(&self) -> Duration {
        Duration::from_millis(self.decay_step_ms)
    }

    /// Ticket linger after completion
    pub fn ticket_linger(&self) -> Duration {
        Duration::from_millis(self.ticket_linger_ms)
    }
}

fn env_value(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.min_spacing(), Duration::from_millis(100));
        assert!(config.request_timeout() >= Duration::from_secs(15));
        assert!(config.request_timeout() <= Duration::from_secs(30));
    }

    #[test]
    fn test_profile_probe_matching() {
        let endpoints = Endpoints::default();
        assert!(endpoints.is_profile_probe("profile"));
        assert!(endpoints.is_profile_probe("/profile"));
        assert!(endpoints.is_profile_probe("profile?id=alice"));
        assert!(endpoints.is_profile_probe("profile/alice"));
        assert!(!endpoints.is_profile_probe("profiles"));
        assert!(!endpoints.is_profile_probe("bootstrap"));
        assert!(!endpoints.is_profile_probe("feed"));
    }
}
