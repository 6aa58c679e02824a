//! Error types for the network access layer.
//!
//! Every fallible operation in the crate returns [`Result<T>`], whose error side is
//! [`ApiError`]. The enum is `Clone` because a coalesced request hands the very same
//! outcome, error included, to every caller that joined it.
//!
//! # Taxonomy
//!
//! | Variant | Raised when |
//! |---------|-------------|
//! | [`ApiError::Network`] | DNS, connect, timeout or body-read failure |
//! | [`ApiError::RateLimited`] | 429 responses outlasted the retry budget |
//! | [`ApiError::Api`] | any other non-2xx response |
//! | [`ApiError::NotAuthenticated`] | a call needing a token was attempted without one |
//! | [`ApiError::ExtractionFailure`] | form automation found no CSRF token or snapshot |
//! | [`ApiError::Validation`] | the form component reported a field error |
//! | [`ApiError::SessionExpired`] | the form component rejected a stale CSRF/session |

use std::time::Duration;
use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ApiError>;

/// Errors raised by the client.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// Transport-level failure before a status line was read.
    #[error("network failure: {message}")]
    Network {
        /// Underlying error text
        message: String,
        /// Whether a retry may succeed (timeouts, refused connections)
        transient: bool,
    },

    /// The server kept answering 429 until the retry budget ran out.
    #[error("rate limited after {attempts} attempts")]
    RateLimited {
        /// Number of physical calls made
        attempts: u32,
    },

    /// Non-2xx response other than 429.
    #[error("{message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Message from the body's `message`/`error` field, or a generic one
        message: String,
    },

    /// A call that requires a bearer token was attempted without one.
    #[error("not authenticated")]
    NotAuthenticated,

    /// The form page lacked a CSRF token or component snapshot.
    #[error("extraction failure: {0}")]
    ExtractionFailure(String),

    /// Server-side field validation rejected a form submission.
    #[error("validation error: {0}")]
    Validation(String),

    /// The form component reported an expired page or session.
    #[error("session expired")]
    SessionExpired,

    /// A 2xx body could not be decoded into the expected shape.
    #[error("decode error: {0}")]
    Decode(String),

    /// No endpoint in the identity cascade yielded a username.
    #[error("identity could not be resolved")]
    IdentityUnresolved,

    /// A registration flow event arrived in a state that cannot accept it.
    #[error("cannot {action} while in state {state}")]
    InvalidTransition {
        /// State the flow was in
        state: String,
        /// Attempted action
        action: String,
    },

    /// Invalid client configuration (bad base URL, proxy, etc).
    #[error("config error: {0}")]
    Config(String),

    /// A single 429 response. Consumed by the flight controller and never
    /// returned from the public request path.
    #[error("throttled by server")]
    Throttled {
        /// Parsed `Retry-After` hint
        retry_after: Option<Duration>,
    },
}

impl ApiError {
    /// Check whether the failure is transient and worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ApiError::Network { transient: true, .. })
    }

    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Api { status, .. } => Some(*status),
            ApiError::Throttled { .. } | ApiError::RateLimited { .. } => Some(429),
            _ => None,
        }
    }

    /// Check whether the server answered 401.
    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        ApiError::Network {
            transient: err.is_timeout() || err.is_connect(),
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Decode(err.to_string())
    }
}

impl From<url::ParseError> for ApiError {
    fn from(err: url::ParseError) -> Self {
        ApiError::Config(format!("invalid url: {}", err))
    }
}
