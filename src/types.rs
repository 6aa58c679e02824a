//! Request, response and record types shared across the client.

use crate::protocol::Params;
use http::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single API call description.
///
/// Built with the method constructors and chained `with_*` setters; consumed by
/// the flight controller, which resolves it to a URL and dispatches it.
///
/// ```
/// use social_api::ApiRequest;
/// use serde_json::json;
///
/// let req = ApiRequest::post("posts")
///     .with_param("draft", false)
///     .with_body(json!({ "caption": "hi" }));
/// assert_eq!(req.method, http::Method::POST);
/// ```
#[derive(Debug, Clone)]
pub struct ApiRequest {
    /// HTTP method
    pub method: Method,
    /// Path relative to the base URL, or an absolute URL
    pub endpoint: String,
    /// Query parameters
    pub params: Params,
    /// JSON body
    pub body: Option<Value>,
    /// Extra headers, applied after the defaults
    pub headers: Vec<(String, String)>,
    /// Skip the bearer token even when the session holds one
    pub unauthenticated: bool,
}

impl ApiRequest {
    /// Create a request with an arbitrary method
    pub fn new(method: Method, endpoint: impl Into<String>) -> Self {
        Self {
            method,
            endpoint: endpoint.into(),
            params: Params::new(),
            body: None,
            headers: Vec::new(),
            unauthenticated: false,
        }
    }

    /// GET request
    pub fn get(endpoint: impl Into<String>) -> Self {
        Self::new(Method::GET, endpoint)
    }

    /// POST request
    pub fn post(endpoint: impl Into<String>) -> Self {
        Self::new(Method::POST, endpoint)
    }

    /// PUT request
    pub fn put(endpoint: impl Into<String>) -> Self {
        Self::new(Method::PUT, endpoint)
    }

    /// DELETE request
    pub fn delete(endpoint: impl Into<String>) -> Self {
        Self::new(Method::DELETE, endpoint)
    }

    /// Replace the query parameters
    pub fn with_params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }

    /// Append one scalar query parameter
    pub fn with_param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.params = self.params.with(key, value);
        self
    }

    /// Set the JSON body
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Add a header
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Never attach the bearer token
    pub fn unauthenticated(mut self) -> Self {
        self.unauthenticated = true;
        self
    }

    /// Case-insensitive check for a caller-supplied header
    pub fn has_header(&self, name: &str) -> bool {
        self.headers.iter().any(|(k, _)| k.eq_ignore_ascii_case(name))
    }
}

/// A classified 2xx response body.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiResponse {
    /// Body of a JSON content type, parsed
    Json(Value),
    /// Body of any other content type (plain-text tokens, HTML pages)
    Text(String),
}

impl ApiResponse {
    /// Convert into a JSON value; text bodies become JSON strings
    pub fn into_json(self) -> Value {
        match self {
            ApiResponse::Json(value) => value,
            ApiResponse::Text(text) => Value::String(text),
        }
    }

    /// Convert into text; JSON strings unwrap, other JSON is re-serialized
    pub fn into_text(self) -> String {
        match self {
            ApiResponse::Text(text) => text,
            ApiResponse::Json(Value::String(s)) => s,
            ApiResponse::Json(value) => value.to_string(),
        }
    }

    /// Borrow the JSON value, if this is a JSON body
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            ApiResponse::Json(value) => Some(value),
            ApiResponse::Text(_) => None,
        }
    }
}

/// A response read without status classification, for the form bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    /// HTTP status code
    pub status: u16,
    /// Body text
    pub body: String,
}

impl RawResponse {
    /// Whether the status is 2xx
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Payload handed to the unauthorized hook on every 401.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnauthorizedEvent {
    /// Endpoint as passed by the caller
    pub endpoint: String,
    /// Status code (always 401 today)
    pub status: u16,
    /// Bearer token the rejected call was sent with
    pub token: Option<String>,
    /// Raw response body
    pub body: String,
}

/// A full user record as returned by the profile endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Numeric user id
    pub id: u64,
    /// Handle
    pub username: String,
    /// Display name
    #[serde(default)]
    pub name: Option<String>,
    /// Email, only present on one's own profile
    #[serde(default)]
    pub email: Option<String>,
    /// Avatar URL
    #[serde(default)]
    pub avatar: Option<String>,
    /// Biography text
    #[serde(default)]
    pub bio: Option<String>,
    /// Follower count
    #[serde(default)]
    pub followers_count: u64,
    /// Following count
    #[serde(default)]
    pub following_count: u64,
    /// Post count
    #[serde(default)]
    pub posts_count: u64,
}
