//! Header constants and small parsers used on both request paths.
//!
//! # Header Formats
//!
//! | Header | Format | Example |
//! |--------|--------|---------|
//! | Retry-After | Delay in whole seconds | `30` |
//! | Content-Type | Media type with optional parameters | `application/json; charset=utf-8` |
//! | X-CSRF-TOKEN | Opaque token mirrored from the form page | `Xk2...` |
//!
//! # Examples
//!
//! ```
//! use social_api::protocol::{parse_retry_after, strip_quotes, is_json_content_type};
//! use std::time::Duration;
//!
//! assert_eq!(parse_retry_after("3"), Some(Duration::from_secs(3)));
//! assert_eq!(strip_quotes("\"abc\""), "abc");
//! assert!(is_json_content_type("application/vnd.api+json"));
//! ```

use std::time::Duration;

/// `Accept` value sent on every JSON API call.
pub const ACCEPT_JSON: &str = "application/json";

/// `Accept` value used when fetching a server-rendered page.
pub const ACCEPT_HTML: &str = "text/html,application/xhtml+xml";

/// Header that carries the page-extracted anti-forgery token.
pub const X_CSRF_TOKEN: &str = "X-CSRF-TOKEN";

/// Marker header the component update endpoint expects.
pub const X_LIVEWIRE: &str = "X-Livewire";

/// Parse a `Retry-After` header value.
///
/// Only the delay-seconds form is understood; HTTP-date values and garbage
/// yield `None` so the caller falls back to computed backoff.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    let trimmed = value.trim();
    if let Ok(secs) = trimmed.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    trimmed
        .parse::<f64>()
        .ok()
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map(Duration::from_secs_f64)
}

/// Check whether a `Content-Type` value denotes JSON.
pub fn is_json_content_type(value: &str) -> bool {
    let media = value
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    media == "application/json" || media.ends_with("+json")
}

/// Trim whitespace and one pair of surrounding quotes from a plain-text token.
pub fn strip_quotes(value: &str) -> String {
    let trimmed = value.trim();
    let unquoted = if trimmed.len() >= 2
        && ((trimmed.starts_with('"') && trimmed.ends_with('"'))
            || (trimmed.starts_with('\'') && trimmed.ends_with('\'')))
    {
        &trimmed[1..trimmed.len() - 1]
    } else {
        trimmed
    };
    unquoted.to_string()
}
