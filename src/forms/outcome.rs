//! Interpretation of component update responses.
//!
//! A successful submission is signalled by a redirect effect whose path ends in
//! the flow token; failures show up as an error map in the returned snapshot
//! (or, on older deployments, in the effects themselves).
//!
//! When the HTTP call succeeded but none of those markers is present the result
//! is [`FormOutcome::Unrecognized`] carrying [`PENDING_VERIFICATION_TOKEN`]. This
//! assumes the server sent the email anyway: it is unverified from the response
//! and should be treated as "proceed to the verification-pending step", not as a
//! confirmed success.

use crate::client::transport::error_message;
use crate::error::{ApiError, Result};
use crate::forms::extract::ComponentSnapshot;
use crate::identity::probe::lookup;
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

/// Token reported when a submission succeeded without a readable token.
pub const PENDING_VERIFICATION_TOKEN: &str = "pending_email_verification";

static SUCCESS_REDIRECT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:signup-success|reset-password|verify-email)/([^/?#\s]+)")
        .expect("valid regex")
});

static EXPIRED_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)page\s+expired|session\s+(?:has\s+)?expired|csrf\s+token\s+mismatch")
        .expect("valid regex")
});

const EFFECTS_PATHS: &[&str] = &["components.0.effects", "effects"];
const SNAPSHOT_PATHS: &[&str] = &["components.0.snapshot", "snapshot"];
const LEGACY_ERROR_PATHS: &[&str] = &["serverMemo.errors"];

/// Result of a form submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormOutcome {
    /// Redirected to a success page; carries the flow token
    Success(String),
    /// A field failed validation
    ValidationError(String),
    /// CSRF token or session was stale
    SessionExpired,
    /// Call succeeded but the result could not be read back
    Unrecognized(String),
}

impl FormOutcome {
    /// Flow token to carry forward, for outcomes that proceed to verification
    pub fn token(&self) -> Option<&str> {
        match self {
            FormOutcome::Success(token) | FormOutcome::Unrecognized(token) => Some(token),
            FormOutcome::ValidationError(_) | FormOutcome::SessionExpired => None,
        }
    }

    /// Whether the flow should move on to awaiting the emailed link
    pub fn proceeds(&self) -> bool {
        self.token().is_some()
    }

    /// Convert into the error taxonomy: tokens are `Ok`, failures are errors
    pub fn into_result(self) -> Result<String> {
        match self {
            FormOutcome::Success(token) | FormOutcome::Unrecognized(token) => Ok(token),
            FormOutcome::ValidationError(message) => Err(ApiError::Validation(message)),
            FormOutcome::SessionExpired => Err(ApiError::SessionExpired),
        }
    }
}

/// Interpret an update response given its status and body.
///
/// Non-2xx responses that are neither expired-session nor carry a JSON message
/// become [`ApiError::Api`].
pub fn interpret_update(status: u16, body: &str) -> Result<FormOutcome> {
    if !(200..300).contains(&status) {
        return interpret_failure(status, body);
    }

    let envelope: Value = match serde_json::from_str(body) {
        Ok(value) => value,
        Err(_) => {
            tracing::debug!("update response is not JSON");
            return Ok(FormOutcome::Unrecognized(PENDING_VERIFICATION_TOKEN.into()));
        }
    };

    let effects = EFFECTS_PATHS.iter().find_map(|p| lookup(&envelope, p));

    if let Some(token) = effects
        .and_then(|e| e.get("redirect"))
        .and_then(Value::as_str)
        .and_then(redirect_token)
    {
        return Ok(FormOutcome::Success(token));
    }

    if let Some(message) = snapshot_errors(&envelope) {
        return Ok(FormOutcome::ValidationError(message));
    }

    if let Some(message) = effects.and_then(|e| e.get("errors")).and_then(first_error) {
        return Ok(FormOutcome::ValidationError(message));
    }

    tracing::debug!("update response had no redirect or errors; presuming email sent");
    Ok(FormOutcome::Unrecognized(PENDING_VERIFICATION_TOKEN.into()))
}

/// Token at the end of a success redirect path, if the path is one.
pub fn redirect_token(path: &str) -> Option<String> {
    SUCCESS_REDIRECT
        .captures(path)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .filter(|t| !t.is_empty())
}

/// First message of an error map shaped `{field: [messages]}` or `{field: message}`.
pub fn first_error(errors: &Value) -> Option<String> {
    let map = errors.as_object()?;
    map.values().find_map(|value| match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .find(|s| !s.is_empty())
            .map(str::to_string),
        _ => None,
    })
}

fn snapshot_errors(envelope: &Value) -> Option<String> {
    let from_snapshot = SNAPSHOT_PATHS
        .iter()
        .filter_map(|p| lookup(envelope, p))
        .find_map(|snapshot| {
            let parsed;
            let value = match snapshot {
                Value::String(raw) => {
                    parsed = ComponentSnapshot::parse(raw)?;
                    parsed.value()
                }
                other => other,
            };
            lookup(value, "memo.errors").and_then(first_error)
        });
    from_snapshot.or_else(|| {
        LEGACY_ERROR_PATHS
            .iter()
            .filter_map(|p| lookup(envelope, p))
            .find_map(first_error)
    })
}

fn interpret_failure(status: u16, body: &str) -> Result<FormOutcome> {
    if status == 419 || EXPIRED_MARKER.is_match(body) {
        return Ok(FormOutcome::SessionExpired);
    }
    let message = serde_json::from_str::<Value>(body).ok().and_then(|v| {
        v.get("message")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    });
    match message {
        Some(message) => Ok(FormOutcome::ValidationError(message)),
        None => Err(ApiError::Api {
            status,
            message: error_message(status, body),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn snapshot_with_errors(errors: Value) -> String {
        json!({
            "data": { "email": "taken@example.com" },
            "memo": { "id": "abc", "name": "auth.signup", "errors": errors },
            "checksum": "x"
        })
        .to_string()
    }

    #[test]
    fn test_redirect_yields_success_token() {
        let body = json!({
            "components": [{
                "snapshot": snapshot_with_errors(json!([])),
                "effects": { "redirect": "https://example.com/signup-success/ABC123" }
            }]
        })
        .to_string();
        assert_eq!(
            interpret_update(200, &body).unwrap(),
            FormOutcome::Success("ABC123".into())
        );
    }

    #[test]
    fn test_redirect_token_strips_query() {
        assert_eq!(
            redirect_token("/reset-password/tok_9?email=a%40b.c").as_deref(),
            Some("tok_9")
        );
        assert_eq!(redirect_token("/dashboard"), None);
    }

    #[test]
    fn test_memo_errors_yield_validation_error() {
        let body = json!({
            "components": [{
                "snapshot": snapshot_with_errors(json!({
                    "email": ["The email has already been taken."]
                })),
                "effects": { "html": "<div></div>" }
            }]
        })
        .to_string();
        assert_eq!(
            interpret_update(200, &body).unwrap(),
            FormOutcome::ValidationError("The email has already been taken.".into())
        );
    }

    #[test]
    fn test_effects_errors_are_second_chance() {
        let body = json!({
            "effects": { "errors": { "email": "Invalid email." } }
        })
        .to_string();
        assert_eq!(
            interpret_update(200, &body).unwrap(),
            FormOutcome::ValidationError("Invalid email.".into())
        );
    }

    #[test]
    fn test_legacy_server_memo_errors() {
        let body = json!({
            "serverMemo": { "errors": { "email": ["Too many attempts."] } }
        })
        .to_string();
        assert_eq!(
            interpret_update(200, &body).unwrap(),
            FormOutcome::ValidationError("Too many attempts.".into())
        );
    }

    // Optimistic: a 2xx with no redirect and no errors is presumed to have sent
    // the email even though nothing in the response confirms it.
    #[test]
    fn test_unrecognized_success_is_optimistic_pending() {
        let body = json!({
            "components": [{
                "snapshot": snapshot_with_errors(json!([])),
                "effects": { "html": "<div>Check your inbox</div>" }
            }]
        })
        .to_string();
        let outcome = interpret_update(200, &body).unwrap();
        assert_eq!(
            outcome,
            FormOutcome::Unrecognized(PENDING_VERIFICATION_TOKEN.into())
        );
        assert!(outcome.proceeds());
    }

    #[test]
    fn test_expired_page() {
        assert_eq!(
            interpret_update(419, "<h1>Page Expired</h1>").unwrap(),
            FormOutcome::SessionExpired
        );
        assert_eq!(
            interpret_update(500, "Your session has expired").unwrap(),
            FormOutcome::SessionExpired
        );
    }

    #[test]
    fn test_failure_with_json_message() {
        assert_eq!(
            interpret_update(422, r#"{"message":"Email is required."}"#).unwrap(),
            FormOutcome::ValidationError("Email is required.".into())
        );
    }

    #[test]
    fn test_generic_failure_is_error() {
        match interpret_update(500, "<html>boom</html>") {
            Err(ApiError::Api { status, message }) => {
                assert_eq!(status, 500);
                assert_eq!(message, "API error: 500");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_outcome_into_result() {
        assert_eq!(
            FormOutcome::Success("T".into()).into_result().unwrap(),
            "T"
        );
        assert!(matches!(
            FormOutcome::ValidationError("bad".into()).into_result(),
            Err(ApiError::Validation(_))
        ));
        assert!(matches!(
            FormOutcome::SessionExpired.into_result(),
            Err(ApiError::SessionExpired)
        ));
    }
}
