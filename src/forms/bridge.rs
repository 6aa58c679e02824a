//! Form-automation bridge.
//!
//! Drives a server-rendered reactive component as a browser would:
//!
//! 1. GET the human-facing page and extract the CSRF token and component snapshot
//! 2. POST an update envelope (snapshot + field update + method call) to the
//!    component update endpoint, mirroring the token in `X-CSRF-TOKEN`
//! 3. Interpret the response into a [`FormOutcome`]
//!
//! Cookies from step 1 are replayed in step 2 by the transport's cookie jar. The
//! bridge never touches session state: both calls go through
//! [`FlightController::request_raw`], which bypasses the unauthorized hook, so a
//! failed attempt leaves prior session fields untouched.

use crate::client::config::{ClientConfig, Endpoints};
use crate::client::transport::error_message;
use crate::client::FlightController;
use crate::error::{ApiError, Result};
use crate::forms::extract::{self, CsrfExtraction};
use crate::forms::outcome::{interpret_update, FormOutcome};
use crate::protocol::{ACCEPT_HTML, ACCEPT_JSON, X_CSRF_TOKEN, X_LIVEWIRE};
use crate::types::ApiRequest;
use reqwest::header::ACCEPT;
use serde_json::{json, Value};
use std::sync::Arc;
use url::Url;

/// Component method that sends the signup verification email.
pub const SEND_VERIFICATION_METHOD: &str = "sendVerificationEmail";

/// Component method that sends the password reset link.
pub const SEND_RESET_METHOD: &str = "sendPasswordResetLink";

/// Component field the email address is written to.
pub const EMAIL_FIELD: &str = "email";

/// Build the update envelope for one field update and one method call.
pub fn build_update_envelope(
    extraction: &CsrfExtraction,
    method: &str,
    field: &str,
    value: &str,
) -> Value {
    let mut updates = serde_json::Map::new();
    updates.insert(field.to_string(), Value::String(value.to_string()));

    json!({
        "_token": extraction.csrf_token,
        "components": [{
            "snapshot": extraction.snapshot.raw(),
            "updates": updates,
            "calls": [{
                "path": "",
                "method": method,
                "params": [],
            }],
        }],
    })
}

/// Client for the two email flows that only exist as server-rendered forms.
#[derive(Clone)]
pub struct FormBridge {
    flight: FlightController,
    web_base: Url,
    endpoints: Arc<Endpoints>,
}

impl FormBridge {
    /// Create a bridge against `config.web_base_url`
    pub fn new(flight: FlightController, config: &ClientConfig) -> Result<Self> {
        let base = if config.web_base_url.ends_with('/') {
            config.web_base_url.clone()
        } else {
            format!("{}/", config.web_base_url)
        };
        Ok(Self {
            flight,
            web_base: Url::parse(&base)?,
            endpoints: Arc::new(config.endpoints.clone()),
        })
    }

    /// Request the signup verification email for `email`
    pub async fn send_verification_email(&self, email: &str) -> Result<FormOutcome> {
        self.submit_email(&self.endpoints.signup_page, SEND_VERIFICATION_METHOD, email)
            .await
    }

    /// Request the password reset email for `email`
    pub async fn send_password_reset_email(&self, email: &str) -> Result<FormOutcome> {
        self.submit_email(
            &self.endpoints.forgot_password_page,
            SEND_RESET_METHOD,
            email,
        )
        .await
    }

    /// Fetch `page`, set the email field and call `method` on its component.
    pub async fn submit_email(&self, page: &str, method: &str, email: &str) -> Result<FormOutcome> {
        let extraction = self.load_page(page).await?;
        tracing::debug!(
            component = extraction.snapshot.name(),
            id = extraction.snapshot.id(),
            method,
            "submitting component update"
        );

        let update_url = self.web_url(&self.endpoints.livewire_update)?;
        let call = ApiRequest::post(update_url.as_str())
            .unauthenticated()
            .with_header(ACCEPT.as_str(), ACCEPT_JSON)
            .with_header(X_CSRF_TOKEN, extraction.csrf_token.as_str())
            .with_header(X_LIVEWIRE, "true")
            .with_body(build_update_envelope(&extraction, method, EMAIL_FIELD, email));

        let response = self.flight.request_raw(call).await?;
        let outcome = interpret_update(response.status, &response.body)?;
        match &outcome {
            FormOutcome::Success(_) => tracing::info!(method, "form flow succeeded"),
            FormOutcome::Unrecognized(_) => {
                tracing::warn!(method, "form flow result unreadable; presuming email sent")
            }
            FormOutcome::ValidationError(message) => {
                tracing::debug!(method, %message, "form validation failed")
            }
            FormOutcome::SessionExpired => tracing::warn!(method, "form session expired"),
        }
        Ok(outcome)
    }

    async fn load_page(&self, page: &str) -> Result<CsrfExtraction> {
        let page_url = self.web_url(page)?;
        let call = ApiRequest::get(page_url.as_str())
            .unauthenticated()
            .with_header(ACCEPT.as_str(), ACCEPT_HTML);
        let page = self.flight.request_raw(call).await?;
        if !page.is_success() {
            return Err(ApiError::Api {
                status: page.status,
                message: error_message(page.status, &page.body),
            });
        }
        extract::extract(&page.body)
    }

    fn web_url(&self, path: &str) -> Result<Url> {
        Ok(self.web_base.join(path.trim_start_matches('/'))?)
    }
}
