//! Single-call HTTP transport.
//!
//! `Transport` owns the `reqwest::Client` (and its cookie jar) and performs exactly
//! one HTTP exchange per call. It holds no state beyond configuration and the
//! registered unauthorized hook; pacing, retry and coalescing live one layer up in
//! [`FlightController`](crate::client::FlightController).
//!
//! # Response classification
//!
//! | Response | Result |
//! |----------|--------|
//! | 2xx, JSON content type | `ApiResponse::Json` |
//! | 2xx, anything else | `ApiResponse::Text` |
//! | 429 | `ApiError::Throttled` with the `Retry-After` hint |
//! | 401 | hook invoked, then `ApiError::Api` |
//! | other non-2xx | `ApiError::Api` with the body's `message`/`error` |

use crate::client::config::ClientConfig;
use crate::error::{ApiError, Result};
use crate::protocol::{self, ACCEPT_JSON};
use crate::types::{ApiRequest, ApiResponse, RawResponse, UnauthorizedEvent};
use parking_lot::RwLock;
use reqwest::header::{ACCEPT, CONTENT_TYPE, RETRY_AFTER};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Callback invoked with every 401 response.
pub type UnauthorizedHook = Arc<dyn Fn(&UnauthorizedEvent) + Send + Sync>;

/// One-shot HTTP executor bound to a base URL.
#[derive(Clone)]
pub struct Transport {
    client: reqwest::Client,
    base_url: Url,
    unauthorized: Arc<RwLock<Option<UnauthorizedHook>>>,
}

impl Transport {
    /// Build a transport from configuration.
    ///
    /// Fails with [`ApiError::Config`] when the base URL or proxy is invalid.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(config.max_idle_connections as usize)
            .cookie_store(true);

        if !config.proxy_url.is_empty() {
            let proxy = reqwest::Proxy::all(&config.proxy_url)
                .map_err(|e| ApiError::Config(format!("invalid proxy: {}", e)))?;
            builder = builder.proxy(proxy);
        }

        let client = builder
            .build()
            .map_err(|e| ApiError::Config(format!("http client: {}", e)))?;

        Ok(Self {
            client,
            base_url: normalize_base(&config.base_url)?,
            unauthorized: Arc::new(RwLock::new(None)),
        })
    }

    /// Base URL every relative endpoint is joined to
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Register the callback invoked on 401 responses, replacing any previous one.
    pub fn set_unauthorized_hook(&self, hook: UnauthorizedHook) {
        *self.unauthorized.write() = Some(hook);
    }

    /// Resolve an endpoint and its parameters to the full request URL.
    ///
    /// Absolute endpoints (`https://...`) are used as-is.
    pub fn resolve_url(&self, call: &ApiRequest) -> Result<Url> {
        let mut url = self.base_url.join(call.endpoint.trim_start_matches('/'))?;
        call.params.apply_to(&mut url);
        Ok(url)
    }

    /// Perform one call and classify the response.
    pub async fn execute(&self, call: &ApiRequest, token: Option<&str>) -> Result<ApiResponse> {
        let token = token.filter(|_| !call.unauthenticated);
        let response = self.send(call, token).await?;
        let status = response.status();

        if status.is_success() {
            let is_json = response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(protocol::is_json_content_type)
                .unwrap_or(false);
            let text = response.text().await?;
            if !is_json {
                return Ok(ApiResponse::Text(text));
            }
            if text.trim().is_empty() {
                return Ok(ApiResponse::Json(Value::Null));
            }
            return Ok(ApiResponse::Json(serde_json::from_str(&text)?));
        }

        let retry_after = retry_after_hint(&response);
        // Read the whole body first so the error message can come from it.
        let body = response.text().await.unwrap_or_default();
        Err(self.classify_failure(&call.endpoint, token, status.as_u16(), retry_after, body))
    }

    /// Perform one call without status classification.
    ///
    /// Only 429 is still turned into [`ApiError::Throttled`] so the caller's
    /// rate-limit handling keeps working; every other status is returned as-is.
    pub async fn execute_raw(&self, call: &ApiRequest) -> Result<RawResponse> {
        let response = self.send(call, None).await?;
        let status = response.status().as_u16();
        if status == 429 {
            return Err(ApiError::Throttled {
                retry_after: retry_after_hint(&response),
            });
        }
        let body = response.text().await?;
        Ok(RawResponse { status, body })
    }

    async fn send(&self, call: &ApiRequest, token: Option<&str>) -> Result<reqwest::Response> {
        let url = self.resolve_url(call)?;
        let mut req_builder = self.client.request(call.method.clone(), url);

        if !call.has_header(ACCEPT.as_str()) {
            req_builder = req_builder.header(ACCEPT, ACCEPT_JSON);
        }
        if let (Some(token), false) = (token, call.unauthenticated) {
            req_builder = req_builder.bearer_auth(token);
        }
        for (k, v) in &call.headers {
            req_builder = req_builder.header(k.as_str(), v.as_str());
        }
        if let Some(body) = &call.body {
            req_builder = req_builder.json(body);
        }

        tracing::debug!(method = %call.method, endpoint = %call.endpoint, "dispatching request");
        Ok(req_builder.send().await?)
    }

    fn classify_failure(
        &self,
        endpoint: &str,
        token: Option<&str>,
        status: u16,
        retry_after: Option<Duration>,
        body: String,
    ) -> ApiError {
        if status == 429 {
            return ApiError::Throttled { retry_after };
        }

        let message = error_message(status, &body);
        if status == 401 {
            self.notify_unauthorized(UnauthorizedEvent {
                endpoint: endpoint.to_string(),
                status,
                token: token.map(str::to_string),
                body,
            });
        }
        ApiError::Api { status, message }
    }

    fn notify_unauthorized(&self, event: UnauthorizedEvent) {
        tracing::warn!(endpoint = %event.endpoint, "unauthorized response");
        let hook = self.unauthorized.read().clone();
        if let Some(hook) = hook {
            hook(&event);
        }
    }
}

/// Extract a human-readable message from an error body.
///
/// Prefers a JSON `message` field, then `error`, then a generic `API error: <status>`.
pub fn error_message(status: u16, body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| {
            ["message", "error"].iter().find_map(|key| {
                value
                    .get(*key)
                    .and_then(Value::as_str)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
            })
        })
        .unwrap_or_else(|| format!("API error: {}", status))
}

fn retry_after_hint(response: &reqwest::Response) -> Option<Duration> {
    response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(protocol::parse_retry_after)
}

fn normalize_base(base: &str) -> Result<Url> {
    if base.ends_with('/') {
        Ok(Url::parse(base)?)
    } else {
        Ok(Url::parse(&format!("{}/", base))?)
    }
}
