//! The client façade every screen talks to.
//!
//! `ApiClient` owns one of each component and wires them together:
//!
//! - the [`Transport`] and its cookie jar
//! - the [`FlightController`] shared by every call
//! - the [`SessionState`] and optional [`SessionStore`]
//! - the [`IdentityResolver`] and the [`FormBridge`]
//!
//! Typed methods route through the flight controller and update the session as
//! a side effect, so later calls get cheaper.
//!
//! # Unauthorized policy
//!
//! The façade installs the transport's 401 hook. A 401 clears the session and
//! is forwarded to the handler registered with [`ApiClient::on_unauthorized`],
//! which is the place to persist the teardown and route to the login screen.
//! The hook does nothing when:
//!
//! - the 401 came from a profile probe
//! - the call was sent without a token
//! - the call was sent with a token the session no longer holds
//!
//! Form-automation page loads bypass the hook entirely.
//!
//! # Examples
//!
//! ```ignore
//! use social_api::{ApiClient, ClientConfig, MemorySessionStore};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = ApiClient::new(ClientConfig::default())?
//!         .with_store(Arc::new(MemorySessionStore::new()));
//!
//!     let me = client.login("jane@example.com", "hunter2").await?;
//!     println!("signed in as {} ({})", me.username, me.id);
//!
//!     let feed = client.get("feed", Default::default()).await?;
//!     println!("{}", feed);
//!     Ok(())
//! }
//! ```

use crate::client::config::{ClientConfig, Endpoints};
use crate::client::transport::{Transport, UnauthorizedHook};
use crate::client::FlightController;
use crate::error::{ApiError, Result};
use crate::forms::{FormBridge, FormOutcome};
use crate::identity::probe::{self, as_id, id_and_username, USER_RECORD_PATHS};
use crate::identity::{Identity, IdentityResolver};
use crate::protocol::{strip_quotes, Params};
use crate::session::{SessionSnapshot, SessionState, SessionStore};
use crate::types::{ApiRequest, ApiResponse, UnauthorizedEvent, UserProfile};
use parking_lot::RwLock;
use serde_json::{json, Value};
use std::sync::Arc;

/// Where login and registration responses may carry the bearer token.
const TOKEN_PATHS: &[&str] = &["token", "access_token", "data.token", "data.access_token"];

/// Network access layer façade. Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct ApiClient {
    config: Arc<ClientConfig>,
    flight: FlightController,
    session: Arc<SessionState>,
    resolver: IdentityResolver,
    bridge: FormBridge,
    store: Option<Arc<dyn SessionStore>>,
    handler: Arc<RwLock<Option<UnauthorizedHook>>>,
}

impl ApiClient {
    /// Build a client with an empty session.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let transport = Transport::new(&config)?;
        let flight = FlightController::new(transport.clone(), &config);
        let session = Arc::new(SessionState::new());
        let endpoints = Arc::new(config.endpoints.clone());
        let resolver = IdentityResolver::new(flight.clone(), session.clone(), endpoints.clone());
        let bridge = FormBridge::new(flight.clone(), &config)?;
        let handler = Arc::new(RwLock::new(None));

        transport.set_unauthorized_hook(teardown_hook(
            session.clone(),
            endpoints,
            Arc::clone(&handler),
        ));

        Ok(Self {
            config: Arc::new(config),
            flight,
            session,
            resolver,
            bridge,
            store: None,
            handler,
        })
    }

    /// Attach persistence; snapshots are saved after every session transition.
    pub fn with_store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Register the embedder's 401 handler, replacing any previous one.
    pub fn on_unauthorized<F>(&self, handler: F)
    where
        F: Fn(&UnauthorizedEvent) + Send + Sync + 'static,
    {
        *self.handler.write() = Some(Arc::new(handler));
    }

    /// Client configuration
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Flight controller shared by every call
    pub fn flight(&self) -> &FlightController {
        &self.flight
    }

    /// Live session state
    pub fn session_state(&self) -> &Arc<SessionState> {
        &self.session
    }

    /// Copy of the session fields
    pub fn session(&self) -> SessionSnapshot {
        self.session.snapshot()
    }

    /// Token present and at least one identity field resolved.
    pub fn is_authenticated(&self) -> bool {
        self.session.token().is_some()
            && (self.session.user_id().is_some() || self.session.username().is_some())
    }

    /// Load the last persisted session. Returns whether one was found.
    pub async fn restore_session(&self) -> Result<bool> {
        let Some(store) = &self.store else {
            return Ok(false);
        };
        match store.load().await? {
            Some(snapshot) => {
                tracing::info!(
                    has_token = snapshot.token.is_some(),
                    "session restored from store"
                );
                self.session.restore(snapshot);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    // ========== Generic calls ==========

    /// Dispatch a prepared request with the session token.
    ///
    /// Fails with [`ApiError::NotAuthenticated`] before dispatch when the request
    /// needs a token and there is none.
    pub async fn send(&self, call: ApiRequest) -> Result<ApiResponse> {
        let token = self.session.token();
        if !call.unauthenticated && token.is_none() {
            return Err(ApiError::NotAuthenticated);
        }
        self.flight.request(call, token).await
    }

    /// Authenticated GET
    pub async fn get(&self, endpoint: &str, params: Params) -> Result<Value> {
        Ok(self
            .send(ApiRequest::get(endpoint).with_params(params))
            .await?
            .into_json())
    }

    /// Authenticated POST with a JSON body
    pub async fn post(&self, endpoint: &str, body: Value) -> Result<Value> {
        Ok(self
            .send(ApiRequest::post(endpoint).with_body(body))
            .await?
            .into_json())
    }

    /// Authenticated PUT with a JSON body
    pub async fn put(&self, endpoint: &str, body: Value) -> Result<Value> {
        Ok(self
            .send(ApiRequest::put(endpoint).with_body(body))
            .await?
            .into_json())
    }

    /// Authenticated DELETE
    pub async fn delete(&self, endpoint: &str) -> Result<Value> {
        Ok(self.send(ApiRequest::delete(endpoint)).await?.into_json())
    }

    // ========== Session lifecycle ==========

    /// Exchange credentials for a token, then resolve who we are.
    ///
    /// When resolution fails the returned identity is a temporary placeholder
    /// derived from `email`; call [`ApiClient::resolve_identity`] again later.
    pub async fn login(&self, email: &str, password: &str) -> Result<Identity> {
        let call = ApiRequest::post(self.endpoints().login.as_str())
            .unauthenticated()
            .with_body(json!({ "email": email, "password": password }));
        let response = self.flight.request(call, None).await?;
        let token = token_from_response(response)
            .ok_or_else(|| ApiError::Decode("login response carried no token".into()))?;

        self.session.clear();
        self.session.set_token(Some(token));
        tracing::info!("logged in");

        let identity = self.identity_or_placeholder(email).await;
        self.persist().await?;
        Ok(identity)
    }

    /// Revoke the token (best effort) and clear the session.
    pub async fn logout(&self) -> Result<()> {
        if let Some(token) = self.session.token() {
            let call = ApiRequest::post(self.endpoints().logout.as_str());
            if let Err(e) = self.flight.request(call, Some(token)).await {
                tracing::debug!(error = %e, "logout request failed; clearing locally");
            }
        }
        self.session.clear();
        tracing::info!("logged out");
        self.persist().await
    }

    // ========== Identity ==========

    /// Run the identity cascade and persist the result.
    pub async fn resolve_identity(&self) -> Result<Identity> {
        let identity = self.resolver.resolve().await?;
        self.persist().await?;
        Ok(identity)
    }

    /// Cached identity, resolving it when the cache is incomplete.
    pub async fn current_identity(&self) -> Result<Identity> {
        match self.resolver.cached() {
            Some(identity) => Ok(identity),
            None => self.resolve_identity().await,
        }
    }

    /// Full profile record for `username`.
    ///
    /// Looking up one's own username also refreshes the cached identity.
    pub async fn user_profile(&self, username: &str) -> Result<UserProfile> {
        let generation = self.session.generation();
        let endpoints = self.endpoints();
        let call = ApiRequest::get(endpoints.profile.as_str())
            .with_param(endpoints.profile_param.as_str(), username);
        let body = self.send(call).await?.into_json();

        let mut record = probe::probe(&body, USER_RECORD_PATHS, |record| {
            id_and_username(record).map(|_| record.clone())
        })
        .ok_or_else(|| ApiError::Decode("profile response carried no user record".into()))?;
        if let Some(id) = record.get("id").and_then(as_id) {
            record["id"] = json!(id);
        }
        let profile: UserProfile = serde_json::from_value(record)?;

        if self.session.username().as_deref() == Some(profile.username.as_str()) {
            let confirmed = Identity::confirmed(profile.id, profile.username.clone());
            self.resolver.reconcile(generation, confirmed);
        }
        Ok(profile)
    }

    // ========== Form-automation flows ==========

    /// Ask the signup form to email a verification link.
    ///
    /// On [`FormOutcome::Success`] or [`FormOutcome::Unrecognized`] the token is
    /// kept as the pending verification token so the flow survives a restart.
    pub async fn send_verification_email(&self, email: &str) -> Result<FormOutcome> {
        let outcome = self.bridge.send_verification_email(email).await?;
        self.remember_pending(&outcome).await?;
        Ok(outcome)
    }

    /// Ask the forgot-password form to email a reset link.
    pub async fn send_password_reset_email(&self, email: &str) -> Result<FormOutcome> {
        let outcome = self.bridge.send_password_reset_email(email).await?;
        self.remember_pending(&outcome).await?;
        Ok(outcome)
    }

    /// Create the account using the token from the emailed link.
    ///
    /// A token in the response signs the new account in.
    pub async fn complete_registration(
        &self,
        flow_token: &str,
        username: &str,
        password: &str,
        name: Option<&str>,
    ) -> Result<Identity> {
        let call = ApiRequest::post(self.endpoints().register.as_str())
            .unauthenticated()
            .with_body(json!({
                "token": flow_token,
                "username": username,
                "name": name.unwrap_or(username),
                "password": password,
                "password_confirmation": password,
            }));
        let response = self.flight.request(call, None).await?;
        let token = token_from_response(response)
            .ok_or_else(|| ApiError::Decode("registration response carried no token".into()))?;

        self.session.clear();
        self.session.set_token(Some(token));
        self.session.set_pending_verification_token(None);
        tracing::info!(username, "registration completed");

        let identity = self.identity_or_placeholder(username).await;
        self.persist().await?;
        Ok(identity)
    }

    /// Set a new password using the token from the emailed link.
    pub async fn reset_password(&self, flow_token: &str, email: &str, password: &str) -> Result<()> {
        let call = ApiRequest::post(self.endpoints().reset_password.as_str())
            .unauthenticated()
            .with_body(json!({
                "token": flow_token,
                "email": email,
                "password": password,
                "password_confirmation": password,
            }));
        self.flight.request(call, None).await?;
        self.session.set_pending_verification_token(None);
        self.persist().await
    }

    // ========== Internals ==========

    fn endpoints(&self) -> &Endpoints {
        &self.config.endpoints
    }

    async fn identity_or_placeholder(&self, hint: &str) -> Identity {
        let generation = self.session.generation();
        match self.resolver.resolve().await {
            Ok(identity) => identity,
            Err(e) => {
                tracing::warn!(error = %e, "identity unresolved; using placeholder");
                self.resolver.reconcile(generation, Identity::placeholder(hint))
            }
        }
    }

    async fn remember_pending(&self, outcome: &FormOutcome) -> Result<()> {
        if let Some(token) = outcome.token() {
            self.session
                .set_pending_verification_token(Some(token.to_string()));
            self.persist().await?;
        }
        Ok(())
    }

    async fn persist(&self) -> Result<()> {
        if let Some(store) = &self.store {
            store.save(&self.session.snapshot()).await?;
        }
        Ok(())
    }
}

fn teardown_hook(
    session: Arc<SessionState>,
    endpoints: Arc<Endpoints>,
    handler: Arc<RwLock<Option<UnauthorizedHook>>>,
) -> UnauthorizedHook {
    Arc::new(move |event: &UnauthorizedEvent| {
        if endpoints.is_profile_probe(&event.endpoint) {
            tracing::debug!(endpoint = %event.endpoint, "401 from profile probe; session kept");
            return;
        }
        let Some(token) = event.token.as_deref() else {
            tracing::debug!(endpoint = %event.endpoint, "401 on unauthenticated call; session kept");
            return;
        };
        if !session.clear_if_token(token) {
            tracing::debug!(endpoint = %event.endpoint, "401 for a superseded token; session kept");
            return;
        }
        tracing::info!(endpoint = %event.endpoint, "401 received; session cleared");
        let forward = handler.read().clone();
        if let Some(forward) = forward {
            forward(event);
        }
    })
}

/// Bearer token from a login/registration response: plain text (optionally
/// quoted), a JSON string, or a JSON object with a token field.
fn token_from_response(response: ApiResponse) -> Option<String> {
    let token = match response {
        ApiResponse::Text(text) => strip_quotes(&text),
        ApiResponse::Json(Value::String(s)) => strip_quotes(&s),
        ApiResponse::Json(value) => probe::probe(&value, TOKEN_PATHS, |v| {
            v.as_str().map(strip_quotes)
        })?,
    };
    (!token.is_empty()).then_some(token)
}
