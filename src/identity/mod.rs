//! Identity resolution: from a bearer token to a canonical `(id, username)`.
//!
//! No single endpoint answers "who am I" reliably. The bootstrap aggregate embeds
//! a user record that may be stale or incomplete, while the authoritative profile
//! endpoint needs a username to query. The resolver combines them:
//!
//! 1. If a username is cached, fetch the profile directly.
//! 2. Otherwise read `data.auth.user` from the bootstrap endpoint.
//! 3. If step 2 produced a username and step 1 never ran, fetch the profile with
//!    it; the profile record wins over the bootstrap one.
//!
//! A second resolution skips the bootstrap call because step 2 cached the
//! username, so repeated calls are strictly cheaper.
//!
//! If nothing yields a username, [`ApiError::IdentityUnresolved`] is returned and
//! the caller shows an [`Identity::placeholder`] until the next opportunity to
//! resolve.

pub mod probe;

use crate::client::config::Endpoints;
use crate::client::FlightController;
use crate::error::{ApiError, Result};
use crate::session::SessionState;
use crate::types::ApiRequest;
use probe::{id_and_username, BOOTSTRAP_USER_PATHS, USER_RECORD_PATHS};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// The signed-in account as far as the client knows it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Numeric user id; 0 for placeholders
    pub id: u64,
    /// Username
    pub username: String,
    /// Synthesized locally, pending real resolution
    #[serde(default)]
    pub temporary: bool,
}

impl Identity {
    /// A confirmed identity
    pub fn confirmed(id: u64, username: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
            temporary: false,
        }
    }

    /// A local stand-in built from what the user typed.
    ///
    /// For an email the local part becomes the username.
    pub fn placeholder(hint: &str) -> Self {
        let hint = hint.trim();
        let username = hint.split('@').next().unwrap_or(hint);
        Self {
            id: 0,
            username: username.to_string(),
            temporary: true,
        }
    }
}

/// Runs the resolution cascade and writes results back into the session.
#[derive(Clone)]
pub struct IdentityResolver {
    flight: FlightController,
    session: Arc<SessionState>,
    endpoints: Arc<Endpoints>,
}

impl IdentityResolver {
    /// Create a resolver over a flight controller and session
    pub fn new(
        flight: FlightController,
        session: Arc<SessionState>,
        endpoints: Arc<Endpoints>,
    ) -> Self {
        Self {
            flight,
            session,
            endpoints,
        }
    }

    /// Resolve the canonical identity for the current token.
    ///
    /// The result is written into the session only when the session generation
    /// is unchanged since the call started.
    pub async fn resolve(&self) -> Result<Identity> {
        let generation = self.session.generation();
        let token = self.session.token().ok_or(ApiError::NotAuthenticated)?;

        let mut resolved = None;
        let mut profile_attempted = false;

        if let Some(username) = self.session.username() {
            profile_attempted = true;
            resolved = self.profile_identity(&username, &token).await;
        }

        if resolved.is_none() {
            if let Some(boot) = self.bootstrap_identity(&token).await {
                resolved = if profile_attempted {
                    Some(boot)
                } else {
                    match self.profile_identity(&boot.username, &token).await {
                        Some(profile) => Some(profile),
                        None => Some(boot),
                    }
                };
            }
        }

        let identity = resolved.ok_or(ApiError::IdentityUnresolved)?;
        if self
            .session
            .set_identity_if(generation, identity.id, &identity.username)
        {
            tracing::info!(id = identity.id, username = %identity.username, "identity resolved");
        } else {
            tracing::debug!("session changed during identity resolution; result not stored");
        }
        Ok(identity)
    }

    /// Identity to present for a candidate, protecting the canonical one.
    ///
    /// A temporary candidate never replaces an already-confirmed identity whose id
    /// differs; the confirmed one is returned instead. Confirmed candidates are
    /// written to the session when `generation`, read before the candidate was
    /// fetched, is still current, and returned as-is either way.
    pub fn reconcile(&self, generation: u64, candidate: Identity) -> Identity {
        if candidate.temporary {
            if let (Some(id), Some(username)) = (self.session.user_id(), self.session.username())
            {
                if id != candidate.id {
                    return Identity::confirmed(id, username);
                }
            }
            return candidate;
        }
        if !self
            .session
            .set_identity_if(generation, candidate.id, &candidate.username)
        {
            tracing::debug!("session changed since the candidate was fetched; not stored");
        }
        candidate
    }

    /// Identity from the session cache, when both fields are known
    pub fn cached(&self) -> Option<Identity> {
        match (self.session.user_id(), self.session.username()) {
            (Some(id), Some(username)) => Some(Identity::confirmed(id, username)),
            _ => None,
        }
    }

    async fn profile_identity(&self, username: &str, token: &str) -> Option<Identity> {
        let call = ApiRequest::get(self.endpoints.profile.as_str())
            .with_param(self.endpoints.profile_param.as_str(), username);
        match self.flight.request(call, Some(token.to_string())).await {
            Ok(response) => {
                let body = response.into_json();
                let found = probe::probe(&body, USER_RECORD_PATHS, id_and_username);
                if found.is_none() {
                    tracing::debug!(username, "profile response carried no identity");
                }
                found.map(|(id, name)| Identity::confirmed(id, name))
            }
            Err(e) => {
                tracing::warn!(username, error = %e, "profile probe failed");
                None
            }
        }
    }

    async fn bootstrap_identity(&self, token: &str) -> Option<Identity> {
        let call = ApiRequest::get(self.endpoints.bootstrap.as_str());
        match self.flight.request(call, Some(token.to_string())).await {
            Ok(response) => {
                let body = response.into_json();
                probe::probe(&body, BOOTSTRAP_USER_PATHS, id_and_username)
                    .map(|(id, name)| Identity::confirmed(id, name))
            }
            Err(e) => {
                tracing::warn!(error = %e, "bootstrap probe failed");
                None
            }
        }
    }
}
