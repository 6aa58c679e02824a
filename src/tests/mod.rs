//! End-to-end tests of the client against a mock server.

mod identity;
mod session;

use crate::{ApiClient, ClientConfig, SessionSnapshot};
use mockito::ServerGuard;
use std::time::Duration;

/// Longer than the ticket linger used by [`config_for`].
pub(crate) const PAST_LINGER: Duration = Duration::from_millis(40);

pub(crate) fn config_for(server: &ServerGuard) -> ClientConfig {
    ClientConfig {
        base_url: format!("{}/api/", server.url()),
        web_base_url: format!("{}/", server.url()),
        min_spacing_ms: 0,
        rate_limit_base_delay_ms: 10,
        rate_limit_max_delay_ms: 40,
        retry_delay_ms: 10,
        decay_step_ms: 5,
        ticket_linger_ms: 5,
        ..Default::default()
    }
}

pub(crate) fn client_for(server: &ServerGuard) -> ApiClient {
    ApiClient::new(config_for(server)).expect("client builds")
}

/// A client whose session already holds a token and identity.
pub(crate) fn signed_in(server: &ServerGuard, id: u64, username: &str) -> ApiClient {
    let client = client_for(server);
    client.session_state().restore(SessionSnapshot {
        token: Some("T1".into()),
        user_id: Some(id),
        username: Some(username.into()),
        pending_verification_token: None,
    });
    client
}

pub(crate) fn token_only(server: &ServerGuard) -> ApiClient {
    let client = client_for(server);
    client.session_state().set_token(Some("T1".into()));
    client
}
