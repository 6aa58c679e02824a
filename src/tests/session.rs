use super::*;
use crate::{ApiError, MemorySessionStore, Params, SessionStore};
use parking_lot::Mutex;
use std::sync::Arc;

fn record_unauthorized(client: &ApiClient) -> Arc<Mutex<Vec<String>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    client.on_unauthorized(move |event| sink.lock().push(event.endpoint.clone()));
    seen
}

#[tokio::test]
async fn test_unauthorized_feed_clears_session() {
    let mut server = mockito::Server::new_async().await;
    let _feed = server
        .mock("GET", "/api/feed")
        .with_status(401)
        .with_header("content-type", "application/json")
        .with_body(r#"{"message":"Unauthenticated."}"#)
        .create_async()
        .await;

    let client = signed_in(&server, 7, "jane");
    let seen = record_unauthorized(&client);

    let err = client.get("feed", Params::new()).await.unwrap_err();
    assert!(err.is_unauthorized());
    assert_eq!(err.to_string(), "Unauthenticated.");

    let session = client.session();
    assert_eq!(session.token, None);
    assert_eq!(session.user_id, None);
    assert_eq!(session.username, None);
    assert_eq!(*seen.lock(), vec!["feed".to_string()]);

    // Subsequent calls fail before touching the network.
    assert!(matches!(
        client.get("feed", Params::new()).await,
        Err(ApiError::NotAuthenticated)
    ));
}

#[tokio::test]
async fn test_unauthorized_profile_probe_keeps_session() {
    let mut server = mockito::Server::new_async().await;
    let _profile = server
        .mock("GET", "/api/profile")
        .match_query(mockito::Matcher::Any)
        .with_status(401)
        .create_async()
        .await;

    let client = signed_in(&server, 7, "jane");
    let seen = record_unauthorized(&client);

    let err = client.user_profile("bob").await.unwrap_err();
    assert_eq!(err.status(), Some(401));

    let session = client.session();
    assert_eq!(session.token.as_deref(), Some("T1"));
    assert_eq!(session.user_id, Some(7));
    assert!(seen.lock().is_empty());
}

#[tokio::test]
async fn test_stale_unauthorized_keeps_newer_session() {
    let mut server = mockito::Server::new_async().await;
    let client = signed_in(&server, 7, "jane");
    let seen = record_unauthorized(&client);

    // The user signs in again while the call made under T1 is on the wire.
    let session = Arc::clone(client.session_state());
    let _feed = server
        .mock("GET", "/api/feed")
        .match_header("authorization", "Bearer T1")
        .with_status(401)
        .with_body_from_request(move |_| {
            session.set_token(Some("T2".into()));
            br#"{"message":"Unauthenticated."}"#.to_vec()
        })
        .create_async()
        .await;

    let err = client.get("feed", Params::new()).await.unwrap_err();
    assert!(err.is_unauthorized());

    assert_eq!(client.session().token.as_deref(), Some("T2"));
    assert!(seen.lock().is_empty());
}

#[tokio::test]
async fn test_rejected_login_keeps_existing_session() {
    let mut server = mockito::Server::new_async().await;
    let _login = server
        .mock("POST", "/api/login")
        .with_status(401)
        .with_header("content-type", "application/json")
        .with_body(r#"{"message":"Invalid credentials."}"#)
        .create_async()
        .await;

    let client = signed_in(&server, 7, "jane");
    let seen = record_unauthorized(&client);
    let before = client.session();

    let err = client.login("other@example.com", "pw").await.unwrap_err();
    assert!(err.is_unauthorized());
    assert_eq!(client.session(), before);
    assert!(seen.lock().is_empty());
}

#[tokio::test]
async fn test_logout_during_resolution_stays_logged_out() {
    let mut server = mockito::Server::new_async().await;
    let client = token_only(&server);

    // The session is cleared while the bootstrap call is on the wire.
    let session = Arc::clone(client.session_state());
    let _bootstrap = server
        .mock("GET", "/api/bootstrap")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body_from_request(move |_| {
            session.clear();
            br#"{"data":{"auth":{"user":{"id":7,"username":"jane"}}}}"#.to_vec()
        })
        .create_async()
        .await;
    let _profile = server
        .mock("GET", "/api/profile")
        .match_query(mockito::Matcher::Any)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"id":7,"username":"jane"}"#)
        .create_async()
        .await;

    let resolved = client.resolve_identity().await.unwrap();
    assert_eq!(resolved.username, "jane");

    let after = client.session();
    assert_eq!(after.token, None);
    assert_eq!(after.user_id, None);
    assert_eq!(after.username, None);
    assert!(!client.is_authenticated());
}

#[tokio::test]
async fn test_logout_clears_and_persists() {
    let mut server = mockito::Server::new_async().await;
    let logout = server
        .mock("POST", "/api/logout")
        .match_header("authorization", "Bearer T1")
        .with_status(204)
        .expect(1)
        .create_async()
        .await;

    let store = Arc::new(MemorySessionStore::new());
    let client = signed_in(&server, 7, "jane").with_store(store.clone());
    client
        .session_state()
        .set_pending_verification_token(Some("ABC".into()));

    client.logout().await.unwrap();

    logout.assert_async().await;
    let saved = store.load().await.unwrap().expect("snapshot saved");
    assert_eq!(saved.token, None);
    assert_eq!(saved.username, None);
    assert_eq!(saved.pending_verification_token.as_deref(), Some("ABC"));
}

#[tokio::test]
async fn test_logout_succeeds_when_server_fails() {
    let mut server = mockito::Server::new_async().await;
    let _logout = server
        .mock("POST", "/api/logout")
        .with_status(500)
        .create_async()
        .await;

    let client = signed_in(&server, 7, "jane");
    client.logout().await.unwrap();
    assert_eq!(client.session().token, None);
}

#[tokio::test]
async fn test_clients_do_not_share_sessions() {
    let server = mockito::Server::new_async().await;
    let a = signed_in(&server, 7, "jane");
    let b = client_for(&server);

    assert!(a.is_authenticated());
    assert!(!b.is_authenticated());
    a.session_state().clear();
    assert_eq!(b.session().token, None);
}
