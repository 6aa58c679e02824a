use super::*;
use crate::{ApiError, Identity, MemorySessionStore, SessionStore};
use mockito::{Matcher, Mock};
use std::sync::Arc;

const BOOTSTRAP_BODY: &str = r#"{"data":{"auth":{"user":{"id":"7","username":"jane"}},"feed":[]}}"#;
const PROFILE_BODY: &str = r#"{"data":{"id":7,"username":"jane","name":"Jane Doe","followers_count":3}}"#;

async fn mock_login(server: &mut mockito::ServerGuard, body: &str, content_type: &str) -> Mock {
    server
        .mock("POST", "/api/login")
        .match_body(Matcher::PartialJson(serde_json::json!({
            "email": "jane@example.com",
            "password": "pw"
        })))
        .with_status(200)
        .with_header("content-type", content_type)
        .with_body(body)
        .expect(1)
        .create_async()
        .await
}

async fn mock_bootstrap(server: &mut mockito::ServerGuard, status: usize, hits: usize) -> Mock {
    server
        .mock("GET", "/api/bootstrap")
        .with_status(status)
        .with_header("content-type", "application/json")
        .with_body(BOOTSTRAP_BODY)
        .expect(hits)
        .create_async()
        .await
}

async fn mock_profile(server: &mut mockito::ServerGuard, status: usize, hits: usize) -> Mock {
    server
        .mock("GET", "/api/profile")
        .match_query(Matcher::UrlEncoded("id".into(), "jane".into()))
        .with_status(status)
        .with_header("content-type", "application/json")
        .with_body(PROFILE_BODY)
        .expect(hits)
        .create_async()
        .await
}

#[tokio::test]
async fn test_second_resolution_skips_bootstrap() {
    let mut server = mockito::Server::new_async().await;
    let login = mock_login(&mut server, r#"{"token":"T1"}"#, "application/json").await;
    let bootstrap = mock_bootstrap(&mut server, 200, 1).await;
    let profile = mock_profile(&mut server, 200, 2).await;

    let client = client_for(&server);
    let first = client.login("jane@example.com", "pw").await.unwrap();
    assert_eq!(first, Identity::confirmed(7, "jane"));
    assert!(client.is_authenticated());

    tokio::time::sleep(PAST_LINGER).await;
    let second = client.resolve_identity().await.unwrap();
    assert_eq!(second, first);

    login.assert_async().await;
    bootstrap.assert_async().await;
    profile.assert_async().await;

    let session = client.session();
    assert_eq!(session.token.as_deref(), Some("T1"));
    assert_eq!(session.user_id, Some(7));
    assert_eq!(session.username.as_deref(), Some("jane"));
}

#[tokio::test]
async fn test_bootstrap_record_used_when_profile_fails() {
    let mut server = mockito::Server::new_async().await;
    let _login = mock_login(&mut server, r#"{"token":"T1"}"#, "application/json").await;
    let _bootstrap = mock_bootstrap(&mut server, 200, 1).await;
    let _profile = mock_profile(&mut server, 404, 1).await;

    let client = client_for(&server);
    let identity = client.login("jane@example.com", "pw").await.unwrap();

    assert_eq!(identity, Identity::confirmed(7, "jane"));
    assert_eq!(client.session().user_id, Some(7));
}

#[tokio::test]
async fn test_login_accepts_plain_text_token() {
    let mut server = mockito::Server::new_async().await;
    let _login = mock_login(&mut server, "\"T2\"\n", "text/plain").await;
    let _bootstrap = mock_bootstrap(&mut server, 200, 1).await;
    let _profile = mock_profile(&mut server, 200, 1).await;

    let client = client_for(&server);
    client.login("jane@example.com", "pw").await.unwrap();

    assert_eq!(client.session().token.as_deref(), Some("T2"));
}

#[tokio::test]
async fn test_unresolved_login_yields_placeholder() {
    let mut server = mockito::Server::new_async().await;
    let _login = mock_login(&mut server, r#"{"token":"T1"}"#, "application/json").await;
    let _bootstrap = mock_bootstrap(&mut server, 500, 1).await;

    let client = client_for(&server);
    let identity = client.login("jane@example.com", "pw").await.unwrap();

    assert!(identity.temporary);
    assert_eq!(identity.username, "jane");
    assert_eq!(identity.id, 0);

    let session = client.session();
    assert_eq!(session.token.as_deref(), Some("T1"));
    assert_eq!(session.user_id, None);
    assert_eq!(session.username, None);
    assert!(!client.is_authenticated());
}

#[tokio::test]
async fn test_rejected_login_keeps_session_empty() {
    let mut server = mockito::Server::new_async().await;
    let _login = server
        .mock("POST", "/api/login")
        .with_status(422)
        .with_header("content-type", "application/json")
        .with_body(r#"{"message":"These credentials do not match our records."}"#)
        .create_async()
        .await;

    let client = client_for(&server);
    match client.login("jane@example.com", "pw").await {
        Err(ApiError::Api { status, message }) => {
            assert_eq!(status, 422);
            assert_eq!(message, "These credentials do not match our records.");
        }
        other => panic!("unexpected: {:?}", other),
    }
    assert_eq!(client.session().token, None);
}

#[tokio::test]
async fn test_resolve_without_token() {
    let server = mockito::Server::new_async().await;
    let client = client_for(&server);
    assert!(matches!(
        client.resolve_identity().await,
        Err(ApiError::NotAuthenticated)
    ));
}

#[tokio::test]
async fn test_user_profile_normalizes_wrapped_record() {
    let mut server = mockito::Server::new_async().await;
    let _profile = server
        .mock("GET", "/api/profile")
        .match_query(Matcher::UrlEncoded("id".into(), "bob".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"user":{"id":"12","username":"bob","bio":"hi","posts_count":4}}"#)
        .create_async()
        .await;

    let client = signed_in(&server, 7, "jane");
    let profile = client.user_profile("bob").await.unwrap();

    assert_eq!(profile.id, 12);
    assert_eq!(profile.username, "bob");
    assert_eq!(profile.bio.as_deref(), Some("hi"));
    assert_eq!(profile.posts_count, 4);
    assert_eq!(client.session().user_id, Some(7));
}

#[tokio::test]
async fn test_login_persists_and_restores() {
    let mut server = mockito::Server::new_async().await;
    let _login = mock_login(&mut server, r#"{"token":"T1"}"#, "application/json").await;
    let _bootstrap = mock_bootstrap(&mut server, 200, 1).await;
    let _profile = mock_profile(&mut server, 200, 1).await;

    let store = Arc::new(MemorySessionStore::new());
    let client = client_for(&server).with_store(store.clone());
    client.login("jane@example.com", "pw").await.unwrap();

    let saved = store.load().await.unwrap().expect("snapshot saved");
    assert_eq!(saved.token.as_deref(), Some("T1"));
    assert_eq!(saved.username.as_deref(), Some("jane"));

    let restarted = client_for(&server).with_store(store);
    assert!(restarted.restore_session().await.unwrap());
    assert!(restarted.is_authenticated());
    assert_eq!(
        restarted.current_identity().await.unwrap(),
        Identity::confirmed(7, "jane")
    );
}

#[tokio::test]
async fn test_user_profile_does_not_rewrite_identity_after_relogin() {
    let mut server = mockito::Server::new_async().await;
    let client = signed_in(&server, 7, "jane");

    // A new token arrives while the profile fetch under T1 is on the wire.
    let session = Arc::clone(client.session_state());
    let _profile = server
        .mock("GET", "/api/profile")
        .match_query(Matcher::UrlEncoded("id".into(), "jane".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body_from_request(move |_| {
            session.set_token(Some("T2".into()));
            br#"{"id":8,"username":"jane"}"#.to_vec()
        })
        .create_async()
        .await;

    let profile = client.user_profile("jane").await.unwrap();

    assert_eq!(profile.id, 8);
    let after = client.session();
    assert_eq!(after.token.as_deref(), Some("T2"));
    assert_eq!(after.user_id, Some(7));
}
