//! Session state and caller-supplied persistence.
//!
//! [`SessionState`] holds the bearer token and the resolved identity (numeric id
//! and username) in memory. It is owned by one client instance, so several
//! authenticated clients can coexist in one process without cross-talk.
//!
//! # Generations
//!
//! Every change of credentials (`set_token` with a different value, `clear`,
//! `restore`) bumps a generation counter. Components that learn identity in the
//! background capture the generation before they start and write back through
//! [`SessionState::set_identity_if`], which refuses the write when the generation
//! moved on. A session cleared by logout therefore stays cleared: no in-flight
//! resolution can resurrect stale identity into it.
//!
//! # Persistence
//!
//! The client itself is stateless across restarts. The embedding application
//! supplies a [`SessionStore`] and the client saves a [`SessionSnapshot`] after
//! every session transition.

use crate::error::Result;
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

/// Persistable view of the session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// Bearer token
    #[serde(default)]
    pub token: Option<String>,
    /// Resolved numeric user id
    #[serde(default)]
    pub user_id: Option<u64>,
    /// Resolved username
    #[serde(default)]
    pub username: Option<String>,
    /// Token of a form-automation flow awaiting the emailed link
    #[serde(default)]
    pub pending_verification_token: Option<String>,
}

#[derive(Debug, Default)]
struct SessionInner {
    snapshot: SessionSnapshot,
    generation: u64,
}

/// In-memory session fields, guarded for concurrent readers.
#[derive(Debug, Default)]
pub struct SessionState {
    inner: RwLock<SessionInner>,
}

impl SessionState {
    /// Create an empty session
    pub fn new() -> Self {
        Self::default()
    }

    /// Current bearer token
    pub fn token(&self) -> Option<String> {
        self.inner.read().snapshot.token.clone()
    }

    /// Set or clear the bearer token. A changed token starts a new generation.
    pub fn set_token(&self, token: Option<String>) {
        let mut inner = self.inner.write();
        if inner.snapshot.token != token {
            inner.snapshot.token = token;
            inner.generation += 1;
        }
    }

    /// Resolved numeric user id
    pub fn user_id(&self) -> Option<u64> {
        self.inner.read().snapshot.user_id
    }

    /// Set or clear the user id
    pub fn set_user_id(&self, user_id: Option<u64>) {
        self.inner.write().snapshot.user_id = user_id;
    }

    /// Resolved username
    pub fn username(&self) -> Option<String> {
        self.inner.read().snapshot.username.clone()
    }

    /// Set or clear the username
    pub fn set_username(&self, username: Option<String>) {
        self.inner.write().snapshot.username = username;
    }

    /// Pending form-automation token
    pub fn pending_verification_token(&self) -> Option<String> {
        self.inner.read().snapshot.pending_verification_token.clone()
    }

    /// Set or clear the pending form-automation token
    pub fn set_pending_verification_token(&self, token: Option<String>) {
        self.inner.write().snapshot.pending_verification_token = token;
    }

    /// Generation counter, see the module docs
    pub fn generation(&self) -> u64 {
        self.inner.read().generation
    }

    /// Write id and username together, only if no credential change happened
    /// since `generation` was read. Returns whether the write was applied.
    pub fn set_identity_if(&self, generation: u64, user_id: u64, username: &str) -> bool {
        let mut inner = self.inner.write();
        if inner.generation != generation || inner.snapshot.token.is_none() {
            return false;
        }
        inner.snapshot.user_id = Some(user_id);
        inner.snapshot.username = Some(username.to_string());
        true
    }

    /// Clear like [`SessionState::clear`], but only while `token` is still the
    /// current one. Returns whether the session was cleared.
    pub fn clear_if_token(&self, token: &str) -> bool {
        let mut inner = self.inner.write();
        if inner.snapshot.token.as_deref() != Some(token) {
            return false;
        }
        inner.snapshot.token = None;
        inner.snapshot.user_id = None;
        inner.snapshot.username = None;
        inner.generation += 1;
        true
    }

    /// Copy of all fields
    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner.read().snapshot.clone()
    }

    /// Replace all fields from a persisted snapshot
    pub fn restore(&self, snapshot: SessionSnapshot) {
        let mut inner = self.inner.write();
        inner.snapshot = snapshot;
        inner.generation += 1;
    }

    /// Drop token and identity. The pending verification token survives, since
    /// it belongs to a signed-out flow.
    pub fn clear(&self) {
        let mut inner = self.inner.write();
        inner.snapshot.token = None;
        inner.snapshot.user_id = None;
        inner.snapshot.username = None;
        inner.generation += 1;
    }
}

/// External persistence for [`SessionSnapshot`], implemented by the embedder.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Load the last saved snapshot, if any
    async fn load(&self) -> Result<Option<SessionSnapshot>>;

    /// Save the snapshot, replacing the previous one
    async fn save(&self, snapshot: &SessionSnapshot) -> Result<()>;
}

/// Process-local store, handy for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    slot: Mutex<Option<SessionSnapshot>>,
}

impl MemorySessionStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store preloaded with a snapshot
    pub fn with_snapshot(snapshot: SessionSnapshot) -> Self {
        Self {
            slot: Mutex::new(Some(snapshot)),
        }
    }

    /// Last saved snapshot
    pub fn current(&self) -> Option<SessionSnapshot> {
        self.slot.lock().clone()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self) -> Result<Option<SessionSnapshot>> {
        Ok(self.slot.lock().clone())
    }

    async fn save(&self, snapshot: &SessionSnapshot) -> Result<()> {
        *self.slot.lock() = Some(snapshot.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_empty() {
        let session = SessionState::new();
        assert!(session.token().is_none());
        assert!(session.user_id().is_none());
        assert!(session.username().is_none());
    }

    #[test]
    fn test_fields_set_independently() {
        let session = SessionState::new();
        session.set_token(Some("t".into()));
        session.set_username(Some("alice".into()));
        assert_eq!(session.username().as_deref(), Some("alice"));
        assert!(session.user_id().is_none());

        session.set_username(None);
        assert!(session.username().is_none());
        assert_eq!(session.token().as_deref(), Some("t"));
    }

    #[test]
    fn test_identity_write_rejected_after_clear() {
        let session = SessionState::new();
        session.set_token(Some("t".into()));
        let generation = session.generation();

        session.clear();
        assert!(!session.set_identity_if(generation, 7, "alice"));
        assert!(session.user_id().is_none());
        assert!(session.username().is_none());
    }

    #[test]
    fn test_identity_write_rejected_after_token_change() {
        let session = SessionState::new();
        session.set_token(Some("old".into()));
        let generation = session.generation();

        session.set_token(Some("new".into()));
        assert!(!session.set_identity_if(generation, 7, "alice"));

        let generation = session.generation();
        assert!(session.set_identity_if(generation, 7, "alice"));
        assert_eq!(session.user_id(), Some(7));
    }

    #[test]
    fn test_same_token_keeps_generation() {
        let session = SessionState::new();
        session.set_token(Some("t".into()));
        let generation = session.generation();
        session.set_token(Some("t".into()));
        assert_eq!(session.generation(), generation);
    }

    #[test]
    fn test_clear_keeps_pending_verification() {
        let session = SessionState::new();
        session.set_token(Some("t".into()));
        session.set_pending_verification_token(Some("ABC".into()));
        session.clear();
        assert!(session.token().is_none());
        assert_eq!(session.pending_verification_token().as_deref(), Some("ABC"));
    }

    #[test]
    fn test_clear_if_token_ignores_superseded_token() {
        let session = SessionState::new();
        session.set_token(Some("new".into()));
        session.set_username(Some("alice".into()));
        let generation = session.generation();

        assert!(!session.clear_if_token("old"));
        assert_eq!(session.token().as_deref(), Some("new"));
        assert_eq!(session.generation(), generation);

        assert!(session.clear_if_token("new"));
        assert!(session.token().is_none());
        assert!(session.username().is_none());
        assert!(!session.clear_if_token("new"));
    }

    #[test]
    fn test_snapshot_serde_tolerates_missing_fields() {
        let snapshot: SessionSnapshot = serde_json::from_str(r#"{"token":"t"}"#).unwrap();
        assert_eq!(snapshot.token.as_deref(), Some("t"));
        assert!(snapshot.pending_verification_token.is_none());
    }

    #[tokio::test]
    async fn test_memory_store_roundtrip() {
        let store = MemorySessionStore::new();
        assert!(store.load().await.unwrap().is_none());

        let snapshot = SessionSnapshot {
            token: Some("t".into()),
            user_id: Some(3),
            username: Some("bob".into()),
            pending_verification_token: None,
        };
        store.save(&snapshot).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(snapshot));
    }
}
