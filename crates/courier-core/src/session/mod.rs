//! Session credential storage.
//!
//! [`CredentialStore`] is the single owner of the persisted session. It is
//! constructed once at process start, shared through an `Arc`, and dropped at
//! exit. Every write is one transaction against the backend: the new state is
//! committed first and only then published to readers, so a reader always sees
//! a committed, consistent snapshot.

mod backend;
mod state;

use std::fmt;
use std::sync::{Mutex, PoisonError};

use courier_types::TokenPair;
use tokio::sync::watch;

pub use backend::{CredentialBackend, FileBackend, MemoryBackend};
pub use state::{CredentialState, redact_token};

use crate::config::paths;

/// The durable store failed; the session state on disk can no longer be trusted.
#[derive(Debug)]
pub struct PersistenceError {
    operation: &'static str,
    source: anyhow::Error,
}

impl PersistenceError {
    fn new(operation: &'static str, source: anyhow::Error) -> Self {
        Self { operation, source }
    }

    /// The store operation that failed (`open`, `save`, `clear`, ...).
    pub fn operation(&self) -> &'static str {
        self.operation
    }
}

impl fmt::Display for PersistenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Session store failed during {}", self.operation)
    }
}

impl std::error::Error for PersistenceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.source.as_ref())
    }
}

pub type PersistenceResult<T> = std::result::Result<T, PersistenceError>;

/// Process-wide home for session credentials.
pub struct CredentialStore {
    backend: Box<dyn CredentialBackend>,
    /// Serializes writers; readers never take it.
    writer: Mutex<()>,
    snapshot: watch::Sender<CredentialState>,
}

impl CredentialStore {
    /// Opens the store and blocks until the first snapshot has been read.
    ///
    /// A persisted record that claims a login without a user id or access token
    /// is discarded and the session starts logged out.
    ///
    /// # Errors
    /// Returns `PersistenceError` if the backend cannot be read.
    pub fn open(backend: impl CredentialBackend + 'static) -> PersistenceResult<Self> {
        let loaded = backend
            .load()
            .map_err(|e| PersistenceError::new("open", e))?
            .unwrap_or_default();

        let initial = if loaded.is_consistent() {
            loaded
        } else {
            tracing::warn!("Discarding persisted session that is logged in without credentials");
            CredentialState::default()
        };
        tracing::debug!(logged_in = initial.is_logged_in, "Session store opened");

        Ok(Self {
            backend: Box::new(backend),
            writer: Mutex::new(()),
            snapshot: watch::channel(initial).0,
        })
    }

    /// Opens the file-backed store under the courier home directory.
    ///
    /// # Errors
    /// Returns `PersistenceError` if the session file exists but is unreadable.
    pub fn open_default() -> PersistenceResult<Self> {
        Self::open(FileBackend::new(paths::session_path()))
    }

    /// Runs [`CredentialStore::open`] on the blocking pool.
    ///
    /// # Errors
    /// Returns `PersistenceError` if the backend cannot be read.
    pub async fn open_async(
        backend: impl CredentialBackend + 'static,
    ) -> PersistenceResult<Self> {
        tokio::task::spawn_blocking(move || Self::open(backend))
            .await
            .map_err(|e| PersistenceError::new("open", anyhow::Error::new(e)))?
    }

    /// Records a login: sets `is_logged_in` and all three fields in one transaction.
    ///
    /// # Errors
    /// Returns `PersistenceError` if the commit fails; the previous state stays visible.
    pub fn save(
        &self,
        user_id: i64,
        access_token: &str,
        refresh_token: &str,
    ) -> PersistenceResult<()> {
        self.transact("save", |state| {
            *state = CredentialState::logged_in(user_id, access_token, refresh_token);
        })
    }

    /// Replaces the access token only.
    ///
    /// # Errors
    /// Returns `PersistenceError` if the commit fails.
    pub fn update_access_token(&self, token: &str) -> PersistenceResult<()> {
        self.transact("update_access_token", |state| {
            state.access_token = Some(token.to_string());
        })
    }

    /// Replaces the refresh token only.
    ///
    /// # Errors
    /// Returns `PersistenceError` if the commit fails.
    pub fn update_refresh_token(&self, token: &str) -> PersistenceResult<()> {
        self.transact("update_refresh_token", |state| {
            state.refresh_token = Some(token.to_string());
        })
    }

    /// Stores a refreshed token pair in one transaction.
    ///
    /// The write only happens while the session that requested the refresh is
    /// still current: logged in, with `expected_refresh` as its refresh token. A
    /// refresh that races a logout or another rotation is dropped and `false`
    /// is returned. When `pair` carries no refresh token the stored one is kept.
    ///
    /// # Errors
    /// Returns `PersistenceError` if the commit fails.
    pub fn apply_refresh(
        &self,
        expected_refresh: &str,
        pair: &TokenPair,
    ) -> PersistenceResult<bool> {
        self.transact_if("apply_refresh", |state| {
            if !state.is_logged_in || state.refresh_token.as_deref() != Some(expected_refresh) {
                return false;
            }
            state.access_token = Some(pair.access_token.clone());
            if let Some(rotated) = &pair.refresh_token {
                state.refresh_token = Some(rotated.clone());
            }
            true
        })
    }

    /// Logs out: clears every field and sets `is_logged_in` to false.
    ///
    /// # Errors
    /// Returns `PersistenceError` if the commit fails.
    pub fn clear(&self) -> PersistenceResult<()> {
        self.transact("clear", |state| {
            *state = CredentialState::default();
        })
    }

    pub fn is_logged_in(&self) -> bool {
        self.snapshot.borrow().is_logged_in
    }

    pub fn user_id(&self) -> Option<i64> {
        self.snapshot.borrow().user_id
    }

    pub fn access_token(&self) -> Option<String> {
        self.snapshot.borrow().access_token.clone()
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.snapshot.borrow().refresh_token.clone()
    }

    /// The latest committed state as one value.
    ///
    /// Use this instead of several field reads when the fields must agree.
    pub fn snapshot(&self) -> CredentialState {
        self.snapshot.borrow().clone()
    }

    /// Receives every committed state from now on.
    pub fn subscribe(&self) -> watch::Receiver<CredentialState> {
        self.snapshot.subscribe()
    }

    /// Resolves with the first logged-in snapshot (immediately if already logged in).
    pub async fn wait_for_login(&self) -> CredentialState {
        let mut rx = self.snapshot.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait.
        match rx.wait_for(|state| state.is_logged_in).await {
            Ok(state) => state.clone(),
            Err(_) => self.snapshot(),
        }
    }

    fn transact(
        &self,
        operation: &'static str,
        apply: impl FnOnce(&mut CredentialState),
    ) -> PersistenceResult<()> {
        self.transact_if(operation, |state| {
            apply(state);
            true
        })
        .map(drop)
    }

    /// Like `transact`, but `apply` may decline by returning false, in which case
    /// nothing is committed or published. Returns whether a commit happened.
    fn transact_if(
        &self,
        operation: &'static str,
        apply: impl FnOnce(&mut CredentialState) -> bool,
    ) -> PersistenceResult<bool> {
        let _guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);

        let mut next = self.snapshot.borrow().clone();
        if !apply(&mut next) {
            tracing::debug!(operation, "Session write skipped");
            return Ok(false);
        }
        debug_assert!(next.is_consistent(), "{operation} produced {next:?}");

        if let Err(source) = self.backend.commit(&next) {
            tracing::error!(operation, error = %format!("{source:#}"), "Failed to persist session");
            return Err(PersistenceError::new(operation, source));
        }

        tracing::debug!(operation, logged_in = next.is_logged_in, "Session committed");
        self.snapshot.send_replace(next);
        Ok(true)
    }
}

impl fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialStore")
            .field("snapshot", &*self.snapshot.borrow())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;

    use tempfile::tempdir;

    use super::*;

    fn memory_store() -> CredentialStore {
        CredentialStore::open(MemoryBackend::new()).unwrap()
    }

    #[test]
    fn test_defaults_before_first_write() {
        let store = memory_store();
        assert!(!store.is_logged_in());
        assert_eq!(store.user_id(), None);
        assert_eq!(store.access_token(), None);
        assert_eq!(store.refresh_token(), None);
    }

    #[test]
    fn test_save_is_immediately_visible() {
        let store = memory_store();
        store.save(42, "access-1", "refresh-1").unwrap();

        assert!(store.is_logged_in());
        assert_eq!(store.user_id(), Some(42));
        assert_eq!(store.access_token().as_deref(), Some("access-1"));
        assert_eq!(store.refresh_token().as_deref(), Some("refresh-1"));
    }

    #[test]
    fn test_clear_resets_any_prior_state() {
        let store = memory_store();
        store.save(1, "a", "r").unwrap();
        store.update_access_token("a2").unwrap();
        store.clear().unwrap();

        assert_eq!(store.snapshot(), CredentialState::default());

        // Clearing an already cleared store is fine too.
        store.clear().unwrap();
        assert!(!store.is_logged_in());
    }

    #[test]
    fn test_update_access_token_touches_only_access_token() {
        let store = memory_store();
        store.save(7, "old", "refresh").unwrap();

        store.update_access_token("new").unwrap();

        assert_eq!(store.access_token().as_deref(), Some("new"));
        assert_eq!(store.user_id(), Some(7));
        assert_eq!(store.refresh_token().as_deref(), Some("refresh"));
        assert!(store.is_logged_in());
    }

    #[test]
    fn test_update_refresh_token_touches_only_refresh_token() {
        let store = memory_store();
        store.save(7, "access", "old").unwrap();

        store.update_refresh_token("new").unwrap();

        assert_eq!(store.refresh_token().as_deref(), Some("new"));
        assert_eq!(store.access_token().as_deref(), Some("access"));
        assert_eq!(store.user_id(), Some(7));
    }

    #[test]
    fn test_update_while_logged_out_does_not_log_in() {
        let store = memory_store();
        store.update_access_token("stray").unwrap();

        assert!(!store.is_logged_in());
        assert_eq!(store.access_token().as_deref(), Some("stray"));
        assert!(store.snapshot().is_consistent());
    }

    #[test]
    fn test_failed_commit_keeps_previous_snapshot() {
        let backend = Arc::new(MemoryBackend::new());
        let store = CredentialStore::open(Arc::clone(&backend)).unwrap();
        store.save(1, "a", "r").unwrap();

        backend.set_fail_commits(true);
        let err = store.clear().unwrap_err();

        assert_eq!(err.operation(), "clear");
        assert!(store.is_logged_in());
        assert_eq!(store.access_token().as_deref(), Some("a"));
        assert_eq!(backend.stored(), Some(CredentialState::logged_in(1, "a", "r")));
    }

    #[test]
    fn test_apply_refresh_rotates_both_tokens_at_once() {
        let store = memory_store();
        store.save(1, "a1", "r1").unwrap();
        let mut rx = store.subscribe();

        let pair = TokenPair {
            access_token: "a2".to_string(),
            refresh_token: Some("r2".to_string()),
        };
        assert!(store.apply_refresh("r1", &pair).unwrap());

        // One published state carries both new tokens.
        assert!(rx.has_changed().unwrap());
        let seen = rx.borrow_and_update().clone();
        assert_eq!(seen, CredentialState::logged_in(1, "a2", "r2"));
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn test_apply_refresh_keeps_refresh_token_when_not_rotated() {
        let store = memory_store();
        store.save(1, "a1", "r1").unwrap();

        let pair = TokenPair {
            access_token: "a2".to_string(),
            refresh_token: None,
        };
        assert!(store.apply_refresh("r1", &pair).unwrap());
        assert_eq!(store.snapshot(), CredentialState::logged_in(1, "a2", "r1"));
    }

    #[test]
    fn test_apply_refresh_after_logout_writes_nothing() {
        let backend = Arc::new(MemoryBackend::new());
        let store = CredentialStore::open(Arc::clone(&backend)).unwrap();
        store.save(1, "a1", "r1").unwrap();
        store.clear().unwrap();
        let commits = backend.commit_count();

        let pair = TokenPair {
            access_token: "a2".to_string(),
            refresh_token: Some("r2".to_string()),
        };
        assert!(!store.apply_refresh("r1", &pair).unwrap());

        assert_eq!(store.snapshot(), CredentialState::default());
        assert_eq!(backend.commit_count(), commits);
    }

    #[test]
    fn test_apply_refresh_for_superseded_session_writes_nothing() {
        let store = memory_store();
        store.save(1, "a1", "r1").unwrap();
        store.save(2, "b1", "s1").unwrap();

        let pair = TokenPair {
            access_token: "a2".to_string(),
            refresh_token: Some("r2".to_string()),
        };
        assert!(!store.apply_refresh("r1", &pair).unwrap());
        assert_eq!(store.snapshot(), CredentialState::logged_in(2, "b1", "s1"));
    }

    #[test]
    fn test_open_discards_inconsistent_record() {
        let broken = CredentialState {
            is_logged_in: true,
            user_id: None,
            access_token: Some("a".to_string()),
            refresh_token: None,
        };
        let store = CredentialStore::open(MemoryBackend::with_state(broken)).unwrap();
        assert_eq!(store.snapshot(), CredentialState::default());
    }

    #[test]
    fn test_file_store_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("auth_prefs.json");

        let store = CredentialStore::open(FileBackend::new(&path)).unwrap();
        store.save(3, "acc", "ref").unwrap();
        store.update_access_token("acc2").unwrap();
        drop(store);

        let reopened = CredentialStore::open(FileBackend::new(&path)).unwrap();
        assert_eq!(
            reopened.snapshot(),
            CredentialState::logged_in(3, "acc2", "ref")
        );
    }

    #[test]
    fn test_open_reports_unreadable_record() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("auth_prefs.json");
        std::fs::write(&path, "garbage").unwrap();

        let err = CredentialStore::open(FileBackend::new(&path)).unwrap_err();
        assert_eq!(err.operation(), "open");
    }

    #[test]
    fn test_concurrent_writers_never_expose_login_without_token() {
        let store = Arc::new(memory_store());
        let stop = Arc::new(AtomicBool::new(false));

        let reader = {
            let store = Arc::clone(&store);
            let stop = Arc::clone(&stop);
            thread::spawn(move || {
                let mut observed = 0usize;
                while !stop.load(Ordering::Relaxed) {
                    let state = store.snapshot();
                    assert!(state.is_consistent(), "observed {state:?}");
                    observed += 1;
                }
                observed
            })
        };

        let writers: Vec<_> = (0..4)
            .map(|i| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for n in 0..250 {
                        match (i + n) % 4 {
                            0 => store.save(i64::from(n), "a", "r").unwrap(),
                            1 => store.clear().unwrap(),
                            2 => store.update_access_token(&format!("a{n}")).unwrap(),
                            _ => store.update_refresh_token(&format!("r{n}")).unwrap(),
                        }
                    }
                })
            })
            .collect();

        for writer in writers {
            writer.join().unwrap();
        }
        stop.store(true, Ordering::Relaxed);
        assert!(reader.join().unwrap() > 0);
        assert!(store.snapshot().is_consistent());
    }

    #[tokio::test]
    async fn test_subscribers_see_commits_in_order() {
        let store = memory_store();
        let mut rx = store.subscribe();

        store.save(1, "a", "r").unwrap();
        rx.changed().await.unwrap();
        assert!(rx.borrow_and_update().is_logged_in);

        store.clear().unwrap();
        rx.changed().await.unwrap();
        assert!(!rx.borrow_and_update().is_logged_in);
    }

    #[tokio::test]
    async fn test_wait_for_login_resolves_after_save() {
        let store = Arc::new(memory_store());
        let waiter = {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.wait_for_login().await })
        };

        tokio::task::yield_now().await;
        store.save(11, "a", "r").unwrap();

        let state = waiter.await.unwrap();
        assert_eq!(state.user_id, Some(11));
    }

    #[tokio::test]
    async fn test_open_async_reads_first_snapshot() {
        let store = CredentialStore::open_async(MemoryBackend::with_state(
            CredentialState::logged_in(2, "a", "r"),
        ))
        .await
        .unwrap();
        assert_eq!(store.user_id(), Some(2));
    }
}
