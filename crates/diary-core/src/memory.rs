//! In-process stand-ins for the hosted services.
//!
//! Useful for tests and offline demos: they follow the same contracts as the
//! Firebase clients (auth-state stream, full-snapshot listeners) without any
//! network.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tokio::sync::{mpsc, watch};

use crate::auth::{validate_credentials, AuthError, AuthResult, AuthUser, IdentityService};
use crate::status::{StatusMessage, StatusSink};
use crate::store::{tree, RemoteStore, StoreError, StoreEvent, StorePath, StoreResult, Subscription};

/// Identity service backed by a fixed account table.
///
/// Behaves like the hosted service from the controller's point of view:
/// sign-in publishes the user on the auth-state stream, sign-out publishes
/// `None`.
#[derive(Debug, Clone)]
pub struct MemoryIdentityService {
    accounts: Arc<Mutex<HashMap<String, (String, String)>>>,
    auth_state: Arc<watch::Sender<Option<AuthUser>>>,
    persisted: Arc<Mutex<Option<AuthUser>>>,
}

impl Default for MemoryIdentityService {
    fn default() -> Self {
        let (sender, _) = watch::channel(None);
        Self {
            accounts: Arc::default(),
            auth_state: Arc::new(sender),
            persisted: Arc::default(),
        }
    }
}

impl MemoryIdentityService {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an account. The user id is what notes are stored under.
    #[must_use]
    pub fn with_account(self, email: &str, password: &str, user_id: &str) -> Self {
        if let Ok(mut accounts) = self.accounts.lock() {
            accounts.insert(
                email.to_string(),
                (password.to_string(), user_id.to_string()),
            );
        }
        self
    }

    /// Pretend a previous run left `user` signed in.
    pub fn persist_user(&self, user: AuthUser) {
        if let Ok(mut persisted) = self.persisted.lock() {
            *persisted = Some(user);
        }
    }

    /// Simulate the hosted service dropping the session (token revoked,
    /// account disabled) without a local sign-out call.
    pub fn revoke_session(&self) {
        self.forget_persisted();
        self.auth_state.send_replace(None);
    }

    /// Simulate the hosted service reporting a user that signed in elsewhere
    /// in the app (e.g. a restored session).
    pub fn announce_user(&self, user: AuthUser) {
        self.auth_state.send_replace(Some(user));
    }

    fn forget_persisted(&self) {
        if let Ok(mut persisted) = self.persisted.lock() {
            *persisted = None;
        }
    }
}

impl IdentityService for MemoryIdentityService {
    async fn sign_in(&self, email: &str, password: &str) -> AuthResult<AuthUser> {
        validate_credentials(email, password)?;

        let user = {
            let accounts = self
                .accounts
                .lock()
                .map_err(|error| AuthError::SecureStorage(error.to_string()))?;
            match accounts.get(email.trim()) {
                Some((expected, user_id)) if expected == password => AuthUser {
                    id: user_id.clone(),
                    email: Some(email.trim().to_string()),
                },
                _ => return Err(AuthError::InvalidCredentials),
            }
        };

        if let Ok(mut persisted) = self.persisted.lock() {
            *persisted = Some(user.clone());
        }
        self.auth_state.send_replace(Some(user.clone()));
        Ok(user)
    }

    async fn sign_out(&self) -> AuthResult<()> {
        self.forget_persisted();
        self.auth_state.send_replace(None);
        Ok(())
    }

    async fn restore_session(&self) -> AuthResult<Option<AuthUser>> {
        let user = self
            .persisted
            .lock()
            .map_err(|error| AuthError::SecureStorage(error.to_string()))?
            .clone();
        if let Some(user) = &user {
            self.auth_state.send_replace(Some(user.clone()));
        }
        Ok(user)
    }

    fn current_user(&self) -> Option<AuthUser> {
        self.auth_state.borrow().clone()
    }

    fn subscribe_auth_state(&self) -> watch::Receiver<Option<AuthUser>> {
        self.auth_state.subscribe()
    }
}

/// Real-time store kept in a JSON tree, with live listeners.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryStoreInner>>,
}

#[derive(Debug, Default)]
struct MemoryStoreInner {
    root: Value,
    listeners: Vec<Listener>,
    write_failure: Option<String>,
    subscribe_failure: Option<String>,
}

#[derive(Debug)]
struct Listener {
    path: StorePath,
    sender: mpsc::UnboundedSender<StoreEvent>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write and delete fail with `reason`, or succeed
    /// again with `None`.
    pub fn fail_writes(&self, reason: Option<&str>) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.write_failure = reason.map(str::to_string);
        }
    }

    /// Make every subsequent subscribe fail with `reason`, or succeed again
    /// with `None`.
    pub fn fail_subscriptions(&self, reason: Option<&str>) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.subscribe_failure = reason.map(str::to_string);
        }
    }

    /// Fail every listener attached at or under `path` and detach it, the way
    /// the hosted store cancels listeners when access is revoked.
    pub fn cancel_listeners(&self, path: &StorePath, reason: &str) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.listeners.retain(|listener| {
                if listener.path.starts_with(path) {
                    let _ = listener
                        .sender
                        .send(StoreEvent::Error(reason.to_string()));
                    false
                } else {
                    true
                }
            });
        }
    }

    pub fn value_at(&self, path: &StorePath) -> Option<Value> {
        let inner = self.inner.lock().ok()?;
        tree::get(&inner.root, path.segments()).cloned()
    }

    /// Listeners still attached.
    pub fn listener_count(&self) -> usize {
        self.inner.lock().map_or(0, |mut inner| {
            inner.listeners.retain(|listener| !listener.sender.is_closed());
            inner.listeners.len()
        })
    }

    fn lock(&self) -> StoreResult<std::sync::MutexGuard<'_, MemoryStoreInner>> {
        self.inner
            .lock()
            .map_err(|error| StoreError::Api(error.to_string()))
    }

    fn apply(&self, path: &StorePath, value: Value) -> StoreResult<()> {
        let mut inner = self.lock()?;
        if let Some(reason) = inner.write_failure.clone() {
            return Err(StoreError::Rejected(reason));
        }
        tree::set(&mut inner.root, path.segments(), value);
        inner.notify_affected(path);
        Ok(())
    }
}

impl MemoryStoreInner {
    fn notify_affected(&mut self, changed: &StorePath) {
        let root = &self.root;
        self.listeners.retain(|listener| {
            if !(changed.starts_with(&listener.path) || listener.path.starts_with(changed)) {
                return !listener.sender.is_closed();
            }
            let snapshot = tree::children(root, listener.path.segments());
            listener.sender.send(StoreEvent::Snapshot(snapshot)).is_ok()
        });
    }
}

impl RemoteStore for MemoryStore {
    async fn write(&self, path: &StorePath, value: Value) -> StoreResult<()> {
        self.apply(path, value)
    }

    async fn remove(&self, path: &StorePath) -> StoreResult<()> {
        self.apply(path, Value::Null)
    }

    async fn subscribe(&self, path: &StorePath) -> StoreResult<Subscription> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let mut inner = self.lock()?;
        if let Some(reason) = inner.subscribe_failure.clone() {
            return Err(StoreError::Api(reason));
        }
        let snapshot = tree::children(&inner.root, path.segments());
        let _ = sender.send(StoreEvent::Snapshot(snapshot));
        inner.listeners.push(Listener {
            path: path.clone(),
            sender,
        });
        Ok(Subscription::new(path.clone(), receiver))
    }
}

/// Status sink that remembers every message it was asked to show.
#[derive(Debug, Clone, Default)]
pub struct RecordingStatusSink {
    messages: Arc<Mutex<Vec<StatusMessage>>>,
}

impl RecordingStatusSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The message currently on screen.
    pub fn current(&self) -> Option<StatusMessage> {
        self.messages.lock().ok()?.last().cloned()
    }

    pub fn messages(&self) -> Vec<StatusMessage> {
        self.messages
            .lock()
            .map(|messages| messages.clone())
            .unwrap_or_default()
    }
}

impl StatusSink for RecordingStatusSink {
    fn show(&self, message: StatusMessage) {
        if let Ok(mut messages) = self.messages.lock() {
            messages.push(message);
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use pretty_assertions::assert_eq;

    fn user() -> AuthUser {
        AuthUser {
            id: "uid-1".to_string(),
            email: Some("u@example.com".to_string()),
        }
    }

    #[tokio::test]
    async fn memory_identity_publishes_auth_state() {
        let identity = MemoryIdentityService::new().with_account("u@example.com", "pw", "uid-1");
        let mut states = identity.subscribe_auth_state();
        assert!(states.borrow_and_update().is_none());

        let signed_in = identity.sign_in("u@example.com", "pw").await.unwrap();
        assert_eq!(signed_in.id, "uid-1");
        assert!(states.has_changed().unwrap());
        assert_eq!(states.borrow_and_update().clone(), Some(signed_in));

        identity.sign_out().await.unwrap();
        assert!(identity.current_user().is_none());
    }

    #[tokio::test]
    async fn memory_identity_rejects_wrong_password() {
        let identity = MemoryIdentityService::new().with_account("u@example.com", "pw", "uid-1");
        let result = identity.sign_in("u@example.com", "nope").await;
        assert!(matches!(result, Err(AuthError::InvalidCredentials)));
        assert!(identity.current_user().is_none());
    }

    #[tokio::test]
    async fn memory_identity_restores_persisted_user() {
        let identity = MemoryIdentityService::new();
        assert!(identity.restore_session().await.unwrap().is_none());

        identity.persist_user(user());
        assert_eq!(identity.restore_session().await.unwrap(), Some(user()));
        assert_eq!(identity.current_user(), Some(user()));
    }

    #[tokio::test]
    async fn memory_store_subscribe_starts_with_current_snapshot() {
        let store = MemoryStore::new();
        let path = StorePath::notes("uid").unwrap();
        store
            .write(&StorePath::note("uid", 100).unwrap(), json!({"title": "A"}))
            .await
            .unwrap();

        let mut subscription = store.subscribe(&path).await.unwrap();
        let Some(StoreEvent::Snapshot(children)) = subscription.recv().await else {
            panic!("expected snapshot");
        };
        assert_eq!(children, vec![("100".to_string(), json!({"title": "A"}))]);
    }

    #[tokio::test]
    async fn memory_store_only_notifies_affected_listeners() {
        let store = MemoryStore::new();
        let mut mine = store.subscribe(&StorePath::notes("me").unwrap()).await.unwrap();
        let mut theirs = store.subscribe(&StorePath::notes("them").unwrap()).await.unwrap();
        mine.recv().await.unwrap();
        theirs.recv().await.unwrap();

        store
            .write(&StorePath::note("me", 1).unwrap(), json!({"title": "x"}))
            .await
            .unwrap();

        assert!(matches!(mine.recv().await, Some(StoreEvent::Snapshot(children)) if children.len() == 1));
        assert!(theirs.try_recv().is_none());
    }

    #[tokio::test]
    async fn memory_store_write_failure_leaves_tree_untouched() {
        let store = MemoryStore::new();
        let path = StorePath::note("uid", 1).unwrap();
        store.fail_writes(Some("offline"));
        let result = store.write(&path, json!({"title": "x"})).await;
        assert!(matches!(result, Err(StoreError::Rejected(reason)) if reason == "offline"));
        assert_eq!(store.value_at(&path), None);
    }

    #[tokio::test]
    async fn memory_store_drops_detached_listeners() {
        let store = MemoryStore::new();
        let subscription = store.subscribe(&StorePath::notes("uid").unwrap()).await.unwrap();
        assert_eq!(store.listener_count(), 1);
        drop(subscription);
        assert_eq!(store.listener_count(), 0);
    }

    #[tokio::test]
    async fn recording_sink_tracks_current_message() {
        let sink = RecordingStatusSink::new();
        assert!(sink.current().is_none());
        sink.show(StatusMessage::LoggingIn);
        sink.show(StatusMessage::LoginSucceeded);
        assert_eq!(sink.current(), Some(StatusMessage::LoginSucceeded));
        assert_eq!(sink.messages().len(), 2);
    }
}
