//! Session-aware mirror of the signed-in user's notes.
//!
//! `SyncController` is the single writer of both the session state and the
//! note collection. It is owned by the presentation layer and driven from one
//! task: operations are `&mut self` methods, and remote changes (listener
//! snapshots, auth-state updates) are applied only when that task calls
//! [`SyncController::process_next_event`].

use serde_json::Value;
use tokio::sync::watch;

use crate::auth::{AuthUser, IdentityService};
use crate::collection::NoteCollection;
use crate::error::{Error, Result};
use crate::models::Note;
use crate::state::SessionState;
use crate::status::{StatusMessage, StatusSink};
use crate::store::{RemoteStore, StoreEvent, StorePath, Subscription};

/// Something the event pump applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// A snapshot replaced the collection; `count` notes are now listed.
    NotesReplaced { count: usize },
    /// The listener failed and was detached.
    ListenerError(String),
    /// The listener stream ended without an error.
    ListenerClosed,
    /// The identity service changed the session behind our back.
    SessionChanged(SessionState),
}

enum Incoming {
    Store(Option<StoreEvent>),
    Auth { open: bool },
}

pub struct SyncController<I, S, N> {
    identity: I,
    store: S,
    status: N,
    notes: NoteCollection,
    session: SessionState,
    user: Option<AuthUser>,
    auth_state: watch::Receiver<Option<AuthUser>>,
    auth_stream_open: bool,
    subscription: Option<Subscription>,
}

impl<I, S, N> SyncController<I, S, N>
where
    I: IdentityService,
    S: RemoteStore,
    N: StatusSink,
{
    pub fn new(identity: I, store: S, status: N) -> Self {
        let mut auth_state = identity.subscribe_auth_state();
        if auth_state.borrow().is_some() {
            // Let the event pump adopt a user that was signed in before we
            // started listening.
            auth_state.mark_changed();
        }

        Self {
            identity,
            store,
            status,
            notes: NoteCollection::new(),
            session: SessionState::LoggedOut,
            user: None,
            auth_state,
            auth_stream_open: true,
            subscription: None,
        }
    }

    pub const fn session(&self) -> SessionState {
        self.session
    }

    pub const fn is_logged_in(&self) -> bool {
        self.session.is_logged_in()
    }

    pub const fn current_user(&self) -> Option<&AuthUser> {
        self.user.as_ref()
    }

    /// Read-only view of the mirrored notes.
    pub const fn notes(&self) -> &NoteCollection {
        &self.notes
    }

    /// Register the single observer of the note collection.
    pub fn set_on_notes_changed(&mut self, callback: impl FnMut(&[Note]) + Send + 'static) {
        self.notes.set_on_change(callback);
    }

    pub const fn is_listening(&self) -> bool {
        self.subscription.is_some()
    }

    /// Sign in and attach the listener. A failed re-login keeps an existing
    /// session as long as the identity service still reports that user.
    pub async fn login(&mut self, email: &str, password: &str) -> Result<()> {
        let previous = self.session;
        self.status.show(StatusMessage::LoggingIn);
        self.set_session(SessionState::LoggingIn);

        match self.identity.sign_in(email, password).await {
            Ok(user) => {
                self.status.show(StatusMessage::LoginSucceeded);
                self.enter_logged_in(user).await;
                Ok(())
            }
            Err(error) => {
                tracing::warn!("Login failed: {}", error);
                if previous.is_logged_in() && self.still_signed_in_as_current_user() {
                    self.set_session(SessionState::LoggedIn);
                } else {
                    self.enter_logged_out();
                }
                self.status
                    .show(StatusMessage::LoginFailed(error.to_string()));
                Err(error.into())
            }
        }
    }

    /// Pick up a session persisted by a previous run. Returns whether one was
    /// found.
    pub async fn restore_session(&mut self) -> Result<bool> {
        match self.identity.restore_session().await? {
            Some(user) => {
                self.enter_logged_in(user).await;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Always ends logged out, even if the identity service fails to sign out.
    pub async fn logout(&mut self) {
        if let Err(error) = self.identity.sign_out().await {
            tracing::warn!("Sign-out failed, dropping local session anyway: {}", error);
        }
        self.enter_logged_out();
        self.status.show(StatusMessage::LogoutSucceeded);
    }

    /// (Re)attach the listener on the current user's notes. Any previous
    /// listener is detached first, so repeated calls never stack listeners.
    pub async fn attach_listener(&mut self) -> Result<()> {
        let user_id = self.require_user_id()?;
        self.detach_listener();

        let path = StorePath::notes(&user_id)?;
        match self.store.subscribe(&path).await {
            Ok(subscription) => {
                tracing::info!(path = %path, "Listening for note changes");
                self.subscription = Some(subscription);
                Ok(())
            }
            Err(error) => {
                tracing::warn!(path = %path, "Failed to attach listener: {}", error);
                self.status
                    .show(StatusMessage::ListenerFailed(error.to_string()));
                Err(error.into())
            }
        }
    }

    pub fn detach_listener(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            tracing::debug!(path = %subscription.path(), "Detaching listener");
            subscription.cancel();
        }
    }

    /// Write `note` to `note/{uid}/{timestamp}`. A note already stored under
    /// the same timestamp is overwritten.
    pub async fn add_note(&mut self, note: &Note) -> Result<()> {
        let result = self.write_note(note).await;
        self.report_write(result, StatusMessage::NoteAdded)
    }

    /// Remove `note/{uid}/{timestamp}`; the listener then drops it locally.
    pub async fn delete_note(&mut self, note: &Note) -> Result<()> {
        let result = self.remove_note(note).await;
        self.report_write(result, StatusMessage::NoteDeleted)
    }

    /// Wait for the next remote change and apply it.
    ///
    /// Returns `None` once nothing more can arrive: no listener is attached
    /// and the identity service's auth-state stream has closed.
    pub async fn process_next_event(&mut self) -> Option<SyncEvent> {
        loop {
            let incoming = match (self.subscription.as_mut(), self.auth_stream_open) {
                (None, false) => return None,
                (None, true) => Incoming::Auth {
                    open: self.auth_state.changed().await.is_ok(),
                },
                (Some(subscription), false) => Incoming::Store(subscription.recv().await),
                (Some(subscription), true) => tokio::select! {
                    event = subscription.recv() => Incoming::Store(event),
                    changed = self.auth_state.changed() => Incoming::Auth { open: changed.is_ok() },
                },
            };

            if let Some(event) = self.handle(incoming).await {
                return Some(event);
            }
        }
    }

    async fn handle(&mut self, incoming: Incoming) -> Option<SyncEvent> {
        match incoming {
            Incoming::Store(Some(StoreEvent::Snapshot(children))) => {
                let count = self.apply_snapshot(children);
                Some(SyncEvent::NotesReplaced { count })
            }
            Incoming::Store(Some(StoreEvent::Error(message))) => {
                tracing::warn!("Listener failed: {}", message);
                self.detach_listener();
                self.status
                    .show(StatusMessage::ListenerFailed(message.clone()));
                Some(SyncEvent::ListenerError(message))
            }
            Incoming::Store(None) => {
                self.subscription = None;
                Some(SyncEvent::ListenerClosed)
            }
            Incoming::Auth { open: false } => {
                tracing::debug!("Auth-state stream closed");
                self.auth_stream_open = false;
                None
            }
            Incoming::Auth { open: true } => {
                let user = self.auth_state.borrow_and_update().clone();
                self.reconcile_auth_state(user).await
            }
        }
    }

    /// Fold an auth-state update into the session. Explicit login/logout
    /// already moved the session, so their own echoes are no-ops here.
    async fn reconcile_auth_state(&mut self, user: Option<AuthUser>) -> Option<SyncEvent> {
        match (self.session, user) {
            (SessionState::LoggingIn, _) => None,
            (SessionState::LoggedIn, Some(user))
                if self.user.as_ref().map(|current| &current.id) == Some(&user.id) =>
            {
                None
            }
            (_, Some(user)) => {
                self.enter_logged_in(user).await;
                Some(SyncEvent::SessionChanged(self.session))
            }
            (SessionState::LoggedIn, None) => {
                tracing::info!("Identity service reported sign-out");
                self.enter_logged_out();
                Some(SyncEvent::SessionChanged(self.session))
            }
            (SessionState::LoggedOut, None) => None,
        }
    }

    /// Replace the collection with the notes in `children`.
    fn apply_snapshot(&mut self, children: Vec<(String, Value)>) -> usize {
        let notes: Vec<Note> = children
            .into_iter()
            .filter_map(|(key, value)| decode_note(&key, value))
            .collect();
        let count = notes.len();
        self.notes.replace_all(notes);
        count
    }

    async fn enter_logged_in(&mut self, user: AuthUser) {
        let switching_user = self
            .user
            .as_ref()
            .is_some_and(|current| current.id != user.id);
        if switching_user {
            self.detach_listener();
            self.notes.clear();
        }

        tracing::info!(user_id = %user.id, "Signed in");
        self.user = Some(user);
        self.set_session(SessionState::LoggedIn);

        // The session stays signed in; the caller can retry `attach_listener`.
        if let Err(error) = self.attach_listener().await {
            tracing::debug!("Listener not attached after sign-in: {}", error);
        }
    }

    fn enter_logged_out(&mut self) {
        self.detach_listener();
        self.user = None;
        self.set_session(SessionState::LoggedOut);
        if !self.notes.is_empty() {
            self.notes.clear();
        }
    }

    fn set_session(&mut self, session: SessionState) {
        if self.session != session {
            tracing::debug!(from = %self.session, to = %session, "Session transition");
            self.session = session;
        }
    }

    fn still_signed_in_as_current_user(&self) -> bool {
        match (self.identity.current_user(), &self.user) {
            (Some(reported), Some(current)) => reported.id == current.id,
            _ => false,
        }
    }

    fn require_user_id(&self) -> Result<String> {
        match (&self.session, &self.user) {
            (SessionState::LoggedIn, Some(user)) => Ok(user.id.clone()),
            _ => Err(Error::NotLoggedIn),
        }
    }

    async fn write_note(&self, note: &Note) -> Result<()> {
        let path = StorePath::note(&self.require_user_id()?, note.timestamp)?;
        let value = serde_json::to_value(note)?;
        self.store.write(&path, value).await?;
        Ok(())
    }

    async fn remove_note(&self, note: &Note) -> Result<()> {
        let path = StorePath::note(&self.require_user_id()?, note.timestamp)?;
        self.store.remove(&path).await?;
        Ok(())
    }

    fn report_write(&self, result: Result<()>, success: StatusMessage) -> Result<()> {
        match result {
            Ok(()) => {
                self.status.show(success);
                Ok(())
            }
            Err(error) => {
                tracing::warn!("Note write failed: {}", error);
                self.status
                    .show(StatusMessage::WriteFailed(error.to_string()));
                Err(error)
            }
        }
    }
}

/// Decode one child of the notes path. Records that are not notes are
/// skipped; a record without a timestamp takes it from its key.
fn decode_note(key: &str, value: Value) -> Option<Note> {
    if value.is_null() {
        return None;
    }
    match serde_json::from_value::<Note>(value) {
        Ok(mut note) => {
            if note.timestamp == 0 {
                if let Ok(timestamp) = key.parse() {
                    note.timestamp = timestamp;
                }
            }
            tracing::debug!(key, title = %note.title, "Received note");
            Some(note)
        }
        Err(error) => {
            tracing::warn!(key, "Skipping malformed note: {}", error);
            None
        }
    }
}
