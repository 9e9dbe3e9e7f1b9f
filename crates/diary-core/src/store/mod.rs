//! Remote tree-structured store seam.
//!
//! The hosted store addresses values by slash-separated paths. Listeners get
//! full snapshots of the children under a path, never deltas.

mod firebase;
mod sse;
pub(crate) mod tree;

use std::cmp::Ordering;
use std::fmt;
use std::future::Future;

use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::auth::AuthError;

pub use firebase::FirebaseRealtimeStore;
pub use sse::{SseDecoder, SseEvent};

/// Root under which every user's notes live.
pub const NOTES_ROOT: &str = "note";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Invalid store configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Invalid store path: {0}")]
    InvalidPath(String),
    #[error("Store HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Store API error: {0}")]
    Api(String),
    #[error("Store authorization failed: {0}")]
    Auth(#[from] AuthError),
    #[error("Failed to encode store value: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Write rejected: {0}")]
    Rejected(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A validated path into the store, e.g. `note/{uid}/{timestamp}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorePath {
    segments: Vec<String>,
}

impl StorePath {
    /// Parse a slash-separated path. Empty segments are ignored; segments may
    /// not contain characters the hosted store forbids in keys.
    pub fn parse(raw: &str) -> StoreResult<Self> {
        let segments = raw
            .split('/')
            .filter(|segment| !segment.is_empty())
            .map(|segment| validate_segment(segment).map(str::to_string))
            .collect::<StoreResult<Vec<_>>>()?;
        Ok(Self { segments })
    }

    #[must_use]
    pub const fn root() -> Self {
        Self {
            segments: Vec::new(),
        }
    }

    /// `note/{user_id}`
    pub fn notes(user_id: &str) -> StoreResult<Self> {
        Self::root().child(NOTES_ROOT)?.child(user_id)
    }

    /// `note/{user_id}/{timestamp}`
    pub fn note(user_id: &str, timestamp: i64) -> StoreResult<Self> {
        Self::notes(user_id)?.child(&timestamp.to_string())
    }

    pub fn child(mut self, segment: &str) -> StoreResult<Self> {
        self.segments.push(validate_segment(segment)?.to_string());
        Ok(self)
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Whether `self` equals `other` or lies underneath it.
    pub fn starts_with(&self, other: &Self) -> bool {
        self.segments.starts_with(&other.segments)
    }

    /// Percent-encoded form for use in URLs.
    #[must_use]
    pub fn to_url_path(&self) -> String {
        self.segments
            .iter()
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/")
    }
}

impl fmt::Display for StorePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}

fn validate_segment(segment: &str) -> StoreResult<&str> {
    if segment.trim().is_empty() {
        return Err(StoreError::InvalidPath("empty path segment".to_string()));
    }
    if segment
        .chars()
        .any(|ch| matches!(ch, '.' | '$' | '#' | '[' | ']' | '/') || ch.is_control())
    {
        return Err(StoreError::InvalidPath(format!(
            "segment '{segment}' contains a forbidden character"
        )));
    }
    Ok(segment)
}

/// What a listener receives.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    /// Every child under the subscribed path, in store order.
    Snapshot(Vec<(String, Value)>),
    /// The listener failed; the subscription delivers nothing more after this.
    Error(String),
}

/// Handle to a live listener. Dropping it detaches the listener.
#[derive(Debug)]
pub struct Subscription {
    path: StorePath,
    events: mpsc::UnboundedReceiver<StoreEvent>,
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    /// Subscription fed through `events`; the sender side going away ends it.
    pub fn new(path: StorePath, events: mpsc::UnboundedReceiver<StoreEvent>) -> Self {
        Self {
            path,
            events,
            task: None,
        }
    }

    /// Subscription fed by a background task that is aborted on drop.
    pub fn with_task(
        path: StorePath,
        events: mpsc::UnboundedReceiver<StoreEvent>,
        task: JoinHandle<()>,
    ) -> Self {
        Self {
            path,
            events,
            task: Some(task),
        }
    }

    pub const fn path(&self) -> &StorePath {
        &self.path
    }

    /// Next event, or `None` once the listener has ended.
    pub async fn recv(&mut self) -> Option<StoreEvent> {
        self.events.recv().await
    }

    /// Next event if one is already queued.
    pub fn try_recv(&mut self) -> Option<StoreEvent> {
        self.events.try_recv().ok()
    }

    /// Detach the listener now.
    pub fn cancel(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.events.close();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// The hosted real-time store as seen by the sync controller.
pub trait RemoteStore {
    /// Set the value at `path`, replacing whatever was there.
    fn write(&self, path: &StorePath, value: Value)
        -> impl Future<Output = StoreResult<()>> + Send;

    /// Delete the value at `path`. Deleting a missing path succeeds.
    fn remove(&self, path: &StorePath) -> impl Future<Output = StoreResult<()>> + Send;

    /// Listen to `path`. The first event is the current snapshot.
    fn subscribe(&self, path: &StorePath)
        -> impl Future<Output = StoreResult<Subscription>> + Send;
}

/// Key order used by the hosted store: integer-like keys first, numerically,
/// then everything else lexicographically.
pub fn compare_keys(a: &str, b: &str) -> Ordering {
    match (parse_integer_key(a), parse_integer_key(b)) {
        (Some(left), Some(right)) => left.cmp(&right).then_with(|| a.cmp(b)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}

fn parse_integer_key(key: &str) -> Option<i64> {
    let digits = key.strip_prefix('-').unwrap_or(key);
    if digits.is_empty() || !digits.chars().all(|ch| ch.is_ascii_digit()) {
        return None;
    }
    if digits.len() > 1 && digits.starts_with('0') {
        return None;
    }
    key.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn note_path_is_scoped_by_user_and_timestamp() {
        let path = StorePath::note("uid-1", 1_700_000_000_000).unwrap();
        assert_eq!(path.to_string(), "note/uid-1/1700000000000");
        assert!(path.starts_with(&StorePath::notes("uid-1").unwrap()));
        assert!(!path.starts_with(&StorePath::notes("uid-2").unwrap()));
    }

    #[test]
    fn parse_skips_empty_segments() {
        let path = StorePath::parse("/note//uid/").unwrap();
        assert_eq!(path.segments(), &["note".to_string(), "uid".to_string()]);
        assert!(StorePath::parse("").unwrap().is_root());
    }

    #[test]
    fn forbidden_characters_are_rejected() {
        assert!(StorePath::parse("note/a.b").is_err());
        assert!(StorePath::notes("user#1").is_err());
        assert!(StorePath::root().child("  ").is_err());
    }

    #[test]
    fn url_path_is_percent_encoded() {
        let path = StorePath::parse("note/user one").unwrap();
        assert_eq!(path.to_url_path(), "note/user%20one");
    }

    #[test]
    fn integer_keys_sort_numerically_before_strings() {
        let mut keys = vec!["b", "100", "a", "20", "-3", "007"];
        keys.sort_by(|a, b| compare_keys(a, b));
        assert_eq!(keys, vec!["-3", "20", "100", "007", "a", "b"]);
    }

    #[tokio::test]
    async fn dropping_subscription_closes_channel() {
        let (sender, receiver) = mpsc::unbounded_channel();
        let subscription = Subscription::new(StorePath::root(), receiver);
        drop(subscription);
        assert!(sender.send(StoreEvent::Snapshot(Vec::new())).is_err());
    }
}
