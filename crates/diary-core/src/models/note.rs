//! Note model

use serde::{Deserialize, Serialize};

/// A note in the diary.
///
/// The creation timestamp (Unix ms) doubles as the note's key in the remote
/// store, so two notes stamped with the same millisecond overwrite each
/// other. Equality is structural.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Note {
    /// Creation timestamp (Unix ms)
    #[serde(default, alias = "date")]
    pub timestamp: i64,
    /// Short title line
    #[serde(default)]
    pub title: String,
    /// Free text body
    #[serde(default, alias = "content")]
    pub body: String,
}

impl Note {
    /// Create a note stamped with the current time
    #[must_use]
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self::with_timestamp(crate::util::unix_millis_now(), title, body)
    }

    /// Create a note with an explicit timestamp
    #[must_use]
    pub fn with_timestamp(timestamp: i64, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            timestamp,
            title: title.into(),
            body: body.into(),
        }
    }

    /// Key of this note under the user's notes path
    #[must_use]
    pub fn storage_key(&self) -> String {
        self.timestamp.to_string()
    }

    /// Check if both title and body are blank
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.title.trim().is_empty() && self.body.trim().is_empty()
    }
}

/// Sort notes the way they are displayed: newest first.
///
/// The sort is stable, so notes sharing a timestamp keep their relative order.
pub fn sort_newest_first(notes: &mut [Note]) {
    notes.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
}
