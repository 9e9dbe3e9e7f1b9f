//! Transient status messages shown to the user.

use std::fmt;

/// A transient message for the presentation layer.
///
/// Showing a message replaces whatever message is currently displayed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusMessage {
    LoggingIn,
    LoginSucceeded,
    LogoutSucceeded,
    NoteAdded,
    NoteDeleted,
    LoginFailed(String),
    WriteFailed(String),
    ListenerFailed(String),
}

impl StatusMessage {
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(
            self,
            Self::LoginFailed(_) | Self::WriteFailed(_) | Self::ListenerFailed(_)
        )
    }
}

impl fmt::Display for StatusMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LoggingIn => f.write_str("Logging in..."),
            Self::LoginSucceeded => f.write_str("Successfully login!"),
            Self::LogoutSucceeded => f.write_str("Successfully logout!"),
            Self::NoteAdded => f.write_str("Note added."),
            Self::NoteDeleted => f.write_str("Note deleted."),
            Self::LoginFailed(reason) => write!(f, "Login failed: {reason}"),
            Self::WriteFailed(reason) => write!(f, "Failed to save note: {reason}"),
            Self::ListenerFailed(reason) => write!(f, "Sync error: {reason}"),
        }
    }
}

/// Destination for status messages (a snackbar, a terminal line, a log).
pub trait StatusSink {
    /// Dismiss the current message, if any, and show `message`.
    fn show(&self, message: StatusMessage);
}

impl<T: StatusSink + ?Sized> StatusSink for &T {
    fn show(&self, message: StatusMessage) {
        (**self).show(message);
    }
}

impl<T: StatusSink + ?Sized> StatusSink for std::sync::Arc<T> {
    fn show(&self, message: StatusMessage) {
        (**self).show(message);
    }
}

/// Sink that only logs messages through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingStatusSink;

impl StatusSink for TracingStatusSink {
    fn show(&self, message: StatusMessage) {
        if message.is_failure() {
            tracing::warn!("{message}");
        } else {
            tracing::info!("{message}");
        }
    }
}
