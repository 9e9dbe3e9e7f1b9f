//! Terminal status banner.

use std::sync::Mutex;

use diary_core::{StatusMessage, StatusSink};

/// Prints each status message to stderr, keeping stdout for command output.
/// A new message replaces whatever was showing before.
#[derive(Debug, Default)]
pub struct TerminalStatusSink {
    current: Mutex<Option<StatusMessage>>,
}

#[cfg(test)]
impl TerminalStatusSink {
    pub fn current(&self) -> Option<StatusMessage> {
        self.current.lock().ok().and_then(|guard| guard.clone())
    }
}

impl StatusSink for TerminalStatusSink {
    fn show(&self, message: StatusMessage) {
        if message.is_failure() {
            tracing::debug!(%message, "status failure");
        }
        eprintln!("{message}");
        if let Ok(mut guard) = self.current.lock() {
            *guard = Some(message);
        }
    }
}
