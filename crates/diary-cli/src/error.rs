use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] diary_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Note title and body cannot both be empty")]
    EmptyNote,
    #[error("No note with timestamp {0}")]
    NoteNotFound(i64),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Authentication error: {0}")]
    Auth(String),
    #[error("Sync error: {0}")]
    Sync(String),
    #[error("Profile '{0}' is not signed in. Run `diary auth login` first.")]
    NotSignedIn(String),
    #[error(
        "Firebase is not configured for profile '{0}'. Run `diary config init` or set FIREBASE_API_KEY and FIREBASE_DATABASE_URL."
    )]
    NotConfigured(String),
}
