//! Error types for diary-core

use thiserror::Error;

use crate::auth::AuthError;
use crate::store::StoreError;

/// Result type alias using diary-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in diary-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Identity service failure (wrong credentials, network, token refresh)
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Remote store failure (write, delete, or subscribe)
    #[error(transparent)]
    Store(#[from] StoreError),

    /// An operation needing a signed-in user ran without one
    #[error("Not logged in")]
    NotLoggedIn,

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
