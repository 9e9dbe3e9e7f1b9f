//! diary-core - Core library for Diary
//!
//! This crate contains the note model, the observable note collection, the
//! relative time formatter, and the sync controller that mirrors a user's
//! notes from the hosted real-time store. Presentation layers (the CLI, or a
//! mobile shell) own one `SyncController` and drive it.

pub mod auth;
pub mod collection;
pub mod config;
pub mod error;
pub mod memory;
pub mod models;
pub mod state;
pub mod status;
pub mod store;
pub mod sync;
pub mod time_format;
pub mod util;

pub use collection::NoteCollection;
pub use error::{Error, Result};
pub use models::Note;
pub use state::SessionState;
pub use status::{StatusMessage, StatusSink};
pub use sync::{SyncController, SyncEvent};
