//! Data models for Diary

mod note;

pub use note::{sort_newest_first, Note};
