use diary_core::models::sort_newest_first;
use diary_core::store::FirebaseRealtimeStore;
use diary_core::time_format::format_relative_time;
use diary_core::util::unix_millis_now;
use diary_core::{Note, SessionState, SyncController, SyncEvent};
use serde::Serialize;

use crate::auth::{new_auth_client, CliAuthClient};
use crate::config_profiles::CliProfilesConfig;
use crate::error::CliError;
use crate::status::TerminalStatusSink;

pub type CliController =
    SyncController<CliAuthClient, FirebaseRealtimeStore<CliAuthClient>, TerminalStatusSink>;

#[derive(Debug, Serialize)]
pub struct NoteListItem {
    pub timestamp: i64,
    pub title: String,
    pub body: String,
    pub relative_time: String,
}

/// Build the controller for a profile. The auth client is shared between the
/// identity side and the store's token source.
pub fn open_controller(global_profile: Option<&str>) -> Result<(CliController, String), CliError> {
    let config = CliProfilesConfig::load().map_err(CliError::Config)?;
    let profile_name = config.resolve_profile_name(global_profile);
    let firebase = config
        .firebase_config(&profile_name)
        .map_err(CliError::Config)?
        .ok_or_else(|| CliError::NotConfigured(profile_name.clone()))?;

    let auth = new_auth_client(&profile_name, &firebase.api_key)
        .map_err(|error| CliError::Auth(error.to_string()))?;
    let store = FirebaseRealtimeStore::new(&firebase.database_url, auth.clone())
        .map_err(|error| CliError::Config(error.to_string()))?;

    Ok((
        SyncController::new(auth, store, TerminalStatusSink::default()),
        profile_name,
    ))
}

/// Controller with the stored session restored and the listener attached.
pub async fn open_signed_in_controller(
    global_profile: Option<&str>,
) -> Result<CliController, CliError> {
    let (mut controller, profile_name) = open_controller(global_profile)?;
    if controller.restore_session().await? {
        Ok(controller)
    } else {
        Err(CliError::NotSignedIn(profile_name))
    }
}

/// Pump events until the first snapshot lands in the collection.
pub async fn wait_for_snapshot(controller: &mut CliController) -> Result<(), CliError> {
    loop {
        match controller.process_next_event().await {
            Some(SyncEvent::NotesReplaced { .. }) => return Ok(()),
            Some(SyncEvent::ListenerError(message)) => return Err(CliError::Sync(message)),
            Some(SyncEvent::SessionChanged(SessionState::LoggedIn | SessionState::LoggingIn)) => {}
            Some(SyncEvent::SessionChanged(SessionState::LoggedOut)) => {
                return Err(CliError::Auth("session ended".to_string()));
            }
            Some(SyncEvent::ListenerClosed) | None => {
                return Err(CliError::Sync("listener closed before first snapshot".to_string()));
            }
        }
    }
}

pub fn newest_first(notes: &[Note]) -> Vec<Note> {
    let mut notes = notes.to_vec();
    sort_newest_first(&mut notes);
    notes
}

pub fn format_note_lines(notes: &[Note], now_ms: i64) -> Vec<String> {
    notes
        .iter()
        .map(|note| {
            let relative_time = format_relative_time(note.timestamp, now_ms);
            let preview = note_preview(&note.body, 48);
            if preview.is_empty() {
                format!("{:<13}  {relative_time:<18}  {}", note.timestamp, note.title)
            } else {
                format!(
                    "{:<13}  {relative_time:<18}  {}: {preview}",
                    note.timestamp, note.title
                )
            }
        })
        .collect()
}

pub fn note_to_list_item(note: &Note, now_ms: i64) -> NoteListItem {
    NoteListItem {
        timestamp: note.timestamp,
        title: note.title.clone(),
        body: note.body.clone(),
        relative_time: format_relative_time(note.timestamp, now_ms),
    }
}

pub fn print_notes(notes: &[Note], as_json: bool) -> Result<(), CliError> {
    let now_ms = unix_millis_now();
    if as_json {
        let items = notes
            .iter()
            .map(|note| note_to_list_item(note, now_ms))
            .collect::<Vec<_>>();
        println!("{}", serde_json::to_string_pretty(&items)?);
    } else if notes.is_empty() {
        println!("No notes yet.");
    } else {
        for line in format_note_lines(notes, now_ms) {
            println!("{line}");
        }
    }
    Ok(())
}

pub fn note_preview(body: &str, max_chars: usize) -> String {
    let first_line = body.lines().next().unwrap_or("").trim();
    let collapsed = first_line.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.chars().count() <= max_chars {
        collapsed
    } else {
        let take_len = max_chars.saturating_sub(3);
        let mut truncated = collapsed.chars().take(take_len).collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

/// Trim the title and join body words; a note needs at least one of them.
pub fn resolve_note_fields(title: &str, body_parts: &[String]) -> Result<(String, String), CliError> {
    let title = title.trim().to_string();
    let body = body_parts.join(" ").trim().to_string();
    if title.is_empty() && body.is_empty() {
        Err(CliError::EmptyNote)
    } else {
        Ok((title, body))
    }
}
