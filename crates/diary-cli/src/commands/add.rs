use diary_core::Note;

use crate::commands::common::{open_signed_in_controller, resolve_note_fields};
use crate::error::CliError;

pub async fn run_add(
    title: &str,
    body_parts: &[String],
    global_profile: Option<&str>,
) -> Result<(), CliError> {
    let (title, body) = resolve_note_fields(title, body_parts)?;
    let mut controller = open_signed_in_controller(global_profile).await?;

    let note = Note::new(title, body);
    controller.add_note(&note).await?;

    println!("{}", note.timestamp);
    Ok(())
}
