use crate::commands::common::{open_signed_in_controller, wait_for_snapshot};
use crate::error::CliError;

pub async fn run_delete(timestamp: i64, global_profile: Option<&str>) -> Result<(), CliError> {
    let mut controller = open_signed_in_controller(global_profile).await?;
    wait_for_snapshot(&mut controller).await?;

    let note = controller
        .notes()
        .iter()
        .find(|note| note.timestamp == timestamp)
        .cloned()
        .ok_or(CliError::NoteNotFound(timestamp))?;
    controller.delete_note(&note).await?;

    println!("{timestamp}");
    Ok(())
}
