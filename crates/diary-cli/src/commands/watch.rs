use diary_core::{SessionState, SyncEvent};

use crate::commands::common::{newest_first, open_signed_in_controller, print_notes};
use crate::error::CliError;

/// Re-print the list on every change until Ctrl-C or the session ends.
pub async fn run_watch(as_json: bool, global_profile: Option<&str>) -> Result<(), CliError> {
    let mut controller = open_signed_in_controller(global_profile).await?;
    controller.set_on_notes_changed(move |notes| {
        println!();
        if let Err(error) = print_notes(&newest_first(notes), as_json) {
            tracing::warn!(%error, "failed to render notes");
        }
    });

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::debug!("watch interrupted");
                return Ok(());
            }
            event = controller.process_next_event() => match event {
                Some(SyncEvent::NotesReplaced { count }) => {
                    tracing::debug!(count, "snapshot applied");
                }
                Some(SyncEvent::SessionChanged(SessionState::LoggedOut)) => return Ok(()),
                Some(SyncEvent::SessionChanged(_)) => {}
                Some(SyncEvent::ListenerError(message)) => return Err(CliError::Sync(message)),
                Some(SyncEvent::ListenerClosed) | None => return Ok(()),
            },
        }
    }
}
