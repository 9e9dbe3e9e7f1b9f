use crate::commands::common::{newest_first, open_signed_in_controller, print_notes, wait_for_snapshot};
use crate::error::CliError;

pub async fn run_list(
    limit: Option<usize>,
    as_json: bool,
    global_profile: Option<&str>,
) -> Result<(), CliError> {
    let mut controller = open_signed_in_controller(global_profile).await?;
    wait_for_snapshot(&mut controller).await?;

    let mut notes = newest_first(controller.notes().list());
    if let Some(limit) = limit {
        notes.truncate(limit);
    }
    print_notes(&notes, as_json)
}
