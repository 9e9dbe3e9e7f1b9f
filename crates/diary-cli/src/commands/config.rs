use diary_core::config::{normalize_database_url, FirebaseConfig};
use diary_core::util::normalize_text_option;

use crate::cli::ConfigCommands;
use crate::config_profiles::CliProfilesConfig;
use crate::error::CliError;

pub fn run_config(command: ConfigCommands, global_profile: Option<&str>) -> Result<(), CliError> {
    match command {
        ConfigCommands::Init {
            profile,
            api_key,
            database_url,
            no_activate,
        } => run_config_init(
            profile.as_deref().or(global_profile),
            api_key,
            database_url,
            no_activate,
        ),
        ConfigCommands::Show => run_config_show(global_profile),
    }
}

#[allow(clippy::needless_pass_by_value)]
pub fn run_config_init(
    profile_name: Option<&str>,
    api_key: Option<String>,
    database_url: Option<String>,
    no_activate: bool,
) -> Result<(), CliError> {
    let mut config = CliProfilesConfig::load().map_err(CliError::Config)?;
    let profile_name = config.resolve_profile_name(profile_name);
    let existing = config.profile(&profile_name).cloned().unwrap_or_default();

    let merged = merge_profile_values(
        normalize_text_option(api_key),
        normalize_text_option(database_url),
        existing.firebase_api_key(),
        existing.database_url(),
    )?;

    let profile = config.profile_mut_or_default(&profile_name);
    profile.firebase_api_key = merged.0;
    profile.database_url = merged.1;
    if !no_activate {
        config.active_profile = Some(profile_name.clone());
    }

    let path = config.save().map_err(CliError::Config)?;
    println!("Saved profile '{profile_name}' to {}", path.display());
    if no_activate {
        println!("Active profile unchanged.");
    } else {
        println!("Active profile: {profile_name}");
    }
    Ok(())
}

/// Explicit values win over what the profile already had. A complete pair is
/// validated up front so a typo does not surface only at sign-in.
pub fn merge_profile_values(
    api_key: Option<String>,
    database_url: Option<String>,
    existing_api_key: Option<String>,
    existing_database_url: Option<String>,
) -> Result<(Option<String>, Option<String>), CliError> {
    let api_key = api_key.or(existing_api_key);
    let database_url = database_url
        .or(existing_database_url)
        .map(normalize_database_url)
        .transpose()
        .map_err(CliError::Config)?;

    if let (Some(key), Some(url)) = (&api_key, &database_url) {
        FirebaseConfig::new(key.clone(), url.clone()).map_err(CliError::Config)?;
    }
    Ok((api_key, database_url))
}

fn run_config_show(global_profile: Option<&str>) -> Result<(), CliError> {
    let config = CliProfilesConfig::load().map_err(CliError::Config)?;
    let profile_name = config.resolve_profile_name(global_profile);
    println!("Profile: {profile_name}");

    match config.firebase_config(&profile_name) {
        Ok(Some(firebase)) => {
            println!("API key: {}", firebase.api_key);
            println!("Database URL: {}", firebase.database_url);
        }
        Ok(None) => println!("Firebase is not configured."),
        Err(message) => println!("Firebase config is incomplete: {message}"),
    }
    Ok(())
}
