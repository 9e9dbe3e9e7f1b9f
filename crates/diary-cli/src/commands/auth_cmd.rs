use crate::auth::{load_stored_session, new_auth_client};
use crate::cli::AuthCommands;
use crate::commands::common::open_controller;
use crate::config_profiles::CliProfilesConfig;
use crate::error::CliError;

pub async fn run_auth(command: AuthCommands, global_profile: Option<&str>) -> Result<(), CliError> {
    match command {
        AuthCommands::Login { email, password } => {
            let (mut controller, profile_name) = open_controller(global_profile)?;
            controller.login(&email, &password).await?;
            let email_label = controller
                .current_user()
                .and_then(|user| user.email.as_deref())
                .unwrap_or("(no email)");
            println!("Signed in profile '{profile_name}' as {email_label}");
            Ok(())
        }
        AuthCommands::Register { email, password } => {
            let config = CliProfilesConfig::load().map_err(CliError::Config)?;
            let profile_name = config.resolve_profile_name(global_profile);
            let firebase = config
                .firebase_config(&profile_name)
                .map_err(CliError::Config)?
                .ok_or_else(|| CliError::NotConfigured(profile_name.clone()))?;
            let session = new_auth_client(&profile_name, &firebase.api_key)
                .map_err(|error| CliError::Auth(error.to_string()))?
                .sign_up(&email, &password)
                .await
                .map_err(|error| CliError::Auth(error.to_string()))?;
            let email_label = session.user.email.as_deref().unwrap_or("(no email)");
            println!("Registered and signed in profile '{profile_name}' as {email_label}");
            Ok(())
        }
        AuthCommands::Status => {
            let config = CliProfilesConfig::load().map_err(CliError::Config)?;
            let profile_name = config.resolve_profile_name(global_profile);
            let firebase = config.firebase_config(&profile_name).map_err(CliError::Config)?;

            let session = if let Some(firebase) = firebase {
                new_auth_client(&profile_name, &firebase.api_key)
                    .map_err(|error| CliError::Auth(error.to_string()))?
                    .restore()
                    .await
                    .map_err(|error| CliError::Auth(error.to_string()))?
            } else {
                load_stored_session(&profile_name)
                    .map_err(|error| CliError::Auth(error.to_string()))?
            };

            if let Some(session) = session {
                let email_label = session.user.email.as_deref().unwrap_or("(no email)");
                println!(
                    "Profile '{}' is signed in as {} (uid={}, expires_at={})",
                    profile_name, email_label, session.user.id, session.expires_at
                );
            } else {
                println!("Profile '{profile_name}' is not signed in.");
            }
            Ok(())
        }
        AuthCommands::Logout => {
            let (mut controller, profile_name) = open_controller(global_profile)?;
            controller.logout().await;
            println!("Signed out profile '{profile_name}'");
            Ok(())
        }
    }
}
