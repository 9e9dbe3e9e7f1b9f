//! Persistent CLI profile configuration.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use diary_core::config::{resolve_optional_firebase_config, FirebaseConfig};
use diary_core::util::normalize_text_option;
use serde::{Deserialize, Serialize};

const CONFIG_FILE_NAME: &str = "cli-config.json";
const PROFILE_ENV: &str = "DIARY_PROFILE";
const API_KEY_ENV: &str = "FIREBASE_API_KEY";
const DATABASE_URL_ENV: &str = "FIREBASE_DATABASE_URL";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CliProfilesConfig {
    #[serde(default = "default_config_version")]
    pub version: u32,
    #[serde(default)]
    pub active_profile: Option<String>,
    #[serde(default)]
    pub profiles: BTreeMap<String, CliProfile>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CliProfile {
    #[serde(default)]
    pub firebase_api_key: Option<String>,
    #[serde(default)]
    pub database_url: Option<String>,
}

const fn default_config_version() -> u32 {
    1
}

pub fn default_config_path() -> Result<PathBuf, String> {
    dirs::config_dir()
        .map(|dir| dir.join("diary").join(CONFIG_FILE_NAME))
        .ok_or_else(|| "Failed to resolve CLI config directory".to_string())
}

pub fn normalize_profile_name(value: Option<&str>) -> Option<String> {
    let value = value?.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

impl CliProfilesConfig {
    pub fn load() -> Result<Self, String> {
        Self::load_from_path(&default_config_path()?)
    }

    pub fn load_from_path(path: &Path) -> Result<Self, String> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)
            .map_err(|error| format!("Failed to read config at {}: {}", path.display(), error))?;
        let mut config = serde_json::from_str::<Self>(&raw)
            .map_err(|error| format!("Failed to parse config at {}: {}", path.display(), error))?;
        config.normalize();
        Ok(config)
    }

    pub fn save(&self) -> Result<PathBuf, String> {
        let path = default_config_path()?;
        self.save_to_path(&path)?;
        Ok(path)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|error| {
                format!(
                    "Failed to create config directory {}: {}",
                    parent.display(),
                    error
                )
            })?;
        }

        let mut normalized = self.clone();
        normalized.normalize();
        let serialized = serde_json::to_string_pretty(&normalized)
            .map_err(|error| format!("Failed to serialize config: {error}"))?;
        std::fs::write(path, serialized)
            .map_err(|error| format!("Failed to write config at {}: {}", path.display(), error))
    }

    pub fn resolve_profile_name(&self, explicit: Option<&str>) -> String {
        if let Some(profile) = normalize_profile_name(explicit) {
            return profile;
        }
        if let Some(profile) = normalize_profile_name(std::env::var(PROFILE_ENV).ok().as_deref()) {
            return profile;
        }
        if let Some(profile) = normalize_profile_name(self.active_profile.as_deref()) {
            return profile;
        }
        "default".to_string()
    }

    pub fn profile(&self, name: &str) -> Option<&CliProfile> {
        self.profiles.get(name)
    }

    pub fn profile_mut_or_default(&mut self, name: &str) -> &mut CliProfile {
        self.profiles.entry(name.to_string()).or_default()
    }

    /// Firebase config for a profile. `FIREBASE_API_KEY` and
    /// `FIREBASE_DATABASE_URL` from the environment win over the file.
    pub fn firebase_config(&self, profile_name: &str) -> Result<Option<FirebaseConfig>, String> {
        let profile = self.profile(profile_name).cloned().unwrap_or_default();
        resolve_with_overrides(
            &profile,
            std::env::var(API_KEY_ENV).ok(),
            std::env::var(DATABASE_URL_ENV).ok(),
        )
    }

    fn normalize(&mut self) {
        self.active_profile = normalize_profile_name(self.active_profile.as_deref());
        for profile in self.profiles.values_mut() {
            profile.normalize();
        }
    }
}

impl CliProfile {
    pub fn firebase_api_key(&self) -> Option<String> {
        normalize_text_option(self.firebase_api_key.clone())
    }

    pub fn database_url(&self) -> Option<String> {
        normalize_text_option(self.database_url.clone())
    }

    fn normalize(&mut self) {
        self.firebase_api_key = normalize_text_option(self.firebase_api_key.clone());
        self.database_url = normalize_text_option(self.database_url.clone());
    }
}

pub fn resolve_with_overrides(
    profile: &CliProfile,
    api_key_override: Option<String>,
    database_url_override: Option<String>,
) -> Result<Option<FirebaseConfig>, String> {
    let api_key = normalize_text_option(api_key_override).or_else(|| profile.firebase_api_key());
    let database_url =
        normalize_text_option(database_url_override).or_else(|| profile.database_url());
    resolve_optional_firebase_config(api_key, database_url)
}
