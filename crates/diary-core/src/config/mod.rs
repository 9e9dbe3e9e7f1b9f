//! Firebase project configuration for client apps.
//!
//! The web API key and the Realtime Database URL are public, safe-to-ship
//! values. User credentials never live here.

use serde::{Deserialize, Serialize};

use crate::util::{is_http_url, normalize_text_option};

/// Where the identity service and the real-time store live.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct FirebaseConfig {
    pub api_key: String,
    pub database_url: String,
}

impl FirebaseConfig {
    /// Build a validated config, trimming both values and any trailing `/` on
    /// the database URL.
    pub fn new(api_key: impl Into<String>, database_url: impl Into<String>) -> Result<Self, String> {
        let api_key = normalize_text_option(Some(api_key.into()))
            .ok_or_else(|| "Firebase API key must not be empty".to_string())?;
        let database_url = normalize_database_url(database_url.into())?;
        Ok(Self {
            api_key,
            database_url,
        })
    }
}

/// Resolve config from optional sources (env, profile file).
///
/// Both missing means "not configured" (`Ok(None)`); only one present is an
/// error.
pub fn resolve_optional_firebase_config(
    api_key: Option<String>,
    database_url: Option<String>,
) -> Result<Option<FirebaseConfig>, String> {
    let api_key = normalize_text_option(api_key);
    let database_url = normalize_text_option(database_url);

    match (api_key, database_url) {
        (None, None) => Ok(None),
        (Some(api_key), Some(database_url)) => FirebaseConfig::new(api_key, database_url).map(Some),
        (Some(_), None) => Err("Firebase database URL is missing".to_string()),
        (None, Some(_)) => Err("Firebase API key is missing".to_string()),
    }
}

pub fn normalize_database_url(raw: String) -> Result<String, String> {
    let url = normalize_text_option(Some(raw))
        .ok_or_else(|| "Firebase database URL must not be empty".to_string())?;
    if is_http_url(&url) {
        Ok(url.trim_end_matches('/').to_string())
    } else {
        Err("Firebase database URL must include http:// or https://".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_trims_and_strips_trailing_slash() {
        let config = FirebaseConfig::new(" key ", " https://demo.firebaseio.com/ ").unwrap();
        assert_eq!(config.api_key, "key");
        assert_eq!(config.database_url, "https://demo.firebaseio.com");
    }

    #[test]
    fn new_rejects_bad_values() {
        assert!(FirebaseConfig::new("", "https://demo.firebaseio.com").is_err());
        assert!(FirebaseConfig::new("key", "demo.firebaseio.com").is_err());
    }

    #[test]
    fn resolve_optional_requires_both_or_neither() {
        assert_eq!(resolve_optional_firebase_config(None, None), Ok(None));
        assert_eq!(
            resolve_optional_firebase_config(Some("  ".to_string()), None),
            Ok(None)
        );
        assert!(resolve_optional_firebase_config(Some("key".to_string()), None).is_err());
        assert!(resolve_optional_firebase_config(
            None,
            Some("https://demo.firebaseio.com".to_string())
        )
        .is_err());

        let resolved = resolve_optional_firebase_config(
            Some("key".to_string()),
            Some("https://demo.firebaseio.com".to_string()),
        )
        .unwrap()
        .unwrap();
        assert_eq!(resolved.api_key, "key");
    }

    #[test]
    fn config_rejects_unknown_fields() {
        let error = serde_json::from_str::<FirebaseConfig>(
            r#"{"api_key":"k","database_url":"https://x.firebaseio.com","extra":1}"#,
        )
        .unwrap_err();
        assert!(error.to_string().contains("unknown field"));
    }
}
