//! Firebase Authentication (email/password) over the Identity Toolkit REST API.

use std::sync::{Arc, Mutex};

use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use tokio::sync::watch;

use super::{
    validate_credentials, AccessTokenSource, AuthError, AuthResult, AuthSession, AuthUser,
    IdentityService, SessionPersistence,
};
use crate::util::{compact_text, is_http_url, unix_timestamp_now};

const IDENTITY_TOOLKIT_URL: &str = "https://identitytoolkit.googleapis.com/v1";
const SECURE_TOKEN_URL: &str = "https://securetoken.googleapis.com/v1";

/// Base URLs of the two Firebase auth services.
///
/// Overridable so the client can talk to the local auth emulator
/// (`http://localhost:9099/identitytoolkit.googleapis.com/v1`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirebaseEndpoints {
    pub identity_toolkit: String,
    pub secure_token: String,
}

impl Default for FirebaseEndpoints {
    fn default() -> Self {
        Self {
            identity_toolkit: IDENTITY_TOOLKIT_URL.to_string(),
            secure_token: SECURE_TOKEN_URL.to_string(),
        }
    }
}

impl FirebaseEndpoints {
    pub fn emulator(host: &str) -> AuthResult<Self> {
        let host = host.trim().trim_end_matches('/');
        if !is_http_url(host) {
            return Err(AuthError::InvalidConfiguration(
                "Emulator host must include http:// or https://",
            ));
        }
        Ok(Self {
            identity_toolkit: format!("{host}/identitytoolkit.googleapis.com/v1"),
            secure_token: format!("{host}/securetoken.googleapis.com/v1"),
        })
    }
}

#[derive(Clone)]
pub struct FirebaseAuthClient<S: SessionPersistence> {
    api_key: String,
    endpoints: FirebaseEndpoints,
    client: Client,
    store: S,
    session: Arc<Mutex<Option<AuthSession>>>,
    auth_state: Arc<watch::Sender<Option<AuthUser>>>,
}

impl<S: SessionPersistence> FirebaseAuthClient<S> {
    pub fn new(api_key: impl Into<String>, store: S) -> AuthResult<Self> {
        Self::with_endpoints(api_key, FirebaseEndpoints::default(), store)
    }

    pub fn with_endpoints(
        api_key: impl Into<String>,
        endpoints: FirebaseEndpoints,
        store: S,
    ) -> AuthResult<Self> {
        let api_key = normalize_api_key(api_key.into())?;
        let (auth_state, _) = watch::channel(None);

        Ok(Self {
            api_key,
            endpoints,
            client: Client::builder().build()?,
            store,
            session: Arc::default(),
            auth_state: Arc::new(auth_state),
        })
    }

    /// The active session, if signed in.
    pub fn session(&self) -> Option<AuthSession> {
        self.session.lock().ok().and_then(|guard| guard.clone())
    }

    /// Create an account and sign it in.
    pub async fn sign_up(&self, email: &str, password: &str) -> AuthResult<AuthSession> {
        validate_credentials(email, password)?;
        let request = self
            .client
            .post(format!("{}/accounts:signUp", self.endpoints.identity_toolkit))
            .query(&[("key", &self.api_key)])
            .json(&serde_json::json!({
                "email": email.trim(),
                "password": password,
                "returnSecureToken": true,
            }));
        let payload: SignInResponse = send_json(request).await?;
        let session = payload.into_session()?;
        self.activate(session.clone())?;
        Ok(session)
    }

    pub async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> AuthResult<AuthSession> {
        validate_credentials(email, password)?;
        let request = self
            .client
            .post(format!(
                "{}/accounts:signInWithPassword",
                self.endpoints.identity_toolkit
            ))
            .query(&[("key", &self.api_key)])
            .json(&serde_json::json!({
                "email": email.trim(),
                "password": password,
                "returnSecureToken": true,
            }));
        let payload: SignInResponse = send_json(request).await.map_err(map_credential_error)?;
        let session = payload.into_session()?;
        self.activate(session.clone())?;
        Ok(session)
    }

    pub async fn refresh_session(&self, refresh_token: &str) -> AuthResult<AuthSession> {
        if refresh_token.trim().is_empty() {
            return Err(AuthError::InvalidConfiguration(
                "Refresh token must not be empty",
            ));
        }

        let request = self
            .client
            .post(format!("{}/token", self.endpoints.secure_token))
            .query(&[("key", &self.api_key)])
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ]);
        let payload: RefreshResponse = send_json(request).await?;
        let email = self
            .session()
            .and_then(|session| session.user.email)
            .or_else(|| {
                self.store
                    .load_session()
                    .ok()
                    .flatten()
                    .and_then(|session| session.user.email)
            });
        let session = payload.into_session(email)?;
        self.activate(session.clone())?;
        Ok(session)
    }

    /// Load the persisted session, refreshing it when expired.
    pub async fn restore(&self) -> AuthResult<Option<AuthSession>> {
        let Some(stored_session) = self.store.load_session()? else {
            return Ok(None);
        };

        if !stored_session.is_expired() {
            self.activate(stored_session.clone())?;
            return Ok(Some(stored_session));
        }

        match self.refresh_session(&stored_session.refresh_token).await {
            Ok(refreshed) => Ok(Some(refreshed)),
            Err(error) => {
                tracing::warn!("Failed to refresh persisted session: {}", error);
                self.store.clear_session()?;
                Ok(None)
            }
        }
    }

    /// A valid ID token for the signed-in user, refreshed when close to expiry.
    pub async fn valid_id_token(&self) -> AuthResult<String> {
        let session = self.session().ok_or(AuthError::NotSignedIn)?;
        if !session.is_expired() {
            return Ok(session.id_token);
        }
        let refreshed = self.refresh_session(&session.refresh_token).await?;
        Ok(refreshed.id_token)
    }

    fn activate(&self, session: AuthSession) -> AuthResult<()> {
        self.store.save_session(&session)?;
        let user = session.user.clone();
        if let Ok(mut guard) = self.session.lock() {
            *guard = Some(session);
        }
        self.auth_state.send_if_modified(|current| {
            if current.as_ref() == Some(&user) {
                false
            } else {
                *current = Some(user);
                true
            }
        });
        Ok(())
    }

    fn deactivate(&self) -> AuthResult<()> {
        if let Ok(mut guard) = self.session.lock() {
            *guard = None;
        }
        self.auth_state.send_replace(None);
        self.store.clear_session()
    }
}

impl<S: SessionPersistence> IdentityService for FirebaseAuthClient<S> {
    async fn sign_in(&self, email: &str, password: &str) -> AuthResult<AuthUser> {
        let session = self.sign_in_with_password(email, password).await?;
        Ok(session.user)
    }

    async fn sign_out(&self) -> AuthResult<()> {
        self.deactivate()
    }

    async fn restore_session(&self) -> AuthResult<Option<AuthUser>> {
        Ok(self.restore().await?.map(|session| session.user))
    }

    fn current_user(&self) -> Option<AuthUser> {
        self.auth_state.borrow().clone()
    }

    fn subscribe_auth_state(&self) -> watch::Receiver<Option<AuthUser>> {
        self.auth_state.subscribe()
    }
}

impl<S: SessionPersistence> AccessTokenSource for FirebaseAuthClient<S> {
    async fn access_token(&self) -> AuthResult<String> {
        self.valid_id_token().await
    }
}

pub fn normalize_api_key(raw: String) -> AuthResult<String> {
    let key = raw.trim();
    if key.is_empty() {
        return Err(AuthError::InvalidConfiguration(
            "Firebase API key must not be empty",
        ));
    }
    Ok(key.to_string())
}

async fn send_json<T: serde::de::DeserializeOwned>(request: RequestBuilder) -> AuthResult<T> {
    let response = request.send().await?;
    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(AuthError::Api(parse_api_error(status, &body)));
    }
    Ok(response.json::<T>().await?)
}

fn map_credential_error(error: AuthError) -> AuthError {
    match error {
        AuthError::Api(message)
            if message.starts_with("EMAIL_NOT_FOUND")
                || message.starts_with("INVALID_PASSWORD")
                || message.starts_with("INVALID_LOGIN_CREDENTIALS") =>
        {
            AuthError::InvalidCredentials
        }
        other => other,
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignInResponse {
    id_token: Option<String>,
    refresh_token: Option<String>,
    expires_in: Option<String>,
    local_id: Option<String>,
    email: Option<String>,
}

impl SignInResponse {
    fn into_session(self) -> AuthResult<AuthSession> {
        match (self.id_token, self.refresh_token, self.local_id) {
            (Some(id_token), Some(refresh_token), Some(local_id)) => Ok(AuthSession {
                id_token,
                refresh_token,
                expires_at: expires_at_from(self.expires_in.as_deref())?,
                user: AuthUser {
                    id: local_id,
                    email: self.email,
                },
            }),
            _ => Err(AuthError::Api(
                "Sign-in response did not include enough session fields".to_string(),
            )),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    id_token: Option<String>,
    refresh_token: Option<String>,
    expires_in: Option<String>,
    user_id: Option<String>,
}

impl RefreshResponse {
    fn into_session(self, email: Option<String>) -> AuthResult<AuthSession> {
        match (self.id_token, self.refresh_token, self.user_id) {
            (Some(id_token), Some(refresh_token), Some(user_id)) => Ok(AuthSession {
                id_token,
                refresh_token,
                expires_at: expires_at_from(self.expires_in.as_deref())?,
                user: AuthUser { id: user_id, email },
            }),
            _ => Err(AuthError::Api(
                "Refresh response did not include enough session fields".to_string(),
            )),
        }
    }
}

fn expires_at_from(expires_in: Option<&str>) -> AuthResult<i64> {
    let seconds = expires_in
        .and_then(|raw| raw.trim().parse::<i64>().ok())
        .ok_or_else(|| AuthError::Api("Response did not include a valid expiresIn".to_string()))?;
    Ok(unix_timestamp_now().saturating_add(seconds))
}

#[derive(Debug, Deserialize)]
struct FirebaseErrorResponse {
    error: Option<FirebaseErrorBody>,
}

#[derive(Debug, Deserialize)]
struct FirebaseErrorBody {
    message: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<FirebaseErrorResponse>(body) {
        if let Some(message) = payload.error.and_then(|error| error.message) {
            return format!("{} ({})", message.trim(), status.as_u16());
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}
