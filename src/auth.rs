//! Email/password accounts against the Supabase auth (GoTrue) REST API.

use std::path::PathBuf;

use chrono::Utc;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

use crate::config::{ConfigError, SupabaseConfig};
use crate::session::{self, Session, SessionHandle, SessionStore, User};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0}")]
    Input(String),
    #[error("Could not reach the auth server: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("{message}")]
    Rejected { status: StatusCode, message: String },
    #[error("{0}")]
    Provider(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignUpOutcome {
    SignedIn,
    ConfirmationRequired,
}

#[derive(Deserialize, Debug)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    user: User,
}

impl From<TokenResponse> for Session {
    fn from(token: TokenResponse) -> Self {
        let expires_at = token
            .expires_at
            .or_else(|| token.expires_in.map(|secs| Utc::now().timestamp() + secs));
        Session {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_at,
            user: token.user,
        }
    }
}

/// Pulls a human readable message out of a GoTrue error body.
fn provider_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| {
            ["error_description", "msg", "message", "error"]
                .iter()
                .find_map(|key| value.get(*key).and_then(Value::as_str).map(str::to_string))
        })
        .unwrap_or_else(|| format!("Auth request failed with status {}", status))
}

fn is_stale_session(status: StatusCode) -> bool {
    status == StatusCode::UNAUTHORIZED
        || status == StatusCode::FORBIDDEN
        || status == StatusCode::NOT_FOUND
}

fn require_credentials(email: &str, password: &str) -> Result<(), AuthError> {
    if email.trim().is_empty() || password.is_empty() {
        return Err(AuthError::Input(
            "Email and password are required.".to_string(),
        ));
    }
    Ok(())
}

/// Auth collaborator. Owns the session store and is its only writer.
pub struct AuthClient {
    client: Client,
    base_url: String,
    anon_key: String,
    store: SessionStore,
    session_file: Option<PathBuf>,
}

impl AuthClient {
    pub fn new(
        config: &SupabaseConfig,
        session_file: Option<PathBuf>,
    ) -> Result<Self, ConfigError> {
        let (url, anon_key) = config.credentials()?;
        Ok(Self {
            client: Client::new(),
            base_url: url.to_string(),
            anon_key: anon_key.to_string(),
            store: SessionStore::new(None),
            session_file,
        })
    }

    pub fn session(&self) -> SessionHandle {
        self.store.handle()
    }

    pub fn current_session(&self) -> Option<Session> {
        self.store.current()
    }

    #[instrument(skip(self, password))]
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<(), AuthError> {
        require_credentials(email, password)?;
        let body = json!({"email": email.trim(), "password": password});
        let response = self
            .post("/auth/v1/token?grant_type=password", &body, None)
            .await?;
        let token: TokenResponse = serde_json::from_value(response).map_err(|e| {
            error!(error = %e, "Unexpected sign-in response");
            AuthError::Provider("Unexpected response from auth server".to_string())
        })?;
        info!(user = %token.user.id, "Signed in");
        self.set_session(Some(token.into()));
        Ok(())
    }

    #[instrument(skip(self, password))]
    pub async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpOutcome, AuthError> {
        require_credentials(email, password)?;
        let body = json!({"email": email.trim(), "password": password});
        let response = self.post("/auth/v1/signup", &body, None).await?;

        // With email confirmation on, GoTrue answers with the bare user.
        if response.get("access_token").is_none() {
            info!("Sign-up needs email confirmation");
            return Ok(SignUpOutcome::ConfirmationRequired);
        }
        let token: TokenResponse = serde_json::from_value(response).map_err(|e| {
            error!(error = %e, "Unexpected sign-up response");
            AuthError::Provider("Unexpected response from auth server".to_string())
        })?;
        self.set_session(Some(token.into()));
        Ok(SignUpOutcome::SignedIn)
    }

    /// Revokes the session server side and forgets it locally. A session the
    /// server no longer knows is forgotten as well.
    #[instrument(skip(self))]
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        let Some(current) = self.store.current() else {
            debug!("Sign-out without a session");
            self.set_session(None);
            return Ok(());
        };

        match self
            .post("/auth/v1/logout", &json!({}), Some(&current.access_token))
            .await
        {
            Ok(_) => {}
            Err(AuthError::Rejected { status, message }) if is_stale_session(status) => {
                warn!(%status, %message, "Server no longer knows this session");
            }
            Err(e) => return Err(e),
        }
        info!("Signed out");
        self.set_session(None);
        Ok(())
    }

    /// Loads the stored session, refreshing it when expired, and publishes
    /// whatever survives. Failures only leave the user signed out.
    ///
    /// The stored file is dropped only when the server rejects the refresh.
    /// When the server cannot be reached it is kept for the next attempt.
    pub async fn restore_session(&self) -> Option<Session> {
        let path = self.session_file.as_ref()?;
        let stored = session::load_session(path)?;

        if !stored.is_expired(Utc::now()) {
            self.set_session(Some(stored.clone()));
            return Some(stored);
        }

        info!("Stored session expired, refreshing");
        match self.refresh(&stored.refresh_token).await {
            Ok(fresh) => {
                self.set_session(Some(fresh.clone()));
                Some(fresh)
            }
            Err(AuthError::Transport(e)) => {
                warn!(error = %e, "Auth server unreachable, keeping stored session");
                self.store.publish(None);
                None
            }
            Err(e) => {
                warn!(error = %e, "Stored session was rejected");
                self.set_session(None);
                None
            }
        }
    }

    async fn refresh(&self, refresh_token: &str) -> Result<Session, AuthError> {
        let body = json!({"refresh_token": refresh_token});
        let response = self
            .post("/auth/v1/token?grant_type=refresh_token", &body, None)
            .await?;
        let token: TokenResponse = serde_json::from_value(response)
            .map_err(|_| AuthError::Provider("Unexpected response from auth server".to_string()))?;
        Ok(token.into())
    }

    fn set_session(&self, session: Option<Session>) {
        if let Some(path) = &self.session_file {
            let stored = match &session {
                Some(s) => session::save_session(path, s),
                None => session::clear_session(path),
            };
            if let Err(e) = stored {
                warn!(path = %path.display(), error = %e, "Could not persist session");
            }
        }
        self.store.publish(session);
    }

    async fn post(
        &self,
        path: &str,
        body: &Value,
        bearer: Option<&str>,
    ) -> Result<Value, AuthError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, "Auth request");

        let response = self
            .client
            .post(&url)
            .header("apikey", &self.anon_key)
            .bearer_auth(bearer.unwrap_or(self.anon_key.as_str()))
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let raw = response.text().await?;
        if !status.is_success() {
            let message = provider_message(status, &raw);
            error!(%status, %message, "Auth request failed");
            return Err(AuthError::Rejected { status, message });
        }

        if raw.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&raw)
            .map_err(|_| AuthError::Provider("Unexpected response from auth server".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_message_keys() {
        let status = StatusCode::BAD_REQUEST;
        assert_eq!(
            provider_message(
                status,
                r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#
            ),
            "Invalid login credentials"
        );
        assert_eq!(
            provider_message(
                status,
                r#"{"code":422,"msg":"Password should be at least 6 characters"}"#
            ),
            "Password should be at least 6 characters"
        );
        assert_eq!(
            provider_message(status, "<html>"),
            "Auth request failed with status 400 Bad Request"
        );
    }

    #[test]
    fn test_require_credentials() {
        assert!(matches!(require_credentials("", "pw"), Err(AuthError::Input(_))));
        assert!(matches!(require_credentials("a@b.c", ""), Err(AuthError::Input(_))));
        assert!(require_credentials("a@b.c", "pw").is_ok());
    }

    #[test]
    fn test_token_expiry_from_expires_in() {
        let token: TokenResponse = serde_json::from_value(json!({
            "access_token": "a",
            "refresh_token": "r",
            "expires_in": 3600,
            "user": {"id": "u"}
        }))
        .unwrap();
        let session: Session = token.into();
        let expires_at = session.expires_at.unwrap();
        assert!(expires_at > Utc::now().timestamp());
        assert!(!session.is_expired(Utc::now()));
    }

    #[test]
    fn test_client_requires_backend_config() {
        let err = AuthClient::new(&SupabaseConfig::default(), None).err();
        assert_eq!(err, Some(ConfigError::MissingBackend));
    }
}
