//! Supabase GoTrue client.
//!
//! Sign-in, sign-up, refresh and sign-out are forwarded to
//! `{SUPABASE_URL}/auth/v1`. Tokens are minted by Supabase; this service only
//! stores them in cookies and verifies them (see `auth`).

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum AuthProviderError {
    /// GoTrue answered with a non-success status (bad credentials, weak
    /// password, email already registered, expired refresh token...).
    #[error("{message}")]
    Rejected { status: u16, message: String },
    #[error("auth service unreachable: {0}")]
    Transport(String),
    #[error("unexpected auth service response: {0}")]
    Decode(String),
}

/// The user object embedded in GoTrue responses.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct AuthUserRecord {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
}

/// AuthSession
///
/// Token pair returned by the password and refresh-token grants.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct AuthSession {
    pub access_token: String,
    pub refresh_token: String,
    /// Lifetime of the access token in seconds.
    pub expires_in: i64,
    #[serde(default)]
    pub user: Option<AuthUserRecord>,
}

/// Sign-up answers with a session when email confirmation is off, or with
/// the bare user when a confirmation mail was sent.
#[derive(Debug, Deserialize)]
struct SignUpResponse {
    #[serde(default)]
    id: Option<Uuid>,
    #[serde(default)]
    user: Option<AuthUserRecord>,
}

/// GoTrue reports errors under different keys depending on the endpoint.
#[derive(Debug, Default, Deserialize)]
struct GoTrueErrorBody {
    error_description: Option<String>,
    msg: Option<String>,
    message: Option<String>,
    error: Option<String>,
}

/// AuthProvider
///
/// The credential operations the web layer needs. Implemented against
/// Supabase in production and by `MockAuthProvider` in tests.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthSession, AuthProviderError>;

    /// Registers the user; returns the new user id when GoTrue discloses it.
    async fn sign_up(&self, email: &str, password: &str) -> Result<Option<Uuid>, AuthProviderError>;

    async fn refresh_session(&self, refresh_token: &str) -> Result<AuthSession, AuthProviderError>;

    async fn sign_out(&self, access_token: &str) -> Result<(), AuthProviderError>;
}

pub type AuthState = Arc<dyn AuthProvider>;

/// SupabaseAuthClient
pub struct SupabaseAuthClient {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
}

impl SupabaseAuthClient {
    pub fn new(supabase_url: &str, anon_key: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: format!("{}/auth/v1", supabase_url.trim_end_matches('/')),
            anon_key: anon_key.to_string(),
        }
    }

    async fn post_json(
        &self,
        path: &str,
        bearer: Option<&str>,
        body: serde_json::Value,
    ) -> Result<String, AuthProviderError> {
        let mut request = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .header("apikey", &self.anon_key)
            .json(&body);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AuthProviderError::Transport(e.to_string()))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| AuthProviderError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(AuthProviderError::Rejected {
                status: status.as_u16(),
                message: gotrue_error_message(&text),
            });
        }
        Ok(text)
    }
}

/// Picks the human-readable message out of a GoTrue error body.
pub fn gotrue_error_message(body: &str) -> String {
    let parsed: GoTrueErrorBody = serde_json::from_str(body).unwrap_or_default();
    parsed
        .error_description
        .or(parsed.msg)
        .or(parsed.message)
        .or(parsed.error)
        .unwrap_or_else(|| "Authentication failed".to_string())
}

fn decode<T: serde::de::DeserializeOwned>(text: &str) -> Result<T, AuthProviderError> {
    serde_json::from_str(text).map_err(|e| AuthProviderError::Decode(e.to_string()))
}

#[async_trait]
impl AuthProvider for SupabaseAuthClient {
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthSession, AuthProviderError> {
        let text = self
            .post_json(
                "/token?grant_type=password",
                None,
                serde_json::json!({ "email": email, "password": password }),
            )
            .await?;
        decode(&text)
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<Option<Uuid>, AuthProviderError> {
        let text = self
            .post_json(
                "/signup",
                None,
                serde_json::json!({ "email": email, "password": password }),
            )
            .await?;
        let response: SignUpResponse = decode(&text)?;
        Ok(response.user.map(|u| u.id).or(response.id))
    }

    async fn refresh_session(&self, refresh_token: &str) -> Result<AuthSession, AuthProviderError> {
        let text = self
            .post_json(
                "/token?grant_type=refresh_token",
                None,
                serde_json::json!({ "refresh_token": refresh_token }),
            )
            .await?;
        decode(&text)
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), AuthProviderError> {
        self.post_json("/logout", Some(access_token), serde_json::json!({}))
            .await
            .map(|_| ())
    }
}

/// MockAuthProvider
///
/// Scripted stand-in for tests. Sign-in succeeds only with `password`,
/// returning `session`; refresh returns `refreshed` when set. Sign-out
/// records the token it was called with.
#[derive(Clone, Default)]
pub struct MockAuthProvider {
    pub password: String,
    pub session: Option<AuthSession>,
    pub refreshed: Option<AuthSession>,
    pub signed_up_id: Option<Uuid>,
    pub signed_out: Arc<Mutex<Vec<String>>>,
}

impl MockAuthProvider {
    pub fn signed_out_tokens(&self) -> Vec<String> {
        self.signed_out.lock().map(|tokens| tokens.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl AuthProvider for MockAuthProvider {
    async fn sign_in_with_password(
        &self,
        _email: &str,
        password: &str,
    ) -> Result<AuthSession, AuthProviderError> {
        match &self.session {
            Some(session) if password == self.password => Ok(session.clone()),
            _ => Err(AuthProviderError::Rejected {
                status: 400,
                message: "Invalid login credentials".to_string(),
            }),
        }
    }

    async fn sign_up(&self, _email: &str, _password: &str) -> Result<Option<Uuid>, AuthProviderError> {
        Ok(self.signed_up_id)
    }

    async fn refresh_session(&self, _refresh_token: &str) -> Result<AuthSession, AuthProviderError> {
        self.refreshed.clone().ok_or(AuthProviderError::Rejected {
            status: 400,
            message: "Invalid Refresh Token".to_string(),
        })
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), AuthProviderError> {
        if let Ok(mut tokens) = self.signed_out.lock() {
            tokens.push(access_token.to_string());
        }
        Ok(())
    }
}
