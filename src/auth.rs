use axum::{
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, header, request::Parts},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use jsonwebtoken::{DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    config::{AppConfig, Env},
    error::AppError,
    policy::{Identity, Role, SessionUser},
    repository::RepositoryState,
    supabase::AuthSession,
};

/// Cookie holding the Supabase access token (JWT).
pub const ACCESS_TOKEN_COOKIE: &str = "sb-access-token";
/// Cookie holding the Supabase refresh token.
pub const REFRESH_TOKEN_COOKIE: &str = "sb-refresh-token";
/// Audience Supabase stamps on tokens of signed-in users.
pub const SUPABASE_AUDIENCE: &str = "authenticated";
/// Refresh tokens are long lived on the Supabase side; the cookie follows suit.
const REFRESH_COOKIE_MAX_AGE_DAYS: i64 = 30;
/// Development-only header naming an existing profile id.
pub const LOCAL_BYPASS_HEADER: &str = "x-user-id";

/// Claims
///
/// The subset of a Supabase access token this service relies on.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// The user's id (`auth.users.id`, mirrored by `public.profiles.id`).
    pub sub: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub aud: String,
    pub exp: usize,
    pub iat: usize,
}

/// decode_access_token
///
/// Verifies signature (HS256 with the project JWT secret), expiry and
/// audience.
pub fn decode_access_token(token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let mut validation = Validation::default();
    validation.validate_exp = true;
    validation.set_audience(&[SUPABASE_AUDIENCE]);

    decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map(|data| data.claims)
}

/// The access token carried by a request: `Authorization: Bearer` first,
/// then the session cookie.
pub fn access_token_from_headers(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty());

    match bearer {
        Some(token) => Some(token.to_string()),
        None => cookie_value(headers, ACCESS_TOKEN_COOKIE),
    }
}

pub fn refresh_token_from_headers(headers: &HeaderMap) -> Option<String> {
    cookie_value(headers, REFRESH_TOKEN_COOKIE)
}

fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    CookieJar::from_headers(headers)
        .get(name)
        .map(|cookie| cookie.value().to_string())
        .filter(|value| !value.is_empty())
}

/// identity_for_token
///
/// Turns an access token into an `Identity`. An invalid or expired token is
/// anonymous. A failed profile lookup is logged and treated as "no
/// profile": the user stays signed in but is not an admin.
pub async fn identity_for_token(token: &str, config: &AppConfig, repo: &RepositoryState) -> Identity {
    let claims = match decode_access_token(token, &config.jwt_secret) {
        Ok(claims) => claims,
        Err(e) => {
            tracing::debug!(error = %e, "access token rejected");
            return Identity::anonymous();
        }
    };

    let role = match repo.get_profile(claims.sub).await {
        Ok(Some(profile)) => profile.role(),
        Ok(None) => None,
        Err(e) => {
            tracing::warn!(user_id = %claims.sub, error = %e, "profile lookup failed; treating as non-admin");
            None
        }
    };

    Identity::authenticated(
        SessionUser {
            id: claims.sub,
            email: claims.email,
        },
        role,
    )
}

/// resolve_identity
///
/// The Identity Resolver used by the access middleware and, when the
/// middleware did not run, by the extractors below.
///
/// In `Env::Local` an `x-user-id` header naming an existing profile
/// authenticates the request without a token. The bypass is ignored in
/// production.
pub async fn resolve_identity(headers: &HeaderMap, config: &AppConfig, repo: &RepositoryState) -> Identity {
    if config.env == Env::Local {
        let bypass_id = headers
            .get(LOCAL_BYPASS_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|raw| Uuid::parse_str(raw).ok());
        if let Some(user_id) = bypass_id {
            if let Ok(Some(profile)) = repo.get_profile(user_id).await {
                let role = profile.role();
                return Identity::authenticated(
                    SessionUser {
                        id: profile.id,
                        email: Some(profile.email),
                    },
                    role,
                );
            }
        }
    }

    match access_token_from_headers(headers) {
        Some(token) => identity_for_token(&token, config, repo).await,
        None => Identity::anonymous(),
    }
}

/// AuthUser
///
/// Extractor for handlers that need a signed-in user. Reuses the `Identity`
/// the access middleware stored in the request extensions; resolves it
/// itself only when the middleware is not in front of the handler.
///
/// Rejection: `AppError::Unauthorized` (401).
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: Option<String>,
    pub role: Option<Role>,
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let identity = match parts.extensions.get::<Identity>() {
            Some(identity) => identity.clone(),
            None => {
                let repo = RepositoryState::from_ref(state);
                let config = AppConfig::from_ref(state);
                let identity = resolve_identity(&parts.headers, &config, &repo).await;
                parts.extensions.insert(identity.clone());
                identity
            }
        };

        let user = identity.user().ok_or(AppError::Unauthorized)?;
        Ok(AuthUser {
            id: user.id,
            email: user.email.clone(),
            role: identity.role(),
        })
    }
}

/// AdminUser
///
/// `AuthUser` whose profile role is `admin`. Admin handlers take this even
/// though the middleware already gates `/admin`.
///
/// Rejection: 401 when signed out, 403 for any other role.
#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthUser);

impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if user.role != Some(Role::Admin) {
            return Err(AppError::Forbidden);
        }
        Ok(AdminUser(user))
    }
}

// --- Session cookies ---

fn session_cookie(name: &'static str, value: String, secure: bool, max_age: time::Duration) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(max_age)
        .build()
}

/// Cookie delta storing a freshly issued session.
pub fn session_cookies(session: &AuthSession, secure: bool) -> CookieJar {
    CookieJar::new()
        .add(session_cookie(
            ACCESS_TOKEN_COOKIE,
            session.access_token.clone(),
            secure,
            time::Duration::seconds(session.expires_in.max(0)),
        ))
        .add(session_cookie(
            REFRESH_TOKEN_COOKIE,
            session.refresh_token.clone(),
            secure,
            time::Duration::days(REFRESH_COOKIE_MAX_AGE_DAYS),
        ))
}

/// Cookie delta expiring both session cookies.
pub fn cleared_session_cookies(secure: bool) -> CookieJar {
    CookieJar::new()
        .add(session_cookie(ACCESS_TOKEN_COOKIE, String::new(), secure, time::Duration::ZERO))
        .add(session_cookie(REFRESH_TOKEN_COOKIE, String::new(), secure, time::Duration::ZERO))
}
