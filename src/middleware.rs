use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};

use crate::{
    AppState,
    auth::{self, resolve_identity},
    policy::{Decision, Identity, RouteClass, decide, is_static_asset},
    supabase::{AuthProviderError, AuthSession},
};

/// Operational endpoints served without a session.
pub const UNGATED_PATHS: [&str; 2] = ["/health", "/api-docs/openapi.json"];

/// Outcome of the refresh attempt made for a signed-out request.
enum SessionUpdate {
    Refreshed(AuthSession),
    /// GoTrue rejected the refresh token; the stale cookies are dropped.
    Revoked,
}

/// access_control
///
/// Request-time route gating, applied in front of every page and action.
///
/// 1. Static assets and the operational endpoints pass straight through.
/// 2. The identity is resolved once (token + profile role).
/// 3. A signed-out request still carrying a refresh token gets its session
///    refreshed through Supabase before the policy runs.
/// 4. The policy decides: allow (identity and any refreshed session stored
///    in the request extensions for the handlers) or a `307` redirect.
///
/// Refreshed tokens are written back as cookies on either outcome, unless
/// the handler already set the session cookies itself (sign-in, sign-out).
/// A revoked refresh token clears both cookies.
pub async fn access_control(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let path = request.uri().path().to_string();
    if is_static_asset(&path) || UNGATED_PATHS.contains(&path.as_str()) {
        return next.run(request).await;
    }

    let headers = request.headers().clone();
    let (identity, update) = resolve_with_refresh(&state, &headers).await;
    let route = RouteClass::classify(&path);

    let response = match decide(&identity, route) {
        Decision::Allow => {
            request.extensions_mut().insert(identity);
            if let Some(SessionUpdate::Refreshed(session)) = &update {
                request.extensions_mut().insert(session.clone());
            }
            next.run(request).await
        }
        Decision::Redirect { target, reason } => {
            tracing::debug!(path = %path, to = target, ?reason, "access redirect");
            Redirect::temporary(target).into_response()
        }
    };

    if sets_session_cookie(&response) {
        return response;
    }

    let secure = state.config.cookie_secure;
    match update {
        Some(SessionUpdate::Refreshed(session)) => {
            (auth::session_cookies(&session, secure), response).into_response()
        }
        Some(SessionUpdate::Revoked) => (auth::cleared_session_cookies(secure), response).into_response(),
        None => response,
    }
}

fn sets_session_cookie(response: &Response) -> bool {
    let prefix = format!("{}=", auth::ACCESS_TOKEN_COOKIE);
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .any(|value| value.starts_with(&prefix))
}

async fn resolve_with_refresh(state: &AppState, headers: &HeaderMap) -> (Identity, Option<SessionUpdate>) {
    let identity = resolve_identity(headers, &state.config, &state.repo).await;
    if identity.is_authenticated() {
        return (identity, None);
    }

    let Some(refresh_token) = auth::refresh_token_from_headers(headers) else {
        return (identity, None);
    };

    match state.auth.refresh_session(&refresh_token).await {
        Ok(session) => {
            let identity = auth::identity_for_token(&session.access_token, &state.config, &state.repo).await;
            if identity.is_authenticated() {
                tracing::debug!("session refreshed");
                (identity, Some(SessionUpdate::Refreshed(session)))
            } else {
                (identity, None)
            }
        }
        Err(e @ AuthProviderError::Rejected { .. }) => {
            tracing::info!(error = %e, "refresh token rejected; clearing session");
            (identity, Some(SessionUpdate::Revoked))
        }
        Err(e) => {
            tracing::info!(error = %e, "session refresh failed");
            (identity, None)
        }
    }
}
