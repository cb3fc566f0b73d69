mod common;

use axum::{
    extract::FromRequestParts,
    http::{Method, Request, Uri, header, request::Parts},
};
use common::{
    ADMIN_ID, DEMO_ID, InMemoryRepository, NO_PROFILE_ID, READER_ID, TEST_JWT_SECRET, app_state,
    create_token, create_token_with, seeded_repo,
};
use digital_library::{
    AppError, AppState,
    auth::{
        ACCESS_TOKEN_COOKIE, AdminUser, AuthUser, REFRESH_TOKEN_COOKIE, SUPABASE_AUDIENCE,
        access_token_from_headers, cleared_session_cookies, decode_access_token, identity_for_token,
        refresh_token_from_headers, resolve_identity, session_cookies,
    },
    config::Env,
    policy::Role,
    repository::RepositoryState,
    supabase::AuthSession,
};
use std::sync::Arc;

// --- Helper Functions ---

fn get_request_parts(method: Method, uri: Uri) -> Parts {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(axum::body::Body::empty())
        .unwrap();
    let (parts, _) = request.into_parts();
    parts
}

fn parts_with_bearer(token: &str) -> Parts {
    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    parts.headers.insert(
        header::AUTHORIZATION,
        header::HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
    );
    parts
}

fn production_state(repo: InMemoryRepository) -> AppState {
    let mut state = app_state(repo);
    state.config.env = Env::Production;
    state
}

// --- Token verification ---

#[test]
fn test_decode_valid_token() {
    let token = create_token(READER_ID);
    let claims = decode_access_token(&token, TEST_JWT_SECRET).unwrap();

    assert_eq!(claims.sub, READER_ID);
    assert_eq!(claims.aud, SUPABASE_AUDIENCE);
    assert_eq!(claims.email.as_deref(), Some("reader@library.test"));
}

#[test]
fn test_decode_rejects_wrong_secret_expiry_and_audience() {
    let wrong_secret = create_token_with(READER_ID, "another-secret", SUPABASE_AUDIENCE, 3600);
    assert!(decode_access_token(&wrong_secret, TEST_JWT_SECRET).is_err());

    let expired = create_token_with(READER_ID, TEST_JWT_SECRET, SUPABASE_AUDIENCE, -3600);
    assert!(decode_access_token(&expired, TEST_JWT_SECRET).is_err());

    let anon_audience = create_token_with(READER_ID, TEST_JWT_SECRET, "anon", 3600);
    assert!(decode_access_token(&anon_audience, TEST_JWT_SECRET).is_err());

    assert!(decode_access_token("not-a-jwt", TEST_JWT_SECRET).is_err());
}

// --- Token extraction ---

#[test]
fn test_bearer_header_wins_over_cookie() {
    let mut parts = parts_with_bearer("from-header");
    parts.headers.insert(
        header::COOKIE,
        header::HeaderValue::from_static("sb-access-token=from-cookie; sb-refresh-token=refresh-1"),
    );

    assert_eq!(access_token_from_headers(&parts.headers).as_deref(), Some("from-header"));
    assert_eq!(refresh_token_from_headers(&parts.headers).as_deref(), Some("refresh-1"));
}

#[test]
fn test_cookie_token_is_used_without_header() {
    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    parts.headers.insert(
        header::COOKIE,
        header::HeaderValue::from_static("theme=dark; sb-access-token=from-cookie"),
    );

    assert_eq!(access_token_from_headers(&parts.headers).as_deref(), Some("from-cookie"));
    assert_eq!(refresh_token_from_headers(&parts.headers), None);
}

#[test]
fn test_empty_credentials_are_ignored() {
    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    parts.headers.insert(header::AUTHORIZATION, header::HeaderValue::from_static("Bearer "));
    parts.headers.insert(header::COOKIE, header::HeaderValue::from_static("sb-access-token="));

    assert_eq!(access_token_from_headers(&parts.headers), None);
}

// --- Identity resolution ---

#[tokio::test]
async fn test_identity_carries_profile_role() {
    let state = app_state(seeded_repo());
    let repo: RepositoryState = state.repo.clone();

    let admin = identity_for_token(&create_token(ADMIN_ID), &state.config, &repo).await;
    assert!(admin.is_admin());

    let demo = identity_for_token(&create_token(DEMO_ID), &state.config, &repo).await;
    assert!(demo.is_authenticated());
    assert_eq!(demo.role(), Some(Role::Demo));
}

#[tokio::test]
async fn test_missing_profile_is_signed_in_without_role() {
    let state = app_state(seeded_repo());

    let identity = identity_for_token(&create_token(NO_PROFILE_ID), &state.config, &state.repo).await;

    assert!(identity.is_authenticated());
    assert_eq!(identity.role(), None);
    assert!(!identity.is_admin());
}

#[tokio::test]
async fn test_profile_lookup_failure_is_non_admin() {
    let repo = InMemoryRepository {
        fail_profile_lookup: true,
        ..seeded_repo()
    };
    let state = app_state(repo);

    let identity = identity_for_token(&create_token(ADMIN_ID), &state.config, &state.repo).await;

    assert!(identity.is_authenticated());
    assert!(!identity.is_admin());
}

#[tokio::test]
async fn test_invalid_token_is_anonymous() {
    let state = app_state(seeded_repo());
    let expired = create_token_with(ADMIN_ID, TEST_JWT_SECRET, SUPABASE_AUDIENCE, -3600);

    let identity = identity_for_token(&expired, &state.config, &state.repo).await;

    assert!(!identity.is_authenticated());
}

#[tokio::test]
async fn test_local_bypass_requires_existing_profile() {
    let state = app_state(seeded_repo());

    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    parts.headers.insert("x-user-id", header::HeaderValue::from_str(&ADMIN_ID.to_string()).unwrap());
    let identity = resolve_identity(&parts.headers, &state.config, &state.repo).await;
    assert!(identity.is_admin());

    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    parts
        .headers
        .insert("x-user-id", header::HeaderValue::from_str(&NO_PROFILE_ID.to_string()).unwrap());
    let identity = resolve_identity(&parts.headers, &state.config, &state.repo).await;
    assert!(!identity.is_authenticated());
}

// --- Extractors ---

#[tokio::test]
async fn test_auth_user_from_valid_jwt() {
    let state = production_state(seeded_repo());
    let mut parts = parts_with_bearer(&create_token(READER_ID));

    let user = AuthUser::from_request_parts(&mut parts, &state).await.unwrap();

    assert_eq!(user.id, READER_ID);
    assert_eq!(user.role, Some(Role::User));
}

#[tokio::test]
async fn test_auth_user_missing_credentials_is_unauthorized() {
    let state = production_state(seeded_repo());
    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());

    let result = AuthUser::from_request_parts(&mut parts, &state).await;

    assert!(matches!(result, Err(AppError::Unauthorized)));
}

#[tokio::test]
async fn test_local_bypass_disabled_in_prod() {
    let state = production_state(seeded_repo());
    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    parts.headers.insert("x-user-id", header::HeaderValue::from_str(&ADMIN_ID.to_string()).unwrap());

    let result = AuthUser::from_request_parts(&mut parts, &state).await;

    assert!(matches!(result, Err(AppError::Unauthorized)));
}

#[tokio::test]
async fn test_admin_user_rejects_other_roles() {
    let state = production_state(seeded_repo());

    let mut parts = parts_with_bearer(&create_token(ADMIN_ID));
    let admin = AdminUser::from_request_parts(&mut parts, &state).await.unwrap();
    assert_eq!(admin.0.id, ADMIN_ID);

    for id in [READER_ID, DEMO_ID, NO_PROFILE_ID] {
        let mut parts = parts_with_bearer(&create_token(id));
        let result = AdminUser::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AppError::Forbidden)), "user {}", id);
    }
}

#[tokio::test]
async fn test_extractor_reuses_identity_from_extensions() {
    // The repository would fail a lookup; the stored identity must be used instead.
    let state = AppState {
        repo: Arc::new(InMemoryRepository {
            fail_profile_lookup: true,
            ..InMemoryRepository::new()
        }),
        ..production_state(seeded_repo())
    };
    let healthy = app_state(seeded_repo());
    let prepared = identity_for_token(&create_token(ADMIN_ID), &healthy.config, &healthy.repo).await;

    let mut parts = get_request_parts(Method::GET, "/admin".parse().unwrap());
    parts.extensions.insert(prepared);

    let admin = AdminUser::from_request_parts(&mut parts, &state).await.unwrap();
    assert_eq!(admin.0.role, Some(Role::Admin));
}

// --- Session cookies ---

#[test]
fn test_session_cookies_are_http_only() {
    let session = AuthSession {
        access_token: "access-1".to_string(),
        refresh_token: "refresh-1".to_string(),
        expires_in: 3600,
        user: None,
    };

    let jar = session_cookies(&session, true);
    let access = jar.get(ACCESS_TOKEN_COOKIE).unwrap();
    let refresh = jar.get(REFRESH_TOKEN_COOKIE).unwrap();

    assert_eq!(access.value(), "access-1");
    assert_eq!(refresh.value(), "refresh-1");
    assert_eq!(access.http_only(), Some(true));
    assert_eq!(access.secure(), Some(true));
    assert_eq!(access.path(), Some("/"));
    assert_eq!(access.max_age(), Some(time::Duration::seconds(3600)));
}

#[test]
fn test_cleared_cookies_expire_immediately() {
    let jar = cleared_session_cookies(false);

    for name in [ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE] {
        let cookie = jar.get(name).unwrap();
        assert_eq!(cookie.value(), "");
        assert_eq!(cookie.max_age(), Some(time::Duration::ZERO));
    }
}
