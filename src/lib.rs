use axum::{
    Json, Router,
    extract::FromRef,
    http::HeaderName,
    middleware::from_fn_with_state,
    routing::get,
};
use utoipa::OpenApi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Access policy and the request-time gate in front of every route.
pub mod auth;
pub mod middleware;
pub mod policy;

// Services behind the handlers.
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod recommender;
pub mod repository;
pub mod storage;
pub mod supabase;

// Route groups (auth pages, signed-in pages, admin).
pub mod routes;
use routes::{admin, authenticated, public};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use error::AppError;
pub use recommender::RecommenderState;
pub use repository::{PostgresRepository, RepositoryState};
pub use storage::{MockStorageService, S3StorageClient, StorageState};
pub use supabase::{AuthState, SupabaseAuthClient};

/// ApiDoc
///
/// OpenAPI document for the JSON endpoints, served at
/// `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::catalog, handlers::video_lessons, handlers::download_content,
        handlers::recommend_genres, handlers::admin_dashboard, handlers::upsert_content,
        handlers::delete_content, handlers::create_video_lesson, handlers::update_video_lesson,
        handlers::delete_video_lesson
    ),
    components(
        schemas(
            models::Content, models::ContentKind, models::VideoLesson, models::LessonView,
            models::CatalogPage, models::AdminDashboard, models::VideoLessonRequest,
            models::RecommendGenresRequest, models::RecommendGenresResponse,
            models::ActionResponse, models::Profile, policy::Role,
        )
    ),
    tags(
        (name = "digital-library", description = "Digital Library API")
    )
)]
pub struct ApiDoc;

/// AppState
///
/// Shared, cheaply clonable container of every service a request may need.
#[derive(Clone)]
pub struct AppState {
    /// Profiles, contents and video lessons (Postgres).
    pub repo: RepositoryState,
    /// Cover image bucket (Supabase Storage over its S3 API).
    pub storage: StorageState,
    /// AI genre suggestions.
    pub recommender: RecommenderState,
    /// Supabase GoTrue (sign-in, sign-up, refresh, sign-out).
    pub auth: AuthState,
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for StorageState {
    fn from_ref(app_state: &AppState) -> StorageState {
        app_state.storage.clone()
    }
}

impl FromRef<AppState> for RecommenderState {
    fn from_ref(app_state: &AppState) -> RecommenderState {
        app_state.recommender.clone()
    }
}

impl FromRef<AppState> for AuthState {
    fn from_ref(app_state: &AppState) -> AuthState {
        app_state.auth.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// create_router
///
/// Assembles every route behind the access middleware, then the
/// observability and CORS layers.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    // The access layer also wraps the fallback, so unknown paths are gated too.
    let base_router = Router::new()
        .merge(public::public_routes())
        .merge(authenticated::authenticated_routes())
        .nest("/admin", admin::admin_routes())
        .route("/health", get(|| async { "ok" }))
        .route("/api-docs/openapi.json", get(openapi_json))
        .fallback(handlers::not_found)
        .layer(from_fn_with_state(state.clone(), middleware::access_control))
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Span for `TraceLayer`: method, URI and the `x-request-id` so every log
/// line of one request can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
