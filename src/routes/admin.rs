use crate::{AppState, handlers};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{delete, get, post, put},
};

/// Upper bound for the multipart content form (cover image included).
const MAX_CONTENT_FORM_BYTES: usize = 10 * 1024 * 1024;

/// Admin Routes
///
/// Nested under `/admin`. The access middleware sends non-admins to `/`;
/// the handlers check the role again through `AdminUser`.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // GET /admin
        // Dashboard: all contents and lessons, newest first.
        .route("/", get(handlers::admin_dashboard))
        // POST /admin/contents
        // Multipart create-or-update (an `id` field means update).
        .route(
            "/contents",
            post(handlers::upsert_content).layer(DefaultBodyLimit::max(MAX_CONTENT_FORM_BYTES)),
        )
        .route("/contents/{id}", delete(handlers::delete_content))
        .route("/lessons", post(handlers::create_video_lesson))
        .route(
            "/lessons/{id}",
            put(handlers::update_video_lesson).delete(handlers::delete_video_lesson),
        )
}
