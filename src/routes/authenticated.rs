use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Signed-in Routes
///
/// Reachable by any authenticated user; anonymous visitors are sent to
/// `/login` before the handler runs.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /?search=&genre=&type=
        // The catalog home page.
        .route("/", get(handlers::catalog))
        // GET /aulas
        .route("/aulas", get(handlers::video_lessons))
        // GET /contents/{id}/download
        // Redirects to the file; demo accounts get 403.
        .route("/contents/{id}/download", get(handlers::download_content))
        // POST /recommendations
        .route("/recommendations", post(handlers::recommend_genres))
        // POST /logout
        .route("/logout", post(handlers::logout))
}
