use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Auth Page Routes
///
/// Signed-in users are redirected away from these to `/` by the access
/// middleware.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET/POST /login
        // Form page and password sign-in; success sets the session cookies.
        .route("/login", get(handlers::login_page).post(handlers::login))
        // GET/POST /signup
        .route("/signup", get(handlers::signup_page).post(handlers::signup))
}
