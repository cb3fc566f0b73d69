use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::{
    models::ActionResponse, recommender::RecommendError, storage::StorageError,
    supabase::AuthProviderError,
};

/// AppError
///
/// Every failure a handler can report. Rendered as the action envelope
/// `{"success": false, "error": "..."}` with a matching status code.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Forbidden")]
    Forbidden,
    #[error("Not found")]
    NotFound,
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Recommendation(#[from] RecommendError),
    #[error(transparent)]
    Auth(#[from] AuthProviderError),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Storage(_) => StatusCode::BAD_GATEWAY,
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Recommendation(RecommendError::NotConfigured) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Recommendation(_) => StatusCode::BAD_GATEWAY,
            AppError::Auth(AuthProviderError::Rejected { .. }) => StatusCode::BAD_REQUEST,
            AppError::Auth(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// The message shown to the caller. Database and recommendation
    /// internals stay in the logs.
    fn public_message(&self) -> String {
        match self {
            AppError::Database(_) => "Database error".to_string(),
            AppError::Recommendation(_) => {
                "Could not fetch recommendations. Please try again.".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, "request rejected");
        }
        (status, Json(ActionResponse::failure(self.public_message()))).into_response()
    }
}
