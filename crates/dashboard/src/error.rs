//! Error types for the dashboard service.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;
use whatsapp_webhook::WebhookError;

/// Errors that can occur in the dashboard service.
#[derive(Debug, Error)]
pub enum DashboardError {
    /// Webhook request could not be handled.
    #[error("Webhook error: {0}")]
    Webhook(#[from] WebhookError),

    /// Requested resource does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Request was well-formed but invalid.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl IntoResponse for DashboardError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            DashboardError::Webhook(WebhookError::Verification(reason)) => {
                tracing::warn!("Webhook verification failed: {}", reason);
                return (StatusCode::FORBIDDEN, "Forbidden").into_response();
            }
            DashboardError::Webhook(err) => {
                tracing::error!("Webhook error: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            DashboardError::NotFound(what) => (StatusCode::NOT_FOUND, format!("{} not found", what)),
            DashboardError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
        };

        let body = serde_json::json!({
            "error": message
        });

        (status, Json(body)).into_response()
    }
}

/// Result type for dashboard handlers.
pub type Result<T> = std::result::Result<T, DashboardError>;
