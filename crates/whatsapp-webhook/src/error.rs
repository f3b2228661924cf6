//! Error types for whatsapp-webhook.

use thiserror::Error;

/// Errors that can occur while handling provider webhook requests.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// Request body was not a valid webhook envelope.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Verification handshake was rejected.
    #[error("Verification failed: {0}")]
    Verification(&'static str),
}
