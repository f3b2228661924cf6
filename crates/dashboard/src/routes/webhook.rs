//! Provider webhook endpoint.

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::Json;
use serde::Serialize;
use tracing::info;
use whatsapp_webhook::{dispatch, VerifyRequest, WebhookPayload};

use crate::error::Result;
use crate::state::AppState;

/// Acknowledgement returned for every accepted delivery.
#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub status: String,
}

/// Answer the provider's verification handshake by echoing the challenge.
pub async fn verify(
    State(state): State<AppState>,
    Query(request): Query<VerifyRequest>,
) -> Result<String> {
    let challenge = request.verify(&state.config.verify_token)?;
    info!("Webhook verified");
    Ok(challenge)
}

/// Receive a webhook delivery and apply its events to the store.
///
/// The body is parsed in full before anything is applied, so a malformed
/// delivery leaves the store untouched.
pub async fn receive(State(state): State<AppState>, body: Bytes) -> Result<Json<WebhookAck>> {
    let payload = WebhookPayload::from_slice(&body)?;
    let summary = dispatch(payload.events(), &state.store);

    info!(
        object = %payload.object,
        messages = summary.messages,
        statuses = summary.statuses,
        "Webhook processed"
    );

    Ok(Json(WebhookAck {
        status: "ok".to_string(),
    }))
}
