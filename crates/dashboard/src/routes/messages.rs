//! Message routes.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use conversation_store::{Message, MessageKind, MessageStatus};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::error::{DashboardError, Result};
use crate::state::AppState;

/// Optional conversation filter.
#[derive(Debug, Default, Deserialize)]
pub struct MessageQuery {
    pub phone: Option<String>,
}

/// Request to record a locally composed message.
#[derive(Debug, Deserialize)]
pub struct ComposeRequest {
    /// Client-chosen id; generated when absent.
    #[serde(default)]
    pub id: Option<String>,
    pub to: String,
    pub text: String,
    #[serde(rename = "type", default)]
    pub kind: MessageKind,
}

/// Request to overwrite a message status.
#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: MessageStatus,
}

/// List messages, optionally limited to one conversation.
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<MessageQuery>,
) -> Json<Vec<Message>> {
    let phone = query.phone.as_deref().filter(|p| !p.is_empty());
    Json(state.store.messages(phone))
}

/// Record an outbound message with status `sent`.
pub async fn compose(
    State(state): State<AppState>,
    Json(req): Json<ComposeRequest>,
) -> Result<(StatusCode, Json<Message>)> {
    if req.to.trim().is_empty() {
        return Err(DashboardError::BadRequest("recipient is required".to_string()));
    }
    if req.text.trim().is_empty() {
        return Err(DashboardError::BadRequest("text is required".to_string()));
    }

    let id = req
        .id
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let message = Message::outbound(id, state.config.phone_number_id.as_str(), req.to.trim(), req.text)
        .with_kind(req.kind);

    info!(id = %message.id, to = %message.to, "Recording outbound message");
    state.store.insert_message(message.clone());

    Ok((StatusCode::CREATED, Json(message)))
}

/// Retract a message, e.g. after a failed send.
pub async fn remove(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Message>> {
    let removed = state
        .store
        .remove_message(&id)
        .ok_or_else(|| DashboardError::NotFound(format!("message {}", id)))?;

    info!(id = %removed.id, "Message retracted");
    Ok(Json(removed))
}

/// Overwrite the status of a message. Unknown ids are ignored.
pub async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<StatusRequest>,
) -> StatusCode {
    state.store.update_message_status(&id, req.status);
    StatusCode::NO_CONTENT
}
