//! Health check endpoint.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct Health {
    pub status: String,
    pub messages: usize,
    pub contacts: usize,
}

/// Health check endpoint with store sizes.
pub async fn health(State(state): State<AppState>) -> Json<Health> {
    let stats = state.store.stats();
    Json(Health {
        status: "ok".to_string(),
        messages: stats.total_messages,
        contacts: stats.contact_count,
    })
}
