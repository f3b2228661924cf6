//! Dashboard statistics.

use axum::extract::State;
use axum::Json;
use conversation_store::ConversationStats;

use crate::state::AppState;

/// Get conversation statistics as JSON.
pub async fn stats_api(State(state): State<AppState>) -> Json<ConversationStats> {
    Json(state.store.stats())
}
