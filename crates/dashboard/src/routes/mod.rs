//! Route handlers for the dashboard service.

pub mod contacts;
pub mod dashboard;
pub mod events;
pub mod health;
pub mod messages;
pub mod webhook;

use axum::routing::{delete, get, post, put};
use axum::Router;

use crate::state::AppState;

/// Build the router with all routes.
pub fn router() -> Router<AppState> {
    Router::new()
        // Health check
        .route("/health", get(health::health))
        // Provider webhook
        .route("/api/webhook", get(webhook::verify).post(webhook::receive))
        // Conversation API
        .route("/api/messages", get(messages::list).post(messages::compose))
        .route("/api/messages/:id", delete(messages::remove))
        .route("/api/messages/:id/status", put(messages::update_status))
        .route("/api/contacts", get(contacts::list))
        .route("/api/contacts/:phone/read", post(contacts::mark_read))
        .route("/api/stats", get(dashboard::stats_api))
        .route("/api/events", get(events::stream))
}
