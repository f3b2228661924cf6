//! WhatsApp dashboard web service.
//!
//! Receives provider webhooks into the conversation store and exposes the
//! store to dashboard views as JSON and a live event stream.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;

use axum::Router;
use tower_http::trace::TraceLayer;

pub use config::{Config, ConfigError};
pub use error::DashboardError;
pub use state::AppState;

/// Build the application with all routes and request tracing.
pub fn app(state: AppState) -> Router {
    routes::router()
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
