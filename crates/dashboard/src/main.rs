//! WhatsApp dashboard server.

use conversation_store::ConversationStore;
use dashboard::{AppState, Config};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;
    info!(addr = %config.addr, "Starting dashboard server");

    let addr = config.addr;
    let state = AppState::new(ConversationStore::new(), config);
    let app = dashboard::app(state);

    info!(addr = %addr, "Dashboard server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
