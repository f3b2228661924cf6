//! Application state shared across handlers.

use std::sync::Arc;

use conversation_store::ConversationStore;

use crate::config::Config;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Conversation store.
    pub store: ConversationStore,
    /// Server configuration.
    pub config: Arc<Config>,
}

impl AppState {
    /// Create new application state.
    pub fn new(store: ConversationStore, config: Config) -> Self {
        Self {
            store,
            config: Arc::new(config),
        }
    }
}
