//! Contact routes.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use conversation_store::Contact;
use serde::Deserialize;

use crate::state::AppState;

/// Optional search query.
#[derive(Debug, Default, Deserialize)]
pub struct ContactQuery {
    pub q: Option<String>,
}

/// List contacts, filtered by name or phone when `q` is given.
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ContactQuery>,
) -> Json<Vec<Contact>> {
    let contacts = match query.q.as_deref() {
        Some(q) => state.store.search_contacts(q),
        None => state.store.contacts(),
    };
    Json(contacts)
}

/// Reset the unread count for a contact. Unknown phones are ignored.
pub async fn mark_read(State(state): State<AppState>, Path(phone): Path<String>) -> StatusCode {
    state.store.mark_contact_read(&phone);
    StatusCode::NO_CONTENT
}
