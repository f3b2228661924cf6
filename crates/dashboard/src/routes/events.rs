//! Live snapshot stream over Server-Sent Events.

use std::convert::Infallible;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use conversation_store::Feed;
use futures::stream::{self, Stream};
use serde::Serialize;
use tracing::{info, warn};

use crate::state::AppState;

/// Event name carrying the message sequence.
pub const MESSAGES_EVENT: &str = "messages";
/// Event name carrying the contact sequence.
pub const CONTACTS_EVENT: &str = "contacts";

fn snapshot_event<T: Serialize>(name: &'static str, snapshot: &[T]) -> Event {
    match Event::default().event(name).json_data(snapshot) {
        Ok(event) => event,
        Err(err) => {
            warn!(event = name, "Failed to encode snapshot: {}", err);
            Event::default().event("error").data("snapshot encoding failed")
        }
    }
}

fn feed_events<T>(feed: Feed<T>, name: &'static str) -> impl Stream<Item = Result<Event, Infallible>>
where
    T: Serialize + Send + 'static,
{
    stream::unfold(feed, move |mut feed| async move {
        let snapshot = feed.recv().await?;
        Some((Ok(snapshot_event(name, &snapshot)), feed))
    })
}

/// Stream the current messages and contacts, then every change to either.
///
/// Each subscriber gets its own bounded feed, which opens with the state at
/// subscription time; a slow client misses intermediate snapshots instead of
/// holding up the store.
pub async fn stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let capacity = state.config.feed_capacity;
    let messages = feed_events(state.store.message_feed(capacity), MESSAGES_EVENT);
    let contacts = feed_events(state.store.contact_feed(capacity), CONTACTS_EVENT);

    info!("Event stream opened");

    // select alternates starting with messages, so the opening frames are
    // the message snapshot then the contact snapshot
    Sse::new(stream::select(messages, contacts)).keep_alive(KeepAlive::default())
}
