//! In-memory conversation store for the WhatsApp dashboard.
//!
//! The store keeps every message seen by the process (received through the
//! webhook or composed locally) and the contacts derived from them. Views
//! either read snapshots directly or register listeners that receive a fresh
//! copy of the sequence on every change.
//!
//! Nothing is persisted; the contents live as long as the process.
//!
//! # Example
//!
//! ```rust
//! use conversation_store::{ConversationStore, Message, MessageStatus};
//!
//! let store = ConversationStore::new();
//!
//! let subscription = store.subscribe_messages(|messages| {
//!     println!("{} messages", messages.len());
//! });
//!
//! store.insert_message(Message::outbound("local-1", "biz", "15550001", "Hi!"));
//! store.update_message_status("local-1", MessageStatus::Delivered);
//!
//! subscription.unsubscribe();
//! ```

mod listeners;
mod store;
mod types;

pub use listeners::{Feed, Listener, Subscription};
pub use store::ConversationStore;
pub use types::{
    iso_timestamp, Contact, ConversationStats, Message, MessageKind, MessageStatus,
    ParseStatusError,
};
