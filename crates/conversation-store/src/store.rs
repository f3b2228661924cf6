//! The conversation store handle.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use tracing::debug;

use crate::listeners::{Channel, Feed, Listener, Listeners, Outbox, Pending, Subscription};
use crate::types::{Contact, ConversationStats, Message, MessageStatus};

/// State guarded by the store mutex.
#[derive(Default)]
struct State {
    /// Messages in insertion order.
    messages: Vec<Message>,
    /// Contacts keyed by phone, in creation order.
    contacts: IndexMap<String, Contact>,
    message_listeners: Listeners<Message>,
    contact_listeners: Listeners<Contact>,
}

impl State {
    /// Index of the first contact whose phone is either side of the message.
    fn matching_contact(&self, message: &Message) -> Option<usize> {
        let by_from = self.contacts.get_index_of(message.from.as_str());
        let by_to = self.contacts.get_index_of(message.to.as_str());
        match (by_from, by_to) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    fn upsert_contact(&mut self, message: &Message, now: DateTime<Utc>) {
        let unread = u32::from(!message.is_from_user);

        if let Some(index) = self.matching_contact(message) {
            if let Some((_, contact)) = self.contacts.get_index_mut(index) {
                contact.touch(&message.text, now);
                contact.unread_count = contact.unread_count.saturating_add(unread);
            }
            return;
        }

        let phone = message.counterpart();
        debug!(phone = %phone, "Creating contact");
        self.contacts
            .insert(phone.to_string(), Contact::new(phone, &message.text, unread, now));
    }

    /// Re-derive the contact's last message after `removed` was taken out.
    fn refresh_contact(&mut self, removed: &Message) -> bool {
        let Some(index) = self.matching_contact(removed) else {
            return false;
        };
        let Some((phone, _)) = self.contacts.get_index(index) else {
            return false;
        };

        let last_text = self
            .messages
            .iter()
            .rev()
            .find(|m| m.involves(phone))
            .map(|m| m.text.clone())
            .unwrap_or_default();

        if let Some((_, contact)) = self.contacts.get_index_mut(index) {
            contact.last_message = last_text;
            if !removed.is_from_user {
                contact.unread_count = contact.unread_count.saturating_sub(1);
            }
        }
        true
    }

    fn contact_list(&self) -> Vec<Contact> {
        self.contacts.values().cloned().collect()
    }

    fn pending_messages(&mut self) -> Option<Pending<Message>> {
        let messages = &self.messages;
        Pending::capture(&mut self.message_listeners, || messages.clone())
    }

    fn pending_contacts(&mut self) -> Option<Pending<Contact>> {
        let contacts = &self.contacts;
        Pending::capture(&mut self.contact_listeners, || contacts.values().cloned().collect())
    }
}

/// Shared inner state of a [`ConversationStore`].
pub(crate) struct Shared {
    state: Mutex<State>,
    message_outbox: Outbox<Message>,
    contact_outbox: Outbox<Contact>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn remove_listener(&self, channel: Channel, id: u64) -> bool {
        let mut state = self.lock();
        match channel {
            Channel::Messages => state.message_listeners.remove(id),
            Channel::Contacts => state.contact_listeners.remove(id),
        }
    }
}

impl std::fmt::Debug for Shared {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut debug = f.debug_struct("ConversationStore");
        let state = match self.state.try_lock() {
            Ok(state) => state,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => return debug.field("state", &"<locked>").finish(),
        };
        debug
            .field("messages", &state.messages.len())
            .field("contacts", &state.contacts.len())
            .field("message_listeners", &state.message_listeners.len())
            .field("contact_listeners", &state.contact_listeners.len())
            .finish()
    }
}

/// In-memory registry of messages and the contacts derived from them.
///
/// The handle is cheap to clone; clones share the same state. Every mutation
/// runs under a single lock, and listeners are invoked after the lock is
/// released, each receiving its own copy of the sequence.
///
/// Within one channel, snapshots reach listeners in mutation order. When
/// writers race, a writer that finds delivery already in progress on another
/// thread leaves its snapshot to that thread, and an intermediate snapshot may
/// be skipped in favor of a newer one. The last snapshot a listener receives
/// always matches the store.
///
/// # Example
///
/// ```rust
/// use conversation_store::{ConversationStore, Message};
///
/// let store = ConversationStore::new();
/// store.insert_message(Message::inbound("wamid.1", "15550001", "biz", "Hello"));
///
/// let contacts = store.contacts();
/// assert_eq!(contacts.len(), 1);
/// assert_eq!(contacts[0].unread_count, 1);
///
/// store.mark_contact_read("15550001");
/// assert_eq!(store.contacts()[0].unread_count, 0);
/// ```
#[derive(Clone, Debug)]
pub struct ConversationStore {
    shared: Arc<Shared>,
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State::default()),
                message_outbox: Outbox::default(),
                contact_outbox: Outbox::default(),
            }),
        }
    }

    /// Append a message and update (or create) its contact.
    ///
    /// Inbound messages bump the contact's unread count; outbound ones never
    /// do. Message listeners are notified before contact listeners.
    pub fn insert_message(&self, message: Message) {
        let (messages, contacts) = {
            let mut state = self.shared.lock();
            debug!(
                id = %message.id,
                from = %message.from,
                to = %message.to,
                inbound = !message.is_from_user,
                "Inserting message"
            );
            state.upsert_contact(&message, Utc::now());
            state.messages.push(message);
            (state.pending_messages(), state.pending_contacts())
        };

        self.shared.message_outbox.submit(messages);
        self.shared.contact_outbox.submit(contacts);
    }

    /// All messages, or only those sent from or to `phone`, in insertion order.
    pub fn messages(&self, phone: Option<&str>) -> Vec<Message> {
        let state = self.shared.lock();
        match phone {
            Some(phone) => state
                .messages
                .iter()
                .filter(|m| m.involves(phone))
                .cloned()
                .collect(),
            None => state.messages.clone(),
        }
    }

    /// All contacts in creation order.
    pub fn contacts(&self) -> Vec<Contact> {
        self.shared.lock().contact_list()
    }

    /// Contacts whose name contains `query` (case-insensitive) or whose phone
    /// contains it. An empty query matches every contact.
    pub fn search_contacts(&self, query: &str) -> Vec<Contact> {
        let needle = query.trim().to_lowercase();
        let state = self.shared.lock();
        state
            .contacts
            .values()
            .filter(|c| {
                needle.is_empty()
                    || c.name.to_lowercase().contains(&needle)
                    || c.phone.contains(query.trim())
            })
            .cloned()
            .collect()
    }

    /// Register a listener for the message sequence.
    pub fn subscribe_messages<F>(&self, listener: F) -> Subscription
    where
        F: Fn(Vec<Message>) + Send + Sync + 'static,
    {
        self.register_message_listener(Arc::new(listener))
    }

    /// Register a listener for the contact sequence.
    pub fn subscribe_contacts<F>(&self, listener: F) -> Subscription
    where
        F: Fn(Vec<Contact>) + Send + Sync + 'static,
    {
        self.register_contact_listener(Arc::new(listener))
    }

    /// Bounded feed of message snapshots, starting with the current messages.
    pub fn message_feed(&self, capacity: usize) -> Feed<Message> {
        let (feed, id) = {
            let mut state = self.shared.lock();
            let (feed, listener) = Feed::primed(capacity, state.messages.clone());
            (feed, state.message_listeners.add(listener))
        };
        feed.attach(Subscription::new(Arc::downgrade(&self.shared), Channel::Messages, id))
    }

    /// Bounded feed of contact snapshots, starting with the current contacts.
    pub fn contact_feed(&self, capacity: usize) -> Feed<Contact> {
        let (feed, id) = {
            let mut state = self.shared.lock();
            let (feed, listener) = Feed::primed(capacity, state.contact_list());
            (feed, state.contact_listeners.add(listener))
        };
        feed.attach(Subscription::new(Arc::downgrade(&self.shared), Channel::Contacts, id))
    }

    fn register_message_listener(&self, listener: Listener<Message>) -> Subscription {
        let id = self.shared.lock().message_listeners.add(listener);
        Subscription::new(Arc::downgrade(&self.shared), Channel::Messages, id)
    }

    fn register_contact_listener(&self, listener: Listener<Contact>) -> Subscription {
        let id = self.shared.lock().contact_listeners.add(listener);
        Subscription::new(Arc::downgrade(&self.shared), Channel::Contacts, id)
    }

    /// Reset the unread count of the contact with this exact phone.
    ///
    /// Unknown phones are ignored.
    pub fn mark_contact_read(&self, phone: &str) {
        let contacts = {
            let mut state = self.shared.lock();
            let Some(contact) = state.contacts.get_mut(phone) else {
                debug!(phone = %phone, "Mark read for unknown contact ignored");
                return;
            };
            contact.unread_count = 0;
            state.pending_contacts()
        };

        self.shared.contact_outbox.submit(contacts);
    }

    /// Overwrite the status of the first message with this id.
    ///
    /// Any status may replace any other. Unknown ids are ignored.
    pub fn update_message_status(&self, id: &str, status: MessageStatus) {
        let messages = {
            let mut state = self.shared.lock();
            let Some(message) = state.messages.iter_mut().find(|m| m.id == id) else {
                debug!(id = %id, "Status update for unknown message ignored");
                return;
            };
            debug!(id = %id, from = %message.status, to = %status, "Updating message status");
            message.status = status;
            state.pending_messages()
        };

        self.shared.message_outbox.submit(messages);
    }

    /// Remove the first message with this id and return it.
    ///
    /// The matching contact keeps existing; its last message is re-derived from
    /// what remains and an inbound removal gives back one unread.
    pub fn remove_message(&self, id: &str) -> Option<Message> {
        let (removed, messages, contacts) = {
            let mut state = self.shared.lock();
            let index = state.messages.iter().position(|m| m.id == id)?;
            let removed = state.messages.remove(index);
            debug!(id = %id, "Removed message");

            let contacts = if state.refresh_contact(&removed) {
                state.pending_contacts()
            } else {
                None
            };
            (removed, state.pending_messages(), contacts)
        };

        self.shared.message_outbox.submit(messages);
        self.shared.contact_outbox.submit(contacts);
        Some(removed)
    }

    /// Aggregate counters over the current contents.
    pub fn stats(&self) -> ConversationStats {
        let state = self.shared.lock();
        let mut stats = ConversationStats {
            total_messages: state.messages.len(),
            contact_count: state.contacts.len(),
            ..Default::default()
        };

        for message in &state.messages {
            if message.is_from_user {
                stats.sent_messages += 1;
            }
            match message.status {
                MessageStatus::Delivered => stats.delivered_messages += 1,
                MessageStatus::Read => {
                    stats.delivered_messages += 1;
                    stats.read_messages += 1;
                }
                MessageStatus::Sent | MessageStatus::Failed => {}
            }
        }

        for contact in state.contacts.values() {
            stats.unread_total += u64::from(contact.unread_count);
            if contact.unread_count > 0 {
                stats.active_chats += 1;
            }
        }

        stats
    }
}
