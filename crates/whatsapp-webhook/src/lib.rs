//! WhatsApp Cloud API webhook boundary.
//!
//! This crate turns provider callbacks into typed store events:
//!
//! - [`VerifyRequest`] implements the GET verification handshake
//! - [`WebhookPayload`] models the POST envelope, tolerating absent fields
//! - [`WebhookEvent`] is the closed set of events handed to the store
//!
//! # Example
//!
//! ```rust
//! use conversation_store::ConversationStore;
//! use whatsapp_webhook::{dispatch, WebhookPayload};
//!
//! # fn example() -> Result<(), whatsapp_webhook::WebhookError> {
//! let body = br#"{"object":"whatsapp_business_account","entry":[]}"#;
//! let payload = WebhookPayload::from_slice(body)?;
//!
//! let store = ConversationStore::new();
//! let summary = dispatch(payload.events(), &store);
//! assert_eq!(summary.messages, 0);
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```

pub mod envelope;
pub mod error;
pub mod events;
pub mod verify;

pub use envelope::{
    Change, ChangeValue, Entry, InboundMessage, Metadata, Profile, ProfileContact,
    StatusNotification, TextBody, WebhookPayload, BUSINESS_ACCOUNT_OBJECT, MESSAGES_FIELD,
};
pub use error::WebhookError;
pub use events::{dispatch, kind_from_provider, DispatchSummary, WebhookEvent};
pub use verify::{VerifyRequest, SUBSCRIBE_MODE};
