//! Configuration loaded from environment variables.

use std::env;
use std::net::SocketAddr;

/// Default number of snapshots buffered per event-stream subscriber.
pub const DEFAULT_FEED_CAPACITY: usize = 16;

/// Dashboard server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address.
    pub addr: SocketAddr,
    /// Shared secret expected in the webhook verification handshake.
    pub verify_token: String,
    /// Business phone number id; sender of locally composed messages.
    pub phone_number_id: String,
    /// Snapshots buffered per event-stream subscriber.
    pub feed_capacity: usize,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Description | Default |
    /// |----------|-------------|---------|
    /// | `DASHBOARD_ADDR` | Server bind address | `127.0.0.1:8788` |
    /// | `WHATSAPP_VERIFY_TOKEN` | Webhook verify token | (required) |
    /// | `WHATSAPP_PHONE_NUMBER_ID` | Business phone number id | (required) |
    /// | `FEED_CAPACITY` | Event-stream buffer per subscriber | `16` |
    pub fn from_env() -> Result<Self, ConfigError> {
        let addr = env::var("DASHBOARD_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:8788".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidAddr)?;

        let verify_token = env::var("WHATSAPP_VERIFY_TOKEN")
            .ok()
            .filter(|v| !v.is_empty())
            .ok_or(ConfigError::MissingVerifyToken)?;

        let phone_number_id = env::var("WHATSAPP_PHONE_NUMBER_ID")
            .ok()
            .filter(|v| !v.is_empty())
            .ok_or(ConfigError::MissingPhoneNumberId)?;

        let feed_capacity = match env::var("FEED_CAPACITY") {
            Ok(raw) => raw
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or(ConfigError::InvalidFeedCapacity)?,
            Err(_) => DEFAULT_FEED_CAPACITY,
        };

        Ok(Self {
            addr,
            verify_token,
            phone_number_id,
            feed_capacity,
        })
    }

    /// Configuration for the given token and phone number id with defaults
    /// for everything else.
    pub fn new(verify_token: impl Into<String>, phone_number_id: impl Into<String>) -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 8788)),
            verify_token: verify_token.into(),
            phone_number_id: phone_number_id.into(),
            feed_capacity: DEFAULT_FEED_CAPACITY,
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid DASHBOARD_ADDR format")]
    InvalidAddr,

    #[error("WHATSAPP_VERIFY_TOKEN environment variable is required")]
    MissingVerifyToken,

    #[error("WHATSAPP_PHONE_NUMBER_ID environment variable is required")]
    MissingPhoneNumberId,

    #[error("FEED_CAPACITY must be a positive integer")]
    InvalidFeedCapacity,
}
