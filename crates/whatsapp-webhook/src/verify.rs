//! Webhook verification handshake.

use serde::Deserialize;

use crate::error::WebhookError;

/// Mode the provider sends when registering a webhook.
pub const SUBSCRIBE_MODE: &str = "subscribe";

/// Query parameters of the provider's verification GET request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VerifyRequest {
    #[serde(rename = "hub.mode", default)]
    pub mode: Option<String>,

    #[serde(rename = "hub.verify_token", default)]
    pub verify_token: Option<String>,

    #[serde(rename = "hub.challenge", default)]
    pub challenge: Option<String>,
}

impl VerifyRequest {
    /// Return the challenge to echo back when the request is a subscription
    /// carrying the expected token.
    ///
    /// All three parameters must be present and non-empty.
    pub fn verify(self, expected_token: &str) -> Result<String, WebhookError> {
        let present = |value: Option<String>| value.filter(|v| !v.is_empty());

        let (Some(mode), Some(token), Some(challenge)) = (
            present(self.mode),
            present(self.verify_token),
            present(self.challenge),
        ) else {
            return Err(WebhookError::Verification("missing parameters"));
        };

        if mode != SUBSCRIBE_MODE {
            return Err(WebhookError::Verification("unexpected mode"));
        }
        if token != expected_token {
            return Err(WebhookError::Verification("token mismatch"));
        }

        Ok(challenge)
    }
}
