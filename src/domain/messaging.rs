//! Outbound messaging gateway boundary

use crate::domain::shared::value_objects::PhoneNumber;

/// Maximum accepted body length for an outbound text, before the suffix.
pub const MAX_SMS_BODY_CHARS: usize = 480;

/// Length of the message preview recorded in `sms_attempt` events.
pub const SMS_PREVIEW_CHARS: usize = 80;

/// Compliance suffix appended to every outbound text.
pub const OPT_OUT_SUFFIX: &str = " Reply STOP to opt out.";

/// Provider acknowledgment for an accepted outbound message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmsDelivery {
    /// Provider-assigned message identifier
    pub provider_id: String,
}

/// Messaging gateway trait
///
/// A stateless, reentrant dispatcher: one send request, one provider
/// acceptance or failure. Concurrent sends from different sessions are
/// independent and unordered.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait SmsGateway: Send + Sync {
    /// Send a single text message, reporting provider acceptance
    async fn send(&self, to: &PhoneNumber, body: &str) -> Result<SmsDelivery, String>;
}

/// Truncate `text` to at most `max` characters on a char boundary.
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}
