//! Twilio Messages API client

use crate::domain::messaging::{SmsDelivery, SmsGateway};
use crate::domain::shared::value_objects::PhoneNumber;
use serde_json::Value;
use tracing::debug;

const TWILIO_API_BASE: &str = "https://api.twilio.com/2010-04-01";

/// Messaging gateway backed by the Twilio Messages REST API.
///
/// Stateless and reentrant: one `reqwest::Client` constructed at startup is
/// shared by every send across every session.
pub struct TwilioSmsClient {
    http: reqwest::Client,
    account_sid: String,
    auth_token: String,
    from_number: PhoneNumber,
}

impl TwilioSmsClient {
    pub fn new(account_sid: String, auth_token: String, from_number: PhoneNumber) -> Self {
        Self {
            http: reqwest::Client::new(),
            account_sid,
            auth_token,
            from_number,
        }
    }

    fn messages_url(&self) -> String {
        format!("{TWILIO_API_BASE}/Accounts/{}/Messages.json", self.account_sid)
    }
}

#[async_trait::async_trait]
impl SmsGateway for TwilioSmsClient {
    async fn send(&self, to: &PhoneNumber, body: &str) -> Result<SmsDelivery, String> {
        debug!("Sending SMS to {} via Twilio", to);

        let response = self
            .http
            .post(self.messages_url())
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&[
                ("To", to.as_str()),
                ("From", self.from_number.as_str()),
                ("Body", body),
            ])
            .send()
            .await
            .map_err(|e| format!("twilio request failed: {e}"))?;

        let status = response.status();
        let payload: Value = response
            .json()
            .await
            .map_err(|e| format!("twilio response was not JSON: {e}"))?;

        if !status.is_success() {
            let message = payload["message"].as_str().unwrap_or("unknown error");
            return Err(format!("twilio rejected send ({status}): {message}"));
        }

        let sid = payload["sid"]
            .as_str()
            .ok_or_else(|| "twilio response missing message sid".to_string())?;

        Ok(SmsDelivery {
            provider_id: sid.to_string(),
        })
    }
}
