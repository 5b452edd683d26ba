//! Configuration management
//!
//! All configuration is environment-supplied, read once at startup and
//! immutable afterwards. The process refuses to start when a required value
//! is absent or malformed.

use crate::domain::shared::value_objects::PhoneNumber;
use std::path::PathBuf;
use thiserror::Error;

pub const DEFAULT_BUSINESS_NAME: &str = "After Hours Service";

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_REALTIME_MODEL: &str = "gpt-realtime";
const DEFAULT_REALTIME_VOICE: &str = "alloy";
const DEFAULT_LEADS_PATH: &str = "data/leads.jsonl";
const DEFAULT_EVENTS_PATH: &str = "data/events.jsonl";

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub business: BusinessConfig,
    pub realtime: RealtimeSettings,
    /// Messaging gateway credentials; absent means outbound texts are skipped
    pub twilio: Option<TwilioSettings>,
    pub storage: StorageConfig,
    /// Public hostname for the media-stream URL; falls back to the inbound
    /// request's Host header when unset
    pub public_hostname: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct BusinessConfig {
    pub display_name: String,
    pub oncall_number: PhoneNumber,
}

#[derive(Debug, Clone)]
pub struct RealtimeSettings {
    pub api_key: String,
    pub model: String,
    pub voice: String,
}

#[derive(Debug, Clone)]
pub struct TwilioSettings {
    pub account_sid: String,
    pub auth_token: String,
    pub from_number: PhoneNumber,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub leads_path: PathBuf,
    pub events_path: PathBuf,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

impl Config {
    /// Load and validate configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_source(|name| std::env::var(name).ok())
    }

    fn from_source(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        // Empty values behave like unset ones
        let get = |name: &str| get(name).filter(|value| !value.trim().is_empty());

        let port = match get("PORT") {
            None => DEFAULT_PORT,
            Some(raw) => raw.parse().map_err(|e| ConfigError::Invalid {
                name: "PORT",
                reason: format!("{e}"),
            })?,
        };

        let oncall_raw = get("ONCALL_NUMBER").ok_or(ConfigError::Missing("ONCALL_NUMBER"))?;
        let oncall_number =
            PhoneNumber::parse(&oncall_raw).map_err(|reason| ConfigError::Invalid {
                name: "ONCALL_NUMBER",
                reason,
            })?;

        let api_key = get("OPENAI_API_KEY").ok_or(ConfigError::Missing("OPENAI_API_KEY"))?;

        let twilio = match (
            get("TWILIO_ACCOUNT_SID"),
            get("TWILIO_AUTH_TOKEN"),
            get("TWILIO_FROM_NUMBER"),
        ) {
            (None, None, None) => None,
            (Some(account_sid), Some(auth_token), Some(from_raw)) => {
                let from_number =
                    PhoneNumber::parse(&from_raw).map_err(|reason| ConfigError::Invalid {
                        name: "TWILIO_FROM_NUMBER",
                        reason,
                    })?;
                Some(TwilioSettings {
                    account_sid,
                    auth_token,
                    from_number,
                })
            }
            _ => {
                return Err(ConfigError::Invalid {
                    name: "TWILIO_ACCOUNT_SID",
                    reason: "TWILIO_ACCOUNT_SID, TWILIO_AUTH_TOKEN and TWILIO_FROM_NUMBER must be set together".to_string(),
                })
            }
        };

        Ok(Self {
            server: ServerConfig {
                host: get("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
                port,
            },
            business: BusinessConfig {
                display_name: get("BUSINESS_NAME")
                    .unwrap_or_else(|| DEFAULT_BUSINESS_NAME.to_string()),
                oncall_number,
            },
            realtime: RealtimeSettings {
                api_key,
                model: get("REALTIME_MODEL")
                    .unwrap_or_else(|| DEFAULT_REALTIME_MODEL.to_string()),
                voice: get("REALTIME_VOICE")
                    .unwrap_or_else(|| DEFAULT_REALTIME_VOICE.to_string()),
            },
            twilio,
            storage: StorageConfig {
                leads_path: get("LEADS_PATH")
                    .unwrap_or_else(|| DEFAULT_LEADS_PATH.to_string())
                    .into(),
                events_path: get("EVENTS_PATH")
                    .unwrap_or_else(|| DEFAULT_EVENTS_PATH.to_string())
                    .into(),
            },
            public_hostname: get("PUBLIC_HOSTNAME"),
        })
    }
}
