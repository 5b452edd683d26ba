//! Operational event records
//!
//! Everything notable that happens during a call — SMS attempts, escalations,
//! call summaries, backend transport events, session errors — is appended to
//! the event log as one self-contained record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One operational occurrence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CallEvent {
    /// An outbound text is about to be handed to the messaging gateway
    SmsAttempt { to: String, preview: String },

    /// The on-call contact is being alerted
    Escalation {
        reason: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        caller_phone: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        service_address: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        issue: Option<String>,
    },

    /// End-of-call summary recorded by the conversational backend
    CallSummary { summary: String },

    /// Raw transport/protocol event observed on the backend session
    TransportEvent { event: String },

    /// The backend session reported a fault
    SessionError { error: String },

    /// The backend session was established
    RealtimeConnected { session_id: String },
}

impl CallEvent {
    /// The record's closed `type` tag
    pub fn type_tag(&self) -> &'static str {
        match self {
            CallEvent::SmsAttempt { .. } => "sms_attempt",
            CallEvent::Escalation { .. } => "escalation",
            CallEvent::CallSummary { .. } => "call_summary",
            CallEvent::TransportEvent { .. } => "transport_event",
            CallEvent::SessionError { .. } => "session_error",
            CallEvent::RealtimeConnected { .. } => "realtime_connected",
        }
    }
}

/// A timestamped event as written to the log
///
/// The timestamp is assigned at write time by the sink, not by the producer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub ts: DateTime<Utc>,

    #[serde(flatten)]
    pub event: CallEvent,
}

impl EventRecord {
    pub fn now(event: CallEvent) -> Self {
        Self {
            ts: Utc::now(),
            event,
        }
    }
}

/// Event log trait
///
/// Append-only sink. Within one session events must be appended in occurrence
/// order; across sessions no ordering is guaranteed, but each record must
/// survive interleaved concurrent appends intact.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait EventLog: Send + Sync {
    /// Append a single event record, stamping it at write time
    async fn append(&self, event: CallEvent) -> Result<(), String>;
}
