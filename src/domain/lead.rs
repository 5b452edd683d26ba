//! Lead domain model
//!
//! A lead is one captured after-hours intake: who called, where, what broke,
//! and how urgent it is. Leads are immutable once written and are only ever
//! appended, never updated or deleted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Fixed tag identifying the intake channel on every captured lead.
pub const LEAD_SOURCE: &str = "after_hours_call";

/// Urgency of a captured lead
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Low,
    Normal,
    Emergency,
}

impl Urgency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Urgency::Low => "low",
            Urgency::Normal => "normal",
            Urgency::Emergency => "emergency",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "low" => Some(Urgency::Low),
            "normal" => Some(Urgency::Normal),
            "emergency" => Some(Urgency::Emergency),
            _ => None,
        }
    }
}

impl Default for Urgency {
    fn default() -> Self {
        Urgency::Normal
    }
}

/// Free-text intake fields supplied by the conversation
///
/// Every field is optional; a field the caller never mentioned stays absent
/// in the stored record rather than being written as null.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LeadFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caller_phone: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub caller_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_address: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub issue: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred_time: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// One captured intake
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    /// Assigned at creation, never reused
    pub id: Uuid,

    /// Assigned by the tool set at the moment of capture
    pub created_at: DateTime<Utc>,

    /// Constant per deployment
    pub business_name: String,

    #[serde(flatten)]
    pub fields: LeadFields,

    pub urgency: Urgency,

    /// Intake channel tag, always [`LEAD_SOURCE`]
    pub source: String,
}

impl Lead {
    /// Capture a new lead, assigning its identity and timestamp
    pub fn capture(business_name: String, fields: LeadFields, urgency: Urgency) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            business_name,
            fields,
            urgency,
            source: LEAD_SOURCE.to_string(),
        }
    }
}

/// Lead store trait
///
/// Append-only sink; one record per completed intake. Implementations must
/// tolerate interleaved concurrent appends without corrupting any record.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait LeadStore: Send + Sync {
    /// Append a single lead record
    async fn append(&self, lead: &Lead) -> Result<(), String>;
}
