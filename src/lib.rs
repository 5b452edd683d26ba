//! Nightline - after-hours call answering for service businesses
//!
//! Bridges inbound telephony media streams to a realtime conversational
//! voice backend, captures structured leads, and escalates urgent cases by
//! outbound text message.

pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod interface;

// Re-export commonly used types
pub use domain::shared::error::DomainError;
pub use domain::shared::result::Result;
