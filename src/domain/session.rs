//! Call session lifecycle
//!
//! One `CallSession` exists per accepted media channel. It is never persisted
//! and never reused across calls; it only tracks where the live bridge is in
//! its lifecycle so that teardown happens exactly once.

use crate::domain::shared::error::DomainError;
use crate::domain::shared::result::Result;
use crate::domain::shared::value_objects::SessionId;
use chrono::{DateTime, Utc};

/// Session state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// The backend connection is being established
    Connecting,
    /// Audio is being relayed in both directions
    Active,
    /// The session has ended
    Ended(EndReason),
}

impl SessionState {
    /// Check if a state transition is valid
    pub fn can_transition_to(&self, new_state: &SessionState) -> bool {
        use SessionState::*;

        match (self, new_state) {
            (Connecting, Active) => true,
            (Connecting, Ended(_)) => true,
            (Active, Ended(_)) => true,

            // Can't transition out of Ended
            (Ended(_), _) => false,

            _ => false,
        }
    }

    pub fn is_active(&self) -> bool {
        !matches!(self, SessionState::Ended(_))
    }
}

/// Reason a session ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndReason {
    /// The telephony platform closed the audio channel
    CallerHangup,
    /// The backend closed its side of the session
    BackendClosed,
    /// The backend reported an unrecoverable fault
    BackendError(String),
}

impl EndReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            EndReason::CallerHangup => "caller_hangup",
            EndReason::BackendClosed => "backend_closed",
            EndReason::BackendError(_) => "backend_error",
        }
    }
}

/// One live call session
#[derive(Debug, Clone)]
pub struct CallSession {
    id: SessionId,
    state: SessionState,
    /// Telephony stream identifier, known once the `start` frame arrives
    stream_sid: Option<String>,
    started_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
}

impl CallSession {
    /// Create a session for a freshly accepted audio channel
    pub fn new() -> Self {
        Self {
            id: SessionId::new(),
            state: SessionState::Connecting,
            stream_sid: None,
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    /// Mark the backend connection as established
    pub fn activate(&mut self) -> Result<()> {
        self.transition_to(SessionState::Active)
    }

    /// Record the telephony stream identifier from the `start` frame
    pub fn set_stream_sid(&mut self, sid: String) {
        self.stream_sid = Some(sid);
    }

    /// End the session.
    ///
    /// Idempotent: the first call transitions to `Ended` and returns `true`;
    /// any further call is a no-op returning `false`, so teardown work guarded
    /// by the return value runs exactly once.
    pub fn end(&mut self, reason: EndReason) -> bool {
        if !self.state.is_active() {
            return false;
        }

        self.state = SessionState::Ended(reason);
        self.ended_at = Some(Utc::now());
        true
    }

    fn transition_to(&mut self, new_state: SessionState) -> Result<()> {
        if !self.state.can_transition_to(&new_state) {
            return Err(DomainError::InvalidStateTransition(format!(
                "Cannot transition from {:?} to {:?}",
                self.state, new_state
            )));
        }

        self.state = new_state;
        Ok(())
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn stream_sid(&self) -> Option<&str> {
        self.stream_sid.as_deref()
    }

    pub fn started_at(&self) -> &DateTime<Utc> {
        &self.started_at
    }

    pub fn ended_at(&self) -> Option<&DateTime<Utc>> {
        self.ended_at.as_ref()
    }

    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }

    pub fn end_reason(&self) -> Option<&EndReason> {
        match &self.state {
            SessionState::Ended(reason) => Some(reason),
            _ => None,
        }
    }
}

impl Default for CallSession {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_lifecycle() {
        let mut session = CallSession::new();
        assert_eq!(session.state(), &SessionState::Connecting);
        assert!(session.is_active());

        session.activate().unwrap();
        assert_eq!(session.state(), &SessionState::Active);

        session.set_stream_sid("MZ0123".to_string());
        assert_eq!(session.stream_sid(), Some("MZ0123"));

        assert!(session.end(EndReason::CallerHangup));
        assert_eq!(
            session.state(),
            &SessionState::Ended(EndReason::CallerHangup)
        );
        assert!(session.ended_at().is_some());
        assert!(!session.is_active());
    }

    #[test]
    fn test_end_is_idempotent() {
        let mut session = CallSession::new();
        session.activate().unwrap();

        assert!(session.end(EndReason::BackendClosed));
        let ended_at = *session.ended_at().unwrap();

        // Repeated teardown is a no-op: no state change, no new timestamp
        assert!(!session.end(EndReason::CallerHangup));
        assert_eq!(
            session.state(),
            &SessionState::Ended(EndReason::BackendClosed)
        );
        assert_eq!(session.ended_at(), Some(&ended_at));
    }

    #[test]
    fn test_connect_failure_can_end_directly() {
        let mut session = CallSession::new();
        assert!(session.end(EndReason::BackendError("connect refused".to_string())));
        assert_eq!(session.end_reason().unwrap().as_str(), "backend_error");
    }

    #[test]
    fn test_cannot_activate_after_end() {
        let mut session = CallSession::new();
        session.end(EndReason::CallerHangup);
        assert!(session.activate().is_err());
    }

    #[test]
    fn test_state_transition_table() {
        use SessionState::*;

        assert!(Connecting.can_transition_to(&Active));
        assert!(Connecting.can_transition_to(&Ended(EndReason::CallerHangup)));
        assert!(Active.can_transition_to(&Ended(EndReason::BackendClosed)));
        assert!(!Active.can_transition_to(&Connecting));
        assert!(!Ended(EndReason::CallerHangup).can_transition_to(&Active));
    }
}
