//! Callable tool set exposed to the conversational backend
//!
//! The four tools are the only channel through which the backend affects
//! external state. Each tool validates its arguments before any side effect,
//! performs exactly one side effect, and returns a reply that is carried back
//! to the backend's internal reasoning only — replies are never part of the
//! spoken transcript.

use crate::domain::event::{CallEvent, EventLog};
use crate::domain::lead::{Lead, LeadFields, LeadStore, Urgency};
use crate::domain::messaging::{
    truncate_chars, SmsGateway, MAX_SMS_BODY_CHARS, OPT_OUT_SUFFIX, SMS_PREVIEW_CHARS,
};
use crate::domain::shared::value_objects::PhoneNumber;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use thiserror::Error;

/// Maximum accepted length for a call summary.
pub const MAX_SUMMARY_CHARS: usize = 2000;

/// Closed set of callable tools
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolName {
    CreateLead,
    SendSmsToNumber,
    EscalateToOncall,
    LogCallSummary,
}

impl ToolName {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolName::CreateLead => "create_lead",
            ToolName::SendSmsToNumber => "send_sms_to_number",
            ToolName::EscalateToOncall => "escalate_to_oncall",
            ToolName::LogCallSummary => "log_call_summary",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "create_lead" => Some(ToolName::CreateLead),
            "send_sms_to_number" => Some(ToolName::SendSmsToNumber),
            "escalate_to_oncall" => Some(ToolName::EscalateToOncall),
            "log_call_summary" => Some(ToolName::LogCallSummary),
            _ => None,
        }
    }
}

/// Tool invocation failure
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("invalid arguments: {0}")]
    Validation(String),

    #[error("gateway error: {0}")]
    Gateway(String),

    #[error("storage error: {0}")]
    Storage(String),
}

/// Reply carried back to the backend as a function output item.
///
/// The confirmation text is machine-readable context for the model, not
/// something to be read aloud; it never enters the spoken transcript.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToolReply {
    Completed { confirmation: String },
    Skipped { reason: String },
}

#[derive(Debug, Default, Deserialize)]
struct CreateLeadArgs {
    caller_phone: Option<String>,
    caller_name: Option<String>,
    service_address: Option<String>,
    issue: Option<String>,
    preferred_time: Option<String>,
    notes: Option<String>,
    urgency: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SendSmsArgs {
    to: String,
    message: String,
}

#[derive(Debug, Default, Deserialize)]
struct EscalateArgs {
    reason: Option<String>,
    caller_phone: Option<String>,
    service_address: Option<String>,
    issue: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LogSummaryArgs {
    summary: String,
}

/// The tool registry and its collaborators
///
/// Constructed once at startup and shared by reference across sessions; it
/// holds no per-call state.
pub struct ToolSet {
    business_name: String,
    oncall_number: PhoneNumber,
    leads: Arc<dyn LeadStore>,
    events: Arc<dyn EventLog>,
    sms: Option<Arc<dyn SmsGateway>>,
}

impl ToolSet {
    pub fn new(
        business_name: String,
        oncall_number: PhoneNumber,
        leads: Arc<dyn LeadStore>,
        events: Arc<dyn EventLog>,
        sms: Option<Arc<dyn SmsGateway>>,
    ) -> Self {
        Self {
            business_name,
            oncall_number,
            leads,
            events,
            sms,
        }
    }

    /// Dispatch a tool call by name with the backend's raw argument JSON.
    pub async fn dispatch(&self, name: &str, raw_args: &str) -> Result<ToolReply, ToolError> {
        let tool = ToolName::from_name(name)
            .ok_or_else(|| ToolError::Validation(format!("unknown tool: {name}")))?;

        let raw = if raw_args.trim().is_empty() {
            "{}"
        } else {
            raw_args
        };

        match tool {
            ToolName::CreateLead => self.create_lead(parse_args(raw)?).await,
            ToolName::SendSmsToNumber => self.send_sms(parse_args(raw)?).await,
            ToolName::EscalateToOncall => self.escalate(parse_args(raw)?).await,
            ToolName::LogCallSummary => self.log_summary(parse_args(raw)?).await,
        }
    }

    async fn create_lead(&self, args: CreateLeadArgs) -> Result<ToolReply, ToolError> {
        let urgency = match args.urgency.as_deref() {
            None => Urgency::default(),
            Some(raw) => Urgency::from_str(raw).ok_or_else(|| {
                ToolError::Validation(format!(
                    "urgency must be one of low, normal, emergency; got {raw:?}"
                ))
            })?,
        };

        let fields = LeadFields {
            caller_phone: args.caller_phone,
            caller_name: args.caller_name,
            service_address: args.service_address,
            issue: args.issue,
            preferred_time: args.preferred_time,
            notes: args.notes,
        };

        let lead = Lead::capture(self.business_name.clone(), fields, urgency);
        let id = lead.id;

        self.leads
            .append(&lead)
            .await
            .map_err(ToolError::Storage)?;

        Ok(ToolReply::Completed {
            confirmation: format!("lead {id} captured"),
        })
    }

    async fn send_sms(&self, args: SendSmsArgs) -> Result<ToolReply, ToolError> {
        let to = PhoneNumber::parse(&args.to).map_err(ToolError::Validation)?;

        if args.message.chars().count() > MAX_SMS_BODY_CHARS {
            return Err(ToolError::Validation(format!(
                "message exceeds {MAX_SMS_BODY_CHARS} characters"
            )));
        }

        // The attempt is recorded before the gateway is touched; losing the
        // audit line must not be silent.
        self.events
            .append(CallEvent::SmsAttempt {
                to: to.to_string(),
                preview: truncate_chars(&args.message, SMS_PREVIEW_CHARS),
            })
            .await
            .map_err(ToolError::Storage)?;

        self.deliver(&to, args.message).await
    }

    async fn escalate(&self, args: EscalateArgs) -> Result<ToolReply, ToolError> {
        let reason = args.reason.unwrap_or_else(|| "emergency".to_string());

        self.events
            .append(CallEvent::Escalation {
                reason: reason.clone(),
                caller_phone: args.caller_phone.clone(),
                service_address: args.service_address.clone(),
                issue: args.issue.clone(),
            })
            .await
            .map_err(ToolError::Storage)?;

        let mut alert = format!("{} after-hours escalation. Reason: {reason}.", self.business_name);
        if let Some(phone) = &args.caller_phone {
            alert.push_str(&format!(" Caller: {phone}."));
        }
        if let Some(address) = &args.service_address {
            alert.push_str(&format!(" Address: {address}."));
        }
        if let Some(issue) = &args.issue {
            alert.push_str(&format!(" Issue: {issue}."));
        }

        let alert = truncate_chars(&alert, MAX_SMS_BODY_CHARS);
        self.deliver(&self.oncall_number, alert).await
    }

    async fn log_summary(&self, args: LogSummaryArgs) -> Result<ToolReply, ToolError> {
        if args.summary.chars().count() > MAX_SUMMARY_CHARS {
            return Err(ToolError::Validation(format!(
                "summary exceeds {MAX_SUMMARY_CHARS} characters"
            )));
        }

        self.events
            .append(CallEvent::CallSummary {
                summary: args.summary,
            })
            .await
            .map_err(ToolError::Storage)?;

        Ok(ToolReply::Completed {
            confirmation: "summary recorded".to_string(),
        })
    }

    /// Hand a message to the gateway, or report a skip when none is
    /// configured. All outbound texts share this path and the opt-out suffix.
    async fn deliver(&self, to: &PhoneNumber, body: String) -> Result<ToolReply, ToolError> {
        let gateway = match &self.sms {
            Some(gateway) => gateway,
            None => {
                return Ok(ToolReply::Skipped {
                    reason: "sms gateway not configured".to_string(),
                })
            }
        };

        let body = format!("{body}{OPT_OUT_SUFFIX}");
        let delivery = gateway
            .send(to, &body)
            .await
            .map_err(ToolError::Gateway)?;

        Ok(ToolReply::Completed {
            confirmation: format!("message {} accepted by gateway", delivery.provider_id),
        })
    }

    /// Tool schemas in the realtime backend's function format.
    pub fn definitions(&self) -> Vec<Value> {
        vec![
            json!({
                "type": "function",
                "name": "create_lead",
                "description": "Record a new service lead once the caller has shared their details.",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "caller_phone": { "type": "string", "description": "Callback number in the caller's own words" },
                        "caller_name": { "type": "string" },
                        "service_address": { "type": "string" },
                        "issue": { "type": "string", "description": "Short description of the problem" },
                        "preferred_time": { "type": "string" },
                        "notes": { "type": "string" },
                        "urgency": { "type": "string", "enum": ["low", "normal", "emergency"] }
                    },
                    "required": []
                }
            }),
            json!({
                "type": "function",
                "name": "send_sms_to_number",
                "description": "Send a text message to a specific phone number. The number must be in E.164 form, e.g. +15551234567.",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "to": { "type": "string", "description": "Destination number in E.164 form" },
                        "message": { "type": "string" }
                    },
                    "required": ["to", "message"]
                }
            }),
            json!({
                "type": "function",
                "name": "escalate_to_oncall",
                "description": "Alert the on-call technician immediately. Use for emergencies that cannot wait until morning.",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "reason": { "type": "string" },
                        "caller_phone": { "type": "string" },
                        "service_address": { "type": "string" },
                        "issue": { "type": "string" }
                    },
                    "required": []
                }
            }),
            json!({
                "type": "function",
                "name": "log_call_summary",
                "description": "Record a short recap of the call before it ends.",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "summary": { "type": "string" }
                    },
                    "required": ["summary"]
                }
            }),
        ]
    }
}

/// Operating instructions for the business persona.
pub fn operating_instructions(business_name: &str) -> String {
    format!(
        "You are the after-hours phone assistant for {business_name}. Answer warmly and \
         briefly; you are on a live phone call, so keep every reply to one or two short \
         sentences. Collect the caller's name, callback number, service address, a short \
         description of the issue, and a preferred time for a visit. When you have the \
         details, call create_lead. If the issue sounds dangerous or cannot wait until \
         morning (flooding, gas smell, no heat in freezing weather, sparking outlets), \
         call escalate_to_oncall right away and tell the caller someone will be in touch \
         shortly. Before the call ends, call log_call_summary with a two-sentence recap. \
         Tool results are internal bookkeeping: never read identifiers, confirmation \
         text, or error text aloud. If a tool fails, apologize naturally and offer to \
         take the details down again."
    )
}

fn parse_args<T: for<'de> Deserialize<'de>>(raw: &str) -> Result<T, ToolError> {
    serde_json::from_str(raw).map_err(|e| ToolError::Validation(format!("malformed arguments: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::event::MockEventLog;
    use crate::domain::lead::MockLeadStore;
    use crate::domain::messaging::{MockSmsGateway, SmsDelivery};
    use mockall::predicate;

    fn oncall() -> PhoneNumber {
        PhoneNumber::parse("+15550001111").unwrap()
    }

    fn tool_set(
        leads: MockLeadStore,
        events: MockEventLog,
        sms: Option<MockSmsGateway>,
    ) -> ToolSet {
        ToolSet::new(
            "Rapid Rooter".to_string(),
            oncall(),
            Arc::new(leads),
            Arc::new(events),
            sms.map(|gateway| Arc::new(gateway) as Arc<dyn SmsGateway>),
        )
    }

    #[tokio::test]
    async fn test_unknown_tool_is_a_validation_error() {
        let set = tool_set(MockLeadStore::new(), MockEventLog::new(), None);

        let err = set.dispatch("open_garage", "{}").await.unwrap_err();
        assert!(matches!(err, ToolError::Validation(_)));
    }

    #[tokio::test]
    async fn test_create_lead_writes_one_record() {
        let mut leads = MockLeadStore::new();
        leads
            .expect_append()
            .withf(|lead: &Lead| {
                lead.fields.issue.as_deref() == Some("burst pipe")
                    && lead.urgency == Urgency::Emergency
                    && lead.business_name == "Rapid Rooter"
            })
            .times(1)
            .returning(|_| Ok(()));

        let set = tool_set(leads, MockEventLog::new(), None);

        let reply = set
            .dispatch(
                "create_lead",
                r#"{"issue": "burst pipe", "urgency": "emergency"}"#,
            )
            .await
            .unwrap();

        match reply {
            ToolReply::Completed { confirmation } => {
                assert!(confirmation.contains("lead "));
                assert!(confirmation.contains("captured"));
            }
            other => panic!("unexpected reply: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_create_lead_defaults_urgency() {
        let mut leads = MockLeadStore::new();
        leads
            .expect_append()
            .withf(|lead: &Lead| lead.urgency == Urgency::Normal)
            .times(1)
            .returning(|_| Ok(()));

        let set = tool_set(leads, MockEventLog::new(), None);
        set.dispatch("create_lead", "{}").await.unwrap();
    }

    #[tokio::test]
    async fn test_create_lead_rejects_bad_urgency_before_write() {
        // No append expectation: a write would panic the mock
        let set = tool_set(MockLeadStore::new(), MockEventLog::new(), None);

        let err = set
            .dispatch("create_lead", r#"{"urgency": "urgent"}"#)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Validation(_)));
    }

    #[tokio::test]
    async fn test_create_lead_surfaces_storage_fault() {
        let mut leads = MockLeadStore::new();
        leads
            .expect_append()
            .times(1)
            .returning(|_| Err("disk full".to_string()));

        let set = tool_set(leads, MockEventLog::new(), None);
        let err = set.dispatch("create_lead", "{}").await.unwrap_err();
        assert!(matches!(err, ToolError::Storage(_)));
    }

    #[tokio::test]
    async fn test_send_sms_rejects_malformed_number_before_any_side_effect() {
        // Neither an event append nor a gateway send may happen
        let set = tool_set(
            MockLeadStore::new(),
            MockEventLog::new(),
            Some(MockSmsGateway::new()),
        );

        let err = set
            .dispatch(
                "send_sms_to_number",
                r#"{"to": "5551234567", "message": "hi"}"#,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Validation(_)));
    }

    #[tokio::test]
    async fn test_send_sms_rejects_oversized_message() {
        let set = tool_set(MockLeadStore::new(), MockEventLog::new(), None);
        let long = "x".repeat(MAX_SMS_BODY_CHARS + 1);

        let err = set
            .dispatch(
                "send_sms_to_number",
                &serde_json::to_string(&json!({"to": "+15551234567", "message": long})).unwrap(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Validation(_)));
    }

    #[tokio::test]
    async fn test_send_sms_logs_attempt_then_sends_with_suffix() {
        let mut events = MockEventLog::new();
        events
            .expect_append()
            .withf(|event: &CallEvent| {
                matches!(
                    event,
                    CallEvent::SmsAttempt { to, preview }
                        if to == "+15551234567" && preview == "your technician is on the way"
                )
            })
            .times(1)
            .returning(|_| Ok(()));

        let mut gateway = MockSmsGateway::new();
        gateway
            .expect_send()
            .withf(|to: &PhoneNumber, body: &str| {
                to.as_str() == "+15551234567" && body.ends_with(OPT_OUT_SUFFIX)
            })
            .times(1)
            .returning(|_, _| {
                Ok(SmsDelivery {
                    provider_id: "SM123".to_string(),
                })
            });

        let set = tool_set(MockLeadStore::new(), events, Some(gateway));
        let reply = set
            .dispatch(
                "send_sms_to_number",
                r#"{"to": "+15551234567", "message": "your technician is on the way"}"#,
            )
            .await
            .unwrap();

        assert_eq!(
            reply,
            ToolReply::Completed {
                confirmation: "message SM123 accepted by gateway".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_send_sms_truncates_attempt_preview() {
        let long = "a".repeat(SMS_PREVIEW_CHARS + 40);
        let expected_preview = "a".repeat(SMS_PREVIEW_CHARS);

        let mut events = MockEventLog::new();
        events
            .expect_append()
            .withf(move |event: &CallEvent| {
                matches!(event, CallEvent::SmsAttempt { preview, .. } if *preview == expected_preview)
            })
            .times(1)
            .returning(|_| Ok(()));

        let set = tool_set(MockLeadStore::new(), events, None);
        set.dispatch(
            "send_sms_to_number",
            &serde_json::to_string(&json!({"to": "+15551234567", "message": long})).unwrap(),
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_send_sms_without_gateway_skips_but_still_logs() {
        let mut events = MockEventLog::new();
        events.expect_append().times(1).returning(|_| Ok(()));

        let set = tool_set(MockLeadStore::new(), events, None);
        let reply = set
            .dispatch(
                "send_sms_to_number",
                r#"{"to": "+15551234567", "message": "hello"}"#,
            )
            .await
            .unwrap();

        assert!(matches!(reply, ToolReply::Skipped { .. }));
    }

    #[tokio::test]
    async fn test_send_sms_surfaces_gateway_failure_after_logging() {
        let mut events = MockEventLog::new();
        events.expect_append().times(1).returning(|_| Ok(()));

        let mut gateway = MockSmsGateway::new();
        gateway
            .expect_send()
            .times(1)
            .returning(|_, _| Err("provider unreachable".to_string()));

        let set = tool_set(MockLeadStore::new(), events, Some(gateway));
        let err = set
            .dispatch(
                "send_sms_to_number",
                r#"{"to": "+15551234567", "message": "hello"}"#,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Gateway(_)));
    }

    #[tokio::test]
    async fn test_escalate_logs_event_and_alerts_oncall_number() {
        let mut events = MockEventLog::new();
        events
            .expect_append()
            .withf(|event: &CallEvent| {
                matches!(
                    event,
                    CallEvent::Escalation { reason, issue, .. }
                        if reason == "emergency" && issue.as_deref() == Some("burst pipe")
                )
            })
            .times(1)
            .returning(|_| Ok(()));

        let mut gateway = MockSmsGateway::new();
        gateway
            .expect_send()
            .withf(|to: &PhoneNumber, body: &str| {
                to.as_str() == "+15550001111"
                    && body.contains("burst pipe")
                    && body.contains("12 Elm St")
                    && body.contains("Rapid Rooter")
            })
            .times(1)
            .returning(|_, _| {
                Ok(SmsDelivery {
                    provider_id: "SM999".to_string(),
                })
            });

        let set = tool_set(MockLeadStore::new(), events, Some(gateway));
        let reply = set
            .dispatch(
                "escalate_to_oncall",
                r#"{"issue": "burst pipe", "service_address": "12 Elm St"}"#,
            )
            .await
            .unwrap();

        assert!(matches!(reply, ToolReply::Completed { .. }));
    }

    #[tokio::test]
    async fn test_escalate_without_gateway_skips_but_still_logs() {
        let mut events = MockEventLog::new();
        events
            .expect_append()
            .with(predicate::function(|event: &CallEvent| {
                event.type_tag() == "escalation"
            }))
            .times(1)
            .returning(|_| Ok(()));

        let set = tool_set(MockLeadStore::new(), events, None);
        let reply = set.dispatch("escalate_to_oncall", "{}").await.unwrap();
        assert!(matches!(reply, ToolReply::Skipped { .. }));
    }

    #[tokio::test]
    async fn test_log_summary_records_event() {
        let mut events = MockEventLog::new();
        events
            .expect_append()
            .withf(|event: &CallEvent| {
                matches!(event, CallEvent::CallSummary { summary } if summary.contains("burst pipe"))
            })
            .times(1)
            .returning(|_| Ok(()));

        let set = tool_set(MockLeadStore::new(), events, None);
        let reply = set
            .dispatch(
                "log_call_summary",
                r#"{"summary": "Caller reported a burst pipe; emergency escalated."}"#,
            )
            .await
            .unwrap();

        assert_eq!(
            reply,
            ToolReply::Completed {
                confirmation: "summary recorded".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_log_summary_rejects_oversized_summary() {
        let set = tool_set(MockLeadStore::new(), MockEventLog::new(), None);
        let long = "s".repeat(MAX_SUMMARY_CHARS + 1);

        let err = set
            .dispatch(
                "log_call_summary",
                &serde_json::to_string(&json!({"summary": long})).unwrap(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Validation(_)));
    }

    #[tokio::test]
    async fn test_empty_argument_payload_is_treated_as_empty_object() {
        let mut leads = MockLeadStore::new();
        leads.expect_append().times(1).returning(|_| Ok(()));

        let set = tool_set(leads, MockEventLog::new(), None);
        set.dispatch("create_lead", "").await.unwrap();
    }

    #[test]
    fn test_definitions_cover_the_registry() {
        let set = tool_set(MockLeadStore::new(), MockEventLog::new(), None);
        let definitions = set.definitions();

        assert_eq!(definitions.len(), 4);
        let names: Vec<&str> = definitions
            .iter()
            .map(|d| d["name"].as_str().unwrap())
            .collect();
        assert_eq!(
            names,
            vec![
                "create_lead",
                "send_sms_to_number",
                "escalate_to_oncall",
                "log_call_summary"
            ]
        );
        for definition in &definitions {
            assert_eq!(definition["type"], "function");
            assert_eq!(definition["parameters"]["type"], "object");
        }
    }

    #[test]
    fn test_tool_name_round_trip() {
        for name in [
            ToolName::CreateLead,
            ToolName::SendSmsToNumber,
            ToolName::EscalateToOncall,
            ToolName::LogCallSummary,
        ] {
            assert_eq!(ToolName::from_name(name.as_str()), Some(name));
        }
        assert_eq!(ToolName::from_name("nope"), None);
    }

    #[test]
    fn test_reply_serialization_shape() {
        let completed = ToolReply::Completed {
            confirmation: "lead 123 captured".to_string(),
        };
        let json = serde_json::to_value(&completed).unwrap();
        assert_eq!(json["status"], "completed");
        assert_eq!(json["confirmation"], "lead 123 captured");

        let skipped = ToolReply::Skipped {
            reason: "sms gateway not configured".to_string(),
        };
        let json = serde_json::to_value(&skipped).unwrap();
        assert_eq!(json["status"], "skipped");
    }

    #[test]
    fn test_instructions_mention_every_tool() {
        let text = operating_instructions("Rapid Rooter");
        assert!(text.contains("Rapid Rooter"));
        assert!(text.contains("create_lead"));
        assert!(text.contains("escalate_to_oncall"));
        assert!(text.contains("log_call_summary"));
    }
}
