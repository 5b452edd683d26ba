//! Realtime voice backend client
//!
//! One websocket connection to the conversational backend per call session.
//! The connection is configured once (`session.update` with the business
//! persona, audio profile and tool schemas) and then split into a sender and
//! receiver half so the bridge can relay in both directions concurrently.

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::debug;

const REALTIME_ENDPOINT: &str = "wss://api.openai.com/v1/realtime";

/// Telephony-grade audio profile shared by both directions.
const AUDIO_FORMAT: &str = "g711_ulaw";

#[derive(Debug, Error)]
pub enum RealtimeError {
    #[error("failed to connect to realtime backend: {0}")]
    Connect(String),

    #[error("failed to send to realtime backend: {0}")]
    Send(String),
}

/// Connection settings for one backend session
#[derive(Debug, Clone)]
pub struct RealtimeConfig {
    pub api_key: String,
    pub model: String,
    pub voice: String,
    pub instructions: String,
    pub tools: Vec<Value>,
}

/// One decoded occurrence on the backend session
#[derive(Debug, Clone, PartialEq)]
pub enum BackendEvent {
    /// Synthesized audio for the caller, base64 in the session's audio format
    AudioDelta { payload: String },

    /// The backend finished assembling a tool invocation
    ToolCall {
        call_id: String,
        name: String,
        arguments: String,
    },

    /// Any other protocol event, identified by its native type tag
    Lifecycle { event: String },

    /// The backend reported a fault; the session cannot continue
    Error { message: String },
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Established, configured backend session
pub struct RealtimeSession {
    sender: RealtimeSender,
    receiver: RealtimeReceiver,
}

/// Write half of a backend session
pub struct RealtimeSender {
    sink: SplitSink<WsStream, Message>,
    closed: bool,
}

/// Read half of a backend session
pub struct RealtimeReceiver {
    stream: SplitStream<WsStream>,
}

impl RealtimeSession {
    /// Connect and configure a session.
    ///
    /// Returns only after `session.update` has been sent, so by the time the
    /// caller sees a session the backend knows its instructions and tools.
    pub async fn connect(config: &RealtimeConfig) -> Result<Self, RealtimeError> {
        let endpoint = format!("{REALTIME_ENDPOINT}?model={}", config.model);
        let mut request = endpoint
            .into_client_request()
            .map_err(|e| RealtimeError::Connect(e.to_string()))?;

        let auth = HeaderValue::from_str(&format!("Bearer {}", config.api_key))
            .map_err(|e| RealtimeError::Connect(format!("invalid api key header: {e}")))?;
        let headers = request.headers_mut();
        headers.insert("Authorization", auth);
        headers.insert("OpenAI-Beta", HeaderValue::from_static("realtime=v1"));

        let (ws, _response) = connect_async(request)
            .await
            .map_err(|e| RealtimeError::Connect(e.to_string()))?;
        debug!("Realtime backend connected");

        let (sink, stream) = ws.split();
        let mut sender = RealtimeSender {
            sink,
            closed: false,
        };
        sender.send_json(&session_update(config)).await?;

        Ok(Self {
            sender,
            receiver: RealtimeReceiver { stream },
        })
    }

    /// Split into independently owned halves for a select-driven relay loop.
    pub fn split(self) -> (RealtimeSender, RealtimeReceiver) {
        (self.sender, self.receiver)
    }
}

impl RealtimeSender {
    async fn send_json(&mut self, payload: &Value) -> Result<(), RealtimeError> {
        self.sink
            .send(Message::Text(payload.to_string()))
            .await
            .map_err(|e| RealtimeError::Send(e.to_string()))
    }

    /// Feed one base64 audio payload from the caller into the input buffer.
    pub async fn append_audio(&mut self, payload: &str) -> Result<(), RealtimeError> {
        self.send_json(&json!({
            "type": "input_audio_buffer.append",
            "audio": payload,
        }))
        .await
    }

    /// Return a tool result to the backend's internal reasoning.
    ///
    /// The output travels as a function output item only; it is never part of
    /// the spoken transcript.
    pub async fn send_tool_output(
        &mut self,
        call_id: &str,
        output: &Value,
    ) -> Result<(), RealtimeError> {
        self.send_json(&json!({
            "type": "conversation.item.create",
            "item": {
                "type": "function_call_output",
                "call_id": call_id,
                "output": output.to_string(),
            },
        }))
        .await
    }

    /// Ask the backend to produce its next response.
    pub async fn request_response(&mut self) -> Result<(), RealtimeError> {
        self.send_json(&json!({ "type": "response.create" })).await
    }

    /// Close the connection. Idempotent: only the first call does anything,
    /// and close failures are swallowed since the peer may already be gone.
    pub async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        let _ = self.sink.send(Message::Close(None)).await;
        let _ = self.sink.close().await;
    }
}

impl RealtimeReceiver {
    /// Next meaningful backend event, or `None` once the connection is gone.
    ///
    /// Non-audio delta frames are consumed here and never surface; pings and
    /// pongs are handled by the websocket layer.
    pub async fn next_event(&mut self) -> Option<BackendEvent> {
        loop {
            match self.stream.next().await {
                None => return None,
                Some(Ok(Message::Close(_))) => return None,
                Some(Ok(Message::Text(text))) => {
                    if let Some(event) = decode_event(&text) {
                        return Some(event);
                    }
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    return Some(BackendEvent::Error {
                        message: e.to_string(),
                    })
                }
            }
        }
    }
}

fn session_update(config: &RealtimeConfig) -> Value {
    json!({
        "type": "session.update",
        "session": {
            "instructions": config.instructions,
            "voice": config.voice,
            "modalities": ["audio", "text"],
            "input_audio_format": AUDIO_FORMAT,
            "output_audio_format": AUDIO_FORMAT,
            "turn_detection": { "type": "server_vad" },
            "tools": config.tools,
            "tool_choice": "auto",
        },
    })
}

/// Decode one text frame into a backend event.
///
/// Returns `None` for frames the bridge has no use for (high-frequency
/// non-audio deltas). Frames without a recognizable type tag become lifecycle
/// events tagged `unknown`.
fn decode_event(text: &str) -> Option<BackendEvent> {
    let value: Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(_) => {
            return Some(BackendEvent::Lifecycle {
                event: "unknown".to_string(),
            })
        }
    };

    let event_type = match value.get("type").and_then(Value::as_str) {
        Some(event_type) => event_type,
        None => {
            return Some(BackendEvent::Lifecycle {
                event: "unknown".to_string(),
            })
        }
    };

    match event_type {
        "response.audio.delta" => value
            .get("delta")
            .and_then(Value::as_str)
            .map(|payload| BackendEvent::AudioDelta {
                payload: payload.to_string(),
            }),
        "response.function_call_arguments.done" => Some(BackendEvent::ToolCall {
            call_id: value
                .get("call_id")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            name: value
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            arguments: value
                .get("arguments")
                .and_then(Value::as_str)
                .unwrap_or("{}")
                .to_string(),
        }),
        "error" => {
            let message = value
                .pointer("/error/message")
                .and_then(Value::as_str)
                .unwrap_or(text);
            Some(BackendEvent::Error {
                message: message.to_string(),
            })
        }
        other if other.ends_with(".delta") => None,
        other => Some(BackendEvent::Lifecycle {
            event: other.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_audio_delta() {
        let event = decode_event(r#"{"type":"response.audio.delta","delta":"AAAA"}"#).unwrap();
        assert_eq!(
            event,
            BackendEvent::AudioDelta {
                payload: "AAAA".to_string()
            }
        );
    }

    #[test]
    fn test_decode_tool_call() {
        let event = decode_event(
            r#"{"type":"response.function_call_arguments.done","call_id":"c1","name":"create_lead","arguments":"{\"issue\":\"leak\"}"}"#,
        )
        .unwrap();

        assert_eq!(
            event,
            BackendEvent::ToolCall {
                call_id: "c1".to_string(),
                name: "create_lead".to_string(),
                arguments: r#"{"issue":"leak"}"#.to_string(),
            }
        );
    }

    #[test]
    fn test_decode_error_extracts_message() {
        let event =
            decode_event(r#"{"type":"error","error":{"message":"session expired"}}"#).unwrap();
        assert_eq!(
            event,
            BackendEvent::Error {
                message: "session expired".to_string()
            }
        );
    }

    #[test]
    fn test_decode_lifecycle_keeps_native_tag() {
        let event = decode_event(r#"{"type":"session.created"}"#).unwrap();
        assert_eq!(
            event,
            BackendEvent::Lifecycle {
                event: "session.created".to_string()
            }
        );
    }

    #[test]
    fn test_untyped_frames_default_to_unknown() {
        let event = decode_event(r#"{"foo":1}"#).unwrap();
        assert_eq!(
            event,
            BackendEvent::Lifecycle {
                event: "unknown".to_string()
            }
        );

        let event = decode_event("not json").unwrap();
        assert_eq!(
            event,
            BackendEvent::Lifecycle {
                event: "unknown".to_string()
            }
        );
    }

    #[test]
    fn test_non_audio_deltas_are_skipped() {
        assert!(decode_event(r#"{"type":"response.audio_transcript.delta","delta":"hi"}"#).is_none());
        assert!(decode_event(r#"{"type":"response.text.delta","delta":"hi"}"#).is_none());
    }

    #[test]
    fn test_session_update_shape() {
        let config = RealtimeConfig {
            api_key: "sk-test".to_string(),
            model: "gpt-realtime".to_string(),
            voice: "alloy".to_string(),
            instructions: "be brief".to_string(),
            tools: vec![json!({"type": "function", "name": "create_lead"})],
        };

        let update = session_update(&config);
        assert_eq!(update["type"], "session.update");
        assert_eq!(update["session"]["voice"], "alloy");
        assert_eq!(update["session"]["input_audio_format"], "g711_ulaw");
        assert_eq!(update["session"]["output_audio_format"], "g711_ulaw");
        assert_eq!(update["session"]["turn_detection"]["type"], "server_vad");
        assert_eq!(update["session"]["tools"][0]["name"], "create_lead");
    }
}
