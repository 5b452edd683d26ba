//! Call session bridge
//!
//! The core of the service: for each accepted media channel it opens exactly
//! one realtime backend session, relays audio frames in both directions
//! without transforming them, hands tool calls to the tool set, and tears the
//! session down exactly once no matter which side goes away first.

pub mod stream;

use crate::domain::event::{CallEvent, EventLog};
use crate::domain::session::{CallSession, EndReason};
use crate::domain::tools::{ToolError, ToolReply, ToolSet};
use crate::infrastructure::realtime::{BackendEvent, RealtimeConfig, RealtimeSender, RealtimeSession};
use crate::interface::api::metrics_handler::record_tool_invocation;
use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use self::stream::StreamFrame;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Lifecycle tag signalling the caller started speaking over queued playback.
const SPEECH_STARTED: &str = "input_audio_buffer.speech_started";

type ToolResult = (String, String, Result<ToolReply, ToolError>);

/// Bridges one telephony media channel to one realtime backend session
pub struct CallSessionBridge {
    realtime: RealtimeConfig,
    tools: Arc<ToolSet>,
    events: Arc<dyn EventLog>,
}

impl CallSessionBridge {
    pub fn new(realtime: RealtimeConfig, tools: Arc<ToolSet>, events: Arc<dyn EventLog>) -> Self {
        Self {
            realtime,
            tools,
            events,
        }
    }

    /// Accept one audio channel and drive the call to completion.
    ///
    /// Returns the ended session. Each invocation is fully isolated: no state
    /// is shared with concurrent sessions except the append-only sinks.
    pub async fn open_session(&self, socket: WebSocket) -> CallSession {
        let mut session = CallSession::new();
        info!("Call session {} accepted", session.id());

        // The backend connection is established before any audio is relayed,
        // so the caller never streams into a void.
        let backend = match RealtimeSession::connect(&self.realtime).await {
            Ok(backend) => backend,
            Err(e) => {
                self.append_event(CallEvent::SessionError {
                    error: e.to_string(),
                })
                .await;
                session.end(EndReason::BackendError(e.to_string()));
                return session;
            }
        };

        self.append_event(CallEvent::RealtimeConnected {
            session_id: session.id().to_string(),
        })
        .await;

        if let Err(e) = session.activate() {
            warn!("Call session {} failed to activate: {e}", session.id());
        }

        let (mut backend_tx, mut backend_rx) = backend.split();

        // The agent opens the conversation
        if let Err(e) = backend_tx.request_response().await {
            self.finish(&mut session, &mut backend_tx, EndReason::BackendError(e.to_string()))
                .await;
            return session;
        }

        let (mut caller_tx, mut caller_rx) = socket.split();
        let (tool_tx, mut tool_rx) = mpsc::unbounded_channel::<ToolResult>();

        loop {
            tokio::select! {
                frame = caller_rx.next() => match frame {
                    Some(Ok(Message::Text(text))) => match serde_json::from_str::<StreamFrame>(&text) {
                        Ok(StreamFrame::Start { start }) => {
                            debug!("Stream {} started for session {}", start.stream_sid, session.id());
                            session.set_stream_sid(start.stream_sid);
                        }
                        Ok(StreamFrame::Media { media, .. }) => {
                            if let Err(e) = backend_tx.append_audio(&media.payload).await {
                                self.finish(&mut session, &mut backend_tx, EndReason::BackendError(e.to_string())).await;
                                break;
                            }
                        }
                        Ok(StreamFrame::Stop) => {
                            self.finish(&mut session, &mut backend_tx, EndReason::CallerHangup).await;
                            break;
                        }
                        Ok(StreamFrame::Connected) | Ok(StreamFrame::Mark) | Ok(StreamFrame::Clear { .. }) => {}
                        Err(e) => debug!("Ignoring unrecognized stream frame: {e}"),
                    },
                    Some(Ok(Message::Close(_))) | None => {
                        self.finish(&mut session, &mut backend_tx, EndReason::CallerHangup).await;
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!("Media channel error for session {}: {e}", session.id());
                        self.finish(&mut session, &mut backend_tx, EndReason::CallerHangup).await;
                        break;
                    }
                },

                event = backend_rx.next_event() => match event {
                    Some(BackendEvent::AudioDelta { payload }) => match session.stream_sid() {
                        Some(sid) => {
                            let frame = StreamFrame::media(sid, &payload);
                            if let Ok(text) = serde_json::to_string(&frame) {
                                if caller_tx.send(Message::Text(text)).await.is_err() {
                                    self.finish(&mut session, &mut backend_tx, EndReason::CallerHangup).await;
                                    break;
                                }
                            }
                        }
                        None => debug!("Dropping backend audio before stream start"),
                    },
                    Some(BackendEvent::ToolCall { call_id, name, arguments }) => {
                        // Tool side effects run off the relay path; the result
                        // comes back over the channel and is discarded if the
                        // session has ended by then.
                        let tools = self.tools.clone();
                        let results = tool_tx.clone();
                        tokio::spawn(async move {
                            let reply = tools.dispatch(&name, &arguments).await;
                            let _ = results.send((call_id, name, reply));
                        });
                    }
                    Some(BackendEvent::Lifecycle { event }) => {
                        // Appended before any further processing
                        self.append_event(CallEvent::TransportEvent { event: event.clone() }).await;
                        if event == SPEECH_STARTED {
                            if let Some(sid) = session.stream_sid() {
                                if let Ok(text) = serde_json::to_string(&StreamFrame::clear(sid)) {
                                    let _ = caller_tx.send(Message::Text(text)).await;
                                }
                            }
                        }
                    }
                    Some(BackendEvent::Error { message }) => {
                        self.append_event(CallEvent::SessionError { error: message.clone() }).await;
                        self.finish(&mut session, &mut backend_tx, EndReason::BackendError(message)).await;
                        break;
                    }
                    None => {
                        self.finish(&mut session, &mut backend_tx, EndReason::BackendClosed).await;
                        break;
                    }
                },

                Some((call_id, name, result)) = tool_rx.recv() => {
                    let outcome = match &result {
                        Ok(ToolReply::Completed { .. }) => "completed",
                        Ok(ToolReply::Skipped { .. }) => "skipped",
                        Err(_) => "failed",
                    };
                    record_tool_invocation(&name, outcome);

                    let output = match result {
                        Ok(reply) => serde_json::to_value(&reply)
                            .unwrap_or_else(|_| json!({ "status": "completed" })),
                        Err(e) => {
                            warn!("Tool {name} failed for session {}: {e}", session.id());
                            json!({ "status": "failed", "error": e.to_string() })
                        }
                    };

                    if backend_tx.send_tool_output(&call_id, &output).await.is_err()
                        || backend_tx.request_response().await.is_err()
                    {
                        self.finish(&mut session, &mut backend_tx, EndReason::BackendError("tool output send failed".to_string())).await;
                        break;
                    }
                },
            }
        }

        let _ = caller_tx.close().await;
        session
    }

    /// Tear the session down. Guarded by the session state machine so repeated
    /// invocations are no-ops: the backend connection is released once and the
    /// end is logged once.
    async fn finish(
        &self,
        session: &mut CallSession,
        backend: &mut RealtimeSender,
        reason: EndReason,
    ) {
        let reason_tag = reason.as_str();
        if !session.end(reason) {
            return;
        }

        backend.close().await;
        info!("Call session {} ended: {reason_tag}", session.id());
    }

    /// Best-effort append: a sink fault must never take the session down.
    async fn append_event(&self, event: CallEvent) {
        let tag = event.type_tag();
        if let Err(e) = self.events.append(event).await {
            warn!("Failed to append {tag} event: {e}");
        }
    }
}
