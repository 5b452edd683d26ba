//! Telephony media-stream control frames
//!
//! The telephony platform frames its media websocket as JSON control
//! messages discriminated by an `event` tag. Inbound the bridge sees
//! `connected`, `start`, `media`, `stop` and `mark`; outbound it emits
//! `media` and `clear`.

use serde::{Deserialize, Serialize};

/// One control frame on the media websocket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum StreamFrame {
    /// Handshake acknowledgment, first frame on the channel
    Connected,

    /// Stream metadata; carries the stream identifier used to address
    /// outbound frames
    Start { start: StartMeta },

    /// One chunk of base64 audio
    Media {
        #[serde(
            rename = "streamSid",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        stream_sid: Option<String>,
        media: MediaPayload,
    },

    /// The platform closed the audio stream
    Stop,

    /// Playback checkpoint acknowledgment
    Mark,

    /// Discard any audio the platform has buffered but not yet played
    Clear {
        #[serde(rename = "streamSid")]
        stream_sid: String,
    },
}

/// Metadata carried by the `start` frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartMeta {
    #[serde(rename = "streamSid")]
    pub stream_sid: String,

    #[serde(rename = "callSid", default, skip_serializing_if = "Option::is_none")]
    pub call_sid: Option<String>,
}

/// Audio payload carried by a `media` frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaPayload {
    /// Base64 audio in the stream's negotiated format
    pub payload: String,
}

impl StreamFrame {
    /// Outbound audio frame addressed to a stream
    pub fn media(stream_sid: &str, payload: &str) -> Self {
        StreamFrame::Media {
            stream_sid: Some(stream_sid.to_string()),
            media: MediaPayload {
                payload: payload.to_string(),
            },
        }
    }

    /// Outbound clear frame addressed to a stream
    pub fn clear(stream_sid: &str) -> Self {
        StreamFrame::Clear {
            stream_sid: stream_sid.to_string(),
        }
    }
}
