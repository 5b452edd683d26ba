//! Inbound call webhook and health check

use super::router::AppState;
use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde_json::{json, Value};

pub const SERVICE_NAME: &str = "nightline";

/// Health check handler
pub async fn health() -> Json<Value> {
    Json(json!({
        "ok": true,
        "service": SERVICE_NAME,
        "time": Utc::now().to_rfc3339(),
    }))
}

/// Answer the telephony platform's call-start notification.
///
/// Returns TwiML: a recording disclosure, a one-line greeting, then a
/// directive opening the media stream to this deployment. The stream URL uses
/// the configured public hostname, falling back to the request's own Host
/// header.
pub async fn incoming_call(
    State(state): State<AppState>,
    headers: axum::http::HeaderMap,
) -> Response {
    let host = state
        .config
        .public_hostname
        .clone()
        .or_else(|| {
            headers
                .get(header::HOST)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
        })
        .unwrap_or_else(|| "localhost".to_string());

    let twiml = answer_twiml(&host, &state.config.business.display_name);
    ([(header::CONTENT_TYPE, "text/xml")], twiml).into_response()
}

fn answer_twiml(host: &str, business_name: &str) -> String {
    let business = xml_escape(business_name);
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<Response>
  <Say>This call may be recorded for quality and training purposes.</Say>
  <Say>Thank you for calling {business}. One moment while I connect you to our assistant.</Say>
  <Connect>
    <Stream url="wss://{host}/media-stream" />
  </Connect>
</Response>"#
    )
}

fn xml_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
