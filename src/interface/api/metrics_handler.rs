//! Prometheus metrics handler

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Initialize the Prometheus metrics exporter
pub fn init_metrics() -> PrometheusHandle {
    let handle = PrometheusBuilder::new().install_recorder().unwrap();

    // Describe metrics
    describe_counter!("calls_total", "Total number of calls accepted");
    describe_counter!(
        "calls_ended_total",
        "Total number of calls ended, labelled by end reason"
    );
    describe_gauge!(
        "active_call_sessions",
        "Number of call sessions currently live"
    );
    describe_counter!(
        "tool_invocations_total",
        "Tool invocations, labelled by tool and outcome"
    );

    handle
}

/// HTTP metrics handler
pub async fn metrics_handler(
    axum::extract::State(prometheus_handle): axum::extract::State<PrometheusHandle>,
) -> Response {
    let metrics = prometheus_handle.render();
    (StatusCode::OK, metrics).into_response()
}

/// Record an accepted call
pub fn record_call_started() {
    counter!("calls_total").increment(1);
    gauge!("active_call_sessions").increment(1.0);
}

/// Record a call ending
pub fn record_call_ended(reason: &str) {
    counter!("calls_ended_total", "reason" => reason.to_string()).increment(1);
    gauge!("active_call_sessions").decrement(1.0);
}

/// Record a tool invocation outcome
pub fn record_tool_invocation(tool: &str, outcome: &str) {
    counter!("tool_invocations_total", "tool" => tool.to_string(), "outcome" => outcome.to_string())
        .increment(1);
}
