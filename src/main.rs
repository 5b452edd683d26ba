use anyhow::Context;
use nightline::config::Config;
use nightline::domain::event::EventLog;
use nightline::domain::lead::LeadStore;
use nightline::domain::messaging::SmsGateway;
use nightline::domain::tools::{operating_instructions, ToolSet};
use nightline::infrastructure::bridge::CallSessionBridge;
use nightline::infrastructure::realtime::RealtimeConfig;
use nightline::infrastructure::sms::TwilioSmsClient;
use nightline::infrastructure::store::{JsonlEventLog, JsonlLeadStore};
use nightline::interface::api::{build_router, init_metrics, AppState};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting Nightline after-hours answering service");

    // Load configuration; a missing required value refuses to start
    let config = Config::from_env().context("configuration error")?;
    info!(
        "Configuration loaded: answering for {}",
        config.business.display_name
    );

    // Initialize metrics exporter
    let prometheus_handle = init_metrics();

    // Append-only sinks
    let leads: Arc<dyn LeadStore> = Arc::new(JsonlLeadStore::new(&config.storage.leads_path));
    let events: Arc<dyn EventLog> = Arc::new(JsonlEventLog::new(&config.storage.events_path));

    // Messaging gateway, if credentials are present
    let sms: Option<Arc<dyn SmsGateway>> = match &config.twilio {
        Some(twilio) => {
            info!("Messaging gateway configured, sending from {}", twilio.from_number);
            Some(Arc::new(TwilioSmsClient::new(
                twilio.account_sid.clone(),
                twilio.auth_token.clone(),
                twilio.from_number.clone(),
            )) as Arc<dyn SmsGateway>)
        }
        None => {
            warn!("No messaging gateway credentials; outbound texts will be skipped");
            None
        }
    };

    let tools = Arc::new(ToolSet::new(
        config.business.display_name.clone(),
        config.business.oncall_number.clone(),
        leads,
        events.clone(),
        sms,
    ));

    let realtime = RealtimeConfig {
        api_key: config.realtime.api_key.clone(),
        model: config.realtime.model.clone(),
        voice: config.realtime.voice.clone(),
        instructions: operating_instructions(&config.business.display_name),
        tools: tools.definitions(),
    };

    let bridge = Arc::new(CallSessionBridge::new(realtime, tools, events));

    let state = AppState {
        config: Arc::new(config.clone()),
        bridge,
    };

    let app = build_router(state, prometheus_handle);
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    info!("Listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("Shut down cleanly");
    Ok(())
}

/// Wait for Ctrl+C so in-flight calls get a clean close
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to install shutdown handler: {e}");
        return;
    }
    info!("Received shutdown signal");
}
