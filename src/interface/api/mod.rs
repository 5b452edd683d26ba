//! HTTP and websocket API

pub mod call_handler;
pub mod media_stream;
pub mod metrics_handler;
pub mod router;

pub use call_handler::SERVICE_NAME;
pub use metrics_handler::init_metrics;
pub use router::{build_router, AppState};
