//! Metrics collection and exposition.
//!
//! # Metrics
//! - `svc_pipeline_responses_total` (counter): pipeline outcomes by `outcome`
//!   (`success`, `text`, `bind_error`, `server_error`, `suppressed`)
//! - `svc_negotiation_total` (counter): negotiation decisions by `result`
//!   (`query`, `body`, `failed`, `passthrough`)

use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Start the Prometheus exporter on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

/// Count one pipeline outcome.
pub fn record_response(outcome: &'static str) {
    ::metrics::counter!("svc_pipeline_responses_total", "outcome" => outcome).increment(1);
}

/// Count one negotiation decision.
pub fn record_negotiation(result: &'static str) {
    ::metrics::counter!("svc_negotiation_total", "result" => result).increment(1);
}
