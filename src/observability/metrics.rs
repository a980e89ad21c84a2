//! Metrics collection and exposition.
//!
//! # Metrics
//! - `tether_active_connections` (gauge): registry size
//! - `tether_connections_accepted_total` (counter)
//! - `tether_frames_total` (counter): decoded headers by kind
//! - `tether_header_rejections_total` (counter): by reason
//! - `tether_payload_mismatches_total` (counter)
//! - `tether_evictions_total` (counter): idle connections closed by the sweeper
//! - `tether_sweeps_total` (counter)

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::protocol::MessageKind;

/// Install the Prometheus exporter with its own HTTP listener.
///
/// Must be called from within a tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_active_connections(count: usize) {
    gauge!("tether_active_connections").set(count as f64);
}

pub fn record_connection_accepted() {
    counter!("tether_connections_accepted_total").increment(1);
}

pub fn record_frame(kind: MessageKind) {
    counter!("tether_frames_total", "kind" => kind.as_str()).increment(1);
}

pub fn record_header_rejected(reason: &'static str) {
    counter!("tether_header_rejections_total", "reason" => reason).increment(1);
}

pub fn record_payload_mismatch() {
    counter!("tether_payload_mismatches_total").increment(1);
}

pub fn record_eviction() {
    counter!("tether_evictions_total").increment(1);
}

pub fn record_sweep() {
    counter!("tether_sweeps_total").increment(1);
}
