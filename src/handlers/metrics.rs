//! Metrics endpoint handler for Prometheus scraping.
//!
//! Every scrape runs one Passenger status poll, publishes the result into the
//! registry and returns the Prometheus text format.

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use prometheus::{Encoder, TextEncoder};
use std::time::Instant;
use tracing::{debug, error, instrument};

use crate::state::SharedState;

/// Buffer capacity for metrics encoding.
const BUFFER_CAP: usize = 64 * 1024;

/// Error type for metrics endpoint failures.
#[derive(Debug)]
pub enum MetricsError {
    EncodingFailed,
}

impl IntoResponse for MetricsError {
    fn into_response(self) -> axum::response::Response {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to encode metrics",
        )
            .into_response()
    }
}

/// Handler for the metrics endpoint.
#[instrument(skip(state))]
pub async fn metrics_handler(State(state): State<SharedState>) -> Result<String, MetricsError> {
    let start = Instant::now();
    debug!("Processing metrics request");

    let _scrape = state.scrape_lock.lock().await;

    let poll = state.collector.poll().await;
    let poll_secs = poll.duration.as_secs_f64();

    match &poll.error {
        None => {
            state
                .health_stats
                .record_poll_success(poll_secs, poll.processes as u64);
        }
        Some(e) => state.health_stats.record_poll_failure(poll_secs, e.reason()),
    }
    if poll.overflow > 0 {
        state
            .health_stats
            .record_identity_overflow(poll.overflow as u64);
    }
    if let Some(telemetry) = &state.telemetry {
        telemetry.record_poll(poll_secs, poll.error.as_ref().map(|e| e.reason()));
    }

    state.metrics.publish(&poll.measurements);

    let families = state.registry.gather();

    let mut label_count: u64 = 0;
    for family in &families {
        for metric in family.get_metric() {
            label_count += metric.get_label().len() as u64;
        }
    }
    state.health_stats.record_label_cardinality(label_count);

    let mut buffer = Vec::with_capacity(BUFFER_CAP);
    let encoder = TextEncoder::new();

    if encoder.encode(&families, &mut buffer).is_err() {
        error!("Failed to encode Prometheus metrics");
        return Err(MetricsError::EncodingFailed);
    }

    let request_duration_ms = start.elapsed().as_secs_f64() * 1000.0;
    state.health_stats.record_metrics_endpoint_call();
    state
        .health_stats
        .record_request_duration(request_duration_ms);
    state.health_stats.record_http_request();

    // Reported on the next scrape, this one is already encoded.
    if let Some(telemetry) = &state.telemetry {
        telemetry
            .scrape_duration_seconds
            .set(start.elapsed().as_secs_f64());
    }

    debug!(
        "Metrics request completed: {} measurements, {} bytes, {:.3}ms",
        poll.measurements.len(),
        buffer.len(),
        request_duration_ms
    );

    String::from_utf8(buffer).map_err(|_| MetricsError::EncodingFailed)
}
