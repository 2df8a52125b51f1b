//! Application state management for the exporter.
//!
//! This module defines the shared application state that is passed
//! to HTTP handlers.

use passenger_exporter::health_stats::HealthStats;
use passenger_exporter::{Collector, ExporterMetrics, PassengerMetrics};
use prometheus::Registry;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;

use crate::config::Config;

/// Type alias for shared application state.
pub type SharedState = Arc<AppState>;

/// Global application state shared across requests.
pub struct AppState {
    pub registry: Registry,
    pub metrics: PassengerMetrics,
    /// Present when telemetry is enabled.
    pub telemetry: Option<ExporterMetrics>,
    pub collector: Collector,
    pub config: Arc<Config>,
    pub health_stats: Arc<HealthStats>,
    /// Serialises poll, publish and gather across concurrent scrapes.
    pub scrape_lock: Mutex<()>,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}
