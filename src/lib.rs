//! Passenger Exporter Library
//!
//! Turns the output of `passenger-status --show=xml` into Prometheus metrics.
//! Worker processes are labelled by a stable slot number instead of their pid,
//! so process churn does not grow the number of series without bound.
//!
//! # Usage
//!
//! ```no_run
//! use std::time::Duration;
//! use passenger_exporter::{Collector, PassengerMetrics, StatusCommand};
//! use prometheus::Registry;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = Registry::new();
//! let metrics = PassengerMetrics::new(&registry)?;
//!
//! let command = StatusCommand::from_command_line(
//!     "passenger-status --show=xml",
//!     Duration::from_secs(5),
//! )
//! .ok_or("empty command")?;
//! let collector = Collector::new(command);
//!
//! let poll = collector.poll().await;
//! metrics.publish(&poll.measurements);
//! # Ok(())
//! # }
//! ```

pub mod collector;
pub mod error;
pub mod fetcher;
pub mod health_stats;
pub mod identity;
pub mod metrics;
#[cfg(target_os = "linux")]
pub mod pidfile;
pub mod status;
pub mod translate;

// Re-export main types for convenience
pub use collector::{Collector, Poll};
pub use error::{CommandFailure, ParseError, StatusError};
pub use fetcher::StatusCommand;
pub use identity::IdentityMap;
pub use metrics::{ExporterMetrics, PassengerMetrics};
pub use status::{Group, ProcessRecord, Snapshot};
pub use translate::{Measurement, MetricKind};
