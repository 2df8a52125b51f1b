//! Prometheus registration and publishing of Passenger measurements.
//!
//! [`PassengerMetrics`] owns one metric vector per family in
//! [`ALL_METRICS`](crate::translate::ALL_METRICS). Every publish replaces the
//! previous poll wholesale, so series of vanished groups or slots disappear
//! and a failed poll exposes nothing but `passenger_up 0`.
//!
//! [`ExporterMetrics`] covers the exporter's own telemetry.

use ahash::AHashMap as HashMap;
use prometheus::{CounterVec, Gauge, GaugeVec, Opts, Registry};
use tracing::warn;

use crate::translate::{MetricKind, Measurement, ALL_METRICS, UP};

/// Registered Passenger metric families.
#[derive(Clone)]
pub struct PassengerMetrics {
    up: Gauge,
    gauges: HashMap<&'static str, GaugeVec>,
    counters: HashMap<&'static str, CounterVec>,
}

impl PassengerMetrics {
    /// Creates and registers all Passenger families with the registry.
    pub fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let up = Gauge::new(UP.name, UP.help)?;
        registry.register(Box::new(up.clone()))?;

        let mut gauges = HashMap::new();
        let mut counters = HashMap::new();

        for def in ALL_METRICS.iter().filter(|d| d.name != UP.name) {
            let opts = Opts::new(def.name, def.help);
            match def.kind {
                MetricKind::Gauge => {
                    let vec = GaugeVec::new(opts, def.labels)?;
                    registry.register(Box::new(vec.clone()))?;
                    gauges.insert(def.name, vec);
                }
                MetricKind::Counter => {
                    let vec = CounterVec::new(opts, def.labels)?;
                    registry.register(Box::new(vec.clone()))?;
                    counters.insert(def.name, vec);
                }
            }
        }

        Ok(Self {
            up,
            gauges,
            counters,
        })
    }

    /// Replaces all exposed samples with `measurements`. `passenger_up` is 0
    /// unless the poll carried it.
    pub fn publish(&self, measurements: &[Measurement]) {
        self.clear();
        self.up.set(0.0);

        for m in measurements {
            if m.name == UP.name {
                self.up.set(m.value);
                continue;
            }
            let values: Vec<&str> = m.labels.iter().map(|(_, v)| v.as_str()).collect();
            let applied = match m.kind {
                MetricKind::Gauge => self
                    .gauges
                    .get(m.name)
                    .map(|vec| vec.get_metric_with_label_values(&values).map(|g| g.set(m.value))),
                MetricKind::Counter => self.counters.get(m.name).map(|vec| {
                    vec.get_metric_with_label_values(&values)
                        .map(|c| c.inc_by(m.value))
                }),
            };

            match applied {
                Some(Ok(())) => {}
                Some(Err(e)) => warn!("Dropping sample for {}: {}", m.name, e),
                None => warn!("Dropping sample for unregistered metric {}", m.name),
            }
        }
    }

    fn clear(&self) {
        for vec in self.gauges.values() {
            vec.reset();
        }
        for vec in self.counters.values() {
            vec.reset();
        }
    }
}

/// Exporter self-telemetry.
#[derive(Clone)]
pub struct ExporterMetrics {
    pub build_info: GaugeVec,
    pub scrape_duration_seconds: Gauge,
    pub poll_duration_seconds: Gauge,
    pub last_poll_success: Gauge,
    pub poll_errors_total: CounterVec,
}

impl ExporterMetrics {
    pub fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let build_info = GaugeVec::new(
            Opts::new(
                "passenger_exporter_build_info",
                "Build information of the exporter",
            ),
            &["version", "git_sha", "build_timestamp"],
        )?;
        let scrape_duration_seconds = Gauge::new(
            "passenger_exporter_scrape_duration_seconds",
            "Duration of the previous scrape in seconds",
        )?;
        let poll_duration_seconds = Gauge::new(
            "passenger_exporter_poll_duration_seconds",
            "Duration of the previous status poll in seconds",
        )?;
        let last_poll_success = Gauge::new(
            "passenger_exporter_last_poll_success",
            "Whether the previous status poll succeeded (1) or failed (0)",
        )?;
        let poll_errors_total = CounterVec::new(
            Opts::new(
                "passenger_exporter_poll_errors_total",
                "Total failed status polls by reason",
            ),
            &["reason"],
        )?;

        registry.register(Box::new(build_info.clone()))?;
        registry.register(Box::new(scrape_duration_seconds.clone()))?;
        registry.register(Box::new(poll_duration_seconds.clone()))?;
        registry.register(Box::new(last_poll_success.clone()))?;
        registry.register(Box::new(poll_errors_total.clone()))?;

        build_info
            .with_label_values(&[
                env!("CARGO_PKG_VERSION"),
                env!("VERGEN_GIT_SHA"),
                env!("VERGEN_BUILD_TIMESTAMP"),
            ])
            .set(1.0);

        Ok(Self {
            build_info,
            scrape_duration_seconds,
            poll_duration_seconds,
            last_poll_success,
            poll_errors_total,
        })
    }

    /// Records the outcome of one poll. `error_reason` is `None` on success.
    pub fn record_poll(&self, duration_secs: f64, error_reason: Option<&str>) {
        self.poll_duration_seconds.set(duration_secs);
        match error_reason {
            None => self.last_poll_success.set(1.0),
            Some(reason) => {
                self.last_poll_success.set(0.0);
                self.poll_errors_total.with_label_values(&[reason]).inc();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translate::{PROC_MEMORY, REQUESTS_PROCESSED, UP, VERSION};
    use prometheus::{Encoder, TextEncoder};

    fn exposition(registry: &Registry) -> String {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&registry.gather(), &mut buffer)
            .unwrap();
        String::from_utf8(buffer).unwrap()
    }

    #[test]
    fn test_new_registers_every_family() {
        let registry = Registry::new();
        assert!(PassengerMetrics::new(&registry).is_ok());
        // A second registration of the same names must fail.
        assert!(PassengerMetrics::new(&registry).is_err());
    }

    #[test]
    fn test_failed_poll_leaves_only_up() {
        let registry = Registry::new();
        let metrics = PassengerMetrics::new(&registry).unwrap();

        metrics.publish(&[
            Measurement::new(&UP, 1.0, vec![]),
            Measurement::new(&VERSION, 1.0, vec!["6.0.18".into()]),
        ]);
        let text = exposition(&registry);
        assert!(text.contains("passenger_up 1"));
        assert!(text.contains("passenger_version{version=\"6.0.18\"} 1"));

        metrics.publish(&[Measurement::new(&UP, 0.0, vec![])]);
        let text = exposition(&registry);
        assert!(text.contains("passenger_up 0"));
        assert!(!text.contains("passenger_version"));
    }

    #[test]
    fn test_counter_value_is_replaced_not_accumulated() {
        let registry = Registry::new();
        let metrics = PassengerMetrics::new(&registry).unwrap();
        let sample = |v| {
            Measurement::new(
                &REQUESTS_PROCESSED,
                v,
                vec!["app".into(), "0".into()],
            )
        };

        metrics.publish(&[sample(10.0)]);
        metrics.publish(&[sample(12.0)]);

        let counter = metrics.counters[REQUESTS_PROCESSED.name].with_label_values(&["app", "0"]);
        assert_eq!(counter.get(), 12.0);
    }

    #[test]
    fn test_mismatched_labels_are_dropped() {
        let registry = Registry::new();
        let metrics = PassengerMetrics::new(&registry).unwrap();
        let bad = Measurement {
            name: PROC_MEMORY.name,
            kind: PROC_MEMORY.kind,
            value: 1.0,
            labels: vec![("name", "app".into())],
        };

        metrics.publish(&[bad]);
        assert!(!exposition(&registry).contains(PROC_MEMORY.name));
    }

    #[test]
    fn test_record_poll_counts_errors_by_reason() {
        let registry = Registry::new();
        let exporter = ExporterMetrics::new(&registry).unwrap();

        exporter.record_poll(0.25, Some("timeout"));
        exporter.record_poll(0.5, None);

        assert_eq!(exporter.last_poll_success.get(), 1.0);
        assert_eq!(exporter.poll_duration_seconds.get(), 0.5);
        assert_eq!(
            exporter.poll_errors_total.with_label_values(&["timeout"]).get(),
            1.0
        );
    }
}
