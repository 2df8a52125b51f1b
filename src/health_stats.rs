//! Health statistics for the exporter.
//!
//! Tracks poll performance, poll failures by reason, identity overflow events
//! and HTTP request metrics. Rendered as a fixed-width table on `/health`.

use std::collections::{BTreeMap, VecDeque};
use std::fmt::Write as FmtWrite;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, RwLock as StdRwLock};
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};

/// Running statistics for a single metric.
#[derive(Clone, Copy, Default)]
pub struct RunningStat {
    count: u64,
    sum: f64,
    min: f64,
    max: f64,
    last: f64,
}

impl RunningStat {
    pub fn add(&mut self, value: f64) {
        if self.count == 0 {
            self.min = value;
            self.max = value;
            self.last = value;
            self.sum = value;
            self.count = 1;
            return;
        }
        self.count += 1;
        self.sum += value;
        self.last = value;
        if value < self.min {
            self.min = value;
        }
        if value > self.max {
            self.max = value;
        }
    }

    pub fn avg(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / (self.count as f64)
        }
    }
}

/// Point-in-time copy of a [`Stat`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StatSnapshot {
    pub current: f64,
    pub avg: f64,
    pub max: f64,
    pub min: f64,
    pub count: u64,
}

/// Thread-safe wrapper for running statistics.
#[derive(Default)]
pub struct Stat {
    inner: Mutex<RunningStat>,
}

impl Stat {
    pub fn add_sample(&self, value: f64) {
        if let Ok(mut s) = self.inner.lock() {
            s.add(value);
        }
    }

    pub fn snapshot(&self) -> StatSnapshot {
        match self.inner.lock() {
            Ok(s) => StatSnapshot {
                current: s.last,
                avg: s.avg(),
                max: s.max,
                min: s.min,
                count: s.count,
            },
            Err(_) => StatSnapshot::default(),
        }
    }
}

/// Sliding window of HTTP request timestamps.
pub struct RequestTimestamps {
    inner: Mutex<VecDeque<Instant>>,
}

impl Default for RequestTimestamps {
    fn default() -> Self {
        Self {
            inner: Mutex::new(VecDeque::with_capacity(1024)),
        }
    }
}

impl RequestTimestamps {
    pub fn record(&self) {
        if let Ok(mut guard) = self.inner.lock() {
            let now = Instant::now();
            guard.push_back(now);
            // Bounded to ten minutes of history.
            if let Some(cutoff) = now.checked_sub(Duration::from_secs(600)) {
                while guard.front().is_some_and(|&t| t < cutoff) {
                    guard.pop_front();
                }
            }
        }
    }

    pub fn count_last_minute(&self) -> u64 {
        let Ok(guard) = self.inner.lock() else {
            return 0;
        };
        match Instant::now().checked_sub(Duration::from_secs(60)) {
            Some(cutoff) => guard.iter().filter(|&&t| t >= cutoff).count() as u64,
            None => guard.len() as u64,
        }
    }
}

/// Exporter health statistics shared between handlers.
pub struct HealthStats {
    // Poll performance
    pub poll_duration_seconds: Stat,
    pub processes_per_poll: Stat,
    pub total_polls: AtomicU64,
    pub poll_success_count: AtomicU64,
    pub poll_failures: Mutex<BTreeMap<String, u64>>,
    pub identity_overflow_events: AtomicU64,

    // HTTP server
    pub http_request_timestamps: RequestTimestamps,
    pub request_duration_ms: Stat,
    pub label_cardinality: Stat,
    pub metrics_endpoint_calls: AtomicU64,

    // Timing
    pub start_time: Instant,
    pub last_poll_time: StdRwLock<Option<DateTime<Local>>>,
    last_poll_ok: AtomicBool,
}

impl Default for HealthStats {
    fn default() -> Self {
        Self {
            poll_duration_seconds: Stat::default(),
            processes_per_poll: Stat::default(),
            total_polls: AtomicU64::new(0),
            poll_success_count: AtomicU64::new(0),
            poll_failures: Mutex::new(BTreeMap::new()),
            identity_overflow_events: AtomicU64::new(0),
            http_request_timestamps: RequestTimestamps::default(),
            request_duration_ms: Stat::default(),
            label_cardinality: Stat::default(),
            metrics_endpoint_calls: AtomicU64::new(0),
            start_time: Instant::now(),
            last_poll_time: StdRwLock::new(None),
            last_poll_ok: AtomicBool::new(true),
        }
    }
}

impl HealthStats {
    pub fn new() -> Self {
        Default::default()
    }

    /// Records a successful poll that saw `processes` processes.
    pub fn record_poll_success(&self, duration_seconds: f64, processes: u64) {
        self.poll_duration_seconds.add_sample(duration_seconds);
        self.processes_per_poll.add_sample(processes as f64);
        self.total_polls.fetch_add(1, Ordering::Relaxed);
        self.poll_success_count.fetch_add(1, Ordering::Relaxed);
        self.last_poll_ok.store(true, Ordering::Relaxed);
        self.update_last_poll_time();
    }

    /// Records a failed poll under its error class.
    pub fn record_poll_failure(&self, duration_seconds: f64, reason: &str) {
        self.poll_duration_seconds.add_sample(duration_seconds);
        self.total_polls.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut failures) = self.poll_failures.lock() {
            *failures.entry(reason.to_string()).or_insert(0) += 1;
        }
        self.last_poll_ok.store(false, Ordering::Relaxed);
        self.update_last_poll_time();
    }

    pub fn record_identity_overflow(&self, count: u64) {
        self.identity_overflow_events
            .fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_http_request(&self) {
        self.http_request_timestamps.record();
    }

    pub fn record_request_duration(&self, duration_ms: f64) {
        self.request_duration_ms.add_sample(duration_ms);
    }

    pub fn record_label_cardinality(&self, count: u64) {
        self.label_cardinality.add_sample(count as f64);
    }

    pub fn record_metrics_endpoint_call(&self) {
        self.metrics_endpoint_calls.fetch_add(1, Ordering::Relaxed);
    }

    fn update_last_poll_time(&self) {
        if let Ok(mut guard) = self.last_poll_time.write() {
            *guard = Some(Local::now());
        }
    }

    /// False once the most recent poll failed. True before the first poll.
    pub fn is_healthy(&self) -> bool {
        self.last_poll_ok.load(Ordering::Relaxed)
    }

    pub fn failure_count(&self) -> u64 {
        self.poll_failures
            .lock()
            .map(|f| f.values().sum())
            .unwrap_or(0)
    }

    pub fn get_poll_success_rate(&self) -> f64 {
        let success = self.poll_success_count.load(Ordering::Relaxed);
        let total = self.total_polls.load(Ordering::Relaxed);
        if total == 0 {
            100.0
        } else {
            (success as f64 / total as f64) * 100.0
        }
    }

    pub fn get_uptime_hours(&self) -> f64 {
        self.start_time.elapsed().as_secs_f64() / 3600.0
    }

    pub fn get_uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub fn get_last_poll_time_str(&self) -> String {
        match self.last_poll_time.read() {
            Ok(guard) => guard
                .map(|t| t.format("%H:%M:%S").to_string())
                .unwrap_or_else(|| "N/A".to_string()),
            Err(_) => "N/A".to_string(),
        }
    }

    pub fn render_table(&self) -> String {
        let poll = self.poll_duration_seconds.snapshot();
        let procs = self.processes_per_poll.snapshot();
        let req = self.request_duration_ms.snapshot();
        let labels = self.label_cardinality.snapshot();

        let left_col = 26usize;
        let col_w = 12usize;

        let mut out = String::new();

        writeln!(out, "HEALTH ENDPOINT - EXPORTER INTERNAL STATS").ok();
        writeln!(out, "==========================================").ok();
        writeln!(out).ok();

        writeln!(
            out,
            "{:left$} | {:^col$} | {:^col$} | {:^col$} | {:^col$}",
            "",
            "current",
            "average",
            "max",
            "min",
            left = left_col,
            col = col_w
        )
        .ok();

        let row = |out: &mut String, name: &str, s: StatSnapshot, precision: usize| {
            writeln!(
                out,
                "{:left$} | {:^col$} | {:^col$} | {:^col$} | {:^col$}",
                name,
                format!("{:.p$}", s.current, p = precision),
                format!("{:.p$}", s.avg, p = precision.max(1)),
                format!("{:.p$}", s.max, p = precision),
                format!("{:.p$}", s.min, p = precision),
                left = left_col,
                col = col_w
            )
            .ok();
        };

        writeln!(out).ok();
        writeln!(out, "POLL PERFORMANCE").ok();
        writeln!(out, "-----------------").ok();
        row(&mut out, "poll_duration (s)", poll, 3);
        row(&mut out, "processes_per_poll", procs, 0);

        writeln!(out).ok();
        writeln!(out, "HTTP SERVER").ok();
        writeln!(out, "------------").ok();
        row(&mut out, "request_duration (ms)", req, 2);
        row(&mut out, "label_cardinality", labels, 0);

        writeln!(out).ok();
        writeln!(out, "COUNTERS").ok();
        writeln!(out, "---------").ok();
        let counter = |out: &mut String, name: &str, value: String| {
            writeln!(out, "{:left$} | {}", name, value, left = left_col).ok();
        };
        counter(
            &mut out,
            "total_polls",
            self.total_polls.load(Ordering::Relaxed).to_string(),
        );
        counter(
            &mut out,
            "poll_success_rate (%)",
            format!("{:.1}", self.get_poll_success_rate()),
        );
        if let Ok(failures) = self.poll_failures.lock() {
            for (reason, count) in failures.iter() {
                counter(&mut out, &format!("poll_failures[{}]", reason), count.to_string());
            }
        }
        counter(
            &mut out,
            "identity_overflow_events",
            self.identity_overflow_events
                .load(Ordering::Relaxed)
                .to_string(),
        );
        counter(
            &mut out,
            "metrics_endpoint_calls",
            self.metrics_endpoint_calls
                .load(Ordering::Relaxed)
                .to_string(),
        );
        counter(
            &mut out,
            "http_requests_last_minute",
            self.http_request_timestamps.count_last_minute().to_string(),
        );

        writeln!(out).ok();
        writeln!(out, "STATUS").ok();
        writeln!(out, "-------").ok();
        counter(
            &mut out,
            "last_poll",
            if self.is_healthy() { "ok" } else { "failed" }.to_string(),
        );
        counter(&mut out, "last_poll_time", self.get_last_poll_time_str());
        counter(
            &mut out,
            "uptime (h)",
            format!("{:.2}", self.get_uptime_hours()),
        );

        out
    }
}
