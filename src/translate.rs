//! Snapshot to measurement translation.
//!
//! [`translate`] flattens a [`Snapshot`] and the current slot assignment
//! into an ordered list of [`Measurement`]s. It is pure and total: a process
//! without a slot is skipped, never an error.

use crate::identity::IdentityMap;
use crate::status::Snapshot;

pub const NAMESPACE: &str = "passenger";

const MICROSECONDS_PER_SECOND: i64 = 1_000_000;

/// Prometheus metric type of a measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Gauge,
    Counter,
}

/// Static description of one exported metric family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricDef {
    pub name: &'static str,
    pub help: &'static str,
    pub kind: MetricKind,
    pub labels: &'static [&'static str],
}

pub const UP: MetricDef = MetricDef {
    name: "passenger_up",
    help: "Current health of passenger.",
    kind: MetricKind::Gauge,
    labels: &[],
};
pub const VERSION: MetricDef = MetricDef {
    name: "passenger_version",
    help: "Version of passenger.",
    kind: MetricKind::Gauge,
    labels: &["version"],
};
pub const TOP_LEVEL_REQUEST_QUEUE: MetricDef = MetricDef {
    name: "passenger_top_level_request_queue",
    help: "Number of requests in the top-level queue.",
    kind: MetricKind::Gauge,
    labels: &[],
};
pub const MAX_PROCESSES: MetricDef = MetricDef {
    name: "passenger_max_processes",
    help: "Configured maximum number of processes.",
    kind: MetricKind::Gauge,
    labels: &[],
};
pub const CURRENT_PROCESSES: MetricDef = MetricDef {
    name: "passenger_current_processes",
    help: "Current number of processes.",
    kind: MetricKind::Gauge,
    labels: &[],
};
pub const APP_GROUP_COUNT: MetricDef = MetricDef {
    name: "passenger_app_group_count",
    help: "Number of app groups.",
    kind: MetricKind::Gauge,
    labels: &[],
};
pub const APP_REQUEST_QUEUE: MetricDef = MetricDef {
    name: "passenger_app_request_queue",
    help: "Number of requests in the app queue.",
    kind: MetricKind::Gauge,
    labels: &["name"],
};
pub const APP_PROCS_SPAWNING: MetricDef = MetricDef {
    name: "passenger_app_procs_spawning",
    help: "Number of processes spawning.",
    kind: MetricKind::Gauge,
    labels: &["name"],
};
pub const REQUESTS_PROCESSED: MetricDef = MetricDef {
    name: "passenger_requests_processed_total",
    help: "Number of requests served by a process.",
    kind: MetricKind::Counter,
    labels: &["name", "id"],
};
pub const PROC_START_TIME: MetricDef = MetricDef {
    name: "passenger_proc_start_time_seconds",
    help: "Number of seconds since process started.",
    kind: MetricKind::Gauge,
    labels: &["name", "id"],
};
pub const PROC_MEMORY: MetricDef = MetricDef {
    name: "passenger_proc_memory",
    help: "Memory consumed by a process",
    kind: MetricKind::Gauge,
    labels: &["name", "id"],
};

/// Every family the collector can emit, `passenger_up` first.
pub const ALL_METRICS: [MetricDef; 11] = [
    UP,
    VERSION,
    TOP_LEVEL_REQUEST_QUEUE,
    MAX_PROCESSES,
    CURRENT_PROCESSES,
    APP_GROUP_COUNT,
    APP_REQUEST_QUEUE,
    APP_PROCS_SPAWNING,
    REQUESTS_PROCESSED,
    PROC_START_TIME,
    PROC_MEMORY,
];

/// One sample: metric name, type, value and label pairs.
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    pub name: &'static str,
    pub kind: MetricKind,
    pub value: f64,
    pub labels: Vec<(&'static str, String)>,
}

impl Measurement {
    /// Builds a sample for `def`; `values` must line up with `def.labels`.
    pub fn new(def: &MetricDef, value: f64, values: Vec<String>) -> Self {
        debug_assert_eq!(def.labels.len(), values.len());
        Measurement {
            name: def.name,
            kind: def.kind,
            value,
            labels: def.labels.iter().copied().zip(values).collect(),
        }
    }

    /// Value of the label called `key`.
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Translates a snapshot into measurements, pool-wide first, then per group
/// with that group's process slots.
pub fn translate(snapshot: &Snapshot, identities: &IdentityMap) -> Vec<Measurement> {
    let mut out = Vec::with_capacity(5 + snapshot.groups.len() * 2 + identities.len() * 3);

    out.push(Measurement::new(
        &VERSION,
        1.0,
        vec![snapshot.version.clone()],
    ));
    out.push(Measurement::new(
        &TOP_LEVEL_REQUEST_QUEUE,
        snapshot.top_level_queue_size as f64,
        vec![],
    ));
    out.push(Measurement::new(
        &MAX_PROCESSES,
        snapshot.max_process_count as f64,
        vec![],
    ));
    out.push(Measurement::new(
        &CURRENT_PROCESSES,
        snapshot.current_process_count as f64,
        vec![],
    ));
    out.push(Measurement::new(
        &APP_GROUP_COUNT,
        snapshot.app_group_count as f64,
        vec![],
    ));

    for group in &snapshot.groups {
        out.push(Measurement::new(
            &APP_REQUEST_QUEUE,
            group.request_queue_size as f64,
            vec![group.name.clone()],
        ));
        out.push(Measurement::new(
            &APP_PROCS_SPAWNING,
            group.processes_spawning as f64,
            vec![group.name.clone()],
        ));

        for proc in &group.processes {
            let Some(slot) = identities.get(&proc.pid) else {
                continue;
            };
            let id = slot.to_string();
            let start_seconds = proc.spawn_start_time_micros / MICROSECONDS_PER_SECOND;

            out.push(Measurement::new(
                &PROC_MEMORY,
                proc.resident_memory as f64,
                vec![group.name.clone(), id.clone()],
            ));
            out.push(Measurement::new(
                &REQUESTS_PROCESSED,
                proc.requests_processed as f64,
                vec![group.name.clone(), id.clone()],
            ));
            out.push(Measurement::new(
                &PROC_START_TIME,
                start_seconds as f64,
                vec![group.name.clone(), id],
            ));
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::{Group, ProcessRecord};

    fn process(pid: &str, processed: u64, start_micros: i64, memory: u64) -> ProcessRecord {
        ProcessRecord {
            pid: pid.to_string(),
            requests_processed: processed,
            spawn_start_time_micros: start_micros,
            resident_memory: memory,
            sessions: 0,
            busyness: 0,
            concurrency: 1,
            cpu: 0,
            rss: 0,
            swap: 0,
            life_status: "ALIVE".into(),
            enabled: "ENABLED".into(),
            uptime: String::new(),
        }
    }

    fn snapshot(processes: Vec<ProcessRecord>) -> Snapshot {
        Snapshot {
            version: "6.0.18".into(),
            top_level_queue_size: 3,
            max_process_count: 4,
            current_process_count: processes.len() as u64,
            app_group_count: 1,
            capacity_used: processes.len() as u64,
            groups: vec![Group {
                name: "/srv/app/demo (production)".into(),
                state: "READY".into(),
                app_root: "/srv/app/demo".into(),
                app_type: "rack".into(),
                environment: "production".into(),
                life_status: "ALIVE".into(),
                capacity_used: processes.len() as u64,
                request_queue_size: 2,
                processes_spawning: 1,
                processes,
            }],
        }
    }

    #[test]
    fn test_pool_and_group_measurements_come_first() {
        let snap = snapshot(vec![]);
        let out = translate(&snap, &IdentityMap::new());

        let names: Vec<&str> = out.iter().map(|m| m.name).collect();
        assert_eq!(
            names,
            vec![
                "passenger_version",
                "passenger_top_level_request_queue",
                "passenger_max_processes",
                "passenger_current_processes",
                "passenger_app_group_count",
                "passenger_app_request_queue",
                "passenger_app_procs_spawning",
            ]
        );
        assert_eq!(out[0].label("version"), Some("6.0.18"));
        assert_eq!(out[0].value, 1.0);
        assert_eq!(out[1].value, 3.0);
        assert_eq!(out[5].label("name"), Some("/srv/app/demo (production)"));
    }

    #[test]
    fn test_start_time_truncates_to_whole_seconds() {
        let snap = snapshot(vec![process("101", 7, 1_700_000_000_999_999, 2048)]);
        let identities: IdentityMap = [("101", 0)].into_iter().collect();
        let out = translate(&snap, &identities);

        let start = out
            .iter()
            .find(|m| m.name == PROC_START_TIME.name)
            .unwrap();
        assert_eq!(start.value, 1_700_000_000.0);
        assert_eq!(start.label("id"), Some("0"));

        let processed = out
            .iter()
            .find(|m| m.name == REQUESTS_PROCESSED.name)
            .unwrap();
        assert_eq!(processed.kind, MetricKind::Counter);
        assert_eq!(processed.value, 7.0);
    }
}
