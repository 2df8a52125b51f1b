//! Process self-metrics for the process named in a PID file.
//!
//! The PID file is re-read on every collection so a restarted Passenger core
//! is picked up without restarting the exporter. When the file is missing or
//! unreadable the collector exports nothing for that scrape.

use std::fs;
use std::path::{Path, PathBuf};

use prometheus::core::{Collector, Desc};
use prometheus::process_collector::ProcessCollector;
use prometheus::proto::MetricFamily;
use tracing::debug;

use crate::translate::NAMESPACE;

/// `prometheus` collector exporting `passenger_process_*` for the pid found
/// in a PID file.
pub struct PidFileCollector {
    path: PathBuf,
    // Supplies descriptors before any pid is known.
    template: ProcessCollector,
}

impl PidFileCollector {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            template: ProcessCollector::new(0, NAMESPACE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Reads and parses a PID file containing one decimal pid.
pub fn read_pid(path: &Path) -> Result<libc::pid_t, String> {
    let content = fs::read_to_string(path).map_err(|e| format!("read {}: {}", path.display(), e))?;
    let trimmed = content.trim();
    trimmed
        .parse::<libc::pid_t>()
        .map_err(|e| format!("parse pid '{}' in {}: {}", trimmed, path.display(), e))
        .and_then(|pid| {
            if pid > 0 {
                Ok(pid)
            } else {
                Err(format!("invalid pid {} in {}", pid, path.display()))
            }
        })
}

impl Collector for PidFileCollector {
    fn desc(&self) -> Vec<&Desc> {
        self.template.desc()
    }

    fn collect(&self) -> Vec<MetricFamily> {
        match read_pid(&self.path) {
            Ok(pid) => ProcessCollector::new(pid, NAMESPACE).collect(),
            Err(e) => {
                debug!("Skipping process metrics: {}", e);
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_read_pid_trims_whitespace() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "  4242  ").unwrap();
        assert_eq!(read_pid(file.path()), Ok(4242));
    }

    #[test]
    fn test_read_pid_rejects_garbage() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not-a-pid").unwrap();
        assert!(read_pid(file.path()).is_err());

        let mut zero = tempfile::NamedTempFile::new().unwrap();
        write!(zero, "0").unwrap();
        assert!(read_pid(zero.path()).is_err());
    }

    #[test]
    fn test_missing_file_collects_nothing() {
        let collector = PidFileCollector::new("/nonexistent/passenger.pid");
        assert!(collector.collect().is_empty());
        assert!(!collector.desc().is_empty());
    }

    #[test]
    fn test_own_pid_is_collected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", std::process::id()).unwrap();
        let collector = PidFileCollector::new(file.path());
        assert!(!collector.collect().is_empty());
    }
}
