//! Integration tests for full poll cycles.

#![cfg(unix)]

use std::io::Write;
use std::time::Duration;

use passenger_exporter::translate::{PROC_MEMORY, UP};
use passenger_exporter::{Collector, StatusCommand};
use tempfile::NamedTempFile;

const FIXTURE: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/passenger_status.xml");

fn cat(path: &str) -> Collector {
    Collector::new(
        StatusCommand::from_command_line(&format!("cat {}", path), Duration::from_secs(5)).unwrap(),
    )
}

/// Status document with one group holding `pids`.
fn document(max: usize, pids: &[u32]) -> String {
    let processes: String = pids
        .iter()
        .map(|pid| {
            format!(
                "<process><pid>{pid}</pid><processed>1</processed>\
                 <spawn_start_time>1700000000000000</spawn_start_time>\
                 <real_memory>1024</real_memory></process>"
            )
        })
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="iso8859-1" ?>
<info version="3">
  <passenger_version>6.0.18</passenger_version>
  <group_count>1</group_count>
  <process_count>{count}</process_count>
  <max>{max}</max>
  <get_wait_list_size>0</get_wait_list_size>
  <supergroups><supergroup><name>app</name><group>
    <get_wait_list_size>0</get_wait_list_size>
    <processes_being_spawned>0</processes_being_spawned>
    <processes>{processes}</processes>
  </group></supergroup></supergroups>
</info>"#,
        count = pids.len()
    )
}

fn rewrite(file: &mut NamedTempFile, content: &str) {
    let f = file.as_file_mut();
    f.set_len(0).unwrap();
    std::io::Seek::rewind(f).unwrap();
    f.write_all(content.as_bytes()).unwrap();
    f.flush().unwrap();
}

#[tokio::test]
async fn test_successful_poll_starts_with_up() {
    let poll = cat(FIXTURE).poll().await;

    assert!(poll.is_success());
    assert_eq!(poll.measurements[0].name, UP.name);
    assert_eq!(poll.measurements[0].value, 1.0);
    assert_eq!(poll.processes, 4);
    assert_eq!(poll.overflow, 0);
    assert_eq!(poll.measurements.len(), 1 + 5 + 2 * 2 + 4 * 3);
    assert!(poll.snapshot.is_some());
}

#[tokio::test]
async fn test_timeout_yields_single_down_measurement() {
    let collector = Collector::new(
        StatusCommand::from_command_line("sleep 5", Duration::from_millis(100)).unwrap(),
    );
    let poll = collector.poll().await;

    assert_eq!(poll.measurements.len(), 1);
    assert_eq!(poll.measurements[0].name, UP.name);
    assert_eq!(poll.measurements[0].value, 0.0);
    assert_eq!(poll.error.as_ref().map(|e| e.reason()), Some("timeout"));
    assert!(collector.identities().await.is_empty());
}

#[tokio::test]
async fn test_parse_failure_yields_single_down_measurement() {
    let mut file = NamedTempFile::new().unwrap();
    rewrite(&mut file, "this is not xml");
    let poll = cat(file.path().to_str().unwrap()).poll().await;

    assert_eq!(poll.measurements.len(), 1);
    assert_eq!(poll.measurements[0].value, 0.0);
    assert_eq!(poll.error.as_ref().map(|e| e.reason()), Some("parse_error"));
}

#[tokio::test]
async fn test_slots_persist_across_polls_and_survive_failures() {
    let mut file = NamedTempFile::new().unwrap();
    let collector = cat(file.path().to_str().unwrap());

    rewrite(&mut file, &document(3, &[10, 11, 12]));
    assert!(collector.poll().await.is_success());
    let first = collector.identities().await;
    assert_eq!(first.get("11"), Some(1));

    // A failed poll leaves the assignment alone.
    rewrite(&mut file, "<info>");
    assert!(!collector.poll().await.is_success());
    assert_eq!(collector.identities().await, first);

    // pid 11 is recycled into 13, which inherits its slot.
    rewrite(&mut file, &document(3, &[10, 12, 13]));
    let poll = collector.poll().await;
    assert!(poll.is_success());

    let ids: Vec<&str> = poll
        .measurements
        .iter()
        .filter(|m| m.name == PROC_MEMORY.name)
        .filter_map(|m| m.label("id"))
        .collect();
    assert_eq!(ids, vec!["0", "2", "1"]);
    assert_eq!(collector.identities().await.get("13"), Some(1));
}

#[tokio::test]
async fn test_processes_beyond_max_are_not_exported() {
    let mut file = NamedTempFile::new().unwrap();
    rewrite(&mut file, &document(2, &[1, 2, 3]));
    let poll = cat(file.path().to_str().unwrap()).poll().await;

    let exported = poll
        .measurements
        .iter()
        .filter(|m| m.name == PROC_MEMORY.name)
        .count();
    assert_eq!(exported, 2);
    assert_eq!(poll.processes, 3);
}
