//! Test command implementation.
//!
//! Runs polls through a fresh collector and prints the resulting slot
//! assignment per application group.

use std::time::Duration;

use passenger_exporter::status::Snapshot;
use passenger_exporter::{Collector, IdentityMap};

use crate::config::Config;

/// Pause between polls so process churn has a chance to show.
const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Runs `iterations` polls and prints what each one exported.
pub async fn command_test(
    iterations: usize,
    verbose: bool,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("🧪 Passenger Exporter - Test Mode");
    println!("=================================");

    let collector = Collector::new(config.status_command()?);
    let mut failures = 0;

    for iteration in 1..=iterations {
        if iteration > 1 {
            tokio::time::sleep(POLL_INTERVAL).await;
        }
        println!("\n🔄 Iteration {}/{}:", iteration, iterations);

        let poll = collector.poll().await;
        let snapshot = match (&poll.error, &poll.snapshot) {
            (None, Some(snapshot)) => snapshot,
            (Some(e), _) => {
                println!("   ❌ {} ({})", e, e.reason());
                failures += 1;
                continue;
            }
            (None, None) => continue,
        };

        println!(
            "   ⏱️  Poll duration: {:.2}ms",
            poll.duration.as_secs_f64() * 1000.0
        );
        println!(
            "   📊 {} measurements, {} processes",
            poll.measurements.len(),
            poll.processes
        );
        if poll.overflow > 0 {
            println!("   ⚠️  {} overflow slot(s)", poll.overflow);
        }

        print_slots(snapshot, &collector.identities().await, verbose);
    }

    if failures > 0 {
        println!("\n❌ {} of {} polls failed", failures, iterations);
        std::process::exit(1);
    }
    println!("\n✅ Test completed successfully");
    Ok(())
}

fn print_slots(snapshot: &Snapshot, identities: &IdentityMap, verbose: bool) {
    if verbose {
        println!(
            "   ├─ Passenger {}: {}/{} processes, capacity used {}, top-level queue {}",
            snapshot.version,
            snapshot.current_process_count,
            snapshot.max_process_count,
            snapshot.capacity_used,
            snapshot.top_level_queue_size
        );
    }
    for group in &snapshot.groups {
        println!(
            "   ├─ {} (queue {}, spawning {})",
            group.name, group.request_queue_size, group.processes_spawning
        );
        if verbose {
            println!(
                "   │  ├─ root: {} [{} / {}]",
                group.app_root, group.app_type, group.environment
            );
            println!(
                "   │  ├─ state: {}, life: {}, capacity used: {}",
                group.state, group.life_status, group.capacity_used
            );
        }
        for proc in &group.processes {
            let slot = identities
                .get(&proc.pid)
                .map(|s| s.to_string())
                .unwrap_or_else(|| "-".to_string());
            println!("   │  ├─ slot {:>3} ← pid {}", slot, proc.pid);
            if verbose {
                println!("   │  │  ├─ processed: {}", proc.requests_processed);
                println!(
                    "   │  │  ├─ memory: {} (rss {}, swap {})",
                    proc.resident_memory, proc.rss, proc.swap
                );
                println!(
                    "   │  │  ├─ sessions: {}/{}, busyness {}, cpu {}%",
                    proc.sessions, proc.concurrency, proc.busyness, proc.cpu
                );
                println!(
                    "   │  │  ├─ life: {}, enabled: {}, uptime: {}",
                    proc.life_status, proc.enabled, proc.uptime
                );
                println!(
                    "   │  │  └─ started: {}",
                    proc.spawn_start_time_micros / 1_000_000
                );
            }
        }
    }
}
