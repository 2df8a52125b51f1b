//! Check command implementation.
//!
//! Validates configuration and runs the status command once.

use std::time::Instant;

use passenger_exporter::Collector;

use crate::config::{validate_effective_config, Config};

/// Validates configuration and verifies the status command produces a
/// parseable document.
pub async fn command_check(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 Passenger Exporter - System Check");
    println!("====================================");

    let mut all_ok = true;

    println!("\n⚙️  Checking configuration...");
    match validate_effective_config(config) {
        Ok(_) => println!("   ✅ Configuration is valid"),
        Err(e) => {
            println!("   ❌ Configuration invalid: {}", e);
            all_ok = false;
        }
    }

    if all_ok {
        let command = config.status_command()?;
        println!("\n📡 Running status command...");
        println!(
            "   ├─ {} {} (timeout {:.3}s)",
            command.program(),
            command.args().join(" "),
            command.timeout().as_secs_f64()
        );

        let collector = Collector::new(command);
        let start = Instant::now();
        match collector.snapshot().await {
            Ok(snapshot) => {
                println!(
                    "   ✅ Status parsed in {:.2}ms",
                    start.elapsed().as_secs_f64() * 1000.0
                );
                println!("   ├─ Passenger version: {}", snapshot.version);
                println!("   ├─ Application groups: {}", snapshot.groups.len());
                println!(
                    "   ├─ Processes: {} of max {}",
                    snapshot.processes().count(),
                    snapshot.max_process_count
                );
                println!("   └─ Top-level queue: {}", snapshot.top_level_queue_size);
            }
            Err(e) => {
                println!("   ❌ Status command failed ({}): {}", e.reason(), e);
                all_ok = false;
            }
        }
    }

    #[cfg(target_os = "linux")]
    if let Some(pid_file) = &config.pid_file {
        println!("\n📄 Checking PID file...");
        match passenger_exporter::pidfile::read_pid(pid_file) {
            Ok(pid) => println!("   ✅ {} names pid {}", pid_file.display(), pid),
            Err(e) => println!("   ⚠️  {} (process metrics will be empty)", e),
        }
    }

    println!("\n📋 Summary:");
    if all_ok {
        println!("   ✅ All checks passed - exporter is ready");
        Ok(())
    } else {
        println!("   ❌ Some checks failed - please review output");
        std::process::exit(1);
    }
}
