//! Config command implementation.
//!
//! Generates configuration files in various formats.

use std::fs;
use std::path::PathBuf;

use crate::cli::ConfigFormat;
use crate::config::{render_config, Config};

/// Generates configuration files.
pub fn command_config(
    output: Option<PathBuf>,
    format: ConfigFormat,
    commented: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::default();
    let output = match output {
        Some(path) => path,
        None => PathBuf::from(match format {
            ConfigFormat::Yaml => "passenger-exporter.yaml",
            ConfigFormat::Json => "passenger-exporter.json",
            ConfigFormat::Toml => "passenger-exporter.toml",
        }),
    };

    let mut content = render_config(&config, &format)?;
    if commented {
        match format {
            ConfigFormat::Yaml => content = add_config_comments(&content, "#"),
            ConfigFormat::Toml => content = add_config_comments(&content, "#"),
            // JSON has no comment syntax.
            ConfigFormat::Json => {}
        }
    }

    if output.to_string_lossy() == "-" {
        print!("{}", content);
    } else {
        fs::write(&output, content)?;
        println!("✅ Configuration written to: {}", output.display());
    }

    Ok(())
}

/// Prefixes the configuration with a commented reference of every key.
fn add_config_comments(body: &str, marker: &str) -> String {
    let reference = r#"Passenger Exporter Configuration
================================

Server Configuration
--------------------
bind: "0.0.0.0"                 # Bind IP (0.0.0.0 = all interfaces)
port: 9149                      # HTTP port
metrics_path: "/metrics"        # Path of the Prometheus endpoint

Status Source
-------------
command: "passenger-status --show=xml"   # Split on whitespace, no shell
command_timeout_seconds: 5.0    # Kill the command after this many seconds
pid_file: null                  # Passenger core PID file for passenger_process_* metrics

Feature Flags
-------------
enable_health: true             # Enable /health endpoint
enable_telemetry: true          # Enable passenger_exporter_* metrics

Logging
-------
log_level: "info"               # off, error, warn, info, debug, trace

TLS/SSL Configuration
---------------------
enable_tls: false               # Enable HTTPS (default: false)
tls_cert_path: null             # Path to TLS certificate (PEM format)
tls_key_path: null              # Path to TLS private key (PEM format)"#;

    let mut out = String::new();
    for line in reference.lines() {
        if line.is_empty() {
            out.push_str(marker);
        } else {
            out.push_str(&format!("{marker} {line}"));
        }
        out.push('\n');
    }
    out.push('\n');
    out.push_str(body);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comments_are_prefixed() {
        let out = add_config_comments("port: 9149\n", "#");
        assert!(out.starts_with("# Passenger Exporter Configuration\n"));
        assert!(out.ends_with("port: 9149\n"));
        assert!(out
            .lines()
            .take_while(|l| !l.is_empty())
            .all(|l| l.starts_with('#')));
    }

    #[test]
    fn test_generated_yaml_round_trips() {
        let text = render_config(&Config::default(), &ConfigFormat::Yaml).unwrap();
        let parsed: Config = serde_yaml::from_str(&text).unwrap();
        assert_eq!(parsed.port, Some(9149));
        assert_eq!(parsed.command.as_deref(), Some("passenger-status --show=xml"));
    }
}
