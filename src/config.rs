//! Configuration management for passenger-exporter.
//!
//! This module handles loading, merging, and validating configuration from files
//! and CLI arguments. It supports YAML, JSON, and TOML formats.

use crate::cli::{Args, ConfigFormat};
use passenger_exporter::fetcher::{DEFAULT_COMMAND, DEFAULT_TIMEOUT, MAX_TIMEOUT};
use passenger_exporter::StatusCommand;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

// Default configuration constants
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 9149;
pub const DEFAULT_METRICS_PATH: &str = "/metrics";

const DEFAULT_CONFIG_PATHS: [&str; 6] = [
    "/etc/passenger-exporter/config.yaml",
    "/etc/passenger-exporter/config.yml",
    "/etc/passenger-exporter/config.json",
    "./passenger-exporter.yaml",
    "./passenger-exporter.yml",
    "./passenger-exporter.json",
];

/// Exporter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Server configuration
    pub port: Option<u16>,
    pub bind: Option<String>,
    #[serde(alias = "metrics-path")]
    pub metrics_path: Option<String>,

    // Status source
    pub command: Option<String>,
    #[serde(alias = "command-timeout-seconds")]
    pub command_timeout_seconds: Option<f64>,
    #[serde(alias = "pid-file")]
    pub pid_file: Option<PathBuf>,

    // Feature flags
    pub enable_health: Option<bool>,
    pub enable_telemetry: Option<bool>,

    // Logging
    pub log_level: Option<String>,

    // TLS/SSL Configuration
    #[serde(alias = "enable-tls")]
    pub enable_tls: Option<bool>,
    #[serde(alias = "tls-cert-path")]
    pub tls_cert_path: Option<String>,
    #[serde(alias = "tls-key-path")]
    pub tls_key_path: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: Some(DEFAULT_BIND_ADDR.to_string()),
            port: Some(DEFAULT_PORT),
            metrics_path: Some(DEFAULT_METRICS_PATH.to_string()),
            command: Some(DEFAULT_COMMAND.to_string()),
            command_timeout_seconds: Some(DEFAULT_TIMEOUT.as_secs_f64()),
            pid_file: None,
            enable_health: Some(true),
            enable_telemetry: Some(true),
            log_level: Some("info".into()),
            enable_tls: Some(false),
            tls_cert_path: None,
            tls_key_path: None,
        }
    }
}

impl Config {
    pub fn metrics_path(&self) -> &str {
        self.metrics_path.as_deref().unwrap_or(DEFAULT_METRICS_PATH)
    }

    pub fn command_timeout(&self) -> Result<Duration, String> {
        let secs = self
            .command_timeout_seconds
            .unwrap_or(DEFAULT_TIMEOUT.as_secs_f64());
        if !secs.is_finite() || secs <= 0.0 {
            return Err(format!(
                "command_timeout_seconds must be a positive number, got {}",
                secs
            ));
        }
        if secs > MAX_TIMEOUT.as_secs_f64() {
            return Err(format!(
                "command_timeout_seconds must not exceed {}, got {}",
                MAX_TIMEOUT.as_secs(),
                secs
            ));
        }
        Duration::try_from_secs_f64(secs)
            .map_err(|e| format!("command_timeout_seconds {} is out of range: {}", secs, e))
    }

    /// Status command built from `command` and `command_timeout_seconds`.
    pub fn status_command(&self) -> Result<StatusCommand, String> {
        let line = self.command.as_deref().unwrap_or(DEFAULT_COMMAND);
        let timeout = self.command_timeout()?;
        StatusCommand::from_command_line(line, timeout)
            .ok_or_else(|| "command must not be empty".to_string())
    }
}

/// Validate effective config (used by --check-config and at startup)
pub fn validate_effective_config(cfg: &Config) -> Result<(), Box<dyn std::error::Error>> {
    cfg.status_command()?;

    let metrics_path = cfg.metrics_path();
    if !metrics_path.starts_with('/') {
        return Err(format!("metrics_path must start with '/', got '{}'", metrics_path).into());
    }
    if metrics_path == "/" || metrics_path == "/health" || metrics_path == "/config" {
        return Err(format!(
            "metrics_path '{}' collides with a built-in endpoint",
            metrics_path
        )
        .into());
    }

    if let Some(bind) = cfg.bind.as_deref() {
        if bind.parse::<std::net::IpAddr>().is_err() {
            return Err(format!("bind is not a valid IP address: {}", bind).into());
        }
    }

    // TLS validation
    if cfg.enable_tls.unwrap_or(false) {
        let cert_path = cfg.tls_cert_path.as_deref();
        let key_path = cfg.tls_key_path.as_deref();

        match (cert_path, key_path) {
            (None, None) => {
                return Err(
                    "TLS is enabled but neither tls_cert_path nor tls_key_path are set".into(),
                );
            }
            (Some(_), None) => {
                return Err("TLS is enabled but tls_key_path is not set".into());
            }
            (None, Some(_)) => {
                return Err("TLS is enabled but tls_cert_path is not set".into());
            }
            (Some(cert), Some(key)) => {
                check_pem_file(cert, "TLS certificate")?;
                check_pem_file(key, "TLS private key")?;
            }
        }
    }

    Ok(())
}

fn check_pem_file(path: &str, what: &str) -> Result<(), Box<dyn std::error::Error>> {
    let p = Path::new(path);
    if !p.exists() {
        return Err(format!("{} file not found: {}", what, path).into());
    }
    match fs::metadata(p) {
        Ok(meta) if meta.len() == 0 => Err(format!("{} file is empty: {}", what, path).into()),
        Err(e) => Err(format!("{} file is not readable: {} ({})", what, path, e).into()),
        Ok(_) => Ok(()),
    }
}

/// Resolves configuration from CLI args, config file, and defaults.
/// This enforces precedence: CLI (if provided) > config file > default.
pub fn resolve_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = if args.no_config {
        Config::default()
    } else {
        load_config(args.config.as_deref())?
    };

    if let Some(bind_ip) = args.bind {
        config.bind = Some(bind_ip.to_string());
    }
    if let Some(cli_port) = args.port {
        config.port = Some(cli_port);
    }
    if let Some(path) = &args.metrics_path {
        config.metrics_path = Some(path.clone());
    }

    // Status source
    if let Some(command) = &args.passenger_command {
        config.command = Some(command.clone());
    }
    if let Some(timeout) = args.command_timeout_seconds {
        config.command_timeout_seconds = Some(timeout);
    }
    if let Some(pid_file) = &args.pid_file {
        config.pid_file = Some(pid_file.clone());
    }

    // Feature flags
    if args.disable_health {
        config.enable_health = Some(false);
    }
    if args.disable_telemetry {
        config.enable_telemetry = Some(false);
    }

    // TLS configuration: CLI wins if provided
    if args.enable_tls {
        config.enable_tls = Some(true);
    }
    if let Some(cert_path) = &args.tls_cert {
        config.tls_cert_path = Some(cert_path.to_string_lossy().to_string());
    }
    if let Some(key_path) = &args.tls_key {
        config.tls_key_path = Some(key_path.to_string_lossy().to_string());
    }

    Ok(config)
}

/// Loads a config file. An explicit path must exist; without one the default
/// locations are tried and built-in defaults used when none exists.
pub fn load_config(path: Option<&Path>) -> Result<Config, Box<dyn std::error::Error>> {
    let path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(format!("config file not found: {}", p.display()).into());
            }
            p.to_path_buf()
        }
        None => match DEFAULT_CONFIG_PATHS
            .iter()
            .map(Path::new)
            .find(|p| p.exists())
        {
            Some(p) => p.to_path_buf(),
            None => return Ok(Config::default()),
        },
    };

    let content = fs::read_to_string(&path)?;
    let mut config = parse_config(&content, path.extension().and_then(|s| s.to_str()))?;
    info!("Loaded configuration from: {}", path.display());

    // Keys absent from the file fall back to defaults.
    config.fill_defaults();
    Ok(config)
}

fn parse_config(content: &str, extension: Option<&str>) -> Result<Config, Box<dyn std::error::Error>> {
    Ok(match extension {
        Some("json") => serde_json::from_str(content)?,
        Some("toml") => toml::from_str(content)?,
        _ => serde_yaml::from_str(content)?,
    })
}

impl Config {
    fn fill_defaults(&mut self) {
        let d = Config::default();
        self.port = self.port.or(d.port);
        self.bind = self.bind.take().or(d.bind);
        self.metrics_path = self.metrics_path.take().or(d.metrics_path);
        self.command = self.command.take().or(d.command);
        self.command_timeout_seconds = self.command_timeout_seconds.or(d.command_timeout_seconds);
        self.enable_health = self.enable_health.or(d.enable_health);
        self.enable_telemetry = self.enable_telemetry.or(d.enable_telemetry);
        self.log_level = self.log_level.take().or(d.log_level);
        self.enable_tls = self.enable_tls.or(d.enable_tls);
    }
}

/// Renders configuration in the requested format.
pub fn render_config(config: &Config, format: &ConfigFormat) -> Result<String, Box<dyn std::error::Error>> {
    Ok(match format {
        ConfigFormat::Json => serde_json::to_string_pretty(config)?,
        ConfigFormat::Toml => toml::to_string_pretty(config)?,
        ConfigFormat::Yaml => serde_yaml::to_string(config)?,
    })
}

/// Shows configuration in requested format
pub fn show_config(
    config: &Config,
    format: ConfigFormat,
    user_config: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let output = render_config(config, &format)?;
    if user_config {
        println!("User configuration (effective values):");
    }
    println!("{output}");
    Ok(())
}
