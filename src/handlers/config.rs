//! Configuration display endpoint handler.

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use std::fmt::Write as FmtWrite;
use tracing::{debug, instrument};

use crate::config::{Config, DEFAULT_BIND_ADDR, DEFAULT_PORT};
use crate::handlers::health::FOOTER_TEXT;
use crate::state::SharedState;

/// Handler for the /config endpoint.
#[instrument(skip(state))]
pub async fn config_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing /config request");
    state.health_stats.record_http_request();

    (
        StatusCode::OK,
        [("Content-Type", "text/plain; charset=utf-8")],
        format!("{}\n{FOOTER_TEXT}", render_config_text(&state.config)),
    )
}

/// Plain-text view of the effective configuration.
pub fn render_config_text(cfg: &Config) -> String {
    let mut out = String::new();

    writeln!(out, "PASSENGER EXPORTER - CONFIGURATION").ok();
    writeln!(out, "==================================").ok();
    writeln!(out).ok();

    writeln!(out, "SERVER CONFIGURATION").ok();
    writeln!(out, "--------------------").ok();
    writeln!(
        out,
        "bind:                       {}",
        cfg.bind.as_deref().unwrap_or(DEFAULT_BIND_ADDR)
    )
    .ok();
    writeln!(
        out,
        "port:                       {}",
        cfg.port.unwrap_or(DEFAULT_PORT)
    )
    .ok();
    writeln!(out, "metrics_path:               {}", cfg.metrics_path()).ok();
    writeln!(out).ok();

    writeln!(out, "STATUS SOURCE").ok();
    writeln!(out, "-------------").ok();
    match cfg.status_command() {
        Ok(cmd) => {
            writeln!(
                out,
                "command:                    {} {}",
                cmd.program(),
                cmd.args().join(" ")
            )
            .ok();
            writeln!(
                out,
                "command_timeout_seconds:    {:.3}",
                cmd.timeout().as_secs_f64()
            )
            .ok();
        }
        Err(e) => {
            writeln!(out, "command:                    invalid ({})", e).ok();
        }
    }
    writeln!(
        out,
        "pid_file:                   {}",
        cfg.pid_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "none".to_string())
    )
    .ok();
    writeln!(out).ok();

    writeln!(out, "FEATURES").ok();
    writeln!(out, "--------").ok();
    writeln!(
        out,
        "enable_health:              {}",
        cfg.enable_health.unwrap_or(true)
    )
    .ok();
    writeln!(
        out,
        "enable_telemetry:           {}",
        cfg.enable_telemetry.unwrap_or(true)
    )
    .ok();
    writeln!(
        out,
        "log_level:                  {}",
        cfg.log_level.as_deref().unwrap_or("info")
    )
    .ok();
    writeln!(out).ok();

    writeln!(out, "TLS/SSL CONFIGURATION").ok();
    writeln!(out, "---------------------").ok();
    writeln!(
        out,
        "enable_tls:                 {}",
        cfg.enable_tls.unwrap_or(false)
    )
    .ok();
    writeln!(
        out,
        "tls_cert_path:              {}",
        cfg.tls_cert_path.as_deref().unwrap_or("none")
    )
    .ok();
    writeln!(
        out,
        "tls_key_path:               {}",
        cfg.tls_key_path.as_deref().unwrap_or("none")
    )
    .ok();

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_defaults() {
        let text = render_config_text(&Config::default());
        assert!(text.contains("port:                       9149"));
        assert!(text.contains("command:                    passenger-status --show=xml"));
        assert!(text.contains("command_timeout_seconds:    5.000"));
        assert!(text.contains("pid_file:                   none"));
    }
}
