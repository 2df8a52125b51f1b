//! Status command execution with a hard deadline.

use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, warn};

use crate::error::{CommandFailure, StatusError};

pub const DEFAULT_COMMAND: &str = "passenger-status --show=xml";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
/// Longest deadline a single run is given, whatever the configured timeout.
pub const MAX_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

/// External command that prints the status document on stdout.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusCommand {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl StatusCommand {
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            timeout,
        }
    }

    /// Splits `line` on whitespace into program and arguments. Returns `None`
    /// for a blank line.
    pub fn from_command_line(line: &str, timeout: Duration) -> Option<Self> {
        let mut parts = line.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self::new(program, parts.collect(), timeout))
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Runs the command and returns its complete stdout.
    ///
    /// If the deadline passes first the child is killed and reaped before
    /// [`StatusError::Timeout`] is returned. A non-zero exit is a failure even
    /// when output was produced. Stderr is discarded.
    pub async fn fetch(&self) -> Result<Vec<u8>, StatusError> {
        debug!("Running status command: {} {:?}", self.program, self.args);
        let deadline = Instant::now() + self.timeout.min(MAX_TIMEOUT);

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| CommandFailure::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| CommandFailure::Output(std::io::Error::other("stdout not captured")))?;

        // Drain stdout concurrently so a chatty child cannot block on a full pipe.
        let mut reader = tokio::spawn(async move {
            let mut buf = Vec::new();
            stdout.read_to_end(&mut buf).await.map(|_| buf)
        });

        let status = match timeout_at(deadline, child.wait()).await {
            Ok(waited) => waited.map_err(CommandFailure::Wait)?,
            Err(_) => {
                warn!(
                    "Status command exceeded {:.3}s, killing pid {:?}",
                    self.timeout.as_secs_f64(),
                    child.id()
                );
                if let Err(e) = child.kill().await {
                    warn!("Failed to kill status command: {}", e);
                }
                reader.abort();
                return Err(self.timed_out());
            }
        };

        // A grandchild may still hold the pipe open after the child exits.
        let output = match timeout_at(deadline, &mut reader).await {
            Ok(Ok(read)) => read.map_err(CommandFailure::Output)?,
            Ok(Err(join)) => {
                return Err(CommandFailure::Output(std::io::Error::other(join)).into())
            }
            Err(_) => {
                reader.abort();
                return Err(self.timed_out());
            }
        };

        if !status.success() {
            return Err(CommandFailure::Exit(status).into());
        }

        debug!("Status command returned {} bytes", output.len());
        Ok(output)
    }

    fn timed_out(&self) -> StatusError {
        StatusError::Timeout {
            timeout: self.timeout,
        }
    }
}

impl Default for StatusCommand {
    fn default() -> Self {
        // DEFAULT_COMMAND is never blank.
        Self::from_command_line(DEFAULT_COMMAND, DEFAULT_TIMEOUT)
            .unwrap_or_else(|| Self::new("passenger-status", vec![], DEFAULT_TIMEOUT))
    }
}
