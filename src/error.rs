//! Error types for status acquisition.
//!
//! Every failure of a single poll ends up as a [`StatusError`]. The collector
//! treats all variants the same way: log, report `passenger_up 0`, move on.

use std::process::ExitStatus;
use std::time::Duration;

/// Failure of one status query.
#[derive(Debug, thiserror::Error)]
pub enum StatusError {
    /// The status command did not finish before its deadline and was killed.
    #[error("status command timed out after {:.6} seconds", .timeout.as_secs_f64())]
    Timeout { timeout: Duration },

    /// The status command could not be run or exited unsuccessfully.
    #[error("status command failed: {0}")]
    CommandFailed(#[from] CommandFailure),

    /// The status command produced a document we could not decode.
    #[error("failed to parse status output: {0}")]
    Parse(#[from] ParseError),
}

impl StatusError {
    /// Short, stable label for the error class.
    pub fn reason(&self) -> &'static str {
        match self {
            StatusError::Timeout { .. } => "timeout",
            StatusError::CommandFailed(_) => "command_failed",
            StatusError::Parse(_) => "parse_error",
        }
    }
}

/// Underlying cause of [`StatusError::CommandFailed`].
#[derive(Debug, thiserror::Error)]
pub enum CommandFailure {
    #[error("failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to wait for status command: {0}")]
    Wait(#[source] std::io::Error),

    #[error("failed to read status command output: {0}")]
    Output(#[source] std::io::Error),

    #[error("status command exited with {0}")]
    Exit(ExitStatus),
}

/// Decoding failure of the status document.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("unknown character encoding '{0}'")]
    UnknownEncoding(String),

    #[error("document is not valid {0}")]
    InvalidEncoding(&'static str),

    #[error("malformed status document: {0}")]
    Xml(#[from] quick_xml::de::DeError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_message_uses_six_decimals() {
        let err = StatusError::Timeout {
            timeout: Duration::from_millis(1),
        };
        assert_eq!(
            err.to_string(),
            "status command timed out after 0.001000 seconds"
        );
        assert_eq!(err.reason(), "timeout");
    }

    #[test]
    fn test_reason_labels() {
        let parse: StatusError = ParseError::UnknownEncoding("x-klingon".into()).into();
        assert_eq!(parse.reason(), "parse_error");
        assert!(parse.to_string().contains("x-klingon"));

        let failed: StatusError = CommandFailure::Wait(std::io::Error::other("gone")).into();
        assert_eq!(failed.reason(), "command_failed");
    }
}
