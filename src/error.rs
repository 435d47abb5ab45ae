//! Error taxonomy shared by every layer of the client
//!
//! Each failure carries a [`ErrorKind`] so a presentation layer can pick a
//! message ("not found", "network unreachable") without parsing text.

use serde::Serialize;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// CKAN's `__type` for missing entities
const NOT_FOUND_TYPE: &str = "Not Found Error";

/// Coarse classification of a [`ClientError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Transport,
    Timeout,
    Protocol,
    Remote,
    UnknownCommand,
    Incomplete,
    Io,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Transport => "transport",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Protocol => "protocol",
            ErrorKind::Remote => "remote",
            ErrorKind::UnknownCommand => "unknown_command",
            ErrorKind::Incomplete => "incomplete",
            ErrorKind::Io => "io",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a download stopped before the stream was exhausted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IncompleteReason {
    Cancelled,
    TimedOut(Duration),
    Stream(String),
    Sink(String),
}

impl fmt::Display for IncompleteReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IncompleteReason::Cancelled => f.write_str("cancelled"),
            IncompleteReason::TimedOut(d) => write!(f, "timed out after {}s", d.as_secs()),
            IncompleteReason::Stream(msg) => write!(f, "stream error: {}", msg),
            IncompleteReason::Sink(msg) => write!(f, "write error: {}", msg),
        }
    }
}

/// Errors returned by the catalog client and the command dispatcher
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ClientError {
    /// Bad or missing local argument, caught before any network call
    #[error("invalid argument `{field}`: {reason}")]
    Validation { field: String, reason: String },

    /// Connection refused, DNS failure, TLS failure, bad status on fetch
    #[error("network error: {0}")]
    Transport(String),

    #[error("request timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    /// The catalog answered with something that is not a valid envelope
    #[error("unexpected response from catalog: {0}")]
    Protocol(String),

    /// Well-formed envelope with `success: false`
    #[error("catalog error: {message}")]
    Remote {
        error_type: Option<String>,
        message: String,
    },

    #[error("unknown command `{0}`")]
    UnknownCommand(String),

    /// A download wrote some bytes and then stopped
    #[error("download incomplete after {bytes_written} bytes: {reason}")]
    Incomplete {
        bytes_written: u64,
        reason: IncompleteReason,
    },

    /// Local file could not be opened or created
    #[error("cannot open {path}: {message}")]
    Io { path: String, message: String },
}

impl ClientError {
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ClientError::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        ClientError::Protocol(message.into())
    }

    pub fn io(path: &std::path::Path, err: &std::io::Error) -> Self {
        ClientError::Io {
            path: path.display().to_string(),
            message: err.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ClientError::Validation { .. } => ErrorKind::Validation,
            ClientError::Transport(_) => ErrorKind::Transport,
            ClientError::Timeout(_) => ErrorKind::Timeout,
            ClientError::Protocol(_) => ErrorKind::Protocol,
            ClientError::Remote { .. } => ErrorKind::Remote,
            ClientError::UnknownCommand(_) => ErrorKind::UnknownCommand,
            ClientError::Incomplete { .. } => ErrorKind::Incomplete,
            ClientError::Io { .. } => ErrorKind::Io,
        }
    }

    /// True for failures to reach the catalog at all, timeouts included
    pub fn is_transport(&self) -> bool {
        matches!(self.kind(), ErrorKind::Transport | ErrorKind::Timeout)
    }

    pub fn is_not_found(&self) -> bool {
        match self {
            ClientError::Remote {
                error_type,
                message,
            } => {
                error_type.as_deref() == Some(NOT_FOUND_TYPE)
                    || message.to_lowercase().contains("not found")
            }
            _ => false,
        }
    }
}

pub type Result<T, E = ClientError> = std::result::Result<T, E>;
