//! Error handling for geolocation lookups.
//!
//! Every per-address failure carries the address it belongs to, so a caller
//! draining the result stream can always attribute an error to its input.
//! Errors are grouped into a small taxonomy via [`ErrorKind`].

use std::time::Duration;
use thiserror::Error;

/// Main error type for lookup operations.
#[derive(Debug, Clone, Error)]
pub enum LookupError {
    /// The address cannot be turned into a request URL
    #[error("Invalid address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    /// Connection, DNS or body-read failure
    #[error("Network error for '{address}': {message}")]
    Network { address: String, message: String },

    /// The per-call timeout elapsed before the service answered
    #[error("Timeout after {duration:?} looking up '{address}'")]
    Timeout { address: String, duration: Duration },

    /// The overall run deadline elapsed before this address finished
    #[error("Lookup of '{address}' cancelled: overall deadline exceeded")]
    DeadlineExceeded { address: String },

    /// The service answered with a non-2xx status
    #[error("HTTP {status_code} for '{address}': {message}")]
    Status {
        address: String,
        status_code: u16,
        message: String,
    },

    /// The service answered 2xx but refused the query in-band
    #[error("Lookup of '{address}' rejected: {message}")]
    Rejected { address: String, message: String },

    /// The response body is not a valid location record
    #[error("Failed to decode response for '{address}': {message}")]
    Decode { address: String, message: String },

    /// Invalid settings (zero concurrency, bad endpoint, ...)
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// File I/O errors when reading address lists or config files
    #[error("File error at '{path}': {message}")]
    File { path: String, message: String },

    /// Failures inside the engine itself, such as an aborted lookup task
    #[error("Internal error{}: {message}", .address.as_ref().map(|a| format!(" for '{}'", a)).unwrap_or_default())]
    Internal {
        address: Option<String>,
        message: String,
    },
}

/// Coarse classification of a [`LookupError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed address or URL; retrying will not help
    RequestConstruction,
    /// Network failure, timeout or cancellation
    Transport,
    /// Non-2xx response or in-band refusal
    Status,
    /// Body not parseable as a record
    Decode,
    Config,
    File,
    Internal,
}

impl LookupError {
    pub fn invalid_address<A: Into<String>, R: Into<String>>(address: A, reason: R) -> Self {
        Self::InvalidAddress {
            address: address.into(),
            reason: reason.into(),
        }
    }

    pub fn network<A: Into<String>, M: Into<String>>(address: A, message: M) -> Self {
        Self::Network {
            address: address.into(),
            message: message.into(),
        }
    }

    pub fn timeout<A: Into<String>>(address: A, duration: Duration) -> Self {
        Self::Timeout {
            address: address.into(),
            duration,
        }
    }

    pub fn deadline_exceeded<A: Into<String>>(address: A) -> Self {
        Self::DeadlineExceeded {
            address: address.into(),
        }
    }

    pub fn status<A: Into<String>, M: Into<String>>(address: A, status_code: u16, message: M) -> Self {
        Self::Status {
            address: address.into(),
            status_code,
            message: message.into(),
        }
    }

    pub fn rejected<A: Into<String>, M: Into<String>>(address: A, message: M) -> Self {
        Self::Rejected {
            address: address.into(),
            message: message.into(),
        }
    }

    pub fn decode<A: Into<String>, M: Into<String>>(address: A, message: M) -> Self {
        Self::Decode {
            address: address.into(),
            message: message.into(),
        }
    }

    pub fn config<M: Into<String>>(message: M) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn file_error<P: Into<String>, M: Into<String>>(path: P, message: M) -> Self {
        Self::File {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn internal<M: Into<String>>(message: M) -> Self {
        Self::Internal {
            address: None,
            message: message.into(),
        }
    }

    /// Internal error attributed to one address.
    pub fn internal_for<A: Into<String>, M: Into<String>>(address: A, message: M) -> Self {
        Self::Internal {
            address: Some(address.into()),
            message: message.into(),
        }
    }

    /// Classify a `reqwest` transport error for the given address.
    pub fn from_transport(address: &str, err: &reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            Self::timeout(address, timeout)
        } else if err.is_builder() {
            Self::invalid_address(address, err.to_string())
        } else if err.is_connect() {
            Self::network(address, format!("connection failed: {}", err))
        } else {
            Self::network(address, err.to_string())
        }
    }

    /// The address this error belongs to, if it is a per-address error.
    pub fn address(&self) -> Option<&str> {
        match self {
            Self::InvalidAddress { address, .. }
            | Self::Network { address, .. }
            | Self::Timeout { address, .. }
            | Self::DeadlineExceeded { address }
            | Self::Status { address, .. }
            | Self::Rejected { address, .. }
            | Self::Decode { address, .. } => Some(address),
            Self::Internal { address, .. } => address.as_deref(),
            Self::Config { .. } | Self::File { .. } => None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidAddress { .. } => ErrorKind::RequestConstruction,
            Self::Network { .. } | Self::Timeout { .. } | Self::DeadlineExceeded { .. } => {
                ErrorKind::Transport
            }
            Self::Status { .. } | Self::Rejected { .. } => ErrorKind::Status,
            Self::Decode { .. } => ErrorKind::Decode,
            Self::Config { .. } => ErrorKind::Config,
            Self::File { .. } => ErrorKind::File,
            Self::Internal { .. } => ErrorKind::Internal,
        }
    }

    /// True for per-call timeouts and overall-deadline cancellations.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::DeadlineExceeded { .. })
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::RequestConstruction => "request construction",
            ErrorKind::Transport => "transport",
            ErrorKind::Status => "status",
            ErrorKind::Decode => "decode",
            ErrorKind::Config => "configuration",
            ErrorKind::File => "file",
            ErrorKind::Internal => "internal",
        };
        write!(f, "{}", name)
    }
}
