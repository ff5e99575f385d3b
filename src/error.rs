use serde::Serialize;
use std::{fmt, io, time::Duration};

/// Stable failure categories reported to API clients and log readers.
///
/// Classification is deterministic: the same failure signature always maps to
/// the same kind, so operators can match on the labels in dashboards and
/// support scripts.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    Timeout,
    ConnectionRefused,
    InvalidAddress,
    AuthFailure,
    UnexpectedStatus,
    DeviceRejection,
    Unknown,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ErrorKind::Timeout => "timeout",
            ErrorKind::ConnectionRefused => "connection-refused",
            ErrorKind::InvalidAddress => "invalid-address",
            ErrorKind::AuthFailure => "auth-failure",
            ErrorKind::UnexpectedStatus => "unexpected-status",
            ErrorKind::DeviceRejection => "device-rejection",
            ErrorKind::Unknown => "unknown",
        };
        write!(f, "{label}")
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConsoleError {
    #[error("request to {url} timed out after {timeout:?}")]
    Timeout { url: String, timeout: Duration },

    #[error("connection refused by {url}")]
    ConnectionRefused { url: String },

    #[error("invalid printer address {address:?}: {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("login rejected for every credential variant: {detail}")]
    AuthFailure { detail: String },

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("device rejected step {step:?}: response body contains {marker:?}")]
    DeviceRejection { step: String, marker: String },

    #[error("transport failure for {url}: {detail}")]
    Unknown { url: String, detail: String },
}

impl ConsoleError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ConsoleError::Timeout { .. } => ErrorKind::Timeout,
            ConsoleError::ConnectionRefused { .. } => ErrorKind::ConnectionRefused,
            ConsoleError::InvalidAddress { .. } => ErrorKind::InvalidAddress,
            ConsoleError::AuthFailure { .. } => ErrorKind::AuthFailure,
            ConsoleError::UnexpectedStatus { .. } => ErrorKind::UnexpectedStatus,
            ConsoleError::DeviceRejection { .. } => ErrorKind::DeviceRejection,
            ConsoleError::Unknown { .. } => ErrorKind::Unknown,
        }
    }

    pub fn invalid_address(address: &str, reason: &str) -> Self {
        ConsoleError::InvalidAddress {
            address: address.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Map a failed console request onto the taxonomy.
///
/// reqwest wraps the underlying socket error several levels deep; the io error
/// kind is the reliable signal, the boolean probes on [`reqwest::Error`] only
/// narrow the remainder.
pub fn classify_request_error(url: &str, timeout: Duration, err: &reqwest::Error) -> ConsoleError {
    if err.is_timeout() {
        return ConsoleError::Timeout {
            url: url.to_string(),
            timeout,
        };
    }

    match source_io_kind(err) {
        Some(io::ErrorKind::ConnectionRefused) => ConsoleError::ConnectionRefused {
            url: url.to_string(),
        },
        Some(io::ErrorKind::TimedOut) => ConsoleError::Timeout {
            url: url.to_string(),
            timeout,
        },
        _ => ConsoleError::Unknown {
            url: url.to_string(),
            detail: err.to_string(),
        },
    }
}

/// Classify a raw TCP connect failure, used by the reachability probe.
pub fn classify_connect_failure(err: &io::Error) -> ErrorKind {
    match err.kind() {
        io::ErrorKind::ConnectionRefused => ErrorKind::ConnectionRefused,
        io::ErrorKind::TimedOut => ErrorKind::Timeout,
        _ => ErrorKind::Unknown,
    }
}

fn source_io_kind(err: &(dyn std::error::Error + 'static)) -> Option<io::ErrorKind> {
    let mut source = err.source();
    while let Some(cause) = source {
        if let Some(io_err) = cause.downcast_ref::<io::Error>() {
            return Some(io_err.kind());
        }
        source = cause.source();
    }
    None
}
