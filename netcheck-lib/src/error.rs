//! Error handling for probing and lookup operations.
//!
//! Every failure mode of the engine has its own variant so callers can tell a
//! refused connection from a timeout, or a missing registry from a corrupt one.

use std::fmt;
use std::time::Duration;

/// Main error type for netcheck operations.
///
/// The remote port prober does not use this type for connection outcomes; it
/// classifies them into a `PortCheckResult` instead.
#[derive(Debug, Clone)]
pub enum NetCheckError {
    /// Malformed domain name (e.g. no dot)
    InvalidDomain { domain: String, reason: String },

    /// Malformed `host:port` target
    InvalidAddress { address: String, reason: String },

    /// Transport-level failures (DNS, reset, TLS, ...)
    NetworkError {
        message: String,
        source: Option<String>,
    },

    /// The remote host actively refused the TCP connection
    ConnectionRefused { target: String },

    /// A deadline was exceeded
    Timeout {
        operation: String,
        duration: Duration,
    },

    /// A registry answered with a non-success HTTP status
    RemoteError {
        url: String,
        status: u16,
        body: String,
    },

    /// The IANA bootstrap registry could not be fetched or was unusable
    RegistryUnavailable { message: String },

    /// The persisted bootstrap cache could not be parsed
    RegistryCorrupt { path: String, message: String },

    /// RDAP was explicitly requested but the TLD has no RDAP service
    RdapUnsupported { tld: String },

    /// A required external command is not on PATH
    CommandMissing { command: String },

    /// A response body could not be decoded
    ParseError {
        message: String,
        content: Option<String>,
    },

    /// Configuration errors (invalid settings, etc.)
    ConfigError { message: String },

    /// File I/O errors on the cache, config files or kernel tables
    FileError { path: String, message: String },

    /// Generic internal errors that don't fit other categories
    Internal { message: String },
}

impl NetCheckError {
    /// Create a new invalid domain error.
    pub fn invalid_domain<D: Into<String>, R: Into<String>>(domain: D, reason: R) -> Self {
        Self::InvalidDomain {
            domain: domain.into(),
            reason: reason.into(),
        }
    }

    /// Create a new invalid address error.
    pub fn invalid_address<A: Into<String>, R: Into<String>>(address: A, reason: R) -> Self {
        Self::InvalidAddress {
            address: address.into(),
            reason: reason.into(),
        }
    }

    /// Create a new network error.
    pub fn network<M: Into<String>>(message: M) -> Self {
        Self::NetworkError {
            message: message.into(),
            source: None,
        }
    }

    /// Create a new network error with source information.
    pub fn network_with_source<M: Into<String>, S: Into<String>>(message: M, source: S) -> Self {
        Self::NetworkError {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn refused<T: Into<String>>(target: T) -> Self {
        Self::ConnectionRefused {
            target: target.into(),
        }
    }

    /// Create a new timeout error.
    pub fn timeout<O: Into<String>>(operation: O, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Create a new remote error carrying the status and raw body.
    pub fn remote<U: Into<String>, B: Into<String>>(url: U, status: u16, body: B) -> Self {
        Self::RemoteError {
            url: url.into(),
            status,
            body: body.into(),
        }
    }

    pub fn registry_unavailable<M: Into<String>>(message: M) -> Self {
        Self::RegistryUnavailable {
            message: message.into(),
        }
    }

    pub fn registry_corrupt<P: Into<String>, M: Into<String>>(path: P, message: M) -> Self {
        Self::RegistryCorrupt {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new configuration error.
    pub fn config<M: Into<String>>(message: M) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    /// Create a new file error.
    pub fn file_error<P: Into<String>, M: Into<String>>(path: P, message: M) -> Self {
        Self::FileError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new internal error.
    pub fn internal<M: Into<String>>(message: M) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Map a socket-level I/O error on `target` to the matching variant.
    ///
    /// Refused and timed-out connections get their own variants; everything
    /// else is a generic network error.
    pub fn from_socket_error(target: &str, err: &std::io::Error, duration: Duration) -> Self {
        match err.kind() {
            std::io::ErrorKind::ConnectionRefused => Self::refused(target),
            std::io::ErrorKind::TimedOut => {
                Self::timeout(format!("connect to {}", target), duration)
            }
            _ => Self::network_with_source(
                format!("Connection to {} failed", target),
                err.to_string(),
            ),
        }
    }

    /// Check if this error is an exceeded deadline.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Check if this error came from malformed user input.
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Self::InvalidDomain { .. } | Self::InvalidAddress { .. })
    }
}

impl fmt::Display for NetCheckError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidDomain { domain, reason } => {
                write!(f, "Invalid domain '{}': {}", domain, reason)
            }
            Self::InvalidAddress { address, reason } => {
                write!(f, "Invalid address '{}': {}", address, reason)
            }
            Self::NetworkError { message, source } => {
                if let Some(source) = source {
                    write!(f, "Network error: {} (source: {})", message, source)
                } else {
                    write!(f, "Network error: {}", message)
                }
            }
            Self::ConnectionRefused { target } => {
                write!(f, "Connection to {} refused", target)
            }
            Self::Timeout {
                operation,
                duration,
            } => {
                write!(f, "Timeout after {:?} during: {}", duration, operation)
            }
            Self::RemoteError { url, status, body } => {
                write!(
                    f,
                    "Request to {} failed with status code: {} and\nbody: {}",
                    url, status, body
                )
            }
            Self::RegistryUnavailable { message } => {
                write!(f, "RDAP bootstrap registry unavailable: {}", message)
            }
            Self::RegistryCorrupt { path, message } => {
                write!(f, "RDAP bootstrap cache at '{}' is corrupt: {}", path, message)
            }
            Self::RdapUnsupported { tld } => {
                write!(f, "TLD '.{}' is not supported by RDAP", tld)
            }
            Self::CommandMissing { command } => {
                write!(f, "{} command not found - it must be installed and on PATH", command)
            }
            Self::ParseError { message, content: _ } => {
                write!(f, "Parse error: {}", message)
            }
            Self::ConfigError { message } => {
                write!(f, "Configuration error: {}", message)
            }
            Self::FileError { path, message } => {
                write!(f, "File error at '{}': {}", path, message)
            }
            Self::Internal { message } => {
                write!(f, "Internal error: {}", message)
            }
        }
    }
}

impl std::error::Error for NetCheckError {}

impl NetCheckError {
    /// Classify a reqwest transport error for `operation`, reporting `timeout`
    /// as the exceeded bound.
    pub(crate) fn from_http_error(err: reqwest::Error, operation: &str, timeout: Duration) -> Self {
        if err.is_timeout() {
            Self::timeout(operation, timeout)
        } else if err.is_connect() {
            Self::network_with_source(format!("{}: connection failed", operation), err.to_string())
        } else {
            Self::network_with_source(format!("{}: request failed", operation), err.to_string())
        }
    }
}

impl From<serde_json::Error> for NetCheckError {
    fn from(err: serde_json::Error) -> Self {
        Self::ParseError {
            message: format!("JSON parsing failed: {}", err),
            content: None,
        }
    }
}

impl From<std::io::Error> for NetCheckError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal {
            message: format!("I/O error: {}", err),
        }
    }
}
