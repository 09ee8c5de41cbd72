//! Core data types for probing and lookups.
//!
//! This module defines the result types handed back to callers and the
//! runtime configuration shared by all clients.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Outcome classification of a remote port probe.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PortErrorKind {
    /// The connection succeeded
    None,
    /// The deadline was exceeded before the handshake completed
    Timeout,
    /// The target actively refused the connection
    Refused,
    /// The host name could not be resolved
    Dns,
    /// The target was not a valid `host:port`
    InvalidAddress,
    /// Any other dial failure
    Other,
}

/// Result of a single remote TCP port probe.
///
/// Construct through [`PortCheckResult::open`] or [`PortCheckResult::failed`]
/// so that `is_open` and `error_type` can never disagree.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PortCheckResult {
    /// The target exactly as supplied by the caller
    pub address: String,

    /// Whether the TCP handshake completed
    pub is_open: bool,

    /// Why the probe failed, `None` when open
    pub error_type: PortErrorKind,

    /// Failure detail for display
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PortCheckResult {
    pub fn open<A: Into<String>>(address: A) -> Self {
        Self {
            address: address.into(),
            is_open: true,
            error_type: PortErrorKind::None,
            error: None,
        }
    }

    /// A closed/unreachable result. `PortErrorKind::None` is coerced to
    /// `Other` since a failed probe always has a cause.
    pub fn failed<A: Into<String>, E: Into<String>>(
        address: A,
        kind: PortErrorKind,
        error: E,
    ) -> Self {
        let kind = match kind {
            PortErrorKind::None => PortErrorKind::Other,
            other => other,
        };
        Self {
            address: address.into(),
            is_open: false,
            error_type: kind,
            error: Some(error.into()),
        }
    }
}

/// A socket in the listening state on this host.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ListeningPort {
    /// "tcp" or "tcp6"
    pub protocol: String,
    /// Bound address, e.g. "0.0.0.0" or "::1"
    pub ip: String,
    pub port: u16,
}

impl fmt::Display for ListeningPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ip.contains(':') {
            write!(f, "{} [{}]:{}", self.protocol.to_uppercase(), self.ip, self.port)
        } else {
            write!(f, "{} {}:{}", self.protocol.to_uppercase(), self.ip, self.port)
        }
    }
}

/// Which protocol(s) a domain lookup may use.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LookupMethod {
    /// RDAP first, WHOIS when the TLD has no RDAP service
    #[default]
    Auto,
    /// RDAP only
    Rdap,
    /// WHOIS only
    Whois,
}

impl LookupMethod {
    /// Parse a method name ("auto", "rdap", "whois"), case-insensitively.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "auto" => Some(Self::Auto),
            "rdap" => Some(Self::Rdap),
            "whois" => Some(Self::Whois),
            _ => None,
        }
    }
}

impl fmt::Display for LookupMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LookupMethod::Auto => write!(f, "auto"),
            LookupMethod::Rdap => write!(f, "rdap"),
            LookupMethod::Whois => write!(f, "whois"),
        }
    }
}

/// Default IANA RDAP bootstrap document for DNS.
pub const DEFAULT_BOOTSTRAP_URL: &str = "https://data.iana.org/rdap/dns.json";

/// Default IANA root WHOIS server.
pub const DEFAULT_IANA_WHOIS_SERVER: &str = "whois.iana.org";

/// The bootstrap cache is refreshed once it is older than 30 days.
pub const DEFAULT_CACHE_MAX_AGE: Duration = Duration::from_secs(720 * 3600);

/// Runtime configuration for all netcheck clients.
#[derive(Debug, Clone)]
pub struct NetCheckConfig {
    /// Bound for every network operation (probe, WHOIS exchange, RDAP request)
    /// Default: 3 seconds
    pub timeout: Duration,

    /// Protocol selection for domain lookups
    pub lookup_method: LookupMethod,

    /// Directory holding the RDAP bootstrap cache.
    /// `None` means `<user config dir>/netcheck`.
    pub cache_dir: Option<PathBuf>,

    /// Age after which the bootstrap cache is refetched
    /// Default: 720 hours
    pub cache_max_age: Duration,

    /// Where the bootstrap document is fetched from
    pub bootstrap_url: String,

    /// Root WHOIS server asked for per-TLD referrals
    pub iana_whois_server: String,

    /// Bound for external listing commands (lsof)
    /// Default: 10 seconds
    pub command_timeout: Duration,
}

impl Default for NetCheckConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(3),
            lookup_method: LookupMethod::Auto,
            cache_dir: None,
            cache_max_age: DEFAULT_CACHE_MAX_AGE,
            bootstrap_url: DEFAULT_BOOTSTRAP_URL.to_string(),
            iana_whois_server: DEFAULT_IANA_WHOIS_SERVER.to_string(),
            command_timeout: Duration::from_secs(10),
        }
    }
}

impl NetCheckConfig {
    /// Set the network timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the lookup method.
    pub fn with_lookup_method(mut self, method: LookupMethod) -> Self {
        self.lookup_method = method;
        self
    }

    /// Use a specific cache directory instead of the user config dir.
    pub fn with_cache_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    /// Set the bootstrap cache max age.
    pub fn with_cache_max_age(mut self, max_age: Duration) -> Self {
        self.cache_max_age = max_age;
        self
    }
}
