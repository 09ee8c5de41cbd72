//! # Netcheck Library
//!
//! Network probing and domain-resolution engine: TCP reachability checks,
//! local listening-socket enumeration, and RDAP/WHOIS domain lookups.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use netcheck_lib::{probe, DomainResolver, NetCheckConfig};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let result = probe("example.com:443", Duration::from_secs(3)).await;
//!     println!("{} open: {}", result.address, result.is_open);
//!
//!     let resolver = DomainResolver::from_config(&NetCheckConfig::default())?;
//!     let lookup = resolver.lookup("example.com").await?;
//!     println!("Answered by {}", lookup.method());
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Remote probes**: connect-only TCP checks with classified outcomes
//! - **Local listeners**: `/proc/net/tcp{,6}` on Linux, `lsof` elsewhere
//! - **RDAP**: base URLs from the IANA bootstrap registry, cached on disk
//! - **WHOIS**: two-hop lookups via the IANA root server

// Re-export main public API types and functions
// This makes them available as netcheck_lib::TypeName
pub use config::{
    env_config_from, load_config, load_env_config, parse_duration_string, CacheConfig,
    ConfigManager, DefaultsConfig, EnvConfig, FileConfig, WhoisConfig,
};
pub use error::NetCheckError;
pub use ports::{
    local_listeners, probe, KernelTableEnumerator, ListenerEnumerator, ListingCommandEnumerator,
    PlatformEnumerator,
};
pub use protocols::{
    BootstrapDocument, BootstrapSource, IanaBootstrap, RdapClient, RdapDomain, RdapEndpoint,
    RdapEvent, RdapLookup, RdapNameserver, RegistryCache, RegistryMap, SecureDns, WhoisClient,
    WhoisRecord, WhoisReferral,
};
pub use resolver::{DomainLookup, DomainResolver};
pub use types::{
    ListeningPort, LookupMethod, NetCheckConfig, PortCheckResult, PortErrorKind,
    DEFAULT_BOOTSTRAP_URL, DEFAULT_CACHE_MAX_AGE, DEFAULT_IANA_WHOIS_SERVER,
};
pub use utils::{extract_tld, parse_host_port, validate_domain};

// Public modules
pub mod ports;
pub mod protocols;

// Internal modules - these are not part of the public API
mod config;
mod error;
mod resolver;
mod types;
mod utils;

// Type alias for convenience
pub type Result<T> = std::result::Result<T, NetCheckError>;

// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
