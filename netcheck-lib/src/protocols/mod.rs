//! Protocol implementations for domain lookups.
//!
//! RDAP, WHOIS, and the IANA bootstrap registry that tells RDAP where to go.

/// RDAP (Registration Data Access Protocol) implementation
pub mod rdap;

/// WHOIS protocol implementation
pub mod whois;

/// Bootstrap registry fetch and on-disk cache
pub mod registry;

// Re-export commonly used types
pub use rdap::{RdapClient, RdapDomain, RdapEvent, RdapLookup, RdapNameserver, SecureDns};
pub use registry::{
    default_cache_dir, BootstrapDocument, BootstrapSource, IanaBootstrap, RdapEndpoint,
    RegistryCache, RegistryMap,
};
pub use whois::{WhoisClient, WhoisRecord, WhoisReferral};
