//! Domain lookup strategy.
//!
//! This module provides the `DomainResolver` that decides which protocol
//! answers a domain query: RDAP where the TLD has a service, WHOIS otherwise,
//! or one of them exclusively when the caller forces it.

use crate::error::NetCheckError;
use crate::protocols::registry::{BootstrapSource, IanaBootstrap};
use crate::protocols::{RdapClient, RdapDomain, RdapLookup, WhoisClient, WhoisRecord, WhoisReferral};
use crate::types::{LookupMethod, NetCheckConfig};
use crate::utils::{extract_tld, validate_domain};
use serde::Serialize;
use tracing::{info, instrument};

/// Result of a domain lookup, tagged by the protocol that produced it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum DomainLookup {
    /// Structured RDAP record
    Rdap(RdapDomain),
    /// Lines retained from a WHOIS record
    Whois(WhoisRecord),
    /// IANA knows no WHOIS server for the TLD
    WhoisUnlisted { tld: String, remarks: String },
}

impl DomainLookup {
    /// The protocol that answered.
    pub fn method(&self) -> LookupMethod {
        match self {
            DomainLookup::Rdap(_) => LookupMethod::Rdap,
            DomainLookup::Whois(_) | DomainLookup::WhoisUnlisted { .. } => LookupMethod::Whois,
        }
    }
}

/// Domain resolver that coordinates the RDAP and WHOIS clients.
///
/// # Example
///
/// ```rust,no_run
/// use netcheck_lib::{DomainResolver, NetCheckConfig};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let resolver = DomainResolver::from_config(&NetCheckConfig::default())?;
///     let lookup = resolver.lookup("example.com").await?;
///     println!("Answered by {}", lookup.method());
///     Ok(())
/// }
/// ```
pub struct DomainResolver<S = IanaBootstrap> {
    rdap: RdapClient<S>,
    whois: WhoisClient,
    method: LookupMethod,
}

impl DomainResolver<IanaBootstrap> {
    /// Create a resolver from runtime configuration.
    pub fn from_config(config: &NetCheckConfig) -> Result<Self, NetCheckError> {
        Ok(Self::with_clients(
            RdapClient::from_config(config)?,
            WhoisClient::from_config(config),
            config.lookup_method,
        ))
    }
}

impl<S: BootstrapSource> DomainResolver<S> {
    pub fn with_clients(rdap: RdapClient<S>, whois: WhoisClient, method: LookupMethod) -> Self {
        Self { rdap, whois, method }
    }

    /// Look up a domain with the configured method.
    ///
    /// In `Auto` mode RDAP is asked first and WHOIS is used only when the TLD
    /// has no RDAP service. RDAP failures are returned as errors rather than
    /// retried over WHOIS.
    ///
    /// # Errors
    ///
    /// - `InvalidDomain` for malformed input
    /// - `RdapUnsupported` when RDAP is forced for a TLD without RDAP
    /// - any RDAP or WHOIS client error
    #[instrument(skip(self), fields(method = %self.method))]
    pub async fn lookup(&self, domain: &str) -> Result<DomainLookup, NetCheckError> {
        validate_domain(domain)?;
        let domain = domain.trim();

        match self.method {
            LookupMethod::Whois => self.lookup_whois(domain).await,
            LookupMethod::Rdap => match self.rdap.lookup(domain).await? {
                RdapLookup::Supported(record) => Ok(DomainLookup::Rdap(record)),
                RdapLookup::Unsupported { tld } => Err(NetCheckError::RdapUnsupported { tld }),
            },
            LookupMethod::Auto => match self.rdap.lookup(domain).await? {
                RdapLookup::Supported(record) => Ok(DomainLookup::Rdap(record)),
                RdapLookup::Unsupported { tld } => {
                    info!(tld = %tld, "No RDAP service for TLD, falling back to WHOIS");
                    self.lookup_whois(domain).await
                }
            },
        }
    }

    async fn lookup_whois(&self, domain: &str) -> Result<DomainLookup, NetCheckError> {
        match self.whois.resolve_whois_server(domain).await? {
            WhoisReferral::Server(server) => {
                Ok(DomainLookup::Whois(self.whois.query(&server, domain).await?))
            }
            WhoisReferral::Unlisted { remarks } => Ok(DomainLookup::WhoisUnlisted {
                tld: extract_tld(domain)?,
                remarks,
            }),
        }
    }
}
