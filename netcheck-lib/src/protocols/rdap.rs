//! RDAP (Registration Data Access Protocol) implementation.
//!
//! RDAP is the JSON-over-HTTPS replacement for WHOIS. The base URL for a TLD
//! comes from the IANA bootstrap registry; TLDs without an entry are reported
//! as unsupported so the caller can fall back to WHOIS.

use crate::error::NetCheckError;
use crate::protocols::registry::{BootstrapSource, IanaBootstrap, RdapEndpoint, RegistryCache};
use crate::types::NetCheckConfig;
use crate::utils::extract_tld;
use serde::{Deserialize, Deserializer, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

/// Longest slice of an undecodable body kept in a `ParseError`.
const MAX_ERROR_CONTENT: usize = 512;

/// A registration event such as "registration" or "expiration".
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RdapEvent {
    #[serde(default, deserialize_with = "null_as_default")]
    pub event_action: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub event_date: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RdapNameserver {
    #[serde(default, deserialize_with = "null_as_default")]
    pub ldh_name: String,
}

/// DNSSEC delegation information.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SecureDns {
    #[serde(default, deserialize_with = "null_as_default")]
    pub delegation_signed: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub max_sig_life: u64,
}

/// The subset of an RDAP domain object netcheck reports.
///
/// Every field is optional on the wire: a registry that omits or nulls a
/// field yields its empty value rather than an error.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RdapDomain {
    #[serde(default, deserialize_with = "null_as_default")]
    pub ldh_name: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub nameservers: Vec<RdapNameserver>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub status: Vec<String>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub events: Vec<RdapEvent>,

    #[serde(rename = "secureDNS", default, skip_serializing_if = "Option::is_none")]
    pub secure_dns: Option<SecureDns>,
}

impl RdapDomain {
    /// Decode an RDAP domain response body.
    pub fn from_slice(body: &[u8]) -> Result<Self, NetCheckError> {
        serde_json::from_slice(body).map_err(|e| NetCheckError::ParseError {
            message: format!("Failed to decode RDAP response: {}", e),
            content: Some(truncate_lossy(body, MAX_ERROR_CONTENT)),
        })
    }

    /// Date of the first event with the given action, if any.
    pub fn event_date(&self, action: &str) -> Option<&str> {
        self.events
            .iter()
            .find(|e| e.event_action.eq_ignore_ascii_case(action))
            .map(|e| e.event_date.as_str())
    }
}

/// Outcome of an RDAP lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum RdapLookup {
    /// The registry answered with a domain record
    Supported(RdapDomain),
    /// The TLD has no RDAP service; WHOIS is the way to go
    Unsupported { tld: String },
}

/// RDAP client for domain lookups.
///
/// Owns the registry cache used to find the base URL for a TLD. No retries:
/// a failed request is returned to the caller as-is.
pub struct RdapClient<S = IanaBootstrap> {
    http_client: reqwest::Client,
    timeout: Duration,
    registry: RegistryCache<S>,
}

impl RdapClient<IanaBootstrap> {
    /// Create an RDAP client backed by the IANA registry and the configured cache.
    pub fn from_config(config: &NetCheckConfig) -> Result<Self, NetCheckError> {
        Self::with_registry(RegistryCache::from_config(config)?, config.timeout)
    }
}

impl<S: BootstrapSource> RdapClient<S> {
    /// Create an RDAP client over an existing registry cache.
    pub fn with_registry(
        registry: RegistryCache<S>,
        timeout: Duration,
    ) -> Result<Self, NetCheckError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                NetCheckError::network_with_source(
                    "Failed to create RDAP HTTP client",
                    e.to_string(),
                )
            })?;

        Ok(Self {
            http_client,
            timeout,
            registry,
        })
    }

    /// Look a domain up over RDAP.
    ///
    /// # Errors
    ///
    /// - `InvalidDomain` if the domain has no TLD
    /// - registry errors from the bootstrap cache
    /// - `NetworkError` / `Timeout` on transport failure
    /// - `RemoteError` when the registry answers with status >= 400
    /// - `ParseError` when the body is not JSON
    #[instrument(skip(self), fields(domain = %domain))]
    pub async fn lookup(&self, domain: &str) -> Result<RdapLookup, NetCheckError> {
        let domain = domain.trim();
        let tld = extract_tld(domain)?;

        let base_url = match self.registry.resolve(&tld).await? {
            RdapEndpoint::Supported(url) => url,
            RdapEndpoint::NotSupported => {
                debug!(tld = %tld, "TLD has no RDAP service");
                return Ok(RdapLookup::Unsupported { tld });
            }
        };

        let url = domain_url(&base_url, domain);
        debug!(url = %url, "Querying RDAP server");

        let response = self
            .http_client
            .get(&url)
            .header(reqwest::header::ACCEPT, "application/rdap+json, application/json")
            .send()
            .await
            .map_err(|e| NetCheckError::from_http_error(e, "RDAP request", self.timeout))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| NetCheckError::from_http_error(e, "RDAP response", self.timeout))?;

        debug!(status = status.as_u16(), bytes = body.len(), "RDAP response received");

        if status.as_u16() >= 400 {
            return Err(NetCheckError::remote(
                url,
                status.as_u16(),
                String::from_utf8_lossy(&body),
            ));
        }

        Ok(RdapLookup::Supported(RdapDomain::from_slice(&body)?))
    }
}

/// `<base>domain/<domain>`, inserting the separating slash when the base URL
/// lacks a trailing one.
pub fn domain_url(base_url: &str, domain: &str) -> String {
    if base_url.ends_with('/') {
        format!("{}domain/{}", base_url, domain)
    } else {
        format!("{}/domain/{}", base_url, domain)
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

fn truncate_lossy(body: &[u8], max: usize) -> String {
    let text = String::from_utf8_lossy(&body[..body.len().min(max)]);
    text.into_owned()
}
