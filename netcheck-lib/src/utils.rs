//! Input parsing helpers shared by the clients.
//!
//! Domain and `host:port` inputs are validated here, before any network
//! activity happens.

use crate::error::NetCheckError;

/// Extract the TLD from a domain name.
///
/// The TLD is everything after the last dot, lowercased. Multi-label public
/// suffixes like `co.uk` are not special-cased: `example.co.uk` yields `uk`.
///
/// # Errors
///
/// `InvalidDomain` if the domain has no dot or ends with one.
pub fn extract_tld(domain: &str) -> Result<String, NetCheckError> {
    let domain = domain.trim();

    let (_, tld) = domain.rsplit_once('.').ok_or_else(|| {
        NetCheckError::invalid_domain(domain, "Domain must contain at least one dot")
    })?;

    if tld.is_empty() {
        return Err(NetCheckError::invalid_domain(domain, "Domain must not end with a dot"));
    }

    Ok(tld.to_lowercase())
}

/// Validate a domain name before looking it up.
///
/// This is a shallow syntax check; registries are the final authority.
pub fn validate_domain(domain: &str) -> Result<(), NetCheckError> {
    let domain = domain.trim();

    if domain.is_empty() {
        return Err(NetCheckError::invalid_domain(domain, "Domain name cannot be empty"));
    }

    if domain.len() > 253 {
        return Err(NetCheckError::invalid_domain(
            domain,
            "Domain name is longer than 253 characters",
        ));
    }

    if domain.chars().any(char::is_whitespace) {
        return Err(NetCheckError::invalid_domain(domain, "Domain name cannot contain whitespace"));
    }

    if domain.starts_with('.') {
        return Err(NetCheckError::invalid_domain(domain, "Domain name cannot start with a dot"));
    }

    extract_tld(domain).map(|_| ())
}

/// Split a `host:port` target into its host and numeric port.
///
/// IPv6 literals must be bracketed (`[::1]:22`); the brackets are stripped
/// from the returned host.
///
/// # Errors
///
/// `InvalidAddress` for a missing port, empty host, or a port that is not a
/// number in `0..=65535`.
pub fn parse_host_port(address: &str) -> Result<(String, u16), NetCheckError> {
    let (host, port) = address
        .rsplit_once(':')
        .ok_or_else(|| NetCheckError::invalid_address(address, "missing port in address"))?;

    let host = if let Some(inner) = host.strip_prefix('[') {
        inner
            .strip_suffix(']')
            .ok_or_else(|| NetCheckError::invalid_address(address, "unterminated '[' in host"))?
    } else if host.contains(':') {
        return Err(NetCheckError::invalid_address(
            address,
            "too many colons in address, bracket IPv6 hosts like [::1]:80",
        ));
    } else {
        host
    };

    if host.is_empty() {
        return Err(NetCheckError::invalid_address(address, "missing host in address"));
    }

    if port.is_empty() {
        return Err(NetCheckError::invalid_address(address, "missing port in address"));
    }

    let port = port
        .parse::<u16>()
        .map_err(|_| NetCheckError::invalid_address(address, format!("invalid port '{}'", port)))?;

    Ok((host.to_string(), port))
}
