//! Text-mode display logic for the netcheck CLI.
//!
//! Results go to stdout, errors to stderr. Uses only the `console` crate for
//! styling, which turns colors off by itself when stdout is not a terminal.

use console::style;
use netcheck_lib::{
    DomainLookup, ListeningPort, NetCheckError, PortCheckResult, PortErrorKind, WhoisReferral,
};

// ── Usage ────────────────────────────────────────────────────────────────────

pub fn print_usage() {
    println!("{}", style("Network debugging tool").bold());
    println!();
    println!("{}", style("Usage:").yellow().bold());
    println!("  netcheck -r <host:port>  Check if remote port is open");
    println!("  netcheck -l              List local open ports");
    println!("  netcheck -d <domain>     Lookup domain information");
    println!();
}

// ── Remote probe ─────────────────────────────────────────────────────────────

pub fn print_port_check_result(result: &PortCheckResult) {
    println!("{}", format_port_check_result(result));
}

/// One line describing a probe outcome.
pub fn format_port_check_result(result: &PortCheckResult) -> String {
    let detail = result.error.as_deref().unwrap_or("unknown error");

    match result.error_type {
        _ if result.is_open => format!(
            "✅ {}",
            style(format!("Port {} is OPEN", result.address)).green()
        ),
        PortErrorKind::Timeout => format!(
            "⏱️  {}",
            style(format!("Connection to {} TIMED OUT", result.address)).yellow()
        ),
        PortErrorKind::Refused => format!(
            "🔴 {}",
            style(format!("Port {} is CLOSED (connection refused)", result.address)).red()
        ),
        PortErrorKind::Dns => format!(
            "🔍 {}",
            style(format!("DNS lookup failed: {}", detail)).yellow()
        ),
        PortErrorKind::InvalidAddress => format!(
            "⚠️  {}",
            style(format!("Invalid address format: {}", detail)).yellow()
        ),
        PortErrorKind::Other | PortErrorKind::None => format!(
            "❌ {}",
            style(format!("Cannot connect to {}: {}", result.address, detail)).red()
        ),
    }
}

// ── Local listeners ──────────────────────────────────────────────────────────

pub fn print_listening_ports(ports: &[ListeningPort]) {
    print!("{}", format_listening_ports(ports));
}

pub fn format_listening_ports(ports: &[ListeningPort]) -> String {
    if ports.is_empty() {
        return "No listening ports found\n".to_string();
    }

    let mut out = format!("{}\n", style("Listening ports:").bold());
    for port in ports {
        out.push_str(&format!("  {}\n", port));
    }
    out
}

// ── Domain lookups ───────────────────────────────────────────────────────────

/// Print a lookup: RDAP records as indented JSON, WHOIS records as their
/// retained lines.
pub fn print_domain_lookup(lookup: &DomainLookup) -> Result<(), serde_json::Error> {
    match lookup {
        DomainLookup::Rdap(record) => {
            println!("{}", serde_json::to_string_pretty(record)?);
        }
        DomainLookup::Whois(record) => {
            eprintln!("{}", style(format!("WHOIS server: {}", record.server)).dim());
            if record.lines.is_empty() {
                println!("{}", style("No registration fields found in WHOIS response").yellow());
            } else {
                println!("{}", record);
            }
        }
        DomainLookup::WhoisUnlisted { remarks, .. } => {
            let referral = WhoisReferral::Unlisted {
                remarks: remarks.clone(),
            };
            println!("{}", referral.message());
        }
    }
    Ok(())
}

// ── Errors ───────────────────────────────────────────────────────────────────

pub fn print_error(error: &(dyn std::error::Error + 'static)) {
    eprintln!("{} {}", style("Error:").red().bold(), error);

    if let Some(hint) = error.downcast_ref::<NetCheckError>().and_then(error_hint) {
        eprintln!("  {}", style(hint).dim());
    }
}

/// A follow-up suggestion for errors the user can act on.
fn error_hint(error: &NetCheckError) -> Option<&'static str> {
    match error {
        NetCheckError::RdapUnsupported { .. } => {
            Some("Try --whois, or drop --rdap to fall back automatically")
        }
        NetCheckError::CommandMissing { .. } => {
            Some("Install lsof to list listening ports on this platform")
        }
        NetCheckError::RegistryCorrupt { .. } => {
            Some("Delete the cache file to fetch a fresh copy of the RDAP bootstrap registry")
        }
        NetCheckError::Timeout { .. } => Some("Raise the limit with -t, e.g. -t 10s"),
        _ => None,
    }
}
