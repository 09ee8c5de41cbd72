//! Remote TCP reachability probe.

use crate::types::{PortCheckResult, PortErrorKind};
use crate::utils::parse_host_port;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{lookup_host, TcpStream};
use tracing::{debug, instrument};

/// Why a dial attempt failed before the deadline.
enum DialError {
    Resolve(String),
    Connect(io::Error),
}

/// Probe `address` ("host:port") with a single TCP connect.
///
/// Name resolution and the handshake share one `timeout`. The outcome is
/// always a classified [`PortCheckResult`], never an error. On success the
/// stream is dropped right away without exchanging data.
#[instrument(skip(timeout))]
pub async fn probe(address: &str, timeout: Duration) -> PortCheckResult {
    let (host, port) = match parse_host_port(address) {
        Ok(parts) => parts,
        Err(e) => {
            return PortCheckResult::failed(address, PortErrorKind::InvalidAddress, e.to_string())
        }
    };

    let result = match tokio::time::timeout(timeout, dial(&host, port)).await {
        Ok(Ok(stream)) => {
            drop(stream);
            PortCheckResult::open(address)
        }
        Ok(Err(DialError::Resolve(message))) => {
            PortCheckResult::failed(address, PortErrorKind::Dns, message)
        }
        Ok(Err(DialError::Connect(e))) => {
            PortCheckResult::failed(address, classify_connect_error(&e), e.to_string())
        }
        Err(_) => PortCheckResult::failed(
            address,
            PortErrorKind::Timeout,
            format!("no response within {:?}", timeout),
        ),
    };

    debug!(open = result.is_open, kind = ?result.error_type, "Probe finished");
    result
}

/// Resolve `host` and try each address in turn, keeping the last error.
async fn dial(host: &str, port: u16) -> Result<TcpStream, DialError> {
    let addrs: Vec<SocketAddr> = lookup_host((host, port))
        .await
        .map_err(|e| DialError::Resolve(format!("lookup {}: {}", host, e)))?
        .collect();

    if addrs.is_empty() {
        return Err(DialError::Resolve(format!("lookup {}: no addresses found", host)));
    }

    let mut last_error = None;
    for addr in addrs {
        match TcpStream::connect(addr).await {
            Ok(stream) => return Ok(stream),
            Err(e) => {
                debug!(addr = %addr, error = %e, "Connect attempt failed");
                last_error = Some(e);
            }
        }
    }

    Err(DialError::Connect(last_error.unwrap_or_else(|| {
        io::Error::new(io::ErrorKind::Other, "no address could be dialed")
    })))
}

fn classify_connect_error(err: &io::Error) -> PortErrorKind {
    match err.kind() {
        io::ErrorKind::ConnectionRefused => PortErrorKind::Refused,
        io::ErrorKind::TimedOut => PortErrorKind::Timeout,
        _ => PortErrorKind::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;
    use tokio::net::TcpListener;

    const TIMEOUT: Duration = Duration::from_secs(2);

    /// Scheduling allowance on top of a probe's budget.
    const SLACK: Duration = Duration::from_millis(250);

    #[tokio::test]
    async fn test_listening_port_is_open() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();

        let result = probe(&address, TIMEOUT).await;
        assert!(result.is_open, "{:?}", result);
        assert_eq!(result.error_type, PortErrorKind::None);
        assert_eq!(result.address, address);
    }

    #[tokio::test]
    async fn test_closed_port_is_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        drop(listener);

        let result = probe(&address, TIMEOUT).await;
        assert!(!result.is_open);
        assert_eq!(result.error_type, PortErrorKind::Refused);
        assert!(result.error.is_some());
    }

    #[tokio::test]
    async fn test_refused_returns_within_budget() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        drop(listener);

        let budget = Duration::from_millis(500);
        let started = Instant::now();
        let result = probe(&address, budget).await;
        let elapsed = started.elapsed();

        assert_eq!(result.error_type, PortErrorKind::Refused);
        assert!(elapsed < budget + SLACK, "took {:?}", elapsed);
    }

    #[tokio::test]
    async fn test_zero_budget_times_out() {
        // The connect future can't complete on its first poll, so an
        // already expired deadline always wins.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();

        let started = Instant::now();
        let result = probe(&address, Duration::ZERO).await;

        assert!(!result.is_open);
        assert_eq!(result.error_type, PortErrorKind::Timeout);
        assert!(started.elapsed() < SLACK);
        assert!(result.error.unwrap().contains("no response within"));
    }

    #[tokio::test]
    async fn test_invalid_addresses_fail_without_dialing() {
        for address in ["localhost", "localhost:", ":8080", "localhost:http", "localhost:65536"] {
            let result = probe(address, TIMEOUT).await;
            assert!(!result.is_open);
            assert_eq!(result.error_type, PortErrorKind::InvalidAddress, "for '{}'", address);
        }
    }

    #[tokio::test]
    async fn test_ipv6_loopback_is_open() {
        // Hosts without IPv6 loopback can't bind, nothing to check there.
        let Ok(listener) = TcpListener::bind("[::1]:0").await else {
            return;
        };
        let address = format!("[::1]:{}", listener.local_addr().unwrap().port());

        assert!(probe(&address, TIMEOUT).await.is_open);
    }

    #[test]
    fn test_connect_error_classification() {
        let refused = io::Error::from(io::ErrorKind::ConnectionRefused);
        assert_eq!(classify_connect_error(&refused), PortErrorKind::Refused);

        let timed_out = io::Error::from(io::ErrorKind::TimedOut);
        assert_eq!(classify_connect_error(&timed_out), PortErrorKind::Timeout);

        let unreachable = io::Error::from(io::ErrorKind::PermissionDenied);
        assert_eq!(classify_connect_error(&unreachable), PortErrorKind::Other);
    }

    #[tokio::test]
    #[ignore] // Requires network access
    async fn test_unresolvable_host_is_dns_error() {
        let result = probe("does-not-exist.invalid:80", Duration::from_secs(5)).await;
        assert_eq!(result.error_type, PortErrorKind::Dns);
    }

    #[tokio::test]
    #[ignore] // Depends on the network dropping packets to a non-routable address
    async fn test_blackholed_address_times_out() {
        let result = probe("10.255.255.1:80", Duration::from_millis(300)).await;
        assert_eq!(result.error_type, PortErrorKind::Timeout);
    }
}
