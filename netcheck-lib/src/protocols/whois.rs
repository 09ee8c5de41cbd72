//! WHOIS protocol implementation.
//!
//! WHOIS is a plain-text protocol on TCP port 43: the client sends one
//! CRLF-terminated query and the server answers until it closes the
//! connection. Lookups take two hops. The IANA root server is asked which
//! host is authoritative for the TLD, then that host is asked about the
//! domain itself.

use crate::error::NetCheckError;
use crate::types::{NetCheckConfig, DEFAULT_IANA_WHOIS_SERVER};
use crate::utils::extract_tld;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, instrument};

/// Well-known WHOIS port.
pub const WHOIS_PORT: u16 = 43;

/// Responses beyond this size are truncated.
const MAX_RESPONSE_BYTES: u64 = 1024 * 1024;

/// Line prefixes kept from a domain record. Everything else is dropped.
const RECORD_PREFIXES: &[&str] = &[
    "Domain",
    "Creation Date",
    "Registry Expiry Date",
    "Updated Date",
    "Registrar ",
    "Registrar:",
    "Registrant",
    "Admin",
    "Tech",
    "Name Server",
    "DNSSEC",
];

/// Answer of the IANA root server for a TLD.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WhoisReferral {
    /// Host authoritative for the TLD
    Server(String),
    /// IANA lists no WHOIS server; `remarks` holds its guidance
    Unlisted { remarks: String },
}

impl WhoisReferral {
    /// Human-readable description of the referral.
    pub fn message(&self) -> String {
        match self {
            WhoisReferral::Server(host) => host.clone(),
            WhoisReferral::Unlisted { remarks } => format!(
                "No whois server provided, please use information below: \n{}",
                remarks
            ),
        }
    }
}

/// The lines of interest from a WHOIS domain record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WhoisRecord {
    pub domain: String,
    /// Server that answered the query
    pub server: String,
    /// Retained lines, trimmed, in response order
    pub lines: Vec<String>,
}

impl fmt::Display for WhoisRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.lines.join("\n"))
    }
}

/// WHOIS client speaking the protocol directly over TCP.
#[derive(Debug, Clone)]
pub struct WhoisClient {
    timeout: Duration,
    iana_server: String,
    port: u16,
}

impl WhoisClient {
    /// Create a WHOIS client with default settings.
    pub fn new() -> Self {
        Self {
            timeout: Duration::from_secs(3),
            iana_server: DEFAULT_IANA_WHOIS_SERVER.to_string(),
            port: WHOIS_PORT,
        }
    }

    pub fn from_config(config: &NetCheckConfig) -> Self {
        Self::new()
            .with_timeout(config.timeout)
            .with_iana_server(config.iana_whois_server.clone())
    }

    /// Bound for connecting and for reading each response.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_iana_server<S: Into<String>>(mut self, server: S) -> Self {
        self.iana_server = server.into();
        self
    }

    /// Connect to `port` instead of 43 on every server.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Ask the IANA root server which WHOIS host serves the domain's TLD.
    ///
    /// The referral is not cached; every call queries IANA again.
    #[instrument(skip(self), fields(domain = %domain))]
    pub async fn resolve_whois_server(&self, domain: &str) -> Result<WhoisReferral, NetCheckError> {
        let tld = extract_tld(domain)?;
        let response = self.exchange(&self.iana_server, &tld).await?;
        let referral = parse_iana_response(&response);

        match &referral {
            WhoisReferral::Server(host) => debug!(tld = %tld, server = %host, "IANA referral"),
            WhoisReferral::Unlisted { .. } => debug!(tld = %tld, "IANA lists no WHOIS server"),
        }

        Ok(referral)
    }

    /// Query `server` for `domain` and keep the record lines of interest.
    #[instrument(skip(self), fields(server = %server, domain = %domain))]
    pub async fn query(&self, server: &str, domain: &str) -> Result<WhoisRecord, NetCheckError> {
        let domain = domain.trim();
        let response = self.exchange(server, domain).await?;
        let lines = extract_record_lines(&response);

        debug!(retained = lines.len(), "WHOIS record parsed");

        Ok(WhoisRecord {
            domain: domain.to_string(),
            server: server.to_string(),
            lines,
        })
    }

    /// Send one query line and read the response until the server closes.
    async fn exchange(&self, host: &str, query: &str) -> Result<String, NetCheckError> {
        let target = format!("{}:{}", host, self.port);
        debug!(target = %target, query = %query, "Sending WHOIS query");

        let connect = TcpStream::connect(target.as_str());
        let mut stream = match tokio::time::timeout(self.timeout, connect).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(NetCheckError::from_socket_error(&target, &e, self.timeout)),
            Err(_) => {
                return Err(NetCheckError::timeout(
                    format!("WHOIS connect to {}", target),
                    self.timeout,
                ))
            }
        };

        let request = format!("{}\r\n", query);
        let conversation = async move {
            stream.write_all(request.as_bytes()).await?;

            let mut body = Vec::new();
            stream.take(MAX_RESPONSE_BYTES).read_to_end(&mut body).await?;
            Ok::<_, std::io::Error>(body)
        };

        let body = match tokio::time::timeout(self.timeout, conversation).await {
            Ok(Ok(body)) => body,
            Ok(Err(e)) => return Err(NetCheckError::from_socket_error(&target, &e, self.timeout)),
            Err(_) => {
                return Err(NetCheckError::timeout(
                    format!("WHOIS response from {}", target),
                    self.timeout,
                ))
            }
        };

        Ok(String::from_utf8_lossy(&body).into_owned())
    }
}

impl Default for WhoisClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Pull the `whois:` host and `remarks:` guidance out of an IANA TLD record.
pub fn parse_iana_response(response: &str) -> WhoisReferral {
    let mut server = None;
    let mut remarks = Vec::new();

    for line in response.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();

        match key.trim() {
            "whois" if server.is_none() && !value.is_empty() => server = Some(value.to_string()),
            "remarks" => remarks.push(value),
            _ => {}
        }
    }

    match server {
        Some(host) => WhoisReferral::Server(host),
        None => WhoisReferral::Unlisted {
            remarks: remarks.join("\n"),
        },
    }
}

/// Keep the trimmed lines that start with a known record field.
pub fn extract_record_lines(response: &str) -> Vec<String> {
    response
        .lines()
        .map(str::trim)
        .filter(|line| RECORD_PREFIXES.iter().any(|prefix| line.starts_with(prefix)))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncBufReadExt, BufReader};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;
    use tokio_test::{assert_err, assert_ok};

    const IANA_COM: &str = "\
% IANA WHOIS server
% for more information on IANA, visit http://www.iana.org

refer:        whois.verisign-grs.com

domain:       COM

organisation: VeriSign Global Registry Services
whois:        whois.verisign-grs.com

status:       ACTIVE
remarks:      Registration information: http://www.verisigninc.com
";

    const IANA_UNLISTED: &str = "\
domain:       EXAMPLE
organisation: Example Registry
whois:
remarks:      Registration information: https://nic.example
remarks:      Contact the registry directly
";

    const RECORD: &str = "\
   Domain Name: EXAMPLE.COM
   Registry Domain ID: 2336799_DOMAIN_COM-VRSN
   Registrar WHOIS Server: whois.iana.org
   Updated Date: 2024-08-14T07:01:34Z
   Creation Date: 1995-08-14T04:00:00Z
   Registry Expiry Date: 2025-08-13T04:00:00Z
   Registrar: RESERVED-Internet Assigned Numbers Authority
   Registrar IANA ID: 376
   Name Server: A.IANA-SERVERS.NET
   Name Server: B.IANA-SERVERS.NET
   DNSSEC: signedDelegation
>>> Last update of whois database: 2024-09-01T00:00:00Z <<<

NOTICE: The expiration date displayed in this record is the date the
";

    /// Accept one connection, capture the query line, answer and close.
    async fn serve_once(response: &'static str) -> (u16, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let query = {
                let mut reader = BufReader::new(&mut socket);
                let mut line = String::new();
                reader.read_line(&mut line).await.unwrap();
                line
            };
            socket.write_all(response.as_bytes()).await.unwrap();
            query
        });

        (port, handle)
    }

    fn local_client(port: u16) -> WhoisClient {
        WhoisClient::new()
            .with_iana_server("127.0.0.1")
            .with_port(port)
            .with_timeout(Duration::from_secs(2))
    }

    #[test]
    fn test_parse_iana_response_finds_server() {
        assert_eq!(
            parse_iana_response(IANA_COM),
            WhoisReferral::Server("whois.verisign-grs.com".to_string())
        );
    }

    #[test]
    fn test_parse_iana_response_unlisted_joins_remarks() {
        let referral = parse_iana_response(IANA_UNLISTED);
        assert_eq!(
            referral,
            WhoisReferral::Unlisted {
                remarks: "Registration information: https://nic.example\nContact the registry directly"
                    .to_string()
            }
        );
        assert!(referral
            .message()
            .starts_with("No whois server provided, please use information below: \n"));
    }

    #[test]
    fn test_extract_record_lines() {
        let lines = extract_record_lines(RECORD);
        assert_eq!(
            lines,
            vec![
                "Domain Name: EXAMPLE.COM",
                "Registrar WHOIS Server: whois.iana.org",
                "Updated Date: 2024-08-14T07:01:34Z",
                "Creation Date: 1995-08-14T04:00:00Z",
                "Registry Expiry Date: 2025-08-13T04:00:00Z",
                "Registrar: RESERVED-Internet Assigned Numbers Authority",
                "Registrar IANA ID: 376",
                "Name Server: A.IANA-SERVERS.NET",
                "Name Server: B.IANA-SERVERS.NET",
                "DNSSEC: signedDelegation",
            ]
        );
    }

    #[test]
    fn test_extract_record_lines_empty_response() {
        assert!(extract_record_lines("").is_empty());
        assert!(extract_record_lines("No match for \"NOPE.COM\".\r\n").is_empty());
    }

    #[test]
    fn test_record_display_joins_lines() {
        let record = WhoisRecord {
            domain: "example.com".to_string(),
            server: "whois.example".to_string(),
            lines: vec!["Domain Name: EXAMPLE.COM".to_string(), "DNSSEC: unsigned".to_string()],
        };
        assert_eq!(record.to_string(), "Domain Name: EXAMPLE.COM\nDNSSEC: unsigned");
    }

    #[tokio::test]
    async fn test_resolve_sends_tld_with_crlf() {
        let (port, server) = serve_once(IANA_COM).await;
        let referral = assert_ok!(local_client(port).resolve_whois_server("Example.COM").await);

        assert_eq!(referral, WhoisReferral::Server("whois.verisign-grs.com".to_string()));
        assert_eq!(server.await.unwrap(), "com\r\n");
    }

    #[tokio::test]
    async fn test_query_returns_record_lines() {
        let (port, server) = serve_once(RECORD).await;
        let record = assert_ok!(local_client(port).query("127.0.0.1", "example.com").await);

        assert_eq!(server.await.unwrap(), "example.com\r\n");
        assert_eq!(record.server, "127.0.0.1");
        assert_eq!(record.lines.first().map(String::as_str), Some("Domain Name: EXAMPLE.COM"));
        assert_eq!(record.lines.len(), 10);
    }

    #[tokio::test]
    async fn test_query_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let err = assert_err!(local_client(port).query("127.0.0.1", "example.com").await);
        assert!(matches!(err, NetCheckError::ConnectionRefused { .. }), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_silent_server_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let _hold = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(socket);
        });

        let client = local_client(port).with_timeout(Duration::from_millis(200));
        let err = assert_err!(client.query("127.0.0.1", "example.com").await);
        assert!(err.is_timeout(), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_resolve_rejects_domain_without_tld() {
        let err = assert_err!(WhoisClient::new().resolve_whois_server("localhost").await);
        assert!(err.is_invalid_input());
    }

    #[tokio::test]
    #[ignore] // Requires network access
    async fn test_iana_resolves_com() {
        let referral = WhoisClient::new()
            .with_timeout(Duration::from_secs(10))
            .resolve_whois_server("example.com")
            .await
            .unwrap();
        assert_eq!(referral, WhoisReferral::Server("whois.verisign-grs.com".to_string()));
    }
}
