//! Listening sockets from `lsof`, for platforms without a kernel table.
//!
//! `lsof -iTCP -sTCP:LISTEN -n -P` prints one row per listening socket:
//!
//! ```text
//! COMMAND   PID USER   FD   TYPE DEVICE SIZE/OFF NODE NAME
//! rapportd  512 me     4u   IPv4 0x1234      0t0  TCP *:49152 (LISTEN)
//! cupsd     601 root   5u   IPv6 0x5678      0t0  TCP [::1]:631 (LISTEN)
//! ```

use super::ListenerEnumerator;
use crate::error::NetCheckError;
use crate::types::ListeningPort;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStdout, Command};
use tracing::{debug, warn};

const LSOF_ARGS: &[&str] = &["-iTCP", "-sTCP:LISTEN", "-n", "-P"];

/// Runs a listing command and parses its rows as they arrive.
#[derive(Debug, Clone)]
pub struct ListingCommandEnumerator {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl ListingCommandEnumerator {
    /// `lsof` with the listening-socket filter, bounded by `timeout`.
    pub fn new(timeout: Duration) -> Self {
        Self::with_command("lsof", LSOF_ARGS, timeout)
    }

    /// Run another program that prints rows in lsof's format.
    pub fn with_command<P, I, A>(program: P, args: I, timeout: Duration) -> Self
    where
        P: Into<String>,
        I: IntoIterator<Item = A>,
        A: AsRef<str>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(|a| a.as_ref().to_string()).collect(),
            timeout,
        }
    }
}

impl ListenerEnumerator for ListingCommandEnumerator {
    async fn enumerate(&self) -> Result<Vec<ListeningPort>, NetCheckError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => NetCheckError::CommandMissing {
                    command: self.program.clone(),
                },
                _ => NetCheckError::internal(format!("Failed to run {}: {}", self.program, e)),
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| {
                NetCheckError::internal(format!("{} stdout was not captured", self.program))
            })?;

        // Dropping the future on timeout drops `child`, which kills it.
        let reading = read_rows(child, stdout, &self.program);
        let (ports, status) = match tokio::time::timeout(self.timeout, reading).await {
            Ok(Ok(done)) => done,
            Ok(Err(e)) => {
                return Err(NetCheckError::internal(format!(
                    "Failed to read {} output: {}",
                    self.program, e
                )))
            }
            Err(_) => return Err(NetCheckError::timeout(self.program.as_str(), self.timeout)),
        };

        // lsof exits 1 when nothing matches the filter.
        if !status.success() {
            debug!(status = %status, rows = ports.len(), "{} exited unsuccessfully", self.program);
        }

        Ok(ports)
    }
}

/// Stream rows until stdout closes, then reap the child.
async fn read_rows(
    mut child: Child,
    stdout: ChildStdout,
    program: &str,
) -> std::io::Result<(Vec<ListeningPort>, ExitStatus)> {
    let mut lines = BufReader::new(stdout).lines();
    let mut ports = Vec::new();

    // Header row
    if lines.next_line().await?.is_some() {
        while let Some(line) = lines.next_line().await? {
            match parse_lsof_line(&line) {
                Some(port) => ports.push(port),
                None => warn!(row = %line, "Skipping malformed {} row", program),
            }
        }
    }

    let status = child.wait().await?;
    Ok((ports, status))
}

/// Parse one lsof row. `None` if it has fewer than nine columns or a NAME
/// that is not `host:port`.
pub fn parse_lsof_line(line: &str) -> Option<ListeningPort> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 9 {
        return None;
    }

    let ipv6 = fields[4].eq_ignore_ascii_case("IPv6");
    let (host, port) = fields[8].rsplit_once(':')?;
    let port = port.parse::<u16>().ok()?;

    let host = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);

    let ip = match (host, ipv6) {
        ("*", false) => "0.0.0.0".to_string(),
        ("*", true) => "::".to_string(),
        (host, _) if !host.is_empty() => host.to_string(),
        _ => return None,
    };

    Some(ListeningPort {
        protocol: if ipv6 { "tcp6" } else { "tcp" }.to_string(),
        ip,
        port,
    })
}
