//! Listening sockets from the Linux kernel socket tables.
//!
//! `/proc/net/tcp` and `/proc/net/tcp6` have one row per socket after a
//! header line. The second column is `HEX_IP:HEX_PORT`; the fourth is the
//! socket state, where `0A` means LISTEN.

use super::ListenerEnumerator;
use crate::error::NetCheckError;
use crate::types::ListeningPort;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const TCP_LISTEN: &str = "0A";

/// Reads `/proc/net/tcp` and `/proc/net/tcp6`.
#[derive(Debug, Clone)]
pub struct KernelTableEnumerator {
    tcp4_path: PathBuf,
    tcp6_path: PathBuf,
}

impl KernelTableEnumerator {
    pub fn new() -> Self {
        Self::with_paths("/proc/net/tcp", "/proc/net/tcp6")
    }

    /// Read the tables from other locations.
    pub fn with_paths<P: Into<PathBuf>, Q: Into<PathBuf>>(tcp4: P, tcp6: Q) -> Self {
        Self {
            tcp4_path: tcp4.into(),
            tcp6_path: tcp6.into(),
        }
    }

    async fn read_table(path: &Path) -> Result<Option<String>, NetCheckError> {
        match tokio::fs::read_to_string(path).await {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(NetCheckError::file_error(path.to_string_lossy(), e.to_string())),
        }
    }
}

impl Default for KernelTableEnumerator {
    fn default() -> Self {
        Self::new()
    }
}

impl ListenerEnumerator for KernelTableEnumerator {
    async fn enumerate(&self) -> Result<Vec<ListeningPort>, NetCheckError> {
        let tcp4 = Self::read_table(&self.tcp4_path).await?.ok_or_else(|| {
            NetCheckError::file_error(
                self.tcp4_path.to_string_lossy(),
                "kernel TCP table not found",
            )
        })?;
        let mut ports = parse_table(&tcp4, "tcp");

        // Kernels built without IPv6 have no tcp6 table.
        match Self::read_table(&self.tcp6_path).await? {
            Some(tcp6) => ports.extend(parse_table(&tcp6, "tcp6")),
            None => debug!(path = %self.tcp6_path.display(), "No IPv6 socket table"),
        }

        Ok(ports)
    }
}

/// Extract the listening sockets from one kernel table.
pub fn parse_table(contents: &str, protocol: &str) -> Vec<ListeningPort> {
    contents
        .lines()
        .skip(1)
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 4 || fields[3] != TCP_LISTEN {
                return None;
            }

            let parsed = parse_local_address(fields[1]);
            if parsed.is_none() {
                warn!(row = %line.trim(), "Skipping malformed kernel table row");
            }
            parsed.map(|(ip, port)| ListeningPort {
                protocol: protocol.to_string(),
                ip,
                port,
            })
        })
        .collect()
}

fn parse_local_address(field: &str) -> Option<(String, u16)> {
    let (hex_ip, hex_port) = field.split_once(':')?;
    let port = u16::from_str_radix(hex_port, 16).ok()?;

    let ip = match hex_ip.len() {
        8 => decode_ipv4(hex_ip)?.to_string(),
        32 => decode_ipv6(hex_ip)?.to_string(),
        _ => return None,
    };

    Some((ip, port))
}

/// Decode an address stored as one little-endian 32-bit word.
pub fn decode_ipv4(hex: &str) -> Option<Ipv4Addr> {
    if hex.len() != 8 {
        return None;
    }
    let word = u32::from_str_radix(hex, 16).ok()?;
    Some(Ipv4Addr::from(word.to_le_bytes()))
}

/// Decode an address stored as four little-endian 32-bit words.
pub fn decode_ipv6(hex: &str) -> Option<Ipv6Addr> {
    if hex.len() != 32 || !hex.is_ascii() {
        return None;
    }

    let mut octets = [0u8; 16];
    for (i, chunk) in octets.chunks_exact_mut(4).enumerate() {
        let word = u32::from_str_radix(&hex[i * 8..(i + 1) * 8], 16).ok()?;
        chunk.copy_from_slice(&word.to_le_bytes());
    }

    Some(Ipv6Addr::from(octets))
}
