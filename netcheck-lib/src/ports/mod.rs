//! Remote port probing and local listener enumeration.
//!
//! Listing the sockets bound on this host is platform specific. Linux exposes
//! the kernel socket tables under `/proc`; other Unix systems are asked
//! through `lsof`. [`PlatformEnumerator::detect`] is the one place where that
//! choice is made.

use crate::error::NetCheckError;
use crate::types::{ListeningPort, NetCheckConfig};
use std::future::Future;
use tracing::debug;

/// `/proc/net/tcp{,6}` reader
pub mod kernel;

/// `lsof` output reader
pub mod lsof;

/// TCP connect probe
pub mod remote;

pub use kernel::KernelTableEnumerator;
pub use lsof::ListingCommandEnumerator;
pub use remote::probe;

/// A source of the sockets currently listening on this host.
///
/// Zero listeners is an empty vector, not an error.
pub trait ListenerEnumerator: Send + Sync {
    fn enumerate(&self) -> impl Future<Output = Result<Vec<ListeningPort>, NetCheckError>> + Send;
}

/// The enumeration strategy for the platform this was built for.
#[derive(Debug, Clone)]
pub enum PlatformEnumerator {
    KernelTable(KernelTableEnumerator),
    ListingCommand(ListingCommandEnumerator),
}

impl PlatformEnumerator {
    /// Kernel tables on Linux, `lsof` elsewhere.
    pub fn detect(config: &NetCheckConfig) -> Self {
        if cfg!(target_os = "linux") {
            Self::KernelTable(KernelTableEnumerator::new())
        } else {
            Self::ListingCommand(ListingCommandEnumerator::new(config.command_timeout))
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::KernelTable(_) => "kernel socket table",
            Self::ListingCommand(_) => "lsof",
        }
    }
}

impl ListenerEnumerator for PlatformEnumerator {
    async fn enumerate(&self) -> Result<Vec<ListeningPort>, NetCheckError> {
        debug!(strategy = self.name(), "Enumerating listening sockets");

        match self {
            Self::KernelTable(inner) => inner.enumerate().await,
            Self::ListingCommand(inner) => inner.enumerate().await,
        }
    }
}

/// List the listening sockets using the platform's strategy.
pub async fn local_listeners(config: &NetCheckConfig) -> Result<Vec<ListeningPort>, NetCheckError> {
    PlatformEnumerator::detect(config).enumerate().await
}
