//! IANA RDAP bootstrap registry and its on-disk cache.
//!
//! The bootstrap document maps sets of TLDs to RDAP base URLs. It is flattened
//! into a TLD -> URL map and persisted as a flat JSON object so repeated
//! lookups do not touch the network until the file goes stale.
//!
//! Lookup flow:
//! 1. Cache file missing or older than the max age: fetch the document,
//!    flatten it, atomically rewrite the file and use the fresh map
//! 2. Otherwise read the cache file
//! 3. Look the TLD up; unmapped TLDs are "not supported", not an error

use crate::error::NetCheckError;
use crate::types::NetCheckConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// File name of the persisted registry map inside the cache directory.
pub const CACHE_FILE_NAME: &str = "rdap_bootstrap.json";

/// Raw IANA bootstrap document.
///
/// Each service entry is `[[tld, ...], [url, ...]]`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct BootstrapDocument {
    pub services: Vec<Vec<Vec<String>>>,
}

impl BootstrapDocument {
    /// Parse a bootstrap document from its JSON body.
    pub fn from_slice(body: &[u8]) -> Result<Self, NetCheckError> {
        serde_json::from_slice(body).map_err(|e| {
            NetCheckError::registry_unavailable(format!("Invalid bootstrap JSON: {}", e))
        })
    }

    /// Flatten the service entries so every TLD maps to the first URL of its
    /// entry. Entries without any URL are skipped.
    pub fn into_registry_map(self) -> RegistryMap {
        let mut endpoints = HashMap::new();

        for entry in self.services {
            let (Some(tlds), Some(urls)) = (entry.first(), entry.get(1)) else {
                continue;
            };
            let Some(url) = urls.first() else {
                continue;
            };

            for tld in tlds {
                endpoints.insert(tld.to_lowercase(), url.clone());
            }
        }

        RegistryMap(endpoints)
    }
}

/// Flattened TLD -> RDAP base URL map.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(transparent)]
pub struct RegistryMap(HashMap<String, String>);

impl RegistryMap {
    /// Look up the RDAP base URL for a TLD (case-insensitive).
    pub fn get(&self, tld: &str) -> Option<&str> {
        self.0.get(&tld.to_lowercase()).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Result of resolving a TLD against the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RdapEndpoint {
    /// The TLD is served by RDAP at this base URL
    Supported(String),
    /// The TLD has no RDAP service
    NotSupported,
}

/// Something that can produce a fresh bootstrap document.
pub trait BootstrapSource: Send + Sync {
    fn fetch(&self) -> impl Future<Output = Result<BootstrapDocument, NetCheckError>> + Send;
}

/// Fetches the bootstrap document from IANA over HTTPS.
#[derive(Clone)]
pub struct IanaBootstrap {
    http_client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl IanaBootstrap {
    pub fn new<U: Into<String>>(url: U, timeout: Duration) -> Result<Self, NetCheckError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                NetCheckError::network_with_source("Failed to create HTTP client", e.to_string())
            })?;

        Ok(Self {
            http_client,
            url: url.into(),
            timeout,
        })
    }
}

impl BootstrapSource for IanaBootstrap {
    async fn fetch(&self) -> Result<BootstrapDocument, NetCheckError> {
        debug!(url = %self.url, "Fetching RDAP bootstrap registry");

        let response = self.http_client.get(&self.url).send().await.map_err(|e| {
            if e.is_timeout() {
                NetCheckError::registry_unavailable(format!(
                    "Bootstrap fetch timed out after {:?}",
                    self.timeout
                ))
            } else {
                NetCheckError::registry_unavailable(format!(
                    "Failed to fetch bootstrap registry: {}",
                    e
                ))
            }
        })?;

        let status = response.status();
        let body = response.bytes().await.map_err(|e| {
            NetCheckError::registry_unavailable(format!("Failed to read bootstrap registry: {}", e))
        })?;

        if !status.is_success() {
            return Err(NetCheckError::registry_unavailable(format!(
                "Bootstrap registry returned HTTP {}: {}",
                status,
                String::from_utf8_lossy(&body)
            )));
        }

        BootstrapDocument::from_slice(&body)
    }
}

/// On-disk cache of the flattened bootstrap registry.
pub struct RegistryCache<S = IanaBootstrap> {
    source: S,
    cache_path: PathBuf,
    max_age: Duration,
}

impl RegistryCache<IanaBootstrap> {
    /// Build a cache backed by IANA, stored in the configured (or default)
    /// cache directory.
    pub fn from_config(config: &NetCheckConfig) -> Result<Self, NetCheckError> {
        let dir = match &config.cache_dir {
            Some(dir) => dir.clone(),
            None => default_cache_dir()?,
        };
        let source = IanaBootstrap::new(config.bootstrap_url.clone(), config.timeout)?;

        Ok(Self::with_source(source, dir.join(CACHE_FILE_NAME), config.cache_max_age))
    }
}

impl<S: BootstrapSource> RegistryCache<S> {
    pub fn with_source(source: S, cache_path: PathBuf, max_age: Duration) -> Self {
        Self {
            source,
            cache_path,
            max_age,
        }
    }

    pub fn cache_path(&self) -> &Path {
        &self.cache_path
    }

    /// Resolve a TLD to its RDAP base URL.
    ///
    /// # Errors
    ///
    /// Any failure to obtain the registry, a timed-out fetch included, is
    /// `RegistryUnavailable`. An unreadable cache file is `RegistryCorrupt`.
    pub async fn resolve(&self, tld: &str) -> Result<RdapEndpoint, NetCheckError> {
        let map = self.load().await?;

        Ok(match map.get(tld) {
            Some(url) => RdapEndpoint::Supported(url.to_string()),
            None => RdapEndpoint::NotSupported,
        })
    }

    /// Load the registry map, refreshing the cache file when it is missing or
    /// stale.
    pub async fn load(&self) -> Result<RegistryMap, NetCheckError> {
        if self.needs_refresh()? {
            return self.refresh().await;
        }

        debug!(path = %self.cache_path.display(), "Using cached RDAP bootstrap registry");
        self.read_cache_file()
    }

    /// Fetch a fresh document and rewrite the cache file.
    pub async fn refresh(&self) -> Result<RegistryMap, NetCheckError> {
        let document = self.source.fetch().await?;
        let map = document.into_registry_map();

        self.write_cache_file(&map)?;
        info!(
            path = %self.cache_path.display(),
            tlds = map.len(),
            "Refreshed RDAP bootstrap cache"
        );

        Ok(map)
    }

    fn needs_refresh(&self) -> Result<bool, NetCheckError> {
        let metadata = match std::fs::metadata(&self.cache_path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(true),
            Err(e) => {
                return Err(NetCheckError::file_error(
                    self.cache_path.to_string_lossy(),
                    format!("Can't access cache file: {}", e),
                ))
            }
        };

        // A modification time in the future counts as fresh.
        let age = metadata
            .modified()
            .ok()
            .and_then(|modified| modified.elapsed().ok())
            .unwrap_or_default();

        Ok(age > self.max_age)
    }

    fn read_cache_file(&self) -> Result<RegistryMap, NetCheckError> {
        let data = std::fs::read(&self.cache_path).map_err(|e| {
            NetCheckError::file_error(
                self.cache_path.to_string_lossy(),
                format!("Can't read cache file: {}", e),
            )
        })?;

        serde_json::from_slice(&data).map_err(|e| {
            NetCheckError::registry_corrupt(self.cache_path.to_string_lossy(), e.to_string())
        })
    }

    /// Write the map next to the target and rename it into place, so readers
    /// never observe a partially written file.
    fn write_cache_file(&self, map: &RegistryMap) -> Result<(), NetCheckError> {
        let dir = self
            .cache_path
            .parent()
            .ok_or_else(|| NetCheckError::internal("Cache path has no parent directory"))?;
        create_private_dir(dir)?;

        let file_error = |e: std::io::Error| {
            NetCheckError::file_error(
                self.cache_path.to_string_lossy(),
                format!("Can't write cache file: {}", e),
            )
        };

        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(file_error)?;
        serde_json::to_writer(&mut tmp, map)?;
        tmp.write_all(b"\n").map_err(file_error)?;
        tmp.as_file().sync_all().map_err(file_error)?;
        tmp.persist(&self.cache_path).map_err(|e| file_error(e.error))?;

        Ok(())
    }
}

/// `<user config dir>/netcheck`
pub fn default_cache_dir() -> Result<PathBuf, NetCheckError> {
    directories::BaseDirs::new()
        .map(|dirs| dirs.config_dir().join("netcheck"))
        .ok_or_else(|| {
            NetCheckError::config("Unable to determine the user configuration directory")
        })
}

/// Create `dir` (and parents) readable and writable by the owner only.
fn create_private_dir(dir: &Path) -> Result<(), NetCheckError> {
    let mut builder = std::fs::DirBuilder::new();
    builder.recursive(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }

    builder.create(dir).map_err(|e| {
        NetCheckError::file_error(
            dir.to_string_lossy(),
            format!("Error creating directory: {}", e),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DEFAULT_CACHE_MAX_AGE;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::SystemTime;

    /// Serves a fixed document and counts how often it was asked.
    struct StaticSource {
        document: BootstrapDocument,
        calls: Arc<AtomicUsize>,
    }

    impl BootstrapSource for StaticSource {
        async fn fetch(&self) -> Result<BootstrapDocument, NetCheckError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.document.clone())
        }
    }

    struct FailingSource;

    impl BootstrapSource for FailingSource {
        async fn fetch(&self) -> Result<BootstrapDocument, NetCheckError> {
            Err(NetCheckError::registry_unavailable("offline"))
        }
    }

    fn example_document() -> BootstrapDocument {
        BootstrapDocument::from_slice(
            br#"{
                "description": "RDAP bootstrap file for Domain Name System registrations",
                "publication": "2026-01-01T00:00:00Z",
                "services": [
                    [["com", "net"], ["https://rdap.example/"]],
                    [["ORG"], ["https://rdap.org.example/", "http://rdap.org.example/"]],
                    [["empty"], []]
                ],
                "version": "1.0"
            }"#,
        )
        .unwrap()
    }

    fn cache_with_counter(dir: &Path) -> (RegistryCache<StaticSource>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let source = StaticSource {
            document: example_document(),
            calls: calls.clone(),
        };
        let cache = RegistryCache::with_source(
            source,
            dir.join("netcheck").join(CACHE_FILE_NAME),
            DEFAULT_CACHE_MAX_AGE,
        );
        (cache, calls)
    }

    #[test]
    fn test_flatten_maps_every_tld_to_first_url() {
        let map = example_document().into_registry_map();

        assert_eq!(map.get("com"), Some("https://rdap.example/"));
        assert_eq!(map.get("net"), Some("https://rdap.example/"));
        assert_eq!(map.get("org"), Some("https://rdap.org.example/"));
        assert_eq!(map.get("zzz"), None);
        assert_eq!(map.get("empty"), None);
        assert_eq!(map.len(), 3);
    }

    #[test]
    fn test_document_without_services_is_unavailable() {
        let err = BootstrapDocument::from_slice(br#"{"version": "1.0"}"#).unwrap_err();
        assert!(matches!(err, NetCheckError::RegistryUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_cold_start_fetches_and_persists_flat_map() {
        let dir = tempfile::tempdir().unwrap();
        let (cache, calls) = cache_with_counter(dir.path());

        assert_eq!(
            cache.resolve("com").await.unwrap(),
            RdapEndpoint::Supported("https://rdap.example/".to_string())
        );
        assert_eq!(
            cache.resolve("net").await.unwrap(),
            RdapEndpoint::Supported("https://rdap.example/".to_string())
        );
        assert_eq!(cache.resolve("zzz").await.unwrap(), RdapEndpoint::NotSupported);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let persisted: HashMap<String, String> =
            serde_json::from_slice(&std::fs::read(cache.cache_path()).unwrap()).unwrap();
        assert_eq!(persisted.get("com").map(String::as_str), Some("https://rdap.example/"));
        assert_eq!(persisted.len(), 3);
    }

    #[tokio::test]
    async fn test_fresh_cache_does_not_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let (cache, calls) = cache_with_counter(dir.path());

        std::fs::create_dir_all(cache.cache_path().parent().unwrap()).unwrap();
        std::fs::write(cache.cache_path(), r#"{"dev": "https://rdap.dev.example/"}"#).unwrap();

        assert_eq!(
            cache.resolve("dev").await.unwrap(),
            RdapEndpoint::Supported("https://rdap.dev.example/".to_string())
        );
        assert_eq!(cache.resolve("com").await.unwrap(), RdapEndpoint::NotSupported);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_stale_cache_is_refetched() {
        let dir = tempfile::tempdir().unwrap();
        let (cache, calls) = cache_with_counter(dir.path());

        std::fs::create_dir_all(cache.cache_path().parent().unwrap()).unwrap();
        std::fs::write(cache.cache_path(), r#"{"dev": "https://rdap.dev.example/"}"#).unwrap();
        let old = SystemTime::now() - Duration::from_secs(721 * 3600);
        std::fs::File::options()
            .write(true)
            .open(cache.cache_path())
            .unwrap()
            .set_modified(old)
            .unwrap();

        assert_eq!(
            cache.resolve("com").await.unwrap(),
            RdapEndpoint::Supported("https://rdap.example/".to_string())
        );
        assert_eq!(cache.resolve("dev").await.unwrap(), RdapEndpoint::NotSupported);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_corrupt_cache_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let (cache, _) = cache_with_counter(dir.path());

        std::fs::create_dir_all(cache.cache_path().parent().unwrap()).unwrap();
        std::fs::write(cache.cache_path(), "{ not json").unwrap();

        let err = cache.resolve("com").await.unwrap_err();
        assert!(matches!(err, NetCheckError::RegistryCorrupt { .. }));
    }

    #[tokio::test]
    async fn test_fetch_failure_leaves_no_cache_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CACHE_FILE_NAME);
        let cache = RegistryCache::with_source(FailingSource, path.clone(), DEFAULT_CACHE_MAX_AGE);

        let err = cache.resolve("com").await.unwrap_err();
        assert!(matches!(err, NetCheckError::RegistryUnavailable { .. }));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_iana_fetch_timeout_is_unavailable() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/rdap/dns.json", listener.local_addr().unwrap());
        // Accept and hold the connection without ever answering.
        let _server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(10)).await;
            drop(socket);
        });

        let source = IanaBootstrap::new(url, Duration::from_millis(200)).unwrap();
        let err = source.fetch().await.unwrap_err();
        match err {
            NetCheckError::RegistryUnavailable { message } => {
                assert!(message.contains("timed out"))
            }
            other => panic!("expected RegistryUnavailable, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_iana_error_status_is_unavailable() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/rdap/dns.json", listener.local_addr().unwrap());
        let _server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf).await;
            let response: &[u8] = b"HTTP/1.1 503 Service Unavailable\r\n\
                Content-Length: 4\r\nConnection: close\r\n\r\nbusy";
            socket.write_all(response).await.unwrap();
        });

        let source = IanaBootstrap::new(url, Duration::from_secs(2)).unwrap();
        let err = source.fetch().await.unwrap_err();
        match err {
            NetCheckError::RegistryUnavailable { message } => assert!(message.contains("503")),
            other => panic!("expected RegistryUnavailable, got {:?}", other),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_cache_dir_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let (cache, _) = cache_with_counter(dir.path());
        cache.load().await.unwrap();

        let mode = std::fs::metadata(cache.cache_path().parent().unwrap())
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o700);
    }
}
