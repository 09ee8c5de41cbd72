//! Configuration file parsing and management.
//!
//! This module handles loading configuration from TOML files and
//! `NETCHECK_*` environment variables, and layering them over the built-in
//! defaults with proper precedence rules.

use crate::error::NetCheckError;
use crate::types::{LookupMethod, NetCheckConfig};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Configuration loaded from TOML files.
///
/// ```toml
/// [defaults]
/// timeout = "5s"
/// method = "auto"
///
/// [cache]
/// dir = "/var/cache/netcheck"
/// max_age = "720h"
///
/// [whois]
/// iana_server = "whois.iana.org"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FileConfig {
    /// Default values for CLI options
    #[serde(skip_serializing_if = "Option::is_none")]
    pub defaults: Option<DefaultsConfig>,

    /// RDAP bootstrap cache settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache: Option<CacheConfig>,

    /// WHOIS settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub whois: Option<WhoisConfig>,
}

/// Default configuration values that map to CLI options.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DefaultsConfig {
    /// Network timeout (as string, e.g., "5s", "2m")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,

    /// Lookup method: "auto", "rdap" or "whois"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CacheConfig {
    /// Directory holding the bootstrap cache file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,

    /// Refresh age (e.g., "720h")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_age: Option<String>,

    /// Alternative bootstrap document location
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bootstrap_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WhoisConfig {
    /// Root server asked for TLD referrals
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iana_server: Option<String>,
}

impl FileConfig {
    /// Apply every value this file sets onto `config`.
    ///
    /// Values are validated on load, so anything unparsable here is skipped.
    pub fn apply_to(&self, config: &mut NetCheckConfig) {
        if let Some(defaults) = &self.defaults {
            if let Some(timeout) = defaults.timeout.as_deref().and_then(parse_duration_string) {
                config.timeout = timeout;
            }
            if let Some(method) = defaults.method.as_deref().and_then(LookupMethod::parse) {
                config.lookup_method = method;
            }
        }

        if let Some(cache) = &self.cache {
            if let Some(dir) = &cache.dir {
                config.cache_dir = Some(dir.clone());
            }
            if let Some(max_age) = cache.max_age.as_deref().and_then(parse_duration_string) {
                config.cache_max_age = max_age;
            }
            if let Some(url) = &cache.bootstrap_url {
                config.bootstrap_url = url.clone();
            }
        }

        if let Some(server) = self.whois.as_ref().and_then(|w| w.iana_server.as_ref()) {
            config.iana_whois_server = server.clone();
        }
    }
}

/// Configuration discovery and loading functionality.
pub struct ConfigManager {
    /// Directory searched for `netcheck.toml` / `.netcheck.toml`
    local_dir: PathBuf,
    home_dir: Option<PathBuf>,
    xdg_config_dir: Option<PathBuf>,
}

impl ConfigManager {
    /// Create a configuration manager searching the current directory, `$HOME`
    /// and `$XDG_CONFIG_HOME` (or `~/.config`).
    pub fn new() -> Self {
        let home_dir = env::var_os("HOME").map(PathBuf::from);
        let xdg_config_dir = env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| home_dir.as_ref().map(|home| home.join(".config")));

        Self::with_roots(".", home_dir, xdg_config_dir)
    }

    /// Create a configuration manager with explicit search roots.
    pub fn with_roots<P: Into<PathBuf>>(
        local_dir: P,
        home_dir: Option<PathBuf>,
        xdg_config_dir: Option<PathBuf>,
    ) -> Self {
        Self {
            local_dir: local_dir.into(),
            home_dir,
            xdg_config_dir,
        }
    }

    /// Load configuration from a specific file.
    ///
    /// # Errors
    ///
    /// `FileError` if the file is missing or unreadable, `ConfigError` if it
    /// is not valid TOML or fails validation.
    pub fn load_file<P: AsRef<Path>>(&self, path: P) -> Result<FileConfig, NetCheckError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(NetCheckError::file_error(
                path.to_string_lossy(),
                "Configuration file not found",
            ));
        }

        let content = fs::read_to_string(path).map_err(|e| {
            NetCheckError::file_error(
                path.to_string_lossy(),
                format!("Failed to read configuration file: {}", e),
            )
        })?;

        let config: FileConfig = toml::from_str(&content).map_err(|e| {
            NetCheckError::config(format!(
                "Failed to parse TOML configuration {}: {}",
                path.display(),
                e
            ))
        })?;

        self.validate_config(&config)?;

        Ok(config)
    }

    /// Discover and load configuration files in precedence order.
    ///
    /// A file that fails to parse or validate is an error rather than being
    /// skipped silently.
    pub fn discover_and_load(&self) -> Result<FileConfig, NetCheckError> {
        let mut merged_config = FileConfig::default();
        let mut loaded_files = Vec::new();

        // Lowest precedence first
        let candidates = [
            self.xdg_config_path(),
            self.global_config_path(),
            self.local_config_path(),
        ];

        for path in candidates.into_iter().flatten() {
            let config = self.load_file(&path)?;
            merged_config = self.merge_configs(merged_config, config);
            loaded_files.push(path);
        }

        if loaded_files.len() > 1 {
            info!(
                files = ?loaded_files,
                "Multiple config files found, later files take precedence"
            );
        } else if let Some(path) = loaded_files.first() {
            debug!(path = %path.display(), "Loaded config file");
        }

        Ok(merged_config)
    }

    fn local_config_path(&self) -> Option<PathBuf> {
        ["netcheck.toml", ".netcheck.toml"]
            .iter()
            .map(|name| self.local_dir.join(name))
            .find(|path| path.exists())
    }

    fn global_config_path(&self) -> Option<PathBuf> {
        let home = self.home_dir.as_ref()?;
        [".netcheck.toml", "netcheck.toml"]
            .iter()
            .map(|name| home.join(name))
            .find(|path| path.exists())
    }

    fn xdg_config_path(&self) -> Option<PathBuf> {
        let path = self.xdg_config_dir.as_ref()?.join("netcheck").join("config.toml");
        path.exists().then_some(path)
    }

    /// Merge two configurations with proper precedence.
    ///
    /// Values from `higher` take precedence over values from `lower`.
    fn merge_configs(&self, lower: FileConfig, higher: FileConfig) -> FileConfig {
        FileConfig {
            defaults: match (lower.defaults, higher.defaults) {
                (Some(lower_defaults), Some(higher_defaults)) => Some(DefaultsConfig {
                    timeout: higher_defaults.timeout.or(lower_defaults.timeout),
                    method: higher_defaults.method.or(lower_defaults.method),
                }),
                (lower_defaults, higher_defaults) => higher_defaults.or(lower_defaults),
            },
            cache: match (lower.cache, higher.cache) {
                (Some(lower_cache), Some(higher_cache)) => Some(CacheConfig {
                    dir: higher_cache.dir.or(lower_cache.dir),
                    max_age: higher_cache.max_age.or(lower_cache.max_age),
                    bootstrap_url: higher_cache.bootstrap_url.or(lower_cache.bootstrap_url),
                }),
                (lower_cache, higher_cache) => higher_cache.or(lower_cache),
            },
            whois: match (lower.whois, higher.whois) {
                (Some(lower_whois), Some(higher_whois)) => Some(WhoisConfig {
                    iana_server: higher_whois.iana_server.or(lower_whois.iana_server),
                }),
                (lower_whois, higher_whois) => higher_whois.or(lower_whois),
            },
        }
    }

    /// Validate a configuration for common issues.
    fn validate_config(&self, config: &FileConfig) -> Result<(), NetCheckError> {
        if let Some(defaults) = &config.defaults {
            if let Some(timeout_str) = &defaults.timeout {
                match parse_duration_string(timeout_str) {
                    Some(timeout) if !timeout.is_zero() => {}
                    Some(_) => {
                        return Err(NetCheckError::config("Timeout must be greater than zero"))
                    }
                    None => {
                        return Err(NetCheckError::config(format!(
                            "Invalid timeout format '{}'. Use format like '5s', '30s', '2m'",
                            timeout_str
                        )))
                    }
                }
            }

            if let Some(method) = &defaults.method {
                if LookupMethod::parse(method).is_none() {
                    return Err(NetCheckError::config(format!(
                        "Unknown lookup method '{}'. Use auto, rdap or whois",
                        method
                    )));
                }
            }
        }

        if let Some(cache) = &config.cache {
            if let Some(max_age) = &cache.max_age {
                if parse_duration_string(max_age).is_none() {
                    return Err(NetCheckError::config(format!(
                        "Invalid cache max_age '{}'. Use format like '12h', '720h'",
                        max_age
                    )));
                }
            }

            if cache.bootstrap_url.as_deref().is_some_and(|url| url.trim().is_empty()) {
                return Err(NetCheckError::config("Bootstrap URL cannot be empty"));
            }
        }

        if let Some(server) = config.whois.as_ref().and_then(|w| w.iana_server.as_deref()) {
            if server.trim().is_empty() {
                return Err(NetCheckError::config("WHOIS iana_server cannot be empty"));
            }
        }

        Ok(())
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Environment variable configuration.
///
/// This represents configuration values that can be set via NETCHECK_*
/// environment variables.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnvConfig {
    pub timeout: Option<Duration>,
    pub method: Option<LookupMethod>,
    pub cache_dir: Option<PathBuf>,
    pub cache_max_age: Option<Duration>,
    /// Config file to use instead of discovery
    pub config: Option<PathBuf>,
}

impl EnvConfig {
    pub fn apply_to(&self, config: &mut NetCheckConfig) {
        if let Some(timeout) = self.timeout {
            config.timeout = timeout;
        }
        if let Some(method) = self.method {
            config.lookup_method = method;
        }
        if let Some(dir) = &self.cache_dir {
            config.cache_dir = Some(dir.clone());
        }
        if let Some(max_age) = self.cache_max_age {
            config.cache_max_age = max_age;
        }
    }
}

/// Load configuration from environment variables.
///
/// Invalid values are logged as warnings and ignored.
pub fn load_env_config() -> EnvConfig {
    env_config_from(|key| env::var(key).ok())
}

/// Build an `EnvConfig` from any variable lookup.
pub fn env_config_from<F>(lookup: F) -> EnvConfig
where
    F: Fn(&str) -> Option<String>,
{
    let mut env_config = EnvConfig::default();

    // NETCHECK_TIMEOUT - network timeout
    if let Some(val) = lookup("NETCHECK_TIMEOUT") {
        match parse_duration_string(&val) {
            Some(timeout) if !timeout.is_zero() => {
                info!("Using NETCHECK_TIMEOUT={}", val);
                env_config.timeout = Some(timeout);
            }
            _ => warn!("Invalid NETCHECK_TIMEOUT='{}', use format like '5s', '30s', '2m'", val),
        }
    }

    // NETCHECK_METHOD - lookup method
    if let Some(val) = lookup("NETCHECK_METHOD") {
        match LookupMethod::parse(&val) {
            Some(method) => {
                info!("Using NETCHECK_METHOD={}", val);
                env_config.method = Some(method);
            }
            None => warn!("Invalid NETCHECK_METHOD='{}', use auto, rdap or whois", val),
        }
    }

    // NETCHECK_CACHE_DIR - bootstrap cache directory
    if let Some(val) = lookup("NETCHECK_CACHE_DIR") {
        if !val.trim().is_empty() {
            info!("Using NETCHECK_CACHE_DIR={}", val);
            env_config.cache_dir = Some(PathBuf::from(val));
        }
    }

    // NETCHECK_CACHE_MAX_AGE - bootstrap cache refresh age
    if let Some(val) = lookup("NETCHECK_CACHE_MAX_AGE") {
        match parse_duration_string(&val) {
            Some(max_age) => {
                info!("Using NETCHECK_CACHE_MAX_AGE={}", val);
                env_config.cache_max_age = Some(max_age);
            }
            None => warn!(
                "Invalid NETCHECK_CACHE_MAX_AGE='{}', use format like '12h', '720h'",
                val
            ),
        }
    }

    // NETCHECK_CONFIG - config file
    if let Some(val) = lookup("NETCHECK_CONFIG") {
        if !val.trim().is_empty() {
            info!("Using NETCHECK_CONFIG={}", val);
            env_config.config = Some(PathBuf::from(val));
        }
    }

    env_config
}

/// Build the runtime configuration from defaults, config files and the
/// environment.
///
/// `explicit_file` (from `--config`) wins over `NETCHECK_CONFIG`; either one
/// replaces file discovery entirely.
pub fn load_config(explicit_file: Option<&Path>) -> Result<NetCheckConfig, NetCheckError> {
    let manager = ConfigManager::new();
    let env_config = load_env_config();

    let file_config = match explicit_file.or(env_config.config.as_deref()) {
        Some(path) => manager.load_file(path)?,
        None => manager.discover_and_load()?,
    };

    let mut config = NetCheckConfig::default();
    file_config.apply_to(&mut config);
    env_config.apply_to(&mut config);

    Ok(config)
}

/// Parse a duration string like "5s", "2m", "720h" or bare seconds.
pub fn parse_duration_string(value: &str) -> Option<Duration> {
    let value = value.trim().to_lowercase();

    let (number, multiplier) = if let Some(n) = value.strip_suffix('s') {
        (n, 1)
    } else if let Some(n) = value.strip_suffix('m') {
        (n, 60)
    } else if let Some(n) = value.strip_suffix('h') {
        (n, 3600)
    } else {
        // Assume seconds if no unit
        (value.as_str(), 1)
    };

    number
        .trim()
        .parse::<u64>()
        .ok()
        .and_then(|n| n.checked_mul(multiplier))
        .map(Duration::from_secs)
}
