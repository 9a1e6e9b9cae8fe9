use std::fs;
use std::path::Path;
use std::time::Duration;

use msgbus_router::RouterConfig;
use serde::Deserialize;

/// On-disk shape of the daemon's configuration file, read from
/// `msgbus.router.*` / `msgbus.endpoint.*` keys. Every field is optional
/// in TOML and falls back to `RouterConfig::default()`'s value, the way
/// `reticulumd`'s `DaemonConfig` layers over per-interface defaults.
#[derive(Debug, Default, Deserialize)]
pub struct DaemonConfig {
    #[serde(default)]
    pub router: RouterSection,
}

#[derive(Debug, Default, Deserialize)]
pub struct RouterSection {
    pub id_major: Option<u32>,
    pub id_minor: Option<u32>,
    pub id_count: Option<u64>,
    pub requires_password: Option<bool>,
    pub password: Option<String>,
    pub pending_timeout_secs: Option<u64>,
    pub recently_disconnected_ttl_secs: Option<u64>,
    pub endpoint_info_timeout_secs: Option<u64>,
    pub worker_threshold: Option<usize>,
    pub blob_size_cap_bytes: Option<i64>,
}

impl DaemonConfig {
    pub fn from_toml(input: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(input)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, std::io::Error> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
            .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidData, err))
    }

    /// Layers the parsed TOML over `RouterConfig::default()`, leaving any
    /// key the file omits at its library default.
    pub fn router_config(&self) -> RouterConfig {
        let defaults = RouterConfig::default();
        let section = &self.router;
        RouterConfig {
            id_major: section.id_major.unwrap_or(defaults.id_major),
            id_minor: section.id_minor.unwrap_or(defaults.id_minor),
            id_count: section.id_count.unwrap_or(defaults.id_count),
            requires_password: section.requires_password.unwrap_or(defaults.requires_password),
            password: section.password.clone().unwrap_or(defaults.password),
            pending_timeout: section
                .pending_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.pending_timeout),
            recently_disconnected_ttl: section
                .recently_disconnected_ttl_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.recently_disconnected_ttl),
            endpoint_info_timeout: section
                .endpoint_info_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.endpoint_info_timeout),
            worker_threshold: section.worker_threshold.unwrap_or(defaults.worker_threshold),
            blob_size_cap_bytes: section.blob_size_cap_bytes.unwrap_or(defaults.blob_size_cap_bytes),
        }
    }
}
