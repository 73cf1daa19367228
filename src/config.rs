use anyhow::{anyhow, Result};
use config::Config;
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

/// ASN reported for routes whose origin or next-hop AS is unknown
pub const DEFAULT_ASN: u32 = 3701;

/// Community that marks a route as learned from a customer
pub const DEFAULT_CUSTOMER_COMMUNITY: &str = "3701:370";

#[derive(Debug, Clone, PartialEq)]
pub struct PeriscopeConfig {
    /// Path to the directory to hold periscope's data
    pub data_dir: String,

    /// Explicit route database path; defaults to `{data_dir}/periscope-routes.sqlite3`
    pub database_path: Option<String>,

    /// ASN substituted for absent origin/next-hop ASNs
    pub default_asn: u32,

    /// Community string marking customer routes
    pub customer_community: String,

    /// Period of the cheap statistics refresh in seconds (default: 5)
    pub fast_refresh_secs: u64,

    /// Period of the expensive statistics refresh in seconds (default: 90)
    pub slow_refresh_secs: u64,

    /// Number of peers reported in the top-N list
    pub top_peers: usize,

    /// Timeout for a single DNS query in seconds
    pub dns_timeout_secs: u64,

    /// Address the HTTP API binds to
    pub address: String,

    /// Port the HTTP API listens on
    pub port: u16,
}

const EMPTY_CONFIG: &str = r#"### periscope configuration file

### directory for periscope data
# data_dir = "~/.periscope"

### route database written by the table loader (default: <data_dir>/periscope-routes.sqlite3)
# database_path = "/var/lib/periscope/routes.sqlite3"

### routing policy
# default_asn = 3701
# customer_community = "3701:370"

### statistics refresh periods (in seconds)
# fast_refresh_secs = 5
# slow_refresh_secs = 90
# top_peers = 5

### name resolution
# dns_timeout_secs = 5

### HTTP API
# address = "127.0.0.1"
# port = 8080
"#;

impl Default for PeriscopeConfig {
    fn default() -> Self {
        let home_dir = dirs::home_dir()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|| ".".to_string());

        Self {
            data_dir: format!("{}/.periscope", home_dir),
            database_path: None,
            default_asn: DEFAULT_ASN,
            customer_community: DEFAULT_CUSTOMER_COMMUNITY.to_string(),
            fast_refresh_secs: 5,
            slow_refresh_secs: 90,
            top_peers: 5,
            dns_timeout_secs: 5,
            address: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

impl PeriscopeConfig {
    /// Function to create and initialize a new configuration
    pub fn new(path: &Option<String>) -> Result<PeriscopeConfig> {
        let mut builder = Config::builder();

        let home_dir = dirs::home_dir()
            .ok_or_else(|| anyhow!("Could not find home directory"))?
            .to_str()
            .ok_or_else(|| anyhow!("Could not convert home directory path to string"))?
            .to_owned();

        let periscope_dir = format!("{}/.periscope", home_dir.as_str());

        // Add in toml configuration file
        match path {
            Some(p) => {
                let path = Path::new(p.as_str());
                if path.exists() {
                    let path_str = path
                        .to_str()
                        .ok_or_else(|| anyhow!("Could not convert path to string"))?;
                    builder = builder.add_source(config::File::with_name(path_str));
                } else {
                    std::fs::write(p.as_str(), EMPTY_CONFIG)
                        .map_err(|e| anyhow!("Unable to create config file: {}", e))?;
                }
            }
            None => {
                std::fs::create_dir_all(periscope_dir.as_str())
                    .map_err(|e| anyhow!("Unable to create periscope directory: {}", e))?;
                let p = format!("{}/periscope.toml", periscope_dir.as_str());
                if Path::new(p.as_str()).exists() {
                    builder = builder.add_source(config::File::with_name(p.as_str()));
                } else {
                    std::fs::write(p.as_str(), EMPTY_CONFIG).map_err(|e| {
                        anyhow!("Unable to create config file {}: {}", p.as_str(), e)
                    })?;
                }
            }
        }

        // Add in settings from the environment (with a prefix of PERISCOPE)
        // E.g., `PERISCOPE_DEFAULT_ASN=64496 ./periscope serve` would set the default ASN
        builder = builder.add_source(config::Environment::with_prefix("PERISCOPE"));

        let settings = builder
            .build()
            .map_err(|e| anyhow!("Failed to build configuration: {}", e))?;

        let values = settings
            .try_deserialize::<HashMap<String, String>>()
            .map_err(|e| anyhow!("Failed to deserialize configuration: {}", e))?;

        let config = Self::from_values(&values);
        std::fs::create_dir_all(config.data_dir.as_str())
            .map_err(|e| anyhow!("Unable to create data directory: {}", e))?;

        Ok(config)
    }

    /// Build a configuration from flattened key/value settings
    ///
    /// Missing or unparseable values fall back to the defaults.
    pub fn from_values(values: &HashMap<String, String>) -> PeriscopeConfig {
        let defaults = PeriscopeConfig::default();

        fn parsed<T: std::str::FromStr>(values: &HashMap<String, String>, key: &str) -> Option<T> {
            values.get(key).and_then(|s| s.trim().parse().ok())
        }

        let data_dir = match values.get("data_dir") {
            Some(dir) => expand_home(dir),
            None => defaults.data_dir,
        };

        PeriscopeConfig {
            data_dir,
            database_path: values.get("database_path").map(|p| expand_home(p)),
            default_asn: parsed(values, "default_asn").unwrap_or(defaults.default_asn),
            customer_community: values
                .get("customer_community")
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
                .unwrap_or(defaults.customer_community),
            fast_refresh_secs: parsed(values, "fast_refresh_secs")
                .filter(|s| *s > 0)
                .unwrap_or(defaults.fast_refresh_secs),
            slow_refresh_secs: parsed(values, "slow_refresh_secs")
                .filter(|s| *s > 0)
                .unwrap_or(defaults.slow_refresh_secs),
            top_peers: parsed(values, "top_peers").unwrap_or(defaults.top_peers),
            dns_timeout_secs: parsed(values, "dns_timeout_secs")
                .filter(|s| *s > 0)
                .unwrap_or(defaults.dns_timeout_secs),
            address: values
                .get("address")
                .cloned()
                .unwrap_or(defaults.address),
            port: parsed(values, "port").unwrap_or(defaults.port),
        }
    }

    /// Get the path to the route database file
    pub fn sqlite_path(&self) -> String {
        match &self.database_path {
            Some(p) => p.clone(),
            None => {
                let data_dir = self.data_dir.trim_end_matches('/');
                format!("{}/periscope-routes.sqlite3", data_dir)
            }
        }
    }

    pub fn fast_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.fast_refresh_secs)
    }

    pub fn slow_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.slow_refresh_secs)
    }

    pub fn dns_timeout(&self) -> Duration {
        Duration::from_secs(self.dns_timeout_secs)
    }

    /// Display configuration summary
    pub fn summary(&self) -> String {
        [
            format!("Data Directory:     {}", self.data_dir),
            format!("Route Database:     {}", self.sqlite_path()),
            format!("Default ASN:        {}", self.default_asn),
            format!("Customer Community: {}", self.customer_community),
            format!("Fast Refresh:       {} seconds", self.fast_refresh_secs),
            format!("Slow Refresh:       {} seconds", self.slow_refresh_secs),
            format!("Top Peers:          {}", self.top_peers),
            format!("DNS Timeout:        {} seconds", self.dns_timeout_secs),
            format!("Listen Address:     {}:{}", self.address, self.port),
        ]
        .join("\n")
    }

    /// Commented configuration file written on first run
    pub fn template() -> &'static str {
        EMPTY_CONFIG
    }

    /// Get the config file path
    pub fn config_file_path() -> String {
        let home_dir = dirs::home_dir()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|| "~".to_string());
        format!("{}/.periscope/periscope.toml", home_dir)
    }
}

fn expand_home(path: &str) -> String {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => format!("{}/{}", home.to_string_lossy(), rest),
        _ => path.to_string(),
    }
}

// =============================================================================
// Database status (used by the config command)
// =============================================================================

/// Status of the route database
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DataSourceStatus {
    /// Routes are loaded and available
    Ready,
    /// Table exists but holds no routes
    Empty,
    /// Database file is missing or unreadable
    NotInitialized,
}

impl std::fmt::Display for DataSourceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataSourceStatus::Ready => write!(f, "ready"),
            DataSourceStatus::Empty => write!(f, "empty"),
            DataSourceStatus::NotInitialized => write!(f, "not initialized"),
        }
    }
}

/// Information about the route database
#[derive(Debug, Serialize, Clone)]
pub struct RouteDatabaseInfo {
    pub path: String,
    pub exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipv4_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipv6_count: Option<u64>,
    pub status: DataSourceStatus,
}

/// Get route database information
///
/// The database is opened read-only and only when the file already exists.
#[cfg(feature = "database")]
pub fn get_database_info(config: &PeriscopeConfig) -> RouteDatabaseInfo {
    use crate::database::{IpVersion, RouteStore};

    let path = config.sqlite_path();
    let exists = Path::new(&path).exists();
    let size_bytes = if exists {
        std::fs::metadata(&path).ok().map(|m| m.len())
    } else {
        None
    };

    let mut info = RouteDatabaseInfo {
        path: path.clone(),
        exists,
        size_bytes,
        route_count: None,
        ipv4_count: None,
        ipv6_count: None,
        status: DataSourceStatus::NotInitialized,
    };

    if !exists {
        return info;
    }

    if let Ok(db) = RouteStore::new(&path).open() {
        let routes = db.routes();
        info.route_count = routes.count().ok();
        info.ipv4_count = routes.count_by_version(IpVersion::V4).ok();
        info.ipv6_count = routes.count_by_version(IpVersion::V6).ok();
        info.status = match info.route_count {
            Some(count) if count > 0 => DataSourceStatus::Ready,
            Some(_) => DataSourceStatus::Empty,
            None => DataSourceStatus::NotInitialized,
        };
    }

    info
}

/// Format bytes as human-readable size
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
