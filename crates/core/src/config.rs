//! Configuration management
//!
//! Configuration is read from `config.toml` in the stashcp config directory.
//! The directory can be overridden with `STASHCP_CONFIG_DIR`. A missing file
//! is not an error; defaults are used.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Environment variable overriding the config directory
pub const CONFIG_DIR_ENV: &str = "STASHCP_CONFIG_DIR";

const CONFIG_FILE: &str = "config.toml";

/// Default ordered method list
pub const DEFAULT_METHODS: &[&str] = &["cvmfs", "xrootd", "http"];

/// Telemetry collector settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Whether to send transfer records at all
    pub enabled: bool,

    /// Collector URL receiving the JSON POST
    pub endpoint: String,

    /// Hard bound on how long a send may be awaited
    pub timeout_secs: u64,
}

impl TelemetryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: "http://collector.atlas-ml.org:9951".to_string(),
            timeout_secs: 5,
        }
    }
}

/// Client configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Methods to try, in order
    pub methods: Vec<String>,

    /// Explicit token file, bypassing discovery
    pub token: Option<PathBuf>,

    /// Caches to use instead of those advertised by the namespace
    pub caches: Vec<String>,

    /// Where to fetch the namespace map from
    pub namespaces_url: String,

    /// Local namespace map, used instead of `namespaces_url` when set
    pub namespaces_file: Option<PathBuf>,

    /// Root of the CVMFS mount holding the federation
    pub cvmfs_root: PathBuf,

    /// XRootD copy client
    pub xrdcp: String,

    pub telemetry: TelemetryConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            methods: DEFAULT_METHODS.iter().map(|m| m.to_string()).collect(),
            token: None,
            caches: Vec::new(),
            namespaces_url: "https://topology.opensciencegrid.org/stashcache/namespaces.json"
                .to_string(),
            namespaces_file: None,
            cvmfs_root: PathBuf::from("/cvmfs/stash.osgstorage.org"),
            xrdcp: "xrdcp".to_string(),
            telemetry: TelemetryConfig::default(),
        }
    }
}

/// Loads and saves [`Config`]
#[derive(Debug, Clone)]
pub struct ConfigManager {
    path: PathBuf,
}

impl ConfigManager {
    /// Manager for the default config location
    pub fn new() -> Result<Self> {
        let dir = match std::env::var_os(CONFIG_DIR_ENV) {
            Some(dir) => PathBuf::from(dir),
            None => dirs::config_dir()
                .ok_or_else(|| Error::Config("Could not determine config directory".to_string()))?
                .join("stashcp"),
        };
        Ok(Self::with_dir(dir))
    }

    /// Manager rooted at a specific directory
    pub fn with_dir(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(CONFIG_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load configuration, falling back to defaults when the file is absent
    pub fn load(&self) -> Result<Config> {
        if !self.path.exists() {
            tracing::debug!(path = %self.path.display(), "No config file, using defaults");
            return Ok(Config::default());
        }

        let contents = std::fs::read_to_string(&self.path)?;
        toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("{}: {e}", self.path.display())))
    }

    /// Write configuration, creating the directory if needed
    pub fn save(&self, config: &Config) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(config)
            .map_err(|e| Error::Serialization(e.to_string()))?;
        std::fs::write(&self.path, contents)?;
        Ok(())
    }
}
