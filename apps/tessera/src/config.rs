//! # Configuration
//!
//! Settings read from `tessera.toml`. A missing file means defaults; CLI
//! flags are applied on top with [`Config::apply_overrides`].
//!
//! ```toml
//! [store]
//! backend = "redb"          # memory | redb | ipfs
//! path = "tessera.redb"
//! ipfs_binary = "ipfs"
//!
//! [feed]
//! protocol_version = "v0"
//! optimal_recent = 20
//!
//! [server]
//! host = "127.0.0.1"
//! port = 8080
//!
//! [publish]
//! max_attempts = 3
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tessera_core::{
    FeedSettings, TesseraError,
    primitives::{DEFAULT_OPTIMAL_RECENT, PROTOCOL_VERSION},
    session::DEFAULT_PUBLISH_ATTEMPTS,
};

// =============================================================================
// BACKEND KIND
// =============================================================================

/// Which content store a command runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Volatile, gone when the process exits.
    Memory,
    /// redb database file.
    #[default]
    Redb,
    /// A local IPFS node driven through its CLI.
    Ipfs,
}

impl BackendKind {
    pub fn parse(s: &str) -> Result<Self, TesseraError> {
        match s {
            "memory" => Ok(Self::Memory),
            "redb" => Ok(Self::Redb),
            "ipfs" => Ok(Self::Ipfs),
            other => Err(TesseraError::InvalidConfig(format!(
                "unknown store backend {:?} (expected memory, redb or ipfs)",
                other
            ))),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Redb => "redb",
            Self::Ipfs => "ipfs",
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// SECTIONS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: BackendKind,

    /// Database file for the redb backend.
    #[serde(default = "default_store_path")]
    pub path: PathBuf,

    /// Program invoked for the ipfs backend.
    #[serde(default = "default_ipfs_binary")]
    pub ipfs_binary: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            path: default_store_path(),
            ipfs_binary: default_ipfs_binary(),
        }
    }
}

fn default_store_path() -> PathBuf {
    PathBuf::from("tessera.redb")
}

fn default_ipfs_binary() -> String {
    "ipfs".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FeedConfig {
    #[serde(default = "default_protocol_version")]
    pub protocol_version: String,

    /// Target size of each feed's recent window.
    #[serde(default = "default_optimal_recent")]
    pub optimal_recent: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            protocol_version: default_protocol_version(),
            optimal_recent: default_optimal_recent(),
        }
    }
}

fn default_protocol_version() -> String {
    PROTOCOL_VERSION.to_string()
}

fn default_optimal_recent() -> u64 {
    DEFAULT_OPTIMAL_RECENT
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PublishConfig {
    /// Attempts per publish when another writer moves the root.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
        }
    }
}

fn default_max_attempts() -> u32 {
    DEFAULT_PUBLISH_ATTEMPTS
}

// =============================================================================
// CONFIG
// =============================================================================

/// Complete application configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub publish: PublishConfig,
}

impl Config {
    /// Load configuration from `path`, or defaults if the file does not exist.
    pub fn load(path: &Path) -> Result<Self, TesseraError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }

        let text = std::fs::read_to_string(path).map_err(|e| {
            TesseraError::Io(format!("Cannot read config '{}': {}", path.display(), e))
        })?;
        let config = Self::from_toml(&text)?;
        tracing::debug!(path = %path.display(), backend = %config.store.backend, "loaded config");
        Ok(config)
    }

    /// Parse and validate a TOML document.
    pub fn from_toml(text: &str) -> Result<Self, TesseraError> {
        let config: Self =
            toml::from_str(text).map_err(|e| TesseraError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Apply command-line overrides. Flags win over file values.
    pub fn apply_overrides(
        &mut self,
        backend: Option<&str>,
        database: Option<&Path>,
    ) -> Result<(), TesseraError> {
        if let Some(backend) = backend {
            self.store.backend = BackendKind::parse(backend)?;
        }
        if let Some(database) = database {
            self.store.path = database.to_path_buf();
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), TesseraError> {
        self.feed_settings()?;
        if self.publish.max_attempts == 0 {
            return Err(TesseraError::InvalidConfig(
                "publish.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.store.ipfs_binary.trim().is_empty() {
            return Err(TesseraError::InvalidConfig(
                "store.ipfs_binary must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Settings for feeds created under this configuration.
    pub fn feed_settings(&self) -> Result<FeedSettings, TesseraError> {
        FeedSettings::new(self.feed.protocol_version.clone(), self.feed.optimal_recent)
    }
}

// =============================================================================
// TESTS
// =============================================================================
