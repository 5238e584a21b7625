//! Ingestion configuration file support
//!
//! Handles parsing of `.app-ingest.toml` configuration files and
//! environment variable overrides.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::database::{StoreError, StoreResult};
use crate::dataset::{ColumnKind, FrameSchema};

/// Default database filename for DuckDB
pub const DEFAULT_DUCKDB_FILENAME: &str = ".app-ingest.duckdb";

/// Default configuration filename
pub const CONFIG_FILENAME: &str = ".app-ingest.toml";

/// Default number of rows per write scope
pub const DEFAULT_CHUNK_SIZE: usize = 10_000;

/// Default quiescence delay before maintenance runs
pub const DEFAULT_MAINTENANCE_DELAY_MS: u64 = 5_000;

/// Environment variable for the DuckDB path
pub const ENV_DB_PATH: &str = "APP_INGEST_DB_PATH";

/// Environment variable for the chunk size
pub const ENV_CHUNK_SIZE: &str = "APP_INGEST_CHUNK_SIZE";

/// Environment variable for the maintenance delay
pub const ENV_MAINTENANCE_DELAY_MS: &str = "APP_INGEST_MAINTENANCE_DELAY_MS";

/// Database configuration section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseSection {
    /// Path to DuckDB database file (relative to the config directory)
    #[serde(default = "default_duckdb_path")]
    pub path: String,
}

fn default_duckdb_path() -> String {
    DEFAULT_DUCKDB_FILENAME.to_string()
}

impl Default for DatabaseSection {
    fn default() -> Self {
        Self {
            path: default_duckdb_path(),
        }
    }
}

/// Loader configuration section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoaderSection {
    /// Rows per atomic write scope
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Resolve each row's app from the title column
    ///
    /// When disabled and no fixed app is given, rows bind to the store's
    /// fallback app.
    #[serde(default = "default_true")]
    pub resolve_titles: bool,

    /// Rejections kept verbatim in the import report
    #[serde(default = "default_max_reported_rejections")]
    pub max_reported_rejections: usize,
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_true() -> bool {
    true
}

fn default_max_reported_rejections() -> usize {
    100
}

impl Default for LoaderSection {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            resolve_titles: true,
            max_reported_rejections: default_max_reported_rejections(),
        }
    }
}

/// Maintenance configuration section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaintenanceSection {
    /// Run zero-count cleanup after app deletions
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Quiescence delay in milliseconds
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
}

fn default_delay_ms() -> u64 {
    DEFAULT_MAINTENANCE_DELAY_MS
}

impl Default for MaintenanceSection {
    fn default() -> Self {
        Self {
            enabled: true,
            delay_ms: default_delay_ms(),
        }
    }
}

impl MaintenanceSection {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

/// Dataset column names for each record field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnNames {
    pub title: String,
    pub date: String,
    pub event: String,
    pub page_type: String,
    pub source_type: String,
    pub engagement_type: String,
    pub device: String,
    pub platform_version: String,
    pub territory: String,
    pub count: String,
    pub unique_count: String,
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self {
            title: "appTitle".to_string(),
            date: "date".to_string(),
            event: "event".to_string(),
            page_type: "pageType".to_string(),
            source_type: "sourceType".to_string(),
            engagement_type: "engagementType".to_string(),
            device: "device".to_string(),
            platform_version: "platformVersion".to_string(),
            territory: "territory".to_string(),
            count: "count".to_string(),
            unique_count: "uniqueCount".to_string(),
        }
    }
}

impl ColumnNames {
    /// Schema for loading row-oriented exports with these names
    pub fn frame_schema(&self) -> FrameSchema {
        FrameSchema::new()
            .column(&self.title, ColumnKind::Text)
            .column(&self.date, ColumnKind::Timestamp)
            .column(&self.event, ColumnKind::Text)
            .column(&self.page_type, ColumnKind::Text)
            .column(&self.source_type, ColumnKind::Text)
            .column(&self.engagement_type, ColumnKind::Text)
            .column(&self.device, ColumnKind::Text)
            .column(&self.platform_version, ColumnKind::Text)
            .column(&self.territory, ColumnKind::Text)
            .column(&self.count, ColumnKind::Integer)
            .column(&self.unique_count, ColumnKind::Integer)
    }
}

/// Main configuration structure
///
/// Represents the `.app-ingest.toml` configuration file format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct IngestConfig {
    #[serde(default)]
    pub database: DatabaseSection,

    #[serde(default)]
    pub loader: LoaderSection,

    #[serde(default)]
    pub maintenance: MaintenanceSection,

    #[serde(default)]
    pub columns: ColumnNames,
}

impl IngestConfig {
    /// Create a new default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a configuration pointing at a DuckDB file
    pub fn duckdb(path: impl Into<String>) -> Self {
        Self {
            database: DatabaseSection { path: path.into() },
            ..Default::default()
        }
    }

    /// Load configuration from a directory
    ///
    /// Looks for `.app-ingest.toml` in the directory.
    /// Falls back to defaults if not found.
    pub fn load(dir: &Path) -> StoreResult<Self> {
        let config_path = dir.join(CONFIG_FILENAME);

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .map_err(|e| StoreError::IoError(format!("Failed to read config: {}", e)))?;

            Self::parse(&content)?
        } else {
            Self::default()
        };

        // Apply environment variable overrides
        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Parse configuration from TOML string
    pub fn parse(content: &str) -> StoreResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| StoreError::ConfigError(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the loader cannot work with
    pub fn validate(&self) -> StoreResult<()> {
        if self.loader.chunk_size == 0 {
            return Err(StoreError::ConfigError(
                "loader.chunk_size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Save configuration to a directory
    pub fn save(&self, dir: &Path) -> StoreResult<()> {
        let config_path = dir.join(CONFIG_FILENAME);
        let content = self.to_toml()?;

        std::fs::write(&config_path, content)
            .map_err(|e| StoreError::IoError(format!("Failed to write config: {}", e)))?;

        Ok(())
    }

    /// Convert configuration to TOML string
    pub fn to_toml(&self) -> StoreResult<String> {
        toml::to_string_pretty(self).map_err(|e| {
            StoreError::SerializationError(format!("Failed to serialize config: {}", e))
        })
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var(ENV_DB_PATH) {
            self.database.path = path;
        }

        if let Ok(size) = std::env::var(ENV_CHUNK_SIZE)
            && let Ok(size) = size.parse()
        {
            self.loader.chunk_size = size;
        }

        if let Ok(delay) = std::env::var(ENV_MAINTENANCE_DELAY_MS)
            && let Ok(delay) = delay.parse()
        {
            self.maintenance.delay_ms = delay;
        }
    }

    /// Get the DuckDB database path relative to a directory
    pub fn database_path(&self, dir: &Path) -> PathBuf {
        if self.database.path.is_empty() {
            dir.join(DEFAULT_DUCKDB_FILENAME)
        } else if Path::new(&self.database.path).is_absolute() {
            PathBuf::from(&self.database.path)
        } else {
            dir.join(&self.database.path)
        }
    }

    /// Check if configuration exists in a directory
    pub fn exists(dir: &Path) -> bool {
        dir.join(CONFIG_FILENAME).exists()
    }
}

/// Generate a sample configuration file content
pub fn sample_config() -> &'static str {
    r#"# App analytics ingestion configuration

[database]
# Path to DuckDB database file (relative to this file's directory, or absolute)
path = ".app-ingest.duckdb"

[loader]
# Rows committed per transaction
chunk_size = 10000

# Resolve each row's app from the title column
resolve_titles = true

# Rejected rows listed individually in the import report
max_reported_rejections = 100

[maintenance]
# Remove zero-count records after apps are deleted
enabled = true

# Quiet period before cleanup runs
delay_ms = 5000

[columns]
title = "appTitle"
date = "date"
event = "event"
page_type = "pageType"
source_type = "sourceType"
engagement_type = "engagementType"
device = "device"
platform_version = "platformVersion"
territory = "territory"
count = "count"
unique_count = "uniqueCount"
"#
}
