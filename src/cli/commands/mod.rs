//! CLI command implementations
//!
//! Each handler is synchronous and drives its own Tokio runtime.

pub mod app;
pub mod bench;
pub mod import;
pub mod init;
pub mod status;

use std::path::Path;
use uuid::Uuid;

use crate::cli::error::CliError;
use crate::config::IngestConfig;
use crate::database::{DuckDBStore, IngestStore};

pub(crate) fn runtime() -> Result<tokio::runtime::Runtime, CliError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| CliError::IoError(format!("Failed to create runtime: {}", e)))
}

pub(crate) fn parse_uuid(value: &str) -> Result<Uuid, CliError> {
    Uuid::parse_str(value.trim()).map_err(|_| CliError::InvalidUuid(value.to_string()))
}

/// Load the workspace config and open its database
pub(crate) async fn open_workspace(
    workspace: &Path,
) -> Result<(IngestConfig, DuckDBStore), CliError> {
    if !IngestConfig::exists(workspace) {
        return Err(CliError::NotInitialized);
    }

    let config = IngestConfig::load(workspace)?;
    let store = DuckDBStore::new(config.database_path(workspace))?;
    store.initialize().await?;
    Ok((config, store))
}
