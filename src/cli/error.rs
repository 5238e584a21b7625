//! CLI-specific error types

use std::path::PathBuf;
use thiserror::Error;

use crate::database::StoreError;
use crate::dataset::DatasetError;
use crate::ingest::IngestError;

/// CLI-specific error type
#[derive(Error, Debug)]
pub enum CliError {
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Invalid UUID format: {0}")]
    InvalidUuid(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Workspace not initialized. Run 'app-ingest init' first.")]
    NotInitialized,

    #[error("App not found: {0}")]
    AppNotFound(uuid::Uuid),

    #[error("Dataset error: {0}")]
    DatasetError(#[from] DatasetError),

    #[error("Import error: {0}")]
    ImportError(#[from] IngestError),

    #[error("Database error: {0}")]
    DatabaseError(#[from] StoreError),

    #[error("IO error: {0}")]
    IoError(String),
}
