//! App Analytics Ingest - bulk loader for app analytics exports
//!
//! Provides:
//! - A columnar dataset with JSON/JSONL loading
//! - A durable store contract with an embedded DuckDB implementation
//! - A chunked bulk loader with per-import title resolution
//! - A debounced maintenance scheduler for zero-count cleanup
//! - TOML configuration with environment overrides

pub mod config;
pub mod database;
pub mod dataset;
pub mod ingest;
pub mod maintenance;

#[cfg(feature = "cli")]
pub mod cli;

// Re-export commonly used types
pub use config::IngestConfig;
#[cfg(feature = "duckdb-backend")]
pub use database::{DuckDBScope, DuckDBStore};
pub use database::{
    Entity, IngestStore, MutationObserver, NewRecord, RecordDraft, RecordPredicate, StoreError,
    StoreResult,
};
pub use dataset::{CellError, ColumnData, ColumnKind, DataFrame, DatasetError, FrameSchema};
pub use ingest::{
    BulkLoader, ImportReport, IngestError, IngestResult, LoaderOptions, RejectionReason,
    RowRejection,
};
pub use maintenance::{MaintenanceScheduler, MaintenanceStats};
