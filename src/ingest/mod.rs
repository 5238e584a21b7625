//! Bulk ingestion pipeline
//!
//! Turns a columnar export into `apps` and `records` rows:
//!
//! 1. **Resolution** - every distinct title is looked up (or created) once,
//!    inside the first chunk's write scope, so new apps roll back together
//!    with the rows that introduced them.
//! 2. **Validation** - each row is projected into a [`RecordDraft`] or
//!    rejected with a reason. Rejections never abort the import.
//! 3. **Chunked writes** - accepted rows are written in bounded chunks, one
//!    atomic write scope per chunk, in ascending row order.
//!
//! An import is atomic per chunk only. When a chunk fails, earlier chunks
//! stay committed and the error reports how many rows they carried.
//!
//! [`RecordDraft`]: crate::database::RecordDraft

mod loader;
mod report;
mod resolver;
mod validator;

pub use loader::{BulkLoader, LoaderOptions};
pub use report::ImportReport;
pub use resolver::{EntityBinding, TitleCache, resolve_titles};
pub use validator::{RejectionReason, RowOutcome, RowRejection, RowValidator};

use crate::database::StoreError;

/// Error type for import operations
///
/// Row-level problems are not errors; see [`RowRejection`].
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// Title lookup or insert failed; nothing from this import was committed
    #[error("Failed to resolve app '{title}': {source}")]
    Resolution {
        title: String,
        #[source]
        source: StoreError,
    },

    /// A chunk failed to write or commit
    #[error("Chunk {chunk} failed after {rows_committed} rows were committed: {source}")]
    ChunkFailed {
        /// Zero-based index of the failing chunk
        chunk: usize,
        /// Rows persisted by earlier chunks
        rows_committed: usize,
        #[source]
        source: StoreError,
    },

    /// Title resolution is disabled and the store has no app to fall back to
    #[error("No app available to bind rows to")]
    NoFallbackEntity,

    /// Loader options cannot be used
    #[error("Invalid loader options: {0}")]
    InvalidOptions(String),

    /// Store error outside of a chunk
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl IngestError {
    /// Rows known to be persisted before the failure
    pub fn rows_committed(&self) -> usize {
        match self {
            IngestError::ChunkFailed { rows_committed, .. } => *rows_committed,
            _ => 0,
        }
    }
}

/// Result type for import operations
pub type IngestResult<T> = Result<T, IngestError>;
