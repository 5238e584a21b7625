//! Durable relational store abstraction
//!
//! The ingestion pipeline only needs a narrow contract from its store:
//! - resolve-or-create an app by title
//! - open, commit and roll back an atomic write scope
//! - bulk insert records inside a scope
//! - count and delete records matching a predicate
//!
//! The store owns durability and isolation. It must also honour a
//! single-writer discipline: at most one write scope may be open at a time,
//! so concurrent imports serialize at the scope boundary.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Weak;
use uuid::Uuid;

#[cfg(feature = "duckdb-backend")]
pub mod duckdb;

pub mod schema;

#[cfg(feature = "duckdb-backend")]
pub use self::duckdb::{DuckDBScope, DuckDBStore};

pub use schema::DatabaseSchema;

/// Title of the entity the store seeds whenever the apps table is empty
pub const DEFAULT_ENTITY_TITLE: &str = "Default App";

/// Error type for store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Failed to connect to database
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Schema migration failed
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Transaction failed
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// IO error
    #[error("IO error: {0}")]
    IoError(String),
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// A named parent row that records point at
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub id: Uuid,
    pub title: String,
}

impl Entity {
    /// Create an entity with a freshly generated id
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
        }
    }
}

/// Outcome of resolving an app by title
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedEntity {
    pub id: Uuid,
    /// True if the app was inserted by this call
    pub created: bool,
}

/// A fully validated record awaiting its identifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordDraft {
    pub date: DateTime<Utc>,
    pub app_id: Uuid,
    pub event: String,
    pub page_type: String,
    pub source_type: String,
    pub engagement_type: String,
    pub device: String,
    pub platform_version: String,
    pub territory: String,
    pub count: i64,
    pub unique_count: i64,
}

/// A record ready to be written: generated id plus draft
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRecord {
    pub id: Uuid,
    pub draft: RecordDraft,
}

impl From<RecordDraft> for NewRecord {
    fn from(draft: RecordDraft) -> Self {
        Self {
            id: Uuid::new_v4(),
            draft,
        }
    }
}

/// Record selection used by counts and deletes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordPredicate {
    /// Every record
    All,
    /// Records referencing one app
    Entity(Uuid),
    /// Records whose count field equals the value
    CountEquals(i64),
}

/// Receives store-level mutation events
///
/// The store calls observers after the mutation has been applied. Observers
/// must not block; schedule work instead.
pub trait MutationObserver: Send + Sync {
    /// An app row was deleted
    fn entity_deleted(&self, id: Uuid);
}

/// Store backend trait for the ingestion pipeline
///
/// All operations are async. A backend's write scope type carries whatever
/// it needs to keep the transaction open; dropping an uncommitted scope must
/// roll it back.
#[async_trait]
pub trait IngestStore: Send + Sync {
    /// Open atomic write scope
    type Scope: Send;

    /// Initialize database schema
    ///
    /// Creates all required tables and indexes if they don't exist, and makes
    /// sure at least one app exists.
    async fn initialize(&self) -> StoreResult<()>;

    /// Open a write scope, waiting for any other open scope to close
    async fn begin_write(&self) -> StoreResult<Self::Scope>;

    /// Commit a write scope
    async fn commit(&self, scope: Self::Scope) -> StoreResult<()>;

    /// Roll back a write scope
    async fn rollback(&self, scope: Self::Scope) -> StoreResult<()>;

    /// Look up an app by title inside the scope, inserting it if absent
    ///
    /// # Returns
    /// The existing or newly created app id
    async fn resolve_or_create_entity(
        &self,
        scope: &mut Self::Scope,
        title: &str,
    ) -> StoreResult<ResolvedEntity>;

    /// Insert records inside the scope
    ///
    /// # Returns
    /// Number of records inserted
    async fn insert_records(
        &self,
        scope: &mut Self::Scope,
        records: &[NewRecord],
    ) -> StoreResult<usize>;

    /// Count committed records matching the predicate
    async fn count_records(&self, predicate: RecordPredicate) -> StoreResult<u64>;

    /// Delete records matching the predicate inside the scope
    ///
    /// # Returns
    /// Number of records deleted
    async fn delete_records(
        &self,
        scope: &mut Self::Scope,
        predicate: RecordPredicate,
    ) -> StoreResult<usize>;

    /// All committed apps, oldest first
    async fn list_entities(&self) -> StoreResult<Vec<Entity>>;

    /// Number of committed apps
    async fn count_entities(&self) -> StoreResult<u64>;

    /// The oldest app, used when rows are not bound by title
    async fn fallback_entity(&self) -> StoreResult<Option<Entity>>;

    /// Delete an app together with its records
    ///
    /// Re-seeds the default app if the table becomes empty and notifies
    /// registered observers.
    ///
    /// Not atomic: records and the app are removed by separate statements,
    /// so a failure deleting the app can leave it in place without its
    /// records.
    ///
    /// # Returns
    /// True if the app existed
    async fn delete_entity(&self, id: Uuid) -> StoreResult<bool>;

    /// Register an observer for mutation events
    fn register_observer(&self, observer: Weak<dyn MutationObserver>);

    /// Check if database is healthy and accessible
    async fn health_check(&self) -> StoreResult<bool>;

    /// Get the database backend type name
    fn backend_type(&self) -> &'static str;
}
