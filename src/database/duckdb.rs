//! DuckDB store implementation
//!
//! Provides an embedded store for imported analytics data. Writes go through
//! a single connection guarded by an async write gate, so only one write
//! scope is ever open. Reads use a second connection to the same database
//! and therefore only observe committed data.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tokio::sync::OwnedMutexGuard;
use uuid::Uuid;

use super::schema::{DatabaseSchema, SCHEMA_VERSION};
use super::{
    DEFAULT_ENTITY_TITLE, Entity, IngestStore, MutationObserver, NewRecord, RecordPredicate,
    ResolvedEntity, StoreError, StoreResult,
};

/// Format used when binding timestamps
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

fn lock(connection: &Mutex<duckdb::Connection>) -> StoreResult<MutexGuard<'_, duckdb::Connection>> {
    connection
        .lock()
        .map_err(|e| StoreError::ConnectionFailed(format!("Lock error: {}", e)))
}

fn parse_uuid(value: &str) -> StoreResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|e| StoreError::SerializationError(format!("Invalid UUID '{}': {}", value, e)))
}

/// Open write scope on a [`DuckDBStore`]
///
/// Holds the store's write gate for its whole lifetime. Dropping a scope
/// that was neither committed nor rolled back rolls it back.
pub struct DuckDBScope {
    connection: Arc<Mutex<duckdb::Connection>>,
    finished: bool,
    _gate: OwnedMutexGuard<()>,
}

impl DuckDBScope {
    fn finish(&mut self, sql: &str) -> StoreResult<()> {
        self.finished = true;
        let conn = lock(&self.connection)?;
        conn.execute_batch(sql)
            .map_err(|e| StoreError::TransactionFailed(format!("{} failed: {}", sql, e)))
    }
}

impl Drop for DuckDBScope {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if let Ok(conn) = self.connection.lock()
            && let Err(e) = conn.execute_batch("ROLLBACK")
        {
            tracing::warn!("Rollback of abandoned write scope failed: {}", e);
        }
    }
}

/// DuckDB store
///
/// Supports both file-based persistence and in-memory mode.
pub struct DuckDBStore {
    /// Path to the database file (None for in-memory)
    db_path: Option<PathBuf>,
    /// Connection used by write scopes
    writer: Arc<Mutex<duckdb::Connection>>,
    /// Connection used for committed reads
    reader: Mutex<duckdb::Connection>,
    /// Single-writer gate
    write_gate: Arc<tokio::sync::Mutex<()>>,
    observers: Mutex<Vec<Weak<dyn MutationObserver>>>,
}

impl DuckDBStore {
    /// Create a new DuckDB store with a file-based database
    ///
    /// # Arguments
    /// * `db_path` - Path to the DuckDB database file
    pub fn new(db_path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = db_path.as_ref().to_path_buf();
        let connection = duckdb::Connection::open(&path).map_err(|e| {
            StoreError::ConnectionFailed(format!("Failed to open DuckDB: {}", e))
        })?;

        Self::from_connection(Some(path), connection)
    }

    /// Create an in-memory DuckDB store
    ///
    /// Useful for testing or throwaway imports where persistence is not needed.
    pub fn in_memory() -> StoreResult<Self> {
        let connection = duckdb::Connection::open_in_memory().map_err(|e| {
            StoreError::ConnectionFailed(format!("Failed to create in-memory DuckDB: {}", e))
        })?;

        Self::from_connection(None, connection)
    }

    fn from_connection(db_path: Option<PathBuf>, writer: duckdb::Connection) -> StoreResult<Self> {
        let reader = writer.try_clone().map_err(|e| {
            StoreError::ConnectionFailed(format!("Failed to open read connection: {}", e))
        })?;

        Ok(Self {
            db_path,
            writer: Arc::new(Mutex::new(writer)),
            reader: Mutex::new(reader),
            write_gate: Arc::new(tokio::sync::Mutex::new(())),
            observers: Mutex::new(Vec::new()),
        })
    }

    /// Get the database file path (None for in-memory)
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Check if this is an in-memory database
    pub fn is_in_memory(&self) -> bool {
        self.db_path.is_none()
    }

    /// Drop every table and recreate the schema
    pub async fn reset(&self) -> StoreResult<()> {
        {
            let _gate = self.write_gate.lock().await;
            let conn = lock(&self.writer)?;
            conn.execute_batch(DatabaseSchema::drop_tables_sql())
                .map_err(|e| StoreError::MigrationFailed(format!("Failed to drop tables: {}", e)))?;
        }
        self.initialize().await
    }

    fn check_scope(&self, scope: &DuckDBScope) -> StoreResult<()> {
        if scope.finished {
            return Err(StoreError::InvalidInput(
                "Write scope already closed".to_string(),
            ));
        }
        if !Arc::ptr_eq(&scope.connection, &self.writer) {
            return Err(StoreError::InvalidInput(
                "Write scope belongs to another store".to_string(),
            ));
        }
        Ok(())
    }

    fn query_entities(&self, sql: &str) -> StoreResult<Vec<Entity>> {
        let conn = lock(&self.reader)?;
        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| StoreError::QueryFailed(format!("Prepare failed: {}", e)))?;
        let mut rows = stmt
            .query([])
            .map_err(|e| StoreError::QueryFailed(format!("Query failed: {}", e)))?;

        let mut entities = Vec::new();
        while let Some(row) = rows
            .next()
            .map_err(|e| StoreError::QueryFailed(format!("Row fetch error: {}", e)))?
        {
            let id: String = row
                .get(0)
                .map_err(|e| StoreError::QueryFailed(format!("Column read error: {}", e)))?;
            let title: String = row
                .get(1)
                .map_err(|e| StoreError::QueryFailed(format!("Column read error: {}", e)))?;
            entities.push(Entity {
                id: parse_uuid(&id)?,
                title,
            });
        }
        Ok(entities)
    }

    fn notify_entity_deleted(&self, id: Uuid) {
        let observers: Vec<Arc<dyn MutationObserver>> = match self.observers.lock() {
            Ok(mut observers) => {
                observers.retain(|o| o.strong_count() > 0);
                observers.iter().filter_map(Weak::upgrade).collect()
            }
            Err(e) => {
                tracing::error!("Observer registry unavailable: {}", e);
                return;
            }
        };

        for observer in observers {
            observer.entity_deleted(id);
        }
    }
}

fn count_matching(conn: &duckdb::Connection, predicate: RecordPredicate) -> duckdb::Result<i64> {
    match predicate {
        RecordPredicate::All => conn.query_row("SELECT COUNT(*) FROM records", [], |r| r.get(0)),
        RecordPredicate::Entity(id) => conn.query_row(
            "SELECT COUNT(*) FROM records WHERE app_id = CAST(? AS UUID)",
            [id.to_string()],
            |r| r.get(0),
        ),
        RecordPredicate::CountEquals(count) => conn.query_row(
            "SELECT COUNT(*) FROM records WHERE count = ?",
            [count],
            |r| r.get(0),
        ),
    }
}

fn delete_matching(conn: &duckdb::Connection, predicate: RecordPredicate) -> duckdb::Result<usize> {
    match predicate {
        RecordPredicate::All => conn.execute("DELETE FROM records", []),
        RecordPredicate::Entity(id) => conn.execute(
            "DELETE FROM records WHERE app_id = CAST(? AS UUID)",
            [id.to_string()],
        ),
        RecordPredicate::CountEquals(count) => {
            conn.execute("DELETE FROM records WHERE count = ?", [count])
        }
    }
}

fn seed_default_entity(conn: &duckdb::Connection) -> StoreResult<bool> {
    let apps: i64 = conn
        .query_row("SELECT COUNT(*) FROM apps", [], |r| r.get(0))
        .map_err(|e| StoreError::QueryFailed(format!("Failed to count apps: {}", e)))?;
    if apps > 0 {
        return Ok(false);
    }

    conn.execute(
        "INSERT INTO apps (id, title) VALUES (CAST(? AS UUID), ?)",
        duckdb::params![Uuid::new_v4().to_string(), DEFAULT_ENTITY_TITLE],
    )
    .map_err(|e| StoreError::QueryFailed(format!("Failed to seed default app: {}", e)))?;
    Ok(true)
}

#[async_trait]
impl IngestStore for DuckDBStore {
    type Scope = DuckDBScope;

    async fn initialize(&self) -> StoreResult<()> {
        let _gate = self.write_gate.lock().await;
        let conn = lock(&self.writer)?;

        // Create tables
        conn.execute_batch(DatabaseSchema::create_tables_sql())
            .map_err(|e| StoreError::MigrationFailed(format!("Failed to create tables: {}", e)))?;

        // Create indexes
        conn.execute_batch(DatabaseSchema::create_indexes_sql())
            .map_err(|e| StoreError::MigrationFailed(format!("Failed to create indexes: {}", e)))?;

        // Record schema version
        conn.execute(
            "INSERT INTO schema_version (version) VALUES (?) ON CONFLICT (version) DO NOTHING",
            [SCHEMA_VERSION],
        )
        .map_err(|e| {
            StoreError::MigrationFailed(format!("Failed to record schema version: {}", e))
        })?;

        if seed_default_entity(&conn)? {
            tracing::debug!("Seeded '{}'", DEFAULT_ENTITY_TITLE);
        }
        Ok(())
    }

    async fn begin_write(&self) -> StoreResult<DuckDBScope> {
        let gate = Arc::clone(&self.write_gate).lock_owned().await;
        {
            let conn = lock(&self.writer)?;
            conn.execute_batch("BEGIN TRANSACTION").map_err(|e| {
                StoreError::TransactionFailed(format!("Failed to begin transaction: {}", e))
            })?;
        }

        Ok(DuckDBScope {
            connection: Arc::clone(&self.writer),
            finished: false,
            _gate: gate,
        })
    }

    async fn commit(&self, mut scope: DuckDBScope) -> StoreResult<()> {
        self.check_scope(&scope)?;
        if let Err(e) = scope.finish("COMMIT") {
            // A failed commit leaves the transaction aborted
            if let Ok(conn) = lock(&scope.connection) {
                let _ = conn.execute_batch("ROLLBACK");
            }
            return Err(e);
        }
        Ok(())
    }

    async fn rollback(&self, mut scope: DuckDBScope) -> StoreResult<()> {
        self.check_scope(&scope)?;
        scope.finish("ROLLBACK")
    }

    async fn resolve_or_create_entity(
        &self,
        scope: &mut DuckDBScope,
        title: &str,
    ) -> StoreResult<ResolvedEntity> {
        self.check_scope(scope)?;
        let conn = lock(&scope.connection)?;

        let existing: Option<String> = {
            let mut stmt = conn
                .prepare_cached(
                    "SELECT CAST(id AS VARCHAR) FROM apps WHERE title = ? ORDER BY created_at, rowid LIMIT 1",
                )
                .map_err(|e| StoreError::QueryFailed(format!("Prepare failed: {}", e)))?;
            let mut rows = stmt
                .query([title])
                .map_err(|e| StoreError::QueryFailed(format!("App lookup failed: {}", e)))?;
            match rows
                .next()
                .map_err(|e| StoreError::QueryFailed(format!("Row fetch error: {}", e)))?
            {
                Some(row) => Some(
                    row.get(0)
                        .map_err(|e| StoreError::QueryFailed(format!("Column read error: {}", e)))?,
                ),
                None => None,
            }
        };

        if let Some(id) = existing {
            return Ok(ResolvedEntity {
                id: parse_uuid(&id)?,
                created: false,
            });
        }

        let id = Uuid::new_v4();
        conn.execute(
            "INSERT INTO apps (id, title) VALUES (CAST(? AS UUID), ?)",
            duckdb::params![id.to_string(), title],
        )
        .map_err(|e| StoreError::QueryFailed(format!("Failed to insert app '{}': {}", title, e)))?;

        tracing::debug!(%id, title, "Created app");
        Ok(ResolvedEntity { id, created: true })
    }

    async fn insert_records(
        &self,
        scope: &mut DuckDBScope,
        records: &[NewRecord],
    ) -> StoreResult<usize> {
        self.check_scope(scope)?;
        let conn = lock(&scope.connection)?;
        let mut stmt = conn
            .prepare_cached(DatabaseSchema::record_insert_sql())
            .map_err(|e| StoreError::QueryFailed(format!("Prepare failed: {}", e)))?;

        for record in records {
            let draft = &record.draft;
            stmt.execute(duckdb::params![
                record.id.to_string(),
                draft.date.format(TIMESTAMP_FORMAT).to_string(),
                draft.app_id.to_string(),
                &draft.event,
                &draft.page_type,
                &draft.source_type,
                &draft.engagement_type,
                &draft.device,
                &draft.platform_version,
                &draft.territory,
                draft.count,
                draft.unique_count,
            ])
            .map_err(|e| StoreError::QueryFailed(format!("Record insert failed: {}", e)))?;
        }

        Ok(records.len())
    }

    async fn count_records(&self, predicate: RecordPredicate) -> StoreResult<u64> {
        let conn = lock(&self.reader)?;
        let count = count_matching(&conn, predicate)
            .map_err(|e| StoreError::QueryFailed(format!("Count failed: {}", e)))?;
        Ok(count.max(0) as u64)
    }

    async fn delete_records(
        &self,
        scope: &mut DuckDBScope,
        predicate: RecordPredicate,
    ) -> StoreResult<usize> {
        self.check_scope(scope)?;
        let conn = lock(&scope.connection)?;
        delete_matching(&conn, predicate)
            .map_err(|e| StoreError::QueryFailed(format!("Delete failed: {}", e)))
    }

    async fn list_entities(&self) -> StoreResult<Vec<Entity>> {
        self.query_entities(
            "SELECT CAST(id AS VARCHAR), title FROM apps ORDER BY created_at, rowid",
        )
    }

    async fn count_entities(&self) -> StoreResult<u64> {
        let conn = lock(&self.reader)?;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM apps", [], |r| r.get(0))
            .map_err(|e| StoreError::QueryFailed(format!("Count failed: {}", e)))?;
        Ok(count.max(0) as u64)
    }

    async fn fallback_entity(&self) -> StoreResult<Option<Entity>> {
        let mut entities = self.query_entities(
            "SELECT CAST(id AS VARCHAR), title FROM apps ORDER BY created_at, rowid LIMIT 1",
        )?;
        Ok(entities.pop())
    }

    async fn delete_entity(&self, id: Uuid) -> StoreResult<bool> {
        {
            let _gate = self.write_gate.lock().await;
            let conn = lock(&self.writer)?;

            let exists: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM apps WHERE id = CAST(? AS UUID)",
                    [id.to_string()],
                    |r| r.get(0),
                )
                .map_err(|e| StoreError::QueryFailed(format!("App lookup failed: {}", e)))?;
            if exists == 0 {
                return Ok(false);
            }

            // Separate statements: DuckDB rejects deleting a referenced parent
            // in the same transaction that deleted its children.
            let removed = delete_matching(&conn, RecordPredicate::Entity(id))
                .map_err(|e| StoreError::QueryFailed(format!("Delete failed: {}", e)))?;
            conn.execute("DELETE FROM apps WHERE id = CAST(? AS UUID)", [id.to_string()])
                .map_err(|e| StoreError::QueryFailed(format!("Failed to delete app: {}", e)))?;

            if seed_default_entity(&conn)? {
                tracing::info!("Last app deleted, seeded '{}'", DEFAULT_ENTITY_TITLE);
            }
            tracing::debug!(%id, records = removed, "Deleted app");
        }

        self.notify_entity_deleted(id);
        Ok(true)
    }

    fn register_observer(&self, observer: Weak<dyn MutationObserver>) {
        match self.observers.lock() {
            Ok(mut observers) => observers.push(observer),
            Err(e) => tracing::error!("Observer registry unavailable: {}", e),
        }
    }

    async fn health_check(&self) -> StoreResult<bool> {
        let conn = lock(&self.reader)?;
        let healthy: i32 = conn
            .query_row("SELECT 1", [], |r| r.get(0))
            .map_err(|e| StoreError::QueryFailed(format!("Health check failed: {}", e)))?;
        Ok(healthy == 1)
    }

    fn backend_type(&self) -> &'static str {
        "duckdb"
    }
}
