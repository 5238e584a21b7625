//! Database schema definitions
//!
//! Two tables: `apps` (the dependent-lookup table) and `records` (the fact
//! table). Timestamps are stored as UTC `TIMESTAMP` values.

/// Schema version for migrations
pub const SCHEMA_VERSION: i32 = 1;

/// Database schema helper
pub struct DatabaseSchema;

impl DatabaseSchema {
    /// Get the initial schema creation SQL
    ///
    /// Note: DuckDB doesn't support CASCADE on foreign keys, so deleting an
    /// app removes its records explicitly first.
    pub fn create_tables_sql() -> &'static str {
        r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);

-- Apps (resolved by title during imports)
CREATE TABLE IF NOT EXISTS apps (
    id UUID PRIMARY KEY,
    title TEXT NOT NULL DEFAULT '',
    created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);

-- Imported analytics records
CREATE TABLE IF NOT EXISTS records (
    id UUID PRIMARY KEY,
    date TIMESTAMP NOT NULL,
    app_id UUID NOT NULL REFERENCES apps(id),
    event TEXT NOT NULL DEFAULT '',
    page_type TEXT NOT NULL DEFAULT '',
    source_type TEXT NOT NULL DEFAULT '',
    engagement_type TEXT NOT NULL DEFAULT '',
    device TEXT NOT NULL DEFAULT '',
    platform_version TEXT NOT NULL DEFAULT '',
    territory TEXT NOT NULL DEFAULT '',
    count BIGINT NOT NULL DEFAULT 0,
    unique_count BIGINT NOT NULL DEFAULT 0
);
"#
    }

    /// Get index creation SQL
    ///
    /// Titles are logically unique per import but not constrained, so the
    /// title index is a plain lookup index.
    pub fn create_indexes_sql() -> &'static str {
        r#"
CREATE INDEX IF NOT EXISTS idx_apps_title ON apps(title);
"#
    }

    /// Record insert statement, parameters in column order
    pub fn record_insert_sql() -> &'static str {
        r#"
INSERT INTO records (
    id, date, app_id, event, page_type, source_type, engagement_type,
    device, platform_version, territory, count, unique_count
)
VALUES (
    CAST(? AS UUID), CAST(? AS TIMESTAMP), CAST(? AS UUID),
    ?, ?, ?, ?, ?, ?, ?, ?, ?
)
"#
    }

    /// Drop all tables (for testing/reset)
    pub fn drop_tables_sql() -> &'static str {
        r#"
DROP TABLE IF EXISTS records;
DROP TABLE IF EXISTS apps;
DROP TABLE IF EXISTS schema_version;
"#
    }
}
