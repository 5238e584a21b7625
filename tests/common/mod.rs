//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::sync::Weak;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use app_analytics_ingest::database::{
    DuckDBScope, DuckDBStore, Entity, IngestStore, MutationObserver, NewRecord, RecordPredicate,
    ResolvedEntity, StoreError, StoreResult,
};
use app_analytics_ingest::dataset::{ColumnData, DataFrame};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use tokio::sync::Notify;
use uuid::Uuid;

/// DuckDB store that counts calls and can inject failures
pub struct InstrumentedStore {
    inner: DuckDBStore,
    scopes_opened: AtomicUsize,
    resolutions: AtomicUsize,
    commits: AtomicUsize,
    /// 1-based commit number that fails, 0 for none
    fail_commit: AtomicUsize,
    /// Number of upcoming delete_records calls that fail
    failing_deletes: AtomicUsize,
    /// Next delete_records call waits for `release_delete`
    park_delete: AtomicBool,
    delete_parked: Notify,
    delete_released: Notify,
    active_deletes: AtomicUsize,
    peak_deletes: AtomicUsize,
}

impl InstrumentedStore {
    pub async fn new() -> Self {
        let inner = DuckDBStore::in_memory().unwrap();
        inner.initialize().await.unwrap();
        Self {
            inner,
            scopes_opened: AtomicUsize::new(0),
            resolutions: AtomicUsize::new(0),
            commits: AtomicUsize::new(0),
            fail_commit: AtomicUsize::new(0),
            failing_deletes: AtomicUsize::new(0),
            park_delete: AtomicBool::new(false),
            delete_parked: Notify::new(),
            delete_released: Notify::new(),
            active_deletes: AtomicUsize::new(0),
            peak_deletes: AtomicUsize::new(0),
        }
    }

    pub fn scopes_opened(&self) -> usize {
        self.scopes_opened.load(Ordering::SeqCst)
    }

    pub fn resolutions(&self) -> usize {
        self.resolutions.load(Ordering::SeqCst)
    }

    pub fn commits(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    /// Make the `n`th commit from now fail
    pub fn fail_commit(&self, n: usize) {
        let base = self.commits.load(Ordering::SeqCst);
        self.fail_commit.store(base + n, Ordering::SeqCst);
    }

    pub fn fail_next_deletes(&self, n: usize) {
        self.failing_deletes.store(n, Ordering::SeqCst);
    }

    /// Hold the next delete_records call inside its write scope
    pub fn park_next_delete(&self) {
        self.park_delete.store(true, Ordering::SeqCst);
    }

    /// Wait until a delete is parked
    pub async fn delete_parked(&self) {
        self.delete_parked.notified().await;
    }

    pub fn release_delete(&self) {
        self.delete_released.notify_one();
    }

    /// Most delete_records calls ever in flight at once
    pub fn peak_deletes(&self) -> usize {
        self.peak_deletes.load(Ordering::SeqCst)
    }

    pub fn reset_counters(&self) {
        self.scopes_opened.store(0, Ordering::SeqCst);
        self.resolutions.store(0, Ordering::SeqCst);
    }

    /// Create an app outside of any import
    pub async fn create_app(&self, title: &str) -> Uuid {
        let mut scope = self.inner.begin_write().await.unwrap();
        let resolved = self
            .inner
            .resolve_or_create_entity(&mut scope, title)
            .await
            .unwrap();
        self.inner.commit(scope).await.unwrap();
        resolved.id
    }

    pub async fn app_id(&self, title: &str) -> Option<Uuid> {
        self.inner
            .list_entities()
            .await
            .unwrap()
            .into_iter()
            .find(|app| app.title == title)
            .map(|app| app.id)
    }
}

#[async_trait]
impl IngestStore for InstrumentedStore {
    type Scope = DuckDBScope;

    async fn initialize(&self) -> StoreResult<()> {
        self.inner.initialize().await
    }

    async fn begin_write(&self) -> StoreResult<DuckDBScope> {
        self.scopes_opened.fetch_add(1, Ordering::SeqCst);
        self.inner.begin_write().await
    }

    async fn commit(&self, scope: DuckDBScope) -> StoreResult<()> {
        let n = self.commits.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_commit.load(Ordering::SeqCst) == n {
            self.inner.rollback(scope).await?;
            return Err(StoreError::TransactionFailed(format!(
                "injected failure on commit {}",
                n
            )));
        }
        self.inner.commit(scope).await
    }

    async fn rollback(&self, scope: DuckDBScope) -> StoreResult<()> {
        self.inner.rollback(scope).await
    }

    async fn resolve_or_create_entity(
        &self,
        scope: &mut DuckDBScope,
        title: &str,
    ) -> StoreResult<ResolvedEntity> {
        self.resolutions.fetch_add(1, Ordering::SeqCst);
        self.inner.resolve_or_create_entity(scope, title).await
    }

    async fn insert_records(
        &self,
        scope: &mut DuckDBScope,
        records: &[NewRecord],
    ) -> StoreResult<usize> {
        self.inner.insert_records(scope, records).await
    }

    async fn count_records(&self, predicate: RecordPredicate) -> StoreResult<u64> {
        self.inner.count_records(predicate).await
    }

    async fn delete_records(
        &self,
        scope: &mut DuckDBScope,
        predicate: RecordPredicate,
    ) -> StoreResult<usize> {
        let failing = self.failing_deletes.load(Ordering::SeqCst);
        if failing > 0 {
            self.failing_deletes.store(failing - 1, Ordering::SeqCst);
            return Err(StoreError::QueryFailed("injected delete failure".to_string()));
        }

        let active = self.active_deletes.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_deletes.fetch_max(active, Ordering::SeqCst);
        if self.park_delete.swap(false, Ordering::SeqCst) {
            self.delete_parked.notify_one();
            self.delete_released.notified().await;
        }
        let result = self.inner.delete_records(scope, predicate).await;
        self.active_deletes.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn list_entities(&self) -> StoreResult<Vec<Entity>> {
        self.inner.list_entities().await
    }

    async fn count_entities(&self) -> StoreResult<u64> {
        self.inner.count_entities().await
    }

    async fn fallback_entity(&self) -> StoreResult<Option<Entity>> {
        self.inner.fallback_entity().await
    }

    async fn delete_entity(&self, id: Uuid) -> StoreResult<bool> {
        self.inner.delete_entity(id).await
    }

    fn register_observer(&self, observer: Weak<dyn MutationObserver>) {
        self.inner.register_observer(observer)
    }

    async fn health_check(&self) -> StoreResult<bool> {
        self.inner.health_check().await
    }

    fn backend_type(&self) -> &'static str {
        "instrumented-duckdb"
    }
}

/// One input row; `None` leaves the cell null
#[derive(Debug, Clone)]
pub struct Row {
    pub title: Option<String>,
    pub date: Option<DateTime<Utc>>,
    pub event: Option<String>,
    pub count: Option<i64>,
}

impl Row {
    pub fn new(title: &str, second: i64) -> Self {
        Self {
            title: Some(title.to_string()),
            date: Utc.timestamp_opt(1_714_557_600 + second, 0).single(),
            event: Some("Impression".to_string()),
            count: Some(1),
        }
    }

    pub fn without_title(mut self) -> Self {
        self.title = None;
        self
    }

    pub fn without_date(mut self) -> Self {
        self.date = None;
        self
    }

    pub fn without_event(mut self) -> Self {
        self.event = None;
        self
    }

    pub fn with_count(mut self, count: i64) -> Self {
        self.count = Some(count);
        self
    }
}

/// Build a frame with the default column names
pub fn frame(rows: &[Row]) -> DataFrame {
    let n = rows.len();
    let text = |value: &str| ColumnData::Text(vec![Some(value.to_string()); n]);

    DataFrame::new()
        .with_column(
            "appTitle",
            ColumnData::Text(rows.iter().map(|r| r.title.clone()).collect()),
        )
        .unwrap()
        .with_column(
            "date",
            ColumnData::Timestamp(rows.iter().map(|r| r.date).collect()),
        )
        .unwrap()
        .with_column(
            "event",
            ColumnData::Text(rows.iter().map(|r| r.event.clone()).collect()),
        )
        .unwrap()
        .with_column("pageType", text("Product Page"))
        .unwrap()
        .with_column("sourceType", text("Browse"))
        .unwrap()
        .with_column("engagementType", text("Tap"))
        .unwrap()
        .with_column("device", text("iPhone"))
        .unwrap()
        .with_column("platformVersion", text("iOS 18"))
        .unwrap()
        .with_column("territory", text("US"))
        .unwrap()
        .with_column(
            "count",
            ColumnData::Integer(rows.iter().map(|r| r.count).collect()),
        )
        .unwrap()
        .with_column("uniqueCount", ColumnData::Integer(vec![Some(1); n]))
        .unwrap()
}

/// `n` well-formed rows cycling through `titles`
pub fn cycling_frame(n: usize, titles: &[&str]) -> DataFrame {
    let rows: Vec<Row> = (0..n)
        .map(|i| Row::new(titles[i % titles.len()], i as i64))
        .collect();
    frame(&rows)
}
