//! File loading and end-to-end import tests

mod common;

use std::io::Write;

use app_analytics_ingest::config::{ColumnNames, IngestConfig};
use app_analytics_ingest::database::{IngestStore, RecordPredicate};
use app_analytics_ingest::dataset::{DataFrame, DatasetError};
use app_analytics_ingest::ingest::BulkLoader;
use common::InstrumentedStore;
use tempfile::NamedTempFile;

fn record(title: &str, date: &str, count: &str) -> String {
    format!(
        r#"{{"appTitle": "{title}", "date": {date}, "event": "Impression", "pageType": "Product Page", "sourceType": "Browse", "engagementType": "Tap", "device": "iPad", "platformVersion": "iPadOS 17", "territory": "DE", "count": {count}, "uniqueCount": 1}}"#
    )
}

fn temp_file(suffix: &str, content: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn test_json_array_file() {
    let content = format!(
        "[{}, {}]",
        record("Acme", r#""2024-05-01T10:00:00Z""#, "3"),
        record("Globex", "1714557601", r#""7""#)
    );
    let file = temp_file(".json", &content);

    let frame =
        DataFrame::from_path(file.path(), &ColumnNames::default().frame_schema()).unwrap();

    assert_eq!(frame.row_count(), 2);
    assert_eq!(frame.distinct_text("appTitle"), vec!["Acme", "Globex"]);
    let counts = frame.column::<i64>("count");
    assert_eq!(counts.value(0), Some(&3));
    assert_eq!(counts.value(1), Some(&7));
    assert!(frame.column::<chrono::DateTime<chrono::Utc>>("date").get(1).is_ok());
}

#[test]
fn test_jsonl_parse_error_reports_line() {
    let content = format!(
        "{}\n\n{{not json}}\n",
        record("Acme", r#""2024-05-01T10:00:00Z""#, "1")
    );
    let file = temp_file(".jsonl", &content);

    let err = DataFrame::from_path(file.path(), &ColumnNames::default().frame_schema())
        .unwrap_err();
    assert!(matches!(err, DatasetError::JsonParse { line: 3, .. }));
}

#[test]
fn test_missing_file() {
    let err = DataFrame::from_path(
        std::path::Path::new("/nonexistent/export.jsonl"),
        &ColumnNames::default().frame_schema(),
    )
    .unwrap_err();
    assert!(matches!(err, DatasetError::IoError(_)));
}

#[tokio::test]
async fn test_jsonl_file_import_with_renamed_columns() {
    let config = IngestConfig::parse(
        r#"
[loader]
chunk_size = 2

[columns]
title = "app"
"#,
    )
    .unwrap();

    let lines = [
        record("Acme", r#""2024-05-01T10:00:00Z""#, "1"),
        record("Acme", r#""yesterday""#, "1"),
        record("Acme", r#""2024-05-01T10:00:02Z""#, "0"),
        record("Globex", r#""2024-05-01T10:00:03Z""#, "5"),
    ]
    .map(|line| line.replace("\"appTitle\"", "\"app\""));
    let file = temp_file(".jsonl", &lines.join("\n"));

    let frame = DataFrame::from_path(file.path(), &config.columns.frame_schema()).unwrap();
    let store = InstrumentedStore::new().await;
    let report = BulkLoader::with_config(&store, &config)
        .import_with_report(&frame, None)
        .await
        .unwrap();

    assert_eq!(report.total_rows, 4);
    assert_eq!(report.imported, 3);
    assert_eq!(report.rejections[0].row, 1);
    assert_eq!(report.chunks_committed, 2);
    assert_eq!(report.entities_created, 2);
    assert_eq!(
        store
            .count_records(RecordPredicate::CountEquals(0))
            .await
            .unwrap(),
        1
    );
}

#[tokio::test]
async fn test_jsonl_epoch_millis_row_is_rejected() {
    let lines = [
        record("Acme", "1714557600", "1"),
        record("Acme", "1714557600000", "1"),
        record("Acme", "1714557602", "1"),
    ];
    let file = temp_file(".jsonl", &lines.join("\n"));

    let frame =
        DataFrame::from_path(file.path(), &ColumnNames::default().frame_schema()).unwrap();
    let store = InstrumentedStore::new().await;
    let report = BulkLoader::with_config(&store, &IngestConfig::default())
        .import_with_report(&frame, None)
        .await
        .unwrap();

    assert_eq!(report.imported, 2);
    assert_eq!(report.rejected_count, 1);
    assert_eq!(report.rejections[0].row, 1);
    assert_eq!(store.count_records(RecordPredicate::All).await.unwrap(), 2);
}
