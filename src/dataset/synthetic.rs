//! Synthetic analytics frames for benchmarking and demos

use chrono::{Duration, Utc};

use super::{ColumnData, DataFrame, DatasetResult};
use crate::config::ColumnNames;

/// Default title used by generated frames
pub const SYNTHETIC_TITLE: &str = "PERF.TEST.APP";

/// Generate a frame of `count` well-formed rows for a single title
///
/// Columns are named after `columns` so the frame imports under the same
/// mapping. Timestamps are one second apart and end at the current time,
/// the categorical fields are constant, and both counters are drawn from
/// 1..=3.
pub fn generate(count: usize, title: &str, columns: &ColumnNames) -> DatasetResult<DataFrame> {
    generate_with_rng(count, title, columns, &mut fastrand::Rng::new())
}

/// Seeded variant of [`generate`]
pub fn generate_with_rng(
    count: usize,
    title: &str,
    columns: &ColumnNames,
    rng: &mut fastrand::Rng,
) -> DatasetResult<DataFrame> {
    let start = Utc::now() - Duration::seconds(count as i64);
    let dates = (0..count)
        .map(|i| Some(start + Duration::seconds(i as i64)))
        .collect();

    let text = |value: &str| ColumnData::Text(vec![Some(value.to_string()); count]);
    let counts = (0..count).map(|_| Some(rng.i64(1..=3))).collect();
    let unique_counts = (0..count).map(|_| Some(rng.i64(1..=3))).collect();

    DataFrame::new()
        .with_column(&columns.title, text(title))?
        .with_column(&columns.date, ColumnData::Timestamp(dates))?
        .with_column(&columns.event, text("Impression"))?
        .with_column(&columns.page_type, text("Product Page"))?
        .with_column(&columns.source_type, text("Browse"))?
        .with_column(&columns.engagement_type, text("Tap"))?
        .with_column(&columns.device, text("iPhone"))?
        .with_column(&columns.platform_version, text("iOS 18"))?
        .with_column(&columns.territory, text("US"))?
        .with_column(&columns.count, ColumnData::Integer(counts))?
        .with_column(&columns.unique_count, ColumnData::Integer(unique_counts))
}
