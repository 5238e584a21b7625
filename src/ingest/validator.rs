//! Per-row projection from dataset columns to record drafts

use chrono::{DateTime, Datelike, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::resolver::{EntityBinding, normalize_title};
use crate::config::ColumnNames;
use crate::database::RecordDraft;
use crate::dataset::{CellError, ColumnView, DataFrame};

/// Why a row was not imported
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum RejectionReason {
    /// Title column is null, blank or missing
    #[error("app title is missing")]
    MissingTitle,

    /// Title was not in the resolution cache
    #[error("app title '{title}' did not resolve")]
    UnresolvedTitle { title: String },

    /// A record field is missing or has the wrong type
    #[error("field '{field}': {cause}")]
    InvalidField {
        field: &'static str,
        cause: CellError,
    },
}

/// A rejected row and the reason it was skipped
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RowRejection {
    pub row: usize,
    pub reason: RejectionReason,
}

/// Result of validating one row
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowOutcome {
    Accepted(RecordDraft),
    Rejected(RowRejection),
}

impl RowOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, RowOutcome::Accepted(_))
    }
}

/// Column views resolved once per import
///
/// Field names in rejections are the record field names, not the dataset
/// column names, so reports read the same whatever the column mapping.
pub struct RowValidator<'a> {
    binding: &'a EntityBinding,
    title: ColumnView<'a, String>,
    date: ColumnView<'a, DateTime<Utc>>,
    event: ColumnView<'a, String>,
    page_type: ColumnView<'a, String>,
    source_type: ColumnView<'a, String>,
    engagement_type: ColumnView<'a, String>,
    device: ColumnView<'a, String>,
    platform_version: ColumnView<'a, String>,
    territory: ColumnView<'a, String>,
    count: ColumnView<'a, i64>,
    unique_count: ColumnView<'a, i64>,
}

fn field<'a, T: crate::dataset::CellValue>(
    view: &ColumnView<'a, T>,
    row: usize,
    name: &'static str,
) -> Result<&'a T, RejectionReason> {
    view.get(row)
        .map_err(|cause| RejectionReason::InvalidField { field: name, cause })
}

/// Years the store can hold in a timestamp column
const STORABLE_YEARS: std::ops::RangeInclusive<i32> = 1..=9999;

fn storable_date(date: DateTime<Utc>) -> Result<DateTime<Utc>, RejectionReason> {
    if STORABLE_YEARS.contains(&date.year()) {
        Ok(date)
    } else {
        Err(RejectionReason::InvalidField {
            field: "date",
            cause: CellError::OutOfRange,
        })
    }
}

impl<'a> RowValidator<'a> {
    pub fn new(frame: &'a DataFrame, columns: &ColumnNames, binding: &'a EntityBinding) -> Self {
        Self {
            binding,
            title: frame.column(&columns.title),
            date: frame.column(&columns.date),
            event: frame.column(&columns.event),
            page_type: frame.column(&columns.page_type),
            source_type: frame.column(&columns.source_type),
            engagement_type: frame.column(&columns.engagement_type),
            device: frame.column(&columns.device),
            platform_version: frame.column(&columns.platform_version),
            territory: frame.column(&columns.territory),
            count: frame.column(&columns.count),
            unique_count: frame.column(&columns.unique_count),
        }
    }

    /// Validate one row
    pub fn validate(&self, row: usize) -> RowOutcome {
        match self.project(row) {
            Ok(draft) => RowOutcome::Accepted(draft),
            Err(reason) => RowOutcome::Rejected(RowRejection { row, reason }),
        }
    }

    fn project(&self, row: usize) -> Result<RecordDraft, RejectionReason> {
        let date = storable_date(*field(&self.date, row, "date")?)?;
        let event = field(&self.event, row, "event")?;
        let page_type = field(&self.page_type, row, "pageType")?;
        let source_type = field(&self.source_type, row, "sourceType")?;
        let engagement_type = field(&self.engagement_type, row, "engagementType")?;
        let device = field(&self.device, row, "device")?;
        let platform_version = field(&self.platform_version, row, "platformVersion")?;
        let territory = field(&self.territory, row, "territory")?;
        let count = *field(&self.count, row, "count")?;
        let unique_count = *field(&self.unique_count, row, "uniqueCount")?;
        let app_id = self.app_id(row)?;

        Ok(RecordDraft {
            date,
            app_id,
            event: event.clone(),
            page_type: page_type.clone(),
            source_type: source_type.clone(),
            engagement_type: engagement_type.clone(),
            device: device.clone(),
            platform_version: platform_version.clone(),
            territory: territory.clone(),
            count,
            unique_count,
        })
    }

    fn app_id(&self, row: usize) -> Result<Uuid, RejectionReason> {
        match self.binding {
            EntityBinding::Fixed(id) => Ok(*id),
            EntityBinding::PerTitle(cache) => {
                let title = self
                    .title
                    .value(row)
                    .and_then(|t| normalize_title(t))
                    .ok_or(RejectionReason::MissingTitle)?;
                cache
                    .get(title)
                    .ok_or_else(|| RejectionReason::UnresolvedTitle {
                        title: title.to_string(),
                    })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{ColumnData, ColumnKind};
    use crate::ingest::TitleCache;
    use chrono::TimeZone;

    fn frame(titles: Vec<Option<&str>>, dates: Vec<Option<i64>>) -> DataFrame {
        let n = titles.len();
        let text = |v: &str| ColumnData::Text(vec![Some(v.to_string()); n]);
        DataFrame::new()
            .with_column(
                "appTitle",
                ColumnData::Text(titles.into_iter().map(|t| t.map(String::from)).collect()),
            )
            .unwrap()
            .with_column(
                "date",
                ColumnData::Timestamp(
                    dates
                        .into_iter()
                        .map(|d| d.map(|s| Utc.timestamp_opt(s, 0).unwrap()))
                        .collect(),
                ),
            )
            .unwrap()
            .with_column("event", text("Impression"))
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
            .with_column("count", ColumnData::Integer(vec![Some(2); n]))
            .unwrap()
            .with_column("uniqueCount", ColumnData::Integer(vec![Some(1); n]))
            .unwrap()
    }

    fn acme_binding() -> (EntityBinding, Uuid) {
        let id = Uuid::new_v4();
        let mut cache = TitleCache::new();
        cache.insert("Acme", id, false);
        (EntityBinding::PerTitle(cache), id)
    }

    #[test]
    fn test_accepts_complete_row() {
        let frame = frame(vec![Some("Acme")], vec![Some(1_700_000_000)]);
        let (binding, id) = acme_binding();
        let validator = RowValidator::new(&frame, &ColumnNames::default(), &binding);

        let RowOutcome::Accepted(draft) = validator.validate(0) else {
            panic!("row should be accepted");
        };
        assert_eq!(draft.app_id, id);
        assert_eq!(draft.count, 2);
        assert_eq!(draft.territory, "US");
    }

    #[test]
    fn test_rejects_null_date() {
        let frame = frame(vec![Some("Acme"), Some("Acme")], vec![Some(1), None]);
        let (binding, _) = acme_binding();
        let validator = RowValidator::new(&frame, &ColumnNames::default(), &binding);

        assert!(validator.validate(0).is_accepted());
        assert_eq!(
            validator.validate(1),
            RowOutcome::Rejected(RowRejection {
                row: 1,
                reason: RejectionReason::InvalidField {
                    field: "date",
                    cause: CellError::Null,
                },
            })
        );
    }

    #[test]
    fn test_rejects_date_beyond_year_9999() {
        // Epoch milliseconds read as seconds land in year 56302
        let frame = frame(
            vec![Some("Acme"), Some("Acme")],
            vec![Some(1_714_557_600), Some(1_714_557_600_000)],
        );
        let (binding, _) = acme_binding();
        let validator = RowValidator::new(&frame, &ColumnNames::default(), &binding);

        assert!(validator.validate(0).is_accepted());
        assert_eq!(
            validator.validate(1),
            RowOutcome::Rejected(RowRejection {
                row: 1,
                reason: RejectionReason::InvalidField {
                    field: "date",
                    cause: CellError::OutOfRange,
                },
            })
        );
    }

    #[test]
    fn test_rejects_missing_and_unknown_titles() {
        let frame = frame(
            vec![None, Some("   "), Some("Globex")],
            vec![Some(1), Some(2), Some(3)],
        );
        let (binding, _) = acme_binding();
        let validator = RowValidator::new(&frame, &ColumnNames::default(), &binding);

        let reasons: Vec<_> = (0..3)
            .map(|row| match validator.validate(row) {
                RowOutcome::Rejected(rejection) => rejection.reason,
                RowOutcome::Accepted(_) => panic!("row {row} should be rejected"),
            })
            .collect();
        assert_eq!(reasons[0], RejectionReason::MissingTitle);
        assert_eq!(reasons[1], RejectionReason::MissingTitle);
        assert_eq!(
            reasons[2],
            RejectionReason::UnresolvedTitle {
                title: "Globex".to_string()
            }
        );
    }

    #[test]
    fn test_fixed_binding_ignores_titles() {
        let frame = frame(vec![None, Some("Globex")], vec![Some(1), Some(2)]);
        let id = Uuid::new_v4();
        let binding = EntityBinding::Fixed(id);
        let validator = RowValidator::new(&frame, &ColumnNames::default(), &binding);

        for row in 0..2 {
            match validator.validate(row) {
                RowOutcome::Accepted(draft) => assert_eq!(draft.app_id, id),
                RowOutcome::Rejected(r) => panic!("unexpected rejection: {}", r.reason),
            }
        }
    }

    #[test]
    fn test_type_mismatch_and_custom_column_names() {
        let frame = frame(vec![Some("Acme")], vec![Some(1)])
            .with_column("hits", ColumnData::Text(vec![Some("many".to_string())]))
            .unwrap();
        let columns = ColumnNames {
            count: "hits".to_string(),
            ..Default::default()
        };
        let (binding, _) = acme_binding();
        let validator = RowValidator::new(&frame, &columns, &binding);

        let RowOutcome::Rejected(rejection) = validator.validate(0) else {
            panic!("row should be rejected");
        };
        assert_eq!(
            rejection.reason,
            RejectionReason::InvalidField {
                field: "count",
                cause: CellError::TypeMismatch {
                    expected: ColumnKind::Integer,
                    found: ColumnKind::Text,
                },
            }
        );
    }
}
