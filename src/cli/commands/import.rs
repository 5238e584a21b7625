//! Import command
//!
//! Loads a JSON array or JSON Lines export and runs it through the bulk
//! loader.

use std::path::PathBuf;

use super::{open_workspace, parse_uuid, runtime};
use crate::cli::error::CliError;
use crate::database::IngestStore;
use crate::dataset::DataFrame;
use crate::ingest::{BulkLoader, ImportReport};

/// Import command arguments
#[derive(Debug, Clone)]
pub struct ImportArgs {
    /// Workspace path
    pub workspace: PathBuf,
    /// Input file (.json, .jsonl or .ndjson)
    pub input: PathBuf,
    /// Bind every row to this app instead of resolving titles
    pub entity: Option<String>,
    /// Override `loader.chunk_size`
    pub chunk_size: Option<usize>,
    /// Bind rows to the fallback app instead of resolving titles
    pub no_resolve: bool,
    /// Print the report as JSON
    pub json: bool,
}

pub fn handle_import(args: &ImportArgs) -> Result<(), CliError> {
    if !args.input.exists() {
        return Err(CliError::FileNotFound(args.input.clone()));
    }
    let entity = args.entity.as_deref().map(parse_uuid).transpose()?;

    runtime()?.block_on(async {
        let (mut config, store) = open_workspace(&args.workspace).await?;
        if let Some(chunk_size) = args.chunk_size {
            config.loader.chunk_size = chunk_size;
        }
        if args.no_resolve {
            config.loader.resolve_titles = false;
        }
        config.validate()?;

        if let Some(id) = entity
            && !store.list_entities().await?.iter().any(|app| app.id == id)
        {
            return Err(CliError::AppNotFound(id));
        }

        let frame = DataFrame::from_path(&args.input, &config.columns.frame_schema())?;
        let report = BulkLoader::with_config(&store, &config)
            .import_with_report(&frame, entity)
            .await?;

        print_report(&report, args.json)
    })
}

pub(crate) fn print_report(report: &ImportReport, json: bool) -> Result<(), CliError> {
    if json {
        let output = serde_json::to_string_pretty(report)
            .map_err(|e| CliError::IoError(format!("Failed to serialize report: {}", e)))?;
        println!("{}", output);
        return Ok(());
    }

    println!(
        "Imported {} of {} rows in {} chunks ({:.2}s, {:.0} rows/s)",
        report.imported,
        report.total_rows,
        report.chunks_committed,
        report.duration.as_secs_f64(),
        report.throughput()
    );
    if report.entities_created > 0 {
        println!("Created {} apps", report.entities_created);
    }
    if report.rejected_count > 0 {
        println!("Rejected {} rows:", report.rejected_count);
        for rejection in &report.rejections {
            println!("  row {}: {}", rejection.row, rejection.reason);
        }
        let unreported = report.unreported_rejections();
        if unreported > 0 {
            println!("  ... and {} more", unreported);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands::init::{InitArgs, handle_init};
    use crate::database::{DuckDBStore, RecordPredicate};
    use crate::config::IngestConfig;
    use tempfile::tempdir;

    #[test]
    fn test_import_jsonl_file() {
        let dir = tempdir().unwrap();
        handle_init(&InitArgs {
            workspace: dir.path().to_path_buf(),
            force: false,
        })
        .unwrap();

        let input = dir.path().join("export.jsonl");
        let row = |title: &str, date: &str| {
            format!(
                r#"{{"appTitle":"{title}","date":"{date}","event":"Impression","pageType":"Product Page","sourceType":"Browse","engagementType":"Tap","device":"iPhone","platformVersion":"iOS 18","territory":"US","count":2,"uniqueCount":1}}"#
            )
        };
        let lines = [
            row("Acme", "2024-05-01T10:00:00Z"),
            row("Acme", "not a date"),
            row("Globex", "2024-05-01T10:00:02Z"),
        ];
        std::fs::write(&input, lines.join("\n")).unwrap();

        handle_import(&ImportArgs {
            workspace: dir.path().to_path_buf(),
            input,
            entity: None,
            chunk_size: Some(2),
            no_resolve: false,
            json: false,
        })
        .unwrap();

        let config = IngestConfig::load(dir.path()).unwrap();
        let store = DuckDBStore::new(config.database_path(dir.path())).unwrap();
        let rt = runtime().unwrap();
        assert_eq!(
            rt.block_on(store.count_records(RecordPredicate::All)).unwrap(),
            2
        );
        assert_eq!(rt.block_on(store.count_entities()).unwrap(), 3);
    }

    #[test]
    fn test_import_missing_file() {
        let args = ImportArgs {
            workspace: PathBuf::from("."),
            input: PathBuf::from("does-not-exist.jsonl"),
            entity: None,
            chunk_size: None,
            no_resolve: false,
            json: false,
        };
        assert!(matches!(handle_import(&args), Err(CliError::FileNotFound(_))));
    }
}
