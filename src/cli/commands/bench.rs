//! Synthetic import benchmark

use std::path::PathBuf;
use std::time::Instant;

use super::{open_workspace, runtime};
use crate::cli::error::CliError;
use crate::config::IngestConfig;
use crate::database::{DuckDBStore, IngestStore};
use crate::dataset::synthetic;
use crate::ingest::{BulkLoader, LoaderOptions};

/// Bench command arguments
#[derive(Debug, Clone)]
pub struct BenchArgs {
    /// Rows to generate
    pub rows: usize,
    /// Title every generated row carries
    pub title: String,
    /// Override `loader.chunk_size`
    pub chunk_size: Option<usize>,
    /// Import into this workspace's database instead of an in-memory one
    pub workspace: Option<PathBuf>,
}

pub fn handle_bench(args: &BenchArgs) -> Result<(), CliError> {
    if args.rows == 0 {
        return Err(CliError::InvalidArgument(
            "--rows must be greater than zero".to_string(),
        ));
    }

    runtime()?.block_on(async {
        let (config, store) = match &args.workspace {
            Some(workspace) => open_workspace(workspace).await?,
            None => {
                let store = DuckDBStore::in_memory()?;
                store.initialize().await?;
                (IngestConfig::default(), store)
            }
        };

        let mut options = LoaderOptions::from(&config);
        if let Some(chunk_size) = args.chunk_size {
            options = options.with_chunk_size(chunk_size);
        }

        let generated = Instant::now();
        let frame = synthetic::generate(args.rows, &args.title, &options.columns)?;
        println!(
            "Generated {} rows in {:.2}s",
            frame.row_count(),
            generated.elapsed().as_secs_f64()
        );

        let report = BulkLoader::new(&store, options)
            .import_with_report(&frame, None)
            .await?;
        println!(
            "Imported {} rows in {:.2}s ({:.0} rows/s, {} chunks)",
            report.imported,
            report.duration.as_secs_f64(),
            report.throughput(),
            report.chunks_committed
        );
        Ok::<_, CliError>(())
    })
}
