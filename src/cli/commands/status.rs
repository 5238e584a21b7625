//! Workspace status command

use std::path::PathBuf;

use super::{open_workspace, runtime};
use crate::cli::error::CliError;
use crate::database::{IngestStore, RecordPredicate};

/// Status command arguments
#[derive(Debug, Clone)]
pub struct StatusArgs {
    /// Workspace path
    pub workspace: PathBuf,
}

/// Print app and record counts
pub fn handle_status(args: &StatusArgs) -> Result<(), CliError> {
    runtime()?.block_on(async {
        let (config, store) = open_workspace(&args.workspace).await?;

        println!("Database: {}", config.database_path(&args.workspace).display());
        println!("Backend: {}", store.backend_type());
        println!("Records: {}", store.count_records(RecordPredicate::All).await?);
        println!(
            "Zero-count records: {}",
            store.count_records(RecordPredicate::CountEquals(0)).await?
        );

        let apps = store.list_entities().await?;
        println!("Apps: {}", apps.len());
        for app in &apps {
            let records = store.count_records(RecordPredicate::Entity(app.id)).await?;
            println!("  {}  {:<32} {:>10}", app.id, app.title, records);
        }
        Ok::<_, CliError>(())
    })
}
