//! App deletion and cleanup commands

use std::path::PathBuf;
use std::sync::Arc;

use super::{open_workspace, parse_uuid, runtime};
use crate::cli::error::CliError;
use crate::database::IngestStore;
use crate::maintenance::{MaintenanceScheduler, remove_zero_count_records};

/// Delete-app command arguments
#[derive(Debug, Clone)]
pub struct DeleteAppArgs {
    /// Workspace path
    pub workspace: PathBuf,
    /// App id
    pub id: String,
    /// Exit without waiting for the debounced cleanup
    pub no_cleanup: bool,
}

/// Cleanup command arguments
#[derive(Debug, Clone)]
pub struct CleanupArgs {
    /// Workspace path
    pub workspace: PathBuf,
}

/// Delete an app and its records, then wait for the debounced cleanup
pub fn handle_delete_app(args: &DeleteAppArgs) -> Result<(), CliError> {
    let id = parse_uuid(&args.id)?;

    runtime()?.block_on(async {
        let (config, store) = open_workspace(&args.workspace).await?;
        let store = Arc::new(store);

        let scheduler = (config.maintenance.enabled && !args.no_cleanup).then(|| {
            MaintenanceScheduler::attach(Arc::clone(&store), config.maintenance.delay())
        });

        if !store.delete_entity(id).await? {
            return Err(CliError::AppNotFound(id));
        }
        println!("Deleted app {}", id);

        if let Some(scheduler) = scheduler {
            println!(
                "Waiting {}ms before zero-count cleanup",
                scheduler.delay().as_millis()
            );
            scheduler.flush().await;
            let stats = scheduler.stats();
            if stats.failures > 0 {
                println!("Cleanup failed; run 'app-ingest cleanup' to retry");
            } else {
                println!("Removed {} zero-count records", stats.rows_removed);
            }
        }
        Ok(())
    })
}

/// Remove zero-count records immediately
pub fn handle_cleanup(args: &CleanupArgs) -> Result<(), CliError> {
    runtime()?.block_on(async {
        let (_, store) = open_workspace(&args.workspace).await?;
        let removed = remove_zero_count_records(&store).await?;
        println!("Removed {} zero-count records", removed);
        Ok::<_, CliError>(())
    })
}
