//! Workspace initialization command

use std::path::PathBuf;

use super::runtime;
use crate::cli::error::CliError;
use crate::config::{CONFIG_FILENAME, IngestConfig, sample_config};
use crate::database::{DuckDBStore, IngestStore};

/// Init command arguments
#[derive(Debug, Clone)]
pub struct InitArgs {
    /// Workspace path
    pub workspace: PathBuf,
    /// Overwrite an existing config file
    pub force: bool,
}

/// Write `.app-ingest.toml` and create the database schema
pub fn handle_init(args: &InitArgs) -> Result<(), CliError> {
    let workspace = &args.workspace;
    std::fs::create_dir_all(workspace)
        .map_err(|e| CliError::IoError(format!("Failed to create workspace: {}", e)))?;

    let config_path = workspace.join(CONFIG_FILENAME);
    if IngestConfig::exists(workspace) && !args.force {
        println!("Config already exists: {}", config_path.display());
    } else {
        std::fs::write(&config_path, sample_config())
            .map_err(|e| CliError::IoError(format!("Failed to write config: {}", e)))?;
        println!("Wrote {}", config_path.display());
    }

    let config = IngestConfig::load(workspace)?;
    let db_path = config.database_path(workspace);

    runtime()?.block_on(async {
        let store = DuckDBStore::new(&db_path)?;
        store.initialize().await?;
        let apps = store.count_entities().await?;
        println!("Initialized database: {} ({} apps)", db_path.display(), apps);
        Ok::<_, CliError>(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_init_creates_config_and_database() {
        let dir = tempdir().unwrap();
        let args = InitArgs {
            workspace: dir.path().join("ws"),
            force: false,
        };

        handle_init(&args).unwrap();
        assert!(IngestConfig::exists(&args.workspace));

        let config = IngestConfig::load(&args.workspace).unwrap();
        assert!(config.database_path(&args.workspace).exists());

        // Second run keeps the config and succeeds
        handle_init(&args).unwrap();
    }
}
