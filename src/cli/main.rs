//! CLI binary entry point for app-ingest

#[cfg(feature = "cli")]
use app_analytics_ingest::cli::commands::{
    app::{CleanupArgs, DeleteAppArgs, handle_cleanup, handle_delete_app},
    bench::{BenchArgs, handle_bench},
    import::{ImportArgs, handle_import},
    init::{InitArgs, handle_init},
    status::{StatusArgs, handle_status},
};
#[cfg(feature = "cli")]
use app_analytics_ingest::dataset::synthetic::SYNTHETIC_TITLE;
#[cfg(feature = "cli")]
use clap::{Parser, Subcommand};
#[cfg(feature = "cli")]
use std::path::PathBuf;

#[cfg(feature = "cli")]
#[derive(Parser)]
#[command(name = "app-ingest")]
#[command(about = "Bulk loader for app analytics exports")]
#[command(version)]
struct Cli {
    /// Workspace path (directory holding .app-ingest.toml)
    #[arg(short, long, global = true, default_value = ".")]
    workspace: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[cfg(feature = "cli")]
#[derive(Subcommand)]
enum Commands {
    /// Write a config file and create the database
    Init {
        /// Overwrite an existing config file
        #[arg(short, long)]
        force: bool,
    },

    /// Import a JSON or JSON Lines export
    Import {
        /// Input file (.json, .jsonl or .ndjson)
        input: PathBuf,
        /// Bind every row to this app id instead of resolving titles
        #[arg(short, long)]
        entity: Option<String>,
        /// Rows per transaction
        #[arg(short, long)]
        chunk_size: Option<usize>,
        /// Bind rows to the oldest app instead of resolving titles
        #[arg(long, conflicts_with = "entity")]
        no_resolve: bool,
        /// Print the import report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Import a generated dataset and report throughput
    Bench {
        /// Rows to generate
        #[arg(short, long, default_value_t = 1_000_000)]
        rows: usize,
        /// Title of the generated app
        #[arg(short, long, default_value = SYNTHETIC_TITLE)]
        title: String,
        /// Rows per transaction
        #[arg(short, long)]
        chunk_size: Option<usize>,
        /// Import into the workspace database instead of an in-memory one
        #[arg(long)]
        persist: bool,
    },

    /// Show app and record counts
    Status,

    /// Delete an app and its records
    DeleteApp {
        /// App id
        id: String,
        /// Skip the debounced zero-count cleanup
        #[arg(long)]
        no_cleanup: bool,
    },

    /// Remove zero-count records now
    Cleanup,
}

#[cfg(feature = "cli")]
fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn,app_analytics_ingest=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let workspace = cli.workspace;

    let result = match cli.command {
        Commands::Init { force } => handle_init(&InitArgs { workspace, force }),
        Commands::Import {
            input,
            entity,
            chunk_size,
            no_resolve,
            json,
        } => {
            let args = ImportArgs {
                workspace,
                input,
                entity,
                chunk_size,
                no_resolve,
                json,
            };
            handle_import(&args)
        }
        Commands::Bench {
            rows,
            title,
            chunk_size,
            persist,
        } => {
            let args = BenchArgs {
                rows,
                title,
                chunk_size,
                workspace: persist.then_some(workspace),
            };
            handle_bench(&args)
        }
        Commands::Status => handle_status(&StatusArgs { workspace }),
        Commands::DeleteApp { id, no_cleanup } => handle_delete_app(&DeleteAppArgs {
            workspace,
            id,
            no_cleanup,
        }),
        Commands::Cleanup => handle_cleanup(&CleanupArgs { workspace }),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI feature is not enabled. Build with --features cli");
    std::process::exit(1);
}
