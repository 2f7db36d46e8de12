//! trustsnap CLI
//!
//! Command-line interface for versioned trust snapshots: publishing,
//! diffing, changelog upkeep, the deploy gate and rollbacks.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use trustsnap_core::errors::ExError;
use trustsnap_core_types::RequestId;

mod commands;

#[derive(Debug, Parser)]
#[command(name = "trustsnap")]
#[command(about = "Trust snapshot versioning, deploy gate and rollback", long_about = None)]
struct Cli {
    /// SQLite database path (overrides the config file)
    #[arg(long, global = true, env = "TRUSTSNAP_DB")]
    db: Option<PathBuf>,

    /// Configuration file (defaults to ./trustsnap.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Snapshot operations
    Snapshot(commands::snapshot::SnapshotArgs),
    /// Public changelog operations
    Changelog(commands::changelog::ChangelogArgs),
    /// Deploy gate checks
    Gate(commands::gate::GateArgs),
    /// Rollback operations
    Rollback(commands::rollback::RollbackArgs),
}

fn main() {
    // a missing .env is normal
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let request_id = RequestId::new();

    let result = commands::Context::open(cli.db.as_deref(), cli.config.as_deref()).and_then(
        |ctx| {
            let _span = tracing::info_span!("trustsnap", request_id = %request_id).entered();
            match cli.command {
                Commands::Snapshot(args) => commands::snapshot::execute(args, &ctx),
                Commands::Changelog(args) => commands::changelog::execute(args, &ctx),
                Commands::Gate(args) => commands::gate::execute(args, &ctx),
                Commands::Rollback(args) => commands::rollback::execute(args, &ctx),
            }
        },
    );

    if let Err(e) = result {
        match e.downcast_ref::<ExError>() {
            Some(ex) => {
                let ex = ex.clone().with_request_id(request_id);
                eprintln!("Error: {}", ex);
                for failure in ex.failures() {
                    eprintln!("  - {}", failure);
                }
                if let Some(id) = ex.request_id() {
                    eprintln!("  request_id: {}", id);
                }
            }
            None => eprintln!("Error: {:#}", e),
        }
        std::process::exit(1);
    }
}
