//! Rollback commands: check, simulate, perform, emergency, undo, history

use super::snapshot::Provenance;
use super::{print_json, Context};
use clap::{Args, Subcommand};
use trustsnap_core::version::Version;
use trustsnap_engine::{RollbackRequest, RollbackResult};

#[derive(Debug, Args)]
pub struct RollbackArgs {
    #[command(subcommand)]
    pub command: RollbackCommand,
}

#[derive(Debug, Subcommand)]
pub enum RollbackCommand {
    /// Report whether a version is eligible for rollback
    Check { version: Version },
    /// Preview a rollback without changing anything
    Simulate { version: Version },
    /// Eligibility-checked rollback
    Perform(PerformArgs),
    /// Incident rollback with minimal validation
    Emergency(PerformArgs),
    /// Roll back to the version before the active one
    Undo(Provenance),
    /// List past rollbacks, oldest first
    History {
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Args)]
pub struct PerformArgs {
    pub version: Version,

    #[command(flatten)]
    pub provenance: Provenance,
}

impl PerformArgs {
    fn request(self) -> RollbackRequest {
        RollbackRequest::new(
            self.version,
            self.provenance.actor,
            self.provenance.role,
            self.provenance.reason,
        )
    }
}

pub fn execute(args: RollbackArgs, ctx: &Context) -> anyhow::Result<()> {
    let manager = ctx.rollbacks();
    match args.command {
        RollbackCommand::Check { version } => {
            print_json(&manager.check_rollback_eligibility(&version)?)
        }
        RollbackCommand::Simulate { version } => print_json(&manager.simulate_rollback(&version)?),
        RollbackCommand::Perform(args) => {
            report(&manager.perform_rollback(&args.request())?);
            Ok(())
        }
        RollbackCommand::Emergency(args) => {
            report(&manager.perform_emergency_rollback(&args.request())?);
            Ok(())
        }
        RollbackCommand::Undo(p) => {
            report(&manager.rollback_once(&p.actor, &p.role, &p.reason)?);
            Ok(())
        }
        RollbackCommand::History { json } => {
            let history = manager.get_rollback_history()?;
            if json {
                return print_json(&history);
            }
            if history.is_empty() {
                println!("No rollbacks");
            }
            for event in history {
                println!(
                    "{} {} -> {} by {} ({}): {}",
                    event.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    event
                        .previous_version()
                        .map(|v| v.to_string())
                        .unwrap_or_else(|| "none".to_string()),
                    event.version,
                    event.actor,
                    event.role,
                    event.reason
                );
            }
            Ok(())
        }
    }
}

fn report(result: &RollbackResult) {
    println!(
        "{}:",
        if result.emergency {
            "Emergency rollback complete"
        } else {
            "Rollback complete"
        }
    );
    println!(
        "  previous: {}",
        result
            .previous_version
            .map(|v| v.to_string())
            .unwrap_or_else(|| "none".to_string())
    );
    println!("  current: {}", result.current_version);
    println!("  changelog_updated: {}", result.changelog_updated);
    for warning in &result.warnings {
        eprintln!("warning: {}", warning);
    }
}
