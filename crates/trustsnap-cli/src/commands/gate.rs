//! Deploy gate commands: check, status

use super::{print_json, Context};
use anyhow::bail;
use clap::{Args, Subcommand};
use trustsnap_core::version::Version;
use trustsnap_engine::GateConfig;

#[derive(Debug, Args)]
pub struct GateArgs {
    #[command(subcommand)]
    pub command: GateCommand,
}

#[derive(Debug, Subcommand)]
pub enum GateCommand {
    /// Run every check, print the report, exit 1 on failure
    Check(CheckArgs),
    /// Print the HTTP-shaped result (status + JSON body)
    Status(CheckArgs),
}

#[derive(Debug, Args)]
pub struct CheckArgs {
    /// Expected UI version (overrides TRUSTSNAP_EXPECTED_UI_VERSION and the config file)
    #[arg(long)]
    pub expected_version: Option<Version>,
}

impl CheckArgs {
    fn config(&self, ctx: &Context) -> GateConfig {
        match self.expected_version {
            Some(v) => GateConfig::new(Some(v)),
            None => ctx.gate_config.clone(),
        }
    }
}

pub fn execute(args: GateArgs, ctx: &Context) -> anyhow::Result<()> {
    match args.command {
        GateCommand::Check(args) => {
            if !ctx.gate_with(args.config(ctx)).run_deploy_gate_cli() {
                bail!("deploy gate failed");
            }
            Ok(())
        }
        GateCommand::Status(args) => {
            let result = ctx.gate_with(args.config(ctx)).deploy_gate_http_status();
            print_json(&result)
        }
    }
}
