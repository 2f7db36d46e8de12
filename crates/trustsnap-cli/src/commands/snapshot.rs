//! Snapshot commands: create, activate, list, show, diff

use super::{print_json, Context};
use anyhow::{bail, Context as _};
use clap::{Args, Subcommand, ValueEnum};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use trustsnap_core::diff::{format_change_list, format_unified_diff, render_diff_html};
use trustsnap_core::model::{Author, Section, Snapshot, SnapshotStatus};
use trustsnap_core::rules::validate_snapshot_value;
use trustsnap_core::version::Version;

#[derive(Debug, Args)]
pub struct SnapshotArgs {
    #[command(subcommand)]
    pub command: SnapshotCommand,
}

#[derive(Debug, Subcommand)]
pub enum SnapshotCommand {
    /// Create a retired snapshot from a JSON or YAML document
    Create(CreateArgs),
    /// Make a version the single active snapshot
    Activate(ActivateArgs),
    /// List every version, newest first
    List(ListArgs),
    /// Print one snapshot as JSON
    Show(ShowArgs),
    /// Diff two versions (or a version against the one before it)
    Diff(DiffArgs),
}

/// Who is acting and why; required on every mutation.
#[derive(Debug, Args)]
pub struct Provenance {
    #[arg(long)]
    pub actor: String,

    #[arg(long)]
    pub role: String,

    #[arg(long)]
    pub reason: String,
}

#[derive(Debug, Args)]
pub struct CreateArgs {
    /// Snapshot document (.json, .yaml or .yml)
    #[arg(long)]
    pub file: PathBuf,

    #[command(flatten)]
    pub provenance: Provenance,
}

#[derive(Debug, Args)]
pub struct ActivateArgs {
    pub version: Version,

    /// Activate even if pre-activation validation reports issues
    #[arg(long)]
    pub force: bool,

    #[command(flatten)]
    pub provenance: Provenance,
}

#[derive(Debug, Args)]
pub struct ListArgs {
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct ShowArgs {
    /// Version to show; the active one when omitted
    pub version: Option<Version>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum DiffFormat {
    Unified,
    List,
    Html,
    Json,
}

#[derive(Debug, Args)]
pub struct DiffArgs {
    /// Base version; the version before `--to` when omitted
    #[arg(long)]
    pub from: Option<Version>,

    #[arg(long)]
    pub to: Version,

    #[arg(long, value_enum, default_value_t = DiffFormat::Unified)]
    pub format: DiffFormat,
}

/// On-disk snapshot document. Release time is assigned by the store; status
/// defaults to retired.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SnapshotDocument {
    version: Version,
    #[serde(default)]
    status: Option<SnapshotStatus>,
    author: Author,
    summary: String,
    sections: Vec<Section>,
}

impl SnapshotDocument {
    fn into_snapshot(self) -> Snapshot {
        let mut snapshot = Snapshot::new(self.version, self.author, self.summary, self.sections);
        if let Some(status) = self.status {
            snapshot.status = status;
        }
        snapshot
    }
}

fn read_document(path: &Path) -> anyhow::Result<SnapshotDocument> {
    let text =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let is_yaml = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    );
    let value: serde_json::Value = if is_yaml {
        serde_yaml::from_str(&text).with_context(|| format!("parsing {}", path.display()))?
    } else {
        serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?
    };
    if !validate_snapshot_value(&value) {
        bail!("{} is not a snapshot document", path.display());
    }
    serde_json::from_value(value).with_context(|| format!("reading fields of {}", path.display()))
}

pub fn execute(args: SnapshotArgs, ctx: &Context) -> anyhow::Result<()> {
    match args.command {
        SnapshotCommand::Create(args) => execute_create(args, ctx),
        SnapshotCommand::Activate(args) => execute_activate(args, ctx),
        SnapshotCommand::List(args) => execute_list(args, ctx),
        SnapshotCommand::Show(args) => execute_show(args, ctx),
        SnapshotCommand::Diff(args) => execute_diff(args, ctx),
    }
}

fn execute_create(args: CreateArgs, ctx: &Context) -> anyhow::Result<()> {
    let document = read_document(&args.file)?;

    let issues = ctx
        .gate()
        .validate_new_snapshot(&document.version.to_string())?;
    if !issues.is_empty() {
        bail!(
            "cannot create {}:\n  - {}",
            document.version,
            issues.join("\n  - ")
        );
    }

    let p = &args.provenance;
    let snapshot = ctx.snapshots.create(
        document.into_snapshot(),
        &p.actor,
        &p.role,
        &p.reason,
    )?;

    println!("Snapshot created:");
    println!("  version: {}", snapshot.version);
    println!("  status: {}", snapshot.status);
    println!("  sections: {}", snapshot.sections.len());
    Ok(())
}

fn execute_activate(args: ActivateArgs, ctx: &Context) -> anyhow::Result<()> {
    let issues = ctx.gate().validate_for_activation(&args.version)?;
    if !issues.is_empty() {
        if !args.force {
            bail!(
                "cannot activate {}:\n  - {}",
                args.version,
                issues.join("\n  - ")
            );
        }
        for issue in &issues {
            eprintln!("warning: {}", issue);
        }
    }

    let p = &args.provenance;
    let outcome = ctx
        .snapshots
        .activate(&args.version, &p.actor, &p.role, &p.reason)?;

    if outcome.changed {
        println!("Snapshot activated:");
        println!("  version: {}", outcome.version);
        if let Some(previous) = outcome.previous {
            println!("  previous: {}", previous);
        }
    } else {
        println!("{} is already active (no change)", outcome.version);
    }
    Ok(())
}

fn execute_list(args: ListArgs, ctx: &Context) -> anyhow::Result<()> {
    let snapshots = ctx.snapshots.get_all_versions()?;
    if args.json {
        return print_json(&snapshots);
    }
    if snapshots.is_empty() {
        println!("No snapshots");
        return Ok(());
    }
    for s in snapshots {
        println!(
            "{:<10} {:<8} {}  {}",
            s.version.to_string(),
            s.status.as_str(),
            s.released_at.format("%Y-%m-%d"),
            s.summary
        );
    }
    Ok(())
}

fn execute_show(args: ShowArgs, ctx: &Context) -> anyhow::Result<()> {
    let snapshot = match args.version {
        Some(v) => ctx.snapshots.get(&v)?,
        None => ctx.snapshots.get_active_snapshot()?,
    };
    match snapshot {
        Some(s) => print_json(&s),
        None => match args.version {
            Some(v) => bail!("snapshot {} does not exist", v),
            None => bail!("no active snapshot"),
        },
    }
}

fn execute_diff(args: DiffArgs, ctx: &Context) -> anyhow::Result<()> {
    let diff = match args.from {
        Some(from) => ctx.snapshots.get_diff_between(&from, &args.to)?,
        None => ctx.snapshots.get_diff_from_previous(&args.to)?,
    };

    match args.format {
        DiffFormat::Unified => print!("{}", format_unified_diff(&diff)),
        DiffFormat::List => println!("{}", format_change_list(&diff)),
        DiffFormat::Html => print!("{}", render_diff_html(&diff)),
        DiffFormat::Json => print_json(&diff)?,
    }
    Ok(())
}
