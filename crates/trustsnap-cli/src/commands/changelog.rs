//! Changelog commands: add, list, lint

use super::{print_json, Context};
use anyhow::bail;
use chrono::{NaiveDate, Utc};
use clap::{Args, Subcommand};
use trustsnap_core::marketing::validate_marketing_safe;
use trustsnap_core::model::{ChangeType, ChangelogEntry};
use trustsnap_core::version::Version;

#[derive(Debug, Args)]
pub struct ChangelogArgs {
    #[command(subcommand)]
    pub command: ChangelogCommand,
}

#[derive(Debug, Subcommand)]
pub enum ChangelogCommand {
    /// Add the public entry for a version
    Add(AddArgs),
    /// List entries, newest first
    List(ListArgs),
    /// Lint text (or every stored entry) for marketing safety
    Lint(LintArgs),
}

#[derive(Debug, Args)]
pub struct AddArgs {
    #[arg(long)]
    pub version: Version,

    /// clarification, addition or scope-change
    #[arg(long = "type")]
    pub change_type: ChangeType,

    #[arg(long)]
    pub summary: String,

    #[arg(long)]
    pub customer_impact: String,

    /// Defaults to the trust page anchor for the version
    #[arg(long)]
    pub link: Option<String>,

    /// YYYY-MM-DD; defaults to today (UTC)
    #[arg(long)]
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Args)]
pub struct ListArgs {
    #[arg(long = "type")]
    pub change_type: Option<ChangeType>,

    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct LintArgs {
    /// Text to lint; every stored entry is linted when omitted
    pub text: Option<String>,
}

pub fn execute(args: ChangelogArgs, ctx: &Context) -> anyhow::Result<()> {
    match args.command {
        ChangelogCommand::Add(args) => execute_add(args, ctx),
        ChangelogCommand::List(args) => execute_list(args, ctx),
        ChangelogCommand::Lint(args) => execute_lint(args, ctx),
    }
}

fn execute_add(args: AddArgs, ctx: &Context) -> anyhow::Result<()> {
    let entry = ChangelogEntry {
        version: args.version,
        date: args.date.unwrap_or_else(|| Utc::now().date_naive()),
        change_type: args.change_type,
        link: args
            .link
            .unwrap_or_else(|| ChangelogEntry::default_link(&args.version)),
        summary: args.summary,
        customer_impact: args.customer_impact,
    };

    for violation in validate_marketing_safe(&entry.summary) {
        eprintln!("warning: summary: {}", violation);
    }
    for violation in validate_marketing_safe(&entry.customer_impact) {
        eprintln!("warning: customer_impact: {}", violation);
    }

    let entry = ctx.changelog.add_entry(entry)?;
    println!("Changelog entry added:");
    println!("  version: {}", entry.version);
    println!("  type: {}", entry.change_type);
    println!("  link: {}", entry.link);
    Ok(())
}

fn execute_list(args: ListArgs, ctx: &Context) -> anyhow::Result<()> {
    let entries = match args.change_type {
        Some(t) => ctx.changelog.get_entries_by_type(t)?,
        None => ctx.changelog.get_all_entries()?,
    };
    if args.json {
        return print_json(&entries);
    }
    if entries.is_empty() {
        println!("No changelog entries");
        return Ok(());
    }
    for e in entries {
        println!("{} {} [{}] {}", e.version, e.date, e.change_type, e.summary);
        println!("    {}", e.customer_impact);
    }
    Ok(())
}

fn execute_lint(args: LintArgs, ctx: &Context) -> anyhow::Result<()> {
    match args.text {
        Some(text) => {
            let violations = validate_marketing_safe(&text);
            if violations.is_empty() {
                println!("OK");
                return Ok(());
            }
            for v in &violations {
                println!("- {}", v);
            }
            bail!("{} marketing-safety violation(s)", violations.len());
        }
        None => {
            let findings = ctx.changelog.lint_all()?;
            if findings.is_empty() {
                println!("OK");
                return Ok(());
            }
            for finding in &findings {
                println!("{}:", finding.version);
                for v in &finding.violations {
                    println!("  - {}", v);
                }
            }
            bail!("{} entries with marketing-safety violations", findings.len());
        }
    }
}
