//! Subcommands and the shared store context they run against.

pub mod changelog;
pub mod gate;
pub mod rollback;
pub mod snapshot;

use anyhow::Context as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use trustsnap_core::logging_facility::{init, Profile};
use trustsnap_engine::config::DEFAULT_CONFIG_FILE;
use trustsnap_engine::{DeployGate, GateConfig, RollbackManager, TrustConfig};
use trustsnap_store::{ChangelogStore, SnapshotStore, SqliteStorage};

const DEFAULT_DB_PATH: &str = ".trustsnap/trust.db";

/// Stores opened once per invocation.
pub struct Context {
    pub snapshots: SnapshotStore,
    pub changelog: ChangelogStore,
    pub gate_config: GateConfig,
}

impl Context {
    /// Resolve configuration, start logging and open the database.
    ///
    /// Precedence for the database path: `--db` / `TRUSTSNAP_DB`, then the
    /// config file, then `.trustsnap/trust.db`.
    pub fn open(db: Option<&Path>, config: Option<&Path>) -> anyhow::Result<Self> {
        let config = match config {
            Some(path) => TrustConfig::load(path)?,
            None => TrustConfig::load_optional(Path::new(DEFAULT_CONFIG_FILE))?,
        };

        init_logging(config.log_profile.as_deref())?;

        let db_path: PathBuf = db
            .map(Path::to_path_buf)
            .or_else(|| config.db_path.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH));
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }

        let storage = Arc::new(SqliteStorage::open(&db_path)?);
        tracing::debug!(db = %db_path.display(), "Opened trust database");

        Ok(Self {
            snapshots: SnapshotStore::new(storage.clone()),
            changelog: ChangelogStore::new(storage),
            gate_config: config.gate_config(),
        })
    }

    pub fn gate(&self) -> DeployGate<'_> {
        self.gate_with(self.gate_config.clone())
    }

    pub fn gate_with(&self, config: GateConfig) -> DeployGate<'_> {
        DeployGate::new(&self.snapshots, &self.changelog, config)
    }

    pub fn rollbacks(&self) -> RollbackManager<'_> {
        RollbackManager::new(&self.snapshots, &self.changelog)
    }
}

/// Logging stays off unless a profile is configured or `RUST_LOG` is set,
/// so command output on stdout is never interleaved with log lines.
fn init_logging(profile: Option<&str>) -> anyhow::Result<()> {
    let profile = match profile {
        Some(name) => Some(name.parse::<Profile>().map_err(anyhow::Error::msg)?),
        None if std::env::var_os("RUST_LOG").is_some() => Some(Profile::Development),
        None => None,
    };
    if let Some(profile) = profile {
        init(profile);
    }
    Ok(())
}

/// Print any serialisable value as pretty JSON on stdout.
pub fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
