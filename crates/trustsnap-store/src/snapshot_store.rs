//! Versioned snapshot store with a single active version.
//!
//! The store keeps an index of every persisted snapshot behind one mutex.
//! The index is loaded lazily from the storage port, and every mutation holds
//! the lock for its whole retire-then-activate sequence. Each mutation reaches
//! storage as a single all-or-nothing write carrying its status changes and
//! audit events. The index is updated only after that write succeeds; on a
//! storage failure it is dropped and rebuilt from storage on next access.
//!
//! ## Duplicate active records
//!
//! Storage written by older tooling can hold more than one `active` record.
//! Loading such data never fails: the highest active version is reported as
//! active, the full list is kept as an anomaly, and a warning is logged. The
//! next activation retires every stray active record.

use crate::audit_log::AuditLog;
use crate::errors::{lock_poisoned, Result};
use crate::storage::TrustStorage;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;
use trustsnap_core::diff::{diff_against_empty, diff_snapshots, SnapshotDiff};
use trustsnap_core::errors::{ExError, ExErrorKind};
use trustsnap_core::model::audit::META_PREVIOUS_VERSION;
use trustsnap_core::model::{AuditEvent, AuditEventType, Snapshot, SnapshotStatus};
use trustsnap_core::rules::snapshot_issues;
use trustsnap_core::version::Version;
use trustsnap_core::{log_op_end, log_op_error, log_op_start};

/// Result of an activation or rollback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationOutcome {
    /// Version that is active afterwards.
    pub version: Version,
    /// Version that was reported active before the call.
    pub previous: Option<Version>,
    /// False when the target was already the sole active version.
    pub changed: bool,
}

struct SnapshotIndex {
    snapshots: BTreeMap<Version, Snapshot>,
    active: Option<Version>,
    duplicate_active: Vec<Version>,
}

impl SnapshotIndex {
    fn load(storage: &dyn TrustStorage) -> Result<Self> {
        let snapshots: BTreeMap<Version, Snapshot> = storage
            .list_snapshots()?
            .into_iter()
            .map(|s| (s.version, s))
            .collect();

        let actives: Vec<Version> = snapshots
            .values()
            .filter(|s| s.is_active())
            .map(|s| s.version)
            .collect();

        // BTreeMap iteration is ascending, so the last active is the highest
        let active = actives.last().copied();
        let duplicate_active = if actives.len() > 1 {
            tracing::warn!(
                versions = ?actives.iter().map(|v| v.to_string()).collect::<Vec<_>>(),
                reported = ?active.map(|v| v.to_string()),
                "Multiple active snapshots in storage; reporting the highest"
            );
            actives
        } else {
            Vec::new()
        };

        tracing::debug!(
            snapshot_count = snapshots.len(),
            active = ?active.map(|v| v.to_string()),
            "Loaded snapshot index"
        );

        Ok(Self {
            snapshots,
            active,
            duplicate_active,
        })
    }

    fn get(&self, version: &Version) -> Result<&Snapshot> {
        self.snapshots.get(version).ok_or_else(|| not_found(version))
    }

    /// Active-status records other than `target`.
    fn other_actives(&self, target: &Version) -> Vec<Version> {
        self.snapshots
            .values()
            .filter(|s| s.is_active() && &s.version != target)
            .map(|s| s.version)
            .collect()
    }

    fn set_status(&mut self, version: &Version, status: SnapshotStatus) {
        if let Some(snapshot) = self.snapshots.get_mut(version) {
            snapshot.status = status;
        }
    }
}

fn not_found(version: &Version) -> ExError {
    ExError::new(ExErrorKind::NotFound)
        .with_version(version)
        .with_message(format!("snapshot {} does not exist", version))
}

fn require_text(op: &str, version: &Version, fields: [(&str, &str); 3]) -> Result<()> {
    for (field, value) in fields {
        if value.trim().is_empty() {
            return Err(ExError::new(ExErrorKind::InvalidInput)
                .with_op(op.to_string())
                .with_version(version)
                .with_message(format!("{} must not be empty", field)));
        }
    }
    Ok(())
}

/// Failures after which the cached index may disagree with storage.
fn is_storage_failure(err: &ExError) -> bool {
    matches!(
        err.kind(),
        ExErrorKind::Persistence | ExErrorKind::Serialization | ExErrorKind::Internal
    )
}

/// Versioned, immutable snapshots with exactly one active version.
pub struct SnapshotStore {
    storage: Arc<dyn TrustStorage>,
    audit: AuditLog,
    index: Mutex<Option<SnapshotIndex>>,
}

impl SnapshotStore {
    /// Build a store over a storage port. Nothing is read until first use.
    pub fn new(storage: Arc<dyn TrustStorage>) -> Self {
        Self {
            audit: AuditLog::new(Arc::clone(&storage)),
            storage,
            index: Mutex::new(None),
        }
    }

    /// The audit log sharing this store's backend.
    pub fn audit_log(&self) -> &AuditLog {
        &self.audit
    }

    fn lock(&self, op: &str) -> Result<MutexGuard<'_, Option<SnapshotIndex>>> {
        self.index.lock().map_err(|_| lock_poisoned(op))
    }

    /// Run `f` against the loaded index, loading it first if needed.
    fn with_index<R>(&self, op: &str, f: impl FnOnce(&SnapshotIndex) -> Result<R>) -> Result<R> {
        let mut guard = self.lock(op)?;
        if guard.is_none() {
            *guard = Some(SnapshotIndex::load(self.storage.as_ref())?);
        }
        match guard.as_ref() {
            Some(index) => f(index),
            None => Err(lock_poisoned(op)),
        }
    }

    /// Run a mutation with the lock held; storage failures drop the index.
    fn mutate<R>(
        &self,
        op: &str,
        f: impl FnOnce(&mut SnapshotIndex) -> Result<R>,
    ) -> Result<R> {
        let mut guard = self.lock(op)?;
        if guard.is_none() {
            *guard = Some(SnapshotIndex::load(self.storage.as_ref())?);
        }
        let result = match guard.as_mut() {
            Some(index) => f(index),
            None => Err(lock_poisoned(op)),
        };
        if let Err(e) = &result {
            if is_storage_failure(e) {
                tracing::warn!(op = op, "Dropping snapshot index after storage failure");
                *guard = None;
            }
        }
        result
    }

    /// Store a new snapshot. It is always created retired.
    ///
    /// # Errors
    ///
    /// - `InvalidInput` if the snapshot fails schema validation or a
    ///   provenance field is blank
    /// - `InvalidActivationTarget` if the snapshot claims to be active
    /// - `AlreadyExists` if the version is taken
    /// - `Persistence` if the backend rejects a write
    pub fn create(
        &self,
        snapshot: Snapshot,
        actor: &str,
        role: &str,
        reason: &str,
    ) -> Result<Snapshot> {
        let version = snapshot.version;
        log_op_start!("snapshot_create", version = %version);
        let start = Instant::now();

        let result = self
            .create_impl(snapshot, actor, role, reason)
            .map_err(|e| {
                log_op_error!(
                    "snapshot_create",
                    e,
                    duration_ms = start.elapsed().as_millis() as u64
                );
                e.with_op("snapshot_create")
            })?;

        log_op_end!(
            "snapshot_create",
            duration_ms = start.elapsed().as_millis() as u64,
            version = %version
        );
        Ok(result)
    }

    fn create_impl(
        &self,
        snapshot: Snapshot,
        actor: &str,
        role: &str,
        reason: &str,
    ) -> Result<Snapshot> {
        let version = snapshot.version;
        require_text(
            "snapshot_create",
            &version,
            [("actor", actor), ("role", role), ("reason", reason)],
        )?;

        let issues = snapshot_issues(&snapshot);
        if !issues.is_empty() {
            return Err(ExError::new(ExErrorKind::InvalidInput)
                .with_version(version)
                .with_message("snapshot failed schema validation")
                .with_failures(issues));
        }
        if snapshot.is_active() {
            return Err(ExError::new(ExErrorKind::InvalidActivationTarget)
                .with_version(version)
                .with_message("snapshots must be created retired and activated separately"));
        }

        self.mutate("snapshot_create", |index| {
            let already = ExError::new(ExErrorKind::AlreadyExists)
                .with_version(version)
                .with_message(format!("snapshot {} already exists", version));
            if index.snapshots.contains_key(&version) {
                return Err(already);
            }
            let created =
                AuditEvent::new(AuditEventType::SnapshotCreated, version, actor, role, reason);
            if !self.storage.insert_snapshot_with_event(&snapshot, &created)? {
                // storage holds a version the index did not know about
                return Err(ExError::new(ExErrorKind::Persistence)
                    .with_version(version)
                    .with_message("snapshot index was stale")
                    .with_source(already));
            }
            index.snapshots.insert(version, snapshot.clone());
            Ok(snapshot)
        })
    }

    /// Make `version` the single active snapshot.
    ///
    /// Re-activating the sole active version is a no-op: nothing is written
    /// and no audit event is recorded.
    ///
    /// # Errors
    ///
    /// - `InvalidInput` if a provenance field is blank
    /// - `NotFound` if the version does not exist
    /// - `Persistence` if the backend rejects a write; the index is rebuilt
    ///   from storage on next access
    pub fn activate(
        &self,
        version: &Version,
        actor: &str,
        role: &str,
        reason: &str,
    ) -> Result<ActivationOutcome> {
        log_op_start!("snapshot_activate", version = %version);
        let start = Instant::now();

        let result = require_text(
            "snapshot_activate",
            version,
            [("actor", actor), ("role", role), ("reason", reason)],
        )
        .and_then(|()| {
            self.mutate("snapshot_activate", |index| {
                index.get(version)?;
                self.activate_locked(index, version, [actor, role, reason], false)
            })
        })
        .map_err(|e| {
            log_op_error!(
                "snapshot_activate",
                e,
                duration_ms = start.elapsed().as_millis() as u64
            );
            e.with_op("snapshot_activate")
        })?;

        log_op_end!(
            "snapshot_activate",
            duration_ms = start.elapsed().as_millis() as u64,
            version = %version,
            changed = result.changed
        );
        Ok(result)
    }

    /// Retire every other active record, then activate the target, in one
    /// storage write. With `trust_rollback` the write also carries the
    /// `TRUST_ROLLBACK` event naming the replaced version.
    ///
    /// The index changes only after the write succeeded.
    fn activate_locked(
        &self,
        index: &mut SnapshotIndex,
        version: &Version,
        [actor, role, reason]: [&str; 3],
        trust_rollback: bool,
    ) -> Result<ActivationOutcome> {
        let previous = index.active.filter(|v| v != version);
        let others = index.other_actives(version);
        let target_active = index.get(version)?.is_active();

        if target_active && others.is_empty() {
            tracing::debug!(version = %version, "Snapshot already active; nothing to do");
            return Ok(ActivationOutcome {
                version: *version,
                previous,
                changed: false,
            });
        }

        let event = |kind: AuditEventType, v: Version| AuditEvent::new(kind, v, actor, role, reason);
        let mut changes = Vec::with_capacity(others.len() + 1);
        let mut events = Vec::with_capacity(others.len() + 2);
        for other in &others {
            changes.push((*other, SnapshotStatus::Retired));
            events.push(event(AuditEventType::SnapshotRetired, *other));
        }
        if !target_active {
            changes.push((*version, SnapshotStatus::Active));
            events.push(event(AuditEventType::SnapshotActivated, *version));
        }
        if trust_rollback {
            let replaced = previous.map(|v| v.to_string());
            events.push(
                event(AuditEventType::TrustRollback, *version)
                    .with_metadata(json!({ META_PREVIOUS_VERSION: replaced })),
            );
        }

        self.storage.apply_status_changes(&changes, &events)?;

        for (v, status) in changes {
            index.set_status(&v, status);
        }
        index.active = Some(*version);
        index.duplicate_active.clear();

        Ok(ActivationOutcome {
            version: *version,
            previous,
            changed: true,
        })
    }

    /// Restore an earlier version as active and record a `TRUST_ROLLBACK`
    /// event naming the version it replaced.
    ///
    /// # Errors
    ///
    /// - `InvalidInput` if a provenance field is blank
    /// - `NotFound` if the version does not exist
    /// - `InvalidActivationTarget` if the version is already the sole active one
    /// - `Persistence` as for [`SnapshotStore::activate`]
    pub fn rollback_to_version(
        &self,
        version: &Version,
        actor: &str,
        role: &str,
        reason: &str,
    ) -> Result<ActivationOutcome> {
        log_op_start!("snapshot_rollback", version = %version);
        let start = Instant::now();

        let result = require_text(
            "snapshot_rollback",
            version,
            [("actor", actor), ("role", role), ("reason", reason)],
        )
        .and_then(|()| {
            self.mutate("snapshot_rollback", |index| {
                let target = index.get(version)?;
                if target.is_active() && index.other_actives(version).is_empty() {
                    return Err(ExError::new(ExErrorKind::InvalidActivationTarget)
                        .with_version(version)
                        .with_message(format!("{} is already the active version", version)));
                }

                self.activate_locked(index, version, [actor, role, reason], true)
            })
        })
        .map_err(|e| {
            log_op_error!(
                "snapshot_rollback",
                e,
                duration_ms = start.elapsed().as_millis() as u64
            );
            e.with_op("snapshot_rollback")
        })?;

        log_op_end!(
            "snapshot_rollback",
            duration_ms = start.elapsed().as_millis() as u64,
            version = %version,
            previous_version = ?result.previous.map(|v| v.to_string())
        );
        Ok(result)
    }

    /// Every snapshot, newest version first.
    ///
    /// # Errors
    ///
    /// `Persistence` / `Serialization` if the index cannot be loaded.
    pub fn get_all_versions(&self) -> Result<Vec<Snapshot>> {
        self.with_index("get_all_versions", |index| {
            Ok(index.snapshots.values().rev().cloned().collect())
        })
    }

    /// Every version number, newest first.
    ///
    /// # Errors
    ///
    /// As [`SnapshotStore::get_all_versions`].
    pub fn list_versions(&self) -> Result<Vec<Version>> {
        self.with_index("list_versions", |index| {
            Ok(index.snapshots.keys().rev().copied().collect())
        })
    }

    /// # Errors
    ///
    /// As [`SnapshotStore::get_all_versions`].
    pub fn get(&self, version: &Version) -> Result<Option<Snapshot>> {
        self.with_index("get", |index| Ok(index.snapshots.get(version).cloned()))
    }

    /// # Errors
    ///
    /// As [`SnapshotStore::get_all_versions`].
    pub fn exists(&self, version: &Version) -> Result<bool> {
        self.with_index("exists", |index| Ok(index.snapshots.contains_key(version)))
    }

    /// # Errors
    ///
    /// As [`SnapshotStore::get_all_versions`].
    pub fn count(&self) -> Result<usize> {
        self.with_index("count", |index| Ok(index.snapshots.len()))
    }

    /// # Errors
    ///
    /// As [`SnapshotStore::get_all_versions`].
    pub fn get_active_version(&self) -> Result<Option<Version>> {
        self.with_index("get_active_version", |index| Ok(index.active))
    }

    /// # Errors
    ///
    /// As [`SnapshotStore::get_all_versions`].
    pub fn get_active_snapshot(&self) -> Result<Option<Snapshot>> {
        self.with_index("get_active_snapshot", |index| {
            Ok(index.active.and_then(|v| index.snapshots.get(&v).cloned()))
        })
    }

    /// Highest stored version strictly below `version`.
    ///
    /// # Errors
    ///
    /// As [`SnapshotStore::get_all_versions`].
    pub fn get_previous_version(&self, version: &Version) -> Result<Option<Version>> {
        self.with_index("get_previous_version", |index| {
            Ok(index.snapshots.range(..*version).next_back().map(|(v, _)| *v))
        })
    }

    /// Versions that were simultaneously active at load time, if more than one.
    ///
    /// # Errors
    ///
    /// As [`SnapshotStore::get_all_versions`].
    pub fn duplicate_active_anomaly(&self) -> Result<Vec<Version>> {
        self.with_index("duplicate_active_anomaly", |index| {
            Ok(index.duplicate_active.clone())
        })
    }

    /// Diff a version against the version before it, or against an empty
    /// baseline when it is the first.
    ///
    /// # Errors
    ///
    /// `NotFound` if the version does not exist.
    pub fn get_diff_from_previous(&self, version: &Version) -> Result<SnapshotDiff> {
        self.with_index("get_diff_from_previous", |index| {
            let new = index.get(version)?;
            let diff = match index.snapshots.range(..*version).next_back() {
                Some((_, old)) => diff_snapshots(old, new),
                None => diff_against_empty(new),
            };
            Ok(diff)
        })
    }

    /// # Errors
    ///
    /// `NotFound` if either version does not exist.
    pub fn get_diff_between(&self, from: &Version, to: &Version) -> Result<SnapshotDiff> {
        self.with_index("get_diff_between", |index| {
            Ok(diff_snapshots(index.get(from)?, index.get(to)?))
        })
    }

    /// Drop the cached index; the next access reloads it from storage.
    ///
    /// # Errors
    ///
    /// `Internal` if the lock is poisoned.
    pub fn invalidate(&self) -> Result<()> {
        *self.lock("invalidate")? = None;
        Ok(())
    }

    /// Reload the index from storage now.
    ///
    /// # Errors
    ///
    /// `Persistence` / `Serialization` if storage cannot be read.
    pub fn reload(&self) -> Result<()> {
        let mut guard = self.lock("reload")?;
        *guard = Some(SnapshotIndex::load(self.storage.as_ref())?);
        Ok(())
    }
}
