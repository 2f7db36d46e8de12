//! In-memory backend with fault injection, used by tests and dry runs.

use crate::errors::{lock_poisoned, persistence, Result};
use crate::storage::TrustStorage;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use trustsnap_core::model::{AuditEvent, ChangelogEntry, Snapshot, SnapshotStatus};
use trustsnap_core::version::Version;

#[derive(Default)]
struct Inner {
    snapshots: BTreeMap<Version, Snapshot>,
    audit: Vec<AuditEvent>,
    changelog: BTreeMap<Version, ChangelogEntry>,
    faults: Faults,
}

#[derive(Default)]
struct Faults {
    status_updates: HashSet<Version>,
    audit_appends: bool,
    changelog_writes: bool,
}

/// [`TrustStorage`] held entirely in memory.
///
/// Unlike the SQLite backend it does not enforce the single-active rule, so
/// tests can seed the duplicate-active anomaly with [`MemoryStorage::insert_raw_snapshot`].
#[derive(Default)]
pub struct MemoryStorage {
    inner: Mutex<Inner>,
    snapshot_loads: AtomicUsize,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn inner(&self, op: &str) -> Result<MutexGuard<'_, Inner>> {
        self.inner.lock().map_err(|_| lock_poisoned(op))
    }

    /// Make status updates for `version` fail until faults are cleared.
    pub fn fail_status_updates_for(&self, version: Version) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.faults.status_updates.insert(version);
        }
    }

    /// Make every audit append fail until faults are cleared.
    pub fn fail_audit_appends(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.faults.audit_appends = true;
        }
    }

    /// Make every changelog write fail until faults are cleared.
    pub fn fail_changelog_writes(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.faults.changelog_writes = true;
        }
    }

    pub fn clear_faults(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.faults = Faults::default();
        }
    }

    /// Store a snapshot as-is, bypassing every rule including status.
    pub fn insert_raw_snapshot(&self, snapshot: Snapshot) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.snapshots.insert(snapshot.version, snapshot);
        }
    }

    /// Number of full snapshot listings served so far.
    pub fn snapshot_load_count(&self) -> usize {
        self.snapshot_loads.load(Ordering::SeqCst)
    }
}

impl TrustStorage for MemoryStorage {
    fn get_snapshot(&self, version: &Version) -> Result<Option<Snapshot>> {
        Ok(self.inner("get_snapshot")?.snapshots.get(version).cloned())
    }

    fn list_snapshots(&self) -> Result<Vec<Snapshot>> {
        self.snapshot_loads.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .inner("list_snapshots")?
            .snapshots
            .values()
            .cloned()
            .collect())
    }

    fn put_snapshot_if_absent(&self, snapshot: &Snapshot) -> Result<bool> {
        let mut inner = self.inner("put_snapshot_if_absent")?;
        if inner.snapshots.contains_key(&snapshot.version) {
            return Ok(false);
        }
        inner.snapshots.insert(snapshot.version, snapshot.clone());
        Ok(true)
    }

    fn update_snapshot_status(&self, version: &Version, status: SnapshotStatus) -> Result<()> {
        const OP: &str = "update_snapshot_status";
        let mut inner = self.inner(OP)?;
        if inner.faults.status_updates.contains(version) {
            return Err(persistence(OP, format!("injected failure for {}", version)));
        }
        match inner.snapshots.get_mut(version) {
            Some(snapshot) => {
                snapshot.status = status;
                Ok(())
            }
            None => Err(persistence(
                OP,
                format!("no persisted snapshot for {}", version),
            )),
        }
    }

    fn insert_snapshot_with_event(&self, snapshot: &Snapshot, event: &AuditEvent) -> Result<bool> {
        const OP: &str = "insert_snapshot_with_event";
        let mut inner = self.inner(OP)?;
        if inner.snapshots.contains_key(&snapshot.version) {
            return Ok(false);
        }
        if inner.faults.audit_appends {
            return Err(persistence(OP, "injected audit failure"));
        }
        inner.snapshots.insert(snapshot.version, snapshot.clone());
        inner.audit.push(event.clone());
        Ok(true)
    }

    fn apply_status_changes(
        &self,
        changes: &[(Version, SnapshotStatus)],
        events: &[AuditEvent],
    ) -> Result<()> {
        const OP: &str = "apply_status_changes";
        let mut inner = self.inner(OP)?;

        // every check runs before the first write
        for (version, _) in changes {
            if inner.faults.status_updates.contains(version) {
                return Err(persistence(OP, format!("injected failure for {}", version)));
            }
            if !inner.snapshots.contains_key(version) {
                return Err(persistence(
                    OP,
                    format!("no persisted snapshot for {}", version),
                ));
            }
        }
        if !events.is_empty() && inner.faults.audit_appends {
            return Err(persistence(OP, "injected audit failure"));
        }

        for (version, status) in changes {
            if let Some(snapshot) = inner.snapshots.get_mut(version) {
                snapshot.status = *status;
            }
        }
        inner.audit.extend(events.iter().cloned());
        Ok(())
    }

    fn append_audit(&self, event: &AuditEvent) -> Result<()> {
        let mut inner = self.inner("append_audit")?;
        if inner.faults.audit_appends {
            return Err(persistence("append_audit", "injected failure"));
        }
        inner.audit.push(event.clone());
        Ok(())
    }

    fn list_audit(&self) -> Result<Vec<AuditEvent>> {
        Ok(self.inner("list_audit")?.audit.clone())
    }

    fn get_changelog(&self, version: &Version) -> Result<Option<ChangelogEntry>> {
        Ok(self.inner("get_changelog")?.changelog.get(version).cloned())
    }

    fn list_changelog(&self) -> Result<Vec<ChangelogEntry>> {
        Ok(self
            .inner("list_changelog")?
            .changelog
            .values()
            .cloned()
            .collect())
    }

    fn put_changelog_if_absent(&self, entry: &ChangelogEntry) -> Result<bool> {
        let mut inner = self.inner("put_changelog_if_absent")?;
        if inner.faults.changelog_writes {
            return Err(persistence("put_changelog_if_absent", "injected failure"));
        }
        if inner.changelog.contains_key(&entry.version) {
            return Ok(false);
        }
        inner.changelog.insert(entry.version, entry.clone());
        Ok(true)
    }

    fn upsert_changelog(&self, entry: &ChangelogEntry) -> Result<()> {
        let mut inner = self.inner("upsert_changelog")?;
        if inner.faults.changelog_writes {
            return Err(persistence("upsert_changelog", "injected failure"));
        }
        inner.changelog.insert(entry.version, entry.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trustsnap_core::model::{AuditEventType, Author};

    fn snapshot(version: Version) -> Snapshot {
        Snapshot::new(version, Author::new("Dana", "compliance"), "s", vec![])
    }

    #[test]
    fn test_injected_status_fault_is_cleared() {
        let storage = MemoryStorage::new();
        let v = Version::new(1, 0, 0);
        storage.put_snapshot_if_absent(&snapshot(v)).unwrap();

        storage.fail_status_updates_for(v);
        assert!(storage
            .update_snapshot_status(&v, SnapshotStatus::Active)
            .is_err());

        storage.clear_faults();
        storage
            .update_snapshot_status(&v, SnapshotStatus::Active)
            .unwrap();
        assert!(storage.get_snapshot(&v).unwrap().unwrap().is_active());
    }

    #[test]
    fn test_status_changes_are_all_or_nothing() {
        let storage = MemoryStorage::new();
        let a = Version::new(1, 0, 0);
        let b = Version::new(1, 1, 0);
        storage.put_snapshot_if_absent(&snapshot(a)).unwrap();
        storage.put_snapshot_if_absent(&snapshot(b)).unwrap();
        storage.fail_status_updates_for(b);

        let changes = [(a, SnapshotStatus::Active), (b, SnapshotStatus::Active)];
        let events = [AuditEvent::new(
            AuditEventType::SnapshotActivated,
            a,
            "dana",
            "compliance",
            "go",
        )];
        assert!(storage.apply_status_changes(&changes, &events).is_err());
        assert!(!storage.get_snapshot(&a).unwrap().unwrap().is_active());
        assert!(storage.list_audit().unwrap().is_empty());
    }

    #[test]
    fn test_audit_fault_blocks_snapshot_insert() {
        let storage = MemoryStorage::new();
        let v = Version::new(1, 0, 0);
        storage.fail_audit_appends();
        let created = AuditEvent::new(AuditEventType::SnapshotCreated, v, "dana", "compliance", "seed");
        assert!(storage
            .insert_snapshot_with_event(&snapshot(v), &created)
            .is_err());
        assert!(storage.get_snapshot(&v).unwrap().is_none());
    }

    #[test]
    fn test_load_count_tracks_listings() {
        let storage = MemoryStorage::new();
        assert_eq!(storage.snapshot_load_count(), 0);
        storage.list_snapshots().unwrap();
        storage.list_snapshots().unwrap();
        assert_eq!(storage.snapshot_load_count(), 2);
    }
}
