//! Storage port for the trust stores.
//!
//! The stores only ever talk to [`TrustStorage`]; backends decide how records
//! land on disk. Three collections sit behind the port:
//!
//! - snapshots keyed by version (insert-if-absent, status update only)
//! - an append-only, ordered audit log
//! - changelog entries keyed by version (insert-if-absent, or upsert for
//!   rollback re-labelling)
//!
//! Implementations must serialise their own writes so that concurrent appends
//! from different stores sharing one backend never interleave. The two
//! compound writes (`insert_snapshot_with_event`, `apply_status_changes`) are
//! all-or-nothing: on error nothing they were given is visible.

mod memory;
mod sqlite;

pub use memory::MemoryStorage;
pub use sqlite::{content_digest, SqliteStorage};

use crate::errors::Result;
use trustsnap_core::model::{AuditEvent, ChangelogEntry, Snapshot, SnapshotStatus};
use trustsnap_core::version::Version;

/// Persistence contract shared by every backend.
pub trait TrustStorage: Send + Sync {
    /// Read one snapshot by version.
    fn get_snapshot(&self, version: &Version) -> Result<Option<Snapshot>>;

    /// Read every snapshot, in no particular order.
    fn list_snapshots(&self) -> Result<Vec<Snapshot>>;

    /// Insert a snapshot. Returns `false` without writing if the version exists.
    fn put_snapshot_if_absent(&self, snapshot: &Snapshot) -> Result<bool>;

    /// Change the status of an existing snapshot; content is never rewritten.
    fn update_snapshot_status(&self, version: &Version, status: SnapshotStatus) -> Result<()>;

    /// Insert a snapshot together with the audit event recording it.
    ///
    /// Returns `false` and writes nothing if the version exists.
    fn insert_snapshot_with_event(&self, snapshot: &Snapshot, event: &AuditEvent) -> Result<bool>;

    /// Apply status changes in order, then append `events`, as one unit.
    fn apply_status_changes(
        &self,
        changes: &[(Version, SnapshotStatus)],
        events: &[AuditEvent],
    ) -> Result<()>;

    /// Append one audit event.
    fn append_audit(&self, event: &AuditEvent) -> Result<()>;

    /// Every audit event in append order.
    fn list_audit(&self) -> Result<Vec<AuditEvent>>;

    /// Read the changelog entry for a version.
    fn get_changelog(&self, version: &Version) -> Result<Option<ChangelogEntry>>;

    /// Every changelog entry, in no particular order.
    fn list_changelog(&self) -> Result<Vec<ChangelogEntry>>;

    /// Insert a changelog entry. Returns `false` without writing if the version exists.
    fn put_changelog_if_absent(&self, entry: &ChangelogEntry) -> Result<bool>;

    /// Insert or overwrite the changelog entry for `entry.version`.
    fn upsert_changelog(&self, entry: &ChangelogEntry) -> Result<()>;
}
