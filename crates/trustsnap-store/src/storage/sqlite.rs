//! SQLite backend.
//!
//! Snapshot documents are stored as JSON alongside a SHA-256 content digest;
//! the `status` column is authoritative over the status inside the document,
//! since the document is written once and never rewritten.

use crate::db;
use crate::errors::{corrupt_row, from_rusqlite, lock_poisoned, persistence, Result};
use crate::migrations::apply_migrations;
use crate::storage::TrustStorage;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{Connection, OptionalExtension};
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use trustsnap_core::errors::{ExError, ExErrorKind};
use trustsnap_core::model::{
    AuditEvent, AuditEventType, ChangelogEntry, Snapshot, SnapshotStatus,
};
use trustsnap_core::version::Version;

/// SHA-256 over the immutable content of a snapshot (everything but status).
pub fn content_digest(snapshot: &Snapshot) -> Result<String> {
    let canonical = serde_json::to_string(&(
        &snapshot.version,
        &snapshot.released_at,
        &snapshot.author,
        &snapshot.summary,
        &snapshot.sections,
    ))?;
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

/// SQLite-backed [`TrustStorage`].
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    /// Open (or create) a database file and apply pending migrations.
    ///
    /// # Errors
    ///
    /// `Persistence` if the file cannot be opened or a migration fails.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut conn = db::open(path)?;
        db::configure(&conn)?;
        apply_migrations(&mut conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Fresh in-memory database with the schema applied.
    ///
    /// # Errors
    ///
    /// `Persistence` if the schema cannot be applied.
    pub fn open_in_memory() -> Result<Self> {
        let mut conn = db::open_in_memory()?;
        db::configure(&conn)?;
        apply_migrations(&mut conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self, op: &str) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| lock_poisoned(op))
    }
}

type SnapshotRow = (String, String, String);

fn decode_snapshot(op: &str, (document, status, digest): SnapshotRow) -> Result<Snapshot> {
    let snapshot: Snapshot =
        serde_json::from_str(&document).map_err(|e| corrupt_row(op, "snapshot document", e))?;
    let status = SnapshotStatus::parse(&status)
        .ok_or_else(|| corrupt_row(op, "snapshot status", &status))?;
    let snapshot = snapshot.with_status(status);

    let actual = content_digest(&snapshot)?;
    if actual != digest {
        return Err(persistence(
            op,
            format!(
                "content digest mismatch for {}: recorded {}, computed {}",
                snapshot.version, digest, actual
            ),
        ));
    }

    Ok(snapshot)
}

type AuditRow = (
    String,
    String,
    String,
    String,
    String,
    String,
    String,
    Option<String>,
);

fn decode_audit(row: AuditRow) -> Result<AuditEvent> {
    const OP: &str = "list_audit";
    let (id, event, actor, role, timestamp, version, reason, metadata) = row;
    Ok(AuditEvent {
        id: id.parse().map_err(|e| corrupt_row(OP, "audit id", e))?,
        event: AuditEventType::parse(&event)
            .ok_or_else(|| corrupt_row(OP, "audit event type", &event))?,
        actor,
        role,
        timestamp: DateTime::parse_from_rfc3339(&timestamp)
            .map_err(|e| corrupt_row(OP, "audit timestamp", e))?
            .with_timezone(&Utc),
        version: version
            .parse()
            .map_err(|e| corrupt_row(OP, "audit version", e))?,
        reason,
        metadata: metadata
            .map(|m| serde_json::from_str(&m))
            .transpose()
            .map_err(|e| corrupt_row(OP, "audit metadata", e))?,
    })
}

type ChangelogRow = (String, String, String, String, String, String);

fn decode_changelog(op: &str, row: ChangelogRow) -> Result<ChangelogEntry> {
    let (version, date, change_type, summary, customer_impact, link) = row;
    Ok(ChangelogEntry {
        version: version
            .parse()
            .map_err(|e| corrupt_row(op, "changelog version", e))?,
        date: NaiveDate::parse_from_str(&date, "%Y-%m-%d")
            .map_err(|e| corrupt_row(op, "changelog date", e))?,
        change_type: change_type
            .parse()
            .map_err(|e: String| corrupt_row(op, "changelog type", e))?,
        summary,
        customer_impact,
        link,
    })
}

/// Version components as SQLite integers. Components above `i64::MAX`
/// cannot be ordered by the sort columns and are rejected.
fn sort_columns(op: &str, version: &Version) -> Result<(i64, i64, i64)> {
    let column = |value: u64| {
        i64::try_from(value).map_err(|_| {
            ExError::new(ExErrorKind::InvalidInput)
                .with_op(op.to_string())
                .with_version(version)
                .with_message(format!("version component {} is too large to store", value))
        })
    };
    Ok((
        column(version.major)?,
        column(version.minor)?,
        column(version.patch)?,
    ))
}

fn insert_snapshot_row(conn: &Connection, snapshot: &Snapshot) -> Result<bool> {
    let (major, minor, patch) = sort_columns("put_snapshot", &snapshot.version)?;
    let document = serde_json::to_string(snapshot)?;
    let digest = content_digest(snapshot)?;
    let inserted = conn
        .execute(
            "INSERT INTO trust_snapshots
                (version, major, minor, patch, status, released_at, document, content_digest, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(version) DO NOTHING",
            rusqlite::params![
                snapshot.version.to_string(),
                major,
                minor,
                patch,
                snapshot.status.as_str(),
                snapshot.released_at.to_rfc3339(),
                document,
                digest,
                Utc::now().timestamp_millis(),
            ],
        )
        .map_err(from_rusqlite)?;
    Ok(inserted == 1)
}

fn set_status_row(conn: &Connection, version: &Version, status: SnapshotStatus) -> Result<()> {
    let updated = conn
        .execute(
            "UPDATE trust_snapshots SET status = ?1 WHERE version = ?2",
            rusqlite::params![status.as_str(), version.to_string()],
        )
        .map_err(from_rusqlite)?;
    if updated == 0 {
        return Err(persistence(
            "update_snapshot_status",
            format!("no persisted snapshot for {}", version),
        ));
    }
    Ok(())
}

fn insert_audit_row(conn: &Connection, event: &AuditEvent) -> Result<()> {
    let metadata = event
        .metadata
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;
    conn.execute(
        "INSERT INTO trust_audit_log
            (id, event, actor, role, timestamp, version, reason, metadata)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        rusqlite::params![
            event.id.to_string(),
            event.event.as_str(),
            event.actor,
            event.role,
            event.timestamp.to_rfc3339(),
            event.version.to_string(),
            event.reason,
            metadata,
        ],
    )
    .map_err(from_rusqlite)?;
    Ok(())
}

const CHANGELOG_COLUMNS: &str = "version, date, change_type, summary, customer_impact, link";

impl TrustStorage for SqliteStorage {
    fn get_snapshot(&self, version: &Version) -> Result<Option<Snapshot>> {
        let conn = self.conn("get_snapshot")?;
        let row: Option<SnapshotRow> = conn
            .query_row(
                "SELECT document, status, content_digest FROM trust_snapshots WHERE version = ?1",
                [version.to_string()],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()
            .map_err(from_rusqlite)?;
        row.map(|r| decode_snapshot("get_snapshot", r)).transpose()
    }

    fn list_snapshots(&self) -> Result<Vec<Snapshot>> {
        let conn = self.conn("list_snapshots")?;
        let mut stmt = conn
            .prepare(
                "SELECT document, status, content_digest FROM trust_snapshots
                 ORDER BY major DESC, minor DESC, patch DESC",
            )
            .map_err(from_rusqlite)?;
        let rows: Vec<SnapshotRow> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))
            .map_err(from_rusqlite)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(from_rusqlite)?;
        rows.into_iter()
            .map(|r| decode_snapshot("list_snapshots", r))
            .collect()
    }

    fn put_snapshot_if_absent(&self, snapshot: &Snapshot) -> Result<bool> {
        let conn = self.conn("put_snapshot_if_absent")?;
        let inserted = insert_snapshot_row(&conn, snapshot)?;
        tracing::debug!(version = %snapshot.version, inserted, "Persisted snapshot");
        Ok(inserted)
    }

    fn update_snapshot_status(&self, version: &Version, status: SnapshotStatus) -> Result<()> {
        let conn = self.conn("update_snapshot_status")?;
        set_status_row(&conn, version, status)
    }

    fn insert_snapshot_with_event(&self, snapshot: &Snapshot, event: &AuditEvent) -> Result<bool> {
        let mut conn = self.conn("insert_snapshot_with_event")?;
        let tx = conn.transaction().map_err(from_rusqlite)?;
        if !insert_snapshot_row(&tx, snapshot)? {
            return Ok(false);
        }
        insert_audit_row(&tx, event)?;
        tx.commit().map_err(from_rusqlite)?;

        tracing::debug!(version = %snapshot.version, "Persisted snapshot with creation event");
        Ok(true)
    }

    fn apply_status_changes(
        &self,
        changes: &[(Version, SnapshotStatus)],
        events: &[AuditEvent],
    ) -> Result<()> {
        let mut conn = self.conn("apply_status_changes")?;
        // dropping the transaction on any error rolls every statement back
        let tx = conn.transaction().map_err(from_rusqlite)?;
        for (version, status) in changes {
            set_status_row(&tx, version, *status)?;
        }
        for event in events {
            insert_audit_row(&tx, event)?;
        }
        tx.commit().map_err(from_rusqlite)
    }

    fn append_audit(&self, event: &AuditEvent) -> Result<()> {
        let conn = self.conn("append_audit")?;
        insert_audit_row(&conn, event)
    }

    fn list_audit(&self) -> Result<Vec<AuditEvent>> {
        let conn = self.conn("list_audit")?;
        let mut stmt = conn
            .prepare(
                "SELECT id, event, actor, role, timestamp, version, reason, metadata
                 FROM trust_audit_log ORDER BY seq",
            )
            .map_err(from_rusqlite)?;
        let rows: Vec<AuditRow> = stmt
            .query_map([], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                    row.get(6)?,
                    row.get(7)?,
                ))
            })
            .map_err(from_rusqlite)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(from_rusqlite)?;
        rows.into_iter().map(decode_audit).collect()
    }

    fn get_changelog(&self, version: &Version) -> Result<Option<ChangelogEntry>> {
        let conn = self.conn("get_changelog")?;
        let row: Option<ChangelogRow> = conn
            .query_row(
                &format!(
                    "SELECT {} FROM trust_changelog WHERE version = ?1",
                    CHANGELOG_COLUMNS
                ),
                [version.to_string()],
                |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                        row.get(5)?,
                    ))
                },
            )
            .optional()
            .map_err(from_rusqlite)?;
        row.map(|r| decode_changelog("get_changelog", r))
            .transpose()
    }

    fn list_changelog(&self) -> Result<Vec<ChangelogEntry>> {
        let conn = self.conn("list_changelog")?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM trust_changelog ORDER BY major DESC, minor DESC, patch DESC",
                CHANGELOG_COLUMNS
            ))
            .map_err(from_rusqlite)?;
        let rows: Vec<ChangelogRow> = stmt
            .query_map([], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                ))
            })
            .map_err(from_rusqlite)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(from_rusqlite)?;
        rows.into_iter()
            .map(|r| decode_changelog("list_changelog", r))
            .collect()
    }

    fn put_changelog_if_absent(&self, entry: &ChangelogEntry) -> Result<bool> {
        let params = changelog_params("put_changelog_if_absent", entry)?;
        let conn = self.conn("put_changelog_if_absent")?;
        let inserted = conn
            .execute(
                "INSERT INTO trust_changelog
                    (version, major, minor, patch, date, change_type, summary, customer_impact, link, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                 ON CONFLICT(version) DO NOTHING",
                rusqlite::params_from_iter(params),
            )
            .map_err(from_rusqlite)?;
        Ok(inserted == 1)
    }

    fn upsert_changelog(&self, entry: &ChangelogEntry) -> Result<()> {
        let params = changelog_params("upsert_changelog", entry)?;
        let conn = self.conn("upsert_changelog")?;
        conn.execute(
            "INSERT INTO trust_changelog
                (version, major, minor, patch, date, change_type, summary, customer_impact, link, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             ON CONFLICT(version) DO UPDATE SET
                date = excluded.date,
                change_type = excluded.change_type,
                summary = excluded.summary,
                customer_impact = excluded.customer_impact,
                link = excluded.link,
                updated_at = excluded.updated_at",
            rusqlite::params_from_iter(params),
        )
        .map_err(from_rusqlite)?;
        Ok(())
    }
}

fn changelog_params(op: &str, entry: &ChangelogEntry) -> Result<Vec<Box<dyn rusqlite::ToSql>>> {
    let (major, minor, patch) = sort_columns(op, &entry.version)?;
    Ok(vec![
        Box::new(entry.version.to_string()),
        Box::new(major),
        Box::new(minor),
        Box::new(patch),
        Box::new(entry.date.format("%Y-%m-%d").to_string()),
        Box::new(entry.change_type.as_str()),
        Box::new(entry.summary.clone()),
        Box::new(entry.customer_impact.clone()),
        Box::new(entry.link.clone()),
        Box::new(Utc::now().timestamp_millis()),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use trustsnap_core::model::{Author, ChangeType, Section};

    fn snapshot(version: Version) -> Snapshot {
        Snapshot::new(
            version,
            Author::new("Dana", "compliance"),
            "summary",
            vec![Section::new("overview", "Overview", vec!["A".to_string()])],
        )
    }

    #[test]
    fn test_snapshot_insert_is_if_absent() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        let snap = snapshot(Version::new(1, 0, 0));
        assert!(storage.put_snapshot_if_absent(&snap).unwrap());
        assert!(!storage.put_snapshot_if_absent(&snap).unwrap());
        let loaded = storage.get_snapshot(&snap.version).unwrap().unwrap();
        assert_eq!(loaded, snap);
    }

    #[test]
    fn test_status_column_is_authoritative() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        let snap = snapshot(Version::new(1, 0, 0));
        storage.put_snapshot_if_absent(&snap).unwrap();
        storage
            .update_snapshot_status(&snap.version, SnapshotStatus::Active)
            .unwrap();
        let loaded = storage.get_snapshot(&snap.version).unwrap().unwrap();
        assert_eq!(loaded.status, SnapshotStatus::Active);
    }

    #[test]
    fn test_single_active_enforced_by_schema() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        let a = snapshot(Version::new(1, 0, 0));
        let b = snapshot(Version::new(1, 1, 0));
        storage.put_snapshot_if_absent(&a).unwrap();
        storage.put_snapshot_if_absent(&b).unwrap();
        storage
            .update_snapshot_status(&a.version, SnapshotStatus::Active)
            .unwrap();
        assert!(storage
            .update_snapshot_status(&b.version, SnapshotStatus::Active)
            .is_err());
    }

    #[test]
    fn test_update_status_of_missing_snapshot_fails() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        assert!(storage
            .update_snapshot_status(&Version::new(9, 9, 9), SnapshotStatus::Active)
            .is_err());
    }

    #[test]
    fn test_tampered_document_is_detected() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        let snap = snapshot(Version::new(1, 0, 0));
        storage.put_snapshot_if_absent(&snap).unwrap();
        {
            let conn = storage.conn("test").unwrap();
            conn.execute(
                "UPDATE trust_snapshots SET document = replace(document, '\"A\"', '\"Z\"')",
                [],
            )
            .unwrap();
        }
        let err = storage.get_snapshot(&snap.version).unwrap_err();
        assert!(err.message().contains("content digest mismatch"));
    }

    #[test]
    fn test_audit_log_is_append_only_in_schema() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        let event = AuditEvent::new(
            AuditEventType::SnapshotCreated,
            Version::new(1, 0, 0),
            "dana",
            "compliance",
            "initial",
        );
        storage.append_audit(&event).unwrap();
        assert_eq!(storage.list_audit().unwrap(), vec![event]);

        let conn = storage.conn("test").unwrap();
        assert!(conn.execute("DELETE FROM trust_audit_log", []).is_err());
        assert!(conn
            .execute("UPDATE trust_audit_log SET reason = 'x'", [])
            .is_err());
    }

    #[test]
    fn test_changelog_upsert_overwrites() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        let mut entry = ChangelogEntry {
            version: Version::new(1, 0, 0),
            date: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            change_type: ChangeType::Addition,
            summary: "Initial publication".to_string(),
            customer_impact: "Trust page available".to_string(),
            link: "/trust/changelog#v1.0.0".to_string(),
        };
        assert!(storage.put_changelog_if_absent(&entry).unwrap());
        assert!(!storage.put_changelog_if_absent(&entry).unwrap());

        entry.summary = "Reverted to v1.0.0".to_string();
        entry.change_type = ChangeType::Clarification;
        storage.upsert_changelog(&entry).unwrap();

        let all = storage.list_changelog().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0], entry);
    }

    fn event(kind: AuditEventType, version: Version) -> AuditEvent {
        AuditEvent::new(kind, version, "dana", "compliance", "release")
    }

    #[test]
    fn test_snapshot_and_event_commit_together() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        let snap = snapshot(Version::new(1, 0, 0));
        let created = event(AuditEventType::SnapshotCreated, snap.version);
        assert!(storage.insert_snapshot_with_event(&snap, &created).unwrap());

        // a second insert of the same version writes neither row
        let again = event(AuditEventType::SnapshotCreated, snap.version);
        assert!(!storage.insert_snapshot_with_event(&snap, &again).unwrap());
        assert_eq!(storage.list_audit().unwrap(), vec![created]);
    }

    #[test]
    fn test_failed_status_change_rolls_back_whole_unit() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        let a = snapshot(Version::new(1, 0, 0));
        storage.put_snapshot_if_absent(&a).unwrap();

        let err = storage
            .apply_status_changes(
                &[
                    (a.version, SnapshotStatus::Active),
                    (Version::new(9, 9, 9), SnapshotStatus::Retired),
                ],
                &[event(AuditEventType::SnapshotActivated, a.version)],
            )
            .unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::Persistence);

        let loaded = storage.get_snapshot(&a.version).unwrap().unwrap();
        assert_eq!(loaded.status, SnapshotStatus::Retired);
        assert!(storage.list_audit().unwrap().is_empty());
    }

    #[test]
    fn test_retire_then_activate_in_one_unit() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        let a = snapshot(Version::new(1, 0, 0));
        let b = snapshot(Version::new(1, 1, 0));
        storage.put_snapshot_if_absent(&a).unwrap();
        storage.put_snapshot_if_absent(&b).unwrap();
        storage
            .update_snapshot_status(&a.version, SnapshotStatus::Active)
            .unwrap();

        storage
            .apply_status_changes(
                &[
                    (a.version, SnapshotStatus::Retired),
                    (b.version, SnapshotStatus::Active),
                ],
                &[
                    event(AuditEventType::SnapshotRetired, a.version),
                    event(AuditEventType::SnapshotActivated, b.version),
                ],
            )
            .unwrap();

        assert!(storage.get_snapshot(&b.version).unwrap().unwrap().is_active());
        assert!(!storage.get_snapshot(&a.version).unwrap().unwrap().is_active());
        assert_eq!(storage.list_audit().unwrap().len(), 2);
    }

    #[test]
    fn test_oversized_version_component_is_rejected() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        let huge = snapshot(Version::new(1, 2, u64::MAX));
        let err = storage.put_snapshot_if_absent(&huge).unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::InvalidInput);
        assert!(storage.list_snapshots().unwrap().is_empty());

        let entry = ChangelogEntry {
            version: Version::new(u64::MAX, 0, 0),
            date: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            change_type: ChangeType::Addition,
            summary: "Initial publication".to_string(),
            customer_impact: "Trust page available".to_string(),
            link: "/trust/changelog".to_string(),
        };
        let err = storage.put_changelog_if_absent(&entry).unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::InvalidInput);
    }
}
