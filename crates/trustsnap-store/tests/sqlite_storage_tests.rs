// Test suite for the SQLite backend on disk
// Tests migrations, persistence across reopen, and audit ordering

use rusqlite::Connection;
use std::sync::Arc;
use tempfile::TempDir;
use trustsnap_core::model::{AuditEventType, Author, Section, Snapshot};
use trustsnap_core::version::Version;
use trustsnap_store::migrations::{applied_migrations, apply_migrations};
use trustsnap_store::{SnapshotStore, SqliteStorage};

fn setup_test_env() -> (TempDir, std::path::PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("trust.db");
    (temp_dir, db_path)
}

fn snapshot(version: Version) -> Snapshot {
    Snapshot::new(
        version,
        Author::new("Dana", "compliance"),
        "release",
        vec![Section::new("overview", "Overview", vec!["A".to_string()])],
    )
}

#[test]
fn test_state_survives_reopen() {
    let (_temp_dir, db_path) = setup_test_env();
    {
        let store = SnapshotStore::new(Arc::new(SqliteStorage::open(&db_path).unwrap()));
        store
            .create(snapshot(Version::new(1, 0, 0)), "dana", "compliance", "one")
            .unwrap();
        store
            .create(snapshot(Version::new(1, 1, 0)), "dana", "compliance", "two")
            .unwrap();
        store
            .activate(&Version::new(1, 1, 0), "dana", "compliance", "go")
            .unwrap();
        store
            .rollback_to_version(&Version::new(1, 0, 0), "alice", "admin", "revert")
            .unwrap();
    }

    let store = SnapshotStore::new(Arc::new(SqliteStorage::open(&db_path).unwrap()));
    assert_eq!(
        store.get_active_version().unwrap(),
        Some(Version::new(1, 0, 0))
    );
    assert_eq!(store.count().unwrap(), 2);

    let events: Vec<AuditEventType> = store
        .audit_log()
        .list_all()
        .unwrap()
        .into_iter()
        .map(|e| e.event)
        .collect();
    assert_eq!(
        events,
        vec![
            AuditEventType::SnapshotCreated,
            AuditEventType::SnapshotCreated,
            AuditEventType::SnapshotActivated,
            AuditEventType::SnapshotRetired,
            AuditEventType::SnapshotActivated,
            AuditEventType::TrustRollback,
        ]
    );
}

#[test]
fn test_migrations_are_idempotent() {
    let (_temp_dir, db_path) = setup_test_env();
    drop(SqliteStorage::open(&db_path).unwrap());
    drop(SqliteStorage::open(&db_path).unwrap());

    let mut conn = Connection::open(&db_path).unwrap();
    apply_migrations(&mut conn).unwrap();
    let applied = applied_migrations(&conn).unwrap();
    assert_eq!(applied, vec!["001_trust_schema", "002_single_active_index"]);
}

#[test]
fn test_snapshots_cannot_be_deleted() {
    let (_temp_dir, db_path) = setup_test_env();
    let store = SnapshotStore::new(Arc::new(SqliteStorage::open(&db_path).unwrap()));
    store
        .create(snapshot(Version::new(1, 0, 0)), "dana", "compliance", "one")
        .unwrap();

    let conn = Connection::open(&db_path).unwrap();
    assert!(conn.execute("DELETE FROM trust_snapshots", []).is_err());
}
