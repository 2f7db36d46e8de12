// Test suite for the snapshot store
// Covers creation, activation, rollback, cache invalidation and the
// single-active invariant under concurrent activations

use serde_json::json;
use std::sync::Arc;
use std::thread;
use trustsnap_core::errors::ExErrorKind;
use trustsnap_core::model::{AuditEventType, Author, Section, Snapshot, SnapshotStatus};
use trustsnap_core::version::Version;
use trustsnap_store::{MemoryStorage, SnapshotStore, SqliteStorage, TrustStorage};

fn section(id: &str, lines: &[&str]) -> Section {
    Section::new(
        id,
        id.to_uppercase(),
        lines.iter().map(|l| l.to_string()).collect(),
    )
}

fn snapshot(version: Version, sections: Vec<Section>) -> Snapshot {
    Snapshot::new(version, Author::new("Dana", "compliance"), "release", sections)
}

fn v(major: u64, minor: u64, patch: u64) -> Version {
    Version::new(major, minor, patch)
}

fn seeded_store(storage: Arc<dyn TrustStorage>) -> SnapshotStore {
    let store = SnapshotStore::new(storage);
    store
        .create(
            snapshot(
                v(1, 0, 0),
                vec![section("overview", &["A"]), section("security", &["B"])],
            ),
            "dana",
            "compliance",
            "initial publication",
        )
        .unwrap();
    store
        .create(
            snapshot(
                v(1, 1, 0),
                vec![
                    section("overview", &["A"]),
                    section("security", &["B"]),
                    section("privacy", &["C"]),
                ],
            ),
            "dana",
            "compliance",
            "add privacy",
        )
        .unwrap();
    store
}

#[test]
fn test_publish_diff_and_rollback_scenario() {
    let store = seeded_store(Arc::new(MemoryStorage::new()));

    store
        .activate(&v(1, 0, 0), "dana", "compliance", "go live")
        .unwrap();
    store
        .activate(&v(1, 1, 0), "dana", "compliance", "privacy launch")
        .unwrap();

    let diff = store.get_diff_from_previous(&v(1, 1, 0)).unwrap();
    assert_eq!(diff.stats.sections_added, 1);
    assert_eq!(diff.stats.sections_modified, 0);
    assert_eq!(diff.stats.lines_added, 1);
    assert_eq!(diff.stats.lines_removed, 0);

    let outcome = store
        .rollback_to_version(&v(1, 0, 0), "alice", "admin", "copy error")
        .unwrap();
    assert_eq!(outcome.previous, Some(v(1, 1, 0)));
    assert_eq!(store.get_active_version().unwrap(), Some(v(1, 0, 0)));

    let rollbacks = store
        .audit_log()
        .list_by_event(AuditEventType::TrustRollback)
        .unwrap();
    assert_eq!(rollbacks.len(), 1);
    assert_eq!(rollbacks[0].metadata, Some(json!({ "previousVersion": "v1.1.0" })));
    assert_eq!(rollbacks[0].previous_version(), Some(v(1, 1, 0)));

    // both versions stay retrievable
    assert!(store.get(&v(1, 0, 0)).unwrap().is_some());
    assert_eq!(
        store.get(&v(1, 1, 0)).unwrap().unwrap().status,
        SnapshotStatus::Retired
    );
}

#[test]
fn test_first_version_diffs_against_empty() {
    let store = seeded_store(Arc::new(MemoryStorage::new()));
    let diff = store.get_diff_from_previous(&v(1, 0, 0)).unwrap();
    assert_eq!(diff.from_version, None);
    assert_eq!(diff.stats.sections_added, 2);
    assert_eq!(diff.stats.lines_added, 2);

    let err = store.get_diff_from_previous(&v(9, 0, 0)).unwrap_err();
    assert_eq!(err.kind(), ExErrorKind::NotFound);
}

#[test]
fn test_duplicate_version_rejected() {
    let store = seeded_store(Arc::new(MemoryStorage::new()));
    let err = store
        .create(
            snapshot(v(1, 0, 0), vec![section("overview", &["Z"])]),
            "dana",
            "compliance",
            "again",
        )
        .unwrap_err();
    assert_eq!(err.kind(), ExErrorKind::AlreadyExists);
    // content of the original is untouched
    assert_eq!(
        store.get(&v(1, 0, 0)).unwrap().unwrap().sections[0].lines,
        vec!["A".to_string()]
    );
}

#[test]
fn test_invalid_schema_rejected() {
    let store = SnapshotStore::new(Arc::new(MemoryStorage::new()));
    let err = store
        .create(snapshot(v(1, 0, 0), vec![]), "dana", "compliance", "empty")
        .unwrap_err();
    assert_eq!(err.kind(), ExErrorKind::InvalidInput);
    assert!(!err.failures().is_empty());
    assert!(!store.exists(&v(1, 0, 0)).unwrap());
}

#[test]
fn test_reactivating_active_version_is_noop() {
    let store = seeded_store(Arc::new(MemoryStorage::new()));
    store
        .activate(&v(1, 1, 0), "dana", "compliance", "launch")
        .unwrap();
    let before = store.audit_log().list_all().unwrap().len();

    let outcome = store
        .activate(&v(1, 1, 0), "dana", "compliance", "launch again")
        .unwrap();
    assert!(!outcome.changed);
    assert_eq!(store.audit_log().list_all().unwrap().len(), before);
}

#[test]
fn test_activation_audit_sequence() {
    let store = seeded_store(Arc::new(MemoryStorage::new()));
    store.activate(&v(1, 0, 0), "dana", "compliance", "one").unwrap();
    store.activate(&v(1, 1, 0), "dana", "compliance", "two").unwrap();

    let events: Vec<(AuditEventType, Version)> = store
        .audit_log()
        .list_all()
        .unwrap()
        .into_iter()
        .map(|e| (e.event, e.version))
        .collect();
    assert_eq!(
        events,
        vec![
            (AuditEventType::SnapshotCreated, v(1, 0, 0)),
            (AuditEventType::SnapshotCreated, v(1, 1, 0)),
            (AuditEventType::SnapshotActivated, v(1, 0, 0)),
            (AuditEventType::SnapshotRetired, v(1, 0, 0)),
            (AuditEventType::SnapshotActivated, v(1, 1, 0)),
        ]
    );
}

#[test]
fn test_activate_missing_version_fails() {
    let store = seeded_store(Arc::new(MemoryStorage::new()));
    let err = store
        .activate(&v(3, 0, 0), "dana", "compliance", "nope")
        .unwrap_err();
    assert_eq!(err.kind(), ExErrorKind::NotFound);
    assert_eq!(err.op(), Some("snapshot_activate"));
}

#[test]
fn test_rollback_to_active_version_rejected() {
    let store = seeded_store(Arc::new(MemoryStorage::new()));
    store.activate(&v(1, 1, 0), "dana", "compliance", "go").unwrap();
    let err = store
        .rollback_to_version(&v(1, 1, 0), "alice", "admin", "why")
        .unwrap_err();
    assert_eq!(err.kind(), ExErrorKind::InvalidActivationTarget);
}

#[test]
fn test_failed_activation_invalidates_cache() {
    let storage = Arc::new(MemoryStorage::new());
    let store = seeded_store(storage.clone());
    store.activate(&v(1, 0, 0), "dana", "compliance", "go").unwrap();
    let loads = storage.snapshot_load_count();

    // activating v1.1.0 fails, so retiring v1.0.0 must not land either
    storage.fail_status_updates_for(v(1, 1, 0));
    let err = store
        .activate(&v(1, 1, 0), "dana", "compliance", "switch")
        .unwrap_err();
    assert_eq!(err.kind(), ExErrorKind::Persistence);

    // the next read reloads from storage, which still has v1.0.0 active
    assert_eq!(store.get_active_version().unwrap(), Some(v(1, 0, 0)));
    assert_eq!(storage.snapshot_load_count(), loads + 1);
    assert!(storage.get_snapshot(&v(1, 0, 0)).unwrap().unwrap().is_active());

    storage.clear_faults();
    store
        .activate(&v(1, 1, 0), "dana", "compliance", "switch")
        .unwrap();
    assert_eq!(store.get_active_version().unwrap(), Some(v(1, 1, 0)));
}

#[test]
fn test_duplicate_active_anomaly_reports_highest() {
    let storage = Arc::new(MemoryStorage::new());
    for version in [v(1, 0, 0), v(1, 2, 0), v(1, 1, 0)] {
        storage.insert_raw_snapshot(
            snapshot(version, vec![section("overview", &["A"])])
                .with_status(SnapshotStatus::Active),
        );
    }
    let store = SnapshotStore::new(storage.clone());

    assert_eq!(store.get_active_version().unwrap(), Some(v(1, 2, 0)));
    assert_eq!(
        store.duplicate_active_anomaly().unwrap(),
        vec![v(1, 0, 0), v(1, 1, 0), v(1, 2, 0)]
    );

    // activating any version heals the anomaly
    store
        .activate(&v(1, 1, 0), "dana", "compliance", "heal")
        .unwrap();
    let actives: Vec<Version> = storage
        .list_snapshots()
        .unwrap()
        .into_iter()
        .filter(|s| s.is_active())
        .map(|s| s.version)
        .collect();
    assert_eq!(actives, vec![v(1, 1, 0)]);
    assert!(store.duplicate_active_anomaly().unwrap().is_empty());
}

#[test]
fn test_concurrent_activations_leave_single_active() {
    let storage: Arc<dyn TrustStorage> = Arc::new(SqliteStorage::open_in_memory().unwrap());
    let store = Arc::new(SnapshotStore::new(storage.clone()));
    let versions: Vec<Version> = (0..6).map(|minor| v(1, minor, 0)).collect();
    for version in &versions {
        store
            .create(
                snapshot(*version, vec![section("overview", &["A"])]),
                "dana",
                "compliance",
                "seed",
            )
            .unwrap();
    }

    let handles: Vec<_> = (0..24)
        .map(|i| {
            let store = Arc::clone(&store);
            let target = versions[i % versions.len()];
            thread::spawn(move || {
                store
                    .activate(&target, "worker", "automation", "race")
                    .unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let actives: Vec<Version> = storage
        .list_snapshots()
        .unwrap()
        .into_iter()
        .filter(|s| s.is_active())
        .map(|s| s.version)
        .collect();
    assert_eq!(actives.len(), 1);
    assert_eq!(store.get_active_version().unwrap(), Some(actives[0]));
}

#[test]
fn test_listing_is_newest_first_across_reload() {
    let storage = Arc::new(MemoryStorage::new());
    let store = seeded_store(storage.clone());
    store
        .create(
            snapshot(v(1, 10, 0), vec![section("overview", &["A"])]),
            "dana",
            "compliance",
            "ten",
        )
        .unwrap();

    store.invalidate().unwrap();
    assert_eq!(
        store.list_versions().unwrap(),
        vec![v(1, 10, 0), v(1, 1, 0), v(1, 0, 0)]
    );
    let all = store.get_all_versions().unwrap();
    assert_eq!(all[0].version, v(1, 10, 0));
    assert_eq!(store.count().unwrap(), 3);
}

#[test]
fn test_create_with_failing_audit_leaves_nothing_behind() {
    let storage = Arc::new(MemoryStorage::new());
    let store = SnapshotStore::new(storage.clone());
    let first = snapshot(v(1, 0, 0), vec![section("overview", &["A"])]);

    storage.fail_audit_appends();
    let err = store
        .create(first.clone(), "dana", "compliance", "initial")
        .unwrap_err();
    assert_eq!(err.kind(), ExErrorKind::Persistence);
    assert!(storage.get_snapshot(&v(1, 0, 0)).unwrap().is_none());

    // the retry is not blocked by a half-written snapshot
    storage.clear_faults();
    store.create(first, "dana", "compliance", "initial").unwrap();
    let events = store.audit_log().list_all().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event, AuditEventType::SnapshotCreated);
}

#[test]
fn test_rollback_with_failing_audit_keeps_current_version() {
    let storage = Arc::new(MemoryStorage::new());
    let store = seeded_store(storage.clone());
    store.activate(&v(1, 1, 0), "dana", "compliance", "go").unwrap();
    let audit_before = store.audit_log().list_all().unwrap().len();

    storage.fail_audit_appends();
    let err = store
        .rollback_to_version(&v(1, 0, 0), "alice", "admin", "incident")
        .unwrap_err();
    assert_eq!(err.kind(), ExErrorKind::Persistence);

    assert_eq!(store.get_active_version().unwrap(), Some(v(1, 1, 0)));
    assert!(storage.get_snapshot(&v(1, 1, 0)).unwrap().unwrap().is_active());
    assert!(!storage.get_snapshot(&v(1, 0, 0)).unwrap().unwrap().is_active());
    storage.clear_faults();
    assert_eq!(store.audit_log().list_all().unwrap().len(), audit_before);

    let outcome = store
        .rollback_to_version(&v(1, 0, 0), "alice", "admin", "incident")
        .unwrap();
    assert_eq!(outcome.previous, Some(v(1, 1, 0)));
    let rollbacks = store
        .audit_log()
        .list_by_event(AuditEventType::TrustRollback)
        .unwrap();
    assert_eq!(rollbacks.len(), 1);
}

#[test]
fn test_sqlite_rollback_is_atomic_with_its_events() {
    let dir = tempfile::tempdir().unwrap();
    let storage = Arc::new(SqliteStorage::open(dir.path().join("trust.db")).unwrap());
    let store = seeded_store(storage.clone());
    store.activate(&v(1, 1, 0), "dana", "compliance", "go").unwrap();
    store
        .rollback_to_version(&v(1, 0, 0), "alice", "admin", "incident")
        .unwrap();

    let kinds: Vec<AuditEventType> = storage
        .list_audit()
        .unwrap()
        .into_iter()
        .skip(3)
        .map(|e| e.event)
        .collect();
    assert_eq!(
        kinds,
        vec![
            AuditEventType::SnapshotRetired,
            AuditEventType::SnapshotActivated,
            AuditEventType::TrustRollback,
        ]
    );
}
