// Test suite for the deploy gate
// Tests every named check, the three consumption shapes, and pre-write validation

use chrono::NaiveDate;
use std::sync::Arc;
use trustsnap_core::errors::ExErrorKind;
use trustsnap_core::model::{
    Author, ChangeType, ChangelogEntry, Section, Snapshot, SnapshotStatus,
};
use trustsnap_core::version::Version;
use trustsnap_engine::deploy_gate::{
    CHECK_ACTIVE_SNAPSHOT_EXISTS, CHECK_CHANGELOG_ENTRY_EXISTS, CHECK_NO_DUPLICATE_ACTIVE,
    CHECK_UI_VERSION_MATCHES,
};
use trustsnap_engine::{DeployGate, GateConfig};
use trustsnap_store::{ChangelogStore, MemoryStorage, SnapshotStore, TrustStorage};

struct Fixture {
    snapshots: SnapshotStore,
    changelog: ChangelogStore,
}

fn fixture() -> Fixture {
    fixture_on(Arc::new(MemoryStorage::new()))
}

fn fixture_on(storage: Arc<dyn TrustStorage>) -> Fixture {
    Fixture {
        snapshots: SnapshotStore::new(storage.clone()),
        changelog: ChangelogStore::new(storage),
    }
}

fn snapshot(version: Version) -> Snapshot {
    Snapshot::new(
        version,
        Author::new("Dana", "compliance"),
        "release",
        vec![
            Section::new("overview", "Overview", vec!["A".to_string()]),
            Section::new("security", "Security", vec!["B".to_string()]),
        ],
    )
}

fn entry(version: Version) -> ChangelogEntry {
    ChangelogEntry {
        version,
        date: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
        change_type: ChangeType::Addition,
        summary: format!("Published trust content {}", version),
        customer_impact: "Customers see the updated trust page.".to_string(),
        link: ChangelogEntry::default_link(&version),
    }
}

fn publish(f: &Fixture, version: Version) {
    f.snapshots
        .create(snapshot(version), "dana", "compliance", "publish")
        .unwrap();
    f.changelog.add_entry(entry(version)).unwrap();
    f.snapshots
        .activate(&version, "dana", "compliance", "publish")
        .unwrap();
}

#[test]
fn test_empty_store_fails_gate() {
    let f = fixture();
    let gate = DeployGate::new(&f.snapshots, &f.changelog, GateConfig::default());
    let report = gate.run_checks().unwrap();

    assert!(!report.passed);
    assert_eq!(report.checks.len(), 7);
    let failed = report.failure_names();
    assert!(failed.contains(&CHECK_ACTIVE_SNAPSHOT_EXISTS.to_string()));
    // duplicate-active passes when nothing is active
    assert!(!failed.contains(&CHECK_NO_DUPLICATE_ACTIVE.to_string()));
    // unset expected version is a warning, not a failure
    assert!(!failed.contains(&CHECK_UI_VERSION_MATCHES.to_string()));
}

#[test]
fn test_published_version_passes_with_warning() {
    let f = fixture();
    publish(&f, Version::new(1, 0, 0));

    let gate = DeployGate::new(&f.snapshots, &f.changelog, GateConfig::default());
    let report = gate.run_checks().unwrap();
    assert!(report.passed, "{}", report.format_report());
    assert_eq!(report.warnings().len(), 1);
    assert_eq!(report.active_version, Some(Version::new(1, 0, 0)));
}

#[test]
fn test_expected_version_mismatch_fails() {
    let f = fixture();
    publish(&f, Version::new(1, 0, 0));

    let gate = DeployGate::new(
        &f.snapshots,
        &f.changelog,
        GateConfig::new(Some(Version::new(1, 1, 0))),
    );
    let report = gate.run_checks().unwrap();
    assert!(!report.passed);
    assert_eq!(report.failure_names(), vec![CHECK_UI_VERSION_MATCHES]);

    let matching = DeployGate::new(
        &f.snapshots,
        &f.changelog,
        GateConfig::new(Some(Version::new(1, 0, 0))),
    );
    let report = matching.run_checks().unwrap();
    assert!(report.passed);
    assert!(report.warnings().is_empty());
}

#[test]
fn test_missing_changelog_entry_fails() {
    let f = fixture();
    let v = Version::new(1, 0, 0);
    f.snapshots
        .create(snapshot(v), "dana", "compliance", "publish")
        .unwrap();
    f.snapshots.activate(&v, "dana", "compliance", "publish").unwrap();

    let gate = DeployGate::new(&f.snapshots, &f.changelog, GateConfig::default());
    let report = gate.run_checks().unwrap();
    assert_eq!(report.failure_names(), vec![CHECK_CHANGELOG_ENTRY_EXISTS]);
}

#[test]
fn test_assert_deploy_ready_lists_every_failure() {
    let f = fixture();
    let gate = DeployGate::new(
        &f.snapshots,
        &f.changelog,
        GateConfig::new(Some(Version::new(1, 0, 0))),
    );
    let err = gate.assert_deploy_ready().unwrap_err();

    assert_eq!(err.kind(), ExErrorKind::GateFailure);
    assert_eq!(err.failures().len(), 6);
    assert!(err.message().starts_with("Deploy gate FAILED"));
    assert!(err.message().contains("[FAIL] sections_valid"));
}

#[test]
fn test_http_shape() {
    let f = fixture();
    let gate = DeployGate::new(&f.snapshots, &f.changelog, GateConfig::default());
    let failing = gate.deploy_gate_http_status();
    assert_eq!(failing.status, 412);
    assert_eq!(failing.body["passed"], false);

    publish(&f, Version::new(1, 0, 0));
    let passing = gate.deploy_gate_http_status();
    assert_eq!(passing.status, 200);
    assert_eq!(passing.body["checks"].as_array().unwrap().len(), 7);
    assert_eq!(passing.body["active_version"], "v1.0.0");
}

#[test]
fn test_cli_shape_returns_verdict() {
    let f = fixture();
    let gate = DeployGate::new(&f.snapshots, &f.changelog, GateConfig::default());
    assert!(!gate.run_deploy_gate_cli());
    publish(&f, Version::new(1, 0, 0));
    assert!(gate.run_deploy_gate_cli());
}

#[test]
fn test_duplicate_active_anomaly_fails_gate() {
    let storage = Arc::new(MemoryStorage::new());
    for version in [Version::new(1, 0, 0), Version::new(1, 1, 0)] {
        storage.insert_raw_snapshot(snapshot(version).with_status(SnapshotStatus::Active));
        storage.put_changelog_if_absent(&entry(version)).unwrap();
    }
    let f = fixture_on(storage);

    let gate = DeployGate::new(&f.snapshots, &f.changelog, GateConfig::default());
    let report = gate.run_checks().unwrap();
    assert_eq!(report.failure_names(), vec![CHECK_NO_DUPLICATE_ACTIVE]);
    assert_eq!(report.active_version, Some(Version::new(1, 1, 0)));
}

#[test]
fn test_validate_for_activation() {
    let f = fixture();
    let v = Version::new(1, 0, 0);
    let gate = DeployGate::new(&f.snapshots, &f.changelog, GateConfig::default());

    assert_eq!(
        gate.validate_for_activation(&v).unwrap(),
        vec!["snapshot v1.0.0 does not exist".to_string()]
    );

    f.snapshots
        .create(snapshot(v), "dana", "compliance", "publish")
        .unwrap();
    assert_eq!(
        gate.validate_for_activation(&v).unwrap(),
        vec!["no changelog entry for v1.0.0".to_string()]
    );

    f.changelog.add_entry(entry(v)).unwrap();
    assert!(gate.validate_for_activation(&v).unwrap().is_empty());
}

#[test]
fn test_validate_new_snapshot() {
    let f = fixture();
    publish(&f, Version::new(1, 2, 0));
    let gate = DeployGate::new(&f.snapshots, &f.changelog, GateConfig::default());

    assert!(gate.validate_new_snapshot("v1.3.0").unwrap().is_empty());
    assert_eq!(gate.validate_new_snapshot("v1.2.0").unwrap().len(), 2);
    assert_eq!(gate.validate_new_snapshot("v1.1.9").unwrap().len(), 1);
    assert!(gate.validate_new_snapshot("1.3.0").unwrap()[0].starts_with("invalid version"));
}
