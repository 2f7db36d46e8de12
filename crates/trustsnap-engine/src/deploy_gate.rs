//! Deploy gate: aggregate pre-release invariant checks.
//!
//! ## Checks (in order)
//! 1. `active_snapshot_exists`
//! 2. `ui_version_matches` (unset expected version passes with a warning)
//! 3. `changelog_entry_exists`
//! 4. `diff_computable`
//! 5. `active_status_consistent`
//! 6. `no_duplicate_active`
//! 7. `sections_valid`
//!
//! Every check is evaluated and reported even after an earlier one fails.
//! Storage errors are not check failures: they abort the run and surface as
//! `Err`.

use crate::config::{GateConfig, EXPECTED_UI_VERSION_ENV};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use std::time::Instant;
use trustsnap_core::errors::{ExError, ExErrorKind};
use trustsnap_core::model::Snapshot;
use trustsnap_core::rules::section_issues;
use trustsnap_core::version::Version;
use trustsnap_core::{log_op_end, log_op_error, log_op_start};
use trustsnap_store::{ChangelogStore, Result, SnapshotStore};

pub const CHECK_ACTIVE_SNAPSHOT_EXISTS: &str = "active_snapshot_exists";
pub const CHECK_UI_VERSION_MATCHES: &str = "ui_version_matches";
pub const CHECK_CHANGELOG_ENTRY_EXISTS: &str = "changelog_entry_exists";
pub const CHECK_DIFF_COMPUTABLE: &str = "diff_computable";
pub const CHECK_ACTIVE_STATUS_CONSISTENT: &str = "active_status_consistent";
pub const CHECK_NO_DUPLICATE_ACTIVE: &str = "no_duplicate_active";
pub const CHECK_SECTIONS_VALID: &str = "sections_valid";

const NO_ACTIVE: &str = "no active snapshot";

/// Outcome of one named check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GateCheck {
    pub name: String,
    pub passed: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl GateCheck {
    fn pass(name: &str, message: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            passed: true,
            message: message.into(),
            warning: None,
        }
    }

    fn fail(name: &str, message: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            passed: false,
            message: message.into(),
            warning: None,
        }
    }

    fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warning = Some(warning.into());
        self
    }
}

/// Every check result plus the aggregate verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeployGateReport {
    pub passed: bool,
    pub active_version: Option<Version>,
    pub expected_version: Option<Version>,
    pub checks: Vec<GateCheck>,
    pub checked_at: DateTime<Utc>,
}

impl DeployGateReport {
    pub fn failed_checks(&self) -> impl Iterator<Item = &GateCheck> {
        self.checks.iter().filter(|c| !c.passed)
    }

    /// Names of the checks that failed, in check order.
    pub fn failure_names(&self) -> Vec<String> {
        self.failed_checks().map(|c| c.name.clone()).collect()
    }

    pub fn warnings(&self) -> Vec<&str> {
        self.checks
            .iter()
            .filter_map(|c| c.warning.as_deref())
            .collect()
    }

    /// Multi-line, per-check report for consoles and error messages.
    pub fn format_report(&self) -> String {
        let mut out = format!(
            "Deploy gate {} (active: {}, expected: {})\n",
            if self.passed { "PASSED" } else { "FAILED" },
            self.active_version
                .map(|v| v.to_string())
                .unwrap_or_else(|| "none".to_string()),
            self.expected_version
                .map(|v| v.to_string())
                .unwrap_or_else(|| "unset".to_string()),
        );
        for check in &self.checks {
            out.push_str(&format!(
                "  [{}] {}: {}\n",
                if check.passed { "PASS" } else { "FAIL" },
                check.name,
                check.message
            ));
            if let Some(warning) = &check.warning {
                out.push_str(&format!("         warning: {}\n", warning));
            }
        }
        out
    }
}

/// HTTP-shaped gate outcome for health endpoints.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GateHttpResult {
    pub status: u16,
    pub body: serde_json::Value,
}

/// Runs the gate against a snapshot store and changelog.
pub struct DeployGate<'a> {
    snapshots: &'a SnapshotStore,
    changelog: &'a ChangelogStore,
    config: GateConfig,
}

impl<'a> DeployGate<'a> {
    pub fn new(
        snapshots: &'a SnapshotStore,
        changelog: &'a ChangelogStore,
        config: GateConfig,
    ) -> Self {
        Self {
            snapshots,
            changelog,
            config,
        }
    }

    /// Evaluate every check.
    ///
    /// # Errors
    ///
    /// `Persistence` / `Serialization` if the stores cannot be read.
    pub fn run_checks(&self) -> Result<DeployGateReport> {
        log_op_start!("deploy_gate");
        let start = Instant::now();

        let report = self.run_checks_impl().map_err(|e| {
            log_op_error!(
                "deploy_gate",
                e,
                duration_ms = start.elapsed().as_millis() as u64
            );
            e
        })?;

        log_op_end!(
            "deploy_gate",
            duration_ms = start.elapsed().as_millis() as u64,
            passed = report.passed,
            failed = ?report.failure_names()
        );
        Ok(report)
    }

    fn run_checks_impl(&self) -> Result<DeployGateReport> {
        let active = self.snapshots.get_active_snapshot()?;
        let expected = self.config.expected_ui_version;

        let checks = vec![
            check_active_exists(active.as_ref()),
            check_ui_version(active.as_ref(), expected),
            self.check_changelog_entry(active.as_ref())?,
            self.check_diff_computable(active.as_ref())?,
            check_status_consistent(active.as_ref()),
            self.check_no_duplicate_active(active.as_ref())?,
            check_sections_valid(active.as_ref()),
        ];

        Ok(DeployGateReport {
            passed: checks.iter().all(|c| c.passed),
            active_version: active.map(|s| s.version),
            expected_version: expected,
            checks,
            checked_at: Utc::now(),
        })
    }

    fn check_changelog_entry(&self, active: Option<&Snapshot>) -> Result<GateCheck> {
        let Some(active) = active else {
            return Ok(GateCheck::fail(CHECK_CHANGELOG_ENTRY_EXISTS, NO_ACTIVE));
        };
        Ok(if self.changelog.has_entry(&active.version)? {
            GateCheck::pass(
                CHECK_CHANGELOG_ENTRY_EXISTS,
                format!("changelog entry present for {}", active.version),
            )
        } else {
            GateCheck::fail(
                CHECK_CHANGELOG_ENTRY_EXISTS,
                format!("no changelog entry for {}", active.version),
            )
        })
    }

    fn check_diff_computable(&self, active: Option<&Snapshot>) -> Result<GateCheck> {
        let Some(active) = active else {
            return Ok(GateCheck::fail(CHECK_DIFF_COMPUTABLE, NO_ACTIVE));
        };
        match self.snapshots.get_diff_from_previous(&active.version) {
            Ok(diff) => Ok(GateCheck::pass(
                CHECK_DIFF_COMPUTABLE,
                trustsnap_core::diff::diff_summary(&diff),
            )),
            Err(e) if e.kind() == ExErrorKind::NotFound => {
                Ok(GateCheck::fail(CHECK_DIFF_COMPUTABLE, e.message().to_string()))
            }
            Err(e) => Err(e),
        }
    }

    fn check_no_duplicate_active(&self, active: Option<&Snapshot>) -> Result<GateCheck> {
        if active.is_none() {
            return Ok(GateCheck::pass(
                CHECK_NO_DUPLICATE_ACTIVE,
                "no active version to compare",
            ));
        }
        let duplicates = self.snapshots.duplicate_active_anomaly()?;
        Ok(if duplicates.is_empty() {
            GateCheck::pass(CHECK_NO_DUPLICATE_ACTIVE, "exactly one active snapshot")
        } else {
            GateCheck::fail(
                CHECK_NO_DUPLICATE_ACTIVE,
                format!(
                    "multiple active snapshots in storage: {}",
                    join_versions(&duplicates)
                ),
            )
        })
    }

    /// Fails with `GateFailure` carrying every failed check name and the
    /// formatted report.
    ///
    /// # Errors
    ///
    /// - `GateFailure` if any check failed
    /// - `Persistence` / `Serialization` if the stores cannot be read
    pub fn assert_deploy_ready(&self) -> Result<DeployGateReport> {
        let report = self.run_checks()?;
        if report.passed {
            return Ok(report);
        }
        Err(ExError::new(ExErrorKind::GateFailure)
            .with_op("assert_deploy_ready")
            .with_failures(report.failure_names())
            .with_message(report.format_report()))
    }

    /// 200 with the report if the gate passed, 412 if it failed.
    ///
    /// Storage errors map to the error's own status with a JSON error body.
    pub fn deploy_gate_http_status(&self) -> GateHttpResult {
        match self.run_checks() {
            Ok(report) => {
                let status = if report.passed { 200 } else { 412 };
                let body = serde_json::to_value(&report).unwrap_or_else(|e| {
                    json!({ "passed": report.passed, "error": e.to_string() })
                });
                GateHttpResult { status, body }
            }
            Err(e) => GateHttpResult {
                status: e.kind().http_status(),
                body: json!({
                    "passed": false,
                    "error": { "code": e.code(), "message": e.message() },
                }),
            },
        }
    }

    /// Print the per-check report on stdout and return the verdict.
    pub fn run_deploy_gate_cli(&self) -> bool {
        match self.run_checks() {
            Ok(report) => {
                print!("{}", report.format_report());
                report.passed
            }
            Err(e) => {
                println!("Deploy gate FAILED: {}", e);
                false
            }
        }
    }

    /// Problems that would make activating `version` unsafe.
    ///
    /// # Errors
    ///
    /// `Persistence` / `Serialization` if the stores cannot be read.
    pub fn validate_for_activation(&self, version: &Version) -> Result<Vec<String>> {
        let Some(snapshot) = self.snapshots.get(version)? else {
            return Ok(vec![format!("snapshot {} does not exist", version)]);
        };

        let mut issues = Vec::new();
        if !self.changelog.has_entry(version)? {
            issues.push(format!("no changelog entry for {}", version));
        }
        if snapshot.sections.is_empty() {
            issues.push(format!("snapshot {} has no sections", version));
        }
        issues.extend(section_issues(&snapshot.sections));
        if let Err(e) = self.snapshots.get_diff_from_previous(version) {
            issues.push(format!("diff not computable: {}", e.message()));
        }
        Ok(issues)
    }

    /// Problems with creating a snapshot under `candidate`.
    ///
    /// # Errors
    ///
    /// `Persistence` / `Serialization` if the stores cannot be read.
    pub fn validate_new_snapshot(&self, candidate: &str) -> Result<Vec<String>> {
        let version: Version = match candidate.parse() {
            Ok(v) => v,
            Err(e) => return Ok(vec![format!("invalid version: {}", e)]),
        };

        let mut issues = Vec::new();
        if self.snapshots.exists(&version)? {
            issues.push(format!("snapshot {} already exists", version));
        }
        if let Some(latest) = self.snapshots.list_versions()?.first() {
            if version <= *latest {
                issues.push(format!(
                    "{} is not greater than the latest version {}",
                    version, latest
                ));
            }
        }
        Ok(issues)
    }
}

fn check_active_exists(active: Option<&Snapshot>) -> GateCheck {
    match active {
        Some(s) => GateCheck::pass(
            CHECK_ACTIVE_SNAPSHOT_EXISTS,
            format!("active snapshot is {}", s.version),
        ),
        None => GateCheck::fail(CHECK_ACTIVE_SNAPSHOT_EXISTS, NO_ACTIVE),
    }
}

fn check_ui_version(active: Option<&Snapshot>, expected: Option<Version>) -> GateCheck {
    match (expected, active) {
        (None, _) => GateCheck::pass(CHECK_UI_VERSION_MATCHES, "expected UI version not configured")
            .with_warning(format!(
                "{} is not set; skipping UI version comparison",
                EXPECTED_UI_VERSION_ENV
            )),
        (Some(expected), None) => GateCheck::fail(
            CHECK_UI_VERSION_MATCHES,
            format!("UI expects {} but {}", expected, NO_ACTIVE),
        ),
        (Some(expected), Some(s)) if s.version == expected => GateCheck::pass(
            CHECK_UI_VERSION_MATCHES,
            format!("UI expects {} and it is active", expected),
        ),
        (Some(expected), Some(s)) => GateCheck::fail(
            CHECK_UI_VERSION_MATCHES,
            format!("UI expects {} but {} is active", expected, s.version),
        ),
    }
}

fn check_status_consistent(active: Option<&Snapshot>) -> GateCheck {
    match active {
        Some(s) if s.is_active() => GateCheck::pass(
            CHECK_ACTIVE_STATUS_CONSISTENT,
            format!("{} is stored with status active", s.version),
        ),
        Some(s) => GateCheck::fail(
            CHECK_ACTIVE_STATUS_CONSISTENT,
            format!("{} is reported active but stored as {}", s.version, s.status),
        ),
        None => GateCheck::fail(CHECK_ACTIVE_STATUS_CONSISTENT, NO_ACTIVE),
    }
}

fn check_sections_valid(active: Option<&Snapshot>) -> GateCheck {
    let Some(active) = active else {
        return GateCheck::fail(CHECK_SECTIONS_VALID, NO_ACTIVE);
    };
    let mut issues = section_issues(&active.sections);
    if active.sections.is_empty() {
        issues.insert(0, "no sections".to_string());
    }
    if issues.is_empty() {
        GateCheck::pass(
            CHECK_SECTIONS_VALID,
            format!("{} sections, ids unique", active.sections.len()),
        )
    } else {
        GateCheck::fail(CHECK_SECTIONS_VALID, issues.join("; "))
    }
}

fn join_versions(versions: &[Version]) -> String {
    versions
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use trustsnap_core::model::{Author, Section, SnapshotStatus};

    fn snap(status: SnapshotStatus, sections: Vec<Section>) -> Snapshot {
        Snapshot::new(
            Version::new(1, 0, 0),
            Author::new("Dana", "compliance"),
            "s",
            sections,
        )
        .with_status(status)
    }

    #[test]
    fn test_ui_version_unset_is_pass_with_warning() {
        let s = snap(SnapshotStatus::Active, vec![]);
        let check = check_ui_version(Some(&s), None);
        assert!(check.passed);
        assert!(check
            .warning
            .as_deref()
            .unwrap()
            .contains(EXPECTED_UI_VERSION_ENV));
    }

    #[test]
    fn test_ui_version_mismatch_fails() {
        let s = snap(SnapshotStatus::Active, vec![]);
        assert!(!check_ui_version(Some(&s), Some(Version::new(2, 0, 0))).passed);
        assert!(check_ui_version(Some(&s), Some(Version::new(1, 0, 0))).passed);
        assert!(!check_ui_version(None, Some(Version::new(1, 0, 0))).passed);
    }

    #[test]
    fn test_status_consistency() {
        let retired = snap(SnapshotStatus::Retired, vec![]);
        assert!(!check_status_consistent(Some(&retired)).passed);
        let active = snap(SnapshotStatus::Active, vec![]);
        assert!(check_status_consistent(Some(&active)).passed);
    }

    #[test]
    fn test_sections_must_be_present_and_unique() {
        let empty = snap(SnapshotStatus::Active, vec![]);
        assert!(!check_sections_valid(Some(&empty)).passed);

        let dup = snap(
            SnapshotStatus::Active,
            vec![
                Section::new("a", "A", vec!["x".to_string()]),
                Section::new("a", "A2", vec!["y".to_string()]),
            ],
        );
        let check = check_sections_valid(Some(&dup));
        assert!(!check.passed);
        assert!(check.message.contains("duplicate section id 'a'"));
    }

    #[test]
    fn test_report_formatting() {
        let report = DeployGateReport {
            passed: false,
            active_version: None,
            expected_version: None,
            checks: vec![
                GateCheck::fail(CHECK_ACTIVE_SNAPSHOT_EXISTS, NO_ACTIVE),
                GateCheck::pass(CHECK_UI_VERSION_MATCHES, "not configured").with_warning("unset"),
            ],
            checked_at: Utc::now(),
        };
        let text = report.format_report();
        assert!(text.starts_with("Deploy gate FAILED (active: none, expected: unset)\n"));
        assert!(text.contains("  [FAIL] active_snapshot_exists: no active snapshot\n"));
        assert!(text.contains("  [PASS] ui_version_matches: not configured\n"));
        assert!(text.contains("warning: unset"));
        assert_eq!(report.failure_names(), vec![CHECK_ACTIVE_SNAPSHOT_EXISTS]);
    }
}
