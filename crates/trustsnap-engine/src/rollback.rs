//! Rollback orchestration.
//!
//! A rollback reactivates an earlier snapshot through the snapshot store and
//! then re-labels that version in the public changelog. The version swap is
//! authoritative: if the changelog write fails afterwards, the swap stands
//! and the failure is logged and reported as a warning.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::time::Instant;
use trustsnap_core::diff::{diff_against_empty, SectionChangeKind};
use trustsnap_core::errors::{ExError, ExErrorKind};
use trustsnap_core::model::{AuditEvent, AuditEventType};
use trustsnap_core::rules::section_issues;
use trustsnap_core::version::Version;
use trustsnap_core::{log_op_end, log_op_error, log_op_start};
use trustsnap_store::{ChangelogStore, Result, SnapshotStore};

/// Reason prefix marking an incident-response rollback.
pub const EMERGENCY_PREFIX: &str = "[EMERGENCY] ";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollbackRequest {
    pub target_version: Version,
    pub actor: String,
    pub role: String,
    pub reason: String,
}

impl RollbackRequest {
    pub fn new(
        target_version: Version,
        actor: impl Into<String>,
        role: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            target_version,
            actor: actor.into(),
            role: role.into(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RollbackEligibility {
    pub eligible: bool,
    pub issues: Vec<String>,
    /// Every version except the current one, newest first, eligible or not.
    pub available_versions: Vec<Version>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RollbackResult {
    pub success: bool,
    pub previous_version: Option<Version>,
    pub current_version: Version,
    pub timestamp: DateTime<Utc>,
    pub emergency: bool,
    pub changelog_updated: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RollbackEffects {
    pub current_version: Option<Version>,
    pub target_version: Version,
    /// Sections that differ between the current and target versions.
    pub sections_affected: usize,
    /// True when the target has no changelog entry yet and one would be created.
    pub changelog_entry_needed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RollbackSimulation {
    pub would_succeed: bool,
    pub issues: Vec<String>,
    pub effects: RollbackEffects,
}

/// Coordinates rollbacks over a snapshot store and changelog.
pub struct RollbackManager<'a> {
    snapshots: &'a SnapshotStore,
    changelog: &'a ChangelogStore,
}

impl<'a> RollbackManager<'a> {
    pub fn new(snapshots: &'a SnapshotStore, changelog: &'a ChangelogStore) -> Self {
        Self {
            snapshots,
            changelog,
        }
    }

    /// Whether `target` may be rolled back to through the checked path.
    ///
    /// # Errors
    ///
    /// `Persistence` / `Serialization` if the stores cannot be read.
    pub fn check_rollback_eligibility(&self, target: &Version) -> Result<RollbackEligibility> {
        let current = self.snapshots.get_active_version()?;
        let available_versions: Vec<Version> = self
            .snapshots
            .list_versions()?
            .into_iter()
            .filter(|v| Some(*v) != current)
            .collect();

        let mut issues = Vec::new();
        match self.snapshots.get(target)? {
            None => issues.push(format!("snapshot {} does not exist", target)),
            Some(snapshot) => {
                if Some(*target) == current {
                    issues.push(format!("{} is already the active version", target));
                }
                if !self.changelog.has_entry(target)? {
                    issues.push(format!("no changelog entry for {}", target));
                }
                if snapshot.sections.is_empty() {
                    issues.push(format!("snapshot {} has no sections", target));
                }
                issues.extend(section_issues(&snapshot.sections));
                if let Err(e) = self.snapshots.get_diff_from_previous(target) {
                    issues.push(format!("diff not computable: {}", e.message()));
                }
            }
        }

        Ok(RollbackEligibility {
            eligible: issues.is_empty(),
            issues,
            available_versions,
        })
    }

    /// Eligibility-checked rollback.
    ///
    /// # Errors
    ///
    /// - `InvalidInput` if actor, role or reason is blank
    /// - `NotEligible` with every issue if the target fails eligibility
    /// - store errors from the version swap
    pub fn perform_rollback(&self, request: &RollbackRequest) -> Result<RollbackResult> {
        log_op_start!("rollback_perform", version = %request.target_version);
        let start = Instant::now();

        let result = self.perform_rollback_impl(request).map_err(|e| {
            log_op_error!(
                "rollback_perform",
                e,
                duration_ms = start.elapsed().as_millis() as u64
            );
            e
        })?;

        log_op_end!(
            "rollback_perform",
            duration_ms = start.elapsed().as_millis() as u64,
            version = %result.current_version,
            previous_version = ?result.previous_version.map(|v| v.to_string())
        );
        Ok(result)
    }

    fn perform_rollback_impl(&self, request: &RollbackRequest) -> Result<RollbackResult> {
        require_reason("rollback_perform", request)?;

        let eligibility = self.check_rollback_eligibility(&request.target_version)?;
        if !eligibility.eligible {
            return Err(ExError::new(ExErrorKind::NotEligible)
                .with_op("rollback_perform")
                .with_version(request.target_version)
                .with_message(format!(
                    "{} is not eligible for rollback",
                    request.target_version
                ))
                .with_failures(eligibility.issues));
        }

        self.swap_and_relabel(request, &request.reason, false)
    }

    /// Incident-response rollback: only existence and "not already current"
    /// are checked, and the changelog write is best-effort.
    ///
    /// # Errors
    ///
    /// - `InvalidInput` if actor, role or reason is blank
    /// - `NotFound` if the target does not exist
    /// - `InvalidActivationTarget` if the target is already active
    pub fn perform_emergency_rollback(&self, request: &RollbackRequest) -> Result<RollbackResult> {
        log_op_start!("rollback_emergency", version = %request.target_version);
        let start = Instant::now();

        let result = require_reason("rollback_emergency", request)
            .and_then(|()| {
                let reason = format!("{}{}", EMERGENCY_PREFIX, request.reason.trim());
                self.swap_and_relabel(request, &reason, true)
            })
            .map_err(|e| {
                log_op_error!(
                    "rollback_emergency",
                    e,
                    duration_ms = start.elapsed().as_millis() as u64
                );
                e
            })?;

        log_op_end!(
            "rollback_emergency",
            duration_ms = start.elapsed().as_millis() as u64,
            version = %result.current_version
        );
        Ok(result)
    }

    fn swap_and_relabel(
        &self,
        request: &RollbackRequest,
        reason: &str,
        emergency: bool,
    ) -> Result<RollbackResult> {
        let outcome = self.snapshots.rollback_to_version(
            &request.target_version,
            &request.actor,
            &request.role,
            reason,
        )?;

        let mut warnings = Vec::new();
        let changelog_updated = match self
            .changelog
            .add_rollback_entry(outcome.version, Some(&request.reason))
        {
            Ok(_) => true,
            Err(e) => {
                tracing::error!(
                    version = %outcome.version,
                    err.code = e.code(),
                    error = %e,
                    "Changelog update failed after rollback; version swap stands"
                );
                warnings.push(format!("changelog not updated: {}", e.message()));
                false
            }
        };

        Ok(RollbackResult {
            success: true,
            previous_version: outcome.previous,
            current_version: outcome.version,
            timestamp: Utc::now(),
            emergency,
            changelog_updated,
            warnings,
        })
    }

    /// Preview a rollback without writing anything.
    ///
    /// # Errors
    ///
    /// `Persistence` / `Serialization` if the stores cannot be read.
    pub fn simulate_rollback(&self, target: &Version) -> Result<RollbackSimulation> {
        let eligibility = self.check_rollback_eligibility(target)?;
        let current = self.snapshots.get_active_version()?;

        let sections_affected = match (current, self.snapshots.exists(target)?) {
            (_, false) => 0,
            (Some(current), true) if current != *target => self
                .snapshots
                .get_diff_between(&current, target)?
                .sections
                .iter()
                .filter(|s| s.change != SectionChangeKind::Unchanged)
                .count(),
            (Some(_), true) => 0,
            (None, true) => match self.snapshots.get(target)? {
                Some(snapshot) => diff_against_empty(&snapshot).sections.len(),
                None => 0,
            },
        };

        Ok(RollbackSimulation {
            would_succeed: eligibility.eligible,
            issues: eligibility.issues,
            effects: RollbackEffects {
                current_version: current,
                target_version: *target,
                sections_affected,
                changelog_entry_needed: !self.changelog.has_entry(target)?,
            },
        })
    }

    /// Undo the last activation: roll back to the version just below the
    /// current one in newest-first order.
    ///
    /// # Errors
    ///
    /// - `NotEligible` if there is no current version or nothing below it
    /// - as [`RollbackManager::perform_rollback`]
    pub fn rollback_once(&self, actor: &str, role: &str, reason: &str) -> Result<RollbackResult> {
        let current = self.snapshots.get_active_version()?.ok_or_else(|| {
            ExError::new(ExErrorKind::NotEligible)
                .with_op("rollback_once")
                .with_message("no active version to roll back from")
        })?;

        let versions = self.snapshots.list_versions()?;
        let target = versions
            .iter()
            .position(|v| *v == current)
            .and_then(|i| versions.get(i + 1))
            .copied()
            .ok_or_else(|| {
                ExError::new(ExErrorKind::NotEligible)
                    .with_op("rollback_once")
                    .with_version(current)
                    .with_message(format!("no version before {} to roll back to", current))
            })?;

        self.perform_rollback(&RollbackRequest::new(target, actor, role, reason))
    }

    /// Every `TRUST_ROLLBACK` audit event, oldest first.
    ///
    /// # Errors
    ///
    /// `Persistence` / `Serialization` if the audit log cannot be read.
    pub fn get_rollback_history(&self) -> Result<Vec<AuditEvent>> {
        self.snapshots
            .audit_log()
            .list_by_event(AuditEventType::TrustRollback)
    }

    /// # Errors
    ///
    /// As [`RollbackManager::get_rollback_history`].
    pub fn get_last_rollback(&self) -> Result<Option<AuditEvent>> {
        Ok(self.get_rollback_history()?.pop())
    }

    /// Whether a rollback happened within the last `window_hours`.
    ///
    /// A window reaching past the representable time range is unbounded, so
    /// any recorded rollback counts.
    ///
    /// # Errors
    ///
    /// As [`RollbackManager::get_rollback_history`].
    pub fn has_recent_rollback(&self, window_hours: i64) -> Result<bool> {
        let cutoff = Duration::try_hours(window_hours)
            .and_then(|window| Utc::now().checked_sub_signed(window));
        Ok(self
            .get_rollback_history()?
            .iter()
            .any(|e| cutoff.map_or(true, |cutoff| e.timestamp >= cutoff)))
    }
}

fn require_reason(op: &str, request: &RollbackRequest) -> Result<()> {
    for (field, value) in [
        ("actor", &request.actor),
        ("role", &request.role),
        ("reason", &request.reason),
    ] {
        if value.trim().is_empty() {
            return Err(ExError::new(ExErrorKind::InvalidInput)
                .with_op(op.to_string())
                .with_version(request.target_version)
                .with_message(format!("rollback {} must not be empty", field)));
        }
    }
    Ok(())
}
