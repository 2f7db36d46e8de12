//! Public changelog, one entry per version.
//!
//! Entries are append-only except for rollback re-labelling, which overwrites
//! the entry of the version being restored.

use crate::errors::Result;
use crate::storage::TrustStorage;
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use trustsnap_core::errors::{ExError, ExErrorKind};
use trustsnap_core::marketing::validate_marketing_safe;
use trustsnap_core::model::{ChangeType, ChangelogEntry};
use trustsnap_core::rules::changelog_issues;
use trustsnap_core::version::Version;
use trustsnap_core::{log_op_end, log_op_error, log_op_start};

/// Marketing lint findings for one changelog entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LintFinding {
    pub version: Version,
    pub violations: Vec<String>,
}

#[derive(Clone)]
pub struct ChangelogStore {
    storage: Arc<dyn TrustStorage>,
}

impl ChangelogStore {
    pub fn new(storage: Arc<dyn TrustStorage>) -> Self {
        Self { storage }
    }

    /// Add the entry for a version.
    ///
    /// Marketing-lint violations are logged but never block the write.
    ///
    /// # Errors
    ///
    /// - `InvalidInput` if a required field is blank
    /// - `AlreadyExists` if the version already has an entry
    /// - `Persistence` if the backend rejects the write
    pub fn add_entry(&self, entry: ChangelogEntry) -> Result<ChangelogEntry> {
        let start = Instant::now();
        log_op_start!("changelog_add", version = %entry.version);

        let result = self.add_entry_inner(entry);
        let duration_ms = start.elapsed().as_millis() as u64;
        match &result {
            Ok(entry) => {
                log_op_end!("changelog_add", duration_ms = duration_ms, version = %entry.version);
            }
            Err(e) => {
                log_op_error!("changelog_add", *e, duration_ms = duration_ms);
            }
        }
        result
    }

    fn add_entry_inner(&self, entry: ChangelogEntry) -> Result<ChangelogEntry> {
        let issues = changelog_issues(&entry);
        if !issues.is_empty() {
            return Err(ExError::new(ExErrorKind::InvalidInput)
                .with_op("changelog_add")
                .with_version(entry.version)
                .with_message("changelog entry failed validation")
                .with_failures(issues));
        }

        let violations = lint_entry(&entry);
        if !violations.is_empty() {
            tracing::warn!(
                version = %entry.version,
                violations = ?violations,
                "Changelog entry is not marketing-safe"
            );
        }

        if !self.storage.put_changelog_if_absent(&entry)? {
            return Err(ExError::new(ExErrorKind::AlreadyExists)
                .with_op("changelog_add")
                .with_version(entry.version)
                .with_message(format!("changelog entry for {} already exists", entry.version)));
        }

        Ok(entry)
    }

    /// Record that the public content was reverted to `version`.
    ///
    /// Overwrites the existing entry for `version` in place, or appends one if
    /// the version never had an entry.
    ///
    /// # Errors
    ///
    /// `Persistence` if the backend rejects the write.
    pub fn add_rollback_entry(
        &self,
        version: Version,
        reason: Option<&str>,
    ) -> Result<ChangelogEntry> {
        let summary = match reason.map(str::trim).filter(|r| !r.is_empty()) {
            Some(reason) => format!("Reverted to {}: {}", version, reason),
            None => format!("Reverted to {}", version),
        };
        let entry = ChangelogEntry {
            version,
            date: Utc::now().date_naive(),
            change_type: ChangeType::Clarification,
            summary,
            customer_impact: format!("The published trust content now matches version {}.", version),
            link: ChangelogEntry::default_link(&version),
        };

        self.storage.upsert_changelog(&entry)?;
        tracing::info!(version = %version, "Recorded rollback changelog entry");
        Ok(entry)
    }

    /// Every entry, newest version first.
    ///
    /// # Errors
    ///
    /// `Persistence` / `Serialization` if the backend cannot be read.
    pub fn get_all_entries(&self) -> Result<Vec<ChangelogEntry>> {
        let mut entries = self.storage.list_changelog()?;
        entries.sort_by(|a, b| b.version.cmp(&a.version));
        Ok(entries)
    }

    /// # Errors
    ///
    /// `Persistence` / `Serialization` if the backend cannot be read.
    pub fn get_entry(&self, version: &Version) -> Result<Option<ChangelogEntry>> {
        self.storage.get_changelog(version)
    }

    /// # Errors
    ///
    /// `Persistence` / `Serialization` if the backend cannot be read.
    pub fn has_entry(&self, version: &Version) -> Result<bool> {
        Ok(self.get_entry(version)?.is_some())
    }

    /// Entry for the highest version, if any.
    ///
    /// # Errors
    ///
    /// `Persistence` / `Serialization` if the backend cannot be read.
    pub fn get_latest_entry(&self) -> Result<Option<ChangelogEntry>> {
        Ok(self.get_all_entries()?.into_iter().next())
    }

    /// # Errors
    ///
    /// `Persistence` / `Serialization` if the backend cannot be read.
    pub fn get_entries_by_type(&self, change_type: ChangeType) -> Result<Vec<ChangelogEntry>> {
        Ok(self
            .get_all_entries()?
            .into_iter()
            .filter(|e| e.change_type == change_type)
            .collect())
    }

    /// Marketing lint over every entry; entries without findings are omitted.
    ///
    /// # Errors
    ///
    /// `Persistence` / `Serialization` if the backend cannot be read.
    pub fn lint_all(&self) -> Result<Vec<LintFinding>> {
        Ok(self
            .get_all_entries()?
            .iter()
            .filter_map(|entry| {
                let violations = lint_entry(entry);
                (!violations.is_empty()).then(|| LintFinding {
                    version: entry.version,
                    violations,
                })
            })
            .collect())
    }
}

fn lint_entry(entry: &ChangelogEntry) -> Vec<String> {
    let mut violations: Vec<String> = validate_marketing_safe(&entry.summary)
        .into_iter()
        .map(|v| format!("summary: {}", v))
        .collect();
    violations.extend(
        validate_marketing_safe(&entry.customer_impact)
            .into_iter()
            .map(|v| format!("customer_impact: {}", v)),
    );
    violations
}
