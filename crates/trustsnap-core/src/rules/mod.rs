//! Structural validation of snapshots and changelog entries.

pub mod validation;

pub use validation::{
    changelog_issues, is_valid_changelog_entry, is_valid_snapshot, section_issues,
    snapshot_issues, validate_snapshot_value,
};
