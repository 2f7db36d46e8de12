//! trustsnap core - versioned trust content kernel
//!
//! This crate holds everything that does not touch storage:
//! - Version parsing, ordering and bumping
//! - Snapshot, changelog and audit models with structural validation
//! - The LCS-based diff engine and its presentation helpers
//! - Marketing-safety linting for public changelog text
//! - The error and logging facilities shared by the other crates

pub mod diff;
pub mod errors;
pub mod logging_facility;
pub mod marketing;
pub mod model;
pub mod rules;
pub mod version;

// Re-export commonly used types
pub use errors::{ExError, ExErrorKind, Result, VersionFormatError};
pub use model::{
    AuditEvent, AuditEventType, Author, ChangeType, ChangelogEntry, Section, Snapshot,
    SnapshotStatus,
};
pub use version::{bump_version, parse_version, BumpKind, Version};
