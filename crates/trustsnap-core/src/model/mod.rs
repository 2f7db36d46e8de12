//! Domain model: snapshots, changelog entries and audit events.

pub mod audit;
pub mod changelog;
pub mod snapshot;

pub use audit::{AuditEvent, AuditEventType};
pub use changelog::{ChangeType, ChangelogEntry};
pub use snapshot::{Author, Section, Snapshot, SnapshotStatus};
