//! trustsnap store - persistence and the versioned trust stores
//!
//! Provides:
//! - The `TrustStorage` port with SQLite and in-memory backends
//! - Embedded, checksummed SQLite migrations
//! - `SnapshotStore`: versioned immutable snapshots with a single active version
//! - `ChangelogStore`: one public entry per version
//! - `AuditLog`: append-only structural audit trail

pub mod audit_log;
pub mod changelog_store;
pub mod db;
pub mod errors;
pub mod migrations;
pub mod snapshot_store;
pub mod storage;

// Re-export key types
pub use audit_log::AuditLog;
pub use changelog_store::ChangelogStore;
pub use errors::Result;
pub use snapshot_store::{ActivationOutcome, SnapshotStore};
pub use storage::{MemoryStorage, SqliteStorage, TrustStorage};
