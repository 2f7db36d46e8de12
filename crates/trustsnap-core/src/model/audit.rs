use crate::version::Version;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Metadata key carrying the version that was active before a rollback.
pub const META_PREVIOUS_VERSION: &str = "previousVersion";

/// Structural audit event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditEventType {
    SnapshotCreated,
    SnapshotActivated,
    SnapshotRetired,
    TrustRollback,
}

impl AuditEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditEventType::SnapshotCreated => "SNAPSHOT_CREATED",
            AuditEventType::SnapshotActivated => "SNAPSHOT_ACTIVATED",
            AuditEventType::SnapshotRetired => "SNAPSHOT_RETIRED",
            AuditEventType::TrustRollback => "TRUST_ROLLBACK",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "SNAPSHOT_CREATED" => Some(AuditEventType::SnapshotCreated),
            "SNAPSHOT_ACTIVATED" => Some(AuditEventType::SnapshotActivated),
            "SNAPSHOT_RETIRED" => Some(AuditEventType::SnapshotRetired),
            "TRUST_ROLLBACK" => Some(AuditEventType::TrustRollback),
            _ => None,
        }
    }
}

impl std::fmt::Display for AuditEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Append-only record of a structural change to the snapshot store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: Uuid,
    pub event: AuditEventType,
    pub actor: String,
    pub role: String,
    pub timestamp: DateTime<Utc>,
    pub version: Version,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl AuditEvent {
    pub fn new(
        event: AuditEventType,
        version: Version,
        actor: impl Into<String>,
        role: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            event,
            actor: actor.into(),
            role: role.into(),
            timestamp: Utc::now(),
            version,
            reason: reason.into(),
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// `previousVersion` from the metadata of a rollback event, if present and well-formed.
    pub fn previous_version(&self) -> Option<Version> {
        self.metadata
            .as_ref()?
            .get(META_PREVIOUS_VERSION)?
            .as_str()?
            .parse()
            .ok()
    }
}
