use crate::version::Version;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Publication status of a snapshot.
///
/// Every snapshot is created `Retired`; only activation flips it to `Active`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotStatus {
    Active,
    Retired,
}

impl SnapshotStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SnapshotStatus::Active => "active",
            SnapshotStatus::Retired => "retired",
        }
    }

    /// Parse the persisted string form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(SnapshotStatus::Active),
            "retired" => Some(SnapshotStatus::Retired),
            _ => None,
        }
    }
}

impl std::fmt::Display for SnapshotStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who authored a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub name: String,
    pub role: String,
}

impl Author {
    pub fn new(name: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            role: role.into(),
        }
    }
}

/// One titled block of trust content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub id: String,
    pub title: String,
    pub lines: Vec<String>,
}

impl Section {
    pub fn new(id: impl Into<String>, title: impl Into<String>, lines: Vec<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            lines,
        }
    }
}

/// An immutable, versioned unit of trust-facing content.
///
/// Only `status` may change after creation, and only through activation in
/// the snapshot store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: Version,
    pub released_at: DateTime<Utc>,
    pub status: SnapshotStatus,
    pub author: Author,
    pub summary: String,
    pub sections: Vec<Section>,
}

impl Snapshot {
    /// Build a new retired snapshot released now.
    pub fn new(
        version: Version,
        author: Author,
        summary: impl Into<String>,
        sections: Vec<Section>,
    ) -> Self {
        Self {
            version,
            released_at: Utc::now(),
            status: SnapshotStatus::Retired,
            author,
            summary: summary.into(),
            sections,
        }
    }

    /// Synthetic empty baseline used when diffing the very first version.
    pub fn empty_baseline() -> Self {
        Self {
            version: Version::new(0, 0, 0),
            released_at: DateTime::<Utc>::UNIX_EPOCH,
            status: SnapshotStatus::Retired,
            author: Author::new("system", "baseline"),
            summary: String::new(),
            sections: Vec::new(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == SnapshotStatus::Active
    }

    pub fn section(&self, id: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.id == id)
    }

    /// Copy of this snapshot carrying a different status.
    pub fn with_status(&self, status: SnapshotStatus) -> Self {
        Self {
            status,
            ..self.clone()
        }
    }

    pub fn line_count(&self) -> usize {
        self.sections.iter().map(|s| s.lines.len()).sum()
    }
}
