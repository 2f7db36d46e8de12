//! Snapshot diff output types.
//!
//! All types are serde-serialisable so a diff can be returned verbatim from
//! the CLI (`--format json`) or a health endpoint.

use crate::version::Version;
use serde::{Deserialize, Serialize};

/// Classification of one line in a line diff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineChangeKind {
    Added,
    Removed,
    Unchanged,
}

/// One line of a line diff.
///
/// Line numbers are 1-based; `old_line_number` is `None` for added lines and
/// `new_line_number` is `None` for removed lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineDiff {
    pub kind: LineChangeKind,
    pub content: String,
    pub old_line_number: Option<usize>,
    pub new_line_number: Option<usize>,
}

impl LineDiff {
    pub fn is_change(&self) -> bool {
        self.kind != LineChangeKind::Unchanged
    }
}

/// How a whole section changed between two snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionChangeKind {
    Added,
    Removed,
    Modified,
    Unchanged,
}

/// Diff of one section, matched by id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionDiff {
    pub section_id: String,
    /// Title from the newer side when present, otherwise from the older side
    pub title: String,
    pub change: SectionChangeKind,
    pub lines: Vec<LineDiff>,
    pub lines_added: usize,
    pub lines_removed: usize,
}

/// Aggregate counters over a snapshot diff.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffStats {
    pub sections_added: usize,
    pub sections_removed: usize,
    /// Sections present on both sides whose line diff has any non-unchanged line
    pub sections_modified: usize,
    pub lines_added: usize,
    pub lines_removed: usize,
}

/// Comparison of two snapshot versions. Derived on demand, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotDiff {
    /// Older side; `None` when diffing against the empty baseline
    pub from_version: Option<Version>,
    pub to_version: Version,
    pub sections: Vec<SectionDiff>,
    pub stats: DiffStats,
}
