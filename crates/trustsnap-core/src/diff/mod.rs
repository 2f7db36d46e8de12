//! Snapshot diff engine.
//!
//! Line-level LCS diffing composed into section-level and snapshot-level
//! comparisons, plus presentation helpers.
//!
//! ## Entry points
//!
//! ```
//! use trustsnap_core::diff::{diff_lines, LineChangeKind};
//!
//! let old = vec!["a".to_string(), "b".to_string()];
//! let new = vec!["a".to_string(), "c".to_string()];
//! let lines = diff_lines(&old, &new);
//! assert_eq!(lines[0].kind, LineChangeKind::Unchanged);
//! ```
//!
//! ## Guarantees
//!
//! - **Identity**: `diff_lines(x, x)` marks every line unchanged.
//! - **Symmetry**: swapping the sides swaps added/removed counts and the
//!   added/removed roles of whole sections.
//! - **Determinism**: section order follows the newer snapshot, with
//!   sections only present in the older one appended in their original order.

pub mod engine;
pub mod format;
pub mod model;

pub use engine::{diff_against_empty, diff_lines, diff_section, diff_snapshots};
pub use format::{
    diff_summary, escape_html, format_change_list, format_unified_diff, has_changes,
    render_diff_html,
};
pub use model::{DiffStats, LineChangeKind, LineDiff, SectionChangeKind, SectionDiff, SnapshotDiff};
