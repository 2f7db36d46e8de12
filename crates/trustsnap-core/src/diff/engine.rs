//! Diff computation.
//!
//! [`diff_lines`] is the only algorithmic piece: a full LCS table over the
//! two line lists followed by a forward walk. Everything else composes it.

use crate::diff::model::{
    DiffStats, LineChangeKind, LineDiff, SectionChangeKind, SectionDiff, SnapshotDiff,
};
use crate::model::{Section, Snapshot};
use std::collections::HashSet;

fn added(content: &str, new_line: usize) -> LineDiff {
    LineDiff {
        kind: LineChangeKind::Added,
        content: content.to_string(),
        old_line_number: None,
        new_line_number: Some(new_line),
    }
}

fn removed(content: &str, old_line: usize) -> LineDiff {
    LineDiff {
        kind: LineChangeKind::Removed,
        content: content.to_string(),
        old_line_number: Some(old_line),
        new_line_number: None,
    }
}

fn unchanged(content: &str, old_line: usize, new_line: usize) -> LineDiff {
    LineDiff {
        kind: LineChangeKind::Unchanged,
        content: content.to_string(),
        old_line_number: Some(old_line),
        new_line_number: Some(new_line),
    }
}

/// Compute an ordered line diff between two line lists.
///
/// Builds the full `(m+1) x (n+1)` LCS table, O(m·n) in time and space, where
/// `table[i][j]` is the LCS length of `old[i..]` and `new[j..]`. The walk keeps
/// a matching line (diagonal step) before considering a removal or addition,
/// and prefers removal over addition when both are equally good.
///
/// Either side empty short-circuits to all-added / all-removed without the table.
pub fn diff_lines<S: AsRef<str>>(old: &[S], new: &[S]) -> Vec<LineDiff> {
    if old.is_empty() {
        return new
            .iter()
            .enumerate()
            .map(|(j, line)| added(line.as_ref(), j + 1))
            .collect();
    }
    if new.is_empty() {
        return old
            .iter()
            .enumerate()
            .map(|(i, line)| removed(line.as_ref(), i + 1))
            .collect();
    }

    let m = old.len();
    let n = new.len();
    let mut table = vec![vec![0usize; n + 1]; m + 1];
    for i in (0..m).rev() {
        for j in (0..n).rev() {
            table[i][j] = if old[i].as_ref() == new[j].as_ref() {
                table[i + 1][j + 1] + 1
            } else {
                table[i + 1][j].max(table[i][j + 1])
            };
        }
    }

    let mut out = Vec::with_capacity(m.max(n));
    let (mut i, mut j) = (0, 0);
    while i < m && j < n {
        if old[i].as_ref() == new[j].as_ref() {
            out.push(unchanged(old[i].as_ref(), i + 1, j + 1));
            i += 1;
            j += 1;
        } else if table[i + 1][j] >= table[i][j + 1] {
            out.push(removed(old[i].as_ref(), i + 1));
            i += 1;
        } else {
            out.push(added(new[j].as_ref(), j + 1));
            j += 1;
        }
    }
    while i < m {
        out.push(removed(old[i].as_ref(), i + 1));
        i += 1;
    }
    while j < n {
        out.push(added(new[j].as_ref(), j + 1));
        j += 1;
    }

    out
}

fn count(lines: &[LineDiff], kind: LineChangeKind) -> usize {
    lines.iter().filter(|l| l.kind == kind).count()
}

/// Diff one section against its counterpart.
///
/// Only `new` present: every line added. Only `old` present: every line
/// removed. Both present: line diff. Neither present: `None`.
pub fn diff_section(old: Option<&Section>, new: Option<&Section>) -> Option<SectionDiff> {
    let (section_id, title, change, lines) = match (old, new) {
        (None, None) => return None,
        (None, Some(n)) => (
            n.id.clone(),
            n.title.clone(),
            SectionChangeKind::Added,
            diff_lines::<String>(&[], &n.lines),
        ),
        (Some(o), None) => (
            o.id.clone(),
            o.title.clone(),
            SectionChangeKind::Removed,
            diff_lines::<String>(&o.lines, &[]),
        ),
        (Some(o), Some(n)) => {
            let lines = diff_lines(&o.lines, &n.lines);
            let change = if lines.iter().any(LineDiff::is_change) {
                SectionChangeKind::Modified
            } else {
                SectionChangeKind::Unchanged
            };
            (n.id.clone(), n.title.clone(), change, lines)
        }
    };

    Some(SectionDiff {
        lines_added: count(&lines, LineChangeKind::Added),
        lines_removed: count(&lines, LineChangeKind::Removed),
        section_id,
        title,
        change,
        lines,
    })
}

fn compose(old: &Snapshot, new: &Snapshot) -> (Vec<SectionDiff>, DiffStats) {
    let mut sections = Vec::with_capacity(new.sections.len());
    let mut stats = DiffStats::default();

    let new_ids: HashSet<&str> = new.sections.iter().map(|s| s.id.as_str()).collect();
    let ordered = new
        .sections
        .iter()
        .map(|n| (old.section(&n.id), Some(n)))
        .chain(
            old.sections
                .iter()
                .filter(|o| !new_ids.contains(o.id.as_str()))
                .map(|o| (Some(o), None)),
        );

    for (o, n) in ordered {
        let Some(section) = diff_section(o, n) else {
            continue;
        };
        match section.change {
            SectionChangeKind::Added => stats.sections_added += 1,
            SectionChangeKind::Removed => stats.sections_removed += 1,
            SectionChangeKind::Modified => stats.sections_modified += 1,
            SectionChangeKind::Unchanged => {}
        }
        stats.lines_added += section.lines_added;
        stats.lines_removed += section.lines_removed;
        sections.push(section);
    }

    (sections, stats)
}

/// Diff two snapshots, matching sections by id.
pub fn diff_snapshots(old: &Snapshot, new: &Snapshot) -> SnapshotDiff {
    let (sections, stats) = compose(old, new);
    SnapshotDiff {
        from_version: Some(old.version),
        to_version: new.version,
        sections,
        stats,
    }
}

/// Diff a snapshot against a synthetic empty baseline: everything is added.
pub fn diff_against_empty(new: &Snapshot) -> SnapshotDiff {
    let (sections, stats) = compose(&Snapshot::empty_baseline(), new);
    SnapshotDiff {
        from_version: None,
        to_version: new.version,
        sections,
        stats,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Author;
    use crate::version::Version;

    fn lines(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    fn kinds(diff: &[LineDiff]) -> Vec<LineChangeKind> {
        diff.iter().map(|l| l.kind).collect()
    }

    fn snap(version: Version, sections: &[(&str, &[&str])]) -> Snapshot {
        Snapshot::new(
            version,
            Author::new("Dana", "compliance"),
            "summary",
            sections
                .iter()
                .map(|(id, ls)| Section::new(*id, id.to_uppercase(), lines(ls)))
                .collect(),
        )
    }

    #[test]
    fn test_both_empty_yields_nothing() {
        assert!(diff_lines::<String>(&[], &[]).is_empty());
    }

    #[test]
    fn test_all_added_when_old_empty() {
        let d = diff_lines(&[], &lines(&["a", "b"]));
        assert_eq!(kinds(&d), vec![LineChangeKind::Added, LineChangeKind::Added]);
        assert_eq!(d[1].new_line_number, Some(2));
        assert_eq!(d[1].old_line_number, None);
    }

    #[test]
    fn test_all_removed_when_new_empty() {
        let d = diff_lines(&lines(&["a", "b"]), &[]);
        assert_eq!(
            kinds(&d),
            vec![LineChangeKind::Removed, LineChangeKind::Removed]
        );
        assert_eq!(d[0].old_line_number, Some(1));
    }

    #[test]
    fn test_replacement_in_middle() {
        let d = diff_lines(&lines(&["a", "b", "c"]), &lines(&["a", "x", "c"]));
        assert_eq!(
            kinds(&d),
            vec![
                LineChangeKind::Unchanged,
                LineChangeKind::Removed,
                LineChangeKind::Added,
                LineChangeKind::Unchanged
            ]
        );
        assert_eq!(d[3].old_line_number, Some(3));
        assert_eq!(d[3].new_line_number, Some(3));
    }

    #[test]
    fn test_insertion_keeps_common_lines() {
        let d = diff_lines(&lines(&["a", "c"]), &lines(&["a", "b", "c"]));
        assert_eq!(
            kinds(&d),
            vec![
                LineChangeKind::Unchanged,
                LineChangeKind::Added,
                LineChangeKind::Unchanged
            ]
        );
        assert_eq!(d[1].content, "b");
        assert_eq!(d[2].old_line_number, Some(2));
        assert_eq!(d[2].new_line_number, Some(3));
    }

    #[test]
    fn test_diff_section_only_new() {
        let s = Section::new("privacy", "Privacy", lines(&["C"]));
        let d = diff_section(None, Some(&s)).unwrap();
        assert_eq!(d.change, SectionChangeKind::Added);
        assert_eq!(d.lines_added, 1);
        assert!(diff_section(None, None).is_none());
    }

    #[test]
    fn test_diff_snapshots_counts() {
        let a = snap(
            Version::new(1, 0, 0),
            &[("overview", &["A"]), ("security", &["B"]), ("legacy", &["L"])],
        );
        let b = snap(
            Version::new(1, 1, 0),
            &[("overview", &["A"]), ("security", &["B2"]), ("privacy", &["C"])],
        );
        let d = diff_snapshots(&a, &b);
        assert_eq!(d.stats.sections_added, 1);
        assert_eq!(d.stats.sections_removed, 1);
        assert_eq!(d.stats.sections_modified, 1);
        assert_eq!(d.stats.lines_added, 2);
        assert_eq!(d.stats.lines_removed, 2);
        // new order first, old-only sections appended
        let ids: Vec<&str> = d.sections.iter().map(|s| s.section_id.as_str()).collect();
        assert_eq!(ids, vec!["overview", "security", "privacy", "legacy"]);
    }

    #[test]
    fn test_diff_against_empty_is_all_added() {
        let b = snap(Version::new(1, 0, 0), &[("overview", &["A", "B"])]);
        let d = diff_against_empty(&b);
        assert_eq!(d.from_version, None);
        assert_eq!(d.stats.sections_added, 1);
        assert_eq!(d.stats.lines_added, 2);
        assert_eq!(d.stats.lines_removed, 0);
    }
}
