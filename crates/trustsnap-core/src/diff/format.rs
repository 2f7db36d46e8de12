//! Presentation helpers for snapshot diffs.
//!
//! Pure functions over a [`SnapshotDiff`]; none of them hold state.

use crate::diff::model::{LineChangeKind, SectionChangeKind, SnapshotDiff};

fn from_label(diff: &SnapshotDiff) -> String {
    diff.from_version
        .map(|v| v.to_string())
        .unwrap_or_else(|| "(empty)".to_string())
}

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("{} {}", n, word)
    } else {
        format!("{} {}s", n, word)
    }
}

/// True if the diff contains any added, removed or modified section.
pub fn has_changes(diff: &SnapshotDiff) -> bool {
    let s = &diff.stats;
    s.sections_added + s.sections_removed + s.sections_modified + s.lines_added + s.lines_removed
        > 0
}

/// One-line summary of the aggregate stats.
pub fn diff_summary(diff: &SnapshotDiff) -> String {
    if !has_changes(diff) {
        return "No changes".to_string();
    }
    let s = &diff.stats;
    format!(
        "{} added, {} removed, {} modified; +{} -{} lines",
        plural(s.sections_added, "section"),
        s.sections_removed,
        s.sections_modified,
        s.lines_added,
        s.lines_removed
    )
}

/// Render as unified-diff style text.
///
/// Only sections that changed are emitted; their unchanged lines are kept as
/// context so the reader sees where a change landed.
pub fn format_unified_diff(diff: &SnapshotDiff) -> String {
    let mut out = String::new();
    out.push_str(&format!("--- trust {}\n", from_label(diff)));
    out.push_str(&format!("+++ trust {}\n", diff.to_version));

    for section in &diff.sections {
        let label = match section.change {
            SectionChangeKind::Unchanged => continue,
            SectionChangeKind::Added => "added",
            SectionChangeKind::Removed => "removed",
            SectionChangeKind::Modified => "modified",
        };
        out.push_str(&format!(
            "@@ {} ({}) -{} +{} @@\n",
            section.section_id, label, section.lines_removed, section.lines_added
        ));
        for line in &section.lines {
            let prefix = match line.kind {
                LineChangeKind::Added => '+',
                LineChangeKind::Removed => '-',
                LineChangeKind::Unchanged => ' ',
            };
            out.push(prefix);
            out.push_str(&line.content);
            out.push('\n');
        }
    }

    out
}

/// Short human-readable change list, one bullet per changed section.
///
/// Returns exactly `"No changes"` when nothing changed.
pub fn format_change_list(diff: &SnapshotDiff) -> String {
    let items: Vec<String> = diff
        .sections
        .iter()
        .filter_map(|section| match section.change {
            SectionChangeKind::Added => Some(format!(
                "- Added section \"{}\" ({})",
                section.title,
                plural(section.lines_added, "line")
            )),
            SectionChangeKind::Removed => Some(format!(
                "- Removed section \"{}\" ({})",
                section.title,
                plural(section.lines_removed, "line")
            )),
            SectionChangeKind::Modified => Some(format!(
                "- Updated section \"{}\" (+{} -{})",
                section.title, section.lines_added, section.lines_removed
            )),
            SectionChangeKind::Unchanged => None,
        })
        .collect();

    if items.is_empty() {
        "No changes".to_string()
    } else {
        items.join("\n")
    }
}

/// Escape text for inclusion in HTML element content or attribute values.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Render the diff as escaped HTML markup for the public trust page.
pub fn render_diff_html(diff: &SnapshotDiff) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "<div class=\"trust-diff\" data-from=\"{}\" data-to=\"{}\">\n",
        escape_html(&from_label(diff)),
        diff.to_version
    ));

    for section in &diff.sections {
        if section.change == SectionChangeKind::Unchanged {
            continue;
        }
        let change = match section.change {
            SectionChangeKind::Added => "added",
            SectionChangeKind::Removed => "removed",
            _ => "modified",
        };
        out.push_str(&format!(
            "  <section class=\"diff-section diff-section-{}\" data-section-id=\"{}\">\n",
            change,
            escape_html(&section.section_id)
        ));
        out.push_str(&format!("    <h3>{}</h3>\n    <ul>\n", escape_html(&section.title)));
        for line in &section.lines {
            let (class, marker) = match line.kind {
                LineChangeKind::Added => ("diff-added", "+"),
                LineChangeKind::Removed => ("diff-removed", "-"),
                LineChangeKind::Unchanged => ("diff-unchanged", "&nbsp;"),
            };
            out.push_str(&format!(
                "      <li class=\"{}\"><span class=\"diff-marker\">{}</span>{}</li>\n",
                class,
                marker,
                escape_html(&line.content)
            ));
        }
        out.push_str("    </ul>\n  </section>\n");
    }

    out.push_str("</div>\n");
    out
}
