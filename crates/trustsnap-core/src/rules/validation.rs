use crate::model::{ChangelogEntry, Section, Snapshot};
use crate::version::is_valid_version;
use serde_json::Value;
use std::collections::HashSet;

/// Check the section list of a snapshot: non-empty ids, titles and line lists,
/// and ids unique within the snapshot.
///
/// Returns one message per problem; empty means valid.
pub fn section_issues(sections: &[Section]) -> Vec<String> {
    let mut issues = Vec::new();
    let mut seen = HashSet::new();

    for (idx, section) in sections.iter().enumerate() {
        if section.id.trim().is_empty() {
            issues.push(format!("section #{} has an empty id", idx));
        } else if !seen.insert(section.id.as_str()) {
            issues.push(format!("duplicate section id '{}'", section.id));
        }
        if section.title.trim().is_empty() {
            issues.push(format!("section '{}' has an empty title", section.id));
        }
        if section.lines.is_empty() {
            issues.push(format!("section '{}' has no lines", section.id));
        }
    }

    issues
}

/// All structural problems with a snapshot.
pub fn snapshot_issues(snapshot: &Snapshot) -> Vec<String> {
    let mut issues = Vec::new();

    if snapshot.author.name.trim().is_empty() {
        issues.push("author name is empty".to_string());
    }
    if snapshot.author.role.trim().is_empty() {
        issues.push("author role is empty".to_string());
    }
    if snapshot.summary.trim().is_empty() {
        issues.push("summary is empty".to_string());
    }
    if snapshot.sections.is_empty() {
        issues.push("snapshot has no sections".to_string());
    }
    issues.extend(section_issues(&snapshot.sections));

    issues
}

/// Type-guard style check used before every snapshot write. Never panics.
pub fn is_valid_snapshot(snapshot: &Snapshot) -> bool {
    snapshot_issues(snapshot).is_empty()
}

/// All structural problems with a changelog entry.
pub fn changelog_issues(entry: &ChangelogEntry) -> Vec<String> {
    let mut issues = Vec::new();

    if entry.summary.trim().is_empty() {
        issues.push("summary is empty".to_string());
    }
    if entry.customer_impact.trim().is_empty() {
        issues.push("customer impact is empty".to_string());
    }
    if entry.link.trim().is_empty() {
        issues.push("link is empty".to_string());
    }

    issues
}

/// Type-guard style check used before every changelog write. Never panics.
pub fn is_valid_changelog_entry(entry: &ChangelogEntry) -> bool {
    changelog_issues(entry).is_empty()
}

/// Shape check for an untyped snapshot document (imported JSON/YAML).
///
/// Looser than deserialisation errors: answers "is this plausibly a snapshot"
/// so import paths can reject junk with a single boolean.
pub fn validate_snapshot_value(value: &Value) -> bool {
    let Some(obj) = value.as_object() else {
        return false;
    };

    let version_ok = obj
        .get("version")
        .and_then(Value::as_str)
        .map(is_valid_version)
        .unwrap_or(false);

    // status is assigned by the store when absent
    let status_ok = match obj.get("status") {
        None => true,
        Some(status) => matches!(status.as_str(), Some("active") | Some("retired")),
    };

    let author_ok = obj
        .get("author")
        .and_then(Value::as_object)
        .map(|a| {
            a.get("name").and_then(Value::as_str).is_some()
                && a.get("role").and_then(Value::as_str).is_some()
        })
        .unwrap_or(false);

    let summary_ok = obj.get("summary").and_then(Value::as_str).is_some();

    let sections_ok = obj
        .get("sections")
        .and_then(Value::as_array)
        .map(|sections| {
            sections.iter().all(|s| {
                s.get("id").and_then(Value::as_str).is_some()
                    && s.get("title").and_then(Value::as_str).is_some()
                    && s.get("lines")
                        .and_then(Value::as_array)
                        .map(|lines| lines.iter().all(Value::is_string))
                        .unwrap_or(false)
            })
        })
        .unwrap_or(false);

    version_ok && status_ok && author_ok && summary_ok && sections_ok
}
