//! Marketing-safety lint for public changelog text.
//!
//! Advisory only: callers decide whether violations block a write. The lint
//! flags internal engineering vocabulary, blame language and text outside the
//! length band a public changelog line should fit in.

use regex::Regex;
use std::sync::OnceLock;

/// Minimum public text length, in characters.
pub const MIN_PUBLIC_TEXT_LEN: usize = 10;
/// Maximum public text length, in characters.
pub const MAX_PUBLIC_TEXT_LEN: usize = 500;

/// Internal process/engineering terms that should not reach customers.
const INTERNAL_JARGON: &[&str] = &[
    "jira",
    "sprint",
    "backlog",
    "standup",
    "retro",
    "postmortem",
    "post-mortem",
    "hotfix",
    "refactor",
    "tech debt",
    "technical debt",
    "regression",
    "staging",
    "repo",
    "pull request",
    "merge conflict",
    "ticket",
    "on-call",
    "okr",
    "wip",
    "todo",
];

/// Blame-language patterns, matched case-insensitively.
const BLAME_PATTERNS: &[(&str, &str)] = &[
    (r"\bhuman error\b", "human error"),
    (r"\b(fault|blame|blamed|blaming)\b", "assigns fault"),
    (r"\b(mistake|screw[- ]?up|messed up)\b", "admits a mistake"),
    (
        r"\b(engineer|developer|employee|contractor|vendor|intern)s?\s+(broke|failed|forgot|caused)\b",
        "blames a person or party",
    ),
    (r"\bnot our (fault|responsibility)\b", "deflects responsibility"),
];

fn jargon_patterns() -> &'static Vec<(String, Regex)> {
    static PATTERNS: OnceLock<Vec<(String, Regex)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        INTERNAL_JARGON
            .iter()
            .map(|term| {
                let pattern = format!(r"(?i)\b{}\b", regex::escape(term));
                let re = Regex::new(&pattern).expect("escaped literal is a valid regex");
                (term.to_string(), re)
            })
            .collect()
    })
}

fn blame_patterns() -> &'static Vec<(&'static str, Regex)> {
    static PATTERNS: OnceLock<Vec<(&'static str, Regex)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        BLAME_PATTERNS
            .iter()
            .map(|(pattern, label)| {
                let re = Regex::new(&format!("(?i){}", pattern))
                    .expect("blame patterns are valid regexes");
                (*label, re)
            })
            .collect()
    })
}

/// Lint a piece of public-facing text.
///
/// Returns one message per violation; an empty list means the text is safe.
pub fn validate_marketing_safe(text: &str) -> Vec<String> {
    let mut violations = Vec::new();

    let len = text.trim().chars().count();
    if len < MIN_PUBLIC_TEXT_LEN {
        violations.push(format!(
            "text too short: {} characters (minimum {})",
            len, MIN_PUBLIC_TEXT_LEN
        ));
    }
    if len > MAX_PUBLIC_TEXT_LEN {
        violations.push(format!(
            "text too long: {} characters (maximum {})",
            len, MAX_PUBLIC_TEXT_LEN
        ));
    }

    for (term, re) in jargon_patterns() {
        if re.is_match(text) {
            violations.push(format!("internal jargon: '{}'", term));
        }
    }

    for (label, re) in blame_patterns() {
        if let Some(m) = re.find(text) {
            violations.push(format!("blame language ({}): '{}'", label, m.as_str()));
        }
    }

    violations
}

/// Convenience boolean over [`validate_marketing_safe`].
pub fn is_marketing_safe(text: &str) -> bool {
    validate_marketing_safe(text).is_empty()
}
