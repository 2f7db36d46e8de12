use crate::version::Version;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Kind of public change a version introduces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChangeType {
    Clarification,
    Addition,
    ScopeChange,
}

impl ChangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeType::Clarification => "clarification",
            ChangeType::Addition => "addition",
            ChangeType::ScopeChange => "scope-change",
        }
    }
}

impl std::str::FromStr for ChangeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "clarification" => Ok(ChangeType::Clarification),
            "addition" => Ok(ChangeType::Addition),
            "scope-change" => Ok(ChangeType::ScopeChange),
            other => Err(format!("unknown change type: {}", other)),
        }
    }
}

impl std::fmt::Display for ChangeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Customer-facing description of one version. Exactly one per version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangelogEntry {
    pub version: Version,
    pub date: NaiveDate,
    #[serde(rename = "type")]
    pub change_type: ChangeType,
    pub summary: String,
    pub customer_impact: String,
    pub link: String,
}

impl ChangelogEntry {
    /// Standard link to the public trust page anchor for a version.
    pub fn default_link(version: &Version) -> String {
        format!("/trust/changelog#{}", version)
    }
}
