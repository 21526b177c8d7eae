//! Contributor record model and its TOML document form
//!
//! One document per contributor:
//!
//! ```toml
//! schema_version = 1
//!
//! [contributor]
//! github_username = "Alice"
//! discord_id = "123456789012345678"
//! wallet_address = "0x1234567890abcdef1234567890abcdef12345678"
//! total_prs = 1
//!
//! [status]
//! current_role = "Apprentice"
//! blocked = false
//!
//! [stats]
//! total_prs = 1
//! avg_lines_changed = 42.0
//!
//! [[pull_requests]]
//! pr_number = 17
//! repository = "org/repo"
//! title = "Fix typo"
//! lines_changed = 42
//! labels = ["docs"]
//! ```
//!
//! `status` and `stats` are optional on read and default to Apprentice/unblocked
//! and zero. Every mutation recomputes both PR counters from the list length.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::config::{RegistrySettings, USERNAME_PLACEHOLDER};
use crate::error::{RegistryError, Result};
use crate::identity::sanitize_username;

// =============================================================================
// RECORD
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContributorRecord {
    pub schema_version: u32,

    #[serde(rename = "contributor")]
    pub identity: Identity,

    #[serde(default)]
    pub status: Status,

    #[serde(default)]
    pub stats: Stats,

    /// Chronological append order.
    #[serde(default)]
    pub pull_requests: Vec<PullRequestEntry>,
}

/// Identity fields, immutable after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub github_username: String,
    pub discord_id: String,
    pub wallet_address: String,
    #[serde(default)]
    pub total_prs: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Status {
    #[serde(default)]
    pub current_role: Role,
    #[serde(default)]
    pub blocked: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    #[serde(default)]
    pub total_prs: u64,
    #[serde(default)]
    pub avg_lines_changed: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestEntry {
    pub pr_number: u64,
    pub repository: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub lines_changed: u64,
    #[serde(default)]
    pub labels: BTreeSet<String>,
}

/// Contributor role tier. Unknown tiers are preserved verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    #[default]
    Apprentice,
    Sentinel,
    Other(String),
}

impl Role {
    pub fn as_str(&self) -> &str {
        match self {
            Role::Apprentice => "Apprentice",
            Role::Sentinel => "Sentinel",
            Role::Other(name) => name,
        }
    }
}

impl From<String> for Role {
    fn from(value: String) -> Self {
        match value.as_str() {
            "Apprentice" => Role::Apprentice,
            "Sentinel" => Role::Sentinel,
            _ => Role::Other(value),
        }
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.as_str().to_string()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl PullRequestEntry {
    pub fn new(pr_number: u64, repository: impl Into<String>) -> Self {
        Self {
            pr_number,
            repository: repository.into(),
            title: String::new(),
            lines_changed: 0,
            labels: BTreeSet::new(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_lines_changed(mut self, lines_changed: u64) -> Self {
        self.lines_changed = lines_changed;
        self
    }

    /// Lines changed as additions plus deletions.
    pub fn with_diff_stats(self, additions: u64, deletions: u64) -> Self {
        self.with_lines_changed(additions.saturating_add(deletions))
    }

    pub fn with_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels = labels.into_iter().map(Into::into).collect();
        self
    }

    fn same_pull_request(&self, other: &PullRequestEntry) -> bool {
        self.pr_number == other.pr_number
            && self.repository.eq_ignore_ascii_case(&other.repository)
    }
}

impl ContributorRecord {
    /// New record holding its first qualifying PR.
    pub fn create(
        schema_version: u32,
        github_username: &str,
        discord_id: &str,
        wallet_address: &str,
        first_pr: PullRequestEntry,
    ) -> Self {
        let mut record = Self {
            schema_version,
            identity: Identity {
                github_username: github_username.to_string(),
                discord_id: discord_id.to_string(),
                wallet_address: wallet_address.to_string(),
                total_prs: 0,
            },
            status: Status::default(),
            stats: Stats::default(),
            pull_requests: vec![first_pr],
        };
        record.recompute_stats();
        record
    }

    pub fn contains_pull_request(&self, entry: &PullRequestEntry) -> bool {
        self.pull_requests.iter().any(|pr| pr.same_pull_request(entry))
    }

    /// Append one PR. Returns `false` (and leaves the record untouched) when
    /// the same repository/number pair is already recorded.
    pub fn append_pull_request(&mut self, entry: PullRequestEntry) -> bool {
        if self.contains_pull_request(&entry) {
            return false;
        }
        self.pull_requests.push(entry);
        self.recompute_stats();
        true
    }

    /// Derive both counters and the line average from the PR list.
    pub fn recompute_stats(&mut self) {
        let total = self.pull_requests.len() as u64;
        let lines: u64 = self.pull_requests.iter().map(|pr| pr.lines_changed).sum();
        self.identity.total_prs = total;
        self.stats.total_prs = total;
        self.stats.avg_lines_changed = if total == 0 {
            0.0
        } else {
            lines as f64 / total as f64
        };
    }

    /// Whether this record belongs to `username` (case-insensitive).
    pub fn belongs_to(&self, username: &str) -> bool {
        self.identity.github_username.eq_ignore_ascii_case(username)
    }

    /// Parse a record document; `path` is only used for error context.
    pub fn from_document(path: &str, text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| RegistryError::Parse {
            path: path.to_string(),
            message: e.to_string(),
        })
    }

    /// Canonical document form.
    pub fn to_document(&self, path: &str) -> Result<String> {
        toml::to_string(self).map_err(|e| RegistryError::Parse {
            path: path.to_string(),
            message: format!("serialize: {e}"),
        })
    }
}

// =============================================================================
// LAYOUT
// =============================================================================

/// Deterministic mapping from username to record path inside a checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordLayout {
    pattern: String,
}

impl RecordLayout {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
        }
    }

    pub fn from_settings(settings: &RegistrySettings) -> Self {
        Self::new(settings.contributor_file_pattern.clone())
    }

    /// Relative record path for `username`.
    pub fn record_path(&self, username: &str) -> Result<String> {
        let key = sanitize_username(username);
        if key.is_empty() {
            return Err(RegistryError::InvalidUsername(username.to_string()));
        }
        Ok(self.pattern.replace(USERNAME_PLACEHOLDER, &key))
    }
}

impl Default for RecordLayout {
    fn default() -> Self {
        Self::new(format!("{USERNAME_PLACEHOLDER}.toml"))
    }
}
