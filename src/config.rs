//! Registry configuration: loaded from TOML once, validated, passed explicitly.
//!
//! The `RegistryConfig` is constructed at process start and handed by
//! reference to every component. Nothing in the crate re-reads it.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{RegistryError, Result};

/// Placeholder substituted by the sanitized username in the filename pattern.
pub const USERNAME_PLACEHOLDER: &str = "{username}";

// ---------------------------------------------------------------------------
// RegistryConfig
// ---------------------------------------------------------------------------

/// Root configuration loaded from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    pub registry: RegistrySettings,
    #[serde(default)]
    pub onboarding: OnboardingRules,
    #[serde(default)]
    pub promotion: PromotionThresholds,
}

/// Where the registry lives and how records are laid out inside it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrySettings {
    /// Remote repository URL (https, file:// or a local path).
    #[serde(default)]
    pub url: String,

    #[serde(default = "default_file_pattern")]
    pub contributor_file_pattern: String,

    #[serde(default = "default_schema_version")]
    pub schema_version: u32,

    #[serde(default = "default_clone_timeout_secs")]
    pub clone_timeout_secs: u64,

    #[serde(default = "default_publish_timeout_secs")]
    pub publish_timeout_secs: u64,

    #[serde(default = "default_committer_name")]
    pub committer_name: String,

    #[serde(default = "default_committer_email")]
    pub committer_email: String,

    /// Fixed checkout path for durable sessions.
    #[serde(default)]
    pub session_dir: Option<PathBuf>,
}

/// Shape rules for identity fields.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OnboardingRules {
    #[serde(default = "default_discord_min")]
    pub discord_id_min_length: usize,
    #[serde(default = "default_discord_max")]
    pub discord_id_max_length: usize,
    #[serde(default = "default_wallet_prefix")]
    pub wallet_prefix: String,
    #[serde(default = "default_wallet_length")]
    pub wallet_length: usize,
}

/// Promotion thresholds for Apprentice -> Sentinel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PromotionThresholds {
    /// Minimum number of recorded PRs.
    #[serde(rename = "threshold", default = "default_promotion_pr_count")]
    pub promotion_pr_count: u64,
    #[serde(default = "default_min_avg_lines")]
    pub min_avg_lines: f64,
}

fn default_file_pattern() -> String {
    format!("{USERNAME_PLACEHOLDER}.toml")
}

fn default_schema_version() -> u32 {
    1
}

fn default_clone_timeout_secs() -> u64 {
    120
}

fn default_publish_timeout_secs() -> u64 {
    60
}

fn default_committer_name() -> String {
    "contributor-registry".to_string()
}

fn default_committer_email() -> String {
    "contributor-registry@users.noreply.github.com".to_string()
}

fn default_discord_min() -> usize {
    17
}

fn default_discord_max() -> usize {
    20
}

fn default_wallet_prefix() -> String {
    "0x".to_string()
}

fn default_wallet_length() -> usize {
    42
}

fn default_promotion_pr_count() -> u64 {
    5
}

fn default_min_avg_lines() -> f64 {
    30.0
}

impl Default for OnboardingRules {
    fn default() -> Self {
        Self {
            discord_id_min_length: default_discord_min(),
            discord_id_max_length: default_discord_max(),
            wallet_prefix: default_wallet_prefix(),
            wallet_length: default_wallet_length(),
        }
    }
}

impl Default for PromotionThresholds {
    fn default() -> Self {
        Self {
            promotion_pr_count: default_promotion_pr_count(),
            min_avg_lines: default_min_avg_lines(),
        }
    }
}

impl RegistrySettings {
    /// Settings for a remote with every other field defaulted.
    pub fn for_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            contributor_file_pattern: default_file_pattern(),
            schema_version: default_schema_version(),
            clone_timeout_secs: default_clone_timeout_secs(),
            publish_timeout_secs: default_publish_timeout_secs(),
            committer_name: default_committer_name(),
            committer_email: default_committer_email(),
            session_dir: None,
        }
    }

    pub fn clone_timeout(&self) -> Duration {
        Duration::from_secs(self.clone_timeout_secs)
    }

    pub fn publish_timeout(&self) -> Duration {
        Duration::from_secs(self.publish_timeout_secs)
    }

    /// Durable checkout path, falling back to a fixed name under the temp dir.
    pub fn session_dir(&self) -> PathBuf {
        self.session_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("contributor_registry_repo"))
    }
}

impl RegistryConfig {
    pub fn new(registry: RegistrySettings) -> Self {
        Self {
            registry,
            onboarding: OnboardingRules::default(),
            promotion: PromotionThresholds::default(),
        }
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: RegistryConfig = toml::from_str(content)
            .map_err(|e| RegistryError::Configuration(format!("invalid config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            RegistryError::Configuration(format!("reading {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Reject settings that would fail later in a less obvious way.
    pub fn validate(&self) -> Result<()> {
        let registry = &self.registry;
        if registry.url.trim().is_empty() {
            return Err(RegistryError::Configuration(
                "registry.url is required".to_string(),
            ));
        }
        if !registry
            .contributor_file_pattern
            .contains(USERNAME_PLACEHOLDER)
        {
            return Err(RegistryError::Configuration(format!(
                "registry.contributor_file_pattern must contain {USERNAME_PLACEHOLDER}"
            )));
        }
        if registry.clone_timeout_secs == 0 || registry.publish_timeout_secs == 0 {
            return Err(RegistryError::Configuration(
                "registry timeouts must be greater than zero".to_string(),
            ));
        }

        let onboarding = &self.onboarding;
        if onboarding.discord_id_min_length == 0
            || onboarding.discord_id_min_length > onboarding.discord_id_max_length
        {
            return Err(RegistryError::Configuration(format!(
                "invalid discord id length range [{}, {}]",
                onboarding.discord_id_min_length, onboarding.discord_id_max_length
            )));
        }
        if onboarding.wallet_length <= onboarding.wallet_prefix.len() {
            return Err(RegistryError::Configuration(format!(
                "onboarding.wallet_length ({}) must exceed the prefix length",
                onboarding.wallet_length
            )));
        }

        if !self.promotion.min_avg_lines.is_finite() {
            return Err(RegistryError::Configuration(
                "promotion.min_avg_lines must be a finite number".to_string(),
            ));
        }
        Ok(())
    }
}
