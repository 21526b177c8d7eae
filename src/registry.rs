//! Contributor registry actions
//!
//! Each action runs one acquire / inspect / mutate / publish cycle against a
//! fresh working copy. Nothing is cached between actions, and a cycle that
//! loses a publish race is not retried here.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::RegistryConfig;
use crate::eligibility::{check_promotion, PromotionCheck};
use crate::error::{RegistryError, Result};
use crate::identity::{unquote, IdentityCheck};
use crate::record::{ContributorRecord, PullRequestEntry};
use crate::store::{RegistryStore, WorkingCopy};

/// Existence is file presence at the derived path. The parsed record rides
/// along when the document is readable; otherwise `parse_error` says why.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExistsOutcome {
    pub username: String,
    pub exists: bool,
    pub record_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record: Option<ContributorRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parse_error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateOutcome {
    pub username: String,
    pub created: bool,
    pub identity: IdentityCheck,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddPrOutcome {
    pub username: String,
    pub updated: bool,
    pub pr_number: u64,
    pub repository: String,
    pub total_prs: u64,
    pub record_path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PromotionOutcome {
    pub username: String,
    #[serde(flatten)]
    pub check: PromotionCheck,
}

pub struct ContributorRegistry {
    config: RegistryConfig,
    store: Arc<dyn RegistryStore>,
}

impl ContributorRegistry {
    pub fn new(config: RegistryConfig, store: Arc<dyn RegistryStore>) -> Self {
        Self { config, store }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub async fn check_exists(&self, username: &str) -> Result<ExistsOutcome> {
        let wc = self.store.acquire().await?;
        let path = wc.record_path(username)?;
        tracing::debug!("Record path for {}: {}", username, path);

        let exists = wc.exists(username)?;
        let (record, parse_error) = if exists {
            match owned_record(&*wc, username) {
                Ok(record) => (record, None),
                Err(RegistryError::Parse { message, .. }) => {
                    tracing::warn!("Record {} is present but unreadable: {}", path, message);
                    (None, Some(message))
                }
                Err(e) => return Err(e),
            }
        } else {
            (None, None)
        };

        tracing::info!("Contributor {} exists: {}", username, exists);
        Ok(ExistsOutcome {
            username: username.to_string(),
            exists,
            record_path: path,
            record,
            parse_error,
        })
    }

    /// Onboard a new contributor with their first PR.
    ///
    /// Invalid identities are reported with `created: false` and never reach
    /// the store.
    pub async fn create(
        &self,
        username: &str,
        discord_id: &str,
        wallet_address: &str,
        first_pr: PullRequestEntry,
    ) -> Result<CreateOutcome> {
        let identity = IdentityCheck::run(discord_id, wallet_address, &self.config.onboarding);
        if !identity.is_valid() {
            tracing::warn!(
                "Refusing to create {}: discord_valid={} wallet_valid={}",
                username,
                identity.discord_valid,
                identity.wallet_valid
            );
            return Ok(CreateOutcome {
                username: username.to_string(),
                created: false,
                identity,
                record_path: None,
            });
        }

        let mut wc = self.store.acquire().await?;
        let path = wc.record_path(username)?;
        if owned_record(&*wc, username)?.is_some() {
            return Err(RegistryError::AlreadyExists { path });
        }

        let record = ContributorRecord::create(
            self.config.registry.schema_version,
            username,
            unquote(discord_id),
            unquote(wallet_address),
            first_pr,
        );
        wc.write(username, &record)?;
        wc.publish(&format!("Add contributor: {username}")).await?;

        tracing::info!("Created contributor record {}", path);
        Ok(CreateOutcome {
            username: username.to_string(),
            created: true,
            identity,
            record_path: Some(path),
        })
    }

    /// Append one PR to an existing record.
    ///
    /// A PR already on record leaves the registry untouched and reports
    /// `updated: false`.
    pub async fn add_pr(&self, username: &str, entry: PullRequestEntry) -> Result<AddPrOutcome> {
        let mut wc = self.store.acquire().await?;
        let path = wc.record_path(username)?;
        let mut record = owned_record(&*wc, username)?
            .ok_or_else(|| RegistryError::NotFound { path: path.clone() })?;

        let pr_number = entry.pr_number;
        let repository = entry.repository.clone();
        if !record.append_pull_request(entry) {
            tracing::info!(
                "PR {}#{} already recorded for {}, nothing to publish",
                repository,
                pr_number,
                username
            );
            return Ok(AddPrOutcome {
                username: username.to_string(),
                updated: false,
                pr_number,
                repository,
                total_prs: record.stats.total_prs,
                record_path: path,
            });
        }

        wc.write(username, &record)?;
        wc.publish(&format!("Update contributor: {username} (PR #{pr_number})"))
            .await?;

        tracing::info!(
            "Recorded PR {}#{} for {} ({} total)",
            repository,
            pr_number,
            username,
            record.stats.total_prs
        );
        Ok(AddPrOutcome {
            username: username.to_string(),
            updated: true,
            pr_number,
            repository,
            total_prs: record.stats.total_prs,
            record_path: path,
        })
    }

    pub async fn check_promotion(&self, username: &str) -> Result<PromotionOutcome> {
        let wc = self.store.acquire().await?;
        let record = owned_record(&*wc, username)?;
        let check = check_promotion(record.as_ref(), &self.config.promotion);
        tracing::info!(
            "Promotion check for {}: eligible={}",
            username,
            check.is_eligible()
        );
        Ok(PromotionOutcome {
            username: username.to_string(),
            check,
        })
    }
}

/// Load the record at `username`'s path, if any, and make sure it is theirs.
///
/// A record stored under a different username that sanitizes to the same key
/// is a collision, never a match.
fn owned_record(wc: &dyn WorkingCopy, username: &str) -> Result<Option<ContributorRecord>> {
    let path = wc.record_path(username)?;
    let record = match wc.read(username) {
        Ok(record) => record,
        Err(RegistryError::NotFound { .. }) => return Ok(None),
        Err(e) => return Err(e),
    };
    if !record.belongs_to(username) {
        return Err(RegistryError::UsernameCollision {
            requested: username.to_string(),
            existing: record.identity.github_username,
            path,
        });
    }
    Ok(Some(record))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RegistrySettings;
    use crate::record::RecordLayout;
    use crate::store::InMemoryRegistryStore;

    const DISCORD: &str = "123456789012345678";
    const WALLET: &str = "0x1234567890abcdef1234567890abcdef12345678";

    fn registry() -> (ContributorRegistry, InMemoryRegistryStore) {
        let store = InMemoryRegistryStore::new(RecordLayout::default());
        let config = RegistryConfig::new(RegistrySettings::for_url("memory://registry"));
        (
            ContributorRegistry::new(config, Arc::new(store.clone())),
            store,
        )
    }

    #[tokio::test]
    async fn test_create_then_exists() {
        let (registry, store) = registry();
        let created = registry
            .create("Alice", DISCORD, WALLET, PullRequestEntry::new(1, "org/repo"))
            .await
            .unwrap();
        assert!(created.created);
        assert_eq!(created.record_path.as_deref(), Some("alice.toml"));
        assert_eq!(store.commits(), vec!["Add contributor: Alice".to_string()]);

        let exists = registry.check_exists("alice").await.unwrap();
        assert!(exists.exists);
        assert_eq!(exists.parse_error, None);
        let record = exists.record.expect("record loaded with existence check");
        assert_eq!(record.identity.github_username, "Alice");
        assert_eq!(record.stats.total_prs, 1);
    }

    #[tokio::test]
    async fn test_absent_record_has_no_payload() {
        let (registry, _store) = registry();
        let outcome = registry.check_exists("ghost").await.unwrap();
        assert!(!outcome.exists);
        assert!(outcome.record.is_none());
        assert!(outcome.parse_error.is_none());
    }

    #[tokio::test]
    async fn test_create_strips_quotes_before_storing() {
        let (registry, store) = registry();
        registry
            .create(
                "alice",
                &format!("\"{DISCORD}\""),
                &format!(" '{WALLET}' "),
                PullRequestEntry::new(1, "org/repo"),
            )
            .await
            .unwrap();
        let stored =
            ContributorRecord::from_document("alice.toml", &store.file("alice.toml").unwrap())
                .unwrap();
        assert_eq!(stored.identity.discord_id, DISCORD);
        assert_eq!(stored.identity.wallet_address, WALLET);
    }

    #[tokio::test]
    async fn test_invalid_identity_never_acquires() {
        let (registry, store) = registry();
        store.set_unavailable(Some("should not be reached"));
        let outcome = registry
            .create("alice", "12345", WALLET, PullRequestEntry::new(1, "org/repo"))
            .await
            .unwrap();
        assert!(!outcome.created);
        assert!(!outcome.identity.discord_valid);
        assert!(outcome.identity.wallet_valid);
        assert_eq!(store.revision(), 0);
    }

    #[tokio::test]
    async fn test_add_pr_missing_record_is_not_found() {
        let (registry, _store) = registry();
        let err = registry
            .add_pr("ghost", PullRequestEntry::new(1, "org/repo"))
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_promotion_for_unknown_user_is_not_onboarded() {
        let (registry, _store) = registry();
        let outcome = registry.check_promotion("ghost").await.unwrap();
        assert_eq!(outcome.check, PromotionCheck::NotOnboarded);
    }
}
