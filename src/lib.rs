//! Contributor Registry
//!
//! Tracks onboarded contributors as one TOML record per user in a shared git
//! repository, and answers the questions an onboarding workflow asks on every
//! pull request: is this contributor known, did they post their identity
//! claim, and have they earned a promotion.
//!
//! ## Flow
//! Every mutating action is one cycle against a fresh checkout:
//! acquire -> read record -> mutate -> write -> publish.
//! A publish that loses a race fails with `PublishConflict`; the caller re-runs
//! the whole cycle.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use contributor_registry::{
//!     ContributorRegistry, InMemoryRegistryStore, PullRequestEntry, RecordLayout,
//!     RegistryConfig, RegistrySettings,
//! };
//!
//! # async fn demo() -> contributor_registry::Result<()> {
//! let config = RegistryConfig::new(RegistrySettings::for_url("memory://registry"));
//! let store = InMemoryRegistryStore::new(RecordLayout::default());
//! let registry = ContributorRegistry::new(config, Arc::new(store));
//!
//! registry
//!     .create(
//!         "alice",
//!         "123456789012345678",
//!         "0x1234567890abcdef1234567890abcdef12345678",
//!         PullRequestEntry::new(1, "org/repo").with_lines_changed(40),
//!     )
//!     .await?;
//! assert!(registry.check_exists("alice").await?.exists);
//! # Ok(())
//! # }
//! ```

// Core error handling
pub mod error;

// Settings and secrets
pub mod config;
pub mod credential;

// Pure domain logic
pub mod claim;
pub mod eligibility;
pub mod identity;
pub mod record;

// Registry storage
pub mod store;

// PR comment scanning
pub mod github;
pub mod scanner;

// Actions and their results
pub mod registry;
pub mod report;

pub use claim::{parse_identity_claim, ClaimParser, IdentityClaim};
pub use config::{OnboardingRules, PromotionThresholds, RegistryConfig, RegistrySettings};
pub use credential::Credential;
pub use eligibility::{check_promotion, evaluate, PromotionCheck, Shortfall, Verdict};
pub use error::{RegistryError, Result};
pub use github::GitHubCommentSource;
pub use identity::{is_valid_chat_id, is_valid_wallet_address, sanitize_username, IdentityCheck};
pub use record::{ContributorRecord, PullRequestEntry, RecordLayout, Role};
pub use registry::{AddPrOutcome, ContributorRegistry, CreateOutcome, ExistsOutcome, PromotionOutcome};
pub use report::{Action, ActionReport};
pub use scanner::{CommentSource, OnboardingResponse, PrComment, ResponseScan, ResponseScanner};
pub use store::{
    CheckoutMode, GitRegistryStore, GitWorkingCopy, InMemoryRegistryStore, InMemoryWorkingCopy,
    RegistryStore, WorkingCopy,
};
