//! PR onboarding response scanner
//!
//! Walks a PR's comment thread newest-first and returns the first comment by
//! the PR author that carries an identity claim. Comments by anyone else are
//! skipped even when they contain a well-formed claim, and a later correction
//! by the author always wins over an earlier attempt.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::claim::ClaimParser;
use crate::config::OnboardingRules;
use crate::error::Result;
use crate::identity::IdentityCheck;

/// One comment on a PR conversation thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrComment {
    pub id: u64,
    pub author: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// Read access to PR comments on the code-hosting platform.
#[async_trait]
pub trait CommentSource: Send + Sync {
    /// All comments on the PR thread, in any order.
    async fn list_comments(&self, repository: &str, pr_number: u64) -> Result<Vec<PrComment>>;
}

/// Validated onboarding response found in a comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnboardingResponse {
    pub comment_id: u64,
    #[serde(flatten)]
    pub identity: IdentityCheck,
    pub valid: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ResponseScan {
    NoResponse,
    Found(OnboardingResponse),
}

impl ResponseScan {
    pub fn has_response(&self) -> bool {
        matches!(self, ResponseScan::Found(_))
    }
}

pub struct ResponseScanner {
    source: Arc<dyn CommentSource>,
    parser: ClaimParser,
    rules: OnboardingRules,
}

impl ResponseScanner {
    pub fn new(source: Arc<dyn CommentSource>, rules: &OnboardingRules) -> Result<Self> {
        Ok(Self {
            source,
            parser: ClaimParser::new(rules)?,
            rules: rules.clone(),
        })
    }

    pub async fn scan(
        &self,
        repository: &str,
        pr_number: u64,
        pr_author: &str,
    ) -> Result<ResponseScan> {
        let comments = self.source.list_comments(repository, pr_number).await?;
        tracing::debug!(
            "Scanning {} comments on {}#{} for a response from {}",
            comments.len(),
            repository,
            pr_number,
            pr_author
        );
        Ok(self.latest_response(comments, pr_author))
    }

    /// Pure selection step over an already-fetched thread.
    pub fn latest_response(&self, mut comments: Vec<PrComment>, pr_author: &str) -> ResponseScan {
        comments.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

        let found = comments
            .iter()
            .rev()
            .filter(|c| c.author.eq_ignore_ascii_case(pr_author))
            .find_map(|c| self.parser.parse(&c.body).map(|claim| (c.id, claim)));

        match found {
            Some((comment_id, claim)) => {
                let identity = IdentityCheck::run(&claim.discord_id, &claim.wallet, &self.rules);
                ResponseScan::Found(OnboardingResponse {
                    comment_id,
                    valid: identity.is_valid(),
                    identity,
                })
            }
            None => ResponseScan::NoResponse,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const WALLET: &str = "0x1234567890abcdef1234567890abcdef12345678";

    struct FixedComments(Vec<PrComment>);

    #[async_trait]
    impl CommentSource for FixedComments {
        async fn list_comments(&self, _repo: &str, _pr: u64) -> Result<Vec<PrComment>> {
            Ok(self.0.clone())
        }
    }

    fn comment(id: u64, minute: u32, author: &str, body: &str) -> PrComment {
        PrComment {
            id,
            author: author.to_string(),
            body: body.to_string(),
            created_at: Utc.with_ymd_and_hms(2026, 3, 1, 12, minute, 0).unwrap(),
        }
    }

    fn scanner(comments: Vec<PrComment>) -> ResponseScanner {
        ResponseScanner::new(
            Arc::new(FixedComments(comments)),
            &OnboardingRules::default(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_latest_author_claim_wins() {
        let comments = vec![
            comment(1, 0, "alice", "discord: 12345\nwallet: 0xnope"),
            comment(2, 5, "alice", &format!("discord: \"123\"\nwallet: \"{WALLET}\"")),
            comment(
                3,
                10,
                "alice",
                &format!("discord: \"123456789012345678\"\nwallet: \"{WALLET}\""),
            ),
        ];
        let result = scanner(comments).scan("org/repo", 7, "alice").await.unwrap();
        match result {
            ResponseScan::Found(resp) => {
                assert_eq!(resp.comment_id, 3);
                assert!(resp.valid);
                assert_eq!(resp.identity.discord_id, "123456789012345678");
            }
            ResponseScan::NoResponse => panic!("expected a response"),
        }
    }

    #[tokio::test]
    async fn test_other_users_ignored() {
        let comments = vec![
            comment(1, 0, "alice", "Thanks!"),
            comment(
                2,
                5,
                "mallory",
                &format!("discord: 123456789012345678\nwallet: {WALLET}"),
            ),
        ];
        let result = scanner(comments).scan("org/repo", 7, "alice").await.unwrap();
        assert_eq!(result, ResponseScan::NoResponse);
    }

    #[tokio::test]
    async fn test_author_match_case_insensitive() {
        let comments = vec![comment(
            9,
            0,
            "Alice",
            &format!("discord: 123456789012345678\nwallet: {WALLET}"),
        )];
        let result = scanner(comments).scan("org/repo", 7, "alice").await.unwrap();
        assert!(result.has_response());
    }

    #[tokio::test]
    async fn test_later_prose_does_not_hide_earlier_claim() {
        let comments = vec![
            comment(
                1,
                0,
                "alice",
                &format!("discord: 123456789012345678\nwallet: {WALLET}"),
            ),
            comment(2, 5, "alice", "Done, let me know if anything else is needed"),
        ];
        let result = scanner(comments).scan("org/repo", 7, "alice").await.unwrap();
        assert!(matches!(result, ResponseScan::Found(ref r) if r.comment_id == 1));
    }

    #[test]
    fn test_order_taken_from_timestamps_not_input_order() {
        let comments = vec![
            comment(
                5,
                30,
                "alice",
                &format!("discord: 123456789012345678\nwallet: {WALLET}"),
            ),
            comment(
                4,
                10,
                "alice",
                &format!("discord: 98765432109876543\nwallet: {WALLET}"),
            ),
        ];
        let result = scanner(vec![]).latest_response(comments, "alice");
        assert!(matches!(result, ResponseScan::Found(ref r) if r.comment_id == 5));
    }

    #[test]
    fn test_claim_failing_validator_reported_with_flags() {
        let rules = OnboardingRules {
            discord_id_max_length: 18,
            ..OnboardingRules::default()
        };
        let scanner = ResponseScanner::new(Arc::new(FixedComments(vec![])), &rules).unwrap();
        let comments = vec![comment(
            1,
            0,
            "alice",
            &format!("discord: 12345678901234567890\nwallet: {WALLET}"),
        )];
        match scanner.latest_response(comments, "alice") {
            ResponseScan::Found(resp) => {
                assert_eq!(resp.identity.discord_id, "12345678901234567890");
                assert!(!resp.identity.discord_valid);
                assert!(resp.identity.wallet_valid);
                assert!(!resp.valid);
            }
            ResponseScan::NoResponse => panic!("expected a response"),
        }
    }
}
