//! GitHub Issue Comments Client
//!
//! HTTP implementation of [`CommentSource`] over the REST issue-comments
//! endpoint. PR conversation comments are issue comments on GitHub, so the
//! PR number is used as the issue number.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{ACCEPT, USER_AGENT};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use crate::credential::Credential;
use crate::error::{RegistryError, Result};
use crate::scanner::{CommentSource, PrComment};

pub const GITHUB_API_BASE: &str = "https://api.github.com";
const PAGE_SIZE: usize = 100;
const MAX_PAGES: u32 = 50;
const CLIENT_AGENT: &str = concat!("contributor-registry/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Deserialize)]
struct ApiUser {
    login: String,
}

#[derive(Debug, Deserialize)]
struct ApiComment {
    id: u64,
    user: Option<ApiUser>,
    body: Option<String>,
    created_at: DateTime<Utc>,
}

impl ApiComment {
    /// Comments from deleted accounts have no user and can never match an author.
    fn into_comment(self) -> Option<PrComment> {
        let author = self.user?.login;
        Some(PrComment {
            id: self.id,
            author,
            body: self.body.unwrap_or_default(),
            created_at: self.created_at,
        })
    }
}

pub struct GitHubCommentSource {
    client: Client,
    api_base: String,
    credential: Credential,
}

impl GitHubCommentSource {
    pub fn new(credential: Credential) -> Result<Self> {
        Self::with_base_url(GITHUB_API_BASE, credential)
    }

    /// Point the client at a different API root (GitHub Enterprise).
    pub fn with_base_url(api_base: &str, credential: Credential) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| RegistryError::Configuration(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            credential,
        })
    }

    fn comments_url(&self, repository: &str, pr_number: u64) -> String {
        format!(
            "{}/repos/{}/issues/{}/comments",
            self.api_base, repository, pr_number
        )
    }

    fn api_error(&self, context: &str, err: impl std::fmt::Display) -> RegistryError {
        RegistryError::Api(self.credential.redact(&format!("{context}: {err}")))
    }

    async fn fetch_page(&self, url: &str, page: u32) -> Result<Vec<ApiComment>> {
        let per_page = PAGE_SIZE.to_string();
        let page_param = page.to_string();
        let response = self
            .client
            .get(url)
            .query(&[("per_page", per_page.as_str()), ("page", page_param.as_str())])
            .bearer_auth(self.credential.expose())
            .header(ACCEPT, "application/vnd.github+json")
            .header(USER_AGENT, CLIENT_AGENT)
            .send()
            .await
            .map_err(|e| self.api_error("Failed to fetch PR comments", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(self.api_error(
                &format!("Comment listing returned {status}"),
                body.trim(),
            ));
        }

        response
            .json()
            .await
            .map_err(|e| self.api_error("Failed to parse PR comments response", e))
    }
}

/// Page to fetch after `page` returned `fetched` items.
///
/// `Err` carries the comment limit when the last allowed page is still full,
/// since the newest comments would be beyond it.
fn next_page(page: u32, fetched: usize) -> std::result::Result<Option<u32>, usize> {
    if fetched < PAGE_SIZE {
        Ok(None)
    } else if page >= MAX_PAGES {
        Err(MAX_PAGES as usize * PAGE_SIZE)
    } else {
        Ok(Some(page + 1))
    }
}

/// `owner/name`, both parts non-empty and free of further slashes.
fn validate_repository(repository: &str) -> Result<()> {
    match repository.split_once('/') {
        Some((owner, name)) if !owner.is_empty() && !name.is_empty() && !name.contains('/') => {
            Ok(())
        }
        _ => Err(RegistryError::Configuration(format!(
            "repository must be in owner/name form, got '{repository}'"
        ))),
    }
}

#[async_trait]
impl CommentSource for GitHubCommentSource {
    async fn list_comments(&self, repository: &str, pr_number: u64) -> Result<Vec<PrComment>> {
        validate_repository(repository)?;
        let url = self.comments_url(repository, pr_number);

        let mut comments = Vec::new();
        let mut page = 1;
        loop {
            let batch = self.fetch_page(&url, page).await?;
            let fetched = batch.len();
            comments.extend(batch.into_iter().filter_map(ApiComment::into_comment));
            match next_page(page, fetched) {
                Ok(Some(next)) => page = next,
                Ok(None) => break,
                Err(limit) => {
                    return Err(RegistryError::Api(format!(
                        "{repository}#{pr_number} has more than {limit} comments; \
                         refusing to scan a thread whose newest comments were not fetched"
                    )))
                }
            }
        }

        tracing::debug!(
            "Fetched {} comments for {}#{}",
            comments.len(),
            repository,
            pr_number
        );
        Ok(comments)
    }
}
