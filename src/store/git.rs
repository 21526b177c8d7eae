//! Git-backed registry store
//!
//! Every `acquire` performs a fresh `git clone`; nothing from a previous
//! checkout is reused. `publish` stages only the paths written through the
//! working copy, commits, and pushes `HEAD` without force, so a remote that
//! advanced since the clone rejects the push. Both clone and push are bounded
//! by timeouts and the child process is killed when a timeout fires.

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Duration;
use tempfile::TempDir;
use tokio::process::Command;

use super::{RegistryStore, WorkingCopy};
use crate::config::RegistrySettings;
use crate::credential::{display_remote, Credential};
use crate::error::{RegistryError, Result};
use crate::record::RecordLayout;

const SCRATCH_PREFIX: &str = "contributor_registry_";

/// Markers git prints when a push is refused because the remote moved.
const CONFLICT_MARKERS: [&str; 4] = [
    "[rejected]",
    "non-fast-forward",
    "fetch first",
    "stale info",
];

/// Where checkouts are materialized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutMode {
    /// Self-cleaning temporary directory, removed when the working copy drops.
    Ephemeral,
    /// Fixed path, deleted and re-cloned at the start of every session.
    Durable(PathBuf),
}

// =============================================================================
// GIT COMMAND RUNNER
// =============================================================================

enum GitFailure {
    Spawn(std::io::Error),
    TimedOut(Duration),
    Exited { code: Option<i32>, output: String },
}

#[derive(Clone)]
struct GitRunner {
    credential: Credential,
    committer_name: String,
    committer_email: String,
}

impl GitRunner {
    async fn run(
        &self,
        dir: Option<&Path>,
        args: &[&str],
        limit: Duration,
    ) -> std::result::Result<Output, GitFailure> {
        let mut cmd = Command::new("git");
        if let Some(dir) = dir {
            cmd.arg("-C").arg(dir);
        }
        cmd.args(["-c", &format!("user.name={}", self.committer_name)])
            .args(["-c", &format!("user.email={}", self.committer_email)])
            .args(args)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match tokio::time::timeout(limit, cmd.output()).await {
            Err(_) => return Err(GitFailure::TimedOut(limit)),
            Ok(Err(e)) => return Err(GitFailure::Spawn(e)),
            Ok(Ok(output)) => output,
        };

        if output.status.success() {
            Ok(output)
        } else {
            let combined = format!(
                "{}\n{}",
                String::from_utf8_lossy(&output.stdout).trim(),
                String::from_utf8_lossy(&output.stderr).trim()
            );
            Err(GitFailure::Exited {
                code: output.status.code(),
                output: self.credential.redact(combined.trim()),
            })
        }
    }

    fn describe(&self, action: &str, failure: &GitFailure) -> String {
        match failure {
            GitFailure::Spawn(e) => format!(
                "failed to execute git {action}: {}",
                self.credential.redact(&e.to_string())
            ),
            GitFailure::TimedOut(limit) => {
                format!("git {action} timed out after {}s", limit.as_secs())
            }
            GitFailure::Exited { code, output } => match code {
                Some(code) => format!("git {action} exited with status {code}: {output}"),
                None => format!("git {action} terminated by signal: {output}"),
            },
        }
    }
}

fn stdout_line(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

// =============================================================================
// STORE
// =============================================================================

/// Registry store backed by a git remote.
pub struct GitRegistryStore {
    remote: String,
    mode: CheckoutMode,
    layout: RecordLayout,
    clone_timeout: Duration,
    publish_timeout: Duration,
    runner: GitRunner,
}

impl GitRegistryStore {
    pub fn new(settings: &RegistrySettings, credential: Credential, mode: CheckoutMode) -> Self {
        Self {
            remote: settings.url.clone(),
            mode,
            layout: RecordLayout::from_settings(settings),
            clone_timeout: settings.clone_timeout(),
            publish_timeout: settings.publish_timeout(),
            runner: GitRunner {
                credential,
                committer_name: settings.committer_name.clone(),
                committer_email: settings.committer_email.clone(),
            },
        }
    }

    pub fn mode(&self) -> &CheckoutMode {
        &self.mode
    }

    /// Prepare the target directory for a clone.
    fn checkout_target(&self) -> Result<(PathBuf, Option<TempDir>)> {
        match &self.mode {
            CheckoutMode::Ephemeral => {
                let scratch = tempfile::Builder::new()
                    .prefix(SCRATCH_PREFIX)
                    .tempdir()
                    .map_err(|e| {
                        RegistryError::Acquisition(format!("creating scratch dir: {e}"))
                    })?;
                Ok((scratch.path().to_path_buf(), Some(scratch)))
            }
            CheckoutMode::Durable(path) => {
                if path.exists() {
                    tracing::debug!("Removing previous session checkout {}", path.display());
                    std::fs::remove_dir_all(path).map_err(|e| {
                        RegistryError::Acquisition(format!(
                            "clearing session dir {}: {e}",
                            path.display()
                        ))
                    })?;
                }
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                Ok((path.clone(), None))
            }
        }
    }
}

#[async_trait]
impl RegistryStore for GitRegistryStore {
    async fn acquire(&self) -> Result<Box<dyn WorkingCopy>> {
        let (root, scratch) = self.checkout_target()?;
        let auth_url = self.runner.credential.authenticated_url(&self.remote)?;
        let root_arg = root.to_string_lossy().to_string();

        tracing::info!(
            "Cloning registry {} into {}",
            display_remote(&self.remote),
            root.display()
        );
        self.runner
            .run(
                None,
                &["clone", "--quiet", &auth_url, &root_arg],
                self.clone_timeout,
            )
            .await
            .map_err(|f| RegistryError::Acquisition(self.runner.describe("clone", &f)))?;

        // Keep the secret out of the checkout's config.
        self.runner
            .run(
                Some(&root),
                &["remote", "set-url", "origin", &self.remote],
                self.clone_timeout,
            )
            .await
            .map_err(|f| RegistryError::Acquisition(self.runner.describe("remote set-url", &f)))?;

        let branch = self
            .runner
            .run(Some(&root), &["symbolic-ref", "--short", "HEAD"], self.clone_timeout)
            .await
            .map(|out| stdout_line(&out))
            .map_err(|f| RegistryError::Acquisition(self.runner.describe("symbolic-ref", &f)))?;

        // An empty registry has no HEAD commit yet.
        let base_head = self
            .runner
            .run(Some(&root), &["rev-parse", "--verify", "--quiet", "HEAD"], self.clone_timeout)
            .await
            .ok()
            .map(|out| stdout_line(&out));

        tracing::debug!(
            "Checkout ready on branch {} at {}",
            branch,
            base_head.as_deref().unwrap_or("<empty>")
        );

        Ok(Box::new(GitWorkingCopy {
            root,
            _scratch: scratch,
            remote: self.remote.clone(),
            branch,
            base_head,
            layout: self.layout.clone(),
            publish_timeout: self.publish_timeout,
            runner: self.runner.clone(),
            pending: BTreeSet::new(),
        }))
    }
}

// =============================================================================
// WORKING COPY
// =============================================================================

/// A cloned checkout. Ephemeral checkouts are deleted on drop.
pub struct GitWorkingCopy {
    root: PathBuf,
    _scratch: Option<TempDir>,
    remote: String,
    branch: String,
    base_head: Option<String>,
    layout: RecordLayout,
    publish_timeout: Duration,
    runner: GitRunner,
    pending: BTreeSet<String>,
}

impl GitWorkingCopy {
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Commit the checkout was cloned at, `None` for an empty registry.
    pub fn base_head(&self) -> Option<&str> {
        self.base_head.as_deref()
    }

    fn full_path(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }

    fn publish_error(&self, action: &str, failure: &GitFailure) -> RegistryError {
        if let GitFailure::Exited { output, .. } = failure {
            if CONFLICT_MARKERS.iter().any(|m| output.contains(m)) {
                return RegistryError::PublishConflict(format!(
                    "remote branch {} moved since checkout at {}",
                    self.branch,
                    self.base_head.as_deref().unwrap_or("<empty>")
                ));
            }
        }
        if let GitFailure::TimedOut(_) = failure {
            return RegistryError::Publish(format!(
                "{}; remote state unknown",
                self.runner.describe(action, failure)
            ));
        }
        RegistryError::Publish(self.runner.describe(action, failure))
    }
}

#[async_trait]
impl WorkingCopy for GitWorkingCopy {
    fn layout(&self) -> &RecordLayout {
        &self.layout
    }

    fn local_path(&self) -> Option<&Path> {
        Some(&self.root)
    }

    fn contains(&self, path: &str) -> Result<bool> {
        Ok(self.full_path(path).is_file())
    }

    fn read_file(&self, path: &str) -> Result<Option<String>> {
        let full = self.full_path(path);
        if !full.is_file() {
            return Ok(None);
        }
        let bytes = std::fs::read(&full)?;
        String::from_utf8(bytes)
            .map(Some)
            .map_err(|e| RegistryError::Parse {
                path: path.to_string(),
                message: e.to_string(),
            })
    }

    fn write_file(&mut self, path: &str, contents: &str) -> Result<()> {
        let full = self.full_path(path);
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&full, contents)?;
        self.pending.insert(path.to_string());
        Ok(())
    }

    async fn publish(&mut self, message: &str) -> Result<()> {
        if self.pending.is_empty() {
            return Err(RegistryError::Publish("no changes to publish".to_string()));
        }
        let root = self.root.clone();

        let mut add_args = vec!["add", "--"];
        add_args.extend(self.pending.iter().map(String::as_str));
        self.runner
            .run(Some(&root), &add_args, self.publish_timeout)
            .await
            .map_err(|f| self.publish_error("add", &f))?;

        self.runner
            .run(
                Some(&root),
                &["commit", "--quiet", "-m", message],
                self.publish_timeout,
            )
            .await
            .map_err(|f| self.publish_error("commit", &f))?;

        let auth_url = self.runner.credential.authenticated_url(&self.remote)?;
        let refspec = format!("HEAD:refs/heads/{}", self.branch);
        tracing::info!(
            "Publishing to {} ({})",
            display_remote(&self.remote),
            self.branch
        );
        let pushed = self
            .runner
            .run(
                Some(&root),
                &["push", "--porcelain", &auth_url, &refspec],
                self.publish_timeout,
            )
            .await;

        match pushed {
            Ok(_) => {
                self.pending.clear();
                self.base_head = self
                    .runner
                    .run(Some(&root), &["rev-parse", "HEAD"], self.publish_timeout)
                    .await
                    .ok()
                    .map(|out| stdout_line(&out));
                Ok(())
            }
            Err(failure) => {
                let err = self.publish_error("push", &failure);
                tracing::warn!("Publish failed: {}", err);
                Err(err)
            }
        }
    }
}
