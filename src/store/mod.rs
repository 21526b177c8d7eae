//! Registry Store Abstraction
//!
//! All access to the remote record repository goes through a local working
//! copy: `acquire` a fresh checkout, query or mutate files inside it, then
//! `publish` the change back. There is no locking; `publish` fails with
//! `PublishConflict` when the remote moved after `acquire`, and the whole
//! cycle has to be re-run from a new checkout.
//!
//! Implementations:
//! - [`GitRegistryStore`]: clone/commit/push against a real git remote
//! - [`InMemoryRegistryStore`]: revisioned in-process fake for tests

use async_trait::async_trait;
use std::path::Path;

use crate::error::{RegistryError, Result};
use crate::record::{ContributorRecord, RecordLayout};

mod git;
mod memory;

pub use git::{CheckoutMode, GitRegistryStore, GitWorkingCopy};
pub use memory::{InMemoryRegistryStore, InMemoryWorkingCopy};

/// Source of fresh working copies.
#[async_trait]
pub trait RegistryStore: Send + Sync {
    /// Obtain a clean local checkout of the current remote state.
    async fn acquire(&self) -> Result<Box<dyn WorkingCopy>>;
}

/// A disposable local materialization of the registry.
#[async_trait]
pub trait WorkingCopy: Send {
    /// Layout used to derive record paths.
    fn layout(&self) -> &RecordLayout;

    /// Whether a file exists at `path` (relative to the checkout root).
    fn contains(&self, path: &str) -> Result<bool>;

    /// File contents, or `None` when absent.
    fn read_file(&self, path: &str) -> Result<Option<String>>;

    /// Overwrite `path` with `contents` and mark it for the next publish.
    fn write_file(&mut self, path: &str, contents: &str) -> Result<()>;

    /// Stage the written paths, commit with `message` and push.
    async fn publish(&mut self, message: &str) -> Result<()>;

    /// Checkout directory, for copies that live on disk.
    fn local_path(&self) -> Option<&Path> {
        None
    }

    /// Deterministic record path for `username`.
    fn record_path(&self, username: &str) -> Result<String> {
        self.layout().record_path(username)
    }

    fn exists(&self, username: &str) -> Result<bool> {
        let path = self.record_path(username)?;
        self.contains(&path)
    }

    /// Load the record for `username`.
    ///
    /// `NotFound` when absent, `Parse` when the document is malformed.
    fn read(&self, username: &str) -> Result<ContributorRecord> {
        let path = self.record_path(username)?;
        match self.read_file(&path)? {
            Some(text) => ContributorRecord::from_document(&path, &text),
            None => Err(RegistryError::NotFound { path }),
        }
    }

    /// Full rewrite of the record document for `username`.
    fn write(&mut self, username: &str, record: &ContributorRecord) -> Result<()> {
        let path = self.record_path(username)?;
        let text = record.to_document(&path)?;
        self.write_file(&path, &text)
    }
}
