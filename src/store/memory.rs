//! In-memory registry store
//!
//! Models the remote as a revisioned file map. `publish` is a compare-and-swap
//! on the revision observed at `acquire`, which gives the same
//! at-most-one-writer-wins behaviour as a non-forced git push.

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{RegistryStore, WorkingCopy};
use crate::error::{RegistryError, Result};
use crate::record::RecordLayout;

#[derive(Debug, Default)]
struct RemoteState {
    revision: u64,
    files: BTreeMap<String, String>,
    commits: Vec<String>,
    unavailable: Option<String>,
}

/// Shared in-process "remote". Clones share the same state.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRegistryStore {
    remote: Arc<Mutex<RemoteState>>,
    layout: RecordLayout,
}

impl InMemoryRegistryStore {
    pub fn new(layout: RecordLayout) -> Self {
        Self {
            remote: Arc::default(),
            layout,
        }
    }

    fn state(&self) -> MutexGuard<'_, RemoteState> {
        self.remote.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Seed a file directly on the remote, advancing its revision.
    pub fn put_file(&self, path: &str, contents: &str) {
        let mut state = self.state();
        state.files.insert(path.to_string(), contents.to_string());
        state.revision += 1;
    }

    /// Current remote contents of `path`.
    pub fn file(&self, path: &str) -> Option<String> {
        self.state().files.get(path).cloned()
    }

    pub fn revision(&self) -> u64 {
        self.state().revision
    }

    /// Commit messages in publish order.
    pub fn commits(&self) -> Vec<String> {
        self.state().commits.clone()
    }

    /// Make subsequent `acquire` calls fail with `message`.
    pub fn set_unavailable(&self, message: Option<&str>) {
        self.state().unavailable = message.map(str::to_string);
    }
}

#[async_trait]
impl RegistryStore for InMemoryRegistryStore {
    async fn acquire(&self) -> Result<Box<dyn WorkingCopy>> {
        let state = self.state();
        if let Some(message) = &state.unavailable {
            return Err(RegistryError::Acquisition(message.clone()));
        }
        tracing::debug!("In-memory checkout at revision {}", state.revision);
        Ok(Box::new(InMemoryWorkingCopy {
            remote: Arc::clone(&self.remote),
            layout: self.layout.clone(),
            base_revision: state.revision,
            files: state.files.clone(),
            pending: BTreeSet::new(),
        }))
    }
}

/// Snapshot of the in-memory remote taken at `acquire`.
pub struct InMemoryWorkingCopy {
    remote: Arc<Mutex<RemoteState>>,
    layout: RecordLayout,
    base_revision: u64,
    files: BTreeMap<String, String>,
    pending: BTreeSet<String>,
}

impl InMemoryWorkingCopy {
    pub fn base_revision(&self) -> u64 {
        self.base_revision
    }
}

#[async_trait]
impl WorkingCopy for InMemoryWorkingCopy {
    fn layout(&self) -> &RecordLayout {
        &self.layout
    }

    fn contains(&self, path: &str) -> Result<bool> {
        Ok(self.files.contains_key(path))
    }

    fn read_file(&self, path: &str) -> Result<Option<String>> {
        Ok(self.files.get(path).cloned())
    }

    fn write_file(&mut self, path: &str, contents: &str) -> Result<()> {
        self.files.insert(path.to_string(), contents.to_string());
        self.pending.insert(path.to_string());
        Ok(())
    }

    async fn publish(&mut self, message: &str) -> Result<()> {
        if self.pending.is_empty() {
            return Err(RegistryError::Publish("no changes to publish".to_string()));
        }
        let mut state = self.remote.lock().unwrap_or_else(PoisonError::into_inner);
        if state.revision != self.base_revision {
            return Err(RegistryError::PublishConflict(format!(
                "remote at revision {}, checkout taken at {}",
                state.revision, self.base_revision
            )));
        }
        for path in &self.pending {
            if let Some(contents) = self.files.get(path) {
                state.files.insert(path.clone(), contents.clone());
            }
        }
        state.revision += 1;
        state.commits.push(message.to_string());
        self.base_revision = state.revision;
        self.pending.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{ContributorRecord, PullRequestEntry};

    fn record(username: &str) -> ContributorRecord {
        ContributorRecord::create(
            1,
            username,
            "123456789012345678",
            "0x1234567890abcdef1234567890abcdef12345678",
            PullRequestEntry::new(1, "org/repo"),
        )
    }

    #[tokio::test]
    async fn test_write_publish_read_round_trip() {
        let store = InMemoryRegistryStore::default();

        let mut wc = store.acquire().await.unwrap();
        assert!(!wc.exists("alice").unwrap());
        wc.write("alice", &record("alice")).unwrap();
        wc.publish("Add contributor: alice").await.unwrap();

        let fresh = store.acquire().await.unwrap();
        assert!(fresh.exists("Alice").unwrap());
        assert_eq!(fresh.read("alice").unwrap(), record("alice"));
        assert_eq!(store.commits(), vec!["Add contributor: alice".to_string()]);
    }

    #[tokio::test]
    async fn test_unpublished_writes_invisible_to_other_checkouts() {
        let store = InMemoryRegistryStore::default();
        let mut wc = store.acquire().await.unwrap();
        wc.write("alice", &record("alice")).unwrap();

        let other = store.acquire().await.unwrap();
        assert!(!other.exists("alice").unwrap());
    }

    #[tokio::test]
    async fn test_read_missing_is_not_found() {
        let store = InMemoryRegistryStore::default();
        let wc = store.acquire().await.unwrap();
        assert!(matches!(
            wc.read("nobody"),
            Err(RegistryError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_read_malformed_is_parse_error() {
        let store = InMemoryRegistryStore::default();
        store.put_file("broken.toml", "schema_version = [");
        let wc = store.acquire().await.unwrap();
        assert!(matches!(
            wc.read("broken"),
            Err(RegistryError::Parse { .. })
        ));
    }

    #[tokio::test]
    async fn test_concurrent_publish_one_wins() {
        let store = InMemoryRegistryStore::default();
        let mut first = store.acquire().await.unwrap();
        let mut second = store.acquire().await.unwrap();

        first.write("alice", &record("alice")).unwrap();
        second.write("bob", &record("bob")).unwrap();

        first.publish("Add contributor: alice").await.unwrap();
        let err = second.publish("Add contributor: bob").await.unwrap_err();
        assert!(matches!(err, RegistryError::PublishConflict(_)));

        assert!(store.file("alice.toml").is_some());
        assert!(store.file("bob.toml").is_none());
        assert_eq!(store.revision(), 1);
    }

    #[tokio::test]
    async fn test_publish_without_changes_fails() {
        let store = InMemoryRegistryStore::default();
        let mut wc = store.acquire().await.unwrap();
        assert!(matches!(
            wc.publish("noop").await,
            Err(RegistryError::Publish(_))
        ));
    }

    #[tokio::test]
    async fn test_unavailable_remote_fails_acquire() {
        let store = InMemoryRegistryStore::default();
        store.set_unavailable(Some("authentication failed"));
        let err = store.acquire().await.err().unwrap();
        assert!(matches!(err, RegistryError::Acquisition(_)));
    }
}
