//! C6 — Git-like store (spec §4.6).
//!
//! An opaque local commit log, persisted as content-addressed blobs under
//! `.ralph/vcs/`. There is no real `git` binary inside a browser sandbox,
//! so this mirrors the teacher's own preference for hand-rolled
//! JSON-file persistence with an atomic temp-then-rename write
//! (`OrchestrationState::save`, `src/orchestrator/orchestration_state.rs`)
//! over shelling out to an external process.

use crate::error::VfsError;
use crate::vfs::Vfs;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Commit {
    oid: String,
    message: String,
    author: String,
    parent: Option<String>,
    /// Snapshot of every tracked file's content at this commit, keyed by
    /// path. Simpler than a tree/blob object graph and sufficient for a
    /// single-branch, single-writer local store.
    files: BTreeMap<String, String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Journal {
    head: Option<String>,
    commits: Vec<Commit>,
    tags: BTreeMap<String, String>,
}

const JOURNAL_PATH: &str = ".ralph/vcs/journal.json";

/// Per-project commit-on-every-iteration store (spec §4.6).
pub struct VcsStore {
    vfs: Arc<dyn Vfs>,
    staged_paths: std::sync::Mutex<Vec<String>>,
}

impl VcsStore {
    pub fn new(vfs: Arc<dyn Vfs>) -> Self {
        Self {
            vfs,
            staged_paths: std::sync::Mutex::new(Vec::new()),
        }
    }

    async fn load_journal(&self) -> Journal {
        match self.vfs.read_to_string(JOURNAL_PATH).await {
            Ok(text) => serde_json::from_str(&text).unwrap_or_default(),
            Err(_) => Journal::default(),
        }
    }

    async fn save_journal(&self, journal: &Journal) -> Result<(), VfsError> {
        let text = serde_json::to_string_pretty(journal).expect("journal serializes");
        self.vfs.write_string(JOURNAL_PATH, &text).await
    }

    /// Stage every path under `src/` for inclusion in the next commit's
    /// snapshot. The spec's `addAll()` has no selective-staging
    /// counterpart, so this always stages the whole tree.
    pub async fn add_all(&self, tracked_paths: &[String]) {
        let mut staged = self.staged_paths.lock().unwrap();
        *staged = tracked_paths.to_vec();
    }

    pub async fn commit(&self, message: &str, author: &str) -> Result<String, VfsError> {
        let mut journal = self.load_journal().await;
        let staged = self.staged_paths.lock().unwrap().clone();
        let mut files = BTreeMap::new();
        for path in &staged {
            if let Ok(content) = self.vfs.read_to_string(path).await {
                files.insert(path.clone(), content);
            }
        }
        let oid = next_oid(&journal);
        let commit = Commit {
            oid: oid.clone(),
            message: message.to_string(),
            author: author.to_string(),
            parent: journal.head.clone(),
            files,
        };
        journal.head = Some(oid.clone());
        journal.commits.push(commit);
        self.save_journal(&journal).await?;
        Ok(oid)
    }

    pub async fn resolve_ref(&self, name: &str) -> Option<String> {
        let journal = self.load_journal().await;
        if name == "HEAD" {
            return journal.head;
        }
        journal.tags.get(name).cloned()
    }

    pub async fn tag(&self, name: &str, oid: &str) -> Result<(), VfsError> {
        let mut journal = self.load_journal().await;
        journal.tags.insert(name.to_string(), oid.to_string());
        self.save_journal(&journal).await
    }

    /// Tag `task-N-pre` at current HEAD, per spec §4.6.
    pub async fn tag_task_pre(&self, task_n: u32) -> Result<(), VfsError> {
        let journal = self.load_journal().await;
        let Some(head) = journal.head.clone() else {
            return Ok(());
        };
        self.tag(&format!("task-{task_n}-pre"), &head).await
    }

    pub async fn read_file_at_commit(&self, rel_path: &str, oid: &str) -> Option<String> {
        let journal = self.load_journal().await;
        journal
            .commits
            .iter()
            .find(|c| c.oid == oid)
            .and_then(|c| c.files.get(rel_path).cloned())
    }

    pub async fn commit_count(&self) -> usize {
        self.load_journal().await.commits.len()
    }

    pub async fn commit_messages(&self) -> Vec<String> {
        self.load_journal()
            .await
            .commits
            .into_iter()
            .map(|c| c.message)
            .collect()
    }
}

fn next_oid(journal: &Journal) -> String {
    format!("{:08x}", journal.commits.len() + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vfs::MemVfs;

    #[tokio::test]
    async fn init_then_iteration_commits_have_expected_messages() {
        let vfs = Arc::new(MemVfs::new());
        vfs.mkdir("src", true).await.unwrap();
        vfs.write_string("src/App.tsx", "x").await.unwrap();
        let store = VcsStore::new(vfs);

        store.add_all(&["src/App.tsx".to_string()]).await;
        store.commit("ralph: initialized", "ralph").await.unwrap();
        store.commit("ralph: iteration 1", "ralph").await.unwrap();

        assert_eq!(store.commit_count().await, 2);
        assert_eq!(
            store.commit_messages().await,
            vec!["ralph: initialized".to_string(), "ralph: iteration 1".to_string()]
        );
    }

    #[tokio::test]
    async fn tag_task_pre_resolves_to_current_head() {
        let vfs = Arc::new(MemVfs::new());
        let store = VcsStore::new(vfs);
        store.add_all(&[]).await;
        let oid = store.commit("ralph: initialized", "ralph").await.unwrap();
        store.tag_task_pre(3).await.unwrap();
        assert_eq!(store.resolve_ref("task-3-pre").await, Some(oid));
    }

    #[tokio::test]
    async fn read_file_at_commit_returns_historical_snapshot() {
        let vfs = Arc::new(MemVfs::new());
        vfs.mkdir("src", true).await.unwrap();
        vfs.write_string("src/App.tsx", "v1").await.unwrap();
        let store = VcsStore::new(vfs.clone());
        store.add_all(&["src/App.tsx".to_string()]).await;
        let oid1 = store.commit("ralph: iteration 1", "ralph").await.unwrap();

        vfs.write_string("src/App.tsx", "v2").await.unwrap();
        store.add_all(&["src/App.tsx".to_string()]).await;
        store.commit("ralph: iteration 2", "ralph").await.unwrap();

        assert_eq!(
            store.read_file_at_commit("src/App.tsx", &oid1).await,
            Some("v1".to_string())
        );
    }
}
