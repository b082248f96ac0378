//! C13 — Reserved `.ralph/` state (spec §3, §4.13).
//!
//! A typed facade over the `Vfs` for the handful of files that make up the
//! loop's inter-iteration memory, grounded in the teacher's `OutputWriter`
//! trait (`src/output/mod.rs`): instead of scattering raw path strings
//! through the scheduler, every read/write of `.ralph/*` goes through one
//! named method here, each of which knows its own ownership rule.

use crate::error::VfsError;
use crate::vfs::Vfs;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const DIR: &str = ".ralph";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Idle,
    Running,
    Waiting,
    Complete,
    Error,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Idle => "idle",
            RunStatus::Running => "running",
            RunStatus::Waiting => "waiting",
            RunStatus::Complete => "complete",
            RunStatus::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "idle" => Some(RunStatus::Idle),
            "running" => Some(RunStatus::Running),
            "waiting" => Some(RunStatus::Waiting),
            "complete" => Some(RunStatus::Complete),
            "error" => Some(RunStatus::Error),
            _ => None,
        }
    }
}

/// `.ralph/config.json` (spec §3). Human-owned; scheduler only reads it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(rename = "maxIterations")]
    pub max_iterations: u32,
    #[serde(rename = "checkpointInterval")]
    pub checkpoint_interval: u32,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self { max_iterations: 50, checkpoint_interval: 5 }
    }
}

pub struct RalphDir {
    vfs: Arc<dyn Vfs>,
}

impl RalphDir {
    pub fn new(vfs: Arc<dyn Vfs>) -> Self {
        Self { vfs }
    }

    /// Creates `.ralph/` if it doesn't exist yet (spec §4.13: "the
    /// scheduler creates `.ralph/` at run start if absent").
    pub async fn ensure_exists(&self) -> Result<(), VfsError> {
        if !self.vfs.exists(DIR).await {
            self.vfs.mkdir(DIR, true).await?;
        }
        Ok(())
    }

    pub async fn read_origin(&self) -> Option<String> {
        self.vfs.read_to_string(&path("origin.md")).await.ok()
    }

    pub async fn read_task(&self) -> Option<String> {
        self.vfs.read_to_string(&path("task.md")).await.ok()
    }

    pub async fn write_task(&self, content: &str) -> Result<(), VfsError> {
        self.vfs.write_string(&path("task.md"), content).await
    }

    pub async fn read_plan(&self) -> Option<String> {
        self.vfs.read_to_string(&path("plan.tsx")).await.ok()
    }

    pub async fn read_status(&self) -> Option<RunStatus> {
        let text = self.vfs.read_to_string(&path("status.txt")).await.ok()?;
        RunStatus::parse(&text)
    }

    /// Model-authoritative per spec §4.13; the scheduler only ever writes
    /// `running`/`idle` at state-machine boundaries, never `complete`/`waiting`.
    pub async fn write_status(&self, status: RunStatus) -> Result<(), VfsError> {
        self.vfs.write_string(&path("status.txt"), status.as_str()).await
    }

    pub async fn read_iteration(&self) -> u64 {
        self.vfs
            .read_to_string(&path("iteration.txt"))
            .await
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(0)
    }

    /// Scheduler-only per spec §4.13.
    pub async fn write_iteration(&self, n: u64) -> Result<(), VfsError> {
        self.vfs.write_string(&path("iteration.txt"), &n.to_string()).await
    }

    pub async fn read_progress(&self) -> String {
        self.vfs.read_to_string(&path("progress.md")).await.unwrap_or_default()
    }

    /// Append-only per spec §4.13.
    pub async fn append_progress(&self, iteration: u64, summary: &str) -> Result<(), VfsError> {
        let existing = self.read_progress().await;
        let entry = format!("### Iteration {iteration}\n{summary}\n\n");
        self.vfs.write_string(&path("progress.md"), &(existing + &entry)).await
    }

    pub async fn read_feedback(&self) -> String {
        self.vfs.read_to_string(&path("feedback.md")).await.unwrap_or_default()
    }

    /// Overwritten every iteration per spec §4.13 (never appended).
    pub async fn write_feedback(&self, content: &str) -> Result<(), VfsError> {
        self.vfs.write_string(&path("feedback.md"), content).await
    }

    pub async fn write_summary(&self, content: &str) -> Result<(), VfsError> {
        self.vfs.write_string(&path("summary.md"), content).await
    }

    pub async fn read_config(&self) -> RunConfig {
        match self.vfs.read_to_string(&path("config.json")).await {
            Ok(text) => serde_json::from_str(&text).unwrap_or_default(),
            Err(_) => RunConfig::default(),
        }
    }

    /// Overwrites `.ralph/config.json`. Used by the CLI's `--max-iterations`
    /// / `--checkpoint-interval` overrides; the scheduler itself never calls
    /// this, it only reads.
    pub async fn write_config(&self, config: &RunConfig) -> Result<(), VfsError> {
        let text = serde_json::to_string_pretty(config).unwrap_or_default();
        self.vfs.write_string(&path("config.json"), &text).await
    }
}

fn path(name: &str) -> String {
    format!("{DIR}/{name}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vfs::MemVfs;

    #[tokio::test]
    async fn ensure_exists_creates_dir_once() {
        let vfs = Arc::new(MemVfs::new());
        let dir = RalphDir::new(vfs.clone());
        dir.ensure_exists().await.unwrap();
        assert!(vfs.exists(".ralph").await);
        dir.ensure_exists().await.unwrap(); // idempotent
    }

    #[tokio::test]
    async fn status_round_trips() {
        let vfs = Arc::new(MemVfs::new());
        let dir = RalphDir::new(vfs);
        dir.ensure_exists().await.unwrap();
        dir.write_status(RunStatus::Running).await.unwrap();
        assert_eq!(dir.read_status().await, Some(RunStatus::Running));
    }

    #[tokio::test]
    async fn progress_is_append_only() {
        let vfs = Arc::new(MemVfs::new());
        let dir = RalphDir::new(vfs);
        dir.ensure_exists().await.unwrap();
        dir.append_progress(1, "did a thing").await.unwrap();
        dir.append_progress(2, "did another thing").await.unwrap();
        let progress = dir.read_progress().await;
        assert!(progress.contains("Iteration 1"));
        assert!(progress.contains("Iteration 2"));
        assert!(progress.find("Iteration 1").unwrap() < progress.find("Iteration 2").unwrap());
    }

    #[tokio::test]
    async fn feedback_is_overwritten_not_appended() {
        let vfs = Arc::new(MemVfs::new());
        let dir = RalphDir::new(vfs);
        dir.ensure_exists().await.unwrap();
        dir.write_feedback("first").await.unwrap();
        dir.write_feedback("second").await.unwrap();
        assert_eq!(dir.read_feedback().await, "second");
    }

    #[tokio::test]
    async fn missing_config_falls_back_to_defaults() {
        let vfs = Arc::new(MemVfs::new());
        let dir = RalphDir::new(vfs);
        let config = dir.read_config().await;
        assert_eq!(config.max_iterations, 50);
    }

    #[tokio::test]
    async fn write_config_round_trips_through_read_config() {
        let vfs = Arc::new(MemVfs::new());
        let dir = RalphDir::new(vfs);
        dir.ensure_exists().await.unwrap();
        dir.write_config(&RunConfig { max_iterations: 7, checkpoint_interval: 3 }).await.unwrap();
        let config = dir.read_config().await;
        assert_eq!(config.max_iterations, 7);
        assert_eq!(config.checkpoint_interval, 3);
    }
}
