//! Persistence handoff.
//!
//! The pipeline hands the finished [`AnalysisOutcome`] to a store exactly
//! once, on completion, and keeps no further reference to it. Retention,
//! sharing, and history are the store's problem.

use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Local;
use qa_analyzer_sdk::events::AnalysisOutcome;
use serde::Serialize;

/// Receives the final outcome of an analysis.
#[async_trait]
pub trait OutcomeStore: Send + Sync {
    async fn save(&self, outcome: &AnalysisOutcome) -> Result<()>;
}

/// Store for callers that do not persist anything (tests, ad-hoc runs).
pub struct DiscardStore;

#[async_trait]
impl OutcomeStore for DiscardStore {
    async fn save(&self, _outcome: &AnalysisOutcome) -> Result<()> {
        Ok(())
    }
}

#[derive(Serialize)]
struct StoredOutcome<'a> {
    created_at: String,
    outcome: &'a AnalysisOutcome,
}

/// Writes each outcome as a timestamped YAML artifact under one directory.
pub struct YamlOutcomeStore {
    dir: PathBuf,
}

impl YamlOutcomeStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn artifact_path(&self) -> PathBuf {
        let timestamp = Local::now().format("%Y%m%d_%H%M%S");
        self.dir.join(format!("analysis_{}.yaml", timestamp))
    }
}

#[async_trait]
impl OutcomeStore for YamlOutcomeStore {
    async fn save(&self, outcome: &AnalysisOutcome) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("failed to create {}", self.dir.display()))?;

        let path = self.artifact_path();
        let stored = StoredOutcome {
            created_at: Local::now().to_rfc3339(),
            outcome,
        };
        let yaml = serde_yaml::to_string(&stored)?;
        tokio::fs::write(&path, yaml)
            .await
            .with_context(|| format!("failed to write {}", path.display()))?;

        tracing::info!(path = %path.display(), "analysis outcome saved");
        Ok(())
    }
}
