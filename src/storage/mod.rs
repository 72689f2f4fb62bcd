//! Artifact persistence.
//!
//! A run is stored as its inputs, an append-only list of stage artifacts
//! and skip records, and a terminal status. Resuming marks later records
//! superseded; nothing is ever deleted.

mod memory;
pub mod migrations;
mod sqlite;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::pipeline::{PipelineInputs, RunStatus, SkippedStage, StageArtifact, StageId};

pub use memory::MemoryArtifactStore;
pub use sqlite::SqliteArtifactStore;

/// One row of `runs list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub job_title: String,
    pub status: RunStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Artifacts not superseded by a resume.
    pub artifact_count: usize,
}

/// Everything persisted for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedRun {
    pub summary: RunSummary,
    pub inputs: PipelineInputs,
    /// In append order, superseded ones included.
    pub artifacts: Vec<StageArtifact>,
    /// Current (not superseded) skip records.
    pub skipped: Vec<SkippedStage>,
}

/// Run persistence capability.
pub trait ArtifactStore: Send + Sync {
    fn begin_run(&self, run_id: &str, inputs: &PipelineInputs, at: DateTime<Utc>) -> Result<()>;

    fn append(&self, run_id: &str, artifact: &StageArtifact) -> Result<()>;

    fn record_skip(&self, run_id: &str, skipped: &SkippedStage) -> Result<()>;

    /// Mark artifacts and skip records of `stage` and later superseded.
    /// Returns how many records changed.
    fn supersede_from(&self, run_id: &str, stage: StageId) -> Result<usize>;

    fn finish(&self, run_id: &str, status: &RunStatus, at: DateTime<Utc>) -> Result<()>;

    /// `RunNotFound` for an unknown id.
    fn load(&self, run_id: &str) -> Result<PersistedRun>;

    fn run_summary(&self, run_id: &str) -> Result<RunSummary>;

    /// Most recently updated first.
    fn list_runs(&self) -> Result<Vec<RunSummary>>;
}
