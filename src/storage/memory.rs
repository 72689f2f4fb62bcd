//! In-memory artifact store for tests and dry runs.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use super::{ArtifactStore, PersistedRun, RunSummary};
use crate::error::{CmError, Result};
use crate::pipeline::{PipelineInputs, RunStatus, SkippedStage, StageArtifact, StageId};

#[derive(Debug, Clone)]
struct StoredRun {
    inputs: PipelineInputs,
    status: RunStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    artifacts: Vec<StageArtifact>,
    skipped: Vec<(SkippedStage, bool)>,
}

impl StoredRun {
    fn summary(&self, run_id: &str) -> RunSummary {
        RunSummary {
            run_id: run_id.to_string(),
            job_title: self.inputs.job.title.clone(),
            status: self.status.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            artifact_count: self.artifacts.iter().filter(|a| !a.superseded).count(),
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryArtifactStore {
    runs: RwLock<BTreeMap<String, StoredRun>>,
}

impl MemoryArtifactStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn with_run<T>(&self, run_id: &str, f: impl FnOnce(&mut StoredRun) -> T) -> Result<T> {
        let mut runs = self.runs.write();
        let run = runs
            .get_mut(run_id)
            .ok_or_else(|| CmError::RunNotFound(run_id.to_string()))?;
        Ok(f(run))
    }
}

impl ArtifactStore for MemoryArtifactStore {
    fn begin_run(&self, run_id: &str, inputs: &PipelineInputs, at: DateTime<Utc>) -> Result<()> {
        let mut runs = self.runs.write();
        if runs.contains_key(run_id) {
            return Err(CmError::InvalidInput(format!("run {run_id} already exists")));
        }
        runs.insert(
            run_id.to_string(),
            StoredRun {
                inputs: inputs.clone(),
                status: RunStatus::Running,
                created_at: at,
                updated_at: at,
                artifacts: Vec::new(),
                skipped: Vec::new(),
            },
        );
        Ok(())
    }

    fn append(&self, run_id: &str, artifact: &StageArtifact) -> Result<()> {
        self.with_run(run_id, |run| {
            run.updated_at = artifact.timestamp;
            run.artifacts.push(artifact.clone());
        })
    }

    fn record_skip(&self, run_id: &str, skipped: &SkippedStage) -> Result<()> {
        self.with_run(run_id, |run| run.skipped.push((skipped.clone(), false)))
    }

    fn supersede_from(&self, run_id: &str, stage: StageId) -> Result<usize> {
        self.with_run(run_id, |run| {
            let mut changed = 0;
            for artifact in &mut run.artifacts {
                if artifact.stage_name >= stage && !artifact.superseded {
                    artifact.superseded = true;
                    changed += 1;
                }
            }
            for (skip, superseded) in &mut run.skipped {
                if skip.stage >= stage && !*superseded {
                    *superseded = true;
                    changed += 1;
                }
            }
            changed
        })
    }

    fn finish(&self, run_id: &str, status: &RunStatus, at: DateTime<Utc>) -> Result<()> {
        self.with_run(run_id, |run| {
            run.status = status.clone();
            run.updated_at = at;
        })
    }

    fn load(&self, run_id: &str) -> Result<PersistedRun> {
        let runs = self.runs.read();
        let run = runs
            .get(run_id)
            .ok_or_else(|| CmError::RunNotFound(run_id.to_string()))?;
        Ok(PersistedRun {
            summary: run.summary(run_id),
            inputs: run.inputs.clone(),
            artifacts: run.artifacts.clone(),
            skipped: run
                .skipped
                .iter()
                .filter(|(_, superseded)| !superseded)
                .map(|(skip, _)| skip.clone())
                .collect(),
        })
    }

    fn run_summary(&self, run_id: &str) -> Result<RunSummary> {
        self.runs
            .read()
            .get(run_id)
            .map(|run| run.summary(run_id))
            .ok_or_else(|| CmError::RunNotFound(run_id.to_string()))
    }

    fn list_runs(&self) -> Result<Vec<RunSummary>> {
        let mut runs: Vec<RunSummary> = self
            .runs
            .read()
            .iter()
            .map(|(id, run)| run.summary(id))
            .collect();
        runs.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(a.run_id.cmp(&b.run_id)));
        Ok(runs)
    }
}
