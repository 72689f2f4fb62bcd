//! What a stage can see.

use serde::{Deserialize, Serialize};

use super::state::RunState;
use crate::config::Config;
use crate::core::{Competency, JobInput};
use crate::docstore::DocumentStore;
use crate::model::ModelService;
use crate::similarity::Similarity;

/// The normalized input for one job's run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineInputs {
    pub job: JobInput,
    /// Curated candidate competencies.
    #[serde(default)]
    pub catalog: Vec<Competency>,
    /// Reference set that selected competencies must not duplicate.
    #[serde(default)]
    pub protected: Vec<Competency>,
}

/// Injected capabilities, shared read-only by every stage.
#[derive(Clone, Copy)]
pub struct Services<'a> {
    pub model: &'a dyn ModelService,
    pub docs: &'a dyn DocumentStore,
    pub similarity: &'a dyn Similarity,
}

/// Read view handed to a stage. Stages return a payload and never
/// mutate the run.
#[derive(Clone, Copy)]
pub struct StageContext<'a> {
    pub inputs: &'a PipelineInputs,
    pub state: &'a RunState,
    pub config: &'a Config,
    pub services: Services<'a>,
}

impl StageContext<'_> {
    /// The job profile, from extraction if it ran, else from the input.
    #[must_use]
    pub fn job_profile(&self) -> crate::core::JobProfile {
        self.state
            .job
            .clone()
            .unwrap_or_else(|| self.inputs.job.profile())
    }
}
