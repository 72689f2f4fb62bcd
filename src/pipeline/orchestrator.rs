//! Sequences the stages of one run.
//!
//! The orchestrator owns the [`RunState`]. For each stage it checks the
//! precondition, executes, hands the payload to the gate evaluator and
//! only then merges it. A blocked payload is persisted for inspection but
//! never merged; a stage error writes nothing.

use rayon::prelude::*;
use tracing::{error, info, info_span, warn};

use super::clock::{Clock, SystemClock};
use super::context::{PipelineInputs, Services, StageContext};
use super::payload::SCHEMA_VERSION;
use super::stage::{Precondition, Stage, StageId};
use super::stages::default_stages;
use super::state::{RunState, RunStatus, SkippedStage, StageArtifact};
use super::PipelineFailure;
use crate::config::Config;
use crate::error::{CmError, Result};
use crate::gates::{GateEvaluator, GateStatus};
use crate::storage::ArtifactStore;

static SYSTEM_CLOCK: SystemClock = SystemClock;

pub struct Orchestrator<'a> {
    config: &'a Config,
    services: Services<'a>,
    store: &'a dyn ArtifactStore,
    clock: &'a dyn Clock,
    gates: GateEvaluator,
    stages: Vec<Box<dyn Stage>>,
}

impl<'a> Orchestrator<'a> {
    /// Validates `config` before anything runs.
    pub fn new(config: &'a Config, services: Services<'a>, store: &'a dyn ArtifactStore) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            services,
            store,
            clock: &SYSTEM_CLOCK,
            gates: GateEvaluator::from_config(config),
            stages: default_stages(),
        })
    }

    #[must_use]
    pub fn with_clock(mut self, clock: &'a dyn Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the stage list. Stages must be in ascending [`StageId`]
    /// order.
    pub fn with_stages(mut self, stages: Vec<Box<dyn Stage>>) -> Result<Self> {
        if stages.windows(2).any(|pair| pair[0].id() >= pair[1].id()) {
            return Err(CmError::Config(
                "stages must be unique and in pipeline order".to_string(),
            ));
        }
        self.stages = stages;
        Ok(self)
    }

    pub fn stage_ids(&self) -> Vec<StageId> {
        self.stages.iter().map(|s| s.id()).collect()
    }

    /// Run every stage for a fresh run with a generated id.
    pub fn run(&self, inputs: &PipelineInputs) -> Result<RunState> {
        let run_id = uuid::Uuid::new_v4().to_string();
        self.run_with_id(&run_id, inputs)
    }

    pub fn run_with_id(&self, run_id: &str, inputs: &PipelineInputs) -> Result<RunState> {
        let span = info_span!("run", run_id = %run_id);
        let _guard = span.enter();

        self.store.begin_run(run_id, inputs, self.clock.now())?;
        info!(
            job = %inputs.job.title,
            responsibilities = inputs.job.responsibilities.len(),
            catalog = inputs.catalog.len(),
            protected = inputs.protected.len(),
            "run started"
        );
        self.drive(RunState::new(run_id), inputs, 0)
    }

    /// Re-enter a persisted run at `from`. Artifacts and skip records of
    /// `from` and later stages are superseded; earlier ones are replayed.
    /// `inputs` replaces the persisted inputs when given.
    pub fn resume(
        &self,
        run_id: &str,
        from: StageId,
        inputs: Option<&PipelineInputs>,
    ) -> Result<RunState> {
        let span = info_span!("resume", run_id = %run_id, from = %from);
        let _guard = span.enter();

        let Some(start) = self.stages.iter().position(|s| s.id() == from) else {
            return Err(CmError::ResumeInvalid {
                run_id: run_id.to_string(),
                stage: from.to_string(),
                reason: "stage is not part of this pipeline".to_string(),
            });
        };

        let persisted = self.store.load(run_id)?;
        let inputs = inputs.cloned().unwrap_or(persisted.inputs);

        let mut artifacts = persisted.artifacts;
        for artifact in &mut artifacts {
            if artifact.stage_name >= from {
                artifact.superseded = true;
            }
        }
        let skipped: Vec<SkippedStage> = persisted
            .skipped
            .into_iter()
            .filter(|skip| skip.stage < from)
            .collect();
        let state = RunState::replay(run_id, artifacts, skipped)?;

        let settled = state.settled_stages();
        if let Some(missing) = self.stages[..start]
            .iter()
            .map(|s| s.id())
            .find(|id| !settled.contains(id))
        {
            return Err(CmError::ResumeInvalid {
                run_id: run_id.to_string(),
                stage: from.to_string(),
                reason: format!("stage '{missing}' has neither a committed artifact nor a skip record"),
            });
        }

        let superseded = self.store.supersede_from(run_id, from)?;
        info!(superseded, "resuming run");
        self.drive(state, &inputs, start)
    }

    fn context<'s>(&'s self, inputs: &'s PipelineInputs, state: &'s RunState) -> StageContext<'s> {
        StageContext {
            inputs,
            state,
            config: self.config,
            services: self.services,
        }
    }

    fn drive(&self, mut state: RunState, inputs: &PipelineInputs, start: usize) -> Result<RunState> {
        let run_id = state.run_id.clone();

        for stage in &self.stages[start..] {
            let id = stage.id();
            let span = info_span!("stage", stage = %id);
            let _guard = span.enter();

            if let Precondition::Skip(reason) = stage.precondition(&self.context(inputs, &state)) {
                info!(%reason, "stage skipped");
                let skip = SkippedStage { stage: id, reason };
                self.store.record_skip(&run_id, &skip)?;
                state.skipped.push(skip);
                continue;
            }

            let payload = match stage.execute(&self.context(inputs, &state)) {
                Ok(payload) => payload,
                Err(err) => return self.fail(state, id, err),
            };

            let gate_result = self.gates.evaluate(id, &payload);
            let artifact = StageArtifact {
                stage_name: id,
                version: state.next_version(id),
                schema_version: SCHEMA_VERSION,
                timestamp: self.clock.now(),
                payload,
                gate_result,
                superseded: false,
            };

            if artifact.gate_result.status == GateStatus::Block {
                let failure = PipelineFailure {
                    run_id: run_id.clone(),
                    stage: id,
                    gate: artifact.gate_result.clone(),
                };
                self.store.append(&run_id, &artifact)?;
                state.artifacts.push(artifact);
                state.status = RunStatus::Halted { stage: id };
                self.store.finish(&run_id, &state.status, self.clock.now())?;
                warn!(rules = ?failure.blocking_rules(), "run halted");
                return Err(failure.into());
            }

            if let Err(err) = state.apply(&artifact.payload) {
                return self.fail(state, id, err);
            }
            self.store.append(&run_id, &artifact)?;
            info!(
                version = artifact.version,
                status = %artifact.gate_result.status,
                "stage committed"
            );
            state.artifacts.push(artifact);
        }

        state.status = RunStatus::Completed;
        self.store.finish(&run_id, &state.status, self.clock.now())?;
        info!("run completed");
        Ok(state)
    }

    fn fail(&self, mut state: RunState, stage: StageId, err: CmError) -> Result<RunState> {
        error!(error = %err, "stage failed");
        state.status = RunStatus::Failed {
            stage,
            message: err.to_string(),
        };
        self.store
            .finish(&state.run_id, &state.status, self.clock.now())?;
        Err(err)
    }
}

/// Run one isolated pipeline per job in parallel. Each job gets its own
/// store handle from `open_store` and its own state; results are in job
/// order.
pub fn run_batch<F>(
    config: &Config,
    services: Services<'_>,
    open_store: F,
    jobs: &[PipelineInputs],
) -> Vec<Result<RunState>>
where
    F: Fn() -> Result<Box<dyn ArtifactStore>> + Sync,
{
    jobs.par_iter()
        .map(|inputs| {
            let store = open_store()?;
            Orchestrator::new(config, services, store.as_ref())?.run(inputs)
        })
        .collect()
}
