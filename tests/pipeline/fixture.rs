//! Scenario harness: config, stub services and a store per test.

use cmap::config::Config;
use cmap::error::Result;
use cmap::model::{MockModelService, PromptTask};
use cmap::pipeline::{FixedClock, Orchestrator, PipelineInputs, RunState};
use cmap::storage::{ArtifactStore, MemoryArtifactStore};
use cmap::test_utils::fixtures::TestServices;
use cmap::test_utils::logging::TestLogger;
use serde_json::json;

/// A model that proposes nothing, so every competency comes from the
/// catalog and the unmappable duty stays unmapped.
pub fn catalog_only_model() -> MockModelService {
    MockModelService::new().with_reply(
        PromptTask::ProposeCompetencies,
        json!({ "competencies": [] }),
    )
}

pub struct PipelineFixture {
    pub config: Config,
    pub services: TestServices,
    pub clock: FixedClock,
    pub logger: TestLogger,
}

impl PipelineFixture {
    pub fn new(test_name: &str) -> Self {
        Self::with_model(test_name, catalog_only_model())
    }

    pub fn with_model(test_name: &str, model: MockModelService) -> Self {
        Self {
            config: Config::default(),
            services: TestServices::with_model(model),
            clock: FixedClock::default(),
            logger: TestLogger::new(test_name),
        }
    }

    pub fn orchestrator<'a>(&'a self, store: &'a dyn ArtifactStore) -> Orchestrator<'a> {
        Orchestrator::new(&self.config, self.services.services(), store)
            .expect("valid default config")
            .with_clock(&self.clock)
    }

    pub fn run(
        &self,
        store: &dyn ArtifactStore,
        run_id: &str,
        inputs: &PipelineInputs,
    ) -> Result<RunState> {
        self.logger.step(&format!("running {run_id}"));
        self.orchestrator(store).run_with_id(run_id, inputs)
    }

    pub fn run_in_memory(
        &self,
        run_id: &str,
        inputs: &PipelineInputs,
    ) -> (MemoryArtifactStore, Result<RunState>) {
        let store = MemoryArtifactStore::new();
        let result = self.run(&store, run_id, inputs);
        (store, result)
    }
}
