use cmap::CmError;
use cmap::gates::GateStatus;
use cmap::pipeline::{RunStatus, StageId};
use cmap::storage::ArtifactStore;
use cmap::test_utils::fixtures::analyst_inputs;

use super::fixture::PipelineFixture;

#[test]
fn empty_catalog_halts_at_map() {
    let fixture = PipelineFixture::new("empty_catalog_halts_at_map");
    let mut inputs = analyst_inputs();
    inputs.catalog.clear();

    let (store, result) = fixture.run_in_memory("run-empty", &inputs);
    let err = result.unwrap_err();
    assert!(err.is_gate_block());
    let CmError::GateBlocked(failure) = err else {
        panic!("expected a gate block");
    };
    assert_eq!(failure.stage, StageId::Map);
    let rules = failure.blocking_rules();
    assert!(rules.contains(&"unmapped-responsibility-rate"));
    assert!(rules.contains(&"competency-count-in-range"));

    fixture.logger.step("checking the persisted trail");
    let persisted = store.load("run-empty").unwrap();
    assert_eq!(persisted.summary.status, RunStatus::Halted { stage: StageId::Map });
    assert_eq!(persisted.artifacts.len(), 2);
    let blocked = &persisted.artifacts[1];
    assert_eq!(blocked.stage_name, StageId::Map);
    assert_eq!(blocked.gate_result.status, GateStatus::Block);
    assert!(!blocked.is_committed());
    fixture.logger.pass();
}

#[test]
fn halted_run_never_reaches_later_stages() {
    let fixture = PipelineFixture::new("halted_run_never_reaches_later_stages");
    let mut inputs = analyst_inputs();
    inputs.catalog.clear();
    let (store, _) = fixture.run_in_memory("run-stop", &inputs);

    let persisted = store.load("run-stop").unwrap();
    assert!(
        persisted
            .artifacts
            .iter()
            .all(|a| a.stage_name <= StageId::Map)
    );
    assert!(persisted.skipped.is_empty());
    fixture.logger.pass();
}

#[test]
fn halted_run_resumes_with_corrected_inputs() {
    let fixture = PipelineFixture::new("halted_run_resumes_with_corrected_inputs");
    let mut inputs = analyst_inputs();
    inputs.catalog.clear();
    let (store, first) = fixture.run_in_memory("run-fix", &inputs);
    assert!(first.is_err());

    fixture.logger.step("resuming from map with the full catalog");
    let state = fixture
        .orchestrator(&store)
        .resume("run-fix", StageId::Map, Some(&analyst_inputs()))
        .unwrap();
    assert_eq!(state.status, RunStatus::Completed);
    assert_eq!(state.mappings.len(), 9);

    let maps: Vec<_> = state
        .artifacts
        .iter()
        .filter(|a| a.stage_name == StageId::Map)
        .collect();
    assert_eq!(maps.len(), 2);
    assert_eq!(maps[0].version, 1);
    assert!(maps[0].superseded);
    assert_eq!(maps[1].version, 2);
    assert!(maps[1].is_committed());

    let summary = store.run_summary("run-fix").unwrap();
    assert_eq!(summary.status, RunStatus::Completed);
    fixture.logger.pass();
}
