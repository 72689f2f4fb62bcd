use cmap::CmError;
use cmap::model::{MockFailure, PromptTask};
use cmap::pipeline::{RunStatus, StageId};
use cmap::storage::{ArtifactStore, MemoryArtifactStore};
use cmap::test_utils::fixtures::analyst_inputs;

use super::fixture::{PipelineFixture, catalog_only_model};

#[test]
fn failed_customize_resumes_once_the_service_recovers() {
    let store = MemoryArtifactStore::new();
    let broken = PipelineFixture::with_model(
        "failed_customize_resumes_once_the_service_recovers",
        catalog_only_model().fail_task(PromptTask::CustomizeCompetencies, MockFailure::Unavailable),
    );
    let err = broken
        .run(&store, "run-flaky", &analyst_inputs())
        .unwrap_err();
    assert!(matches!(err, CmError::ServiceUnavailable(_)));
    assert!(!err.is_gate_block());
    assert!(matches!(
        store.run_summary("run-flaky").unwrap().status,
        RunStatus::Failed { stage: StageId::Customize, .. }
    ));

    broken.logger.step("resuming with a healthy service");
    let healthy = PipelineFixture::new("failed_customize_resumes_once_the_service_recovers");
    let state = healthy
        .orchestrator(&store)
        .resume("run-flaky", StageId::Customize, None)
        .unwrap();
    assert_eq!(state.status, RunStatus::Completed);
    assert!(state.active_competencies().all(|c| c.version == 2));
    healthy.logger.pass();
}

#[test]
fn resume_from_audit_supersedes_later_artifacts() {
    let fixture = PipelineFixture::new("resume_from_audit_supersedes_later_artifacts");
    let (store, first) = fixture.run_in_memory("run-again", &analyst_inputs());
    let first = first.unwrap();

    let state = fixture
        .orchestrator(&store)
        .resume("run-again", StageId::Audit, None)
        .unwrap();
    assert_eq!(state.status, RunStatus::Completed);
    assert_eq!(state.ranking, first.ranking);

    fixture.logger.step("checking the audit trail");
    let persisted = store.load("run-again").unwrap();
    let superseded: Vec<(StageId, u32)> = persisted
        .artifacts
        .iter()
        .filter(|a| a.superseded)
        .map(|a| (a.stage_name, a.version))
        .collect();
    assert_eq!(superseded, vec![(StageId::Audit, 1), (StageId::Rank, 1)]);
    let live: Vec<(StageId, u32)> = persisted
        .artifacts
        .iter()
        .filter(|a| !a.superseded)
        .map(|a| (a.stage_name, a.version))
        .collect();
    assert_eq!(
        live,
        vec![
            (StageId::Extract, 1),
            (StageId::Map, 1),
            (StageId::Customize, 1),
            (StageId::Audit, 2),
            (StageId::Rank, 2),
        ]
    );
    // Remediate was skipped again on the second pass.
    assert_eq!(
        persisted
            .skipped
            .iter()
            .filter(|s| s.stage == StageId::Remediate)
            .count(),
        1
    );
    fixture.logger.pass();
}

#[test]
fn resume_of_unknown_run_is_reported() {
    let fixture = PipelineFixture::new("resume_of_unknown_run_is_reported");
    let store = MemoryArtifactStore::new();
    let err = fixture
        .orchestrator(&store)
        .resume("run-missing", StageId::Map, None)
        .unwrap_err();
    assert!(matches!(err, CmError::RunNotFound(_)));
    fixture.logger.pass();
}
