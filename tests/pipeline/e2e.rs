//! Full runs over the analyst fixture.

use cmap::core::{Competency, Contribution, FindingStatus, OverlapClass, SourceTier};
use cmap::gates::GateStatus;
use cmap::model::{MockModelService, PromptTask};
use cmap::pipeline::{RunStatus, StageId, StagePayload};
use cmap::ranking::StopReason;
use cmap::storage::{ArtifactStore, SqliteArtifactStore};
use cmap::test_utils::fixtures::analyst_inputs;
use serde_json::json;

use super::fixture::{PipelineFixture, catalog_only_model};

fn gate_of(state: &cmap::pipeline::RunState, stage: StageId) -> GateStatus {
    state
        .gate_results()
        .into_iter()
        .find(|g| g.stage == stage)
        .map(|g| g.status)
        .unwrap_or_else(|| panic!("no gate result for {stage}"))
}

#[test]
fn analyst_run_selects_until_coverage_target() {
    let fixture = PipelineFixture::new("analyst_run_selects_until_coverage_target");
    let (store, result) = fixture.run_in_memory("run-e2e", &analyst_inputs());
    let state = result.unwrap();

    fixture.logger.step("checking status and stage trail");
    assert_eq!(state.status, RunStatus::Completed);
    let stages: Vec<StageId> = state.artifacts.iter().map(|a| a.stage_name).collect();
    assert_eq!(
        stages,
        vec![
            StageId::Extract,
            StageId::Map,
            StageId::Customize,
            StageId::Audit,
            StageId::Rank
        ]
    );
    let skipped: Vec<StageId> = state.skipped.iter().map(|s| s.stage).collect();
    assert_eq!(skipped, vec![StageId::Benchmark, StageId::Remediate]);

    fixture.logger.step("checking mappings");
    assert_eq!(state.responsibilities.len(), 10);
    assert_eq!(state.mappings.len(), 9);
    assert!(
        state
            .mappings
            .iter()
            .all(|m| m.contribution == Contribution::Primary)
    );
    assert!(state.mappings.iter().all(|m| m.responsibility_id != "R10"));
    assert_eq!(state.pool.len(), 1);
    assert_eq!(state.pool[0].id, "C-spare");

    fixture.logger.step("checking customization");
    let active: Vec<&Competency> = state.active_competencies().collect();
    assert_eq!(active.len(), 9);
    assert!(active.iter().all(|c| c.version == 2));
    assert!(active.iter().all(|c| (3..=7).contains(&c.indicators.len())));

    fixture.logger.step("checking ranking");
    let ranking = state.ranking.as_ref().unwrap();
    assert_eq!(ranking.ranked.len(), 9);
    assert_eq!(ranking.selection.selected.len(), 8);
    assert!((ranking.selection.coverage - 0.8).abs() < 1e-6);
    assert_eq!(ranking.selection.stop_reason, StopReason::TargetMet);
    assert!(ranking.selection.gaps.contains(&"R10".to_string()));
    assert_eq!(ranking.selection.unmappable, vec!["R10".to_string()]);

    fixture.logger.step("checking gates");
    assert_eq!(gate_of(&state, StageId::Extract), GateStatus::Pass);
    assert_eq!(gate_of(&state, StageId::Map), GateStatus::Warn);
    assert_eq!(gate_of(&state, StageId::Customize), GateStatus::Pass);
    assert_eq!(gate_of(&state, StageId::Audit), GateStatus::Pass);
    assert_eq!(gate_of(&state, StageId::Rank), GateStatus::Warn);

    let summary = store.run_summary("run-e2e").unwrap();
    assert_eq!(summary.status, RunStatus::Completed);
    assert_eq!(summary.artifact_count, 5);
    fixture.logger.pass();
}

#[test]
fn every_mapping_traces_to_known_ids() {
    let fixture = PipelineFixture::new("every_mapping_traces_to_known_ids");
    let (_, result) = fixture.run_in_memory("run-trace", &analyst_inputs());
    let state = result.unwrap();

    for mapping in &state.mappings {
        assert!(
            state
                .responsibilities
                .iter()
                .any(|r| r.id == mapping.responsibility_id),
            "{} points at an unknown responsibility",
            mapping.responsibility_id
        );
        assert!(
            state
                .active_competencies()
                .any(|c| c.id == mapping.competency_id),
            "{} points at an inactive competency",
            mapping.competency_id
        );
        assert!(mapping.relevance_score >= fixture.config.scoring.min_relevance);
    }
    fixture.logger.pass();
}

#[test]
fn protected_duplicate_is_removed_and_reported_as_gap() {
    let finding_id = "C-ledger@v2~P-ledger";
    let model = catalog_only_model().with_reply(
        PromptTask::PlanRemediation,
        json!({"decisions": [{
            "finding_id": finding_id,
            "action": "REMOVE",
            "rationale": "owned by the protected ledger competency"
        }]}),
    );
    let fixture =
        PipelineFixture::with_model("protected_duplicate_is_removed_and_reported_as_gap", model);
    let mut inputs = analyst_inputs();
    let ledger = inputs.catalog.iter().find(|c| c.id == "C-ledger").unwrap();
    inputs.protected.push(Competency::new(
        "P-ledger",
        ledger.name.clone(),
        ledger.definition.clone(),
        SourceTier::Protected,
    ));

    let (_, result) = fixture.run_in_memory("run-overlap", &inputs);
    let state = result.unwrap();
    assert_eq!(state.status, RunStatus::Completed);
    assert!(state.skipped.iter().all(|s| s.stage != StageId::Remediate));

    fixture.logger.step("checking finding lifecycle");
    let finding = state.findings.get(finding_id).unwrap();
    assert_eq!(finding.classification, OverlapClass::Material);
    assert_eq!(finding.status, FindingStatus::Withdrawn);
    assert_eq!(gate_of(&state, StageId::Audit), GateStatus::Warn);

    fixture.logger.step("checking the removal reached the ranking");
    assert!(state.active_competencies().all(|c| c.id != "C-ledger"));
    assert!(state.mappings.iter().all(|m| m.competency_id != "C-ledger"));
    let selection = &state.ranking.as_ref().unwrap().selection;
    assert_eq!(selection.selected.len(), 8);
    assert!(selection.gaps.contains(&"R01".to_string()));
    assert!(selection.gaps.contains(&"R10".to_string()));

    let report = state.report();
    assert!(report.findings.iter().any(|f| f.id == finding_id));
    fixture.logger.pass();
}

#[test]
fn sqlite_store_keeps_the_same_audit_trail() {
    let fixture = PipelineFixture::new("sqlite_store_keeps_the_same_audit_trail");
    let store = SqliteArtifactStore::open_in_memory().unwrap();
    let state = fixture.run(&store, "run-sql", &analyst_inputs()).unwrap();

    let persisted = store.load("run-sql").unwrap();
    assert_eq!(persisted.artifacts, state.artifacts);
    assert_eq!(persisted.skipped, state.skipped);
    assert_eq!(persisted.inputs, analyst_inputs());
    assert_eq!(persisted.summary.job_title, "Financial Analyst");
    assert_eq!(store.list_runs().unwrap().len(), 1);
    fixture.logger.pass();
}

#[test]
fn model_outage_fails_the_stage_without_an_artifact() {
    let model = MockModelService::new().fail_task(
        PromptTask::ProposeCompetencies,
        cmap::model::MockFailure::Unavailable,
    );
    let fixture =
        PipelineFixture::with_model("model_outage_fails_the_stage_without_an_artifact", model);
    let (store, result) = fixture.run_in_memory("run-down", &analyst_inputs());
    assert!(matches!(
        result,
        Err(cmap::CmError::ServiceUnavailable(_))
    ));

    let persisted = store.load("run-down").unwrap();
    let stages: Vec<StageId> = persisted.artifacts.iter().map(|a| a.stage_name).collect();
    assert_eq!(stages, vec![StageId::Extract]);
    assert!(matches!(
        persisted.summary.status,
        RunStatus::Failed { stage: StageId::Map, .. }
    ));
    fixture.logger.pass();
}

#[test]
fn revised_competency_gets_fresh_findings() {
    let stale_id = "C-ledger@v2~P-ledger";
    let model = catalog_only_model().with_reply(
        PromptTask::PlanRemediation,
        json!({"decisions": [{
            "finding_id": stale_id,
            "action": "REVISE",
            "definition": "Investigates subledger reconciling items and documents adjusting entries.",
            "rationale": "narrow to subledger work"
        }]}),
    );
    let fixture = PipelineFixture::with_model("revised_competency_gets_fresh_findings", model);
    let mut inputs = analyst_inputs();
    let ledger = inputs.catalog.iter().find(|c| c.id == "C-ledger").unwrap();
    inputs.protected.push(Competency::new(
        "P-ledger",
        ledger.name.clone(),
        ledger.definition.clone(),
        SourceTier::Protected,
    ));

    // The remediation artifact is persisted whether or not its gate passes.
    let (store, _) = fixture.run_in_memory("run-revise", &inputs);
    let persisted = store.load("run-revise").unwrap();
    let outcome = persisted
        .artifacts
        .iter()
        .find_map(|a| match &a.payload {
            StagePayload::Remediate(out) => Some(out.clone()),
            _ => None,
        })
        .unwrap();

    let revised = outcome.competencies.iter().find(|c| c.id == "C-ledger").unwrap();
    assert_eq!(revised.version, 3);
    assert_eq!(outcome.superseded_findings, vec![stale_id.to_string()]);
    let stale = outcome.findings.iter().find(|f| f.id == stale_id).unwrap();
    assert_eq!(stale.status, FindingStatus::Superseded { by_version: 3 });
    let fresh = outcome
        .findings
        .iter()
        .find(|f| f.id == "C-ledger@v3~P-ledger")
        .unwrap();
    assert!(fresh.is_active());
    assert!(
        outcome
            .findings
            .iter()
            .filter(|f| f.competency_id == "C-ledger" && f.is_active())
            .all(|f| f.competency_version == 3)
    );
    fixture.logger.pass();
}
