//! Tailor mapped competencies to the job.
//!
//! Only definitions and indicators change. Every revision bumps the
//! competency version and its mappings are re-scored against the new text.

use std::collections::{BTreeMap, BTreeSet};

use tracing::info;

use super::scorer;
use crate::core::{Competency, Responsibility};
use crate::error::{CmError, Result};
use crate::model::prompts::{CustomizationReply, customization_prompt, customization_schema};
use crate::model::{PromptTask, invoke_typed};
use crate::pipeline::context::StageContext;
use crate::pipeline::payload::{CustomizationOutput, StagePayload};
use crate::pipeline::stage::{Precondition, Stage, StageId};

pub struct CustomizeStage;

impl Stage for CustomizeStage {
    fn id(&self) -> StageId {
        StageId::Customize
    }

    fn precondition(&self, ctx: &StageContext<'_>) -> Precondition {
        if !ctx.config.pipeline.customize {
            return Precondition::Skip("customization disabled by configuration".to_string());
        }
        if ctx.state.mappings.is_empty() {
            return Precondition::Skip("no mapped competencies".to_string());
        }
        Precondition::Ready
    }

    fn execute(&self, ctx: &StageContext<'_>) -> Result<StagePayload> {
        let state = ctx.state;
        let by_id: BTreeMap<&str, &Responsibility> = state
            .responsibilities
            .iter()
            .map(|r| (r.id.as_str(), r))
            .collect();

        let mapped: Vec<(&Competency, Vec<&Responsibility>)> = state
            .active_competencies()
            .map(|competency| {
                let duties = state
                    .mappings
                    .iter()
                    .filter(|m| m.competency_id == competency.id)
                    .filter_map(|m| by_id.get(m.responsibility_id.as_str()).copied())
                    .collect::<Vec<_>>();
                (competency, duties)
            })
            .filter(|(_, duties)| !duties.is_empty())
            .collect();

        let range = (ctx.config.gates.min_indicators, ctx.config.gates.max_indicators);
        let reply: CustomizationReply = invoke_typed(
            ctx.services.model,
            &customization_prompt(&ctx.job_profile(), &mapped, range),
            &customization_schema(),
        )?;

        let mut seen = BTreeSet::new();
        let mut revisions = Vec::with_capacity(reply.revisions.len());
        for (index, revision) in reply.revisions.into_iter().enumerate() {
            let Some((current, _)) = mapped.iter().find(|(c, _)| c.id == revision.competency_id)
            else {
                return Err(malformed(
                    index,
                    format!("'{}' is not a mapped competency", revision.competency_id),
                ));
            };
            if !seen.insert(revision.competency_id.clone()) {
                return Err(malformed(
                    index,
                    format!("'{}' revised twice", revision.competency_id),
                ));
            }
            let indicators = revision
                .indicators
                .iter()
                .map(|i| i.trim().to_string())
                .filter(|i| !i.is_empty())
                .collect();
            revisions.push(current.revised(revision.definition.trim().to_string(), indicators));
        }

        let in_range = range.0..=range.1;
        let untailored: Vec<String> = mapped
            .iter()
            .filter(|(c, _)| !seen.contains(&c.id) && !in_range.contains(&c.indicators.len()))
            .map(|(c, _)| c.id.clone())
            .collect();

        let all: Vec<&Responsibility> = state.responsibilities.iter().collect();
        let scorer = scorer(ctx, &ctx.job_profile().family);
        let mut mappings: Vec<_> = state
            .mappings
            .iter()
            .filter(|m| !seen.contains(&m.competency_id))
            .cloned()
            .collect();
        for revised in &revisions {
            mappings.extend(scorer.map_competency(&all, revised));
        }

        info!(
            revised = revisions.len(),
            untailored = untailored.len(),
            mappings = mappings.len(),
            "competencies customized"
        );
        Ok(StagePayload::Customize(CustomizationOutput {
            revisions,
            mappings,
            untailored,
        }))
    }
}

fn malformed(index: usize, reason: String) -> CmError {
    CmError::MalformedReply {
        task: PromptTask::CustomizeCompetencies.to_string(),
        path: format!("/revisions/{index}/competency_id"),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::config::Config;
    use crate::model::MockModelService;
    use crate::pipeline::RunState;
    use crate::test_utils::fixtures::{self, TestServices};

    fn mapped_state() -> RunState {
        let mut state = RunState::new("t");
        state
            .apply(&StagePayload::Extract(fixtures::analyst_extraction()))
            .unwrap();
        state
            .apply(&StagePayload::Map(fixtures::analyst_mapping()))
            .unwrap();
        state
    }

    #[test]
    fn skipped_when_disabled() {
        let mut config = Config::default();
        config.pipeline.customize = false;
        let services = TestServices::new();
        let inputs = fixtures::analyst_inputs();
        let state = mapped_state();
        let ctx = services.context(&inputs, &state, &config);
        assert!(matches!(CustomizeStage.precondition(&ctx), Precondition::Skip(_)));
    }

    #[test]
    fn revisions_bump_versions_and_keep_names() {
        let config = Config::default();
        let services = TestServices::new();
        let inputs = fixtures::analyst_inputs();
        let state = mapped_state();
        let ctx = services.context(&inputs, &state, &config);
        assert_eq!(CustomizeStage.precondition(&ctx), Precondition::Ready);

        let StagePayload::Customize(out) = CustomizeStage.execute(&ctx).unwrap() else {
            panic!("expected a customization payload");
        };
        assert!(!out.revisions.is_empty());
        for revised in &out.revisions {
            let original = state.competencies.iter().find(|c| c.id == revised.id).unwrap();
            assert_eq!(revised.version, original.version + 1);
            assert_eq!(revised.name, original.name);
            assert!((3..=7).contains(&revised.indicators.len()));
        }
    }

    #[test]
    fn competency_the_reply_leaves_short_is_reported() {
        let config = Config::default();
        let services = TestServices::with_model(MockModelService::new().with_reply(
            PromptTask::CustomizeCompetencies,
            json!({"revisions": []}),
        ));
        let inputs = fixtures::analyst_inputs();
        let mut state = mapped_state();
        let ledger = state
            .competencies
            .iter_mut()
            .find(|c| c.id == "C-ledger")
            .unwrap();
        ledger.indicators.truncate(1);
        let ctx = services.context(&inputs, &state, &config);

        let payload = CustomizeStage.execute(&ctx).unwrap();
        let StagePayload::Customize(out) = &payload else {
            panic!("expected a customization payload");
        };
        assert!(out.revisions.is_empty());
        assert_eq!(out.untailored, vec!["C-ledger".to_string()]);

        let gate = crate::gates::GateEvaluator::from_config(&config)
            .evaluate(StageId::Customize, &payload);
        assert_eq!(gate.status, crate::gates::GateStatus::Block);
        assert_eq!(gate.blocking().next().unwrap().rule, "indicator-count-in-range");
    }

    #[test]
    fn revision_of_unmapped_competency_is_malformed() {
        let config = Config::default();
        let services = TestServices::with_model(MockModelService::new().with_reply(
            PromptTask::CustomizeCompetencies,
            json!({"revisions": [{"competency_id": "C-spare", "definition": "x", "indicators": []}]}),
        ));
        let inputs = fixtures::analyst_inputs();
        let state = mapped_state();
        let ctx = services.context(&inputs, &state, &config);
        assert!(matches!(
            CustomizeStage.execute(&ctx),
            Err(CmError::MalformedReply { .. })
        ));
    }
}
