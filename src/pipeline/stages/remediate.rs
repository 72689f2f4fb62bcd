//! Resolve overlap findings with the model's plan.

use crate::error::Result;
use crate::model::invoke_typed;
use crate::model::prompts::{RemediationReply, remediation_prompt, remediation_schema};
use crate::overlap::remediation::RemediationInput;
use crate::overlap::{OverlapDetector, Remediator};
use crate::pipeline::context::StageContext;
use crate::pipeline::payload::StagePayload;
use crate::pipeline::stage::{Precondition, Stage, StageId};

use super::scorer;

pub struct RemediateStage;

impl Stage for RemediateStage {
    fn id(&self) -> StageId {
        StageId::Remediate
    }

    fn precondition(&self, ctx: &StageContext<'_>) -> Precondition {
        if ctx.state.findings.active().any(|f| f.needs_attention()) {
            Precondition::Ready
        } else {
            Precondition::Skip("no active MINOR or MATERIAL findings".to_string())
        }
    }

    fn execute(&self, ctx: &StageContext<'_>) -> Result<StagePayload> {
        let state = ctx.state;
        let flagged: Vec<_> = state
            .findings
            .active()
            .filter(|f| f.needs_attention())
            .collect();

        let reply: RemediationReply = invoke_typed(
            ctx.services.model,
            &remediation_prompt(&flagged, &state.competencies, &ctx.inputs.protected, &state.pool),
            &remediation_schema(),
        )?;

        let remediator = Remediator::new(
            OverlapDetector::new(&ctx.config.overlap, ctx.services.similarity),
            scorer(ctx, &ctx.job_profile().family),
        )
        .with_indicator_range(ctx.config.gates.min_indicators, ctx.config.gates.max_indicators);
        let outcome = remediator.apply(&RemediationInput {
            responsibilities: &state.responsibilities,
            competencies: &state.competencies,
            mappings: &state.mappings,
            ledger: &state.findings,
            protected: &ctx.inputs.protected,
            pool: &state.pool,
            decisions: &reply.decisions,
        })?;
        Ok(StagePayload::Remediate(outcome))
    }
}
