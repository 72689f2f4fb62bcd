//! Propose candidates and score every responsibility against them.

use std::collections::BTreeSet;

use tracing::info;

use super::scorer;
use crate::core::text::slugify;
use crate::core::{Competency, SourceTier};
use crate::error::{CmError, Result};
use crate::model::invoke_typed;
use crate::model::prompts::{ProposalReply, ProposedCompetency, proposal_prompt, proposal_schema};
use crate::pipeline::context::StageContext;
use crate::pipeline::payload::{MappingOutput, StagePayload};
use crate::pipeline::stage::{Stage, StageId};

pub struct MapStage;

impl Stage for MapStage {
    fn id(&self) -> StageId {
        StageId::Map
    }

    fn execute(&self, ctx: &StageContext<'_>) -> Result<StagePayload> {
        let job = ctx.job_profile();
        let responsibilities = &ctx.state.responsibilities;
        let catalog = &ctx.inputs.catalog;

        let mut taken: BTreeSet<String> = ctx.inputs.protected.iter().map(|c| c.id.clone()).collect();
        for competency in catalog {
            if !taken.insert(competency.id.clone()) {
                return Err(CmError::InvalidInput(format!(
                    "catalog competency id '{}' is not unique",
                    competency.id
                )));
            }
        }

        let reply: ProposalReply = invoke_typed(
            ctx.services.model,
            &proposal_prompt(&job, responsibilities, catalog),
            &proposal_schema(),
        )?;
        let proposed = reply.competencies.len();

        let mut candidates = catalog.clone();
        candidates.extend(
            reply
                .competencies
                .into_iter()
                .map(|proposal| generated(proposal, &mut taken)),
        );

        let set = scorer(ctx, &job.family).map_all(responsibilities, &candidates);
        let mapped: BTreeSet<&str> = set.mappings.iter().map(|m| m.competency_id.as_str()).collect();
        let (competencies, pool): (Vec<Competency>, Vec<Competency>) = candidates
            .iter()
            .cloned()
            .partition(|c| mapped.contains(c.id.as_str()));

        info!(
            candidates = candidates.len(),
            proposed,
            mapped = competencies.len(),
            mappings = set.mappings.len(),
            unmapped = set.unmapped.len(),
            rejected = set.rejected_pairs,
            "responsibilities mapped"
        );

        Ok(StagePayload::Map(MappingOutput {
            responsibility_ids: responsibilities.iter().map(|r| r.id.clone()).collect(),
            competencies,
            pool,
            mappings: set.mappings,
            unmapped: set.unmapped,
            rejected_pairs: set.rejected_pairs,
        }))
    }
}

/// A model proposal with a fresh `C-<slug>` id.
fn generated(proposal: ProposedCompetency, taken: &mut BTreeSet<String>) -> Competency {
    let slug = slugify(&proposal.name);
    let base = if slug.is_empty() {
        "C-competency".to_string()
    } else {
        format!("C-{slug}")
    };
    let mut id = base.clone();
    let mut suffix = 2;
    while taken.contains(&id) {
        id = format!("{base}-{suffix}");
        suffix += 1;
    }
    taken.insert(id.clone());

    Competency::new(
        id,
        proposal.name.trim(),
        proposal.definition.trim(),
        SourceTier::Generated,
    )
    .with_indicators(proposal.indicators)
    .with_tags(proposal.tags)
}
