//! Rank active competencies and grow the selection to the coverage target.

use tracing::info;

use crate::core::Competency;
use crate::error::Result;
use crate::pipeline::context::StageContext;
use crate::pipeline::payload::{RankingOutput, StagePayload};
use crate::pipeline::stage::{Stage, StageId};
use crate::ranking::CriticalityRanker;

pub struct RankStage;

impl Stage for RankStage {
    fn id(&self) -> StageId {
        StageId::Rank
    }

    fn execute(&self, ctx: &StageContext<'_>) -> Result<StagePayload> {
        let state = ctx.state;
        let ranking = &ctx.config.ranking;
        let ranker = CriticalityRanker::new(ranking);

        let active: Vec<Competency> = state.active_competencies().cloned().collect();
        let ranked = ranker.rank(&active, &state.mappings, &state.responsibilities);
        let selection = ranker.select(&ranked, &state.responsibilities, ranking.min_coverage);

        info!(
            ranked = ranked.len(),
            selected = selection.selected.len(),
            coverage = selection.coverage,
            target_met = selection.target_met,
            gaps = selection.gaps.len(),
            "competencies ranked"
        );
        Ok(StagePayload::Rank(RankingOutput {
            ranked,
            selection,
            total_responsibilities: state.responsibilities.len(),
        }))
    }
}
