//! Attach supporting evidence from the document store. Advisory only.

use tracing::info;

use crate::docstore::SearchFilters;
use crate::error::Result;
use crate::pipeline::context::StageContext;
use crate::pipeline::payload::{BenchmarkEvidence, BenchmarkOutput, StagePayload};
use crate::pipeline::stage::{Precondition, Stage, StageId};

pub struct BenchmarkStage;

impl Stage for BenchmarkStage {
    fn id(&self) -> StageId {
        StageId::Benchmark
    }

    fn precondition(&self, ctx: &StageContext<'_>) -> Precondition {
        if ctx.services.docs.is_empty() {
            Precondition::Skip("document store is empty".to_string())
        } else {
            Precondition::Ready
        }
    }

    fn execute(&self, ctx: &StageContext<'_>) -> Result<StagePayload> {
        let filters = SearchFilters::default().with_limit(ctx.config.pipeline.benchmark_snippets);
        let mut evidence = Vec::new();
        for competency in ctx.state.active_competencies() {
            let query = competency.summary_text();
            let snippets = ctx.services.docs.search(&query, &filters)?;
            evidence.push(BenchmarkEvidence {
                competency_id: competency.id.clone(),
                query,
                snippets,
            });
        }
        info!(
            competencies = evidence.len(),
            with_snippets = evidence.iter().filter(|e| !e.snippets.is_empty()).count(),
            "benchmark evidence gathered"
        );
        Ok(StagePayload::Benchmark(BenchmarkOutput { evidence }))
    }
}
