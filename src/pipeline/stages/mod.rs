//! The seven pipeline stages, in execution order.

mod audit;
mod benchmark;
mod customize;
mod extract;
mod map;
mod rank;
mod remediate;

pub use audit::AuditStage;
pub use benchmark::BenchmarkStage;
pub use customize::CustomizeStage;
pub use extract::ExtractStage;
pub use map::MapStage;
pub use rank::RankStage;
pub use remediate::RemediateStage;

use super::context::StageContext;
use super::stage::Stage;
use crate::scoring::RelevanceScorer;

/// Every stage in [`StageId::ALL`](super::StageId::ALL) order.
#[must_use]
pub fn default_stages() -> Vec<Box<dyn Stage>> {
    vec![
        Box::new(ExtractStage),
        Box::new(MapStage),
        Box::new(CustomizeStage),
        Box::new(BenchmarkStage),
        Box::new(AuditStage),
        Box::new(RemediateStage),
        Box::new(RankStage),
    ]
}

/// Scorer configured for the run's job family.
fn scorer<'c>(ctx: &StageContext<'c>, family: &str) -> RelevanceScorer<'c> {
    RelevanceScorer::new(&ctx.config.scoring, ctx.services.similarity).with_family(family)
}
