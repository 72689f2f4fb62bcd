//! Compare active competencies against the protected reference set.

use tracing::info;

use crate::core::OverlapClass;
use crate::error::Result;
use crate::overlap::OverlapDetector;
use crate::pipeline::context::StageContext;
use crate::pipeline::payload::{AuditOutput, StagePayload};
use crate::pipeline::stage::{Precondition, Stage, StageId};

pub struct AuditStage;

impl Stage for AuditStage {
    fn id(&self) -> StageId {
        StageId::Audit
    }

    fn precondition(&self, ctx: &StageContext<'_>) -> Precondition {
        if ctx.inputs.protected.is_empty() {
            Precondition::Skip("protected reference set is empty".to_string())
        } else {
            Precondition::Ready
        }
    }

    fn execute(&self, ctx: &StageContext<'_>) -> Result<StagePayload> {
        let detector = OverlapDetector::new(&ctx.config.overlap, ctx.services.similarity);
        let findings = detector.detect_all(&ctx.state.competencies, &ctx.inputs.protected);
        let count = |class: OverlapClass| {
            findings
                .iter()
                .filter(|f| f.classification == class)
                .count()
        };
        let (material, minor) = (count(OverlapClass::Material), count(OverlapClass::Minor));
        info!(findings = findings.len(), material, minor, "overlap audited");
        Ok(StagePayload::Audit(AuditOutput {
            findings,
            material,
            minor,
        }))
    }
}
