//! The staged pipeline: stage contract, typed payloads, run state and the
//! orchestrator that sequences them.

mod clock;
mod context;
mod orchestrator;
mod payload;
mod stage;
pub mod stages;
mod state;

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::gates::GateResult;

pub use clock::{Clock, FixedClock, SystemClock};
pub use context::{PipelineInputs, Services, StageContext};
pub use orchestrator::{Orchestrator, run_batch};
pub use payload::{
    AuditOutput, BenchmarkEvidence, BenchmarkOutput, CustomizationOutput, ExtractionOutput,
    MappingOutput, RankingOutput, RemediationOutput, SCHEMA_VERSION, StagePayload,
};
pub use stage::{Precondition, Stage, StageId};
pub use state::{RunReport, RunState, RunStatus, SkippedStage, StageArtifact};

/// Raised when a gate blocks. Carries the gate result so callers can act
/// without re-running anything.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineFailure {
    pub run_id: String,
    pub stage: StageId,
    pub gate: GateResult,
}

impl PipelineFailure {
    #[must_use]
    pub fn blocking_rules(&self) -> Vec<&str> {
        self.gate.blocking().map(|f| f.rule.as_str()).collect()
    }

    #[must_use]
    pub fn diagnostics(&self) -> Value {
        json!({
            "run_id": self.run_id,
            "stage": self.stage,
            "blocking": self.gate.blocking().collect::<Vec<_>>(),
            "warnings": self.gate.warnings().collect::<Vec<_>>(),
        })
    }
}

impl fmt::Display for PipelineFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "pipeline halted at stage '{}': blocked by {}",
            self.stage,
            self.blocking_rules().join(", ")
        )?;
        for finding in self.gate.blocking() {
            write!(
                f,
                "\n  - {} [{}]: {} (observed {}, threshold {})",
                finding.rule, finding.severity, finding.message, finding.observed, finding.threshold
            )?;
            if !finding.details.is_empty() {
                write!(f, " [{}]", finding.details.join(", "))?;
            }
        }
        Ok(())
    }
}
