//! Typed stage outputs.
//!
//! Every stage returns one variant of [`StagePayload`]; persisted
//! artifacts store it as `{"stage": "...", "data": {...}}` so a payload
//! can never be read back as the wrong stage's output.

use serde::{Deserialize, Serialize};

use super::stage::StageId;
use crate::core::{Competency, JobProfile, Mapping, OverlapFinding, Responsibility};
use crate::docstore::Snippet;
use crate::overlap::RemediationOutcome;
use crate::ranking::{RankedList, Selection};

/// Bumped whenever a payload shape changes incompatibly.
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stage", content = "data", rename_all = "snake_case")]
pub enum StagePayload {
    Extract(ExtractionOutput),
    Map(MappingOutput),
    Customize(CustomizationOutput),
    Benchmark(BenchmarkOutput),
    Audit(AuditOutput),
    Remediate(RemediationOutput),
    Rank(RankingOutput),
}

impl StagePayload {
    #[must_use]
    pub const fn stage(&self) -> StageId {
        match self {
            Self::Extract(_) => StageId::Extract,
            Self::Map(_) => StageId::Map,
            Self::Customize(_) => StageId::Customize,
            Self::Benchmark(_) => StageId::Benchmark,
            Self::Audit(_) => StageId::Audit,
            Self::Remediate(_) => StageId::Remediate,
            Self::Rank(_) => StageId::Rank,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionOutput {
    pub job: JobProfile,
    pub responsibilities: Vec<Responsibility>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MappingOutput {
    /// Responsibility ids known when mapping ran.
    pub responsibility_ids: Vec<String>,
    /// Candidates with at least one retained mapping.
    pub competencies: Vec<Competency>,
    /// Candidates with no retained mapping; the pool for replacements.
    pub pool: Vec<Competency>,
    pub mappings: Vec<Mapping>,
    pub unmapped: Vec<String>,
    pub rejected_pairs: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomizationOutput {
    /// New versions of rewritten competencies.
    pub revisions: Vec<Competency>,
    /// Mapping table after re-scoring the revised competencies.
    pub mappings: Vec<Mapping>,
    /// Mapped competencies left unrevised with an indicator count outside
    /// the configured range.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub untailored: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkEvidence {
    pub competency_id: String,
    pub query: String,
    pub snippets: Vec<Snippet>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkOutput {
    pub evidence: Vec<BenchmarkEvidence>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuditOutput {
    /// One finding per active competency and protected reference.
    pub findings: Vec<OverlapFinding>,
    pub material: usize,
    pub minor: usize,
}

pub type RemediationOutput = RemediationOutcome;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingOutput {
    pub ranked: RankedList,
    pub selection: Selection,
    pub total_responsibilities: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_serializes_as_tagged_union() {
        let payload = StagePayload::Benchmark(BenchmarkOutput::default());
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["stage"], "benchmark");
        assert!(json["data"]["evidence"].as_array().unwrap().is_empty());

        let back: StagePayload = serde_json::from_value(json).unwrap();
        assert_eq!(back.stage(), StageId::Benchmark);
    }

    #[test]
    fn mismatched_tag_fails_to_parse() {
        let raw = serde_json::json!({"stage": "audit", "data": {"evidence": []}});
        assert!(serde_json::from_value::<StagePayload>(raw).is_err());
    }
}
