//! The accumulated run record and its artifacts.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::payload::{BenchmarkEvidence, RankingOutput, StagePayload};
use super::stage::StageId;
use crate::core::{Competency, JobProfile, Mapping, OverlapFinding, Responsibility};
use crate::error::{CmError, Result};
use crate::gates::{GateResult, GateStatus};
use crate::overlap::FindingLedger;
use crate::ranking::{RankedList, Selection};

/// One stage's committed output. Append-only; a resumed run marks later
/// artifacts superseded instead of deleting them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageArtifact {
    pub stage_name: StageId,
    /// 1 for the first artifact of this stage in the run, +1 per re-run.
    pub version: u32,
    pub schema_version: u32,
    pub timestamp: DateTime<Utc>,
    pub payload: StagePayload,
    pub gate_result: GateResult,
    #[serde(default)]
    pub superseded: bool,
}

impl StageArtifact {
    /// Whether this artifact's payload is part of the run state.
    #[must_use]
    pub fn is_committed(&self) -> bool {
        !self.superseded && self.gate_result.status != GateStatus::Block
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedStage {
    pub stage: StageId,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Completed,
    /// A gate blocked.
    Halted { stage: StageId },
    /// A stage raised before producing output.
    Failed { stage: StageId, message: String },
}

impl RunStatus {
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Halted { .. } => "halted",
            Self::Failed { .. } => "failed",
        }
    }
}

/// Everything produced so far, owned by the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunState {
    pub run_id: String,
    pub job: Option<JobProfile>,
    pub responsibilities: Vec<Responsibility>,
    /// Competencies in the run, including superseded ones.
    pub competencies: Vec<Competency>,
    /// Candidates that mapped nothing; available for replacement.
    pub pool: Vec<Competency>,
    pub mappings: Vec<Mapping>,
    pub findings: FindingLedger,
    pub evidence: Vec<BenchmarkEvidence>,
    pub ranking: Option<RankingOutput>,
    pub artifacts: Vec<StageArtifact>,
    pub skipped: Vec<SkippedStage>,
    pub status: RunStatus,
}

impl RunState {
    #[must_use]
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            job: None,
            responsibilities: Vec::new(),
            competencies: Vec::new(),
            pool: Vec::new(),
            mappings: Vec::new(),
            findings: FindingLedger::new(),
            evidence: Vec::new(),
            ranking: None,
            artifacts: Vec::new(),
            skipped: Vec::new(),
            status: RunStatus::Running,
        }
    }

    /// Rebuild a state from persisted artifacts and skip records. Only
    /// committed artifacts are merged; the rest stay in the audit trail.
    pub fn replay(
        run_id: &str,
        artifacts: Vec<StageArtifact>,
        skipped: Vec<SkippedStage>,
    ) -> Result<Self> {
        let mut state = Self::new(run_id);
        let mut last: Option<StageId> = None;
        for artifact in artifacts {
            if artifact.is_committed() {
                if last.is_some_and(|prev| prev >= artifact.stage_name) {
                    return Err(CmError::IntegrityViolation(format!(
                        "artifact for {} is out of stage order",
                        artifact.stage_name
                    )));
                }
                last = Some(artifact.stage_name);
                state.apply(&artifact.payload)?;
            }
            state.artifacts.push(artifact);
        }
        state.skipped = skipped;
        Ok(state)
    }

    /// Merge a gated payload. Validates first so a rejected payload leaves
    /// the state untouched.
    pub(crate) fn apply(&mut self, payload: &StagePayload) -> Result<()> {
        let mut next = self.clone();
        match payload {
            StagePayload::Extract(out) => {
                if !next.responsibilities.is_empty() {
                    return Err(CmError::IntegrityViolation(
                        "responsibilities are already extracted for this run".into(),
                    ));
                }
                next.job = Some(out.job.clone());
                next.responsibilities = out.responsibilities.clone();
            }
            StagePayload::Map(out) => {
                next.competencies = out.competencies.clone();
                next.pool = out.pool.clone();
                next.mappings = out.mappings.clone();
            }
            StagePayload::Customize(out) => {
                for revision in &out.revisions {
                    let Some(slot) = next.competencies.iter_mut().find(|c| c.id == revision.id)
                    else {
                        return Err(CmError::IntegrityViolation(format!(
                            "revision for unknown competency {}",
                            revision.id
                        )));
                    };
                    if revision.version <= slot.version {
                        return Err(CmError::IntegrityViolation(format!(
                            "revision of {} does not advance its version",
                            revision.id
                        )));
                    }
                    *slot = revision.clone();
                }
                next.mappings = out.mappings.clone();
            }
            StagePayload::Benchmark(out) => next.evidence = out.evidence.clone(),
            StagePayload::Audit(out) => next.findings.record(out.findings.iter().cloned()),
            StagePayload::Remediate(out) => {
                next.competencies = out.competencies.clone();
                next.mappings = out.mappings.clone();
                next.findings = FindingLedger::from_findings(out.findings.clone());
                let in_run: BTreeSet<&str> =
                    out.competencies.iter().map(|c| c.id.as_str()).collect();
                next.pool.retain(|c| !in_run.contains(c.id.as_str()));
            }
            StagePayload::Rank(out) => next.ranking = Some(out.clone()),
        }
        next.check_references()?;
        *self = next;
        Ok(())
    }

    fn check_references(&self) -> Result<()> {
        let responsibilities: BTreeSet<&str> =
            self.responsibilities.iter().map(|r| r.id.as_str()).collect();
        let competencies: BTreeSet<&str> = self.competencies.iter().map(|c| c.id.as_str()).collect();
        if let Some(dangling) = self.mappings.iter().find(|m| {
            !responsibilities.contains(m.responsibility_id.as_str())
                || !competencies.contains(m.competency_id.as_str())
        }) {
            return Err(CmError::IntegrityViolation(format!(
                "mapping {} -> {} references an unknown id",
                dangling.responsibility_id, dangling.competency_id
            )));
        }
        Ok(())
    }

    /// Version number for the next artifact of `stage`.
    #[must_use]
    pub fn next_version(&self, stage: StageId) -> u32 {
        self.artifacts
            .iter()
            .filter(|a| a.stage_name == stage)
            .map(|a| a.version)
            .max()
            .unwrap_or(0)
            + 1
    }

    /// Stages with a committed artifact or a skip record.
    #[must_use]
    pub fn settled_stages(&self) -> BTreeSet<StageId> {
        self.artifacts
            .iter()
            .filter(|a| a.is_committed())
            .map(|a| a.stage_name)
            .chain(self.skipped.iter().map(|s| s.stage))
            .collect()
    }

    pub fn active_competencies(&self) -> impl Iterator<Item = &Competency> {
        self.competencies.iter().filter(|c| c.is_active())
    }

    /// Gate results of committed and halted artifacts, in order.
    #[must_use]
    pub fn gate_results(&self) -> Vec<&GateResult> {
        self.artifacts
            .iter()
            .filter(|a| !a.superseded)
            .map(|a| &a.gate_result)
            .collect()
    }

    /// Payload for a renderer.
    #[must_use]
    pub fn report(&self) -> RunReport {
        let (selection, ranked) = match &self.ranking {
            Some(out) => (Some(out.selection.clone()), Some(out.ranked.clone())),
            None => (None, None),
        };
        let gaps = selection
            .as_ref()
            .map(|s| s.gaps.clone())
            .unwrap_or_default();
        RunReport {
            run_id: self.run_id.clone(),
            status: self.status.clone(),
            job: self.job.clone(),
            selection,
            ranked,
            competencies: self.competencies.clone(),
            mappings: self.mappings.clone(),
            findings: self.findings.all().to_vec(),
            evidence: self.evidence.clone(),
            gaps,
            gates: self.gate_results().into_iter().cloned().collect(),
            skipped: self.skipped.clone(),
        }
    }
}

/// Everything a renderer needs; no file format is assumed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: String,
    pub status: RunStatus,
    pub job: Option<JobProfile>,
    pub selection: Option<Selection>,
    pub ranked: Option<RankedList>,
    pub competencies: Vec<Competency>,
    pub mappings: Vec<Mapping>,
    /// Every finding, active and superseded.
    pub findings: Vec<OverlapFinding>,
    pub evidence: Vec<BenchmarkEvidence>,
    pub gaps: Vec<String>,
    pub gates: Vec<GateResult>,
    pub skipped: Vec<SkippedStage>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{
        Category, Contribution, Importance, ScoreBreakdown, SourceTier,
    };
    use crate::pipeline::{CustomizationOutput, ExtractionOutput, MappingOutput};

    fn extraction() -> StagePayload {
        StagePayload::Extract(ExtractionOutput {
            job: JobProfile {
                title: "SRE".into(),
                family: "engineering".into(),
                level: String::new(),
                summary: String::new(),
            },
            responsibilities: vec![Responsibility {
                id: "R01".into(),
                raw_text: "Run on-call".into(),
                normalized_text: "run on-call".into(),
                category: Category::Operational,
                importance: Importance::High,
            }],
        })
    }

    fn mapping(r: &str, c: &str) -> Mapping {
        Mapping {
            responsibility_id: r.into(),
            competency_id: c.into(),
            relevance_score: 0.9,
            contribution: Contribution::Primary,
            score_breakdown: ScoreBreakdown {
                semantic: 0.9,
                lexical: 0.9,
                contextual: 0.9,
            },
        }
    }

    fn map_payload(mappings: Vec<Mapping>) -> StagePayload {
        StagePayload::Map(MappingOutput {
            responsibility_ids: vec!["R01".into()],
            competencies: vec![Competency::new("C1", "On-call", "d", SourceTier::Catalog)],
            mappings,
            ..MappingOutput::default()
        })
    }

    #[test]
    fn apply_rejects_dangling_mapping_without_partial_write() {
        let mut state = RunState::new("run");
        state.apply(&extraction()).unwrap();
        let err = state
            .apply(&map_payload(vec![mapping("R99", "C1")]))
            .unwrap_err();
        assert!(matches!(err, CmError::IntegrityViolation(_)));
        assert!(state.competencies.is_empty());
        assert!(state.mappings.is_empty());
    }

    #[test]
    fn responsibilities_cannot_be_re_extracted() {
        let mut state = RunState::new("run");
        state.apply(&extraction()).unwrap();
        assert!(state.apply(&extraction()).is_err());
        assert_eq!(state.responsibilities.len(), 1);
    }

    #[test]
    fn customize_requires_version_bump() {
        let mut state = RunState::new("run");
        state.apply(&extraction()).unwrap();
        state.apply(&map_payload(vec![mapping("R01", "C1")])).unwrap();

        let same_version = Competency::new("C1", "On-call", "new", SourceTier::Catalog);
        let payload = StagePayload::Customize(CustomizationOutput {
            revisions: vec![same_version.clone()],
            mappings: vec![mapping("R01", "C1")],
            untailored: Vec::new(),
        });
        assert!(state.apply(&payload).is_err());

        let bumped = same_version.revised("new".into(), Vec::new());
        let payload = StagePayload::Customize(CustomizationOutput {
            revisions: vec![bumped],
            mappings: vec![mapping("R01", "C1")],
            untailored: Vec::new(),
        });
        state.apply(&payload).unwrap();
        assert_eq!(state.competencies[0].version, 2);
        assert_eq!(state.competencies[0].definition, "new");
    }

    #[test]
    fn next_version_counts_superseded_artifacts() {
        let mut state = RunState::new("run");
        let gate = GateResult {
            stage: StageId::Extract,
            status: GateStatus::Pass,
            findings: Vec::new(),
        };
        state.artifacts.push(StageArtifact {
            stage_name: StageId::Extract,
            version: 1,
            schema_version: 1,
            timestamp: Utc::now(),
            payload: extraction(),
            gate_result: gate,
            superseded: true,
        });
        assert_eq!(state.next_version(StageId::Extract), 2);
        assert_eq!(state.next_version(StageId::Map), 1);
        assert!(state.settled_stages().is_empty());
    }
}
