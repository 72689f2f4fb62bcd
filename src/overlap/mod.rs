//! Overlap detection against the protected reference set.
//!
//! Similarity uses the same semantic primitive as relevance scoring and is
//! classified with an inclusive MINOR band:
//!
//! | similarity | class |
//! |---|---|
//! | `< minor_threshold` | NONE |
//! | `minor_threshold ..= material_threshold` | MINOR |
//! | `> material_threshold` | MATERIAL |
//!
//! Findings are keyed by competency version. The [`FindingLedger`] keeps
//! every finding ever recorded; rewriting a competency supersedes the
//! findings against its older versions instead of deleting them.

pub mod remediation;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::OverlapConfig;
use crate::core::{Competency, FindingStatus, OverlapClass, OverlapFinding};
use crate::similarity::Similarity;

pub use remediation::{
    AppliedDecision, RemediationAction, RemediationDecision, RemediationOutcome, Remediator,
};

pub struct OverlapDetector<'a> {
    config: &'a OverlapConfig,
    similarity: &'a dyn Similarity,
}

impl<'a> OverlapDetector<'a> {
    pub fn new(config: &'a OverlapConfig, similarity: &'a dyn Similarity) -> Self {
        Self { config, similarity }
    }

    #[must_use]
    pub fn classify(&self, similarity: f32) -> OverlapClass {
        if similarity < self.config.minor_threshold {
            OverlapClass::None
        } else if similarity > self.config.material_threshold {
            OverlapClass::Material
        } else {
            OverlapClass::Minor
        }
    }

    /// One finding per protected reference, NONE included, in reference
    /// order.
    #[must_use]
    pub fn detect(&self, competency: &Competency, protected: &[Competency]) -> Vec<OverlapFinding> {
        let text = competency.summary_text();
        protected
            .iter()
            .map(|reference| {
                let similarity = self
                    .similarity
                    .similarity(&text, &reference.summary_text())
                    .clamp(0.0, 1.0);
                let classification = self.classify(similarity);
                debug!(
                    competency = %competency.id,
                    version = competency.version,
                    reference = %reference.id,
                    similarity,
                    ?classification,
                    "overlap checked"
                );
                OverlapFinding {
                    id: OverlapFinding::finding_id(
                        &competency.id,
                        competency.version,
                        &reference.id,
                    ),
                    competency_id: competency.id.clone(),
                    competency_version: competency.version,
                    reference_id: reference.id.clone(),
                    similarity,
                    classification,
                    status: FindingStatus::Active,
                    suggestion: suggestion(classification, reference),
                }
            })
            .collect()
    }

    /// Findings for every active competency, in competency order.
    #[must_use]
    pub fn detect_all(
        &self,
        competencies: &[Competency],
        protected: &[Competency],
    ) -> Vec<OverlapFinding> {
        competencies
            .iter()
            .filter(|c| c.is_active())
            .flat_map(|c| self.detect(c, protected))
            .collect()
    }
}

fn suggestion(classification: OverlapClass, reference: &Competency) -> Option<String> {
    match classification {
        OverlapClass::None => None,
        OverlapClass::Minor => Some(format!(
            "narrow the definition away from '{}' where it mentions shared behaviors",
            reference.name
        )),
        OverlapClass::Material => Some(format!(
            "revise, replace or remove: substantially duplicates '{}'",
            reference.name
        )),
    }
}

/// Worst-case overlap state of one competency at its current version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    /// Checked at the current version; nothing above NONE.
    Clear,
    Minor,
    Material,
    /// An active finding targets an older version.
    Stale,
    /// Never checked at the current version.
    Unchecked,
}

/// Append-only record of overlap findings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FindingLedger {
    findings: Vec<OverlapFinding>,
}

impl FindingLedger {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            findings: Vec::new(),
        }
    }

    #[must_use]
    pub const fn from_findings(findings: Vec<OverlapFinding>) -> Self {
        Self { findings }
    }

    /// Record findings; a finding with an existing id replaces it in place.
    pub fn record(&mut self, findings: impl IntoIterator<Item = OverlapFinding>) {
        for finding in findings {
            if let Some(existing) = self.findings.iter_mut().find(|f| f.id == finding.id) {
                *existing = finding;
            } else {
                self.findings.push(finding);
            }
        }
    }

    /// Supersede every active finding against a version older than
    /// `new_version`. Returns the superseded ids.
    pub fn supersede_for(&mut self, competency_id: &str, new_version: u32) -> Vec<String> {
        let mut superseded = Vec::new();
        for finding in &mut self.findings {
            if finding.competency_id == competency_id
                && finding.is_active()
                && finding.competency_version < new_version
            {
                finding.status = FindingStatus::Superseded {
                    by_version: new_version,
                };
                superseded.push(finding.id.clone());
            }
        }
        superseded
    }

    /// Withdraw every active finding of a removed or replaced competency.
    pub fn withdraw_for(&mut self, competency_id: &str) -> Vec<String> {
        let mut withdrawn = Vec::new();
        for finding in &mut self.findings {
            if finding.competency_id == competency_id && finding.is_active() {
                finding.status = FindingStatus::Withdrawn;
                withdrawn.push(finding.id.clone());
            }
        }
        withdrawn
    }

    pub fn active(&self) -> impl Iterator<Item = &OverlapFinding> {
        self.findings.iter().filter(|f| f.is_active())
    }

    pub fn active_for<'s>(
        &'s self,
        competency_id: &'s str,
    ) -> impl Iterator<Item = &'s OverlapFinding> + 's {
        self.active().filter(move |f| f.competency_id == competency_id)
    }

    #[must_use]
    pub fn all(&self) -> &[OverlapFinding] {
        &self.findings
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&OverlapFinding> {
        self.findings.iter().find(|f| f.id == id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.findings.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.findings.is_empty()
    }

    /// Active findings whose version no longer matches the competency.
    /// Findings for unknown competencies are stale as well.
    #[must_use]
    pub fn stale<'s>(&'s self, competencies: &[Competency]) -> Vec<&'s OverlapFinding> {
        self.active()
            .filter(|finding| {
                competencies
                    .iter()
                    .find(|c| c.id == finding.competency_id)
                    .is_none_or(|c| c.version != finding.competency_version)
            })
            .collect()
    }

    /// Overlap state of `competency` at its current version. A MATERIAL
    /// finding is never reported resolved unless it was recomputed.
    #[must_use]
    pub fn resolution(&self, competency: &Competency) -> Resolution {
        let mut checked = false;
        let mut worst = OverlapClass::None;
        for finding in self.active_for(&competency.id) {
            if finding.competency_version != competency.version {
                return Resolution::Stale;
            }
            checked = true;
            worst = worst.max(finding.classification);
        }
        if !checked {
            return Resolution::Unchecked;
        }
        match worst {
            OverlapClass::None => Resolution::Clear,
            OverlapClass::Minor => Resolution::Minor,
            OverlapClass::Material => Resolution::Material,
        }
    }
}
