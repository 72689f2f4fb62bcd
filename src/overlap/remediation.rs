//! Remediation of overlap findings: REMOVE, REVISE or REPLACE.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{FindingLedger, OverlapDetector};
use crate::core::{Competency, Mapping, OverlapClass, OverlapFinding, Responsibility};
use crate::error::{CmError, Result};
use crate::ranking::coverage_of;
use crate::scoring::RelevanceScorer;
use crate::similarity::technical_terms;

const PLAN_TASK: &str = "plan_remediation";
const DEFAULT_INDICATOR_RANGE: (usize, usize) = (3, 7);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RemediationAction {
    Remove,
    Revise,
    Replace,
    /// Carry the finding forward with its suggestion.
    Keep,
}

impl RemediationAction {
    /// Applied when the plan does not mention a finding.
    #[must_use]
    pub const fn default_for(classification: OverlapClass) -> Self {
        match classification {
            OverlapClass::Material => Self::Revise,
            OverlapClass::Minor | OverlapClass::None => Self::Keep,
        }
    }

    const fn strength(self) -> u8 {
        match self {
            Self::Keep => 0,
            Self::Revise => 1,
            Self::Replace => 2,
            Self::Remove => 3,
        }
    }
}

/// The plan's decision for one finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemediationDecision {
    pub finding_id: String,
    pub action: RemediationAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indicators: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replacement_id: Option<String>,
    #[serde(default)]
    pub rationale: String,
}

/// What was done to one competency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedDecision {
    pub competency_id: String,
    pub finding_ids: Vec<String>,
    pub action: RemediationAction,
    /// No plan entry covered these findings.
    pub defaulted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replacement_id: Option<String>,
    pub rationale: String,
}

/// Full state after remediation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemediationOutcome {
    pub decisions: Vec<AppliedDecision>,
    pub competencies: Vec<Competency>,
    pub findings: Vec<OverlapFinding>,
    pub mappings: Vec<Mapping>,
    pub superseded_findings: Vec<String>,
    pub withdrawn_findings: Vec<String>,
    pub coverage_after: f32,
    pub uncovered: Vec<String>,
}

/// Everything remediation reads.
pub struct RemediationInput<'i> {
    pub responsibilities: &'i [Responsibility],
    pub competencies: &'i [Competency],
    pub mappings: &'i [Mapping],
    pub ledger: &'i FindingLedger,
    pub protected: &'i [Competency],
    /// Candidates not currently in the run, for REPLACE.
    pub pool: &'i [Competency],
    pub decisions: &'i [RemediationDecision],
}

pub struct Remediator<'a> {
    detector: OverlapDetector<'a>,
    scorer: RelevanceScorer<'a>,
    /// Inclusive bounds on the indicator count of any competency this
    /// remediator writes or brings in.
    indicators: (usize, usize),
}

impl<'a> Remediator<'a> {
    pub const fn new(detector: OverlapDetector<'a>, scorer: RelevanceScorer<'a>) -> Self {
        Self {
            detector,
            scorer,
            indicators: DEFAULT_INDICATOR_RANGE,
        }
    }

    #[must_use]
    pub const fn with_indicator_range(mut self, min: usize, max: usize) -> Self {
        self.indicators = (min, max);
        self
    }

    const fn indicators_in_range(&self, count: usize) -> bool {
        count >= self.indicators.0 && count <= self.indicators.1
    }

    /// Apply the plan to every competency with an active MINOR or
    /// MATERIAL finding. Plan entries naming unknown findings, and
    /// revisions that would leave the indicator count out of range, are
    /// rejected as a malformed reply.
    pub fn apply(&self, input: &RemediationInput<'_>) -> Result<RemediationOutcome> {
        for (index, decision) in input.decisions.iter().enumerate() {
            let Some(finding) = input
                .ledger
                .get(&decision.finding_id)
                .filter(|f| f.is_active())
            else {
                return Err(CmError::MalformedReply {
                    task: PLAN_TASK.to_string(),
                    path: format!("/decisions/{index}/finding_id"),
                    reason: format!("no active finding '{}'", decision.finding_id),
                });
            };
            self.check_revision(index, decision, &finding.competency_id, input.competencies)?;
        }

        let mut competencies = input.competencies.to_vec();
        let mut ledger = input.ledger.clone();
        let mut mappings = input.mappings.to_vec();
        let mut outcome = RemediationOutcome::default();
        let mut used_pool: BTreeSet<String> = BTreeSet::new();

        for index in 0..competencies.len() {
            let competency = competencies[index].clone();
            if !competency.is_active() {
                continue;
            }
            let flagged: Vec<OverlapFinding> = ledger
                .active_for(&competency.id)
                .filter(|f| f.needs_attention())
                .cloned()
                .collect();
            if flagged.is_empty() {
                continue;
            }

            let (action, decision, defaulted) = consolidate(&flagged, input.decisions);
            let finding_ids: Vec<String> = flagged.iter().map(|f| f.id.clone()).collect();
            let rationale = decision.map(|d| d.rationale.clone()).unwrap_or_default();
            debug!(competency = %competency.id, ?action, defaulted, "remediation decision");

            let mapped: Vec<&Responsibility> = responsibilities_of(
                input.responsibilities,
                &mappings,
                &competency.id,
            );

            let applied = match action {
                RemediationAction::Keep => AppliedDecision {
                    competency_id: competency.id.clone(),
                    finding_ids,
                    action,
                    defaulted,
                    replacement_id: None,
                    rationale: if rationale.is_empty() {
                        "kept with suggestion".to_string()
                    } else {
                        rationale
                    },
                },
                RemediationAction::Revise => {
                    let references = references_of(&flagged, input.protected);
                    let rewrite = decision
                        .and_then(|d| d.definition.clone())
                        .filter(|d| !d.trim().is_empty())
                        .map(|definition| {
                            let indicators = decision
                                .and_then(|d| d.indicators.as_deref())
                                .map_or_else(|| competency.indicators.clone(), clean_indicators);
                            (definition, indicators)
                        })
                        .or_else(|| narrow_definition(&competency, &references, self.indicators));

                    if let Some((definition, indicators)) = rewrite {
                        let revised = competency.revised(definition, indicators);
                        outcome
                            .superseded_findings
                            .extend(ledger.supersede_for(&revised.id, revised.version));
                        ledger.record(self.detector.detect(&revised, input.protected));

                        mappings.retain(|m| m.competency_id != revised.id);
                        mappings.extend(self.scorer.map_competency(&mapped, &revised));
                        competencies[index] = revised;

                        AppliedDecision {
                            competency_id: competency.id.clone(),
                            finding_ids,
                            action,
                            defaulted,
                            replacement_id: None,
                            rationale: if rationale.is_empty() {
                                "narrowed scope away from protected references".to_string()
                            } else {
                                rationale
                            },
                        }
                    } else {
                        remove_competency(
                            &mut competencies[index],
                            &mut ledger,
                            &mut mappings,
                            &mut outcome.withdrawn_findings,
                            finding_ids,
                            defaulted,
                            "revision left no distinct scope".to_string(),
                        )
                    }
                }
                RemediationAction::Replace => {
                    let requested = decision.and_then(|d| d.replacement_id.as_deref());
                    match self.pick_replacement(
                        input,
                        &competencies,
                        &used_pool,
                        &mapped,
                        requested,
                    ) {
                        Some(replacement) => {
                            used_pool.insert(replacement.id.clone());
                            outcome
                                .withdrawn_findings
                                .extend(ledger.withdraw_for(&competency.id));
                            competencies[index].supersede(
                                "replaced after overlap review",
                                Some(replacement.id.clone()),
                            );
                            mappings.retain(|m| m.competency_id != competency.id);
                            mappings.extend(self.scorer.map_competency(&mapped, &replacement));
                            ledger.record(self.detector.detect(&replacement, input.protected));
                            let replacement_id = replacement.id.clone();
                            competencies.push(replacement);

                            AppliedDecision {
                                competency_id: competency.id.clone(),
                                finding_ids,
                                action,
                                defaulted,
                                replacement_id: Some(replacement_id),
                                rationale,
                            }
                        }
                        None => remove_competency(
                            &mut competencies[index],
                            &mut ledger,
                            &mut mappings,
                            &mut outcome.withdrawn_findings,
                            finding_ids,
                            defaulted,
                            "no viable replacement candidate".to_string(),
                        ),
                    }
                }
                RemediationAction::Remove => remove_competency(
                    &mut competencies[index],
                    &mut ledger,
                    &mut mappings,
                    &mut outcome.withdrawn_findings,
                    finding_ids,
                    defaulted,
                    rationale,
                ),
            };
            outcome.decisions.push(applied);
        }

        let active: BTreeSet<&str> = competencies
            .iter()
            .filter(|c| c.is_active())
            .map(|c| c.id.as_str())
            .collect();
        let (coverage, uncovered) = coverage_of(input.responsibilities, &mappings, &active);
        info!(
            decisions = outcome.decisions.len(),
            coverage_after = coverage,
            "remediation applied"
        );

        outcome.coverage_after = coverage;
        outcome.uncovered = uncovered;
        outcome.competencies = competencies;
        outcome.findings = ledger.all().to_vec();
        outcome.mappings = mappings;
        Ok(outcome)
    }

    /// A REVISE entry with a definition must leave the competency with an
    /// in-range indicator list, whether it supplies one or keeps the old.
    fn check_revision(
        &self,
        index: usize,
        decision: &RemediationDecision,
        competency_id: &str,
        competencies: &[Competency],
    ) -> Result<()> {
        if decision.action != RemediationAction::Revise
            || decision.definition.as_deref().is_none_or(|d| d.trim().is_empty())
        {
            return Ok(());
        }
        let count = match decision.indicators.as_deref() {
            Some(indicators) => clean_indicators(indicators).len(),
            None => competencies
                .iter()
                .find(|c| c.id == competency_id)
                .map_or(0, |c| c.indicators.len()),
        };
        if self.indicators_in_range(count) {
            return Ok(());
        }
        Err(CmError::MalformedReply {
            task: PLAN_TASK.to_string(),
            path: format!("/decisions/{index}/indicators"),
            reason: format!(
                "revision of '{competency_id}' leaves {count} indicators, expected {} to {}",
                self.indicators.0, self.indicators.1
            ),
        })
    }

    /// The requested candidate, or the unused pool candidate with the
    /// highest total relevance over the original's responsibilities that
    /// does not itself overlap materially. Candidates whose indicator count
    /// is out of range are never picked. Ties keep pool order.
    fn pick_replacement(
        &self,
        input: &RemediationInput<'_>,
        competencies: &[Competency],
        used: &BTreeSet<String>,
        mapped: &[&Responsibility],
        requested: Option<&str>,
    ) -> Option<Competency> {
        let available = input.pool.iter().filter(|candidate| {
            candidate.is_active()
                && self.indicators_in_range(candidate.indicators.len())
                && !used.contains(&candidate.id)
                && !competencies.iter().any(|c| c.id == candidate.id)
        });

        let viable = |candidate: &Competency| -> Option<f32> {
            let overlaps = self
                .detector
                .detect(candidate, input.protected)
                .iter()
                .any(|f| f.classification == OverlapClass::Material);
            if overlaps {
                return None;
            }
            let new_mappings = self.scorer.map_competency(mapped, candidate);
            if new_mappings.is_empty() {
                return None;
            }
            Some(new_mappings.iter().map(|m| m.relevance_score).sum())
        };

        if let Some(id) = requested {
            return available
                .clone()
                .find(|c| c.id == id)
                .filter(|c| viable(c).is_some())
                .cloned();
        }

        let mut best: Option<(&Competency, f32)> = None;
        for candidate in available {
            if let Some(total) = viable(candidate) {
                if best.is_none_or(|(_, current)| total > current) {
                    best = Some((candidate, total));
                }
            }
        }
        best.map(|(candidate, _)| candidate.clone())
    }
}

/// The strongest action across a competency's flagged findings. Findings
/// the plan does not mention fall back to [`RemediationAction::default_for`].
fn consolidate<'d>(
    flagged: &[OverlapFinding],
    decisions: &'d [RemediationDecision],
) -> (RemediationAction, Option<&'d RemediationDecision>, bool) {
    let mut action = RemediationAction::Keep;
    let mut chosen: Option<&RemediationDecision> = None;
    let mut defaulted = true;

    for finding in flagged {
        let decision = decisions.iter().find(|d| d.finding_id == finding.id);
        let candidate = decision.map_or_else(
            || RemediationAction::default_for(finding.classification),
            |d| d.action,
        );
        if decision.is_some() {
            defaulted = false;
        }
        let stronger = candidate.strength() > action.strength();
        let same_but_explicit =
            candidate.strength() == action.strength() && chosen.is_none() && decision.is_some();
        if stronger || same_but_explicit {
            action = candidate;
            chosen = decision;
        }
    }
    (action, chosen, defaulted)
}

fn remove_competency(
    competency: &mut Competency,
    ledger: &mut FindingLedger,
    mappings: &mut Vec<Mapping>,
    withdrawn: &mut Vec<String>,
    finding_ids: Vec<String>,
    defaulted: bool,
    rationale: String,
) -> AppliedDecision {
    withdrawn.extend(ledger.withdraw_for(&competency.id));
    competency.supersede("removed after overlap review", None);
    mappings.retain(|m| m.competency_id != competency.id);
    AppliedDecision {
        competency_id: competency.id.clone(),
        finding_ids,
        action: RemediationAction::Remove,
        defaulted,
        replacement_id: None,
        rationale,
    }
}

fn responsibilities_of<'r>(
    responsibilities: &'r [Responsibility],
    mappings: &[Mapping],
    competency_id: &str,
) -> Vec<&'r Responsibility> {
    responsibilities
        .iter()
        .filter(|r| {
            mappings
                .iter()
                .any(|m| m.competency_id == competency_id && m.responsibility_id == r.id)
        })
        .collect()
}

fn clean_indicators(indicators: &[String]) -> Vec<String> {
    indicators
        .iter()
        .map(|i| i.trim().to_string())
        .filter(|i| !i.is_empty())
        .collect()
}

fn references_of<'p>(flagged: &[OverlapFinding], protected: &'p [Competency]) -> Vec<&'p Competency> {
    protected
        .iter()
        .filter(|p| flagged.iter().any(|f| f.reference_id == p.id))
        .collect()
}

/// Drop definition words and indicators that share terms with the
/// overlapping references. `None` when the definition has nothing distinct
/// left or fewer than `range.0` distinct indicators remain; at most
/// `range.1` are kept.
#[must_use]
pub fn narrow_definition(
    competency: &Competency,
    references: &[&Competency],
    range: (usize, usize),
) -> Option<(String, Vec<String>)> {
    let shared: BTreeSet<String> = references
        .iter()
        .flat_map(|r| technical_terms(&r.profile_text()))
        .filter(|term| !term.contains(' '))
        .collect();

    let definition = competency
        .definition
        .split_whitespace()
        .filter(|word| {
            let bare: String = word
                .chars()
                .filter(|c| c.is_alphanumeric())
                .collect::<String>()
                .to_lowercase();
            !shared.contains(&bare)
        })
        .collect::<Vec<_>>()
        .join(" ");

    if technical_terms(&definition).is_empty() {
        return None;
    }

    let mut indicators: Vec<String> = competency
        .indicators
        .iter()
        .filter(|indicator| {
            let terms = technical_terms(indicator);
            let unigrams: Vec<&String> = terms.iter().filter(|t| !t.contains(' ')).collect();
            let overlapping = unigrams.iter().filter(|t| shared.contains(**t)).count();
            overlapping * 2 < unigrams.len().max(1)
        })
        .cloned()
        .collect();
    if indicators.len() < range.0 {
        return None;
    }
    indicators.truncate(range.1);

    Some((definition, indicators))
}
