//! Per-stage rule tables.

use std::collections::BTreeSet;

use serde_json::{Value, json};

use super::{GateThresholds, Severity};
use crate::core::{Competency, Contribution, OverlapClass};
use crate::overlap::{FindingLedger, RemediationAction};
use crate::pipeline::{StageId, StagePayload};

/// Raw result of a rule check, before severity is attached.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleCheck {
    pub passed: bool,
    pub observed: Value,
    pub threshold: Value,
    pub message: String,
    pub details: Vec<String>,
}

impl RuleCheck {
    fn new(passed: bool, observed: Value, threshold: Value, message: impl Into<String>) -> Self {
        Self {
            passed,
            observed,
            threshold,
            message: message.into(),
            details: Vec::new(),
        }
    }

    fn with_details(mut self, details: Vec<String>) -> Self {
        self.details = details;
        self
    }

    fn not_applicable(stage: StageId) -> Self {
        Self::new(
            true,
            Value::Null,
            Value::Null,
            format!("not applicable outside {stage}"),
        )
    }
}

pub type CheckFn = fn(&StagePayload, &GateThresholds) -> RuleCheck;

/// A named rule with its default severity.
#[derive(Debug, Clone, Copy)]
pub struct Rule {
    pub name: &'static str,
    pub stage: StageId,
    pub severity: Severity,
    pub blocking: bool,
    /// Guards traceability; always CRITICAL and blocking.
    pub integrity: bool,
    pub check: CheckFn,
}

const fn rule(
    name: &'static str,
    stage: StageId,
    severity: Severity,
    blocking: bool,
    integrity: bool,
    check: CheckFn,
) -> Rule {
    Rule {
        name,
        stage,
        severity,
        blocking,
        integrity,
        check,
    }
}

static RULES: &[Rule] = &[
    // extract
    rule("responsibilities-present", StageId::Extract, Severity::Critical, true, false, responsibilities_present),
    rule("responsibility-ids-unique", StageId::Extract, Severity::Critical, true, true, responsibility_ids_unique),
    rule("normalized-text-present", StageId::Extract, Severity::Error, true, false, normalized_text_present),
    // map
    rule("mapping-references-valid", StageId::Map, Severity::Critical, true, true, mapping_references_valid),
    rule("mapping-threshold-respected", StageId::Map, Severity::Critical, true, true, mapping_threshold_respected),
    rule("unmapped-responsibility-rate", StageId::Map, Severity::Error, true, false, unmapped_responsibility_rate),
    rule("unmapped-responsibility-present", StageId::Map, Severity::Warning, false, false, unmapped_responsibility_present),
    rule("competency-count-in-range", StageId::Map, Severity::Error, true, false, competency_count_in_range),
    rule("candidate-indicator-count", StageId::Map, Severity::Warning, false, false, candidate_indicator_count),
    // customize
    rule("indicator-count-in-range", StageId::Customize, Severity::Error, true, false, indicator_count_in_range),
    rule("definition-present", StageId::Customize, Severity::Error, true, false, definition_present),
    // benchmark
    rule("evidence-attached", StageId::Benchmark, Severity::Info, false, false, evidence_attached),
    // audit
    rule("material-overlap-detected", StageId::Audit, Severity::Warning, false, false, material_overlap_detected),
    rule("minor-overlap-detected", StageId::Audit, Severity::Info, false, false, minor_overlap_detected),
    // remediate
    rule("material-overlap-present", StageId::Remediate, Severity::Critical, true, false, material_overlap_present),
    rule("stale-finding-present", StageId::Remediate, Severity::Critical, true, true, stale_finding_present),
    rule("coverage-after-remediation", StageId::Remediate, Severity::Warning, false, false, coverage_after_remediation),
    rule("remediated-indicator-count", StageId::Remediate, Severity::Error, true, false, remediated_indicator_count),
    // rank
    rule("selection-size-in-range", StageId::Rank, Severity::Error, true, false, selection_size_in_range),
    rule("coverage-target-met", StageId::Rank, Severity::Warning, false, false, coverage_target_met),
    rule("responsibility-gap", StageId::Rank, Severity::Warning, false, false, responsibility_gap),
    rule("score-bounds", StageId::Rank, Severity::Critical, true, true, score_bounds),
];

/// Every rule, in stage then table order.
#[must_use]
pub fn all_rules() -> &'static [Rule] {
    RULES
}

pub fn rules_for(stage: StageId) -> impl Iterator<Item = &'static Rule> {
    RULES.iter().filter(move |rule| rule.stage == stage)
}

#[must_use]
pub fn find_rule(name: &str) -> Option<&'static Rule> {
    RULES.iter().find(|rule| rule.name == name)
}

#[allow(clippy::cast_precision_loss)]
fn rate(part: usize, whole: usize) -> f32 {
    if whole == 0 {
        0.0
    } else {
        part as f32 / whole as f32
    }
}

// ---------------------------------------------------------------- extract

fn responsibilities_present(payload: &StagePayload, _: &GateThresholds) -> RuleCheck {
    let StagePayload::Extract(out) = payload else {
        return RuleCheck::not_applicable(StageId::Extract);
    };
    let count = out.responsibilities.len();
    RuleCheck::new(
        count >= 1,
        json!(count),
        json!(1),
        format!("{count} responsibilities extracted"),
    )
}

fn responsibility_ids_unique(payload: &StagePayload, _: &GateThresholds) -> RuleCheck {
    let StagePayload::Extract(out) = payload else {
        return RuleCheck::not_applicable(StageId::Extract);
    };
    let mut seen = BTreeSet::new();
    let duplicates: Vec<String> = out
        .responsibilities
        .iter()
        .filter(|r| !seen.insert(r.id.as_str()))
        .map(|r| r.id.clone())
        .collect();
    RuleCheck::new(
        duplicates.is_empty(),
        json!(duplicates.len()),
        json!(0),
        format!("{} duplicate responsibility ids", duplicates.len()),
    )
    .with_details(duplicates)
}

fn normalized_text_present(payload: &StagePayload, _: &GateThresholds) -> RuleCheck {
    let StagePayload::Extract(out) = payload else {
        return RuleCheck::not_applicable(StageId::Extract);
    };
    let empty: Vec<String> = out
        .responsibilities
        .iter()
        .filter(|r| r.normalized_text.trim().is_empty())
        .map(|r| r.id.clone())
        .collect();
    RuleCheck::new(
        empty.is_empty(),
        json!(empty.len()),
        json!(0),
        format!("{} responsibilities normalize to empty text", empty.len()),
    )
    .with_details(empty)
}

// -------------------------------------------------------------------- map

fn mapping_references_valid(payload: &StagePayload, _: &GateThresholds) -> RuleCheck {
    let StagePayload::Map(out) = payload else {
        return RuleCheck::not_applicable(StageId::Map);
    };
    let responsibilities: BTreeSet<&str> =
        out.responsibility_ids.iter().map(String::as_str).collect();
    let competencies: BTreeSet<&str> = out.competencies.iter().map(|c| c.id.as_str()).collect();
    let dangling: Vec<String> = out
        .mappings
        .iter()
        .filter(|m| {
            !responsibilities.contains(m.responsibility_id.as_str())
                || !competencies.contains(m.competency_id.as_str())
        })
        .map(|m| format!("{} -> {}", m.responsibility_id, m.competency_id))
        .collect();
    RuleCheck::new(
        dangling.is_empty(),
        json!(dangling.len()),
        json!(0),
        format!("{} mappings reference unknown ids", dangling.len()),
    )
    .with_details(dangling)
}

fn mapping_threshold_respected(payload: &StagePayload, thresholds: &GateThresholds) -> RuleCheck {
    let StagePayload::Map(out) = payload else {
        return RuleCheck::not_applicable(StageId::Map);
    };
    let below: Vec<String> = out
        .mappings
        .iter()
        .filter(|m| {
            m.relevance_score < thresholds.min_relevance || m.contribution == Contribution::None
        })
        .map(|m| {
            format!(
                "{} -> {} ({:.3})",
                m.responsibility_id, m.competency_id, m.relevance_score
            )
        })
        .collect();
    RuleCheck::new(
        below.is_empty(),
        json!(below.len()),
        json!(thresholds.min_relevance),
        format!("{} mappings below the relevance threshold", below.len()),
    )
    .with_details(below)
}

fn unmapped_responsibility_rate(payload: &StagePayload, thresholds: &GateThresholds) -> RuleCheck {
    let StagePayload::Map(out) = payload else {
        return RuleCheck::not_applicable(StageId::Map);
    };
    let observed = rate(out.unmapped.len(), out.responsibility_ids.len());
    RuleCheck::new(
        observed <= thresholds.max_unmapped_rate,
        json!(observed),
        json!(thresholds.max_unmapped_rate),
        format!(
            "{} of {} responsibilities unmapped",
            out.unmapped.len(),
            out.responsibility_ids.len()
        ),
    )
    .with_details(out.unmapped.clone())
}

fn unmapped_responsibility_present(payload: &StagePayload, _: &GateThresholds) -> RuleCheck {
    let StagePayload::Map(out) = payload else {
        return RuleCheck::not_applicable(StageId::Map);
    };
    RuleCheck::new(
        out.unmapped.is_empty(),
        json!(out.unmapped.len()),
        json!(0),
        format!("{} responsibilities have no mapping", out.unmapped.len()),
    )
    .with_details(out.unmapped.clone())
}

fn competency_count_in_range(payload: &StagePayload, thresholds: &GateThresholds) -> RuleCheck {
    let StagePayload::Map(out) = payload else {
        return RuleCheck::not_applicable(StageId::Map);
    };
    let count = out.competencies.len();
    RuleCheck::new(
        count >= thresholds.min_count,
        json!(count),
        json!(thresholds.min_count),
        format!(
            "{count} mapped competencies (selection needs at least {})",
            thresholds.min_count
        ),
    )
}

/// `id (n indicators)` for each competency outside the indicator range.
fn outside_indicator_range<'c>(
    competencies: impl IntoIterator<Item = &'c Competency>,
    thresholds: &GateThresholds,
) -> Vec<String> {
    let range = thresholds.min_indicators..=thresholds.max_indicators;
    competencies
        .into_iter()
        .filter(|c| !range.contains(&c.indicators.len()))
        .map(|c| format!("{} ({} indicators)", c.id, c.indicators.len()))
        .collect()
}

/// Catalog entries and proposals are customized later, so this only warns.
fn candidate_indicator_count(payload: &StagePayload, thresholds: &GateThresholds) -> RuleCheck {
    let StagePayload::Map(out) = payload else {
        return RuleCheck::not_applicable(StageId::Map);
    };
    let outside = outside_indicator_range(&out.competencies, thresholds);
    RuleCheck::new(
        outside.is_empty(),
        json!(outside.len()),
        json!([thresholds.min_indicators, thresholds.max_indicators]),
        format!("{} mapped competencies outside the indicator range", outside.len()),
    )
    .with_details(outside)
}

// -------------------------------------------------------------- customize

fn indicator_count_in_range(payload: &StagePayload, thresholds: &GateThresholds) -> RuleCheck {
    let StagePayload::Customize(out) = payload else {
        return RuleCheck::not_applicable(StageId::Customize);
    };
    let mut outside = outside_indicator_range(&out.revisions, thresholds);
    outside.extend(out.untailored.iter().map(|id| format!("{id} (not revised)")));
    RuleCheck::new(
        outside.is_empty(),
        json!(outside.len()),
        json!([thresholds.min_indicators, thresholds.max_indicators]),
        format!("{} competencies outside the indicator range", outside.len()),
    )
    .with_details(outside)
}

fn definition_present(payload: &StagePayload, _: &GateThresholds) -> RuleCheck {
    let StagePayload::Customize(out) = payload else {
        return RuleCheck::not_applicable(StageId::Customize);
    };
    let empty: Vec<String> = out
        .revisions
        .iter()
        .filter(|c| c.definition.trim().is_empty())
        .map(|c| c.id.clone())
        .collect();
    RuleCheck::new(
        empty.is_empty(),
        json!(empty.len()),
        json!(0),
        format!("{} revisions have an empty definition", empty.len()),
    )
    .with_details(empty)
}

// -------------------------------------------------------------- benchmark

fn evidence_attached(payload: &StagePayload, _: &GateThresholds) -> RuleCheck {
    let StagePayload::Benchmark(out) = payload else {
        return RuleCheck::not_applicable(StageId::Benchmark);
    };
    let missing: Vec<String> = out
        .evidence
        .iter()
        .filter(|e| e.snippets.is_empty())
        .map(|e| e.competency_id.clone())
        .collect();
    let with_evidence = out.evidence.len() - missing.len();
    RuleCheck::new(
        missing.is_empty(),
        json!(with_evidence),
        json!(out.evidence.len()),
        format!(
            "{with_evidence} of {} competencies have supporting evidence",
            out.evidence.len()
        ),
    )
    .with_details(missing)
}

// ------------------------------------------------------------------ audit

fn overlap_ids(payload: &StagePayload, class: OverlapClass) -> Option<Vec<String>> {
    let StagePayload::Audit(out) = payload else {
        return None;
    };
    Some(
        out.findings
            .iter()
            .filter(|f| f.is_active() && f.classification == class)
            .map(|f| format!("{} ({:.3})", f.id, f.similarity))
            .collect(),
    )
}

fn material_overlap_detected(payload: &StagePayload, _: &GateThresholds) -> RuleCheck {
    let Some(ids) = overlap_ids(payload, OverlapClass::Material) else {
        return RuleCheck::not_applicable(StageId::Audit);
    };
    RuleCheck::new(
        ids.is_empty(),
        json!(ids.len()),
        json!(0),
        format!("{} material overlaps pending remediation", ids.len()),
    )
    .with_details(ids)
}

fn minor_overlap_detected(payload: &StagePayload, _: &GateThresholds) -> RuleCheck {
    let Some(ids) = overlap_ids(payload, OverlapClass::Minor) else {
        return RuleCheck::not_applicable(StageId::Audit);
    };
    RuleCheck::new(
        ids.is_empty(),
        json!(ids.len()),
        json!(0),
        format!("{} minor overlaps", ids.len()),
    )
    .with_details(ids)
}

// -------------------------------------------------------------- remediate

fn material_overlap_present(payload: &StagePayload, _: &GateThresholds) -> RuleCheck {
    let StagePayload::Remediate(out) = payload else {
        return RuleCheck::not_applicable(StageId::Remediate);
    };
    let active: BTreeSet<&str> = out
        .competencies
        .iter()
        .filter(|c| c.is_active())
        .map(|c| c.id.as_str())
        .collect();
    let remaining: Vec<String> = out
        .findings
        .iter()
        .filter(|f| {
            f.is_active()
                && f.classification == OverlapClass::Material
                && active.contains(f.competency_id.as_str())
        })
        .map(|f| format!("{} ({:.3})", f.id, f.similarity))
        .collect();
    RuleCheck::new(
        remaining.is_empty(),
        json!(remaining.len()),
        json!(0),
        format!("{} material overlaps remain after remediation", remaining.len()),
    )
    .with_details(remaining)
}

fn stale_finding_present(payload: &StagePayload, _: &GateThresholds) -> RuleCheck {
    let StagePayload::Remediate(out) = payload else {
        return RuleCheck::not_applicable(StageId::Remediate);
    };
    let ledger = FindingLedger::from_findings(out.findings.clone());
    let stale: Vec<String> = ledger
        .stale(&out.competencies)
        .into_iter()
        .map(|f| f.id.clone())
        .collect();
    RuleCheck::new(
        stale.is_empty(),
        json!(stale.len()),
        json!(0),
        format!("{} active findings target an outdated competency version", stale.len()),
    )
    .with_details(stale)
}

fn coverage_after_remediation(payload: &StagePayload, thresholds: &GateThresholds) -> RuleCheck {
    let StagePayload::Remediate(out) = payload else {
        return RuleCheck::not_applicable(StageId::Remediate);
    };
    RuleCheck::new(
        out.coverage_after >= thresholds.min_coverage,
        json!(out.coverage_after),
        json!(thresholds.min_coverage),
        format!("coverage after remediation is {:.2}", out.coverage_after),
    )
    .with_details(out.uncovered.clone())
}

/// Competencies remediation rewrote or brought in must stay in range.
fn remediated_indicator_count(payload: &StagePayload, thresholds: &GateThresholds) -> RuleCheck {
    let StagePayload::Remediate(out) = payload else {
        return RuleCheck::not_applicable(StageId::Remediate);
    };
    let touched: BTreeSet<&str> = out
        .decisions
        .iter()
        .filter_map(|d| match d.action {
            RemediationAction::Revise => Some(d.competency_id.as_str()),
            RemediationAction::Replace => d.replacement_id.as_deref(),
            RemediationAction::Remove | RemediationAction::Keep => None,
        })
        .collect();
    let outside = outside_indicator_range(
        out.competencies
            .iter()
            .filter(|c| c.is_active() && touched.contains(c.id.as_str())),
        thresholds,
    );
    RuleCheck::new(
        outside.is_empty(),
        json!(outside.len()),
        json!([thresholds.min_indicators, thresholds.max_indicators]),
        format!("{} remediated competencies outside the indicator range", outside.len()),
    )
    .with_details(outside)
}

// ------------------------------------------------------------------- rank

fn selection_size_in_range(payload: &StagePayload, thresholds: &GateThresholds) -> RuleCheck {
    let StagePayload::Rank(out) = payload else {
        return RuleCheck::not_applicable(StageId::Rank);
    };
    let size = out.selection.selected.len();
    let lower = thresholds.min_count.min(out.ranked.len()).max(1);
    RuleCheck::new(
        (lower..=thresholds.max_count).contains(&size),
        json!(size),
        json!([lower, thresholds.max_count]),
        format!("{size} competencies selected"),
    )
}

fn coverage_target_met(payload: &StagePayload, thresholds: &GateThresholds) -> RuleCheck {
    let StagePayload::Rank(out) = payload else {
        return RuleCheck::not_applicable(StageId::Rank);
    };
    let coverage = out.selection.coverage;
    RuleCheck::new(
        coverage >= thresholds.min_coverage,
        json!(coverage),
        json!(thresholds.min_coverage),
        format!(
            "selection covers {:.0}% of responsibilities",
            coverage * 100.0
        ),
    )
    .with_details(out.selection.gaps.clone())
}

fn responsibility_gap(payload: &StagePayload, _: &GateThresholds) -> RuleCheck {
    let StagePayload::Rank(out) = payload else {
        return RuleCheck::not_applicable(StageId::Rank);
    };
    let gaps = &out.selection.unmappable;
    RuleCheck::new(
        gaps.is_empty(),
        json!(gaps.len()),
        json!(0),
        format!(
            "{} responsibilities have no PRIMARY or SECONDARY competency",
            gaps.len()
        ),
    )
    .with_details(gaps.clone())
}

fn score_bounds(payload: &StagePayload, _: &GateThresholds) -> RuleCheck {
    let StagePayload::Rank(out) = payload else {
        return RuleCheck::not_applicable(StageId::Rank);
    };
    let invalid: Vec<String> = out
        .ranked
        .entries
        .iter()
        .filter(|e| !e.score.in_bounds())
        .map(|e| e.competency_id.clone())
        .collect();
    RuleCheck::new(
        invalid.is_empty(),
        json!(invalid.len()),
        json!(0),
        format!("{} scores outside [0, 10]", invalid.len()),
    )
    .with_details(invalid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{
        Category, Competency, FindingStatus, Importance, JobProfile, Mapping, OverlapFinding,
        Responsibility, ScoreBreakdown, SourceTier,
    };
    use crate::gates::{GateEvaluator, GateStatus};
    use crate::overlap::{AppliedDecision, RemediationOutcome};
    use crate::pipeline::{AuditOutput, ExtractionOutput, MappingOutput};

    fn evaluator() -> GateEvaluator {
        GateEvaluator::new(GateThresholds::default(), std::collections::BTreeMap::new())
    }

    fn responsibility(id: &str) -> Responsibility {
        Responsibility {
            id: id.into(),
            raw_text: "x".into(),
            normalized_text: "x".into(),
            category: Category::Technical,
            importance: Importance::Medium,
        }
    }

    fn mapping(r: &str, c: &str, score: f32) -> Mapping {
        Mapping {
            responsibility_id: r.into(),
            competency_id: c.into(),
            relevance_score: score,
            contribution: Contribution::Primary,
            score_breakdown: ScoreBreakdown {
                semantic: score,
                lexical: score,
                contextual: score,
            },
        }
    }

    fn competencies(count: usize) -> Vec<Competency> {
        (0..count)
            .map(|i| {
                Competency::new(format!("C{i}"), "n", "d", SourceTier::Catalog)
                    .with_indicators(vec!["a".into(), "b".into(), "c".into()])
            })
            .collect()
    }

    fn map_output() -> MappingOutput {
        MappingOutput {
            responsibility_ids: (1..=4).map(|i| format!("R0{i}")).collect(),
            competencies: competencies(6),
            pool: Vec::new(),
            mappings: (0..6).map(|i| mapping("R01", &format!("C{i}"), 0.9)).collect(),
            unmapped: Vec::new(),
            rejected_pairs: 0,
        }
    }

    #[test]
    fn every_stage_has_rules_and_names_are_unique() {
        for stage in StageId::ALL {
            assert!(rules_for(stage).count() > 0, "{stage} has no rules");
        }
        let names: BTreeSet<&str> = all_rules().iter().map(|r| r.name).collect();
        assert_eq!(names.len(), all_rules().len());
    }

    #[test]
    fn integrity_rules_are_critical() {
        for rule in all_rules().iter().filter(|r| r.integrity) {
            assert_eq!(rule.severity, Severity::Critical, "{}", rule.name);
            assert!(rule.blocking);
        }
    }

    #[test]
    fn empty_extraction_blocks() {
        let payload = StagePayload::Extract(ExtractionOutput {
            job: JobProfile {
                title: "t".into(),
                family: String::new(),
                level: String::new(),
                summary: String::new(),
            },
            responsibilities: Vec::new(),
        });
        let result = evaluator().evaluate(StageId::Extract, &payload);
        assert_eq!(result.status, GateStatus::Block);
        assert_eq!(
            result.blocking().map(|f| f.rule.as_str()).collect::<Vec<_>>(),
            vec!["responsibilities-present"]
        );
    }

    #[test]
    fn duplicate_ids_block() {
        let payload = StagePayload::Extract(ExtractionOutput {
            job: JobProfile {
                title: "t".into(),
                family: String::new(),
                level: String::new(),
                summary: String::new(),
            },
            responsibilities: vec![responsibility("R01"), responsibility("R01")],
        });
        let result = evaluator().evaluate(StageId::Extract, &payload);
        assert_eq!(result.status, GateStatus::Block);
        let finding = result.blocking().next().unwrap();
        assert_eq!(finding.rule, "responsibility-ids-unique");
        assert_eq!(finding.details, vec!["R01".to_string()]);
    }

    #[test]
    fn dangling_mapping_is_integrity_block() {
        let mut out = map_output();
        out.mappings.push(mapping("R99", "C0", 0.9));
        let result = evaluator().evaluate(StageId::Map, &StagePayload::Map(out));
        assert_eq!(result.status, GateStatus::Block);
        let finding = result.blocking().next().unwrap();
        assert_eq!(finding.rule, "mapping-references-valid");
        assert_eq!(finding.details, vec!["R99 -> C0".to_string()]);
    }

    #[test]
    fn below_threshold_mapping_blocks() {
        let mut out = map_output();
        out.mappings.push(mapping("R02", "C1", 0.5));
        let result = evaluator().evaluate(StageId::Map, &StagePayload::Map(out));
        assert!(
            result
                .blocking()
                .any(|f| f.rule == "mapping-threshold-respected")
        );
    }

    #[test]
    fn one_unmapped_responsibility_warns() {
        let mut out = map_output();
        out.unmapped = vec!["R04".into()];
        let result = evaluator().evaluate(StageId::Map, &StagePayload::Map(out));
        assert_eq!(result.status, GateStatus::Warn);
        let warning = result.warnings().next().unwrap();
        assert_eq!(warning.rule, "unmapped-responsibility-present");
        assert_eq!(warning.details, vec!["R04".to_string()]);
    }

    #[test]
    fn high_unmapped_rate_blocks_with_observed_value() {
        let mut out = map_output();
        out.unmapped = vec!["R02".into(), "R03".into()];
        let result = evaluator().evaluate(StageId::Map, &StagePayload::Map(out));
        assert_eq!(result.status, GateStatus::Block);
        let finding = result
            .findings
            .iter()
            .find(|f| f.rule == "unmapped-responsibility-rate")
            .unwrap();
        assert!(!finding.passed);
        assert_eq!(finding.observed, json!(0.5));
        assert_eq!(finding.threshold, json!(0.25));
    }

    #[test]
    fn overrides_can_soften_ordinary_rules() {
        let mut overrides = std::collections::BTreeMap::new();
        overrides.insert(
            "unmapped-responsibility-rate".to_string(),
            crate::config::RuleOverride {
                severity: Some(Severity::Warning),
                blocking: Some(false),
            },
        );
        let evaluator = GateEvaluator::new(GateThresholds::default(), overrides);
        let mut out = map_output();
        out.unmapped = vec!["R02".into(), "R03".into()];
        let result = evaluator.evaluate(StageId::Map, &StagePayload::Map(out));
        assert_eq!(result.status, GateStatus::Warn);
    }

    #[test]
    fn material_audit_finding_only_warns() {
        let finding = OverlapFinding {
            id: "C0@v1~L1".into(),
            competency_id: "C0".into(),
            competency_version: 1,
            reference_id: "L1".into(),
            similarity: 0.9,
            classification: OverlapClass::Material,
            status: FindingStatus::Active,
            suggestion: None,
        };
        let payload = StagePayload::Audit(AuditOutput {
            findings: vec![finding],
            material: 1,
            minor: 0,
        });
        let result = evaluator().evaluate(StageId::Audit, &payload);
        assert_eq!(result.status, GateStatus::Warn);
    }

    #[test]
    fn stale_active_finding_blocks_remediation() {
        let mut competency = Competency::new("C0", "n", "d", SourceTier::Catalog);
        competency.version = 2;
        let outcome = RemediationOutcome {
            competencies: vec![competency],
            findings: vec![OverlapFinding {
                id: "C0@v1~L1".into(),
                competency_id: "C0".into(),
                competency_version: 1,
                reference_id: "L1".into(),
                similarity: 0.5,
                classification: OverlapClass::None,
                status: FindingStatus::Active,
                suggestion: None,
            }],
            coverage_after: 1.0,
            ..RemediationOutcome::default()
        };
        let result = evaluator().evaluate(StageId::Remediate, &StagePayload::Remediate(outcome));
        assert_eq!(result.status, GateStatus::Block);
        assert_eq!(result.blocking().next().unwrap().rule, "stale-finding-present");
    }

    #[test]
    fn uncustomized_candidate_indicators_only_warn_at_map() {
        let mut out = map_output();
        out.competencies[2].indicators.clear();
        let result = evaluator().evaluate(StageId::Map, &StagePayload::Map(out));
        assert_eq!(result.status, GateStatus::Warn);
        let warning = result.warnings().next().unwrap();
        assert_eq!(warning.rule, "candidate-indicator-count");
        assert_eq!(warning.details, vec!["C2 (0 indicators)".to_string()]);
    }

    fn revised_outcome(indicators: usize) -> RemediationOutcome {
        let mut competency = Competency::new("C0", "n", "narrower", SourceTier::Catalog)
            .with_indicators((0..indicators).map(|i| format!("behaviour {i}")).collect());
        competency.version = 2;
        RemediationOutcome {
            decisions: vec![AppliedDecision {
                competency_id: "C0".into(),
                finding_ids: vec!["C0@v1~L1".into()],
                action: RemediationAction::Revise,
                defaulted: false,
                replacement_id: None,
                rationale: String::new(),
            }],
            competencies: vec![competency],
            coverage_after: 1.0,
            ..RemediationOutcome::default()
        }
    }

    #[test]
    fn revision_with_one_indicator_blocks_remediation() {
        let result = evaluator().evaluate(
            StageId::Remediate,
            &StagePayload::Remediate(revised_outcome(1)),
        );
        assert_eq!(result.status, GateStatus::Block);
        let finding = result.blocking().next().unwrap();
        assert_eq!(finding.rule, "remediated-indicator-count");
        assert_eq!(finding.details, vec!["C0 (1 indicators)".to_string()]);

        let ok = evaluator().evaluate(
            StageId::Remediate,
            &StagePayload::Remediate(revised_outcome(3)),
        );
        assert_eq!(ok.status, GateStatus::Pass);
    }

    #[test]
    fn wrong_payload_for_stage_blocks() {
        let result = evaluator().evaluate(StageId::Rank, &StagePayload::Map(map_output()));
        assert_eq!(result.status, GateStatus::Block);
        assert_eq!(result.findings[0].rule, "payload-matches-stage");
    }
}
