//! Quality gates evaluated between pipeline stages.
//!
//! Each stage has a fixed, ordered rule table (see [`rules`]). Rules are
//! pure functions of the stage payload and static thresholds. The gate
//! status is the worst outcome over the failed rules:
//!
//! - CRITICAL, or ERROR with `blocking = true` → `block`
//! - WARNING, or ERROR with `blocking = false` → `warn`
//! - otherwise → `pass`
//!
//! Integrity rules are always CRITICAL and blocking; configuration may
//! not weaken them.

mod rules;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::config::{Config, RuleOverride};
use crate::pipeline::{StageId, StagePayload};

pub use rules::{Rule, RuleCheck, all_rules, find_rule, rules_for};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
            Self::Critical => "CRITICAL",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GateStatus {
    Pass,
    Warn,
    Block,
}

impl fmt::Display for GateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pass => "pass",
            Self::Warn => "warn",
            Self::Block => "block",
        })
    }
}

/// Outcome of one rule, with enough data to act on without re-running.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleFinding {
    pub rule: String,
    pub severity: Severity,
    pub blocking: bool,
    pub passed: bool,
    pub observed: Value,
    pub threshold: Value,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<String>,
}

impl RuleFinding {
    /// What this finding contributes to the gate status.
    #[must_use]
    pub const fn outcome(&self) -> GateStatus {
        if self.passed {
            return GateStatus::Pass;
        }
        match self.severity {
            Severity::Critical => GateStatus::Block,
            Severity::Error if self.blocking => GateStatus::Block,
            Severity::Error | Severity::Warning => GateStatus::Warn,
            Severity::Info => GateStatus::Pass,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateResult {
    pub stage: StageId,
    pub status: GateStatus,
    pub findings: Vec<RuleFinding>,
}

impl GateResult {
    /// Failed findings that caused a block.
    pub fn blocking(&self) -> impl Iterator<Item = &RuleFinding> {
        self.findings
            .iter()
            .filter(|f| f.outcome() == GateStatus::Block)
    }

    /// Failed findings that produced a warning.
    pub fn warnings(&self) -> impl Iterator<Item = &RuleFinding> {
        self.findings
            .iter()
            .filter(|f| f.outcome() == GateStatus::Warn)
    }

    /// Machine-readable summary of the failed rules.
    #[must_use]
    pub fn diagnostics(&self) -> Value {
        let failed: Vec<&RuleFinding> = self.findings.iter().filter(|f| !f.passed).collect();
        json!({
            "stage": self.stage,
            "status": self.status,
            "failed_rules": failed,
        })
    }
}

/// Worst outcome over `findings`.
#[must_use]
pub fn aggregate(findings: &[RuleFinding]) -> GateStatus {
    findings
        .iter()
        .map(RuleFinding::outcome)
        .max()
        .unwrap_or(GateStatus::Pass)
}

/// The thresholds rules read. A slice of [`Config`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateThresholds {
    pub min_relevance: f32,
    pub max_unmapped_rate: f32,
    pub min_count: usize,
    pub max_count: usize,
    pub min_coverage: f32,
    pub min_indicators: usize,
    pub max_indicators: usize,
}

impl GateThresholds {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            min_relevance: config.scoring.min_relevance,
            max_unmapped_rate: config.gates.max_unmapped_rate,
            min_count: config.ranking.min_count,
            max_count: config.ranking.max_count,
            min_coverage: config.ranking.min_coverage,
            min_indicators: config.gates.min_indicators,
            max_indicators: config.gates.max_indicators,
        }
    }
}

impl Default for GateThresholds {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

pub struct GateEvaluator {
    thresholds: GateThresholds,
    overrides: BTreeMap<String, RuleOverride>,
}

impl GateEvaluator {
    #[must_use]
    pub fn new(thresholds: GateThresholds, overrides: BTreeMap<String, RuleOverride>) -> Self {
        Self {
            thresholds,
            overrides,
        }
    }

    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            GateThresholds::from_config(config),
            config.gates.rules.clone(),
        )
    }

    #[must_use]
    pub const fn thresholds(&self) -> &GateThresholds {
        &self.thresholds
    }

    /// Run the stage's rule table against `payload`, in table order. A
    /// payload produced for a different stage blocks on its own.
    #[must_use]
    pub fn evaluate(&self, stage: StageId, payload: &StagePayload) -> GateResult {
        let findings = if payload.stage() == stage {
            rules_for(stage)
                .map(|rule| self.run_rule(rule, payload))
                .collect()
        } else {
            vec![RuleFinding {
                rule: "payload-matches-stage".to_string(),
                severity: Severity::Critical,
                blocking: true,
                passed: false,
                observed: json!(payload.stage()),
                threshold: json!(stage),
                message: format!(
                    "stage {stage} produced a {} payload",
                    payload.stage()
                ),
                details: Vec::new(),
            }]
        };

        let status = aggregate(&findings);
        match status {
            GateStatus::Pass => info!(%stage, %status, "gate evaluated"),
            GateStatus::Warn | GateStatus::Block => {
                let failed: Vec<&str> = findings
                    .iter()
                    .filter(|f| !f.passed && f.outcome() != GateStatus::Pass)
                    .map(|f| f.rule.as_str())
                    .collect();
                warn!(%stage, %status, rules = ?failed, "gate evaluated");
            }
        }

        GateResult {
            stage,
            status,
            findings,
        }
    }

    fn run_rule(&self, rule: &Rule, payload: &StagePayload) -> RuleFinding {
        let check = (rule.check)(payload, &self.thresholds);
        let (severity, blocking) = if rule.integrity {
            (Severity::Critical, true)
        } else {
            let configured = self.overrides.get(rule.name);
            let severity = configured
                .and_then(|o| o.severity)
                .unwrap_or(rule.severity);
            let blocking = configured
                .and_then(|o| o.blocking)
                .unwrap_or(rule.blocking);
            (severity, blocking)
        };
        RuleFinding {
            rule: rule.name.to_string(),
            severity,
            blocking,
            passed: check.passed,
            observed: check.observed,
            threshold: check.threshold,
            message: check.message,
            details: check.details,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finding(severity: Severity, blocking: bool, passed: bool) -> RuleFinding {
        RuleFinding {
            rule: "synthetic".into(),
            severity,
            blocking,
            passed,
            observed: json!(1),
            threshold: json!(0),
            message: String::new(),
            details: Vec::new(),
        }
    }

    #[test]
    fn warning_plus_pass_is_warn() {
        let findings = vec![
            finding(Severity::Warning, false, false),
            finding(Severity::Critical, true, true),
        ];
        assert_eq!(aggregate(&findings), GateStatus::Warn);
    }

    #[test]
    fn critical_blocks_regardless_of_others() {
        let findings = vec![
            finding(Severity::Info, false, false),
            finding(Severity::Warning, false, false),
            finding(Severity::Critical, false, false),
        ];
        assert_eq!(aggregate(&findings), GateStatus::Block);
    }

    #[test]
    fn error_blocks_only_when_blocking() {
        assert_eq!(
            aggregate(&[finding(Severity::Error, true, false)]),
            GateStatus::Block
        );
        assert_eq!(
            aggregate(&[finding(Severity::Error, false, false)]),
            GateStatus::Warn
        );
    }

    #[test]
    fn info_failures_pass() {
        assert_eq!(
            aggregate(&[finding(Severity::Info, false, false)]),
            GateStatus::Pass
        );
        assert_eq!(aggregate(&[]), GateStatus::Pass);
    }

    #[test]
    fn severity_ordering() {
        assert!(Severity::Critical > Severity::Error);
        assert!(Severity::Error > Severity::Warning);
        assert!(Severity::Warning > Severity::Info);
    }
}
