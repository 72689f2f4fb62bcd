use cmap::gates::{GateStatus, RuleFinding, Severity, aggregate};
use proptest::prelude::*;
use serde_json::Value;

fn arb_finding() -> impl Strategy<Value = RuleFinding> {
    (
        prop_oneof![
            Just(Severity::Info),
            Just(Severity::Warning),
            Just(Severity::Error),
            Just(Severity::Critical),
        ],
        any::<bool>(),
        any::<bool>(),
    )
        .prop_map(|(severity, blocking, passed)| RuleFinding {
            rule: "generated".to_string(),
            severity,
            blocking,
            passed,
            observed: Value::Null,
            threshold: Value::Null,
            message: String::new(),
            details: Vec::new(),
        })
}

proptest! {
    #[test]
    fn gate_status_is_worst_failed_outcome(findings in prop::collection::vec(arb_finding(), 0..12)) {
        let status = aggregate(&findings);
        let blocks = findings.iter().any(|f| {
            !f.passed
                && (f.severity == Severity::Critical || (f.severity == Severity::Error && f.blocking))
        });
        let warns = findings.iter().any(|f| {
            !f.passed
                && (f.severity == Severity::Warning || (f.severity == Severity::Error && !f.blocking))
        });
        let expected = if blocks {
            GateStatus::Block
        } else if warns {
            GateStatus::Warn
        } else {
            GateStatus::Pass
        };
        prop_assert_eq!(status, expected);
    }

    #[test]
    fn passing_findings_never_change_the_status(findings in prop::collection::vec(arb_finding(), 0..12)) {
        let failed: Vec<RuleFinding> = findings.iter().filter(|f| !f.passed).cloned().collect();
        prop_assert_eq!(aggregate(&findings), aggregate(&failed));
    }
}
