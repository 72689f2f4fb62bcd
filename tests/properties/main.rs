//! Property tests for scoring, selection and gate aggregation.

mod gates;
mod overlap;
mod scoring;
mod selection;

use cmap::core::{Category, Competency, Importance, Responsibility, SourceTier, normalize};
use proptest::prelude::*;

const VOCAB: &[&str] = &[
    "ledger", "reconcile", "forecast", "budget", "variance", "audit", "report", "controls",
    "vendor", "contract", "stakeholder", "pipeline", "model", "review", "policy", "risk",
];

pub fn arb_sentence() -> impl Strategy<Value = String> {
    prop::collection::vec(prop::sample::select(VOCAB), 2..8).prop_map(|words| words.join(" "))
}

pub fn responsibility(index: usize, text: &str) -> Responsibility {
    Responsibility {
        id: format!("R{:02}", index + 1),
        raw_text: text.to_string(),
        normalized_text: normalize(text),
        category: Category::infer(text),
        importance: Importance::Medium,
    }
}

pub fn competency(index: usize, text: &str) -> Competency {
    Competency::new(
        format!("C-{index}"),
        format!("Competency {index}"),
        text,
        SourceTier::Catalog,
    )
}

pub fn arb_job() -> impl Strategy<Value = (Vec<Responsibility>, Vec<Competency>)> {
    (
        prop::collection::vec(arb_sentence(), 1..12),
        prop::collection::vec(arb_sentence(), 1..14),
    )
        .prop_map(|(duties, definitions)| {
            let responsibilities = duties
                .iter()
                .enumerate()
                .map(|(i, text)| responsibility(i, text))
                .collect();
            let competencies = definitions
                .iter()
                .enumerate()
                .map(|(i, text)| competency(i, text))
                .collect();
            (responsibilities, competencies)
        })
}
