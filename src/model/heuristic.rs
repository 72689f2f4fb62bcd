//! Deterministic offline backend.
//!
//! Answers every task from the prompt input alone, with keyword rules.
//! Good enough to run the pipeline without a network; the replies go
//! through the same schema checks as any other backend.

use std::collections::BTreeMap;

use serde_json::{Value, json};

use super::{ModelService, Prompt, PromptTask};
use crate::core::{Category, Importance};
use crate::error::{CmError, Result};

const HIGH_MARKERS: &[&str] = &[
    "own", "lead", "architect", "design", "secure", "critical", "ensure", "accountab",
];
const LOW_MARKERS: &[&str] = &["assist", "help", "attend", "support", "document", "occasional"];
const MAX_DEFINITION_DUTIES: usize = 3;
const MIN_PROPOSED_INDICATORS: usize = 3;
const MAX_PROPOSED_INDICATORS: usize = 7;

#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicModelService;

impl HeuristicModelService {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl ModelService for HeuristicModelService {
    fn name(&self) -> &str {
        "heuristic"
    }

    fn invoke(&self, prompt: &Prompt, _schema: &Value) -> Result<Value> {
        let input = &prompt.input;
        Ok(match prompt.task {
            PromptTask::ClassifyResponsibilities => classify(input),
            PromptTask::ProposeCompetencies => propose(input),
            PromptTask::CustomizeCompetencies => customize(input)?,
            PromptTask::PlanRemediation => json!({ "decisions": [] }),
        })
    }
}

fn items<'v>(input: &'v Value, key: &str) -> impl Iterator<Item = &'v Value> {
    input
        .get(key)
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
}

fn text<'v>(value: &'v Value, key: &str) -> &'v str {
    value.get(key).and_then(Value::as_str).unwrap_or_default()
}

fn importance(text: &str) -> Importance {
    let words: Vec<&str> = text.split_whitespace().collect();
    let has = |markers: &[&str]| {
        words
            .iter()
            .any(|w| markers.iter().any(|m| w.starts_with(m)))
    };
    if has(HIGH_MARKERS) {
        Importance::High
    } else if has(LOW_MARKERS) {
        Importance::Low
    } else {
        Importance::Medium
    }
}

fn classify(input: &Value) -> Value {
    let classified: Vec<Value> = items(input, "responsibilities")
        .map(|duty| {
            let body = text(duty, "text");
            json!({
                "id": text(duty, "id"),
                "category": Category::infer(body),
                "importance": importance(body),
            })
        })
        .collect();
    json!({ "items": classified })
}

/// One proposal per category the catalog has no tag for.
fn propose(input: &Value) -> Value {
    let catalog_tags: Vec<String> = items(input, "catalog")
        .flat_map(|c| items(c, "tags"))
        .filter_map(Value::as_str)
        .map(str::to_string)
        .collect();
    let family = input
        .get("job")
        .map(|job| text(job, "family"))
        .unwrap_or_default()
        .to_lowercase();

    let mut uncovered: BTreeMap<Category, Vec<&str>> = BTreeMap::new();
    for duty in items(input, "responsibilities") {
        let Some(category) = duty
            .get("category")
            .and_then(Value::as_str)
            .and_then(|c| c.parse::<Category>().ok())
        else {
            continue;
        };
        if catalog_tags.iter().any(|tag| category.matches_tag(tag)) {
            continue;
        }
        uncovered.entry(category).or_default().push(text(duty, "text"));
    }

    let proposals: Vec<Value> = uncovered
        .into_iter()
        .map(|(category, duties)| {
            let mut name = category.as_str().to_string();
            if let Some(first) = name.get_mut(0..1) {
                first.make_ascii_uppercase();
            }
            let definition = duties
                .iter()
                .take(MAX_DEFINITION_DUTIES)
                .copied()
                .collect::<Vec<_>>()
                .join("; ");
            let mut indicators: Vec<String> = duties
                .iter()
                .take(MAX_PROPOSED_INDICATORS)
                .map(|d| format!("Consistently able to {d}"))
                .collect();
            pad_indicators(&mut indicators, &format!("{name} execution"), MIN_PROPOSED_INDICATORS);
            let mut tags = vec![category.as_str().to_string()];
            if !family.is_empty() {
                tags.push(family.clone());
            }
            json!({
                "name": format!("{name} Execution"),
                "definition": definition,
                "indicators": indicators,
                "tags": tags,
            })
        })
        .collect();
    json!({ "competencies": proposals })
}

/// Lead with one indicator per mapped duty, then the existing ones, then
/// fill or trim into range. Definitions are kept; unchanged competencies
/// get no revision.
fn customize(input: &Value) -> Result<Value> {
    let (min, max) = indicator_range(input)?;

    let mut revisions = Vec::new();
    for competency in items(input, "competencies") {
        let current: Vec<String> = items(competency, "indicators")
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect();
        let mut indicators: Vec<String> = items(competency, "responsibilities")
            .filter_map(Value::as_str)
            .map(|duty| format!("Consistently able to {duty}"))
            .collect();
        for indicator in &current {
            if !indicators.contains(indicator) {
                indicators.push(indicator.clone());
            }
        }
        pad_indicators(&mut indicators, text(competency, "name"), min);
        indicators.truncate(max);
        if indicators == current {
            continue;
        }
        revisions.push(json!({
            "competency_id": text(competency, "id"),
            "definition": text(competency, "definition"),
            "indicators": indicators,
        }));
    }
    Ok(json!({ "revisions": revisions }))
}

fn indicator_range(input: &Value) -> Result<(usize, usize)> {
    let range = input
        .get("indicator_range")
        .and_then(Value::as_array)
        .and_then(|r| Some((r.first()?.as_u64()?, r.get(1)?.as_u64()?)))
        .ok_or_else(|| CmError::InvalidInput("customize prompt lacks indicator_range".into()))?;
    Ok((
        usize::try_from(range.0).unwrap_or(usize::MAX),
        usize::try_from(range.1).unwrap_or(usize::MAX),
    ))
}

fn pad_indicators(indicators: &mut Vec<String>, name: &str, min: usize) {
    let name = name.to_lowercase();
    let mut level = 1;
    while indicators.len() < min {
        indicators.push(format!("Applies {name} at proficiency level {level}"));
        level += 1;
    }
}
