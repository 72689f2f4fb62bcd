//! Prompt builders, reply types and reply schemas for each model task.
//!
//! Reply schemas are JSON Schema (draft 2020-12) documents; the HTTP
//! backend forwards them verbatim as `response_schema`.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::{Prompt, PromptTask};
use crate::core::{Category, Competency, Importance, JobProfile, OverlapFinding, Responsibility};
use crate::overlap::RemediationDecision;

const CATEGORIES: &[&str] = &[
    "technical",
    "operational",
    "strategic",
    "compliance",
    "collaboration",
    "other",
];
const IMPORTANCE: &[&str] = &["HIGH", "MEDIUM", "LOW"];
const ACTIONS: &[&str] = &["REMOVE", "REVISE", "REPLACE", "KEEP"];

fn text() -> Value {
    json!({"type": "string", "minLength": 1})
}

fn texts() -> Value {
    json!({"type": "array", "items": text()})
}

/// Object schema; `required` lists the keys that must be present.
fn object(properties: Value, required: &[&str]) -> Value {
    json!({"type": "object", "properties": properties, "required": required})
}

/// Top-level `{key: [item, ...]}` reply.
fn list_reply(key: &str, item: Value) -> Value {
    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "type": "object",
        "properties": {key: {"type": "array", "items": item}},
        "required": [key],
    })
}

// ------------------------------------------------------------ classify

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifiedItem {
    pub id: String,
    pub category: Category,
    pub importance: Importance,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationReply {
    pub items: Vec<ClassifiedItem>,
}

#[must_use]
pub fn classification_schema() -> Value {
    list_reply(
        "items",
        object(
            json!({
                "id": text(),
                "category": {"enum": CATEGORIES},
                "importance": {"enum": IMPORTANCE},
            }),
            &["id", "category", "importance"],
        ),
    )
}

/// `duties` are `(id, normalized text)` pairs.
#[must_use]
pub fn classification_prompt(job: &JobProfile, duties: &[(String, String)]) -> Prompt {
    Prompt::new(
        PromptTask::ClassifyResponsibilities,
        "Classify each responsibility by work-context category and importance to the role.",
        json!({
            "job": job,
            "responsibilities": duties
                .iter()
                .map(|(id, text)| json!({"id": id, "text": text}))
                .collect::<Vec<_>>(),
        }),
    )
}

// ------------------------------------------------------------- propose

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposedCompetency {
    pub name: String,
    pub definition: String,
    #[serde(default)]
    pub indicators: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalReply {
    pub competencies: Vec<ProposedCompetency>,
}

#[must_use]
pub fn proposal_schema() -> Value {
    list_reply(
        "competencies",
        object(
            json!({
                "name": text(),
                "definition": text(),
                "indicators": texts(),
                "tags": texts(),
            }),
            &["name", "definition"],
        ),
    )
}

#[must_use]
pub fn proposal_prompt(
    job: &JobProfile,
    responsibilities: &[Responsibility],
    catalog: &[Competency],
) -> Prompt {
    Prompt::new(
        PromptTask::ProposeCompetencies,
        "Propose technical competencies for responsibilities the catalog does not already cover. \
         Do not repeat catalog entries.",
        json!({
            "job": job,
            "responsibilities": responsibilities
                .iter()
                .map(|r| json!({"id": r.id, "text": r.normalized_text, "category": r.category}))
                .collect::<Vec<_>>(),
            "catalog": catalog
                .iter()
                .map(|c| json!({"id": c.id, "name": c.name, "tags": c.tags}))
                .collect::<Vec<_>>(),
        }),
    )
}

// ----------------------------------------------------------- customize

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompetencyRevision {
    pub competency_id: String,
    pub definition: String,
    pub indicators: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomizationReply {
    pub revisions: Vec<CompetencyRevision>,
}

#[must_use]
pub fn customization_schema() -> Value {
    list_reply(
        "revisions",
        object(
            json!({
                "competency_id": text(),
                "definition": text(),
                "indicators": texts(),
            }),
            &["competency_id", "definition", "indicators"],
        ),
    )
}

/// `mapped` pairs each competency with the responsibilities it covers.
#[must_use]
pub fn customization_prompt(
    job: &JobProfile,
    mapped: &[(&Competency, Vec<&Responsibility>)],
    indicator_range: (usize, usize),
) -> Prompt {
    Prompt::new(
        PromptTask::CustomizeCompetencies,
        format!(
            "Tailor each competency's definition to this role and give {} to {} observable \
             behavioral indicators. Keep ids and names unchanged.",
            indicator_range.0, indicator_range.1
        ),
        json!({
            "job": job,
            "indicator_range": [indicator_range.0, indicator_range.1],
            "competencies": mapped
                .iter()
                .map(|(c, duties)| json!({
                    "id": c.id,
                    "name": c.name,
                    "definition": c.definition,
                    "indicators": c.indicators,
                    "responsibilities": duties.iter().map(|r| &r.normalized_text).collect::<Vec<_>>(),
                }))
                .collect::<Vec<_>>(),
        }),
    )
}

// ----------------------------------------------------------- remediate

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemediationReply {
    pub decisions: Vec<RemediationDecision>,
}

#[must_use]
pub fn remediation_schema() -> Value {
    list_reply(
        "decisions",
        object(
            json!({
                "finding_id": text(),
                "action": {"enum": ACTIONS},
                "definition": {"anyOf": [text(), {"type": "null"}]},
                "indicators": {"anyOf": [texts(), {"type": "null"}]},
                "replacement_id": {"anyOf": [text(), {"type": "null"}]},
                "rationale": {"type": ["string", "null"]},
            }),
            &["finding_id", "action"],
        ),
    )
}

#[must_use]
pub fn remediation_prompt(
    findings: &[&OverlapFinding],
    competencies: &[Competency],
    protected: &[Competency],
    pool: &[Competency],
) -> Prompt {
    let definition_of = |set: &[Competency], id: &str| {
        set.iter()
            .find(|c| c.id == id)
            .map(|c| c.definition.clone())
            .unwrap_or_default()
    };
    Prompt::new(
        PromptTask::PlanRemediation,
        "For each overlap finding choose REMOVE, REVISE (give a narrower definition and \
         indicators), REPLACE (name a pool candidate) or KEEP.",
        json!({
            "findings": findings
                .iter()
                .map(|f| json!({
                    "finding_id": f.id,
                    "competency_id": f.competency_id,
                    "classification": f.classification,
                    "similarity": f.similarity,
                    "definition": definition_of(competencies, &f.competency_id),
                    "reference_id": f.reference_id,
                    "reference_definition": definition_of(protected, &f.reference_id),
                }))
                .collect::<Vec<_>>(),
            "pool": pool
                .iter()
                .map(|c| json!({"id": c.id, "name": c.name}))
                .collect::<Vec<_>>(),
        }),
    )
}
