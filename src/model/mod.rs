//! Model-service capability.
//!
//! Stages never talk to a backend directly: they build a [`Prompt`], pick
//! the task's JSON Schema from [`prompts`] and call [`invoke_typed`]. A
//! reply that fails the schema is reported as [`CmError::MalformedReply`],
//! with the JSON pointer of the first offending value as its path.

mod heuristic;
mod http;
pub mod mock;
pub mod prompts;

use std::fmt;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::config::ModelConfig;
use crate::error::{CmError, Result};

pub use heuristic::HeuristicModelService;
pub use http::HttpModelService;
pub use mock::{MockFailure, MockModelService};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptTask {
    ClassifyResponsibilities,
    ProposeCompetencies,
    CustomizeCompetencies,
    PlanRemediation,
}

impl PromptTask {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ClassifyResponsibilities => "classify_responsibilities",
            Self::ProposeCompetencies => "propose_competencies",
            Self::CustomizeCompetencies => "customize_competencies",
            Self::PlanRemediation => "plan_remediation",
        }
    }
}

impl fmt::Display for PromptTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One request to the model service.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prompt {
    pub task: PromptTask,
    pub instructions: String,
    /// Structured task input.
    pub input: Value,
}

impl Prompt {
    pub fn new(task: PromptTask, instructions: impl Into<String>, input: Value) -> Self {
        Self {
            task,
            instructions: instructions.into(),
            input,
        }
    }
}

/// A text-generation backend. Single attempt per call; retries, if any,
/// belong to the backend.
pub trait ModelService: Send + Sync {
    /// Backend name for logs and run metadata.
    fn name(&self) -> &str;

    /// Raw structured reply. Implementations do not validate it.
    fn invoke(&self, prompt: &Prompt, schema: &Value) -> Result<Value>;
}

/// First violation of `schema` in `reply`, as `(instance path, message)`.
///
/// The path is a JSON pointer; the document root is `/`.
pub fn schema_violation(schema: &Value, reply: &Value) -> Result<Option<(String, String)>> {
    let validator = jsonschema::validator_for(schema)
        .map_err(|err| CmError::IntegrityViolation(format!("invalid reply schema: {err}")))?;
    Ok(validator.iter_errors(reply).next().map(|err| {
        let path = err.instance_path.to_string();
        let path = if path.is_empty() { "/".to_string() } else { path };
        (path, err.to_string())
    }))
}

/// Invoke, validate against `schema`, then deserialize.
pub fn invoke_typed<T: DeserializeOwned>(
    service: &dyn ModelService,
    prompt: &Prompt,
    schema: &Value,
) -> Result<T> {
    debug!(backend = service.name(), task = %prompt.task, "invoking model service");
    let reply = service.invoke(prompt, schema)?;
    if let Some((path, reason)) = schema_violation(schema, &reply)? {
        return Err(CmError::MalformedReply {
            task: prompt.task.to_string(),
            path,
            reason,
        });
    }
    serde_json::from_value(reply).map_err(|err| CmError::MalformedReply {
        task: prompt.task.to_string(),
        path: "/".to_string(),
        reason: err.to_string(),
    })
}

/// Build the backend named by `config.backend`.
pub fn build_model_service(config: &ModelConfig) -> Result<Box<dyn ModelService>> {
    match config.backend.as_str() {
        "heuristic" => Ok(Box::new(HeuristicModelService::new())),
        "http" => Ok(Box::new(HttpModelService::from_config(config)?)),
        other => Err(CmError::Config(format!(
            "unknown model backend '{other}' (expected heuristic or http)"
        ))),
    }
}
