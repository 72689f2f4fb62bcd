//! Blocking HTTP backend.
//!
//! Posts `{model, task, instructions, input, response_schema}` as JSON
//! and expects `{"output": {...}}` back. Transport failures and non-2xx
//! statuses are `ServiceUnavailable`; a body without `output` is a
//! malformed reply.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use super::{ModelService, Prompt};
use crate::config::ModelConfig;
use crate::error::{CmError, Result};

#[derive(Serialize)]
struct InvokeRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    task: &'a str,
    instructions: &'a str,
    input: &'a Value,
    response_schema: &'a Value,
}

#[derive(Deserialize)]
struct InvokeResponse {
    output: Option<Value>,
    #[serde(default)]
    error: Option<String>,
}

pub struct HttpModelService {
    endpoint: String,
    model: Option<String>,
    api_key: Option<String>,
    client: reqwest::blocking::Client,
}

impl std::fmt::Debug for HttpModelService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpModelService")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish_non_exhaustive()
    }
}

impl HttpModelService {
    pub fn from_config(config: &ModelConfig) -> Result<Self> {
        let endpoint = config
            .endpoint
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .ok_or_else(|| CmError::Config("model.endpoint is required for the http backend".into()))?;
        if endpoint.starts_with("http://") {
            warn!("model endpoint uses unencrypted HTTP");
        }

        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|err| CmError::Config(format!("model http client: {err}")))?;

        Ok(Self {
            endpoint: endpoint.to_string(),
            model: config.model.clone(),
            api_key: std::env::var(&config.api_key_env)
                .ok()
                .filter(|k| !k.is_empty()),
            client,
        })
    }
}

impl ModelService for HttpModelService {
    fn name(&self) -> &str {
        "http"
    }

    fn invoke(&self, prompt: &Prompt, schema: &Value) -> Result<Value> {
        let request = InvokeRequest {
            model: self.model.as_deref(),
            task: prompt.task.as_str(),
            instructions: &prompt.instructions,
            input: &prompt.input,
            response_schema: schema,
        };

        let mut builder = self.client.post(&self.endpoint).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        let response = builder
            .send()
            .map_err(|err| CmError::ServiceUnavailable(format!("{}: {err}", prompt.task)))?;

        if !response.status().is_success() {
            return Err(CmError::ServiceUnavailable(format!(
                "{}: HTTP {}",
                prompt.task,
                response.status()
            )));
        }

        let body: InvokeResponse = response.json().map_err(|err| CmError::MalformedReply {
            task: prompt.task.to_string(),
            path: "/".to_string(),
            reason: format!("response body: {err}"),
        })?;

        if let Some(message) = body.error {
            return Err(CmError::ServiceUnavailable(format!(
                "{}: {message}",
                prompt.task
            )));
        }
        body.output.ok_or_else(|| CmError::MalformedReply {
            task: prompt.task.to_string(),
            path: "/output".to_string(),
            reason: "missing field".to_string(),
        })
    }
}
