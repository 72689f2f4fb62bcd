//! Normalize and classify the job's duty statements.

use std::collections::BTreeMap;

use tracing::info;

use crate::core::{Responsibility, normalize, responsibility_id};
use crate::error::{CmError, Result};
use crate::model::prompts::{ClassificationReply, classification_prompt, classification_schema};
use crate::model::{PromptTask, invoke_typed};
use crate::pipeline::context::StageContext;
use crate::pipeline::payload::{ExtractionOutput, StagePayload};
use crate::pipeline::stage::{Stage, StageId};

pub struct ExtractStage;

impl Stage for ExtractStage {
    fn id(&self) -> StageId {
        StageId::Extract
    }

    fn execute(&self, ctx: &StageContext<'_>) -> Result<StagePayload> {
        let job = ctx.inputs.job.profile();

        // blank lines are layout, not duties
        let duties: Vec<(String, String, String)> = ctx
            .inputs
            .job
            .responsibilities
            .iter()
            .filter(|raw| !raw.trim().is_empty())
            .enumerate()
            .map(|(index, raw)| (responsibility_id(index), raw.trim().to_string(), normalize(raw)))
            .collect();

        if duties.is_empty() {
            return Ok(StagePayload::Extract(ExtractionOutput {
                job,
                responsibilities: Vec::new(),
            }));
        }

        let listing: Vec<(String, String)> = duties
            .iter()
            .map(|(id, _, normalized)| (id.clone(), normalized.clone()))
            .collect();
        let reply: ClassificationReply = invoke_typed(
            ctx.services.model,
            &classification_prompt(&job, &listing),
            &classification_schema(),
        )?;

        let mut classified = BTreeMap::new();
        for (index, item) in reply.items.into_iter().enumerate() {
            if !duties.iter().any(|(id, _, _)| *id == item.id) {
                return Err(malformed(
                    format!("/items/{index}/id"),
                    format!("unknown responsibility '{}'", item.id),
                ));
            }
            let id = item.id.clone();
            if classified.insert(id.clone(), item).is_some() {
                return Err(malformed(
                    format!("/items/{index}/id"),
                    format!("responsibility '{id}' classified twice"),
                ));
            }
        }

        let mut responsibilities = Vec::with_capacity(duties.len());
        for (id, raw_text, normalized_text) in duties {
            let Some(item) = classified.remove(&id) else {
                return Err(malformed("/items".to_string(), format!("no classification for '{id}'")));
            };
            responsibilities.push(Responsibility {
                id,
                raw_text,
                normalized_text,
                category: item.category,
                importance: item.importance,
            });
        }

        info!(count = responsibilities.len(), "responsibilities extracted");
        Ok(StagePayload::Extract(ExtractionOutput {
            job,
            responsibilities,
        }))
    }
}

fn malformed(path: String, reason: String) -> CmError {
    CmError::MalformedReply {
        task: PromptTask::ClassifyResponsibilities.to_string(),
        path,
        reason,
    }
}
