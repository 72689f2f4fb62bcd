//! Scripted `ModelService` for tests.
//!
//! Replies are queued per task; a task with no queued reply falls back to
//! the [`HeuristicModelService`]. Failures can be injected per task or for
//! every call, and every invocation is recorded for assertions.
//!
//! ```rust,ignore
//! let mock = MockModelService::new()
//!     .with_reply(PromptTask::ProposeCompetencies, json!({"competencies": []}))
//!     .fail_task(PromptTask::PlanRemediation, MockFailure::Unavailable);
//! ```

use std::collections::{BTreeMap, VecDeque};

use parking_lot::Mutex;
use serde_json::Value;

use super::{HeuristicModelService, ModelService, Prompt, PromptTask};
use crate::error::{CmError, Result};

/// Kind of failure to inject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockFailure {
    /// Behave like an unreachable service.
    Unavailable,
    /// Return this raw value instead of a valid reply.
    Garbage(Value),
}

#[derive(Debug, Default)]
struct Script {
    replies: BTreeMap<PromptTask, VecDeque<Value>>,
    failures: BTreeMap<PromptTask, MockFailure>,
    fail_all: Option<MockFailure>,
    calls: Vec<Prompt>,
}

#[derive(Debug, Default)]
pub struct MockModelService {
    script: Mutex<Script>,
    fallback: HeuristicModelService,
}

impl MockModelService {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reply for `task`. Replies are consumed in order; the last
    /// one is reused once the queue would otherwise empty.
    #[must_use]
    pub fn with_reply(self, task: PromptTask, reply: Value) -> Self {
        self.script
            .lock()
            .replies
            .entry(task)
            .or_default()
            .push_back(reply);
        self
    }

    #[must_use]
    pub fn fail_task(self, task: PromptTask, failure: MockFailure) -> Self {
        self.script.lock().failures.insert(task, failure);
        self
    }

    /// Fail every call.
    pub fn inject_failure(&self, failure: MockFailure) {
        self.script.lock().fail_all = Some(failure);
    }

    pub fn clear_failures(&self) {
        let mut script = self.script.lock();
        script.fail_all = None;
        script.failures.clear();
    }

    /// Tasks invoked so far, in order.
    pub fn calls(&self) -> Vec<PromptTask> {
        self.script.lock().calls.iter().map(|p| p.task).collect()
    }

    /// The last prompt sent for `task`.
    pub fn last_prompt(&self, task: PromptTask) -> Option<Prompt> {
        self.script
            .lock()
            .calls
            .iter()
            .rev()
            .find(|p| p.task == task)
            .cloned()
    }
}

impl ModelService for MockModelService {
    fn name(&self) -> &str {
        "mock"
    }

    fn invoke(&self, prompt: &Prompt, schema: &Value) -> Result<Value> {
        let scripted = {
            let mut script = self.script.lock();
            script.calls.push(prompt.clone());

            let failure = script
                .fail_all
                .clone()
                .or_else(|| script.failures.get(&prompt.task).cloned());
            match failure {
                Some(MockFailure::Unavailable) => {
                    return Err(CmError::ServiceUnavailable(format!(
                        "mock error: {}",
                        prompt.task
                    )));
                }
                Some(MockFailure::Garbage(value)) => return Ok(value),
                None => {}
            }

            script.replies.get_mut(&prompt.task).and_then(|queue| {
                if queue.len() > 1 {
                    queue.pop_front()
                } else {
                    queue.front().cloned()
                }
            })
        };

        match scripted {
            Some(reply) => Ok(reply),
            None => self.fallback.invoke(prompt, schema),
        }
    }
}
