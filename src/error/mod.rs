//! Error handling for cmap.
//!
//! This module provides:
//! - [`CmError`]: The main error enum for all pipeline operations
//! - [`ErrorCode`]: Standardized error codes for machine parsing
//! - [`StructuredError`]: Rich error type for robot mode output

mod codes;

use std::io;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub use codes::ErrorCode;

use crate::pipeline::PipelineFailure;

/// Main error type for cmap operations.
#[derive(Error, Debug)]
pub enum CmError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Model service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Malformed model reply for {task} at {path}: {reason}")]
    MalformedReply {
        task: String,
        path: String,
        reason: String,
    },

    #[error("Document store error: {0}")]
    DocumentStore(String),

    #[error("Document index error: {0}")]
    SearchIndex(#[from] tantivy::TantivyError),

    #[error("{0}")]
    GateBlocked(Box<PipelineFailure>),

    #[error("Integrity violation: {0}")]
    IntegrityViolation(String),

    #[error("Unknown stage: {0}")]
    StageNotFound(String),

    #[error("Run not found: {0}")]
    RunNotFound(String),

    #[error("Cannot resume run {run_id} from {stage}: {reason}")]
    ResumeInvalid {
        run_id: String,
        stage: String,
        reason: String,
    },

    #[error("{failed} of {total} jobs did not complete")]
    BatchIncomplete {
        total: usize,
        failed: usize,
        /// How many of the failures were gate blocks.
        halted: usize,
        outcomes: Vec<Value>,
    },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl CmError {
    /// Get the error code for this error.
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Io(_) => ErrorCode::IoError,
            Self::Database(_) => ErrorCode::DatabaseError,
            Self::Json(_) | Self::Yaml(_) | Self::Serialization(_) => ErrorCode::SerializationError,
            Self::Config(_) => ErrorCode::ConfigInvalid,
            Self::ConfigNotFound(_) => ErrorCode::ConfigNotFound,
            Self::InvalidInput(_) => ErrorCode::InputInvalid,
            Self::JobNotFound(_) => ErrorCode::JobNotFound,
            Self::ServiceUnavailable(_) => ErrorCode::ServiceUnavailable,
            Self::MalformedReply { .. } => ErrorCode::MalformedReply,
            Self::DocumentStore(_) | Self::SearchIndex(_) => ErrorCode::DocumentStoreError,
            Self::GateBlocked(_) => ErrorCode::GateBlocked,
            Self::IntegrityViolation(_) => ErrorCode::IntegrityViolation,
            Self::StageNotFound(_) => ErrorCode::StageNotFound,
            Self::RunNotFound(_) => ErrorCode::RunNotFound,
            Self::ResumeInvalid { .. } => ErrorCode::ResumeInvalid,
            Self::BatchIncomplete { .. } => ErrorCode::BatchIncomplete,
            Self::NotFound(_) => ErrorCode::NotFound,
        }
    }

    /// Get context information for this error as JSON.
    #[must_use]
    pub fn context(&self) -> Option<Value> {
        match self {
            Self::GateBlocked(failure) => Some(failure.diagnostics()),
            Self::MalformedReply { task, path, reason } => {
                Some(serde_json::json!({ "task": task, "path": path, "reason": reason }))
            }
            Self::ResumeInvalid {
                run_id,
                stage,
                reason,
            } => Some(serde_json::json!({ "run_id": run_id, "stage": stage, "reason": reason })),
            Self::RunNotFound(run_id) => Some(serde_json::json!({ "run_id": run_id })),
            Self::JobNotFound(title) => Some(serde_json::json!({ "job": title })),
            Self::BatchIncomplete {
                total,
                failed,
                halted,
                outcomes,
            } => Some(serde_json::json!({
                "total": total,
                "failed": failed,
                "halted": halted,
                "jobs": outcomes,
            })),
            _ => None,
        }
    }

    /// The pipeline failure carried by a gate block, if any.
    #[must_use]
    pub fn as_pipeline_failure(&self) -> Option<&PipelineFailure> {
        match self {
            Self::GateBlocked(failure) => Some(failure),
            _ => None,
        }
    }

    /// Whether every failure behind this error is a gate block.
    #[must_use]
    pub const fn is_gate_block(&self) -> bool {
        match self {
            Self::GateBlocked(_) => true,
            Self::BatchIncomplete { failed, halted, .. } => *failed == *halted,
            _ => false,
        }
    }

    /// Convert this error to a structured error.
    #[must_use]
    pub fn to_structured(&self) -> StructuredError {
        StructuredError::from_cm_error(self)
    }
}

impl From<PipelineFailure> for CmError {
    fn from(failure: PipelineFailure) -> Self {
        Self::GateBlocked(Box::new(failure))
    }
}

/// A structured error with machine-readable code, suggestion, and context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredError {
    /// The error code (e.g., "GATE_BLOCKED")
    pub code: ErrorCode,

    /// The numeric error code (e.g., 201)
    pub numeric_code: u16,

    /// Human-readable error message
    pub message: String,

    /// Actionable suggestion for recovery
    pub suggestion: String,

    /// Additional context for debugging
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,

    /// Whether this error is potentially recoverable by the user
    pub recoverable: bool,

    /// Error category (e.g., "pipeline", "config", "service")
    pub category: String,
}

impl StructuredError {
    /// Create a new structured error.
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            numeric_code: code.numeric(),
            suggestion: code.suggestion().to_string(),
            context: None,
            recoverable: code.is_recoverable(),
            category: code.category().to_string(),
            code,
            message: message.into(),
        }
    }

    /// Create a structured error from a `CmError`.
    #[must_use]
    pub fn from_cm_error(err: &CmError) -> Self {
        let code = err.code();
        Self {
            code,
            numeric_code: code.numeric(),
            message: err.to_string(),
            suggestion: code.suggestion().to_string(),
            context: err.context(),
            recoverable: code.is_recoverable(),
            category: code.category().to_string(),
        }
    }

    /// Add context to this error.
    #[must_use]
    pub fn with_context(mut self, context: Value) -> Self {
        self.context = Some(context);
        self
    }
}

impl std::fmt::Display for StructuredError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl From<&CmError> for StructuredError {
    fn from(err: &CmError) -> Self {
        Self::from_cm_error(err)
    }
}

/// Result type alias using `CmError`.
pub type Result<T> = std::result::Result<T, CmError>;
