//! Standardized error codes for machine-parseable output.
//!
//! Error codes follow a numeric taxonomy:
//! - 1xx: Input errors
//! - 2xx: Pipeline and gate errors
//! - 3xx: Config errors
//! - 5xx: Service errors (model service, document store)
//! - 6xx: Storage errors
//! - 9xx: Internal errors

use serde::{Deserialize, Serialize};

/// Standardized error codes for robot mode output.
///
/// Each variant maps to a numeric code (e.g., `GateBlocked` -> E201).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // ========================================
    // Input errors (1xx)
    // ========================================
    /// E101: Input table is malformed or violates its shape
    InputInvalid,
    /// E102: Requested job is not present in the input table
    JobNotFound,
    /// E103: Input file could not be parsed
    InputParseError,

    // ========================================
    // Pipeline errors (2xx)
    // ========================================
    /// E201: A quality gate blocked the pipeline
    GateBlocked,
    /// E202: A traceability invariant was violated
    IntegrityViolation,
    /// E203: Unknown stage name
    StageNotFound,
    /// E204: Resume point is not reachable from the persisted state
    ResumeInvalid,
    /// E205: No persisted run with the given id
    RunNotFound,
    /// E206: Some jobs of a multi-job run did not complete
    BatchIncomplete,

    // ========================================
    // Config errors (3xx)
    // ========================================
    /// E301: Config file not found
    ConfigNotFound,
    /// E302: Config has invalid values (weights, thresholds, ranges)
    ConfigInvalid,
    /// E303: Config file has invalid syntax
    ConfigParseError,

    // ========================================
    // Service errors (5xx)
    // ========================================
    /// E501: Model service unreachable or returned an error
    ServiceUnavailable,
    /// E502: Model service reply failed schema validation
    MalformedReply,
    /// E503: Document store failed
    DocumentStoreError,

    // ========================================
    // Storage errors (6xx)
    // ========================================
    /// E601: Database operation failed
    DatabaseError,
    /// E602: Serialization/deserialization failed
    SerializationError,
    /// E603: IO operation failed
    IoError,

    // ========================================
    // Internal errors (9xx)
    // ========================================
    /// E901: Unexpected internal error
    InternalError,
    /// E902: Generic not found (catch-all)
    NotFound,
}

impl ErrorCode {
    /// Get the numeric error code (e.g., `GateBlocked` -> 201).
    #[must_use]
    pub const fn numeric(&self) -> u16 {
        match self {
            Self::InputInvalid => 101,
            Self::JobNotFound => 102,
            Self::InputParseError => 103,

            Self::GateBlocked => 201,
            Self::IntegrityViolation => 202,
            Self::StageNotFound => 203,
            Self::ResumeInvalid => 204,
            Self::RunNotFound => 205,
            Self::BatchIncomplete => 206,

            Self::ConfigNotFound => 301,
            Self::ConfigInvalid => 302,
            Self::ConfigParseError => 303,

            Self::ServiceUnavailable => 501,
            Self::MalformedReply => 502,
            Self::DocumentStoreError => 503,

            Self::DatabaseError => 601,
            Self::SerializationError => 602,
            Self::IoError => 603,

            Self::InternalError => 901,
            Self::NotFound => 902,
        }
    }

    /// Get the error code as a formatted string (e.g., "E201").
    #[must_use]
    pub fn code_string(&self) -> String {
        format!("E{}", self.numeric())
    }

    /// Get the default suggestion for this error code.
    #[must_use]
    pub const fn suggestion(&self) -> &'static str {
        match self {
            Self::InputInvalid => {
                "Check that every job has a title and at least one non-empty responsibility"
            }
            Self::JobNotFound => "Run without --job to process every job, or check the title",
            Self::InputParseError => "Input must be JSON (.json) or YAML (.yaml/.yml)",

            Self::GateBlocked => {
                "Inspect the blocking rules with `cmap runs show <run-id>`, fix the inputs, then `cmap resume`"
            }
            Self::IntegrityViolation => {
                "A mapping or finding references an unknown id; re-run from the extract stage"
            }
            Self::StageNotFound => {
                "Valid stages: extract, map, customize, benchmark, audit, remediate, rank"
            }
            Self::ResumeInvalid => "Resume from an earlier stage, or start a fresh run",
            Self::RunNotFound => "List persisted runs with `cmap runs list`",
            Self::BatchIncomplete => {
                "Completed jobs are persisted; inspect the failed ones with `cmap runs show <run-id>`"
            }

            Self::ConfigNotFound => "Create cmap.toml or pass --config",
            Self::ConfigInvalid => "Run `cmap config validate` to see the offending values",
            Self::ConfigParseError => "Check the TOML syntax of your config file",

            Self::ServiceUnavailable => {
                "Check [model] endpoint and credentials, or use backend = \"heuristic\""
            }
            Self::MalformedReply => {
                "The model service returned output that does not match the expected schema; retry the stage"
            }
            Self::DocumentStoreError => "Check the reference documents directory",

            Self::DatabaseError => "Check that the run database is writable",
            Self::SerializationError => "The persisted artifact may be from an incompatible version",
            Self::IoError => "Check file paths and permissions",

            Self::InternalError => "This is a bug; please report it with the run id",
            Self::NotFound => "Check the identifier and try again",
        }
    }

    /// Check if this error is potentially recoverable by the user.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            Self::IntegrityViolation | Self::SerializationError | Self::InternalError
        )
    }

    /// Get the category name for this error code.
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match self.numeric() / 100 {
            1 => "input",
            2 => "pipeline",
            3 => "config",
            5 => "service",
            6 => "storage",
            _ => "internal",
        }
    }

    /// Iterate over every defined code.
    pub fn all() -> impl Iterator<Item = Self> {
        [
            Self::InputInvalid,
            Self::JobNotFound,
            Self::InputParseError,
            Self::GateBlocked,
            Self::IntegrityViolation,
            Self::StageNotFound,
            Self::ResumeInvalid,
            Self::RunNotFound,
            Self::BatchIncomplete,
            Self::ConfigNotFound,
            Self::ConfigInvalid,
            Self::ConfigParseError,
            Self::ServiceUnavailable,
            Self::MalformedReply,
            Self::DocumentStoreError,
            Self::DatabaseError,
            Self::SerializationError,
            Self::IoError,
            Self::InternalError,
            Self::NotFound,
        ]
        .into_iter()
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code_string())
    }
}
