//! Stage identifiers and the stage contract.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::context::StageContext;
use super::payload::StagePayload;
use crate::error::{CmError, Result};

/// The fixed stage order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageId {
    Extract,
    Map,
    Customize,
    Benchmark,
    Audit,
    Remediate,
    Rank,
}

impl StageId {
    pub const ALL: [Self; 7] = [
        Self::Extract,
        Self::Map,
        Self::Customize,
        Self::Benchmark,
        Self::Audit,
        Self::Remediate,
        Self::Rank,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Extract => "extract",
            Self::Map => "map",
            Self::Customize => "customize",
            Self::Benchmark => "benchmark",
            Self::Audit => "audit",
            Self::Remediate => "remediate",
            Self::Rank => "rank",
        }
    }

    /// Position in the fixed order.
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StageId {
    type Err = CmError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|stage| stage.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| CmError::StageNotFound(wanted.to_string()))
    }
}

/// Whether a stage runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", content = "reason", rename_all = "snake_case")]
pub enum Precondition {
    Ready,
    Skip(String),
}

/// One pipeline stage. Stages read the run through [`StageContext`] and
/// return a payload; they never touch the run state directly.
pub trait Stage: Send + Sync {
    fn id(&self) -> StageId;

    /// Checked against the current state before `execute`.
    fn precondition(&self, _ctx: &StageContext<'_>) -> Precondition {
        Precondition::Ready
    }

    fn execute(&self, ctx: &StageContext<'_>) -> Result<StagePayload>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_order_is_fixed() {
        let names: Vec<&str> = StageId::ALL.iter().map(|s| s.as_str()).collect();
        assert_eq!(
            names,
            vec!["extract", "map", "customize", "benchmark", "audit", "remediate", "rank"]
        );
        for (index, stage) in StageId::ALL.iter().enumerate() {
            assert_eq!(stage.index(), index);
        }
    }

    #[test]
    fn parses_stage_names() {
        assert_eq!("Audit".parse::<StageId>().unwrap(), StageId::Audit);
        let err = "publish".parse::<StageId>().unwrap_err();
        assert!(matches!(err, CmError::StageNotFound(name) if name == "publish"));
    }
}
