//! Overlap findings against the protected reference set.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OverlapClass {
    None,
    Minor,
    Material,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum FindingStatus {
    Active,
    /// Invalidated by a rewrite of the competency to `by_version`.
    Superseded { by_version: u32 },
    /// The competency was removed or replaced.
    Withdrawn,
}

/// Similarity between one competency version and one protected reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlapFinding {
    pub id: String,
    pub competency_id: String,
    /// Competency version the similarity was computed against.
    pub competency_version: u32,
    pub reference_id: String,
    pub similarity: f32,
    pub classification: OverlapClass,
    pub status: FindingStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl OverlapFinding {
    #[must_use]
    pub fn finding_id(competency_id: &str, version: u32, reference_id: &str) -> String {
        format!("{competency_id}@v{version}~{reference_id}")
    }

    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self.status, FindingStatus::Active)
    }

    /// Active MINOR or MATERIAL finding.
    #[must_use]
    pub const fn needs_attention(&self) -> bool {
        self.is_active()
            && matches!(
                self.classification,
                OverlapClass::Minor | OverlapClass::Material
            )
    }
}
