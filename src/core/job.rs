//! Jobs and the responsibilities extracted from them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CmError;

/// One row of the normalized input table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobInput {
    pub title: String,
    #[serde(default)]
    pub family: String,
    #[serde(default)]
    pub level: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub responsibilities: Vec<String>,
}

impl JobInput {
    #[must_use]
    pub fn profile(&self) -> JobProfile {
        JobProfile {
            title: self.title.trim().to_string(),
            family: self.family.trim().to_string(),
            level: self.level.trim().to_string(),
            summary: self.summary.trim().to_string(),
        }
    }
}

/// Job metadata carried through the run, without the raw duty list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobProfile {
    pub title: String,
    pub family: String,
    pub level: String,
    pub summary: String,
}

/// Work-context category of a responsibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Technical,
    Operational,
    Strategic,
    Compliance,
    Collaboration,
    Other,
}

impl Category {
    pub const ALL: [Self; 6] = [
        Self::Technical,
        Self::Operational,
        Self::Strategic,
        Self::Compliance,
        Self::Collaboration,
        Self::Other,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Technical => "technical",
            Self::Operational => "operational",
            Self::Strategic => "strategic",
            Self::Compliance => "compliance",
            Self::Collaboration => "collaboration",
            Self::Other => "other",
        }
    }

    /// Stems that signal this category in free text and in competency tags.
    #[must_use]
    pub const fn keywords(self) -> &'static [&'static str] {
        match self {
            Self::Technical => &[
                "technical",
                "engineer",
                "software",
                "system",
                "data",
                "code",
                "develop",
                "architect",
                "infrastructure",
                "security",
                "network",
                "database",
                "api",
                "platform",
                "automat",
            ],
            Self::Operational => &[
                "operation",
                "operate",
                "monitor",
                "maintain",
                "process",
                "schedul",
                "deliver",
                "incident",
                "execut",
                "logistic",
                "on-call",
            ],
            Self::Strategic => &[
                "strateg",
                "plan",
                "roadmap",
                "vision",
                "direction",
                "initiative",
                "budget",
                "growth",
                "prioriti",
            ],
            Self::Compliance => &[
                "complian",
                "regulat",
                "policy",
                "policies",
                "audit",
                "risk",
                "legal",
                "governance",
                "safety",
                "standard",
            ],
            Self::Collaboration => &[
                "collaborat",
                "stakeholder",
                "team",
                "communicat",
                "coordinat",
                "partner",
                "mentor",
                "cross-functional",
                "present",
            ],
            Self::Other => &[],
        }
    }

    /// How often work in this category recurs, on a 0-10 scale.
    #[must_use]
    pub const fn frequency_points(self) -> f32 {
        match self {
            Self::Operational => 10.0,
            Self::Technical => 8.0,
            Self::Compliance | Self::Collaboration => 6.0,
            Self::Strategic => 4.0,
            Self::Other => 5.0,
        }
    }

    /// Keyword-count classification; ties go to the earlier category.
    #[must_use]
    pub fn infer(text: &str) -> Self {
        let lowered = text.to_lowercase();
        let tokens: Vec<&str> = lowered
            .split(|c: char| !(c.is_alphanumeric() || c == '-'))
            .filter(|t| !t.is_empty())
            .collect();

        let mut best = (Self::Other, 0usize);
        for category in Self::ALL {
            let hits = tokens
                .iter()
                .filter(|token| category.keywords().iter().any(|k| token.starts_with(k)))
                .count();
            if hits > best.1 {
                best = (category, hits);
            }
        }
        best.0
    }

    /// Whether a competency tag names this category or one of its stems.
    #[must_use]
    pub fn matches_tag(self, tag: &str) -> bool {
        let tag = tag.trim().to_lowercase();
        if tag == self.as_str() {
            return true;
        }
        self.keywords().iter().any(|k| tag.starts_with(k))
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = CmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| CmError::InvalidInput(format!("unknown category: {s}")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Importance {
    High,
    Medium,
    Low,
}

impl Importance {
    #[must_use]
    pub const fn points(self) -> f32 {
        match self {
            Self::High => 10.0,
            Self::Medium => 6.0,
            Self::Low => 3.0,
        }
    }
}

/// One duty statement. Immutable once extracted; `id` is the
/// traceability key every mapping points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Responsibility {
    pub id: String,
    pub raw_text: String,
    pub normalized_text: String,
    pub category: Category,
    pub importance: Importance,
}

/// Id for the responsibility at `index` (0-based) in input order.
#[must_use]
pub fn responsibility_id(index: usize) -> String {
    format!("R{:02}", index + 1)
}
