//! Competencies and their revision history.

use serde::{Deserialize, Serialize};

/// Where a competency came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceTier {
    /// Curated catalog supplied with the input.
    Catalog,
    /// Proposed by the model service during mapping.
    Generated,
    /// Protected reference set (never selected, only compared against).
    Protected,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProficiencyLevel {
    pub level: u8,
    pub label: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CompetencyStatus {
    Active,
    Superseded {
        reason: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        replaced_by: Option<String>,
    },
}

/// A named, defined skill. Rewrites bump `version`; superseded
/// competencies stay in the run for audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Competency {
    pub id: String,
    pub name: String,
    pub definition: String,
    #[serde(default)]
    pub indicators: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub source_tier: SourceTier,
    #[serde(default)]
    pub proficiency_levels: Vec<ProficiencyLevel>,
    #[serde(default = "first_version")]
    pub version: u32,
    #[serde(default = "active_status")]
    pub status: CompetencyStatus,
}

const fn first_version() -> u32 {
    1
}

const fn active_status() -> CompetencyStatus {
    CompetencyStatus::Active
}

impl Competency {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        definition: impl Into<String>,
        source_tier: SourceTier,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            definition: definition.into(),
            indicators: Vec::new(),
            tags: Vec::new(),
            source_tier,
            proficiency_levels: Vec::new(),
            version: 1,
            status: CompetencyStatus::Active,
        }
    }

    #[must_use]
    pub fn with_indicators(mut self, indicators: Vec<String>) -> Self {
        self.indicators = indicators;
        self
    }

    #[must_use]
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self.status, CompetencyStatus::Active)
    }

    /// Name and definition; what the semantic signal compares.
    #[must_use]
    pub fn summary_text(&self) -> String {
        format!("{} {}", self.name, self.definition)
    }

    /// Name, definition and indicators; what the lexical signal compares.
    #[must_use]
    pub fn profile_text(&self) -> String {
        let mut text = self.summary_text();
        for indicator in &self.indicators {
            text.push(' ');
            text.push_str(indicator);
        }
        text
    }

    /// Copy with a rewritten definition and indicators at the next version.
    #[must_use]
    pub fn revised(&self, definition: String, indicators: Vec<String>) -> Self {
        Self {
            definition,
            indicators,
            version: self.version + 1,
            ..self.clone()
        }
    }

    pub fn supersede(&mut self, reason: impl Into<String>, replaced_by: Option<String>) {
        self.status = CompetencyStatus::Superseded {
            reason: reason.into(),
            replaced_by,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Competency {
        Competency::new(
            "C-api-design",
            "API Design",
            "designs stable service interfaces",
            SourceTier::Catalog,
        )
        .with_indicators(vec!["documents contracts".into(), "versions endpoints".into()])
    }

    #[test]
    fn revised_bumps_version_and_keeps_identity() {
        let original = sample();
        let revised = original.revised("narrowed definition".into(), vec![]);
        assert_eq!(revised.id, original.id);
        assert_eq!(revised.name, original.name);
        assert_eq!(revised.version, 2);
        assert_eq!(revised.definition, "narrowed definition");
        assert_eq!(original.version, 1);
    }

    #[test]
    fn supersede_marks_inactive() {
        let mut competency = sample();
        assert!(competency.is_active());
        competency.supersede("overlaps leadership", Some("C-other".into()));
        assert!(!competency.is_active());
        assert_eq!(
            competency.status,
            CompetencyStatus::Superseded {
                reason: "overlaps leadership".into(),
                replaced_by: Some("C-other".into()),
            }
        );
    }

    #[test]
    fn profile_text_includes_indicators() {
        let text = sample().profile_text();
        assert!(text.starts_with("API Design designs"));
        assert!(text.contains("versions endpoints"));
        assert!(!sample().summary_text().contains("versions endpoints"));
    }

    #[test]
    fn deserializes_with_defaults() {
        let competency: Competency = serde_json::from_str(
            r#"{"id":"C1","name":"N","definition":"D","source_tier":"catalog"}"#,
        )
        .unwrap();
        assert_eq!(competency.version, 1);
        assert!(competency.is_active());
        assert!(competency.indicators.is_empty());
    }
}
