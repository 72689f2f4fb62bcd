//! Scored links between responsibilities and competencies.

use serde::{Deserialize, Serialize};

/// Strength of a mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Contribution {
    Primary,
    Secondary,
    Supporting,
    None,
}

impl Contribution {
    /// PRIMARY and SECONDARY count toward coverage.
    #[must_use]
    pub const fn is_covering(self) -> bool {
        matches!(self, Self::Primary | Self::Secondary)
    }

    /// Multiplier applied to importance in the impact factor.
    #[must_use]
    pub const fn impact_weight(self) -> f32 {
        match self {
            Self::Primary => 1.0,
            Self::Secondary => 0.7,
            Self::Supporting => 0.4,
            Self::None => 0.0,
        }
    }

    /// Depth of mastery implied by the tier.
    #[must_use]
    pub const fn depth(self) -> f32 {
        match self {
            Self::Primary => 1.0,
            Self::Secondary => 0.6,
            Self::Supporting => 0.3,
            Self::None => 0.0,
        }
    }
}

/// The three independent relevance signals.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub semantic: f32,
    pub lexical: f32,
    pub contextual: f32,
}

/// Scorer output: the breakdown plus the weighted blend.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RelevanceScore {
    pub semantic: f32,
    pub lexical: f32,
    pub contextual: f32,
    pub combined: f32,
}

impl RelevanceScore {
    #[must_use]
    pub const fn breakdown(&self) -> ScoreBreakdown {
        ScoreBreakdown {
            semantic: self.semantic,
            lexical: self.lexical,
            contextual: self.contextual,
        }
    }
}

/// A retained link. Only built for scores at or above the relevance
/// threshold, so `contribution` is never `None` here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mapping {
    pub responsibility_id: String,
    pub competency_id: String,
    pub relevance_score: f32,
    pub contribution: Contribution,
    pub score_breakdown: ScoreBreakdown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn covering_tiers() {
        assert!(Contribution::Primary.is_covering());
        assert!(Contribution::Secondary.is_covering());
        assert!(!Contribution::Supporting.is_covering());
        assert!(!Contribution::None.is_covering());
    }

    #[test]
    fn contribution_serializes_upper_case() {
        let json = serde_json::to_string(&Contribution::Secondary).unwrap();
        assert_eq!(json, "\"SECONDARY\"");
    }
}
