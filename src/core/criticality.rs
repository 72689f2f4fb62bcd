//! Criticality scores produced by the ranker.

use serde::{Deserialize, Serialize};

use crate::config::FactorWeights;

pub const FACTOR_MAX: f32 = 10.0;

/// Rounding room above `FACTOR_MAX` for a total whose weights sum to 1.0
/// within the config tolerance.
const TOTAL_SLACK: f32 = 1e-3;

/// The six ranking factors, each on a 0-10 scale.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FactorScores {
    pub coverage_breadth: f32,
    pub impact_risk: f32,
    pub frequency: f32,
    pub complexity: f32,
    pub differentiation: f32,
    pub time_to_proficiency: f32,
}

impl FactorScores {
    #[must_use]
    pub fn weighted_total(&self, weights: &FactorWeights) -> f32 {
        weights.coverage_breadth * self.coverage_breadth
            + weights.impact_risk * self.impact_risk
            + weights.frequency * self.frequency
            + weights.complexity * self.complexity
            + weights.differentiation * self.differentiation
            + weights.time_to_proficiency * self.time_to_proficiency
    }

    #[must_use]
    pub const fn as_array(&self) -> [f32; 6] {
        [
            self.coverage_breadth,
            self.impact_risk,
            self.frequency,
            self.complexity,
            self.differentiation,
            self.time_to_proficiency,
        ]
    }

    #[must_use]
    pub fn in_bounds(&self) -> bool {
        self.as_array()
            .iter()
            .all(|v| v.is_finite() && (0.0..=FACTOR_MAX).contains(v))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriticalityScore {
    pub competency_id: String,
    pub factor_scores: FactorScores,
    pub weighted_total: f32,
}

impl CriticalityScore {
    #[must_use]
    pub fn in_bounds(&self) -> bool {
        self.factor_scores.in_bounds()
            && self.weighted_total.is_finite()
            && (0.0..=FACTOR_MAX + TOTAL_SLACK).contains(&self.weighted_total)
    }
}
