//! Relevance scoring between responsibilities and competencies.
//!
//! Three independent signals, blended with fixed weights:
//!
//! 1. **Semantic**: hash-embedding cosine of the responsibility text and
//!    the competency name + definition
//! 2. **Lexical**: overlap coefficient of technical-term sets
//! 3. **Contextual**: competency tags against the responsibility category
//!    and the job family
//!
//! Every score is logged at `debug` with its breakdown.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ScoringConfig;
use crate::core::{Competency, Contribution, Mapping, RelevanceScore, Responsibility};
use crate::similarity::{Similarity, overlap_coefficient, technical_terms};

const CATEGORY_MATCH: f32 = 0.8;
const FAMILY_MATCH: f32 = 0.2;
const UNTAGGED: f32 = 0.3;

/// Result of scoring every responsibility against every candidate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MappingSet {
    pub mappings: Vec<Mapping>,
    /// Responsibilities with no retained mapping.
    pub unmapped: Vec<String>,
    /// Pairs that scored below the relevance threshold.
    pub rejected_pairs: usize,
}

pub struct RelevanceScorer<'a> {
    config: &'a ScoringConfig,
    similarity: &'a dyn Similarity,
    family: String,
}

impl<'a> RelevanceScorer<'a> {
    pub fn new(config: &'a ScoringConfig, similarity: &'a dyn Similarity) -> Self {
        Self {
            config,
            similarity,
            family: String::new(),
        }
    }

    /// Job family used by the contextual signal.
    #[must_use]
    pub fn with_family(mut self, family: &str) -> Self {
        self.family = family.trim().to_lowercase();
        self
    }

    /// Score one pair. Always returns the full breakdown.
    #[must_use]
    pub fn score(&self, responsibility: &Responsibility, competency: &Competency) -> RelevanceScore {
        let semantic = self
            .similarity
            .similarity(&responsibility.normalized_text, &competency.summary_text())
            .clamp(0.0, 1.0);
        let lexical = overlap_coefficient(
            &technical_terms(&responsibility.normalized_text),
            &technical_terms(&competency.profile_text()),
        );
        let contextual = self.contextual(responsibility, competency);

        let combined = (self.config.semantic_weight * semantic
            + self.config.lexical_weight * lexical
            + self.config.contextual_weight * contextual)
            .clamp(0.0, 1.0);

        debug!(
            responsibility = %responsibility.id,
            competency = %competency.id,
            semantic,
            lexical,
            contextual,
            combined,
            "relevance scored"
        );

        RelevanceScore {
            semantic,
            lexical,
            contextual,
            combined,
        }
    }

    fn contextual(&self, responsibility: &Responsibility, competency: &Competency) -> f32 {
        if competency.tags.is_empty() {
            return UNTAGGED;
        }
        let category = if competency
            .tags
            .iter()
            .any(|tag| responsibility.category.matches_tag(tag))
        {
            CATEGORY_MATCH
        } else {
            0.0
        };
        let family = if !self.family.is_empty()
            && competency
                .tags
                .iter()
                .any(|tag| tag.trim().eq_ignore_ascii_case(&self.family))
        {
            FAMILY_MATCH
        } else {
            0.0
        };
        (category + family).clamp(0.0, 1.0)
    }

    /// Tier for a combined score; `None` below the relevance threshold.
    #[must_use]
    pub fn contribution(&self, combined: f32) -> Contribution {
        if combined >= self.config.primary_threshold {
            Contribution::Primary
        } else if combined >= self.config.secondary_threshold {
            Contribution::Secondary
        } else if combined >= self.config.min_relevance {
            Contribution::Supporting
        } else {
            Contribution::None
        }
    }

    /// A mapping for the pair, or `None` when it falls below threshold.
    #[must_use]
    pub fn map(&self, responsibility: &Responsibility, competency: &Competency) -> Option<Mapping> {
        let score = self.score(responsibility, competency);
        let contribution = self.contribution(score.combined);
        if contribution == Contribution::None {
            return None;
        }
        Some(Mapping {
            responsibility_id: responsibility.id.clone(),
            competency_id: competency.id.clone(),
            relevance_score: score.combined,
            contribution,
            score_breakdown: score.breakdown(),
        })
    }

    /// Score a responsibility against every candidate, best first. Equal
    /// scores keep candidate insertion order.
    #[must_use]
    pub fn rank_candidates<'c>(
        &self,
        responsibility: &Responsibility,
        candidates: &'c [Competency],
    ) -> Vec<(&'c Competency, RelevanceScore)> {
        let mut scored: Vec<_> = candidates
            .iter()
            .map(|candidate| (candidate, self.score(responsibility, candidate)))
            .collect();
        // sort_by is stable
        scored.sort_by(|a, b| {
            b.1.combined
                .partial_cmp(&a.1.combined)
                .unwrap_or(Ordering::Equal)
        });
        scored
    }

    /// Map every responsibility against every active candidate.
    #[must_use]
    pub fn map_all(
        &self,
        responsibilities: &[Responsibility],
        candidates: &[Competency],
    ) -> MappingSet {
        let active: Vec<Competency> = candidates
            .iter()
            .filter(|c| c.is_active())
            .cloned()
            .collect();

        let mut set = MappingSet::default();
        for responsibility in responsibilities {
            let mut retained = 0usize;
            for (competency, score) in self.rank_candidates(responsibility, &active) {
                let contribution = self.contribution(score.combined);
                if contribution == Contribution::None {
                    set.rejected_pairs += 1;
                    continue;
                }
                retained += 1;
                set.mappings.push(Mapping {
                    responsibility_id: responsibility.id.clone(),
                    competency_id: competency.id.clone(),
                    relevance_score: score.combined,
                    contribution,
                    score_breakdown: score.breakdown(),
                });
            }
            if retained == 0 {
                set.unmapped.push(responsibility.id.clone());
            }
        }
        set
    }

    /// Map one competency against the given responsibilities, in order.
    #[must_use]
    pub fn map_competency(
        &self,
        responsibilities: &[&Responsibility],
        competency: &Competency,
    ) -> Vec<Mapping> {
        responsibilities
            .iter()
            .filter_map(|responsibility| self.map(responsibility, competency))
            .collect()
    }
}
