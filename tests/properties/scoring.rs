use cmap::config::ScoringConfig;
use cmap::core::Contribution;
use cmap::scoring::RelevanceScorer;
use cmap::similarity::EmbeddingSimilarity;
use proptest::prelude::*;

use super::arb_job;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn retained_mappings_respect_min_relevance((responsibilities, competencies) in arb_job()) {
        let config = ScoringConfig::default();
        let similarity = EmbeddingSimilarity::default();
        let scorer = RelevanceScorer::new(&config, &similarity);
        let set = scorer.map_all(&responsibilities, &competencies);

        for mapping in &set.mappings {
            prop_assert!(mapping.relevance_score >= config.min_relevance);
            prop_assert_ne!(mapping.contribution, Contribution::None);
        }
        let pairs = responsibilities.len() * competencies.len();
        prop_assert_eq!(set.mappings.len() + set.rejected_pairs, pairs);
    }

    #[test]
    fn every_signal_stays_in_unit_range((responsibilities, competencies) in arb_job()) {
        let config = ScoringConfig::default();
        let similarity = EmbeddingSimilarity::default();
        let scorer = RelevanceScorer::new(&config, &similarity).with_family("finance");
        for responsibility in &responsibilities {
            for competency in &competencies {
                let score = scorer.score(responsibility, competency);
                for signal in [score.semantic, score.lexical, score.contextual, score.combined] {
                    prop_assert!((0.0..=1.0).contains(&signal), "signal {signal} out of range");
                }
            }
        }
    }

    #[test]
    fn unmapped_list_matches_retained_mappings((responsibilities, competencies) in arb_job()) {
        let config = ScoringConfig::default();
        let similarity = EmbeddingSimilarity::default();
        let set = RelevanceScorer::new(&config, &similarity).map_all(&responsibilities, &competencies);
        for responsibility in &responsibilities {
            let mapped = set.mappings.iter().any(|m| m.responsibility_id == responsibility.id);
            prop_assert_eq!(mapped, !set.unmapped.contains(&responsibility.id));
        }
    }
}
