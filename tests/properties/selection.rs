use cmap::config::{RankingConfig, ScoringConfig};
use cmap::ranking::{CriticalityRanker, StopReason};
use cmap::scoring::RelevanceScorer;
use cmap::similarity::EmbeddingSimilarity;
use proptest::prelude::*;

use super::arb_job;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn coverage_never_drops_as_selection_grows(
        (responsibilities, competencies) in arb_job(),
        min_coverage in 0.1f32..1.0,
    ) {
        let scoring = ScoringConfig::default();
        let similarity = EmbeddingSimilarity::default();
        let mappings = RelevanceScorer::new(&scoring, &similarity)
            .map_all(&responsibilities, &competencies)
            .mappings;

        let config = RankingConfig::default();
        let ranker = CriticalityRanker::new(&config);
        let ranked = ranker.rank(&competencies, &mappings, &responsibilities);
        let selection = ranker.select(&ranked, &responsibilities, min_coverage);

        for pair in selection.coverage_history.windows(2) {
            prop_assert!(pair[1] >= pair[0]);
        }
        prop_assert!(selection.selected.len() <= config.max_count);
        prop_assert!(selection.selected.len() <= ranked.len());
        prop_assert_eq!(selection.target_met, selection.coverage >= min_coverage);
        if selection.stop_reason == StopReason::TargetMet {
            prop_assert!(selection.target_met);
        }
        for gap in &selection.unmappable {
            prop_assert!(selection.gaps.contains(gap));
        }
    }

    #[test]
    fn ranking_is_sorted_by_weighted_total((responsibilities, competencies) in arb_job()) {
        let scoring = ScoringConfig::default();
        let similarity = EmbeddingSimilarity::default();
        let mappings = RelevanceScorer::new(&scoring, &similarity)
            .map_all(&responsibilities, &competencies)
            .mappings;
        let config = RankingConfig::default();
        let ranked = CriticalityRanker::new(&config).rank(&competencies, &mappings, &responsibilities);

        for pair in ranked.entries.windows(2) {
            prop_assert!(pair[0].score.weighted_total >= pair[1].score.weighted_total);
        }
        for (i, entry) in ranked.entries.iter().enumerate() {
            prop_assert_eq!(entry.rank, i + 1);
            prop_assert!(entry.score.in_bounds());
        }
    }
}
