//! Criticality ranking and coverage-driven selection.
//!
//! Six factors per competency, each 0-10 and computed from the mapping
//! set alone, blended with the `[ranking.weights]`. Selection starts from
//! the top `min_count` and grows one competency at a time until coverage
//! reaches `min_coverage` or the selection hits `max_count`.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::RankingConfig;
use crate::core::{
    Category, Competency, CriticalityScore, FACTOR_MAX, FactorScores, Mapping, Responsibility,
};

/// Fraction of `responsibilities` with at least one PRIMARY or SECONDARY
/// mapping to a competency in `competency_ids`, plus the uncovered ids in
/// responsibility order.
#[must_use]
pub fn coverage_of(
    responsibilities: &[Responsibility],
    mappings: &[Mapping],
    competency_ids: &BTreeSet<&str>,
) -> (f32, Vec<String>) {
    let covered: BTreeSet<&str> = mappings
        .iter()
        .filter(|m| m.contribution.is_covering())
        .filter(|m| competency_ids.contains(m.competency_id.as_str()))
        .map(|m| m.responsibility_id.as_str())
        .collect();

    let uncovered: Vec<String> = responsibilities
        .iter()
        .filter(|r| !covered.contains(r.id.as_str()))
        .map(|r| r.id.clone())
        .collect();

    (ratio(responsibilities.len() - uncovered.len(), responsibilities.len()), uncovered)
}

#[allow(clippy::cast_precision_loss)]
fn ratio(part: usize, whole: usize) -> f32 {
    if whole == 0 {
        0.0
    } else {
        part as f32 / whole as f32
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedEntry {
    /// 1-based position.
    pub rank: usize,
    pub competency_id: String,
    pub name: String,
    pub score: CriticalityScore,
    /// Responsibilities this competency covers (PRIMARY or SECONDARY).
    pub covers: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RankedList {
    pub entries: Vec<RankedEntry>,
}

impl RankedList {
    #[must_use]
    pub fn ids(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.competency_id.as_str()).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    TargetMet,
    /// Coverage still short at `max_count`.
    MaxCount,
    /// Ran out of ranked competencies before either limit.
    Exhausted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    pub selected: Vec<String>,
    pub coverage: f32,
    /// Coverage after the initial cut and after each added competency.
    pub coverage_history: Vec<f32>,
    pub min_coverage: f32,
    pub target_met: bool,
    /// Responsibilities the selection leaves uncovered.
    pub gaps: Vec<String>,
    /// Responsibilities no ranked competency covers at all.
    pub unmappable: Vec<String>,
    pub stop_reason: StopReason,
}

pub struct CriticalityRanker<'a> {
    config: &'a RankingConfig,
}

impl<'a> CriticalityRanker<'a> {
    pub const fn new(config: &'a RankingConfig) -> Self {
        Self { config }
    }

    /// Score and sort the active competencies that have at least one
    /// mapping. Sorted by total descending, then coverage breadth
    /// descending, then input order.
    #[must_use]
    pub fn rank(
        &self,
        competencies: &[Competency],
        mappings: &[Mapping],
        responsibilities: &[Responsibility],
    ) -> RankedList {
        let by_id: BTreeMap<&str, &Responsibility> = responsibilities
            .iter()
            .map(|r| (r.id.as_str(), r))
            .collect();
        let job_categories: BTreeSet<Category> =
            responsibilities.iter().map(|r| r.category).collect();

        let candidates: Vec<(&Competency, Vec<&Mapping>)> = competencies
            .iter()
            .filter(|c| c.is_active())
            .map(|c| {
                let own: Vec<&Mapping> = mappings
                    .iter()
                    .filter(|m| m.competency_id == c.id)
                    .filter(|m| by_id.contains_key(m.responsibility_id.as_str()))
                    .collect();
                (c, own)
            })
            .filter(|(_, own)| !own.is_empty())
            .collect();

        // responsibility id -> number of ranked competencies covering it
        let mut holders: BTreeMap<&str, usize> = BTreeMap::new();
        for (_, own) in &candidates {
            for mapping in own.iter().filter(|m| m.contribution.is_covering()) {
                *holders.entry(mapping.responsibility_id.as_str()).or_default() += 1;
            }
        }

        let mut entries: Vec<RankedEntry> = candidates
            .iter()
            .map(|(competency, own)| {
                let factors = Self::factors(own, &by_id, &job_categories, &holders);
                let weighted_total = factors.weighted_total(&self.config.weights);
                debug!(
                    competency = %competency.id,
                    ?factors,
                    weighted_total,
                    "criticality scored"
                );
                let covers = own
                    .iter()
                    .filter(|m| m.contribution.is_covering())
                    .map(|m| m.responsibility_id.clone())
                    .collect::<BTreeSet<_>>()
                    .into_iter()
                    .collect();
                RankedEntry {
                    rank: 0,
                    competency_id: competency.id.clone(),
                    name: competency.name.clone(),
                    score: CriticalityScore {
                        competency_id: competency.id.clone(),
                        factor_scores: factors,
                        weighted_total,
                    },
                    covers,
                }
            })
            .collect();

        // sort_by is stable, so equal keys keep input order
        entries.sort_by(|a, b| {
            b.score
                .weighted_total
                .partial_cmp(&a.score.weighted_total)
                .unwrap_or(Ordering::Equal)
                .then_with(|| {
                    b.score
                        .factor_scores
                        .coverage_breadth
                        .partial_cmp(&a.score.factor_scores.coverage_breadth)
                        .unwrap_or(Ordering::Equal)
                })
        });
        for (index, entry) in entries.iter_mut().enumerate() {
            entry.rank = index + 1;
        }

        RankedList { entries }
    }

    fn factors(
        own: &[&Mapping],
        responsibilities: &BTreeMap<&str, &Responsibility>,
        job_categories: &BTreeSet<Category>,
        holders: &BTreeMap<&str, usize>,
    ) -> FactorScores {
        let mapped: Vec<&Responsibility> = own
            .iter()
            .map(|m| m.responsibility_id.as_str())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .filter_map(|id| responsibilities.get(id).copied())
            .collect();

        let impact = mean(own.iter().filter_map(|m| {
            responsibilities
                .get(m.responsibility_id.as_str())
                .map(|r| r.importance.points() * m.contribution.impact_weight())
        }));
        let frequency = mean(mapped.iter().map(|r| r.category.frequency_points()));
        let categories: BTreeSet<Category> = mapped.iter().map(|r| r.category).collect();

        // Covered by this competency and by no other ranked one. Holder
        // counts include this competency's own covering mapping.
        let unique = mapped
            .iter()
            .filter(|r| {
                let own_covering = own
                    .iter()
                    .any(|m| m.responsibility_id == r.id && m.contribution.is_covering());
                let count = holders.get(r.id.as_str()).copied().unwrap_or(0);
                count == usize::from(own_covering)
            })
            .count();
        let depth = mean(own.iter().map(|m| m.contribution.depth()));

        FactorScores {
            coverage_breadth: FACTOR_MAX * ratio(mapped.len(), responsibilities.len()),
            impact_risk: impact.min(FACTOR_MAX),
            frequency,
            complexity: FACTOR_MAX * ratio(categories.len(), job_categories.len()),
            differentiation: FACTOR_MAX * ratio(unique, mapped.len()),
            time_to_proficiency: FACTOR_MAX * depth,
        }
    }

    /// Grow the selection from the top `min_count` until coverage reaches
    /// `min_coverage` or the selection holds `max_count`. Never removes a
    /// selected competency.
    #[must_use]
    pub fn select(
        &self,
        ranked: &RankedList,
        responsibilities: &[Responsibility],
        min_coverage: f32,
    ) -> Selection {
        let total = responsibilities.len();
        let coverage_for = |count: usize| -> (f32, Vec<String>) {
            let covered: BTreeSet<&str> = ranked.entries[..count]
                .iter()
                .flat_map(|e| e.covers.iter().map(String::as_str))
                .collect();
            let gaps: Vec<String> = responsibilities
                .iter()
                .filter(|r| !covered.contains(r.id.as_str()))
                .map(|r| r.id.clone())
                .collect();
            (ratio(total - gaps.len(), total), gaps)
        };

        let mut count = self.config.min_count.min(ranked.len());
        let (mut coverage, mut gaps) = coverage_for(count);
        let mut history = vec![coverage];

        while coverage < min_coverage && count < self.config.max_count && count < ranked.len() {
            count += 1;
            (coverage, gaps) = coverage_for(count);
            history.push(coverage);
        }

        let target_met = coverage >= min_coverage;
        let stop_reason = if target_met {
            StopReason::TargetMet
        } else if count >= self.config.max_count {
            StopReason::MaxCount
        } else {
            StopReason::Exhausted
        };
        let (_, unmappable) = coverage_for(ranked.len());

        info!(
            selected = count,
            coverage,
            target_met,
            gaps = gaps.len(),
            "selection complete"
        );

        Selection {
            selected: ranked.entries[..count]
                .iter()
                .map(|e| e.competency_id.clone())
                .collect(),
            coverage,
            coverage_history: history,
            min_coverage,
            target_met,
            gaps,
            unmappable,
            stop_reason,
        }
    }
}

fn mean(values: impl Iterator<Item = f32>) -> f32 {
    let (sum, count) = values.fold((0.0_f32, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        0.0
    } else {
        #[allow(clippy::cast_precision_loss)]
        let count = count as f32;
        sum / count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Contribution, Importance, ScoreBreakdown, SourceTier, responsibility_id};

    fn responsibility(index: usize, category: Category, importance: Importance) -> Responsibility {
        Responsibility {
            id: responsibility_id(index),
            raw_text: format!("duty {index}"),
            normalized_text: format!("duty {index}"),
            category,
            importance,
        }
    }

    fn mapping(r: &str, c: &str, contribution: Contribution) -> Mapping {
        Mapping {
            responsibility_id: r.into(),
            competency_id: c.into(),
            relevance_score: 0.85,
            contribution,
            score_breakdown: ScoreBreakdown {
                semantic: 0.8,
                lexical: 0.8,
                contextual: 0.8,
            },
        }
    }

    fn competency(id: &str) -> Competency {
        Competency::new(id, id, "definition", SourceTier::Catalog)
    }

    #[test]
    fn factors_for_single_primary_mapping() {
        let config = RankingConfig::default();
        let ranker = CriticalityRanker::new(&config);
        let responsibilities = vec![
            responsibility(0, Category::Operational, Importance::High),
            responsibility(1, Category::Technical, Importance::Low),
        ];
        let competencies = vec![competency("C1")];
        let mappings = vec![mapping("R01", "C1", Contribution::Primary)];

        let ranked = ranker.rank(&competencies, &mappings, &responsibilities);
        let factors = ranked.entries[0].score.factor_scores;
        assert!((factors.coverage_breadth - 5.0).abs() < 1e-5);
        assert!((factors.impact_risk - 10.0).abs() < 1e-5);
        assert!((factors.frequency - 10.0).abs() < 1e-5);
        assert!((factors.complexity - 5.0).abs() < 1e-5);
        assert!((factors.differentiation - 10.0).abs() < 1e-5);
        assert!((factors.time_to_proficiency - 10.0).abs() < 1e-5);
        assert!(ranked.entries[0].score.in_bounds());
    }

    #[test]
    fn differentiation_drops_when_shared() {
        let config = RankingConfig::default();
        let ranker = CriticalityRanker::new(&config);
        let responsibilities = vec![responsibility(0, Category::Technical, Importance::Medium)];
        let competencies = vec![competency("C1"), competency("C2")];
        let mappings = vec![
            mapping("R01", "C1", Contribution::Primary),
            mapping("R01", "C2", Contribution::Secondary),
        ];

        let ranked = ranker.rank(&competencies, &mappings, &responsibilities);
        for entry in &ranked.entries {
            assert_eq!(entry.score.factor_scores.differentiation, 0.0);
        }
        assert_eq!(ranked.entries[0].competency_id, "C1");
    }

    #[test]
    fn ties_break_by_coverage_then_input_order() {
        let config = RankingConfig::default();
        let ranker = CriticalityRanker::new(&config);
        let responsibilities: Vec<_> = (0..4)
            .map(|i| responsibility(i, Category::Technical, Importance::Medium))
            .collect();
        let competencies = vec![competency("C-a"), competency("C-b"), competency("C-c")];
        let mappings = vec![
            mapping("R01", "C-a", Contribution::Primary),
            mapping("R02", "C-b", Contribution::Primary),
            mapping("R03", "C-c", Contribution::Primary),
        ];

        let ranked = ranker.rank(&competencies, &mappings, &responsibilities);
        assert_eq!(ranked.ids(), vec!["C-a", "C-b", "C-c"]);
        assert_eq!(ranked.entries[2].rank, 3);
    }

    #[test]
    fn skips_superseded_and_unmapped_competencies() {
        let config = RankingConfig::default();
        let ranker = CriticalityRanker::new(&config);
        let responsibilities = vec![responsibility(0, Category::Technical, Importance::Medium)];
        let mut retired = competency("C-old");
        retired.supersede("removed", None);
        let competencies = vec![retired, competency("C-idle"), competency("C-live")];
        let mappings = vec![
            mapping("R01", "C-old", Contribution::Primary),
            mapping("R01", "C-live", Contribution::Supporting),
        ];

        let ranked = ranker.rank(&competencies, &mappings, &responsibilities);
        assert_eq!(ranked.ids(), vec!["C-live"]);
        assert!(ranked.entries[0].covers.is_empty());
    }

    fn one_to_one(count: usize, total: usize) -> (Vec<Responsibility>, RankedList) {
        let config = RankingConfig::default();
        let ranker = CriticalityRanker::new(&config);
        let responsibilities: Vec<_> = (0..total)
            .map(|i| responsibility(i, Category::Technical, Importance::Medium))
            .collect();
        let competencies: Vec<_> = (0..count).map(|i| competency(&format!("C{i}"))).collect();
        let mappings: Vec<_> = (0..count)
            .map(|i| mapping(&responsibility_id(i), &format!("C{i}"), Contribution::Primary))
            .collect();
        let ranked = ranker.rank(&competencies, &mappings, &responsibilities);
        (responsibilities, ranked)
    }

    #[test]
    fn selection_grows_until_coverage_met() {
        let config = RankingConfig::default();
        let ranker = CriticalityRanker::new(&config);
        let (responsibilities, ranked) = one_to_one(9, 10);

        let selection = ranker.select(&ranked, &responsibilities, 0.80);
        assert_eq!(selection.selected.len(), 8);
        assert!((selection.coverage - 0.8).abs() < 1e-6);
        assert!(selection.target_met);
        assert_eq!(selection.stop_reason, StopReason::TargetMet);
        assert_eq!(selection.coverage_history.len(), 3);
        assert_eq!(selection.unmappable, vec!["R10".to_string()]);
        assert_eq!(selection.gaps.len(), 2);
    }

    #[test]
    fn selection_stops_at_max_count_and_reports_gap() {
        let config = RankingConfig {
            max_count: 7,
            ..RankingConfig::default()
        };
        let ranker = CriticalityRanker::new(&config);
        let (responsibilities, ranked) = one_to_one(9, 10);

        let selection = ranker.select(&ranked, &responsibilities, 0.80);
        assert_eq!(selection.selected.len(), 7);
        assert!(!selection.target_met);
        assert_eq!(selection.stop_reason, StopReason::MaxCount);
        assert_eq!(selection.gaps.len(), 3);
    }

    #[test]
    fn selection_with_fewer_candidates_than_min_count() {
        let config = RankingConfig::default();
        let ranker = CriticalityRanker::new(&config);
        let (responsibilities, ranked) = one_to_one(3, 4);

        let selection = ranker.select(&ranked, &responsibilities, 0.80);
        assert_eq!(selection.selected.len(), 3);
        assert_eq!(selection.stop_reason, StopReason::Exhausted);
    }

    #[test]
    fn coverage_of_counts_only_covering_tiers() {
        let responsibilities = vec![
            responsibility(0, Category::Technical, Importance::Medium),
            responsibility(1, Category::Technical, Importance::Medium),
        ];
        let mappings = vec![
            mapping("R01", "C1", Contribution::Secondary),
            mapping("R02", "C1", Contribution::Supporting),
        ];
        let ids: BTreeSet<&str> = ["C1"].into_iter().collect();
        let (coverage, uncovered) = coverage_of(&responsibilities, &mappings, &ids);
        assert!((coverage - 0.5).abs() < 1e-6);
        assert_eq!(uncovered, vec!["R02".to_string()]);
    }
}
