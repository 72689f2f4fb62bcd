use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{CmError, Result};
use crate::gates::{self, Severity};

const WEIGHT_TOLERANCE: f32 = 1e-4;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub overlap: OverlapConfig,
    #[serde(default)]
    pub ranking: RankingConfig,
    #[serde(default)]
    pub gates: GateConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

impl Config {
    /// Load configuration: defaults, then global, then project, then the
    /// explicit file (or `CMAP_CONFIG`), then environment overrides.
    ///
    /// The result is validated before it is returned.
    pub fn load(explicit_path: Option<&Path>, project_root: &Path) -> Result<Self> {
        let mut config = Self::default();

        let explicit = explicit_path
            .map(PathBuf::from)
            .or_else(|| std::env::var("CMAP_CONFIG").ok().map(PathBuf::from));

        if let Some(path) = explicit {
            let patch = Self::load_patch(&path)?
                .ok_or_else(|| CmError::ConfigNotFound(path.display().to_string()))?;
            config.merge_patch(patch);
        } else {
            if let Some(global) = Self::load_global()? {
                config.merge_patch(global);
            }
            if let Some(project) = Self::load_patch(&project_root.join("cmap.toml"))? {
                config.merge_patch(project);
            }
        }

        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    /// Parse a config from a TOML string on top of the defaults.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let patch: ConfigPatch =
            toml::from_str(raw).map_err(|err| CmError::Config(format!("parse config: {err}")))?;
        let mut config = Self::default();
        config.merge_patch(patch);
        config.validate()?;
        Ok(config)
    }

    fn load_global() -> Result<Option<ConfigPatch>> {
        let Some(dir) = dirs::config_dir() else {
            return Ok(None);
        };
        Self::load_patch(&dir.join("cmap/config.toml"))
    }

    fn load_patch(path: &Path) -> Result<Option<ConfigPatch>> {
        if !path.exists() {
            return Ok(None);
        }

        let raw = std::fs::read_to_string(path)
            .map_err(|err| CmError::Config(format!("read config {}: {err}", path.display())))?;
        let patch = toml::from_str(&raw)
            .map_err(|err| CmError::Config(format!("parse config {}: {err}", path.display())))?;
        Ok(Some(patch))
    }

    fn merge_patch(&mut self, patch: ConfigPatch) {
        if let Some(patch) = patch.scoring {
            self.scoring.merge(patch);
        }
        if let Some(patch) = patch.overlap {
            self.overlap.merge(patch);
        }
        if let Some(patch) = patch.ranking {
            self.ranking.merge(patch);
        }
        if let Some(patch) = patch.gates {
            self.gates.merge(patch);
        }
        if let Some(patch) = patch.model {
            self.model.merge(patch);
        }
        if let Some(patch) = patch.embedding {
            self.embedding.merge(patch);
        }
        if let Some(patch) = patch.storage {
            self.storage.merge(patch);
        }
        if let Some(patch) = patch.pipeline {
            self.pipeline.merge(patch);
        }
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(value) = env_f32("CMAP_SCORING_MIN_RELEVANCE")? {
            self.scoring.min_relevance = value;
        }
        if let Some(values) = env_f32_list("CMAP_SCORING_WEIGHTS")? {
            let [semantic, lexical, contextual] = values.as_slice() else {
                return Err(CmError::Config(format!(
                    "CMAP_SCORING_WEIGHTS expects 3 comma-separated values, got {}",
                    values.len()
                )));
            };
            self.scoring.semantic_weight = *semantic;
            self.scoring.lexical_weight = *lexical;
            self.scoring.contextual_weight = *contextual;
        }
        if let Some(value) = env_f32("CMAP_RANKING_MIN_COVERAGE")? {
            self.ranking.min_coverage = value;
        }
        if let Some(value) = env_usize("CMAP_RANKING_MIN_COUNT")? {
            self.ranking.min_count = value;
        }
        if let Some(value) = env_usize("CMAP_RANKING_MAX_COUNT")? {
            self.ranking.max_count = value;
        }
        if let Some(value) = env_string("CMAP_MODEL_BACKEND") {
            self.model.backend = value;
        }
        if let Some(value) = env_string("CMAP_MODEL_ENDPOINT") {
            self.model.endpoint = Some(value);
        }
        if let Some(value) = env_string("CMAP_DB_PATH") {
            self.storage.db_path = Some(PathBuf::from(value));
        }
        Ok(())
    }

    /// Fail fast on invalid weights, thresholds and ranges. Never clamps.
    pub fn validate(&self) -> Result<()> {
        self.scoring.validate()?;
        self.overlap.validate()?;
        self.ranking.validate()?;
        self.gates.validate()?;
        self.embedding.validate()?;
        self.model.validate()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    pub semantic_weight: f32,
    pub lexical_weight: f32,
    pub contextual_weight: f32,
    /// Mappings below this combined score are dropped.
    pub min_relevance: f32,
    pub secondary_threshold: f32,
    pub primary_threshold: f32,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            semantic_weight: 0.4,
            lexical_weight: 0.3,
            contextual_weight: 0.3,
            min_relevance: 0.60,
            secondary_threshold: 0.70,
            primary_threshold: 0.80,
        }
    }
}

impl ScoringConfig {
    fn merge(&mut self, patch: ScoringPatch) {
        if let Some(value) = patch.semantic_weight {
            self.semantic_weight = value;
        }
        if let Some(value) = patch.lexical_weight {
            self.lexical_weight = value;
        }
        if let Some(value) = patch.contextual_weight {
            self.contextual_weight = value;
        }
        if let Some(value) = patch.min_relevance {
            self.min_relevance = value;
        }
        if let Some(value) = patch.secondary_threshold {
            self.secondary_threshold = value;
        }
        if let Some(value) = patch.primary_threshold {
            self.primary_threshold = value;
        }
    }

    fn validate(&self) -> Result<()> {
        check_weights(
            "scoring",
            &[
                ("semantic_weight", self.semantic_weight),
                ("lexical_weight", self.lexical_weight),
                ("contextual_weight", self.contextual_weight),
            ],
        )?;
        check_unit("scoring.min_relevance", self.min_relevance)?;
        check_unit("scoring.secondary_threshold", self.secondary_threshold)?;
        check_unit("scoring.primary_threshold", self.primary_threshold)?;
        if !(self.min_relevance <= self.secondary_threshold
            && self.secondary_threshold < self.primary_threshold)
        {
            return Err(CmError::Config(format!(
                "scoring thresholds must satisfy min_relevance <= secondary < primary \
                 (got {} / {} / {})",
                self.min_relevance, self.secondary_threshold, self.primary_threshold
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlapConfig {
    /// Similarity at or above this is at least MINOR.
    pub minor_threshold: f32,
    /// Similarity strictly above this is MATERIAL.
    pub material_threshold: f32,
}

impl Default for OverlapConfig {
    fn default() -> Self {
        Self {
            minor_threshold: 0.72,
            material_threshold: 0.82,
        }
    }
}

impl OverlapConfig {
    fn merge(&mut self, patch: OverlapPatch) {
        if let Some(value) = patch.minor_threshold {
            self.minor_threshold = value;
        }
        if let Some(value) = patch.material_threshold {
            self.material_threshold = value;
        }
    }

    fn validate(&self) -> Result<()> {
        check_unit("overlap.minor_threshold", self.minor_threshold)?;
        check_unit("overlap.material_threshold", self.material_threshold)?;
        if self.minor_threshold >= self.material_threshold {
            return Err(CmError::Config(format!(
                "overlap.minor_threshold ({}) must be below overlap.material_threshold ({})",
                self.minor_threshold, self.material_threshold
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorWeights {
    pub coverage_breadth: f32,
    pub impact_risk: f32,
    pub frequency: f32,
    pub complexity: f32,
    pub differentiation: f32,
    pub time_to_proficiency: f32,
}

impl Default for FactorWeights {
    fn default() -> Self {
        Self {
            coverage_breadth: 0.25,
            impact_risk: 0.20,
            frequency: 0.15,
            complexity: 0.15,
            differentiation: 0.15,
            time_to_proficiency: 0.10,
        }
    }
}

impl FactorWeights {
    fn as_named(&self) -> [(&'static str, f32); 6] {
        [
            ("coverage_breadth", self.coverage_breadth),
            ("impact_risk", self.impact_risk),
            ("frequency", self.frequency),
            ("complexity", self.complexity),
            ("differentiation", self.differentiation),
            ("time_to_proficiency", self.time_to_proficiency),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingConfig {
    #[serde(default)]
    pub weights: FactorWeights,
    pub min_count: usize,
    pub max_count: usize,
    pub min_coverage: f32,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            weights: FactorWeights::default(),
            min_count: 6,
            max_count: 10,
            min_coverage: 0.80,
        }
    }
}

impl RankingConfig {
    fn merge(&mut self, patch: RankingPatch) {
        if let Some(weights) = patch.weights {
            if let Some(value) = weights.coverage_breadth {
                self.weights.coverage_breadth = value;
            }
            if let Some(value) = weights.impact_risk {
                self.weights.impact_risk = value;
            }
            if let Some(value) = weights.frequency {
                self.weights.frequency = value;
            }
            if let Some(value) = weights.complexity {
                self.weights.complexity = value;
            }
            if let Some(value) = weights.differentiation {
                self.weights.differentiation = value;
            }
            if let Some(value) = weights.time_to_proficiency {
                self.weights.time_to_proficiency = value;
            }
        }
        if let Some(value) = patch.min_count {
            self.min_count = value;
        }
        if let Some(value) = patch.max_count {
            self.max_count = value;
        }
        if let Some(value) = patch.min_coverage {
            self.min_coverage = value;
        }
    }

    fn validate(&self) -> Result<()> {
        check_weights("ranking.weights", &self.weights.as_named())?;
        check_unit("ranking.min_coverage", self.min_coverage)?;
        if self.min_count == 0 || self.min_count > self.max_count {
            return Err(CmError::Config(format!(
                "ranking counts must satisfy 1 <= min_count <= max_count (got {} / {})",
                self.min_count, self.max_count
            )));
        }
        Ok(())
    }
}

/// Per-rule severity override.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleOverride {
    #[serde(default)]
    pub severity: Option<Severity>,
    #[serde(default)]
    pub blocking: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateConfig {
    /// Highest tolerated share of responsibilities without any mapping.
    pub max_unmapped_rate: f32,
    pub min_indicators: usize,
    pub max_indicators: usize,
    #[serde(default)]
    pub rules: BTreeMap<String, RuleOverride>,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            max_unmapped_rate: 0.25,
            min_indicators: 3,
            max_indicators: 7,
            rules: BTreeMap::new(),
        }
    }
}

impl GateConfig {
    fn merge(&mut self, patch: GatePatch) {
        if let Some(value) = patch.max_unmapped_rate {
            self.max_unmapped_rate = value;
        }
        if let Some(value) = patch.min_indicators {
            self.min_indicators = value;
        }
        if let Some(value) = patch.max_indicators {
            self.max_indicators = value;
        }
        if let Some(rules) = patch.rules {
            for (name, rule) in rules {
                self.rules.insert(name, rule);
            }
        }
    }

    fn validate(&self) -> Result<()> {
        check_unit("gates.max_unmapped_rate", self.max_unmapped_rate)?;
        if !(3 <= self.min_indicators
            && self.min_indicators <= self.max_indicators
            && self.max_indicators <= 7)
        {
            return Err(CmError::Config(format!(
                "gates indicator range must satisfy 3 <= min <= max <= 7 (got {} / {})",
                self.min_indicators, self.max_indicators
            )));
        }
        for (name, rule) in &self.rules {
            let Some(known) = gates::find_rule(name) else {
                return Err(CmError::Config(format!("gates.rules: unknown rule '{name}'")));
            };
            if known.integrity
                && (rule.severity.is_some_and(|s| s != Severity::Critical)
                    || rule.blocking == Some(false))
            {
                return Err(CmError::Config(format!(
                    "gates.rules: '{name}' is an integrity rule and is always critical"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// `heuristic` (offline, deterministic) or `http`.
    pub backend: String,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    /// Environment variable holding the bearer token.
    pub api_key_env: String,
    pub timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            backend: "heuristic".to_string(),
            endpoint: None,
            model: None,
            api_key_env: "CMAP_MODEL_API_KEY".to_string(),
            timeout_secs: 120,
        }
    }
}

impl ModelConfig {
    fn merge(&mut self, patch: ModelPatch) {
        if let Some(value) = patch.backend {
            self.backend = value;
        }
        if let Some(value) = patch.endpoint {
            self.endpoint = Some(value);
        }
        if let Some(value) = patch.model {
            self.model = Some(value);
        }
        if let Some(value) = patch.api_key_env {
            self.api_key_env = value;
        }
        if let Some(value) = patch.timeout_secs {
            self.timeout_secs = value;
        }
    }

    fn validate(&self) -> Result<()> {
        match self.backend.trim().to_lowercase().as_str() {
            "" | "heuristic" => Ok(()),
            "http" if self.endpoint.as_deref().is_some_and(|e| !e.trim().is_empty()) => Ok(()),
            "http" => Err(CmError::Config(
                "model.backend=http requires model.endpoint".to_string(),
            )),
            other => Err(CmError::Config(format!("unknown model backend: {other}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub backend: String,
    pub dims: u32,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend: "hash".to_string(),
            dims: 384,
        }
    }
}

impl EmbeddingConfig {
    fn merge(&mut self, patch: EmbeddingPatch) {
        if let Some(value) = patch.backend {
            self.backend = value;
        }
        if let Some(value) = patch.dims {
            self.dims = value;
        }
    }

    fn validate(&self) -> Result<()> {
        if self.dims == 0 {
            return Err(CmError::Config(
                "embedding.dims must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Run database path; defaults to the platform data directory.
    #[serde(default)]
    pub db_path: Option<PathBuf>,
}

impl StorageConfig {
    fn merge(&mut self, patch: StoragePatch) {
        if let Some(value) = patch.db_path {
            self.db_path = Some(value);
        }
    }

    /// Resolved database path.
    #[must_use]
    pub fn resolved_db_path(&self) -> PathBuf {
        self.db_path.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("cmap/runs.db")
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Run the customization stage.
    pub customize: bool,
    /// Snippets attached per competency by the benchmark stage.
    pub benchmark_snippets: usize,
    #[serde(default)]
    pub docs_dir: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            customize: true,
            benchmark_snippets: 3,
            docs_dir: None,
        }
    }
}

impl PipelineConfig {
    fn merge(&mut self, patch: PipelinePatch) {
        if let Some(value) = patch.customize {
            self.customize = value;
        }
        if let Some(value) = patch.benchmark_snippets {
            self.benchmark_snippets = value;
        }
        if let Some(value) = patch.docs_dir {
            self.docs_dir = Some(value);
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ConfigPatch {
    pub scoring: Option<ScoringPatch>,
    pub overlap: Option<OverlapPatch>,
    pub ranking: Option<RankingPatch>,
    pub gates: Option<GatePatch>,
    pub model: Option<ModelPatch>,
    pub embedding: Option<EmbeddingPatch>,
    pub storage: Option<StoragePatch>,
    pub pipeline: Option<PipelinePatch>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ScoringPatch {
    pub semantic_weight: Option<f32>,
    pub lexical_weight: Option<f32>,
    pub contextual_weight: Option<f32>,
    pub min_relevance: Option<f32>,
    pub secondary_threshold: Option<f32>,
    pub primary_threshold: Option<f32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct OverlapPatch {
    pub minor_threshold: Option<f32>,
    pub material_threshold: Option<f32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct FactorWeightsPatch {
    pub coverage_breadth: Option<f32>,
    pub impact_risk: Option<f32>,
    pub frequency: Option<f32>,
    pub complexity: Option<f32>,
    pub differentiation: Option<f32>,
    pub time_to_proficiency: Option<f32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RankingPatch {
    pub weights: Option<FactorWeightsPatch>,
    pub min_count: Option<usize>,
    pub max_count: Option<usize>,
    pub min_coverage: Option<f32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct GatePatch {
    pub max_unmapped_rate: Option<f32>,
    pub min_indicators: Option<usize>,
    pub max_indicators: Option<usize>,
    pub rules: Option<BTreeMap<String, RuleOverride>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ModelPatch {
    pub backend: Option<String>,
    pub endpoint: Option<String>,
    pub model: Option<String>,
    pub api_key_env: Option<String>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct EmbeddingPatch {
    pub backend: Option<String>,
    pub dims: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct StoragePatch {
    pub db_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct PipelinePatch {
    pub customize: Option<bool>,
    pub benchmark_snippets: Option<usize>,
    pub docs_dir: Option<PathBuf>,
}

fn check_unit(name: &str, value: f32) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(CmError::Config(format!(
            "{name} must be within [0, 1] (got {value})"
        )));
    }
    Ok(())
}

fn check_weights(section: &str, weights: &[(&str, f32)]) -> Result<()> {
    for (name, value) in weights {
        if !value.is_finite() || *value < 0.0 {
            return Err(CmError::Config(format!(
                "{section}.{name} must be a finite non-negative number (got {value})"
            )));
        }
    }
    let sum: f32 = weights.iter().map(|(_, value)| value).sum();
    if (sum - 1.0).abs() > WEIGHT_TOLERANCE {
        return Err(CmError::Config(format!(
            "{section} weights must sum to 1.0 (got {sum:.4})"
        )));
    }
    Ok(())
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn env_usize(key: &str) -> Result<Option<usize>> {
    match std::env::var(key) {
        Ok(value) => value
            .parse::<usize>()
            .map(Some)
            .map_err(|err| CmError::Config(format!("invalid {key} value {value}: {err}"))),
        Err(_) => Ok(None),
    }
}

fn env_f32(key: &str) -> Result<Option<f32>> {
    match std::env::var(key) {
        Ok(value) => value
            .parse::<f32>()
            .map(Some)
            .map_err(|err| CmError::Config(format!("invalid {key} value {value}: {err}"))),
        Err(_) => Ok(None),
    }
}

fn env_f32_list(key: &str) -> Result<Option<Vec<f32>>> {
    match std::env::var(key) {
        Ok(value) => value
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(|entry| {
                entry
                    .parse::<f32>()
                    .map_err(|err| CmError::Config(format!("invalid {key} entry {entry}: {err}")))
            })
            .collect::<Result<Vec<_>>>()
            .map(Some),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    // =========================================================================
    // Defaults
    // =========================================================================

    #[test]
    fn default_config_is_valid() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn scoring_defaults_match_documented_blend() {
        let config = ScoringConfig::default();
        assert_eq!(config.semantic_weight, 0.4);
        assert_eq!(config.lexical_weight, 0.3);
        assert_eq!(config.contextual_weight, 0.3);
        assert_eq!(config.min_relevance, 0.60);
    }

    #[test]
    fn ranking_defaults() {
        let config = RankingConfig::default();
        assert_eq!(config.min_count, 6);
        assert_eq!(config.max_count, 10);
        assert_eq!(config.min_coverage, 0.80);
        assert_eq!(config.weights.coverage_breadth, 0.25);
    }

    // =========================================================================
    // Validation
    // =========================================================================

    #[test]
    fn rejects_scoring_weights_not_summing_to_one() {
        let mut config = Config::default();
        config.scoring.semantic_weight = 0.5;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("sum to 1.0"), "{err}");
    }

    #[test]
    fn rejects_non_finite_weights() {
        let mut config = Config::default();
        config.scoring.semantic_weight = f32::NAN;
        let err = config.validate().unwrap_err();
        assert!(matches!(err, CmError::Config(_)));
        assert!(err.to_string().contains("scoring.semantic_weight"), "{err}");

        let mut config = Config::default();
        config.ranking.weights.coverage_breadth = f32::INFINITY;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_threshold_out_of_range_without_clamping() {
        let mut config = Config::default();
        config.ranking.min_coverage = 1.2;
        assert!(config.validate().is_err());
        assert_eq!(config.ranking.min_coverage, 1.2);
    }

    #[test]
    fn rejects_unordered_tier_thresholds() {
        let mut config = Config::default();
        config.scoring.secondary_threshold = 0.85;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_inverted_overlap_thresholds() {
        let mut config = Config::default();
        config.overlap.minor_threshold = 0.9;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_min_count_above_max_count() {
        let mut config = Config::default();
        config.ranking.min_count = 12;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_unknown_gate_rule_override() {
        let mut config = Config::default();
        config
            .gates
            .rules
            .insert("no-such-rule".to_string(), RuleOverride::default());
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_downgrading_integrity_rule() {
        let mut config = Config::default();
        config.gates.rules.insert(
            "mapping-references-valid".to_string(),
            RuleOverride {
                severity: Some(Severity::Warning),
                blocking: None,
            },
        );
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("integrity"));
    }

    #[test]
    fn accepts_downgrading_ordinary_rule() {
        let mut config = Config::default();
        config.gates.rules.insert(
            "unmapped-responsibility-rate".to_string(),
            RuleOverride {
                severity: Some(Severity::Warning),
                blocking: Some(false),
            },
        );
        config.validate().unwrap();
    }

    #[test]
    fn http_backend_requires_endpoint() {
        let mut config = Config::default();
        config.model.backend = "http".to_string();
        assert!(config.validate().is_err());
        config.model.endpoint = Some("http://localhost:8080/v1/invoke".to_string());
        config.validate().unwrap();
    }

    // =========================================================================
    // Loading
    // =========================================================================

    #[test]
    fn from_toml_merges_partial_sections() {
        let config = Config::from_toml_str(
            r#"
            [scoring]
            min_relevance = 0.65

            [ranking]
            max_count = 8

            [ranking.weights]
            coverage_breadth = 0.30
            time_to_proficiency = 0.05
            "#,
        )
        .unwrap();
        assert_eq!(config.scoring.min_relevance, 0.65);
        assert_eq!(config.scoring.semantic_weight, 0.4);
        assert_eq!(config.ranking.max_count, 8);
        assert_eq!(config.ranking.weights.coverage_breadth, 0.30);
        assert_eq!(config.ranking.weights.impact_risk, 0.20);
    }

    #[test]
    fn from_toml_rejects_invalid_weights() {
        let result = Config::from_toml_str(
            r#"
            [scoring]
            semantic_weight = 0.9
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn load_reads_explicit_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(
            &path,
            r#"
            [gates]
            max_unmapped_rate = 0.4

            [gates.rules."coverage-target-met"]
            severity = "error"
            blocking = true
            "#,
        )
        .unwrap();

        let config = Config::load(Some(&path), dir.path()).unwrap();
        assert_eq!(config.gates.max_unmapped_rate, 0.4);
        let rule = &config.gates.rules["coverage-target-met"];
        assert_eq!(rule.severity, Some(Severity::Error));
        assert_eq!(rule.blocking, Some(true));
    }

    #[test]
    fn load_fails_for_missing_explicit_file() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing.toml");
        let err = Config::load(Some(&missing), dir.path()).unwrap_err();
        assert!(matches!(err, CmError::ConfigNotFound(_)));
    }

    #[test]
    fn serialization_roundtrip_preserves_values() {
        let config = Config::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(config, back);
    }
}
