//! Loading the normalized job table, catalog and protected set.
//!
//! Inputs are JSON or YAML, chosen by file extension. A table file holds
//! `jobs` and optionally `catalog` and `protected`; a competency file is
//! either a bare list or `{competencies: [...]}`. Source tiers are
//! assigned by role, so input files never carry them.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::{Competency, JobInput, ProficiencyLevel, SourceTier};
use crate::error::{CmError, Result};
use crate::pipeline::PipelineInputs;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Json,
    Yaml,
}

impl InputFormat {
    /// `.yaml`/`.yml` is YAML; everything else is JSON.
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("yaml" | "yml") => Self::Yaml,
            _ => Self::Json,
        }
    }
}

/// A competency as written in an input file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompetencyRecord {
    pub id: String,
    pub name: String,
    pub definition: String,
    #[serde(default)]
    pub indicators: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub proficiency_levels: Vec<ProficiencyLevel>,
}

impl CompetencyRecord {
    fn into_competency(self, tier: SourceTier) -> Competency {
        let mut competency =
            Competency::new(self.id.trim(), self.name.trim(), self.definition.trim(), tier)
                .with_indicators(self.indicators)
                .with_tags(self.tags);
        competency.proficiency_levels = self.proficiency_levels;
        competency
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CompetencyFile {
    List(Vec<CompetencyRecord>),
    Wrapped { competencies: Vec<CompetencyRecord> },
}

#[derive(Debug, Deserialize)]
struct TableFile {
    jobs: Vec<JobInput>,
    #[serde(default)]
    catalog: Vec<CompetencyRecord>,
    #[serde(default)]
    protected: Vec<CompetencyRecord>,
}

/// The normalized input table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputTable {
    pub jobs: Vec<JobInput>,
    pub catalog: Vec<Competency>,
    pub protected: Vec<Competency>,
}

impl InputTable {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = read(path)?;
        let table = Self::parse(&raw, InputFormat::from_path(path))?;
        debug!(
            path = %path.display(),
            jobs = table.jobs.len(),
            catalog = table.catalog.len(),
            protected = table.protected.len(),
            "input table loaded"
        );
        Ok(table)
    }

    pub fn parse(raw: &str, format: InputFormat) -> Result<Self> {
        let file: TableFile = match format {
            InputFormat::Json => serde_json::from_str(raw)?,
            InputFormat::Yaml => serde_yaml::from_str(raw)?,
        };
        let table = Self {
            jobs: file.jobs,
            catalog: tiered(file.catalog, SourceTier::Catalog),
            protected: tiered(file.protected, SourceTier::Protected),
        };
        table.validate()?;
        Ok(table)
    }

    /// Replace the catalog with the contents of `path`.
    pub fn with_catalog_file(mut self, path: &Path) -> Result<Self> {
        self.catalog = load_competencies(path, SourceTier::Catalog)?;
        self.validate()?;
        Ok(self)
    }

    /// Replace the protected set with the contents of `path`.
    pub fn with_protected_file(mut self, path: &Path) -> Result<Self> {
        self.protected = load_competencies(path, SourceTier::Protected)?;
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.jobs.is_empty() {
            return Err(CmError::InvalidInput(
                "input table has no jobs".to_string(),
            ));
        }
        for job in &self.jobs {
            if job.title.trim().is_empty() {
                return Err(CmError::InvalidInput("job title is empty".to_string()));
            }
        }
        unique_ids("catalog", &self.catalog)?;
        unique_ids("protected", &self.protected)
    }

    /// Pipeline inputs for the job titled `title` (case-insensitive), or
    /// for every job when `title` is `None`.
    pub fn select(&self, title: Option<&str>) -> Result<Vec<PipelineInputs>> {
        let jobs: Vec<&JobInput> = match title {
            Some(wanted) => {
                let wanted = wanted.trim();
                let matched: Vec<&JobInput> = self
                    .jobs
                    .iter()
                    .filter(|job| job.title.trim().eq_ignore_ascii_case(wanted))
                    .collect();
                if matched.is_empty() {
                    return Err(CmError::JobNotFound(wanted.to_string()));
                }
                matched
            }
            None => self.jobs.iter().collect(),
        };
        Ok(jobs
            .into_iter()
            .map(|job| PipelineInputs {
                job: job.clone(),
                catalog: self.catalog.clone(),
                protected: self.protected.clone(),
            })
            .collect())
    }
}

/// Load a catalog or protected-set file.
pub fn load_competencies(path: &Path, tier: SourceTier) -> Result<Vec<Competency>> {
    let raw = read(path)?;
    let file: CompetencyFile = match InputFormat::from_path(path) {
        InputFormat::Json => serde_json::from_str(&raw)?,
        InputFormat::Yaml => serde_yaml::from_str(&raw)?,
    };
    let records = match file {
        CompetencyFile::List(records) | CompetencyFile::Wrapped { competencies: records } => {
            records
        }
    };
    Ok(tiered(records, tier))
}

fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .map_err(|err| CmError::InvalidInput(format!("cannot read {}: {err}", path.display())))
}

fn tiered(records: Vec<CompetencyRecord>, tier: SourceTier) -> Vec<Competency> {
    records
        .into_iter()
        .map(|record| record.into_competency(tier))
        .collect()
}

fn unique_ids(label: &str, competencies: &[Competency]) -> Result<()> {
    let mut seen = HashSet::new();
    for competency in competencies {
        if competency.id.is_empty() {
            return Err(CmError::InvalidInput(format!(
                "{label} competency '{}' has an empty id",
                competency.name
            )));
        }
        if !seen.insert(competency.id.as_str()) {
            return Err(CmError::InvalidInput(format!(
                "{label} competency id '{}' is not unique",
                competency.id
            )));
        }
    }
    Ok(())
}
