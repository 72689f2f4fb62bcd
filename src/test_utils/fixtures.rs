//! Shared fixtures: a ten-duty analyst job, its catalog and a protected
//! leadership set, plus a bundle of stub services.
//!
//! Every duty uses its own vocabulary, so each catalog entry maps exactly
//! one responsibility and the last duty maps nothing.

use std::path::PathBuf;

use tempfile::TempDir;

use crate::config::Config;
use crate::core::{
    Category, Competency, Contribution, Importance, JobInput, Mapping, Responsibility,
    ScoreBreakdown, SourceTier, normalize, responsibility_id,
};
use crate::docstore::InMemoryDocumentStore;
use crate::model::MockModelService;
use crate::pipeline::{ExtractionOutput, MappingOutput, PipelineInputs, RunState, Services, StageContext};
use crate::similarity::EmbeddingSimilarity;

pub const FAMILY: &str = "Finance";

/// Duty text, catalog id and catalog name. The last duty has no entry.
pub const DUTIES: [(&str, Option<(&str, &str)>); 10] = [
    ("Reconcile general ledger balances monthly.", Some(("C-ledger", "Ledger Balances"))),
    ("Forecast quarterly revenue scenarios.", Some(("C-forecast", "Revenue Scenarios"))),
    ("Audit vendor invoices against contracts.", Some(("C-invoices", "Vendor Invoices"))),
    ("Build pivot dashboards inside Excel.", Some(("C-dashboards", "Pivot Dashboards"))),
    ("Present variance findings before executives.", Some(("C-variance", "Variance Findings"))),
    ("Model capital expenditure payback.", Some(("C-capex", "Capital Expenditure"))),
    ("Maintain accounts taxonomy hygiene.", Some(("C-taxonomy", "Accounts Taxonomy"))),
    ("Coordinate treasury cash sweeps.", Some(("C-treasury", "Treasury Cash"))),
    ("Validate payroll tax withholdings.", Some(("C-payroll", "Payroll Tax"))),
    ("Organize office birthday celebrations.", None),
];

#[must_use]
pub fn analyst_job() -> JobInput {
    JobInput {
        title: "Financial Analyst".to_string(),
        family: FAMILY.to_string(),
        level: "P2".to_string(),
        summary: "Supports the monthly close and planning cycle.".to_string(),
        responsibilities: DUTIES.iter().map(|(duty, _)| (*duty).to_string()).collect(),
    }
}

/// Three indicators built from `name`, with no words any duty uses.
#[must_use]
pub fn indicators_for(name: &str) -> Vec<String> {
    let name = name.to_lowercase();
    vec![
        format!("Explains {name} decisions to peers"),
        format!("Keeps tidy {name} working papers"),
        format!("Spots anomalies in {name} data"),
    ]
}

/// Nine entries, one per mappable duty, plus `C-spare` which maps nothing.
#[must_use]
pub fn analyst_catalog() -> Vec<Competency> {
    let mut catalog: Vec<Competency> = DUTIES
        .iter()
        .filter_map(|(duty, entry)| {
            let (id, name) = (*entry)?;
            let tags = vec![
                Category::infer(duty).as_str().to_string(),
                FAMILY.to_lowercase(),
            ];
            Some(
                Competency::new(id, name, *duty, SourceTier::Catalog)
                    .with_indicators(indicators_for(name))
                    .with_tags(tags),
            )
        })
        .collect();
    catalog.push(
        Competency::new(
            "C-spare",
            "Underwater Welding",
            "Welds submerged steel pipelines.",
            SourceTier::Catalog,
        )
        .with_indicators(indicators_for("Underwater Welding"))
        .with_tags(vec!["technical".to_string()]),
    );
    catalog
}

/// Leadership references sharing no vocabulary with the catalog.
#[must_use]
pub fn leadership_protected() -> Vec<Competency> {
    vec![
        Competency::new(
            "P-coaching",
            "People Coaching",
            "Coaches direct reports through career conversations.",
            SourceTier::Protected,
        ),
        Competency::new(
            "P-hiring",
            "Talent Hiring",
            "Interviews candidates and extends offers.",
            SourceTier::Protected,
        ),
    ]
}

#[must_use]
pub fn analyst_inputs() -> PipelineInputs {
    PipelineInputs {
        job: analyst_job(),
        catalog: analyst_catalog(),
        protected: leadership_protected(),
    }
}

/// What extraction produces for [`analyst_job`], with MEDIUM importance.
#[must_use]
pub fn analyst_extraction() -> ExtractionOutput {
    let job = analyst_job();
    ExtractionOutput {
        job: job.profile(),
        responsibilities: DUTIES
            .iter()
            .enumerate()
            .map(|(index, (duty, _))| Responsibility {
                id: responsibility_id(index),
                raw_text: (*duty).to_string(),
                normalized_text: normalize(duty),
                category: Category::infer(duty),
                importance: Importance::Medium,
            })
            .collect(),
    }
}

/// One PRIMARY mapping per mappable duty to its catalog entry; `R10` is
/// unmapped and `C-spare` stays in the pool.
#[must_use]
pub fn analyst_mapping() -> MappingOutput {
    let catalog = analyst_catalog();
    let mut mappings = Vec::new();
    for (index, (_, entry)) in DUTIES.iter().enumerate() {
        if let Some((id, _)) = entry {
            mappings.push(Mapping {
                responsibility_id: responsibility_id(index),
                competency_id: (*id).to_string(),
                relevance_score: 0.96,
                contribution: Contribution::Primary,
                score_breakdown: ScoreBreakdown {
                    semantic: 0.9,
                    lexical: 1.0,
                    contextual: 1.0,
                },
            });
        }
    }
    let (competencies, pool) = catalog.into_iter().partition(|c| c.id != "C-spare");
    MappingOutput {
        responsibility_ids: (0..DUTIES.len()).map(responsibility_id).collect(),
        competencies,
        pool,
        mappings,
        unmapped: vec![responsibility_id(DUTIES.len() - 1)],
        rejected_pairs: 0,
    }
}

/// Owned stub services; hands out [`Services`] views.
pub struct TestServices {
    pub model: MockModelService,
    pub docs: InMemoryDocumentStore,
    pub similarity: EmbeddingSimilarity,
}

impl TestServices {
    /// Mock model with no scripted replies, so it answers heuristically.
    #[must_use]
    pub fn new() -> Self {
        Self::with_model(MockModelService::new())
    }

    /// # Panics
    /// If the empty document index cannot be created.
    #[must_use]
    pub fn with_model(model: MockModelService) -> Self {
        Self {
            model,
            docs: InMemoryDocumentStore::new().expect("create document index"),
            similarity: EmbeddingSimilarity::default(),
        }
    }

    #[must_use]
    pub fn with_docs(mut self, docs: InMemoryDocumentStore) -> Self {
        self.docs = docs;
        self
    }

    #[must_use]
    pub fn services(&self) -> Services<'_> {
        Services {
            model: &self.model,
            docs: &self.docs,
            similarity: &self.similarity,
        }
    }

    #[must_use]
    pub fn context<'s>(
        &'s self,
        inputs: &'s PipelineInputs,
        state: &'s RunState,
        config: &'s Config,
    ) -> StageContext<'s> {
        StageContext {
            inputs,
            state,
            config,
            services: self.services(),
        }
    }
}

impl Default for TestServices {
    fn default() -> Self {
        Self::new()
    }
}

/// Isolated directory for input files and databases.
pub struct TempWorkspace {
    pub dir: TempDir,
}

impl TempWorkspace {
    /// # Panics
    /// If the temp directory cannot be created.
    #[must_use]
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("create temp dir"),
        }
    }

    #[must_use]
    pub fn path(&self, relative: &str) -> PathBuf {
        self.dir.path().join(relative)
    }

    /// # Panics
    /// If the file cannot be written.
    pub fn write(&self, relative: &str, content: &str) -> PathBuf {
        let path = self.path(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create parent dirs");
        }
        std::fs::write(&path, content).expect("write fixture file");
        path
    }

    /// Inputs serialized as the JSON table the CLI reads.
    pub fn write_inputs(&self, relative: &str, inputs: &PipelineInputs) -> PathBuf {
        let table = serde_json::json!({
            "jobs": [inputs.job],
            "catalog": inputs.catalog,
            "protected": inputs.protected,
        });
        self.write(relative, &table.to_string())
    }
}

impl Default for TempWorkspace {
    fn default() -> Self {
        Self::new()
    }
}
