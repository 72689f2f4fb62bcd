//! cmap run - Run the pipeline for one or more jobs

use std::path::{Path, PathBuf};

use clap::Args;
use colored::Colorize;
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::app::AppContext;
use crate::cli::output::{self, HumanLayout};
use crate::error::{CmError, Result};
use crate::ingest::InputTable;
use crate::pipeline::{Orchestrator, PipelineInputs, RunReport, RunState, Services, run_batch};
use crate::storage::ArtifactStore;

/// Where a job table and its competency sets come from.
#[derive(Args, Debug, Clone, Default)]
pub struct InputSources {
    /// Extra catalog file; replaces the table's `catalog`
    #[arg(long)]
    pub catalog: Option<PathBuf>,

    /// Extra protected-set file; replaces the table's `protected`
    #[arg(long)]
    pub protected: Option<PathBuf>,

    /// Only run the job with this title
    #[arg(long)]
    pub job: Option<String>,
}

impl InputSources {
    pub fn load(&self, input: &Path) -> Result<Vec<PipelineInputs>> {
        let mut table = InputTable::load(input)?;
        if let Some(path) = &self.catalog {
            table = table.with_catalog_file(path)?;
        }
        if let Some(path) = &self.protected {
            table = table.with_protected_file(path)?;
        }
        table.select(self.job.as_deref())
    }
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Job table (JSON or YAML)
    pub input: PathBuf,

    #[command(flatten)]
    pub sources: InputSources,

    /// Reference documents for the benchmark stage
    #[arg(long)]
    pub docs: Option<PathBuf>,

    /// Run database (default: [storage] db_path)
    #[arg(long)]
    pub db: Option<PathBuf>,

    /// Write the report(s) to this file as JSON
    #[arg(long)]
    pub out: Option<PathBuf>,
}

pub fn run(ctx: &AppContext, args: &RunArgs) -> Result<()> {
    let jobs = args.sources.load(&args.input)?;
    let model = ctx.model_service()?;
    let docs = ctx.document_store(args.docs.as_deref())?;
    let similarity = ctx.similarity()?;
    let services = Services {
        model: model.as_ref(),
        docs: &docs,
        similarity: &similarity,
    };

    if let [inputs] = jobs.as_slice() {
        let store = ctx.open_store(args.db.as_deref())?;
        let state = Orchestrator::new(&ctx.config, services, &store)?.run(inputs)?;
        let report = state.report();
        if let Some(path) = &args.out {
            write_report(path, &report)?;
        }
        return emit_report(ctx, &report);
    }

    info!(jobs = jobs.len(), "running jobs in parallel");
    let db_path = ctx.db_path(args.db.as_deref());
    // Migrate once up front; workers then open the same file concurrently.
    drop(ctx.open_store(Some(&db_path))?);
    let results = run_batch(
        &ctx.config,
        services,
        || {
            let store = crate::storage::SqliteArtifactStore::open(&db_path)?;
            Ok(Box::new(store) as Box<dyn ArtifactStore>)
        },
        &jobs,
    );
    finish_batch(ctx, &jobs, results, args.out.as_deref())
}

fn finish_batch(
    ctx: &AppContext,
    jobs: &[PipelineInputs],
    results: Vec<Result<RunState>>,
    out: Option<&Path>,
) -> Result<()> {
    let mut reports = Vec::new();
    let mut outcomes = Vec::new();
    let mut halted = 0;
    for (inputs, result) in jobs.iter().zip(results) {
        let title = inputs.job.title.as_str();
        match result {
            Ok(state) => {
                outcomes.push(json!({
                    "job": title,
                    "run_id": state.run_id,
                    "status": state.status,
                }));
                reports.push(state.report());
            }
            Err(err) => {
                warn!(job = %title, error = %err, "job did not complete");
                if err.is_gate_block() {
                    halted += 1;
                }
                outcomes.push(failed_outcome(title, &err));
            }
        }
    }

    if let Some(path) = out {
        write_report(path, &reports)?;
    }

    let failed = jobs.len() - reports.len();
    if failed > 0 {
        if !ctx.robot_mode {
            print_outcomes(&outcomes);
        }
        return Err(CmError::BatchIncomplete {
            total: jobs.len(),
            failed,
            halted,
            outcomes,
        });
    }

    if ctx.robot_mode {
        let warnings = reports
            .iter()
            .flat_map(|report| {
                output::gate_warnings(&report.gates)
                    .into_iter()
                    .map(|w| format!("{}: {w}", report.run_id))
            })
            .collect();
        return output::emit_robot(&output::robot_ok(&reports).with_warnings(warnings));
    }
    for report in &reports {
        output::emit_human(output::report_layout(report));
        println!();
    }
    Ok(())
}

fn failed_outcome(title: &str, err: &CmError) -> Value {
    let structured = err.to_structured();
    let mut outcome = json!({
        "job": title,
        "error": structured.message,
        "code": structured.code,
    });
    if let Some(failure) = err.as_pipeline_failure() {
        outcome["run_id"] = json!(failure.run_id);
        outcome["stage"] = json!(failure.stage);
    }
    outcome
}

fn print_outcomes(outcomes: &[Value]) {
    let mut layout = HumanLayout::new();
    layout.title("Jobs");
    for outcome in outcomes {
        let job = outcome["job"].as_str().unwrap_or_default();
        let run = outcome["run_id"].as_str().unwrap_or("-");
        let verdict = match outcome["error"].as_str() {
            Some(message) => message.red().to_string(),
            None => "ok".green().to_string(),
        };
        layout.kv(job, &format!("{run} {verdict}"));
    }
    output::emit_human(layout);
}

pub(super) fn emit_report(ctx: &AppContext, report: &RunReport) -> Result<()> {
    if ctx.robot_mode {
        let warnings = output::gate_warnings(&report.gates);
        return output::emit_robot(&output::robot_ok(report).with_warnings(warnings));
    }
    output::emit_human(output::report_layout(report));
    Ok(())
}

pub(super) fn write_report<T: serde::Serialize>(path: &Path, report: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(report)?)?;
    info!(path = %path.display(), "report written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::fixtures::{TempWorkspace, analyst_inputs};

    #[test]
    fn sources_override_catalog_and_filter_jobs() {
        let workspace = TempWorkspace::new();
        let input = workspace.write_inputs("table.json", &analyst_inputs());
        let catalog = workspace.write(
            "catalog.yaml",
            "- id: C-only\n  name: Only\n  definition: The only entry.\n",
        );
        let sources = InputSources {
            catalog: Some(catalog),
            protected: None,
            job: Some("financial analyst".into()),
        };
        let jobs = sources.load(&input).unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].catalog.len(), 1);
        assert_eq!(jobs[0].protected.len(), 2);
    }

    #[test]
    fn failed_outcome_without_run_has_no_run_id() {
        let err = CmError::JobNotFound("Chef".into());
        let outcome = failed_outcome("Chef", &err);
        assert_eq!(outcome["code"], "JOB_NOT_FOUND");
        assert!(outcome.get("run_id").is_none());
    }
}
