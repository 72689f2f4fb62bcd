//! cmap resume - Re-enter a persisted run at a named stage

use std::path::PathBuf;

use clap::Args;

use super::run::{InputSources, emit_report, write_report};
use crate::app::AppContext;
use crate::error::{CmError, Result};
use crate::pipeline::{Orchestrator, Services, StageId};

#[derive(Args, Debug)]
pub struct ResumeArgs {
    /// Run to resume
    pub run_id: String,

    /// First stage to re-run; later artifacts are superseded
    #[arg(long, value_parser = parse_stage)]
    pub from: StageId,

    /// Replacement job table; the persisted inputs are used otherwise
    #[arg(long)]
    pub input: Option<PathBuf>,

    #[command(flatten)]
    pub sources: InputSources,

    /// Reference documents for the benchmark stage
    #[arg(long)]
    pub docs: Option<PathBuf>,

    /// Run database (default: [storage] db_path)
    #[arg(long)]
    pub db: Option<PathBuf>,

    /// Write the report to this file as JSON
    #[arg(long)]
    pub out: Option<PathBuf>,
}

pub(super) fn parse_stage(raw: &str) -> std::result::Result<StageId, String> {
    raw.parse().map_err(|err: CmError| err.to_string())
}

pub fn run(ctx: &AppContext, args: &ResumeArgs) -> Result<()> {
    let replacement = match &args.input {
        Some(path) => {
            let mut jobs = args.sources.load(path)?;
            if jobs.len() != 1 {
                return Err(CmError::InvalidInput(format!(
                    "{} holds {} jobs; pick one with --job",
                    path.display(),
                    jobs.len()
                )));
            }
            jobs.pop()
        }
        None => None,
    };

    let store = ctx.open_store(args.db.as_deref())?;
    let model = ctx.model_service()?;
    let docs = ctx.document_store(args.docs.as_deref())?;
    let similarity = ctx.similarity()?;
    let services = Services {
        model: model.as_ref(),
        docs: &docs,
        similarity: &similarity,
    };

    let state = Orchestrator::new(&ctx.config, services, &store)?.resume(
        &args.run_id,
        args.from,
        replacement.as_ref(),
    )?;
    let report = state.report();
    if let Some(path) = &args.out {
        write_report(path, &report)?;
    }
    emit_report(ctx, &report)
}
