//! cmap runs - List or inspect persisted runs

use std::path::PathBuf;

use clap::{Args, Subcommand};
use colored::Colorize;
use serde::Serialize;

use super::resume::parse_stage;
use crate::app::AppContext;
use crate::cli::output::{self, HumanLayout};
use crate::error::Result;
use crate::pipeline::{RunState, StageArtifact, StageId};
use crate::storage::{ArtifactStore, PersistedRun, RunSummary};

#[derive(Args, Debug)]
pub struct RunsArgs {
    #[command(subcommand)]
    pub command: RunsCommand,
}

#[derive(Subcommand, Debug)]
pub enum RunsCommand {
    /// List runs, most recently updated first
    List {
        /// Run database (default: [storage] db_path)
        #[arg(long)]
        db: Option<PathBuf>,
    },

    /// Show one run's status, gates and artifacts
    Show {
        run_id: String,

        /// Only this stage's artifacts, superseded versions included
        #[arg(long, value_parser = parse_stage)]
        stage: Option<StageId>,

        /// Run database (default: [storage] db_path)
        #[arg(long)]
        db: Option<PathBuf>,
    },
}

pub fn run(ctx: &AppContext, args: &RunsArgs) -> Result<()> {
    match &args.command {
        RunsCommand::List { db } => {
            let store = ctx.open_store(db.as_deref())?;
            list(ctx, &store.list_runs()?)
        }
        RunsCommand::Show { run_id, stage, db } => {
            let store = ctx.open_store(db.as_deref())?;
            let (persisted, state) = load_state(&store, run_id)?;
            match stage {
                Some(stage) => show_stage(ctx, &persisted, *stage),
                None => show(ctx, &persisted, &state),
            }
        }
    }
}

/// Rebuild a persisted run's state, with the stored terminal status.
pub(super) fn load_state(
    store: &dyn ArtifactStore,
    run_id: &str,
) -> Result<(PersistedRun, RunState)> {
    let persisted = store.load(run_id)?;
    let mut state = RunState::replay(
        run_id,
        persisted.artifacts.clone(),
        persisted.skipped.clone(),
    )?;
    state.status = persisted.summary.status.clone();
    Ok((persisted, state))
}

fn list(ctx: &AppContext, runs: &[RunSummary]) -> Result<()> {
    if ctx.robot_mode {
        return output::emit_robot(&output::robot_ok(runs));
    }
    if runs.is_empty() {
        println!("{}", "No runs recorded".dimmed());
        return Ok(());
    }
    for run in runs {
        println!(
            "{}  {:<28} {:<16} {} artifacts  {}",
            run.run_id.bold(),
            run.job_title,
            output::status_label(&run.status),
            run.artifact_count,
            run.updated_at.format("%Y-%m-%d %H:%M").to_string().dimmed()
        );
    }
    Ok(())
}

#[derive(Serialize)]
struct ArtifactRow<'a> {
    stage: StageId,
    version: u32,
    gate: String,
    superseded: bool,
    timestamp: &'a chrono::DateTime<chrono::Utc>,
}

fn rows(artifacts: &[StageArtifact]) -> Vec<ArtifactRow<'_>> {
    artifacts
        .iter()
        .map(|a| ArtifactRow {
            stage: a.stage_name,
            version: a.version,
            gate: a.gate_result.status.to_string(),
            superseded: a.superseded,
            timestamp: &a.timestamp,
        })
        .collect()
}

fn show(ctx: &AppContext, persisted: &PersistedRun, state: &RunState) -> Result<()> {
    if ctx.robot_mode {
        let report = state.report();
        let warnings = output::gate_warnings(&report.gates);
        return output::emit_robot(
            &output::robot_ok(serde_json::json!({
                "summary": persisted.summary,
                "artifacts": rows(&persisted.artifacts),
                "report": report,
            }))
            .with_warnings(warnings),
        );
    }

    let mut layout = output::report_layout(&state.report());
    layout.section("Artifacts");
    push_rows(&mut layout, &persisted.artifacts);
    output::emit_human(layout);
    Ok(())
}

fn show_stage(ctx: &AppContext, persisted: &PersistedRun, stage: StageId) -> Result<()> {
    let artifacts: Vec<&StageArtifact> = persisted
        .artifacts
        .iter()
        .filter(|a| a.stage_name == stage)
        .collect();
    let skipped = persisted.skipped.iter().find(|s| s.stage == stage);

    if ctx.robot_mode {
        return output::emit_robot(&output::robot_ok(serde_json::json!({
            "run_id": persisted.summary.run_id,
            "stage": stage,
            "artifacts": artifacts,
            "skipped": skipped,
        })));
    }

    let mut layout = HumanLayout::new();
    layout.title(&format!("{} / {stage}", persisted.summary.run_id));
    if let Some(skipped) = skipped {
        layout.kv("skipped", &skipped.reason);
    }
    if artifacts.is_empty() && skipped.is_none() {
        layout.push_line("No artifacts for this stage".dimmed().to_string());
    }
    for artifact in artifacts {
        let version = format!("v{}", artifact.version);
        layout.section(&version);
        output::push_gate(&mut layout, &artifact.gate_result);
        if artifact.superseded {
            layout.kv("superseded", "yes");
        }
        layout.push_line(serde_json::to_string_pretty(&artifact.payload)?);
    }
    output::emit_human(layout);
    Ok(())
}

fn push_rows(layout: &mut HumanLayout, artifacts: &[StageArtifact]) {
    for row in rows(artifacts) {
        let line = format!(
            "{:<10} v{:<3} {:<6} {}",
            row.stage.as_str(),
            row.version,
            row.gate,
            row.timestamp.format("%Y-%m-%d %H:%M:%S")
        );
        if row.superseded {
            layout.push_line(format!("{} (superseded)", line.dimmed()));
        } else {
            layout.push_line(line);
        }
    }
}
