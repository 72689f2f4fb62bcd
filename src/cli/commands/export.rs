//! cmap export - Write a run's report for a renderer

use std::path::PathBuf;

use clap::{Args, ValueEnum};
use serde::Serialize;
use tracing::info;

use super::runs::load_state;
use crate::app::AppContext;
use crate::cli::output;
use crate::error::Result;
use crate::pipeline::RunReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Json,
    Yaml,
}

#[derive(Args, Debug)]
pub struct ExportArgs {
    pub run_id: String,

    /// Write to this file instead of stdout
    #[arg(long)]
    pub out: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = ExportFormat::Json)]
    pub format: ExportFormat,

    /// Run database (default: [storage] db_path)
    #[arg(long)]
    pub db: Option<PathBuf>,
}

pub fn run(ctx: &AppContext, args: &ExportArgs) -> Result<()> {
    let store = ctx.open_store(args.db.as_deref())?;
    let (_, state) = load_state(&store, &args.run_id)?;
    let report = state.report();

    match &args.out {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, render(&report, args.format)?)?;
            info!(run_id = %args.run_id, path = %path.display(), "report exported");
            if ctx.robot_mode {
                return output::emit_robot(&output::robot_ok(serde_json::json!({
                    "run_id": args.run_id,
                    "path": path,
                    "format": args.format,
                })));
            }
            println!("Exported {} to {}", args.run_id, path.display());
            Ok(())
        }
        None if ctx.robot_mode => {
            let warnings = output::gate_warnings(&report.gates);
            output::emit_robot(&output::robot_ok(&report).with_warnings(warnings))
        }
        None => {
            print!("{}", render(&report, args.format)?);
            Ok(())
        }
    }
}

fn render(report: &RunReport, format: ExportFormat) -> Result<String> {
    Ok(match format {
        ExportFormat::Json => {
            let mut rendered = serde_json::to_string_pretty(report)?;
            rendered.push('\n');
            rendered
        }
        ExportFormat::Yaml => serde_yaml::to_string(report)?,
    })
}
