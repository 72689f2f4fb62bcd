//! CLI module - command-line interface definitions and handlers
//!
//! Uses clap v4 with derive macros for argument parsing.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub mod commands;
pub mod output;

/// Competency mapper - turn job responsibilities into a validated, ranked
/// competency set
#[derive(Parser, Debug)]
#[command(name = "cmap")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Machine-readable JSON output on stdout, JSON logs on stderr
    #[arg(long, global = true)]
    pub robot: bool,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress logging
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file path (default: ~/.config/cmap/config.toml, then ./cmap.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the pipeline for one or more jobs
    Run(commands::run::RunArgs),

    /// Re-enter a persisted run at a named stage
    Resume(commands::resume::ResumeArgs),

    /// List or inspect persisted runs
    Runs(commands::runs::RunsArgs),

    /// Export a run's report for rendering
    Export(commands::export::ExportArgs),

    /// Score one responsibility against one competency definition
    Score(commands::score::ScoreArgs),

    /// Show or validate the effective configuration
    Config(commands::config::ConfigArgs),
}
