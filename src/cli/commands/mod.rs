//! CLI command implementations
//!
//! Each subcommand has its own module with:
//! - Args struct for command-line arguments
//! - `run()` function to execute the command

use crate::app::AppContext;
use crate::cli::Commands;
use crate::error::Result;

pub mod config;
pub mod export;
pub mod resume;
pub mod run;
pub mod runs;
pub mod score;

/// Dispatch a command to its handler
pub fn run(ctx: &AppContext, command: &Commands) -> Result<()> {
    match command {
        Commands::Run(args) => run::run(ctx, args),
        Commands::Resume(args) => resume::run(ctx, args),
        Commands::Runs(args) => runs::run(ctx, args),
        Commands::Export(args) => export::run(ctx, args),
        Commands::Score(args) => score::run(ctx, args),
        Commands::Config(args) => config::run(ctx, args),
    }
}
