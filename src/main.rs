//! cmap - competency mapper CLI
//!
//! Turns job responsibilities into a validated, ranked competency set.

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use cmap::Result;
use cmap::app::AppContext;
use cmap::cli::{Cli, output};
use cmap::error::CmError;

/// Exit status when a quality gate halts the pipeline.
const EXIT_GATE_BLOCKED: u8 = 2;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report_error(&cli, &err);
            exit_code(&err)
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    let ctx = AppContext::from_cli(cli)?;
    cmap::cli::commands::run(&ctx, &cli.command)
}

fn report_error(cli: &Cli, err: &CmError) {
    if cli.robot {
        // Robot mode: structured error on stdout
        if let Err(emit_err) = output::emit_robot(&output::robot_error(err)) {
            eprintln!("Error: {err} ({emit_err})");
        }
        return;
    }
    eprintln!("Error: {err}");
    let structured = err.to_structured();
    eprintln!("  {}", structured.suggestion);
}

fn exit_code(err: &CmError) -> ExitCode {
    if err.is_gate_block() {
        ExitCode::from(EXIT_GATE_BLOCKED)
    } else {
        ExitCode::FAILURE
    }
}

fn init_tracing(cli: &Cli) {
    if cli.quiet {
        return;
    }

    let filter = match cli.verbose {
        0 => "warn,cmap=info",
        1 => "info,cmap=debug",
        2 => "debug,cmap=trace",
        _ => "trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    if cli.robot {
        // JSON logging for robot mode
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
