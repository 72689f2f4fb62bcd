//! cmap config - Show or validate the effective configuration

use clap::{Args, Subcommand};
use colored::Colorize;

use crate::app::AppContext;
use crate::cli::output;
use crate::config::Config;
use crate::error::{CmError, Result};

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the merged configuration as TOML
    Show,
    /// Check weights, thresholds and ranges
    Validate,
}

pub fn run(ctx: &AppContext, args: &ConfigArgs) -> Result<()> {
    match args.command {
        ConfigCommand::Show => emit_config(ctx),
        ConfigCommand::Validate => validate(ctx),
    }
}

fn emit_config(ctx: &AppContext) -> Result<()> {
    if ctx.robot_mode {
        return output::emit_robot(&output::robot_ok(&ctx.config));
    }
    println!("{}", render(&ctx.config)?);
    Ok(())
}

fn render(config: &Config) -> Result<String> {
    toml::to_string_pretty(config).map_err(|err| CmError::Config(format!("render config: {err}")))
}

fn validate(ctx: &AppContext) -> Result<()> {
    ctx.config.validate()?;
    let source = ctx
        .config_path
        .as_ref()
        .map_or_else(|| "defaults and discovered files".to_string(), |p| p.display().to_string());
    if ctx.robot_mode {
        return output::emit_robot(&output::robot_ok(serde_json::json!({
            "valid": true,
            "source": source,
        })));
    }
    println!("{} {source}", "valid".green().bold());
    Ok(())
}
