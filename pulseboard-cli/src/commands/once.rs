use anyhow::Result;
use clap::Args;
use colored::Colorize;
use pulseboard_core::{PulseboardConfig, TickOutcome};

use super::watch::build;
use crate::config::CliOverrides;
use crate::render::OutputFormat;

#[derive(Debug, Args)]
pub struct OnceArgs {
    #[command(flatten)]
    pub overrides: CliOverrides,

    #[arg(short, long, value_enum, default_value = "table", help = "Output format")]
    pub format: OutputFormat,
}

pub async fn handle_once_command(config: PulseboardConfig, args: OnceArgs) -> Result<()> {
    let (_config, poller) = build(config, &args.overrides, args.format)?;

    match poller.tick().await {
        TickOutcome::Applied { .. } => Ok(()),
        TickOutcome::NoUpdate => {
            eprintln!("{}", "Response contained no samples.".yellow());
            Ok(())
        }
        TickOutcome::Failed(e) => Err(e.into()),
        TickOutcome::Skipped | TickOutcome::Discarded => Ok(()),
    }
}
