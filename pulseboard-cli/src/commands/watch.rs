use anyhow::Result;
use clap::Args;
use colored::Colorize;
use pulseboard_core::{next_delay, PollerStatus, PulseboardConfig, SamplePoller};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::config::CliOverrides;
use crate::render::{sink_for, OutputFormat};

#[derive(Debug, Args)]
pub struct WatchArgs {
    #[command(flatten)]
    pub overrides: CliOverrides,

    #[arg(short, long, value_enum, default_value = "table", help = "Output format")]
    pub format: OutputFormat,

    #[arg(long, help = "Stop after this many poll cycles")]
    pub max_ticks: Option<u64>,
}

pub(crate) fn build(
    config: PulseboardConfig,
    overrides: &CliOverrides,
    format: OutputFormat,
) -> Result<(PulseboardConfig, SamplePoller)> {
    let config = overrides.apply(config)?;
    let url = config.endpoint_url()?;
    let poller = config.build_poller(sink_for(format, &url))?;
    debug!(url = %url, poller = %poller.id(), "Built poller");
    Ok((config, poller))
}

pub async fn handle_watch_command(config: PulseboardConfig, args: WatchArgs) -> Result<()> {
    let (config, poller) = build(config, &args.overrides, args.format)?;

    match args.max_ticks {
        Some(max_ticks) => run_bounded(&poller, max_ticks, config.poller.stop_when_finished).await,
        None => {
            poller.start().await;
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("Interrupted, stopping poller");
                    poller.stop().await;
                }
                _ = poller.join() => {}
            }
        }
    }

    if args.format == OutputFormat::Table {
        print_summary(&poller.status().await);
    }

    Ok(())
}

/// Drives `max_ticks` cycles in the foreground with the same drift rule as
/// the background loop.
async fn run_bounded(poller: &SamplePoller, max_ticks: u64, stop_when_finished: bool) {
    let interval = poller.settings().interval;

    for tick in 0..max_ticks {
        let started = Instant::now();
        let outcome = poller.tick().await;

        if outcome.is_finished() && stop_when_finished {
            info!(tick = tick + 1, "Run finished");
            break;
        }

        if tick + 1 < max_ticks {
            tokio::time::sleep(next_delay(interval, started.elapsed())).await;
        }
    }
}

fn print_summary(status: &PollerStatus) {
    eprintln!();
    eprintln!(
        "  {} {} ticks, {} applied, {} empty, {} failed ({:.1}% ok)",
        "Summary:".bold(),
        status.ticks,
        status.applied.to_string().green(),
        status.no_update,
        if status.failures > 0 {
            status.failures.to_string().red()
        } else {
            status.failures.to_string().normal()
        },
        status.success_rate()
    );
    if let Some(message) = &status.last_error {
        eprintln!("  {} {}", "Last error:".bold(), message.red());
    }
}
