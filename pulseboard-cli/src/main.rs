use clap::{Parser, Subcommand};
use colored::Colorize;
use pulseboard_core::{CliErrorDisplay, LoggingConfig, PulseboardConfig, PulseboardError, PulseboardResult};
use std::process::ExitCode;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;
mod config;
mod render;

use commands::{
    handle_config_command, handle_once_command, handle_watch_command, ConfigFormat, OnceArgs,
    WatchArgs,
};
use config::CliOverrides;

const VERSION: &str = env!("CARGO_PKG_VERSION");
const NAME: &str = env!("CARGO_PKG_NAME");

#[derive(Parser)]
#[command(name = "pulseboard")]
#[command(version = VERSION)]
#[command(about = "Pulseboard - live hardware utilization dashboards in the terminal")]
#[command(long_about = r#"
Pulseboard polls a metrics server on a fixed interval and keeps a bounded,
synchronized window of recent samples per metric (CPU, GPU, RAM, power, ...).

Use 'pulseboard watch' for a live view of /monitor/live, or
'pulseboard watch --endpoint run_live --run-id 42' to follow a single run.
"#)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Poll an endpoint and redraw the dashboard on every update")]
    Watch(WatchArgs),

    #[command(about = "Poll an endpoint once and print the result")]
    Once(OnceArgs),

    #[command(about = "Show the effective configuration")]
    Config {
        #[command(flatten)]
        overrides: CliOverrides,

        #[arg(short, long, value_enum, default_value = "toml")]
        format: ConfigFormat,
    },

    #[command(about = "Show version information")]
    Version {
        #[arg(short, long)]
        detailed: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let loaded = PulseboardConfig::load();

    init_logging(cli.verbose, loaded.as_ref().ok().map(|c| &c.logging));

    match run(cli, loaded).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            match e.downcast_ref::<PulseboardError>() {
                Some(err) => eprint!("{}: {}", "Error".red().bold(), CliErrorDisplay::new(err)),
                None => eprintln!("{}: {:#}", "Error".red().bold(), e),
            }
            ExitCode::FAILURE
        }
    }
}

/// Logs go to stderr so stdout stays clean for tables and JSON.
fn init_logging(verbose: bool, logging: Option<&LoggingConfig>) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        let level = logging.map(|l| l.level.as_str()).unwrap_or("warn");
        EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    let json = logging.map(|l| l.json_format).unwrap_or(false);
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .init();
    }
}

async fn run(cli: Cli, loaded: PulseboardResult<PulseboardConfig>) -> anyhow::Result<()> {
    match cli.command {
        Commands::Watch(args) => handle_watch_command(loaded?, args).await,
        Commands::Once(args) => handle_once_command(loaded?, args).await,
        Commands::Config { overrides, format } => {
            handle_config_command(loaded?, &overrides, format)
        }
        Commands::Version { detailed } => cmd_version(detailed),
    }
}

fn cmd_version(detailed: bool) -> anyhow::Result<()> {
    if detailed {
        println!("{}", "Pulseboard Version Information".cyan().bold());
        println!("{}", "═".repeat(40).dimmed());
        println!("  {:<15} {}", "Version:".bold(), VERSION);
        println!("  {:<15} {}", "Name:".bold(), NAME);
        println!("  {:<15} Apache-2.0", "License:".bold());
        println!();
        println!("  {}", "Endpoints:".bold());
        println!("    monitor_live    /monitor/live            (latest)");
        println!("    run_live        /runs/{{id}}/live          (history)");
        println!("    metrics_by_run  /metrics/by_run/{{id}}     (history)");
        println!("    custom          any path, mapped fields  (latest)");
        println!();
        println!("  {}", "Build Information:".bold());
        println!("    Rust Edition: 2021");
        #[cfg(debug_assertions)]
        println!("    Build:        Debug");
        #[cfg(not(debug_assertions))]
        println!("    Build:        Release");
    } else {
        println!("pulseboard {}", VERSION);
    }

    Ok(())
}
