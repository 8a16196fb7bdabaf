mod replay;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use hexapad_core::config::PanelConfig;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Alarm keypad bridge tools.
#[derive(Debug, Parser)]
#[command(name = "hexapad", version, about)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Parse and validate a panel configuration.
    CheckConfig {
        /// JSON configuration file.
        #[arg(short, long, env = "HEXAPAD_CONFIG")]
        config: PathBuf,
    },

    /// Replay a captured keypad byte stream through a panel.
    Replay(replay::ReplayArgs),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(err) = run(cli).await {
        eprintln!("Error: {err:?}");
        std::process::exit(1);
    }
}

fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::CheckConfig { config } => {
            let config = load_config(&config)?;
            println!(
                "ok: {} LEDs, {} groups, {} status reactions",
                config.strip.led_count,
                config.strip.groups.len(),
                config.status.reactions.len()
            );
            Ok(())
        }
        Command::Replay(args) => {
            let summary = replay::run(&args).await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
            Ok(())
        }
    }
}

/// Read and validate a JSON configuration file.
pub(crate) fn load_config(path: &Path) -> Result<PanelConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading configuration {}", path.display()))?;
    let config: PanelConfig = serde_json::from_str(&text)
        .with_context(|| format!("parsing configuration {}", path.display()))?;
    config
        .validate()
        .with_context(|| format!("validating configuration {}", path.display()))?;
    tracing::debug!(path = %path.display(), "Configuration loaded");
    Ok(config)
}
