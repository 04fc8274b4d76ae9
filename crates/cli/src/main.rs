mod config;
mod replay;

use anyhow::Result;
use barflow_data::csv_loader::{self, parse_timestamp};
use barflow_data::filter_range;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use config::{ReplayConfig, KINDS};
use replay::OutputOptions;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "barflow")]
#[command(about = "Replay market data through streaming technical indicators")]
#[command(version)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", env = "BARFLOW_LOG")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a CSV file through the configured indicators
    Replay {
        /// Path to CSV data file (bars, or ticks with --ticks)
        #[arg(short, long)]
        data: PathBuf,

        /// Path to the TOML indicator configuration
        #[arg(short, long)]
        config: PathBuf,

        /// Treat the data file as ticks (timestamp, bid, ask, last, volume)
        #[arg(long)]
        ticks: bool,

        /// Synthetic intra-bar previews emitted before each final bar
        #[arg(long, default_value = "0")]
        preview_steps: usize,

        /// Print values as JSON lines
        #[arg(long)]
        json: bool,

        /// Also print preview values
        #[arg(long)]
        print_previews: bool,

        /// Skip data before this time
        #[arg(long)]
        from: Option<String>,

        /// Skip data after this time
        #[arg(long)]
        to: Option<String>,

        /// Number of recent committed values logged per indicator
        #[arg(long, default_value = "3")]
        recent: usize,
    },

    /// List configurable indicator kinds
    Indicators,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Commands::Replay {
            data,
            config,
            ticks,
            preview_steps,
            json,
            print_previews,
            from,
            to,
            recent,
        } => {
            let range = (parse_bound(from)?, parse_bound(to)?);
            let options = OutputOptions {
                json,
                print_previews,
            };
            run_replay(data, config, ticks, preview_steps, options, range, recent)?;
        }
        Commands::Indicators => {
            println!("Configurable indicator kinds:");
            for (kind, params) in KINDS {
                println!("  {kind:<16} {params}");
            }
        }
    }

    Ok(())
}

fn parse_bound(value: Option<String>) -> Result<Option<DateTime<Utc>>> {
    Ok(value.as_deref().map(parse_timestamp).transpose()?)
}

fn run_replay(
    data_path: PathBuf,
    config_path: PathBuf,
    ticks: bool,
    preview_steps: usize,
    options: OutputOptions,
    (start, end): (Option<DateTime<Utc>>, Option<DateTime<Utc>>),
    recent: usize,
) -> Result<()> {
    let config = ReplayConfig::load(&config_path)?;
    let mut slots = replay::build_slots(&config)?;

    tracing::info!(
        data = %data_path.display(),
        config = %config_path.display(),
        indicators = slots.len(),
        preview_steps,
        "Starting replay"
    );

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());

    let emitted = if ticks {
        if preview_steps > 0 {
            tracing::warn!("--preview-steps is ignored for tick data");
        }
        let ticks = filter_range(csv_loader::load_ticks_from_csv(&data_path)?, start, end);
        tracing::info!(ticks = ticks.len(), "Loaded tick data");
        if ticks.is_empty() {
            anyhow::bail!("No ticks loaded from CSV file");
        }
        replay::replay_ticks(&mut slots, &ticks, options, &mut out)?
    } else {
        let bars = filter_range(csv_loader::load_bars_from_csv(&data_path)?, start, end);
        tracing::info!(bars = bars.len(), "Loaded historical data");
        if bars.is_empty() {
            anyhow::bail!("No bars loaded from CSV file");
        }
        replay::replay_bars(&mut slots, &bars, preview_steps, options, &mut out)?
    };
    out.flush()?;

    tracing::info!(emitted, "Replay complete");
    replay::summarize(&slots, recent);
    Ok(())
}
