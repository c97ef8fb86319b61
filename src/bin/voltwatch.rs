//! `voltwatch` command line front-end

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use voltwatch::sink::placeholder_row;
use voltwatch::{
    ChannelId, Pipeline, PipelineConfig, PipelineStats, ReplaySource, TelemetryError, TracingSink,
    Voltwatch,
};

/// Longest a replay is allowed to run before giving up on draining.
const REPLAY_LIMIT: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Parser, Debug)]
#[command(name = "voltwatch", version, about = "Serial telemetry monitor")]
struct Cli {
    /// YAML configuration file (defaults apply when omitted).
    #[arg(long, short, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Monitor a live serial port until Ctrl-C.
    Monitor {
        /// Serial device, overrides `serial.path`.
        #[arg(long)]
        port: Option<String>,

        /// Line rate, overrides `serial.baud_rate`.
        #[arg(long)]
        baud: Option<u32>,
    },
    /// Replay a raw capture file.
    Replay {
        /// Capture of the raw byte stream.
        capture: PathBuf,

        /// Replay as fast as possible instead of at the serial line rate.
        #[arg(long)]
        unpaced: bool,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    if let Err(err) = run(cli).await {
        eprintln!("error: {err:#}");
        if let Some(telemetry) = err.downcast_ref::<TelemetryError>() {
            for suggestion in telemetry.recovery_suggestions() {
                eprintln!("  - {suggestion}");
            }
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = match &cli.config {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => PipelineConfig::default(),
    };

    for channel in ChannelId::ALL {
        info!("{}", placeholder_row(channel));
    }

    let stats = match cli.command {
        Command::Monitor { port, baud } => {
            if let Some(port) = port {
                config.serial.path = port;
            }
            if let Some(baud) = baud {
                config.serial.baud_rate = baud;
            }
            config.validate()?;

            let mut pipeline = Voltwatch::serial(config, Arc::new(TracingSink))?;
            tokio::signal::ctrl_c().await.context("waiting for Ctrl-C")?;
            info!("Interrupted, shutting down");
            pipeline.stop().await
        }
        Command::Replay { capture, unpaced } => {
            let source = ReplaySource::open(&capture)?;
            let source =
                if unpaced { source } else { source.with_baud_rate(config.serial.baud_rate) };

            let mut pipeline = Pipeline::new(config, Arc::new(TracingSink))?;
            pipeline.start(source)?;

            tokio::select! {
                drained = pipeline.wait_until_drained(REPLAY_LIMIT) => drained?,
                interrupted = tokio::signal::ctrl_c() => {
                    interrupted.context("waiting for Ctrl-C")?;
                    warn!("Interrupted before the capture was fully decoded");
                }
            }
            pipeline.stop().await
        }
    };

    if let Some(stats) = stats {
        report(&stats);
    }
    Ok(())
}

fn report(stats: &PipelineStats) {
    info!(
        bytes_read = stats.ingest.bytes_read,
        short_writes = stats.ingest.short_writes,
        read_errors = stats.ingest.read_errors,
        frames = stats.decoder.frames_accepted,
        framing_discards = stats.decoder.framing_discards,
        checksum_discards = stats.decoder.checksum_discards,
        contention_skips = stats.decoder.contention_skips,
        "Session summary"
    );
}
