use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use intellicenter_bridge::logging::{self, LoggingMode};
use intellicenter_bridge::{default_state_file, protocol, Bridge, BridgeConfig, Intent};
use intellicenter_state::{DecoderOptions, SideFile, SnapshotStore};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};

/// IntelliCenter bridge
///
/// Reads display intents as JSON lines on stdin and writes pool snapshots as
/// JSON lines on stdout. Logs go to stderr.
#[derive(Parser, Debug)]
#[command(name = "intellicenter-bridge")]
#[command(version)]
struct Args {
    /// Configuration file sent as the first configure intent
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Where the last nonzero pH and ORP readings are kept
    #[arg(long)]
    state_file: Option<PathBuf>,

    /// Logging mode (silent, development, debug); defaults to INTELLICENTER_LOG_MODE
    #[arg(long)]
    log_mode: Option<LoggingMode>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Search the network once and print the first unit that answers
    Discover {
        /// IPv4 address of the interface to search on
        #[arg(short, long, default_value = "")]
        interface: String,

        /// Seconds between searches
        #[arg(short, long, default_value = "5", value_parser = clap::value_parser!(u64).range(1..))]
        retry: u64,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mode = match args.log_mode {
        Some(mode) => mode,
        None => logging::mode_from_env(LoggingMode::Development)?,
    };
    logging::init_logging(mode)?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start the async runtime")?;

    runtime.block_on(run(args))
}

async fn run(args: Args) -> Result<()> {
    if let Some(Commands::Discover { interface, retry }) = &args.command {
        let unit = intellicenter_discovery::discover(interface, Duration::from_secs(*retry)).await?;
        println!("{} at {}:{}", unit.name, unit.address, unit.port);
        return Ok(());
    }

    let state_file = args.state_file.clone().unwrap_or_else(default_state_file);
    info!("keeping last readings in {}", state_file.display());
    let store = SnapshotStore::with_side_file(DecoderOptions::default(), SideFile::new(state_file));
    let mut bridge = Bridge::with_network(store).spawn();

    if let Some(path) = &args.config {
        let config = BridgeConfig::from_file(path)?;
        bridge.configure(config).await?;
    }

    // stdin gets its own task so a full intent channel never stops the event drain
    let mut input = tokio::spawn(read_intents(bridge.intents.clone()));
    let mut stdout = tokio::io::stdout();

    loop {
        tokio::select! {
            _ = &mut input => break,
            event = bridge.next_event() => {
                let Some(event) = event else { break };
                let mut line = protocol::encode_event(&event)?;
                line.push('\n');
                stdout
                    .write_all(line.as_bytes())
                    .await
                    .context("failed to write to stdout")?;
                stdout.flush().await.context("failed to write to stdout")?;
            }
        }
    }

    input.abort();
    bridge.shutdown().await;
    Ok(())
}

/// Forward decoded stdin lines until input closes or the supervisor stops
async fn read_intents(intents: mpsc::Sender<Intent>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        match lines.next_line().await {
            Ok(Some(line)) => match protocol::decode_intent(&line) {
                Ok(Some(intent)) => {
                    if intents.send(intent).await.is_err() {
                        warn!("bridge stopped, ignoring further input");
                        return;
                    }
                }
                Ok(None) => {}
                Err(e) => warn!("skipping input line: {}", e),
            },
            Ok(None) => {
                info!("input closed, shutting down");
                return;
            }
            Err(e) => {
                warn!("failed to read input: {}", e);
                return;
            }
        }
    }
}
