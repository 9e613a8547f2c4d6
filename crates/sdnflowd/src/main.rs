//! sdnflow controller daemon
//!
//! Main entry point for sdnflowd. Replays or follows a newline-delimited
//! JSON event feed through the forwarding core.

use anyhow::{Context, Result};
use clap::Parser;
use sdnflowd::{config::DEFAULT_CONFIG_PATH, Daemon, DaemonConfig};
use std::path::PathBuf;
use tokio::fs::File;
use tokio::io::BufReader;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "sdnflowd", version, about = "Topology-aware SDN forwarding daemon")]
struct Args {
    /// Configuration file (missing file means defaults)
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Event feed to read, or "-" for stdin
    #[arg(short, long, default_value = "-")]
    events: String,

    /// Log filter, e.g. "debug" or "sdnflow_core=debug"; RUST_LOG wins
    #[arg(long)]
    log_level: Option<String>,

    /// Stats poll interval in seconds
    #[arg(long)]
    stats_interval: Option<u64>,

    /// Flood ARP requests instead of answering them
    #[arg(long)]
    no_proxy_arp: bool,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    dump_config: bool,
}

impl Args {
    fn apply(&self, config: &mut DaemonConfig) {
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
        if let Some(secs) = self.stats_interval {
            config.monitor.stats_interval_secs = secs;
        }
        if self.no_proxy_arp {
            config.controller.proxy_arp = false;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = DaemonConfig::load_or_default(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    args.apply(&mut config);
    config.validate().context("invalid configuration")?;

    if args.dump_config {
        print!("{}", config.to_toml()?);
        return Ok(());
    }

    init_logging(&config)?;
    info!(config = %args.config.display(), events = %args.events, "sdnflowd starting");

    match run(config, &args.events).await {
        Ok(()) => {
            info!("sdnflowd exiting normally");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "sdnflowd exiting with error");
            Err(e)
        }
    }
}

fn init_logging(config: &DaemonConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.logging.level)
            .with_context(|| format!("bad log level {:?}", config.logging.level))?,
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);
    let installed = if config.logging.json {
        builder.json().try_init()
    } else {
        builder.compact().try_init()
    };
    installed.map_err(|e| anyhow::anyhow!("failed to set logger: {}", e))
}

async fn run(config: DaemonConfig, events: &str) -> Result<()> {
    let daemon = Daemon::new(config)?;
    let shutdown = setup_signal_handler();

    let summary = if events == "-" {
        daemon
            .run(BufReader::new(tokio::io::stdin()), shutdown)
            .await?
    } else {
        let file = File::open(events)
            .await
            .with_context(|| format!("opening event feed {}", events))?;
        daemon.run(BufReader::new(file), shutdown).await?
    };

    info!(
        events = summary.events,
        failed = summary.failed,
        malformed = summary.feed.map_or(0, |feed| feed.malformed),
        "run complete"
    );
    let metrics = daemon.metrics().render()?;
    debug!(metrics = %metrics, "final metrics");
    Ok(())
}

/// Cancels the returned token on Ctrl-C.
fn setup_signal_handler() -> CancellationToken {
    let shutdown = CancellationToken::new();
    let token = shutdown.clone();

    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            info!("received SIGINT");
            token.cancel();
        }
    });

    shutdown
}
