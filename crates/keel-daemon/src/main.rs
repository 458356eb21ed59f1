// crates/keel-daemon/src/main.rs
//
// Binary entrypoint for the Keel protocol daemon.
//
// Loads configuration, initializes tracing, bootstraps the protocol against
// a simulated oracle, funds the configured holders, and drives epochs on a
// tokio scheduler until the epoch target or ctrl-c. Prints a JSON summary
// of the final state on exit.

mod config;
mod error;
mod events;
mod holders;
mod oracle;
mod scheduler;

use std::time::Duration;

use clap::Parser;
use config::DaemonConfig;
use holders::Holder;
use oracle::SimulatedOracle;
use scheduler::EpochScheduler;

use keel_core::format_amount;
use keel_treasury::Protocol;

/// Keel protocol daemon: runs the treasury epoch loop against a simulated
/// price feed.
#[derive(Parser, Debug)]
#[command(name = "keel-daemon", version = "0.1.0", about = "Keel protocol epoch runner")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(long, default_value = "~/.keel/config.toml")]
    config: String,

    /// Number of epochs to run (0 runs until ctrl-c). Overrides the config.
    #[arg(long)]
    epochs: Option<u64>,

    /// Seed for the simulated oracle. Overrides the config.
    #[arg(long)]
    seed: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Load before tracing is up so the configured log level applies; the
    // outcome is logged right after.
    let config_path = expand_tilde(&args.config);
    let loaded = DaemonConfig::load(&config_path);
    let mut daemon_config = match &loaded {
        Ok(cfg) => cfg.clone(),
        Err(_) => DaemonConfig::default(),
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&daemon_config.log_level)),
        )
        .init();

    match loaded {
        Ok(_) => tracing::info!("Loaded configuration from {}", config_path),
        Err(e) => tracing::warn!(
            "Could not load config from {}: {}. Using defaults.",
            config_path,
            e
        ),
    }

    // CLI flags override the config file values.
    if let Some(epochs) = args.epochs {
        daemon_config.epochs = epochs;
    }
    if let Some(seed) = args.seed {
        daemon_config.oracle.seed = Some(seed);
    }

    tracing::info!("Keel Protocol Daemon v0.1.0");
    let start_time = u64::try_from(chrono::Utc::now().timestamp()).unwrap_or(0);
    let oracle = SimulatedOracle::from_config(&daemon_config.oracle)?;
    tracing::info!(
        "Epochs: {} (tick {}ms), initial price {}",
        daemon_config.epochs,
        daemon_config.tick_ms,
        format_amount(oracle.price())
    );
    let mut protocol = Protocol::bootstrap(&daemon_config.protocol, Box::new(oracle.handle()), start_time)?;

    let mut holders = Vec::with_capacity(daemon_config.holders.len());
    for holder_config in &daemon_config.holders {
        let holder = Holder::from_config(holder_config);
        protocol.genesis_mint(holder.account(), holder_config.dollars)?;
        tracing::info!(
            "Funded {} with {} {}",
            holder.account(),
            format_amount(holder_config.dollars),
            protocol.dollar.symbol()
        );
        holders.push(holder);
    }

    // Create broadcast channel for epoch events.
    let (event_tx, event_rx) = tokio::sync::broadcast::channel(64);
    let reporter = tokio::spawn(scheduler::report_events(event_rx));

    let scheduler = EpochScheduler::new(
        protocol,
        oracle,
        holders,
        Duration::from_millis(daemon_config.tick_ms.max(1)),
        daemon_config.epochs,
        event_tx,
    );
    let summary = scheduler.run().await?;
    if let Err(e) = reporter.await {
        tracing::error!("Report task failed: {}", e);
    }

    println!("{}", serde_json::to_string_pretty(&summary)?);
    tracing::info!("Keel daemon shut down gracefully");
    Ok(())
}

/// Expand `~` at the start of a path to the user's home directory.
fn expand_tilde(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return format!("{}/{}", home.display(), rest);
        }
    }
    path.to_string()
}
