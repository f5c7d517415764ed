//! Ignite - Entry Point
//!
//! Loads the client configuration, connects to the game server, logs in
//! and drives the controlled NPCs on a fixed tick until Ctrl-C or until
//! the server hangs up.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;
use tokio::runtime::Runtime;
use tracing_subscriber::EnvFilter;

use ignite::ai::Controller;
use ignite::core::config::{ClientConfig, CONFIG_FILE_NAME};
use ignite::core::error::Result;
use ignite::core::types::Millis;
use ignite::net::Connection;
use ignite::session::Session;

#[derive(Parser, Debug)]
#[command(name = "ignite")]
#[command(about = "Headless client that drives NPCs on a game server")]
struct Args {
    /// Config file (defaults to .ignite.toml in the working directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Seed for the behavior RNG
    #[arg(long)]
    seed: Option<u64>,

    /// Override the tick period in milliseconds
    #[arg(long)]
    tick_ms: Option<Millis>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ignite=info")),
        )
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;

    let rt = Runtime::new()?;
    rt.block_on(run(config, args.seed))
}

fn load_config(args: &Args) -> Result<ClientConfig> {
    let mut config = match &args.config {
        Some(path) => ClientConfig::load(path)?,
        None => {
            let path = PathBuf::from(CONFIG_FILE_NAME);
            if path.exists() {
                ClientConfig::load(&path)?
            } else {
                tracing::warn!("no {} found, using defaults", CONFIG_FILE_NAME);
                let mut config = ClientConfig::default();
                config.apply_env();
                config
            }
        }
    };
    if let Some(tick_ms) = args.tick_ms {
        config.client.tick_ms = tick_ms;
    }
    config.validate()?;
    Ok(config)
}

async fn run(config: ClientConfig, seed: Option<u64>) -> Result<()> {
    let controller = match seed {
        Some(seed) => Controller::with_seed(config.ai.clone(), seed),
        None => Controller::new(config.ai.clone()),
    };
    let session = Arc::new(Session::with_controller(controller, config.client.trade_memory));

    let address = config.server.address();
    tracing::info!(address = %address, "Ignite starting...");
    let conn = Connection::connect(address, config.client.max_frame_len).await?;

    tracing::info!(server = %conn.address(), "connected");
    session.attach_connection(&conn);
    session.login(&config.user)?;

    let mut ticker = tokio::time::interval(Duration::from_millis(config.client.tick_ms));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let mut last = Instant::now();

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let now = Instant::now();
                let delta = now.duration_since(last).as_millis() as Millis;
                last = now;
                let report = session.tick(delta);
                if !report.advanced.is_empty() {
                    tracing::trace!(evaluated = report.evaluated, advanced = report.advanced.len(), "tick");
                }
            }
            _ = conn.wait_closed() => {
                tracing::warn!("server connection closed");
                break;
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted, shutting down");
                break;
            }
        }
    }

    conn.close();
    session.detach();
    tracing::info!("Ignite stopped");
    Ok(())
}
