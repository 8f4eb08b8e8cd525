//! Print server activity as JSON lines
//!
//! Every event received from the enabled sources is written to stdout as one
//! JSON object per line. Diagnostics go to stderr (`RUST_LOG`).

use anyhow::{Context, Result};
use clap::Parser;
use plex_activity::{Activity, ActivityConfig};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "plex-activity")]
#[command(about = "Stream playback and library activity from a Plex Media Server", long_about = None)]
struct Args {
    /// Configuration file (YAML or JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Server host
    #[arg(long, env = "PLEX_HOST")]
    host: Option<String>,

    /// Server port
    #[arg(long, env = "PLEX_PORT")]
    port: Option<u16>,

    /// Authentication token
    #[arg(long, env = "PLEXTOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Path of the server log to tail
    #[arg(long, env = "PLEX_LOG_PATH")]
    log_path: Option<PathBuf>,

    /// Do not subscribe to the notification socket
    #[arg(long)]
    no_websocket: bool,

    /// Do not tail the server log
    #[arg(long)]
    no_logging: bool,

    /// Event patterns to print (e.g. `websocket.timeline.*`)
    #[arg(short, long = "event", default_value = "*")]
    events: Vec<String>,
}

impl Args {
    async fn config(&self) -> Result<ActivityConfig> {
        let mut config = match &self.config {
            Some(path) => ActivityConfig::from_file(path)
                .await
                .with_context(|| format!("Failed to load {}", path.display()))?,
            None => ActivityConfig::default(),
        };

        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(token) = &self.token {
            config.server.token = Some(token.clone());
        }
        if let Some(path) = &self.log_path {
            config.logging.path = Some(path.clone());
        }
        if self.no_websocket {
            config.websocket.enabled = false;
        }
        if self.no_logging {
            config.logging.enabled = false;
        }

        Ok(config)
    }
}

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    smol::block_on(run(args))
}

async fn run(args: Args) -> Result<()> {
    let config = args.config().await?;
    info!(
        "Watching {}:{} (websocket: {}, logging: {})",
        config.server.host, config.server.port, config.websocket.enabled, config.logging.enabled
    );

    let activity = Activity::new(config);

    for pattern in &args.events {
        activity
            .on(pattern, |event| match serde_json::to_string(event) {
                Ok(line) => println!("{}", line),
                Err(e) => warn!("Unable to serialize {}: {}", event.name, e),
            })
            .with_context(|| format!("Cannot subscribe to {}", pattern))?;
    }

    let handle = activity.start()?;
    if handle.sources().is_empty() {
        anyhow::bail!("No sources enabled");
    }

    for (source, exit) in handle.join().await {
        info!("{} source finished: {:?}", source, exit);
    }

    Ok(())
}
