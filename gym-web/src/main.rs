//! Gym Web Server
//!
//! HTTP API for exercises, routines and their access control.

use anyhow::{anyhow, Context};
use clap::Parser;
use gym_core::{init_logging, GymConfig};
use gym_web::GymServer;
use std::path::PathBuf;
use tracing::info;

/// Gym API server
#[derive(Parser)]
#[command(name = "gym-web")]
#[command(about = "HTTP API for the gym service")]
#[command(version)]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Server host to bind to
    #[arg(long)]
    host: Option<String>,

    /// Server port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// SQLite database URL
    #[arg(long)]
    database_url: Option<String>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long)]
    log_level: Option<String>,

    /// Subject granted the admin role at start-up
    #[arg(long)]
    bootstrap_admin: Option<String>,
}

impl Args {
    fn apply(self, config: &mut GymConfig) {
        if let Some(host) = self.host {
            config.server.host = host;
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(url) = self.database_url {
            config.database.url = url;
        }
        if let Some(level) = self.log_level {
            config.logging = config.logging.clone().with_level(&level);
        }
        if let Some(subject) = self.bootstrap_admin {
            config.auth.bootstrap_admin = Some(subject);
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    dotenvy::dotenv().ok();

    let mut config =
        GymConfig::load(args.config.as_deref()).context("failed to load configuration")?;
    args.apply(&mut config);
    config.validate().context("invalid configuration")?;

    init_logging(&config.logging).map_err(|e| anyhow!(e))?;

    info!("Starting gym-web {}", env!("CARGO_PKG_VERSION"));
    info!("Database: {}", config.database.url);

    let server = GymServer::new(config).await?;
    server.start().await?;

    Ok(())
}
