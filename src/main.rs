//! Channel forwarder - main entry point

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use channel_forwarder::config::Config;
use channel_forwarder::credentials::{self, StdinPrompt};
use channel_forwarder::forwarder::Forwarder;
use channel_forwarder::metrics;
use channel_forwarder::session::{SessionLock, TelegramConnection};
use channel_forwarder::telegram::TelegramChannelClient;

#[derive(Parser)]
#[command(name = "channel_forwarder")]
#[command(about = "Forward messages between Telegram channels", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the YAML configuration file
    #[arg(long, default_value = "config.yml")]
    config: PathBuf,

    /// Path to the credentials file (overrides the config)
    #[arg(long)]
    credentials: Option<PathBuf>,

    /// Address to expose Prometheus metrics (e.g., 0.0.0.0:9898)
    #[arg(long, env = "METRICS_ADDR")]
    metrics_addr: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env for local development
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("channel_forwarder=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    if let Some(addr) = cli.metrics_addr.as_deref() {
        match addr.parse::<SocketAddr>() {
            Ok(socket) => metrics::spawn_metrics_server(socket),
            Err(err) => warn!(%addr, "Invalid metrics address: {}", err),
        }
    }

    let config = Config::load_from_file(&cli.config).map_err(anyhow::Error::msg)?;
    config.validate().map_err(anyhow::Error::msg)?;

    let credentials_path = cli
        .credentials
        .unwrap_or_else(|| config.credentials_file.clone());
    let mut prompts = StdinPrompt;
    let creds = credentials::load_or_prompt(&credentials_path, &mut prompts)?;

    // One forwarder per session at a time
    let _lock = SessionLock::acquire()?;

    let connection =
        TelegramConnection::connect(&config.session_file(&creds.phone), creds.api_id_number()?)
            .await?;
    connection.authorize(&creds, &mut prompts).await?;

    info!("Bot started. Forwarding messages...");

    let client = TelegramChannelClient::new(connection.client.clone());
    let mut forwarder = Forwarder::from_config(client, &config);
    forwarder.seed().await;
    forwarder.run().await;

    Ok(())
}
