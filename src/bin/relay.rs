//! Voice Relay Application
//!
//! Binds a UDP socket and forwards every caller's datagrams to every
//! other caller it has heard from recently.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lan_voice_caller::{config::AppConfig, link::ShutdownFlag, relay::RelayServer};

#[derive(Parser, Debug)]
#[command(version, about = "UDP fan-out relay for voice callers")]
struct Cli {
    /// Path to a TOML config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// UDP listen address as host:port
    #[arg(short, long)]
    listen: Option<String>,

    /// OS receive buffer size in bytes (0 keeps the OS default)
    #[arg(long)]
    read_buffer: Option<usize>,

    /// Largest datagram to read and forward
    #[arg(long)]
    max_packet: Option<usize>,

    /// Internal packet queue capacity
    #[arg(short, long)]
    queue: Option<usize>,

    /// UDP read timeout in milliseconds, used for shutdown checks
    #[arg(long)]
    read_timeout_ms: Option<u64>,

    /// Remove callers after this idle time in seconds (0 disables)
    #[arg(long)]
    client_ttl_secs: Option<u64>,

    /// How often inactive callers are pruned, in seconds
    #[arg(long)]
    cleanup_interval_secs: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref())?;

    let mut relay = config.relay;
    if let Some(listen) = cli.listen {
        relay.listen = listen;
    }
    if let Some(read_buffer) = cli.read_buffer {
        relay.read_buffer_bytes = read_buffer;
    }
    if let Some(max_packet) = cli.max_packet {
        relay.max_packet_size = max_packet;
    }
    if let Some(queue) = cli.queue {
        relay.queue_size = queue;
    }
    if let Some(timeout) = cli.read_timeout_ms {
        relay.read_timeout_ms = timeout;
    }
    if let Some(ttl) = cli.client_ttl_secs {
        relay.client_ttl_secs = ttl;
    }
    if let Some(interval) = cli.cleanup_interval_secs {
        relay.cleanup_interval_secs = interval;
    }

    let server = RelayServer::bind(relay)?;
    tracing::info!(addr = %server.local_addr()?, "relay listening");

    let stop = ShutdownFlag::new();

    let interrupt_stop = stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, shutting down");
            interrupt_stop.raise();
        }
    });

    let run_stop = stop.clone();
    tokio::task::spawn_blocking(move || server.run(&run_stop)).await??;

    Ok(())
}
