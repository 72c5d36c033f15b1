//! Voice Caller Application
//!
//! Captures the microphone, streams it as raw PCM datagrams to a peer or
//! relay, and plays back whatever arrives, substituting silence for gaps.

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lan_voice_caller::{
    audio::device::list_devices,
    config::AppConfig,
    link::{CallSession, ShutdownFlag},
};

#[derive(Parser, Debug)]
#[command(version, about = "Low-latency two-way PCM voice calls over UDP")]
struct Cli {
    /// Path to a TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List audio devices and their capabilities
    List,
    /// Start a two-way call
    Call(CallArgs),
}

#[derive(Args, Debug)]
struct CallArgs {
    /// Peer or relay address as host:port
    #[arg(short, long)]
    server: Option<String>,

    /// Sample rate in Hz
    #[arg(short = 'r', long)]
    sample_rate: Option<u32>,

    /// Frames per device buffer and per datagram
    #[arg(short, long)]
    frames: Option<usize>,

    /// Receive timeout in milliseconds before silence is substituted
    #[arg(long)]
    recv_timeout_ms: Option<u64>,

    /// Input device id as shown by `list`
    #[arg(short, long)]
    input_device: Option<String>,

    /// Output device id as shown by `list`
    #[arg(short, long)]
    output_device: Option<String>,
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

    match cli.command {
        Commands::List => {
            print_devices();
            Ok(())
        }
        Commands::Call(args) => run_call(config, args).await,
    }
}

fn print_devices() {
    println!("\n=== Available Audio Devices ===");
    for device in list_devices() {
        let kind = match (device.is_input, device.is_output) {
            (true, false) => "Input",
            (false, true) => "Output",
            _ => "Unknown",
        };
        let default_marker = if device.is_default { " [DEFAULT]" } else { "" };
        println!("  {} ({}){}:", device.name, kind, default_marker);
        println!("    ID: {}", device.id);
        println!("    Sample rates: {:?}", device.sample_rates);
        println!("    Max channels: {}", device.max_channels);
    }
    println!();
}

async fn run_call(config: AppConfig, args: CallArgs) -> Result<()> {
    let mut call = config.call;
    if let Some(server) = args.server {
        call.server = server;
    }
    if let Some(sample_rate) = args.sample_rate {
        call.sample_rate = sample_rate;
    }
    if let Some(frames) = args.frames {
        call.frames_per_buffer = frames;
    }
    if let Some(timeout) = args.recv_timeout_ms {
        call.recv_timeout_ms = timeout;
    }
    if args.input_device.is_some() {
        call.input_device = args.input_device;
    }
    if args.output_device.is_some() {
        call.output_device = args.output_device;
    }

    tracing::info!(
        server = %call.server,
        sample_rate = call.sample_rate,
        frames = call.frames_per_buffer,
        "starting call"
    );

    let stop = ShutdownFlag::new();

    let interrupt_stop = stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, hanging up");
            interrupt_stop.raise();
        }
    });

    let session_stop = stop.clone();
    let session = tokio::task::spawn_blocking(move || {
        CallSession::open(&call, session_stop)?.run()
    });

    session.await??;

    tracing::info!("call ended");
    Ok(())
}
