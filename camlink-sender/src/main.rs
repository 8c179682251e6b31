//! camlink sender entry point.
//!
//! ```text
//! camlink-sender                          Stream with config defaults
//! camlink-sender --config <path>          Load a custom config TOML
//! camlink-sender --server 10.0.0.2        Override the receiver IP
//! camlink-sender --camera left_wrist      Override the camera identity
//! camlink-sender --frames 300             Stop after 300 captured frames
//! camlink-sender --gen-config             Write default config to stdout
//! ```

use std::path::PathBuf;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use camlink_core::CameraIdentity;
use camlink_sender::config::SenderConfig;
use camlink_sender::service::SenderService;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "camlink-sender", about = "Stream a camera to the camlink receiver")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "camlink-sender.toml")]
    config: PathBuf,

    /// Receiver IP or host name (overrides config).
    #[arg(short, long)]
    server: Option<String>,

    /// Receiver port (overrides config).
    #[arg(short, long)]
    port: Option<u16>,

    /// Camera identity: high / left_wrist (overrides config).
    #[arg(long)]
    camera: Option<CameraIdentity>,

    /// Stop after this many captured frames.
    #[arg(long)]
    frames: Option<u64>,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // --gen-config: dump defaults and exit.
    if cli.gen_config {
        let text = toml::to_string_pretty(&SenderConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    let mut config = SenderConfig::load(&cli.config);
    if let Some(server) = cli.server {
        config.network.server_ip = server;
    }
    if let Some(port) = cli.port {
        config.network.server_port = port;
    }
    if let Some(camera) = cli.camera {
        config.camera.identity = camera;
    }

    // Init tracing.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("camlink-sender v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "receiver: {}:{}",
        config.network.server_ip, config.network.server_port
    );
    info!("camera: {}", config.camera.identity);
    info!(
        "target FPS: {}, JPEG quality: {}",
        config.camera.target_fps, config.camera.jpeg_quality
    );

    let service = SenderService::new(config);
    let stop = service.stop_handle();

    // Ctrl-C handler.
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Ctrl-C received, disconnecting");
        stop.store(false, std::sync::atomic::Ordering::SeqCst);
    });

    service.run(cli.frames).await?;

    Ok(())
}
