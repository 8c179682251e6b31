//! camlink receiver entry point.
//!
//! ```text
//! camlink-receiver                        Listen with config defaults
//! camlink-receiver --config <path>        Load a custom config TOML
//! camlink-receiver --port 9000            Override the listen port
//! camlink-receiver --record --task "pick up the cube"
//! camlink-receiver --gen-config           Write default config to stdout
//! ```

use std::path::PathBuf;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use camlink_receiver::config::ReceiverConfig;
use camlink_receiver::service::ReceiverService;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "camlink-receiver", about = "Receive camlink camera streams")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "camlink-receiver.toml")]
    config: PathBuf,

    /// Listen port (overrides config).
    #[arg(short, long)]
    port: Option<u16>,

    /// Record received frames.
    #[arg(long)]
    record: bool,

    /// Dataset root for recordings (overrides config).
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Task description stored with the recording.
    #[arg(long)]
    task: Option<String>,

    /// Task type stored with the recording.
    #[arg(long)]
    task_type: Option<String>,

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
        let text = toml::to_string_pretty(&ReceiverConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    let mut config = ReceiverConfig::load(&cli.config);
    if let Some(port) = cli.port {
        config.network.port = port;
    }
    if cli.record {
        config.recording.enabled = true;
    }
    if let Some(output) = cli.output {
        config.recording.output_dir = output;
    }
    if let Some(task) = cli.task {
        config.recording.task_description = task;
    }
    if let Some(task_type) = cli.task_type {
        config.recording.task_type = task_type;
    }

    // Init tracing.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("camlink-receiver v{}", env!("CARGO_PKG_VERSION"));
    info!("listen: {}:{}", config.network.bind_addr, config.network.port);
    if config.recording.enabled {
        info!("dataset root: {}", config.recording.output_dir.display());
    }

    let service = ReceiverService::bind(config).await?;
    let stop = service.stop_handle();

    // Ctrl-C handler.
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Ctrl-C received, shutting down");
        stop.cancel();
    });

    service.run().await?;

    Ok(())
}
