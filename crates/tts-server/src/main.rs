//! TTS gateway server.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use runtime::logging::init_logging_from_config;
use runtime::{SyntheticEngine, TtsMetrics};
use tts_core::ServiceConfig;
use tts_server::TtsServer;

/// HTTP gateway turning synthesis requests into audio files
#[derive(Debug, Parser)]
#[command(name = "tts-server")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Listen port [default: 6010]
    #[arg(long)]
    port: Option<u16>,

    /// Listen address [default: 0.0.0.0]
    #[arg(long)]
    host: Option<String>,

    /// Worker count (one synthesis runs at a time regardless)
    #[arg(long)]
    workers: Option<usize>,

    /// Model directory
    #[arg(long, alias = "model_dir", default_value = "pretrained_models/CosyVoice2-0.5B")]
    model_dir: PathBuf,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level
    #[arg(short, long)]
    log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long)]
    json_logs: bool,
}

impl Args {
    /// Load the config file, if any, and apply command-line overrides.
    fn service_config(&self) -> Result<ServiceConfig> {
        let mut config = match &self.config {
            Some(path) => ServiceConfig::from_toml_file(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => ServiceConfig::default(),
        };

        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(workers) = self.workers {
            config.server.workers = workers;
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
        if self.json_logs {
            config.logging.format = "json".to_string();
        }

        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = args.service_config()?;

    init_logging_from_config(&config.logging);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        host = %config.server.host,
        port = config.server.port,
        workers = config.server.workers,
        model_dir = %args.model_dir.display(),
        "Starting TTS gateway"
    );

    let engine = SyntheticEngine::from_dir(&args.model_dir)
        .context("Failed to initialize inference engine")?;

    let prometheus = if config.metrics.enabled {
        Some(TtsMetrics::install().context("Failed to install metrics recorder")?)
    } else {
        None
    };

    let server = TtsServer::new(config, Arc::new(engine), prometheus)
        .context("Failed to create server")?;

    server.run().await.context("Server failed")?;

    info!("Server shutdown complete");
    Ok(())
}
