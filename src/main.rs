// Main entrypoint for the revcache application.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use revcache::app::App;
use revcache::config::{Config, ConfigTrait};
use revcache::metrics;
use revcache::shutdown::GracefulShutdown;

const CONFIG_PATH: &str = "cfg/revcache.cfg.yaml";
const CONFIG_PATH_LOCAL: &str = "cfg/revcache.cfg.local.yaml";

const GRACEFUL_TIMEOUT: Duration = Duration::from_secs(30);

/// revcache - revoke-driven cache invalidation node
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Custom config file path
    #[arg(short, long, value_name = "FILE")]
    cfg: Option<PathBuf>,
}

/// Loads the configuration struct from YAML file.
/// Tries local config first, then falls back to default config.
fn load_cfg(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    if let Some(custom_path) = path {
        let cfg = Config::load(&custom_path)
            .with_context(|| format!("failed to load custom config from {:?}", custom_path))?;
        return Ok((cfg, custom_path));
    }

    match Config::load(CONFIG_PATH_LOCAL) {
        Ok(cfg) => Ok((cfg, PathBuf::from(CONFIG_PATH_LOCAL))),
        Err(_) => {
            let cfg = Config::load(CONFIG_PATH)
                .with_context(|| format!("failed to load config from {}", CONFIG_PATH))?;
            Ok((cfg, PathBuf::from(CONFIG_PATH)))
        }
    }
}

/// Configures structured logging based on configuration.
fn configure_logger(cfg: &Config) {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let log_level = cfg
        .logs()
        .and_then(|logs| logs.level.as_deref())
        .unwrap_or("info");

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    if cfg.is_prod() {
        // Production: JSON format
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        // Development: Pretty console format
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().pretty())
            .init();
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let (cfg, cfg_path) = load_cfg(args.cfg)?;
    configure_logger(&cfg);
    info!(
        component = "config",
        event = "load_success",
        path = ?cfg_path,
        "config loaded"
    );

    // The recorder is installed before the runtime starts.
    if cfg.is_metrics_enabled() {
        if let Err(e) = metrics::init_prometheus_exporter() {
            error!(
                component = "main",
                event = "metrics_init_failed",
                error = %e,
                "metrics endpoint will not be available"
            );
        }
    }

    tokio::runtime::Runtime::new()
        .context("Failed to create tokio runtime")?
        .block_on(async_main(cfg, cfg_path))
}

async fn async_main(cfg: Config, cfg_path: PathBuf) -> Result<()> {
    let shutdown_token = CancellationToken::new();
    let graceful_shutdown =
        GracefulShutdown::new(shutdown_token.clone()).with_timeout(GRACEFUL_TIMEOUT);

    let app = App::new(shutdown_token.clone(), cfg, Some(cfg_path));
    app.serve(&graceful_shutdown);

    // Listen for OS signals or cancellation and wait for graceful shutdown
    if let Err(e) = graceful_shutdown.await_shutdown().await {
        error!(
            component = "main",
            scope = "service",
            event = "graceful_shutdown_failed",
            error = %e,
            "failed to gracefully shut down service"
        );
        return Err(e);
    }

    Ok(())
}
