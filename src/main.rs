// Main entrypoint for the shardcache server.

mod aof;
mod config;
mod error;
mod hashring;
mod http;
mod key;
mod manager;
mod shutdown;
mod storage;
mod time;

use crate::config::{Config, ConfigTrait};
use crate::manager::{CacheManager, ManagerConfig};
use crate::shutdown::GracefulShutdown;

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

const CONFIG_PATH: &str = "cfg/shardcache.cfg.yaml";
const CONFIG_PATH_LOCAL: &str = "cfg/shardcache.cfg.local.yaml";

/// shardcache - an in-memory, sharded key/value cache with AOF durability
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Custom config file path
    #[arg(short, long, value_name = "FILE")]
    cfg: Option<PathBuf>,
}

/// Logs the configured thread parallelism. Tokio's multi-threaded runtime
/// uses all available cores by default; `num_cpus: 0` keeps that default.
fn log_num_cpus(cfg: &Config) {
    let cores = cfg.runtime().num_cpus;
    if cores == 0 {
        info!(
            component = "main",
            event = "num_cpus_configured",
            num_cpus = num_cpus::get(),
            "using all available cores"
        );
    } else {
        warn!(
            component = "main",
            event = "num_cpus_configured",
            num_cpus = cores,
            "core count pinned by configuration"
        );
    }
}

/// Loads configuration, preferring a local override over the bundled default.
fn load_cfg(path: Option<PathBuf>) -> Result<Config> {
    if let Some(custom_path) = path {
        let cfg = Config::load(&custom_path)
            .with_context(|| format!("failed to load custom config from {:?}", custom_path))?;
        info!(component = "config", event = "load_success", path = ?custom_path, "config loaded");
        return Ok(cfg);
    }

    match Config::load(CONFIG_PATH_LOCAL) {
        Ok(cfg) => {
            info!(component = "config", event = "load_success", path = CONFIG_PATH_LOCAL, "config loaded");
            Ok(cfg)
        }
        Err(_) => {
            let cfg = Config::load(CONFIG_PATH)
                .with_context(|| format!("failed to load config from {}", CONFIG_PATH))?;
            info!(component = "config", event = "load_success", path = CONFIG_PATH, "config loaded");
            Ok(cfg)
        }
    }
}

fn configure_logger(cfg: &Config) {
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::{fmt, EnvFilter};

    let log_level = cfg
        .logs()
        .and_then(|logs| logs.level.as_ref())
        .map(|s| s.as_str())
        .unwrap_or("info");

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    if cfg.is_prod() {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().pretty())
            .init();
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    tokio::runtime::Runtime::new()
        .context("failed to create tokio runtime")?
        .block_on(async_main(args))
}

async fn async_main(args: Args) -> Result<()> {
    let shutdown_token = CancellationToken::new();

    // Cached wall clock, avoids a syscall on every Get/Set.
    let _time_token = time::start(Duration::from_millis(1));

    let cfg = load_cfg(args.cfg)?;
    configure_logger(&cfg);
    log_num_cpus(&cfg);

    let graceful_shutdown = GracefulShutdown::new(shutdown_token.clone());
    graceful_shutdown
        .set_graceful_timeout(Duration::from_secs(30))
        .await;

    let engine = cfg.engine().clone();
    let aof_path = cfg
        .data()
        .and_then(|d| d.aof_path.as_ref())
        .map(PathBuf::from);

    let manager: Arc<CacheManager<String, Value>> = CacheManager::new(ManagerConfig {
        shard_count: engine.shard_count,
        replicas: engine.replicas,
        shard_capacity: engine.shard_capacity,
        aof_path,
    })
    .context("failed to construct cache manager")?;

    manager
        .load_aof()
        .await
        .context("failed to replay AOF on startup")?;

    manager.start_janitor(engine.janitor_interval);
    manager.start_aof_syncer(engine.aof_sync_interval);

    let addr = format!("0.0.0.0:{}", cfg.api().port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind HTTP listener on {addr}"))?;
    info!(component = "http", event = "listening", addr = %addr, "HTTP server listening");

    let app = http::router(manager.clone());
    let serve_shutdown = shutdown_token.clone();
    graceful_shutdown.add(1);
    let graceful_done = graceful_shutdown.clone();
    tokio::spawn(async move {
        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async move { serve_shutdown.cancelled().await })
            .await;
        if let Err(e) = result {
            error!(component = "http", event = "serve_failed", error = %e, "HTTP server exited with error");
        }
        graceful_done.done();
    });

    if let Err(e) = graceful_shutdown.await_shutdown().await {
        error!(component = "main", event = "graceful_shutdown_failed", error = %e, "failed to gracefully shut down service");
        manager.stop().await;
        return Err(e);
    }

    manager.stop().await;
    Ok(())
}
