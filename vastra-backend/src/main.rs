//! Vastra Backend Server
//!
//! Entry point for the try-on job service: configuration loading, service
//! wiring and HTTP server startup.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;
use vastra_backend::state::AppState;
use vastra_job_queue::JobManager;

mod cli;
mod config_helpers;
mod config_reloader;
mod retention_sweeper;
mod tracing_setup;

use cli::CliArgs;
use config_helpers::{
    blob_store_from_config, engine_from_config, manager_options_from_config, parse_bind_address,
};
use tracing_setup::install_tracing_from_config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    eprintln!("[STARTUP] Vastra Backend starting...");
    let args = CliArgs::parse();

    eprintln!("[STARTUP] Loading config from: {:?}", args.config_path);
    let config = load_config(args.config_path.as_deref())?;
    eprintln!("[STARTUP] Config loaded successfully");

    eprintln!("[STARTUP] Initializing tracing...");
    let reload_handle = install_tracing_from_config(&config.logging);
    eprintln!("[STARTUP] Tracing initialized");

    // Initialize services
    eprintln!("[STARTUP] Initializing services...");
    let blobs = blob_store_from_config(&config)?;
    let engine = engine_from_config(&config)?;
    let jobs = JobManager::new(blobs, engine, manager_options_from_config(&config));
    let engine_ready = jobs.warm_up().await;
    tracing::info!(
        engine = %config.engine.kind,
        engine_ready,
        storage = %config.storage.backend,
        mode = %config.jobs.mode,
        workers = config.jobs.workers,
        max_jobs = config.jobs.max_jobs,
        "services initialized"
    );
    if !engine_ready {
        eprintln!("[STARTUP] WARNING: inference engine is not ready; /api/ready will report 503");
    }

    let sweeper = config.jobs.retention_secs.map(|secs| {
        let handle = retention_sweeper::spawn_retention_sweeper(
            jobs.clone(),
            Duration::from_secs(secs),
            Duration::from_secs(config.jobs.sweep_interval_secs),
        );
        eprintln!("[STARTUP] Retention sweeper spawned");
        handle
    });
    config_reloader::spawn_log_level_reloader(
        args.config_path.clone(),
        config.logging.level.clone(),
        reload_handle,
    );

    eprintln!("[STARTUP] Building application router...");
    let state = Arc::new(AppState::new(jobs.clone(), config.jobs.mode));
    let app = vastra_backend::build_router(state);
    eprintln!("[STARTUP] Router built successfully");

    eprintln!(
        "[STARTUP] Binding to {}:{}",
        config.server.host, config.server.port
    );
    let addr = parse_bind_address(&config.server.host, config.server.port);
    let listener = TcpListener::bind(addr).await?;
    eprintln!("[STARTUP] ✓ Server listening on {}", addr);
    eprintln!("[STARTUP] ✓ Ready to accept connections!");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped accepting connections, draining jobs");
    let drained = jobs
        .shutdown(Duration::from_secs(config.engine.timeout_secs))
        .await;
    if let Some(sweeper) = sweeper {
        sweeper.abort();
    }
    tracing::info!(drained, "graceful shutdown complete");

    Ok(())
}

/// Load and validate configuration from file (if any) and environment.
fn load_config(path: Option<&str>) -> anyhow::Result<vastra_config::Config> {
    let config = vastra_config::load_config(path).map_err(|e| {
        eprintln!("failed to load configuration: {e}");
        anyhow::anyhow!(e.to_string())
    })?;
    vastra_config::validate_config(&config).map_err(|e| {
        eprintln!("invalid configuration: {e}");
        anyhow::anyhow!(e.to_string())
    })?;
    Ok(config)
}

/// Wait for SIGINT (Ctrl-C) or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(%e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(%e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}
