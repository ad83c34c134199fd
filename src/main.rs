//! Swap Progress service
//!
//! Hosts a progress tracker behind a single-writer engine, fed from stdin
//! and/or the HTTP API, with optional Prometheus metrics.

use anyhow::Result;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};

use swap_progress::config::{LoggingConfig, Settings};
use swap_progress::metrics::MetricsServer;
use swap_progress::{api, ingest, ProgressEngine, ProgressTracker};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let settings = Settings::load()?;

    // Initialize logging
    init_logging(&settings.logging);

    info!("Starting Swap Progress v{}", env!("CARGO_PKG_VERSION"));

    // Build tracker from the configured template
    let template = settings.tracker.template();
    info!(
        "Tracking {} expected steps ({:?}, {:?} identity)",
        template.len(),
        settings.tracker.signature_policy,
        settings.tracker.identity
    );
    let tracker = ProgressTracker::new(
        Some(Arc::from(template)),
        settings.tracker.identity.build(),
        settings.tracker.signature_policy,
    )
    .with_separator(settings.tracker.signature_separator);

    let (engine, handle) = ProgressEngine::new(tracker, settings.tracker.channel_capacity);

    // Start progress engine
    let engine_handle = tokio::spawn(async move {
        if let Err(e) = engine.run().await {
            error!("Progress engine error: {}", e);
        }
    });

    // Start API server
    let api_handle = if settings.api.enabled {
        let config = settings.api.clone();
        let progress = handle.clone();
        Some(tokio::spawn(async move {
            if let Err(e) = api::run_server(config, progress).await {
                error!("API server error: {}", e);
            }
        }))
    } else {
        None
    };

    // Start metrics server
    let metrics_handle = if settings.metrics.enabled {
        let server = MetricsServer::new(settings.metrics.port);
        Some(tokio::spawn(async move {
            if let Err(e) = server.run().await {
                error!("Metrics server error: {}", e);
            }
        }))
    } else {
        None
    };

    // Start stdin event feed
    let ingest_handle = if settings.ingest.stdin {
        let progress = handle.clone();
        Some(tokio::spawn(async move {
            if let Err(e) = ingest::run_stdin(progress).await {
                error!("Event feed error: {}", e);
            }
        }))
    } else {
        None
    };

    info!("Swap Progress is running");
    if settings.api.enabled {
        info!("API server: http://{}:{}", settings.api.host, settings.api.port);
    }
    if settings.metrics.enabled {
        info!("Metrics: http://0.0.0.0:{}/metrics", settings.metrics.port);
    }

    // Wait for shutdown signal
    shutdown_signal().await?;

    info!("Shutdown signal received, stopping...");

    let final_snapshot = handle.snapshot();
    info!(
        "Final progress: {}/{} steps complete (all completed: {})",
        final_snapshot.completed_count, final_snapshot.total, final_snapshot.all_completed
    );

    // Abort background tasks
    for task in [api_handle, metrics_handle, ingest_handle].into_iter().flatten() {
        task.abort();
    }
    drop(handle);
    engine_handle.abort();

    info!("Swap Progress stopped");
    Ok(())
}

fn init_logging(config: &LoggingConfig) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,swap_progress=debug,tower_http=info"));

    let registry = tracing_subscriber::registry().with(filter);
    if config.json {
        registry.with(fmt::layer().json().with_target(true)).init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_thread_ids(true))
            .init();
    }
}

async fn shutdown_signal() -> Result<()> {
    let ctrl_c = signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut terminate = signal::unix::signal(signal::unix::SignalKind::terminate())?;
        tokio::select! {
            res = ctrl_c => res?,
            _ = terminate.recv() => {},
        }
    }

    #[cfg(not(unix))]
    ctrl_c.await?;

    Ok(())
}
