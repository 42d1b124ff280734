mod api;
mod background;
mod cli;
mod router;
mod state;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use buildwatch_core::{BuildersConfig, Config};
use buildwatch_ingest::{BuildbotFeed, GithubCommitSource, IngestionCoordinator};
use buildwatch_storage::{CursorRegistry, RevisionStore};
use clap::Parser;
use tracing::info;

use crate::cli::Cli;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    buildwatch_core::config::load_dotenv();
    let cli = Cli::parse();
    let config = Config::from_env();
    config.log_summary();

    let builders_path = cli
        .builders
        .clone()
        .unwrap_or_else(|| config.buildbot.builders_config.clone());
    let builders = BuildersConfig::from_file(&builders_path)
        .with_context(|| format!("loading builder list from {}", builders_path.display()))?;
    info!(count = builders.builders.len(), path = %builders_path.display(), "builders loaded");

    let cursors = Arc::new(
        CursorRegistry::open(config.storage.cursor_dir()).context("opening cursor registry")?,
    );
    let store = Arc::new(
        RevisionStore::open(config.storage.revision_dir()).context("opening revision store")?,
    );

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.buildbot.http_timeout_secs))
        .build()
        .context("building HTTP client")?;
    let commits = Arc::new(GithubCommitSource::new(client.clone(), &config.github));
    let feed = Arc::new(
        BuildbotFeed::new(client, &config.buildbot.base_url).context("parsing BUILDBOT_BASE_URL")?,
    );

    let mut coordinator = IngestionCoordinator::new(store.clone(), cursors.clone());
    coordinator.start(
        commits,
        Duration::from_secs(config.github.poll_delay_secs),
        feed,
        &builders.builders,
    )?;
    let shutdown = coordinator.shutdown_token();
    let ingestion = tokio::spawn(coordinator.run(Duration::from_secs(cli.shutdown_timeout)));

    if config.storage.revision_retention_days > 0 {
        tokio::spawn(background::retention::run_retention_sweeper(
            store.clone(),
            config.storage.revision_retention_days,
            Duration::from_secs(config.storage.retention_sweep_secs.max(1)),
            shutdown.child_token(),
        ));
    }

    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("shutdown signal received");
        signal_token.cancel();
    });

    if cli.ingest_only {
        info!("running without HTTP server");
        shutdown.cancelled().await;
    } else {
        let state = Arc::new(AppState::new(store, cursors));
        let app = router::build_router(state, &config.server.cors_origin);
        let addr = config.server.bind_addr();
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .with_context(|| format!("binding {addr}"))?;
        info!("listening on http://{}", addr);

        let serve_token = shutdown.clone();
        let served = axum::serve(listener, app)
            .with_graceful_shutdown(async move { serve_token.cancelled().await })
            .await;
        shutdown.cancel();
        served?;
    }

    ingestion.await?;
    info!("buildwatch exited cleanly");
    Ok(())
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to register SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => {},
            _ = sigterm.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await.expect("failed to listen for ctrl_c");
    }
}
