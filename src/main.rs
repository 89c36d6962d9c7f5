// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::sync::Arc;

use scrapeworker::config::settings::Settings;
use scrapeworker::engines::browser::BrowserPool;
use scrapeworker::engines::router::EngineRouter;
use scrapeworker::jobs::JobManager;
use scrapeworker::presentation::routes::{build_router, AppState};
use scrapeworker::utils::telemetry;
use tokio::net::TcpListener;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Arc::new(Settings::new()?);
    telemetry::init_telemetry(&settings.log_level);
    info!("starting scrapeworker");

    let pool = Arc::new(BrowserPool::new(settings.max_concurrent_pages, settings.headless));
    let router = Arc::new(EngineRouter::new(pool.clone()));
    let jobs = Arc::new(JobManager::new(router, settings.clone()));
    let sweeper = jobs.spawn_ttl_sweeper();

    let app = build_router(AppState { jobs: jobs.clone(), settings: settings.clone() });

    let listener = TcpListener::bind((settings.host.as_str(), settings.port)).await?;
    info!(host = %settings.host, port = settings.port, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.abort();
    pool.close().await;
    info!("scrapeworker stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    tracing::info!("shutdown signal received");
}
