// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::sync::Arc;

use axum::{
    http::StatusCode,
    routing::{delete, get, post},
    Router,
};

use crate::config::settings::Settings;
use crate::jobs::JobManager;
use crate::presentation::handlers::{health_handler, scrape_handler};
use crate::presentation::middleware::auth_middleware::auth_middleware;

/// Shared state every handler needs: the job store and the settings
/// that shaped it. Cloning is cheap — everything inside is an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub jobs: Arc<JobManager>,
    pub settings: Arc<Settings>,
}

pub fn build_router(state: AppState) -> Router {
    let health_routes = Router::new()
        .route("/healthz", get(health_handler::health))
        .route("/health", get(health_handler::health))
        .with_state(state.clone());

    let scrape_routes = Router::new()
        .route("/v1/scrape", post(scrape_handler::create_scrape))
        .route("/scrape", post(redirect_to_v1_scrape))
        .route(
            "/v1/scrape/{job_id}",
            get(scrape_handler::get_scrape_status).delete(scrape_handler::delete_scrape),
        )
        .route(
            "/scrape/{job_id}",
            get(scrape_handler::get_scrape_status).delete(scrape_handler::delete_scrape),
        )
        .layer(axum::middleware::from_fn_with_state(state.settings.clone(), auth_middleware))
        .with_state(state);

    Router::new()
        .merge(health_routes)
        .merge(scrape_routes)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

async fn redirect_to_v1_scrape() -> (StatusCode, [(axum::http::HeaderName, &'static str); 1]) {
    (StatusCode::TEMPORARY_REDIRECT, [(axum::http::header::LOCATION, "/v1/scrape")])
}
