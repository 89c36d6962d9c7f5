// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use axum::extract::State;
use axum::Json;
use serde_json::json;

use crate::presentation::routes::AppState;

pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let counts = state.jobs.status_counts();
    Json(json!({
        "status": "ok",
        "timestamp": chrono::Utc::now(),
        "jobs": counts,
    }))
}
