// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use uuid::Uuid;
use validator::Validate;

use crate::domain::job::JobStatusResponse;
use crate::domain::request::ScrapeRequest;
use crate::domain::response::{ErrorResponse, FieldErrorDetail};
use crate::presentation::routes::AppState;

/// A schema failure that never reaches the job store: either the body
/// didn't parse into a `ScrapeRequest` at all, or it parsed but failed
/// field-level validation (e.g. `url` isn't a URL).
fn schema_error(details: Vec<FieldErrorDetail>) -> impl IntoResponse {
    (StatusCode::BAD_REQUEST, Json(ErrorResponse::validation(details)))
}

/// Best-effort extraction of the offending field name out of a serde
/// error message, so a missing `url` still reports `path: "url"`
/// instead of a useless generic path.
fn path_from_serde_error(message: &str) -> String {
    if let Some(rest) = message.split("missing field `").nth(1) {
        if let Some(end) = rest.find('`') {
            return rest[..end].to_string();
        }
    }
    if let Some(rest) = message.split("unknown field `").nth(1) {
        if let Some(end) = rest.find('`') {
            return rest[..end].to_string();
        }
    }
    "body".to_string()
}

fn validation_errors_to_details(errors: validator::ValidationErrors) -> Vec<FieldErrorDetail> {
    errors
        .field_errors()
        .iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| FieldErrorDetail {
                path: field.to_string(),
                message: e.message.clone().map(|m| m.to_string()).unwrap_or_else(|| "invalid value".to_string()),
            })
        })
        .collect()
}

pub async fn create_scrape(State(state): State<AppState>, body: axum::body::Bytes) -> impl IntoResponse {
    let value: serde_json::Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => {
            return schema_error(vec![FieldErrorDetail { path: "body".to_string(), message: e.to_string() }])
                .into_response()
        }
    };

    let request: ScrapeRequest = match serde_json::from_value(value) {
        Ok(r) => r,
        Err(e) => {
            let path = path_from_serde_error(&e.to_string());
            return schema_error(vec![FieldErrorDetail { path, message: e.to_string() }]).into_response();
        }
    };

    if let Err(errors) = request.validate() {
        return schema_error(validation_errors_to_details(errors)).into_response();
    }

    let instant_return = request.instant_return;
    let job_id = state.jobs.create_job(request);

    if instant_return {
        state.jobs.start_job_async(job_id);
        return (StatusCode::ACCEPTED, Json(serde_json::json!({ "jobId": job_id, "processing": true })))
            .into_response();
    }

    match state.jobs.execute_job(job_id).await {
        Some(JobStatusResponse::Completed(response)) => (StatusCode::OK, Json(response)).into_response(),
        Some(JobStatusResponse::Failed { error }) => {
            (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorResponse::message(error))).into_response()
        }
        Some(JobStatusResponse::Processing { job_id, processing }) => {
            (StatusCode::ACCEPTED, Json(serde_json::json!({ "jobId": job_id, "processing": processing })))
                .into_response()
        }
        None => (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorResponse::message("job vanished during execution")))
            .into_response(),
    }
}

pub async fn get_scrape_status(State(state): State<AppState>, Path(job_id): Path<Uuid>) -> impl IntoResponse {
    match state.jobs.job_status(job_id) {
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::with_code("Job not found", "JOB_NOT_FOUND")),
        )
            .into_response(),
        Some(JobStatusResponse::Processing { job_id, processing }) => {
            (StatusCode::ACCEPTED, Json(serde_json::json!({ "jobId": job_id, "processing": processing })))
                .into_response()
        }
        Some(JobStatusResponse::Completed(response)) => (StatusCode::OK, Json(response)).into_response(),
        Some(JobStatusResponse::Failed { error }) => {
            (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorResponse::message(error))).into_response()
        }
    }
}

pub async fn delete_scrape(State(state): State<AppState>, Path(job_id): Path<Uuid>) -> impl IntoResponse {
    state.jobs.delete_job(job_id);
    (StatusCode::OK, Json(serde_json::json!({ "success": true })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_field_error_extracts_the_field_name() {
        assert_eq!(path_from_serde_error("missing field `url` at line 1 column 2"), "url");
    }

    #[test]
    fn unrecognized_field_error_extracts_the_field_name() {
        assert_eq!(path_from_serde_error("unknown field `bogus`, expected one of ..."), "bogus");
    }

    #[test]
    fn unmatched_message_falls_back_to_body() {
        assert_eq!(path_from_serde_error("invalid type: found string, expected struct"), "body");
    }
}
