// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use scrapeworker::config::settings::Settings;
use scrapeworker::engines::browser::BrowserPool;
use scrapeworker::engines::router::EngineRouter;
use scrapeworker::jobs::JobManager;
use scrapeworker::presentation::routes::{build_router, AppState};
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_settings() -> Arc<Settings> {
    Arc::new(Settings {
        host: "0.0.0.0".into(),
        port: 3000,
        log_level: "info".into(),
        auth_token: None,
        max_concurrent_pages: 10,
        timeout_ms: 300_000,
        page_load_timeout_ms: 60_000,
        proxy_server: None,
        proxy_username: None,
        proxy_password: None,
        block_media: true,
        headless: true,
        stealth_enabled: true,
        job_ttl_ms: 600_000,
        job_cleanup_interval_ms: 60_000,
    })
}

fn test_app() -> axum::Router {
    let settings = test_settings();
    let pool = Arc::new(BrowserPool::new(settings.max_concurrent_pages, settings.headless));
    let router = Arc::new(EngineRouter::new(pool));
    let jobs = Arc::new(JobManager::new(router, settings.clone()));
    build_router(AppState { jobs, settings })
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn missing_url_field_returns_400_with_path_detail() {
    let app = test_app();
    let response = app
        .oneshot(
            Request::post("/v1/scrape")
                .header("content-type", "application/json")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["details"][0]["path"], "url");
}

#[tokio::test]
async fn unknown_job_id_returns_404_with_job_not_found_code() {
    let app = test_app();
    let response = app
        .oneshot(
            Request::get(format!("/v1/scrape/{}", uuid::Uuid::new_v4()))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["code"], "JOB_NOT_FOUND");
}

#[tokio::test]
async fn deleting_an_unknown_job_is_idempotent() {
    let app = test_app();
    let response = app
        .oneshot(
            Request::delete(format!("/v1/scrape/{}", uuid::Uuid::new_v4()))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], true);
}

#[tokio::test]
async fn health_endpoint_reports_job_counts() {
    let app = test_app();
    let response = app.oneshot(Request::get("/healthz").body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["jobs"]["total"], 0);
}

#[tokio::test]
async fn scrape_redirect_points_at_v1() {
    let app = test_app();
    let response = app.oneshot(Request::post("/scrape").body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(response.headers().get("location").unwrap(), "/v1/scrape");
}

#[tokio::test]
async fn instant_return_job_can_be_polled_to_completion() {
    std::env::set_var("SCRAPEWORKER_DISABLE_SSRF_PROTECTION", "true");
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ok"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
        .mount(&mock_server)
        .await;

    let app = test_app();
    let response = app
        .clone()
        .oneshot(
            Request::post("/v1/scrape")
                .header("content-type", "application/json")
                .body(Body::from(
                    serde_json::json!({
                        "url": format!("{}/ok", mock_server.uri()),
                        "engine": "tlsclient",
                        "instantReturn": true,
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let body = body_json(response).await;
    assert_eq!(body["processing"], true);
    let job_id = body["jobId"].as_str().unwrap().to_string();

    for _ in 0..50 {
        let status_response = app
            .clone()
            .oneshot(Request::get(format!("/v1/scrape/{job_id}")).body(Body::empty()).unwrap())
            .await
            .unwrap();
        if status_response.status() == StatusCode::OK {
            let body = body_json(status_response).await;
            assert!(body["content"].as_str().unwrap().contains("ok"));
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("job did not complete within the polling window");
}
