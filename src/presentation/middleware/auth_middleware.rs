// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::Response,
};

use crate::config::settings::Settings;

/// Rejects requests lacking the configured bearer token. A no-op when
/// `AUTH_TOKEN` is unset. Accepts either `Authorization: Bearer <t>` or
/// the bare token value, matching clients that skip the `Bearer` prefix.
/// Health routes are mounted outside this layer, so it never sees them.
pub async fn auth_middleware(
    State(settings): State<Arc<Settings>>,
    req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let Some(expected) = &settings.auth_token else {
        return Ok(next.run(req).await);
    };

    let provided = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .map(|raw| raw.strip_prefix("Bearer ").unwrap_or(raw));

    match provided {
        Some(token) if token == expected => Ok(next.run(req).await),
        _ => Err(StatusCode::UNAUTHORIZED),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::routing::get;
    use axum::Router;
    use tower::ServiceExt;

    fn settings_with_token(token: Option<&str>) -> Arc<Settings> {
        Arc::new(Settings {
            host: "0.0.0.0".into(),
            port: 3000,
            log_level: "info".into(),
            auth_token: token.map(|t| t.to_string()),
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

    fn protected_app(settings: Arc<Settings>) -> Router {
        Router::new()
            .route("/protected", get(|| async { "ok" }))
            .layer(axum::middleware::from_fn_with_state(settings.clone(), auth_middleware))
            .with_state(settings)
    }

    #[tokio::test]
    async fn no_token_configured_allows_everything() {
        let app = protected_app(settings_with_token(None));
        let response = app
            .oneshot(axum::http::Request::builder().uri("/protected").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn missing_header_is_rejected_when_token_configured() {
        let app = protected_app(settings_with_token(Some("secret")));
        let response = app
            .oneshot(axum::http::Request::builder().uri("/protected").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn bearer_prefixed_token_is_accepted() {
        let app = protected_app(settings_with_token(Some("secret")));
        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .uri("/protected")
                    .header(header::AUTHORIZATION, "Bearer secret")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn bare_token_is_accepted() {
        let app = protected_app(settings_with_token(Some("secret")));
        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .uri("/protected")
                    .header(header::AUTHORIZATION, "secret")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
