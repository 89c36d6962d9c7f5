// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use chromiumoxide::cdp::browser_protocol::network::{
    EventResponseReceived, Headers, SetCookieParams, SetExtraHttpHeadersParams,
};
use chromiumoxide::cdp::browser_protocol::security::SetIgnoreCertificateErrorsParams;
use chromiumoxide::cdp::browser_protocol::target::{
    CreateBrowserContextParams, CreateTargetParams, DisposeBrowserContextParams,
};
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::sync::Mutex;

use crate::config::settings::Settings;
use crate::detection::{self, BlockDetectionResult};
use crate::domain::request::ScrapeRequest;
use crate::domain::response::SuccessResponse;
use crate::engines::browser::actions::run_actions;
use crate::engines::browser::interception;
use crate::engines::browser::pool::BrowserPool;
use crate::engines::browser::stealth::{
    DESKTOP_VIEWPORT, MOBILE_DEVICE_SCALE_FACTOR, MOBILE_USER_AGENT, MOBILE_VIEWPORT,
    STEALTH_INIT_SCRIPT,
};
use crate::engines::traits::EngineError;
use crate::proxy::{self, ProxyEnv};
use crate::utils::ssrf;

/// Full scrape via automated browser: context construction, stealth,
/// request interception, navigation, waits, actions, screenshot, block
/// check. Every exit path — success, soft failure, or action error —
/// closes the page and context and releases the page slot exactly once.
pub struct BrowserScrapePipeline {
    pool: std::sync::Arc<BrowserPool>,
}

impl BrowserScrapePipeline {
    pub fn new(pool: std::sync::Arc<BrowserPool>) -> Self {
        Self { pool }
    }

    pub async fn scrape(
        &self,
        request: &ScrapeRequest,
        settings: &Settings,
    ) -> Result<SuccessResponse, EngineError> {
        let start = Instant::now();

        if let Err(e) = ssrf::validate_url(&request.url).await {
            return Ok(SuccessResponse::transport_failure(start.elapsed().as_millis() as u64, e));
        }

        let _slot = self.pool.acquire_slot().await;

        let handle = match self.pool.get_browser().await {
            Ok(handle) => handle,
            Err(e) => {
                return Ok(SuccessResponse::transport_failure(
                    start.elapsed().as_millis() as u64,
                    e.to_string(),
                ))
            }
        };

        let proxy_env = ProxyEnv {
            server: settings.proxy_server.clone(),
            username: settings.proxy_username.clone(),
            password: settings.proxy_password.clone(),
        };
        let resolved_proxy = proxy::resolve(
            request.proxy_profile.as_ref(),
            request.proxy.as_deref(),
            &proxy_env,
        );

        let mut context_params = CreateBrowserContextParams::default();
        if let Some(proxy) = &resolved_proxy {
            context_params.proxy_server = Some(proxy.server.clone());
        }

        let context_id = match handle.browser.create_browser_context(context_params).await {
            Ok(id) => id,
            Err(e) => {
                self.pool.disconnect(handle.generation).await;
                return Ok(SuccessResponse::transport_failure(
                    start.elapsed().as_millis() as u64,
                    format!("failed to create browser context: {e}"),
                ));
            }
        };

        let result = self
            .run_in_context(request, settings, &handle.browser, &context_id, start)
            .await;

        if let Err(e) = handle
            .browser
            .execute(DisposeBrowserContextParams::new(context_id))
            .await
        {
            tracing::warn!(error = %e, "failed to dispose browser context");
        }

        match result {
            Ok(response) => Ok(response),
            Err(PipelineFailure::Transport(message)) => Ok(SuccessResponse::transport_failure(
                start.elapsed().as_millis() as u64,
                message,
            )),
            Err(PipelineFailure::Action(err)) => Err(EngineError::Action {
                index: err.index,
                action_type: err.action_type,
                message: err.message,
            }),
        }
    }

    async fn run_in_context(
        &self,
        request: &ScrapeRequest,
        settings: &Settings,
        browser: &chromiumoxide::Browser,
        context_id: &chromiumoxide::cdp::browser_protocol::browser::BrowserContextId,
        start: Instant,
    ) -> Result<SuccessResponse, PipelineFailure> {
        let target = CreateTargetParams::builder()
            .url("about:blank")
            .browser_context_id(context_id.clone())
            .build()
            .map_err(PipelineFailure::Transport)?;

        let page = browser
            .new_page(target)
            .await
            .map_err(|e| PipelineFailure::Transport(format!("failed to open page: {e}")))?;

        let (width, height) = if request.mobile { MOBILE_VIEWPORT } else { DESKTOP_VIEWPORT };
        let user_agent = if request.mobile {
            Some(MOBILE_USER_AGENT.to_string())
        } else {
            request.user_agent.clone()
        };

        if let Some(ua) = &user_agent {
            let _ = page.set_user_agent(ua.as_str()).await;
        }

        if request.skip_tls_verification {
            let _ = page
                .execute(SetIgnoreCertificateErrorsParams::new(true))
                .await;
        }

        let mut merged_headers = request.headers.clone();
        merged_headers
            .entry("Accept-Language".to_string())
            .or_insert_with(|| request.locale());
        {
            let headers = Headers::new(serde_json::to_value(&merged_headers).unwrap_or_default());
            let _ = page
                .execute(SetExtraHttpHeadersParams::new(headers))
                .await;
        }

        if let Ok(url) = url::Url::parse(&request.url) {
            for cookie in &request.cookies {
                let domain = cookie
                    .domain
                    .clone()
                    .or_else(|| url.host_str().map(|h| h.to_string()));
                let params = SetCookieParams::builder()
                    .name(cookie.name.clone())
                    .value(cookie.value.clone())
                    .domain(domain.unwrap_or_default())
                    .path(cookie.path.clone())
                    .build();
                if let Ok(params) = params {
                    let _ = page.execute(params).await;
                }
            }
        }

        if request.effective_stealth(settings) {
            let _ = page.evaluate_on_new_document(STEALTH_INIT_SCRIPT).await;
        }

        let intercept_handle = interception::install_route_handler(
            &page,
            request.effective_block_media(settings),
            request.block_ads,
        )
        .await
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "failed to install interception route");
            None
        });

        {
            use chromiumoxide::cdp::browser_protocol::emulation::{
                SetDeviceMetricsOverrideParams, SetTouchEmulationEnabledParams,
            };
            let scale_factor = if request.mobile { MOBILE_DEVICE_SCALE_FACTOR } else { 1.0 };
            if let Ok(params) = SetDeviceMetricsOverrideParams::builder()
                .width(width as i64)
                .height(height as i64)
                .device_scale_factor(scale_factor)
                .mobile(request.mobile)
                .build()
            {
                let _ = page.execute(params).await;
            }

            if let Ok(params) = SetTouchEmulationEnabledParams::builder().enabled(request.mobile).build() {
                let _ = page.execute(params).await;
            }
        }

        let response_info = capture_next_response(&page).await;

        let nav_timeout = Duration::from_millis(
            request.timeout.min(settings.page_load_timeout_ms),
        );

        let goto_result = tokio::time::timeout(nav_timeout, page.goto(&request.url)).await;
        let outcome = match goto_result {
            Err(_) => {
                cleanup(&page, intercept_handle).await;
                return Err(PipelineFailure::Transport(format!(
                    "navigation timed out after {}ms",
                    nav_timeout.as_millis()
                )));
            }
            Ok(Err(e)) => {
                cleanup(&page, intercept_handle).await;
                return Err(PipelineFailure::Transport(format!("navigation failed: {e}")));
            }
            Ok(Ok(_)) => self
                .finish_navigation(&page, request, response_info, start)
                .await,
        };

        cleanup(&page, intercept_handle).await;
        outcome
    }

    async fn finish_navigation(
        &self,
        page: &Page,
        request: &ScrapeRequest,
        response_info: std::sync::Arc<Mutex<Option<(u16, HashMap<String, String>)>>>,
        start: Instant,
    ) -> Result<SuccessResponse, PipelineFailure> {
        if let Some(selector) = &request.wait_for_selector {
            let timeout = Duration::from_millis(request.timeout.min(30_000));
            let _ = tokio::time::timeout(timeout, async {
                loop {
                    if page.find_element(selector).await.is_ok() {
                        return;
                    }
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
            })
            .await;
        }

        let idle_wait = request.wait.min(30_000);
        if idle_wait > 0 {
            tokio::time::sleep(Duration::from_millis(idle_wait)).await;
        }

        let mut content = page.content().await.unwrap_or_default();
        let final_url = page.url().await.ok().flatten().unwrap_or_else(|| request.url.clone());
        let (status, headers) = response_info.lock().await.clone().unwrap_or((200, HashMap::new()));

        let mut screenshots = Vec::new();
        let mut action_results = None;

        if !request.actions.is_empty() {
            let outcome = run_actions(page, &request.actions)
                .await
                .map_err(PipelineFailure::Action)?;
            content = page.content().await.unwrap_or(content);
            screenshots.extend(outcome.screenshots);
            action_results = Some(outcome.results);
        }

        let mut screenshot = None;
        if request.wants_screenshot() {
            use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
            use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
            use chromiumoxide::page::ScreenshotParams;

            let params = ScreenshotParams::builder()
                .format(CaptureScreenshotFormat::Png)
                .full_page(request.full_page_screenshot)
                .build();
            if let Ok(bytes) = page.screenshot(params).await {
                screenshot = Some(BASE64.encode(bytes));
            }
        }

        let detection = detection::detect(status, &content, &headers);
        let blocked_reason = if detection.confidence >= 0.5 {
            detection.reason
        } else {
            None
        };

        Ok(SuccessResponse {
            job_id: None,
            time_taken: start.elapsed().as_millis() as u64,
            content,
            url: Some(final_url),
            page_status_code: status,
            page_error: None,
            response_headers: Some(headers),
            screenshot,
            screenshots: if screenshots.is_empty() { None } else { Some(screenshots) },
            action_content: None,
            action_results,
            blocked_reason,
            used_mobile_proxy: if request.mobile_proxy { Some(true) } else { None },
        })
    }
}

enum PipelineFailure {
    Transport(String),
    Action(crate::engines::browser::actions::ActionError),
}

async fn cleanup(page: &Page, intercept_handle: Option<tokio::task::JoinHandle<()>>) {
    if let Some(handle) = intercept_handle {
        handle.abort();
    }
    if let Err(e) = page.clone().close().await {
        tracing::warn!(error = %e, "failed to close page");
    }
}

async fn capture_next_response(
    page: &Page,
) -> std::sync::Arc<Mutex<Option<(u16, HashMap<String, String>)>>> {
    let captured = std::sync::Arc::new(Mutex::new(None));
    if let Ok(mut events) = page.event_listener::<EventResponseReceived>().await {
        let captured = captured.clone();
        tokio::spawn(async move {
            if let Some(event) = events.next().await {
                let status = event.response.status as u16;
                let headers = serde_json::to_value(&event.response.headers)
                    .ok()
                    .and_then(|v| v.as_object().cloned())
                    .map(|obj| {
                        obj.into_iter()
                            .map(|(k, v)| (k, v.as_str().unwrap_or_default().to_string()))
                            .collect()
                    })
                    .unwrap_or_default();
                *captured.lock().await = Some((status, headers));
            }
        });
    }
    captured
}
