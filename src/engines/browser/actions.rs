// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::time::Duration;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use thiserror::Error;

use crate::domain::request::Action;
use crate::domain::response::ActionResult;

const ELEMENT_WAIT_TIMEOUT: Duration = Duration::from_millis(10_000);
const ELEMENT_POLL_INTERVAL: Duration = Duration::from_millis(100);
const WAIT_ACTION_CAP_MS: u64 = 30_000;

/// An action step that failed. Propagates out of the pipeline — unlike
/// transport failures, this one aborts the remaining action sequence and
/// the job is marked `failed`.
#[derive(Debug, Error)]
#[error("action {index} ({action_type}) failed: {message}")]
pub struct ActionError {
    pub index: usize,
    pub action_type: String,
    pub message: String,
}

/// What running an action sequence produced: the per-step results plus
/// any screenshots taken along the way.
#[derive(Debug, Default)]
pub struct ActionOutcome {
    pub results: Vec<ActionResult>,
    pub screenshots: Vec<String>,
}

fn action_type_name(action: &Action) -> &'static str {
    match action {
        Action::Wait { .. } => "wait",
        Action::Click { .. } => "click",
        Action::Type { .. } => "type",
        Action::Scroll { .. } => "scroll",
        Action::Screenshot { .. } => "screenshot",
        Action::Scrape { .. } => "scrape",
        Action::ExecuteJavascript { .. } => "executeJavascript",
        Action::Pdf {} => "pdf",
    }
}

async fn wait_for_element(
    page: &Page,
    selector: &str,
    index: usize,
    action_type: &str,
) -> Result<chromiumoxide::element::Element, ActionError> {
    let deadline = tokio::time::Instant::now() + ELEMENT_WAIT_TIMEOUT;
    loop {
        if let Ok(element) = page.find_element(selector).await {
            return Ok(element);
        }
        if tokio::time::Instant::now() >= deadline {
            return Err(ActionError {
                index,
                action_type: action_type.to_string(),
                message: format!("selector not found within {}ms: {selector}", ELEMENT_WAIT_TIMEOUT.as_millis()),
            });
        }
        tokio::time::sleep(ELEMENT_POLL_INTERVAL).await;
    }
}

/// Execute a sequence of actions against a live page, in order. Execution
/// stops at the first failing action; everything up to that point has
/// already happened and cannot be undone.
pub async fn run_actions(page: &Page, actions: &[Action]) -> Result<ActionOutcome, ActionError> {
    let mut outcome = ActionOutcome::default();

    for (index, action) in actions.iter().enumerate() {
        let action_type = action_type_name(action);
        let result = run_one(page, index, action, &mut outcome.screenshots).await?;
        outcome.results.push(ActionResult {
            idx: index,
            action_type: action_type.to_string(),
            result,
        });
    }

    Ok(outcome)
}

async fn run_one(
    page: &Page,
    index: usize,
    action: &Action,
    screenshots: &mut Vec<String>,
) -> Result<serde_json::Value, ActionError> {
    let action_type = action_type_name(action);
    let fail = |message: String| ActionError {
        index,
        action_type: action_type.to_string(),
        message,
    };

    match action {
        Action::Wait { milliseconds } => {
            let clamped = (*milliseconds).min(WAIT_ACTION_CAP_MS);
            tokio::time::sleep(Duration::from_millis(clamped)).await;
            Ok(serde_json::json!({ "waited": clamped }))
        }

        Action::Click { selector } => {
            let element = wait_for_element(page, selector, index, action_type).await?;
            element.click().await.map_err(|e| fail(format!("click failed: {e}")))?;
            Ok(serde_json::json!({ "clicked": selector }))
        }

        Action::Type { selector, text } => {
            let element = wait_for_element(page, selector, index, action_type).await?;
            // "fill, not append" — clear the field before typing.
            element
                .call_js_fn("function() { this.value = ''; }", false)
                .await
                .map_err(|e| fail(format!("failed to clear field: {e}")))?;
            element
                .type_str(text.as_str())
                .await
                .map_err(|e| fail(format!("type failed: {e}")))?;
            Ok(serde_json::json!({ "typed": selector }))
        }

        Action::Scroll { direction, selector, .. } => {
            if let Some(selector) = selector {
                let element = wait_for_element(page, selector, index, action_type).await?;
                element
                    .scroll_into_view()
                    .await
                    .map_err(|e| fail(format!("scroll into view failed: {e}")))?;
                Ok(serde_json::json!({ "scrolledTo": selector }))
            } else {
                let amount = action.scroll_amount() as i64;
                let signed = match direction {
                    crate::domain::request::ScrollDirection::Down => amount,
                    crate::domain::request::ScrollDirection::Up => -amount,
                };
                page.evaluate(format!("window.scrollBy(0, {signed});"))
                    .await
                    .map_err(|e| fail(format!("scroll failed: {e}")))?;
                Ok(serde_json::json!({ "scrolledBy": signed }))
            }
        }

        Action::Screenshot { full_page, viewport } => {
            if let Some(viewport) = viewport {
                set_viewport(page, viewport.width, viewport.height)
                    .await
                    .map_err(|e| fail(format!("failed to set viewport: {e}")))?;
            }
            let params = ScreenshotParams::builder()
                .format(CaptureScreenshotFormat::Png)
                .full_page(*full_page)
                .build();
            let bytes = page
                .screenshot(params)
                .await
                .map_err(|e| fail(format!("screenshot failed: {e}")))?;
            let encoded = BASE64.encode(bytes);
            screenshots.push(encoded.clone());
            Ok(serde_json::json!({ "base64": encoded }))
        }

        Action::Scrape { selector } => {
            let html = if let Some(selector) = selector {
                match page.find_element(selector).await {
                    Ok(element) => element
                        .inner_html()
                        .await
                        .ok()
                        .flatten()
                        .unwrap_or_default(),
                    Err(_) => String::new(),
                }
            } else {
                page.content().await.unwrap_or_default()
            };
            let url = page.url().await.ok().flatten().unwrap_or_default();
            Ok(serde_json::json!({ "url": url, "html": html }))
        }

        Action::ExecuteJavascript { script, .. } => {
            let wrapped = match page.evaluate(script.as_str()).await {
                Ok(evaluation) => {
                    let value: serde_json::Value = evaluation
                        .into_value()
                        .unwrap_or(serde_json::Value::Null);
                    serde_json::to_string(&value).unwrap_or_else(|_| "null".to_string())
                }
                Err(e) => serde_json::json!({ "error": e.to_string() }).to_string(),
            };
            Ok(serde_json::json!({ "return": wrapped }))
        }

        Action::Pdf {} => {
            tracing::warn!("pdf action requested but not supported in self-hosted mode");
            Ok(serde_json::json!({ "link": "pdf-not-supported-in-self-hosted" }))
        }
    }
}

async fn set_viewport(page: &Page, width: u32, height: u32) -> Result<(), String> {
    use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
    let params = SetDeviceMetricsOverrideParams::builder()
        .width(width as i64)
        .height(height as i64)
        .device_scale_factor(1.0)
        .mobile(false)
        .build()
        .map_err(|e| e.to_string())?;
    page.execute(params).await.map_err(|e| e.to_string())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wait_clamps_at_30_seconds() {
        let action = Action::Wait { milliseconds: 60_000 };
        let clamped = match action {
            Action::Wait { milliseconds } => milliseconds.min(WAIT_ACTION_CAP_MS),
            _ => unreachable!(),
        };
        assert_eq!(clamped, WAIT_ACTION_CAP_MS);
    }

    #[test]
    fn scroll_amount_defaults_to_500() {
        let action = Action::Scroll { direction: Default::default(), amount: None, selector: None };
        assert_eq!(action.scroll_amount(), 500);
    }

    #[test]
    fn action_type_names_match_the_tag() {
        assert_eq!(action_type_name(&Action::Pdf {}), "pdf");
        assert_eq!(
            action_type_name(&Action::Click { selector: "#x".into() }),
            "click"
        );
    }
}
