// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::sync::Arc;

use crate::config::settings::Settings;
use crate::domain::request::{Engine, ScrapeRequest};
use crate::domain::response::SuccessResponse;
use crate::engines::browser::{BrowserPool, BrowserScrapePipeline};
use crate::engines::http::HttpScrapePipeline;
use crate::engines::traits::EngineError;

/// Dispatches a request to the pipeline its `engine` selects. Unknown
/// engine values fall back to the browser pipeline with a warning —
/// there is no hard failure mode for an unrecognized engine name.
pub struct EngineRouter {
    browser: BrowserScrapePipeline,
    http: HttpScrapePipeline,
}

impl EngineRouter {
    pub fn new(pool: Arc<BrowserPool>) -> Self {
        Self {
            browser: BrowserScrapePipeline::new(pool),
            http: HttpScrapePipeline::new(),
        }
    }

    pub async fn route(
        &self,
        request: &ScrapeRequest,
        settings: &Settings,
    ) -> Result<SuccessResponse, EngineError> {
        match request.engine {
            Engine::TlsClient => self.http.scrape(request, settings).await,
            Engine::ChromeCdp | Engine::Playwright => self.browser.scrape(request, settings).await,
        }
    }
}

/// Best-effort upper bound on how long a request may run, used by
/// callers to size outer timeouts. Never consulted by the pipelines
/// themselves — it is purely advisory.
pub fn get_engine_max_time(request: &ScrapeRequest) -> u64 {
    match request.engine {
        Engine::TlsClient => 15_000.min(request.timeout),
        Engine::Playwright => (request.wait + 30_000).min(request.timeout),
        Engine::ChromeCdp => {
            let actions_total: u64 = request.actions.iter().map(|a| a.max_time_contribution_ms()).sum();
            (request.wait + actions_total + 30_000).min(request.timeout)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::request::Action;

    fn request_with(engine: Engine, wait: u64, timeout: u64, actions: Vec<Action>) -> ScrapeRequest {
        let mut req: ScrapeRequest =
            serde_json::from_value(serde_json::json!({ "url": "https://example.com" })).unwrap();
        req.engine = engine;
        req.wait = wait;
        req.timeout = timeout;
        req.actions = actions;
        req
    }

    #[test]
    fn tlsclient_caps_at_15s() {
        let req = request_with(Engine::TlsClient, 0, 300_000, vec![]);
        assert_eq!(get_engine_max_time(&req), 15_000);
    }

    #[test]
    fn tlsclient_respects_a_lower_timeout() {
        let req = request_with(Engine::TlsClient, 0, 5_000, vec![]);
        assert_eq!(get_engine_max_time(&req), 5_000);
    }

    #[test]
    fn playwright_adds_30s_to_wait() {
        let req = request_with(Engine::Playwright, 2_000, 300_000, vec![]);
        assert_eq!(get_engine_max_time(&req), 32_000);
    }

    #[test]
    fn chrome_cdp_sums_action_contributions() {
        let actions = vec![
            Action::Wait { milliseconds: 500 },
            Action::Click { selector: "#x".into() },
        ];
        let req = request_with(Engine::ChromeCdp, 1_000, 300_000, actions);
        // 1000 wait + (500 wait-action + 250 click) + 30000 base
        assert_eq!(get_engine_max_time(&req), 31_750);
    }
}
