// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::config::settings::Settings;

fn default_true() -> bool {
    true
}

fn default_timeout_ms() -> u64 {
    300_000
}

fn default_wait_milliseconds() -> u64 {
    1_000
}

fn default_scroll_amount() -> u64 {
    500
}

/// Which strategy fetches the page. `ChromeCdp` and `Playwright` are
/// identical in this implementation; only `TlsClient` takes the raw HTTP
/// path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Engine {
    ChromeCdp,
    Playwright,
    #[serde(rename = "tlsclient")]
    TlsClient,
}

impl Default for Engine {
    fn default() -> Self {
        Engine::ChromeCdp
    }
}

/// Navigation readiness condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WaitUntil {
    Load,
    #[serde(rename = "domcontentloaded")]
    DomContentLoaded,
    #[serde(rename = "networkidle")]
    NetworkIdle,
}

impl Default for WaitUntil {
    fn default() -> Self {
        WaitUntil::Load
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrollDirection {
    Down,
    Up,
}

impl Default for ScrollDirection {
    fn default() -> Self {
        ScrollDirection::Down
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub domain: Option<String>,
    #[serde(default = "default_cookie_path")]
    pub path: String,
}

fn default_cookie_path() -> String {
    "/".to_string()
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyProfile {
    pub server: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeolocationOptions {
    pub country: Option<String>,
    pub languages: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

/// One step of a scripted page interaction. Actions in a request execute
/// strictly in sequence and share a single page.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Action {
    Wait {
        #[serde(default = "default_wait_milliseconds")]
        milliseconds: u64,
    },
    Click {
        selector: String,
    },
    Type {
        selector: String,
        text: String,
    },
    Scroll {
        #[serde(default)]
        direction: ScrollDirection,
        amount: Option<u64>,
        selector: Option<String>,
    },
    Screenshot {
        #[serde(default)]
        full_page: bool,
        viewport: Option<Viewport>,
    },
    Scrape {
        selector: Option<String>,
    },
    ExecuteJavascript {
        script: String,
        metadata: Option<serde_json::Value>,
    },
    Pdf {},
}

impl Action {
    /// The milliseconds contribution this action makes to
    /// `EngineRouter::max_time` — a `wait` action contributes its own
    /// duration, every other action a flat 250ms.
    pub fn max_time_contribution_ms(&self) -> u64 {
        match self {
            Action::Wait { milliseconds } => *milliseconds,
            _ => 250,
        }
    }

    pub fn scroll_amount(&self) -> u64 {
        match self {
            Action::Scroll { amount, .. } => amount.unwrap_or_else(default_scroll_amount),
            _ => default_scroll_amount(),
        }
    }
}

/// A validated scrape request. Unrecognized fields are rejected at
/// deserialization (`deny_unknown_fields`).
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ScrapeRequest {
    #[validate(url)]
    pub url: String,

    #[serde(default)]
    pub engine: Engine,

    #[serde(default)]
    pub headers: HashMap<String, String>,

    #[serde(default)]
    pub cookies: Vec<Cookie>,

    pub user_agent: Option<String>,

    #[serde(default = "default_timeout_ms")]
    pub timeout: u64,

    #[serde(default)]
    pub wait: u64,

    #[serde(default)]
    pub actions: Vec<Action>,

    #[serde(default)]
    pub wait_until: WaitUntil,

    pub wait_for_selector: Option<String>,

    #[serde(default)]
    pub screenshot: bool,

    #[serde(default)]
    pub full_page_screenshot: bool,

    pub proxy: Option<String>,

    pub proxy_profile: Option<ProxyProfile>,

    #[serde(default)]
    pub mobile_proxy: bool,

    // `None` means "use the operator's STEALTH_ENABLED / BLOCK_MEDIA
    // default" — resolved via `effective_stealth`/`effective_block_media`.
    #[serde(default)]
    pub stealth: Option<bool>,

    #[serde(default)]
    pub block_media: Option<bool>,

    #[serde(default = "default_true")]
    pub block_ads: bool,

    #[serde(default)]
    pub mobile: bool,

    pub geolocation: Option<GeolocationOptions>,

    #[serde(default)]
    pub skip_tls_verification: bool,

    #[serde(default)]
    pub instant_return: bool,

    // Accepted for API compatibility but not acted upon by this
    // implementation.
    #[serde(default)]
    pub priority: Option<serde_json::Value>,
    #[serde(default)]
    pub log_request: Option<bool>,
    #[serde(default)]
    pub save_scrape_result_to_gcs: Option<bool>,
    #[serde(default)]
    pub zero_data_retention: Option<bool>,
    #[serde(default)]
    pub disable_smart_wait_cache: Option<bool>,
    #[serde(default)]
    pub atsv: Option<bool>,
    #[serde(default)]
    pub disable_js_dom: Option<bool>,
}

impl ScrapeRequest {
    /// The locale derived from `geolocation.languages[0]`, defaulting to
    /// `en-US`. `geolocation.country` is accepted but never consulted.
    pub fn locale(&self) -> String {
        self.geolocation
            .as_ref()
            .and_then(|g| g.languages.as_ref())
            .and_then(|langs| langs.first())
            .cloned()
            .unwrap_or_else(|| "en-US".to_string())
    }

    pub fn wants_screenshot(&self) -> bool {
        self.screenshot || self.full_page_screenshot
    }

    /// `stealth`, falling back to the operator's `STEALTH_ENABLED` default
    /// when the request didn't specify one.
    pub fn effective_stealth(&self, settings: &Settings) -> bool {
        self.stealth.unwrap_or(settings.stealth_enabled)
    }

    /// `blockMedia`, falling back to the operator's `BLOCK_MEDIA` default
    /// when the request didn't specify one.
    pub fn effective_block_media(&self, settings: &Settings) -> bool {
        self.block_media.unwrap_or(settings.block_media)
    }
}
