// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use config::{Config, ConfigError, Environment};
use serde::Deserialize;

/// Runtime configuration, sourced entirely from the environment (no
/// config files — this service ships as a single container with its
/// knobs set by the orchestrator).
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub auth_token: Option<String>,

    pub max_concurrent_pages: usize,
    pub timeout_ms: u64,
    pub page_load_timeout_ms: u64,

    pub proxy_server: Option<String>,
    pub proxy_username: Option<String>,
    pub proxy_password: Option<String>,

    pub block_media: bool,
    pub headless: bool,
    pub stealth_enabled: bool,

    pub job_ttl_ms: u64,
    pub job_cleanup_interval_ms: u64,
}

impl Settings {
    /// Load settings from the process environment, applying the defaults
    /// documented for each variable before overlaying whatever is set.
    pub fn new() -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .set_default("host", "0.0.0.0")?
            .set_default("port", 3000)?
            .set_default("log_level", "info")?
            .set_default("auth_token", None::<String>)?
            .set_default("max_concurrent_pages", 10)?
            .set_default("timeout_ms", 300_000)?
            .set_default("page_load_timeout_ms", 60_000)?
            .set_default("proxy_server", None::<String>)?
            .set_default("proxy_username", None::<String>)?
            .set_default("proxy_password", None::<String>)?
            .set_default("block_media", true)?
            .set_default("headless", true)?
            .set_default("stealth_enabled", true)?
            .set_default("job_ttl_ms", 600_000)?
            .set_default("job_cleanup_interval_ms", 60_000)?
            .add_source(Environment::default().try_parsing(true));

        builder.build()?.try_deserialize()
    }
}
