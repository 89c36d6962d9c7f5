// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// Configuration loading from environment variables.
pub mod config;

/// Request/response/job data types shared across the crate.
pub mod domain;

/// The block-detection classifier.
pub mod detection;

/// Proxy configuration merging.
pub mod proxy;

/// Scrape engines: the router and the browser/http pipelines.
pub mod engines;

/// Job store, TTL sweeper, sync/async execution.
pub mod jobs;

/// HTTP transport shell: routes, handlers, middleware, error mapping.
pub mod presentation;

/// Logging setup and small shared helpers.
pub mod utils;
