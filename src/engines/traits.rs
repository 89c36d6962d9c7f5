// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use thiserror::Error;

/// Errors that can propagate out of a scrape pipeline. Transport-layer
/// failures are not represented here — pipelines fold those into a
/// `SuccessResponse{pageStatusCode: 0, pageError}` instead of returning
/// `Err`. Only action failures and programmer errors reach this type.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("action {index} ({action_type}) failed: {message}")]
    Action {
        index: usize,
        action_type: String,
        message: String,
    },
    #[error("browser launch failed: {0}")]
    BrowserLaunch(String),
    #[error("unsupported engine: {0}")]
    UnsupportedEngine(String),
    #[error("other error: {0}")]
    Other(String),
}
