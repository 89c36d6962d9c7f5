// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::detection::BlockedReason;

/// The outcome of running one action in an `Action` sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionResult {
    pub idx: usize,
    #[serde(rename = "type")]
    pub action_type: String,
    pub result: serde_json::Value,
}

/// The normalized result of a scrape, win or soft-fail.
/// `pageStatusCode == 0` with a non-empty `pageError` indicates a
/// transport failure rather than a server response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuccessResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<uuid::Uuid>,
    pub time_taken: u64,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub page_status_code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_headers: Option<HashMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screenshots: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_results: Option<Vec<ActionResult>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocked_reason: Option<BlockedReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub used_mobile_proxy: Option<bool>,
}

impl SuccessResponse {
    /// A response produced after a transport-level failure: no content,
    /// `pageStatusCode = 0`, the failure message attached as `pageError`.
    pub fn transport_failure(time_taken: u64, message: impl Into<String>) -> Self {
        Self {
            time_taken,
            page_status_code: 0,
            page_error: Some(message.into()),
            ..Default::default()
        }
    }

    /// True when this response represents a transport failure with no
    /// recovered content — the condition `JobManager::execute_job` checks
    /// to decide whether a job is `failed` rather than `completed`.
    pub fn is_transport_failure(&self) -> bool {
        self.page_error.as_ref().is_some_and(|e| !e.is_empty()) && self.content.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldErrorDetail {
    pub path: String,
    pub message: String,
}

/// Transport-shell error body: schema failures carry `details`, job
/// lookups carry `code`, everything else is a bare `error` message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<FieldErrorDetail>>,
}

impl ErrorResponse {
    pub fn message(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: None,
            details: None,
        }
    }

    pub fn with_code(error: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: Some(code.into()),
            details: None,
        }
    }

    pub fn validation(details: Vec<FieldErrorDetail>) -> Self {
        Self {
            error: "Validation failed".to_string(),
            code: None,
            details: Some(details),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_failure_with_empty_content_is_failure() {
        let r = SuccessResponse::transport_failure(10, "timeout");
        assert!(r.is_transport_failure());
    }

    #[test]
    fn transport_failure_with_content_is_not_a_failure() {
        let mut r = SuccessResponse::transport_failure(10, "warning message");
        r.content = "<html></html>".to_string();
        assert!(!r.is_transport_failure());
    }

    #[test]
    fn success_without_error_is_not_a_failure() {
        let mut r = SuccessResponse::default();
        r.content = "<html></html>".to_string();
        r.page_status_code = 200;
        assert!(!r.is_transport_failure());
    }
}
