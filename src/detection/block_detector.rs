// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::collections::HashMap;

/// Why a response was classified as blocked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockedReason {
    IpBlock,
    RobotDetected,
    Captcha,
    RateLimited,
    Unknown,
}

/// Outcome of classifying a `(status, body, headers)` triple.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockDetectionResult {
    pub is_blocked: bool,
    pub reason: Option<BlockedReason>,
    pub confidence: f64,
}

impl BlockDetectionResult {
    fn not_blocked() -> Self {
        Self {
            is_blocked: false,
            reason: None,
            confidence: 0.0,
        }
    }

    fn blocked(reason: BlockedReason, confidence: f64) -> Self {
        Self {
            is_blocked: true,
            reason: Some(reason),
            confidence,
        }
    }
}

const CAPTCHA_PATTERNS: &[&str] = &[
    "captcha",
    "recaptcha",
    "hcaptcha",
    "cf-turnstile",
    "challenge-form",
    "challenge-running",
    "g-recaptcha",
    "h-captcha",
    "arkose",
    "funcaptcha",
];

const BOT_DETECTION_PATTERNS: &[&str] = &[
    "verify you are human",
    "access denied",
    "suspicious activity",
    "unusual traffic",
    "bot detected",
    "browser check",
    "please enable javascript",
    "are you a robot",
    "are you human",
    "human verification",
    "not a robot",
    "robot check",
    "automated requests",
    "automated access",
    "bot protection",
    "pardon our interruption",
    "security check",
    "unusual request",
    "please verify you are a human",
    "javascript is disabled",
    "enable cookies to continue",
    "checking your connection",
];

const CLOUDFLARE_PATTERNS: &[&str] = &[
    "cloudflare",
    "cf-ray",
    "checking your browser",
    "just a moment",
    "please wait while we verify",
    "ddos protection",
    "ray id:",
    "performance & security by cloudflare",
    "__cf_bm",
    "cf_chl_opt",
];

const RATE_LIMIT_PATTERNS: &[&str] = &[
    "rate limit",
    "rate-limit",
    "ratelimit",
    "too many requests",
    "slow down",
    "request limit exceeded",
    "quota exceeded",
    "throttled",
];

const IP_BLOCK_PATTERNS: &[&str] = &[
    "ip blocked",
    "ip banned",
    "your ip",
    "ip address",
    "blocked ip",
    "banned ip",
    "forbidden",
    "403 forbidden",
];

fn contains_any(haystack: &str, patterns: &[&str]) -> bool {
    patterns.iter().any(|p| haystack.contains(p))
}

fn header_value<'a>(headers: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// Classify a response as blocked or not. Pure and side-effect-free: no I/O,
/// no clock, precedence rules applied strictly in order.
pub fn detect(status: u16, body: &str, headers: &HashMap<String, String>) -> BlockDetectionResult {
    let lower = body.to_lowercase();
    let len = body.len();

    // 1. Rate-limit headers.
    let retry_after = header_value(headers, "retry-after").is_some();
    let ratelimit_zero = header_value(headers, "x-ratelimit-remaining") == Some("0");
    let rate_limit_zero = header_value(headers, "x-rate-limit-remaining") == Some("0");
    if retry_after || ratelimit_zero || rate_limit_zero {
        return BlockDetectionResult::blocked(BlockedReason::RateLimited, 0.95);
    }

    // 2. Status 429.
    if status == 429 {
        return BlockDetectionResult::blocked(BlockedReason::RateLimited, 0.95);
    }

    // 3. Status 403.
    if status == 403 {
        if contains_any(&lower, CAPTCHA_PATTERNS) {
            return BlockDetectionResult::blocked(BlockedReason::Captcha, 0.9);
        }
        if contains_any(&lower, BOT_DETECTION_PATTERNS) {
            return BlockDetectionResult::blocked(BlockedReason::RobotDetected, 0.85);
        }
        return BlockDetectionResult::blocked(BlockedReason::IpBlock, 0.8);
    }

    // 4. Status 503.
    if status == 503 {
        if contains_any(&lower, CLOUDFLARE_PATTERNS) {
            return BlockDetectionResult::blocked(BlockedReason::RobotDetected, 0.85);
        }
        return BlockDetectionResult::blocked(BlockedReason::IpBlock, 0.6);
    }

    // 5. Status 401.
    if status == 401 {
        if contains_any(&lower, IP_BLOCK_PATTERNS) {
            return BlockDetectionResult::blocked(BlockedReason::IpBlock, 0.7);
        }
        return BlockDetectionResult::not_blocked();
    }

    // 6. CAPTCHA pattern in body.
    if contains_any(&lower, CAPTCHA_PATTERNS) {
        return if len < 50_000 {
            BlockDetectionResult::blocked(BlockedReason::Captcha, 0.9)
        } else {
            BlockDetectionResult::blocked(BlockedReason::Captcha, 0.6)
        };
    }

    // 7. Cloudflare pattern in body.
    if contains_any(&lower, CLOUDFLARE_PATTERNS) {
        return if len < 15_000 {
            BlockDetectionResult::blocked(BlockedReason::RobotDetected, 0.85)
        } else {
            BlockDetectionResult::not_blocked()
        };
    }

    // 8. Bot-detection pattern in body.
    if contains_any(&lower, BOT_DETECTION_PATTERNS) {
        return if len < 20_000 {
            BlockDetectionResult::blocked(BlockedReason::RobotDetected, 0.8)
        } else {
            BlockDetectionResult::blocked(BlockedReason::RobotDetected, 0.5)
        };
    }

    // 9. Rate-limit pattern in body.
    if contains_any(&lower, RATE_LIMIT_PATTERNS) {
        return BlockDetectionResult::blocked(BlockedReason::RateLimited, 0.75);
    }

    // 10. IP-block pattern in body.
    if contains_any(&lower, IP_BLOCK_PATTERNS) {
        return if len < 20_000 {
            BlockDetectionResult::blocked(BlockedReason::IpBlock, 0.7)
        } else {
            BlockDetectionResult::blocked(BlockedReason::IpBlock, 0.4)
        };
    }

    // 11. Status 200 and empty-trimmed body.
    if status == 200 && body.trim().is_empty() {
        return BlockDetectionResult::blocked(BlockedReason::Unknown, 0.3);
    }

    // 12. Otherwise not blocked.
    BlockDetectionResult::not_blocked()
}

/// Caller policy: should a caller retry the request with stealth mode enabled?
pub fn should_retry_with_stealth(result: &BlockDetectionResult) -> bool {
    if !result.is_blocked {
        return false;
    }
    if result.confidence >= 0.7 {
        return true;
    }
    matches!(
        result.reason,
        Some(BlockedReason::Captcha) | Some(BlockedReason::RobotDetected)
    ) && result.confidence >= 0.5
}
