// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::time::{Duration, Instant};

use rand::seq::IndexedRandom;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::redirect::Policy;

use crate::config::settings::Settings;
use crate::detection;
use crate::domain::request::ScrapeRequest;
use crate::domain::response::SuccessResponse;
use crate::engines::traits::EngineError;
use crate::proxy::{self, ProxyEnv};
use crate::utils::ssrf;

const MAX_REDIRECTS: usize = 10;
const DEFAULT_TIMEOUT_MS: u64 = 15_000;

const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:123.0) Gecko/20100101 Firefox/123.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.2 Safari/605.1.15",
];

fn browser_like_headers() -> Vec<(&'static str, &'static str)> {
    vec![
        ("Accept", "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8"),
        ("Accept-Language", "en-US,en;q=0.9"),
        ("Accept-Encoding", "gzip, deflate, br"),
        ("Cache-Control", "no-cache"),
        ("Pragma", "no-cache"),
        ("Sec-Ch-Ua", "\"Not A(Brand\";v=\"99\", \"Google Chrome\";v=\"121\", \"Chromium\";v=\"121\""),
        ("Sec-Ch-Ua-Mobile", "?0"),
        ("Sec-Ch-Ua-Platform", "\"Windows\""),
        ("Sec-Ch-Ua-Platform-Version", "\"15.0.0\""),
        ("Sec-Fetch-Dest", "document"),
        ("Sec-Fetch-Mode", "navigate"),
        ("Sec-Fetch-Site", "none"),
        ("Upgrade-Insecure-Requests", "1"),
    ]
}

fn pick_user_agent() -> &'static str {
    USER_AGENTS.choose(&mut rand::thread_rng()).copied().unwrap_or(USER_AGENTS[0])
}

fn extract_charset(content_type: &str) -> Option<String> {
    content_type
        .split(';')
        .find_map(|part| part.trim().strip_prefix("charset="))
        .map(|c| c.trim_matches('"').to_string())
}

/// Decode a response body, honoring a declared `Content-Type` charset
/// and falling back to `chardetng` sniffing, then plain UTF-8, if
/// decoding with the declared charset fails or none was declared.
fn decode_body(bytes: &[u8], content_type: Option<&str>) -> String {
    if let Some(charset) = content_type.and_then(extract_charset) {
        if !charset.eq_ignore_ascii_case("utf-8") {
            if let Some(encoding) = encoding_rs::Encoding::for_label(charset.as_bytes()) {
                let (decoded, _, had_errors) = encoding.decode(bytes);
                if !had_errors {
                    return decoded.into_owned();
                }
            }
        }
    } else if std::str::from_utf8(bytes).is_err() {
        let mut detector = chardetng::EncodingDetector::new();
        detector.feed(bytes, true);
        let encoding = detector.guess(None, true);
        let (decoded, _, had_errors) = encoding.decode(bytes);
        if !had_errors {
            return decoded.into_owned();
        }
    }
    String::from_utf8_lossy(bytes).into_owned()
}

/// Raw HTTP fetch with randomized browser-like headers, proxy, redirect
/// following, charset detection, and block check. No navigation, no
/// actions, no screenshots.
pub struct HttpScrapePipeline;

impl HttpScrapePipeline {
    pub fn new() -> Self {
        Self
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

        let effective_timeout_ms = request.timeout.min(DEFAULT_TIMEOUT_MS).max(1);

        let mut header_map = HeaderMap::new();
        for (name, value) in browser_like_headers() {
            if let (Ok(name), Ok(value)) = (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
                header_map.insert(name, value);
            }
        }
        for (k, v) in &request.headers {
            if let (Ok(k), Ok(v)) = (HeaderName::from_bytes(k.as_bytes()), HeaderValue::from_str(v)) {
                header_map.insert(k, v);
            }
        }

        let proxy_env = ProxyEnv {
            server: settings.proxy_server.clone(),
            username: settings.proxy_username.clone(),
            password: settings.proxy_password.clone(),
        };
        let resolved_proxy = proxy::resolve(request.proxy_profile.as_ref(), request.proxy.as_deref(), &proxy_env);

        let user_agent = request.user_agent.clone().unwrap_or_else(|| pick_user_agent().to_string());

        let mut builder = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_millis(effective_timeout_ms))
            .connect_timeout(Duration::from_millis(effective_timeout_ms))
            .redirect(Policy::limited(MAX_REDIRECTS))
            .cookie_store(true);

        if let Some(proxy) = &resolved_proxy {
            match reqwest::Proxy::all(&proxy.server) {
                Ok(mut reqwest_proxy) => {
                    if let Some(auth_header) = proxy.basic_auth_header() {
                        if let Ok(value) = HeaderValue::from_str(&auth_header) {
                            reqwest_proxy = reqwest_proxy.custom_http_auth(value);
                        }
                    }
                    builder = builder.proxy(reqwest_proxy);
                }
                Err(e) => {
                    return Ok(SuccessResponse::transport_failure(
                        start.elapsed().as_millis() as u64,
                        format!("invalid proxy: {e}"),
                    ))
                }
            }
        }

        if request.skip_tls_verification {
            builder = builder.danger_accept_invalid_certs(true);
        }

        let client = match builder.build() {
            Ok(client) => client,
            Err(e) => {
                return Ok(SuccessResponse::transport_failure(
                    start.elapsed().as_millis() as u64,
                    e.to_string(),
                ))
            }
        };

        let response = match client.get(&request.url).headers(header_map).send().await {
            Ok(response) => response,
            Err(e) => {
                return Ok(SuccessResponse::transport_failure(
                    start.elapsed().as_millis() as u64,
                    e.to_string(),
                ))
            }
        };

        let status_code = response.status().as_u16();
        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let mut response_headers = std::collections::HashMap::new();
        for (k, v) in response.headers() {
            if let Ok(v_str) = v.to_str() {
                response_headers.insert(k.as_str().to_string(), v_str.to_string());
            }
        }

        let bytes = match response.bytes().await {
            Ok(bytes) => bytes,
            Err(e) => {
                return Ok(SuccessResponse::transport_failure(
                    start.elapsed().as_millis() as u64,
                    e.to_string(),
                ))
            }
        };
        let content = decode_body(&bytes, content_type.as_deref());

        let detection = detection::detect(status_code, &content, &response_headers);
        let blocked_reason = if detection.confidence >= 0.5 { detection.reason } else { None };

        Ok(SuccessResponse {
            job_id: None,
            time_taken: start.elapsed().as_millis() as u64,
            content,
            // The final URL after redirects is intentionally not surfaced.
            url: Some(request.url.clone()),
            page_status_code: status_code,
            page_error: None,
            response_headers: Some(response_headers),
            screenshot: None,
            screenshots: None,
            action_content: None,
            action_results: None,
            blocked_reason,
            used_mobile_proxy: if request.mobile_proxy { Some(true) } else { None },
        })
    }
}

impl Default for HttpScrapePipeline {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn charset_is_extracted_from_content_type() {
        assert_eq!(
            extract_charset("text/html; charset=iso-8859-1"),
            Some("iso-8859-1".to_string())
        );
        assert_eq!(extract_charset("text/html"), None);
    }

    #[test]
    fn utf8_body_decodes_without_sniffing() {
        let bytes = "héllo wörld".as_bytes();
        assert_eq!(decode_body(bytes, None), "héllo wörld");
    }

    #[test]
    fn declared_non_utf8_charset_is_honored() {
        let (encoded, _, _) = encoding_rs::WINDOWS_1252.encode("café");
        let decoded = decode_body(&encoded, Some("text/html; charset=windows-1252"));
        assert_eq!(decoded, "café");
    }

    #[test]
    fn pick_user_agent_returns_one_of_the_pool() {
        let ua = pick_user_agent();
        assert!(USER_AGENTS.contains(&ua));
    }

    #[test]
    fn browser_like_headers_has_the_documented_set() {
        let headers = browser_like_headers();
        let names: Vec<&str> = headers.iter().map(|(k, _)| *k).collect();
        assert!(names.contains(&"Accept"));
        assert!(names.contains(&"Sec-Fetch-Mode"));
        assert!(names.contains(&"Upgrade-Insecure-Requests"));
    }
}
