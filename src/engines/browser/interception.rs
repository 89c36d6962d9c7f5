// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chromiumoxide::cdp::browser_protocol::fetch::{
    ContinueRequestParams, EnableParams, EventRequestPaused, FailRequestParams, RequestPattern,
};
use chromiumoxide::cdp::browser_protocol::network::{ErrorReason, ResourceType};
use chromiumoxide::Page;
use futures::StreamExt;

const BLOCKED_MEDIA_EXTENSIONS: &[&str] = &[
    ".mp4", ".webm", ".avi", ".mov", ".wmv", ".flv", ".mp3", ".wav", ".ogg", ".gif", ".webp",
];

const AD_DOMAIN_SUBSTRINGS: &[&str] = &[
    "doubleclick.net",
    "googlesyndication.com",
    "googleadservices.com",
    "adservice.google.",
    "adsrvr.org",
    "taboola.com",
    "outbrain.com",
    "criteo.com",
    "adnxs.com",
    "pubmatic.com",
    "rubiconproject.com",
];

fn is_ad_url(url: &str) -> bool {
    AD_DOMAIN_SUBSTRINGS.iter().any(|d| url.contains(d))
}

fn is_blocked_media(url: &str, resource_type: &ResourceType) -> bool {
    matches!(resource_type, ResourceType::Media | ResourceType::Font)
        || BLOCKED_MEDIA_EXTENSIONS.iter().any(|ext| url.contains(ext))
}

/// Installs a CDP `Fetch` interception route on the page that fails
/// requests matching the ad-domain or media/font rules, when
/// `blockMedia`/`blockAds` are set. Returns the background task handle so
/// the caller can abort it when the page is torn down.
pub async fn install_route_handler(
    page: &Page,
    block_media: bool,
    block_ads: bool,
) -> Result<Option<tokio::task::JoinHandle<()>>, String> {
    if !block_media && !block_ads {
        return Ok(None);
    }

    let patterns = vec![RequestPattern::builder().url_pattern("*").build()];
    page.execute(EnableParams::builder().patterns(patterns).build())
        .await
        .map_err(|e| format!("failed to enable request interception: {e}"))?;

    let mut events = page
        .event_listener::<EventRequestPaused>()
        .await
        .map_err(|e| format!("failed to subscribe to intercepted requests: {e}"))?;

    let page = page.clone();
    let handle = tokio::spawn(async move {
        while let Some(event) = events.next().await {
            let url = event.request.url.clone();
            let resource_type = event.resource_type.clone();
            let blocked = (block_ads && is_ad_url(&url))
                || (block_media && is_blocked_media(&url, &resource_type));

            let outcome = if blocked {
                page.execute(FailRequestParams::new(event.request_id.clone(), ErrorReason::BlockedByClient))
                    .await
                    .map(|_| ())
            } else {
                page.execute(ContinueRequestParams::new(event.request_id.clone()))
                    .await
                    .map(|_| ())
            };

            if let Err(e) = outcome {
                tracing::warn!(%url, error = %e, "failed to resolve intercepted request");
            }
        }
    });

    Ok(Some(handle))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ad_domain_is_recognized() {
        assert!(is_ad_url("https://pagead2.googlesyndication.com/pagead/show_ads.js"));
        assert!(!is_ad_url("https://example.com/app.js"));
    }

    #[test]
    fn blocked_media_extension_is_recognized() {
        assert!(is_blocked_media("https://example.com/clip.mp4", &ResourceType::Other));
        assert!(!is_blocked_media("https://example.com/app.js", &ResourceType::Script));
    }

    #[test]
    fn media_resource_type_is_recognized_regardless_of_extension() {
        assert!(is_blocked_media("https://example.com/stream", &ResourceType::Media));
        assert!(is_blocked_media("https://example.com/font.woff2", &ResourceType::Font));
    }
}
