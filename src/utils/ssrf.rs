// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::net::IpAddr;

use tokio::net::lookup_host;
use url::Url;

/// DNS-resolve the URL's host and reject loopback/private/link-local/
/// multicast ranges, guarding every outbound fetch against SSRF. Disabled
/// only via `SCRAPEWORKER_DISABLE_SSRF_PROTECTION=true`, for local and
/// integration testing.
pub async fn validate_url(url_str: &str) -> Result<(), String> {
    if std::env::var("SCRAPEWORKER_DISABLE_SSRF_PROTECTION").unwrap_or_default() == "true" {
        return Ok(());
    }

    let url = Url::parse(url_str).map_err(|e| e.to_string())?;
    let host = url.host_str().ok_or_else(|| "missing host".to_string())?;

    if host.eq_ignore_ascii_case("localhost") {
        return Err("SSRF protection: localhost is not allowed".to_string());
    }

    let port = url.port_or_known_default().unwrap_or(80);
    let addrs = lookup_host(format!("{host}:{port}"))
        .await
        .map_err(|e| e.to_string())?;

    for addr in addrs {
        if is_private_ip(addr.ip()) {
            return Err(format!(
                "SSRF protection: private IP access is not allowed: {}",
                addr.ip()
            ));
        }
    }

    Ok(())
}

fn is_private_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(ipv4) => {
            let o = ipv4.octets();
            o[0] == 10
                || (o[0] == 172 && (16..=31).contains(&o[1]))
                || (o[0] == 192 && o[1] == 168)
                || ipv4.is_loopback()
                || ipv4.is_link_local()
                || (224..=239).contains(&o[0])
        }
        IpAddr::V6(ipv6) => {
            ipv6.is_loopback()
                || (ipv6.segments()[0] & 0xfe00) == 0xfc00
                || (ipv6.segments()[0] & 0xffc0) == 0xfe80
                || (ipv6.segments()[0] & 0xff00) == 0xff00
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn private_ranges_are_recognized() {
        assert!(is_private_ip("127.0.0.1".parse().unwrap()));
        assert!(is_private_ip("10.0.0.1".parse().unwrap()));
        assert!(is_private_ip("192.168.1.1".parse().unwrap()));
        assert!(is_private_ip("172.16.0.1".parse().unwrap()));
        assert!(!is_private_ip("8.8.8.8".parse().unwrap()));
    }

    #[tokio::test]
    async fn localhost_is_always_rejected() {
        std::env::remove_var("SCRAPEWORKER_DISABLE_SSRF_PROTECTION");
        assert!(validate_url("http://localhost").await.is_err());
    }

    #[tokio::test]
    async fn disable_env_var_bypasses_the_guard() {
        std::env::set_var("SCRAPEWORKER_DISABLE_SSRF_PROTECTION", "true");
        assert!(validate_url("http://localhost").await.is_ok());
        std::env::remove_var("SCRAPEWORKER_DISABLE_SSRF_PROTECTION");
    }
}
