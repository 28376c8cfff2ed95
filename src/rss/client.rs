//! HTTP client creation and request handling for feed sources.

use anyhow::Result;
use reqwest::{cookie::Jar, header};
use std::sync::Arc;
use tokio::time::timeout;
use tracing::{debug, info};

use super::types::FetchConfig;
use crate::TARGET_WEB_REQUEST;

/// Create a client with either standard or browser emulation settings
pub fn create_http_client() -> Result<reqwest::Client> {
    let cookie_store = Jar::default();
    let builder = reqwest::Client::builder()
        .cookie_store(true)
        .cookie_provider(Arc::new(cookie_store))
        .gzip(true)
        .redirect(reqwest::redirect::Policy::default());

    builder
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to build HTTP client: {}", e))
}

/// Attempt to fetch a feed with the configured user agent, falling back to
/// browser emulation headers when the standard request fails. Some
/// syndication endpoints refuse non-browser clients.
pub async fn fetch_with_fallback(
    url: &str,
    config: &FetchConfig,
) -> Result<(reqwest::Response, bool)> {
    debug!(target: TARGET_WEB_REQUEST, "Attempting standard request to {}", url);

    let standard_client = create_http_client()?;
    let standard_result = timeout(
        config.timeout,
        standard_client
            .get(url)
            .header(header::USER_AGENT, config.user_agent.as_str())
            .header(header::ACCEPT, "application/feed+json, application/json, application/rss+xml, application/atom+xml, application/xml, text/xml, */*;q=0.9")
            .header(header::ACCEPT_ENCODING, "gzip, deflate, br")
            .send(),
    )
    .await;

    let standard_error = match standard_result {
        Ok(Ok(resp)) if resp.status().is_success() => {
            debug!(target: TARGET_WEB_REQUEST, "Standard request to {} succeeded", url);
            return Ok((resp, false));
        }
        Ok(Ok(resp)) => format!("HTTP error: {}", resp.status()),
        Ok(Err(err)) => format!("Request failed: {}", err),
        Err(_) => format!(
            "Request timed out after {} seconds",
            config.timeout.as_secs()
        ),
    };

    debug!(target: TARGET_WEB_REQUEST, "Standard request to {} failed ({}), trying browser emulation", url, standard_error);

    let browser_client = create_http_client()?;
    match timeout(
        config.timeout,
        browser_client
            .get(url)
            .header(header::USER_AGENT, "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:138.0) Gecko/20100101 Firefox/138.0")
            .header(header::ACCEPT, "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8")
            .header(header::ACCEPT_LANGUAGE, "en-US,en;q=0.5")
            .header(header::ACCEPT_ENCODING, "gzip, deflate, br")
            .header("DNT", "1")
            .header("Upgrade-Insecure-Requests", "1")
            .header("Connection", "keep-alive")
            .send(),
    )
    .await
    {
        Ok(Ok(resp)) if resp.status().is_success() => {
            info!(target: TARGET_WEB_REQUEST, "Browser emulation request to {} succeeded", url);
            Ok((resp, true))
        }
        Ok(Ok(resp)) => Err(anyhow::anyhow!(
            "Both requests failed; standard: {}; browser emulation HTTP error: {}",
            standard_error,
            resp.status()
        )),
        Ok(Err(err)) => Err(anyhow::anyhow!(
            "Both requests failed; standard: {}; browser emulation: {}",
            standard_error,
            err
        )),
        Err(_) => Err(anyhow::anyhow!(
            "Both requests failed; standard: {}; browser emulation timed out after {} seconds",
            standard_error,
            config.timeout.as_secs()
        )),
    }
}
