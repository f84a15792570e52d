use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_LANGUAGE, REFERER, USER_AGENT};
use reqwest::{redirect, Client};
use tokio::time::Duration;

use crate::config::config::HttpConfig;

#[allow(async_fn_in_trait)]
pub trait FetchPage {
    /// Issues a single GET and returns the raw response body.
    async fn fetch_page(&self, url: &str) -> Result<String>;
}

/// Browser-like HTTP client used to download product pages.
#[derive(Clone)]
pub struct PageClient {
    client: Client,
}

impl PageClient {
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent).context("Invalid http.user_agent")?,
        );
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_str(&config.accept_language).context("Invalid http.accept_language")?,
        );
        headers.insert(
            REFERER,
            HeaderValue::from_str(&config.referer).context("Invalid http.referer")?,
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(config.timeout_ms))
            .redirect(redirect::Policy::limited(config.max_redirects))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(PageClient { client })
    }
}

impl FetchPage for PageClient {
    async fn fetch_page(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to send request to {}", url))?
            .error_for_status()
            .with_context(|| format!("Unsuccessful status from {}", url))?;

        response
            .text()
            .await
            .with_context(|| format!("Failed to read response body from {}", url))
    }
}
