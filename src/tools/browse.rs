//! Web content fetch backing the `browse` capability.
//!
//! The network is an external collaborator here: given a URL, return text
//! content or a typed fetch failure. Failures are strings because the caller
//! collapses them into a tool-level no-result, never a fatal error.

use std::time::Duration;

use async_trait::async_trait;

/// Longest page body handed to the model, in bytes.
const MAX_PAGE_BYTES: usize = 64 * 1024;

/// Fetch seam for the `browse` tool.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, String>;
}

/// Fetcher over plain HTTP.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self { client }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new(Duration::from_secs(20))
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, String> {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(format!("unsupported URL scheme: {url}"));
        }

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| format!("request failed: {e}"))?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("HTTP {status}"));
        }

        let mut body = response
            .text()
            .await
            .map_err(|e| format!("body read failed: {e}"))?;

        if body.len() > MAX_PAGE_BYTES {
            let mut cut = MAX_PAGE_BYTES;
            while !body.is_char_boundary(cut) {
                cut -= 1;
            }
            body.truncate(cut);
        }
        Ok(body)
    }
}
