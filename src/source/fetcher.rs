use reqwest::{Client, Response};
use std::time::Duration;
use tokio::time::timeout;
use tracing::debug;

use crate::error::{Error, Result};

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MAX_BODY_BYTES: usize = 50 * 1024 * 1024;

/// Downloads pages over HTTP(S) for extraction.
#[derive(Debug, Clone)]
pub struct PageFetcher {
    client: Client,
    timeout_duration: Duration,
    user_agent: String,
    max_body_bytes: usize,
}

impl PageFetcher {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .redirect(reqwest::redirect::Policy::limited(10))
            .gzip(true)
            .build()?;

        Ok(Self {
            client,
            timeout_duration: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: format!("LeadLiftr/{}", env!("CARGO_PKG_VERSION")),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_duration = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }

    pub async fn fetch(&self, url: &str) -> Result<String> {
        debug!("Fetching page from: {}", url);
        validate_page_url(url)?;

        let response = timeout(self.timeout_duration, self.fetch_response(url))
            .await
            .map_err(|_| Error::Timeout(format!("Request to {} timed out", url)))??;

        if !response.status().is_success() {
            return Err(Error::HttpError(format!(
                "HTTP {} for {}: {}",
                response.status().as_u16(),
                url,
                response.status().canonical_reason().unwrap_or("Unknown error")
            )));
        }

        if let Some(length) = response.content_length() {
            if length as usize > self.max_body_bytes {
                return Err(Error::HttpError(format!(
                    "Page at {} is {} bytes, limit is {}",
                    url, length, self.max_body_bytes
                )));
            }
        }

        let body = self.read_body(url, response).await?;

        debug!("Downloaded {} bytes from {}", body.len(), url);
        Ok(String::from_utf8_lossy(&body).into_owned())
    }

    /// Read the body chunk by chunk, giving up as soon as it passes the cap.
    /// Servers that omit `Content-Length` are held to the same limit.
    async fn read_body(&self, url: &str, mut response: Response) -> Result<Vec<u8>> {
        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| Error::HttpError(format!("Failed to read response body: {}", e)))?
        {
            if body.len() + chunk.len() > self.max_body_bytes {
                return Err(Error::HttpError(format!(
                    "Page at {} exceeds the {} byte limit",
                    url, self.max_body_bytes
                )));
            }
            body.extend_from_slice(&chunk);
        }
        Ok(body)
    }

    async fn fetch_response(&self, url: &str) -> Result<Response> {
        let response = self
            .client
            .get(url)
            .header("User-Agent", &self.user_agent)
            .header("Accept", "text/html, application/xhtml+xml, */*")
            .send()
            .await
            .map_err(|e| Error::HttpError(format!("Request failed: {}", e)))?;

        Ok(response)
    }
}

/// Only absolute http and https URLs can be fetched.
pub fn validate_page_url(url: &str) -> Result<()> {
    let parsed = url::Url::parse(url).map_err(|e| Error::InvalidUrl(format!("{}: {}", url, e)))?;

    match parsed.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(Error::InvalidUrl(format!("Unsupported scheme: {}", scheme))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_page_url() {
        assert!(validate_page_url("https://crm.example.com/leads?page=2").is_ok());
        assert!(validate_page_url("http://localhost:8080/").is_ok());
        assert!(matches!(validate_page_url("ftp://example.com/x"), Err(Error::InvalidUrl(_))));
        assert!(matches!(validate_page_url("not a url"), Err(Error::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn test_fetch_rejects_bad_url_before_request() {
        let fetcher = PageFetcher::new().unwrap();
        let result = fetcher.fetch("file:///etc/passwd").await;
        assert!(matches!(result, Err(Error::InvalidUrl(_))));
    }
}
