//! Page image download.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::backend::OcrError;

/// Fetches the bytes of a page image.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    /// Download `url`; `referer` is the viewer page the image belongs to.
    async fn fetch(&self, url: &str, referer: &str) -> Result<Vec<u8>, OcrError>;
}

/// Plain HTTP GET via reqwest.
#[derive(Debug, Clone)]
pub struct HttpImageFetcher {
    client: reqwest::Client,
}

impl HttpImageFetcher {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, OcrError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .map_err(|e| OcrError::ImageError(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &str, referer: &str) -> Result<Vec<u8>, OcrError> {
        debug!("Downloading page image {}", url);
        let response = self
            .client
            .get(url)
            .header(reqwest::header::REFERER, referer)
            .send()
            .await
            .map_err(|e| OcrError::ImageError(format!("GET {} failed: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(OcrError::ImageError(format!(
                "GET {} returned HTTP {}",
                url, status
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| OcrError::ImageError(format!("Reading {} failed: {}", url, e)))?;
        if bytes.is_empty() {
            return Err(OcrError::ImageError(format!("{} returned no data", url)));
        }
        Ok(bytes.to_vec())
    }
}
