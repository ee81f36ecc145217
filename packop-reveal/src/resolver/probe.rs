//! Single-candidate image load attempts

use crate::error::{Error, Result};
use async_trait::async_trait;
use packop_common::config::GatewayConfig;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

const USER_AGENT: &str = concat!("packop/", env!("CARGO_PKG_VERSION"));

/// Why one candidate failed to load
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProbeError {
    /// Connection, TLS, timeout or invalid URL
    #[error("Network error: {0}")]
    Network(String),

    /// Gateway answered with a non-success status
    #[error("HTTP status {0}")]
    Status(u16),

    /// Body was not a recognizable image
    #[error("Not an image: {0}")]
    NotAnImage(String),
}

/// One attempt to load a URL as an image
///
/// Implementations report success or failure only; the resolver decides
/// what happens next.
#[async_trait]
pub trait ImageProbe: Send + Sync {
    async fn probe(&self, url: &str) -> std::result::Result<(), ProbeError>;
}

/// Loads candidates over HTTP with reqwest
///
/// A candidate succeeds when the gateway answers 2xx and the body sniffs as
/// an image.
pub struct HttpImageProbe {
    http_client: reqwest::Client,
}

impl HttpImageProbe {
    pub fn new(request_timeout: Duration) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(request_timeout)
            .build()
            .map_err(|e| Error::Http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { http_client })
    }

    pub fn from_config(config: &GatewayConfig) -> Result<Self> {
        Self::new(config.request_timeout())
    }
}

#[async_trait]
impl ImageProbe for HttpImageProbe {
    async fn probe(&self, url: &str) -> std::result::Result<(), ProbeError> {
        debug!(url = %url, "Probing candidate");

        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| ProbeError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProbeError::Status(status.as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| ProbeError::Network(e.to_string()))?;

        check_image_bytes(&body)
    }
}

/// Accept only bodies whose magic bytes identify an image format
pub(crate) fn check_image_bytes(body: &[u8]) -> std::result::Result<(), ProbeError> {
    if body.is_empty() {
        return Err(ProbeError::NotAnImage("empty body".to_string()));
    }
    if infer::is_image(body) {
        return Ok(());
    }
    let detected = infer::get(body)
        .map(|kind| kind.mime_type().to_string())
        .unwrap_or_else(|| "unknown content".to_string());
    Err(ProbeError::NotAnImage(detected))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_HEADER: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0x0D];

    #[test]
    fn test_png_bytes_accepted() {
        assert_eq!(check_image_bytes(PNG_HEADER), Ok(()));
    }

    #[test]
    fn test_html_error_page_rejected() {
        let err = check_image_bytes(b"<html><body>504 Gateway Time-out</body></html>").unwrap_err();
        assert!(matches!(err, ProbeError::NotAnImage(_)));
    }

    #[test]
    fn test_empty_body_rejected() {
        assert_eq!(
            check_image_bytes(&[]),
            Err(ProbeError::NotAnImage("empty body".to_string()))
        );
    }

    #[tokio::test]
    async fn test_invalid_url_is_network_failure() {
        let probe = HttpImageProbe::new(Duration::from_secs(1)).unwrap();
        let err = probe.probe("not a url").await.unwrap_err();
        assert!(matches!(err, ProbeError::Network(_)));
    }
}
