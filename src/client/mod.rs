//! Analysis client for hemorrhage detection backends.
//!
//! One [`AnalysisClient`] is built at startup from a [`ClientConfig`] and
//! passed by reference to whatever needs it. It holds no mutable state:
//! concurrent calls are independent and each performs exactly one round trip.
//! Retries are left to the caller.

mod backend;
mod cancel;
mod progress;
mod transport;

use std::io::Cursor;
use std::time::Duration;

use tracing::{info, warn};

pub use backend::{AnalysisBackend, DicomBackend, PredictBackend};
pub use cancel::CancellationToken;
pub use progress::ProgressCallback;

use crate::config::{BackendShape, ClientConfig};
use crate::error::{AnalysisError, ClientResult};
use crate::models::{
    AnalysisRequest, AnalysisResult, ConnectivityState, HealthStatus, ImageBlob,
};

/// Side length of the generated smoke-test image.
const SMOKE_TEST_SIZE: u32 = 100;

/// Client for one configured inference backend.
pub struct AnalysisClient {
    config: ClientConfig,
    backend: Box<dyn AnalysisBackend>,
}

impl AnalysisClient {
    /// Create a client using the configured absolute budget.
    pub fn new(config: ClientConfig) -> ClientResult<Self> {
        let timeout = Duration::from_secs(config.timeout_secs);
        Self::with_timeout(config, timeout)
    }

    /// Create a client with an explicit absolute budget per exchange.
    pub fn with_timeout(config: ClientConfig, timeout: Duration) -> ClientResult<Self> {
        config
            .validate()
            .map_err(|e| AnalysisError::ClientInit(e.to_string()))?;
        let backend = backend::for_config(config.clone(), timeout)?;
        info!(
            "Analysis client ready: backend={}, url={}",
            config.backend, config.base_url
        );
        Ok(Self { config, backend })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn shape(&self) -> BackendShape {
        self.backend.shape()
    }

    /// Upload an image and return the normalized result.
    ///
    /// `on_progress` is invoked with non-decreasing `loaded` while the body is
    /// streamed. The request is not validated here; see
    /// [`AnalysisRequest::validate`].
    pub async fn analyze(
        &self,
        request: &AnalysisRequest,
        on_progress: Option<ProgressCallback>,
    ) -> ClientResult<AnalysisResult> {
        self.backend.analyze(request, on_progress, None).await
    }

    /// Like [`analyze`](Self::analyze), resolving to
    /// [`AnalysisError::Cancelled`] as soon as `cancel` fires.
    pub async fn analyze_with(
        &self,
        request: &AnalysisRequest,
        on_progress: Option<ProgressCallback>,
        cancel: &CancellationToken,
    ) -> ClientResult<AnalysisResult> {
        if cancel.is_cancelled() {
            return Err(AnalysisError::Cancelled);
        }
        self.backend.analyze(request, on_progress, Some(cancel)).await
    }

    /// Probe the backend once. Safe to call repeatedly; nothing accumulates.
    pub async fn check_health(&self) -> ClientResult<HealthStatus> {
        self.backend.check_health().await
    }

    /// Health probe collapsed to a connectivity state.
    pub async fn connectivity(&self) -> ConnectivityState {
        match self.check_health().await {
            Ok(_) => ConnectivityState::Connected,
            Err(e) => {
                warn!("Backend unavailable: {}", e);
                ConnectivityState::Disconnected
            }
        }
    }

    /// End-to-end check: analyze a blank 100x100 PNG and report whether the
    /// backend produced a result.
    pub async fn smoke_test(&self) -> bool {
        let image = match blank_png(SMOKE_TEST_SIZE) {
            Ok(image) => image,
            Err(e) => {
                warn!("Could not build smoke-test image: {}", e);
                return false;
            }
        };

        match self.analyze(&AnalysisRequest::new(image), None).await {
            Ok(result) => {
                info!("Smoke test passed: type={}", result.hemorrhage_type);
                true
            }
            Err(e) => {
                warn!("Smoke test failed: {}", e);
                false
            }
        }
    }
}

/// Encode a black square as PNG.
fn blank_png(size: u32) -> Result<ImageBlob, image::ImageError> {
    let canvas = image::GrayImage::new(size, size);
    let mut encoded = Cursor::new(Vec::new());
    canvas.write_to(&mut encoded, image::ImageFormat::Png)?;
    Ok(ImageBlob::new(encoded.into_inner(), "image/png", "test.png"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_png_is_png() {
        let image = blank_png(SMOKE_TEST_SIZE).unwrap();
        assert_eq!(image.content_type, "image/png");
        assert_eq!(&image.data[..8], b"\x89PNG\r\n\x1a\n");
    }

    #[test]
    fn test_rejects_invalid_config() {
        let config = ClientConfig::default().with_base_url("nowhere");
        assert!(matches!(
            AnalysisClient::new(config),
            Err(AnalysisError::ClientInit(_))
        ));
    }

    #[tokio::test]
    async fn test_selects_backend_from_config() {
        let client = AnalysisClient::new(ClientConfig::default()).unwrap();
        assert_eq!(client.shape(), BackendShape::Predict);

        let config = ClientConfig::default().with_backend(BackendShape::AnalyzeDicom);
        let client = AnalysisClient::new(config).unwrap();
        assert_eq!(client.shape(), BackendShape::AnalyzeDicom);
    }

    #[tokio::test]
    async fn test_precancelled_token_short_circuits() {
        let client = AnalysisClient::new(ClientConfig::default()).unwrap();
        let token = CancellationToken::new();
        token.cancel();

        let image = ImageBlob::new(vec![1u8; 8], "image/png", "scan.png");
        let err = client
            .analyze_with(&AnalysisRequest::new(image), None, &token)
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::Cancelled));
    }
}
