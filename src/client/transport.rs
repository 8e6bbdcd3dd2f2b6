//! HTTP plumbing shared by the backend adapters.

use std::time::Duration;

use bytes::Bytes;
use reqwest::multipart::Part;
use reqwest::{Body, Client, RequestBuilder, StatusCode};
use tracing::debug;

use super::cancel::CancellationToken;
use super::progress::{progress_stream, ProgressCallback, ProgressGate};
use crate::config::ClientConfig;
use crate::error::{AnalysisError, ClientResult};
use crate::models::ImageBlob;

/// Fully received response.
#[derive(Debug)]
pub(crate) struct RawResponse {
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub body: Bytes,
}

impl RawResponse {
    /// Fail with an HTTP error unless the status is 2xx.
    pub fn ensure_success(self) -> ClientResult<Self> {
        if self.status.is_success() {
            Ok(self)
        } else {
            Err(AnalysisError::from_status(self.status))
        }
    }

    pub fn is_html(&self) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|ct| ct.to_ascii_lowercase().contains("text/html"))
    }

    pub fn json(&self) -> ClientResult<serde_json::Value> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

/// HTTP client bound to one base URL with an absolute exchange budget.
pub(crate) struct Transport {
    client: Client,
    config: ClientConfig,
    timeout: Duration,
}

impl Transport {
    pub fn new(config: ClientConfig, timeout: Duration) -> ClientResult<Self> {
        // The absolute budget is enforced around the whole exchange in
        // `execute`, so the client only bounds connection setup.
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .pool_max_idle_per_host(2)
            .build()
            .map_err(|e| AnalysisError::ClientInit(e.to_string()))?;

        Ok(Self {
            client,
            config,
            timeout,
        })
    }

    pub fn url(&self, path: &str) -> String {
        self.config.endpoint(path)
    }

    pub fn post(&self, path: &str) -> RequestBuilder {
        self.client.post(self.url(path))
    }

    pub fn get(&self, path: &str) -> RequestBuilder {
        self.client.get(self.url(path))
    }

    /// Multipart part streaming the image in chunks, reporting progress
    /// while the gate stays open.
    pub fn image_part(
        &self,
        image: &ImageBlob,
        callback: Option<ProgressCallback>,
        gate: ProgressGate,
    ) -> ClientResult<Part> {
        let length = image.len() as u64;
        let body = Body::wrap_stream(progress_stream(
            image.data.clone(),
            self.config.upload_chunk_bytes,
            callback,
            gate,
        ));

        Part::stream_with_length(body, length)
            .file_name(image.file_name.clone())
            .mime_str(&image.content_type)
            .map_err(|e| {
                AnalysisError::Validation(format!(
                    "invalid content type '{}': {}",
                    image.content_type, e
                ))
            })
    }

    /// Send a request and read the full body, racing the exchange against
    /// the absolute budget and the optional cancellation token. Whichever
    /// finishes first decides the outcome; the others are dropped.
    pub async fn execute(
        &self,
        request: RequestBuilder,
        cancel: Option<&CancellationToken>,
    ) -> ClientResult<RawResponse> {
        let exchange = async {
            let response = request.send().await.map_err(AnalysisError::from_transport)?;
            let status = response.status();
            let content_type = response
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(|s| s.to_string());
            let body = response.bytes().await.map_err(AnalysisError::from_transport)?;
            debug!("Received HTTP {} ({} bytes)", status, body.len());
            Ok::<_, AnalysisError>(RawResponse {
                status,
                content_type,
                body,
            })
        };

        let cancelled = async {
            match cancel {
                Some(token) => token.cancelled().await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = cancelled => Err(AnalysisError::Cancelled),
            outcome = tokio::time::timeout(self.timeout, exchange) => match outcome {
                Ok(result) => result,
                Err(_) => Err(AnalysisError::Timeout {
                    after_ms: self.timeout.as_millis() as u64,
                }),
            },
        }
    }
}
