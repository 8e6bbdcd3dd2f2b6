//! Backend adapters, one per inference service contract.
//!
//! - `PredictBackend`: classifier service (`POST /predict`, field `file`)
//! - `DicomBackend`: analysis service (`POST /api/analyze-dicom`, fields
//!   `image` and `patient_data`)
//!
//! Both normalize through [`crate::classify::normalize_payload`], which still
//! recognizes either payload shape as a compatibility fallback.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::multipart::Form;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::cancel::CancellationToken;
use super::progress::{ProgressCallback, ProgressGate};
use super::transport::{RawResponse, Transport};
use crate::classify::{normalize_payload, EstimateSeed};
use crate::config::{BackendShape, ClientConfig};
use crate::error::{AnalysisError, ClientResult};
use crate::models::{AnalysisRequest, AnalysisResult, HealthStatus};

/// Common interface of every backend contract.
#[async_trait]
pub trait AnalysisBackend: Send + Sync {
    /// Which contract this adapter speaks.
    fn shape(&self) -> BackendShape;

    /// Upload one image and normalize the answer.
    async fn analyze(
        &self,
        request: &AnalysisRequest,
        progress: Option<ProgressCallback>,
        cancel: Option<&CancellationToken>,
    ) -> ClientResult<AnalysisResult>;

    /// Probe the service once.
    async fn check_health(&self) -> ClientResult<HealthStatus>;
}

/// Build the adapter selected by configuration.
pub(crate) fn for_config(
    config: ClientConfig,
    timeout: Duration,
) -> ClientResult<Box<dyn AnalysisBackend>> {
    let shape = config.backend;
    let transport = Transport::new(config, timeout)?;
    Ok(match shape {
        BackendShape::Predict => Box::new(PredictBackend { transport }),
        BackendShape::AnalyzeDicom => Box::new(DicomBackend { transport }),
    })
}

/// Run one upload: send the form, measure wall-clock time, check status,
/// parse and normalize. The progress gate closes on every exit path.
async fn run_analysis(
    transport: &Transport,
    shape: BackendShape,
    request: &AnalysisRequest,
    build_form: impl FnOnce(ProgressGate) -> ClientResult<Form>,
    cancel: Option<&CancellationToken>,
) -> ClientResult<AnalysisResult> {
    let started = Instant::now();
    let gate = ProgressGate::new();
    let _guard = gate.close_on_drop();

    let seed = EstimateSeed::from_image(&request.image.data);
    let form = build_form(gate)?;
    let path = shape.analyze_path();

    debug!(
        "Uploading {} bytes ({}) to {}",
        request.image.len(),
        request.image.content_type,
        transport.url(path)
    );

    let outcome = transport
        .execute(transport.post(path).multipart(form), cancel)
        .await;
    let elapsed_ms = started.elapsed().as_millis() as u64;

    let response = match outcome.and_then(RawResponse::ensure_success) {
        Ok(response) => response,
        Err(e) => {
            warn!("Analysis via {} failed after {}ms: {}", shape, elapsed_ms, e);
            return Err(e);
        }
    };

    let body: Value = response.json()?;
    let result = normalize_payload(body, elapsed_ms, &seed);
    match &result {
        Ok(analysis) => info!(
            "Analysis complete in {}ms: type={}, urgency={}",
            elapsed_ms, analysis.hemorrhage_type, analysis.urgency
        ),
        Err(AnalysisError::BackendReported(msg)) => warn!("Backend reported error: {}", msg),
        Err(e) => warn!("Could not normalize backend response: {}", e),
    }
    result
}

/// Classifier backend answering `{"class_label": ...}`.
pub struct PredictBackend {
    transport: Transport,
}

#[async_trait]
impl AnalysisBackend for PredictBackend {
    fn shape(&self) -> BackendShape {
        BackendShape::Predict
    }

    async fn analyze(
        &self,
        request: &AnalysisRequest,
        progress: Option<ProgressCallback>,
        cancel: Option<&CancellationToken>,
    ) -> ClientResult<AnalysisResult> {
        let shape = self.shape();
        run_analysis(
            &self.transport,
            shape,
            request,
            |gate| {
                let part = self.transport.image_part(&request.image, progress, gate)?;
                Ok(Form::new().part(shape.image_field(), part))
            },
            cancel,
        )
        .await
    }

    /// The classifier serves an HTML page at `/`; any 2xx HTML body means
    /// the server is alive. JSON bodies are accepted too.
    async fn check_health(&self) -> ClientResult<HealthStatus> {
        let path = self.shape().health_path();
        debug!("Health check: {}", self.transport.url(path));

        let response = self
            .transport
            .execute(self.transport.get(path), None)
            .await?
            .ensure_success()?;

        if response.is_html() {
            return Ok(HealthStatus {
                status: "connected".to_string(),
                message: Some("Inference server is running".to_string()),
                version: None,
            });
        }

        let body = response.json()?;
        let status = body
            .get("status")
            .and_then(Value::as_str)
            .unwrap_or("connected")
            .to_string();
        let message = body
            .get("message")
            .and_then(Value::as_str)
            .map(|s| s.to_string());
        let version = body
            .get("version")
            .and_then(Value::as_str)
            .map(|s| s.to_string());

        info!("Health check OK: status={}", status);
        Ok(HealthStatus {
            status,
            message,
            version,
        })
    }
}

/// Analysis backend answering a full envelope.
pub struct DicomBackend {
    transport: Transport,
}

#[async_trait]
impl AnalysisBackend for DicomBackend {
    fn shape(&self) -> BackendShape {
        BackendShape::AnalyzeDicom
    }

    async fn analyze(
        &self,
        request: &AnalysisRequest,
        progress: Option<ProgressCallback>,
        cancel: Option<&CancellationToken>,
    ) -> ClientResult<AnalysisResult> {
        let shape = self.shape();
        let patient_data = request
            .patient
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        run_analysis(
            &self.transport,
            shape,
            request,
            |gate| {
                let part = self.transport.image_part(&request.image, progress, gate)?;
                let mut form = Form::new().part(shape.image_field(), part);
                if let Some(patient_data) = patient_data {
                    form = form.text("patient_data", patient_data);
                }
                Ok(form)
            },
            cancel,
        )
        .await
    }

    /// Expects `{"status": ..., "version": ...}`.
    async fn check_health(&self) -> ClientResult<HealthStatus> {
        let path = self.shape().health_path();
        debug!("Health check: {}", self.transport.url(path));

        let response = self
            .transport
            .execute(self.transport.get(path), None)
            .await?
            .ensure_success()?;

        let health: HealthStatus = serde_json::from_slice(&response.body)?;
        info!(
            "Health check OK: status={}, version={}",
            health.status,
            health.version.as_deref().unwrap_or("unknown")
        );
        Ok(health)
    }
}
