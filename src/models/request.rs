//! Analysis request input owned by the caller.

use std::path::Path;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;

/// Oldest plausible patient age accepted by validation.
const MAX_PATIENT_AGE: u32 = 150;

/// Image payload with its content type.
///
/// Cloning is cheap (the bytes are reference counted), so the client can
/// stream a view of the payload while the caller keeps its own handle.
#[derive(Debug, Clone)]
pub struct ImageBlob {
    pub data: Bytes,
    pub content_type: String,
    pub file_name: String,
}

impl ImageBlob {
    pub fn new(
        data: impl Into<Bytes>,
        content_type: impl Into<String>,
        file_name: impl Into<String>,
    ) -> Self {
        Self {
            data: data.into(),
            content_type: content_type.into(),
            file_name: file_name.into(),
        }
    }

    /// Read an image from disk, guessing its content type from the extension.
    pub async fn from_file(path: &Path) -> std::io::Result<Self> {
        let data = tokio::fs::read(path).await?;
        let content_type = mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        Ok(Self::new(data, content_type, file_name))
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Whether the content type is something the inference backends read.
    pub fn is_supported_type(&self) -> bool {
        let ct = self.content_type.to_ascii_lowercase();
        ct.starts_with("image/") || ct == "application/dicom"
    }
}

/// Optional patient context sent alongside the image.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatientMetadata {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    #[serde(default)]
    pub gender: String,
    #[serde(default)]
    pub symptoms: String,
}

/// One analysis request.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub image: ImageBlob,
    pub patient: Option<PatientMetadata>,
}

impl AnalysisRequest {
    pub fn new(image: ImageBlob) -> Self {
        Self {
            image,
            patient: None,
        }
    }

    pub fn with_patient(mut self, patient: PatientMetadata) -> Self {
        self.patient = Some(patient);
        self
    }

    /// Check the request before handing it to the client.
    ///
    /// The client itself never calls this; violations reaching the network
    /// simply fail there.
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if self.image.is_empty() {
            return Err(AnalysisError::Validation("image is empty".to_string()));
        }
        if !self.image.is_supported_type() {
            return Err(AnalysisError::Validation(format!(
                "unsupported content type '{}', expected an image or DICOM file",
                self.image.content_type
            )));
        }
        if let Some(age) = self.patient.as_ref().and_then(|p| p.age) {
            if age > MAX_PATIENT_AGE {
                return Err(AnalysisError::Validation(format!(
                    "patient age {} is out of range",
                    age
                )));
            }
        }
        Ok(())
    }
}
