//! Data models for analysis requests, canonical results and connectivity.

mod analysis;
mod connectivity;
mod progress;
mod request;

pub use analysis::{AnalysisResult, BoundingBox, HemorrhageType, Urgency};
pub use connectivity::{ConnectionMonitor, ConnectivityState, HealthStatus};
pub use progress::UploadProgress;
pub use request::{AnalysisRequest, ImageBlob, PatientMetadata};
