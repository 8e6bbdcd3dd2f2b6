//! hemoscan - client for CT intracranial hemorrhage detection backends.
//!
//! Uploads a scan to an external inference service, reports upload progress,
//! and normalizes whichever response shape the backend returns into a single
//! canonical [`AnalysisResult`].

// Model types use `from_str` methods that return Option<Self>,
// not Result<Self, Error> as std::str::FromStr requires.
#![allow(clippy::should_implement_trait)]

pub mod classify;
pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod models;

pub use client::{AnalysisClient, CancellationToken, ProgressCallback};
pub use config::{BackendShape, ClientConfig};
pub use error::{AnalysisError, ClientResult, ErrorKind};
pub use models::{
    AnalysisRequest, AnalysisResult, BoundingBox, ConnectionMonitor, ConnectivityState,
    HealthStatus, HemorrhageType, ImageBlob, PatientMetadata, UploadProgress, Urgency,
};
