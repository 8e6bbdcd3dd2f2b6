//! Client configuration: backend shape, base URL and transport limits.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

/// Absolute budget for one analysis exchange, in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Config file looked up in the working directory when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "hemoscan.toml";

/// Errors loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid base URL '{0}': {1}")]
    InvalidUrl(String, String),

    #[error("Unknown backend shape '{0}' (expected 'predict' or 'analyze-dicom')")]
    UnknownBackend(String),

    #[error("Invalid setting: {0}")]
    Invalid(String),
}

/// Which backend contract the client targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum BackendShape {
    /// Classifier backend: `POST /predict` with a `file` field, answers
    /// `{"class_label": ...}`. Health is `GET /`.
    #[default]
    Predict,
    /// Full analysis backend: `POST /api/analyze-dicom` with `image` and
    /// `patient_data` fields, answers an analysis envelope. Health is
    /// `GET /health`.
    AnalyzeDicom,
}

impl BackendShape {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Predict => "predict",
            Self::AnalyzeDicom => "analyze-dicom",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "predict" | "shape-a" | "a" => Some(Self::Predict),
            "analyze-dicom" | "dicom" | "shape-b" | "b" => Some(Self::AnalyzeDicom),
            _ => None,
        }
    }

    /// Path of the analysis endpoint.
    pub fn analyze_path(&self) -> &'static str {
        match self {
            Self::Predict => "/predict",
            Self::AnalyzeDicom => "/api/analyze-dicom",
        }
    }

    /// Path of the health endpoint.
    pub fn health_path(&self) -> &'static str {
        match self {
            Self::Predict => "/",
            Self::AnalyzeDicom => "/health",
        }
    }

    /// Multipart field carrying the image.
    pub fn image_field(&self) -> &'static str {
        match self {
            Self::Predict => "file",
            Self::AnalyzeDicom => "image",
        }
    }
}

impl std::fmt::Display for BackendShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Configuration for [`crate::AnalysisClient`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Backend contract to target
    #[serde(default)]
    pub backend: BackendShape,
    /// Base URL of the inference service
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Absolute budget for one exchange, from request start to full response
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Budget for establishing the connection
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Size of each streamed upload chunk (one progress event per chunk)
    #[serde(default = "default_upload_chunk_bytes")]
    pub upload_chunk_bytes: usize,
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_upload_chunk_bytes() -> usize {
    64 * 1024
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            backend: BackendShape::default(),
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            upload_chunk_bytes: default_upload_chunk_bytes(),
        }
    }
}

impl ClientConfig {
    /// Load configuration: defaults, then the TOML file (explicit path, or
    /// `./hemoscan.toml` if present), then environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let local = Path::new(DEFAULT_CONFIG_FILE);
                if local.exists() {
                    Self::from_file(local)?
                } else {
                    debug!("No config file found, using defaults");
                    Self::default()
                }
            }
        };

        let config = config.with_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML config file. Missing keys take their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Apply environment variable overrides.
    ///
    /// Supported env vars:
    /// - `HEMOSCAN_BACKEND`: "predict" (default) or "analyze-dicom"
    /// - `HEMOSCAN_API_URL`: base URL of the inference service
    /// - `HEMOSCAN_TIMEOUT_SECS`: absolute exchange budget
    /// - `HEMOSCAN_CONNECT_TIMEOUT_SECS`: connection budget
    /// - `HEMOSCAN_UPLOAD_CHUNK_BYTES`: upload chunk size
    pub fn with_env_overrides(mut self) -> Result<Self, ConfigError> {
        if let Ok(val) = std::env::var("HEMOSCAN_BACKEND") {
            self.backend = BackendShape::from_str(&val).ok_or(ConfigError::UnknownBackend(val))?;
        }
        if let Ok(val) = std::env::var("HEMOSCAN_API_URL") {
            self.base_url = val;
        }
        if let Ok(val) = std::env::var("HEMOSCAN_TIMEOUT_SECS") {
            if let Ok(n) = val.parse() {
                self.timeout_secs = n;
            }
        }
        if let Ok(val) = std::env::var("HEMOSCAN_CONNECT_TIMEOUT_SECS") {
            if let Ok(n) = val.parse() {
                self.connect_timeout_secs = n;
            }
        }
        if let Ok(val) = std::env::var("HEMOSCAN_UPLOAD_CHUNK_BYTES") {
            if let Ok(n) = val.parse() {
                self.upload_chunk_bytes = n;
            }
        }
        Ok(self)
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.to_string();
        self
    }

    pub fn with_backend(mut self, backend: BackendShape) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_upload_chunk_bytes(mut self, bytes: usize) -> Self {
        self.upload_chunk_bytes = bytes;
        self
    }

    /// Check the settings can produce a working client.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = url::Url::parse(&self.base_url)
            .map_err(|e| ConfigError::InvalidUrl(self.base_url.clone(), e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidUrl(
                self.base_url.clone(),
                format!("unsupported scheme '{}'", url.scheme()),
            ));
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::Invalid("timeout_secs must be positive".to_string()));
        }
        if self.connect_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "connect_timeout_secs must be positive".to_string(),
            ));
        }
        if self.upload_chunk_bytes == 0 {
            return Err(ConfigError::Invalid(
                "upload_chunk_bytes must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Join the base URL with an endpoint path, tolerating trailing slashes.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    /// Render as TOML for display.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}
