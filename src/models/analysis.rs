//! Canonical analysis result returned to every caller, whichever backend served it.

use serde::{Deserialize, Serialize};

/// Hemorrhage subtype as reported to callers.
///
/// Labels the client does not recognize are kept verbatim in `Unrecognized`
/// so nothing the model said is lost.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum HemorrhageType {
    None,
    Epidural,
    Subdural,
    Subarachnoid,
    Intracerebral,
    Intraventricular,
    Unrecognized(String),
}

impl HemorrhageType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::None => "None",
            Self::Epidural => "Epidural",
            Self::Subdural => "Subdural",
            Self::Subarachnoid => "Subarachnoid",
            Self::Intracerebral => "Intracerebral",
            Self::Intraventricular => "Intraventricular",
            Self::Unrecognized(label) => label,
        }
    }

    /// Parse a canonical type name. Anything else becomes `Unrecognized`.
    pub fn from_canonical(s: &str) -> Self {
        match s {
            "None" => Self::None,
            "Epidural" => Self::Epidural,
            "Subdural" => Self::Subdural,
            "Subarachnoid" => Self::Subarachnoid,
            "Intracerebral" => Self::Intracerebral,
            "Intraventricular" => Self::Intraventricular,
            other => Self::Unrecognized(other.to_string()),
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}

impl From<String> for HemorrhageType {
    fn from(s: String) -> Self {
        Self::from_canonical(&s)
    }
}

impl From<HemorrhageType> for String {
    fn from(t: HemorrhageType) -> Self {
        match t {
            HemorrhageType::Unrecognized(label) => label,
            other => other.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for HemorrhageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Clinical urgency of a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Urgency {
    Low,
    Medium,
    High,
}

impl Urgency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
        }
    }
}

impl std::fmt::Display for Urgency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Region of interest reported by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    /// Detection confidence (0.0 - 1.0)
    pub confidence: f64,
}

/// Normalized result of one analysis call.
///
/// Constructed fresh per successful call and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub hemorrhage_detected: bool,
    #[serde(rename = "type")]
    pub hemorrhage_type: HemorrhageType,
    /// Model confidence (0.0 - 1.0)
    pub confidence: f64,
    /// Anatomical region, "N/A" when nothing was found
    pub location: String,
    /// Estimated volume in mL as a decimal string
    pub volume: String,
    pub urgency: Urgency,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounding_boxes: Option<Vec<BoundingBox>>,
    /// Wall-clock milliseconds for the call, always measured client-side
    #[serde(rename = "processingTime")]
    pub processing_time_ms: u64,
    /// Label exactly as the backend returned it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_label: Option<String>,
    /// True when confidence and volume are placeholder estimates rather than
    /// values measured by the backend
    #[serde(default)]
    pub measurements_estimated: bool,
}

impl AnalysisResult {
    /// Volume as a number of millilitres, if the string parses.
    pub fn volume_ml(&self) -> Option<f64> {
        self.volume.parse().ok()
    }
}
