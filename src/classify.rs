//! Mapping raw backend payloads onto the canonical [`AnalysisResult`].
//!
//! Two payload shapes exist in the wild:
//! - class-label payloads (`{"class_label": "Subdural"}`) from the `/predict`
//!   classifier, which carry only the predicted label
//! - analysis envelopes (`{"success": true, "analysis": {...}}` or the bare
//!   analysis object) from `/api/analyze-dicom`, which are already normalized
//!
//! Class labels go through three fixed lookup tables: label to subtype,
//! subtype to urgency, subtype to anatomical location.

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::warn;

use crate::error::AnalysisError;
use crate::models::{AnalysisResult, BoundingBox, HemorrhageType, Urgency};

/// Label the classifier emits for a clear scan.
pub const NO_HEMORRHAGE_LABEL: &str = "No hemorrhage";

/// Location reported when no hemorrhage was found.
pub const NO_LOCATION: &str = "N/A";

/// Location reported for subtypes missing from the location table.
pub const UNSPECIFIED_LOCATION: &str = "Unspecified";

/// Map a classifier label to its canonical subtype. Unknown labels pass
/// through, and still resolve to a subtype when they already are a canonical
/// name.
pub fn label_to_type(label: &str) -> HemorrhageType {
    match label {
        NO_HEMORRHAGE_LABEL => HemorrhageType::None,
        "Epidural" => HemorrhageType::Epidural,
        "Intraparenchymal" => HemorrhageType::Intracerebral,
        "Intraventricular" => HemorrhageType::Intraventricular,
        "Subarachnoid" => HemorrhageType::Subarachnoid,
        "Subdural" => HemorrhageType::Subdural,
        other => HemorrhageType::from_canonical(other),
    }
}

/// Urgency for a subtype. Unmapped subtypes are treated as medium.
pub fn urgency_for(hemorrhage_type: &HemorrhageType) -> Urgency {
    match hemorrhage_type {
        HemorrhageType::Epidural | HemorrhageType::Subdural | HemorrhageType::Subarachnoid => {
            Urgency::High
        }
        HemorrhageType::Intracerebral | HemorrhageType::Intraventricular => Urgency::Medium,
        HemorrhageType::None => Urgency::Low,
        HemorrhageType::Unrecognized(_) => Urgency::Medium,
    }
}

/// Typical anatomical region for a subtype.
pub fn location_for(hemorrhage_type: &HemorrhageType) -> &'static str {
    match hemorrhage_type {
        HemorrhageType::Epidural => "Temporal region",
        HemorrhageType::Subdural => "Frontoparietal",
        HemorrhageType::Subarachnoid => "Basal cisterns",
        HemorrhageType::Intracerebral => "Basal ganglia",
        HemorrhageType::Intraventricular => "Lateral ventricles",
        HemorrhageType::None => NO_LOCATION,
        HemorrhageType::Unrecognized(_) => UNSPECIFIED_LOCATION,
    }
}

/// Seed for the placeholder confidence/volume of class-label payloads.
///
/// Derived from a BLAKE3 digest of the uploaded image, so the same scan
/// always gets the same placeholder values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EstimateSeed {
    confidence: u64,
    volume: u64,
}

impl EstimateSeed {
    pub fn from_image(data: &[u8]) -> Self {
        let digest = blake3::hash(data);
        let bytes = digest.as_bytes();
        let mut confidence = [0u8; 8];
        let mut volume = [0u8; 8];
        confidence.copy_from_slice(&bytes[0..8]);
        volume.copy_from_slice(&bytes[8..16]);
        Self {
            confidence: u64::from_le_bytes(confidence),
            volume: u64::from_le_bytes(volume),
        }
    }

    #[cfg(test)]
    pub(crate) fn from_raw(confidence: u64, volume: u64) -> Self {
        Self { confidence, volume }
    }
}

/// Map 64 random bits to [0, 1) using the top 53 bits.
fn unit_interval(bits: u64) -> f64 {
    (bits >> 11) as f64 / (1u64 << 53) as f64
}

/// Placeholder confidence. Not a measurement: the classifier backend does
/// not report one. Detected: [0.75, 0.99]. Clear: [0.85, 0.99].
pub fn placeholder_confidence(detected: bool, seed: &EstimateSeed) -> f64 {
    let unit = unit_interval(seed.confidence);
    if detected {
        0.75 + unit * 0.24
    } else {
        0.85 + unit * 0.14
    }
}

/// Placeholder volume in mL with one decimal, "0.0" when clear.
pub fn placeholder_volume(detected: bool, seed: &EstimateSeed) -> String {
    if detected {
        format!("{:.1}", 5.0 + unit_interval(seed.volume) * 30.0)
    } else {
        "0.0".to_string()
    }
}

/// Build a canonical result from a classifier label.
pub fn from_class_label(label: &str, processing_time_ms: u64, seed: &EstimateSeed) -> AnalysisResult {
    let detected = label != NO_HEMORRHAGE_LABEL;
    let hemorrhage_type = label_to_type(label);
    let urgency = urgency_for(&hemorrhage_type);
    let location = location_for(&hemorrhage_type).to_string();

    AnalysisResult {
        hemorrhage_detected: detected,
        hemorrhage_type,
        confidence: placeholder_confidence(detected, seed),
        location,
        volume: placeholder_volume(detected, seed),
        urgency,
        bounding_boxes: None,
        processing_time_ms,
        raw_label: Some(label.to_string()),
        measurements_estimated: true,
    }
}

/// Pre-normalized analysis as sent by envelope backends.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EnvelopeAnalysis {
    hemorrhage_detected: bool,
    #[serde(rename = "type")]
    hemorrhage_type: HemorrhageType,
    confidence: f64,
    location: String,
    #[serde(deserialize_with = "string_or_number")]
    volume: String,
    urgency: Urgency,
    #[serde(default)]
    bounding_boxes: Option<Vec<BoundingBox>>,
    #[serde(default)]
    raw_prediction: Option<String>,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected volume as string or number, got {}",
            other
        ))),
    }
}

/// Copy an analysis envelope through. Any `processingTime` it carries is
/// ignored in favour of the client-side measurement.
pub fn from_envelope(body: Value, processing_time_ms: u64) -> Result<AnalysisResult, AnalysisError> {
    let analysis = match body {
        Value::Object(mut obj) => match obj.remove("analysis") {
            Some(inner @ Value::Object(_)) => inner,
            Some(_) => {
                return Err(AnalysisError::Parse(
                    "'analysis' field is not an object".to_string(),
                ))
            }
            None => Value::Object(obj),
        },
        _ => {
            return Err(AnalysisError::Parse(
                "response is not a JSON object".to_string(),
            ))
        }
    };

    let envelope: EnvelopeAnalysis = serde_json::from_value(analysis)?;

    if envelope.hemorrhage_detected == envelope.hemorrhage_type.is_none() {
        warn!(
            "Backend envelope is inconsistent: hemorrhageDetected={} but type={}",
            envelope.hemorrhage_detected, envelope.hemorrhage_type
        );
    }

    Ok(AnalysisResult {
        hemorrhage_detected: envelope.hemorrhage_detected,
        hemorrhage_type: envelope.hemorrhage_type,
        confidence: envelope.confidence,
        location: envelope.location,
        volume: envelope.volume,
        urgency: envelope.urgency,
        bounding_boxes: envelope.bounding_boxes,
        processing_time_ms,
        raw_label: envelope.raw_prediction,
        measurements_estimated: false,
    })
}

fn is_set(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Normalize any parsed backend body.
///
/// A non-empty top-level `error` wins over everything else; `null`, `false`,
/// `0` and `""` count as no error. Bodies with a
/// `class_label` are treated as classifier output, anything else as an
/// analysis envelope.
pub fn normalize_payload(
    body: Value,
    processing_time_ms: u64,
    seed: &EstimateSeed,
) -> Result<AnalysisResult, AnalysisError> {
    if let Some(error) = body.get("error").filter(|e| is_set(e)) {
        let message = match error {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        return Err(AnalysisError::BackendReported(message));
    }

    if let Some(label) = body.get("class_label") {
        let label = label.as_str().ok_or_else(|| {
            AnalysisError::Parse(format!("class_label is not a string: {}", label))
        })?;
        return Ok(from_class_label(label, processing_time_ms, seed));
    }

    from_envelope(body, processing_time_ms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    const SEEDS: [(u64, u64); 4] = [(0, 0), (u64::MAX, u64::MAX), (1 << 63, 12345), (42, 1 << 40)];

    #[test]
    fn test_type_table() {
        assert_eq!(label_to_type("No hemorrhage"), HemorrhageType::None);
        assert_eq!(label_to_type("Intraparenchymal"), HemorrhageType::Intracerebral);
        assert_eq!(label_to_type("Subdural"), HemorrhageType::Subdural);
        assert_eq!(
            label_to_type("Foo"),
            HemorrhageType::Unrecognized("Foo".to_string())
        );
    }

    #[test]
    fn test_canonical_name_labels_use_tables() {
        let seed = EstimateSeed::from_image(b"scan");

        let none = normalize_payload(json!({"class_label": "None"}), 0, &seed).unwrap();
        assert_eq!(none.hemorrhage_type, HemorrhageType::None);
        assert_eq!(none.urgency, Urgency::Low);
        assert_eq!(none.location, "N/A");
        assert_eq!(none.raw_label.as_deref(), Some("None"));

        let ich = normalize_payload(json!({"class_label": "Intracerebral"}), 0, &seed).unwrap();
        assert_eq!(ich.hemorrhage_type, HemorrhageType::Intracerebral);
        assert_eq!(ich.urgency, Urgency::Medium);
        assert_eq!(ich.location, "Basal ganglia");

        for result in [none, ich] {
            let wire = serde_json::to_string(&result).unwrap();
            let back: AnalysisResult = serde_json::from_str(&wire).unwrap();
            assert_eq!(back, result);
        }
    }

    #[test]
    fn test_urgency_and_location_tables() {
        let cases = [
            (HemorrhageType::Epidural, Urgency::High, "Temporal region"),
            (HemorrhageType::Subdural, Urgency::High, "Frontoparietal"),
            (HemorrhageType::Subarachnoid, Urgency::High, "Basal cisterns"),
            (HemorrhageType::Intracerebral, Urgency::Medium, "Basal ganglia"),
            (HemorrhageType::Intraventricular, Urgency::Medium, "Lateral ventricles"),
            (HemorrhageType::None, Urgency::Low, "N/A"),
            (
                HemorrhageType::Unrecognized("Foo".into()),
                Urgency::Medium,
                "Unspecified",
            ),
        ];
        for (t, urgency, location) in cases {
            assert_eq!(urgency_for(&t), urgency, "urgency for {}", t);
            assert_eq!(location_for(&t), location, "location for {}", t);
        }
    }

    #[test]
    fn test_placeholder_bounds() {
        for (c, v) in SEEDS {
            let seed = EstimateSeed::from_raw(c, v);

            let detected = placeholder_confidence(true, &seed);
            assert!((0.75..=0.99).contains(&detected), "{}", detected);
            let clear = placeholder_confidence(false, &seed);
            assert!((0.85..=0.99).contains(&clear), "{}", clear);

            let volume: f64 = placeholder_volume(true, &seed).parse().unwrap();
            assert!(volume > 0.0 && volume <= 35.0, "{}", volume);
            assert_eq!(placeholder_volume(false, &seed), "0.0");
        }
    }

    #[test]
    fn test_seed_is_deterministic() {
        let a = EstimateSeed::from_image(b"same scan");
        let b = EstimateSeed::from_image(b"same scan");
        assert_eq!(a, b);
        assert_ne!(a, EstimateSeed::from_image(b"other scan"));
    }

    #[test]
    fn test_class_label_subdural() {
        let seed = EstimateSeed::from_image(b"scan");
        let result = normalize_payload(json!({"class_label": "Subdural"}), 17, &seed).unwrap();
        assert!(result.hemorrhage_detected);
        assert_eq!(result.hemorrhage_type, HemorrhageType::Subdural);
        assert_eq!(result.urgency, Urgency::High);
        assert_eq!(result.location, "Frontoparietal");
        assert_eq!(result.raw_label.as_deref(), Some("Subdural"));
        assert_eq!(result.processing_time_ms, 17);
        assert!(result.measurements_estimated);
    }

    #[test]
    fn test_class_label_clear() {
        let seed = EstimateSeed::from_image(b"scan");
        let result = normalize_payload(json!({"class_label": "No hemorrhage"}), 5, &seed).unwrap();
        assert!(!result.hemorrhage_detected);
        assert_eq!(result.hemorrhage_type, HemorrhageType::None);
        assert_eq!(result.urgency, Urgency::Low);
        assert_eq!(result.location, "N/A");
        assert_eq!(result.volume, "0.0");
    }

    #[test]
    fn test_class_label_not_string() {
        let seed = EstimateSeed::from_image(b"scan");
        let err = normalize_payload(json!({"class_label": 3}), 0, &seed).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parse);
    }

    #[test]
    fn test_error_field_wins() {
        let seed = EstimateSeed::from_image(b"scan");
        let err = normalize_payload(
            json!({"error": "Unsupported or corrupted image file", "class_label": "Subdural"}),
            0,
            &seed,
        )
        .unwrap_err();
        match err {
            AnalysisError::BackendReported(msg) => {
                assert_eq!(msg, "Unsupported or corrupted image file")
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_null_error_is_ignored() {
        let seed = EstimateSeed::from_image(b"scan");
        let result = normalize_payload(json!({"error": null, "class_label": "Epidural"}), 0, &seed);
        assert!(result.is_ok());
    }

    #[test]
    fn test_empty_error_is_ignored() {
        let seed = EstimateSeed::from_image(b"scan");
        for error in [json!(""), json!(false), json!(0)] {
            let result = normalize_payload(
                json!({"error": error, "class_label": "Subdural"}),
                0,
                &seed,
            )
            .unwrap();
            assert_eq!(result.hemorrhage_type, HemorrhageType::Subdural);
        }

        let err = normalize_payload(json!({"error": {"code": 3}}), 0, &seed).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BackendReported);
    }

    #[test]
    fn test_flat_envelope_with_numeric_volume() {
        let body = json!({
            "hemorrhageDetected": true,
            "type": "Epidural",
            "confidence": 0.91,
            "location": "Temporal region",
            "volume": 12.5,
            "urgency": "High",
            "processingTime": 999999
        });
        let result = from_envelope(body, 30).unwrap();
        assert_eq!(result.volume, "12.5");
        assert_eq!(result.processing_time_ms, 30);
        assert!(!result.measurements_estimated);
        assert!(result.bounding_boxes.is_none());
    }

    #[test]
    fn test_envelope_missing_fields() {
        let err = from_envelope(json!({"success": true, "analysis": {"type": "None"}}), 0)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parse);

        let err = from_envelope(json!(["not", "an", "object"]), 0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parse);
    }
}
