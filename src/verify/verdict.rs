use serde::{Serialize, Serializer};

use super::fingerprint::Fingerprint;
use super::sharpness::SharpnessResult;
use crate::ocr::TextExtractionResult;

/// Final decision record for one image, in the field order callers expect.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisVerdict {
    #[serde(rename = "blurry")]
    pub is_blurry: Option<bool>,
    #[serde(rename = "duplicate_hash", serialize_with = "fingerprint_or_empty")]
    pub fingerprint: Option<Fingerprint>,
    #[serde(rename = "ocrText")]
    pub text: String,
    pub confidence: f64,
    #[serde(rename = "valid")]
    pub is_valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn fingerprint_or_empty<S: Serializer>(
    fingerprint: &Option<Fingerprint>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match fingerprint {
        Some(fp) => fp.serialize(serializer),
        None => serializer.serialize_str(""),
    }
}

impl AnalysisVerdict {
    /// Joins the stage results. Valid means sharp and legible.
    pub fn compose(
        sharpness: &SharpnessResult,
        fingerprint: Option<Fingerprint>,
        text: TextExtractionResult,
        validity_threshold: f64,
    ) -> Self {
        let is_valid = !sharpness.is_blurry && text.confidence > validity_threshold;
        Self {
            is_blurry: Some(sharpness.is_blurry),
            fingerprint,
            text: text.text,
            confidence: text.confidence,
            is_valid,
            error: None,
        }
    }

    /// Verdict for an image that could not be loaded.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            is_blurry: None,
            fingerprint: None,
            text: String::new(),
            confidence: 0.0,
            is_valid: false,
            error: Some(message.into()),
        }
    }

    /// Pretty JSON with 4-space indentation.
    pub fn to_pretty_json(&self) -> serde_json::Result<String> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.serialize(&mut ser)?;
        // serde_json only ever writes valid UTF-8
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    pub fn to_compact_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sharp() -> SharpnessResult {
        SharpnessResult {
            is_blurry: false,
            variance_score: 250.0,
            threshold: 100.0,
        }
    }

    fn blurry() -> SharpnessResult {
        SharpnessResult {
            is_blurry: true,
            variance_score: 12.5,
            threshold: 100.0,
        }
    }

    fn text(text: &str, confidence: f64) -> TextExtractionResult {
        TextExtractionResult {
            text: text.to_string(),
            confidence,
        }
    }

    #[test]
    fn test_validity_rule() {
        assert!(AnalysisVerdict::compose(&sharp(), None, text("x", 50.01), 50.0).is_valid);
        assert!(!AnalysisVerdict::compose(&sharp(), None, text("x", 50.0), 50.0).is_valid);
        assert!(!AnalysisVerdict::compose(&blurry(), None, text("x", 99.0), 50.0).is_valid);
        assert!(!AnalysisVerdict::compose(&sharp(), None, text("", 0.0), 50.0).is_valid);
    }

    #[test]
    fn test_sale_scenario_json() {
        let verdict = AnalysisVerdict::compose(
            &sharp(),
            Some(Fingerprint::from_bits(0x0f1e2d3c4b5a6978)),
            text("SALE 50% OFF", 91.67),
            50.0,
        );
        assert!(verdict.is_valid);

        let json = verdict.to_pretty_json().unwrap();
        let expected = r#"{
    "blurry": false,
    "duplicate_hash": "0f1e2d3c4b5a6978",
    "ocrText": "SALE 50% OFF",
    "confidence": 91.67,
    "valid": true
}"#;
        assert_eq!(json, expected);
    }

    #[test]
    fn test_integral_confidence_is_float() {
        let verdict = AnalysisVerdict::compose(&blurry(), None, text("", 0.0), 50.0);
        let json = verdict.to_compact_json().unwrap();
        assert_eq!(
            json,
            r#"{"blurry":true,"duplicate_hash":"","ocrText":"","confidence":0.0,"valid":false}"#
        );
    }

    #[test]
    fn test_failed_shape() {
        let verdict = AnalysisVerdict::failed("Image not found or could not be read at path: x.png");
        assert!(verdict.error.is_some());

        let value: serde_json::Value =
            serde_json::from_str(&verdict.to_compact_json().unwrap()).unwrap();
        assert!(value["blurry"].is_null());
        assert_eq!(value["duplicate_hash"], "");
        assert_eq!(value["ocrText"], "");
        assert_eq!(value["confidence"].as_f64(), Some(0.0));
        assert_eq!(value["valid"], false);
        assert!(value["error"].as_str().unwrap().contains("x.png"));

        let json = verdict.to_compact_json().unwrap();
        let positions: Vec<usize> = ["blurry", "duplicate_hash", "ocrText", "confidence", "valid", "error"]
            .iter()
            .map(|key| json.find(&format!("\"{key}\":")).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]), "{json}");
    }
}
