use image::GrayImage;

use super::{OcrToken, RecognizerError, TextRecognizer};

/// Text reported to the caller when no OCR engine could be started.
pub const TESSERACT_NOT_FOUND: &str = "Tesseract not found.";

/// Aggregated OCR outcome for one image.
#[derive(Debug, Clone, PartialEq)]
pub struct TextExtractionResult {
    pub text: String,
    /// Mean confidence of kept words, rounded to two decimals. 0.0 if none.
    pub confidence: f64,
}

impl TextExtractionResult {
    pub fn empty() -> Self {
        Self {
            text: String::new(),
            confidence: 0.0,
        }
    }
}

/// Per-word acceptance rule.
#[derive(Debug, Clone, Copy)]
pub struct TokenFilter {
    /// Words must score strictly above this.
    pub confidence_floor: i32,
}

impl Default for TokenFilter {
    fn default() -> Self {
        Self {
            confidence_floor: 50,
        }
    }
}

/// Runs the recognizer and reduces its output to text plus mean confidence.
///
/// Engine failures never propagate: a missing engine yields the
/// `TESSERACT_NOT_FOUND` sentinel, any other failure yields empty text. Both
/// report zero confidence and are logged.
pub fn extract_text(
    recognizer: &dyn TextRecognizer,
    img: &GrayImage,
    filter: TokenFilter,
) -> TextExtractionResult {
    match recognizer.recognize(img) {
        Ok(tokens) => aggregate_tokens(&tokens, filter),
        Err(RecognizerError::EngineUnavailable(detail)) => {
            log::error!(
                "Tesseract Error: The Tesseract executable was not found ({}). \
                 Please install it or set tesseract_path in config.json.",
                detail
            );
            TextExtractionResult {
                text: TESSERACT_NOT_FOUND.to_string(),
                confidence: 0.0,
            }
        }
        Err(e @ RecognizerError::EngineError(_)) => {
            log::error!("An unexpected OCR error occurred: {}", e);
            TextExtractionResult::empty()
        }
    }
}

/// Filters tokens and joins the survivors in reading order.
pub fn aggregate_tokens(tokens: &[OcrToken], filter: TokenFilter) -> TextExtractionResult {
    let kept: Vec<(&str, i32)> = tokens
        .iter()
        .filter(|t| t.is_word() && t.confidence > filter.confidence_floor)
        .map(|t| (t.text.trim(), t.confidence))
        .filter(|(text, _)| !text.is_empty())
        .collect();

    log::debug!("OCR kept {} of {} words", kept.len(), tokens.len());

    if kept.is_empty() {
        return TextExtractionResult::empty();
    }

    let text = kept
        .iter()
        .map(|(text, _)| *text)
        .collect::<Vec<_>>()
        .join(" ");
    let sum: i64 = kept.iter().map(|(_, conf)| *conf as i64).sum();
    let mean = sum as f64 / kept.len() as f64;

    TextExtractionResult {
        text,
        confidence: round2(mean),
    }
}

/// Two decimals, halves to even (60.125 -> 60.12, 60.375 -> 60.38).
fn round2(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}
