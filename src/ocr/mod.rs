pub mod engine;
pub mod extract;
pub mod setup;

pub use engine::TesseractRecognizer;
pub use extract::{extract_text, TextExtractionResult, TokenFilter, TESSERACT_NOT_FOUND};

use image::GrayImage;
use thiserror::Error;

/// A single word recognized by an OCR engine, in reading order.
#[derive(Debug, Clone, PartialEq)]
pub struct OcrToken {
    pub text: String,
    /// 0-100. Negative values mark non-word regions.
    pub confidence: i32,
}

impl OcrToken {
    pub fn new(text: impl Into<String>, confidence: i32) -> Self {
        Self {
            text: text.into(),
            confidence,
        }
    }

    pub fn is_word(&self) -> bool {
        self.confidence >= 0
    }
}

#[derive(Error, Debug)]
pub enum RecognizerError {
    #[error("OCR engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error("OCR engine failed: {0}")]
    EngineError(String),
}

/// Anything that can turn a grayscale raster into word tokens.
pub trait TextRecognizer: Send + Sync {
    fn recognize(&self, img: &GrayImage) -> Result<Vec<OcrToken>, RecognizerError>;
}
