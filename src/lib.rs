pub mod config;
pub mod ocr;
pub mod paths;
pub mod verify;

pub use config::AnalyzerConfig;
pub use ocr::{TesseractRecognizer, TextRecognizer};
pub use verify::{analyze_image, AnalysisError, AnalysisVerdict, Fingerprint};
