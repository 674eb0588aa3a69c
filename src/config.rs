//! Analyzer configuration.
//!
//! Loads settings from config.json at startup. Provides the blur threshold,
//! OCR confidence cut-offs, and Tesseract invocation parameters. The loaded
//! value is passed explicitly into the pipeline.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Complete analyzer configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    /// Laplacian variance below this = blurry
    #[serde(default = "default_blur_threshold")]
    pub blur_threshold: f64,
    /// OCR words must score strictly above this (0-100) to be kept
    #[serde(default = "default_token_confidence_floor")]
    pub token_confidence_floor: i32,
    /// Mean OCR confidence must be strictly above this for a valid verdict
    #[serde(default = "default_validity_confidence_threshold")]
    pub validity_confidence_threshold: f64,
    /// Maximum time a single Tesseract run may take (milliseconds)
    #[serde(default = "default_ocr_timeout_ms")]
    pub ocr_timeout_ms: u64,
    /// Tesseract language code(s), e.g. "eng" or "eng+fra"
    #[serde(default = "default_ocr_language")]
    pub ocr_language: String,
    /// Explicit path to the tesseract executable
    #[serde(default)]
    pub tesseract_path: Option<PathBuf>,
    /// Explicit tessdata directory
    #[serde(default)]
    pub tessdata_dir: Option<PathBuf>,
}

fn default_blur_threshold() -> f64 {
    100.0
}

fn default_token_confidence_floor() -> i32 {
    50
}

fn default_validity_confidence_threshold() -> f64 {
    50.0
}

fn default_ocr_timeout_ms() -> u64 {
    30_000
}

fn default_ocr_language() -> String {
    "eng".to_string()
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            blur_threshold: default_blur_threshold(),
            token_confidence_floor: default_token_confidence_floor(),
            validity_confidence_threshold: default_validity_confidence_threshold(),
            ocr_timeout_ms: default_ocr_timeout_ms(),
            ocr_language: default_ocr_language(),
            tesseract_path: None,
            tessdata_dir: None,
        }
    }
}

impl AnalyzerConfig {
    pub fn ocr_timeout(&self) -> Duration {
        Duration::from_millis(self.ocr_timeout_ms)
    }

    /// Reads and parses a config file. Missing fields take their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse {}", path.display()))
    }
}

/// Loads configuration from `path` or returns defaults.
///
/// A missing file is not an error. A file that cannot be read or parsed is
/// logged and replaced by the defaults so that analysis still runs.
pub fn load_config(path: &Path) -> AnalyzerConfig {
    log::debug!("Looking for config at: {}", path.display());

    if !path.exists() {
        log::debug!("{} not found. Using default config.", path.display());
        return AnalyzerConfig::default();
    }

    match AnalyzerConfig::from_file(path) {
        Ok(config) => {
            log::info!("Config loaded from {}", path.display());
            config
        }
        Err(e) => {
            log::warn!("{:#}. Using defaults.", e);
            AnalyzerConfig::default()
        }
    }
}
