//! Single-image quality gate.
//!
//! This module provides:
//! - Image loading with a grayscale derivative
//! - Blur detection via Laplacian variance
//! - Perceptual fingerprinting (dHash) for duplicate lookup by the caller
//! - Verdict composition and JSON serialization

pub mod fingerprint;
pub mod loader;
pub mod sharpness;
pub mod verdict;

pub use fingerprint::{generate_fingerprint, Fingerprint};
pub use loader::{load_image, LoadedImage};
pub use sharpness::{laplacian_variance, SharpnessAnalyzer, SharpnessResult};
pub use verdict::AnalysisVerdict;

use std::path::{Path, PathBuf};
use std::thread::{self, ScopedJoinHandle};
use thiserror::Error;

use crate::config::AnalyzerConfig;
use crate::ocr::{extract_text, TextExtractionResult, TextRecognizer, TokenFilter};

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Image not found or could not be read at path: {} ({reason})", .path.display())]
    ImageNotFound { path: PathBuf, reason: String },
}

/// Analyzes the image at `path`.
///
/// Only a load failure is returned as an error. Fingerprint and OCR problems
/// degrade the verdict instead.
pub fn analyze_image(
    path: &Path,
    config: &AnalyzerConfig,
    recognizer: &dyn TextRecognizer,
) -> Result<AnalysisVerdict, AnalysisError> {
    let loaded = load_image(path)?;
    let (w, h) = loaded.dimensions();
    log::info!("Loaded {} ({}x{})", path.display(), w, h);

    Ok(analyze_loaded(&loaded, config, recognizer))
}

/// Runs the three stages over an already loaded image and joins the results.
///
/// Fingerprinting and OCR run on scoped threads while sharpness is computed
/// on the calling thread. The rasters are only ever borrowed immutably.
pub fn analyze_loaded(
    loaded: &LoadedImage,
    config: &AnalyzerConfig,
    recognizer: &dyn TextRecognizer,
) -> AnalysisVerdict {
    let analyzer = SharpnessAnalyzer::new(config.blur_threshold);
    let filter = TokenFilter {
        confidence_floor: config.token_confidence_floor,
    };

    let (sharpness, fingerprint, text) = thread::scope(|s| {
        let fingerprint = s.spawn(|| generate_fingerprint(&loaded.original));
        let text = s.spawn(|| extract_text(recognizer, &loaded.gray, filter));

        let sharpness = analyzer.analyze(&loaded.gray);

        (
            sharpness,
            join_stage("fingerprint", fingerprint).flatten(),
            join_stage("ocr", text).unwrap_or_else(TextExtractionResult::empty),
        )
    });

    log::info!(
        "Laplacian variance {:.2} (threshold {}) -> blurry={}",
        sharpness.variance_score,
        sharpness.threshold,
        sharpness.is_blurry
    );
    match &fingerprint {
        Some(fp) => log::info!("dHash {}", fp),
        None => log::warn!("No fingerprint computed"),
    }
    log::info!(
        "OCR: {} chars, confidence {:.2}",
        text.text.chars().count(),
        text.confidence
    );

    AnalysisVerdict::compose(
        &sharpness,
        fingerprint,
        text,
        config.validity_confidence_threshold,
    )
}

fn join_stage<T>(name: &str, handle: ScopedJoinHandle<'_, T>) -> Option<T> {
    match handle.join() {
        Ok(value) => Some(value),
        Err(_) => {
            log::error!("{} stage panicked, continuing without it", name);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::testing::FakeRecognizer;
    use crate::ocr::{OcrToken, RecognizerError, TESSERACT_NOT_FOUND};
    use image::{GrayImage, ImageBuffer, Luma};
    use tempfile::{tempdir, TempDir};

    fn save_gray(img: &GrayImage) -> (TempDir, PathBuf) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("offer.png");
        img.save(&path).unwrap();
        (dir, path)
    }

    fn sharp_image() -> GrayImage {
        ImageBuffer::from_fn(96, 64, |x, y| {
            if (x / 4 + y / 4) % 2 == 0 {
                Luma([20u8])
            } else {
                Luma([235u8])
            }
        })
    }

    fn flat_image() -> GrayImage {
        GrayImage::from_pixel(96, 64, Luma([128]))
    }

    fn sale_recognizer() -> FakeRecognizer {
        FakeRecognizer::with_tokens(&[("SALE", 92), ("50%", 88), ("", -1), ("OFF", 95)])
    }

    #[test]
    fn test_sharp_legible_image_is_valid() {
        let (_dir, path) = save_gray(&sharp_image());
        let verdict =
            analyze_image(&path, &AnalyzerConfig::default(), &sale_recognizer()).unwrap();

        assert_eq!(verdict.is_blurry, Some(false));
        assert_eq!(verdict.text, "SALE 50% OFF");
        assert_eq!(verdict.confidence, 91.67);
        assert_eq!(verdict.fingerprint.unwrap().to_string().len(), 16);
        assert!(verdict.is_valid);
        assert!(verdict.error.is_none());
    }

    #[test]
    fn test_blurry_image_is_invalid() {
        let (_dir, path) = save_gray(&flat_image());
        let verdict =
            analyze_image(&path, &AnalyzerConfig::default(), &sale_recognizer()).unwrap();

        assert_eq!(verdict.is_blurry, Some(true));
        assert!(!verdict.is_valid);
        assert_eq!(verdict.text, "SALE 50% OFF");
    }

    #[test]
    fn test_empty_ocr_is_invalid_but_not_error() {
        let (_dir, path) = save_gray(&sharp_image());
        let recognizer = FakeRecognizer::with_tokens(&[]);
        let verdict = analyze_image(&path, &AnalyzerConfig::default(), &recognizer).unwrap();

        assert_eq!(verdict.is_blurry, Some(false));
        assert_eq!(verdict.text, "");
        assert_eq!(verdict.confidence, 0.0);
        assert!(!verdict.is_valid);
        assert!(verdict.error.is_none());
    }

    #[test]
    fn test_engine_unavailable_degrades() {
        let (_dir, path) = save_gray(&sharp_image());
        let verdict =
            analyze_image(&path, &AnalyzerConfig::default(), &FakeRecognizer::Unavailable)
                .unwrap();

        assert_eq!(verdict.text, TESSERACT_NOT_FOUND);
        assert_eq!(verdict.confidence, 0.0);
        assert!(!verdict.is_valid);
        assert!(verdict.error.is_none());
    }

    #[test]
    fn test_missing_file_is_fatal() {
        let dir = tempdir().unwrap();
        let err = analyze_image(
            &dir.path().join("nope.jpg"),
            &AnalyzerConfig::default(),
            &sale_recognizer(),
        )
        .unwrap_err();
        assert!(matches!(err, AnalysisError::ImageNotFound { .. }));
    }

    #[test]
    fn test_deterministic() {
        let (_dir, path) = save_gray(&sharp_image());
        let config = AnalyzerConfig::default();
        let first = analyze_image(&path, &config, &sale_recognizer()).unwrap();
        let second = analyze_image(&path, &config, &sale_recognizer()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_config_thresholds_flow_through() {
        let (_dir, path) = save_gray(&sharp_image());
        let config = AnalyzerConfig {
            blur_threshold: f64::MAX,
            token_confidence_floor: 90,
            validity_confidence_threshold: 10.0,
            ..AnalyzerConfig::default()
        };
        let verdict = analyze_image(&path, &config, &sale_recognizer()).unwrap();

        assert_eq!(verdict.is_blurry, Some(true));
        assert_eq!(verdict.text, "SALE OFF");
        assert_eq!(verdict.confidence, 93.5);
    }

    struct PanickingRecognizer;

    impl TextRecognizer for PanickingRecognizer {
        fn recognize(&self, _img: &GrayImage) -> Result<Vec<OcrToken>, RecognizerError> {
            panic!("recognizer bug");
        }
    }

    #[test]
    fn test_panicking_stage_does_not_abort() {
        let loaded = LoadedImage::from_image(image::DynamicImage::ImageLuma8(sharp_image()));
        let verdict = analyze_loaded(&loaded, &AnalyzerConfig::default(), &PanickingRecognizer);

        assert_eq!(verdict.is_blurry, Some(false));
        assert_eq!(verdict.text, "");
        assert!(!verdict.is_valid);
        assert!(verdict.fingerprint.is_some());
    }
}
