use image::metadata::Orientation;
use image::{DynamicImage, GrayImage, ImageDecoder, ImageReader, Luma};
use std::path::Path;

use super::AnalysisError;

/// A decoded input image and its grayscale derivative.
///
/// Both rasters are read-only once loaded and shared across the stages.
#[derive(Debug)]
pub struct LoadedImage {
    pub original: DynamicImage,
    pub gray: GrayImage,
}

impl LoadedImage {
    pub fn from_image(original: DynamicImage) -> Self {
        let gray = to_gray_bt601(&original);
        Self { original, gray }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.gray.dimensions()
    }
}

/// Grayscale with BT.601 luma weights (0.299 R + 0.587 G + 0.114 B).
///
/// Uses the 14-bit fixed-point coefficients common to camera and OCR
/// pipelines so the blur threshold sees the same gray levels they do. Alpha
/// is dropped, not composited.
pub fn to_gray_bt601(img: &DynamicImage) -> GrayImage {
    const R: u32 = 4899;
    const G: u32 = 9617;
    const B: u32 = 1868;
    const SHIFT: u32 = 14;

    let rgb = img.to_rgb8();
    GrayImage::from_fn(rgb.width(), rgb.height(), |x, y| {
        let [r, g, b] = rgb.get_pixel(x, y).0;
        let luma = (R * r as u32 + G * g as u32 + B * b as u32 + (1 << (SHIFT - 1))) >> SHIFT;
        Luma([luma.min(255) as u8])
    })
}

/// Reads and decodes the image at `path`, upright.
///
/// The format is sniffed from the file content and any EXIF orientation tag
/// is applied, so a rotated phone photo comes out the way it was shot. A
/// missing file and an undecodable one are reported the same way.
pub fn load_image(path: &Path) -> Result<LoadedImage, AnalysisError> {
    let not_found = |reason: String| AnalysisError::ImageNotFound {
        path: path.to_path_buf(),
        reason,
    };

    let mut decoder = ImageReader::open(path)
        .map_err(|e| not_found(e.to_string()))?
        .with_guessed_format()
        .map_err(|e| not_found(e.to_string()))?
        .into_decoder()
        .map_err(|e| not_found(e.to_string()))?;

    // Unreadable EXIF leaves the image as stored
    let orientation = decoder.orientation().unwrap_or_else(|e| {
        log::warn!("Ignoring unreadable orientation in {}: {}", path.display(), e);
        Orientation::NoTransforms
    });

    let mut original = DynamicImage::from_decoder(decoder).map_err(|e| not_found(e.to_string()))?;
    log::debug!("EXIF orientation: {:?}", orientation);
    original.apply_orientation(orientation);

    Ok(LoadedImage::from_image(original))
}
