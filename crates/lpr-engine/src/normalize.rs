//! Canonical pixel layout for every downstream stage.
//!
//! Whatever arrives (grayscale, alpha, 16-bit, float), the pipeline works on
//! 3-channel 8-bit RGB. Unusable input becomes a neutral white placeholder so
//! later stages never branch on format.

use image::{DynamicImage, Rgb, RgbImage};

pub const PLACEHOLDER_SIZE: u32 = 100;

/// Neutral white placeholder returned for unusable input
pub fn placeholder() -> RgbImage {
    RgbImage::from_pixel(PLACEHOLDER_SIZE, PLACEHOLDER_SIZE, Rgb([255, 255, 255]))
}

/// Convert any decoded image to 3-channel 8-bit RGB
pub fn normalize(image: Option<&DynamicImage>) -> RgbImage {
    let Some(image) = image else {
        tracing::warn!("no input image, using placeholder");
        return placeholder();
    };

    if let Err(e) = common::validation::validate_dimensions(image.width(), image.height()) {
        tracing::warn!(error = %e, "unusable input image, using placeholder");
        return placeholder();
    }

    match image {
        DynamicImage::ImageRgb8(rgb) => rgb.clone(),
        other => other.to_rgb8(),
    }
}

/// Decode an encoded image (JPEG, PNG, ...) and normalize it
pub fn normalize_bytes(data: &[u8]) -> RgbImage {
    match image::load_from_memory(data) {
        Ok(decoded) => normalize(Some(&decoded)),
        Err(e) => {
            tracing::warn!(error = %e, bytes = data.len(), "failed to decode image, using placeholder");
            placeholder()
        }
    }
}
