//! Preprocessing variants of a region crop fed to the recognition engines.

pub mod filters;

use crate::guard::guarded;
use filters::{
    adaptive_threshold, bilateral_filter, clahe, edge_enhance, equalize_luma, gray_to_rgb,
    otsu_binarize, sharpen, to_gray,
};
use image::RgbImage;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VariantKind {
    Original,
    Grayscale,
    Bilateral,
    Contrast,
    Otsu,
    AdaptiveThreshold,
    Sharpened,
    EdgeEnhanced,
    LumaEqualized,
}

impl VariantKind {
    /// Generation order
    pub const ALL: [VariantKind; 9] = [
        Self::Original,
        Self::Grayscale,
        Self::Bilateral,
        Self::Contrast,
        Self::Otsu,
        Self::AdaptiveThreshold,
        Self::Sharpened,
        Self::EdgeEnhanced,
        Self::LumaEqualized,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Original => "original",
            Self::Grayscale => "grayscale",
            Self::Bilateral => "bilateral",
            Self::Contrast => "contrast",
            Self::Otsu => "otsu",
            Self::AdaptiveThreshold => "adaptive_threshold",
            Self::Sharpened => "sharpened",
            Self::EdgeEnhanced => "edge_enhanced",
            Self::LumaEqualized => "luma_equalized",
        }
    }

    fn render(&self, crop: &RgbImage) -> RgbImage {
        match self {
            Self::Original => crop.clone(),
            Self::Grayscale => gray_to_rgb(&to_gray(crop)),
            Self::Bilateral => gray_to_rgb(&bilateral_filter(&to_gray(crop), 11, 17.0, 17.0)),
            Self::Contrast => gray_to_rgb(&clahe(&to_gray(crop), 2.0, 8)),
            Self::Otsu => gray_to_rgb(&otsu_binarize(&to_gray(crop))),
            Self::AdaptiveThreshold => gray_to_rgb(&adaptive_threshold(&to_gray(crop), 11, 2, false)),
            Self::Sharpened => gray_to_rgb(&sharpen(&to_gray(crop))),
            Self::EdgeEnhanced => gray_to_rgb(&edge_enhance(&to_gray(crop))),
            Self::LumaEqualized => equalize_luma(crop),
        }
    }
}

/// One preprocessed rendering of a region crop
#[derive(Debug, Clone)]
pub struct Variant {
    pub kind: VariantKind,
    pub image: RgbImage,
}

/// Every variant of `crop`, in [`VariantKind::ALL`] order.
///
/// A technique that fails is skipped; `Original` is always present.
pub fn generate_variants(crop: &RgbImage) -> Vec<Variant> {
    let mut variants = Vec::with_capacity(VariantKind::ALL.len());
    for kind in VariantKind::ALL {
        match guarded(kind.as_str(), || Ok(kind.render(crop))) {
            Ok(image) => variants.push(Variant { kind, image }),
            Err(e) => tracing::warn!(variant = kind.as_str(), error = %e, "preprocessing technique failed"),
        }
    }
    if variants.first().map(|v| v.kind) != Some(VariantKind::Original) {
        variants.insert(
            0,
            Variant {
                kind: VariantKind::Original,
                image: crop.clone(),
            },
        );
    }
    variants
}
