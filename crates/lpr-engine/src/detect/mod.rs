//! Region detection: an ordered chain of strategies where the first one to
//! report any region wins.

pub mod cascade;
pub mod contour;
pub mod full_frame;
pub mod onnx_localizer;

pub use cascade::{CascadeClassifier, CascadeParams, CascadeStrategy};
pub use contour::ContourStrategy;
pub use full_frame::FullFrameStrategy;
pub use onnx_localizer::{LocalizerStrategy, OnnxPlateLocalizer, PlateLocalizer, RawBox};

use crate::config::PipelineConfig;
use crate::guard::guarded;
use anyhow::Result;
use common::plates::Region;
use image::imageops::FilterType;
use image::RgbImage;
use std::borrow::Cow;
use std::collections::HashSet;
use std::sync::Arc;
use telemetry::metrics::{LPR_REGIONS_DETECTED, LPR_STRATEGY_FAILURES};

/// One region-detection method in the fallback chain
pub trait RegionStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn locate(&self, image: &RgbImage) -> Result<Vec<Region>>;
}

pub struct RegionDetector {
    strategies: Vec<Box<dyn RegionStrategy>>,
}

impl RegionDetector {
    pub fn new(strategies: Vec<Box<dyn RegionStrategy>>) -> Self {
        Self { strategies }
    }

    /// Localizer, cascade, contour and full-frame, skipping absent collaborators
    pub fn standard(
        config: Arc<PipelineConfig>,
        localizer: Option<Box<dyn PlateLocalizer>>,
        cascade: Option<Box<dyn CascadeClassifier>>,
    ) -> Self {
        let mut strategies: Vec<Box<dyn RegionStrategy>> = Vec::new();
        if let Some(localizer) = localizer {
            strategies.push(Box::new(LocalizerStrategy::new(localizer, config.clone())));
        }
        if let Some(cascade) = cascade {
            strategies.push(Box::new(CascadeStrategy::new(cascade, config.clone())));
        }
        strategies.push(Box::new(ContourStrategy::new(config)));
        strategies.push(Box::new(FullFrameStrategy));
        Self::new(strategies)
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Regions from the first strategy that finds any; empty only when every
    /// strategy came back empty or failed.
    pub fn detect(&self, image: &RgbImage) -> Vec<Region> {
        for strategy in &self.strategies {
            let name = strategy.name();
            match guarded(name, || strategy.locate(image)) {
                Ok(regions) if !regions.is_empty() => {
                    tracing::debug!(strategy = name, count = regions.len(), "regions located");
                    LPR_REGIONS_DETECTED
                        .with_label_values(&[name])
                        .inc_by(regions.len() as u64);
                    return regions;
                }
                Ok(_) => {
                    tracing::debug!(strategy = name, "no regions, trying next strategy");
                }
                Err(e) => {
                    tracing::warn!(strategy = name, error = %e, "detection strategy failed");
                    LPR_STRATEGY_FAILURES.with_label_values(&[name]).inc();
                }
            }
        }
        Vec::new()
    }
}

/// Integer rectangle `(x, y, width, height)` as produced by classical detectors
pub type Rect = (u32, u32, u32, u32);

/// Copy of `image` whose longer side is at most `max_dimension`, with the
/// factor that maps its coordinates back to the original.
pub(crate) fn working_copy(image: &RgbImage, max_dimension: u32) -> (Cow<'_, RgbImage>, f32) {
    let (width, height) = image.dimensions();
    let longer = width.max(height);
    if longer <= max_dimension {
        return (Cow::Borrowed(image), 1.0);
    }
    let ratio = max_dimension as f32 / longer as f32;
    let scaled_w = ((width as f32 * ratio).round() as u32).max(1);
    let scaled_h = ((height as f32 * ratio).round() as u32).max(1);
    tracing::debug!(width, height, scaled_w, scaled_h, "downscaling for detection");
    let resized = image::imageops::resize(image, scaled_w, scaled_h, FilterType::Triangle);
    (Cow::Owned(resized), width as f32 / scaled_w as f32)
}

/// Scale a working-copy rectangle back and clamp it to `bounds`
pub(crate) fn map_back(rect: Rect, scale: f32, bounds: (u32, u32)) -> Option<Rect> {
    let (x, y, w, h) = rect;
    let x0 = ((x as f32 * scale).round() as u32).min(bounds.0);
    let y0 = ((y as f32 * scale).round() as u32).min(bounds.1);
    let x1 = (((x + w) as f32 * scale).round() as u32).min(bounds.0);
    let y1 = (((y + h) as f32 * scale).round() as u32).min(bounds.1);
    if x1 <= x0 || y1 <= y0 {
        return None;
    }
    Some((x0, y0, x1 - x0, y1 - y0))
}

/// Keep the first rectangle of every `(x, y, w, h) / bucket` key
pub(crate) fn dedup_by_bucket(rects: impl IntoIterator<Item = Rect>, bucket: u32) -> Vec<Rect> {
    let bucket = bucket.max(1);
    let mut seen = HashSet::new();
    rects
        .into_iter()
        .filter(|&(x, y, w, h)| seen.insert((x / bucket, y / bucket, w / bucket, h / bucket)))
        .collect()
}
