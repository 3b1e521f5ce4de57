use super::{dedup_by_bucket, map_back, working_copy, Rect, RegionStrategy};
use crate::config::PipelineConfig;
use crate::preprocess::filters::to_gray;
use anyhow::Result;
use common::plates::{DetectionSource, Region};
use image::{GrayImage, RgbImage};
use imageproc::contrast::equalize_histogram;
use imageproc::filter::gaussian_blur_f32;
use std::sync::Arc;

/// Fixed confidence of cascade detections
pub const CASCADE_CONFIDENCE: f32 = 0.5;

/// Sigma equivalent to a 5x5 Gaussian kernel
const BLUR_SIGMA: f32 = 1.1;

/// Multi-scale sliding-window search parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CascadeParams {
    pub scale_factor: f32,
    pub min_neighbors: u32,
    pub min_size: (u32, u32),
    pub max_size: (u32, u32),
}

impl CascadeParams {
    pub const STRICT: Self = Self {
        scale_factor: 1.1,
        min_neighbors: 5,
        min_size: (60, 20),
        max_size: (300, 100),
    };

    pub const LOOSE: Self = Self {
        scale_factor: 1.05,
        min_neighbors: 3,
        min_size: (40, 15),
        max_size: (400, 150),
    };
}

/// Pre-trained plate cascade classifier
pub trait CascadeClassifier: Send + Sync {
    /// Rectangles `(x, y, width, height)` found in `image`
    fn detect_multi_scale(&self, image: &GrayImage, params: &CascadeParams) -> Result<Vec<Rect>>;
}

pub struct CascadeStrategy {
    classifier: Box<dyn CascadeClassifier>,
    config: Arc<PipelineConfig>,
}

impl CascadeStrategy {
    pub fn new(classifier: Box<dyn CascadeClassifier>, config: Arc<PipelineConfig>) -> Self {
        Self { classifier, config }
    }
}

impl RegionStrategy for CascadeStrategy {
    fn name(&self) -> &'static str {
        DetectionSource::Cascade.as_str()
    }

    fn locate(&self, image: &RgbImage) -> Result<Vec<Region>> {
        let (working, scale) = working_copy(image, self.config.max_detection_dimension);
        let prepared = gaussian_blur_f32(&equalize_histogram(&to_gray(&working)), BLUR_SIGMA);

        let mut found = self
            .classifier
            .detect_multi_scale(&prepared, &CascadeParams::STRICT)?;
        found.extend(
            self.classifier
                .detect_multi_scale(&prepared, &CascadeParams::LOOSE)?,
        );
        tracing::debug!(raw = found.len(), "cascade detections");

        let bounds = image.dimensions();
        let mapped = found
            .into_iter()
            .filter_map(|rect| map_back(rect, scale, bounds));

        Ok(dedup_by_bucket(mapped, self.config.dedup_bucket_size)
            .into_iter()
            .filter(|&(_, _, w, h)| self.config.accepts_geometry(w, h))
            .map(|(x, y, w, h)| Region::new(x, y, w, h, CASCADE_CONFIDENCE, DetectionSource::Cascade))
            .collect())
    }
}
