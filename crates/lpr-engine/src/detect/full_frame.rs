use super::RegionStrategy;
use anyhow::Result;
use common::plates::{DetectionSource, Region};
use image::RgbImage;

/// Fixed confidence of the whole-image fallback
pub const FULL_FRAME_CONFIDENCE: f32 = 0.3;

/// Last resort: the whole image is the plate
pub struct FullFrameStrategy;

impl RegionStrategy for FullFrameStrategy {
    fn name(&self) -> &'static str {
        DetectionSource::FullFrame.as_str()
    }

    fn locate(&self, image: &RgbImage) -> Result<Vec<Region>> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Ok(Vec::new());
        }
        Ok(vec![Region::new(
            0,
            0,
            width,
            height,
            FULL_FRAME_CONFIDENCE,
            DetectionSource::FullFrame,
        )])
    }
}
