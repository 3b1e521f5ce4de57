//! Trained plate localizer: the collaborator trait, the strategy wrapping it
//! and a YOLOv8 ONNX implementation.

use super::RegionStrategy;
use crate::config::{OnnxModelConfig, PipelineConfig};
use crate::onnx::OnnxSession;
use anyhow::{Context, Result};
use common::plates::{DetectionSource, Region};
use image::RgbImage;
use ndarray::{Array, IxDyn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Localizer output box in input-image pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub confidence: f32,
}

impl RawBox {
    fn area(&self) -> f32 {
        (self.x2 - self.x1).max(0.0) * (self.y2 - self.y1).max(0.0)
    }

    /// Intersection over Union
    pub fn iou(&self, other: &RawBox) -> f32 {
        let x1 = self.x1.max(other.x1);
        let y1 = self.y1.max(other.y1);
        let x2 = self.x2.min(other.x2);
        let y2 = self.y2.min(other.y2);

        let intersection = if x2 > x1 && y2 > y1 {
            (x2 - x1) * (y2 - y1)
        } else {
            0.0
        };
        let union = self.area() + other.area() - intersection;

        if union > 0.0 {
            intersection / union
        } else {
            0.0
        }
    }
}

/// Object-localization model returning plate boxes above a score threshold
pub trait PlateLocalizer: Send + Sync {
    fn infer(&self, image: &RgbImage, confidence_threshold: f32) -> Result<Vec<RawBox>>;
}

/// Region strategy backed by a [`PlateLocalizer`]
pub struct LocalizerStrategy {
    localizer: Box<dyn PlateLocalizer>,
    config: Arc<PipelineConfig>,
}

impl LocalizerStrategy {
    pub fn new(localizer: Box<dyn PlateLocalizer>, config: Arc<PipelineConfig>) -> Self {
        Self { localizer, config }
    }
}

impl RegionStrategy for LocalizerStrategy {
    fn name(&self) -> &'static str {
        DetectionSource::Localizer.as_str()
    }

    fn locate(&self, image: &RgbImage) -> Result<Vec<Region>> {
        let (width, height) = image.dimensions();
        let boxes = self
            .localizer
            .infer(image, self.config.localizer_confidence)?;

        let regions = boxes
            .into_iter()
            .filter_map(|b| {
                let x1 = b.x1.clamp(0.0, width as f32) as u32;
                let y1 = b.y1.clamp(0.0, height as f32) as u32;
                let x2 = b.x2.clamp(0.0, width as f32) as u32;
                let y2 = b.y2.clamp(0.0, height as f32) as u32;
                if x2 <= x1 || y2 <= y1 {
                    return None;
                }
                let (w, h) = (x2 - x1, y2 - y1);
                self.config
                    .accepts_geometry(w, h)
                    .then(|| Region::new(x1, y1, w, h, b.confidence, DetectionSource::Localizer))
            })
            .collect();
        Ok(regions)
    }
}

/// YOLOv8 single-class plate detector settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalizerConfig {
    #[serde(flatten)]
    pub model: OnnxModelConfig,

    /// Square model input size
    #[serde(default = "default_input_size")]
    pub input_size: u32,

    /// IoU threshold for NMS
    #[serde(default = "default_iou_threshold")]
    pub iou_threshold: f32,

    /// Maximum number of plates kept per image
    #[serde(default = "default_max_detections")]
    pub max_detections: usize,
}

fn default_input_size() -> u32 {
    640
}

fn default_iou_threshold() -> f32 {
    0.45
}

fn default_max_detections() -> usize {
    10
}

impl LocalizerConfig {
    pub fn new(model_path: impl Into<String>) -> Self {
        Self {
            model: OnnxModelConfig::new(model_path),
            input_size: default_input_size(),
            iou_threshold: default_iou_threshold(),
            max_detections: default_max_detections(),
        }
    }
}

pub struct OnnxPlateLocalizer {
    config: LocalizerConfig,
    session: OnnxSession,
}

impl OnnxPlateLocalizer {
    pub fn new(config: LocalizerConfig) -> Result<Self> {
        let session = OnnxSession::load("plate_localizer", &config.model)
            .context("Failed to initialize plate localizer")?;
        Ok(Self { config, session })
    }

    pub fn execution_provider(&self) -> &'static str {
        self.session.execution_provider()
    }

    /// NCHW RGB tensor in [0, 1]
    fn preprocess(&self, image: &RgbImage) -> Array<f32, IxDyn> {
        let size = self.config.input_size;
        let resized = image::imageops::resize(image, size, size, image::imageops::FilterType::Triangle);

        let mut input = Array::zeros(IxDyn(&[1, 3, size as usize, size as usize]));
        for (x, y, pixel) in resized.enumerate_pixels() {
            for channel in 0..3 {
                input[[0, channel, y as usize, x as usize]] = pixel[channel] as f32 / 255.0;
            }
        }
        input
    }
}

impl PlateLocalizer for OnnxPlateLocalizer {
    fn infer(&self, image: &RgbImage, confidence_threshold: f32) -> Result<Vec<RawBox>> {
        let input = self.preprocess(image);
        let output = self.session.run(input, &["output0", "output", "boxes"])?;

        let scale_x = image.width() as f32 / self.config.input_size as f32;
        let scale_y = image.height() as f32 / self.config.input_size as f32;
        let boxes = decode_predictions(&output, scale_x, scale_y, confidence_threshold)?;

        let mut kept = nms(boxes, self.config.iou_threshold);
        kept.truncate(self.config.max_detections);
        tracing::debug!(count = kept.len(), "localizer boxes after NMS");
        Ok(kept)
    }
}

/// Decode a `[1, 5, N]` output of `(cx, cy, w, h, score)` columns
fn decode_predictions(
    output: &Array<f32, IxDyn>,
    scale_x: f32,
    scale_y: f32,
    confidence_threshold: f32,
) -> Result<Vec<RawBox>> {
    let shape = output.shape();
    if shape.len() != 3 || shape[1] < 5 {
        anyhow::bail!("Unexpected localizer output shape {:?}", shape);
    }

    let mut boxes = Vec::new();
    for i in 0..shape[2] {
        let confidence = output[[0, 4, i]];
        if confidence < confidence_threshold {
            continue;
        }

        let cx = output[[0, 0, i]];
        let cy = output[[0, 1, i]];
        let w = output[[0, 2, i]];
        let h = output[[0, 3, i]];

        boxes.push(RawBox {
            x1: (cx - w / 2.0) * scale_x,
            y1: (cy - h / 2.0) * scale_y,
            x2: (cx + w / 2.0) * scale_x,
            y2: (cy + h / 2.0) * scale_y,
            confidence,
        });
    }
    Ok(boxes)
}

/// Greedy non-maximum suppression, highest confidence first
pub(crate) fn nms(mut boxes: Vec<RawBox>, iou_threshold: f32) -> Vec<RawBox> {
    boxes.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut keep: Vec<RawBox> = Vec::new();
    for candidate in boxes {
        if keep.iter().all(|k| k.iou(&candidate) < iou_threshold) {
            keep.push(candidate);
        }
    }
    keep
}
