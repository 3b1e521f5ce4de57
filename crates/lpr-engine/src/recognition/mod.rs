//! Text recognition fusion: every variant goes through the primary engine
//! and, when configured, the secondary engine; all hits are kept.

pub mod crnn;

pub use crnn::{CrnnConfig, CrnnRecognizer};

use crate::guard::guarded;
use crate::preprocess::filters::{gray_to_rgb, to_gray};
use crate::preprocess::Variant;
use anyhow::Result;
use common::plates::{Quad, RecognitionHit};
use image::RgbImage;
use telemetry::metrics::LPR_RECOGNITION_FAILURES;

/// Mandatory recognition engine producing hits directly
pub trait TextRecognizer: Send + Sync {
    fn name(&self) -> &str;

    fn read_text(&self, image: &RgbImage) -> Result<Vec<RecognitionHit>>;
}

/// A text line in the secondary engine's own layout
#[derive(Debug, Clone, PartialEq)]
pub struct NativeLine {
    /// Polygon around the line, usually four corners
    pub points: Vec<[f32; 2]>,
    pub text: String,
    pub score: f32,
}

/// Optional second engine with its own output layout
pub trait SecondaryRecognizer: Send + Sync {
    fn name(&self) -> &str;

    fn read_lines(&self, image: &RgbImage) -> Result<Vec<NativeLine>>;
}

pub struct RecognitionFusion {
    primary: Box<dyn TextRecognizer>,
    secondary: Option<Box<dyn SecondaryRecognizer>>,
}

impl RecognitionFusion {
    pub fn new(primary: Box<dyn TextRecognizer>) -> Self {
        Self {
            primary,
            secondary: None,
        }
    }

    pub fn with_secondary(mut self, secondary: Box<dyn SecondaryRecognizer>) -> Self {
        self.secondary = Some(secondary);
        self
    }

    pub fn engine_names(&self) -> Vec<&str> {
        std::iter::once(self.primary.name())
            .chain(self.secondary.as_ref().map(|s| s.name()))
            .collect()
    }

    /// Hits in variant order, primary engine before secondary within a variant
    pub fn recognize(&self, variants: &[Variant]) -> Vec<RecognitionHit> {
        let mut hits = Vec::new();
        for variant in variants {
            hits.extend(self.read_primary(variant));
            if let Some(secondary) = &self.secondary {
                hits.extend(Self::read_secondary(secondary.as_ref(), variant));
            }
        }
        tracing::debug!(variants = variants.len(), hits = hits.len(), "recognition finished");
        hits
    }

    fn read_primary(&self, variant: &Variant) -> Vec<RecognitionHit> {
        let engine = self.primary.name();
        let first = guarded(engine, || self.primary.read_text(&variant.image));
        let error = match first {
            Ok(hits) => return hits,
            Err(e) => e,
        };

        tracing::debug!(engine, variant = variant.kind.as_str(), error = %error, "retrying in grayscale");
        let gray = gray_to_rgb(&to_gray(&variant.image));
        match guarded(engine, || self.primary.read_text(&gray)) {
            Ok(hits) => hits,
            Err(e) => {
                tracing::warn!(engine, variant = variant.kind.as_str(), error = %e, "recognition failed");
                LPR_RECOGNITION_FAILURES.with_label_values(&[engine]).inc();
                Vec::new()
            }
        }
    }

    fn read_secondary(engine: &dyn SecondaryRecognizer, variant: &Variant) -> Vec<RecognitionHit> {
        let name = engine.name();
        match guarded(name, || engine.read_lines(&variant.image)) {
            Ok(lines) => {
                let (width, height) = variant.image.dimensions();
                lines
                    .into_iter()
                    .filter_map(|line| translate_line(line, name, width, height))
                    .collect()
            }
            Err(e) => {
                tracing::warn!(engine = name, variant = variant.kind.as_str(), error = %e, "recognition failed");
                LPR_RECOGNITION_FAILURES.with_label_values(&[name]).inc();
                Vec::new()
            }
        }
    }
}

/// Convert a secondary-engine line into a hit; blank text yields nothing
fn translate_line(line: NativeLine, engine: &str, width: u32, height: u32) -> Option<RecognitionHit> {
    if line.text.trim().is_empty() {
        return None;
    }

    let quad = if line.points.is_empty() {
        Quad::from_rect(0.0, 0.0, width as f32, height as f32)
    } else {
        let (min_x, max_x) = span(line.points.iter().map(|p| p[0]));
        let (min_y, max_y) = span(line.points.iter().map(|p| p[1]));
        let bounds = Quad::from_rect(min_x, min_y, max_x - min_x, max_y - min_y);
        let mut corners = *bounds.points();
        for (corner, point) in corners.iter_mut().zip(&line.points) {
            *corner = *point;
        }
        Quad(corners)
    };

    Some(RecognitionHit::new(quad, line.text, line.score, engine))
}

fn span(values: impl Iterator<Item = f32>) -> (f32, f32) {
    values.fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)))
}
