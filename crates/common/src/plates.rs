//! Plate recognition contracts shared by the engine and its callers.
//!
//! This module defines the call-scoped entities produced while processing a
//! single image: candidate regions, recognition hits, identifier matches and
//! the scored plate candidates built from them.

use serde::{Deserialize, Serialize};

/// Which detection strategy produced a region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionSource {
    /// Trained object-localization model
    Localizer,

    /// Classical cascade classifier
    Cascade,

    /// Contour/edge geometry heuristic
    Contour,

    /// Whole-image fallback
    FullFrame,
}

impl DetectionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Localizer => "localizer",
            Self::Cascade => "cascade",
            Self::Contour => "contour",
            Self::FullFrame => "full_frame",
        }
    }
}

/// Candidate plate rectangle in image coordinates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,

    /// Detection confidence (0.0 to 1.0)
    pub confidence: f32,

    /// Strategy that produced this region
    pub source: DetectionSource,
}

impl Region {
    pub fn new(
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        confidence: f32,
        source: DetectionSource,
    ) -> Self {
        Self {
            x,
            y,
            width,
            height,
            confidence: unit_score(confidence),
            source,
        }
    }

    /// Width divided by height, 0.0 for degenerate regions
    pub fn aspect_ratio(&self) -> f32 {
        if self.height == 0 {
            return 0.0;
        }
        self.width as f32 / self.height as f32
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// True when the region has a positive size and lies inside a
    /// `width` x `height` image.
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.width > 0
            && self.height > 0
            && (self.x as u64 + self.width as u64) <= width as u64
            && (self.y as u64 + self.height as u64) <= height as u64
    }
}

/// Bounding quadrilateral of a recognized text fragment, clockwise from top-left
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quad(pub [[f32; 2]; 4]);

impl Quad {
    pub fn from_rect(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self([
            [x, y],
            [x + width, y],
            [x + width, y + height],
            [x, y + height],
        ])
    }

    pub fn points(&self) -> &[[f32; 2]; 4] {
        &self.0
    }
}

/// One text fragment found by a recognition engine inside a variant image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognitionHit {
    pub quad: Quad,
    pub text: String,

    /// Recognition confidence (0.0 to 1.0)
    pub confidence: f32,

    /// Name of the engine that produced the hit
    pub engine: String,
}

impl RecognitionHit {
    pub fn new(quad: Quad, text: impl Into<String>, confidence: f32, engine: impl Into<String>) -> Self {
        Self {
            quad,
            text: text.into(),
            confidence: unit_score(confidence),
            engine: engine.into(),
        }
    }
}

/// Which identifier matching rule fired
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchRule {
    Exact,
    KnownVariant,
    LetterSubset,
    WeakScript,
    None,
}

/// Outcome of matching one text fragment against the national identifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentifierMatch {
    /// The canonical identifier when matched, the original text otherwise
    pub canonical_text: String,
    pub matched: bool,
    pub confidence: f32,
    pub rule: MatchRule,
}

impl IdentifierMatch {
    pub fn none(original: impl Into<String>) -> Self {
        Self {
            canonical_text: original.into(),
            matched: false,
            confidence: 0.0,
            rule: MatchRule::None,
        }
    }
}

/// Scored plate reading for one region
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlateCandidate {
    /// Canonical plate string, e.g. "123 تونس 4567"
    pub formatted_text: String,

    /// Identifier text, empty when no identifier was found
    pub identifier_text: String,

    /// Digit groups sorted by length, longest first
    pub number_groups: Vec<String>,

    /// Confidence contributed by the text layout alone
    pub text_confidence: f32,

    /// Detection and text confidence blended, used for ranking
    pub combined_confidence: f32,

    pub is_standard_format: bool,

    /// True when the identifier was reconstructed from a fuzzy match
    pub identifier_replaced: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub identifier_quad: Option<Quad>,

    /// Plate rewritten as "<smaller> تونس <larger>"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub standardized_text: Option<String>,
}

/// Clamp a score into [0, 1]; NaN scores count as 0.0
pub fn unit_score(score: f32) -> f32 {
    if score.is_nan() {
        return 0.0;
    }
    score.clamp(0.0, 1.0)
}
