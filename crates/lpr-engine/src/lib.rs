//! Tunisian license plate detection and recognition.
//!
//! [`PlatePipeline::process`] takes an image, finds candidate plate regions
//! with a chain of detection strategies, reads each region through several
//! preprocessing variants and recognition engines, and returns the best
//! formatted plate (`"123 تونس 4567"`) with its confidence.

pub mod config;
pub mod detect;
pub mod formatter;
pub mod identifier;
pub mod normalize;
pub mod onnx;
pub mod pipeline;
pub mod preprocess;
pub mod recognition;
pub mod render;
pub mod selector;

mod guard;

pub use config::{OnnxModelConfig, PipelineConfig, RenderConfig};
pub use detect::{
    CascadeClassifier, CascadeParams, PlateLocalizer, RawBox, RegionDetector, RegionStrategy,
};
pub use formatter::PlateFormatter;
pub use identifier::{IdentifierDetection, IdentifierMatcher};
pub use pipeline::{BestResult, PlatePipeline, PlatePipelineBuilder, ProcessOutcome};
pub use preprocess::{generate_variants, Variant, VariantKind};
pub use recognition::{NativeLine, RecognitionFusion, SecondaryRecognizer, TextRecognizer};
pub use selector::{BestCandidateSelector, Selection};
