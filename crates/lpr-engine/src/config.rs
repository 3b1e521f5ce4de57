use anyhow::{Context, Result};
use common::validation::{validate_range, validate_unit_interval, validate_word};
use serde::{Deserialize, Serialize};
use std::env;

/// Tunable constants of the plate pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// National identifier word expected on every plate
    #[serde(default = "default_identifier_word")]
    pub identifier_word: String,

    /// Letters of the identifier, matched independently
    #[serde(default = "default_identifier_letters")]
    pub identifier_letters: Vec<char>,

    /// Known OCR-confusable spellings of the identifier
    #[serde(default = "default_identifier_variants")]
    pub identifier_variants: Vec<String>,

    /// Minimum plate area in pixels
    #[serde(default = "default_min_plate_area")]
    pub min_plate_area: u64,

    /// Minimum width/height ratio of a plate region
    #[serde(default = "default_min_aspect_ratio")]
    pub min_aspect_ratio: f32,

    /// Maximum width/height ratio of a plate region
    #[serde(default = "default_max_aspect_ratio")]
    pub max_aspect_ratio: f32,

    /// Score threshold passed to the localizer model
    #[serde(default = "default_localizer_confidence")]
    pub localizer_confidence: f32,

    /// Coordinate bucket size used to deduplicate regions
    #[serde(default = "default_dedup_bucket_size")]
    pub dedup_bucket_size: u32,

    /// Longer image side above which classical strategies run on a downscaled copy
    #[serde(default = "default_max_detection_dimension")]
    pub max_detection_dimension: u32,

    /// Number of largest contours examined per edge map
    #[serde(default = "default_contour_candidates")]
    pub contour_candidates: usize,

    #[serde(default)]
    pub render: RenderConfig,
}

/// Rendering options for the annotated image and plate visualization
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RenderConfig {
    /// TrueType/OpenType font used for labels; labels are skipped without one
    #[serde(default)]
    pub font_path: Option<String>,

    /// Label height in pixels
    #[serde(default = "default_font_scale")]
    pub font_scale: f32,
}

fn default_identifier_word() -> String {
    "تونس".to_string()
}

fn default_identifier_letters() -> Vec<char> {
    vec!['ت', 'و', 'ن', 'س']
}

fn default_identifier_variants() -> Vec<String> {
    ["تونش", "نونس", "توتس", "تولس", "ثونس", "بونس"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_min_plate_area() -> u64 {
    500
}

fn default_min_aspect_ratio() -> f32 {
    1.5
}

fn default_max_aspect_ratio() -> f32 {
    6.0
}

fn default_localizer_confidence() -> f32 {
    0.5
}

fn default_dedup_bucket_size() -> u32 {
    10
}

fn default_max_detection_dimension() -> u32 {
    1200
}

fn default_contour_candidates() -> usize {
    15
}

fn default_font_scale() -> f32 {
    24.0
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            identifier_word: default_identifier_word(),
            identifier_letters: default_identifier_letters(),
            identifier_variants: default_identifier_variants(),
            min_plate_area: default_min_plate_area(),
            min_aspect_ratio: default_min_aspect_ratio(),
            max_aspect_ratio: default_max_aspect_ratio(),
            localizer_confidence: default_localizer_confidence(),
            dedup_bucket_size: default_dedup_bucket_size(),
            max_detection_dimension: default_max_detection_dimension(),
            contour_candidates: default_contour_candidates(),
            render: RenderConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Defaults with `LPR_*` environment overrides applied
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(area) = env::var("LPR_MIN_PLATE_AREA") {
            config.min_plate_area = area
                .parse()
                .context("Invalid LPR_MIN_PLATE_AREA")?;
        }
        if let Ok(threshold) = env::var("LPR_LOCALIZER_CONFIDENCE") {
            config.localizer_confidence = threshold
                .parse()
                .context("Invalid LPR_LOCALIZER_CONFIDENCE")?;
        }
        if let Ok(font_path) = env::var("LPR_FONT_PATH") {
            config.render.font_path = Some(font_path);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        validate_word(&self.identifier_word, "identifier_word")?;
        for variant in &self.identifier_variants {
            validate_word(variant, "identifier_variants")?;
        }
        if self.identifier_letters.is_empty() {
            anyhow::bail!("identifier_letters cannot be empty");
        }
        validate_range(self.min_aspect_ratio, 0.1, self.max_aspect_ratio, "min_aspect_ratio")?;
        validate_range(self.max_aspect_ratio, self.min_aspect_ratio, 50.0, "max_aspect_ratio")?;
        validate_unit_interval(self.localizer_confidence, "localizer_confidence")?;
        validate_range(self.dedup_bucket_size, 1, 1000, "dedup_bucket_size")?;
        validate_range(self.max_detection_dimension, 64, 16_384, "max_detection_dimension")?;
        validate_range(self.contour_candidates, 1, 1000, "contour_candidates")?;
        validate_range(self.render.font_scale, 1.0, 512.0, "render.font_scale")?;
        Ok(())
    }

    /// True when a region of the given size passes the plate geometry filter
    pub fn accepts_geometry(&self, width: u32, height: u32) -> bool {
        if width == 0 || height == 0 {
            return false;
        }
        let aspect_ratio = width as f32 / height as f32;
        let area = width as u64 * height as u64;
        aspect_ratio >= self.min_aspect_ratio
            && aspect_ratio <= self.max_aspect_ratio
            && area >= self.min_plate_area
    }
}

/// ONNX Runtime session settings shared by the localizer and the recognizer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnnxModelConfig {
    /// Path to the ONNX model file
    pub model_path: String,

    /// Execution provider preference (CPU, CUDA, TensorRT)
    #[serde(default = "default_execution_provider")]
    pub execution_provider: String,

    /// GPU device ID (0, 1, 2, etc.)
    #[serde(default = "default_device_id")]
    pub device_id: i32,

    /// Number of intra-operation threads
    #[serde(default = "default_intra_threads")]
    pub intra_threads: usize,

    /// Number of inter-operation threads
    #[serde(default = "default_inter_threads")]
    pub inter_threads: usize,
}

fn default_execution_provider() -> String {
    "CPU".to_string()
}

fn default_device_id() -> i32 {
    0
}

fn default_intra_threads() -> usize {
    4
}

fn default_inter_threads() -> usize {
    1
}

impl OnnxModelConfig {
    pub fn new(model_path: impl Into<String>) -> Self {
        Self {
            model_path: model_path.into(),
            execution_provider: default_execution_provider(),
            device_id: default_device_id(),
            intra_threads: default_intra_threads(),
            inter_threads: default_inter_threads(),
        }
    }

    /// Apply `LPR_EXECUTION_PROVIDER` / `LPR_DEVICE_ID` overrides
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(provider) = env::var("LPR_EXECUTION_PROVIDER") {
            self.execution_provider = provider;
        }
        if let Ok(device_id) = env::var("LPR_DEVICE_ID") {
            if let Ok(id) = device_id.parse::<i32>() {
                self.device_id = id;
            }
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.identifier_word, "تونس");
        assert_eq!(config.identifier_letters.len(), 4);
        assert_eq!(config.min_plate_area, 500);
        assert_eq!(config.min_aspect_ratio, 1.5);
        assert_eq!(config.max_aspect_ratio, 6.0);
        assert_eq!(config.dedup_bucket_size, 10);
        assert_eq!(config.contour_candidates, 15);
        assert!(config.render.font_path.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_partial_deserialization() {
        let config: PipelineConfig = serde_json::from_value(serde_json::json!({
            "min_plate_area": 1000,
            "max_aspect_ratio": 5.0
        }))
        .unwrap();

        assert_eq!(config.min_plate_area, 1000);
        assert_eq!(config.max_aspect_ratio, 5.0);
        assert_eq!(config.min_aspect_ratio, 1.5);
        assert_eq!(config.identifier_word, "تونس");
        assert_eq!(config.render.font_scale, 24.0);
    }

    #[test]
    fn test_config_validation_rejects_bad_values() {
        let mut config = PipelineConfig::default();
        config.localizer_confidence = 1.5;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.identifier_word = " ".to_string();
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.min_aspect_ratio = 7.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_accepts_geometry() {
        let config = PipelineConfig::default();
        // 3:1 and large enough
        assert!(config.accepts_geometry(120, 40));
        // exactly on the bounds
        assert!(config.accepts_geometry(30, 20));
        assert!(config.accepts_geometry(120, 20));
        // too square
        assert!(!config.accepts_geometry(40, 40));
        // too elongated
        assert!(!config.accepts_geometry(130, 20));
        // too small
        assert!(!config.accepts_geometry(30, 10));
        assert!(!config.accepts_geometry(0, 10));
    }

    #[test]
    fn test_onnx_config_defaults() {
        let config = OnnxModelConfig::new("models/plate.onnx");
        assert_eq!(config.model_path, "models/plate.onnx");
        assert_eq!(config.execution_provider, "CPU");
        assert_eq!(config.intra_threads, 4);
    }

    // the only test touching LPR_* variables
    #[test]
    fn test_env_overrides() {
        env::set_var("LPR_MIN_PLATE_AREA", "800");
        env::set_var("LPR_LOCALIZER_CONFIDENCE", "0.4");
        env::set_var("LPR_EXECUTION_PROVIDER", "CUDA");
        env::set_var("LPR_DEVICE_ID", "2");

        let config = PipelineConfig::from_env().unwrap();
        assert_eq!(config.min_plate_area, 800);
        assert_eq!(config.localizer_confidence, 0.4);

        let onnx = OnnxModelConfig::new("models/plate.onnx").with_env_overrides();
        assert_eq!(onnx.execution_provider, "CUDA");
        assert_eq!(onnx.device_id, 2);

        env::set_var("LPR_DEVICE_ID", "gpu");
        let onnx = OnnxModelConfig::new("models/plate.onnx").with_env_overrides();
        assert_eq!(onnx.device_id, 0);

        env::set_var("LPR_LOCALIZER_CONFIDENCE", "high");
        assert!(PipelineConfig::from_env().is_err());

        for key in [
            "LPR_MIN_PLATE_AREA",
            "LPR_LOCALIZER_CONFIDENCE",
            "LPR_EXECUTION_PROVIDER",
            "LPR_DEVICE_ID",
        ] {
            env::remove_var(key);
        }
    }
}
