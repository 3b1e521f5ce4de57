use super::TextRecognizer;
use crate::config::OnnxModelConfig;
use crate::onnx::OnnxSession;
use anyhow::{Context, Result};
use common::plates::{Quad, RecognitionHit};
use image::RgbImage;
use ndarray::{Array, IxDyn};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrnnConfig {
    #[serde(flatten)]
    pub model: OnnxModelConfig,

    /// Model input width
    #[serde(default = "default_input_width")]
    pub input_width: u32,

    /// Model input height
    #[serde(default = "default_input_height")]
    pub input_height: u32,

    /// Output classes after the CTC blank at index 0
    #[serde(default = "default_char_vocab")]
    pub char_vocab: String,

    /// Whether the model emits logits that still need a softmax
    #[serde(default = "default_apply_softmax")]
    pub apply_softmax: bool,
}

fn default_input_width() -> u32 {
    200
}

fn default_input_height() -> u32 {
    64
}

fn default_char_vocab() -> String {
    "0123456789ابتثجحخدذرزسشصضطظعغفقكلمنهوي".to_string()
}

fn default_apply_softmax() -> bool {
    true
}

impl CrnnConfig {
    pub fn new(model_path: impl Into<String>) -> Self {
        Self {
            model: OnnxModelConfig::new(model_path),
            input_width: default_input_width(),
            input_height: default_input_height(),
            char_vocab: default_char_vocab(),
            apply_softmax: default_apply_softmax(),
        }
    }
}

/// CTC recognizer over a CRNN ONNX model; one hit per variant
pub struct CrnnRecognizer {
    config: CrnnConfig,
    vocab: Vec<char>,
    session: OnnxSession,
}

impl CrnnRecognizer {
    pub fn new(config: CrnnConfig) -> Result<Self> {
        let session = OnnxSession::load("plate_ocr", &config.model)
            .context("Failed to initialize CRNN recognizer")?;
        let vocab = config.char_vocab.chars().collect();
        Ok(Self {
            config,
            vocab,
            session,
        })
    }

    /// NCHW grayscale tensor `[1, 1, H, W]` in [0, 1]
    fn preprocess(&self, image: &RgbImage) -> Array<f32, IxDyn> {
        let (width, height) = (self.config.input_width, self.config.input_height);
        let gray = image::imageops::grayscale(image);
        let resized = image::imageops::resize(&gray, width, height, image::imageops::FilterType::Triangle);

        let mut input = Array::zeros(IxDyn(&[1, 1, height as usize, width as usize]));
        for (x, y, pixel) in resized.enumerate_pixels() {
            input[[0, 0, y as usize, x as usize]] = pixel[0] as f32 / 255.0;
        }
        input
    }
}

impl TextRecognizer for CrnnRecognizer {
    fn name(&self) -> &str {
        "crnn"
    }

    fn read_text(&self, image: &RgbImage) -> Result<Vec<RecognitionHit>> {
        let input = self.preprocess(image);
        let output = self.session.run(input, &["output", "output0", "logits"])?;

        let Some((text, confidence)) = ctc_decode(&output, &self.vocab, self.config.apply_softmax)? else {
            return Ok(Vec::new());
        };
        let quad = Quad::from_rect(0.0, 0.0, image.width() as f32, image.height() as f32);
        Ok(vec![RecognitionHit::new(quad, text, confidence, self.name())])
    }
}

/// Greedy CTC decoding of a `[1, T, V]` output with the blank at index 0.
///
/// Returns the text and the mean probability of the emitted characters, or
/// `None` when nothing but blanks was emitted.
fn ctc_decode(output: &Array<f32, IxDyn>, vocab: &[char], apply_softmax: bool) -> Result<Option<(String, f32)>> {
    let shape = output.shape();
    if shape.len() != 3 || shape[2] == 0 {
        anyhow::bail!("Unexpected recognizer output shape {:?}", shape);
    }
    let (sequence_length, vocab_size) = (shape[1], shape[2]);

    let mut text = String::new();
    let mut probabilities = Vec::new();
    let mut prev_idx = 0;

    for t in 0..sequence_length {
        let row: Vec<f32> = (0..vocab_size).map(|c| output[[0, t, c]]).collect();
        let (max_idx, max_value) = row
            .iter()
            .copied()
            .enumerate()
            .fold((0, f32::NEG_INFINITY), |best, (i, v)| if v > best.1 { (i, v) } else { best });

        if max_idx > 0 && max_idx != prev_idx {
            if let Some(&ch) = vocab.get(max_idx - 1) {
                text.push(ch);
                let probability = if apply_softmax {
                    let denominator: f32 = row.iter().map(|v| (v - max_value).exp()).sum();
                    1.0 / denominator
                } else {
                    max_value
                };
                probabilities.push(probability);
            }
        }
        prev_idx = max_idx;
    }

    if text.is_empty() {
        return Ok(None);
    }
    let confidence = probabilities.iter().sum::<f32>() / probabilities.len() as f32;
    Ok(Some((text, confidence.clamp(0.0, 1.0))))
}
