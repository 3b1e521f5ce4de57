//! `process`: normalize, detect, recognize every region and keep the best plate.

use crate::config::PipelineConfig;
use crate::detect::onnx_localizer::LocalizerConfig;
use crate::detect::{CascadeClassifier, OnnxPlateLocalizer, PlateLocalizer, RegionDetector};
use crate::formatter::PlateFormatter;
use crate::guard::guarded;
use crate::identifier::IdentifierMatcher;
use crate::normalize::{normalize, normalize_bytes};
use crate::preprocess::generate_variants;
use crate::recognition::{CrnnConfig, CrnnRecognizer, RecognitionFusion, SecondaryRecognizer, TextRecognizer};
use crate::render::PlateRenderer;
use crate::selector::{BestCandidateSelector, Selection};
use ab_glyph::FontArc;
use anyhow::{Context, Result};
use common::plates::{PlateCandidate, Region};
use image::{DynamicImage, RgbImage};
use std::sync::Arc;
use std::time::Instant;
use telemetry::metrics::{LPR_CANDIDATE_CONFIDENCE, LPR_IMAGES_PROCESSED, LPR_PROCESS_LATENCY};

/// The winning plate of one image
#[derive(Debug, Clone)]
pub struct BestResult {
    pub region: Region,
    pub candidate: PlateCandidate,
    /// Region cut from the normalized image
    pub crop: RgbImage,
    pub visualization: RgbImage,
}

#[derive(Debug, Clone)]
pub struct ProcessOutcome {
    /// Normalized input with every read region boxed and labelled
    pub annotated: RgbImage,
    pub best: Option<BestResult>,
    /// Combined confidence of `best`, 0.0 without one
    pub confidence: f32,
}

impl ProcessOutcome {
    pub fn plate_text(&self) -> Option<&str> {
        self.best.as_ref().map(|b| b.candidate.formatted_text.as_str())
    }

    pub fn crop(&self) -> Option<&RgbImage> {
        self.best.as_ref().map(|b| &b.crop)
    }

    pub fn visualization(&self) -> Option<&RgbImage> {
        self.best.as_ref().map(|b| &b.visualization)
    }
}

pub struct PlatePipeline {
    config: Arc<PipelineConfig>,
    detector: RegionDetector,
    fusion: RecognitionFusion,
    matcher: IdentifierMatcher,
    formatter: PlateFormatter,
    renderer: PlateRenderer,
}

impl PlatePipeline {
    pub fn builder(primary: Box<dyn TextRecognizer>) -> PlatePipelineBuilder {
        PlatePipelineBuilder::new(primary)
    }

    /// Pipeline over the ONNX CRNN recognizer and, when configured, the ONNX localizer
    pub fn from_models(
        config: PipelineConfig,
        mut recognizer: CrnnConfig,
        localizer: Option<LocalizerConfig>,
    ) -> Result<Self> {
        recognizer.model = recognizer.model.with_env_overrides();
        let primary = CrnnRecognizer::new(recognizer).context("Recognition engine is required")?;
        let mut builder = Self::builder(Box::new(primary)).config(config);

        if let Some(mut localizer_config) = localizer {
            localizer_config.model = localizer_config.model.with_env_overrides();
            match OnnxPlateLocalizer::new(localizer_config) {
                Ok(localizer) => builder = builder.localizer(Box::new(localizer)),
                Err(e) => tracing::warn!(error = %e, "plate localizer unavailable, using classical strategies"),
            }
        }
        builder.build()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn detector(&self) -> &RegionDetector {
        &self.detector
    }

    /// Run the full pipeline; never fails, degraded stages only lower the result
    pub fn process(&self, image: Option<&DynamicImage>) -> ProcessOutcome {
        self.process_rgb(normalize(image))
    }

    /// Decode an encoded image and run the pipeline on it
    pub fn process_bytes(&self, data: &[u8]) -> ProcessOutcome {
        self.process_rgb(normalize_bytes(data))
    }

    fn process_rgb(&self, image: RgbImage) -> ProcessOutcome {
        let (width, height) = image.dimensions();
        let span = tracing::info_span!("plate_pipeline", width, height);
        let _enter = span.enter();
        let started = Instant::now();

        let mut annotated = image.clone();
        let mut selector = BestCandidateSelector::new();

        let regions = self.detector.detect(&image);
        tracing::debug!(regions = regions.len(), "regions to read");

        for (index, region) in regions.into_iter().enumerate() {
            if !region.fits_within(width, height) {
                tracing::warn!(?region, "skipping malformed region");
                continue;
            }

            let evaluated = guarded("region", || Ok(self.evaluate_region(&image, &region)));
            match evaluated {
                Ok(Some((candidate, crop))) => {
                    tracing::debug!(
                        index,
                        source = region.source.as_str(),
                        text = %candidate.formatted_text,
                        confidence = candidate.combined_confidence,
                        "region read"
                    );
                    self.renderer.annotate(&mut annotated, &region, &candidate);
                    selector.offer(Selection {
                        region,
                        candidate,
                        crop,
                    });
                }
                Ok(None) => tracing::debug!(index, "no text in region"),
                Err(e) => tracing::warn!(index, error = %e, "region evaluation failed"),
            }
        }

        let best = selector.finish().map(|selection| BestResult {
            visualization: self.renderer.visualization(&selection.candidate),
            region: selection.region,
            candidate: selection.candidate,
            crop: selection.crop,
        });
        let confidence = best
            .as_ref()
            .map_or(0.0, |b| b.candidate.combined_confidence);

        let outcome = if best.is_some() { "plate" } else { "no_plate" };
        LPR_IMAGES_PROCESSED.with_label_values(&[outcome]).inc();
        LPR_PROCESS_LATENCY.observe(started.elapsed().as_secs_f64());
        if let Some(best) = &best {
            LPR_CANDIDATE_CONFIDENCE.observe(confidence as f64);
            tracing::info!(
                plate = %best.candidate.formatted_text,
                confidence,
                standard = best.candidate.is_standard_format,
                "plate recognized"
            );
        } else {
            tracing::info!("no plate recognized");
        }

        ProcessOutcome {
            annotated,
            best,
            confidence,
        }
    }

    /// Candidate and crop for one region, `None` when no engine read anything
    fn evaluate_region(&self, image: &RgbImage, region: &Region) -> Option<(PlateCandidate, RgbImage)> {
        let crop = image::imageops::crop_imm(image, region.x, region.y, region.width, region.height).to_image();
        let variants = generate_variants(&crop);
        let hits = self.fusion.recognize(&variants);
        if hits.is_empty() {
            return None;
        }

        let identifier = self.matcher.scan(&hits);
        let candidate = self.formatter.candidate(region.confidence, &hits, identifier);
        Some((candidate, crop))
    }
}

/// Wires configuration and collaborators into a [`PlatePipeline`]
pub struct PlatePipelineBuilder {
    config: PipelineConfig,
    primary: Box<dyn TextRecognizer>,
    secondary: Option<Box<dyn SecondaryRecognizer>>,
    localizer: Option<Box<dyn PlateLocalizer>>,
    cascade: Option<Box<dyn CascadeClassifier>>,
    font: Option<FontArc>,
}

impl PlatePipelineBuilder {
    pub fn new(primary: Box<dyn TextRecognizer>) -> Self {
        Self {
            config: PipelineConfig::default(),
            primary,
            secondary: None,
            localizer: None,
            cascade: None,
            font: None,
        }
    }

    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn secondary(mut self, secondary: Box<dyn SecondaryRecognizer>) -> Self {
        self.secondary = Some(secondary);
        self
    }

    pub fn localizer(mut self, localizer: Box<dyn PlateLocalizer>) -> Self {
        self.localizer = Some(localizer);
        self
    }

    pub fn cascade(mut self, cascade: Box<dyn CascadeClassifier>) -> Self {
        self.cascade = Some(cascade);
        self
    }

    /// Font for labels and the visualization, taking precedence over `render.font_path`
    pub fn font(mut self, font: FontArc) -> Self {
        self.font = Some(font);
        self
    }

    pub fn build(self) -> Result<PlatePipeline> {
        self.config.validate().context("Invalid pipeline configuration")?;
        let config = Arc::new(self.config);

        let renderer = match self.font {
            Some(font) => PlateRenderer::new(Some(font), config.render.font_scale, config.identifier_word.clone()),
            None => PlateRenderer::from_config(&config.render, config.identifier_word.clone()),
        };

        let mut fusion = RecognitionFusion::new(self.primary);
        if let Some(secondary) = self.secondary {
            fusion = fusion.with_secondary(secondary);
        }

        let detector = RegionDetector::standard(config.clone(), self.localizer, self.cascade);
        tracing::info!(
            strategies = ?detector.strategy_names(),
            engines = ?fusion.engine_names(),
            labels = renderer.has_font(),
            "plate pipeline ready"
        );

        Ok(PlatePipeline {
            matcher: IdentifierMatcher::new(&config),
            formatter: PlateFormatter::new(config.identifier_word.clone())?,
            config,
            detector,
            fusion,
            renderer,
        })
    }
}
