/// End-to-end tests of the plate pipeline with fake collaborators
use anyhow::{anyhow, Result};
use common::plates::{DetectionSource, Quad, RecognitionHit};
use image::{DynamicImage, GrayImage, Rgb, RgbImage};
use lpr_engine::detect::Rect;
use lpr_engine::{
    CascadeClassifier, CascadeParams, NativeLine, PlateLocalizer, PlatePipeline, RawBox,
    SecondaryRecognizer, TextRecognizer,
};

fn hit(text: &str, confidence: f32) -> RecognitionHit {
    RecognitionHit::new(Quad::from_rect(0.0, 0.0, 10.0, 10.0), text, confidence, "fake")
}

/// Reads the same fragments from every image
struct FakeRecognizer(Vec<(&'static str, f32)>);

impl TextRecognizer for FakeRecognizer {
    fn name(&self) -> &str {
        "fake"
    }

    fn read_text(&self, _image: &RgbImage) -> Result<Vec<RecognitionHit>> {
        Ok(self.0.iter().map(|(text, confidence)| hit(text, *confidence)).collect())
    }
}

fn tunisian_plate_reader() -> FakeRecognizer {
    FakeRecognizer(vec![("123", 0.9), ("تونس", 0.95), ("4567", 0.9)])
}

/// Reads a full plate only from crops of the given width
struct WidthSensitiveRecognizer(u32);

impl TextRecognizer for WidthSensitiveRecognizer {
    fn name(&self) -> &str {
        "width_sensitive"
    }

    fn read_text(&self, image: &RgbImage) -> Result<Vec<RecognitionHit>> {
        if image.width() == self.0 {
            Ok(vec![hit("88", 0.9), hit("تونس", 0.9), hit("1234", 0.9)])
        } else {
            Ok(vec![hit("55", 0.9)])
        }
    }
}

struct PanickingRecognizer;

impl TextRecognizer for PanickingRecognizer {
    fn name(&self) -> &str {
        "panicking"
    }

    fn read_text(&self, _image: &RgbImage) -> Result<Vec<RecognitionHit>> {
        panic!("native engine crashed")
    }
}

struct FakeSecondary(Vec<NativeLine>);

impl SecondaryRecognizer for FakeSecondary {
    fn name(&self) -> &str {
        "fake_secondary"
    }

    fn read_lines(&self, _image: &RgbImage) -> Result<Vec<NativeLine>> {
        Ok(self.0.clone())
    }
}

struct FakeCascade(Vec<Rect>);

impl CascadeClassifier for FakeCascade {
    fn detect_multi_scale(&self, _image: &GrayImage, _params: &CascadeParams) -> Result<Vec<Rect>> {
        Ok(self.0.clone())
    }
}

struct FailingCascade;

impl CascadeClassifier for FailingCascade {
    fn detect_multi_scale(&self, _image: &GrayImage, _params: &CascadeParams) -> Result<Vec<Rect>> {
        Err(anyhow!("cascade file missing"))
    }
}

struct FakeLocalizer(Vec<RawBox>);

impl PlateLocalizer for FakeLocalizer {
    fn infer(&self, _image: &RgbImage, _threshold: f32) -> Result<Vec<RawBox>> {
        Ok(self.0.clone())
    }
}

fn gray_scene(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([90, 90, 90])))
}

#[test]
fn test_cascade_region_reads_standard_plate() {
    telemetry::init();
    let pipeline = PlatePipeline::builder(Box::new(tunisian_plate_reader()))
        .cascade(Box::new(FakeCascade(vec![(40, 60, 150, 50)])))
        .build()
        .unwrap();

    let outcome = pipeline.process(Some(&gray_scene(320, 240)));

    let best = outcome.best.as_ref().expect("plate should be found");
    assert_eq!(best.region.source, DetectionSource::Cascade);
    assert_eq!((best.region.x, best.region.y), (40, 60));
    assert_eq!(best.candidate.formatted_text, "123 تونس 4567");
    assert!((best.candidate.text_confidence - 0.8).abs() < 1e-5);
    assert!(best.candidate.is_standard_format);
    // 0.5 * 0.3 + 0.8 * 0.7
    assert!((outcome.confidence - 0.71).abs() < 1e-5);
    assert_eq!(outcome.crop().unwrap().dimensions(), (150, 50));
    assert_eq!(outcome.visualization().unwrap().dimensions(), (500, 180));

    // region boxed in green on the annotated copy
    assert_eq!(*outcome.annotated.get_pixel(40, 60), Rgb([0, 255, 0]));
    assert_eq!(*outcome.annotated.get_pixel(5, 5), Rgb([90, 90, 90]));
}

#[test]
fn test_all_black_image_falls_back_to_full_frame() {
    let black = DynamicImage::ImageRgb8(RgbImage::new(300, 100));

    let pipeline = PlatePipeline::builder(Box::new(FakeRecognizer(vec![]))).build().unwrap();
    let outcome = pipeline.process(Some(&black));
    assert!(outcome.best.is_none());
    assert!(outcome.confidence <= 0.3);
    assert_eq!(outcome.annotated.dimensions(), (300, 100));

    let pipeline = PlatePipeline::builder(Box::new(FakeRecognizer(vec![("4567", 0.9)])))
        .build()
        .unwrap();
    let outcome = pipeline.process(Some(&black));
    let best = outcome.best.as_ref().unwrap();
    assert_eq!(best.region.source, DetectionSource::FullFrame);
    assert_eq!(best.candidate.formatted_text, "Plate: 4567 4567 4567 4567 4567 4567 4567 4567 4567");
    assert!(outcome.confidence <= 0.3 + 1e-6);
}

#[test]
fn test_localizer_takes_precedence_over_cascade() {
    let pipeline = PlatePipeline::builder(Box::new(tunisian_plate_reader()))
        .localizer(Box::new(FakeLocalizer(vec![RawBox {
            x1: 100.0,
            y1: 100.0,
            x2: 280.0,
            y2: 160.0,
            confidence: 0.9,
        }])))
        .cascade(Box::new(FakeCascade(vec![(10, 10, 150, 50)])))
        .build()
        .unwrap();

    assert_eq!(
        pipeline.detector().strategy_names(),
        vec!["localizer", "cascade", "contour", "full_frame"]
    );

    let outcome = pipeline.process(Some(&gray_scene(400, 300)));
    let best = outcome.best.unwrap();
    assert_eq!(best.region.source, DetectionSource::Localizer);
    // 0.9 * 0.3 + 0.8 * 0.7
    assert!((best.candidate.combined_confidence - 0.83).abs() < 1e-5);
}

#[test]
fn test_unscored_localizer_box_keeps_confidence_in_range() {
    let pipeline = PlatePipeline::builder(Box::new(tunisian_plate_reader()))
        .localizer(Box::new(FakeLocalizer(vec![RawBox {
            x1: 10.0,
            y1: 10.0,
            x2: 160.0,
            y2: 60.0,
            confidence: f32::NAN,
        }])))
        .build()
        .unwrap();

    let outcome = pipeline.process(Some(&gray_scene(200, 100)));
    let best = outcome.best.as_ref().unwrap();
    assert_eq!(best.region.source, DetectionSource::Localizer);
    assert_eq!(best.region.confidence, 0.0);
    // 0.0 * 0.3 + 0.8 * 0.7
    assert!((outcome.confidence - 0.56).abs() < 1e-5);
}

#[test]
fn test_failing_cascade_and_rejected_shapes_fall_through() {
    let pipeline = PlatePipeline::builder(Box::new(tunisian_plate_reader()))
        .cascade(Box::new(FailingCascade))
        .build()
        .unwrap();
    let outcome = pipeline.process(Some(&gray_scene(200, 80)));
    assert_eq!(outcome.best.unwrap().region.source, DetectionSource::FullFrame);

    // square detections never reach the formatter
    let pipeline = PlatePipeline::builder(Box::new(tunisian_plate_reader()))
        .cascade(Box::new(FakeCascade(vec![(10, 10, 60, 60)])))
        .build()
        .unwrap();
    let outcome = pipeline.process(Some(&gray_scene(200, 80)));
    assert_ne!(outcome.best.unwrap().region.source, DetectionSource::Cascade);
}

#[test]
fn test_best_region_wins() {
    let pipeline = PlatePipeline::builder(Box::new(WidthSensitiveRecognizer(180)))
        .localizer(Box::new(FakeLocalizer(vec![
            RawBox {
                x1: 10.0,
                y1: 10.0,
                x2: 170.0,
                y2: 60.0,
                confidence: 0.9,
            },
            RawBox {
                x1: 200.0,
                y1: 150.0,
                x2: 380.0,
                y2: 210.0,
                confidence: 0.6,
            },
        ])))
        .build()
        .unwrap();

    let outcome = pipeline.process(Some(&gray_scene(400, 300)));
    let best = outcome.best.as_ref().unwrap();
    assert_eq!((best.region.x, best.region.y), (200, 150));
    assert_eq!(best.candidate.formatted_text, "88 تونس 1234");
    // 0.6 * 0.3 + 0.8 * 0.7
    assert!((outcome.confidence - 0.74).abs() < 1e-5);

    // both regions were read, so both are boxed
    assert_eq!(*outcome.annotated.get_pixel(10, 10), Rgb([0, 255, 0]));
    assert_eq!(*outcome.annotated.get_pixel(200, 150), Rgb([0, 255, 0]));
}

#[test]
fn test_secondary_engine_supplies_fuzzy_identifier() {
    let pipeline = PlatePipeline::builder(Box::new(FakeRecognizer(vec![("123", 0.9), ("4567", 0.9)])))
        .secondary(Box::new(FakeSecondary(vec![NativeLine {
            points: vec![[40.0, 5.0], [90.0, 5.0], [90.0, 40.0], [40.0, 40.0]],
            text: "تونش".to_string(),
            score: 0.8,
        }])))
        .build()
        .unwrap();

    let outcome = pipeline.process(Some(&gray_scene(150, 50)));
    let candidate = &outcome.best.as_ref().unwrap().candidate;
    assert_eq!(candidate.formatted_text, "123 تونس 4567");
    assert!(candidate.identifier_replaced);
    assert_eq!(
        candidate.identifier_quad,
        Some(Quad([[40.0, 5.0], [90.0, 5.0], [90.0, 40.0], [40.0, 40.0]]))
    );
    // 0.9 * 0.8
    assert!((candidate.text_confidence - 0.72).abs() < 1e-5);
}

#[test]
fn test_panicking_engine_never_escapes() {
    let pipeline = PlatePipeline::builder(Box::new(PanickingRecognizer)).build().unwrap();
    let outcome = pipeline.process(Some(&gray_scene(120, 40)));
    assert!(outcome.best.is_none());
    assert_eq!(outcome.confidence, 0.0);
}

#[test]
fn test_process_bytes_and_unusable_input() {
    let pipeline = PlatePipeline::builder(Box::new(tunisian_plate_reader())).build().unwrap();

    let mut png = Vec::new();
    gray_scene(150, 50)
        .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
        .unwrap();
    let outcome = pipeline.process_bytes(&png);
    assert_eq!(outcome.plate_text(), Some("123 تونس 4567"));

    // undecodable bytes are read as a white placeholder
    let outcome = pipeline.process_bytes(b"not an image");
    assert_eq!(outcome.annotated.dimensions(), (100, 100));
    assert!((0.0..=1.0).contains(&outcome.confidence));
}
