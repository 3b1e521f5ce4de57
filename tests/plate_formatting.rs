/// Identifier matching, plate formatting and candidate selection through the public API
use common::plates::{DetectionSource, MatchRule, PlateCandidate, Quad, RecognitionHit, Region};
use image::RgbImage;
use lpr_engine::formatter::{combined_confidence, combined_text, is_standard_format};
use lpr_engine::{BestCandidateSelector, IdentifierMatcher, PipelineConfig, PlateFormatter, Selection};

fn hits(texts: &[(&str, f32)]) -> Vec<RecognitionHit> {
    texts
        .iter()
        .enumerate()
        .map(|(i, (text, confidence))| {
            RecognitionHit::new(Quad::from_rect(i as f32 * 40.0, 0.0, 40.0, 20.0), *text, *confidence, "test")
        })
        .collect()
}

fn groups(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

#[test]
fn test_identifier_rule_ladder() {
    let matcher = IdentifierMatcher::new(&PipelineConfig::default());
    let cases = [
        ("لوحة تونس", MatchRule::Exact, 1.0),
        ("بونس", MatchRule::KnownVariant, 0.9),
        ("تو", MatchRule::LetterSubset, 0.6),
        ("باب", MatchRule::WeakScript, 0.3),
        ("TN", MatchRule::None, 0.0),
    ];
    for (text, rule, confidence) in cases {
        let m = matcher.match_text(text);
        assert_eq!(m.rule, rule, "{}", text);
        assert!((m.confidence - confidence).abs() < 1e-6, "{}", text);
        assert_eq!(m.matched, rule != MatchRule::None);
    }
}

#[test]
fn test_custom_identifier_variants() {
    let config = PipelineConfig {
        identifier_variants: vec!["تونص".to_string()],
        ..PipelineConfig::default()
    };
    let matcher = IdentifierMatcher::new(&config);
    assert_eq!(matcher.match_text("تونص").rule, MatchRule::KnownVariant);
    // no longer a known variant, still shares letters
    assert_eq!(matcher.match_text("تونش").rule, MatchRule::LetterSubset);
}

#[test]
fn test_end_to_end_fragments() {
    let hits = hits(&[("123", 0.9), ("تونس", 0.95), ("4567", 0.88)]);
    let matcher = IdentifierMatcher::new(&PipelineConfig::default());
    let formatter = PlateFormatter::new("تونس").unwrap();

    assert_eq!(combined_text(&hits), "123 تونس 4567");
    assert_eq!(formatter.extract_number_groups(&combined_text(&hits)), groups(&["4567", "123"]));

    let identifier = matcher.scan(&hits);
    assert_eq!(identifier.quad, Some(Quad::from_rect(40.0, 0.0, 40.0, 20.0)));

    let candidate = formatter.candidate(0.3, &hits, identifier);
    assert_eq!(candidate.formatted_text, "123 تونس 4567");
    assert!((candidate.text_confidence - 0.8).abs() < 1e-6);
    assert!(candidate.is_standard_format);
}

#[test]
fn test_number_groups_and_standard_format() {
    let formatter = PlateFormatter::new("تونس").unwrap();
    assert_eq!(formatter.extract_number_groups("12A34"), groups(&["12", "34"]));

    assert!(is_standard_format(true, &groups(&["7", "1234"])));
    assert!(!is_standard_format(true, &groups(&["12345"])));
}

#[test]
fn test_combined_confidence_monotonic() {
    let mut previous = -1.0;
    for step in 0..=10 {
        let detection = step as f32 / 10.0;
        let combined = combined_confidence(detection, 0.56);
        assert!(combined >= previous);
        assert!((0.0..=1.0).contains(&combined));
        previous = combined;
    }
}

#[test]
fn test_candidate_serializes_for_callers() {
    let formatter = PlateFormatter::new("تونس").unwrap();
    let matcher = IdentifierMatcher::new(&PipelineConfig::default());
    let hits = hits(&[("55", 0.7)]);
    let candidate = formatter.candidate(0.5, &hits, matcher.scan(&hits));

    let json = serde_json::to_value(&candidate).unwrap();
    assert_eq!(json["formatted_text"], "Plate: 55");
    assert_eq!(json["standardized_text"], "55 تونس");
    assert!(json.get("identifier_quad").is_none());

    let back: PlateCandidate = serde_json::from_value(json).unwrap();
    assert_eq!(back, candidate);
}

#[test]
fn test_selector_keeps_highest() {
    let mut selector = BestCandidateSelector::new();
    let formatter = PlateFormatter::new("تونس").unwrap();
    let matcher = IdentifierMatcher::new(&PipelineConfig::default());

    for (i, confidence) in [0.2f32, 0.75, 0.5].into_iter().enumerate() {
        let hits = hits(&[("55", 0.7)]);
        let mut candidate = formatter.candidate(0.5, &hits, matcher.scan(&hits));
        candidate.combined_confidence = confidence;
        selector.offer(Selection {
            region: Region::new(i as u32 * 100, 0, 90, 30, 0.5, DetectionSource::Contour),
            candidate,
            crop: RgbImage::new(90, 30),
        });
    }

    assert_eq!(selector.best_confidence(), 0.75);
    assert_eq!(selector.finish().unwrap().region.x, 100);
    assert!(BestCandidateSelector::new().finish().is_none());
}
