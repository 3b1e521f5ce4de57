//! Fuzzy matching of the national identifier word among recognized text.

use crate::config::PipelineConfig;
use common::plates::{IdentifierMatch, MatchRule, Quad, RecognitionHit};

const EXACT_CONFIDENCE: f32 = 1.0;
const VARIANT_CONFIDENCE: f32 = 0.9;
const LETTER_BASE_CONFIDENCE: f32 = 0.4;
const LETTER_MAX_CONFIDENCE: f32 = 0.8;
const WEAK_SCRIPT_CONFIDENCE: f32 = 0.3;
const WEAK_SCRIPT_LETTERS: std::ops::RangeInclusive<usize> = 2..=6;

/// Best identifier occurrence across all hits of a region
#[derive(Debug, Clone, PartialEq)]
pub struct IdentifierDetection {
    pub found: bool,
    /// Canonical identifier when found, empty otherwise
    pub text: String,
    pub confidence: f32,
    pub quad: Option<Quad>,
    /// True when a fuzzy rule reconstructed the identifier
    pub replaced: bool,
    pub rule: MatchRule,
}

impl IdentifierDetection {
    fn not_found() -> Self {
        Self {
            found: false,
            text: String::new(),
            confidence: 0.0,
            quad: None,
            replaced: false,
            rule: MatchRule::None,
        }
    }
}

pub struct IdentifierMatcher {
    word: String,
    variants: Vec<String>,
    letters: Vec<char>,
}

impl IdentifierMatcher {
    pub fn new(config: &PipelineConfig) -> Self {
        let mut letters = config.identifier_letters.clone();
        letters.dedup();
        Self {
            word: config.identifier_word.clone(),
            variants: config.identifier_variants.clone(),
            letters,
        }
    }

    pub fn word(&self) -> &str {
        &self.word
    }

    /// Apply the matching rules in order; the first that fires wins
    pub fn match_text(&self, text: &str) -> IdentifierMatch {
        let (rule, confidence) = if text.contains(self.word.as_str()) {
            (MatchRule::Exact, EXACT_CONFIDENCE)
        } else if self.variants.iter().any(|v| text.contains(v.as_str())) {
            (MatchRule::KnownVariant, VARIANT_CONFIDENCE)
        } else if let Some(confidence) = self.letter_subset_confidence(text) {
            (MatchRule::LetterSubset, confidence)
        } else if WEAK_SCRIPT_LETTERS.contains(&longest_arabic_run(text)) {
            (MatchRule::WeakScript, WEAK_SCRIPT_CONFIDENCE)
        } else {
            return IdentifierMatch::none(text);
        };

        IdentifierMatch {
            canonical_text: self.word.clone(),
            matched: true,
            confidence,
            rule,
        }
    }

    fn letter_subset_confidence(&self, text: &str) -> Option<f32> {
        let matched = self.letters.iter().filter(|&&l| text.contains(l)).count();
        if matched == 0 {
            return None;
        }
        let ratio = matched as f32 / self.letters.len() as f32;
        Some((LETTER_BASE_CONFIDENCE + ratio * LETTER_BASE_CONFIDENCE).min(LETTER_MAX_CONFIDENCE))
    }

    /// Find the identifier among `hits`.
    ///
    /// Hits are visited by confidence, highest first. An exact occurrence
    /// anywhere beats every fuzzy one; otherwise the first fuzzy match wins.
    pub fn scan(&self, hits: &[RecognitionHit]) -> IdentifierDetection {
        let mut ordered: Vec<&RecognitionHit> = hits.iter().collect();
        ordered.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

        let matches: Vec<(&RecognitionHit, IdentifierMatch)> = ordered
            .into_iter()
            .map(|hit| (hit, self.match_text(&hit.text)))
            .collect();

        let winner = matches
            .iter()
            .find(|(_, m)| m.rule == MatchRule::Exact)
            .or_else(|| matches.iter().find(|(_, m)| m.matched));

        match winner {
            Some((hit, m)) => {
                tracing::debug!(text = %hit.text, rule = ?m.rule, confidence = m.confidence, "identifier located");
                IdentifierDetection {
                    found: true,
                    text: m.canonical_text.clone(),
                    confidence: m.confidence,
                    quad: Some(hit.quad),
                    replaced: m.rule != MatchRule::Exact,
                    rule: m.rule,
                }
            }
            None => IdentifierDetection::not_found(),
        }
    }
}

/// Length in letters of the longest unbroken Arabic word in `text`
fn longest_arabic_run(text: &str) -> usize {
    text.split(|c: char| !is_arabic_letter(c))
        .map(|run| run.chars().count())
        .max()
        .unwrap_or(0)
}

fn is_arabic_letter(c: char) -> bool {
    let arabic_block = matches!(
        c,
        '\u{0600}'..='\u{06FF}'
            | '\u{0750}'..='\u{077F}'
            | '\u{08A0}'..='\u{08FF}'
            | '\u{FB50}'..='\u{FDFF}'
            | '\u{FE70}'..='\u{FEFF}'
    );
    arabic_block && c.is_alphabetic()
}
