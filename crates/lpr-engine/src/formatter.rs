//! Turns the hits of one region into a formatted, scored plate candidate.

use crate::identifier::IdentifierDetection;
use anyhow::{Context, Result};
use common::plates::{unit_score, PlateCandidate, RecognitionHit};
use regex::Regex;
use std::cmp::Ordering;

const TWO_GROUP_FACTOR: f32 = 0.8;
const ONE_GROUP_FACTOR: f32 = 0.6;
const NUMBERS_ONLY_CONFIDENCE: f32 = 0.3;
const IDENTIFIER_ONLY_CONFIDENCE: f32 = 0.2;
const NOTHING_CONFIDENCE: f32 = 0.1;

const DETECTION_WEIGHT: f32 = 0.3;
const TEXT_WEIGHT: f32 = 0.7;

/// Plate text returned when neither digits nor identifier were read
pub const UNKNOWN_PLATE: &str = "Unknown plate";

pub struct PlateFormatter {
    digit_runs: Regex,
    identifier_word: String,
}

impl PlateFormatter {
    pub fn new(identifier_word: impl Into<String>) -> Result<Self> {
        Ok(Self {
            digit_runs: Regex::new("[0-9]+").context("Invalid digit pattern")?,
            identifier_word: identifier_word.into(),
        })
    }

    /// Maximal digit runs, longest first; equal lengths keep reading order
    pub fn extract_number_groups(&self, text: &str) -> Vec<String> {
        let mut groups = self.digit_runs_in(text);
        groups.sort_by_key(|g| std::cmp::Reverse(g.len()));
        groups
    }

    fn digit_runs_in(&self, text: &str) -> Vec<String> {
        let ascii: String = text.chars().map(to_ascii_digit).collect();
        self.digit_runs
            .find_iter(&ascii)
            .map(|m| m.as_str().to_string())
            .collect()
    }

    /// Formatted text and its text confidence
    pub fn format(&self, identifier: &IdentifierDetection, groups: &[String]) -> (String, f32) {
        match (identifier.found, groups.len()) {
            (true, n) if n >= 2 => {
                let (first, second) = plate_slots(groups);
                (
                    format!("{} {} {}", groups[first], identifier.text, groups[second]),
                    identifier.confidence * TWO_GROUP_FACTOR,
                )
            }
            (true, 1) => (
                format!("{} {}", identifier.text, groups[0]),
                identifier.confidence * ONE_GROUP_FACTOR,
            ),
            (false, n) if n >= 1 => (format!("Plate: {}", groups.join(" ")), NUMBERS_ONLY_CONFIDENCE),
            _ if !identifier.text.is_empty() => (identifier.text.clone(), IDENTIFIER_ONLY_CONFIDENCE),
            _ => (UNKNOWN_PLATE.to_string(), NOTHING_CONFIDENCE),
        }
    }

    /// Rewrite a plate as `"<smaller> <identifier> <larger>"`, or
    /// `"<n> <identifier>"` with a single number; `None` without digits.
    pub fn standardize(&self, text: &str) -> Option<String> {
        let mut groups = self.digit_runs_in(text);
        match groups.len() {
            0 => None,
            1 => Some(format!("{} {}", groups[0], self.identifier_word)),
            _ => {
                groups.sort_by(|a, b| numeric_cmp(a, b));
                let smaller = groups.first()?;
                let larger = groups.last()?;
                Some(format!("{} {} {}", smaller, self.identifier_word, larger))
            }
        }
    }

    /// Score the hits of one region detected with `detection_confidence`
    pub fn candidate(
        &self,
        detection_confidence: f32,
        hits: &[RecognitionHit],
        identifier: IdentifierDetection,
    ) -> PlateCandidate {
        let groups = self.extract_number_groups(&combined_text(hits));
        let (formatted_text, text_confidence) = self.format(&identifier, &groups);
        let standardized_text = self.standardize(&formatted_text);

        PlateCandidate {
            is_standard_format: is_standard_format(identifier.found, &groups),
            combined_confidence: combined_confidence(detection_confidence, text_confidence),
            formatted_text,
            identifier_text: identifier.text,
            number_groups: groups,
            text_confidence,
            identifier_replaced: identifier.replaced,
            identifier_quad: identifier.quad,
            standardized_text,
        }
    }
}

/// All hit texts joined by single spaces
pub fn combined_text(hits: &[RecognitionHit]) -> String {
    hits.iter()
        .map(|h| h.text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Indices of the left and right plate numbers, always distinct
fn plate_slots(groups: &[String]) -> (usize, usize) {
    let first = groups.iter().position(|g| g.len() <= 3).unwrap_or(0);
    let second = groups
        .iter()
        .enumerate()
        .position(|(i, g)| i != first && (2..=4).contains(&g.len()))
        .or_else(|| (0..groups.len()).find(|&i| i != first))
        .unwrap_or(first);
    (first, second)
}

/// Identifier present plus two distinct groups: one of at most 3 digits and
/// another of 2 to 4 digits.
pub fn is_standard_format(identifier_found: bool, groups: &[String]) -> bool {
    if !identifier_found || groups.len() < 2 {
        return false;
    }
    groups.iter().enumerate().any(|(i, left)| {
        left.len() <= 3
            && groups
                .iter()
                .enumerate()
                .any(|(j, right)| j != i && (2..=4).contains(&right.len()))
    })
}

pub fn combined_confidence(detection: f32, text: f32) -> f32 {
    unit_score(detection * DETECTION_WEIGHT + text * TEXT_WEIGHT)
}

/// Map Eastern-Arabic and Persian digits to ASCII
fn to_ascii_digit(c: char) -> char {
    let offset = match c {
        '\u{0660}'..='\u{0669}' => c as u32 - 0x0660,
        '\u{06F0}'..='\u{06F9}' => c as u32 - 0x06F0,
        _ => return c,
    };
    char::from_digit(offset, 10).unwrap_or(c)
}

fn numeric_cmp(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}
