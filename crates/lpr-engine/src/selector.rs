use common::plates::{PlateCandidate, Region};
use image::RgbImage;

/// A scored candidate together with the region and crop it came from
#[derive(Debug, Clone)]
pub struct Selection {
    pub region: Region,
    pub candidate: PlateCandidate,
    pub crop: RgbImage,
}

impl Selection {
    pub fn confidence(&self) -> f32 {
        self.candidate.combined_confidence
    }
}

/// Keeps the candidate with the strictly highest combined confidence
#[derive(Debug, Default)]
pub struct BestCandidateSelector {
    best: Option<Selection>,
}

impl BestCandidateSelector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when `selection` became the new best; ties keep the earlier one
    pub fn offer(&mut self, selection: Selection) -> bool {
        let better = self
            .best
            .as_ref()
            .map_or(true, |best| selection.confidence() > best.confidence());
        if better {
            self.best = Some(selection);
        }
        better
    }

    /// Confidence of the current best, 0.0 when nothing was offered
    pub fn best_confidence(&self) -> f32 {
        self.best.as_ref().map_or(0.0, Selection::confidence)
    }

    pub fn finish(self) -> Option<Selection> {
        self.best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::plates::DetectionSource;

    fn selection(confidence: f32, x: u32) -> Selection {
        Selection {
            region: Region::new(x, 0, 90, 30, 0.5, DetectionSource::Contour),
            candidate: PlateCandidate {
                formatted_text: format!("plate {}", x),
                identifier_text: String::new(),
                number_groups: vec![],
                text_confidence: confidence,
                combined_confidence: confidence,
                is_standard_format: false,
                identifier_replaced: false,
                identifier_quad: None,
                standardized_text: None,
            },
            crop: RgbImage::new(90, 30),
        }
    }

    #[test]
    fn test_highest_confidence_wins() {
        let mut selector = BestCandidateSelector::new();
        for (i, confidence) in [0.2, 0.75, 0.5].into_iter().enumerate() {
            selector.offer(selection(confidence, i as u32));
        }
        assert_eq!(selector.best_confidence(), 0.75);
        let best = selector.finish().unwrap();
        assert_eq!(best.region.x, 1);
    }

    #[test]
    fn test_tie_keeps_first() {
        let mut selector = BestCandidateSelector::new();
        assert!(selector.offer(selection(0.6, 0)));
        assert!(!selector.offer(selection(0.6, 1)));
        assert_eq!(selector.finish().unwrap().region.x, 0);
    }

    #[test]
    fn test_empty_selector() {
        let selector = BestCandidateSelector::new();
        assert_eq!(selector.best_confidence(), 0.0);
        assert!(selector.finish().is_none());
    }
}
