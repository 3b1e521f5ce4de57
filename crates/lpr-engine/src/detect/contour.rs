use super::{dedup_by_bucket, map_back, working_copy, Rect, RegionStrategy};
use crate::config::PipelineConfig;
use crate::preprocess::filters::{adaptive_threshold, bilateral_filter, to_gray};
use anyhow::Result;
use common::plates::{DetectionSource, Region};
use image::{GrayImage, RgbImage};
use imageproc::contours::find_contours;
use imageproc::edges::canny;
use imageproc::geometry::{approximate_polygon_dp, arc_length};
use imageproc::point::Point;
use std::sync::Arc;

/// Fixed confidence of contour detections
pub const CONTOUR_CONFIDENCE: f32 = 0.3;

const APPROX_EPSILON_RATIO: f64 = 0.02;
const MIN_VERTICES: usize = 4;
const MAX_VERTICES: usize = 8;

/// Plate-shaped polygons found on several binary edge maps
pub struct ContourStrategy {
    config: Arc<PipelineConfig>,
}

impl ContourStrategy {
    pub fn new(config: Arc<PipelineConfig>) -> Self {
        Self { config }
    }

    fn edge_maps(gray: &GrayImage) -> [GrayImage; 3] {
        let smoothed = bilateral_filter(gray, 11, 17.0, 17.0);
        [
            canny(&smoothed, 30.0, 200.0),
            canny(&smoothed, 50.0, 150.0),
            adaptive_threshold(&smoothed, 11, 2, true),
        ]
    }

    /// Bounding rectangles of the largest contours that simplify to 4-8 vertices
    fn polygon_rects(&self, edges: &GrayImage) -> Vec<Rect> {
        let mut contours: Vec<(f64, Vec<Point<i32>>)> = find_contours::<i32>(edges)
            .into_iter()
            .filter(|c| c.points.len() >= MIN_VERTICES)
            .map(|c| (polygon_area(&c.points), c.points))
            .collect();
        contours.sort_by(|a, b| b.0.total_cmp(&a.0));
        contours.truncate(self.config.contour_candidates);

        contours
            .into_iter()
            .filter_map(|(_, points)| {
                let epsilon = APPROX_EPSILON_RATIO * arc_length(&points, true);
                let approx = approximate_polygon_dp(&points, epsilon, true);
                (MIN_VERTICES..=MAX_VERTICES)
                    .contains(&approx.len())
                    .then(|| bounding_rect(&approx))
            })
            .collect()
    }
}

impl RegionStrategy for ContourStrategy {
    fn name(&self) -> &'static str {
        DetectionSource::Contour.as_str()
    }

    fn locate(&self, image: &RgbImage) -> Result<Vec<Region>> {
        let (working, scale) = working_copy(image, self.config.max_detection_dimension);
        let gray = to_gray(&working);

        let bounds = image.dimensions();
        let rects: Vec<Rect> = Self::edge_maps(&gray)
            .iter()
            .flat_map(|edges| self.polygon_rects(edges))
            .filter_map(|rect| map_back(rect, scale, bounds))
            .filter(|&(_, _, w, h)| self.config.accepts_geometry(w, h))
            .collect();

        Ok(dedup_by_bucket(rects, self.config.dedup_bucket_size)
            .into_iter()
            .map(|(x, y, w, h)| Region::new(x, y, w, h, CONTOUR_CONFIDENCE, DetectionSource::Contour))
            .collect())
    }
}

/// Shoelace area of a closed polygon
fn polygon_area(points: &[Point<i32>]) -> f64 {
    let n = points.len();
    let twice: i64 = (0..n)
        .map(|i| {
            let p = points[i];
            let q = points[(i + 1) % n];
            p.x as i64 * q.y as i64 - q.x as i64 * p.y as i64
        })
        .sum();
    twice.abs() as f64 / 2.0
}

fn bounding_rect(points: &[Point<i32>]) -> Rect {
    let min_x = points.iter().map(|p| p.x).min().unwrap_or(0).max(0);
    let min_y = points.iter().map(|p| p.y).min().unwrap_or(0).max(0);
    let max_x = points.iter().map(|p| p.x).max().unwrap_or(0).max(min_x);
    let max_y = points.iter().map(|p| p.y).max().unwrap_or(0).max(min_y);
    (
        min_x as u32,
        min_y as u32,
        (max_x - min_x + 1) as u32,
        (max_y - min_y + 1) as u32,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn plate_scene() -> RgbImage {
        // bright 150x50 plate on a dark background
        RgbImage::from_fn(320, 200, |x, y| {
            if (80..230).contains(&x) && (70..120).contains(&y) {
                Rgb([235, 235, 235])
            } else {
                Rgb([25, 25, 25])
            }
        })
    }

    #[test]
    fn test_polygon_area_and_bounds() {
        let square = [Point::new(0, 0), Point::new(10, 0), Point::new(10, 5), Point::new(0, 5)];
        assert_eq!(polygon_area(&square), 50.0);
        assert_eq!(bounding_rect(&square), (0, 0, 11, 6));
    }

    #[test]
    fn test_finds_bright_plate() {
        let strategy = ContourStrategy::new(Arc::new(PipelineConfig::default()));
        let regions = strategy.locate(&plate_scene()).unwrap();

        assert!(!regions.is_empty());
        let config = PipelineConfig::default();
        for region in &regions {
            assert_eq!(region.source, DetectionSource::Contour);
            assert_eq!(region.confidence, CONTOUR_CONFIDENCE);
            assert!(config.accepts_geometry(region.width, region.height));
            assert!(region.fits_within(320, 200));
        }
        // one of them hugs the plate
        assert!(regions.iter().any(|r| {
            (r.x as i32 - 80).abs() <= 8
                && (r.y as i32 - 70).abs() <= 8
                && (r.width as i32 - 150).abs() <= 16
                && (r.height as i32 - 50).abs() <= 16
        }));
    }

    #[test]
    fn test_flat_image_has_no_contours() {
        let strategy = ContourStrategy::new(Arc::new(PipelineConfig::default()));
        let flat = RgbImage::from_pixel(200, 100, Rgb([0, 0, 0]));
        assert!(strategy.locate(&flat).unwrap().is_empty());
    }
}
