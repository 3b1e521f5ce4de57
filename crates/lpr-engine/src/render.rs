//! Annotated-image and plate-visualization drawing.
//!
//! Text is only drawn when a font is available; frames and rectangles are
//! always drawn.

use crate::config::RenderConfig;
use ab_glyph::{FontArc, PxScale};
use anyhow::{Context, Result};
use common::plates::{PlateCandidate, Region};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;

pub const VISUALIZATION_WIDTH: u32 = 500;
pub const VISUALIZATION_HEIGHT: u32 = 180;

const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const REPLACED_LABEL_COLOR: Rgb<u8> = Rgb([255, 255, 0]);
const LABEL_COLOR: Rgb<u8> = Rgb([255, 0, 255]);
const INK: Rgb<u8> = Rgb([0, 0, 0]);
const IDENTIFIER_INK: Rgb<u8> = Rgb([150, 0, 0]);
const PAPER: Rgb<u8> = Rgb([255, 255, 255]);

pub fn load_font(path: &str) -> Result<FontArc> {
    let data = std::fs::read(path).with_context(|| format!("Failed to read font {}", path))?;
    FontArc::try_from_vec(data).with_context(|| format!("Invalid font file {}", path))
}

pub struct PlateRenderer {
    font: Option<FontArc>,
    label_scale: f32,
    identifier_word: String,
}

impl PlateRenderer {
    pub fn new(font: Option<FontArc>, label_scale: f32, identifier_word: impl Into<String>) -> Self {
        Self {
            font,
            label_scale,
            identifier_word: identifier_word.into(),
        }
    }

    /// Use `config.font_path` when it loads, otherwise render without text
    pub fn from_config(config: &RenderConfig, identifier_word: impl Into<String>) -> Self {
        let font = config.font_path.as_deref().and_then(|path| match load_font(path) {
            Ok(font) => Some(font),
            Err(e) => {
                tracing::warn!(path, error = %e, "font unavailable, labels disabled");
                None
            }
        });
        Self::new(font, config.font_scale, identifier_word)
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// Box `region` on `canvas` and label it with the formatted plate
    pub fn annotate(&self, canvas: &mut RgbImage, region: &Region, candidate: &PlateCandidate) {
        draw_frame(canvas, region.x as i32, region.y as i32, region.width, region.height, BOX_COLOR);

        let Some(font) = &self.font else {
            return;
        };
        let color = if candidate.identifier_replaced {
            REPLACED_LABEL_COLOR
        } else {
            LABEL_COLOR
        };
        let scale = PxScale::from(self.label_scale);
        let above = region.y as i32 - self.label_scale as i32 - 4;
        let y = if above >= 0 { above } else { region.y as i32 + 4 };
        draw_text_mut(canvas, color, region.x as i32, y, scale, font, &candidate.formatted_text);
    }

    /// Clean 500x180 rendering of a plate: numbers either side of the identifier
    pub fn visualization(&self, candidate: &PlateCandidate) -> RgbImage {
        let (width, height) = (VISUALIZATION_WIDTH, VISUALIZATION_HEIGHT);
        let mut plate = RgbImage::from_pixel(width, height, PAPER);
        draw_frame(&mut plate, 0, 0, width, height, INK);

        let Some(font) = &self.font else {
            return plate;
        };

        let large = PxScale::from(48.0);
        let baseline = height as i32 / 2 - 24;
        let identifier = if candidate.identifier_text.is_empty() {
            self.identifier_word.as_str()
        } else {
            candidate.identifier_text.as_str()
        };
        let centered = |text: &str, scale: PxScale, center_x: i32| {
            let (w, _) = text_size(scale, font, text);
            center_x - w as i32 / 2
        };

        let w = width as i32;
        draw_text_mut(&mut plate, IDENTIFIER_INK, centered(identifier, large, w / 2), baseline, large, font, identifier);
        if let Some(first) = candidate.number_groups.first() {
            draw_text_mut(&mut plate, INK, centered(first, large, w / 4), baseline, large, font, first);
        }
        if let Some(second) = candidate.number_groups.get(1) {
            draw_text_mut(&mut plate, INK, centered(second, large, 3 * w / 4), baseline, large, font, second);
        }

        let small = PxScale::from(26.0);
        let footer = "TUNISIA";
        draw_text_mut(&mut plate, INK, centered(footer, small, w / 2), height as i32 - 40, small, font, footer);
        plate
    }
}

/// 2-pixel hollow rectangle
fn draw_frame(canvas: &mut RgbImage, x: i32, y: i32, width: u32, height: u32, color: Rgb<u8>) {
    if width == 0 || height == 0 {
        return;
    }
    draw_hollow_rect_mut(canvas, Rect::at(x, y).of_size(width, height), color);
    if width > 2 && height > 2 {
        draw_hollow_rect_mut(canvas, Rect::at(x + 1, y + 1).of_size(width - 2, height - 2), color);
    }
}
