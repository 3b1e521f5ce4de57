//! Low-level image operators used by the variant generator and the contour
//! strategy.
//!
//! Bilateral filtering, CLAHE and mean-adaptive thresholding are implemented
//! here with OpenCV semantics (window diameter, clip limit in histogram
//! units, `mean - C` comparison) so the tuned constants keep their meaning.

use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::contrast::{equalize_histogram, otsu_level};
use imageproc::filter::{box_filter, sharpen3x3};
use imageproc::gradients::sobel_gradients;

pub fn to_gray(image: &RgbImage) -> GrayImage {
    image::imageops::grayscale(image)
}

pub fn gray_to_rgb(gray: &GrayImage) -> RgbImage {
    RgbImage::from_fn(gray.width(), gray.height(), |x, y| {
        let v = gray.get_pixel(x, y)[0];
        Rgb([v, v, v])
    })
}

/// Edge-preserving smoothing over a `diameter` x `diameter` window
pub fn bilateral_filter(gray: &GrayImage, diameter: u32, sigma_color: f32, sigma_space: f32) -> GrayImage {
    let (width, height) = gray.dimensions();
    if width == 0 || height == 0 {
        return gray.clone();
    }
    let radius = (diameter / 2).max(1) as i64;

    let color_weights: Vec<f32> = (0..256)
        .map(|d| (-((d * d) as f32) / (2.0 * sigma_color * sigma_color)).exp())
        .collect();

    let mut spatial = Vec::new();
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            let dist2 = (dx * dx + dy * dy) as f32;
            if dist2 > (radius * radius) as f32 {
                continue;
            }
            spatial.push((dx, dy, (-dist2 / (2.0 * sigma_space * sigma_space)).exp()));
        }
    }

    let max_x = width as i64 - 1;
    let max_y = height as i64 - 1;
    GrayImage::from_fn(width, height, |x, y| {
        let center = gray.get_pixel(x, y)[0] as i32;
        let mut sum = 0.0f32;
        let mut norm = 0.0f32;
        for &(dx, dy, ws) in &spatial {
            let sx = (x as i64 + dx).clamp(0, max_x) as u32;
            let sy = (y as i64 + dy).clamp(0, max_y) as u32;
            let v = gray.get_pixel(sx, sy)[0] as i32;
            let w = ws * color_weights[(v - center).unsigned_abs() as usize];
            sum += w * v as f32;
            norm += w;
        }
        let value = if norm > 0.0 { sum / norm } else { center as f32 };
        Luma([value.round().clamp(0.0, 255.0) as u8])
    })
}

/// Contrast-limited adaptive histogram equalization on a `grid` x `grid`
/// tile layout with bilinear blending between tiles.
pub fn clahe(gray: &GrayImage, clip_limit: f32, grid: u32) -> GrayImage {
    let (width, height) = gray.dimensions();
    if width == 0 || height == 0 {
        return gray.clone();
    }
    let tiles_x = grid.clamp(1, width);
    let tiles_y = grid.clamp(1, height);

    let bounds = |tile: u32, tiles: u32, size: u32| {
        let start = (tile as u64 * size as u64 / tiles as u64) as u32;
        let end = ((tile as u64 + 1) * size as u64 / tiles as u64) as u32;
        (start, end)
    };

    let mut luts = Vec::with_capacity((tiles_x * tiles_y) as usize);
    for ty in 0..tiles_y {
        let (y0, y1) = bounds(ty, tiles_y, height);
        for tx in 0..tiles_x {
            let (x0, x1) = bounds(tx, tiles_x, width);
            let mut hist = [0u32; 256];
            for y in y0..y1 {
                for x in x0..x1 {
                    hist[gray.get_pixel(x, y)[0] as usize] += 1;
                }
            }
            let area = ((x1 - x0) * (y1 - y0)).max(1);
            luts.push(clipped_equalization(&mut hist, area, clip_limit));
        }
    }

    let tile_w = width as f32 / tiles_x as f32;
    let tile_h = height as f32 / tiles_y as f32;
    let neighbours = |pos: f32, tile_size: f32, tiles: u32| {
        let f = (pos + 0.5) / tile_size - 0.5;
        let lower = f.floor().clamp(0.0, (tiles - 1) as f32) as u32;
        let upper = (lower + 1).min(tiles - 1);
        let alpha = (f - lower as f32).clamp(0.0, 1.0);
        (lower, upper, alpha)
    };

    GrayImage::from_fn(width, height, |x, y| {
        let v = gray.get_pixel(x, y)[0] as usize;
        let (tx0, tx1, ax) = neighbours(x as f32, tile_w, tiles_x);
        let (ty0, ty1, ay) = neighbours(y as f32, tile_h, tiles_y);
        let lut = |tx: u32, ty: u32| luts[(ty * tiles_x + tx) as usize][v] as f32;

        let top = lut(tx0, ty0) * (1.0 - ax) + lut(tx1, ty0) * ax;
        let bottom = lut(tx0, ty1) * (1.0 - ax) + lut(tx1, ty1) * ax;
        Luma([(top * (1.0 - ay) + bottom * ay).round().clamp(0.0, 255.0) as u8])
    })
}

fn clipped_equalization(hist: &mut [u32; 256], area: u32, clip_limit: f32) -> [u8; 256] {
    if clip_limit > 0.0 {
        let limit = ((clip_limit * area as f32 / 256.0) as u32).max(1);
        let mut excess = 0u32;
        for bin in hist.iter_mut() {
            if *bin > limit {
                excess += *bin - limit;
                *bin = limit;
            }
        }
        let share = excess / 256;
        let remainder = (excess % 256) as usize;
        for (i, bin) in hist.iter_mut().enumerate() {
            *bin += share + u32::from(i < remainder);
        }
    }

    let mut lut = [0u8; 256];
    let mut cumulative = 0u32;
    let scale = 255.0 / area as f32;
    for (i, count) in hist.iter().enumerate() {
        cumulative += count;
        lut[i] = (cumulative as f32 * scale).round().clamp(0.0, 255.0) as u8;
    }
    lut
}

/// Global binarization at Otsu's level
pub fn otsu_binarize(gray: &GrayImage) -> GrayImage {
    let level = otsu_level(gray);
    let mut out = gray.clone();
    for pixel in out.pixels_mut() {
        pixel[0] = if pixel[0] > level { 255 } else { 0 };
    }
    out
}

/// Local-mean adaptive threshold over a `block_size` window.
///
/// A pixel is foreground when it exceeds `mean - c`; `inverted` swaps the
/// output so dark strokes become foreground.
pub fn adaptive_threshold(gray: &GrayImage, block_size: u32, c: i32, inverted: bool) -> GrayImage {
    let radius = (block_size / 2).max(1);
    let means = box_filter(gray, radius, radius);
    let (on, off) = if inverted { (0, 255) } else { (255, 0) };
    GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        let v = gray.get_pixel(x, y)[0] as i32;
        let mean = means.get_pixel(x, y)[0] as i32;
        Luma([if v > mean - c { on } else { off }])
    })
}

pub fn sharpen(gray: &GrayImage) -> GrayImage {
    sharpen3x3(gray)
}

/// Grayscale with the Sobel gradient magnitude added on top
pub fn edge_enhance(gray: &GrayImage) -> GrayImage {
    let gradients = sobel_gradients(gray);
    GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        let edge = (gradients.get_pixel(x, y)[0] / 2).min(255) as u8;
        Luma([gray.get_pixel(x, y)[0].saturating_add(edge)])
    })
}

/// Equalize the luma channel of a color image, keeping chroma
pub fn equalize_luma(image: &RgbImage) -> RgbImage {
    let (width, height) = image.dimensions();
    let mut luma = GrayImage::new(width, height);
    let mut chroma = Vec::with_capacity((width * height) as usize);

    for (x, y, pixel) in image.enumerate_pixels() {
        let [r, g, b] = pixel.0.map(f32::from);
        let yv = 0.299 * r + 0.587 * g + 0.114 * b;
        let cb = 128.0 - 0.168_736 * r - 0.331_264 * g + 0.5 * b;
        let cr = 128.0 + 0.5 * r - 0.418_688 * g - 0.081_312 * b;
        luma.put_pixel(x, y, Luma([yv.round().clamp(0.0, 255.0) as u8]));
        chroma.push((cb - 128.0, cr - 128.0));
    }

    let equalized = equalize_histogram(&luma);
    RgbImage::from_fn(width, height, |x, y| {
        let yv = equalized.get_pixel(x, y)[0] as f32;
        let (cb, cr) = chroma[(y * width + x) as usize];
        let channel = |v: f32| v.round().clamp(0.0, 255.0) as u8;
        Rgb([
            channel(yv + 1.402 * cr),
            channel(yv - 0.344_136 * cb - 0.714_136 * cr),
            channel(yv + 1.772 * cb),
        ])
    })
}
