//! Rasterization of normalized strokes.
//!
//! Consecutive points are joined with integer Bresenham lines. Touched pixels
//! are 1.0, everything else 0.0; there is no anti-aliasing, so the same input
//! always produces a bit-identical image.

use image::{GrayImage, Luma};

use crate::normalize::NormalizedStroke;

/// Single-channel `grid_size x grid_size` image, row-major, values in `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterImage {
    grid_size: usize,
    pixels: Vec<f32>,
}

impl RasterImage {
    /// Blank (all zero) image.
    #[must_use]
    pub fn blank(grid_size: usize) -> Self {
        Self {
            grid_size,
            pixels: vec![0.0; grid_size * grid_size],
        }
    }

    /// Edge length.
    #[must_use]
    pub const fn grid_size(&self) -> usize {
        self.grid_size
    }

    /// Row-major pixel buffer (`y * grid_size + x`).
    #[must_use]
    pub fn pixels(&self) -> &[f32] {
        &self.pixels
    }

    /// Pixel value, `None` when out of bounds.
    #[must_use]
    pub fn get(&self, x: usize, y: usize) -> Option<f32> {
        if x >= self.grid_size || y >= self.grid_size {
            return None;
        }
        Some(self.pixels[y * self.grid_size + x])
    }

    /// Number of pixels set to 1.0.
    #[must_use]
    pub fn lit_pixels(&self) -> usize {
        self.pixels.iter().filter(|&&v| v > 0.0).count()
    }

    fn set(&mut self, x: i64, y: i64) {
        let g = self.grid_size as i64;
        if (0..g).contains(&x) && (0..g).contains(&y) {
            self.pixels[(y * g + x) as usize] = 1.0;
        }
    }

    /// 8-bit grayscale copy for inspection, 255 for lit pixels.
    ///
    /// Flipped vertically so the highest `y` is the top row, as drawn.
    #[must_use]
    pub fn to_gray_image(&self) -> GrayImage {
        let g = self.grid_size;
        GrayImage::from_fn(g as u32, g as u32, |x, y| {
            let v = self.pixels[(g - 1 - y as usize) * g + x as usize];
            Luma([(v.clamp(0.0, 1.0) * 255.0).round() as u8])
        })
    }

    /// Text rendering for logs: `#` lit, `.` background, top row = highest `y`.
    #[must_use]
    pub fn to_ascii(&self) -> String {
        let mut s = String::with_capacity(self.grid_size * (self.grid_size + 1));
        for y in (0..self.grid_size).rev() {
            for x in 0..self.grid_size {
                s.push(if self.pixels[y * self.grid_size + x] > 0.0 {
                    '#'
                } else {
                    '.'
                });
            }
            s.push('\n');
        }
        s
    }
}

/// Rasterize a normalized stroke onto its grid.
///
/// Coordinates are rounded half to even, then clamped to `[0, grid_size - 1]`.
///
/// # Example
///
/// ```
/// use nalgebra::Point2;
/// use spell_fusion::{normalize::normalize, raster::rasterize};
///
/// let points = [Point2::new(0.0, 0.0), Point2::new(1.0, 0.0), Point2::new(1.0, 1.0)];
/// let image = rasterize(&normalize(&points, 28, 0.96)?);
///
/// assert_eq!(image.pixels().len(), 28 * 28);
/// assert!(image.lit_pixels() > 0);
/// # Ok::<(), spell_fusion::RecognitionError>(())
/// ```
#[must_use]
pub fn rasterize(stroke: &NormalizedStroke) -> RasterImage {
    let grid_size = stroke.grid_size();
    let mut image = RasterImage::blank(grid_size);

    let max = grid_size.saturating_sub(1) as i64;
    let px = |v: f32| to_pixel(v, max);

    match stroke.points() {
        [] => {}
        [only] => image.set(px(only.x), px(only.y)),
        points => {
            for w in points.windows(2) {
                draw_line(
                    &mut image,
                    (px(w[0].x), px(w[0].y)),
                    (px(w[1].x), px(w[1].y)),
                );
            }
        }
    }

    image
}

/// Grid cell of a normalized coordinate.
fn to_pixel(v: f32, max: i64) -> i64 {
    (v.round_ties_even() as i64).clamp(0, max)
}

/// Bresenham line between two clamped pixel coordinates, endpoints inclusive.
fn draw_line(image: &mut RasterImage, from: (i64, i64), to: (i64, i64)) {
    let (mut x, mut y) = from;
    let (x1, y1) = to;

    let dx = (x1 - x).abs();
    let dy = (y1 - y).abs();
    let sx = if x < x1 { 1 } else { -1 };
    let sy = if y < y1 { 1 } else { -1 };
    let mut err = dx - dy;

    loop {
        image.set(x, y);
        if x == x1 && y == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 > -dy {
            err -= dy;
            x += sx;
        }
        if e2 < dx {
            err += dx;
            y += sy;
        }
    }
}
