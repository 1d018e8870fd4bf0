//! Stroke normalization onto the canonical grid.
//!
//! # Pipeline Overview
//!
//! 1. Axis-aligned bounding box
//! 2. Reject coincident points
//! 3. Center the box on the origin
//! 4. Uniform scale so the longer side spans `(grid - 1) * margin`
//! 5. Shift to the grid center
//!
//! The margin is tied to the model: training images and live input must be
//! produced with the same value.

use nalgebra::{Point2, Vector2};

use crate::capture::MIN_STROKE_POINTS;
use crate::error::{RecognitionError, Result};

/// Extents at or below this are treated as zero.
pub const DEGENERATE_EPSILON: f32 = 1e-6;

/// Axis-aligned bounding box of a point set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: Point2<f32>,
    pub max: Point2<f32>,
}

impl Bounds {
    /// Bounding box of `points`, or `None` when empty.
    #[must_use]
    pub fn of(points: &[Point2<f32>]) -> Option<Self> {
        let first = points.first()?;
        let init = Self {
            min: *first,
            max: *first,
        };
        Some(points.iter().skip(1).fold(init, |b, p| Self {
            min: Point2::new(b.min.x.min(p.x), b.min.y.min(p.y)),
            max: Point2::new(b.max.x.max(p.x), b.max.y.max(p.y)),
        }))
    }

    #[must_use]
    pub fn width(&self) -> f32 {
        self.max.x - self.min.x
    }

    #[must_use]
    pub fn height(&self) -> f32 {
        self.max.y - self.min.y
    }

    #[must_use]
    pub fn center(&self) -> Point2<f32> {
        nalgebra::center(&self.min, &self.max)
    }
}

/// Stroke mapped onto a `grid_size x grid_size` coordinate space.
///
/// Points are kept as floats; rounding happens during rasterization.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedStroke {
    points: Vec<Point2<f32>>,
    grid_size: usize,
}

impl NormalizedStroke {
    /// Wrap points that are already in grid coordinates, such as a stored
    /// training sample.
    #[must_use]
    pub fn from_grid_points(points: Vec<Point2<f32>>, grid_size: usize) -> Self {
        Self { points, grid_size }
    }

    /// Points in stroke order.
    #[must_use]
    pub fn points(&self) -> &[Point2<f32>] {
        &self.points
    }

    /// Grid edge length.
    #[must_use]
    pub const fn grid_size(&self) -> usize {
        self.grid_size
    }

    /// Bounding box of the normalized points.
    #[must_use]
    pub fn bounds(&self) -> Option<Bounds> {
        Bounds::of(&self.points)
    }

    /// Resample to a fixed number of points, staying on the same grid.
    #[must_use]
    pub fn resampled(&self, n: usize) -> Self {
        Self {
            points: resample(&self.points, n),
            grid_size: self.grid_size,
        }
    }

    /// Points as `[x, y]` pairs.
    #[must_use]
    pub fn to_pairs(&self) -> Vec<[f32; 2]> {
        self.points.iter().map(|p| [p.x, p.y]).collect()
    }
}

/// Normalize a projected stroke onto the canonical grid.
///
/// # Arguments
///
/// * `points` - 2D stroke points in capture order
/// * `grid_size` - Canonical grid edge length (28 for the shipped models)
/// * `margin` - Fraction of `grid_size - 1` the longer extent is scaled to
///
/// # Errors
///
/// - [`RecognitionError::InsufficientData`] for fewer than 3 points
/// - [`RecognitionError::DegenerateStroke`] when all points coincide
///
/// # Example
///
/// ```
/// use nalgebra::Point2;
/// use spell_fusion::normalize::normalize;
///
/// let points = [Point2::new(0.0, 0.0), Point2::new(2.0, 0.0), Point2::new(1.0, 1.0)];
/// let normalized = normalize(&points, 28, 0.96)?;
///
/// let bounds = normalized.bounds().unwrap();
/// assert!((bounds.width() - 27.0 * 0.96).abs() < 1e-4);
/// # Ok::<(), spell_fusion::RecognitionError>(())
/// ```
pub fn normalize(points: &[Point2<f32>], grid_size: usize, margin: f32) -> Result<NormalizedStroke> {
    if points.len() < MIN_STROKE_POINTS {
        return Err(RecognitionError::insufficient_data(
            MIN_STROKE_POINTS,
            points.len(),
        ));
    }

    let bounds = Bounds::of(points)
        .ok_or_else(|| RecognitionError::insufficient_data(MIN_STROKE_POINTS, 0))?;
    let (width, height) = (bounds.width(), bounds.height());

    if width <= DEGENERATE_EPSILON && height <= DEGENERATE_EPSILON {
        return Err(RecognitionError::degenerate(width, height));
    }

    let center = bounds.center();
    let scale = (grid_size as f32 - 1.0) * margin / width.max(height);
    let half = grid_size as f32 / 2.0;
    let offset = Vector2::new(half, half);

    let points = points
        .iter()
        .map(|p| Point2::from((p - center) * scale + offset))
        .collect();

    Ok(NormalizedStroke { points, grid_size })
}

/// Resample a polyline to `n` points spaced evenly along its arc length.
///
/// First and last points are preserved. A polyline with zero length yields
/// `n` copies of its first point; an empty input yields an empty output.
#[must_use]
pub fn resample(points: &[Point2<f32>], n: usize) -> Vec<Point2<f32>> {
    let (Some(first), Some(last)) = (points.first(), points.last()) else {
        return Vec::new();
    };
    if n == 0 {
        return Vec::new();
    }
    if n == 1 {
        return vec![*first];
    }

    let total: f32 = points.windows(2).map(|w| (w[1] - w[0]).norm()).sum();
    if total <= DEGENERATE_EPSILON {
        return vec![*first; n];
    }

    let step = total / (n - 1) as f32;
    let mut out = Vec::with_capacity(n);
    out.push(*first);

    // Walk segments, emitting a point every `step` of travelled length.
    let mut travelled = 0.0f32;
    let mut next_target = step;
    for w in points.windows(2) {
        let seg = w[1] - w[0];
        let len = seg.norm();
        if len <= 0.0 {
            continue;
        }
        while out.len() < n - 1 && next_target <= travelled + len {
            let t = (next_target - travelled) / len;
            out.push(w[0] + seg * t);
            next_target += step;
        }
        travelled += len;
    }

    // Float drift can leave the tail short.
    while out.len() < n - 1 {
        out.push(*last);
    }
    out.push(*last);
    out
}
