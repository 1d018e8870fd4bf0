//! Tick-driven stroke capture.
//!
//! This module provides [`StrokeCapture`], which accumulates positions while
//! the gesture input is held and hands back a finished [`Stroke`] on release.
//! Points closer than the minimum spacing to the last stored point are
//! dropped, so the stroke density does not depend on the polling rate.

use nalgebra::{Point2, Vector3};
use serde::{Deserialize, Serialize};

use crate::error::{RecognitionError, Result};

/// Minimum number of points a stroke needs to be recognized.
pub const MIN_STROKE_POINTS: usize = 3;

/// A timestamped position from the input device.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// World position. 2D devices leave `z` at zero.
    pub position: Vector3<f32>,
    /// Time in seconds on the host clock.
    pub timestamp: f64,
}

impl Sample {
    /// Create a new sample.
    #[must_use]
    pub const fn new(position: Vector3<f32>, timestamp: f64) -> Self {
        Self {
            position,
            timestamp,
        }
    }

    /// Create a sample from a 2D position.
    #[must_use]
    pub fn planar(x: f32, y: f32, timestamp: f64) -> Self {
        Self::new(Vector3::new(x, y, 0.0), timestamp)
    }
}

/// Plane a 3D stroke is flattened onto before normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Projection {
    /// Drop `z` (world XY plane, facing the player).
    #[default]
    Xy,
    /// Drop `y` (horizontal plane).
    Xz,
    /// Drop `x` (side plane).
    Yz,
}

impl Projection {
    /// Project a single position.
    #[inline]
    #[must_use]
    pub fn apply(self, p: &Vector3<f32>) -> Point2<f32> {
        match self {
            Self::Xy => Point2::new(p.x, p.y),
            Self::Xz => Point2::new(p.x, p.z),
            Self::Yz => Point2::new(p.y, p.z),
        }
    }
}

/// An ordered, finalized sequence of samples from one gesture attempt.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Stroke {
    samples: Vec<Sample>,
}

impl Stroke {
    /// Build a stroke directly from samples (replays, tests).
    #[must_use]
    pub fn from_samples(samples: Vec<Sample>) -> Self {
        Self { samples }
    }

    /// Build a stroke from 2D points with zero timestamps.
    #[must_use]
    pub fn from_planar(points: &[[f32; 2]]) -> Self {
        Self {
            samples: points.iter().map(|p| Sample::planar(p[0], p[1], 0.0)).collect(),
        }
    }

    /// Samples in capture order.
    #[must_use]
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Number of stored points.
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether no point was stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Whether the stroke has enough points for recognition.
    #[must_use]
    pub fn is_recognizable(&self) -> bool {
        self.samples.len() >= MIN_STROKE_POINTS
    }

    /// Elapsed time between first and last sample.
    #[must_use]
    pub fn duration(&self) -> f64 {
        match (self.samples.first(), self.samples.last()) {
            (Some(first), Some(last)) => last.timestamp - first.timestamp,
            _ => 0.0,
        }
    }

    /// Flatten onto a plane.
    #[must_use]
    pub fn project(&self, projection: Projection) -> Vec<Point2<f32>> {
        self.samples
            .iter()
            .map(|s| projection.apply(&s.position))
            .collect()
    }
}

/// What a single [`StrokeCapture::tick`] did.
#[derive(Debug)]
pub enum CaptureEvent {
    /// A point was stored, either on the press edge or while held.
    Appended(Sample),
    /// Release edge: the finished stroke, or why there is none.
    Released(Result<Stroke>),
}

/// Accumulates samples between press and release of the gesture input.
///
/// # Example
///
/// ```
/// use nalgebra::Vector3;
/// use spell_fusion::{CaptureEvent, StrokeCapture};
///
/// let mut capture = StrokeCapture::new(0.05);
///
/// capture.tick(true, Vector3::new(0.0, 0.0, 0.0), 0.0);
/// capture.tick(true, Vector3::new(0.2, 0.0, 0.0), 0.1);
/// capture.tick(true, Vector3::new(0.1, 0.2, 0.0), 0.2);
///
/// if let Some(CaptureEvent::Released(stroke)) = capture.tick(false, Vector3::zeros(), 0.3) {
///     assert_eq!(stroke?.len(), 3);
/// }
/// # Ok::<(), spell_fusion::RecognitionError>(())
/// ```
#[derive(Debug)]
pub struct StrokeCapture {
    /// Minimum distance between consecutive stored points.
    min_spacing: f32,

    /// Points of the active session.
    samples: Vec<Sample>,

    /// Whether a session is in progress.
    active: bool,
}

impl StrokeCapture {
    /// Create a capture with the given minimum spacing.
    #[must_use]
    pub fn new(min_spacing: f32) -> Self {
        Self {
            min_spacing,
            samples: Vec::with_capacity(128),
            active: false,
        }
    }

    /// Begin a session. The press-time position is the first point.
    pub fn start(&mut self, position: Vector3<f32>, timestamp: f64) -> Sample {
        self.samples.clear();
        self.active = true;
        let sample = Sample::new(position, timestamp);
        self.samples.push(sample);
        sample
    }

    /// Offer a position for the active session.
    ///
    /// Returns the stored sample when the position is farther than the
    /// minimum spacing from the last stored point.
    pub fn sample(&mut self, position: Vector3<f32>, timestamp: f64) -> Option<Sample> {
        if !self.active {
            return None;
        }

        if let Some(last) = self.samples.last() {
            if (position - last.position).norm() <= self.min_spacing {
                return None;
            }
        }

        let sample = Sample::new(position, timestamp);
        self.samples.push(sample);
        Some(sample)
    }

    /// Finish the session.
    ///
    /// # Errors
    ///
    /// Returns [`RecognitionError::InsufficientData`] when fewer than
    /// [`MIN_STROKE_POINTS`] points were stored (including when no session
    /// was active).
    pub fn end(&mut self) -> Result<Stroke> {
        self.active = false;
        let samples = std::mem::take(&mut self.samples);
        if samples.len() < MIN_STROKE_POINTS {
            return Err(RecognitionError::insufficient_data(
                MIN_STROKE_POINTS,
                samples.len(),
            ));
        }
        Ok(Stroke { samples })
    }

    /// Abandon the session without producing a stroke.
    pub fn cancel(&mut self) {
        self.active = false;
        self.samples.clear();
    }

    /// Per-frame entry point driven by the host's update loop.
    ///
    /// Returns `None` when nothing was stored and no session ended.
    pub fn tick(
        &mut self,
        held: bool,
        position: Vector3<f32>,
        timestamp: f64,
    ) -> Option<CaptureEvent> {
        match (self.active, held) {
            (false, true) => Some(CaptureEvent::Appended(self.start(position, timestamp))),
            (true, true) => self.sample(position, timestamp).map(CaptureEvent::Appended),
            (true, false) => Some(CaptureEvent::Released(self.end())),
            (false, false) => None,
        }
    }

    /// Whether a session is in progress.
    #[must_use]
    pub const fn is_capturing(&self) -> bool {
        self.active
    }

    /// Points stored in the active session.
    #[must_use]
    pub fn n_points(&self) -> usize {
        self.samples.len()
    }

    /// Most recently stored sample.
    #[must_use]
    pub fn last_sample(&self) -> Option<&Sample> {
        self.samples.last()
    }

    /// Current minimum spacing.
    #[must_use]
    pub const fn min_spacing(&self) -> f32 {
        self.min_spacing
    }

    /// Change the minimum spacing; applies to subsequent samples.
    pub fn set_min_spacing(&mut self, min_spacing: f32) {
        self.min_spacing = min_spacing;
    }
}

impl Default for StrokeCapture {
    fn default() -> Self {
        Self::new(0.05)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(x: f32, y: f32) -> Vector3<f32> {
        Vector3::new(x, y, 0.0)
    }

    #[test]
    fn test_spacing_throttle() {
        let mut capture = StrokeCapture::new(0.1);
        capture.start(v(0.0, 0.0), 0.0);

        // Too close to the last point: dropped.
        assert!(capture.sample(v(0.05, 0.0), 0.01).is_none());
        // Exactly at the spacing is not "exceeding" it.
        assert!(capture.sample(v(0.1, 0.0), 0.02).is_none());
        assert!(capture.sample(v(0.2, 0.0), 0.03).is_some());
        // Distance measured from last stored point, not last offered.
        assert!(capture.sample(v(0.25, 0.0), 0.04).is_none());
        assert!(capture.sample(v(0.35, 0.0), 0.05).is_some());

        assert_eq!(capture.n_points(), 3);
    }

    #[test]
    fn test_short_stroke_rejected() {
        let mut capture = StrokeCapture::new(0.1);
        capture.start(v(0.0, 0.0), 0.0);
        capture.sample(v(1.0, 0.0), 0.1);

        let err = capture.end().unwrap_err();
        assert!(matches!(
            err,
            RecognitionError::InsufficientData { min: 3, actual: 2 }
        ));
        assert!(!capture.is_capturing());
    }

    #[test]
    fn test_end_without_start() {
        let mut capture = StrokeCapture::default();
        assert!(matches!(
            capture.end(),
            Err(RecognitionError::InsufficientData { actual: 0, .. })
        ));
    }

    #[test]
    fn test_sample_ignored_when_idle() {
        let mut capture = StrokeCapture::new(0.0);
        assert!(capture.sample(v(1.0, 1.0), 0.0).is_none());
        assert_eq!(capture.n_points(), 0);
    }

    #[test]
    fn test_tick_edges() {
        let mut capture = StrokeCapture::new(0.05);

        assert!(capture.tick(false, v(0.0, 0.0), 0.0).is_none());
        assert!(matches!(
            capture.tick(true, v(0.0, 0.0), 0.1),
            Some(CaptureEvent::Appended(s)) if s.timestamp == 0.1
        ));
        assert!(capture.is_capturing());
        assert!(matches!(capture.tick(true, v(0.5, 0.0), 0.2), Some(CaptureEvent::Appended(_))));
        // Within spacing: held, but nothing stored.
        assert!(capture.tick(true, v(0.51, 0.0), 0.25).is_none());
        assert!(matches!(capture.tick(true, v(0.25, 0.5), 0.3), Some(CaptureEvent::Appended(_))));

        let Some(CaptureEvent::Released(stroke)) = capture.tick(false, v(9.0, 9.0), 0.4) else {
            panic!("release edge must finish the stroke");
        };
        let stroke = stroke.unwrap();
        assert_eq!(stroke.len(), 3);
        assert!((stroke.duration() - 0.2).abs() < 1e-9);
        assert!(!capture.is_capturing());

        // Restart clears the previous session.
        capture.tick(true, v(3.0, 3.0), 1.0);
        assert_eq!(capture.n_points(), 1);
    }

    #[test]
    fn test_cancel() {
        let mut capture = StrokeCapture::new(0.0);
        capture.start(v(0.0, 0.0), 0.0);
        capture.sample(v(1.0, 0.0), 0.1);
        capture.cancel();
        assert!(!capture.is_capturing());
        assert_eq!(capture.n_points(), 0);
    }

    #[test]
    fn test_projection() {
        let stroke = Stroke::from_samples(vec![Sample::new(Vector3::new(1.0, 2.0, 3.0), 0.0)]);
        assert_eq!(stroke.project(Projection::Xy)[0], Point2::new(1.0, 2.0));
        assert_eq!(stroke.project(Projection::Xz)[0], Point2::new(1.0, 3.0));
        assert_eq!(stroke.project(Projection::Yz)[0], Point2::new(2.0, 3.0));
    }
}
