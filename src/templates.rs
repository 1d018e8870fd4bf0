//! Nearest-template matching over recorded training samples.
//!
//! [`TemplateBackend`] turns samples saved in training mode into a model.
//! Each sample is drawn onto the grid once at load time. An input raster is
//! compared with every template by the mean nearest-pixel distance taken in
//! both directions, and a class scores the best of its templates. One
//! recording per gesture is enough to recognize it.
//!
//! Scores are in `[0, 1]`: identical rasters score 1, and anything whose
//! mean distance reaches the tolerance scores 0.

use std::collections::BTreeMap;
use std::path::Path;

use nalgebra::Point2;
use tracing::{info, warn};

use crate::classifier::{GestureClassifier, InferenceBackend, TensorLayout, TensorShape};
use crate::error::{RecognitionError, Result};
use crate::export::{load_samples, TrainingSample};
use crate::normalize::NormalizedStroke;
use crate::raster::rasterize;

/// One rasterized sample.
#[derive(Debug, Clone)]
struct Template {
    class_index: usize,
    cells: Vec<Point2<f32>>,
}

/// Inference backend scoring rasters against stored gesture templates.
#[derive(Debug, Clone)]
pub struct TemplateBackend {
    grid_size: usize,
    labels: Vec<String>,
    templates: Vec<Template>,
    tolerance: f32,
}

impl TemplateBackend {
    /// Build templates from samples normalized onto a `grid_size` grid.
    ///
    /// Labels are sorted; that order is the score order. Samples without
    /// points are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`RecognitionError::InvalidConfig`] when no sample is usable.
    pub fn from_samples(
        samples: impl IntoIterator<Item = TrainingSample>,
        grid_size: usize,
    ) -> Result<Self> {
        let mut by_label: BTreeMap<String, Vec<Vec<Point2<f32>>>> = BTreeMap::new();
        for sample in samples {
            if sample.points.is_empty() {
                warn!(gesture = %sample.gesture, "skipping empty training sample");
                continue;
            }
            let points = sample.points.iter().map(|p| Point2::new(p[0], p[1])).collect();
            let image = rasterize(&NormalizedStroke::from_grid_points(points, grid_size));
            by_label
                .entry(sample.gesture)
                .or_default()
                .push(lit_cells(image.pixels(), grid_size));
        }

        if by_label.is_empty() {
            return Err(RecognitionError::invalid_config(
                "no usable training samples for template matching",
            ));
        }

        let mut labels = Vec::with_capacity(by_label.len());
        let mut templates = Vec::new();
        for (class_index, (label, drawn)) in by_label.into_iter().enumerate() {
            templates.extend(drawn.into_iter().map(|cells| Template { class_index, cells }));
            labels.push(label);
        }

        info!(classes = labels.len(), templates = templates.len(), "gesture templates loaded");
        Ok(Self {
            grid_size,
            labels,
            templates,
            tolerance: grid_size as f32 / 4.0,
        })
    }

    /// Load every sample in `dir` (see [`load_samples`]).
    ///
    /// # Errors
    ///
    /// Directory read failures, or no usable samples.
    pub fn load(dir: impl AsRef<Path>, grid_size: usize) -> Result<Self> {
        Self::from_samples(load_samples(dir)?, grid_size)
    }

    /// Mean pixel distance at which the score drops to zero.
    #[must_use]
    pub const fn with_tolerance(mut self, tolerance: f32) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Class labels in score order.
    #[must_use]
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Number of stored templates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Wrap into a classifier with matching labels and grid.
    #[must_use]
    pub fn into_classifier(self, threshold: f32) -> GestureClassifier {
        GestureClassifier::new(self.labels.clone(), self.grid_size, threshold).with_backend(self)
    }

    fn similarity(&self, input: &[Point2<f32>], template: &[Point2<f32>]) -> f32 {
        let d = 0.5 * (mean_nearest(input, template) + mean_nearest(template, input));
        (1.0 - d / self.tolerance).max(0.0)
    }
}

impl InferenceBackend for TemplateBackend {
    fn run(&self, input: &[f32], shape: TensorShape) -> Result<Vec<f32>> {
        let [_, a, b, c] = shape.dims;
        let (height, width) = match shape.layout {
            TensorLayout::Nhwc => (a, b),
            TensorLayout::Nchw => (b, c),
        };
        let g = self.grid_size;
        if height != g || width != g || input.len() != g * g {
            return Err(RecognitionError::inference(format!(
                "templates are {g}x{g}, got input of {} values shaped {shape}",
                input.len()
            )));
        }

        let mut scores = vec![0.0; self.labels.len()];
        let cells = lit_cells(input, g);
        if cells.is_empty() {
            return Ok(scores);
        }
        for template in &self.templates {
            let score = self.similarity(&cells, &template.cells);
            let best = &mut scores[template.class_index];
            *best = best.max(score);
        }
        Ok(scores)
    }
}

/// Coordinates of lit pixels in a row-major `g x g` buffer.
fn lit_cells(pixels: &[f32], g: usize) -> Vec<Point2<f32>> {
    pixels
        .iter()
        .enumerate()
        .filter(|(_, &v)| v > 0.0)
        .map(|(i, _)| Point2::new((i % g) as f32, (i / g) as f32))
        .collect()
}

/// Average distance from each point of `from` to its nearest point in `to`.
fn mean_nearest(from: &[Point2<f32>], to: &[Point2<f32>]) -> f32 {
    if from.is_empty() || to.is_empty() {
        return f32::INFINITY;
    }
    let total: f32 = from
        .iter()
        .map(|p| {
            to.iter()
                .map(|q| nalgebra::distance(p, q))
                .fold(f32::INFINITY, f32::min)
        })
        .sum();
    total / from.len() as f32
}
