//! Raster classification through an external inference runtime.
//!
//! The model itself is not part of this crate. A runtime is attached through
//! [`InferenceBackend`]; [`GestureClassifier`] packages rasters into the
//! runtime's tensor layout, picks the argmax class and applies the
//! confidence threshold.
//!
//! An under-threshold argmax is reported as `Ok(None)`, never as a fallback
//! label.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::config::RecognizerConfig;
use crate::error::{RecognitionError, Result};
use crate::raster::RasterImage;

/// Memory layout the runtime expects for a single-channel image batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TensorLayout {
    /// `(batch, height, width, channels)`; what the bundled models use.
    #[default]
    Nhwc,
    /// `(batch, channels, height, width)`.
    Nchw,
}

/// Four-dimensional input tensor shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TensorShape {
    pub dims: [usize; 4],
    pub layout: TensorLayout,
}

impl TensorShape {
    /// Shape of a single `grid_size x grid_size` grayscale image.
    #[must_use]
    pub const fn image(grid_size: usize, layout: TensorLayout) -> Self {
        let dims = match layout {
            TensorLayout::Nhwc => [1, grid_size, grid_size, 1],
            TensorLayout::Nchw => [1, 1, grid_size, grid_size],
        };
        Self { dims, layout }
    }

    /// Total element count.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.dims[0] * self.dims[1] * self.dims[2] * self.dims[3]
    }

    /// Whether any dimension is zero.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Display for TensorShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d] = self.dims;
        write!(f, "({a}, {b}, {c}, {d}) {:?}", self.layout)
    }
}

/// A loaded discriminative model.
///
/// Implementations run one synchronous inference and return one score per
/// class, in the class order the model was trained with. The handle is
/// read-only after loading.
pub trait InferenceBackend: Send + Sync {
    /// Run the model on `input` laid out as `shape`.
    ///
    /// # Errors
    ///
    /// Runtime faults should be reported as [`RecognitionError::InferenceError`].
    fn run(&self, input: &[f32], shape: TensorShape) -> Result<Vec<f32>>;
}

impl<F> InferenceBackend for F
where
    F: Fn(&[f32], TensorShape) -> Result<Vec<f32>> + Send + Sync,
{
    fn run(&self, input: &[f32], shape: TensorShape) -> Result<Vec<f32>> {
        self(input, shape)
    }
}

/// Label and score of an accepted classification.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationResult {
    /// Gesture class label.
    pub label: String,
    /// Index of the class in the model output.
    pub class_index: usize,
    /// Score of the winning class, in `[0, 1]` for softmax outputs.
    pub confidence: f32,
}

/// Classifies raster images against a fixed, closed set of gesture classes.
pub struct GestureClassifier {
    /// Class labels in model output order.
    labels: Vec<String>,

    /// Minimum accepted argmax score.
    threshold: f32,

    /// Grid size the model was trained on.
    grid_size: usize,

    /// Tensor layout handed to the backend.
    layout: TensorLayout,

    /// Attached runtime, `None` until loaded.
    backend: Option<Box<dyn InferenceBackend>>,

    /// Set once a warm-up inference has completed.
    warmed_up: AtomicBool,
}

impl fmt::Debug for GestureClassifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GestureClassifier")
            .field("labels", &self.labels)
            .field("threshold", &self.threshold)
            .field("grid_size", &self.grid_size)
            .field("layout", &self.layout)
            .field("loaded", &self.backend.is_some())
            .field("warmed_up", &self.is_ready())
            .finish()
    }
}

impl GestureClassifier {
    /// Create a classifier with no runtime attached.
    ///
    /// [`SpellRecognizer::new`](crate::SpellRecognizer::new) replaces
    /// `threshold` with the recognizer config's `confidence_threshold`; use
    /// [`GestureClassifier::from_config`] to build one that already agrees.
    ///
    /// # Arguments
    ///
    /// * `labels` - Class labels in model output order
    /// * `grid_size` - Input edge length the model expects
    /// * `threshold` - Minimum accepted score
    pub fn new<I, S>(labels: I, grid_size: usize, threshold: f32) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            labels: labels.into_iter().map(Into::into).collect(),
            threshold,
            grid_size,
            layout: TensorLayout::default(),
            backend: None,
            warmed_up: AtomicBool::new(false),
        }
    }

    /// Create a classifier taking grid size and threshold from `config`.
    pub fn from_config<I, S>(labels: I, config: &RecognizerConfig) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(labels, config.grid_size, config.confidence_threshold)
    }

    /// Attach a loaded runtime. Resets the warm-up flag.
    #[must_use]
    pub fn with_backend(mut self, backend: impl InferenceBackend + 'static) -> Self {
        self.load(backend);
        self
    }

    /// Set the tensor layout.
    #[must_use]
    pub const fn with_layout(mut self, layout: TensorLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Attach or replace the runtime.
    pub fn load(&mut self, backend: impl InferenceBackend + 'static) {
        self.backend = Some(Box::new(backend));
        self.warmed_up.store(false, Ordering::Release);
        info!(classes = self.labels.len(), grid = self.grid_size, "gesture model loaded");
    }

    /// Whether a runtime is attached.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.backend.is_some()
    }

    /// Whether warm-up has completed.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.warmed_up.load(Ordering::Acquire)
    }

    /// Class labels in model order.
    #[must_use]
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Grid size the model expects.
    #[must_use]
    pub const fn grid_size(&self) -> usize {
        self.grid_size
    }

    /// Current threshold.
    #[must_use]
    pub const fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Change the threshold.
    pub fn set_threshold(&mut self, threshold: f32) {
        self.threshold = threshold;
    }

    /// Input shape handed to the runtime.
    #[must_use]
    pub const fn input_shape(&self) -> TensorShape {
        TensorShape::image(self.grid_size, self.layout)
    }

    /// Run one blank image through the runtime so lazy graph compilation
    /// happens outside the hot path.
    ///
    /// # Errors
    ///
    /// [`RecognitionError::NotReady`] without a runtime, or the runtime's error.
    pub fn warm_up(&self) -> Result<()> {
        if self.is_ready() {
            debug!("warm-up already completed");
            return Ok(());
        }
        let started = Instant::now();
        self.scores(&RasterImage::blank(self.grid_size))?;
        self.warmed_up.store(true, Ordering::Release);
        info!(elapsed_ms = started.elapsed().as_millis() as u64, "gesture model warmed up");
        Ok(())
    }

    /// Raw per-class scores for `image`.
    ///
    /// # Errors
    ///
    /// - [`RecognitionError::NotReady`] without a runtime
    /// - [`RecognitionError::InferenceError`] on shape mismatch, runtime
    ///   failure, or non-finite scores
    pub fn scores(&self, image: &RasterImage) -> Result<Vec<f32>> {
        let backend = self.backend.as_ref().ok_or(RecognitionError::NotReady)?;

        let shape = self.input_shape();
        if image.grid_size() != self.grid_size || image.pixels().len() != shape.len() {
            return Err(RecognitionError::inference(format!(
                "input {}x{} does not match model input {shape}",
                image.grid_size(),
                image.grid_size()
            )));
        }

        // One channel: NHWC and NCHW share the same flat buffer.
        let scores = backend.run(image.pixels(), shape)?;

        if scores.len() != self.labels.len() {
            return Err(RecognitionError::inference(format!(
                "model returned {} scores for {} classes",
                scores.len(),
                self.labels.len()
            )));
        }
        if let Some(i) = scores.iter().position(|s| !s.is_finite()) {
            return Err(RecognitionError::inference(format!(
                "non-finite score for class {i}"
            )));
        }
        Ok(scores)
    }

    /// Classify a raster.
    ///
    /// Returns `Ok(None)` when the best score is below the threshold.
    ///
    /// # Errors
    ///
    /// See [`GestureClassifier::scores`]. Errors are scoped to this call.
    pub fn classify(&self, image: &RasterImage) -> Result<Option<ClassificationResult>> {
        if self.backend.is_some() && !self.is_ready() {
            warn!("classifying before warm-up; first inference may be slow");
        }

        let scores = self.scores(image)?;
        let Some((class_index, confidence)) = argmax(&scores) else {
            return Err(RecognitionError::inference("model has no classes"));
        };

        if confidence < self.threshold {
            debug!(
                best = %self.labels[class_index],
                confidence,
                threshold = self.threshold,
                "gesture confidence below threshold"
            );
            return Ok(None);
        }

        debug!(label = %self.labels[class_index], confidence, "gesture classified");
        Ok(Some(ClassificationResult {
            label: self.labels[class_index].clone(),
            class_index,
            confidence,
        }))
    }
}

/// Index and value of the maximum; first index wins ties.
fn argmax(scores: &[f32]) -> Option<(usize, f32)> {
    scores
        .iter()
        .copied()
        .enumerate()
        .fold(None, |best, (i, s)| match best {
            Some((_, b)) if b >= s => best,
            _ => Some((i, s)),
        })
}
