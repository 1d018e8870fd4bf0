//! Spell Fusion
//!
//! Gesture stroke recognition fused with speech intents.
//!
//! A stroke drawn in the air is captured while an input is held, normalized
//! onto a canonical grid, rasterized and classified by an external model.
//! The resulting gesture label is paired with an independently recognized
//! speech intent; when both agree inside a time window, exactly one cast
//! decision is emitted.
//!
//! # Pipeline
//!
//! | Stage | Module | Output |
//! |-------|--------|--------|
//! | Capture | [`capture`] | [`Stroke`] (≥ 3 points) |
//! | Normalize | [`normalize`](mod@normalize) | [`NormalizedStroke`] on a G×G grid |
//! | Rasterize | [`raster`] | [`RasterImage`] with 0/1 pixels |
//! | Classify | [`classifier`], [`templates`] | optional [`ClassificationResult`] |
//! | Fuse | [`fusion`] | [`CastDecision`] |
//!
//! # Quick Start
//!
//! ```
//! use nalgebra::Vector3;
//! use spell_fusion::{
//!     GestureClassifier, IntentEvent, RecognizerConfig, SpellRecognizer, TensorShape,
//! };
//!
//! let config = RecognizerConfig::permissive();
//!
//! // Stand-in for the inference runtime: always "cast_bombardo".
//! let labels = ["cast_bombardo", "cast_protego"];
//! let runtime = |_: &[f32], _: TensorShape| -> spell_fusion::Result<Vec<f32>> { Ok(vec![0.9, 0.1]) };
//! let classifier = GestureClassifier::from_config(labels, &config).with_backend(runtime);
//!
//! let mut recognizer = SpellRecognizer::new(config, classifier)?;
//! recognizer.warm_up()?;
//!
//! // Draw a triangle while the trigger is held, then release.
//! let path = [[0.0, 0.0], [1.0, 0.0], [0.5, 0.9], [0.0, 0.0]];
//! for (i, p) in path.iter().enumerate() {
//!     recognizer.tick(true, Vector3::new(p[0], p[1], 0.0), i as f64 * 0.1)?;
//! }
//! assert!(recognizer.tick(false, Vector3::zeros(), 0.4)?.is_none());
//!
//! // The spoken intent arrives a second later.
//! let cast = recognizer.on_intent(&IntentEvent::new("cast_bombardo", 0.93, 1.4));
//! assert_eq!(cast.unwrap().spell, "cast_bombardo");
//! # Ok::<(), spell_fusion::RecognitionError>(())
//! ```

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::similar_names)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_wrap)]

pub mod capture;
pub mod classifier;
pub mod config;
pub mod debug;
pub mod error;
pub mod export;
pub mod fusion;
pub mod normalize;
pub mod pipeline;
pub mod raster;
pub mod templates;

// Re-exports for convenient access
pub use capture::{CaptureEvent, Projection, Sample, Stroke, StrokeCapture, MIN_STROKE_POINTS};
pub use classifier::{
    ClassificationResult, GestureClassifier, InferenceBackend, TensorLayout, TensorShape,
};
pub use config::{RecognizerConfig, DEFAULT_GRID_SIZE, DEFAULT_MARGIN};
pub use debug::{DebugSink, DirectorySink, NoopSink};
pub use error::{RecognitionError, Result};
pub use export::{load_samples, TrainingExporter, TrainingSample};
pub use fusion::{
    CastDecision, FusionState, FusionStateMachine, IntentEvent, PendingEvent, SharedFusion,
};
pub use normalize::{normalize, resample, NormalizedStroke};
pub use pipeline::{CastListener, SpellRecognizer};
pub use raster::{rasterize, RasterImage};
pub use templates::TemplateBackend;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point2;

    fn generate_circle(n: usize, radius: f32) -> Vec<Point2<f32>> {
        (0..=n)
            .map(|i| {
                let angle = 2.0 * std::f32::consts::PI * i as f32 / n as f32;
                Point2::new(radius * angle.cos(), radius * angle.sin())
            })
            .collect()
    }

    #[test]
    fn test_full_pipeline() {
        let points = generate_circle(40, 0.3);

        let normalized = normalize(&points, DEFAULT_GRID_SIZE, DEFAULT_MARGIN).unwrap();
        let image = rasterize(&normalized);
        assert_eq!(image.pixels().len(), 28 * 28);

        // Closed loop: center stays empty, ring is drawn.
        assert_eq!(image.get(14, 14), Some(0.0));
        assert!(image.lit_pixels() > 60);

        let runtime = |input: &[f32], _: TensorShape| -> Result<Vec<f32>> {
            let ink: f32 = input.iter().sum();
            Ok(if ink > 0.0 { vec![0.1, 0.9] } else { vec![0.5, 0.5] })
        };
        let classifier = GestureClassifier::new(["cast_stupefy", "cast_protego"], 28, 0.6)
            .with_backend(runtime);

        let result = classifier.classify(&image).unwrap().unwrap();
        assert_eq!(result.label, "cast_protego");

        let mut fusion = FusionStateMachine::with_default_table(3.0);
        assert!(fusion.on_gesture(result.label, 0.0).is_none());
        assert!(fusion.on_intent("cast_protego", 0.5).is_some());
    }

    #[test]
    fn test_warm_up_with_blank_input_is_below_threshold() {
        let runtime = |input: &[f32], _: TensorShape| -> Result<Vec<f32>> {
            let ink: f32 = input.iter().sum();
            Ok(if ink > 0.0 { vec![0.1, 0.9] } else { vec![0.5, 0.5] })
        };
        let classifier =
            GestureClassifier::new(["a", "b"], 28, 0.6).with_backend(runtime);
        classifier.warm_up().unwrap();
        assert!(classifier.is_ready());
        assert!(classifier.classify(&RasterImage::blank(28)).unwrap().is_none());
    }
}
