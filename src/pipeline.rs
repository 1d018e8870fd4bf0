//! End-to-end recognizer driven by the host's update loop.
//!
//! [`SpellRecognizer`] is built once at startup and owned by whatever runs
//! the per-frame loop. Each frame the host calls [`SpellRecognizer::tick`]
//! with the input state; intents from the speech recognizer arrive through
//! [`SpellRecognizer::on_intent`]. Cast decisions are returned and also
//! delivered to every subscribed [`CastListener`].
//!
//! Rejected strokes (too short, degenerate, under threshold) end silently.

use std::path::PathBuf;

use nalgebra::Vector3;
use tracing::{debug, warn};

use crate::capture::{CaptureEvent, Stroke, StrokeCapture};
use crate::classifier::{ClassificationResult, GestureClassifier};
use crate::config::RecognizerConfig;
use crate::debug::{DebugSink, NoopSink};
use crate::error::{RecognitionError, Result};
use crate::export::TrainingExporter;
use crate::fusion::{CastDecision, FusionState, FusionStateMachine, IntentEvent};
use crate::normalize::normalize;
use crate::raster::rasterize;

/// Observer notified of every cast decision.
pub trait CastListener: Send {
    fn on_cast(&mut self, decision: &CastDecision);
}

impl<F> CastListener for F
where
    F: FnMut(&CastDecision) + Send,
{
    fn on_cast(&mut self, decision: &CastDecision) {
        self(decision);
    }
}

/// Strokes are saved under `gesture` instead of being classified.
#[derive(Debug)]
struct TrainingSession {
    exporter: TrainingExporter,
    gesture: String,
}

/// Capture, recognition and fusion wired together.
pub struct SpellRecognizer {
    config: RecognizerConfig,
    capture: StrokeCapture,
    classifier: GestureClassifier,
    fusion: FusionStateMachine,
    sink: Box<dyn DebugSink>,
    listeners: Vec<Box<dyn CastListener>>,
    training: Option<TrainingSession>,
}

impl std::fmt::Debug for SpellRecognizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpellRecognizer")
            .field("config", &self.config)
            .field("capture", &self.capture)
            .field("classifier", &self.classifier)
            .field("fusion", &self.fusion)
            .field("listeners", &self.listeners.len())
            .field("training", &self.training)
            .finish_non_exhaustive()
    }
}

impl SpellRecognizer {
    /// Build the pipeline.
    ///
    /// The classifier's threshold is overwritten with
    /// `config.confidence_threshold`.
    ///
    /// # Errors
    ///
    /// Returns an error if `config` is invalid or its grid size differs from
    /// the classifier's.
    pub fn new(config: RecognizerConfig, classifier: GestureClassifier) -> Result<Self> {
        config.validate()?;
        let classifier = Self::adopt(&config, classifier)?;

        Ok(Self {
            capture: StrokeCapture::new(config.min_point_spacing),
            fusion: FusionStateMachine::new(
                config.match_window_seconds,
                config.intent_to_gesture.clone(),
            ),
            classifier,
            sink: Box::new(NoopSink),
            listeners: Vec::new(),
            training: None,
            config,
        })
    }

    fn adopt(config: &RecognizerConfig, mut classifier: GestureClassifier) -> Result<GestureClassifier> {
        if classifier.grid_size() != config.grid_size {
            return Err(RecognitionError::invalid_config(format!(
                "classifier expects a {} grid, config uses {}",
                classifier.grid_size(),
                config.grid_size
            )));
        }
        classifier.set_threshold(config.confidence_threshold);
        Ok(classifier)
    }

    /// Swap in another classifier, e.g. one rebuilt from freshly recorded
    /// templates. Its threshold is set from the config; warm it up again
    /// with [`SpellRecognizer::warm_up`].
    ///
    /// # Errors
    ///
    /// Returns an error if its grid size differs from the config's; the
    /// current classifier is kept.
    pub fn set_classifier(&mut self, classifier: GestureClassifier) -> Result<()> {
        self.classifier = Self::adopt(&self.config, classifier)?;
        debug!(classes = self.classifier.labels().len(), "classifier replaced");
        Ok(())
    }

    /// Route debug markers and rasters to `sink`.
    #[must_use]
    pub fn with_debug_sink(mut self, sink: impl DebugSink + 'static) -> Self {
        self.sink = Box::new(sink);
        self
    }

    /// Register an observer for cast decisions.
    pub fn subscribe(&mut self, listener: impl CastListener + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Warm up the inference runtime. Call once at startup, off the hot path.
    ///
    /// # Errors
    ///
    /// See [`GestureClassifier::warm_up`].
    pub fn warm_up(&self) -> Result<()> {
        self.classifier.warm_up()
    }

    /// Per-frame update.
    ///
    /// # Arguments
    ///
    /// * `held` - Whether the gesture input is held this frame
    /// * `position` - Current tracked position
    /// * `now` - Host time in seconds
    ///
    /// # Errors
    ///
    /// Runtime faults (`NotReady`, `InferenceError`) and export failures for
    /// the stroke that just ended. The recognizer stays usable afterwards.
    pub fn tick(&mut self, held: bool, position: Vector3<f32>, now: f64) -> Result<Option<CastDecision>> {
        match self.capture.tick(held, position, now) {
            Some(CaptureEvent::Appended(sample)) => {
                self.sink.point_appended(&sample);
                Ok(None)
            }
            Some(CaptureEvent::Released(stroke)) => self.finish_stroke(stroke, now),
            None => Ok(None),
        }
    }

    fn finish_stroke(&mut self, stroke: Result<Stroke>, now: f64) -> Result<Option<CastDecision>> {
        let stroke = match stroke {
            Ok(stroke) => stroke,
            Err(e) => {
                debug!(error = %e, "stroke discarded");
                return Ok(None);
            }
        };

        if let Some(session) = self.training.as_mut() {
            return match session.exporter.export(&stroke, &session.gesture) {
                Ok(_) => Ok(None),
                Err(e) if e.is_recoverable() => {
                    debug!(error = %e, "training stroke discarded");
                    Ok(None)
                }
                Err(e) => Err(e),
            };
        }

        match self.recognize(&stroke) {
            Ok(Some(result)) => Ok(self.on_gesture(result.label, now)),
            Ok(None) => Ok(None),
            Err(e) if e.is_recoverable() => {
                debug!(error = %e, "stroke rejected");
                Ok(None)
            }
            Err(e) => {
                warn!(error = %e, "gesture recognition failed");
                Err(e)
            }
        }
    }

    /// Normalize, rasterize and classify a finished stroke.
    ///
    /// # Errors
    ///
    /// - [`RecognitionError::InsufficientData`] for fewer than 3 points;
    ///   nothing downstream runs
    /// - [`RecognitionError::DegenerateStroke`] for coincident points
    /// - classifier errors
    pub fn recognize(&mut self, stroke: &Stroke) -> Result<Option<ClassificationResult>> {
        if !stroke.is_recognizable() {
            return Err(RecognitionError::insufficient_data(
                crate::capture::MIN_STROKE_POINTS,
                stroke.len(),
            ));
        }

        let normalized = normalize(
            &stroke.project(self.config.projection),
            self.config.grid_size,
            self.config.normalize_margin,
        )?;
        let image = rasterize(&normalized);
        let result = self.classifier.classify(&image)?;
        self.sink.raster_produced(&image, result.as_ref());
        Ok(result)
    }

    /// Feed a gesture label (from this pipeline or an external recognizer).
    pub fn on_gesture(&mut self, label: impl Into<String>, now: f64) -> Option<CastDecision> {
        let decision = self.fusion.on_gesture(label, now);
        self.notify(decision)
    }

    /// Feed an intent from the speech recognizer.
    pub fn on_intent(&mut self, event: &IntentEvent) -> Option<CastDecision> {
        let decision = self.fusion.on_intent_event(event);
        self.notify(decision)
    }

    fn notify(&mut self, decision: Option<CastDecision>) -> Option<CastDecision> {
        if let Some(d) = &decision {
            for listener in &mut self.listeners {
                listener.on_cast(d);
            }
        }
        decision
    }

    /// Save subsequent strokes as training samples for `gesture` in `dir`.
    pub fn start_training(&mut self, dir: impl Into<PathBuf>, gesture: impl Into<String>) {
        let gesture = gesture.into();
        debug!(gesture = %gesture, "training mode on");
        self.training = Some(TrainingSession {
            exporter: TrainingExporter::from_config(dir, &self.config),
            gesture,
        });
    }

    /// Change the label used for training samples. No-op outside training.
    pub fn set_training_gesture(&mut self, gesture: impl Into<String>) {
        if let Some(session) = self.training.as_mut() {
            session.gesture = gesture.into();
        }
    }

    /// Return to recognition mode.
    pub fn stop_training(&mut self) {
        if self.training.take().is_some() {
            debug!("training mode off");
        }
    }

    #[must_use]
    pub fn is_training(&self) -> bool {
        self.training.is_some()
    }

    /// Whether a stroke is being captured.
    #[must_use]
    pub fn is_capturing(&self) -> bool {
        self.capture.is_capturing()
    }

    /// Whether the runtime finished warm-up.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.classifier.is_ready()
    }

    #[must_use]
    pub fn fusion_state(&self, now: f64) -> FusionState {
        self.fusion.state(now)
    }

    #[must_use]
    pub const fn config(&self) -> &RecognizerConfig {
        &self.config
    }

    #[must_use]
    pub const fn classifier(&self) -> &GestureClassifier {
        &self.classifier
    }

    #[must_use]
    pub const fn fusion(&self) -> &FusionStateMachine {
        &self.fusion
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::TensorShape;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    fn recognizer(scores: Vec<f32>) -> SpellRecognizer {
        let config = RecognizerConfig::permissive().with_min_point_spacing(0.01);
        let labels: Vec<String> = config.intent_to_gesture.values().cloned().collect();
        let backend = move |_: &[f32], _: TensorShape| -> Result<Vec<f32>> { Ok(scores.clone()) };
        let classifier = GestureClassifier::new(labels, 28, 0.0).with_backend(backend);
        SpellRecognizer::new(config, classifier).unwrap()
    }

    /// Labels are ordered as the BTreeMap values:
    /// accio, bombardo, expecto_patronum, protego, stupefy.
    fn bombardo_scores() -> Vec<f32> {
        vec![0.02, 0.9, 0.03, 0.03, 0.02]
    }

    fn draw_triangle(r: &mut SpellRecognizer, t0: f64) -> Result<Option<CastDecision>> {
        let path = [[0.0, 0.0], [0.5, 0.0], [1.0, 0.0], [0.5, 0.8], [0.0, 0.0]];
        for (i, p) in path.iter().enumerate() {
            r.tick(true, Vector3::new(p[0], p[1], 0.0), t0 + i as f64 * 0.05)?;
        }
        r.tick(false, Vector3::zeros(), t0 + 0.3)
    }

    #[test]
    fn test_threshold_comes_from_config() {
        let r = recognizer(bombardo_scores());
        assert_eq!(r.classifier().threshold(), 0.3);
    }

    #[test]
    fn test_grid_mismatch_rejected() {
        let classifier = GestureClassifier::new(["a"], 32, 0.5);
        assert!(SpellRecognizer::new(RecognizerConfig::default(), classifier).is_err());
    }

    #[test]
    fn test_stroke_then_intent_casts_once() {
        let mut r = recognizer(bombardo_scores());
        let casts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&casts);
        r.subscribe(move |_: &CastDecision| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(draw_triangle(&mut r, 0.0).unwrap().is_none());
        assert_eq!(r.fusion_state(0.3), FusionState::GesturePending);

        let cast = r.on_intent(&IntentEvent::new("cast_bombardo", 0.95, 1.3));
        assert_eq!(cast.unwrap().spell, "cast_bombardo");
        assert!(r.on_intent(&IntentEvent::new("cast_bombardo", 0.95, 1.3)).is_none());
        assert_eq!(casts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_short_stroke_never_classified() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let backend = move |_: &[f32], _: TensorShape| -> Result<Vec<f32>> {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(vec![1.0])
        };
        let classifier = GestureClassifier::new(["only"], 28, 0.0).with_backend(backend);
        let mut r = SpellRecognizer::new(RecognizerConfig::default(), classifier).unwrap();

        r.tick(true, Vector3::new(0.0, 0.0, 0.0), 0.0).unwrap();
        r.tick(true, Vector3::new(1.0, 0.0, 0.0), 0.1).unwrap();
        assert!(r.tick(false, Vector3::zeros(), 0.2).unwrap().is_none());

        assert!(r.recognize(&Stroke::from_planar(&[[0.0, 0.0]])).unwrap_err().is_recoverable());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_not_ready_scoped_to_attempt() {
        let config = RecognizerConfig::permissive().with_min_point_spacing(0.01);
        let classifier = GestureClassifier::new(["a", "b"], 28, 0.0);
        let mut r = SpellRecognizer::new(config, classifier).unwrap();

        assert!(matches!(draw_triangle(&mut r, 0.0), Err(RecognitionError::NotReady)));
        assert!(!r.is_capturing());
        // Next frame works normally.
        assert!(r.tick(false, Vector3::zeros(), 1.0).unwrap().is_none());
    }

    #[test]
    fn test_debug_sink_sees_points_and_raster() {
        #[derive(Default)]
        struct Recording {
            points: usize,
            rasters: Vec<Option<String>>,
        }
        struct Shared(Arc<Mutex<Recording>>);
        impl DebugSink for Shared {
            fn point_appended(&mut self, _: &crate::capture::Sample) {
                self.0.lock().unwrap().points += 1;
            }
            fn raster_produced(&mut self, _: &crate::raster::RasterImage, r: Option<&ClassificationResult>) {
                self.0.lock().unwrap().rasters.push(r.map(|r| r.label.clone()));
            }
        }

        let log = Arc::new(Mutex::new(Recording::default()));
        let mut r = recognizer(bombardo_scores()).with_debug_sink(Shared(Arc::clone(&log)));
        draw_triangle(&mut r, 0.0).unwrap();

        let log = log.lock().unwrap();
        assert_eq!(log.points, 5);
        assert_eq!(log.rasters, vec![Some("cast_bombardo".to_string())]);
    }

    #[test]
    fn test_set_classifier_rejects_grid_mismatch() {
        let mut r = recognizer(bombardo_scores());
        assert!(r.set_classifier(GestureClassifier::new(["a"], 16, 0.5)).is_err());
        assert_eq!(r.classifier().labels().len(), 5);
    }

    #[test]
    fn test_recorded_gestures_become_recognizable() {
        let dir = tempfile::tempdir().unwrap();
        let mut r = recognizer(bombardo_scores());

        r.start_training(dir.path(), "cast_bombardo");
        draw_triangle(&mut r, 0.0).unwrap();
        r.set_training_gesture("cast_protego");
        for (i, x) in [0.0, 0.5, 1.0, 1.5].into_iter().enumerate() {
            r.tick(true, Vector3::new(x, 0.0, 0.0), 1.0 + i as f64 * 0.05).unwrap();
        }
        r.tick(false, Vector3::zeros(), 1.3).unwrap();
        r.stop_training();

        let templates = crate::templates::TemplateBackend::load(dir.path(), 28).unwrap();
        assert_eq!(templates.labels(), ["cast_bombardo", "cast_protego"]);
        r.set_classifier(templates.into_classifier(0.0)).unwrap();
        assert!(!r.is_ready());
        r.warm_up().unwrap();

        assert!(draw_triangle(&mut r, 2.0).unwrap().is_none());
        let cast = r.on_intent(&IntentEvent::new("cast_bombardo", 0.9, 2.5)).unwrap();
        assert_eq!(cast.gesture, "cast_bombardo");
    }

    #[test]
    fn test_training_mode_exports_instead_of_classifying() {
        let dir = tempfile::tempdir().unwrap();
        let mut r = recognizer(bombardo_scores());
        r.start_training(dir.path(), "cast_protego");
        assert!(r.is_training());

        assert!(draw_triangle(&mut r, 0.0).unwrap().is_none());
        assert_eq!(r.fusion_state(0.3), FusionState::Idle);

        let samples = crate::export::load_samples(dir.path()).unwrap();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].gesture, "cast_protego");

        r.stop_training();
        assert!(draw_triangle(&mut r, 1.0).unwrap().is_none());
        assert_eq!(r.fusion_state(1.3), FusionState::GesturePending);
    }
}
