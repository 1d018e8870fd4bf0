//! Configuration for gesture recognition and spell fusion.
//!
//! This module provides the [`RecognizerConfig`] struct which centralizes all
//! tunable parameters of the pipeline, along with presets.
//!
//! # Example
//!
//! ```
//! use spell_fusion::RecognizerConfig;
//!
//! // Conservative production defaults
//! let config = RecognizerConfig::default();
//!
//! // Low threshold for trying gestures out on a headset
//! let testing = RecognizerConfig::permissive().with_match_window(7.0);
//! assert!(testing.validate().is_ok());
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::capture::Projection;
use crate::error::{RecognitionError, Result};

/// Canonical raster edge length the bundled models were trained on.
pub const DEFAULT_GRID_SIZE: usize = 28;

/// Fraction of `(grid_size - 1)` the longer stroke extent is scaled to.
///
/// Model-specific: must equal the value used when the training images were
/// produced.
pub const DEFAULT_MARGIN: f32 = 0.96;

/// Point count for arc-length resampling of exported training samples.
pub const DEFAULT_RESAMPLE_POINTS: usize = 28;

/// Spell identifiers recognized by default. Each maps to a gesture class of
/// the same name.
pub const DEFAULT_SPELLS: [&str; 5] = [
    "cast_accio",
    "cast_bombardo",
    "cast_expecto_patronum",
    "cast_stupefy",
    "cast_protego",
];

/// Configuration for the recognition pipeline.
///
/// # Core Parameters
///
/// - `confidence_threshold`: minimum argmax score for a gesture to count.
/// - `match_window_seconds`: how long a gesture or intent stays eligible for fusion.
/// - `intent_to_gesture`: the gesture each intent requires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognizerConfig {
    /// Minimum classifier score in `[0, 1]`. Below it the result is absent.
    pub confidence_threshold: f32,

    /// Edge length of the canonical grid and raster (28 for the shipped models).
    pub grid_size: usize,

    /// Margin factor applied when scaling into the grid.
    pub normalize_margin: f32,

    /// Minimum distance between stored capture points (world units).
    /// Decouples point density from the polling rate.
    pub min_point_spacing: f32,

    /// Fusion validity window in seconds.
    pub match_window_seconds: f64,

    /// Intent label -> required gesture label.
    pub intent_to_gesture: BTreeMap<String, String>,

    /// Plane the 3D capture is projected onto.
    pub projection: Projection,

    /// Fixed point count for training export.
    pub resample_points: usize,
}

impl Default for RecognizerConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.7,
            grid_size: DEFAULT_GRID_SIZE,
            normalize_margin: DEFAULT_MARGIN,
            min_point_spacing: 0.05,
            match_window_seconds: 3.0,
            intent_to_gesture: default_intent_table(),
            projection: Projection::Xy,
            resample_points: DEFAULT_RESAMPLE_POINTS,
        }
    }
}

/// The five self-mapped spells.
#[must_use]
pub fn default_intent_table() -> BTreeMap<String, String> {
    DEFAULT_SPELLS
        .iter()
        .map(|s| ((*s).to_string(), (*s).to_string()))
        .collect()
}

impl RecognizerConfig {
    /// Create a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any parameter is out of valid range.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(RecognitionError::invalid_config(format!(
                "confidence_threshold must be in [0, 1], got {}",
                self.confidence_threshold
            )));
        }
        if self.grid_size < 2 {
            return Err(RecognitionError::invalid_config(
                "grid_size must be at least 2",
            ));
        }
        if !(self.normalize_margin > 0.0 && self.normalize_margin <= 1.0) {
            return Err(RecognitionError::invalid_config(
                "normalize_margin must be in (0, 1]",
            ));
        }
        if !(self.min_point_spacing >= 0.0) {
            return Err(RecognitionError::invalid_config(
                "min_point_spacing must be non-negative",
            ));
        }
        if !(self.match_window_seconds > 0.0) {
            return Err(RecognitionError::invalid_config(
                "match_window_seconds must be positive",
            ));
        }
        if self.resample_points < 2 {
            return Err(RecognitionError::invalid_config(
                "resample_points must be at least 2",
            ));
        }
        for (intent, gesture) in &self.intent_to_gesture {
            if intent.trim().is_empty() || gesture.trim().is_empty() {
                return Err(RecognitionError::invalid_config(
                    "intent_to_gesture entries must not be empty",
                ));
            }
        }
        Ok(())
    }

    /// Preset with the low threshold used while trying out new gestures.
    #[must_use]
    pub fn permissive() -> Self {
        Self {
            confidence_threshold: 0.3,
            ..Self::default()
        }
    }

    /// Preset for shipped builds: strict threshold, short window.
    #[must_use]
    pub fn production() -> Self {
        Self {
            confidence_threshold: 0.85,
            match_window_seconds: 3.0,
            ..Self::default()
        }
    }

    /// Set the confidence threshold.
    #[must_use]
    pub const fn with_confidence_threshold(mut self, threshold: f32) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    /// Set the fusion window.
    #[must_use]
    pub const fn with_match_window(mut self, seconds: f64) -> Self {
        self.match_window_seconds = seconds;
        self
    }

    /// Set the minimum capture spacing.
    #[must_use]
    pub const fn with_min_point_spacing(mut self, spacing: f32) -> Self {
        self.min_point_spacing = spacing;
        self
    }

    /// Set grid size and margin together; both come with the model artifact.
    #[must_use]
    pub const fn with_grid(mut self, grid_size: usize, margin: f32) -> Self {
        self.grid_size = grid_size;
        self.normalize_margin = margin;
        self
    }

    /// Set the projection plane.
    #[must_use]
    pub const fn with_projection(mut self, projection: Projection) -> Self {
        self.projection = projection;
        self
    }

    /// Add or replace a single intent mapping.
    #[must_use]
    pub fn with_mapping(mut self, intent: impl Into<String>, gesture: impl Into<String>) -> Self {
        self.intent_to_gesture.insert(intent.into(), gesture.into());
        self
    }

    /// Replace the whole intent table.
    #[must_use]
    pub fn with_intent_table(mut self, table: BTreeMap<String, String>) -> Self {
        self.intent_to_gesture = table;
        self
    }

    /// Parse and validate a JSON document. Missing fields take defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or fails validation.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load config from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is invalid.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Save config as pretty JSON, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error on serialization or filesystem failure.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RecognizerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.grid_size, 28);
        assert_eq!(config.intent_to_gesture.len(), 5);
        assert_eq!(
            config.intent_to_gesture.get("cast_bombardo").map(String::as_str),
            Some("cast_bombardo")
        );
    }

    #[test]
    fn test_presets() {
        let permissive = RecognizerConfig::permissive();
        assert!(permissive.validate().is_ok());
        assert_eq!(permissive.confidence_threshold, 0.3);

        let production = RecognizerConfig::production();
        assert!(production.validate().is_ok());
        assert!(production.confidence_threshold > permissive.confidence_threshold);
    }

    #[test]
    fn test_validation() {
        let mut config = RecognizerConfig::default();

        config.confidence_threshold = 1.5;
        assert!(config.validate().is_err());

        config.confidence_threshold = 0.5;
        config.grid_size = 1;
        assert!(config.validate().is_err());

        config.grid_size = 28;
        config.match_window_seconds = 0.0;
        assert!(config.validate().is_err());

        config.match_window_seconds = 3.0;
        config.normalize_margin = 0.0;
        assert!(config.validate().is_err());

        config.normalize_margin = 0.96;
        config = config.with_mapping("cast_accio", " ");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_builder_pattern() {
        let config = RecognizerConfig::default()
            .with_confidence_threshold(0.4)
            .with_match_window(7.0)
            .with_mapping("cast_lumos", "circle");
        assert_eq!(config.confidence_threshold, 0.4);
        assert_eq!(config.match_window_seconds, 7.0);
        assert_eq!(config.intent_to_gesture.len(), 6);
    }

    #[test]
    fn test_json_partial_document() {
        let config =
            RecognizerConfig::from_json_str(r#"{ "confidence_threshold": 0.3, "match_window_seconds": 7.0 }"#)
                .unwrap();
        assert_eq!(config.confidence_threshold, 0.3);
        assert_eq!(config.match_window_seconds, 7.0);
        assert_eq!(config.grid_size, DEFAULT_GRID_SIZE);

        assert!(RecognizerConfig::from_json_str(r#"{ "grid_size": 0 }"#).is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("recognizer.json");

        let config = RecognizerConfig::permissive().with_projection(Projection::Xz);
        config.save(&path).unwrap();

        let loaded = RecognizerConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }
}
