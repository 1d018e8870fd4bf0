//! Training sample export.
//!
//! Strokes recorded in training mode are normalized, resampled to a fixed
//! point count and written as one versioned JSON file per sample:
//!
//! ```json
//! { "version": 1, "gesture": "cast_bombardo", "points": [[1.04, 1.04], ...] }
//! ```
//!
//! File names are `<gesture>_<YYYYmmdd_HHMMSS>_<seq>.json`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::capture::{Projection, Stroke};
use crate::config::RecognizerConfig;
use crate::error::{RecognitionError, Result};
use crate::normalize::normalize;

/// Current on-disk format version.
pub const FORMAT_VERSION: u32 = 1;

/// One exported gesture sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingSample {
    pub version: u32,
    pub gesture: String,
    pub points: Vec<[f32; 2]>,
}

impl TrainingSample {
    /// Parse a sample, rejecting unknown versions.
    ///
    /// # Errors
    ///
    /// Returns an error on malformed JSON or an unsupported version.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let sample: Self = serde_json::from_str(json)?;
        if sample.version != FORMAT_VERSION {
            return Err(RecognitionError::UnsupportedVersion {
                found: sample.version,
                expected: FORMAT_VERSION,
            });
        }
        Ok(sample)
    }
}

/// Writes normalized training samples into a directory.
#[derive(Debug)]
pub struct TrainingExporter {
    dir: PathBuf,
    grid_size: usize,
    margin: f32,
    resample_points: usize,
    projection: Projection,
    sequence: u32,
}

impl TrainingExporter {
    /// Create an exporter writing into `dir`.
    ///
    /// # Arguments
    ///
    /// * `dir` - Output directory, created on first export
    /// * `grid_size` - Canonical grid edge length
    /// * `margin` - Normalization margin, same value as live recognition
    /// * `resample_points` - Fixed point count per sample
    pub fn new(dir: impl Into<PathBuf>, grid_size: usize, margin: f32, resample_points: usize) -> Self {
        Self {
            dir: dir.into(),
            grid_size,
            margin,
            resample_points,
            projection: Projection::default(),
            sequence: 0,
        }
    }

    /// Exporter using the grid, margin, projection and resample count from `config`.
    pub fn from_config(dir: impl Into<PathBuf>, config: &RecognizerConfig) -> Self {
        Self::new(
            dir,
            config.grid_size,
            config.normalize_margin,
            config.resample_points,
        )
        .with_projection(config.projection)
    }

    /// Set the projection plane.
    #[must_use]
    pub const fn with_projection(mut self, projection: Projection) -> Self {
        self.projection = projection;
        self
    }

    /// Output directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Build the sample for `stroke` without writing it.
    ///
    /// # Errors
    ///
    /// Returns the normalization error for short or degenerate strokes.
    pub fn sample(&self, stroke: &Stroke, gesture: &str) -> Result<TrainingSample> {
        let normalized = normalize(&stroke.project(self.projection), self.grid_size, self.margin)?;
        Ok(TrainingSample {
            version: FORMAT_VERSION,
            gesture: gesture.to_string(),
            points: normalized.resampled(self.resample_points).to_pairs(),
        })
    }

    /// Normalize, resample and write `stroke` labeled as `gesture`.
    ///
    /// # Errors
    ///
    /// Returns an error for unusable strokes, invalid labels, or I/O failures.
    pub fn export(&mut self, stroke: &Stroke, gesture: &str) -> Result<PathBuf> {
        if gesture.is_empty() || gesture.contains(|c: char| c == '/' || c == '\\') {
            return Err(RecognitionError::invalid_config(format!(
                "gesture label {gesture:?} cannot be used as a file name"
            )));
        }

        let sample = self.sample(stroke, gesture)?;
        std::fs::create_dir_all(&self.dir)?;

        let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let path = self
            .dir
            .join(format!("{gesture}_{stamp}_{:03}.json", self.sequence));
        std::fs::write(&path, serde_json::to_string_pretty(&sample)?)?;
        self.sequence += 1;

        info!(gesture, path = %path.display(), points = sample.points.len(), "training sample saved");
        Ok(path)
    }
}

/// Load every `.json` training sample in `dir`, sorted by file name.
///
/// Files that fail to parse are skipped with a warning.
///
/// # Errors
///
/// Returns an error if the directory cannot be read.
pub fn load_samples(dir: impl AsRef<Path>) -> Result<Vec<TrainingSample>> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
        .collect();
    paths.sort();

    let mut samples = Vec::with_capacity(paths.len());
    for path in paths {
        let content = std::fs::read_to_string(&path)?;
        match TrainingSample::from_json_str(&content) {
            Ok(sample) => samples.push(sample),
            Err(e) => warn!(path = %path.display(), error = %e, "skipping training sample"),
        }
    }
    debug!(count = samples.len(), "training samples loaded");
    Ok(samples)
}
