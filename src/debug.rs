//! Optional diagnostics hooks.
//!
//! The pipeline reports appended capture points and produced rasters to a
//! [`DebugSink`]. The default [`NoopSink`] ignores everything; [`DirectorySink`]
//! dumps each raster as a PNG file.

use std::path::{Path, PathBuf};

use tracing::warn;

use crate::capture::Sample;
use crate::classifier::ClassificationResult;
use crate::error::Result;
use crate::raster::RasterImage;

/// Receiver for debug side effects of recognition.
pub trait DebugSink: Send {
    /// A capture point was stored (place a marker in the visualizer).
    fn point_appended(&mut self, _sample: &Sample) {}

    /// A raster was produced; `result` is the accepted classification, if any.
    fn raster_produced(&mut self, _image: &RasterImage, _result: Option<&ClassificationResult>) {}
}

/// Sink that does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl DebugSink for NoopSink {}

/// Writes every raster to `<dir>/<seq>_<label>.png`.
#[derive(Debug)]
pub struct DirectorySink {
    dir: PathBuf,
    written: usize,
}

impl DirectorySink {
    /// Create the sink, creating `dir` if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir, written: 0 })
    }

    /// Number of images written so far.
    #[must_use]
    pub const fn written(&self) -> usize {
        self.written
    }
}

impl DebugSink for DirectorySink {
    fn raster_produced(&mut self, image: &RasterImage, result: Option<&ClassificationResult>) {
        let label = result.map_or("unrecognized", |r| r.label.as_str());
        let path = self.dir.join(format!("{:04}_{label}.png", self.written));
        // Diagnostics must never break recognition.
        match image.to_gray_image().save(&path) {
            Ok(()) => self.written += 1,
            Err(e) => warn!(path = %path.display(), error = %e, "failed to write debug raster"),
        }
    }
}
