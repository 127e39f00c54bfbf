//! Error types for the gesture pipeline and the application shell.
//!
//! A missing hand is not an error: sources report it as `Ok(None)`.

use std::io;
use std::path::PathBuf;

use thiserror::Error;
use tree_particles::MorphError;

/// A keypoint slice that cannot form a hand.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LandmarkError {
    #[error("expected 21 keypoints, got {0}")]
    WrongCount(usize),
}

/// Opening the landmark source failed.  The session carries on without
/// gesture control and reports the message once.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SourceError {
    #[error("camera permission denied")]
    PermissionDenied,
    #[error("tracking device busy: {0}")]
    DeviceBusy(String),
    #[error("hand tracking unsupported: {0}")]
    Unsupported(String),
    #[error("landmark engine failed to load: {0}")]
    EngineLoad(String),
}

impl SourceError {
    /// True for failures of the detection engine itself rather than of the
    /// device or its permissions.
    pub fn is_fatal_init(&self) -> bool {
        matches!(self, SourceError::EngineLoad(_))
    }
}

/// One detection pass failed.  Swallowed; the next pass runs as usual.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DetectError {
    #[error("no new frame available")]
    NoFrame,
    #[error("detection pass failed: {0}")]
    Transient(String),
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("window: {0}")]
    Window(String),
    #[error("reading config {path}: {source}")]
    ConfigRead { path: PathBuf, source: io::Error },
    #[error("parsing config: {0}")]
    ConfigParse(#[from] serde_json::Error),
    #[error("scene generation: {0}")]
    Scene(#[from] MorphError),
}
