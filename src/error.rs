//! Error types for pose tracking.
//!
//! Only environment failures are errors. Expected conditions such as a lost
//! pose or a short landmark set are `None` values.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TrackingError {
    #[error("Video element is required for pose tracking")]
    MissingVideoSource,

    #[error("Failed to initialize pose detection: {0}")]
    EstimatorInit(String),

    #[error("Pose estimator rejected frame: {0}")]
    EstimatorSend(String),

    #[error("Camera error: {0}")]
    Camera(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Subscriber failed: {0}")]
    Subscriber(String),
}

pub type Result<T> = std::result::Result<T, TrackingError>;
