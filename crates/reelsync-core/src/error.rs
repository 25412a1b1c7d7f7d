//! Error types for ReelSync.

use crate::types::StreamId;
use thiserror::Error;

/// Main error type for ReelSync operations.
#[derive(Error, Debug)]
pub enum ReelError {
    /// A piece was handed audio for a stream its content never declared.
    #[error("Unknown audio stream: {0}")]
    UnknownStream(StreamId),

    /// Video emissions could not be put back into output order.
    #[error("Ordering violation: {0}")]
    Ordering(String),

    #[error("Resampler error: {0}")]
    Resample(String),

    /// Raised by a decode source; ends that piece but not the timeline.
    #[error("Decoder error: {0}")]
    Decoder(String),

    #[error("Package error: {0}")]
    Package(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for ReelSync operations.
pub type Result<T> = std::result::Result<T, ReelError>;
