use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid time series bounds: first_frame {0} is after last_frame {1}")]
    InvalidFrameBounds(u32, u32),

    #[error("Invalid sample rate: {0} (must be positive)")]
    InvalidRate(f64),

    #[error("Frame {0} is out of bounds ({1}..={2})")]
    FrameOutOfBounds(u32, u32, u32),

    #[error("Marker '{0}' not found in trial")]
    MarkerNotFound(String),

    #[error("Marker '{marker}' has {actual} frames, expected {expected}")]
    TrajectoryLengthMismatch {
        marker: String,
        actual: usize,
        expected: usize,
    },

    #[error("Force platform sample series have mismatched lengths")]
    PlatformLengthMismatch,

    #[error("Failed to read or write trial snapshot: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize or deserialize trial snapshot: {0}")]
    Json(#[from] serde_json::Error),
}
