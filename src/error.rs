use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

/// Fatal pipeline errors. Degraded-but-continuable conditions (missing ball
/// boxes, failed feature matching, anchors outside the calibration region)
/// are handled by per-stage fallback policies and never surface here.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("no frames decoded from input")]
    NoFrames,

    #[error("invalid calibration: {0}")]
    InvalidCalibration(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("detector failed at frame {frame}: {source}")]
    Detector {
        frame: usize,
        #[source]
        source: anyhow::Error,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
