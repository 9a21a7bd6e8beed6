use thiserror::Error;

use crate::kernel::event::Modality;

pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Frame shape or contents do not match the modality's configured input.
    #[error("malformed {modality} frame: {reason}")]
    MalformedFrame { modality: Modality, reason: String },

    #[error("malformed audio: {0}")]
    MalformedAudio(String),

    /// A control request carried values the pipeline cannot apply.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("invalid sequence length: expected {expected}, got {actual}")]
    InvalidSequence { expected: usize, actual: usize },

    #[error("invalid message: {0}")]
    InvalidMessage(#[from] serde_json::Error),

    #[error("invalid payload encoding: {0}")]
    Encoding(#[from] base64::DecodeError),

    #[error("image decode failed: {0}")]
    ImageDecode(#[from] image::ImageError),

    #[error("audio resampling failed: {0}")]
    Resample(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("scorer worker for {0} is no longer running")]
    WorkerGone(Modality),

    #[error("internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    /// Malformed input is answered with an error response for the one event
    /// and never counts toward the session's fatal-error budget.
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            PipelineError::MalformedFrame { .. }
                | PipelineError::MalformedAudio(_)
                | PipelineError::InvalidRequest(_)
                | PipelineError::InvalidSequence { .. }
                | PipelineError::InvalidMessage(_)
                | PipelineError::Encoding(_)
                | PipelineError::ImageDecode(_)
        )
    }

    /// Short machine-readable kind used in error responses and telemetry.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::MalformedFrame { .. } => "malformed_frame",
            PipelineError::MalformedAudio(_) => "malformed_audio",
            PipelineError::InvalidRequest(_) => "invalid_request",
            PipelineError::InvalidSequence { .. } => "invalid_sequence",
            PipelineError::InvalidMessage(_) => "invalid_message",
            PipelineError::Encoding(_) => "invalid_encoding",
            PipelineError::ImageDecode(_) => "image_decode",
            PipelineError::Resample(_) => "resample",
            PipelineError::Config(_) => "config",
            PipelineError::WorkerGone(_) => "worker_gone",
            PipelineError::Internal(_) => "internal",
        }
    }
}
