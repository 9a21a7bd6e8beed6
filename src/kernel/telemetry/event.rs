use serde::{Deserialize, Serialize};

use crate::kernel::event::Modality;
use crate::kernel::mode::types::Mode;

// Allowed: Modalities, Generation ids, Durations, Counts, Enums
// Forbidden: Frames, Audio, Labels, Text, Scores

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TelemetryEvent {
    FrameRejected {
        modality: Modality,
    },

    /// Ring buffer was full; the frame never entered the buffer.
    FrameDropped {
        modality: Modality,
    },

    FrameSkipped,

    SequenceEmitted {
        modality: Modality,
        generation: u64,
    },

    /// Work queue was full; the newest sequence was shed.
    SequenceShed {
        modality: Modality,
        generation: u64,
    },

    ScorerCompleted {
        modality: Modality,
        generation: u64,
        latency_ms: u64,
    },

    ScorerFailed {
        modality: Modality,
        generation: u64,
        reason: ScorerFailure,
    },

    ModeTransition {
        from: Mode,
        to: Mode,
        manual: bool,
    },

    QualityAdjusted(QualityChange),

    SessionError(ErrorClass),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScorerFailure {
    Error,
    Timeout,
    InvalidOutput,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QualityChange {
    ResolutionReduced,
    AudioRateReduced,
    Reset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorClass {
    Malformed,
    Processing,
    Fatal,
}
