//! JSON wire messages exchanged with a client session.

use serde::{Deserialize, Serialize};

use crate::kernel::assembler::buffer::BufferInfo;
use crate::kernel::fusion::types::{ChannelDetection, ChannelWeights, EnsembleResult, FusionReport};
use crate::kernel::governor::GovernorReport;
use crate::kernel::mode::{Mode, ModeInfo};
use crate::kernel::telemetry::metrics::TelemetrySnapshot;
use crate::kernel::time::{wall_clock, Timestamp};

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Inbound {
    Frame(FrameMessage),
    SetMode { mode: Mode },
    Status,
    ResetQuality,
    SetWeights { appearance: f32, pose: f32 },
    ApplyAdaptiveWeights,
}

/// One unified input event. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FrameMessage {
    /// Base64 little-endian 16-bit mono PCM.
    #[serde(default)]
    pub audio: Option<String>,
    #[serde(default)]
    pub audio_sample_rate: Option<u32>,
    /// Base64 encoded image (PNG, JPEG).
    #[serde(default)]
    pub video: Option<String>,
    /// Flattened keypoints supplied by the client.
    #[serde(default)]
    pub keypoints: Option<Vec<f32>>,
    #[serde(default)]
    pub keypoint_confidence: Option<f32>,
    #[serde(default)]
    pub hands_present: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Performance {
    pub latency_ms: f64,
    /// The governor resized or resampled an input for this event.
    pub optimized: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct TranslationResponse {
    pub mode: Mode,
    pub audio_level: f32,
    pub motion_level: f32,
    pub translation: Option<EnsembleResult>,
    pub mode_info: ModeInfo,
    pub performance: Performance,
    pub detections: Vec<ChannelDetection>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BufferReport {
    pub video: BufferInfo,
    pub keypoints: BufferInfo,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub session_id: String,
    pub mode_info: ModeInfo,
    pub fusion: FusionReport,
    pub governor: GovernorReport,
    pub buffers: BufferReport,
    pub telemetry: TelemetrySnapshot,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundBody {
    TranslationResult(Box<TranslationResponse>),
    FrameSkipped,
    Ping,
    Status(Box<StatusReport>),
    Ack {
        action: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        weights: Option<ChannelWeights>,
    },
    Error {
        error: String,
        kind: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        retry_count: Option<u32>,
    },
    FatalError {
        error: String,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct Outbound {
    #[serde(flatten)]
    pub body: OutboundBody,
    pub timestamp: Timestamp,
}

impl Outbound {
    pub fn new(body: OutboundBody) -> Self {
        Self {
            body,
            timestamp: wall_clock(),
        }
    }

    pub fn ping() -> Self {
        Self::new(OutboundBody::Ping)
    }

    pub fn frame_skipped() -> Self {
        Self::new(OutboundBody::FrameSkipped)
    }

    pub fn ack(action: &str, weights: Option<ChannelWeights>) -> Self {
        Self::new(OutboundBody::Ack {
            action: action.to_string(),
            weights,
        })
    }

    pub fn error(error: impl Into<String>, kind: &str, retry_count: Option<u32>) -> Self {
        Self::new(OutboundBody::Error {
            error: error.into(),
            kind: kind.to_string(),
            retry_count,
        })
    }

    pub fn fatal(error: impl Into<String>) -> Self {
        Self::new(OutboundBody::FatalError { error: error.into() })
    }

    /// Wire name of the message.
    pub fn kind(&self) -> &'static str {
        match &self.body {
            OutboundBody::TranslationResult(_) => "translation_result",
            OutboundBody::FrameSkipped => "frame_skipped",
            OutboundBody::Ping => "ping",
            OutboundBody::Status(_) => "status",
            OutboundBody::Ack { .. } => "ack",
            OutboundBody::Error { .. } => "error",
            OutboundBody::FatalError { .. } => "fatal_error",
        }
    }
}

pub fn parse_inbound(raw: &str) -> crate::error::Result<Inbound> {
    Ok(serde_json::from_str(raw)?)
}
