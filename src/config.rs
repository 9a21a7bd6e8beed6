//! Pipeline configuration.
//!
//! Every section has working defaults, so an empty JSON object (or no file at
//! all) yields the tuned values the pipeline ships with.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{PipelineError, Result};
use crate::kernel::event::{FrameShape, Modality};
use crate::kernel::fusion::types::ChannelWeights;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub assembler: AssemblerConfig,
    pub mode: ModeConfig,
    pub fusion: FusionConfig,
    pub governor: GovernorConfig,
    pub session: SessionConfig,
    pub scorer: ScorerConfig,
}

/// Ring buffer and windowing parameters for one modality.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BufferConfig {
    pub capacity: usize,
    pub sequence_length: usize,
    pub stride: usize,
    pub target_fps: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssemblerConfig {
    pub video: BufferConfig,
    pub keypoints: BufferConfig,
    /// Model input resolution for video frames (width, height).
    pub video_input: (u32, u32),
    /// Flattened keypoint vector length (2 hands x 21 landmarks x xyz).
    pub keypoint_dim: usize,
    /// Extractor confidence a pose must exceed before it is buffered.
    pub keypoint_min_confidence: f32,
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        Self {
            video: BufferConfig {
                capacity: 128,
                sequence_length: 64,
                stride: 16,
                target_fps: 25.0,
            },
            keypoints: BufferConfig {
                capacity: 64,
                sequence_length: 30,
                stride: 10,
                target_fps: 15.0,
            },
            video_input: (224, 224),
            keypoint_dim: 126,
            keypoint_min_confidence: 0.5,
        }
    }
}

impl AssemblerConfig {
    pub fn buffer(&self, modality: Modality) -> BufferConfig {
        match modality {
            Modality::Video => self.video,
            Modality::Keypoints => self.keypoints,
        }
    }

    pub fn shape(&self, modality: Modality) -> FrameShape {
        match modality {
            Modality::Video => FrameShape::Image {
                width: self.video_input.0,
                height: self.video_input.1,
            },
            Modality::Keypoints => FrameShape::Keypoints { dim: self.keypoint_dim },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModeConfig {
    pub audio_threshold: f32,
    pub motion_threshold: f32,
    pub cooldown_secs: f64,
    pub window: usize,
}

impl Default for ModeConfig {
    fn default() -> Self {
        Self {
            audio_threshold: 0.1,
            motion_threshold: 0.2,
            cooldown_secs: 1.0,
            window: 10,
        }
    }
}

impl ModeConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs_f64(self.cooldown_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    pub appearance_weight: f32,
    pub pose_weight: f32,
    pub top_k: usize,
    pub history: usize,
    /// Fused results below this confidence are withheld.
    pub min_confidence: f32,
    /// Recorded fusions required before adaptive weights differ from current ones.
    pub adaptive_min_history: usize,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            appearance_weight: 0.6,
            pose_weight: 0.4,
            top_k: 5,
            history: 10,
            min_confidence: 0.0,
            adaptive_min_history: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GovernorConfig {
    pub enable_frame_skipping: bool,
    pub target_fps: f64,
    pub window: usize,
    pub max_resolution: (u32, u32),
    pub min_resolution: (u32, u32),
    pub audio_sample_rate: u32,
    pub min_audio_sample_rate: u32,
    pub audio_rate_step: u32,
    pub video_budget_ms: f64,
    pub audio_budget_ms: f64,
    pub translation_budget_ms: f64,
    /// Event latency that triggers an automatic quality adjustment.
    pub adjust_trigger_ms: f64,
    pub scale_factor: f64,
}

impl Default for GovernorConfig {
    fn default() -> Self {
        Self {
            enable_frame_skipping: true,
            target_fps: 15.0,
            window: 100,
            max_resolution: (640, 480),
            min_resolution: (320, 240),
            audio_sample_rate: 16_000,
            min_audio_sample_rate: 8_000,
            audio_rate_step: 2_000,
            video_budget_ms: 100.0,
            audio_budget_ms: 50.0,
            translation_budget_ms: 150.0,
            adjust_trigger_ms: 200.0,
            scale_factor: 0.8,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub keepalive_secs: u64,
    pub max_retries: u32,
    pub queue_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            keepalive_secs: 30,
            max_retries: 3,
            queue_capacity: 5,
        }
    }
}

impl SessionConfig {
    pub fn keepalive(&self) -> Duration {
        Duration::from_secs(self.keepalive_secs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScorerBackend {
    Static,
    Remote,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScorerConfig {
    pub backend: ScorerBackend,
    pub base_url: String,
    pub timeout_ms: u64,
}

impl Default for ScorerConfig {
    fn default() -> Self {
        Self {
            backend: ScorerBackend::Static,
            base_url: "http://localhost:8090".to_string(),
            timeout_ms: 2_000,
        }
    }
}

impl ScorerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl PipelineConfig {
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let config: PipelineConfig = serde_json::from_str(raw)
            .map_err(|e| PipelineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a JSON config file, or the defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|e| {
                    PipelineError::Config(format!("cannot read {}: {}", path.display(), e))
                })?;
                Self::from_json_str(&raw)
            }
            None => {
                let config = Self::default();
                config.validate()?;
                Ok(config)
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        let fail = |msg: String| Err(PipelineError::Config(msg));

        for modality in Modality::ALL {
            let b = self.assembler.buffer(modality);
            if b.sequence_length == 0 || b.stride == 0 {
                return fail(format!("{}: sequence_length and stride must be >= 1", modality));
            }
            if b.sequence_length > b.capacity {
                return fail(format!(
                    "{}: sequence_length {} exceeds capacity {}",
                    modality, b.sequence_length, b.capacity
                ));
            }
            if !(b.target_fps > 0.0) {
                return fail(format!("{}: target_fps must be positive", modality));
            }
        }
        let (w, h) = self.assembler.video_input;
        if w == 0 || h == 0 || self.assembler.keypoint_dim == 0 {
            return fail("frame shapes must be non-empty".to_string());
        }

        if self.mode.window == 0 || self.mode.cooldown_secs < 0.0 {
            return fail("mode: window must be >= 1 and cooldown non-negative".to_string());
        }

        let f = &self.fusion;
        let weights = ChannelWeights {
            appearance: f.appearance_weight,
            pose: f.pose_weight,
        };
        if weights.normalized().is_none() {
            return fail("fusion: weights must be finite, non-negative with a positive sum".to_string());
        }
        if f.top_k == 0 || f.history == 0 {
            return fail("fusion: top_k and history must be >= 1".to_string());
        }

        let g = &self.governor;
        if !(g.target_fps > 0.0) || g.window == 0 {
            return fail("governor: target_fps and window must be positive".to_string());
        }
        if g.min_resolution.0 > g.max_resolution.0 || g.min_resolution.1 > g.max_resolution.1 {
            return fail("governor: min_resolution exceeds max_resolution".to_string());
        }
        if g.min_audio_sample_rate == 0 || g.min_audio_sample_rate > g.audio_sample_rate {
            return fail("governor: min_audio_sample_rate must be in 1..=audio_sample_rate".to_string());
        }
        if !(g.scale_factor > 0.0 && g.scale_factor < 1.0) {
            return fail("governor: scale_factor must be in (0, 1)".to_string());
        }

        if self.session.queue_capacity == 0 || self.session.max_retries == 0 {
            return fail("session: queue_capacity and max_retries must be >= 1".to_string());
        }
        Ok(())
    }
}
