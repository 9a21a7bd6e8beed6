use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use crate::error::{PipelineError, Result};

/// Input stream a frame belongs to. Each modality has its own ring buffer,
/// work queue and scorer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modality {
    /// Appearance stream: RGB frames at model input resolution.
    Video,
    /// Pose stream: flattened, normalized hand/body keypoints.
    Keypoints,
}

impl Modality {
    pub const ALL: [Modality; 2] = [Modality::Video, Modality::Keypoints];

    pub fn as_str(&self) -> &'static str {
        match self {
            Modality::Video => "video",
            Modality::Keypoints => "keypoints",
        }
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameShape {
    Image { width: u32, height: u32 },
    Keypoints { dim: usize },
}

#[derive(Debug, Clone)]
pub enum FramePayload {
    Image(RgbImage),
    Keypoints(Vec<f32>),
}

impl FramePayload {
    pub fn modality(&self) -> Modality {
        match self {
            FramePayload::Image(_) => Modality::Video,
            FramePayload::Keypoints(_) => Modality::Keypoints,
        }
    }

    /// Checks the payload against the expected input shape.
    pub fn validate(&self, expected: FrameShape) -> Result<()> {
        let modality = self.modality();
        let malformed = |reason: String| PipelineError::MalformedFrame { modality, reason };

        match (self, expected) {
            (FramePayload::Image(img), FrameShape::Image { width, height }) => {
                if img.width() != width || img.height() != height {
                    return Err(malformed(format!(
                        "expected {}x{}, got {}x{}",
                        width,
                        height,
                        img.width(),
                        img.height()
                    )));
                }
                Ok(())
            }
            (FramePayload::Keypoints(values), FrameShape::Keypoints { dim }) => validate_keypoints(values, dim),
            _ => Err(malformed("payload does not match modality".to_string())),
        }
    }
}

/// Checks a flattened keypoint vector: exactly `dim` finite values.
pub fn validate_keypoints(values: &[f32], dim: usize) -> Result<()> {
    let malformed = |reason: String| PipelineError::MalformedFrame {
        modality: Modality::Keypoints,
        reason,
    };
    if values.len() != dim {
        return Err(malformed(format!("expected {} values, got {}", dim, values.len())));
    }
    if values.iter().any(|v| !v.is_finite()) {
        return Err(malformed("non-finite keypoint value".to_string()));
    }
    Ok(())
}

/// One captured sample. Immutable once built; shared by reference between the
/// ring buffer and any sequence that includes it.
#[derive(Debug, Clone)]
pub struct Frame {
    pub index: u64,
    pub captured_at: Instant,
    pub payload: FramePayload,
}

impl Frame {
    pub fn new(index: u64, captured_at: Instant, payload: FramePayload) -> Self {
        Self { index, captured_at, payload }
    }

    pub fn modality(&self) -> Modality {
        self.payload.modality()
    }
}

/// Fixed-length, rate-normalized window of frames handed to a scorer.
#[derive(Debug, Clone)]
pub struct Sequence {
    pub modality: Modality,
    pub generation: u64,
    pub created_at: Instant,
    frames: Vec<Arc<Frame>>,
}

impl Sequence {
    pub fn new(
        modality: Modality,
        generation: u64,
        frames: Vec<Arc<Frame>>,
        expected_len: usize,
    ) -> Result<Self> {
        if frames.len() != expected_len || expected_len == 0 {
            return Err(PipelineError::InvalidSequence {
                expected: expected_len,
                actual: frames.len(),
            });
        }
        Ok(Self {
            modality,
            generation,
            created_at: Instant::now(),
            frames,
        })
    }

    pub fn frames(&self) -> &[Arc<Frame>] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Source frame indices in sequence order (duplicates appear when the
    /// window was upsampled).
    pub fn frame_indices(&self) -> Vec<u64> {
        self.frames.iter().map(|f| f.index).collect()
    }
}
