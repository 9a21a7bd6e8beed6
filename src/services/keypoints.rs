use image::RgbImage;
use serde::{Deserialize, Serialize};

/// Normalized keypoints for one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keypoints {
    pub values: Vec<f32>,
    pub confidence: f32,
    pub hands_present: bool,
}

/// Landmark extraction from a decoded video frame.
pub trait KeypointExtractor: Send + Sync {
    fn extract(&self, frame: &RgbImage) -> Option<Keypoints>;
}

/// Extractor that never finds anything. Keypoints then only arrive inline
/// with the client's frame message.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullExtractor;

impl KeypointExtractor for NullExtractor {
    fn extract(&self, _frame: &RgbImage) -> Option<Keypoints> {
        None
    }
}
