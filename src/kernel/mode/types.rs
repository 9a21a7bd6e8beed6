use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Which modality currently drives translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Mode {
    /// Channel A: speech is authoritative.
    #[serde(rename = "speech_to_sign")]
    Speech,
    /// Channel B: gesture is authoritative.
    #[serde(rename = "sign_to_speech")]
    Sign,
    /// No channel has claimed the session yet.
    #[default]
    #[serde(rename = "auto_detect")]
    Auto,
}

/// Fixed-size rolling window of signal samples. Oldest sample is evicted on overflow.
#[derive(Debug, Clone)]
pub struct SignalWindow {
    samples: VecDeque<f32>,
    capacity: usize,
}

impl SignalWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, sample: f32) {
        if self.samples.len() >= self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    /// Mean of the buffered samples; 0.0 when empty.
    pub fn average(&self) -> f32 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.samples.iter().sum::<f32>() / self.samples.len() as f32
    }

    pub fn last(&self) -> f32 {
        self.samples.back().copied().unwrap_or(0.0)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

/// Read-only view of the arbitrator for status reports.
#[derive(Debug, Clone, Serialize)]
pub struct ModeInfo {
    pub current_mode: Mode,
    pub audio_level: f32,
    pub motion_level: f32,
    pub avg_audio_level: f32,
    pub avg_motion_level: f32,
    pub time_in_mode: f64,
}
