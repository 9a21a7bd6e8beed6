use serde::{Deserialize, Serialize};

use crate::kernel::event::Modality;
use crate::kernel::time::{wall_clock, Timestamp};
use crate::services::vocabulary::VocabularyLookup;

/// Tolerance on a distribution's total probability mass.
pub const SCORE_EPSILON: f32 = 1e-3;

/// Scoring channel feeding the fusion engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    /// Appearance-based scorer over video sequences.
    Appearance,
    /// Pose-based scorer over keypoint sequences.
    Pose,
}

impl Channel {
    pub const ALL: [Channel; 2] = [Channel::Appearance, Channel::Pose];

    pub fn for_modality(modality: Modality) -> Self {
        match modality {
            Modality::Video => Channel::Appearance,
            Modality::Keypoints => Channel::Pose,
        }
    }

    pub fn modality(&self) -> Modality {
        match self {
            Channel::Appearance => Modality::Video,
            Channel::Pose => Modality::Keypoints,
        }
    }

    pub(crate) fn slot(&self) -> usize {
        match self {
            Channel::Appearance => 0,
            Channel::Pose => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DistributionError {
    #[error("score vector is empty")]
    Empty,
    #[error("score {index} is negative or not finite")]
    InvalidScore { index: usize },
    #[error("scores sum to zero")]
    ZeroMass,
}

/// A scorer's probability vector over the vocabulary.
///
/// Scores are non-negative and sum to 1 within [`SCORE_EPSILON`]; the top-1
/// index is always the arg-max. Both hold by construction.
#[derive(Debug, Clone, Serialize)]
pub struct Distribution {
    channel: Channel,
    generation: u64,
    scores: Vec<f32>,
    top_index: usize,
    top_label: String,
    produced_at: Timestamp,
    latency_ms: f64,
}

impl Distribution {
    /// Builds a distribution from raw scores, renormalizing when the mass is
    /// off by more than the tolerance.
    pub fn from_scores(
        channel: Channel,
        generation: u64,
        mut scores: Vec<f32>,
        vocabulary: &dyn VocabularyLookup,
        latency_ms: f64,
    ) -> Result<Self, DistributionError> {
        if scores.is_empty() {
            return Err(DistributionError::Empty);
        }
        if let Some(index) = scores.iter().position(|s| !s.is_finite() || *s < 0.0) {
            return Err(DistributionError::InvalidScore { index });
        }
        let total: f32 = scores.iter().sum();
        if total <= 0.0 {
            return Err(DistributionError::ZeroMass);
        }
        if (total - 1.0).abs() > SCORE_EPSILON {
            for s in scores.iter_mut() {
                *s /= total;
            }
        }

        let top_index = argmax(&scores);
        Ok(Self {
            channel,
            generation,
            top_label: vocabulary.id_to_label(top_index),
            scores,
            top_index,
            produced_at: wall_clock(),
            latency_ms,
        })
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn scores(&self) -> &[f32] {
        &self.scores
    }

    pub fn top_index(&self) -> usize {
        self.top_index
    }

    pub fn top_label(&self) -> &str {
        &self.top_label
    }

    pub fn confidence(&self) -> f32 {
        self.scores[self.top_index]
    }

    pub fn produced_at(&self) -> Timestamp {
        self.produced_at
    }

    pub fn latency_ms(&self) -> f64 {
        self.latency_ms
    }

    pub fn detection(&self) -> ChannelDetection {
        ChannelDetection {
            channel: self.channel,
            label: self.top_label.clone(),
            confidence: self.confidence(),
            generation: self.generation,
        }
    }
}

/// Index of the largest score; ties resolve to the lowest index.
pub fn argmax(scores: &[f32]) -> usize {
    let mut best = 0;
    for (i, s) in scores.iter().enumerate() {
        if *s > scores[best] {
            best = i;
        }
    }
    best
}

/// Indices of the `k` largest scores, descending; ties resolve to the lowest index.
pub fn top_k(scores: &[f32], k: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]).then(a.cmp(&b)));
    order.truncate(k.min(scores.len()));
    order
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FusionMethod {
    Weighted,
    SingleChannel,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelDetection {
    pub channel: Channel,
    pub label: String,
    pub confidence: f32,
    pub generation: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedLabel {
    pub index: usize,
    pub label: String,
    pub score: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct EnsembleResult {
    pub index: usize,
    pub label: String,
    pub text: String,
    pub confidence: f32,
    pub method: FusionMethod,
    pub channels_used: Vec<Channel>,
    pub per_channel: Vec<ChannelDetection>,
    /// True iff every contributing channel picked the same top-1.
    pub agreement: bool,
    /// Top-k ranking (k <= 5), best first; includes the top-1.
    pub top_k: Vec<RankedLabel>,
    pub latency_ms: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelWeights {
    pub appearance: f32,
    pub pose: f32,
}

impl ChannelWeights {
    /// Weights scaled to sum to 1, or `None` unless both are finite and
    /// non-negative with a finite positive total.
    pub fn normalized(self) -> Option<Self> {
        let total = self.appearance + self.pose;
        if !self.appearance.is_finite() || !self.pose.is_finite() || !total.is_finite() {
            return None;
        }
        if !(total > 0.0) || self.appearance < 0.0 || self.pose < 0.0 {
            return None;
        }
        Some(Self {
            appearance: self.appearance / total,
            pose: self.pose / total,
        })
    }

    pub fn get(&self, channel: Channel) -> f32 {
        match channel {
            Channel::Appearance => self.appearance,
            Channel::Pose => self.pose,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct FusionStats {
    /// Weighted (two-channel) fusions emitted.
    pub ensemble_predictions: u64,
    pub average_confidence: f64,
    pub agreement_rate: f64,
    pub appearance_only: u64,
    pub pose_only: u64,
    /// Results withheld by the confidence gate.
    pub gated: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct FusionReport {
    pub stats: FusionStats,
    pub current_weights: ChannelWeights,
    pub adaptive_weights: ChannelWeights,
    pub latest: Vec<ChannelDetection>,
}
