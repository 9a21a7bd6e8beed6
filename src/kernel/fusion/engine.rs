use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;
use tracing::{debug, info, warn};

use super::types::*;
use crate::config::FusionConfig;
use crate::error::{PipelineError, Result};
use crate::kernel::time::elapsed_ms;
use crate::services::vocabulary::VocabularyLookup;

/// Per-channel confidences of one completed weighted fusion.
#[derive(Debug, Clone, Copy)]
struct ConfidenceRecord {
    appearance: f32,
    pose: f32,
}

type InputKey = [Option<u64>; 2];

struct EngineState {
    weights: ChannelWeights,
    latest: [Option<Distribution>; 2],
    history: VecDeque<ConfidenceRecord>,
    stats: FusionStats,
    /// Generations behind the last fusion and what it produced.
    last: Option<(InputKey, Option<EnsembleResult>)>,
}

impl EngineState {
    fn key(&self) -> InputKey {
        [
            self.latest[0].as_ref().map(|d| d.generation()),
            self.latest[1].as_ref().map(|d| d.generation()),
        ]
    }
}

/// Dual-channel ensemble over the latest appearance and pose distributions.
///
/// Cached inputs, history and statistics live behind one lock, so `submit`
/// from scorer workers, `fuse` from the intake path and `report` from status
/// readers can interleave freely.
pub struct EnsembleEngine {
    state: Mutex<EngineState>,
    vocabulary: Arc<dyn VocabularyLookup>,
    top_k: usize,
    min_confidence: f32,
    history_len: usize,
    adaptive_min_history: usize,
}

impl EnsembleEngine {
    pub fn new(config: &FusionConfig, vocabulary: Arc<dyn VocabularyLookup>) -> Result<Self> {
        let weights = ChannelWeights {
            appearance: config.appearance_weight,
            pose: config.pose_weight,
        }
        .normalized()
        .ok_or_else(|| PipelineError::Config("fusion weights must have a positive sum".to_string()))?;

        info!("Ensemble engine initialized with weights: {:?}", weights);
        Ok(Self {
            state: Mutex::new(EngineState {
                weights,
                latest: [None, None],
                history: VecDeque::with_capacity(config.history),
                stats: FusionStats::default(),
                last: None,
            }),
            vocabulary,
            top_k: config.top_k.clamp(1, 5),
            min_confidence: config.min_confidence,
            history_len: config.history.max(1),
            adaptive_min_history: config.adaptive_min_history,
        })
    }

    fn lock(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn vocabulary(&self) -> &Arc<dyn VocabularyLookup> {
        &self.vocabulary
    }

    /// Caches a channel's newest distribution. Anything not newer than the
    /// cached generation is ignored; returns whether it was stored.
    pub fn submit(&self, distribution: Distribution) -> bool {
        let mut state = self.lock();
        let slot = distribution.channel().slot();
        if let Some(current) = &state.latest[slot] {
            if current.generation() >= distribution.generation() {
                debug!(
                    "Ignoring stale {:?} distribution {} (have {})",
                    distribution.channel(),
                    distribution.generation(),
                    current.generation()
                );
                return false;
            }
        }
        state.latest[slot] = Some(distribution);
        true
    }

    pub fn latest(&self, channel: Channel) -> Option<Distribution> {
        self.lock().latest[channel.slot()].clone()
    }

    /// Fuses whatever inputs are cached. `None` with no inputs or when the
    /// result falls under the confidence gate. When no channel has produced a
    /// new distribution since the previous call, that result is returned again
    /// without touching the statistics.
    pub fn fuse(&self) -> Option<EnsembleResult> {
        let mut state = self.lock();
        let key = state.key();
        if let Some((last_key, last_result)) = &state.last {
            if *last_key == key {
                return last_result.clone();
            }
        }

        let result = self.fuse_locked(&mut state);
        state.last = Some((key, result.clone()));
        result
    }

    fn fuse_locked(&self, state: &mut EngineState) -> Option<EnsembleResult> {
        let start = Instant::now();
        let inputs = (state.latest[0].clone(), state.latest[1].clone());

        match inputs {
            (None, None) => None,
            (Some(only), None) | (None, Some(only)) => self.single_channel(state, &only, start),
            (Some(appearance), Some(pose)) => {
                if appearance.scores().len() != pose.scores().len() {
                    warn!(
                        "Vocabulary size mismatch (appearance {}, pose {}), using the more confident channel",
                        appearance.scores().len(),
                        pose.scores().len()
                    );
                    let best = if pose.confidence() > appearance.confidence() { pose } else { appearance };
                    return self.single_channel(state, &best, start);
                }
                self.weighted(state, &appearance, &pose, start)
            }
        }
    }

    fn single_channel(&self, state: &mut EngineState, only: &Distribution, start: Instant) -> Option<EnsembleResult> {
        if only.confidence() < self.min_confidence {
            state.stats.gated += 1;
            return None;
        }
        match only.channel() {
            Channel::Appearance => state.stats.appearance_only += 1,
            Channel::Pose => state.stats.pose_only += 1,
        }

        let index = only.top_index();
        Some(EnsembleResult {
            index,
            label: only.top_label().to_string(),
            text: self.vocabulary.label_to_text(only.top_label()),
            confidence: only.confidence(),
            method: FusionMethod::SingleChannel,
            channels_used: vec![only.channel()],
            per_channel: vec![only.detection()],
            agreement: true,
            top_k: self.rank(only.scores()),
            latency_ms: elapsed_ms(start, Instant::now()),
        })
    }

    fn weighted(
        &self,
        state: &mut EngineState,
        appearance: &Distribution,
        pose: &Distribution,
        start: Instant,
    ) -> Option<EnsembleResult> {
        let w = state.weights;
        let total = w.appearance + w.pose;
        let fused: Vec<f32> = appearance
            .scores()
            .iter()
            .zip(pose.scores())
            .map(|(a, p)| (a * w.appearance + p * w.pose) / total)
            .collect();

        let index = argmax(&fused);
        let confidence = fused[index];
        let agreement = appearance.top_index() == pose.top_index();

        if state.history.len() >= self.history_len {
            state.history.pop_front();
        }
        state.history.push_back(ConfidenceRecord {
            appearance: appearance.confidence(),
            pose: pose.confidence(),
        });

        if confidence < self.min_confidence {
            state.stats.gated += 1;
            return None;
        }

        let stats = &mut state.stats;
        stats.ensemble_predictions += 1;
        let n = stats.ensemble_predictions as f64;
        stats.average_confidence += (confidence as f64 - stats.average_confidence) / n;
        let agreed = if agreement { 1.0 } else { 0.0 };
        stats.agreement_rate += (agreed - stats.agreement_rate) / n;

        let label = self.vocabulary.id_to_label(index);
        Some(EnsembleResult {
            index,
            text: self.vocabulary.label_to_text(&label),
            label,
            confidence,
            method: FusionMethod::Weighted,
            channels_used: vec![Channel::Appearance, Channel::Pose],
            per_channel: vec![appearance.detection(), pose.detection()],
            agreement,
            top_k: self.rank(&fused),
            latency_ms: elapsed_ms(start, Instant::now()),
        })
    }

    fn rank(&self, scores: &[f32]) -> Vec<RankedLabel> {
        top_k(scores, self.top_k)
            .into_iter()
            .map(|index| RankedLabel {
                index,
                label: self.vocabulary.id_to_label(index),
                score: scores[index],
            })
            .collect()
    }

    pub fn weights(&self) -> ChannelWeights {
        self.lock().weights
    }

    /// Replaces the channel weights (normalized to sum to 1).
    pub fn set_weights(&self, weights: ChannelWeights) -> Result<ChannelWeights> {
        let normalized = weights
            .normalized()
            .ok_or_else(|| PipelineError::InvalidRequest(format!("invalid fusion weights {:?}", weights)))?;
        let mut state = self.lock();
        state.weights = normalized;
        state.last = None;
        info!("Updated ensemble weights: {:?}", normalized);
        Ok(normalized)
    }

    /// Weights proportional to each channel's mean recent confidence.
    /// Advisory: nothing is applied until the caller passes the result to
    /// [`set_weights`](Self::set_weights).
    pub fn adaptive_weights(&self) -> ChannelWeights {
        let state = self.lock();
        self.adaptive_locked(&state)
    }

    fn adaptive_locked(&self, state: &EngineState) -> ChannelWeights {
        if state.history.len() < self.adaptive_min_history.max(1) {
            return state.weights;
        }
        let n = state.history.len() as f32;
        let raw = ChannelWeights {
            appearance: state.history.iter().map(|r| r.appearance).sum::<f32>() / n,
            pose: state.history.iter().map(|r| r.pose).sum::<f32>() / n,
        };
        raw.normalized().unwrap_or(state.weights)
    }

    pub fn stats(&self) -> FusionStats {
        self.lock().stats.clone()
    }

    pub fn report(&self) -> FusionReport {
        let state = self.lock();
        FusionReport {
            stats: state.stats.clone(),
            current_weights: state.weights,
            adaptive_weights: self.adaptive_locked(&state),
            latest: state.latest.iter().flatten().map(|d| d.detection()).collect(),
        }
    }

    /// Drops cached inputs and history. Statistics are kept.
    pub fn clear(&self) {
        let mut state = self.lock();
        state.latest = [None, None];
        state.history.clear();
        state.last = None;
        info!("Ensemble inputs cleared");
    }
}
