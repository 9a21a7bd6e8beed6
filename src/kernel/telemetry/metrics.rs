use serde::Serialize;
use std::collections::VecDeque;

use super::event::{ErrorClass, QualityChange, ScorerFailure, TelemetryEvent};
use crate::kernel::event::Modality;

#[derive(Debug, Clone, Default, Serialize)]
pub struct TelemetrySnapshot {
    pub frame_stats: FrameStats,
    pub sequence_stats: SequenceStats,
    pub mode_stats: ModeStats,
    pub quality_stats: QualityStats,
    pub error_stats: ErrorStats,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct PerModality {
    pub video: u64,
    pub keypoints: u64,
}

impl PerModality {
    fn bump(&mut self, modality: Modality) {
        match modality {
            Modality::Video => self.video += 1,
            Modality::Keypoints => self.keypoints += 1,
        }
    }

    pub fn get(&self, modality: Modality) -> u64 {
        match modality {
            Modality::Video => self.video,
            Modality::Keypoints => self.keypoints,
        }
    }

    pub fn total(&self) -> u64 {
        self.video + self.keypoints
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct FrameStats {
    pub rejected: PerModality,
    pub dropped: PerModality,
    pub skipped: u64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SequenceStats {
    pub emitted: PerModality,
    pub shed: PerModality,
    pub scored: PerModality,
    pub failed: u64,
    pub timed_out: u64,
    pub invalid_output: u64,
    pub total_inference_ms: u64,
    pub avg_inference_ms: f64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ModeStats {
    pub transitions: u64,
    pub manual_overrides: u64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct QualityStats {
    pub resolution_reductions: u64,
    pub audio_rate_reductions: u64,
    pub resets: u64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ErrorStats {
    pub malformed: u64,
    pub processing: u64,
    pub fatal: u64,
}

pub fn compute_snapshot(events: &VecDeque<TelemetryEvent>) -> TelemetrySnapshot {
    let mut snap = TelemetrySnapshot::default();

    for event in events {
        match event {
            TelemetryEvent::FrameRejected { modality } => snap.frame_stats.rejected.bump(*modality),
            TelemetryEvent::FrameDropped { modality } => snap.frame_stats.dropped.bump(*modality),
            TelemetryEvent::FrameSkipped => snap.frame_stats.skipped += 1,
            TelemetryEvent::SequenceEmitted { modality, .. } => {
                snap.sequence_stats.emitted.bump(*modality)
            }
            TelemetryEvent::SequenceShed { modality, .. } => snap.sequence_stats.shed.bump(*modality),
            TelemetryEvent::ScorerCompleted { modality, latency_ms, .. } => {
                snap.sequence_stats.scored.bump(*modality);
                snap.sequence_stats.total_inference_ms += latency_ms;
            }
            TelemetryEvent::ScorerFailed { reason, .. } => match reason {
                ScorerFailure::Error => snap.sequence_stats.failed += 1,
                ScorerFailure::Timeout => snap.sequence_stats.timed_out += 1,
                ScorerFailure::InvalidOutput => snap.sequence_stats.invalid_output += 1,
            },
            TelemetryEvent::ModeTransition { manual, .. } => {
                if *manual {
                    snap.mode_stats.manual_overrides += 1;
                } else {
                    snap.mode_stats.transitions += 1;
                }
            }
            TelemetryEvent::QualityAdjusted(change) => match change {
                QualityChange::ResolutionReduced => snap.quality_stats.resolution_reductions += 1,
                QualityChange::AudioRateReduced => snap.quality_stats.audio_rate_reductions += 1,
                QualityChange::Reset => snap.quality_stats.resets += 1,
            },
            TelemetryEvent::SessionError(class) => match class {
                ErrorClass::Malformed => snap.error_stats.malformed += 1,
                ErrorClass::Processing => snap.error_stats.processing += 1,
                ErrorClass::Fatal => snap.error_stats.fatal += 1,
            },
        }
    }

    let scored = snap.sequence_stats.scored.total();
    if scored > 0 {
        snap.sequence_stats.avg_inference_ms =
            snap.sequence_stats.total_inference_ms as f64 / scored as f64;
    }

    snap
}
