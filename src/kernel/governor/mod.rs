//! Adaptive performance governor.
//!
//! One instance per process, shared by every session. It decides whether an
//! incoming frame is processed at all, keeps rolling latency histories and
//! degrades video resolution and audio rate when the budget is exceeded.
//! Degradation is monotonic until `reset_quality()`.

pub mod window;

use image::imageops::{self, FilterType};
use image::RgbImage;
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;
use tracing::{debug, info};

use crate::audio::resample::resample_mono;
use crate::config::GovernorConfig;
use crate::error::Result;
use crate::kernel::telemetry::event::QualityChange;
use crate::kernel::time::elapsed_ms;

pub use window::{MetricStats, RollingWindow};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    VideoProcessing,
    AudioProcessing,
    Inference,
    Translation,
}

impl Metric {
    pub const ALL: [Metric; 4] = [
        Metric::VideoProcessing,
        Metric::AudioProcessing,
        Metric::Inference,
        Metric::Translation,
    ];

    fn slot(&self) -> usize {
        match self {
            Metric::VideoProcessing => 0,
            Metric::AudioProcessing => 1,
            Metric::Inference => 2,
            Metric::Translation => 3,
        }
    }
}

/// Quality currently in force.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QualitySettings {
    pub max_resolution: (u32, u32),
    pub audio_sample_rate: u32,
    pub frame_skipping: bool,
    pub target_fps: f64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MetricReport {
    pub video_processing: MetricStats,
    pub audio_processing: MetricStats,
    pub inference: MetricStats,
    pub translation: MetricStats,
}

#[derive(Debug, Clone, Serialize)]
pub struct GovernorReport {
    pub settings: QualitySettings,
    pub metrics: MetricReport,
    /// Accepted frames per second over the recent interval window; 0 until
    /// two frames have been accepted.
    pub current_fps: f64,
    pub frames_accepted: u64,
    pub frames_skipped: u64,
    pub recommendations: Vec<String>,
}

pub type SharedGovernor = Arc<Mutex<PerformanceGovernor>>;

pub fn shared(config: &GovernorConfig) -> SharedGovernor {
    Arc::new(Mutex::new(PerformanceGovernor::new(config)))
}

/// Locks a shared governor, recovering from poisoning.
pub fn lock(governor: &SharedGovernor) -> MutexGuard<'_, PerformanceGovernor> {
    governor.lock().unwrap_or_else(|e| e.into_inner())
}

pub struct PerformanceGovernor {
    config: GovernorConfig,
    initial: QualitySettings,
    settings: QualitySettings,
    metrics: [RollingWindow; 4],
    frame_intervals: RollingWindow,
    last_frame: Option<Instant>,
    frames_accepted: u64,
    frames_skipped: u64,
}

impl PerformanceGovernor {
    pub fn new(config: &GovernorConfig) -> Self {
        let initial = QualitySettings {
            max_resolution: config.max_resolution,
            audio_sample_rate: config.audio_sample_rate,
            frame_skipping: config.enable_frame_skipping,
            target_fps: config.target_fps,
        };
        Self {
            config: config.clone(),
            initial,
            settings: initial,
            metrics: std::array::from_fn(|_| RollingWindow::new(config.window)),
            frame_intervals: RollingWindow::new(config.window),
            last_frame: None,
            frames_accepted: 0,
            frames_skipped: 0,
        }
    }

    pub fn should_skip_frame(&mut self) -> bool {
        self.should_skip_frame_at(Instant::now())
    }

    /// Skips when the rate implied by the time since the last accepted frame
    /// exceeds the target. A skipped frame does not move the last-frame time.
    pub fn should_skip_frame_at(&mut self, now: Instant) -> bool {
        if !self.settings.frame_skipping {
            return false;
        }
        if let Some(last) = self.last_frame {
            let elapsed = now.saturating_duration_since(last).as_secs_f64();
            if elapsed * self.settings.target_fps < 1.0 {
                self.frames_skipped += 1;
                return true;
            }
            self.frame_intervals.push(elapsed);
        }
        self.last_frame = Some(now);
        self.frames_accepted += 1;
        false
    }

    /// Records the time elapsed since `start` under `metric` and returns it in ms.
    pub fn measure_latency(&mut self, start: Instant, metric: Metric) -> f64 {
        let ms = elapsed_ms(start, Instant::now());
        self.record_latency(metric, ms);
        ms
    }

    pub fn record_latency(&mut self, metric: Metric, ms: f64) {
        self.metrics[metric.slot()].push(ms.max(0.0));
    }

    pub fn metric_stats(&self, metric: Metric) -> MetricStats {
        self.metrics[metric.slot()].stats()
    }

    /// Steps quality down where a processing mean is over budget. Returns the
    /// changes actually made; nothing changes once a floor is reached.
    pub fn auto_adjust_quality(&mut self) -> Vec<QualityChange> {
        let mut changes = Vec::new();

        if self.metrics[Metric::VideoProcessing.slot()].mean() > self.config.video_budget_ms {
            let (w, h) = self.settings.max_resolution;
            let (min_w, min_h) = self.config.min_resolution;
            let scaled = (
                ((w as f64 * self.config.scale_factor) as u32).max(min_w),
                ((h as f64 * self.config.scale_factor) as u32).max(min_h),
            );
            if scaled != self.settings.max_resolution {
                self.settings.max_resolution = scaled;
                info!("Reduced video resolution to {}x{}", scaled.0, scaled.1);
                changes.push(QualityChange::ResolutionReduced);
            }
        }

        if self.metrics[Metric::AudioProcessing.slot()].mean() > self.config.audio_budget_ms {
            let rate = self
                .settings
                .audio_sample_rate
                .saturating_sub(self.config.audio_rate_step)
                .max(self.config.min_audio_sample_rate);
            if rate != self.settings.audio_sample_rate {
                self.settings.audio_sample_rate = rate;
                info!("Reduced audio sample rate to {} Hz", rate);
                changes.push(QualityChange::AudioRateReduced);
            }
        }

        changes
    }

    /// Restores the configured quality. Latency histories are kept.
    pub fn reset_quality(&mut self) {
        self.settings = self.initial;
        info!("Quality settings reset to {:?}", self.settings);
    }

    /// Downscales an image to fit the resolution cap, aspect preserved.
    /// Returns the image and whether it was resized.
    pub fn optimize_video_frame(&mut self, image: RgbImage) -> (RgbImage, bool) {
        let start = Instant::now();
        let (max_w, max_h) = self.settings.max_resolution;
        let (w, h) = image.dimensions();

        let result = if w > max_w || h > max_h {
            let scale = (max_w as f64 / w as f64).min(max_h as f64 / h as f64);
            let nw = ((w as f64 * scale) as u32).max(1);
            let nh = ((h as f64 * scale) as u32).max(1);
            debug!("Downscaling frame {}x{} -> {}x{}", w, h, nw, nh);
            (imageops::resize(&image, nw, nh, FilterType::Triangle), true)
        } else {
            (image, false)
        };

        self.measure_latency(start, Metric::VideoProcessing);
        result
    }

    /// Resamples mono PCM down to the current audio rate target. Input at or
    /// below the target passes through. Returns samples, their rate, and
    /// whether resampling happened.
    pub fn optimize_audio_chunk(&mut self, samples: Vec<f32>, rate: u32) -> Result<(Vec<f32>, u32, bool)> {
        let start = Instant::now();
        let target = self.settings.audio_sample_rate;

        let result = if rate > target && !samples.is_empty() {
            (resample_mono(&samples, rate, target)?, target, true)
        } else {
            (samples, rate, false)
        };

        self.measure_latency(start, Metric::AudioProcessing);
        Ok(result)
    }

    pub fn settings(&self) -> QualitySettings {
        self.settings
    }

    pub fn current_fps(&self) -> f64 {
        let mean = self.frame_intervals.mean();
        if mean > 0.0 {
            1.0 / mean
        } else {
            0.0
        }
    }

    pub fn recommendations(&self) -> Vec<String> {
        let mut out = Vec::new();
        let mean = |m: Metric| self.metrics[m.slot()].mean();

        if mean(Metric::VideoProcessing) > self.config.video_budget_ms {
            out.push("Consider reducing video resolution or frame rate".to_string());
        }
        if mean(Metric::AudioProcessing) > self.config.audio_budget_ms {
            out.push("Consider reducing audio sample rate or buffer size".to_string());
        }
        if mean(Metric::Translation) > self.config.translation_budget_ms {
            out.push("Consider using cached translations or simplified models".to_string());
        }
        if !self.frame_intervals.is_empty() {
            let fps = self.current_fps();
            if fps < 10.0 {
                out.push("Frame rate is low, check CPU/GPU usage".to_string());
            } else if fps > 30.0 {
                out.push("Frame rate is high, consider enabling frame skipping".to_string());
            }
        }
        out
    }

    pub fn report(&self) -> GovernorReport {
        GovernorReport {
            settings: self.settings,
            metrics: MetricReport {
                video_processing: self.metric_stats(Metric::VideoProcessing),
                audio_processing: self.metric_stats(Metric::AudioProcessing),
                inference: self.metric_stats(Metric::Inference),
                translation: self.metric_stats(Metric::Translation),
            },
            current_fps: self.current_fps(),
            frames_accepted: self.frames_accepted,
            frames_skipped: self.frames_skipped,
            recommendations: self.recommendations(),
        }
    }
}
