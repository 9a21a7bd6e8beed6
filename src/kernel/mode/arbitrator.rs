use std::time::{Duration, Instant};

use super::types::{Mode, ModeInfo, SignalWindow};
use crate::config::ModeConfig;

/// Smoothed signal levels fed to the transition rule.
#[derive(Debug, Clone, Copy)]
pub struct Signals {
    pub avg_audio: f32,
    pub avg_motion: f32,
    pub has_hands: bool,
}

/// Pure transition rule: (current mode, smoothed signals) -> next mode.
///
/// Audio outranks motion. Leaving `Speech` requires audio to fall below half
/// the threshold, which keeps the mode from flapping when energy hovers near
/// the boundary.
pub fn next_mode(current: Mode, signals: Signals, audio_threshold: f32, motion_threshold: f32) -> Mode {
    let audio_active = signals.avg_audio > audio_threshold;
    let motion_active = signals.has_hands && signals.avg_motion > motion_threshold;

    match current {
        Mode::Auto => {
            if audio_active {
                Mode::Speech
            } else if motion_active {
                Mode::Sign
            } else {
                Mode::Auto
            }
        }
        Mode::Speech => {
            if signals.avg_audio < audio_threshold * 0.5 && motion_active {
                Mode::Sign
            } else {
                Mode::Speech
            }
        }
        Mode::Sign => {
            if audio_active {
                Mode::Speech
            } else {
                Mode::Sign
            }
        }
    }
}

/// Hysteretic speech/sign mode state machine. One per session.
///
/// No transition (automatic or otherwise observed) happens within `cooldown`
/// of the previous one; a manual `set_mode` always applies and restarts the
/// cooldown.
#[derive(Debug)]
pub struct ModeArbitrator {
    audio_threshold: f32,
    motion_threshold: f32,
    cooldown: Duration,
    mode: Mode,
    audio: SignalWindow,
    motion: SignalWindow,
    last_transition: Instant,
}

impl ModeArbitrator {
    pub fn new(config: &ModeConfig) -> Self {
        Self::starting_at(config, Instant::now())
    }

    /// Session start counts as the last transition.
    pub fn starting_at(config: &ModeConfig, start: Instant) -> Self {
        Self {
            audio_threshold: config.audio_threshold,
            motion_threshold: config.motion_threshold,
            cooldown: config.cooldown(),
            mode: Mode::Auto,
            audio: SignalWindow::new(config.window),
            motion: SignalWindow::new(config.window),
            last_transition: start,
        }
    }

    pub fn observe(&mut self, audio_level: f32, motion_level: f32, has_hands: bool) -> Mode {
        self.observe_at(Instant::now(), audio_level, motion_level, has_hands)
    }

    /// Records one sample of each signal and returns the mode in force.
    /// Samples are recorded even while the cooldown holds the mode.
    pub fn observe_at(&mut self, now: Instant, audio_level: f32, motion_level: f32, has_hands: bool) -> Mode {
        self.audio.push(audio_level);
        self.motion.push(motion_level);

        if now.saturating_duration_since(self.last_transition) < self.cooldown {
            return self.mode;
        }

        let signals = Signals {
            avg_audio: self.audio.average(),
            avg_motion: self.motion.average(),
            has_hands,
        };
        let next = next_mode(self.mode, signals, self.audio_threshold, self.motion_threshold);
        if next != self.mode {
            tracing::info!("Mode switch: {:?} -> {:?}", self.mode, next);
            self.mode = next;
            self.last_transition = now;
        }
        self.mode
    }

    pub fn set_mode(&mut self, mode: Mode) {
        self.set_mode_at(Instant::now(), mode);
    }

    /// Manual override: unconditional, clears both windows, restarts cooldown.
    pub fn set_mode_at(&mut self, now: Instant, mode: Mode) {
        self.mode = mode;
        self.last_transition = now;
        self.audio.clear();
        self.motion.clear();
    }

    pub fn reset(&mut self) {
        self.set_mode_at(Instant::now(), Mode::Auto);
    }

    pub fn current(&self) -> Mode {
        self.mode
    }

    pub fn last_transition(&self) -> Instant {
        self.last_transition
    }

    pub fn mode_info(&self) -> ModeInfo {
        self.mode_info_at(Instant::now())
    }

    pub fn mode_info_at(&self, now: Instant) -> ModeInfo {
        ModeInfo {
            current_mode: self.mode,
            audio_level: self.audio.last(),
            motion_level: self.motion.last(),
            avg_audio_level: self.audio.average(),
            avg_motion_level: self.motion.average(),
            time_in_mode: now.saturating_duration_since(self.last_transition).as_secs_f64(),
        }
    }
}
