//! Pipeline telemetry.
//!
//! # SAFETY INVARIANT
//! Telemetry is a READ-ONLY side-effect layer.
//! It must **NEVER** be read inside decision logic (Assembler, Arbitrator, Fusion or Governor).
//! It exists solely for observability and the status report.
//!
//! # PRIVACY INVARIANT
//! Telemetry events must **NEVER** contain user content (frames, audio, labels, text).
//! Only modalities, generation ids, counts and durations are allowed.

pub mod event;
pub mod metrics;
pub mod recorder;

use std::sync::{Arc, Mutex};

use event::TelemetryEvent;
use recorder::TelemetryRecorder;

pub type SharedTelemetry = Arc<Mutex<TelemetryRecorder>>;

pub fn shared() -> SharedTelemetry {
    Arc::new(Mutex::new(TelemetryRecorder::new()))
}

/// Records an event on a shared recorder. A poisoned lock is recovered rather
/// than propagated; telemetry never fails the caller.
pub fn record(telemetry: &SharedTelemetry, event: TelemetryEvent) {
    let mut recorder = telemetry.lock().unwrap_or_else(|e| e.into_inner());
    recorder.record(event);
}
