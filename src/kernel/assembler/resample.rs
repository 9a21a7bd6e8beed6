//! Index mapping used to normalize a frame window to a canonical rate and length.
//!
//! All functions return indices into the source window; frames themselves are
//! never interpolated, only duplicated or dropped.

use std::time::Instant;

/// Proportional map of `to` output slots onto `from` source frames.
///
/// Slot `i` takes source frame `round(i * (from - 1) / (to - 1))`, so
/// downsampling drops evenly spaced frames and upsampling duplicates them.
/// A single slot takes the newest frame.
pub fn select_indices(from: usize, to: usize) -> Vec<usize> {
    if from == 0 || to == 0 {
        return Vec::new();
    }
    if to == 1 {
        return vec![from - 1];
    }
    let span = (from - 1) as u64;
    let slots = (to - 1) as u64;
    (0..to as u64)
        // round-half-up in integer arithmetic
        .map(|i| ((2 * i * span + slots) / (2 * slots)) as usize)
        .collect()
}

/// Pads `from` frames out to `to` slots by repeating the first and last frame.
/// Leading padding gets the smaller half.
pub fn pad_edges(from: usize, to: usize) -> Vec<usize> {
    if from == 0 || to == 0 {
        return Vec::new();
    }
    if from >= to {
        return select_indices(from, to);
    }
    let missing = to - from;
    let lead = missing / 2;
    let trail = missing - lead;

    let mut out = Vec::with_capacity(to);
    out.extend(std::iter::repeat(0).take(lead));
    out.extend(0..from);
    out.extend(std::iter::repeat(from - 1).take(trail));
    out
}

/// Brings `from` frames to exactly `to`: evenly spaced selection when there
/// are too many, edge repetition when there are too few.
pub fn conform(from: usize, to: usize) -> Vec<usize> {
    if from > to {
        select_indices(from, to)
    } else {
        pad_edges(from, to)
    }
}

/// Number of frames the window would contain if it had been captured at
/// `target_fps`. Windows without a usable time span keep their frame count.
pub fn frames_at_rate(captured_at: &[Instant], target_fps: f64) -> usize {
    let n = captured_at.len();
    if n < 2 || !(target_fps > 0.0) {
        return n;
    }
    let span = captured_at[n - 1].saturating_duration_since(captured_at[0]);
    if span.is_zero() {
        return n;
    }
    ((span.as_secs_f64() * target_fps).round() as usize + 1).max(1)
}

/// Full window plan: rate normalization followed by length conformance.
///
/// Returns exactly `sequence_length` indices into `captured_at` whenever the
/// window is non-empty.
pub fn plan_window(captured_at: &[Instant], target_fps: f64, sequence_length: usize) -> Vec<usize> {
    let n = captured_at.len();
    if n == 0 || sequence_length == 0 {
        return Vec::new();
    }
    let at_rate = frames_at_rate(captured_at, target_fps);
    let rate_map = select_indices(n, at_rate);
    conform(rate_map.len(), sequence_length)
        .into_iter()
        .map(|slot| rate_map[slot])
        .collect()
}
