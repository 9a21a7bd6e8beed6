use chrono::{DateTime, Utc};
use std::time::{Duration, Instant};

/// Wall-clock timestamp carried on wire messages and distributions.
pub type Timestamp = DateTime<Utc>;

pub fn wall_clock() -> Timestamp {
    Utc::now()
}

pub fn as_millis_f64(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Milliseconds from `start` to `now`. Saturates to zero if `now` precedes `start`.
pub fn elapsed_ms(start: Instant, now: Instant) -> f64 {
    as_millis_f64(now.saturating_duration_since(start))
}
