//! Audio signal helpers: PCM decoding, energy level and rate conversion.

pub mod level;
pub mod resample;

pub use level::{decode_pcm16, rms_level};
