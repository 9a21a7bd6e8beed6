//! Dual-channel fusion of appearance and pose recognitions.

pub mod engine;
pub mod types;

pub use engine::EnsembleEngine;
pub use types::{Channel, ChannelWeights, Distribution, EnsembleResult, FusionMethod};
