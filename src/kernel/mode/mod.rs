pub mod arbitrator;
pub mod types;

pub use arbitrator::ModeArbitrator;
pub use types::{Mode, ModeInfo};
