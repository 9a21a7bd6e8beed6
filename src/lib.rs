pub mod audio;
pub mod config;
pub mod error;
pub mod kernel;
pub mod services;
pub mod vision;

pub use config::PipelineConfig;
pub use error::{PipelineError, Result};
pub use kernel::reactor::Reactor;
pub use kernel::session::{Session, SessionEnd};
