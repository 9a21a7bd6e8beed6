//! Frame decoding and motion estimation for the appearance and pose streams.

pub mod frame;
pub mod motion;

pub use frame::{decode_base64, decode_image, to_model_input};
pub use motion::MotionTracker;
