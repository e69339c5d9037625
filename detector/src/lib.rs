//! Frame-differencing motion detection.
//!
//! Pipeline per frame: grayscale → absolute difference against the previous
//! frame → threshold → 3×3 dilation → external contours → area filter →
//! bounding rectangles.

pub mod contour;
pub mod mask;
mod motion;
mod stage;

pub use motion::{DetectionError, MotionDetector};
pub use stage::DetectorStage;
