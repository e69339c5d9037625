//! Frame source stage: reads frames from a video origin and feeds the
//! detector link, finishing with exactly one end-of-stream marker.

mod ffmpeg;
mod mjpeg;
pub mod origin;
mod source;
mod synthetic;

pub use ffmpeg::check_ffmpeg_available;
pub use origin::{OriginSpec, VideoOrigin};
pub use source::FrameSource;
pub use synthetic::SyntheticSpec;

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The origin could not be opened (or vanished before the first frame).
    #[error("video origin unavailable: {0}")]
    Unavailable(String),
    /// A single frame could not be read or decoded.
    #[error("failed to decode frame: {0}")]
    Decode(String),
}
