//! Where composited frames end up.

mod http;
mod jpeg_dir;

use image::codecs::jpeg::JpegEncoder;
use motion_pipeline_common::frame::Frame;
use tracing::debug;

pub use http::HttpViewerSink;
pub use jpeg_dir::JpegDirSink;

use crate::RenderError;

pub const JPEG_QUALITY: u8 = 85;

/// Display surface for the presenter.
///
/// Sinks are driven from the presenter's blocking worker thread, one frame at
/// a time.
pub trait RenderSink: Send {
    /// Show one composited frame.
    fn present(&mut self, frame: &Frame) -> Result<(), RenderError>;

    /// Polled after every frame; `true` ends the presentation loop.
    fn stop_requested(&mut self) -> bool {
        false
    }

    /// Tear down whatever the sink holds open. Called exactly once, after the
    /// last frame.
    fn release(&mut self) {}

    /// Human-readable name for logging.
    fn name(&self) -> &str {
        "unnamed"
    }
}

/// Counts frames and throws them away.
#[derive(Debug, Default)]
pub struct HeadlessSink {
    presented: u64,
}

impl HeadlessSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn presented(&self) -> u64 {
        self.presented
    }
}

impl RenderSink for HeadlessSink {
    fn present(&mut self, frame: &Frame) -> Result<(), RenderError> {
        self.presented += 1;
        debug!(seq = frame.seq, "frame presented");
        Ok(())
    }

    fn name(&self) -> &str {
        "headless"
    }
}

/// Encode `frame` as a baseline JPEG.
pub fn encode_jpeg(frame: &Frame, quality: u8) -> Result<Vec<u8>, RenderError> {
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality)
        .encode_image(&frame.image)
        .map_err(|e| RenderError::Encode(e.to_string()))?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headless_counts_frames() {
        let mut sink = HeadlessSink::new();
        for seq in 0..3 {
            sink.present(&Frame::filled(4, 4, [1, 2, 3], seq)).unwrap();
        }
        assert_eq!(sink.presented(), 3);
        assert!(!sink.stop_requested());
        sink.release();
        assert_eq!(sink.name(), "headless");
    }

    #[test]
    fn encoded_frame_is_a_jpeg() {
        let jpeg = encode_jpeg(&Frame::filled(16, 8, [200, 10, 10], 0), JPEG_QUALITY).unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
        assert_eq!(&jpeg[jpeg.len() - 2..], &[0xFF, 0xD9]);
        let decoded = image::load_from_memory(&jpeg).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (16, 8));
    }
}
