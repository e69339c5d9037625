//! Presentation stage: blurs motion regions, stamps the time and hands the
//! result to a render sink.

pub mod blur;
mod compositor;
pub mod kernel;
pub mod overlay;
pub mod sink;
mod stage;

pub use compositor::Compositor;
pub use kernel::GaussianKernel;
pub use sink::{HeadlessSink, HttpViewerSink, JpegDirSink, RenderSink};
pub use stage::PresenterStage;

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("no glyph for character {0:?}")]
    UnsupportedGlyph(char),
    #[error("invalid timestamp format {0:?}")]
    TimestampFormat(String),
    #[error("failed to encode frame: {0}")]
    Encode(String),
    #[error("failed to write frame {path}: {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },
    #[error("render sink unavailable: {0}")]
    Unavailable(String),
}
