//! Video origins.
//!
//! The configured origin string is classified once into an [`OriginSpec`];
//! opening it yields a [`VideoOrigin`] that hands out frames in order until
//! the origin is exhausted.

use std::collections::VecDeque;
use std::path::Path;

use motion_pipeline_common::frame::Frame;

use crate::ffmpeg::{FfmpegInput, FfmpegOrigin};
use crate::mjpeg::MjpegOrigin;
use crate::synthetic::{SyntheticOrigin, SyntheticSpec};
use crate::SourceError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OriginSpec {
    /// `synthetic://WxH?frames=N`
    Synthetic(SyntheticSpec),
    /// `http(s)://` multipart MJPEG stream.
    Mjpeg(String),
    /// Capture device index, e.g. `0`.
    Device(u32),
    /// Local file or any other URL ffmpeg understands (`rtsp://`, ...).
    Media(String),
}

impl OriginSpec {
    pub fn parse(origin: &str) -> Result<Self, SourceError> {
        let origin = origin.trim();
        if origin.is_empty() {
            return Err(SourceError::Unavailable("empty video origin".into()));
        }
        if origin.starts_with(SyntheticSpec::SCHEME) {
            return SyntheticSpec::parse(origin).map(OriginSpec::Synthetic);
        }
        if origin.starts_with("http://") || origin.starts_with("https://") {
            return Ok(OriginSpec::Mjpeg(origin.to_string()));
        }
        if origin.bytes().all(|b| b.is_ascii_digit()) {
            let index = origin
                .parse()
                .map_err(|_| SourceError::Unavailable(format!("bad device index: {origin}")))?;
            return Ok(OriginSpec::Device(index));
        }
        Ok(OriginSpec::Media(origin.to_string()))
    }
}

/// An opened origin.
pub enum VideoOrigin {
    Synthetic(SyntheticOrigin),
    Mjpeg(Box<MjpegOrigin>),
    Ffmpeg(FfmpegOrigin),
    /// Pre-decoded frames, handed out in order.
    Memory(VecDeque<Frame>),
}

impl VideoOrigin {
    pub async fn open(spec: &OriginSpec) -> Result<Self, SourceError> {
        match spec {
            OriginSpec::Synthetic(s) => Ok(VideoOrigin::Synthetic(SyntheticOrigin::new(*s))),
            OriginSpec::Mjpeg(url) => Ok(VideoOrigin::Mjpeg(Box::new(
                MjpegOrigin::open(url).await?,
            ))),
            OriginSpec::Device(index) => {
                let input = FfmpegInput::device(*index).ok_or_else(|| {
                    SourceError::Unavailable(format!(
                        "device capture is not supported on this platform (index {index})"
                    ))
                })?;
                Ok(VideoOrigin::Ffmpeg(FfmpegOrigin::open(input).await?))
            }
            OriginSpec::Media(input) => {
                if !input.contains("://") && !Path::new(input).exists() {
                    return Err(SourceError::Unavailable(format!(
                        "video file not found: {input}"
                    )));
                }
                Ok(VideoOrigin::Ffmpeg(
                    FfmpegOrigin::open(FfmpegInput::media(input.clone())).await?,
                ))
            }
        }
    }

    pub fn from_frames(frames: impl IntoIterator<Item = Frame>) -> Self {
        VideoOrigin::Memory(frames.into_iter().collect())
    }

    /// Next frame, `Ok(None)` once the origin is exhausted.
    pub async fn read_frame(&mut self) -> Result<Option<Frame>, SourceError> {
        match self {
            VideoOrigin::Synthetic(origin) => Ok(origin.read_frame()),
            VideoOrigin::Mjpeg(origin) => origin.read_frame().await,
            VideoOrigin::Ffmpeg(origin) => origin.read_frame().await,
            VideoOrigin::Memory(frames) => Ok(frames.pop_front()),
        }
    }

    /// Release whatever the origin holds open.
    pub async fn release(&mut self) {
        match self {
            VideoOrigin::Ffmpeg(origin) => origin.release().await,
            VideoOrigin::Memory(frames) => frames.clear(),
            VideoOrigin::Synthetic(_) | VideoOrigin::Mjpeg(_) => {}
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            VideoOrigin::Synthetic(_) => "synthetic",
            VideoOrigin::Mjpeg(_) => "mjpeg",
            VideoOrigin::Ffmpeg(_) => "ffmpeg",
            VideoOrigin::Memory(_) => "memory",
        }
    }
}
