use chrono::Utc;
use image::{Rgb, RgbImage};
use motion_pipeline_common::frame::Frame;

use crate::SourceError;

const BACKGROUND: Rgb<u8> = Rgb([60, 60, 60]);
const SQUARE: Rgb<u8> = Rgb([230, 230, 230]);
const SQUARE_SIDE: u32 = 48;
const STEP: u32 = 6;

/// Parsed form of `synthetic://WIDTHxHEIGHT?frames=N`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyntheticSpec {
    pub width: u32,
    pub height: u32,
    /// `None` produces frames until the pipeline is stopped.
    pub frames: Option<u64>,
}

impl SyntheticSpec {
    pub const SCHEME: &'static str = "synthetic://";

    pub fn parse(origin: &str) -> Result<Self, SourceError> {
        let rest = origin
            .strip_prefix(Self::SCHEME)
            .ok_or_else(|| SourceError::Unavailable(format!("not a synthetic origin: {origin}")))?;
        let (dims, query) = match rest.split_once('?') {
            Some((dims, query)) => (dims, Some(query)),
            None => (rest, None),
        };

        let bad = || SourceError::Unavailable(format!("malformed synthetic origin: {origin}"));
        let (w, h) = dims.split_once('x').ok_or_else(bad)?;
        let width: u32 = w.parse().map_err(|_| bad())?;
        let height: u32 = h.parse().map_err(|_| bad())?;
        if width == 0 || height == 0 {
            return Err(bad());
        }

        let mut frames = None;
        for pair in query.into_iter().flat_map(|q| q.split('&')) {
            match pair.split_once('=') {
                Some(("frames", n)) => frames = Some(n.parse().map_err(|_| bad())?),
                _ => return Err(bad()),
            }
        }

        Ok(Self {
            width,
            height,
            frames,
        })
    }
}

/// Generated scene: a flat gray background with a bright square sliding
/// left to right and wrapping around. Useful for demos and smoke runs.
pub struct SyntheticOrigin {
    spec: SyntheticSpec,
    next_seq: u64,
}

impl SyntheticOrigin {
    pub fn new(spec: SyntheticSpec) -> Self {
        Self { spec, next_seq: 0 }
    }

    pub fn read_frame(&mut self) -> Option<Frame> {
        if self.spec.frames.is_some_and(|n| self.next_seq >= n) {
            return None;
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        Some(Frame::new(
            self.render(seq),
            seq,
            Utc::now().timestamp_millis(),
        ))
    }

    fn render(&self, seq: u64) -> RgbImage {
        let SyntheticSpec { width, height, .. } = self.spec;
        let mut img = RgbImage::from_pixel(width, height, BACKGROUND);
        let side = SQUARE_SIDE.min(width).min(height);
        let travel = (width - side + 1) as u64;
        let x0 = ((seq * STEP as u64) % travel) as u32;
        let y0 = (height - side) / 2;
        for y in y0..y0 + side {
            for x in x0..x0 + side {
                img.put_pixel(x, y, SQUARE);
            }
        }
        img
    }
}
