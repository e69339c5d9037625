use image::{GrayImage, RgbImage};

/// Single-channel intensity image. Only the detector keeps one around.
pub type GrayFrame = GrayImage;

/// A decoded video frame: packed RGB, 8 bits per channel.
///
/// Frames are moved through the pipeline channels; a stage that sends a frame
/// no longer holds it.
#[derive(Debug, Clone)]
pub struct Frame {
    pub image: RgbImage,
    /// Position of the frame in its origin, starting at 0.
    pub seq: u64,
    pub captured_at_ms: i64,
}

impl Frame {
    pub fn new(image: RgbImage, seq: u64, captured_at_ms: i64) -> Self {
        Self {
            image,
            seq,
            captured_at_ms,
        }
    }

    /// Wrap a raw `rgb24` buffer. The buffer must hold exactly
    /// `width * height * 3` bytes.
    pub fn from_rgb_bytes(
        width: u32,
        height: u32,
        data: Vec<u8>,
        seq: u64,
        captured_at_ms: i64,
    ) -> Result<Self, FrameError> {
        let expected = width as usize * height as usize * 3;
        if data.len() != expected {
            return Err(FrameError::BufferSize {
                got: data.len(),
                expected,
            });
        }
        let image = RgbImage::from_raw(width, height, data).ok_or(FrameError::BufferSize {
            got: 0,
            expected,
        })?;
        Ok(Self::new(image, seq, captured_at_ms))
    }

    /// A frame filled with one color.
    pub fn filled(width: u32, height: u32, rgb: [u8; 3], seq: u64) -> Self {
        let image = RgbImage::from_pixel(width, height, image::Rgb(rgb));
        Self::new(image, seq, chrono::Utc::now().timestamp_millis())
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn is_empty(&self) -> bool {
        self.image.width() == 0 || self.image.height() == 0
    }
}

/// Axis-aligned rectangle in frame pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MotionRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl MotionRegion {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Intersect with a `frame_width x frame_height` frame.
    /// Returns `None` when nothing of the region is left.
    pub fn clip(&self, frame_width: u32, frame_height: u32) -> Option<MotionRegion> {
        if self.x >= frame_width || self.y >= frame_height {
            return None;
        }
        let right = self.x.saturating_add(self.width).min(frame_width);
        let bottom = self.y.saturating_add(self.height).min(frame_height);
        let clipped = MotionRegion::new(self.x, self.y, right - self.x, bottom - self.y);
        (clipped.area() > 0).then_some(clipped)
    }

    /// True when `other` lies entirely inside this region.
    pub fn contains(&self, other: &MotionRegion) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.x as u64 + other.width as u64 <= self.x as u64 + self.width as u64
            && other.y as u64 + other.height as u64 <= self.y as u64 + self.height as u64
    }
}

/// A frame together with the motion regions found in it.
#[derive(Debug, Clone)]
pub struct Detection {
    pub frame: Frame,
    pub regions: Vec<MotionRegion>,
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("frame buffer has {got} bytes, expected {expected}")]
    BufferSize { got: usize, expected: usize },
}
