//! Timestamp overlay drawn with a built-in 5x7 bitmap font.

use std::fmt::Write as _;

use chrono::{DateTime, TimeZone};
use image::{Rgb, RgbImage};

use crate::RenderError;

pub const TEXT_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
pub const TEXT_ORIGIN: (u32, u32) = (10, 10);
pub const TEXT_SCALE: u32 = 3;

const GLYPH_WIDTH: u32 = 5;
const GLYPH_HEIGHT: u32 = 7;

/// Rows top to bottom; bit 4 is the leftmost column.
fn glyph(c: char) -> Option<[u8; 7]> {
    Some(match c {
        '0' => [0x0E, 0x11, 0x13, 0x15, 0x19, 0x11, 0x0E],
        '1' => [0x04, 0x0C, 0x04, 0x04, 0x04, 0x04, 0x0E],
        '2' => [0x0E, 0x11, 0x01, 0x02, 0x04, 0x08, 0x1F],
        '3' => [0x1F, 0x02, 0x04, 0x02, 0x01, 0x11, 0x0E],
        '4' => [0x02, 0x06, 0x0A, 0x12, 0x1F, 0x02, 0x02],
        '5' => [0x1F, 0x10, 0x1E, 0x01, 0x01, 0x11, 0x0E],
        '6' => [0x06, 0x08, 0x10, 0x1E, 0x11, 0x11, 0x0E],
        '7' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x08, 0x08],
        '8' => [0x0E, 0x11, 0x11, 0x0E, 0x11, 0x11, 0x0E],
        '9' => [0x0E, 0x11, 0x11, 0x0F, 0x01, 0x02, 0x0C],
        '-' => [0x00, 0x00, 0x00, 0x1F, 0x00, 0x00, 0x00],
        ':' => [0x00, 0x0C, 0x0C, 0x00, 0x0C, 0x0C, 0x00],
        '.' => [0x00, 0x00, 0x00, 0x00, 0x00, 0x0C, 0x0C],
        '/' => [0x00, 0x01, 0x02, 0x04, 0x08, 0x10, 0x00],
        ' ' => [0x00; 7],
        _ => return None,
    })
}

/// Render `time` with a chrono format string.
pub fn format_timestamp<Tz>(time: &DateTime<Tz>, format: &str) -> Result<String, RenderError>
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let mut text = String::new();
    write!(text, "{}", time.format(format))
        .map_err(|_| RenderError::TimestampFormat(format.to_string()))?;
    Ok(text)
}

/// Stamp `time` onto `image` in green at [`TEXT_ORIGIN`].
pub fn draw_timestamp<Tz>(
    image: &mut RgbImage,
    time: &DateTime<Tz>,
    format: &str,
) -> Result<(), RenderError>
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let text = format_timestamp(time, format)?;
    draw_text(image, &text, TEXT_ORIGIN, TEXT_SCALE, TEXT_COLOR)
}

/// Pixel size of `text` at `scale`, one blank column between glyphs.
pub fn text_size(text: &str, scale: u32) -> (u32, u32) {
    let n = text.chars().count() as u32;
    if n == 0 {
        return (0, 0);
    }
    ((n * (GLYPH_WIDTH + 1) - 1) * scale, GLYPH_HEIGHT * scale)
}

/// Draw `text` with its top-left corner at `origin`, clipped to the image.
///
/// Every character is checked before anything is drawn, so an unsupported
/// glyph leaves the image untouched.
pub fn draw_text(
    image: &mut RgbImage,
    text: &str,
    origin: (u32, u32),
    scale: u32,
    color: Rgb<u8>,
) -> Result<(), RenderError> {
    let glyphs = text
        .chars()
        .map(|c| glyph(c).ok_or(RenderError::UnsupportedGlyph(c)))
        .collect::<Result<Vec<_>, _>>()?;

    let scale = scale.max(1);
    let (width, height) = image.dimensions();
    for (i, rows) in glyphs.iter().enumerate() {
        let left = origin.0 as u64 + i as u64 * ((GLYPH_WIDTH + 1) * scale) as u64;
        for (row, bits) in rows.iter().enumerate() {
            for col in 0..GLYPH_WIDTH {
                if bits & (0x10 >> col) == 0 {
                    continue;
                }
                let x0 = left + (col * scale) as u64;
                let y0 = origin.1 as u64 + row as u64 * scale as u64;
                for y in y0..y0 + scale as u64 {
                    for x in x0..x0 + scale as u64 {
                        if x < width as u64 && y < height as u64 {
                            image.put_pixel(x as u32, y as u32, color);
                        }
                    }
                }
            }
        }
    }
    Ok(())
}
