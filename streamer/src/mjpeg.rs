use std::io::Cursor;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use chrono::Utc;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use image::ImageReader;
use motion_pipeline_common::frame::Frame;
use tracing::{debug, info};

use crate::SourceError;

const BOUNDARY: &[u8] = b"--frame\r\n";
const HEADER_END: &[u8] = b"\r\n\r\n";

/// Parse state for the MJPEG multipart stream.
enum ParseState {
    /// Looking for the boundary marker `--frame\r\n`.
    SeekingBoundary,
    /// Found boundary, now looking for end of headers `\r\n\r\n`.
    SeekingHeaderEnd,
    /// Collecting JPEG bytes until the next boundary.
    CollectingJpeg,
}

/// Incremental splitter for `multipart/x-mixed-replace` bodies.
///
/// Bytes go in with [`push`](Self::push) in whatever chunks the network
/// delivers; complete JPEG parts come out of [`next_jpeg`](Self::next_jpeg).
pub(crate) struct MultipartParser {
    buffer: BytesMut,
    state: ParseState,
    jpeg_start: usize,
}

impl MultipartParser {
    pub(crate) fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(256 * 1024),
            state: ParseState::SeekingBoundary,
            jpeg_start: 0,
        }
    }

    pub(crate) fn push(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Next complete JPEG part, or `None` if more bytes are needed.
    pub(crate) fn next_jpeg(&mut self) -> Option<Vec<u8>> {
        loop {
            match self.state {
                ParseState::SeekingBoundary => {
                    if let Some(pos) = find_subsequence(&self.buffer, BOUNDARY) {
                        let _ = self.buffer.split_to(pos + BOUNDARY.len());
                        self.state = ParseState::SeekingHeaderEnd;
                    } else {
                        // Keep last few bytes in case boundary spans chunks
                        if self.buffer.len() > BOUNDARY.len() {
                            let _ = self.buffer.split_to(self.buffer.len() - BOUNDARY.len());
                        }
                        return None;
                    }
                }
                ParseState::SeekingHeaderEnd => {
                    let pos = find_subsequence(&self.buffer, HEADER_END)?;
                    let _ = self.buffer.split_to(pos + HEADER_END.len());
                    self.jpeg_start = 0;
                    self.state = ParseState::CollectingJpeg;
                }
                ParseState::CollectingJpeg => {
                    let Some(pos) = find_subsequence(&self.buffer[self.jpeg_start..], BOUNDARY)
                    else {
                        // Skip re-scanning what we already looked at.
                        self.jpeg_start = self.buffer.len().saturating_sub(BOUNDARY.len());
                        return None;
                    };
                    let jpeg_end = self.jpeg_start + pos;
                    // Strip trailing \r\n before boundary
                    let end = if jpeg_end >= 2
                        && self.buffer[jpeg_end - 2] == b'\r'
                        && self.buffer[jpeg_end - 1] == b'\n'
                    {
                        jpeg_end - 2
                    } else {
                        jpeg_end
                    };
                    let jpeg_data = self.buffer[..end].to_vec();
                    let _ = self.buffer.split_to(jpeg_end + BOUNDARY.len());
                    self.state = ParseState::SeekingHeaderEnd;

                    if !jpeg_data.is_empty() {
                        return Some(jpeg_data);
                    }
                }
            }
        }
    }
}

/// Find the position of `needle` in `haystack`.
fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// MJPEG-over-HTTP origin: each multipart JPEG part becomes one frame.
pub struct MjpegOrigin {
    url: String,
    body: BoxStream<'static, reqwest::Result<Bytes>>,
    parser: MultipartParser,
    next_seq: u64,
}

impl MjpegOrigin {
    pub async fn open(url: &str) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| SourceError::Unavailable(e.to_string()))?;
        let response = client
            .get(url)
            .send()
            .await
            .map_err(|e| SourceError::Unavailable(format!("{url}: {e}")))?;

        if !response.status().is_success() {
            return Err(SourceError::Unavailable(format!(
                "{url}: HTTP status {}",
                response.status().as_u16()
            )));
        }

        info!(url, status = %response.status(), "connected to MJPEG stream");

        Ok(Self {
            url: url.to_string(),
            body: response.bytes_stream().boxed(),
            parser: MultipartParser::new(),
            next_seq: 0,
        })
    }

    pub async fn read_frame(&mut self) -> Result<Option<Frame>, SourceError> {
        loop {
            if let Some(jpeg) = self.parser.next_jpeg() {
                let frame = decode_jpeg(&jpeg, self.next_seq)?;
                debug!(seq = self.next_seq, bytes = jpeg.len(), "decoded MJPEG part");
                self.next_seq += 1;
                return Ok(Some(frame));
            }
            match self.body.next().await {
                Some(Ok(chunk)) => self.parser.push(&chunk),
                Some(Err(e)) => {
                    return Err(SourceError::Decode(format!("{}: {e}", self.url)));
                }
                None => return Ok(None),
            }
        }
    }
}

fn decode_jpeg(jpeg: &[u8], seq: u64) -> Result<Frame, SourceError> {
    let img = ImageReader::new(Cursor::new(jpeg))
        .with_guessed_format()
        .map_err(|e| SourceError::Decode(e.to_string()))?
        .decode()
        .map_err(|e| SourceError::Decode(e.to_string()))?;
    Ok(Frame::new(
        img.to_rgb8(),
        seq,
        Utc::now().timestamp_millis(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn part(body: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(BOUNDARY);
        out.extend_from_slice(b"Content-Type: image/jpeg\r\n\r\n");
        out.extend_from_slice(body);
        out.extend_from_slice(b"\r\n");
        out
    }

    #[test]
    fn splits_parts_delivered_in_one_chunk() {
        let mut stream = part(b"first");
        stream.extend(part(b"second"));
        stream.extend_from_slice(BOUNDARY);

        let mut parser = MultipartParser::new();
        parser.push(&stream);
        assert_eq!(parser.next_jpeg().as_deref(), Some(&b"first"[..]));
        assert_eq!(parser.next_jpeg().as_deref(), Some(&b"second"[..]));
        assert_eq!(parser.next_jpeg(), None);
    }

    #[test]
    fn reassembles_parts_split_across_chunks() {
        let mut stream = part(b"0123456789");
        stream.extend_from_slice(BOUNDARY);

        let mut parser = MultipartParser::new();
        let mut out = Vec::new();
        for chunk in stream.chunks(3) {
            parser.push(chunk);
            while let Some(jpeg) = parser.next_jpeg() {
                out.push(jpeg);
            }
        }
        assert_eq!(out, vec![b"0123456789".to_vec()]);
    }

    #[test]
    fn skips_preamble_and_empty_parts() {
        let mut stream = b"garbage before the first boundary".to_vec();
        stream.extend(part(b""));
        stream.extend(part(b"payload"));
        stream.extend_from_slice(BOUNDARY);

        let mut parser = MultipartParser::new();
        parser.push(&stream);
        assert_eq!(parser.next_jpeg().as_deref(), Some(&b"payload"[..]));
    }

    #[test]
    fn decode_rejects_non_image_bytes() {
        assert!(matches!(decode_jpeg(b"not a jpeg", 0), Err(SourceError::Decode(_))));
    }

    #[test]
    fn decode_accepts_real_jpeg() {
        let img = image::RgbImage::from_pixel(8, 6, image::Rgb([200, 10, 10]));
        let mut jpeg = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut jpeg), image::ImageFormat::Jpeg)
            .unwrap();
        let frame = decode_jpeg(&jpeg, 4).unwrap();
        assert_eq!((frame.width(), frame.height(), frame.seq), (8, 6, 4));
    }
}
