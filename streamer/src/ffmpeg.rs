use std::process::Stdio;

use chrono::Utc;
use motion_pipeline_common::frame::Frame;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, ChildStdout, Command};
use tracing::{debug, info, warn};

use crate::SourceError;

/// What ffmpeg should open: `-f <format>` (if any) and `-i <input>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FfmpegInput {
    pub format: Option<&'static str>,
    pub input: String,
}

impl FfmpegInput {
    pub fn media(input: impl Into<String>) -> Self {
        Self {
            format: None,
            input: input.into(),
        }
    }

    /// Capture device by index, using the platform's capture demuxer.
    pub fn device(index: u32) -> Option<Self> {
        if cfg!(target_os = "linux") {
            Some(Self {
                format: Some("v4l2"),
                input: format!("/dev/video{index}"),
            })
        } else if cfg!(target_os = "macos") {
            Some(Self {
                format: Some("avfoundation"),
                input: index.to_string(),
            })
        } else {
            None
        }
    }

    fn args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(format) = self.format {
            args.push("-f".to_string());
            args.push(format.to_string());
        }
        // Keep the coded orientation so frames match the probed size.
        args.push("-noautorotate".to_string());
        args.push("-i".to_string());
        args.push(self.input.clone());
        args
    }
}

/// Decodes any ffmpeg-readable input (file, device, RTSP...) into raw
/// `rgb24` frames read from the child's stdout.
pub struct FfmpegOrigin {
    child: Child,
    stdout: ChildStdout,
    width: u32,
    height: u32,
    next_seq: u64,
}

impl FfmpegOrigin {
    pub async fn open(input: FfmpegInput) -> Result<Self, SourceError> {
        let (width, height) = probe_dimensions(&input).await?;

        let mut cmd = Command::new("ffmpeg");
        cmd.args(["-hide_banner", "-loglevel", "error", "-nostdin"])
            .args(input.args())
            .args(["-f", "rawvideo", "-pix_fmt", "rgb24", "pipe:1"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .map_err(|e| SourceError::Unavailable(format!("failed to spawn ffmpeg: {e}")))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| SourceError::Unavailable("could not get ffmpeg stdout handle".into()))?;

        info!(input = input.input, width, height, "ffmpeg decoder started");

        Ok(Self {
            child,
            stdout,
            width,
            height,
            next_seq: 0,
        })
    }

    pub async fn read_frame(&mut self) -> Result<Option<Frame>, SourceError> {
        let frame =
            read_raw_frame(&mut self.stdout, self.width, self.height, self.next_seq).await?;
        match &frame {
            Some(_) => self.next_seq += 1,
            None => debug!(frames = self.next_seq, "ffmpeg output ended"),
        }
        Ok(frame)
    }

    /// Stop the decoder process.
    pub async fn release(&mut self) {
        if let Err(e) = self.child.kill().await {
            debug!(error = %e, "ffmpeg already exited");
        }
    }
}

/// Read one `rgb24` frame of `width`x`height` from `reader`.
///
/// A clean end of input before the first byte is `Ok(None)`; input ending
/// partway through a frame is a decode error.
async fn read_raw_frame<R: AsyncRead + Unpin>(
    reader: &mut R,
    width: u32,
    height: u32,
    seq: u64,
) -> Result<Option<Frame>, SourceError> {
    let frame_len = width as usize * height as usize * 3;
    let mut buf = vec![0u8; frame_len];
    let mut filled = 0;
    while filled < frame_len {
        let n = reader
            .read(&mut buf[filled..])
            .await
            .map_err(|e| SourceError::Decode(e.to_string()))?;
        if n == 0 {
            break;
        }
        filled += n;
    }

    if filled == 0 {
        return Ok(None);
    }
    if filled < frame_len {
        return Err(SourceError::Decode(format!(
            "truncated frame: got {filled} of {frame_len} bytes"
        )));
    }

    Frame::from_rgb_bytes(width, height, buf, seq, Utc::now().timestamp_millis())
        .map(Some)
        .map_err(|e| SourceError::Decode(e.to_string()))
}

/// Ask ffprobe for the first video stream's `WIDTHxHEIGHT`.
async fn probe_dimensions(input: &FfmpegInput) -> Result<(u32, u32), SourceError> {
    let mut cmd = Command::new("ffprobe");
    cmd.args(["-v", "error", "-select_streams", "v:0"])
        .args(["-show_entries", "stream=width,height", "-of", "csv=s=x:p=0"]);
    if let Some(format) = input.format {
        cmd.args(["-f", format]);
    }
    cmd.arg(&input.input);

    let output = cmd
        .output()
        .await
        .map_err(|e| SourceError::Unavailable(format!("failed to run ffprobe: {e}")))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(SourceError::Unavailable(format!(
            "could not open {}: {}",
            input.input,
            stderr.trim()
        )));
    }

    parse_probe_output(&String::from_utf8_lossy(&output.stdout)).ok_or_else(|| {
        SourceError::Unavailable(format!("no video stream found in {}", input.input))
    })
}

fn parse_probe_output(output: &str) -> Option<(u32, u32)> {
    let line = output.lines().map(str::trim).find(|l| !l.is_empty())?;
    let (w, h) = line.split_once('x')?;
    let width: u32 = w.trim().parse().ok()?;
    let height: u32 = h.trim().trim_end_matches('x').parse().ok()?;
    (width > 0 && height > 0).then_some((width, height))
}

/// Check whether ffmpeg is available on PATH. Logs a warning if not found.
pub async fn check_ffmpeg_available() -> bool {
    match Command::new("ffmpeg").arg("-version").output().await {
        Ok(out) if out.status.success() => {
            debug!("ffmpeg is available");
            true
        }
        Ok(_) => {
            warn!("ffmpeg returned non-zero for -version; file and device origins may fail");
            false
        }
        Err(e) => {
            warn!(
                error = %e,
                "ffmpeg not found on PATH; file, device and RTSP origins will be unavailable"
            );
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_probe_output() {
        assert_eq!(parse_probe_output("1280x720\n"), Some((1280, 720)));
        assert_eq!(parse_probe_output("\n640x480x\n"), Some((640, 480)));
        assert_eq!(parse_probe_output(""), None);
        assert_eq!(parse_probe_output("0x480"), None);
        assert_eq!(parse_probe_output("N/AxN/A"), None);
    }

    #[test]
    fn input_args_include_format_when_set() {
        let input = FfmpegInput {
            format: Some("v4l2"),
            input: "/dev/video0".into(),
        };
        assert_eq!(
            input.args(),
            vec!["-f", "v4l2", "-noautorotate", "-i", "/dev/video0"]
        );
        assert_eq!(
            FfmpegInput::media("a.mp4").args(),
            vec!["-noautorotate", "-i", "a.mp4"]
        );
    }

    #[test]
    fn rotation_is_disabled_before_the_input() {
        let args = FfmpegInput::media("phone.mp4").args();
        let no_rotate = args.iter().position(|a| a == "-noautorotate").unwrap();
        let input = args.iter().position(|a| a == "-i").unwrap();
        assert!(no_rotate < input);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn device_index_maps_to_v4l2_node() {
        let input = FfmpegInput::device(2).unwrap();
        assert_eq!(input.format, Some("v4l2"));
        assert_eq!(input.input, "/dev/video2");
    }

    /// 4x2 frame whose pixel at column x, row y is `[x, y, seq]`.
    fn raw_frame(seq: u8) -> Vec<u8> {
        let mut bytes = Vec::new();
        for y in 0..2u8 {
            for x in 0..4u8 {
                bytes.extend_from_slice(&[x, y, seq]);
            }
        }
        bytes
    }

    #[tokio::test]
    async fn reads_an_exact_frame() {
        let bytes = raw_frame(7);
        let mut reader: &[u8] = &bytes;
        let frame = read_raw_frame(&mut reader, 4, 2, 3).await.unwrap().unwrap();
        assert_eq!(frame.seq, 3);
        assert_eq!((frame.width(), frame.height()), (4, 2));
        assert_eq!(frame.image.get_pixel(3, 1).0, [3, 1, 7]);
        assert!(
            read_raw_frame(&mut reader, 4, 2, 4).await.unwrap().is_none()
        );
    }

    #[tokio::test]
    async fn gathers_a_frame_delivered_byte_by_byte() {
        let (mut writer, mut reader) = tokio::io::duplex(1);
        let bytes = [raw_frame(1), raw_frame(2)].concat();
        let feeder = tokio::spawn(async move {
            use tokio::io::AsyncWriteExt;
            writer.write_all(&bytes).await.unwrap();
        });

        let first = read_raw_frame(&mut reader, 4, 2, 0).await.unwrap().unwrap();
        let second = read_raw_frame(&mut reader, 4, 2, 1).await.unwrap().unwrap();
        assert_eq!(first.image.get_pixel(2, 0).0, [2, 0, 1]);
        assert_eq!(second.image.get_pixel(2, 0).0, [2, 0, 2]);
        feeder.await.unwrap();
        assert!(
            read_raw_frame(&mut reader, 4, 2, 2).await.unwrap().is_none()
        );
    }

    #[tokio::test]
    async fn empty_input_is_end_of_stream() {
        let mut reader: &[u8] = &[];
        assert!(
            read_raw_frame(&mut reader, 4, 2, 0).await.unwrap().is_none()
        );
    }

    #[tokio::test]
    async fn truncated_tail_is_a_decode_error() {
        let bytes = raw_frame(0);
        let mut reader: &[u8] = &bytes[..bytes.len() - 5];
        let err = read_raw_frame(&mut reader, 4, 2, 0).await.unwrap_err();
        assert!(matches!(err, SourceError::Decode(ref m) if m.contains("19 of 24")), "{err}");
    }
}
