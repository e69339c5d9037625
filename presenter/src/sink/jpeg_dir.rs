use std::fs;
use std::path::{Path, PathBuf};

use motion_pipeline_common::frame::Frame;
use tracing::{debug, info};

use super::{encode_jpeg, RenderSink, JPEG_QUALITY};
use crate::RenderError;

/// Writes every frame to `<dir>/frame_<seq>.jpg`.
pub struct JpegDirSink {
    dir: PathBuf,
    written: u64,
}

impl JpegDirSink {
    /// Creates `dir` (and parents) when missing.
    pub fn create(dir: impl AsRef<Path>) -> Result<Self, RenderError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|source| RenderError::Write {
            path: dir.display().to_string(),
            source,
        })?;
        info!(dir = %dir.display(), "writing frames as JPEG files");
        Ok(Self { dir, written: 0 })
    }

    pub fn frame_path(&self, seq: u64) -> PathBuf {
        self.dir.join(format!("frame_{seq:06}.jpg"))
    }

    pub fn written(&self) -> u64 {
        self.written
    }
}

impl RenderSink for JpegDirSink {
    fn present(&mut self, frame: &Frame) -> Result<(), RenderError> {
        let jpeg = encode_jpeg(frame, JPEG_QUALITY)?;
        let path = self.frame_path(frame.seq);
        fs::write(&path, &jpeg).map_err(|source| RenderError::Write {
            path: path.display().to_string(),
            source,
        })?;
        self.written += 1;
        debug!(path = %path.display(), bytes = jpeg.len(), "frame written");
        Ok(())
    }

    fn release(&mut self) {
        info!(dir = %self.dir.display(), frames = self.written, "JPEG output closed");
    }

    fn name(&self) -> &str {
        "jpeg_dir"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_one_file_per_frame() {
        let tmp = tempfile::tempdir().unwrap();
        let mut sink = JpegDirSink::create(tmp.path().join("out")).unwrap();
        for seq in [0, 1, 7] {
            sink.present(&Frame::filled(24, 16, [30, 60, 90], seq)).unwrap();
        }
        sink.release();

        assert_eq!(sink.written(), 3);
        let mut names: Vec<_> = fs::read_dir(tmp.path().join("out"))
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        names.sort();
        assert_eq!(
            names,
            vec!["frame_000000.jpg", "frame_000001.jpg", "frame_000007.jpg"]
        );
        let img = image::open(sink.frame_path(7)).unwrap();
        assert_eq!((img.width(), img.height()), (24, 16));
    }

    #[test]
    fn unwritable_directory_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("plain-file");
        fs::write(&file, b"x").unwrap();
        assert!(matches!(
            JpegDirSink::create(&file),
            Err(RenderError::Write { .. })
        ));
    }
}
