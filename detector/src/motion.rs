use image::imageops;
use motion_pipeline_common::config::DetectorConfig;
use motion_pipeline_common::frame::{Frame, GrayFrame, MotionRegion};
use tracing::{debug, warn};

use crate::contour::find_external_contours;
use crate::mask::{dilate, threshold_diff};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DetectionError {
    #[error("frame {seq} has no pixels")]
    EmptyFrame { seq: u64 },
    #[error("frame {seq} is {got:?}, previous frame was {expected:?}")]
    DimensionMismatch {
        seq: u64,
        got: (u32, u32),
        expected: (u32, u32),
    },
}

/// Finds regions that changed since the previous frame.
///
/// The detector keeps the previous frame's grayscale image as its only
/// state. The first frame, and the first frame after a failure, never
/// reports motion.
pub struct MotionDetector {
    config: DetectorConfig,
    previous: Option<GrayFrame>,
}

impl MotionDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self {
            config,
            previous: None,
        }
    }

    pub fn has_baseline(&self) -> bool {
        self.previous.is_some()
    }

    /// Drop the baseline; the next frame becomes the new reference.
    pub fn reset(&mut self) {
        self.previous = None;
    }

    /// Detect motion in `frame`. Failures are logged and reported as no
    /// motion, with the baseline reset.
    pub fn detect(&mut self, frame: &Frame) -> Vec<MotionRegion> {
        match self.try_detect(frame) {
            Ok(regions) => regions,
            Err(e) => {
                warn!(seq = frame.seq, error = %e, "motion detection failed, resetting baseline");
                self.reset();
                Vec::new()
            }
        }
    }

    /// Fallible core of [`detect`](Self::detect). On error the baseline is
    /// left empty.
    pub fn try_detect(&mut self, frame: &Frame) -> Result<Vec<MotionRegion>, DetectionError> {
        if frame.is_empty() {
            self.previous = None;
            return Err(DetectionError::EmptyFrame { seq: frame.seq });
        }

        let gray = imageops::grayscale(&frame.image);
        let regions = match self.previous.take() {
            None => {
                debug!(seq = frame.seq, "no baseline yet");
                Vec::new()
            }
            Some(previous) => {
                if previous.dimensions() != gray.dimensions() {
                    return Err(DetectionError::DimensionMismatch {
                        seq: frame.seq,
                        got: gray.dimensions(),
                        expected: previous.dimensions(),
                    });
                }
                self.regions_between(&previous, &gray)
            }
        };

        self.previous = Some(gray);
        Ok(regions)
    }

    fn regions_between(&self, previous: &GrayFrame, current: &GrayFrame) -> Vec<MotionRegion> {
        let mask = threshold_diff(current, previous, self.config.diff_threshold);
        let mask = dilate(&mask, self.config.dilate_iterations);

        find_external_contours(&mask)
            .into_iter()
            .filter(|contour| contour.area() > self.config.min_area)
            .map(|contour| contour.bounding_rect())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    const W: u32 = 160;
    const H: u32 = 120;

    fn background(seq: u64) -> Frame {
        Frame::filled(W, H, [20, 20, 20], seq)
    }

    fn with_rect(seq: u64, x: u32, y: u32, w: u32, h: u32) -> Frame {
        let mut frame = background(seq);
        for yy in y..y + h {
            for xx in x..x + w {
                frame.image.put_pixel(xx, yy, Rgb([240, 240, 240]));
            }
        }
        frame
    }

    fn detector() -> MotionDetector {
        MotionDetector::new(DetectorConfig::default())
    }

    #[test]
    fn first_frame_has_no_motion() {
        let mut d = detector();
        assert!(d.detect(&with_rect(0, 10, 10, 50, 50)).is_empty());
        assert!(d.has_baseline());
    }

    #[test]
    fn identical_frames_have_no_motion() {
        let mut d = detector();
        d.detect(&background(0));
        assert!(d.detect(&background(1)).is_empty());
    }

    #[test]
    fn inserted_rectangle_is_one_region() {
        let mut d = detector();
        d.detect(&background(0));
        let regions = d.detect(&with_rect(1, 40, 30, 40, 30));
        assert_eq!(regions.len(), 1);

        let inserted = MotionRegion::new(40, 30, 40, 30);
        assert!(regions[0].contains(&inserted));
        // Two dilation passes grow each side by at most two pixels.
        assert_eq!(regions[0], MotionRegion::new(38, 28, 44, 34));
    }

    #[test]
    fn small_change_is_suppressed_as_noise() {
        let mut d = detector();
        d.detect(&background(0));
        // 10x10 grows to 14x14 after dilation: contour area 13*13 = 169.
        assert!(d.detect(&with_rect(1, 50, 50, 10, 10)).is_empty());
    }

    #[test]
    fn change_below_threshold_is_ignored() {
        let mut d = detector();
        d.detect(&Frame::filled(W, H, [100, 100, 100], 0));
        assert!(
            d.detect(&Frame::filled(W, H, [120, 120, 120], 1)).is_empty()
        );
    }

    #[test]
    fn distant_changes_give_separate_regions() {
        let mut d = detector();
        d.detect(&background(0));
        let mut frame = with_rect(1, 5, 5, 30, 30);
        for y in 70..110 {
            for x in 100..150 {
                frame.image.put_pixel(x, y, Rgb([255, 255, 255]));
            }
        }
        let mut regions = d.detect(&frame);
        regions.sort_by_key(|r| (r.x, r.y));
        assert_eq!(
            regions,
            vec![MotionRegion::new(3, 3, 34, 34), MotionRegion::new(98, 68, 54, 44)]
        );
    }

    #[test]
    fn baseline_always_advances() {
        let mut d = detector();
        d.detect(&background(0));
        assert_eq!(d.detect(&with_rect(1, 40, 30, 40, 30)).len(), 1);
        // Same picture again: compared with the previous frame, nothing moved.
        assert!(d.detect(&with_rect(2, 40, 30, 40, 30)).is_empty());
    }

    #[test]
    fn dimension_change_resets_baseline() {
        let mut d = detector();
        d.detect(&background(0));
        let small = Frame::filled(80, 60, [200, 200, 200], 1);
        assert_eq!(
            d.try_detect(&small),
            Err(DetectionError::DimensionMismatch {
                seq: 1,
                got: (80, 60),
                expected: (W, H)
            })
        );
        assert!(!d.has_baseline());

        // The infallible entry point degrades to "no motion" and recovers.
        d.detect(&background(2));
        assert!(d.detect(&small).is_empty());
        assert!(!d.has_baseline());
        assert!(d.detect(&small).is_empty());
        assert!(d.has_baseline());
    }

    #[test]
    fn reset_makes_the_next_frame_the_baseline() {
        let mut d = detector();
        d.detect(&background(0));
        d.reset();
        assert!(!d.has_baseline());
        // Would be one region against the old baseline.
        assert!(d.detect(&with_rect(1, 40, 30, 40, 30)).is_empty());
        assert!(d.has_baseline());
    }

    #[test]
    fn empty_frame_is_an_error() {
        let mut d = detector();
        d.detect(&background(0));
        let empty = Frame::new(RgbImage::new(0, 0), 1, 0);
        assert_eq!(
            d.try_detect(&empty),
            Err(DetectionError::EmptyFrame { seq: 1 }),
        );
        assert!(!d.has_baseline());
    }

    #[test]
    fn thresholds_come_from_config() {
        let mut d = MotionDetector::new(DetectorConfig {
            diff_threshold: 25,
            min_area: 50.0,
            dilate_iterations: 0,
        });
        d.detect(&background(0));
        // 10x10 without dilation: contour area 9*9 = 81 > 50.
        assert_eq!(
            d.detect(&with_rect(1, 50, 50, 10, 10)),
            vec![MotionRegion::new(50, 50, 10, 10)]
        );
    }
}
