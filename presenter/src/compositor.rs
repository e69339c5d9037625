use chrono::{DateTime, Local, TimeZone};
use motion_pipeline_common::config::PresenterConfig;
use motion_pipeline_common::frame::{Frame, MotionRegion};

use crate::blur::blur_region;
use crate::kernel::GaussianKernel;
use crate::overlay::draw_timestamp;
use crate::RenderError;

/// Builds the displayed picture: blurred motion regions plus a timestamp.
pub struct Compositor {
    kernel: GaussianKernel,
    timestamp_format: String,
}

impl Compositor {
    pub fn new(config: &PresenterConfig) -> Self {
        Self {
            kernel: GaussianKernel::new(config.kernel_size, config.sigma),
            timestamp_format: config.timestamp_format.clone(),
        }
    }

    pub fn kernel(&self) -> &GaussianKernel {
        &self.kernel
    }

    /// Composite `frame` stamped with the current local time.
    pub fn composite(&self, frame: &Frame, regions: &[MotionRegion]) -> Result<Frame, RenderError> {
        self.composite_at(frame, regions, &Local::now())
    }

    /// The input frame is left as is; the result is a modified copy.
    pub fn composite_at<Tz>(
        &self,
        frame: &Frame,
        regions: &[MotionRegion],
        time: &DateTime<Tz>,
    ) -> Result<Frame, RenderError>
    where
        Tz: TimeZone,
        Tz::Offset: std::fmt::Display,
    {
        let mut out = frame.clone();
        for region in regions {
            blur_region(&mut out.image, &self.kernel, *region);
        }
        draw_timestamp(&mut out.image, time, &self.timestamp_format)?;
        Ok(out)
    }
}
