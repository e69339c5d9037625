use motion_pipeline_common::channel::{PipelineMessage, StageReceiver, StageSender};
use motion_pipeline_common::frame::{Detection, Frame};
use motion_pipeline_common::stage::{StageContext, StageOutcome, StageReport};
use tracing::{debug, info, warn};

use crate::MotionDetector;

/// Middle pipeline stage: one detect call per frame, frames forwarded in
/// order together with their regions.
pub struct DetectorStage {
    detector: MotionDetector,
}

impl DetectorStage {
    pub fn new(detector: MotionDetector) -> Self {
        Self { detector }
    }

    /// Blocking worker loop; run it on a dedicated thread.
    pub fn run(
        mut self,
        ctx: StageContext,
        mut rx: StageReceiver<Frame>,
        tx: StageSender<Detection>,
    ) -> StageReport {
        let _entered = ctx.span.enter();
        info!("starting detector");
        let mut frames: u64 = 0;

        let outcome = loop {
            if ctx.stop.is_triggered() {
                info!(frames, "stop requested");
                break StageOutcome::Stopped;
            }
            match rx.blocking_recv() {
                Some(PipelineMessage::Payload(frame)) => {
                    let regions = self.detector.detect(&frame);
                    if !regions.is_empty() {
                        debug!(seq = frame.seq, regions = regions.len(), "motion detected");
                    }
                    let seq = frame.seq;
                    if tx
                        .blocking_send(PipelineMessage::Payload(Detection { frame, regions }))
                        .is_err()
                    {
                        warn!(seq, "presenter link closed, stopping detector");
                        break StageOutcome::ChannelClosed;
                    }
                    frames += 1;
                }
                Some(PipelineMessage::EndOfStream) => {
                    info!("received end of stream signal");
                    break StageOutcome::EndOfStream;
                }
                None => {
                    warn!("frame link closed without end-of-stream marker");
                    break StageOutcome::EndOfStream;
                }
            }
        };

        if outcome == StageOutcome::Stopped {
            rx.close();
        }
        if matches!(outcome, StageOutcome::EndOfStream | StageOutcome::Stopped)
            && tx.blocking_send_end_of_stream().is_err()
        {
            warn!("presenter link closed before end-of-stream could be sent");
        }

        info!(frames, ?outcome, "detector terminated");
        StageReport {
            stage: ctx.name,
            frames,
            outcome,
        }
    }
}
