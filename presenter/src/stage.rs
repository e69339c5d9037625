use motion_pipeline_common::channel::{PipelineMessage, StageReceiver};
use motion_pipeline_common::frame::Detection;
use motion_pipeline_common::stage::{StageContext, StageOutcome, StageReport};
use tracing::{info, warn};

use crate::sink::RenderSink;
use crate::Compositor;

/// Last pipeline stage: composites each detection and presents it.
pub struct PresenterStage {
    compositor: Compositor,
}

impl PresenterStage {
    pub fn new(compositor: Compositor) -> Self {
        Self { compositor }
    }

    /// Blocking worker loop; run it on a dedicated thread. The sink is
    /// released before returning, whatever ended the loop.
    pub fn run(
        self,
        ctx: StageContext,
        mut rx: StageReceiver<Detection>,
        mut sink: Box<dyn RenderSink>,
    ) -> StageReport {
        let _entered = ctx.span.enter();
        info!(sink = sink.name(), "starting presenter");
        let mut frames: u64 = 0;

        let outcome = loop {
            if ctx.stop.is_triggered() {
                info!("stop signal set, leaving presentation loop");
                break StageOutcome::Stopped;
            }
            match rx.blocking_recv() {
                Some(PipelineMessage::Payload(Detection { frame, regions })) => {
                    let shown = match self.compositor.composite(&frame, &regions) {
                        Ok(composited) => composited,
                        Err(e) => {
                            warn!(
                                seq = frame.seq,
                                error = %e,
                                "compositing failed, showing frame unmodified"
                            );
                            frame
                        }
                    };
                    if let Err(e) = sink.present(&shown) {
                        warn!(seq = shown.seq, error = %e, "failed to present frame");
                    }
                    frames += 1;
                    if sink.stop_requested() {
                        info!(seq = shown.seq, "sink requested stop");
                        break StageOutcome::Stopped;
                    }
                }
                Some(PipelineMessage::EndOfStream) => {
                    info!("received end of stream signal");
                    break StageOutcome::EndOfStream;
                }
                None => {
                    warn!("detection link closed without end-of-stream marker");
                    break StageOutcome::EndOfStream;
                }
            }
        };

        // Upstream sends fail from here on, so an early stop unwinds the
        // whole pipeline.
        rx.close();
        sink.release();
        info!(frames, ?outcome, "presenter terminated");
        StageReport {
            stage: ctx.name,
            frames,
            outcome,
        }
    }
}
