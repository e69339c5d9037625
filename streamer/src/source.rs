use std::time::Duration;

use motion_pipeline_common::channel::StageSender;
use motion_pipeline_common::config::SourceConfig;
use motion_pipeline_common::frame::Frame;
use motion_pipeline_common::stage::{StageContext, StageOutcome, StageReport};
use tracing::{debug, error, info, warn, Instrument};

use crate::origin::{OriginSpec, VideoOrigin};
use crate::SourceError;

enum Origin {
    Pending(OriginSpec),
    Opened(VideoOrigin),
    Invalid(SourceError),
}

/// First pipeline stage. Pulls frames from its origin and pushes them
/// downstream, then sends exactly one end-of-stream marker.
pub struct FrameSource {
    origin: Origin,
    pace: Duration,
}

impl FrameSource {
    /// The origin is opened when the stage starts running.
    pub fn new(spec: OriginSpec, config: &SourceConfig) -> Self {
        Self {
            origin: Origin::Pending(spec),
            pace: Duration::from_millis(config.pace_ms),
        }
    }

    /// Parse `config.origin`. A malformed origin string is reported as an
    /// unavailable source once the stage runs.
    pub fn from_config(config: &SourceConfig) -> Self {
        let origin = match OriginSpec::parse(&config.origin) {
            Ok(spec) => Origin::Pending(spec),
            Err(e) => Origin::Invalid(e),
        };
        Self {
            origin,
            pace: Duration::from_millis(config.pace_ms),
        }
    }

    /// Run over an origin that is already open (in-memory frames, tests).
    pub fn with_origin(origin: VideoOrigin, pace: Duration) -> Self {
        Self {
            origin: Origin::Opened(origin),
            pace,
        }
    }

    pub async fn run(self, ctx: StageContext, tx: StageSender<Frame>) -> StageReport {
        let span = ctx.span.clone();
        self.run_inner(ctx, tx).instrument(span).await
    }

    async fn run_inner(self, ctx: StageContext, tx: StageSender<Frame>) -> StageReport {
        let opened = match self.origin {
            Origin::Opened(origin) => Ok(origin),
            Origin::Invalid(e) => Err(e),
            Origin::Pending(spec) => {
                info!(origin = ?spec, "opening video origin");
                VideoOrigin::open(&spec).await
            }
        };
        let mut origin = match opened {
            Ok(origin) => origin,
            Err(e) => {
                error!(error = %e, "video origin unavailable");
                forward_end_of_stream(&tx).await;
                return StageReport {
                    stage: ctx.name,
                    frames: 0,
                    outcome: StageOutcome::SourceUnavailable,
                };
            }
        };

        info!(kind = origin.kind(), "starting frame source");
        let mut frames: u64 = 0;

        let outcome = loop {
            if ctx.stop.is_triggered() {
                info!(frames, "stop requested");
                break StageOutcome::Stopped;
            }

            match origin.read_frame().await {
                Ok(Some(frame)) => {
                    let seq = frame.seq;
                    if tx.send_payload(frame).await.is_err() {
                        warn!(seq, "detector link closed, stopping frame source");
                        break StageOutcome::ChannelClosed;
                    }
                    frames += 1;
                    debug!(seq, "frame sent");
                }
                Ok(None) => {
                    info!(frames, "end of video stream reached");
                    break StageOutcome::EndOfStream;
                }
                Err(e) => {
                    error!(error = %e, frames, "frame read failed, treating as end of stream");
                    break StageOutcome::EndOfStream;
                }
            }

            if !self.pace.is_zero() {
                tokio::time::sleep(self.pace).await;
            }
        };

        origin.release().await;
        if outcome != StageOutcome::ChannelClosed {
            forward_end_of_stream(&tx).await;
        }

        info!(frames, ?outcome, "frame source ended");
        StageReport {
            stage: ctx.name,
            frames,
            outcome,
        }
    }
}

async fn forward_end_of_stream(tx: &StageSender<Frame>) {
    if tx.send_end_of_stream().await.is_err() {
        warn!("detector link closed before end-of-stream could be sent");
    }
}
