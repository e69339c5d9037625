//! Pipeline driver: wires frame source, motion detector and presenter with
//! two bounded links and waits for all three to finish.

use motion_pipeline_common::channel::bounded;
use motion_pipeline_common::config::{Config, PresenterConfig};
use motion_pipeline_common::stage::{StageContext, StageOutcome, StageReport, StopSignal};
use motion_pipeline_detector::{DetectorStage, MotionDetector};
use motion_pipeline_presenter::{
    Compositor, HeadlessSink, HttpViewerSink, JpegDirSink, PresenterStage, RenderError, RenderSink,
};
use motion_pipeline_streamer::FrameSource;
use tokio::task::JoinError;
use tracing::{error, info};

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("{stage} worker did not finish: {message}")]
    Worker {
        stage: &'static str,
        message: String,
    },
}

/// How each stage ended.
#[derive(Debug)]
pub struct PipelineReport {
    pub source: Result<StageReport, PipelineError>,
    pub detector: Result<StageReport, PipelineError>,
    pub presenter: Result<StageReport, PipelineError>,
}

impl PipelineReport {
    /// Every worker ran to completion. A source that could not be opened
    /// still counts: it shut the pipeline down the normal way.
    pub fn is_clean(&self) -> bool {
        self.source.is_ok() && self.detector.is_ok() && self.presenter.is_ok()
    }

    pub fn stages(&self) -> [&Result<StageReport, PipelineError>; 3] {
        [&self.source, &self.detector, &self.presenter]
    }

    pub fn source_unavailable(&self) -> bool {
        matches!(&self.source, Ok(r) if r.outcome == StageOutcome::SourceUnavailable)
    }
}

pub struct Pipeline {
    source: FrameSource,
    detector: DetectorStage,
    presenter: PresenterStage,
    sink: Box<dyn RenderSink>,
    capacity: usize,
    stop: StopSignal,
}

impl Pipeline {
    pub fn from_config(config: &Config, sink: Box<dyn RenderSink>) -> Self {
        Self {
            source: FrameSource::from_config(&config.source),
            detector: DetectorStage::new(MotionDetector::new(config.detector.clone())),
            presenter: PresenterStage::new(Compositor::new(&config.presenter)),
            sink,
            capacity: config.channel.capacity,
            stop: StopSignal::new(),
        }
    }

    /// Replace the configured source, e.g. with in-memory frames.
    pub fn with_source(mut self, source: FrameSource) -> Self {
        self.source = source;
        self
    }

    /// Handle for requesting a cooperative stop from outside the pipeline.
    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    /// Run all three stages to completion on the current tokio runtime.
    pub async fn run(self) -> PipelineReport {
        let Pipeline {
            source,
            detector,
            presenter,
            sink,
            capacity,
            stop,
        } = self;

        let (frame_tx, frame_rx) = bounded(capacity);
        let (detection_tx, detection_rx) = bounded(capacity);
        info!(capacity, sink = sink.name(), "starting pipeline");

        let source_ctx = StageContext::new("streamer", stop.clone());
        let detector_ctx = StageContext::new("detector", stop.clone());
        let presenter_ctx = StageContext::new("presenter", stop);

        let source_task = tokio::spawn(source.run(source_ctx, frame_tx));
        let detector_task =
            tokio::task::spawn_blocking(move || detector.run(detector_ctx, frame_rx, detection_tx));
        let presenter_task =
            tokio::task::spawn_blocking(move || presenter.run(presenter_ctx, detection_rx, sink));

        let (source, detector, presenter) =
            tokio::join!(source_task, detector_task, presenter_task);
        let report = PipelineReport {
            source: joined("streamer", source),
            detector: joined("detector", detector),
            presenter: joined("presenter", presenter),
        };

        for stage in report.stages().into_iter().flatten() {
            info!(
                stage = stage.stage,
                frames = stage.frames,
                outcome = ?stage.outcome,
                "stage finished"
            );
        }
        report
    }
}

fn joined(
    stage: &'static str,
    result: Result<StageReport, JoinError>,
) -> Result<StageReport, PipelineError> {
    result.map_err(|e| {
        error!(stage, error = %e, "stage worker failed");
        PipelineError::Worker {
            stage,
            message: e.to_string(),
        }
    })
}

/// Create the render sink named by `config.sink`.
pub async fn build_sink(config: &PresenterConfig) -> Result<Box<dyn RenderSink>, RenderError> {
    match config.sink.as_str() {
        "headless" => Ok(Box::new(HeadlessSink::new())),
        "jpeg_dir" => Ok(Box::new(JpegDirSink::create(&config.output_dir)?)),
        "http" => Ok(Box::new(HttpViewerSink::bind(&config.http_addr).await?)),
        other => Err(RenderError::Unavailable(format!("unknown sink {other:?}"))),
    }
}
