use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::Span;

/// Shared cooperative stop flag. Stages poll it once per loop iteration.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    flag: Arc<AtomicBool>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Handles a stage is given when it is scheduled.
///
/// `span` is the stage's logging handle: everything the stage logs is
/// recorded inside it, so log lines carry the stage name.
#[derive(Debug, Clone)]
pub struct StageContext {
    pub name: &'static str,
    pub span: Span,
    pub stop: StopSignal,
}

impl StageContext {
    pub fn new(name: &'static str, stop: StopSignal) -> Self {
        Self {
            name,
            span: tracing::info_span!("stage", name),
            stop,
        }
    }
}

/// Why a stage left its loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageOutcome {
    /// Saw (or produced) the end-of-stream marker and forwarded it.
    EndOfStream,
    /// The stop signal or the render sink asked to stop.
    Stopped,
    /// The downstream link was closed; nothing left to forward to.
    ChannelClosed,
    /// The video origin could not be opened.
    SourceUnavailable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageReport {
    pub stage: &'static str,
    /// Payload messages handled (sent by the source, forwarded by the
    /// detector, displayed by the presenter).
    pub frames: u64,
    pub outcome: StageOutcome,
}
