//! Console plus per-stage rotating file logging.
//!
//! ```text
//! logs/
//!   ├── streamer.2026-10-18.log
//!   ├── detector.2026-10-18.log
//!   ├── presenter.2026-10-18.log
//!   └── pipeline.2026-10-18.log
//! ```
//!
//! `pipeline.log` also collects the stage crates, whose targets share its
//! prefix. File writers are non-blocking: a slow disk drops lines, it never
//! stalls a stage.

use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{Builder, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use crate::config::LoggingConfig;

/// Log file prefix and the crate target routed into it.
pub const STAGE_LOGS: &[(&str, &str)] = &[
    ("streamer", "motion_pipeline_streamer"),
    ("detector", "motion_pipeline_detector"),
    ("presenter", "motion_pipeline_presenter"),
    ("pipeline", "motion_pipeline"),
];

/// Keeps the background file writers alive. Dropping it flushes them.
pub struct LoggingGuard {
    _file_guards: Vec<WorkerGuard>,
    log_dir: PathBuf,
}

impl LoggingGuard {
    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("failed to create log directory {0}: {1}")]
    CreateDir(String, std::io::Error),
    #[error("failed to open log file for {0}: {1}")]
    Appender(String, String),
    #[error("a global subscriber is already installed: {0}")]
    AlreadyInstalled(String),
}

/// Build the console filter: `RUST_LOG` wins, then the configured level.
pub fn console_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| level.parse().unwrap_or_default())
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Install the global subscriber.
pub fn init(config: &LoggingConfig) -> Result<LoggingGuard, LoggingError> {
    let (layers, guard) = build_layers(config)?;
    Registry::default()
        .with(layers)
        .try_init()
        .map_err(|e| LoggingError::AlreadyInstalled(e.to_string()))?;
    Ok(guard)
}

/// Console layer plus one file layer per entry of [`STAGE_LOGS`].
fn build_layers(
    config: &LoggingConfig,
) -> Result<(Vec<BoxedLayer>, LoggingGuard), LoggingError> {
    let log_dir = PathBuf::from(&config.dir);
    std::fs::create_dir_all(&log_dir)
        .map_err(|e| LoggingError::CreateDir(log_dir.display().to_string(), e))?;

    let mut layers = Vec::new();
    let mut file_guards = Vec::new();

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_filter(console_filter(&config.level));
    layers.push(console_layer.boxed());

    for (prefix, target) in STAGE_LOGS {
        let appender = Builder::new()
            .rotation(Rotation::DAILY)
            .filename_prefix(*prefix)
            .filename_suffix("log")
            .max_log_files(config.max_files.max(1))
            .build(&log_dir)
            .map_err(|e| LoggingError::Appender(prefix.to_string(), e.to_string()))?;
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);
        file_guards.push(guard);

        let file_layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true)
            .with_filter(EnvFilter::new(format!("{target}={}", config.level)))
            .boxed();
        layers.push(file_layer);
    }

    let guard = LoggingGuard {
        _file_guards: file_guards,
        log_dir,
    };
    Ok((layers, guard))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(dir: &Path) -> LoggingConfig {
        LoggingConfig {
            level: "info".into(),
            dir: dir.display().to_string(),
            max_files: 2,
        }
    }

    /// Everything written to the files starting with `prefix.`.
    fn read_logs(dir: &Path, prefix: &str) -> String {
        let mut text = String::new();
        for entry in std::fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            let name = path.file_name().unwrap().to_string_lossy().into_owned();
            if name.starts_with(&format!("{prefix}.")) && name.ends_with(".log") {
                text.push_str(&std::fs::read_to_string(&path).unwrap());
            }
        }
        text
    }

    #[test]
    fn events_are_routed_by_crate_target() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("logs");
        let (layers, guard) = build_layers(&config(&dir)).unwrap();
        assert_eq!(guard.log_dir(), dir);

        let subscriber = Registry::default().with(layers);
        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(target: "motion_pipeline_detector", seq = 4, "regions found");
            tracing::debug!(target: "motion_pipeline_streamer", "below the level");
        });
        drop(guard);

        let detector = read_logs(&dir, "detector");
        assert!(detector.contains("regions found"), "{detector:?}");
        assert!(detector.contains("seq=4"));
        assert!(!read_logs(&dir, "streamer").contains("regions found"));
        assert!(!read_logs(&dir, "streamer").contains("below the level"));
        // The binary's target is a prefix of every stage crate's target.
        assert!(read_logs(&dir, "pipeline").contains("regions found"));
        assert!(!read_logs(&dir, "presenter").contains("regions found"));
    }

    #[test]
    fn unwritable_log_dir_is_reported() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("not-a-dir");
        std::fs::write(&file, b"x").unwrap();
        assert!(matches!(
            build_layers(&config(&file.join("logs"))),
            Err(LoggingError::CreateDir(..))
        ));
    }
}
