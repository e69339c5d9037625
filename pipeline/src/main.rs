use std::path::PathBuf;

use motion_pipeline::{build_sink, Pipeline};
use motion_pipeline_common::config::Config;
use motion_pipeline_common::logging;
use motion_pipeline_presenter::HeadlessSink;
use motion_pipeline_streamer::{check_ffmpeg_available, OriginSpec};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    let from_file = config_path.exists();
    let config = if from_file {
        match Config::load(&config_path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Failed to load config from {}: {e}", config_path.display());
                std::process::exit(1);
            }
        }
    } else {
        Config::default()
    };

    let logging_guard = match logging::init(&config.logging) {
        Ok(g) => g,
        Err(e) => {
            eprintln!("Failed to initialise logging: {e}");
            std::process::exit(1);
        }
    };

    if from_file {
        info!(path = %config_path.display(), "configuration loaded");
    } else {
        warn!(path = %config_path.display(), "config file not found, using defaults");
    }
    info!(
        origin = config.source.origin,
        capacity = config.channel.capacity,
        sink = config.presenter.sink,
        log_dir = %logging_guard.log_dir().display(),
        "starting motion pipeline"
    );

    if matches!(
        OriginSpec::parse(&config.source.origin),
        Ok(OriginSpec::Device(_) | OriginSpec::Media(_))
    ) {
        check_ffmpeg_available().await;
    }

    let sink = match build_sink(&config.presenter).await {
        Ok(sink) => sink,
        Err(e) => {
            error!(
                error = %e,
                sink = config.presenter.sink,
                "render sink unavailable, running headless"
            );
            Box::new(HeadlessSink::new())
        }
    };

    let pipeline = Pipeline::from_config(&config, sink);
    let stop = pipeline.stop_signal();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping pipeline");
            stop.trigger();
        }
    });

    let report = pipeline.run().await;
    let code = if report.is_clean() {
        info!("motion pipeline finished");
        0
    } else {
        error!("motion pipeline finished with failed workers");
        1
    };

    drop(logging_guard);
    std::process::exit(code);
}
