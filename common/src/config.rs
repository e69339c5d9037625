use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub channel: ChannelConfig,
    #[serde(default)]
    pub detector: DetectorConfig,
    #[serde(default)]
    pub presenter: PresenterConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// File path, device index, stream URL or `synthetic://WxH?frames=N`.
    #[serde(default = "default_origin")]
    pub origin: String,
    /// Delay between two reads, in milliseconds.
    #[serde(default = "default_pace_ms")]
    pub pace_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChannelConfig {
    /// Capacity of each link (source→detector and detector→presenter).
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DetectorConfig {
    /// A pixel is "changed" when its absolute gray difference exceeds this.
    #[serde(default = "default_diff_threshold")]
    pub diff_threshold: u8,
    /// Contours enclosing this area or less are dropped as noise.
    #[serde(default = "default_min_area")]
    pub min_area: f64,
    #[serde(default = "default_dilate_iterations")]
    pub dilate_iterations: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PresenterConfig {
    #[serde(default = "default_kernel_size")]
    pub kernel_size: usize,
    #[serde(default = "default_sigma")]
    pub sigma: f64,
    /// chrono format string for the overlay.
    #[serde(default = "default_timestamp_format")]
    pub timestamp_format: String,
    /// One of `headless`, `jpeg_dir`, `http`.
    #[serde(default = "default_sink")]
    pub sink: String,
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    #[serde(default = "default_http_addr")]
    pub http_addr: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_dir")]
    pub dir: String,
    /// Rotated files kept per stage.
    #[serde(default = "default_max_files")]
    pub max_files: usize,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            origin: default_origin(),
            pace_ms: default_pace_ms(),
        }
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
        }
    }
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            diff_threshold: default_diff_threshold(),
            min_area: default_min_area(),
            dilate_iterations: default_dilate_iterations(),
        }
    }
}

impl Default for PresenterConfig {
    fn default() -> Self {
        Self {
            kernel_size: default_kernel_size(),
            sigma: default_sigma(),
            timestamp_format: default_timestamp_format(),
            sink: default_sink(),
            output_dir: default_output_dir(),
            http_addr: default_http_addr(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            dir: default_log_dir(),
            max_files: default_max_files(),
        }
    }
}

/// Sink names accepted in `presenter.sink`.
pub const SINK_NAMES: &[&str] = &["headless", "jpeg_dir", "http"];

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFile(path.display().to_string(), e))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Config =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.channel.capacity == 0 {
            return Err(ConfigError::Invalid("channel.capacity must be at least 1".into()));
        }
        if self.presenter.kernel_size == 0 {
            return Err(ConfigError::Invalid("presenter.kernel_size must be at least 1".into()));
        }
        if self.presenter.sigma.is_nan() || self.presenter.sigma <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "presenter.sigma must be positive, got {}",
                self.presenter.sigma
            )));
        }
        if !SINK_NAMES.contains(&self.presenter.sink.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "unknown presenter.sink '{}', expected one of {:?}",
                self.presenter.sink, SINK_NAMES
            )));
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {0}: {1}")]
    ReadFile(String, std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(String),
    #[error("invalid config: {0}")]
    Invalid(String),
}

// Default value functions
fn default_origin() -> String {
    "synthetic://640x480?frames=300".into()
}
fn default_pace_ms() -> u64 {
    10
}
fn default_capacity() -> usize {
    10
}
fn default_diff_threshold() -> u8 {
    25
}
fn default_min_area() -> f64 {
    500.0
}
fn default_dilate_iterations() -> u32 {
    2
}
fn default_kernel_size() -> usize {
    25
}
fn default_sigma() -> f64 {
    3.0
}
fn default_timestamp_format() -> String {
    "%Y-%m-%d %H:%M:%S".into()
}
fn default_sink() -> String {
    "headless".into()
}
fn default_output_dir() -> String {
    "output".into()
}
fn default_http_addr() -> String {
    "127.0.0.1:8080".into()
}
fn default_log_level() -> String {
    "info".into()
}
fn default_log_dir() -> String {
    "logs".into()
}
fn default_max_files() -> usize {
    5
}
