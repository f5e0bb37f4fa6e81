use std::path::{Path, PathBuf};
use std::time::Duration;
use serde::{Deserialize, Serialize};
use crate::error::ConfigError;

/// Name announced to the sound server and used to recognise our own stream
pub const DEFAULT_APPLICATION_NAME: &str = "Space Ambient Daemon";

/// Stream role announced to the sound server
pub const DEFAULT_STREAM_ROLE: &str = "BackgroundDesktopSound";

/// Daemon configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AmbientConfig {
    pub track_directory: PathBuf,
    pub application_name: String,
    pub stream_role: String,
    pub device_name_hint: Option<String>,
    pub monitor_interval_ms: u64,
    /// Deadline for one mixer or window query
    pub query_timeout_ms: u64,
    /// Ask KWin for window owners and listen for the media-control shortcut
    pub desktop_integration: bool,
    pub engine_poll_ms: u64,
    pub idle_backoff_ms: u64,
    pub retry_delay_ms: u64,
    pub frame_bytes: usize,
    pub sink_buffer_ms: u64,
}

impl Default for AmbientConfig {
    fn default() -> Self {
        Self {
            track_directory: dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("space-ambient")
                .join("tracks"),
            application_name: DEFAULT_APPLICATION_NAME.to_string(),
            stream_role: DEFAULT_STREAM_ROLE.to_string(),
            device_name_hint: None,
            monitor_interval_ms: 300,
            query_timeout_ms: 1000,
            desktop_integration: true,
            engine_poll_ms: 100,
            idle_backoff_ms: 1000,
            retry_delay_ms: 100,
            frame_bytes: 4096,
            sink_buffer_ms: 200,
        }
    }
}

/// Poll and retry intervals used by the playback engine
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineTimings {
    /// Sleep between checks while suppressed
    pub poll_interval: Duration,
    /// Sleep between checks while the catalog is empty
    pub idle_backoff: Duration,
    /// Sleep between full track attempts
    pub retry_delay: Duration,
    /// Upper bound of one decode read, in bytes
    pub frame_bytes: usize,
}

impl Default for EngineTimings {
    fn default() -> Self {
        AmbientConfig::default().engine_timings()
    }
}

/// Settings handed to the activity monitor
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorSettings {
    pub interval: Duration,
    pub own_application_name: String,
    pub query_timeout: Duration,
}

/// Output stream settings handed to the sink factory
#[derive(Debug, Clone, PartialEq)]
pub struct SinkSettings {
    pub device_name_hint: Option<String>,
    pub stream_role: String,
    pub buffer: Duration,
}

impl AmbientConfig {
    /// Load the defaults overlaid with an optional TOML file
    ///
    /// The file is only read, never created.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::load_file(path)?,
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::IoError)?;
        let config: AmbientConfig = toml::from_str(&content)
            .map_err(ConfigError::DeserializationError)?;
        Ok(config)
    }

    /// Reject values that would make the engine or monitor spin
    pub fn validate(&self) -> Result<(), ConfigError> {
        let non_zero = [
            ("monitor_interval_ms", self.monitor_interval_ms),
            ("query_timeout_ms", self.query_timeout_ms),
            ("engine_poll_ms", self.engine_poll_ms),
            ("idle_backoff_ms", self.idle_backoff_ms),
            ("retry_delay_ms", self.retry_delay_ms),
            ("sink_buffer_ms", self.sink_buffer_ms),
        ];
        for (field, value) in non_zero {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    field,
                    reason: "must be greater than zero".to_string(),
                });
            }
        }

        // One stereo S16 sample frame is four bytes
        if self.frame_bytes < 4 || self.frame_bytes % 4 != 0 {
            return Err(ConfigError::InvalidValue {
                field: "frame_bytes",
                reason: format!("{} is not a positive multiple of 4", self.frame_bytes),
            });
        }

        if self.application_name.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "application_name",
                reason: "must not be empty".to_string(),
            });
        }

        Ok(())
    }

    pub fn engine_timings(&self) -> EngineTimings {
        EngineTimings {
            poll_interval: Duration::from_millis(self.engine_poll_ms),
            idle_backoff: Duration::from_millis(self.idle_backoff_ms),
            retry_delay: Duration::from_millis(self.retry_delay_ms),
            frame_bytes: self.frame_bytes,
        }
    }

    pub fn monitor_settings(&self) -> MonitorSettings {
        MonitorSettings {
            interval: Duration::from_millis(self.monitor_interval_ms),
            own_application_name: self.application_name.clone(),
            query_timeout: Duration::from_millis(self.query_timeout_ms),
        }
    }

    pub fn sink_settings(&self) -> SinkSettings {
        SinkSettings {
            device_name_hint: self.device_name_hint.clone(),
            stream_role: self.stream_role.clone(),
            buffer: Duration::from_millis(self.sink_buffer_ms),
        }
    }
}
