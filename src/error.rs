use thiserror::Error;

/// Main player error type
#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("Audio error: {0}")]
    Audio(#[from] AudioError),

    #[error("File error: {0}")]
    File(#[from] std::io::Error),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Monitor error: {0}")]
    Monitor(#[from] MonitorError),

    #[error("Track store error: {0}")]
    Store(#[from] StoreError),
}

impl PlayerError {
    /// Get user-friendly error message with suggested solutions
    pub fn user_message(&self) -> String {
        match self {
            PlayerError::Audio(err) => err.user_message(),
            PlayerError::File(err) => Self::format_file_error(err),
            PlayerError::Decode(err) => err.user_message(),
            PlayerError::Config(err) => err.user_message(),
            PlayerError::Monitor(err) => err.user_message(),
            PlayerError::Store(err) => err.user_message(),
        }
    }

    /// Get suggested recovery actions for the error
    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            PlayerError::Audio(err) => err.recovery_suggestions(),
            PlayerError::File(_) => vec!["Check the path and its permissions".to_string()],
            PlayerError::Decode(err) => err.recovery_suggestions(),
            PlayerError::Config(err) => err.recovery_suggestions(),
            PlayerError::Monitor(err) => err.recovery_suggestions(),
            PlayerError::Store(err) => err.recovery_suggestions(),
        }
    }

    /// Check if this error is absorbed at runtime instead of stopping the daemon
    pub fn is_recoverable(&self) -> bool {
        match self {
            PlayerError::Audio(err) => err.is_recoverable(),
            PlayerError::File(_) => false,
            PlayerError::Decode(err) => err.is_recoverable(),
            PlayerError::Config(_) => false, // Startup only
            PlayerError::Monitor(_) => true, // Always fails open
            PlayerError::Store(_) => false,
        }
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            PlayerError::Audio(err) => err.severity(),
            PlayerError::File(_) => ErrorSeverity::Critical,
            PlayerError::Decode(err) => err.severity(),
            PlayerError::Config(_) => ErrorSeverity::Critical,
            PlayerError::Monitor(_) => ErrorSeverity::Warning,
            PlayerError::Store(_) => ErrorSeverity::Critical,
        }
    }

    fn format_file_error(err: &std::io::Error) -> String {
        match err.kind() {
            std::io::ErrorKind::NotFound => "File or directory not found".to_string(),
            std::io::ErrorKind::PermissionDenied => "Permission denied - cannot access file".to_string(),
            std::io::ErrorKind::InvalidData => "File contains invalid or corrupted data".to_string(),
            _ => format!("File system error: {}", err),
        }
    }
}

/// Error severity levels for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl ErrorSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorSeverity::Info => "INFO",
            ErrorSeverity::Warning => "WARNING",
            ErrorSeverity::Error => "ERROR",
            ErrorSeverity::Critical => "CRITICAL",
        }
    }

    pub fn log_level(&self) -> log::Level {
        match self {
            ErrorSeverity::Info => log::Level::Info,
            ErrorSeverity::Warning => log::Level::Warn,
            ErrorSeverity::Error => log::Level::Error,
            ErrorSeverity::Critical => log::Level::Error,
        }
    }
}

/// Audio output errors
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("Output sink unavailable: {0}")]
    SinkUnavailable(String),

    #[error("Device not found: {device}")]
    DeviceNotFound { device: String },

    #[error("Unsupported sample rate: {rate}")]
    UnsupportedSampleRate { rate: u32 },

    #[error("Stream error: {0}")]
    StreamError(String),

    #[error("Audio initialization failed: {0}")]
    InitializationFailed(String),
}

impl AudioError {
    pub fn user_message(&self) -> String {
        match self {
            AudioError::SinkUnavailable(msg) => {
                format!("Cannot open the audio output right now: {}", msg)
            }
            AudioError::DeviceNotFound { device } => {
                format!("Audio device '{}' is not available or has been disconnected", device)
            }
            AudioError::UnsupportedSampleRate { rate } => {
                format!("Sample rate {} Hz is not supported by the current audio device", rate)
            }
            AudioError::StreamError(msg) => {
                format!("Audio playback interrupted: {}", msg)
            }
            AudioError::InitializationFailed(msg) => {
                format!("Failed to initialize audio system: {}", msg)
            }
        }
    }

    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            AudioError::SinkUnavailable(_) | AudioError::StreamError(_) => vec![
                "Playback retries automatically once the device is free again".to_string(),
            ],
            AudioError::DeviceNotFound { .. } => vec![
                "Remove the device hint to use the default output device".to_string(),
                "Check that your audio device is connected and powered on".to_string(),
            ],
            AudioError::UnsupportedSampleRate { .. } => vec![
                "Select a device that supports 44100 Hz or its default rate".to_string(),
            ],
            AudioError::InitializationFailed(_) => vec![
                "Check that the sound server is running".to_string(),
                "Verify audio drivers are properly installed".to_string(),
            ],
        }
    }

    pub fn is_recoverable(&self) -> bool {
        match self {
            AudioError::SinkUnavailable(_) => true,
            AudioError::DeviceNotFound { .. } => true, // Falls back to default device
            AudioError::UnsupportedSampleRate { .. } => true,
            AudioError::StreamError(_) => true,
            AudioError::InitializationFailed(_) => false,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            AudioError::DeviceNotFound { .. } => ErrorSeverity::Warning,
            AudioError::InitializationFailed(_) => ErrorSeverity::Critical,
            _ => ErrorSeverity::Error,
        }
    }
}

/// Audio decoding errors
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Cannot open stream: {0}")]
    OpenFailed(String),

    #[error("Unsupported format: {format}")]
    UnsupportedFormat { format: String },

    #[error("Decode failed: {0}")]
    DecodeFailed(String),
}

impl DecodeError {
    pub fn user_message(&self) -> String {
        match self {
            DecodeError::OpenFailed(msg) => {
                format!("Ambient track has an unreadable header: {}", msg)
            }
            DecodeError::UnsupportedFormat { format } => {
                format!("Audio format '{}' is not supported by this player", format)
            }
            DecodeError::DecodeFailed(msg) => {
                format!("Failed to decode audio data: {}", msg)
            }
        }
    }

    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            DecodeError::OpenFailed(_) | DecodeError::UnsupportedFormat { .. } => vec![
                "Re-encode the track as Ogg Vorbis".to_string(),
                "Remove the file from the track directory".to_string(),
            ],
            DecodeError::DecodeFailed(_) => vec![
                "Verify the file is not corrupted".to_string(),
            ],
        }
    }

    /// Every decode fault only aborts the current track
    pub fn is_recoverable(&self) -> bool {
        true
    }

    /// Open failures and mid-stream faults are logged at different levels
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            DecodeError::OpenFailed(_) | DecodeError::UnsupportedFormat { .. } => ErrorSeverity::Warning,
            DecodeError::DecodeFailed(_) => ErrorSeverity::Error,
        }
    }
}

/// Configuration-related errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Deserialization error: {0}")]
    DeserializationError(#[from] toml::de::Error),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

impl ConfigError {
    pub fn user_message(&self) -> String {
        match self {
            ConfigError::IoError(err) => {
                format!("Cannot read configuration file: {}", err)
            }
            ConfigError::DeserializationError(_) => {
                "Configuration file is corrupted or has invalid format".to_string()
            }
            ConfigError::InvalidValue { field, reason } => {
                format!("Configuration value '{}' is invalid: {}", field, reason)
            }
        }
    }

    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            ConfigError::IoError(_) => vec![
                "Check the path passed with --config".to_string(),
            ],
            ConfigError::DeserializationError(_) => vec![
                "Check the configuration file format manually".to_string(),
                "Run without --config to use the defaults".to_string(),
            ],
            ConfigError::InvalidValue { .. } => vec![
                "Intervals and frame sizes must be greater than zero".to_string(),
            ],
        }
    }
}

/// Errors raised while asking the desktop whether other audio is playing
#[derive(Debug, Clone, Error)]
pub enum MonitorError {
    #[error("Mixer unavailable: {0}")]
    MixerUnavailable(String),

    #[error("Mixer query aborted: {0}")]
    QueryAborted(String),

    #[error("Window query failed: {0}")]
    WindowQueryFailed(String),

    #[error("Shortcut listener unavailable: {0}")]
    ShortcutUnavailable(String),
}

impl MonitorError {
    pub fn user_message(&self) -> String {
        match self {
            MonitorError::MixerUnavailable(msg) => {
                format!("Cannot connect to the sound server: {}", msg)
            }
            MonitorError::QueryAborted(msg) => {
                format!("Sound server stopped answering mid-query: {}", msg)
            }
            MonitorError::WindowQueryFailed(msg) => {
                format!("Cannot list open windows: {}", msg)
            }
            MonitorError::ShortcutUnavailable(msg) => {
                format!("Cannot listen for the media-control shortcut: {}", msg)
            }
        }
    }

    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            MonitorError::MixerUnavailable(_) | MonitorError::QueryAborted(_) => vec![
                "Check that pactl is installed and the sound server is running".to_string(),
                "Playback continues unsuppressed until the mixer answers again".to_string(),
            ],
            MonitorError::WindowQueryFailed(_) => vec![
                "Check the compositor session".to_string(),
            ],
            MonitorError::ShortcutUnavailable(_) => vec![
                "Activity is still checked on every poll interval".to_string(),
            ],
        }
    }
}

/// Errors raised while loading the track catalog
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Not a directory: {path}")]
    NotADirectory { path: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    pub fn user_message(&self) -> String {
        match self {
            StoreError::NotADirectory { path } => {
                format!("Track path '{}' is not a directory", path)
            }
            StoreError::Io(err) => format!("Cannot read ambient tracks: {}", err),
        }
    }

    pub fn recovery_suggestions(&self) -> Vec<String> {
        vec!["Point --tracks at a directory of .ogg files".to_string()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_player_error_from_audio_error() {
        let audio_error = AudioError::SinkUnavailable("busy".to_string());
        let player_error: PlayerError = audio_error.into();

        match player_error {
            PlayerError::Audio(AudioError::SinkUnavailable(msg)) => {
                assert_eq!(msg, "busy");
            }
            _ => panic!("Expected Audio error variant"),
        }
    }

    #[test]
    fn test_player_error_from_monitor_error() {
        let player_error: PlayerError = MonitorError::MixerUnavailable("no server".to_string()).into();
        assert!(matches!(player_error, PlayerError::Monitor(_)));
        assert!(player_error.is_recoverable());
        assert_eq!(player_error.severity(), ErrorSeverity::Warning);
    }

    #[test]
    fn test_open_and_decode_errors_have_distinct_severity() {
        let open = DecodeError::OpenFailed("bad header".to_string());
        let decode = DecodeError::DecodeFailed("bad packet".to_string());

        assert_eq!(open.severity(), ErrorSeverity::Warning);
        assert_eq!(decode.severity(), ErrorSeverity::Error);
        assert_ne!(open.severity().log_level(), decode.severity().log_level());
        assert!(open.is_recoverable());
        assert!(decode.is_recoverable());
    }

    #[test]
    fn test_startup_errors_report_severity() {
        let config_error: PlayerError = ConfigError::InvalidValue {
            field: "engine_poll_ms",
            reason: "must be greater than zero".to_string(),
        }
        .into();
        assert_eq!(config_error.severity().as_str(), "CRITICAL");
        assert!(!config_error.is_recoverable());

        let shortcut: PlayerError = MonitorError::ShortcutUnavailable("no session bus".to_string()).into();
        assert_eq!(shortcut.severity().as_str(), "WARNING");
        assert!(shortcut.user_message().contains("media-control shortcut"));
    }

    #[test]
    fn test_sink_unavailable_is_recoverable() {
        let error = AudioError::SinkUnavailable("device busy".to_string());
        assert!(error.is_recoverable());
        assert!(!AudioError::InitializationFailed("x".to_string()).is_recoverable());
    }

    #[test]
    fn test_error_display() {
        let error = AudioError::DeviceNotFound {
            device: "Test Device".to_string(),
        };
        assert_eq!(format!("{}", error), "Device not found: Test Device");

        let error = DecodeError::OpenFailed("no vorbis header".to_string());
        assert_eq!(format!("{}", error), "Cannot open stream: no vorbis header");

        let error = MonitorError::QueryAborted("eof".to_string());
        assert_eq!(format!("{}", error), "Mixer query aborted: eof");

        let error = ConfigError::InvalidValue { field: "frame_bytes", reason: "must be > 0".to_string() };
        assert_eq!(format!("{}", error), "Invalid value for frame_bytes: must be > 0");
    }

    #[test]
    fn test_error_chain() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "Config file not found");
        let config_error: ConfigError = io_error.into();
        let player_error: PlayerError = config_error.into();

        let error_string = format!("{}", player_error);
        assert!(error_string.contains("Configuration error"));
        assert!(!player_error.is_recoverable());
    }

    #[test]
    fn test_error_source_chain() {
        use std::error::Error;

        let io_error = io::Error::new(io::ErrorKind::PermissionDenied, "Permission denied");
        let player_error = PlayerError::Store(StoreError::Io(io_error));

        let mut current_error: &dyn Error = &player_error;
        let mut error_count = 0;

        while let Some(source) = current_error.source() {
            current_error = source;
            error_count += 1;
        }

        assert!(error_count >= 1);
    }
}
