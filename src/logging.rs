use log::{info, warn, error, debug};
use std::sync::{Arc, Mutex};
use std::collections::VecDeque;
use chrono::{DateTime, Utc};

use crate::error::{DecodeError, ErrorSeverity};

/// Environment variable consulted for the log level
pub const LOG_LEVEL_ENV: &str = "SPACE_AMBIENT_LOG_LEVEL";

/// Playback event for logging and debugging
#[derive(Debug, Clone)]
pub struct AudioEvent {
    pub timestamp: DateTime<Utc>,
    pub event_type: AudioEventType,
    pub track: Option<usize>,
    pub details: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioEventType {
    TrackOpened,
    TrackEnded,
    PlaybackPaused,
    PlaybackResumed,
    StateChanged,
    CatalogEmpty,
    OpenFailed,
    DecodeError,
    SinkUnavailable,
    StreamError,
    InterferenceChanged,
    MonitorFailure,
}

impl AudioEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AudioEventType::TrackOpened => "TRACK_OPENED",
            AudioEventType::TrackEnded => "TRACK_ENDED",
            AudioEventType::PlaybackPaused => "PLAYBACK_PAUSED",
            AudioEventType::PlaybackResumed => "PLAYBACK_RESUMED",
            AudioEventType::StateChanged => "STATE_CHANGED",
            AudioEventType::CatalogEmpty => "CATALOG_EMPTY",
            AudioEventType::OpenFailed => "OPEN_FAILED",
            AudioEventType::DecodeError => "DECODE_ERROR",
            AudioEventType::SinkUnavailable => "SINK_UNAVAILABLE",
            AudioEventType::StreamError => "STREAM_ERROR",
            AudioEventType::InterferenceChanged => "INTERFERENCE_CHANGED",
            AudioEventType::MonitorFailure => "MONITOR_FAILURE",
        }
    }
}

/// Logger for playback and monitor events
#[derive(Clone)]
pub struct AudioLogger {
    events: Arc<Mutex<VecDeque<AudioEvent>>>,
    max_events: usize,
}

impl AudioLogger {
    pub fn new() -> Self {
        Self {
            events: Arc::new(Mutex::new(VecDeque::new())),
            max_events: 1000, // Keep last 1000 events
        }
    }

    /// Initialize logging system with appropriate log level
    ///
    /// `level` overrides the environment variable when given.
    pub fn init(level: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
        let log_level = match level {
            Some(level) => level.to_string(),
            None => std::env::var(LOG_LEVEL_ENV).unwrap_or_else(|_| "info".to_string()),
        };

        let mut builder = env_logger::Builder::new();

        builder.format(|buf, record| {
            use std::io::Write;
            writeln!(
                buf,
                "{} [{}] [{}:{}] {}",
                chrono::Utc::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                record.level(),
                record.file().unwrap_or("unknown"),
                record.line().unwrap_or(0),
                record.args()
            )
        });

        builder.filter_level(Self::parse_level(&log_level));
        builder.try_init()?;

        info!("Space ambient logging initialized with level: {}", log_level);
        Ok(())
    }

    /// Map a level name to a filter, falling back to Info
    pub fn parse_level(level: &str) -> log::LevelFilter {
        match level.to_lowercase().as_str() {
            "trace" => log::LevelFilter::Trace,
            "debug" => log::LevelFilter::Debug,
            "info" => log::LevelFilter::Info,
            "warn" => log::LevelFilter::Warn,
            "error" => log::LevelFilter::Error,
            "off" => log::LevelFilter::Off,
            _ => log::LevelFilter::Info,
        }
    }

    /// Log an event
    pub fn log_event(&self, event_type: AudioEventType, track: Option<usize>, details: String) {
        match event_type {
            AudioEventType::TrackOpened
            | AudioEventType::TrackEnded
            | AudioEventType::PlaybackPaused
            | AudioEventType::PlaybackResumed
            | AudioEventType::InterferenceChanged => {
                info!("[{}] {}", event_type.as_str(), details);
            }
            AudioEventType::StateChanged => {
                debug!("[{}] {}", event_type.as_str(), details);
            }
            AudioEventType::CatalogEmpty
            | AudioEventType::OpenFailed
            | AudioEventType::MonitorFailure => {
                warn!("[{}] {}", event_type.as_str(), details);
            }
            AudioEventType::DecodeError
            | AudioEventType::SinkUnavailable
            | AudioEventType::StreamError => {
                error!("[{}] {}", event_type.as_str(), details);
            }
        }

        let event = AudioEvent {
            timestamp: Utc::now(),
            event_type,
            track,
            details,
        };

        if let Ok(mut events) = self.events.lock() {
            events.push_back(event);
            while events.len() > self.max_events {
                events.pop_front();
            }
        }
    }

    pub fn log_track_opened(&self, track: usize, total: usize) {
        self.log_event(
            AudioEventType::TrackOpened,
            Some(track),
            format!("Playing track {} of {}", track + 1, total),
        );
    }

    pub fn log_track_ended(&self, track: usize) {
        self.log_event(
            AudioEventType::TrackEnded,
            Some(track),
            format!("Track {} finished, selecting next track", track + 1),
        );
    }

    pub fn log_playback_paused(&self, track: usize) {
        self.log_event(
            AudioEventType::PlaybackPaused,
            Some(track),
            "Paused: other audio streams detected".to_string(),
        );
    }

    pub fn log_playback_resumed(&self, track: usize) {
        self.log_event(
            AudioEventType::PlaybackResumed,
            Some(track),
            "Resuming playback".to_string(),
        );
    }

    pub fn log_state_change(&self, track: Option<usize>, from: &str, to: &str) {
        self.log_event(AudioEventType::StateChanged, track, format!("{} -> {}", from, to));
    }

    pub fn log_catalog_empty(&self) {
        self.log_event(
            AudioEventType::CatalogEmpty,
            None,
            "No ambient tracks loaded, idling".to_string(),
        );
    }

    /// Log a decode fault, distinguishing unreadable headers from mid-stream faults
    pub fn log_decode_error(&self, track: usize, err: &DecodeError) {
        let event_type = match err.severity() {
            ErrorSeverity::Info | ErrorSeverity::Warning => AudioEventType::OpenFailed,
            ErrorSeverity::Error | ErrorSeverity::Critical => AudioEventType::DecodeError,
        };
        self.log_event(event_type, Some(track), format!("Track {}: {}", track + 1, err));
    }

    pub fn log_sink_unavailable(&self, track: usize, reason: &str) {
        self.log_event(
            AudioEventType::SinkUnavailable,
            Some(track),
            format!("Cannot open audio output: {}", reason),
        );
    }

    pub fn log_stream_error(&self, track: usize, reason: &str) {
        self.log_event(
            AudioEventType::StreamError,
            Some(track),
            format!("Audio write failed: {}", reason),
        );
    }

    pub fn log_interference_changed(&self, interference: bool, foreground_apps: &[String]) {
        let details = if interference {
            if foreground_apps.is_empty() {
                "Other audio detected".to_string()
            } else {
                format!("Other audio detected (foreground: {})", foreground_apps.join(", "))
            }
        } else {
            "No other audio".to_string()
        };
        self.log_event(AudioEventType::InterferenceChanged, None, details);
    }

    pub fn log_monitor_failure(&self, reason: &str) {
        self.log_event(
            AudioEventType::MonitorFailure,
            None,
            format!("Activity query failed, assuming no other audio: {}", reason),
        );
    }

    /// Get recent events for debugging
    pub fn get_recent_events(&self, count: usize) -> Vec<AudioEvent> {
        match self.events.lock() {
            Ok(events) => {
                let skip = events.len().saturating_sub(count);
                events.iter().skip(skip).cloned().collect()
            }
            Err(_) => Vec::new(),
        }
    }

    /// Get all recorded events of one type
    pub fn events_of(&self, event_type: AudioEventType) -> Vec<AudioEvent> {
        match self.events.lock() {
            Ok(events) => events
                .iter()
                .filter(|e| e.event_type == event_type)
                .cloned()
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    pub fn count_of(&self, event_type: AudioEventType) -> usize {
        self.events_of(event_type).len()
    }

    pub fn clear_events(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }
}

impl Default for AudioLogger {
    fn default() -> Self {
        Self::new()
    }
}
