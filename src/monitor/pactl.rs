use std::process::Stdio;
use std::time::Duration;

use log::trace;
use tokio::process::Command;

use crate::error::MonitorError;
use crate::monitor::session::{self, SessionFailure};
use crate::monitor::{AudioMixer, OutputStreamInfo, ProcessId};

/// Mixer collaborator backed by `pactl list sink-inputs`
///
/// Works against PulseAudio and PipeWire's pulse server alike. A `pactl` that has
/// not answered by the deadline is killed and the cycle counts as failed.
#[derive(Debug, Clone)]
pub struct PactlMixer {
    program: String,
    timeout: Duration,
}

impl PactlMixer {
    pub fn new() -> Self {
        Self::with_program("pactl")
    }

    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            timeout: Duration::from_secs(1),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for PactlMixer {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioMixer for PactlMixer {
    fn active_streams(&self) -> Result<Vec<OutputStreamInfo>, MonitorError> {
        // Field names are localised otherwise
        let query = Command::new(&self.program)
            .args(["list", "sink-inputs"])
            .env("LANG", "C")
            .env("LC_ALL", "C")
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = session::run_bounded(self.timeout, query)
            .map_err(|failure| match failure {
                SessionFailure::TimedOut(_) => {
                    MonitorError::QueryAborted(format!("{}: {}", self.program, failure))
                }
                SessionFailure::Runtime(_) => MonitorError::MixerUnavailable(failure.to_string()),
            })?
            .map_err(|e| MonitorError::MixerUnavailable(format!("{}: {}", self.program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(MonitorError::QueryAborted(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        let streams = parse_sink_inputs(&String::from_utf8_lossy(&output.stdout));
        trace!("pactl reported {} sink inputs", streams.len());
        Ok(streams)
    }
}

/// Parse the text listing of sink inputs
pub fn parse_sink_inputs(listing: &str) -> Vec<OutputStreamInfo> {
    let mut streams = Vec::new();
    let mut current: Option<StreamFields> = None;

    for line in listing.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("Sink Input #") {
            if let Some(fields) = current.take() {
                streams.push(fields.finish());
            }
            current = Some(StreamFields::default());
            continue;
        }

        let Some(fields) = current.as_mut() else {
            continue;
        };

        if let Some(value) = trimmed.strip_prefix("Mute:") {
            fields.muted = value.trim() == "yes";
        } else if let Some(value) = trimmed.strip_prefix("Corked:") {
            fields.corked = value.trim() == "yes";
        } else if let Some(value) = trimmed.strip_prefix("Volume:") {
            fields.volume_audible = Some(any_channel_above_zero(value));
        } else if let Some(value) = property(trimmed, "application.name") {
            fields.application_name = Some(value.to_string());
        } else if let Some(value) = property(trimmed, "application.process.id") {
            fields.process_id = value.parse::<ProcessId>().ok().filter(|&pid| pid != 0);
        }
    }

    if let Some(fields) = current {
        streams.push(fields.finish());
    }
    streams
}

#[derive(Debug, Default)]
struct StreamFields {
    application_name: Option<String>,
    process_id: Option<ProcessId>,
    muted: bool,
    corked: bool,
    // None when the listing had no volume line
    volume_audible: Option<bool>,
}

impl StreamFields {
    fn finish(self) -> OutputStreamInfo {
        OutputStreamInfo {
            audible: !self.muted && !self.corked && self.volume_audible.unwrap_or(true),
            application_name: self.application_name.filter(|name| !name.is_empty()),
            process_id: self.process_id,
        }
    }
}

// `front-left: 65536 / 100% / 0.00 dB,   front-right: 0 / 0% / -inf dB`
fn any_channel_above_zero(volume: &str) -> bool {
    volume
        .split('/')
        .filter_map(|part| part.trim().strip_suffix('%'))
        .filter_map(|percent| percent.trim().parse::<u32>().ok())
        .any(|percent| percent > 0)
}

// `key = "value"` from the Properties section
fn property<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(key)?.trim_start();
    let value = rest.strip_prefix('=')?.trim();
    Some(value.trim_matches('"'))
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r#"Sink Input #42
	Driver: protocol-native.c
	Owner Module: 10
	Client: 55
	Sink: 0
	Sample Specification: float32le 2ch 48000Hz
	Channel Map: front-left,front-right
	Format: pcm, format.sample_format = "\"float32le\""  format.rate = "48000"
	Corked: no
	Mute: no
	Volume: front-left: 65536 / 100% / 0.00 dB,   front-right: 65536 / 100% / 0.00 dB
	        balance 0.00
	Buffer Latency: 34829 usec
	Sink Latency: 23461 usec
	Resample method: n/a
	Properties:
		media.name = "Playback"
		application.name = "Firefox"
		application.process.id = "3141"
		application.process.binary = "firefox"

Sink Input #43
	Driver: protocol-native.c
	Corked: no
	Mute: yes
	Volume: front-left: 65536 / 100% / 0.00 dB,   front-right: 65536 / 100% / 0.00 dB
	Properties:
		application.name = "mpv"
		application.process.id = "2718"

Sink Input #44
	Corked: no
	Mute: no
	Volume: mono: 0 / 0% / -inf dB
	Properties:
		application.name = "Zoom"

Sink Input #45
	Corked: yes
	Mute: no
	Volume: front-left: 30000 / 46% / -20.34 dB,   front-right: 30000 / 46% / -20.34 dB
	Properties:
		application.name = "Space Ambient Daemon"
		application.process.id = "0"

Sink Input #46
	Corked: no
	Mute: no
	Volume: front-left: 0 / 0% / -inf dB,   front-right: 3277 / 5% / -78.06 dB
	Properties:
		media.name = "unnamed"
"#;

    #[test]
    fn test_parse_sink_inputs() {
        let streams = parse_sink_inputs(LISTING);
        assert_eq!(streams.len(), 5);

        assert_eq!(
            streams[0],
            OutputStreamInfo {
                application_name: Some("Firefox".to_string()),
                process_id: Some(3141),
                audible: true,
            }
        );

        // Muted
        assert!(!streams[1].audible);
        assert_eq!(streams[1].process_id, Some(2718));

        // Zero volume, no pid
        assert!(!streams[2].audible);
        assert_eq!(streams[2].process_id, None);

        // Corked, pid zero means absent
        assert!(!streams[3].audible);
        assert_eq!(streams[3].process_id, None);

        // One channel above zero, no application name
        assert!(streams[4].audible);
        assert_eq!(streams[4].application_name, None);
    }

    #[test]
    fn test_parse_empty_listing() {
        assert!(parse_sink_inputs("").is_empty());
        assert!(parse_sink_inputs("Connection failure: Connection refused\n").is_empty());
    }

    #[test]
    fn test_missing_volume_counts_as_audible() {
        let streams = parse_sink_inputs("Sink Input #1\n\tMute: no\n\tProperties:\n\t\tapplication.name = \"x\"\n");
        assert_eq!(streams.len(), 1);
        assert!(streams[0].audible);
    }

    #[test]
    fn test_property_requires_exact_key() {
        assert_eq!(property("application.name = \"a b\"", "application.name"), Some("a b"));
        assert_eq!(property("application.name.extra = \"x\"", "application.name"), None);
    }

    #[test]
    fn test_missing_program_is_mixer_unavailable() {
        let mixer = PactlMixer::with_program("/nonexistent/space-ambient-pactl");
        assert!(matches!(mixer.active_streams(), Err(MonitorError::MixerUnavailable(_))));
    }

    #[cfg(unix)]
    fn fake_pactl(dir: &std::path::Path, body: &str) -> String {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("pactl");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[cfg(unix)]
    #[test]
    fn test_reads_listing_from_program() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let program = fake_pactl(
            temp_dir.path(),
            "printf 'Sink Input #1\\n\\tMute: no\\n\\tProperties:\\n\\t\\tapplication.name = \"mpv\"\\n'",
        );

        let streams = PactlMixer::with_program(program).active_streams().unwrap();
        assert_eq!(streams.len(), 1);
        assert_eq!(streams[0].application_name.as_deref(), Some("mpv"));
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_program_is_query_aborted() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let program = fake_pactl(temp_dir.path(), "echo 'Connection failure' >&2; exit 1");

        let result = PactlMixer::with_program(program).active_streams();
        assert!(matches!(result, Err(MonitorError::QueryAborted(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_wedged_program_is_abandoned_at_deadline() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let program = fake_pactl(temp_dir.path(), "exec sleep 30");
        let mixer = PactlMixer::with_program(program).with_timeout(Duration::from_millis(100));

        let started = std::time::Instant::now();
        let result = mixer.active_streams();

        assert!(matches!(result, Err(MonitorError::QueryAborted(_))));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_query_from_host_runtime() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let program = fake_pactl(temp_dir.path(), "exit 0");

        let streams = PactlMixer::with_program(program).active_streams().unwrap();
        assert!(streams.is_empty());
    }
}
