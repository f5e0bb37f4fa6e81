/*!
Periodic "is anyone else audible" check.

Each cycle asks the window collaborator which processes own visible windows and
the mixer collaborator which output streams are live, then publishes the verdict
into the suppress flag. Any query failure publishes "no interference" so a
broken desktop integration never silences the ambient track.
*/

pub mod kwin;
pub mod pactl;
pub mod session;

use std::collections::HashSet;

use log::debug;

use crate::config::MonitorSettings;
use crate::coordination::Coordination;
use crate::error::MonitorError;
use crate::logging::AudioLogger;

pub use kwin::{KWinWindowEnumerator, MediaShortcutListener};
pub use pactl::PactlMixer;

pub type ProcessId = u32;

/// One active output stream as reported by the mixer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputStreamInfo {
    pub application_name: Option<String>,
    pub process_id: Option<ProcessId>,
    /// Unmuted, playing, and at nonzero volume
    pub audible: bool,
}

/// Lists processes that currently own an open window
pub trait WindowEnumerator: Send {
    fn list_foreground_process_ids(&self) -> Result<HashSet<ProcessId>, MonitorError>;
}

/// Lists the sound server's active output streams
pub trait AudioMixer: Send {
    fn active_streams(&self) -> Result<Vec<OutputStreamInfo>, MonitorError>;
}

/// Window enumerator for sessions without compositor integration
#[derive(Debug, Clone, Copy, Default)]
pub struct NoWindowEnumerator;

impl WindowEnumerator for NoWindowEnumerator {
    fn list_foreground_process_ids(&self) -> Result<HashSet<ProcessId>, MonitorError> {
        Ok(HashSet::new())
    }
}

/// Outcome of one monitor cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivityReport {
    pub interference: bool,
    /// Interfering applications that also own a window, for reporting only
    pub foreground_apps: Vec<String>,
}

/// Decide whether any stream other than our own is audible
pub fn assess_streams(
    streams: &[OutputStreamInfo],
    foreground: &HashSet<ProcessId>,
    own_name: &str,
    own_pid: ProcessId,
) -> ActivityReport {
    let mut report = ActivityReport::default();

    for stream in streams.iter().filter(|s| s.audible) {
        // Unnamed streams cannot be told apart from our own and are not counted
        let Some(name) = stream.application_name.as_deref() else {
            continue;
        };
        if name == own_name || stream.process_id == Some(own_pid) {
            continue;
        }

        report.interference = true;
        let in_foreground = stream.process_id.is_some_and(|pid| foreground.contains(&pid));
        if in_foreground && !report.foreground_apps.iter().any(|app| app == name) {
            report.foreground_apps.push(name.to_string());
        }
    }

    report
}

/// Drives the two collaborators and writes the suppress flag
pub struct ActivityMonitor {
    windows: Box<dyn WindowEnumerator>,
    mixer: Box<dyn AudioMixer>,
    own_name: String,
    own_pid: ProcessId,
    coordination: Coordination,
    logger: AudioLogger,
    interference: bool,
    failing: bool,
}

impl ActivityMonitor {
    pub fn new(
        windows: Box<dyn WindowEnumerator>,
        mixer: Box<dyn AudioMixer>,
        settings: &MonitorSettings,
        coordination: Coordination,
        logger: AudioLogger,
    ) -> Self {
        Self {
            windows,
            mixer,
            own_name: settings.own_application_name.clone(),
            own_pid: std::process::id(),
            coordination,
            logger,
            interference: false,
            failing: false,
        }
    }

    pub fn with_own_pid(mut self, pid: ProcessId) -> Self {
        self.own_pid = pid;
        self
    }

    /// Run one query and publish the result
    pub fn check_cycle(&mut self) -> ActivityReport {
        let report = match self.query() {
            Ok(report) => {
                self.failing = false;
                report
            }
            Err(err) => {
                // Journal the first failure of a run, not every cycle of it
                if !self.failing {
                    self.logger.log_monitor_failure(&err.to_string());
                    self.failing = true;
                } else {
                    debug!("Activity query still failing: {}", err);
                }
                ActivityReport::default()
            }
        };

        self.coordination.set_suppressed(report.interference);

        if report.interference != self.interference {
            self.interference = report.interference;
            self.logger
                .log_interference_changed(report.interference, &report.foreground_apps);
        }
        debug!(
            "Activity cycle: interference={} foreground={:?}",
            report.interference, report.foreground_apps
        );

        report
    }

    fn query(&self) -> Result<ActivityReport, MonitorError> {
        let foreground = self.windows.list_foreground_process_ids()?;
        let streams = self.mixer.active_streams()?;
        Ok(assess_streams(&streams, &foreground, &self.own_name, self.own_pid))
    }
}
