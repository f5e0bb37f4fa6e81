use std::time::Duration;

use log::{debug, info};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use crate::config::MonitorSettings;
use crate::coordination::Coordination;
use crate::monitor::ActivityMonitor;

/// Requests an immediate activity check, e.g. from a global shortcut
#[derive(Debug, Clone)]
pub struct WakeHandle(mpsc::UnboundedSender<()>);

impl WakeHandle {
    pub(crate) fn new(sender: mpsc::UnboundedSender<()>) -> Self {
        Self(sender)
    }

    /// Returns false once the host loop has gone away
    pub fn wake(&self) -> bool {
        self.0.send(()).is_ok()
    }
}

/// Cooperative host loop driving the activity monitor
pub struct HostLoop {
    monitor: ActivityMonitor,
    coordination: Coordination,
    interval: Duration,
    wake_tx: mpsc::UnboundedSender<()>,
    wake_rx: mpsc::UnboundedReceiver<()>,
}

impl HostLoop {
    pub fn new(monitor: ActivityMonitor, coordination: Coordination, settings: &MonitorSettings) -> Self {
        let (wake_tx, wake_rx) = mpsc::unbounded_channel();
        Self {
            monitor,
            coordination,
            interval: settings.interval,
            wake_tx,
            wake_rx,
        }
    }

    pub fn wake_handle(&self) -> WakeHandle {
        WakeHandle::new(self.wake_tx.clone())
    }

    /// Run one activity check right away
    ///
    /// Called before playback starts so the engine never opens the output over
    /// audio that was already playing.
    pub fn check_now(&mut self) -> bool {
        self.monitor.check_cycle().interference
    }

    /// Run monitor cycles on every tick or wake until the run flag drops
    ///
    /// Returns the number of cycles performed.
    pub async fn run(mut self) -> usize {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut cycles = 0;

        info!("Activity monitor polling every {:?}", self.interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                Some(()) = self.wake_rx.recv() => debug!("Activity check requested"),
            }

            if !self.coordination.is_running() {
                break;
            }
            self.monitor.check_cycle();
            cycles += 1;
        }

        info!("Host loop exiting after {} activity checks", cycles);
        cycles
    }
}
