use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use rand::Rng;

use crate::audio::decoder::{DecodeSession, StreamDecoder};
use crate::audio::pcm::SampleSpec;
use crate::audio::sink::{AudioSink, SinkFactory};
use crate::audio::store::TrackStore;
use crate::config::EngineTimings;
use crate::coordination::Coordination;
use crate::logging::AudioLogger;

/// Playback state of the engine thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Stopped,
    Opening,
    Playing,
    Paused,
    TrackEnded,
    Erroring,
}

impl PlaybackState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlaybackState::Stopped => "Stopped",
            PlaybackState::Opening => "Opening",
            PlaybackState::Playing => "Playing",
            PlaybackState::Paused => "Paused",
            PlaybackState::TrackEnded => "TrackEnded",
            PlaybackState::Erroring => "Erroring",
        }
    }
}

/// How one track attempt finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TrackOutcome {
    Ended,
    OpenFailed,
    Faulted,
    Shutdown,
}

/// Counters shared with the engine handle
#[derive(Debug, Default)]
pub struct EngineStats {
    track_attempts: AtomicUsize,
    idle_checks: AtomicUsize,
}

impl EngineStats {
    /// Tracks the engine tried to open
    pub fn track_attempts(&self) -> usize {
        self.track_attempts.load(Ordering::Relaxed)
    }

    /// Times the engine found the catalog empty
    pub fn idle_checks(&self) -> usize {
        self.idle_checks.load(Ordering::Relaxed)
    }
}

/// Plays the catalog on a dedicated thread, yielding the device while other audio is active
pub struct PlaybackEngine {
    store: Arc<TrackStore>,
    decoder: Box<dyn StreamDecoder>,
    sinks: Box<dyn SinkFactory>,
    coordination: Coordination,
    timings: EngineTimings,
    logger: AudioLogger,
    stats: Arc<EngineStats>,
    state: PlaybackState,
    track: usize,
}

impl PlaybackEngine {
    pub fn new(
        store: Arc<TrackStore>,
        decoder: Box<dyn StreamDecoder>,
        sinks: Box<dyn SinkFactory>,
        coordination: Coordination,
        timings: EngineTimings,
        logger: AudioLogger,
    ) -> Self {
        Self {
            store,
            decoder,
            sinks,
            coordination,
            timings,
            logger,
            stats: Arc::new(EngineStats::default()),
            state: PlaybackState::Stopped,
            track: 0,
        }
    }

    pub fn stats(&self) -> Arc<EngineStats> {
        Arc::clone(&self.stats)
    }

    /// Start the engine on its own thread
    pub fn spawn(self) -> io::Result<EngineHandle> {
        let stats = Arc::clone(&self.stats);
        let thread = thread::Builder::new()
            .name("ambient-playback".to_string())
            .spawn(move || self.run())?;
        Ok(EngineHandle { thread, stats })
    }

    /// Track selection loop; returns once the run flag drops
    pub fn run(mut self) {
        info!("Playback engine started with {} tracks", self.store.len());
        let mut reported_empty = false;

        while self.coordination.is_running() {
            if self.store.is_empty() {
                self.stats.idle_checks.fetch_add(1, Ordering::Relaxed);
                if !reported_empty {
                    self.logger.log_catalog_empty();
                    reported_empty = true;
                }
                self.sleep_while_running(self.timings.idle_backoff);
                continue;
            }

            if self.track >= self.store.len() {
                warn!("Track index {} out of range, clamping", self.track);
                self.track = self.store.len() - 1;
            }

            let outcome = self.play_track(self.track);
            match outcome {
                TrackOutcome::Shutdown => break,
                TrackOutcome::Ended => {
                    self.logger.log_track_ended(self.track);
                    self.transition(PlaybackState::TrackEnded);
                }
                TrackOutcome::OpenFailed => self.transition(PlaybackState::Stopped),
                TrackOutcome::Faulted => self.transition(PlaybackState::Erroring),
            }

            self.track = self.next_track();
            self.sleep_while_running(self.timings.retry_delay);
        }

        self.transition(PlaybackState::Stopped);
        info!("Playback engine stopped");
    }

    fn play_track(&mut self, index: usize) -> TrackOutcome {
        self.transition(PlaybackState::Opening);
        self.stats.track_attempts.fetch_add(1, Ordering::Relaxed);

        // A decode session is stateful over its source and must start from the top
        self.store.rewind(index);
        let source = match self.store.source(index) {
            Some(source) => source,
            None => return TrackOutcome::OpenFailed,
        };

        let mut session = match self.decoder.open(Box::new(source)) {
            Ok(session) => session,
            Err(err) => {
                self.logger.log_decode_error(index, &err);
                return TrackOutcome::OpenFailed;
            }
        };
        self.logger.log_track_opened(index, self.store.len());

        let outcome = self.play_session(index, session.as_mut());
        session.close();
        outcome
    }

    /// Decode/write loop for one open session
    fn play_session(&mut self, index: usize, session: &mut dyn DecodeSession) -> TrackOutcome {
        let mut sink: Option<Box<dyn AudioSink>> = None;
        let mut frame = vec![0u8; self.timings.frame_bytes];
        let mut paused = false;

        loop {
            if !self.coordination.is_running() {
                // Let queued audio play out before the output closes
                if let Some(output) = sink.as_mut() {
                    output.drain();
                }
                return TrackOutcome::Shutdown;
            }

            if self.coordination.is_suppressed() {
                // Free the device for whoever is playing
                if sink.take().is_some() {
                    debug!("Released audio output");
                }
                if !paused {
                    paused = true;
                    self.logger.log_playback_paused(index);
                    self.transition(PlaybackState::Paused);
                }
                thread::sleep(self.timings.poll_interval);
                continue;
            }

            if paused {
                paused = false;
                self.logger.log_playback_resumed(index);
            }

            if sink.is_none() {
                match self.sinks.open(&SampleSpec::AMBIENT) {
                    Ok(opened) => {
                        sink = Some(opened);
                        self.transition(PlaybackState::Playing);
                    }
                    Err(err) => {
                        self.logger.log_sink_unavailable(index, &err.to_string());
                        return TrackOutcome::Faulted;
                    }
                }
            }
            let Some(output) = sink.as_mut() else {
                return TrackOutcome::Faulted;
            };

            let read = match session.read_frame(&mut frame) {
                Ok(0) => {
                    output.drain();
                    return TrackOutcome::Ended;
                }
                Ok(read) => read,
                Err(err) => {
                    self.logger.log_decode_error(index, &err);
                    return TrackOutcome::Faulted;
                }
            };

            if let Err(err) = output.write(&frame[..read]) {
                self.logger.log_stream_error(index, &err.to_string());
                return TrackOutcome::Faulted;
            }
        }
    }

    /// Reselection policy: uniform random with repeats, or the only track
    fn next_track(&self) -> usize {
        match self.store.len() {
            0 | 1 => 0,
            count => rand::rng().random_range(0..count),
        }
    }

    fn transition(&mut self, to: PlaybackState) {
        if self.state != to {
            let track = (!self.store.is_empty()).then_some(self.track);
            self.logger.log_state_change(track, self.state.as_str(), to.as_str());
            self.state = to;
        }
    }

    // Sleeps in poll-sized slices so shutdown is seen promptly
    fn sleep_while_running(&self, duration: Duration) {
        let deadline = Instant::now() + duration;
        let slice = self.timings.poll_interval.max(Duration::from_millis(1));
        while self.coordination.is_running() {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            thread::sleep(slice.min(deadline - now));
        }
    }
}

/// Handle to a spawned engine thread
pub struct EngineHandle {
    thread: thread::JoinHandle<()>,
    stats: Arc<EngineStats>,
}

impl EngineHandle {
    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    pub fn stats(&self) -> Arc<EngineStats> {
        Arc::clone(&self.stats)
    }

    /// Wait for the engine thread to exit
    pub fn join(self) -> thread::Result<()> {
        self.thread.join()
    }
}
