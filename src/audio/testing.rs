//! In-crate fakes for exercising the playback engine without audio hardware or codecs.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crate::audio::decoder::{DecodeSession, StreamDecoder};
use crate::audio::pcm::SampleSpec;
use crate::audio::sink::{AudioSink, SinkFactory};
use crate::audio::source::SeekableByteSource;
use crate::error::{AudioError, DecodeError};

/// What the decoder saw when a session was opened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenRecord {
    pub size: u64,
    pub start_position: u64,
}

/// Decoder whose PCM frames are the asset bytes themselves
///
/// The asset cursor therefore always equals the number of PCM bytes handed out.
#[derive(Debug, Clone, Default)]
pub struct RawPcmDecoder {
    pub opens: Arc<Mutex<Vec<OpenRecord>>>,
    /// Assets of these sizes fail to open
    pub reject_sizes: HashSet<u64>,
    /// Reads at or past this cursor fail
    pub fail_at: Option<u64>,
}

impl RawPcmDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rejecting(mut self, size: u64) -> Self {
        self.reject_sizes.insert(size);
        self
    }

    pub fn failing_at(mut self, position: u64) -> Self {
        self.fail_at = Some(position);
        self
    }

    pub fn open_records(&self) -> Vec<OpenRecord> {
        self.opens.lock().unwrap().clone()
    }

    pub fn open_count(&self) -> usize {
        self.opens.lock().unwrap().len()
    }
}

impl StreamDecoder for RawPcmDecoder {
    fn open(&self, mut source: Box<dyn SeekableByteSource>) -> Result<Box<dyn DecodeSession>, DecodeError> {
        let start_position = source.tell();
        let size = source.seek(0, crate::audio::source::SeekOrigin::End);
        source.seek(start_position as i64, crate::audio::source::SeekOrigin::Start);

        self.opens.lock().unwrap().push(OpenRecord { size, start_position });

        if self.reject_sizes.contains(&size) {
            return Err(DecodeError::OpenFailed("not a raw pcm asset".to_string()));
        }
        Ok(Box::new(RawPcmSession {
            source: Some(source),
            fail_at: self.fail_at,
        }))
    }
}

struct RawPcmSession {
    source: Option<Box<dyn SeekableByteSource>>,
    fail_at: Option<u64>,
}

impl DecodeSession for RawPcmSession {
    fn read_frame(&mut self, buf: &mut [u8]) -> Result<usize, DecodeError> {
        let source = self
            .source
            .as_mut()
            .ok_or_else(|| DecodeError::DecodeFailed("session closed".to_string()))?;
        if let Some(limit) = self.fail_at {
            if source.tell() >= limit {
                return Err(DecodeError::DecodeFailed("corrupt frame".to_string()));
            }
        }
        Ok(source.read(buf))
    }

    fn close(&mut self) {
        self.source = None;
    }
}

/// Sink factory that records everything written through its sinks
#[derive(Debug, Clone, Default)]
pub struct RecordingSinkFactory {
    pub written: Arc<Mutex<Vec<u8>>>,
    pub opened: Arc<AtomicUsize>,
    pub released: Arc<AtomicUsize>,
    pub drained: Arc<AtomicUsize>,
    /// Remaining opens that fail before the device becomes available
    pub failing_opens: Arc<AtomicUsize>,
    /// Simulated device time per write
    pub write_delay: Duration,
}

impl RecordingSinkFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_write_delay(mut self, delay: Duration) -> Self {
        self.write_delay = delay;
        self
    }

    pub fn failing_first(self, opens: usize) -> Self {
        self.failing_opens.store(opens, Ordering::SeqCst);
        self
    }

    pub fn written_len(&self) -> usize {
        self.written.lock().unwrap().len()
    }

    pub fn written(&self) -> Vec<u8> {
        self.written.lock().unwrap().clone()
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    pub fn drained(&self) -> usize {
        self.drained.load(Ordering::SeqCst)
    }
}

impl SinkFactory for RecordingSinkFactory {
    fn open(&self, spec: &SampleSpec) -> Result<Box<dyn AudioSink>, AudioError> {
        assert_eq!(*spec, SampleSpec::AMBIENT);

        let remaining = self.failing_opens.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failing_opens.store(remaining - 1, Ordering::SeqCst);
            return Err(AudioError::SinkUnavailable("device busy".to_string()));
        }

        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(RecordingSink {
            written: Arc::clone(&self.written),
            released: Arc::clone(&self.released),
            drained: Arc::clone(&self.drained),
            write_delay: self.write_delay,
        }))
    }
}

struct RecordingSink {
    written: Arc<Mutex<Vec<u8>>>,
    released: Arc<AtomicUsize>,
    drained: Arc<AtomicUsize>,
    write_delay: Duration,
}

impl AudioSink for RecordingSink {
    fn write(&mut self, pcm: &[u8]) -> Result<usize, AudioError> {
        if !self.write_delay.is_zero() {
            thread::sleep(self.write_delay);
        }
        self.written.lock().unwrap().extend_from_slice(pcm);
        Ok(pcm.len())
    }

    fn drain(&mut self) {
        self.drained.fetch_add(1, Ordering::SeqCst);
    }
}

impl Drop for RecordingSink {
    fn drop(&mut self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

/// Bytes with no short period, so misplaced or repeated chunks are detectable
pub fn patterned_bytes(len: usize) -> Vec<u8> {
    (0..len).map(|i| ((i * 31) ^ (i >> 8)) as u8).collect()
}

/// Poll `condition` until it holds or `timeout` passes
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    condition()
}
