use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, SampleRate, Stream, StreamConfig};
use log::{debug, error, info, warn};

use crate::audio::pcm::{self, SampleSpec};
use crate::audio::resampler::LinearResampler;
use crate::config::SinkSettings;
use crate::error::AudioError;

// Sleep while waiting for the device to make room
const WRITE_POLL: Duration = Duration::from_millis(5);

// A device that consumes nothing for this long is treated as failed
const STALL_TIMEOUT: Duration = Duration::from_secs(2);

/// A live connection to the audio output
///
/// Dropping the sink closes the connection.
pub trait AudioSink {
    /// Write S16LE PCM, blocking until the output has accepted all of it
    fn write(&mut self, pcm: &[u8]) -> Result<usize, AudioError>;

    /// Wait for buffered audio to play out
    fn drain(&mut self);
}

/// Opens output sinks on demand
pub trait SinkFactory: Send {
    fn open(&self, spec: &SampleSpec) -> Result<Box<dyn AudioSink>, AudioError>;
}

/// Bounded sample queue between a blocking writer and the device callback
#[derive(Debug)]
pub struct SampleQueue {
    samples: Mutex<VecDeque<f32>>,
    capacity: usize,
    failed: AtomicBool,
}

impl SampleQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity: capacity.max(1),
            failed: AtomicBool::new(false),
        }
    }

    pub fn len(&self) -> usize {
        self.samples.lock().map(|q| q.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn mark_failed(&self) {
        self.failed.store(true, Ordering::Relaxed);
    }

    pub fn is_failed(&self) -> bool {
        self.failed.load(Ordering::Relaxed)
    }

    /// Queue every sample, sleeping while the queue is full
    pub fn push_blocking(&self, mut input: &[f32], stall_timeout: Duration) -> Result<(), AudioError> {
        let mut last_progress = Instant::now();

        while !input.is_empty() {
            if self.is_failed() {
                return Err(AudioError::StreamError("output stream reported an error".to_string()));
            }

            let accepted = {
                let mut queue = self
                    .samples
                    .lock()
                    .map_err(|_| AudioError::StreamError("sample queue poisoned".to_string()))?;
                let room = self.capacity.saturating_sub(queue.len());
                let n = room.min(input.len());
                queue.extend(&input[..n]);
                n
            };

            if accepted > 0 {
                input = &input[accepted..];
                last_progress = Instant::now();
            } else if last_progress.elapsed() > stall_timeout {
                return Err(AudioError::StreamError("output device stopped consuming audio".to_string()));
            } else {
                thread::sleep(WRITE_POLL);
            }
        }

        Ok(())
    }

    /// Fill `out` from the queue, padding with silence; returns samples taken
    pub fn pop_into(&self, out: &mut [f32]) -> usize {
        let mut taken = 0;
        if let Ok(mut queue) = self.samples.lock() {
            for slot in out.iter_mut() {
                match queue.pop_front() {
                    Some(sample) => {
                        *slot = sample;
                        taken += 1;
                    }
                    None => break,
                }
            }
        }
        for slot in out[taken..].iter_mut() {
            *slot = 0.0;
        }
        taken
    }
}

/// Map interleaved stereo onto a device channel layout
pub fn remap_stereo(stereo: &[f32], device_channels: usize) -> Vec<f32> {
    match device_channels {
        2 => stereo.to_vec(),
        0 => Vec::new(),
        1 => stereo.chunks_exact(2).map(|f| (f[0] + f[1]) * 0.5).collect(),
        n => stereo
            .chunks_exact(2)
            .flat_map(|f| {
                let mut frame = vec![0.0; n];
                frame[0] = f[0];
                frame[1] = f[1];
                frame
            })
            .collect(),
    }
}

/// Sink factory for the system output through cpal
pub struct CpalSinkFactory {
    settings: SinkSettings,
}

impl CpalSinkFactory {
    pub fn new(settings: SinkSettings) -> Self {
        Self { settings }
    }

    /// Pick the hinted device, falling back to the default output
    fn select_device(&self, host: &cpal::Host) -> Result<Device, AudioError> {
        if let Some(hint) = &self.settings.device_name_hint {
            let devices = host
                .output_devices()
                .map_err(|e| AudioError::SinkUnavailable(format!("cannot enumerate devices: {}", e)))?;
            for device in devices {
                if device.name().map(|name| name == *hint).unwrap_or(false) {
                    return Ok(device);
                }
            }
            warn!("{}, using default output", AudioError::DeviceNotFound { device: hint.clone() });
        }

        host.default_output_device()
            .ok_or_else(|| AudioError::SinkUnavailable("no default output device".to_string()))
    }

    /// Prefer running the device at the wire format; otherwise take its default config
    fn choose_config(device: &Device, spec: &SampleSpec) -> Result<(StreamConfig, SampleFormat), AudioError> {
        let rate = SampleRate(spec.sample_rate);
        if let Ok(ranges) = device.supported_output_configs() {
            let native = ranges
                .filter(|r| r.channels() == spec.channels)
                .filter(|r| r.min_sample_rate() <= rate && rate <= r.max_sample_rate())
                .filter(|r| Self::is_supported_format(r.sample_format()))
                .max_by_key(|r| Self::format_rank(r.sample_format()));
            if let Some(range) = native {
                let supported = range.with_sample_rate(rate);
                return Ok((supported.config(), supported.sample_format()));
            }
        }

        let default = device
            .default_output_config()
            .map_err(|e| AudioError::SinkUnavailable(format!("no usable output config: {}", e)))?;
        if !Self::is_supported_format(default.sample_format()) {
            return Err(AudioError::SinkUnavailable(format!(
                "unsupported sample format {:?}",
                default.sample_format()
            )));
        }
        Ok((default.config(), default.sample_format()))
    }

    fn is_supported_format(format: SampleFormat) -> bool {
        matches!(format, SampleFormat::F32 | SampleFormat::I16 | SampleFormat::U16)
    }

    fn format_rank(format: SampleFormat) -> u8 {
        match format {
            SampleFormat::F32 => 3,
            SampleFormat::I16 => 2,
            _ => 1,
        }
    }

    fn build_stream<T>(
        device: &Device,
        config: &StreamConfig,
        queue: &Arc<SampleQueue>,
    ) -> Result<Stream, AudioError>
    where
        T: cpal::SizedSample + cpal::FromSample<f32> + Send + 'static,
    {
        let data_queue = Arc::clone(queue);
        let error_queue = Arc::clone(queue);
        let mut scratch: Vec<f32> = Vec::new();

        device
            .build_output_stream(
                config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    scratch.resize(data.len(), 0.0);
                    data_queue.pop_into(&mut scratch);
                    for (out, &sample) in data.iter_mut().zip(scratch.iter()) {
                        *out = T::from_sample(sample);
                    }
                },
                move |err| {
                    error!("Audio stream error: {}", err);
                    error_queue.mark_failed();
                },
                None,
            )
            .map_err(|e| AudioError::SinkUnavailable(format!("failed to build output stream: {}", e)))
    }
}

impl SinkFactory for CpalSinkFactory {
    fn open(&self, spec: &SampleSpec) -> Result<Box<dyn AudioSink>, AudioError> {
        let host = cpal::default_host();
        let device = self.select_device(&host)?;
        let device_name = device.name().unwrap_or_else(|_| "unknown".to_string());
        let (config, sample_format) = Self::choose_config(&device, spec)?;
        if config.sample_rate.0 == 0 {
            return Err(AudioError::UnsupportedSampleRate { rate: 0 });
        }

        let frames = (config.sample_rate.0 as f64 * self.settings.buffer.as_secs_f64()).ceil() as usize;
        let queue = Arc::new(SampleQueue::new(frames * config.channels as usize));

        let stream = match sample_format {
            SampleFormat::F32 => Self::build_stream::<f32>(&device, &config, &queue)?,
            SampleFormat::I16 => Self::build_stream::<i16>(&device, &config, &queue)?,
            SampleFormat::U16 => Self::build_stream::<u16>(&device, &config, &queue)?,
            other => {
                return Err(AudioError::SinkUnavailable(format!("unsupported sample format {:?}", other)));
            }
        };

        stream
            .play()
            .map_err(|e| AudioError::SinkUnavailable(format!("failed to start output stream: {}", e)))?;

        let resampler = LinearResampler::new(spec.sample_rate, config.sample_rate.0, config.channels as usize);
        if !resampler.is_passthrough() {
            debug!("Converting {} Hz to device rate {} Hz", spec.sample_rate, config.sample_rate.0);
        }

        info!(
            "Opened '{}' output on {} ({} Hz, {} channels, {:?})",
            self.settings.stream_role, device_name, config.sample_rate.0, config.channels, sample_format
        );

        Ok(Box::new(CpalSink {
            _stream: stream,
            queue,
            resampler,
            device_channels: config.channels as usize,
            buffer: self.settings.buffer,
        }))
    }
}

/// Output sink owning a running cpal stream
pub struct CpalSink {
    // Kept alive for as long as the sink is held
    _stream: Stream,
    queue: Arc<SampleQueue>,
    resampler: LinearResampler,
    device_channels: usize,
    buffer: Duration,
}

impl AudioSink for CpalSink {
    fn write(&mut self, pcm_bytes: &[u8]) -> Result<usize, AudioError> {
        let stereo = pcm::s16le_to_f32(pcm_bytes);
        let remapped = remap_stereo(&stereo, self.device_channels);
        let samples = self.resampler.process(&remapped);
        self.queue.push_blocking(&samples, STALL_TIMEOUT)?;
        Ok(pcm_bytes.len())
    }

    fn drain(&mut self) {
        let deadline = Instant::now() + self.buffer + Duration::from_millis(100);
        while !self.queue.is_empty() && !self.queue.is_failed() && Instant::now() < deadline {
            thread::sleep(WRITE_POLL);
        }
    }
}
