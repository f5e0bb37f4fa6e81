use std::io::{Read, Seek, SeekFrom};

use log::{debug, trace};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::audio::pcm::{self, SampleSpec};
use crate::audio::resampler::LinearResampler;
use crate::audio::source::{SeekOrigin, SeekableByteSource};
use crate::error::DecodeError;

// Corrupt packets are skipped, but this many in a row abort the track.
const MAX_CONSECUTIVE_DECODE_ERRORS: usize = 3;

/// A live decode session producing S16LE stereo 44.1 kHz PCM
///
/// Sessions stay on the thread that opened them.
pub trait DecodeSession {
    /// Fill `buf` with up to `buf.len()` bytes of PCM; `Ok(0)` means end of stream
    fn read_frame(&mut self, buf: &mut [u8]) -> Result<usize, DecodeError>;

    /// Release decoder state. Safe to call more than once.
    fn close(&mut self);
}

/// Opens decode sessions over byte sources
pub trait StreamDecoder: Send {
    fn open(&self, source: Box<dyn SeekableByteSource>) -> Result<Box<dyn DecodeSession>, DecodeError>;
}

/// `Read + Seek` view of a byte source, as symphonia expects
pub struct ByteSourceReader {
    source: Box<dyn SeekableByteSource>,
    len: u64,
}

impl ByteSourceReader {
    pub fn new(mut source: Box<dyn SeekableByteSource>) -> Self {
        let here = source.tell();
        let len = source.seek(0, SeekOrigin::End);
        source.seek(here as i64, SeekOrigin::Start);
        Self { source, len }
    }
}

impl Read for ByteSourceReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        Ok(self.source.read(buf))
    }
}

impl Seek for ByteSourceReader {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        let position = match pos {
            SeekFrom::Start(offset) => {
                self.source.seek(i64::try_from(offset).unwrap_or(i64::MAX), SeekOrigin::Start)
            }
            SeekFrom::Current(offset) => self.source.seek(offset, SeekOrigin::Current),
            SeekFrom::End(offset) => self.source.seek(offset, SeekOrigin::End),
        };
        Ok(position)
    }
}

impl MediaSource for ByteSourceReader {
    fn is_seekable(&self) -> bool {
        true
    }

    fn byte_len(&self) -> Option<u64> {
        Some(self.len)
    }
}

/// Decoder backed by symphonia's bundled container and codec readers
#[derive(Debug, Default, Clone)]
pub struct SymphoniaDecoder;

impl SymphoniaDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl StreamDecoder for SymphoniaDecoder {
    fn open(&self, source: Box<dyn SeekableByteSource>) -> Result<Box<dyn DecodeSession>, DecodeError> {
        let media_source = MediaSourceStream::new(
            Box::new(ByteSourceReader::new(source)),
            Default::default(),
        );

        let detected = symphonia::default::get_probe()
            .format(&Hint::new(), media_source, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| DecodeError::OpenFailed(format!("format detection failed: {}", e)))?;

        let format = detected.format;

        let track = format
            .default_track()
            .filter(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .or_else(|| format.tracks().iter().find(|t| t.codec_params.codec != CODEC_TYPE_NULL))
            .ok_or_else(|| DecodeError::UnsupportedFormat {
                format: "no decodable audio track".to_string(),
            })?;

        let track_id = track.id;
        let decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| DecodeError::UnsupportedFormat {
                format: format!("no decoder for track: {}", e),
            })?;

        debug!(
            "Opened decode session (track {}, {:?} Hz, {:?} channels)",
            track_id,
            track.codec_params.sample_rate,
            track.codec_params.channels.map(|c| c.count())
        );

        Ok(Box::new(SymphoniaSession {
            state: Some(SessionState {
                format,
                decoder,
                track_id,
                resampler: None,
                pending: Vec::new(),
                pending_offset: 0,
                finished: false,
            }),
        }))
    }
}

struct SessionState {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    resampler: Option<LinearResampler>,
    // Converted PCM not yet handed out
    pending: Vec<u8>,
    pending_offset: usize,
    finished: bool,
}

struct SymphoniaSession {
    state: Option<SessionState>,
}

impl SessionState {
    /// Decode packets until some PCM is pending or the stream ends
    fn refill(&mut self) -> Result<(), DecodeError> {
        let mut consecutive_errors = 0;

        while !self.finished && self.pending_offset >= self.pending.len() {
            self.pending.clear();
            self.pending_offset = 0;

            let packet = match self.format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(ref err))
                    if err.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    self.finished = true;
                    return Ok(());
                }
                Err(SymphoniaError::ResetRequired) => {
                    // Chained streams change parameters mid-file; treat as the end of this track.
                    self.finished = true;
                    return Ok(());
                }
                Err(err) => {
                    return Err(DecodeError::DecodeFailed(format!("failed to read packet: {}", err)));
                }
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            match self.decoder.decode(&packet) {
                Ok(decoded) => {
                    consecutive_errors = 0;
                    let spec = *decoded.spec();
                    if decoded.frames() == 0 {
                        continue;
                    }

                    let mut samples = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                    samples.copy_interleaved_ref(decoded);
                    let stereo = pcm::to_stereo(samples.samples(), spec.channels.count());
                    let converted = self.convert_rate(stereo, spec.rate);
                    pcm::f32_to_s16le(&converted, &mut self.pending);
                }
                Err(SymphoniaError::DecodeError(msg)) => {
                    consecutive_errors += 1;
                    trace!("Skipping corrupt packet: {}", msg);
                    if consecutive_errors >= MAX_CONSECUTIVE_DECODE_ERRORS {
                        return Err(DecodeError::DecodeFailed(format!(
                            "{} consecutive corrupt packets: {}",
                            consecutive_errors, msg
                        )));
                    }
                }
                Err(err) => {
                    return Err(DecodeError::DecodeFailed(format!("failed to decode packet: {}", err)));
                }
            }
        }

        Ok(())
    }

    fn convert_rate(&mut self, stereo: Vec<f32>, rate: u32) -> Vec<f32> {
        let target = SampleSpec::AMBIENT.sample_rate;
        if rate == target {
            return stereo;
        }

        let stale = self
            .resampler
            .as_ref()
            .map_or(true, |rs| rs.rates() != (rate, target));
        if stale {
            let channels = SampleSpec::AMBIENT.channels as usize;
            self.resampler = Some(LinearResampler::new(rate, target, channels));
        }

        match self.resampler.as_mut() {
            Some(rs) => rs.process(&stereo),
            None => stereo,
        }
    }
}

impl DecodeSession for SymphoniaSession {
    fn read_frame(&mut self, buf: &mut [u8]) -> Result<usize, DecodeError> {
        let state = match self.state.as_mut() {
            Some(state) => state,
            None => return Err(DecodeError::DecodeFailed("session is closed".to_string())),
        };

        if buf.is_empty() {
            return Ok(0);
        }

        state.refill()?;

        let available = state.pending.len() - state.pending_offset;
        let n = available.min(buf.len());
        buf[..n].copy_from_slice(&state.pending[state.pending_offset..state.pending_offset + n]);
        state.pending_offset += n;
        Ok(n)
    }

    fn close(&mut self) {
        if self.state.take().is_some() {
            trace!("Decode session closed");
        }
    }
}
