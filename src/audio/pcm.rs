//! The fixed PCM wire format between decoder and sink, and conversions into and out of it.

/// Sample layout of a PCM stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleSpec {
    pub sample_rate: u32,
    pub channels: u16,
}

impl SampleSpec {
    /// 16-bit little-endian, interleaved stereo at 44.1 kHz
    pub const AMBIENT: SampleSpec = SampleSpec {
        sample_rate: 44_100,
        channels: 2,
    };

    /// Bytes in one interleaved S16 frame
    pub fn frame_bytes(&self) -> usize {
        self.channels as usize * 2
    }

    /// Bytes needed to hold `duration` of audio
    pub fn bytes_for(&self, duration: std::time::Duration) -> usize {
        let frames = (duration.as_secs_f64() * self.sample_rate as f64).ceil() as usize;
        frames * self.frame_bytes()
    }
}

/// Decode S16LE bytes into normalised f32 samples; a trailing odd byte is ignored
pub fn s16le_to_f32(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / 32768.0)
        .collect()
}

/// Append f32 samples to `out` as S16LE, saturating out-of-range values
pub fn f32_to_s16le(samples: &[f32], out: &mut Vec<u8>) {
    out.reserve(samples.len() * 2);
    for &sample in samples {
        let value = (sample * 32768.0).round().clamp(i16::MIN as f32, i16::MAX as f32) as i16;
        out.extend_from_slice(&value.to_le_bytes());
    }
}

/// Remap interleaved audio with `channels` channels to interleaved stereo
///
/// Mono is duplicated into both channels and anything beyond two channels is dropped.
pub fn to_stereo(samples: &[f32], channels: usize) -> Vec<f32> {
    match channels {
        0 => Vec::new(),
        2 => samples.to_vec(),
        1 => samples.iter().flat_map(|&s| [s, s]).collect(),
        _ => samples
            .chunks_exact(channels)
            .flat_map(|frame| [frame[0], frame[1]])
            .collect(),
    }
}
