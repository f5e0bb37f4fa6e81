/*!
Streaming linear rate conversion for interleaved f32 audio.

Used on both sides of the fixed 44.1 kHz wire format: the decoder brings assets
recorded at other rates up or down to it, and the output sink converts it to the
device rate when the device cannot run at 44.1 kHz. State carries across
`process()` calls so chunk boundaries do not click.
*/

#[derive(Debug, Clone)]
pub struct LinearResampler {
    src_rate: u32,
    dst_rate: u32,
    channels: usize,
    // Source frames advanced per output frame
    step: f64,
    // Fractional read position, relative to `last_frame`
    phase: f64,
    last_frame: Option<Vec<f32>>,
}

impl LinearResampler {
    pub fn new(src_rate: u32, dst_rate: u32, channels: usize) -> Self {
        let step = if dst_rate == 0 { 0.0 } else { src_rate as f64 / dst_rate as f64 };
        Self {
            src_rate,
            dst_rate,
            channels,
            step,
            phase: 0.0,
            last_frame: None,
        }
    }

    /// True when input passes through unchanged
    pub fn is_passthrough(&self) -> bool {
        self.src_rate == self.dst_rate
    }

    pub fn rates(&self) -> (u32, u32) {
        (self.src_rate, self.dst_rate)
    }

    /// Convert one block of interleaved samples
    pub fn process(&mut self, input: &[f32]) -> Vec<f32> {
        let ch = self.channels;
        if ch == 0 || self.src_rate == 0 || self.dst_rate == 0 {
            return Vec::new();
        }
        if self.is_passthrough() {
            return input.to_vec();
        }

        let in_frames = input.len() / ch;
        if in_frames == 0 {
            return Vec::new();
        }

        // Frame 0 is the tail of the previous block (silence on the first call)
        let previous = self.last_frame.take().unwrap_or_else(|| vec![0.0; ch]);

        let available = in_frames + 1;
        let estimate = (in_frames as f64 / self.step).ceil() as usize + 2;
        let mut out = Vec::with_capacity(estimate * ch);

        while self.phase + 1.0 < available as f64 {
            let index = self.phase as usize;
            let frac = (self.phase - index as f64) as f32;
            let a = frame_at(&previous, input, index, ch);
            let b = frame_at(&previous, input, index + 1, ch);
            for c in 0..ch {
                out.push(a[c] + (b[c] - a[c]) * frac);
            }
            self.phase += self.step;
        }

        self.phase = (self.phase - in_frames as f64).max(0.0);
        self.last_frame = Some(input[(in_frames - 1) * ch..in_frames * ch].to_vec());

        out
    }
}

fn frame_at<'a>(previous: &'a [f32], input: &'a [f32], index: usize, ch: usize) -> &'a [f32] {
    if index == 0 {
        previous
    } else {
        &input[(index - 1) * ch..index * ch]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, rate: u32, frames: usize, ch: usize) -> Vec<f32> {
        (0..frames)
            .flat_map(|n| {
                let s = (2.0 * std::f32::consts::PI * freq * n as f32 / rate as f32).sin();
                std::iter::repeat(s).take(ch)
            })
            .collect()
    }

    #[test]
    fn test_passthrough() {
        let mut rs = LinearResampler::new(44_100, 44_100, 2);
        let input = sine(440.0, 44_100, 100, 2);
        assert!(rs.is_passthrough());
        assert_eq!(rs.process(&input), input);
    }

    #[test]
    fn test_output_length_44k1_to_48k() {
        let mut rs = LinearResampler::new(44_100, 48_000, 2);
        let input = sine(1000.0, 44_100, 4410, 2);
        let out_frames = rs.process(&input).len() / 2;

        let expected = 4800isize;
        assert!((out_frames as isize - expected).abs() <= 2, "got {}", out_frames);
    }

    #[test]
    fn test_streaming_matches_one_shot() {
        let input = sine(440.0, 48_000, 10_000, 2);

        let mut one = LinearResampler::new(48_000, 44_100, 2);
        let whole = one.process(&input);

        let mut two = LinearResampler::new(48_000, 44_100, 2);
        let mut streamed = Vec::new();
        for chunk in input.chunks(777 * 2) {
            streamed.extend(two.process(chunk));
        }

        assert!((whole.len() as isize - streamed.len() as isize).abs() <= 4);
        let common = whole.len().min(streamed.len());
        for k in (0..common).step_by(97) {
            assert!((whole[k] - streamed[k]).abs() < 1e-4, "mismatch at {}", k);
        }
    }
}
