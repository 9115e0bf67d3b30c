//! Sample-domain helpers: resampling, channel remixing, PCM conversion, metering.
//!
//! Everything works on interleaved `f32` buffers with no platform dependencies.

/// Streaming linear-interpolation resampler for interleaved audio.
///
/// Keeps the fractional read position and the previous block's last frame
/// between calls, so a source delivering in small blocks at a rate other than
/// the target produces exactly `rate ratio` frames over time instead of losing
/// a fraction on every block. Output lags the input by at most one frame.
#[derive(Debug, Clone)]
pub struct Resampler {
    channels: usize,
    target_rate: f64,
    source_rate: f64,
    /// Next output position, in frames from the start of `carry`.
    position: f64,
    /// Last input frame of the previous block.
    carry: Vec<f32>,
}

impl Resampler {
    pub fn new(channels: u16, target_rate: f64) -> Self {
        Self {
            channels: usize::from(channels.max(1)),
            target_rate,
            source_rate: target_rate,
            position: 0.0,
            carry: Vec::new(),
        }
    }

    /// Convert one block. Matching rates pass the input through unchanged.
    pub fn process(&mut self, samples: &[f32], source_rate: f64) -> Vec<f32> {
        if (source_rate - self.source_rate).abs() >= 0.01 {
            self.reset(source_rate);
        }
        if (source_rate - self.target_rate).abs() < 0.01 || source_rate <= 0.0 || self.target_rate <= 0.0 {
            return samples.to_vec();
        }

        let channels = self.channels;
        let frames = samples.len() / channels;
        if frames == 0 {
            return Vec::new();
        }

        let mut input = Vec::with_capacity(self.carry.len() + frames * channels);
        input.extend_from_slice(&self.carry);
        input.extend_from_slice(&samples[..frames * channels]);
        let total = input.len() / channels;

        let step = source_rate / self.target_rate;
        let mut output = Vec::with_capacity(((frames as f64 / step) as usize + 2) * channels);
        while (self.position as usize) + 1 < total {
            let index = self.position as usize;
            let fraction = (self.position - index as f64) as f32;
            for ch in 0..channels {
                let current = input[index * channels + ch];
                let next = input[(index + 1) * channels + ch];
                output.push(current + (next - current) * fraction);
            }
            self.position += step;
        }

        // The last frame becomes frame 0 of the next block.
        self.position -= (total - 1) as f64;
        self.carry = input[(total - 1) * channels..].to_vec();
        output
    }

    fn reset(&mut self, source_rate: f64) {
        self.source_rate = source_rate;
        self.position = 0.0;
        self.carry.clear();
    }
}

/// Convert between channel layouts.
///
/// Mono is duplicated into every output channel; wider input is averaged
/// down to mono first when the layouts differ.
pub fn remix(samples: &[f32], from_channels: u16, to_channels: u16) -> Vec<f32> {
    let from = usize::from(from_channels.max(1));
    let to = usize::from(to_channels.max(1));
    if from == to {
        return samples.to_vec();
    }

    let mono: Vec<f32> = if from == 1 {
        samples.to_vec()
    } else {
        let scale = 1.0 / from as f32;
        samples.chunks_exact(from).map(|frame| frame.iter().sum::<f32>() * scale).collect()
    };

    if to == 1 {
        return mono;
    }
    let mut out = Vec::with_capacity(mono.len() * to);
    for sample in mono {
        out.extend(std::iter::repeat(sample).take(to));
    }
    out
}

/// Convert f32 samples `[-1.0, 1.0]` to 16-bit little-endian PCM, clamping out-of-range values.
pub fn to_pcm16_le(samples: &[f32]) -> Vec<u8> {
    let mut data = Vec::with_capacity(samples.len() * 2);
    for &sample in samples {
        let value = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
        data.extend_from_slice(&value.to_le_bytes());
    }
    data
}

/// Root-mean-square level.
pub fn rms_level(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f32 = samples.iter().map(|s| s * s).sum();
    (sum_sq / samples.len() as f32).sqrt()
}

pub fn peak_level(samples: &[f32]) -> f32 {
    samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn resampler_same_rate_is_passthrough() {
        let samples = vec![0.1, 0.2, 0.3, 0.4];
        assert_eq!(Resampler::new(2, 48000.0).process(&samples, 48000.0), samples);
    }

    #[test]
    fn resampler_interpolates_across_block_boundaries() {
        let mut resampler = Resampler::new(1, 48000.0);

        let first = resampler.process(&[0.0, 1.0], 24000.0);
        let second = resampler.process(&[2.0], 24000.0);

        assert_eq!(first.len(), 2);
        assert_relative_eq!(first[0], 0.0);
        assert_relative_eq!(first[1], 0.5);
        assert_eq!(second.len(), 2);
        assert_relative_eq!(second[0], 1.0);
        assert_relative_eq!(second[1], 1.5);
    }

    #[test]
    fn resampler_stereo_downsample_keeps_channels_apart() {
        let samples: Vec<f32> = (0..100).flat_map(|_| [0.25f32, -0.25]).collect();

        let out = Resampler::new(2, 24000.0).process(&samples, 48000.0);

        assert_eq!(out.len(), 100);
        for frame in out.chunks_exact(2) {
            assert_relative_eq!(frame[0], 0.25);
            assert_relative_eq!(frame[1], -0.25);
        }
    }

    #[test]
    fn small_blocks_do_not_drift() {
        let mut resampler = Resampler::new(1, 48000.0);
        let block = vec![0.5f32; 100];

        // One second of 44.1 kHz audio in blocks whose output is fractional.
        let produced: usize = (0..441).map(|_| resampler.process(&block, 44100.0).len()).sum();

        assert!((47_999..=48_000).contains(&produced), "produced {}", produced);
    }

    #[test]
    fn remix_mono_to_stereo_duplicates() {
        assert_eq!(remix(&[0.1, 0.2], 1, 2), vec![0.1, 0.1, 0.2, 0.2]);
    }

    #[test]
    fn remix_stereo_to_mono_averages() {
        let out = remix(&[0.2, 0.8, 0.4, 0.6], 2, 1);
        assert_relative_eq!(out[0], 0.5);
        assert_relative_eq!(out[1], 0.5);
    }

    #[test]
    fn pcm16_clamps_and_scales() {
        let pcm = to_pcm16_le(&[0.0, 1.0, -1.0, 2.0]);

        assert_eq!(pcm.len(), 8);
        assert_eq!(i16::from_le_bytes([pcm[0], pcm[1]]), 0);
        assert_eq!(i16::from_le_bytes([pcm[2], pcm[3]]), i16::MAX);
        assert_eq!(i16::from_le_bytes([pcm[4], pcm[5]]), -i16::MAX);
        assert_eq!(i16::from_le_bytes([pcm[6], pcm[7]]), i16::MAX);
    }

    #[test]
    fn levels() {
        assert_eq!(rms_level(&[]), 0.0);
        assert_relative_eq!(rms_level(&[1.0, -1.0, 1.0]), 1.0);
        assert_relative_eq!(peak_level(&[0.1, -0.5, 0.3]), 0.5);
    }
}
