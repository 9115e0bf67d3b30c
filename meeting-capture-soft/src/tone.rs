use std::f64::consts::TAU;

/// Phase-continuous sine generator producing interleaved blocks.
#[derive(Debug, Clone)]
pub struct SineTone {
    frequency: f64,
    amplitude: f32,
    sample_rate: f64,
    channels: u16,
    phase: f64,
}

impl SineTone {
    pub fn new(frequency: f64, amplitude: f32, sample_rate: f64, channels: u16) -> Self {
        Self {
            frequency,
            amplitude: amplitude.clamp(0.0, 1.0),
            sample_rate,
            channels: channels.max(1),
            phase: 0.0,
        }
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Next `frames` frames; every channel carries the same signal.
    pub fn next_block(&mut self, frames: usize) -> Vec<f32> {
        let step = TAU * self.frequency / self.sample_rate;
        let mut block = Vec::with_capacity(frames * usize::from(self.channels));
        for _ in 0..frames {
            let value = self.amplitude * self.phase.sin() as f32;
            block.extend(std::iter::repeat(value).take(usize::from(self.channels)));
            self.phase = (self.phase + step) % TAU;
        }
        block
    }
}
