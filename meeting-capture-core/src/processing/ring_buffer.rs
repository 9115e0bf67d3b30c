/// Circular buffer of interleaved audio frames.
///
/// Holds whole frames only: overflow drops the oldest frames, never a partial
/// frame, so channel alignment survives. Wrap in `parking_lot::Mutex` for
/// cross-thread access.
#[derive(Debug)]
pub struct FrameBuffer {
    samples: Vec<f32>,
    channels: usize,
    capacity_frames: usize,
    read_frame: usize,
    write_frame: usize,
    available_frames: usize,
}

impl FrameBuffer {
    pub fn new(capacity_frames: usize, channels: u16) -> Self {
        let channels = usize::from(channels.max(1));
        let capacity_frames = capacity_frames.max(1);
        Self {
            samples: vec![0.0; capacity_frames * channels],
            channels,
            capacity_frames,
            read_frame: 0,
            write_frame: 0,
            available_frames: 0,
        }
    }

    /// Append interleaved samples. A trailing partial frame is ignored.
    pub fn write(&mut self, interleaved: &[f32]) {
        let mut frames = interleaved.len() / self.channels;
        if frames == 0 {
            return;
        }

        let mut input = interleaved;
        if frames > self.capacity_frames {
            let skip = frames - self.capacity_frames;
            input = &interleaved[skip * self.channels..];
            frames = self.capacity_frames;
        }

        let overflow = (self.available_frames + frames).saturating_sub(self.capacity_frames);
        if overflow > 0 {
            self.read_frame = (self.read_frame + overflow) % self.capacity_frames;
            self.available_frames -= overflow;
        }

        for frame in input.chunks_exact(self.channels).take(frames) {
            let start = self.write_frame * self.channels;
            self.samples[start..start + self.channels].copy_from_slice(frame);
            self.write_frame = (self.write_frame + 1) % self.capacity_frames;
        }
        self.available_frames += frames;
    }

    /// Remove up to `frames` frames. Returns fewer when fewer are buffered.
    pub fn read(&mut self, frames: usize) -> Vec<f32> {
        let frames = frames.min(self.available_frames);
        let mut out = Vec::with_capacity(frames * self.channels);
        for i in 0..frames {
            let start = ((self.read_frame + i) % self.capacity_frames) * self.channels;
            out.extend_from_slice(&self.samples[start..start + self.channels]);
        }
        self.read_frame = (self.read_frame + frames) % self.capacity_frames;
        self.available_frames -= frames;
        out
    }

    /// Remove exactly `frames` frames, padding with silence when the buffer runs short.
    pub fn read_padded(&mut self, frames: usize) -> Vec<f32> {
        let mut out = self.read(frames);
        out.resize(frames * self.channels, 0.0);
        out
    }

    pub fn available_frames(&self) -> usize {
        self.available_frames
    }

    pub fn is_empty(&self) -> bool {
        self.available_frames == 0
    }

    pub fn channels(&self) -> u16 {
        self.channels as u16
    }

    pub fn capacity_frames(&self) -> usize {
        self.capacity_frames
    }

    pub fn clear(&mut self) {
        self.read_frame = 0;
        self.write_frame = 0;
        self.available_frames = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stereo_write_read() {
        let mut buf = FrameBuffer::new(8, 2);
        buf.write(&[1.0, 2.0, 3.0, 4.0]);

        assert_eq!(buf.available_frames(), 2);
        assert_eq!(buf.read(1), vec![1.0, 2.0]);
        assert_eq!(buf.read(5), vec![3.0, 4.0]);
        assert!(buf.is_empty());
    }

    #[test]
    fn partial_frame_is_ignored() {
        let mut buf = FrameBuffer::new(8, 2);
        buf.write(&[1.0, 2.0, 3.0]);

        assert_eq!(buf.available_frames(), 1);
        assert_eq!(buf.read(1), vec![1.0, 2.0]);
    }

    #[test]
    fn overflow_drops_oldest_whole_frames() {
        let mut buf = FrameBuffer::new(2, 2);
        buf.write(&[1.0, 1.5, 2.0, 2.5]);
        buf.write(&[3.0, 3.5]);

        assert_eq!(buf.available_frames(), 2);
        assert_eq!(buf.read(2), vec![2.0, 2.5, 3.0, 3.5]);
    }

    #[test]
    fn write_larger_than_capacity_keeps_tail() {
        let mut buf = FrameBuffer::new(3, 1);
        buf.write(&[1.0, 2.0, 3.0, 4.0, 5.0]);

        assert_eq!(buf.read(3), vec![3.0, 4.0, 5.0]);
    }

    #[test]
    fn wraparound_preserves_order() {
        let mut buf = FrameBuffer::new(4, 1);
        buf.write(&[1.0, 2.0, 3.0]);
        buf.read(2);
        buf.write(&[4.0, 5.0, 6.0]);

        assert_eq!(buf.read(4), vec![3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn read_padded_fills_with_silence() {
        let mut buf = FrameBuffer::new(4, 2);
        buf.write(&[0.5, 0.5]);

        assert_eq!(buf.read_padded(3), vec![0.5, 0.5, 0.0, 0.0, 0.0, 0.0]);
        assert!(buf.is_empty());
    }

    #[test]
    fn clear_empties_buffer() {
        let mut buf = FrameBuffer::new(4, 1);
        buf.write(&[1.0, 2.0]);
        buf.clear();

        assert!(buf.is_empty());
        assert!(buf.read(2).is_empty());
    }
}
