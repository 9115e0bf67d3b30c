use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use meeting_capture_core::models::error::CaptureError;
use meeting_capture_core::models::media::{MediaStream, MediaTrack, SinkId};
use meeting_capture_core::processing::sample_format::{self, Resampler};
use meeting_capture_core::traits::recorder::{EncodedSlice, RecorderCapability, SliceCallback};

use crate::wav::{self, WavSpec};

pub const WAV_MIME_TYPE: &str = "audio/wav";

struct RecorderState {
    running: bool,
    spec: WavSpec,
    frames_per_slice: usize,
    header_sent: bool,
    resampler: Resampler,
    /// Interleaved samples at `spec`, not yet emitted.
    pending: Vec<f32>,
    on_slice: Option<SliceCallback>,
    slices_emitted: usize,
    frames_encoded: u64,
}

impl RecorderState {
    fn encode(&mut self, samples: &[f32]) -> EncodedSlice {
        let mut data = Vec::with_capacity(wav::WAV_HEADER_SIZE + samples.len() * 2);
        if !self.header_sent {
            data.extend_from_slice(&wav::header(self.spec, None));
            self.header_sent = true;
        }
        data.extend(sample_format::to_pcm16_le(samples));
        self.slices_emitted += 1;
        self.frames_encoded += (samples.len() / usize::from(self.spec.channels)) as u64;
        EncodedSlice {
            data,
            mime_type: WAV_MIME_TYPE.into(),
        }
    }

    /// Emit every full slice. Runs under the state lock so slices keep their order.
    fn push(&mut self, samples: &[f32], sample_rate: f64, channels: u16) {
        let remixed = sample_format::remix(samples, channels, self.spec.channels);
        let converted = self.resampler.process(&remixed, sample_rate);
        self.pending.extend_from_slice(&converted);

        let slice_len = self.frames_per_slice * usize::from(self.spec.channels);
        while self.pending.len() >= slice_len {
            let rest = self.pending.split_off(slice_len);
            let full = std::mem::replace(&mut self.pending, rest);
            let slice = self.encode(&full);
            if let Some(on_slice) = &self.on_slice {
                on_slice(slice);
            }
        }
    }
}

/// Recorder that encodes a stream's audio as streaming 16-bit PCM WAV.
///
/// Slices cover a fixed span of audio time (the requested timeslice); the
/// first slice begins with the WAV header, and `stop` flushes the remainder.
/// A recording that received no audio still yields a header-only slice.
pub struct PcmRecorder {
    state: Arc<Mutex<RecorderState>>,
    binding: Option<(MediaTrack, SinkId)>,
    refuse_start: Option<String>,
}

impl PcmRecorder {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            state: Arc::new(Mutex::new(RecorderState {
                running: false,
                spec: WavSpec {
                    sample_rate,
                    channels: channels.max(1),
                },
                frames_per_slice: 0,
                header_sent: false,
                resampler: Resampler::new(channels.max(1), f64::from(sample_rate)),
                pending: Vec::new(),
                on_slice: None,
                slices_emitted: 0,
                frames_encoded: 0,
            })),
            binding: None,
            refuse_start: None,
        }
    }

    /// A recorder whose `start` always fails with `reason`.
    pub fn refusing(sample_rate: u32, channels: u16, reason: impl Into<String>) -> Self {
        Self {
            refuse_start: Some(reason.into()),
            ..Self::new(sample_rate, channels)
        }
    }

    pub fn spec(&self) -> WavSpec {
        self.state.lock().spec
    }

    pub fn slices_emitted(&self) -> usize {
        self.state.lock().slices_emitted
    }

    pub fn frames_encoded(&self) -> u64 {
        self.state.lock().frames_encoded
    }
}

impl RecorderCapability for PcmRecorder {
    fn start(&mut self, stream: &MediaStream, timeslice: Duration, on_slice: SliceCallback) -> Result<(), CaptureError> {
        if let Some(reason) = &self.refuse_start {
            return Err(CaptureError::RecorderFailed(reason.clone()));
        }
        if self.binding.is_some() {
            return Err(CaptureError::RecorderFailed("recorder already running".into()));
        }
        let track = stream
            .first_live_audio_track()
            .ok_or_else(|| CaptureError::RecorderFailed("stream has no live audio track".into()))?
            .clone();

        {
            let mut state = self.state.lock();
            let timeslice_ms = (timeslice.as_millis() as u64).max(1);
            state.frames_per_slice = state.spec.frames_for_ms(timeslice_ms).max(1);
            state.running = true;
            state.header_sent = false;
            state.resampler = Resampler::new(state.spec.channels, f64::from(state.spec.sample_rate));
            state.pending.clear();
            state.on_slice = Some(on_slice);
            state.slices_emitted = 0;
            state.frames_encoded = 0;
        }

        let weak = Arc::downgrade(&self.state);
        let sink = track.connect(Arc::new(move |samples: &[f32], sample_rate: f64, channels: u16| {
            if let Some(state) = weak.upgrade() {
                let mut state = state.lock();
                if state.running {
                    state.push(samples, sample_rate, channels);
                }
            }
        }));
        let spec = self.spec();
        log::info!(
            "PCM recorder started on {:?} ({} Hz, {} ch, {} ms slices)",
            track.label(),
            spec.sample_rate,
            spec.channels,
            timeslice.as_millis()
        );
        self.binding = Some((track, sink));
        Ok(())
    }

    fn stop(&mut self) -> Result<(), CaptureError> {
        let Some((track, sink)) = self.binding.take() else {
            return Ok(());
        };
        track.disconnect(sink);

        let mut state = self.state.lock();
        state.running = false;
        let remainder = std::mem::take(&mut state.pending);
        if !remainder.is_empty() || !state.header_sent {
            let slice = state.encode(&remainder);
            if let Some(on_slice) = &state.on_slice {
                on_slice(slice);
            }
        }
        state.on_slice = None;
        log::info!(
            "PCM recorder stopped: {} slice(s), {} frame(s)",
            state.slices_emitted,
            state.frames_encoded
        );
        Ok(())
    }

    fn is_recording(&self) -> bool {
        self.binding.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meeting_capture_core::models::media::TrackKind;

    fn collector() -> (SliceCallback, Arc<Mutex<Vec<EncodedSlice>>>) {
        let slices = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&slices);
        (Arc::new(move |slice: EncodedSlice| sink.lock().push(slice)), slices)
    }

    fn live_stream() -> MediaStream {
        MediaStream::new(vec![MediaTrack::new(TrackKind::Audio, "mix")])
    }

    #[test]
    fn slices_follow_audio_time_and_header_leads() {
        let stream = live_stream();
        let (on_slice, slices) = collector();
        let mut recorder = PcmRecorder::new(1000, 1);

        recorder.start(&stream, Duration::from_millis(100), on_slice).unwrap();
        stream.tracks()[0].deliver(&[0.25; 250], 1000.0, 1);
        recorder.stop().unwrap();

        let slices = slices.lock();
        assert_eq!(slices.len(), 3);
        assert_eq!(slices[0].data.len(), wav::WAV_HEADER_SIZE + 200);
        assert_eq!(slices[1].data.len(), 200);
        assert_eq!(slices[2].data.len(), 100);
        assert!(slices.iter().all(|s| s.mime_type == WAV_MIME_TYPE));
        assert_eq!(recorder.frames_encoded(), 250);
    }

    #[test]
    fn concatenated_slices_decode_as_one_wav() {
        let stream = live_stream();
        let (on_slice, slices) = collector();
        let mut recorder = PcmRecorder::new(8000, 2);

        recorder.start(&stream, Duration::from_millis(10), on_slice).unwrap();
        stream.tracks()[0].deliver(&[0.5; 300], 8000.0, 1);
        recorder.stop().unwrap();

        let blob: Vec<u8> = slices.lock().iter().flat_map(|s| s.data.clone()).collect();
        let (spec, samples) = wav::decode(&blob).unwrap();
        assert_eq!(spec, WavSpec { sample_rate: 8000, channels: 2 });
        assert_eq!(samples.len(), 600);
    }

    #[test]
    fn foreign_rate_in_small_blocks_keeps_its_length() {
        let stream = live_stream();
        let (on_slice, _) = collector();
        let mut recorder = PcmRecorder::new(48000, 1);

        recorder.start(&stream, Duration::from_secs(1), on_slice).unwrap();
        for _ in 0..441 {
            stream.tracks()[0].deliver(&[0.1; 100], 44100.0, 1);
        }
        recorder.stop().unwrap();

        let frames = recorder.frames_encoded();
        assert!((47_999..=48_000).contains(&frames), "encoded {}", frames);
    }

    #[test]
    fn silent_recording_still_yields_header() {
        let stream = live_stream();
        let (on_slice, slices) = collector();
        let mut recorder = PcmRecorder::new(48000, 2);

        recorder.start(&stream, Duration::from_secs(1), on_slice).unwrap();
        recorder.stop().unwrap();
        recorder.stop().unwrap();

        let slices = slices.lock();
        assert_eq!(slices.len(), 1);
        assert_eq!(slices[0].data.len(), wav::WAV_HEADER_SIZE);
        assert!(!recorder.is_recording());
        assert_eq!(stream.tracks()[0].sink_count(), 0);
    }

    #[test]
    fn audio_after_stop_is_ignored() {
        let stream = live_stream();
        let (on_slice, slices) = collector();
        let mut recorder = PcmRecorder::new(1000, 1);

        recorder.start(&stream, Duration::from_millis(100), on_slice).unwrap();
        recorder.stop().unwrap();
        stream.tracks()[0].deliver(&[0.25; 500], 1000.0, 1);

        assert_eq!(slices.lock().len(), 1);
    }

    #[test]
    fn refusing_recorder_and_dead_stream_fail_to_start() {
        let (on_slice, _) = collector();
        let mut refusing = PcmRecorder::refusing(48000, 2, "encoder missing");
        assert_eq!(
            refusing.start(&live_stream(), Duration::from_secs(1), on_slice.clone()),
            Err(CaptureError::RecorderFailed("encoder missing".into()))
        );

        let ended = live_stream();
        ended.tracks()[0].end();
        let mut recorder = PcmRecorder::new(48000, 2);
        assert!(recorder.start(&ended, Duration::from_secs(1), on_slice).is_err());
    }
}
