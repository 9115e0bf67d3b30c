//! Software audio graph: media-stream sources, gain nodes, and a summing
//! media-stream destination.
//!
//! ```text
//! [source track 0] → convert → [FrameBuffer] → ×gain ─┐
//!                                                      ├─ Σ → [destination track]
//! [source track 1] → convert → [FrameBuffer] → ×gain ─┘
//! ```
//!
//! The first connected route is the clock: every buffer it receives renders
//! one cycle covering the frames it brought, and the other routes contribute
//! whatever they have buffered for that span (silence if short). Gain values
//! are read at render time, so a change applies on the next cycle.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::models::error::CaptureError;
use crate::models::media::{MediaStream, MediaTrack, SinkId, TrackKind};
use crate::processing::ring_buffer::FrameBuffer;
use crate::processing::sample_format::{self, Resampler};

/// Output format of a context.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GraphFormat {
    pub sample_rate: f64,
    pub channels: u16,
    /// Frames each route may hold before the oldest are dropped.
    pub buffer_frames: usize,
}

/// A live gain coefficient shared between the control side and the render path.
#[derive(Debug, Clone)]
pub struct GainNode {
    value: Arc<AtomicU32>,
}

impl GainNode {
    fn new(value: f32) -> Self {
        Self {
            value: Arc::new(AtomicU32::new(sanitize_gain(value).to_bits())),
        }
    }

    pub fn value(&self) -> f32 {
        f32::from_bits(self.value.load(Ordering::Acquire))
    }

    /// Latest value wins; nothing is queued.
    pub fn set_value(&self, value: f32) {
        self.value.store(sanitize_gain(value).to_bits(), Ordering::Release);
    }
}

fn sanitize_gain(value: f32) -> f32 {
    if value.is_finite() {
        value.max(0.0)
    } else {
        0.0
    }
}

/// A stream's live audio track, wrapped for connection into the graph.
#[derive(Debug)]
pub struct SourceNode {
    track: MediaTrack,
}

impl SourceNode {
    pub fn track(&self) -> &MediaTrack {
        &self.track
    }
}

struct Route {
    resampler: Resampler,
    buffer: FrameBuffer,
    gain: GainNode,
}

struct MixBus {
    routes: Vec<Route>,
    render_cycles: u64,
}

impl MixBus {
    /// Resample and buffer input and, for the clock route, render a cycle.
    fn push(&mut self, route: usize, samples: &[f32], sample_rate: f64, channels: usize) -> Option<Vec<f32>> {
        let target = self.routes.get_mut(route)?;
        let converted = target.resampler.process(samples, sample_rate);
        target.buffer.write(&converted);
        if route != 0 {
            return None;
        }

        let frames = self.routes[0].buffer.available_frames();
        if frames == 0 {
            return None;
        }

        let mut mixed = vec![0.0f32; frames * channels];
        for route in &mut self.routes {
            let gain = route.gain.value();
            let input = route.buffer.read_padded(frames);
            for (out, sample) in mixed.iter_mut().zip(input) {
                *out += sample * gain;
            }
        }
        self.render_cycles += 1;
        Some(mixed)
    }
}

struct ContextInner {
    format: GraphFormat,
    closed: AtomicBool,
    bus: Mutex<MixBus>,
    taps: Mutex<Vec<(MediaTrack, SinkId)>>,
    destination: MediaStream,
}

impl ContextInner {
    fn ingest(&self, route: usize, samples: &[f32], sample_rate: f64, channels: u16) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        let remixed = sample_format::remix(samples, channels, self.format.channels);
        let rendered = self
            .bus
            .lock()
            .push(route, &remixed, sample_rate, usize::from(self.format.channels));

        if let Some(mixed) = rendered {
            if let Some(output) = self.destination.tracks().first() {
                output.deliver(&mixed, self.format.sample_rate, self.format.channels);
            }
        }
    }

    fn shutdown(&self) -> bool {
        if self.closed.swap(true, Ordering::AcqRel) {
            return false;
        }
        for (track, sink) in self.taps.lock().drain(..) {
            track.disconnect(sink);
        }
        self.bus.lock().routes.clear();
        self.destination.stop_all();
        true
    }
}

impl Drop for ContextInner {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// One processing context. Cloning shares the same graph.
#[derive(Clone)]
pub struct AudioContext {
    inner: Arc<ContextInner>,
}

impl AudioContext {
    pub fn new(format: GraphFormat) -> Result<Self, CaptureError> {
        if format.sample_rate <= 0.0 || !format.sample_rate.is_finite() {
            return Err(CaptureError::ConfigurationFailed(format!(
                "unsupported context sample rate: {}",
                format.sample_rate
            )));
        }
        if ![1, 2].contains(&format.channels) {
            return Err(CaptureError::ConfigurationFailed(format!(
                "unsupported context channel count: {}",
                format.channels
            )));
        }

        let output = MediaTrack::new(TrackKind::Audio, "Mixed Output");
        Ok(Self {
            inner: Arc::new(ContextInner {
                format,
                closed: AtomicBool::new(false),
                bus: Mutex::new(MixBus {
                    routes: Vec::new(),
                    render_cycles: 0,
                }),
                taps: Mutex::new(Vec::new()),
                destination: MediaStream::new(vec![output]),
            }),
        })
    }

    pub fn format(&self) -> GraphFormat {
        self.inner.format
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    pub fn create_media_stream_source(&self, stream: &MediaStream) -> Result<SourceNode, CaptureError> {
        self.ensure_open()?;
        let track = stream
            .first_live_audio_track()
            .ok_or(CaptureError::DeviceNotAvailable)?;
        Ok(SourceNode { track: track.clone() })
    }

    pub fn create_gain(&self, value: f32) -> Result<GainNode, CaptureError> {
        self.ensure_open()?;
        Ok(GainNode::new(value))
    }

    /// The summed output. Its single audio track carries every rendered cycle.
    pub fn destination_stream(&self) -> MediaStream {
        self.inner.destination.clone()
    }

    /// Wire `source → gain → destination`. The first connection becomes the clock.
    pub fn connect(&self, source: SourceNode, gain: &GainNode) -> Result<(), CaptureError> {
        self.ensure_open()?;
        if !source.track.is_live() {
            return Err(CaptureError::DeviceNotAvailable);
        }

        let route = {
            let mut bus = self.inner.bus.lock();
            bus.routes.push(Route {
                resampler: Resampler::new(self.inner.format.channels, self.inner.format.sample_rate),
                buffer: FrameBuffer::new(self.inner.format.buffer_frames, self.inner.format.channels),
                gain: gain.clone(),
            });
            bus.routes.len() - 1
        };

        let weak: Weak<ContextInner> = Arc::downgrade(&self.inner);
        let sink = source.track.connect(Arc::new(move |samples: &[f32], rate: f64, channels: u16| {
            if let Some(context) = weak.upgrade() {
                context.ingest(route, samples, rate, channels);
            }
        }));
        self.inner.taps.lock().push((source.track, sink));
        Ok(())
    }

    /// Disconnect every source and stop the destination track. Idempotent.
    pub fn close(&self) {
        if self.inner.shutdown() {
            log::debug!("Audio context closed after {} render cycles", self.render_cycles());
        }
    }

    pub fn render_cycles(&self) -> u64 {
        self.inner.bus.lock().render_cycles
    }

    fn ensure_open(&self) -> Result<(), CaptureError> {
        if self.is_closed() {
            Err(CaptureError::InvalidState("audio context is closed".into()))
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn format() -> GraphFormat {
        GraphFormat {
            sample_rate: 48000.0,
            channels: 2,
            buffer_frames: 48000,
        }
    }

    fn capture_output(context: &AudioContext) -> Arc<Mutex<Vec<f32>>> {
        let captured = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&captured);
        context.destination_stream().tracks()[0].connect(Arc::new(move |samples: &[f32], _: f64, _: u16| {
            sink.lock().extend_from_slice(samples);
        }));
        captured
    }

    #[test]
    fn sums_routes_with_gains() {
        let context = AudioContext::new(format()).unwrap();
        let clock = MediaStream::new(vec![MediaTrack::new(TrackKind::Audio, "clock")]);
        let other = MediaStream::new(vec![MediaTrack::new(TrackKind::Audio, "other")]);

        let clock_gain = context.create_gain(0.5).unwrap();
        let other_gain = context.create_gain(1.0).unwrap();
        context
            .connect(context.create_media_stream_source(&clock).unwrap(), &clock_gain)
            .unwrap();
        context
            .connect(context.create_media_stream_source(&other).unwrap(), &other_gain)
            .unwrap();
        let output = capture_output(&context);

        other.tracks()[0].deliver(&[0.25; 4], 48000.0, 1);
        clock.tracks()[0].deliver(&[0.4; 8], 48000.0, 2);

        let out = output.lock().clone();
        assert_eq!(out.len(), 8);
        for sample in out {
            assert_relative_eq!(sample, 0.45);
        }
        assert_eq!(context.render_cycles(), 1);
    }

    #[test]
    fn gain_change_applies_next_cycle() {
        let context = AudioContext::new(format()).unwrap();
        let source = MediaStream::new(vec![MediaTrack::new(TrackKind::Audio, "clock")]);
        let gain = context.create_gain(1.0).unwrap();
        context
            .connect(context.create_media_stream_source(&source).unwrap(), &gain)
            .unwrap();
        let output = capture_output(&context);

        source.tracks()[0].deliver(&[0.5; 2], 48000.0, 2);
        gain.set_value(0.0);
        source.tracks()[0].deliver(&[0.5; 2], 48000.0, 2);

        assert_eq!(*output.lock(), vec![0.5, 0.5, 0.0, 0.0]);
    }

    #[test]
    fn source_requires_live_audio_track() {
        let context = AudioContext::new(format()).unwrap();
        let track = MediaTrack::new(TrackKind::Audio, "gone");
        track.end();
        let stream = MediaStream::new(vec![track, MediaTrack::new(TrackKind::Video, "screen")]);

        assert_eq!(
            context.create_media_stream_source(&stream).unwrap_err(),
            CaptureError::DeviceNotAvailable
        );
    }

    #[test]
    fn close_disconnects_sources_and_stops_output() {
        let context = AudioContext::new(format()).unwrap();
        let source = MediaStream::new(vec![MediaTrack::new(TrackKind::Audio, "clock")]);
        let gain = context.create_gain(1.0).unwrap();
        context
            .connect(context.create_media_stream_source(&source).unwrap(), &gain)
            .unwrap();
        assert_eq!(source.tracks()[0].sink_count(), 1);

        context.close();
        context.close();

        assert!(context.is_closed());
        assert_eq!(source.tracks()[0].sink_count(), 0);
        assert!(context.destination_stream().tracks()[0].is_stopped());
        assert!(context.create_gain(1.0).is_err());
    }

    #[test]
    fn rejects_invalid_format() {
        let bad = GraphFormat {
            sample_rate: 0.0,
            ..format()
        };
        assert!(AudioContext::new(bad).is_err());
    }

    #[test]
    fn gain_rejects_negative_and_nan() {
        let gain = GainNode::new(-1.0);
        assert_eq!(gain.value(), 0.0);
        gain.set_value(f32::NAN);
        assert_eq!(gain.value(), 0.0);
    }
}
