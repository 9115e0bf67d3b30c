//! Live capture handles.
//!
//! A [`MediaTrack`] is a cheap, cloneable handle to one live source (audio or
//! video). Capture backends create tracks and push audio into them with
//! [`MediaTrack::deliver`]; consumers (the audio graph, a recorder) attach
//! sinks with [`MediaTrack::connect`]. A [`MediaStream`] groups the tracks
//! returned by one capture grant.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::capability::AudioProcessing;

/// Callback invoked when an audio buffer is available.
///
/// Parameters:
/// - `samples`: Interleaved f32 samples.
/// - `sample_rate`: The actual sample rate of the delivered audio.
/// - `channels`: Number of channels (1 = mono, 2 = stereo interleaved).
pub type AudioBufferCallback = Arc<dyn Fn(&[f32], f64, u16) + Send + Sync + 'static>;

type ReleaseHook = Box<dyn FnOnce() + Send + 'static>;
type EndedObserver = Box<dyn FnOnce() + Send + 'static>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackKind {
    Audio,
    Video,
}

/// Identifies a sink attached with [`MediaTrack::connect`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SinkId(u64);

#[derive(Default)]
struct TrackStatus {
    stopped: bool,
    ended: bool,
}

struct TrackInner {
    id: String,
    kind: TrackKind,
    label: String,
    processing: Option<AudioProcessing>,
    status: Mutex<TrackStatus>,
    sinks: Mutex<Vec<(SinkId, AudioBufferCallback)>>,
    ended_observers: Mutex<Vec<EndedObserver>>,
    release: Mutex<Option<ReleaseHook>>,
    next_sink: AtomicU64,
}

#[derive(Clone)]
pub struct MediaTrack {
    inner: Arc<TrackInner>,
}

impl MediaTrack {
    pub fn new(kind: TrackKind, label: impl Into<String>) -> Self {
        Self::build(kind, label.into(), None)
    }

    /// An audio track that records the processing the capture was granted with.
    pub fn audio(label: impl Into<String>, processing: AudioProcessing) -> Self {
        Self::build(TrackKind::Audio, label.into(), Some(processing))
    }

    fn build(kind: TrackKind, label: String, processing: Option<AudioProcessing>) -> Self {
        Self {
            inner: Arc::new(TrackInner {
                id: uuid::Uuid::new_v4().to_string(),
                kind,
                label,
                processing,
                status: Mutex::new(TrackStatus::default()),
                sinks: Mutex::new(Vec::new()),
                ended_observers: Mutex::new(Vec::new()),
                release: Mutex::new(None),
                next_sink: AtomicU64::new(0),
            }),
        }
    }

    /// Attach the hook that releases the underlying device. Runs once, on the first `stop()`.
    ///
    /// The hook may run on whichever thread stops the track, including a
    /// capture thread delivering audio, so it must not join that thread.
    pub fn with_release(self, hook: impl FnOnce() + Send + 'static) -> Self {
        *self.inner.release.lock() = Some(Box::new(hook));
        self
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn kind(&self) -> TrackKind {
        self.inner.kind
    }

    pub fn label(&self) -> &str {
        &self.inner.label
    }

    pub fn processing(&self) -> Option<AudioProcessing> {
        self.inner.processing
    }

    /// Neither stopped by the consumer nor ended by the source.
    pub fn is_live(&self) -> bool {
        let status = self.inner.status.lock();
        !status.stopped && !status.ended
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.status.lock().stopped
    }

    pub fn is_ended(&self) -> bool {
        self.inner.status.lock().ended
    }

    /// Stop the track and release its device. Idempotent.
    ///
    /// Stopping does not notify `on_ended` observers; only the source does that.
    pub fn stop(&self) {
        {
            let mut status = self.inner.status.lock();
            if status.stopped {
                return;
            }
            status.stopped = true;
        }
        self.inner.sinks.lock().clear();
        self.inner.ended_observers.lock().clear();
        let hook = self.inner.release.lock().take();
        if let Some(hook) = hook {
            hook();
        }
        log::debug!("Track stopped: {} ({})", self.inner.label, self.inner.id);
    }

    /// Mark the track as ended by its source (device lost, sharing revoked).
    ///
    /// Called by capture backends. Fires every `on_ended` observer once.
    pub fn end(&self) {
        {
            let mut status = self.inner.status.lock();
            if status.ended || status.stopped {
                return;
            }
            status.ended = true;
        }
        let observers: Vec<EndedObserver> = self.inner.ended_observers.lock().drain(..).collect();
        log::info!("Track ended by source: {} ({})", self.inner.label, self.inner.id);
        for observer in observers {
            observer();
        }
    }

    /// Register a one-shot observer for source-side termination.
    ///
    /// If the track already ended, the observer runs immediately.
    pub fn on_ended(&self, observer: impl FnOnce() + Send + 'static) {
        let already_ended = {
            let status = self.inner.status.lock();
            if status.stopped {
                return;
            }
            status.ended
        };
        if already_ended {
            observer();
        } else {
            self.inner.ended_observers.lock().push(Box::new(observer));
        }
    }

    pub fn connect(&self, sink: AudioBufferCallback) -> SinkId {
        let id = SinkId(self.inner.next_sink.fetch_add(1, Ordering::Relaxed));
        self.inner.sinks.lock().push((id, sink));
        id
    }

    pub fn disconnect(&self, id: SinkId) {
        self.inner.sinks.lock().retain(|(sink_id, _)| *sink_id != id);
    }

    pub fn sink_count(&self) -> usize {
        self.inner.sinks.lock().len()
    }

    /// Push captured audio to every attached sink. Dropped unless the track is live.
    pub fn deliver(&self, samples: &[f32], sample_rate: f64, channels: u16) {
        if !self.is_live() {
            return;
        }
        // Sinks run outside the lock so they may connect or disconnect.
        let sinks: Vec<AudioBufferCallback> = self.inner.sinks.lock().iter().map(|(_, s)| Arc::clone(s)).collect();
        for sink in sinks {
            sink(samples, sample_rate, channels);
        }
    }
}

impl std::fmt::Debug for MediaTrack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaTrack")
            .field("id", &self.inner.id)
            .field("kind", &self.inner.kind)
            .field("label", &self.inner.label)
            .field("live", &self.is_live())
            .finish()
    }
}

/// The set of tracks produced by one capture grant.
#[derive(Debug, Clone)]
pub struct MediaStream {
    id: String,
    tracks: Vec<MediaTrack>,
}

impl MediaStream {
    pub fn new(tracks: Vec<MediaTrack>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            tracks,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn tracks(&self) -> &[MediaTrack] {
        &self.tracks
    }

    pub fn audio_tracks(&self) -> impl Iterator<Item = &MediaTrack> {
        self.tracks.iter().filter(|t| t.kind() == TrackKind::Audio)
    }

    pub fn video_tracks(&self) -> impl Iterator<Item = &MediaTrack> {
        self.tracks.iter().filter(|t| t.kind() == TrackKind::Video)
    }

    pub fn has_audio(&self) -> bool {
        self.audio_tracks().next().is_some()
    }

    pub fn first_live_audio_track(&self) -> Option<&MediaTrack> {
        self.audio_tracks().find(|t| t.is_live())
    }

    /// Detach every track of `kind` from the stream and hand them back.
    pub fn remove_tracks(&mut self, kind: TrackKind) -> Vec<MediaTrack> {
        let (removed, kept) = self.tracks.drain(..).partition(|t| t.kind() == kind);
        self.tracks = kept;
        removed
    }

    pub fn stop_all(&self) {
        for track in &self.tracks {
            track.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn stop_runs_release_hook_once() {
        let released = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&released);
        let track = MediaTrack::new(TrackKind::Audio, "mic").with_release(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        track.stop();
        track.stop();

        assert!(track.is_stopped());
        assert!(!track.is_live());
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn end_notifies_observers_but_stop_does_not() {
        let fired = Arc::new(AtomicUsize::new(0));

        let ended = MediaTrack::new(TrackKind::Audio, "system");
        let counter = Arc::clone(&fired);
        ended.on_ended(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        ended.end();
        ended.end();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(ended.is_ended());
        assert!(!ended.is_stopped());

        let stopped = MediaTrack::new(TrackKind::Audio, "system");
        let counter = Arc::clone(&fired);
        stopped.on_ended(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        stopped.stop();
        stopped.end();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn deliver_reaches_connected_sinks_until_stopped() {
        let track = MediaTrack::new(TrackKind::Audio, "mic");
        let received = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&received);
        let id = track.connect(Arc::new(move |samples: &[f32], _rate: f64, _ch: u16| {
            counter.fetch_add(samples.len(), Ordering::SeqCst);
        }));

        track.deliver(&[0.1; 4], 48000.0, 1);
        assert_eq!(received.load(Ordering::SeqCst), 4);

        track.disconnect(id);
        track.deliver(&[0.1; 4], 48000.0, 1);
        assert_eq!(received.load(Ordering::SeqCst), 4);

        track.connect(Arc::new(|_: &[f32], _: f64, _: u16| {}));
        track.stop();
        assert_eq!(track.sink_count(), 0);
    }

    #[test]
    fn remove_video_tracks_keeps_audio() {
        let mut stream = MediaStream::new(vec![
            MediaTrack::new(TrackKind::Video, "screen"),
            MediaTrack::new(TrackKind::Audio, "tab audio"),
        ]);

        let video = stream.remove_tracks(TrackKind::Video);

        assert_eq!(video.len(), 1);
        assert_eq!(stream.tracks().len(), 1);
        assert!(stream.has_audio());
        assert_eq!(stream.video_tracks().count(), 0);
    }
}
