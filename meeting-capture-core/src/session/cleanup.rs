use crate::models::media::MediaStream;
use crate::session::mixing::MixingGraph;
use crate::session::ticker::Ticker;

type Disposer = Box<dyn FnOnce() + Send + 'static>;

/// Ordered disposer list. Every sub-resource registers its teardown here as
/// it is acquired; `release` runs them newest-first in a single pass.
#[derive(Default)]
pub struct ResourceScope {
    disposers: Vec<(&'static str, Disposer)>,
}

impl ResourceScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn defer(&mut self, name: &'static str, dispose: impl FnOnce() + Send + 'static) {
        self.disposers.push((name, Box::new(dispose)));
    }

    pub fn len(&self) -> usize {
        self.disposers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.disposers.is_empty()
    }

    /// Run every pending disposer in reverse registration order.
    ///
    /// Returns how many ran. A second call finds nothing left and returns 0.
    pub fn release(&mut self) -> usize {
        let count = self.disposers.len();
        while let Some((name, dispose)) = self.disposers.pop() {
            log::debug!("Releasing {}", name);
            dispose();
        }
        count
    }
}

impl Drop for ResourceScope {
    fn drop(&mut self) {
        self.release();
    }
}

/// Everything one recording attempt holds, plus the scope that tears it down.
///
/// The typed handles exist so the session can reach its live graph and
/// streams; the scope is what actually stops them. `release` clears both, so
/// nothing left behind can be mistaken for live state.
#[derive(Default)]
pub struct SessionResources {
    scope: ResourceScope,
    system: Option<MediaStream>,
    mic: Option<MediaStream>,
    graph: Option<MixingGraph>,
    ticker: Option<Ticker>,
}

impl SessionResources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn adopt_system(&mut self, stream: MediaStream) {
        let owned = stream.clone();
        self.scope.defer("system stream", move || owned.stop_all());
        self.system = Some(stream);
    }

    pub fn adopt_mic(&mut self, stream: MediaStream) {
        let owned = stream.clone();
        self.scope.defer("microphone stream", move || owned.stop_all());
        self.mic = Some(stream);
    }

    pub fn adopt_graph(&mut self, graph: MixingGraph) {
        let owned = graph.clone();
        self.scope.defer("mixing graph", move || owned.close());
        self.graph = Some(graph);
    }

    pub fn adopt_ticker(&mut self, ticker: Ticker) {
        let handle = ticker.handle();
        self.scope.defer("elapsed ticker", move || handle.cancel());
        self.ticker = Some(ticker);
    }

    pub fn defer(&mut self, name: &'static str, dispose: impl FnOnce() + Send + 'static) {
        self.scope.defer(name, dispose);
    }

    /// Stop the microphone ahead of the rest (used when mixing falls back to system audio).
    pub fn release_mic(&mut self) {
        if let Some(mic) = self.mic.take() {
            mic.stop_all();
        }
    }

    pub fn system(&self) -> Option<&MediaStream> {
        self.system.as_ref()
    }

    pub fn mic(&self) -> Option<&MediaStream> {
        self.mic.as_ref()
    }

    pub fn graph(&self) -> Option<&MixingGraph> {
        self.graph.as_ref()
    }

    pub fn has_ticker(&self) -> bool {
        self.ticker.is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.scope.is_empty() && self.system.is_none() && self.mic.is_none() && self.graph.is_none()
    }

    /// Idempotent teardown. Safe on a partially acquired set.
    pub fn release(&mut self) {
        let released = self.scope.release();
        self.system = None;
        self.mic = None;
        self.graph = None;
        self.ticker = None;
        if released > 0 {
            log::debug!("Released {} session resource(s)", released);
        }
    }
}

impl Drop for SessionResources {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::audio_models::Volumes;
    use crate::models::media::{MediaTrack, TrackKind};
    use crate::processing::audio_graph::GraphFormat;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn scope_runs_disposers_in_reverse_once() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut scope = ResourceScope::new();
        for name in ["first", "second", "third"] {
            let order = Arc::clone(&order);
            scope.defer(name, move || order.lock().push(name));
        }

        assert_eq!(scope.release(), 3);
        assert_eq!(scope.release(), 0);
        assert_eq!(*order.lock(), vec!["third", "second", "first"]);
    }

    #[test]
    fn dropping_scope_releases() {
        let ran = Arc::new(Mutex::new(false));
        {
            let mut scope = ResourceScope::new();
            let ran = Arc::clone(&ran);
            scope.defer("flag", move || *ran.lock() = true);
        }
        assert!(*ran.lock());
    }

    #[test]
    fn release_stops_everything_and_clears_handles() {
        let system_track = MediaTrack::new(TrackKind::Audio, "system");
        let mic_track = MediaTrack::new(TrackKind::Audio, "mic");
        let system = MediaStream::new(vec![system_track.clone()]);
        let mic = MediaStream::new(vec![mic_track.clone()]);
        let graph = MixingGraph::build(
            &system,
            &mic,
            Volumes::default(),
            GraphFormat {
                sample_rate: 48000.0,
                channels: 2,
                buffer_frames: 4800,
            },
        )
        .unwrap();

        let mut resources = SessionResources::new();
        resources.adopt_system(system);
        resources.adopt_mic(mic);
        resources.adopt_graph(graph.clone());
        resources.adopt_ticker(Ticker::spawn(Duration::from_secs(60), || true).unwrap());

        resources.release();
        resources.release();

        assert!(system_track.is_stopped());
        assert!(mic_track.is_stopped());
        assert!(!graph.is_live());
        assert!(resources.graph().is_none());
        assert!(!resources.has_ticker());
        assert!(resources.is_empty());
    }

    #[test]
    fn partial_acquisition_is_safe_to_release() {
        let track = MediaTrack::new(TrackKind::Audio, "system");
        let mut resources = SessionResources::new();
        resources.adopt_system(MediaStream::new(vec![track.clone()]));

        resources.release();

        assert!(track.is_stopped());
        assert!(resources.system().is_none());
    }

    #[test]
    fn early_mic_release_keeps_system() {
        let system_track = MediaTrack::new(TrackKind::Audio, "system");
        let mic_track = MediaTrack::new(TrackKind::Audio, "mic");
        let mut resources = SessionResources::new();
        resources.adopt_system(MediaStream::new(vec![system_track.clone()]));
        resources.adopt_mic(MediaStream::new(vec![mic_track.clone()]));

        resources.release_mic();

        assert!(mic_track.is_stopped());
        assert!(system_track.is_live());
        assert!(resources.mic().is_none());
    }
}
