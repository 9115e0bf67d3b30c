use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::models::audio_models::{CaptureMode, DeviceEntry, StopCause, Volumes};
use crate::models::config::{SessionConfiguration, TickerMode};
use crate::models::error::CaptureError;
use crate::models::media::MediaStream;
use crate::models::notice::Notice;
use crate::models::recording_result::{RecordingBlob, RecordingMetadata, RecordingResult};
use crate::models::state::SessionState;
use crate::processing::audio_graph::GraphFormat;
use crate::session::acquirer::DualStreamAcquirer;
use crate::session::cleanup::SessionResources;
use crate::session::compatibility::{Compatibility, CompatibilityProbe};
use crate::session::device_catalog::DeviceCatalog;
use crate::session::mixing::MixingGraph;
use crate::session::slot::{next_session_id, RecordingSlot};
use crate::session::ticker::Ticker;
use crate::traits::capture_delegate::SessionDelegate;
use crate::traits::capture_provider::{LocalInputCapture, SharedSourceCapture};
use crate::traits::recorder::{EncodedSlice, RecorderCapability, SliceCallback};
use crate::traits::upload::UploadHandoff;

/// Mutable session state, protected by one `parking_lot::Mutex`.
///
/// Never held while calling into a capability, the delegate, or a join.
struct SessionCore {
    state: SessionState,
    resources: SessionResources,
    volumes: Volumes,
    notices: Vec<Notice>,
    last_error: Option<CaptureError>,
    catalog: DeviceCatalog,
    selected_device_id: Option<String>,
    /// Bumped by every `start` and `close`; callbacks from an older attempt compare and bail.
    generation: u64,
    session_id: u64,
    slot: RecordingSlot,
}

impl SessionCore {
    /// Every state write goes through here so the slot is given back as soon
    /// as the session settles.
    fn set_state(&mut self, state: SessionState) {
        if !state.holds_capture() {
            self.slot.release(self.session_id);
        }
        self.state = state;
    }
}

struct SessionShared<S, L, R> {
    shared_capture: S,
    local_input: L,
    recorder: Mutex<R>,
    config: SessionConfiguration,
    probe: CompatibilityProbe,
    core: Mutex<SessionCore>,
    slices: Arc<Mutex<Vec<EncodedSlice>>>,
    delegate: Mutex<Option<Arc<dyn SessionDelegate>>>,
}

/// Dual-source recording session.
///
/// Drives one recording at a time through:
/// ```text
/// [shared source] → audio only ─┐
///                                ├→ [MixingGraph] → [recorder] → slices → blob
/// [microphone]    → audio only ─┘   (or system audio alone)
/// ```
///
/// All methods take `&self`; the session may be shared with the thread that
/// delivers platform callbacks. Every exit from `Recording`, and every failed
/// or cancelled acquisition, releases all tracks, the graph, and the ticker.
pub struct RecordingSession<S, L, R>
where
    S: SharedSourceCapture + 'static,
    L: LocalInputCapture + 'static,
    R: RecorderCapability + 'static,
{
    shared: Arc<SessionShared<S, L, R>>,
}

impl<S, L, R> RecordingSession<S, L, R>
where
    S: SharedSourceCapture + 'static,
    L: LocalInputCapture + 'static,
    R: RecorderCapability + 'static,
{
    /// A session that shares the process-wide [`RecordingSlot`].
    pub fn new(shared_capture: S, local_input: L, recorder: R, config: SessionConfiguration) -> Result<Self, CaptureError> {
        Self::with_slot(shared_capture, local_input, recorder, config, RecordingSlot::process())
    }

    /// A session that competes for capture only with sessions holding `slot`.
    pub fn with_slot(
        shared_capture: S,
        local_input: L,
        recorder: R,
        config: SessionConfiguration,
        slot: RecordingSlot,
    ) -> Result<Self, CaptureError> {
        config.validate().map_err(CaptureError::ConfigurationFailed)?;

        let core = SessionCore {
            state: SessionState::Idle,
            resources: SessionResources::new(),
            volumes: config.initial_volumes(),
            notices: Vec::new(),
            last_error: None,
            catalog: DeviceCatalog::default(),
            selected_device_id: config.mic_device_id.clone(),
            generation: 0,
            session_id: next_session_id(),
            slot,
        };

        Ok(Self {
            shared: Arc::new(SessionShared {
                shared_capture,
                local_input,
                recorder: Mutex::new(recorder),
                probe: CompatibilityProbe::new(config.allowed_engines.iter().cloned()),
                config,
                core: Mutex::new(core),
                slices: Arc::new(Mutex::new(Vec::new())),
                delegate: Mutex::new(None),
            }),
        })
    }

    pub fn set_delegate(&self, delegate: Arc<dyn SessionDelegate>) {
        *self.shared.delegate.lock() = Some(delegate);
    }

    pub fn config(&self) -> &SessionConfiguration {
        &self.shared.config
    }

    pub fn state(&self) -> SessionState {
        self.shared.core.lock().state.clone()
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.shared.core.lock().state.elapsed_ms().unwrap_or(0)
    }

    /// Non-fatal notices raised since the last `start`.
    pub fn notices(&self) -> Vec<Notice> {
        self.shared.core.lock().notices.clone()
    }

    pub fn last_error(&self) -> Option<CaptureError> {
        self.shared.core.lock().last_error.clone()
    }

    pub fn result(&self) -> Option<RecordingResult> {
        self.shared.core.lock().state.result().cloned()
    }

    pub fn volumes(&self) -> Volumes {
        self.shared.core.lock().volumes
    }

    pub fn capture_mode(&self) -> Option<CaptureMode> {
        match self.shared.core.lock().state {
            SessionState::Recording { mode, .. } => Some(mode),
            SessionState::Complete(ref result) => Some(result.mode),
            _ => None,
        }
    }

    /// Whether the live mixing graph exists (only while recording in `Mixed` mode).
    pub fn has_live_graph(&self) -> bool {
        self.shared.core.lock().resources.graph().is_some_and(MixingGraph::is_live)
    }

    pub fn devices(&self) -> Vec<DeviceEntry> {
        self.shared.core.lock().catalog.devices().to_vec()
    }

    pub fn selected_device(&self) -> Option<String> {
        self.shared.core.lock().selected_device_id.clone()
    }

    /// Read-only environment check. Never prompts.
    pub fn check_compatibility(&self) -> Compatibility {
        self.shared.check_compatibility()
    }

    /// Re-list microphones. Requires a compatible environment.
    ///
    /// A failed listing leaves an empty catalog and a `DeviceCatalogUnavailable`
    /// notice; recording can still proceed on the default input.
    pub fn refresh_devices(&self) -> Result<Vec<DeviceEntry>, CaptureError> {
        {
            let core = self.shared.core.lock();
            if let SessionState::Unsupported { reason } = &core.state {
                return Err(CaptureError::Unsupported { reason: reason.clone() });
            }
            if core.state.is_acquiring() {
                return Err(CaptureError::AcquisitionInFlight);
            }
        }
        if let Compatibility::Unsupported { reason } = self.shared.check_compatibility() {
            let generation = self.shared.core.lock().generation;
            return Err(self.shared.mark_unsupported(generation, reason));
        }

        let refresh = DeviceCatalog::refresh(&self.shared.local_input);
        let devices = refresh.catalog.devices().to_vec();
        self.shared.core.lock().catalog = refresh.catalog;
        if let Some(warning) = refresh.warning {
            self.shared.raise_notice(warning);
        }
        Ok(devices)
    }

    /// Remember a microphone for the next `start`. None selects the platform default.
    pub fn select_device(&self, device_id: Option<&str>) -> Result<(), CaptureError> {
        let mut core = self.shared.core.lock();
        if let Some(id) = device_id {
            if !core.catalog.is_empty() && !core.catalog.contains(id) {
                return Err(CaptureError::DeviceNotAvailable);
            }
        }
        core.selected_device_id = device_id.map(str::to_string);
        Ok(())
    }

    /// Begin a recording attempt.
    ///
    /// Transitions: idle/complete/failed → checking-compatibility →
    /// awaiting-permission → recording. From permission-denied this is a retry
    /// and skips the compatibility check. Blocks while the platform prompts.
    pub fn start(&self) -> Result<CaptureMode, CaptureError> {
        let (generation, retry) = self.shared.begin_attempt()?;
        if !retry {
            if let Compatibility::Unsupported { reason } = self.shared.check_compatibility() {
                return Err(self.shared.mark_unsupported(generation, reason));
            }
            if !self.shared.transition(generation, SessionState::AwaitingPermission) {
                return Err(CaptureError::Cancelled);
            }
        }
        self.shared.acquire(generation)
    }

    /// Re-request the shared source after a denial.
    pub fn retry(&self) -> Result<CaptureMode, CaptureError> {
        if !matches!(self.state(), SessionState::PermissionDenied) {
            return Err(CaptureError::InvalidState("nothing to retry".into()));
        }
        self.start()
    }

    /// Stop recording and assemble the blob.
    ///
    /// Idempotent: outside `Recording` (including a second call) this returns
    /// `Ok(None)` and changes nothing.
    pub fn stop(&self) -> Result<Option<RecordingResult>, CaptureError> {
        self.shared.finish(StopCause::User, None)
    }

    /// Advance elapsed time by one tick. Returns false once not recording.
    ///
    /// Called by the background ticker, or by the owner in `TickerMode::Manual`.
    pub fn tick(&self) -> bool {
        self.shared.tick()
    }

    /// Set the system volume in percent. Applies to the live mix immediately.
    pub fn set_system_volume(&self, percent: u8) -> Result<(), CaptureError> {
        let (graph, volumes) = {
            let mut core = self.shared.core.lock();
            core.volumes.system = percent.min(100);
            (core.resources.graph().cloned(), core.volumes)
        };
        match graph {
            Some(graph) => graph.set_system_gain(volumes.system_gain()),
            None => Ok(()),
        }
    }

    /// Set the microphone volume in percent. Applies to the live mix immediately.
    pub fn set_mic_volume(&self, percent: u8) -> Result<(), CaptureError> {
        let (graph, volumes) = {
            let mut core = self.shared.core.lock();
            core.volumes.mic = percent.min(100);
            (core.resources.graph().cloned(), core.volumes)
        };
        match graph {
            Some(graph) => graph.set_mic_gain(volumes.mic_gain()),
            None => Ok(()),
        }
    }

    /// Dismiss a finished or failed attempt. Transitions: complete/failed → idle.
    pub fn acknowledge(&self) -> Result<(), CaptureError> {
        let state = self.state();
        match state {
            SessionState::Complete(_) | SessionState::Failed(_) => {
                let generation = self.shared.core.lock().generation;
                self.shared.transition(generation, SessionState::Idle);
                Ok(())
            }
            SessionState::Idle => Ok(()),
            other => Err(CaptureError::InvalidState(format!("cannot acknowledge while {}", other.name()))),
        }
    }

    /// Abandon the session from any state. Releases everything and returns to idle.
    ///
    /// An acquisition in flight on another thread is cancelled when it next
    /// checks in; its resources are released there.
    pub fn close(&self) {
        self.shared.close();
    }

    /// Pass the completed recording to `upload` unmodified.
    ///
    /// An empty title is replaced by a dated default. On success the session
    /// returns to idle and the result is gone; on failure it stays complete so
    /// the handoff can be retried.
    pub fn hand_off<U: UploadHandoff + ?Sized>(&self, upload: &U, title: &str) -> Result<(), CaptureError> {
        let (result, generation) = {
            let core = self.shared.core.lock();
            match &core.state {
                SessionState::Complete(result) => (result.clone(), core.generation),
                other => {
                    return Err(CaptureError::InvalidState(format!(
                        "no completed recording to hand off (state: {})",
                        other.name()
                    )))
                }
            }
        };

        let title = if title.trim().is_empty() {
            default_title()
        } else {
            title.trim().to_string()
        };

        if let Err(e) = upload.hand_off_result(&result, &title) {
            log::error!("Handoff of {:?} failed: {}", title, e);
            self.shared.report_error(&e);
            return Err(e);
        }

        log::info!("Handed off {:?} ({} bytes, {})", title, result.blob.len(), result.blob.mime_type);
        self.shared.transition(generation, SessionState::Idle);
        Ok(())
    }
}

impl<S, L, R> Drop for RecordingSession<S, L, R>
where
    S: SharedSourceCapture + 'static,
    L: LocalInputCapture + 'static,
    R: RecorderCapability + 'static,
{
    fn drop(&mut self) {
        let mut resources = {
            let mut core = self.shared.core.lock();
            core.generation += 1;
            core.set_state(SessionState::Idle);
            std::mem::take(&mut core.resources)
        };
        let _ = self.shared.recorder.lock().stop();
        resources.release();
    }
}

impl<S, L, R> SessionShared<S, L, R>
where
    S: SharedSourceCapture + 'static,
    L: LocalInputCapture + 'static,
    R: RecorderCapability + 'static,
{
    fn check_compatibility(&self) -> Compatibility {
        let environment = self.shared_capture.environment();
        let outcome = self.probe.check(&environment);
        if let Compatibility::Unsupported { reason } = &outcome {
            log::warn!("Environment {:?} unsupported: {}", environment.engine, reason);
        }
        outcome
    }

    fn graph_format(&self) -> GraphFormat {
        GraphFormat {
            sample_rate: self.config.sample_rate,
            channels: self.config.channels,
            buffer_frames: (self.config.sample_rate * self.config.buffer_secs).round() as usize,
        }
    }

    fn delegate(&self) -> Option<Arc<dyn SessionDelegate>> {
        self.delegate.lock().clone()
    }

    fn emit_state(&self, state: &SessionState) {
        if let Some(delegate) = self.delegate() {
            delegate.on_state_changed(state);
        }
    }

    fn report_error(&self, error: &CaptureError) {
        if let Some(delegate) = self.delegate() {
            delegate.on_error(error);
        }
    }

    /// Enter the first acquisition state. Returns the new generation and
    /// whether this is a permission retry.
    fn begin_attempt(&self) -> Result<(u64, bool), CaptureError> {
        let (generation, state, retry) = {
            let mut core = self.core.lock();
            let retry = match &core.state {
                SessionState::Idle | SessionState::Complete(_) | SessionState::Failed(_) => false,
                SessionState::PermissionDenied => true,
                SessionState::Unsupported { reason } => {
                    return Err(CaptureError::Unsupported { reason: reason.clone() })
                }
                SessionState::CheckingCompatibility | SessionState::AwaitingPermission => {
                    return Err(CaptureError::AcquisitionInFlight)
                }
                other => {
                    return Err(CaptureError::InvalidState(format!("cannot start while {}", other.name())))
                }
            };
            if !core.slot.try_claim(core.session_id) {
                return Err(CaptureError::SessionBusy);
            }
            core.generation += 1;
            core.notices.clear();
            core.last_error = None;
            core.set_state(if retry {
                SessionState::AwaitingPermission
            } else {
                SessionState::CheckingCompatibility
            });
            (core.generation, core.state.clone(), retry)
        };
        self.slices.lock().clear();
        log::info!("Recording attempt {} started ({})", generation, state.name());
        self.emit_state(&state);
        Ok((generation, retry))
    }

    /// Set `state` if the attempt is still current. Returns false if it was superseded.
    fn transition(&self, generation: u64, state: SessionState) -> bool {
        {
            let mut core = self.core.lock();
            if core.generation != generation {
                return false;
            }
            core.set_state(state.clone());
        }
        log::debug!("Session state: {}", state.name());
        self.emit_state(&state);
        true
    }

    fn raise_notice(&self, notice: Notice) {
        log::warn!("{}", notice);
        self.core.lock().notices.push(notice.clone());
        if let Some(delegate) = self.delegate() {
            delegate.on_notice(&notice);
        }
    }

    fn mark_unsupported(&self, generation: u64, reason: String) -> CaptureError {
        let error = CaptureError::Unsupported { reason: reason.clone() };
        {
            let mut core = self.core.lock();
            if core.generation == generation {
                core.last_error = Some(error.clone());
            }
        }
        if self.transition(generation, SessionState::Unsupported { reason }) {
            self.report_error(&error);
        }
        error
    }

    /// Route an acquisition failure to its state and release whatever the
    /// attempt still holds.
    fn abandon(&self, generation: u64, error: CaptureError) -> CaptureError {
        let (mut resources, state) = {
            let mut core = self.core.lock();
            if core.generation != generation {
                return CaptureError::Cancelled;
            }
            let state = match &error {
                CaptureError::NoAudioTrack | CaptureError::Cancelled => SessionState::Idle,
                CaptureError::PermissionDenied => SessionState::PermissionDenied,
                other => SessionState::Failed(other.clone()),
            };
            core.set_state(state.clone());
            core.last_error = Some(error.clone());
            (std::mem::take(&mut core.resources), state)
        };
        resources.release();

        match &state {
            SessionState::Failed(_) => log::error!("Recording attempt failed: {}", error),
            _ => log::warn!("Recording attempt not started: {}", error),
        }
        self.emit_state(&state);
        self.report_error(&error);
        error
    }

    fn acquire(self: &Arc<Self>, generation: u64) -> Result<CaptureMode, CaptureError> {
        let acquirer = DualStreamAcquirer::new(&self.shared_capture, &self.local_input);

        // Everything acquired below lives in `resources` until the attempt is
        // committed; any early return drops it, which releases it.
        let mut resources = SessionResources::new();

        let system = match acquirer.acquire_system() {
            Ok(stream) => stream,
            Err(e) => return Err(self.abandon(generation, e)),
        };
        resources.adopt_system(system.clone());

        if self.core.lock().generation != generation {
            return Err(CaptureError::Cancelled);
        }

        let device = self.resolve_device();
        let mic = match acquirer.acquire_mic(device.as_deref(), self.config.mic_auto_gain_control) {
            Ok(stream) => {
                resources.adopt_mic(stream.clone());
                Some(stream)
            }
            Err(e) => {
                self.raise_notice(Notice::MicUnavailable { reason: inner_reason(e) });
                None
            }
        };

        // The platform may end the share while the mic prompt is open.
        if source_revoked(&system) {
            drop(resources);
            log::info!("Shared source ended during acquisition");
            return Err(self.abandon(generation, CaptureError::Cancelled));
        }

        let volumes = self.core.lock().volumes;
        let (output, mode) = match mic {
            Some(mic) => match MixingGraph::build(&system, &mic, volumes, self.graph_format()) {
                Ok(graph) => {
                    let output = graph.output().clone();
                    resources.adopt_graph(graph);
                    (output, CaptureMode::Mixed)
                }
                Err(e) => {
                    resources.release_mic();
                    self.raise_notice(Notice::MixingUnavailable { reason: inner_reason(e) });
                    (system.clone(), CaptureMode::SystemOnly)
                }
            },
            None => (system.clone(), CaptureMode::SystemOnly),
        };

        let sink = Arc::clone(&self.slices);
        let on_slice: SliceCallback = Arc::new(move |slice: EncodedSlice| {
            log::debug!("Collected slice: {} bytes ({})", slice.data.len(), slice.mime_type);
            sink.lock().push(slice);
        });
        let timeslice = Duration::from_millis(self.config.timeslice_ms);
        if let Err(e) = self.recorder.lock().start(&output, timeslice, on_slice) {
            drop(resources);
            let error = match e {
                _ if source_revoked(&system) => CaptureError::Cancelled,
                CaptureError::RecorderFailed(_) => e,
                other => CaptureError::RecorderFailed(other.to_string()),
            };
            return Err(self.abandon(generation, error));
        }
        let weak = Arc::downgrade(self);
        resources.defer("recorder", move || {
            if let Some(shared) = weak.upgrade() {
                if let Err(e) = shared.recorder.lock().stop() {
                    log::warn!("Recorder stop during release failed: {}", e);
                }
            }
        });

        if self.config.ticker == TickerMode::Background {
            let weak = Arc::downgrade(self);
            let interval = Duration::from_millis(self.config.tick_interval_ms);
            match Ticker::spawn(interval, move || weak.upgrade().is_some_and(|shared| shared.tick())) {
                Ok(ticker) => resources.adopt_ticker(ticker),
                Err(e) => {
                    drop(resources);
                    return Err(self.abandon(generation, e));
                }
            }
        }

        let state = SessionState::Recording { elapsed_ms: 0, mode };
        let stale = {
            let mut core = self.core.lock();
            if core.generation != generation {
                None
            } else {
                core.set_state(state.clone());
                Some(std::mem::replace(&mut core.resources, resources))
            }
        };
        // On cancellation `resources` is still ours and is released on return.
        let Some(mut stale) = stale else {
            log::info!("Recording attempt {} cancelled during acquisition", generation);
            return Err(CaptureError::Cancelled);
        };
        stale.release();

        log::info!("Recording started ({:?})", mode);
        self.emit_state(&state);

        let weak = Arc::downgrade(self);
        acquirer.watch_for_revocation(&system, move || {
            if let Some(shared) = weak.upgrade() {
                log::info!("Shared source ended by the platform; finalizing");
                if let Err(e) = shared.finish(StopCause::SourceEnded, Some(generation)) {
                    log::error!("Finalizing after source end failed: {}", e);
                }
            }
        });

        Ok(mode)
    }

    /// The microphone to open: the remembered one if still present, else the
    /// first listed device. Enumeration failures keep the remembered id.
    fn resolve_device(&self) -> Option<String> {
        let selected = self.core.lock().selected_device_id.clone()?;

        let catalog = match self.local_input.enumerate_devices() {
            Ok(devices) => DeviceCatalog::from_platform(&devices),
            Err(e) => {
                log::warn!("Could not validate microphone {:?}: {}", selected, e);
                return Some(selected);
            }
        };

        let resolved = catalog.resolve(Some(&selected)).map(|d| d.device_id.clone());
        self.core.lock().catalog = catalog;

        if resolved.as_deref() != Some(selected.as_str()) {
            self.raise_notice(Notice::DeviceFallback {
                requested: selected,
                used: resolved.clone(),
            });
        }
        resolved
    }

    fn tick(&self) -> bool {
        let state = {
            let mut core = self.core.lock();
            let SessionState::Recording { elapsed_ms, .. } = &mut core.state else {
                return false;
            };
            *elapsed_ms += self.config.tick_interval_ms;
            core.state.clone()
        };
        self.emit_state(&state);
        true
    }

    /// Leave `Recording` through `Finalizing`. Shared by user stop and source end.
    fn finish(&self, cause: StopCause, expected: Option<u64>) -> Result<Option<RecordingResult>, CaptureError> {
        let (mut resources, elapsed_ms, mode, generation) = {
            let mut core = self.core.lock();
            if expected.is_some_and(|g| g != core.generation) {
                return Ok(None);
            }
            let (elapsed_ms, mode) = match &core.state {
                SessionState::Recording { elapsed_ms, mode } => (*elapsed_ms, *mode),
                _ => return Ok(None),
            };
            core.set_state(SessionState::Finalizing);
            (std::mem::take(&mut core.resources), elapsed_ms, mode, core.generation)
        };
        log::info!("Finalizing recording after {} ms ({:?})", elapsed_ms, cause);
        self.emit_state(&SessionState::Finalizing);

        let flushed = self.recorder.lock().stop();
        resources.release();
        let slices = std::mem::take(&mut *self.slices.lock());

        if let Err(e) = flushed {
            return Err(self.fail_finalizing(generation, CaptureError::RecorderFailed(e.to_string())));
        }
        if slices.is_empty() {
            return Err(self.fail_finalizing(
                generation,
                CaptureError::RecorderFailed("recorder produced no data".into()),
            ));
        }

        let result = self.assemble(slices, elapsed_ms, mode, cause);
        {
            let mut core = self.core.lock();
            if core.generation != generation {
                return Ok(None);
            }
            core.set_state(SessionState::Complete(Box::new(result.clone())));
        }
        log::info!(
            "Recording complete: {} bytes of {} in {} ms",
            result.blob.len(),
            result.blob.mime_type,
            result.elapsed_ms
        );
        self.emit_state(&SessionState::Complete(Box::new(result.clone())));
        if let Some(delegate) = self.delegate() {
            delegate.on_recording_finished(&result);
        }
        Ok(Some(result))
    }

    /// Concatenate slices in arrival order. The first slice's MIME type tags the blob.
    fn assemble(&self, slices: Vec<EncodedSlice>, elapsed_ms: u64, mode: CaptureMode, cause: StopCause) -> RecordingResult {
        let slice_count = slices.len();
        let mime_type = slices
            .first()
            .map(|s| s.mime_type.trim())
            .filter(|m| !m.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| self.config.fallback_mime_type.clone());

        let mut data = Vec::with_capacity(slices.iter().map(|s| s.data.len()).sum());
        for slice in slices {
            data.extend_from_slice(&slice.data);
        }

        let blob = RecordingBlob { data, mime_type };
        let metadata = RecordingMetadata::describe(&blob, elapsed_ms, slice_count, mode, cause);
        RecordingResult {
            blob,
            elapsed_ms,
            mode,
            stop_cause: cause,
            metadata,
        }
    }

    fn fail_finalizing(&self, generation: u64, error: CaptureError) -> CaptureError {
        {
            let mut core = self.core.lock();
            if core.generation != generation {
                return error;
            }
            core.set_state(SessionState::Failed(error.clone()));
            core.last_error = Some(error.clone());
        }
        log::error!("Finalizing failed: {}", error);
        self.emit_state(&SessionState::Failed(error.clone()));
        self.report_error(&error);
        error
    }

    fn close(&self) {
        let (mut resources, was) = {
            let mut core = self.core.lock();
            core.generation += 1;
            let was = core.state.clone();
            core.set_state(SessionState::Idle);
            (std::mem::take(&mut core.resources), was)
        };
        resources.release();
        self.slices.lock().clear();

        if !was.is_idle() {
            log::info!("Session closed from {}", was.name());
            self.emit_state(&SessionState::Idle);
        }
    }
}

fn source_revoked(system: &MediaStream) -> bool {
    system.first_live_audio_track().is_none()
}

fn inner_reason(error: CaptureError) -> String {
    match error {
        CaptureError::MicUnavailable(reason) | CaptureError::MixingUnavailable(reason) => reason,
        other => other.to_string(),
    }
}

fn default_title() -> String {
    format!("Meeting recording {}", chrono::Local::now().format("%Y-%m-%d %H:%M"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::capability::{
        DisplayMediaRequest, EnvironmentInfo, MediaDeviceInfo, MicrophoneRequest,
    };
    use crate::models::media::{MediaStream, MediaTrack, TrackKind};

    struct Share {
        engine: &'static str,
        audio: bool,
        issued: Mutex<Vec<MediaTrack>>,
    }

    impl SharedSourceCapture for Share {
        fn environment(&self) -> EnvironmentInfo {
            EnvironmentInfo {
                engine: self.engine.into(),
                shared_audio_capture: true,
            }
        }

        fn request_display_media(&self, request: &DisplayMediaRequest) -> Result<MediaStream, CaptureError> {
            let mut tracks = vec![MediaTrack::new(TrackKind::Video, "screen")];
            if self.audio {
                tracks.push(MediaTrack::audio("tab", request.audio));
            }
            self.issued.lock().extend(tracks.iter().cloned());
            Ok(MediaStream::new(tracks))
        }
    }

    struct NoMic;

    impl LocalInputCapture for NoMic {
        fn request_microphone(&self, _: &MicrophoneRequest) -> Result<MediaStream, CaptureError> {
            Err(CaptureError::PermissionDenied)
        }

        fn enumerate_devices(&self) -> Result<Vec<MediaDeviceInfo>, CaptureError> {
            Ok(Vec::new())
        }
    }

    /// Emits one slice on stop.
    #[derive(Default)]
    struct OneSlice {
        sink: Option<SliceCallback>,
    }

    impl RecorderCapability for OneSlice {
        fn start(&mut self, _: &MediaStream, _: Duration, on_slice: SliceCallback) -> Result<(), CaptureError> {
            self.sink = Some(on_slice);
            Ok(())
        }

        fn stop(&mut self) -> Result<(), CaptureError> {
            if let Some(sink) = self.sink.take() {
                sink(EncodedSlice {
                    data: vec![1, 2, 3],
                    mime_type: String::new(),
                });
            }
            Ok(())
        }

        fn is_recording(&self) -> bool {
            self.sink.is_some()
        }
    }

    fn session(engine: &'static str, audio: bool) -> RecordingSession<Share, NoMic, OneSlice> {
        session_in(engine, audio, RecordingSlot::new())
    }

    fn session_in(engine: &'static str, audio: bool, slot: RecordingSlot) -> RecordingSession<Share, NoMic, OneSlice> {
        let config = SessionConfiguration {
            ticker: TickerMode::Manual,
            ..Default::default()
        };
        let share = Share {
            engine,
            audio,
            issued: Mutex::new(Vec::new()),
        };
        RecordingSession::with_slot(share, NoMic, OneSlice::default(), config, slot).unwrap()
    }

    #[test]
    fn stop_outside_recording_is_a_no_op() {
        let session = session("chromium", true);
        assert_eq!(session.stop().unwrap(), None);
        assert!(session.state().is_idle());
    }

    #[test]
    fn unsupported_engine_blocks_start() {
        let session = session("gecko", true);

        assert!(matches!(session.start(), Err(CaptureError::Unsupported { .. })));
        assert_eq!(session.state().name(), "unsupported");
        assert!(session.shared.shared_capture.issued.lock().is_empty());
        assert!(matches!(session.start(), Err(CaptureError::Unsupported { .. })));

        session.close();
        assert!(session.state().is_idle());
    }

    #[test]
    fn empty_mime_falls_back_to_configured_type() {
        let session = session("chromium", true);

        assert_eq!(session.start().unwrap(), CaptureMode::SystemOnly);
        session.tick();
        let result = session.stop().unwrap().unwrap();

        assert_eq!(result.blob.mime_type, "audio/webm");
        assert_eq!(result.blob.data, vec![1, 2, 3]);
        assert_eq!(result.elapsed_ms, 1000);
        assert_eq!(session.notices().iter().filter(|n| n.is_mic_unavailable()).count(), 1);
        assert_eq!(session.stop().unwrap(), None);
    }

    #[test]
    fn missing_audio_returns_to_idle_with_guidance() {
        let session = session("chromium", false);

        assert_eq!(session.start().unwrap_err(), CaptureError::NoAudioTrack);
        assert!(session.state().is_idle());
        assert_eq!(session.last_error(), Some(CaptureError::NoAudioTrack));
        assert!(session.shared.shared_capture.issued.lock().iter().all(|t| t.is_stopped()));
    }

    #[test]
    fn select_device_rejects_unknown_ids_once_listed() {
        let session = session("chromium", true);
        session.select_device(Some("anything")).unwrap();

        session.shared.core.lock().catalog = DeviceCatalog::new(vec![DeviceEntry {
            device_id: "mic-1".into(),
            label: "Mic".into(),
        }]);

        assert_eq!(session.select_device(Some("gone")), Err(CaptureError::DeviceNotAvailable));
        session.select_device(Some("mic-1")).unwrap();
        assert_eq!(session.selected_device().as_deref(), Some("mic-1"));
    }

    #[test]
    fn second_session_is_busy_until_the_first_settles() {
        let slot = RecordingSlot::new();
        let first = session_in("chromium", true, slot.clone());
        let second = session_in("chromium", true, slot.clone());

        first.start().unwrap();
        assert_eq!(second.start(), Err(CaptureError::SessionBusy));
        assert!(second.state().is_idle());
        assert!(second.shared.shared_capture.issued.lock().is_empty());

        first.stop().unwrap();
        assert!(slot.is_free());
        second.start().unwrap();
        assert!(!slot.is_free());
        drop(second);
        assert!(slot.is_free());
    }

    #[test]
    fn failed_attempts_give_the_slot_back() {
        let slot = RecordingSlot::new();

        let unsupported = session_in("gecko", true, slot.clone());
        assert!(unsupported.start().is_err());
        assert!(slot.is_free());

        let silent = session_in("chromium", false, slot.clone());
        assert!(silent.start().is_err());
        assert!(slot.is_free());

        let closed = session_in("chromium", true, slot.clone());
        closed.start().unwrap();
        closed.close();
        assert!(slot.is_free());
    }
}
