use crate::models::capability::{DisplayMediaRequest, MicrophoneRequest};
use crate::models::error::CaptureError;
use crate::models::media::{MediaStream, TrackKind};
use crate::traits::capture_provider::{LocalInputCapture, SharedSourceCapture};

/// Requests the two independent capture grants and reduces each to audio only.
///
/// System audio is mandatory and always requested first; the microphone is
/// best-effort and only requested after system audio succeeded.
pub struct DualStreamAcquirer<'a, S: ?Sized, L: ?Sized> {
    shared: &'a S,
    local: &'a L,
}

impl<'a, S, L> DualStreamAcquirer<'a, S, L>
where
    S: SharedSourceCapture + ?Sized,
    L: LocalInputCapture + ?Sized,
{
    pub fn new(shared: &'a S, local: &'a L) -> Self {
        Self { shared, local }
    }

    /// Acquire the shared source's audio with all processing disabled.
    ///
    /// The grant includes video because the platform requires it; the video
    /// tracks are stopped and dropped before this returns. A grant without
    /// audio fails with `NoAudioTrack` and leaves nothing running.
    pub fn acquire_system(&self) -> Result<MediaStream, CaptureError> {
        let mut stream = self.shared.request_display_media(&DisplayMediaRequest::system_audio())?;

        for video in stream.remove_tracks(TrackKind::Video) {
            video.stop();
        }

        if !stream.has_audio() {
            stream.stop_all();
            log::warn!("Shared source was granted without an audio track");
            return Err(CaptureError::NoAudioTrack);
        }

        log::info!("System audio acquired ({} track(s))", stream.audio_tracks().count());
        Ok(stream)
    }

    /// Acquire the microphone with remote-only echo cancellation and noise suppression.
    ///
    /// Any failure is reported as `MicUnavailable`; the caller keeps its system stream.
    pub fn acquire_mic(&self, device_id: Option<&str>, auto_gain_control: bool) -> Result<MediaStream, CaptureError> {
        let request = MicrophoneRequest::new(device_id.map(str::to_string), auto_gain_control);
        let mut stream = self
            .local
            .request_microphone(&request)
            .map_err(|e| CaptureError::MicUnavailable(e.to_string()))?;

        for stray in stream.remove_tracks(TrackKind::Video) {
            stray.stop();
        }
        if !stream.has_audio() {
            stream.stop_all();
            return Err(CaptureError::MicUnavailable("microphone grant had no audio track".into()));
        }

        log::info!("Microphone acquired (device: {})", device_id.unwrap_or("default"));
        Ok(stream)
    }

    /// Fire `on_revoked` once if the platform ends the system stream's audio
    /// (for example, the user clicks "stop sharing").
    pub fn watch_for_revocation(&self, system: &MediaStream, on_revoked: impl FnOnce() + Send + 'static) {
        if let Some(track) = system.audio_tracks().next() {
            track.on_ended(on_revoked);
        }
    }
}
