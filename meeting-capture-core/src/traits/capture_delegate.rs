use crate::models::error::CaptureError;
use crate::models::notice::Notice;
use crate::models::recording_result::RecordingResult;
use crate::models::state::SessionState;

/// Event delegate for recording session notifications.
///
/// Methods may be called from a capture or ticker thread, never while the
/// session holds its internal lock. Implementations should marshal to the UI
/// thread if needed.
pub trait SessionDelegate: Send + Sync {
    /// Called when the session state changes, including every elapsed tick.
    fn on_state_changed(&self, state: &SessionState);

    /// Called for degraded-capability conditions that do not stop the recording.
    fn on_notice(&self, notice: &Notice);

    /// Called when an operation fails.
    fn on_error(&self, error: &CaptureError);

    /// Called once per completed recording.
    fn on_recording_finished(&self, result: &RecordingResult);
}
