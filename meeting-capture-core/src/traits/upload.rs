use crate::models::error::CaptureError;
use crate::models::recording_result::{RecordingBlob, RecordingResult};

/// Receiver of a finished recording.
pub trait UploadHandoff {
    /// Persist `blob` under `title`. The blob must be stored byte-for-byte.
    fn hand_off(&self, blob: &RecordingBlob, title: &str) -> Result<(), CaptureError>;

    /// Hand off a full result. Receivers that keep metadata override this;
    /// the default forwards the blob alone.
    fn hand_off_result(&self, result: &RecordingResult, title: &str) -> Result<(), CaptureError> {
        self.hand_off(&result.blob, title)
    }
}
