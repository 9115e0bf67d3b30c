use thiserror::Error;

/// Errors that can occur while acquiring, mixing, or recording.
///
/// Conditions that still leave a usable recording path are reported as
/// [`Notice`](super::notice::Notice)s instead.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("shared audio capture unsupported: {reason}")]
    Unsupported { reason: String },

    #[error("permission denied")]
    PermissionDenied,

    #[error("shared source has no audio track; choose a tab or window and enable audio sharing")]
    NoAudioTrack,

    #[error("microphone unavailable: {0}")]
    MicUnavailable(String),

    #[error("audio mixing unavailable: {0}")]
    MixingUnavailable(String),

    #[error("recorder failed: {0}")]
    RecorderFailed(String),

    #[error("device not available")]
    DeviceNotAvailable,

    #[error("an acquisition is already in progress")]
    AcquisitionInFlight,

    #[error("another recording session is active")]
    SessionBusy,

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("cancelled")]
    Cancelled,

    #[error("configuration failed: {0}")]
    ConfigurationFailed(String),

    #[error("storage error: {0}")]
    StorageError(String),

    #[error("unknown error: {0}")]
    Unknown(String),
}

impl CaptureError {
    /// Whether the user can fix the condition and try again within the same session.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::PermissionDenied | Self::NoAudioTrack | Self::SessionBusy | Self::Cancelled
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_and_audio_track_are_distinct() {
        assert_ne!(CaptureError::PermissionDenied, CaptureError::NoAudioTrack);
        assert!(CaptureError::NoAudioTrack.to_string().contains("enable audio sharing"));
    }

    #[test]
    fn recoverable_classification() {
        assert!(CaptureError::PermissionDenied.is_recoverable());
        assert!(CaptureError::NoAudioTrack.is_recoverable());
        assert!(CaptureError::SessionBusy.is_recoverable());
        assert!(!CaptureError::RecorderFailed("x".into()).is_recoverable());
        assert!(!CaptureError::Unsupported { reason: "x".into() }.is_recoverable());
    }
}
