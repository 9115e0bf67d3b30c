use crate::models::capability::{DisplayMediaRequest, EnvironmentInfo, MediaDeviceInfo, MicrophoneRequest};
use crate::models::error::CaptureError;
use crate::models::media::MediaStream;

/// Screen/tab sharing capability that can carry another application's audio.
///
/// Implementations return a stream containing whatever the user granted,
/// typically one video track plus zero or one audio track. Requests may block
/// until the user answers the platform prompt.
pub trait SharedSourceCapture: Send + Sync {
    /// Read-only description of the host. Must not prompt.
    fn environment(&self) -> EnvironmentInfo;

    /// Ask the user to pick a screen, window, or tab to share.
    ///
    /// Fails with `CaptureError::PermissionDenied` when the user declines.
    fn request_display_media(&self, request: &DisplayMediaRequest) -> Result<MediaStream, CaptureError>;
}

/// Local microphone capability.
pub trait LocalInputCapture: Send + Sync {
    /// Open a microphone with the requested processing. May block on a permission prompt.
    fn request_microphone(&self, request: &MicrophoneRequest) -> Result<MediaStream, CaptureError>;

    /// List devices. Labels stay empty until a microphone grant has been observed.
    fn enumerate_devices(&self) -> Result<Vec<MediaDeviceInfo>, CaptureError>;
}
