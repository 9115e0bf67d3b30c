use super::audio_models::CaptureMode;
use super::error::CaptureError;
use super::recording_result::RecordingResult;

/// Recording session state machine.
///
/// State transitions:
/// ```text
/// idle → checking-compatibility → awaiting-permission → recording → finalizing → complete
///                 ↓                      ↓      ↑
///            unsupported          permission-denied (retry)
///
/// any state → failed (cleanup still runs)
/// complete / failed / unsupported → idle (acknowledge, close)
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Idle,
    CheckingCompatibility,
    Unsupported { reason: String },
    AwaitingPermission,
    PermissionDenied,
    Recording { elapsed_ms: u64, mode: CaptureMode },
    Finalizing,
    Complete(Box<RecordingResult>),
    Failed(CaptureError),
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::CheckingCompatibility => "checking-compatibility",
            Self::Unsupported { .. } => "unsupported",
            Self::AwaitingPermission => "awaiting-permission",
            Self::PermissionDenied => "permission-denied",
            Self::Recording { .. } => "recording",
            Self::Finalizing => "finalizing",
            Self::Complete(_) => "complete",
            Self::Failed(_) => "failed",
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn is_recording(&self) -> bool {
        matches!(self, Self::Recording { .. })
    }

    /// An acquisition is underway; a second `start` must be refused.
    pub fn is_acquiring(&self) -> bool {
        matches!(self, Self::CheckingCompatibility | Self::AwaitingPermission)
    }

    /// The session is between `start` and a settled state, and owns capture.
    pub fn holds_capture(&self) -> bool {
        matches!(
            self,
            Self::CheckingCompatibility | Self::AwaitingPermission | Self::Recording { .. } | Self::Finalizing
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete(_) | Self::Failed(_) | Self::Unsupported { .. })
    }

    /// Elapsed recording time, when the state tracks it.
    pub fn elapsed_ms(&self) -> Option<u64> {
        match self {
            Self::Recording { elapsed_ms, .. } => Some(*elapsed_ms),
            Self::Complete(result) => Some(result.elapsed_ms),
            _ => None,
        }
    }

    pub fn result(&self) -> Option<&RecordingResult> {
        match self {
            Self::Complete(result) => Some(result),
            _ => None,
        }
    }
}
