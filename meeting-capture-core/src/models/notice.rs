use std::fmt;

/// A degraded-capability condition that does not abort the recording.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// Microphone could not be acquired; recording continues with system audio only.
    MicUnavailable { reason: String },
    /// Audio graph could not be built; recording continues with system audio only.
    MixingUnavailable { reason: String },
    /// Device labels could not be listed; the default microphone will be used.
    DeviceCatalogUnavailable { reason: String },
    /// The remembered microphone disappeared; another device was selected.
    DeviceFallback { requested: String, used: Option<String> },
}

impl Notice {
    pub fn is_mic_unavailable(&self) -> bool {
        matches!(self, Self::MicUnavailable { .. })
    }

    pub fn is_mixing_unavailable(&self) -> bool {
        matches!(self, Self::MixingUnavailable { .. })
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MicUnavailable { reason } => {
                write!(f, "microphone unavailable, recording system audio only: {}", reason)
            }
            Self::MixingUnavailable { reason } => {
                write!(f, "could not mix microphone, recording system audio only: {}", reason)
            }
            Self::DeviceCatalogUnavailable { reason } => {
                write!(f, "could not list microphones: {}", reason)
            }
            Self::DeviceFallback { requested, used } => match used {
                Some(used) => write!(f, "microphone {} is gone, using {}", requested, used),
                None => write!(f, "microphone {} is gone, using the default input", requested),
            },
        }
    }
}
