use serde::{Deserialize, Serialize};

/// Type of audio source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioTrackType {
    Mic,
    System,
}

/// Which sources feed the recorder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CaptureMode {
    /// System and microphone summed through the mixing graph.
    Mixed,
    /// System audio alone (no microphone, or mixing failed).
    SystemOnly,
}

impl CaptureMode {
    pub fn sources(&self) -> Vec<AudioTrackType> {
        match self {
            Self::Mixed => vec![AudioTrackType::System, AudioTrackType::Mic],
            Self::SystemOnly => vec![AudioTrackType::System],
        }
    }
}

/// Why a recording left the `Recording` state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StopCause {
    User,
    /// The platform revoked the shared source (e.g. "stop sharing" in browser chrome).
    SourceEnded,
}

/// A selectable microphone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceEntry {
    pub device_id: String,
    pub label: String,
}

/// Per-source volume as exposed to the user, in percent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Volumes {
    pub system: u8,
    pub mic: u8,
}

impl Volumes {
    pub fn new(system: u8, mic: u8) -> Self {
        Self {
            system: system.min(100),
            mic: mic.min(100),
        }
    }

    pub fn system_gain(&self) -> f32 {
        percent_to_gain(self.system)
    }

    pub fn mic_gain(&self) -> f32 {
        percent_to_gain(self.mic)
    }
}

impl Default for Volumes {
    fn default() -> Self {
        Self { system: 100, mic: 100 }
    }
}

pub fn percent_to_gain(percent: u8) -> f32 {
    f32::from(percent.min(100)) / 100.0
}
