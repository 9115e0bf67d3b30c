use serde::{Deserialize, Serialize};

/// Echo cancellation mode requested from a capture backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EchoCancellation {
    Off,
    /// Cancel only echo of remote participants, so local playback does not gate the mic.
    RemoteOnly,
    All,
}

/// Signal processing applied to a captured audio source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AudioProcessing {
    pub echo_cancellation: EchoCancellation,
    pub noise_suppression: bool,
    pub auto_gain_control: bool,
}

impl AudioProcessing {
    /// Remote-source audio passes through untouched.
    pub const fn passthrough() -> Self {
        Self {
            echo_cancellation: EchoCancellation::Off,
            noise_suppression: false,
            auto_gain_control: false,
        }
    }

    pub const fn microphone(auto_gain_control: bool) -> Self {
        Self {
            echo_cancellation: EchoCancellation::RemoteOnly,
            noise_suppression: true,
            auto_gain_control,
        }
    }
}

/// A screen/tab share request. Video must be requested for the platform to offer audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayMediaRequest {
    pub video: bool,
    pub audio: AudioProcessing,
}

impl DisplayMediaRequest {
    pub const fn system_audio() -> Self {
        Self {
            video: true,
            audio: AudioProcessing::passthrough(),
        }
    }
}

/// A local input request. `device_id = None` means the platform default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MicrophoneRequest {
    pub device_id: Option<String>,
    pub audio: AudioProcessing,
}

impl MicrophoneRequest {
    pub fn new(device_id: Option<String>, auto_gain_control: bool) -> Self {
        Self {
            device_id,
            audio: AudioProcessing::microphone(auto_gain_control),
        }
    }

    /// The throwaway grant that unlocks device labels.
    pub fn permission_probe() -> Self {
        Self::new(None, false)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceKind {
    AudioInput,
    AudioOutput,
    VideoInput,
}

/// A device as reported by the platform. Labels are empty until a grant has been observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaDeviceInfo {
    pub device_id: String,
    pub label: String,
    pub kind: DeviceKind,
}

/// What the capture host can do, inspected before any permission prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentInfo {
    /// Rendering engine family of the host, e.g. `chromium`.
    pub engine: String,
    /// Whether the shared-source (screen/tab) audio capture primitive exists.
    pub shared_audio_capture: bool,
}
