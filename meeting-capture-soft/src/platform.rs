//! Scriptable in-process platform.
//!
//! Stands in for the host's screen-sharing prompt, microphone prompt, and
//! device list. Tests and the demo choose how each prompt is answered, push
//! audio into whatever tracks are live, and revoke sharing from "outside".

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use meeting_capture_core::models::capability::{
    DeviceKind, DisplayMediaRequest, EnvironmentInfo, MediaDeviceInfo, MicrophoneRequest,
};
use meeting_capture_core::models::error::CaptureError;
use meeting_capture_core::models::media::{MediaStream, MediaTrack, TrackKind};
use meeting_capture_core::traits::capture_provider::{LocalInputCapture, SharedSourceCapture};

use crate::tone::SineTone;

/// Which capability issued a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackOrigin {
    Display,
    Microphone,
}

struct PlatformState {
    engine: String,
    shared_audio_capture: bool,
    grant_display: bool,
    share_audio: bool,
    grant_mic: bool,
    mic_dead_on_arrival: bool,
    devices: Vec<MediaDeviceInfo>,
    mic_grant_observed: bool,
    display_requests: Vec<DisplayMediaRequest>,
    mic_requests: Vec<MicrophoneRequest>,
    issued: Vec<(TrackOrigin, MediaTrack)>,
    devices_in_use: usize,
}

/// Shared handle to the simulated platform. Clones see the same state.
#[derive(Clone)]
pub struct SoftPlatform {
    state: Arc<Mutex<PlatformState>>,
}

impl Default for SoftPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl SoftPlatform {
    /// A permissive Chromium-like host with two microphones.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(PlatformState {
                engine: "chromium".into(),
                shared_audio_capture: true,
                grant_display: true,
                share_audio: true,
                grant_mic: true,
                mic_dead_on_arrival: false,
                devices: vec![
                    input_device("default", "Default - Built-in Microphone"),
                    input_device("usb-headset", "USB Headset"),
                    MediaDeviceInfo {
                        device_id: "speakers".into(),
                        label: "Built-in Speakers".into(),
                        kind: DeviceKind::AudioOutput,
                    },
                ],
                mic_grant_observed: false,
                display_requests: Vec::new(),
                mic_requests: Vec::new(),
                issued: Vec::new(),
                devices_in_use: 0,
            })),
        }
    }

    pub fn display_capture(&self) -> SoftDisplayCapture {
        SoftDisplayCapture { platform: self.clone() }
    }

    pub fn microphone(&self) -> SoftMicrophone {
        SoftMicrophone { platform: self.clone() }
    }

    pub fn set_engine(&self, engine: impl Into<String>) {
        self.state.lock().engine = engine.into();
    }

    pub fn set_shared_audio_capture(&self, supported: bool) {
        self.state.lock().shared_audio_capture = supported;
    }

    /// Whether the user accepts the screen-sharing prompt.
    pub fn set_display_grant(&self, grant: bool) {
        self.state.lock().grant_display = grant;
    }

    /// Whether the user ticks "share audio" in the screen-sharing prompt.
    pub fn set_share_audio(&self, share_audio: bool) {
        self.state.lock().share_audio = share_audio;
    }

    pub fn set_mic_grant(&self, grant: bool) {
        self.state.lock().grant_mic = grant;
    }

    /// Granted microphone tracks arrive already ended (device unplugged mid-grant).
    pub fn set_mic_dead_on_arrival(&self, dead: bool) {
        self.state.lock().mic_dead_on_arrival = dead;
    }

    pub fn set_devices(&self, devices: Vec<MediaDeviceInfo>) {
        self.state.lock().devices = devices;
    }

    pub fn unplug(&self, device_id: &str) {
        self.state.lock().devices.retain(|d| d.device_id != device_id);
    }

    pub fn display_requests(&self) -> Vec<DisplayMediaRequest> {
        self.state.lock().display_requests.clone()
    }

    pub fn mic_requests(&self) -> Vec<MicrophoneRequest> {
        self.state.lock().mic_requests.clone()
    }

    /// Every track ever handed out, in issue order.
    pub fn issued_tracks(&self) -> Vec<MediaTrack> {
        self.state.lock().issued.iter().map(|(_, t)| t.clone()).collect()
    }

    /// Tracks neither stopped by the consumer nor ended by the platform.
    pub fn live_tracks(&self) -> Vec<MediaTrack> {
        self.state
            .lock()
            .issued
            .iter()
            .filter(|(_, t)| t.is_live())
            .map(|(_, t)| t.clone())
            .collect()
    }

    /// Granted tracks the consumer has not stopped yet (capture indicators lit).
    pub fn devices_in_use(&self) -> usize {
        self.state.lock().devices_in_use
    }

    /// Push audio into every live shared-source audio track.
    pub fn feed_system(&self, samples: &[f32], sample_rate: f64, channels: u16) {
        for track in self.live_audio(TrackOrigin::Display) {
            track.deliver(samples, sample_rate, channels);
        }
    }

    /// Push audio into every live microphone track.
    pub fn feed_mic(&self, samples: &[f32], sample_rate: f64, channels: u16) {
        for track in self.live_audio(TrackOrigin::Microphone) {
            track.deliver(samples, sample_rate, channels);
        }
    }

    /// End the shared source from the platform side ("Stop sharing").
    pub fn revoke_share(&self) {
        let tracks: Vec<MediaTrack> = self
            .state
            .lock()
            .issued
            .iter()
            .filter(|(origin, t)| *origin == TrackOrigin::Display && t.is_live())
            .map(|(_, t)| t.clone())
            .collect();
        log::info!("Platform revoked screen sharing ({} track(s))", tracks.len());
        for track in tracks {
            track.end();
        }
    }

    /// Feed both sources from tone generators in real time until the handle is dropped.
    pub fn start_feeding(&self, system: SineTone, mic: SineTone, block: Duration) -> Result<FeedHandle, CaptureError> {
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);
        let platform = self.clone();
        let (mut system, mut mic) = (system, mic);

        let thread = thread::Builder::new()
            .name("soft-feed".into())
            .spawn(move || {
                let system_frames = (system.sample_rate() * block.as_secs_f64()) as usize;
                let mic_frames = (mic.sample_rate() * block.as_secs_f64()) as usize;
                while flag.load(Ordering::SeqCst) {
                    platform.feed_mic(&mic.next_block(mic_frames), mic.sample_rate(), mic.channels());
                    platform.feed_system(&system.next_block(system_frames), system.sample_rate(), system.channels());
                    thread::sleep(block);
                }
            })
            .map_err(|e| CaptureError::Unknown(format!("failed to spawn feed thread: {}", e)))?;

        Ok(FeedHandle {
            running,
            thread: Some(thread),
        })
    }

    fn live_audio(&self, origin: TrackOrigin) -> Vec<MediaTrack> {
        self.state
            .lock()
            .issued
            .iter()
            .filter(|(o, t)| *o == origin && t.kind() == TrackKind::Audio && t.is_live())
            .map(|(_, t)| t.clone())
            .collect()
    }

    /// Register a freshly granted track; its release hook frees the "device".
    fn issue(&self, origin: TrackOrigin, track: MediaTrack) -> MediaTrack {
        let weak = Arc::downgrade(&self.state);
        let track = track.with_release(move || {
            if let Some(state) = weak.upgrade() {
                let mut state = state.lock();
                state.devices_in_use = state.devices_in_use.saturating_sub(1);
            }
        });
        let mut state = self.state.lock();
        state.devices_in_use += 1;
        state.issued.push((origin, track.clone()));
        track
    }
}

/// Running tone feed. Stops and joins on drop.
pub struct FeedHandle {
    running: Arc<AtomicBool>,
    thread: Option<thread::JoinHandle<()>>,
}

impl FeedHandle {
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for FeedHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// [`SharedSourceCapture`] backed by a [`SoftPlatform`].
#[derive(Clone)]
pub struct SoftDisplayCapture {
    platform: SoftPlatform,
}

impl SharedSourceCapture for SoftDisplayCapture {
    fn environment(&self) -> EnvironmentInfo {
        let state = self.platform.state.lock();
        EnvironmentInfo {
            engine: state.engine.clone(),
            shared_audio_capture: state.shared_audio_capture,
        }
    }

    fn request_display_media(&self, request: &DisplayMediaRequest) -> Result<MediaStream, CaptureError> {
        let (granted, share_audio) = {
            let mut state = self.platform.state.lock();
            state.display_requests.push(*request);
            (state.grant_display, state.share_audio)
        };
        if !granted {
            log::info!("Screen sharing prompt declined");
            return Err(CaptureError::PermissionDenied);
        }

        let mut tracks = Vec::new();
        if request.video {
            tracks.push(
                self.platform
                    .issue(TrackOrigin::Display, MediaTrack::new(TrackKind::Video, "Screen 1")),
            );
        }
        if share_audio {
            tracks.push(
                self.platform
                    .issue(TrackOrigin::Display, MediaTrack::audio("Tab audio", request.audio)),
            );
        }
        Ok(MediaStream::new(tracks))
    }
}

/// [`LocalInputCapture`] backed by a [`SoftPlatform`].
#[derive(Clone)]
pub struct SoftMicrophone {
    platform: SoftPlatform,
}

impl LocalInputCapture for SoftMicrophone {
    fn request_microphone(&self, request: &MicrophoneRequest) -> Result<MediaStream, CaptureError> {
        let (granted, dead, label) = {
            let mut state = self.platform.state.lock();
            state.mic_requests.push(request.clone());
            let inputs: Vec<&MediaDeviceInfo> =
                state.devices.iter().filter(|d| d.kind == DeviceKind::AudioInput).collect();
            let device = match &request.device_id {
                Some(id) => inputs.iter().find(|d| d.device_id == *id).copied(),
                None => inputs.first().copied(),
            };
            let label = device.map(|d| d.label.clone());
            if state.grant_mic && label.is_some() {
                state.mic_grant_observed = true;
            }
            (state.grant_mic, state.mic_dead_on_arrival, label)
        };

        if !granted {
            log::info!("Microphone prompt declined");
            return Err(CaptureError::PermissionDenied);
        }
        let Some(label) = label else {
            return Err(CaptureError::DeviceNotAvailable);
        };

        let track = self
            .platform
            .issue(TrackOrigin::Microphone, MediaTrack::audio(label, request.audio));
        if dead {
            track.end();
        }
        Ok(MediaStream::new(vec![track]))
    }

    fn enumerate_devices(&self) -> Result<Vec<MediaDeviceInfo>, CaptureError> {
        let state = self.platform.state.lock();
        Ok(state
            .devices
            .iter()
            .map(|d| MediaDeviceInfo {
                label: if state.mic_grant_observed {
                    d.label.clone()
                } else {
                    String::new()
                },
                ..d.clone()
            })
            .collect())
    }
}

fn input_device(id: &str, label: &str) -> MediaDeviceInfo {
    MediaDeviceInfo {
        device_id: id.into(),
        label: label.into(),
        kind: DeviceKind::AudioInput,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meeting_capture_core::models::capability::{AudioProcessing, EchoCancellation};

    #[test]
    fn display_grant_honours_share_audio_choice() {
        let platform = SoftPlatform::new();
        platform.set_share_audio(false);

        let stream = platform
            .display_capture()
            .request_display_media(&DisplayMediaRequest::system_audio())
            .unwrap();

        assert_eq!(stream.video_tracks().count(), 1);
        assert!(!stream.has_audio());
        assert_eq!(platform.devices_in_use(), 1);
    }

    #[test]
    fn labels_hidden_until_mic_granted() {
        let platform = SoftPlatform::new();
        let mic = platform.microphone();

        assert!(mic.enumerate_devices().unwrap().iter().all(|d| d.label.is_empty()));
        mic.request_microphone(&MicrophoneRequest::permission_probe())
            .unwrap()
            .stop_all();

        let labels: Vec<String> = mic.enumerate_devices().unwrap().into_iter().map(|d| d.label).collect();
        assert!(labels.contains(&"USB Headset".to_string()));
        assert_eq!(platform.devices_in_use(), 0);
    }

    #[test]
    fn mic_request_keeps_processing_and_device() {
        let platform = SoftPlatform::new();
        let stream = platform
            .microphone()
            .request_microphone(&MicrophoneRequest::new(Some("usb-headset".into()), true))
            .unwrap();

        let track = &stream.tracks()[0];
        assert_eq!(track.label(), "USB Headset");
        assert_eq!(
            track.processing().map(|p| p.echo_cancellation),
            Some(EchoCancellation::RemoteOnly)
        );
        assert_ne!(track.processing(), Some(AudioProcessing::passthrough()));
    }

    #[test]
    fn unplugged_device_is_not_available() {
        let platform = SoftPlatform::new();
        platform.unplug("usb-headset");

        let err = platform
            .microphone()
            .request_microphone(&MicrophoneRequest::new(Some("usb-headset".into()), true))
            .unwrap_err();
        assert_eq!(err, CaptureError::DeviceNotAvailable);
    }

    #[test]
    fn revoke_ends_only_display_tracks() {
        let platform = SoftPlatform::new();
        let display = platform
            .display_capture()
            .request_display_media(&DisplayMediaRequest::system_audio())
            .unwrap();
        let mic = platform
            .microphone()
            .request_microphone(&MicrophoneRequest::new(None, true))
            .unwrap();

        platform.revoke_share();

        assert!(display.tracks().iter().all(|t| t.is_ended()));
        assert!(mic.tracks()[0].is_live());
        assert_eq!(platform.live_tracks().len(), 1);
    }
}
